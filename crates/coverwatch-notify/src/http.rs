//! HTTP client for the notification service's event inbox.

use coverwatch_core::NotificationEvent;
use serde::Deserialize;
use thiserror::Error;
use tracing::{debug, info};

use crate::EventBatch;

#[derive(Error, Debug)]
pub enum NotifyError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("server returned {status}: {body}")]
    Server { status: u16, body: String },
    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Pushes engine events to `{base_url}/api/events`.
pub struct NotifyClient {
    client: reqwest::Client,
    base_url: String,
}

#[derive(Deserialize)]
struct PushResponse {
    accepted: u64,
}

impl NotifyClient {
    /// `base_url` like `http://localhost:4000`; a trailing slash is dropped.
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    pub fn events_url(&self) -> String {
        format!("{}/api/events", self.base_url)
    }

    /// Deliver a batch. Returns how many events the service accepted.
    pub async fn push_events(&self, events: &[NotificationEvent]) -> Result<u64, NotifyError> {
        if events.is_empty() {
            debug!("no events to push");
            return Ok(0);
        }
        let url = self.events_url();

        info!(url = %url, count = events.len(), "pushing events to notification service");
        let resp = self
            .client
            .post(&url)
            .json(&EventBatch::new(events))
            .send()
            .await?;
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(NotifyError::Server {
                status: status.as_u16(),
                body,
            });
        }

        let body = resp.text().await?;
        let result: PushResponse = serde_json::from_str(&body)?;
        info!(accepted = result.accepted, "push complete");
        Ok(result.accepted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trims_trailing_slash() {
        let client = NotifyClient::new("http://localhost:4000/");
        assert_eq!(client.base_url, "http://localhost:4000");
        assert_eq!(client.events_url(), "http://localhost:4000/api/events");
    }

    #[test]
    fn push_response_shape() {
        let parsed: PushResponse = serde_json::from_str(r#"{"accepted": 3}"#).unwrap();
        assert_eq!(parsed.accepted, 3);
        assert!(serde_json::from_str::<PushResponse>(r#"{"ok": true}"#).is_err());
    }

    #[tokio::test]
    async fn empty_push_skips_network() {
        // Unroutable address: any request would fail.
        let client = NotifyClient::new("http://127.0.0.1:9");
        assert_eq!(client.push_events(&[]).await.unwrap(), 0);
    }
}
