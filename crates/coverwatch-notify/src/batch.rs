//! Wire shape of an event delivery.

use coverwatch_core::NotificationEvent;
use serde::Serialize;

/// Body of one push: `{"events": [...]}`, each event tagged by `event`.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct EventBatch<'a> {
    pub events: &'a [NotificationEvent],
}

impl<'a> EventBatch<'a> {
    pub fn new(events: &'a [NotificationEvent]) -> Self {
        Self { events }
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }
}

/// One JSON object per line, for delivery through stdout or a log pipe.
pub fn to_json_lines(events: &[NotificationEvent]) -> Result<String, serde_json::Error> {
    let mut out = String::new();
    for event in events {
        out.push_str(&serde_json::to_string(event)?);
        out.push('\n');
    }
    Ok(out)
}
