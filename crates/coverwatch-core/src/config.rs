//! Engine configuration.
//!
//! Every field has a default, so an empty JSON object (or no file at all)
//! yields a working configuration.

use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read config {path}: {source}")]
    Io {
        path: std::path::PathBuf,
        source: std::io::Error,
    },

    #[error("config JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid config: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// A policy ending within this many days passes with a warning.
    pub expiry_warning_days: i64,
    /// Extraction confidence below this forces a `review` verdict.
    pub review_confidence_threshold: f64,
    /// Deficiency events are due this many days after the verdict.
    pub deficiency_due_days: i64,
    /// Insurer allow-list; compared case-insensitively.
    pub licensed_insurers: Vec<String>,
    /// PDF producers associated with image editing.
    pub suspicious_software: Vec<String>,
    /// Office tools that can author a certificate from scratch.
    pub office_software: Vec<String>,
    /// Limits above this are implausible for a subcontractor certificate.
    pub max_plausible_limit: u64,
    /// Attempts at committing a verdict before a conflict is surfaced.
    pub verdict_retry_attempts: u32,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            expiry_warning_days: 30,
            review_confidence_threshold: 0.70,
            deficiency_due_days: 14,
            licensed_insurers: [
                "QBE Insurance (Australia) Limited",
                "Allianz Australia Insurance Limited",
                "Insurance Australia Limited",
                "AAI Limited",
                "Zurich Australian Insurance Limited",
                "Chubb Insurance Australia Limited",
                "AIG Australia Limited",
                "Liberty Mutual Insurance Company",
                "HDI Global Specialty SE",
                "Lloyd's Underwriters",
                "Berkshire Hathaway Specialty Insurance",
                "Hollard Insurance Company",
            ]
            .into_iter()
            .map(String::from)
            .collect(),
            suspicious_software: [
                "photoshop",
                "gimp",
                "illustrator",
                "canva",
                "pixelmator",
                "paint.net",
                "affinity",
                "inkscape",
            ]
            .into_iter()
            .map(String::from)
            .collect(),
            office_software: ["microsoft word", "libreoffice", "openoffice", "pages", "google docs"]
                .into_iter()
                .map(String::from)
                .collect(),
            max_plausible_limit: 500_000_000,
            verdict_retry_attempts: 3,
        }
    }
}

impl EngineConfig {
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_json_file(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config = Self::from_json_str(&raw)?;
        debug!(path = %path.display(), "loaded engine config");
        Ok(config)
    }

    /// Load `path` if given, defaults otherwise.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        match path {
            Some(p) => Self::from_json_file(p),
            None => Ok(Self::default()),
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(0.0..=1.0).contains(&self.review_confidence_threshold) {
            return Err(ConfigError::Invalid(format!(
                "review_confidence_threshold must be in [0, 1], got {}",
                self.review_confidence_threshold
            )));
        }
        if self.expiry_warning_days < 0 || self.deficiency_due_days < 0 {
            return Err(ConfigError::Invalid(
                "day offsets must not be negative".into(),
            ));
        }
        if self.verdict_retry_attempts == 0 {
            return Err(ConfigError::Invalid(
                "verdict_retry_attempts must be at least 1".into(),
            ));
        }
        Ok(())
    }
}
