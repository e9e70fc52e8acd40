//! Extracted certificate payload, as handed over by the extraction service.
//!
//! The engine treats everything in this module as a read-only snapshot.
//! Fields the extractor could not read are `None` rather than errors: a
//! half-read certificate is a normal input, not a bug.

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// Coverage type key, e.g. `public_liability` or `workers_compensation`.
///
/// Stored normalised (trimmed, lowercase, spaces and hyphens folded to `_`)
/// so that requirement keys and extracted lines compare by value.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub struct CoverageType(String);

impl CoverageType {
    pub const PUBLIC_LIABILITY: &'static str = "public_liability";
    pub const PRODUCTS_LIABILITY: &'static str = "products_liability";
    pub const PROFESSIONAL_INDEMNITY: &'static str = "professional_indemnity";
    pub const WORKERS_COMPENSATION: &'static str = "workers_compensation";
    pub const MOTOR_VEHICLE: &'static str = "motor_vehicle";
    pub const CONTRACT_WORKS: &'static str = "contract_works";

    pub fn new(raw: &str) -> Self {
        let folded: String = raw
            .trim()
            .chars()
            .map(|c| match c {
                ' ' | '-' => '_',
                c => c.to_ascii_lowercase(),
            })
            .collect();
        Self(folded)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Statutory, state-administered cover whose jurisdiction must line up
    /// with where the work happens.
    pub fn is_statutory(&self) -> bool {
        matches!(
            self.0.as_str(),
            Self::WORKERS_COMPENSATION | "workers_comp" | "workcover"
        )
    }

    /// Human label: `public_liability` → `Public Liability`.
    pub fn label(&self) -> String {
        self.0
            .split('_')
            .filter(|w| !w.is_empty())
            .map(|w| {
                let mut chars = w.chars();
                match chars.next() {
                    Some(first) => first.to_ascii_uppercase().to_string() + chars.as_str(),
                    None => String::new(),
                }
            })
            .collect::<Vec<_>>()
            .join(" ")
    }
}

impl From<String> for CoverageType {
    fn from(raw: String) -> Self {
        Self::new(&raw)
    }
}

impl From<&str> for CoverageType {
    fn from(raw: &str) -> Self {
        Self::new(raw)
    }
}

impl From<CoverageType> for String {
    fn from(ct: CoverageType) -> Self {
        ct.0
    }
}

impl fmt::Display for CoverageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// How a limit applies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LimitType {
    #[default]
    PerOccurrence,
    Aggregate,
    Statutory,
}

/// Endorsement flags as read from the certificate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Endorsements {
    pub principal_indemnity: bool,
    pub cross_liability: bool,
    pub waiver_of_subrogation: bool,
}

/// A single line of cover on the certificate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CoverageLine {
    #[serde(rename = "type")]
    pub coverage_type: CoverageType,
    /// Limit in whole currency units. Statutory cover may carry no figure.
    #[serde(default)]
    pub limit: Option<u64>,
    #[serde(default)]
    pub limit_type: LimitType,
    #[serde(default)]
    pub excess: Option<u64>,
    #[serde(default)]
    pub endorsements: Endorsements,
    /// State or territory tag, e.g. `NSW`.
    #[serde(default)]
    pub jurisdiction: Option<String>,
}

impl CoverageLine {
    pub fn new(coverage_type: impl Into<CoverageType>, limit: u64) -> Self {
        Self {
            coverage_type: coverage_type.into(),
            limit: Some(limit),
            limit_type: LimitType::default(),
            excess: None,
            endorsements: Endorsements::default(),
            jurisdiction: None,
        }
    }
}

/// Structured fields pulled out of one insurance certificate.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractedPolicyData {
    pub insured_name: Option<String>,
    /// Business-number style identifier of the insured party (ABN or equivalent).
    pub insured_identifier: Option<String>,
    pub insurer_name: Option<String>,
    pub policy_number: Option<String>,
    pub period_start: Option<NaiveDate>,
    pub period_end: Option<NaiveDate>,
    pub coverages: Vec<CoverageLine>,
    /// Overall extraction confidence in `[0, 1]`.
    pub confidence: f64,
    pub field_confidences: BTreeMap<String, f64>,
}

impl ExtractedPolicyData {
    /// First coverage line of the given type, if the certificate has one.
    pub fn coverage(&self, coverage_type: &CoverageType) -> Option<&CoverageLine> {
        self.coverages
            .iter()
            .find(|line| &line.coverage_type == coverage_type)
    }

    /// Extraction confidence clamped into `[0, 1]`; NaN reads as zero.
    pub fn clamped_confidence(&self) -> f64 {
        if self.confidence.is_nan() {
            0.0
        } else {
            self.confidence.clamp(0.0, 1.0)
        }
    }
}

/// File-level facts about the uploaded document, used only for fraud scoring.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DocumentMetadata {
    pub filename: Option<String>,
    /// PDF `Producer` field.
    pub producer: Option<String>,
    /// PDF `Creator` field.
    pub creator: Option<String>,
    pub created_at: Option<DateTime<Utc>>,
    pub modified_at: Option<DateTime<Utc>>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn coverage_type_normalises() {
        assert_eq!(CoverageType::new(" Public Liability "), CoverageType::new("public_liability"));
        assert_eq!(CoverageType::new("workers-compensation").as_str(), "workers_compensation");
    }

    #[test]
    fn coverage_type_label() {
        assert_eq!(CoverageType::new("public_liability").label(), "Public Liability");
        assert_eq!(CoverageType::new("contract_works").label(), "Contract Works");
    }

    #[test]
    fn statutory_cover() {
        assert!(CoverageType::new("workers_compensation").is_statutory());
        assert!(CoverageType::new("WorkCover").is_statutory());
        assert!(!CoverageType::new("public_liability").is_statutory());
    }

    #[test]
    fn coverage_line_json_uses_type_key() {
        let json = r#"{"type": "Public Liability", "limit": 20000000, "jurisdiction": "NSW"}"#;
        let line: CoverageLine = serde_json::from_str(json).unwrap();
        assert_eq!(line.coverage_type.as_str(), "public_liability");
        assert_eq!(line.limit, Some(20_000_000));
        assert_eq!(line.limit_type, LimitType::PerOccurrence);
        assert!(!line.endorsements.principal_indemnity);
    }

    #[test]
    fn partial_extraction_deserialises() {
        let data: ExtractedPolicyData = serde_json::from_str(r#"{"insurer_name": "QBE"}"#).unwrap();
        assert!(data.period_end.is_none());
        assert!(data.coverages.is_empty());
        assert_eq!(data.clamped_confidence(), 0.0);
    }

    #[test]
    fn clamped_confidence_bounds() {
        let mut data = ExtractedPolicyData {
            confidence: 1.4,
            ..Default::default()
        };
        assert_eq!(data.clamped_confidence(), 1.0);
        data.confidence = f64::NAN;
        assert_eq!(data.clamped_confidence(), 0.0);
    }
}
