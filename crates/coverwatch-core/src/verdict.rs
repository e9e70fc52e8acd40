//! Checks, deficiencies, fraud signals, and the verdict that bundles them.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Outcome of one rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CheckStatus {
    Pass,
    Fail,
    Warning,
}

impl CheckStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pass => "pass",
            Self::Fail => "fail",
            Self::Warning => "warning",
        }
    }
}

/// Result of evaluating one rule. Lists of these are append-only and ordered.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckResult {
    pub check_id: String,
    pub description: String,
    pub status: CheckStatus,
    pub detail: String,
}

impl CheckResult {
    pub fn pass(check_id: impl Into<String>, description: impl Into<String>, detail: impl Into<String>) -> Self {
        Self::with_status(check_id, description, CheckStatus::Pass, detail)
    }

    pub fn fail(check_id: impl Into<String>, description: impl Into<String>, detail: impl Into<String>) -> Self {
        Self::with_status(check_id, description, CheckStatus::Fail, detail)
    }

    pub fn warning(check_id: impl Into<String>, description: impl Into<String>, detail: impl Into<String>) -> Self {
        Self::with_status(check_id, description, CheckStatus::Warning, detail)
    }

    fn with_status(
        check_id: impl Into<String>,
        description: impl Into<String>,
        status: CheckStatus,
        detail: impl Into<String>,
    ) -> Self {
        Self {
            check_id: check_id.into(),
            description: description.into(),
            status,
            detail: detail.into(),
        }
    }

    pub fn is_fail(&self) -> bool {
        self.status == CheckStatus::Fail
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Minor,
    Major,
    Critical,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Minor => "minor",
            Self::Major => "major",
            Self::Critical => "critical",
        }
    }
}

/// What kind of requirement gap a deficiency describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeficiencyKind {
    ExpiredPolicy,
    PolicyExpiresBeforeProject,
    IdentityMismatch,
    UnlicensedInsurer,
    MissingCoverage,
    InsufficientLimit,
    ExcessTooHigh,
    MissingEndorsement,
    JurisdictionMismatch,
    FraudDetected,
}

impl DeficiencyKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ExpiredPolicy => "expired_policy",
            Self::PolicyExpiresBeforeProject => "policy_expires_before_project",
            Self::IdentityMismatch => "identity_mismatch",
            Self::UnlicensedInsurer => "unlicensed_insurer",
            Self::MissingCoverage => "missing_coverage",
            Self::InsufficientLimit => "insufficient_limit",
            Self::ExcessTooHigh => "excess_too_high",
            Self::MissingEndorsement => "missing_endorsement",
            Self::JurisdictionMismatch => "jurisdiction_mismatch",
            Self::FraudDetected => "fraud_detected",
        }
    }

    /// Severity every deficiency of this kind carries.
    pub fn severity(&self) -> Severity {
        match self {
            Self::ExpiredPolicy
            | Self::PolicyExpiresBeforeProject
            | Self::IdentityMismatch
            | Self::UnlicensedInsurer
            | Self::MissingCoverage
            | Self::JurisdictionMismatch
            | Self::FraudDetected => Severity::Critical,
            Self::InsufficientLimit | Self::MissingEndorsement => Severity::Major,
            Self::ExcessTooHigh => Severity::Minor,
        }
    }
}

impl fmt::Display for DeficiencyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A structured, severity-tagged requirement gap, derived from one failing check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Deficiency {
    pub kind: DeficiencyKind,
    pub severity: Severity,
    pub description: String,
    pub required_value: String,
    pub actual_value: String,
    /// `check_id` of the failing check this deficiency was derived from.
    pub check_id: String,
}

impl Deficiency {
    pub fn new(
        kind: DeficiencyKind,
        check_id: impl Into<String>,
        description: impl Into<String>,
        required_value: impl Into<String>,
        actual_value: impl Into<String>,
    ) -> Self {
        Self {
            kind,
            severity: kind.severity(),
            description: description.into(),
            required_value: required_value.into(),
            actual_value: actual_value.into(),
            check_id: check_id.into(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RiskLevel {
    Low,
    Medium,
    High,
    Critical,
}

impl RiskLevel {
    /// Threshold banding of a 0-100 risk score.
    pub fn from_score(score: u8) -> Self {
        match score {
            80.. => Self::Critical,
            60..=79 => Self::High,
            40..=59 => Self::Medium,
            _ => Self::Low,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
            Self::Critical => "critical",
        }
    }
}

/// Independent fraud-risk assessment of one document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FraudSignal {
    pub risk_score: u8,
    pub risk_level: RiskLevel,
    /// Hard gate: a blocked document can never pass.
    pub is_blocked: bool,
    pub evidence_checks: Vec<CheckResult>,
    pub recommendation: String,
}

impl FraudSignal {
    /// A signal with nothing firing.
    pub fn clean() -> Self {
        Self {
            risk_score: 0,
            risk_level: RiskLevel::Low,
            is_blocked: false,
            evidence_checks: Vec::new(),
            recommendation: "No fraud indicators detected".to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VerdictStatus {
    Pass,
    Fail,
    Review,
}

impl VerdictStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pass => "pass",
            Self::Fail => "fail",
            Self::Review => "review",
        }
    }
}

impl fmt::Display for VerdictStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Immutable outcome of evaluating one document submission.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VerificationVerdict {
    pub status: VerdictStatus,
    pub checks: Vec<CheckResult>,
    pub deficiencies: Vec<Deficiency>,
    /// Extraction confidence, carried through unchanged.
    pub confidence_score: f64,
    pub fraud_signal: FraudSignal,
}

impl VerificationVerdict {
    pub fn is_fraud_blocked(&self) -> bool {
        self.fraud_signal.is_blocked
    }

    pub fn critical_deficiencies(&self) -> impl Iterator<Item = &Deficiency> {
        self.deficiencies
            .iter()
            .filter(|d| d.severity == Severity::Critical)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn risk_banding() {
        assert_eq!(RiskLevel::from_score(0), RiskLevel::Low);
        assert_eq!(RiskLevel::from_score(39), RiskLevel::Low);
        assert_eq!(RiskLevel::from_score(40), RiskLevel::Medium);
        assert_eq!(RiskLevel::from_score(59), RiskLevel::Medium);
        assert_eq!(RiskLevel::from_score(60), RiskLevel::High);
        assert_eq!(RiskLevel::from_score(79), RiskLevel::High);
        assert_eq!(RiskLevel::from_score(80), RiskLevel::Critical);
        assert_eq!(RiskLevel::from_score(100), RiskLevel::Critical);
    }

    #[test]
    fn deficiency_takes_kind_severity() {
        let d = Deficiency::new(
            DeficiencyKind::ExcessTooHigh,
            "excess_public_liability",
            "Excess too high",
            "$10,000",
            "$25,000",
        );
        assert_eq!(d.severity, Severity::Minor);
        assert_eq!(
            DeficiencyKind::InsufficientLimit.severity(),
            Severity::Major
        );
        assert_eq!(DeficiencyKind::FraudDetected.severity(), Severity::Critical);
    }

    #[test]
    fn verdict_status_serialises_snake_case() {
        assert_eq!(serde_json::to_string(&VerdictStatus::Review).unwrap(), "\"review\"");
        assert_eq!(
            serde_json::to_string(&DeficiencyKind::PolicyExpiresBeforeProject).unwrap(),
            "\"policy_expires_before_project\""
        );
    }
}
