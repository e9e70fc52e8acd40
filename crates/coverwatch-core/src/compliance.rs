//! Durable compliance state of a (project, subcontractor) pairing and its exceptions.

use std::fmt;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::policy::ExtractedPolicyData;
use crate::verdict::{RiskLevel, VerificationVerdict};

/// Identifies one subcontractor on one project.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct AssignmentKey {
    pub project_id: String,
    pub subcontractor_id: String,
}

impl AssignmentKey {
    pub fn new(project_id: impl Into<String>, subcontractor_id: impl Into<String>) -> Self {
        Self {
            project_id: project_id.into(),
            subcontractor_id: subcontractor_id.into(),
        }
    }
}

impl fmt::Display for AssignmentKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.project_id, self.subcontractor_id)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ComplianceStatus {
    Pending,
    Compliant,
    NonCompliant,
    Exception,
}

impl ComplianceStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Compliant => "compliant",
            Self::NonCompliant => "non_compliant",
            Self::Exception => "exception",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(Self::Pending),
            "compliant" => Some(Self::Compliant),
            "non_compliant" => Some(Self::NonCompliant),
            "exception" => Some(Self::Exception),
            _ => None,
        }
    }
}

impl fmt::Display for ComplianceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Persisted compliance record. `version` increments on every committed write
/// and defines the commit order between concurrent writers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Assignment {
    pub key: AssignmentKey,
    pub status: ComplianceStatus,
    pub version: u64,
    pub latest_verdict: Option<VerdictId>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct VerdictId(pub u64);

impl fmt::Display for VerdictId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "V-{}", self.0)
    }
}

/// The identifying facts of a judged certificate, kept for duplicate detection.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct PolicySummary {
    pub document_id: String,
    pub policy_number: Option<String>,
    pub insured_identifier: Option<String>,
    pub period_start: Option<NaiveDate>,
    pub period_end: Option<NaiveDate>,
}

impl PolicySummary {
    pub fn from_policy(document_id: impl Into<String>, policy: &ExtractedPolicyData) -> Self {
        Self {
            document_id: document_id.into(),
            policy_number: policy.policy_number.clone(),
            insured_identifier: policy.insured_identifier.clone(),
            period_start: policy.period_start,
            period_end: policy.period_end,
        }
    }
}

/// A verdict as appended to the verdict log, tied to the document it judged.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VerdictRecord {
    pub id: VerdictId,
    pub assignment: AssignmentKey,
    pub policy: PolicySummary,
    pub verdict: VerificationVerdict,
    pub recorded_at: DateTime<Utc>,
}

impl VerdictRecord {
    pub fn document_id(&self) -> &str {
        &self.policy.document_id
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ExceptionId(pub u64);

impl fmt::Display for ExceptionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "EX-{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExceptionStatus {
    PendingApproval,
    Active,
    Rejected,
    Resolved,
    Expired,
}

impl ExceptionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::PendingApproval => "pending_approval",
            Self::Active => "active",
            Self::Rejected => "rejected",
            Self::Resolved => "resolved",
            Self::Expired => "expired",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending_approval" => Some(Self::PendingApproval),
            "active" => Some(Self::Active),
            "rejected" => Some(Self::Rejected),
            "resolved" => Some(Self::Resolved),
            "expired" => Some(Self::Expired),
            _ => None,
        }
    }

    /// Pending or active: at most one open exception per assignment.
    pub fn is_open(&self) -> bool {
        matches!(self, Self::PendingApproval | Self::Active)
    }
}

impl fmt::Display for ExceptionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExpirationType {
    UntilResolved,
    FixedDuration,
    SpecificDate,
    Permanent,
}

impl ExpirationType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::UntilResolved => "until_resolved",
            Self::FixedDuration => "fixed_duration",
            Self::SpecificDate => "specific_date",
            Self::Permanent => "permanent",
        }
    }

    /// Only dated exceptions are picked up by the expiration sweep.
    pub fn can_expire(&self) -> bool {
        matches!(self, Self::FixedDuration | Self::SpecificDate)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResolutionType {
    /// A newer compliant certificate superseded the waiver.
    CocUpdated,
    /// Closed by a reviewer.
    Manual,
}

/// A manually authorised waiver of a non-compliant status.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Exception {
    pub id: ExceptionId,
    pub assignment: AssignmentKey,
    pub status: ExceptionStatus,
    pub risk_level: RiskLevel,
    pub expiration_type: ExpirationType,
    pub expires_at: Option<DateTime<Utc>>,
    pub resolution_type: Option<ResolutionType>,
    pub reason: String,
    pub requested_by: String,
    pub decided_by: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Exception {
    /// Whether the sweep should expire this exception at `as_of`.
    pub fn is_due(&self, as_of: DateTime<Utc>) -> bool {
        self.status == ExceptionStatus::Active
            && self.expiration_type.can_expire()
            && self.expires_at.is_some_and(|at| at <= as_of)
    }
}
