pub mod compliance;
pub mod config;
pub mod event;
pub mod normalize;
pub mod policy;
pub mod requirement;
pub mod verdict;

pub use compliance::{
    Assignment, AssignmentKey, ComplianceStatus, Exception, ExceptionId, ExceptionStatus,
    ExpirationType, PolicySummary, ResolutionType, VerdictId, VerdictRecord,
};
pub use config::{ConfigError, EngineConfig};
pub use event::{EventPriority, NotificationEvent};
pub use normalize::{check_business_number, format_amount, normalize_identifier, normalize_insurer};
pub use policy::{CoverageLine, CoverageType, DocumentMetadata, Endorsements, ExtractedPolicyData, LimitType};
pub use requirement::{CoverageRequirement, ProjectFacts, RequirementError, validate_requirements};
pub use verdict::{
    CheckResult, CheckStatus, Deficiency, DeficiencyKind, FraudSignal, RiskLevel, Severity,
    VerdictStatus, VerificationVerdict,
};
