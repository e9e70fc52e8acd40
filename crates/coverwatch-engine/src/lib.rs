//! Decision engine: requirement evaluation, fraud scoring, verdict reconciliation,
//! and the compliance and exception state machines behind `ComplianceService`.

pub mod compliance;
mod error;
pub mod evaluator;
pub mod exceptions;
pub mod fraud;
pub mod reconcile;
mod service;
mod verify;

pub use compliance::{VerdictPlan, plan_verdict, target_status};
pub use error::{EngineError, ErrorCode};
pub use evaluator::{Evaluation, InsurerAllowList, InsurerRegistry, RequirementEvaluator};
pub use exceptions::{ExceptionRequest, ExceptionTerm, Principal, ReauthAttestation};
pub use fraud::{FraudScorer, SubmissionHistory};
pub use reconcile::{ReconcileInput, reconcile};
pub use service::{
    AssignmentView, ComplianceService, ExceptionOutcome, SubmitOutcome, Submission, SweepReport,
};
pub use verify::{VerificationRequest, Verifier};
