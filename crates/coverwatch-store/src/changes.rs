//! The persistence contract: reads plus one all-or-nothing commit per change set.

use chrono::{DateTime, Utc};
use coverwatch_core::{
    Assignment, AssignmentKey, ComplianceStatus, Exception, ExceptionId, ExceptionStatus,
    VerdictId, VerdictRecord,
};

use crate::StoreError;

/// Conditional update of an assignment's compliance status.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssignmentWrite {
    pub key: AssignmentKey,
    /// Version read before planning; a mismatch fails the whole change set.
    pub expected_version: u64,
    pub status: ComplianceStatus,
    /// `None` keeps the current pointer.
    pub latest_verdict: Option<VerdictId>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExceptionWrite {
    Insert(Exception),
    /// Replace the stored exception only if it is still in `expected`.
    Transition {
        expected: ExceptionStatus,
        next: Exception,
    },
}

impl ExceptionWrite {
    pub fn exception(&self) -> &Exception {
        match self {
            Self::Insert(exc) => exc,
            Self::Transition { next, .. } => next,
        }
    }
}

/// Everything one logical operation writes. Applied atomically by [`ComplianceStore::commit`].
#[derive(Debug, Clone, PartialEq)]
pub struct ChangeSet {
    pub assignment: Option<AssignmentWrite>,
    pub verdict: Option<VerdictRecord>,
    pub exceptions: Vec<ExceptionWrite>,
    pub at: DateTime<Utc>,
}

impl ChangeSet {
    pub fn new(at: DateTime<Utc>) -> Self {
        Self {
            assignment: None,
            verdict: None,
            exceptions: Vec::new(),
            at,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.assignment.is_none() && self.verdict.is_none() && self.exceptions.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CommitReceipt {
    /// Assignment after the write, when the change set touched one.
    pub assignment: Option<Assignment>,
}

/// Durable compliance state per (project, subcontractor) pair.
///
/// Implementations must apply [`commit`](Self::commit) all-or-nothing and
/// check every precondition (assignment version, exception prior status,
/// one open exception per assignment) inside the same critical section or
/// transaction as the writes.
pub trait ComplianceStore: Send + Sync {
    /// Create the assignment in `pending` if it does not exist yet.
    fn register_assignment(
        &self,
        key: &AssignmentKey,
        at: DateTime<Utc>,
    ) -> Result<Assignment, StoreError>;

    fn assignment(&self, key: &AssignmentKey) -> Result<Assignment, StoreError>;

    fn exception(&self, id: ExceptionId) -> Result<Exception, StoreError>;

    /// The pending or active exception of an assignment, if any.
    fn open_exception(&self, key: &AssignmentKey) -> Result<Option<Exception>, StoreError>;

    fn exceptions_for_assignment(&self, key: &AssignmentKey) -> Result<Vec<Exception>, StoreError>;

    /// Active dated exceptions whose expiry has passed at `as_of`.
    fn due_exceptions(&self, as_of: DateTime<Utc>) -> Result<Vec<Exception>, StoreError>;

    /// Most recent verdict recorded for a document.
    fn verdict_for_document(&self, document_id: &str) -> Result<Option<VerdictRecord>, StoreError>;

    /// Verdict log of an assignment, oldest first.
    fn verdicts_for_assignment(&self, key: &AssignmentKey) -> Result<Vec<VerdictRecord>, StoreError>;

    /// Every recorded verdict for certificates carrying this policy number.
    fn verdicts_for_policy(&self, policy_number: &str) -> Result<Vec<VerdictRecord>, StoreError>;

    fn allocate_verdict_id(&self) -> Result<VerdictId, StoreError>;

    fn allocate_exception_id(&self) -> Result<ExceptionId, StoreError>;

    fn commit(&self, changes: ChangeSet) -> Result<CommitReceipt, StoreError>;
}
