//! Exception lifecycle: draft, approve, reject, resolve, expire.
//!
//! Each transition is a pure function from the stored exception (and the
//! assignment as read) to the next exception plus the change set that
//! persists it. Transitions are keyed on the expected prior status so a
//! concurrent writer turns into a store conflict instead of a lost update.

use chrono::{DateTime, Duration, Utc};
use coverwatch_core::{
    Assignment, AssignmentKey, ComplianceStatus, Exception, ExceptionId, ExceptionStatus,
    ExpirationType, ResolutionType, RiskLevel,
};
use coverwatch_store::{AssignmentWrite, ChangeSet, ExceptionWrite};
use serde::{Deserialize, Serialize};

use crate::error::EngineError;

/// How long a re-authentication stays valid for a permanent waiver.
pub const REAUTH_WINDOW_MINUTES: i64 = 15;

/// Who is acting on an exception.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Principal {
    pub id: String,
    /// Creation skips `pending_approval` for principals holding this.
    #[serde(default)]
    pub can_auto_approve: bool,
}

impl Principal {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            can_auto_approve: false,
        }
    }

    pub fn with_auto_approve(mut self) -> Self {
        self.can_auto_approve = true;
        self
    }
}

/// Proof from the external authentication step that `principal_id` just
/// re-entered credentials.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReauthAttestation {
    pub principal_id: String,
    pub verified_at: DateTime<Utc>,
}

impl ReauthAttestation {
    fn covers(&self, principal: &Principal, at: DateTime<Utc>) -> bool {
        self.principal_id == principal.id
            && self.verified_at <= at
            && at - self.verified_at <= Duration::minutes(REAUTH_WINDOW_MINUTES)
    }
}

/// Requested lifetime of a waiver.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ExceptionTerm {
    UntilResolved,
    FixedDuration { days: u32 },
    SpecificDate { until: DateTime<Utc> },
    Permanent,
}

impl ExceptionTerm {
    pub fn expiration_type(&self) -> ExpirationType {
        match self {
            Self::UntilResolved => ExpirationType::UntilResolved,
            Self::FixedDuration { .. } => ExpirationType::FixedDuration,
            Self::SpecificDate { .. } => ExpirationType::SpecificDate,
            Self::Permanent => ExpirationType::Permanent,
        }
    }

    /// Expiry instant for a waiver created at `created_at`.
    ///
    /// Fails when a fixed duration runs past the representable calendar.
    pub fn expires_at(&self, created_at: DateTime<Utc>) -> Result<Option<DateTime<Utc>>, EngineError> {
        match *self {
            Self::FixedDuration { days } => Duration::try_days(i64::from(days))
                .and_then(|span| created_at.checked_add_signed(span))
                .map(Some)
                .ok_or_else(|| EngineError::Validation(format!("fixed duration of {days} days is out of range"))),
            Self::SpecificDate { until } => Ok(Some(until)),
            Self::UntilResolved | Self::Permanent => Ok(None),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExceptionRequest {
    pub assignment: AssignmentKey,
    pub risk_level: RiskLevel,
    pub term: ExceptionTerm,
    pub reason: String,
}

/// A planned exception transition.
#[derive(Debug, Clone)]
pub struct ExceptionPlan {
    pub exception: Exception,
    pub changes: ChangeSet,
}

/// Validate a request and build the new exception.
///
/// `open_exception` is the assignment's current pending or active exception.
pub fn draft(
    id: ExceptionId,
    request: &ExceptionRequest,
    requester: &Principal,
    reauth: Option<&ReauthAttestation>,
    assignment: &Assignment,
    open_exception: Option<&Exception>,
    at: DateTime<Utc>,
) -> Result<ExceptionPlan, EngineError> {
    if request.assignment != assignment.key {
        return Err(EngineError::Validation(format!(
            "request is for {} but assignment {} was read",
            request.assignment, assignment.key
        )));
    }
    if request.reason.trim().is_empty() {
        return Err(EngineError::Validation("exception reason is required".into()));
    }
    if assignment.status != ComplianceStatus::NonCompliant {
        return Err(EngineError::Validation(format!(
            "assignment {} is {}, exceptions waive non_compliant only",
            assignment.key, assignment.status
        )));
    }
    if let Some(open) = open_exception {
        return Err(EngineError::Conflict(format!(
            "assignment {} already has {} exception {}",
            assignment.key, open.status, open.id
        )));
    }
    match request.term {
        ExceptionTerm::FixedDuration { days: 0 } => {
            return Err(EngineError::Validation("fixed duration must be at least one day".into()));
        }
        ExceptionTerm::SpecificDate { until } if until <= at => {
            return Err(EngineError::Validation(format!(
                "expiry {until} is not in the future"
            )));
        }
        ExceptionTerm::Permanent if !reauth.is_some_and(|r| r.covers(requester, at)) => {
            return Err(EngineError::ReauthenticationRequired);
        }
        _ => {}
    }

    let expires_at = request.term.expires_at(at)?;
    let auto = requester.can_auto_approve;
    let exception = Exception {
        id,
        assignment: assignment.key.clone(),
        status: if auto {
            ExceptionStatus::Active
        } else {
            ExceptionStatus::PendingApproval
        },
        risk_level: request.risk_level,
        expiration_type: request.term.expiration_type(),
        expires_at,
        resolution_type: None,
        reason: request.reason.trim().to_string(),
        requested_by: requester.id.clone(),
        decided_by: auto.then(|| requester.id.clone()),
        created_at: at,
        updated_at: at,
    };

    let mut changes = ChangeSet::new(at);
    changes.exceptions.push(ExceptionWrite::Insert(exception.clone()));
    if auto {
        changes.assignment = Some(assignment_write(assignment, ComplianceStatus::Exception));
    }
    Ok(ExceptionPlan { exception, changes })
}

/// `pending_approval → active`; the assignment moves to `exception`.
pub fn approve(
    exception: &Exception,
    approver: &Principal,
    assignment: &Assignment,
    at: DateTime<Utc>,
) -> Result<ExceptionPlan, EngineError> {
    require(exception, ExceptionStatus::PendingApproval, ExceptionStatus::Active)?;
    if assignment.status != ComplianceStatus::NonCompliant {
        return Err(EngineError::Conflict(format!(
            "assignment {} became {} while exception {} was pending",
            assignment.key, assignment.status, exception.id
        )));
    }
    // A dated waiver counts from approval, not from the request.
    let expires_at = match (exception.expiration_type, exception.expires_at) {
        (ExpirationType::FixedDuration, Some(end)) => Some(
            at.checked_add_signed(end - exception.created_at)
                .ok_or_else(|| EngineError::Validation(format!("exception {} expiry is out of range", exception.id)))?,
        ),
        _ => exception.expires_at,
    };
    if exception.expiration_type == ExpirationType::SpecificDate
        && expires_at.is_some_and(|end| end <= at)
    {
        return Err(EngineError::Validation(format!(
            "exception {} expired before it was approved",
            exception.id
        )));
    }

    let next = Exception {
        status: ExceptionStatus::Active,
        expires_at,
        decided_by: Some(approver.id.clone()),
        updated_at: at,
        ..exception.clone()
    };
    let mut changes = transition(ExceptionStatus::PendingApproval, &next, at);
    changes.assignment = Some(assignment_write(assignment, ComplianceStatus::Exception));
    Ok(ExceptionPlan {
        exception: next,
        changes,
    })
}

/// `pending_approval → rejected`; the assignment is left as it is.
pub fn reject(exception: &Exception, approver: &Principal, at: DateTime<Utc>) -> Result<ExceptionPlan, EngineError> {
    require(exception, ExceptionStatus::PendingApproval, ExceptionStatus::Rejected)?;
    let next = Exception {
        status: ExceptionStatus::Rejected,
        decided_by: Some(approver.id.clone()),
        updated_at: at,
        ..exception.clone()
    };
    Ok(ExceptionPlan {
        changes: transition(ExceptionStatus::PendingApproval, &next, at),
        exception: next,
    })
}

/// Manual close of an active waiver; the assignment reverts to `non_compliant`
/// if it is still held in `exception`.
pub fn resolve(
    exception: &Exception,
    assignment: &Assignment,
    at: DateTime<Utc>,
) -> Result<ExceptionPlan, EngineError> {
    close(exception, assignment, ExceptionStatus::Resolved, Some(ResolutionType::Manual), at)
}

/// `active → expired` for a dated waiver past its expiry.
pub fn expire(exception: &Exception, assignment: &Assignment, at: DateTime<Utc>) -> Result<ExceptionPlan, EngineError> {
    if exception.status == ExceptionStatus::Active && !exception.is_due(at) {
        return Err(EngineError::Validation(format!(
            "exception {} is not due to expire at {at}",
            exception.id
        )));
    }
    close(exception, assignment, ExceptionStatus::Expired, None, at)
}

fn close(
    exception: &Exception,
    assignment: &Assignment,
    to: ExceptionStatus,
    resolution_type: Option<ResolutionType>,
    at: DateTime<Utc>,
) -> Result<ExceptionPlan, EngineError> {
    require(exception, ExceptionStatus::Active, to)?;
    let next = Exception {
        status: to,
        resolution_type,
        updated_at: at,
        ..exception.clone()
    };
    let mut changes = transition(ExceptionStatus::Active, &next, at);
    // A newer compliant verdict has already superseded the waiver.
    if assignment.status == ComplianceStatus::Exception {
        changes.assignment = Some(assignment_write(assignment, ComplianceStatus::NonCompliant));
    }
    Ok(ExceptionPlan {
        exception: next,
        changes,
    })
}

fn require(exception: &Exception, from: ExceptionStatus, to: ExceptionStatus) -> Result<(), EngineError> {
    if exception.status == from {
        Ok(())
    } else {
        Err(EngineError::InvalidTransition {
            from: exception.status,
            to,
        })
    }
}

fn transition(expected: ExceptionStatus, next: &Exception, at: DateTime<Utc>) -> ChangeSet {
    let mut changes = ChangeSet::new(at);
    changes.exceptions.push(ExceptionWrite::Transition {
        expected,
        next: next.clone(),
    });
    changes
}

fn assignment_write(assignment: &Assignment, status: ComplianceStatus) -> AssignmentWrite {
    AssignmentWrite {
        key: assignment.key.clone(),
        expected_version: assignment.version,
        status,
        latest_verdict: None,
    }
}
