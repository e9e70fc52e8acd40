//! Binds verification and the state machines to a store.
//!
//! Every operation reads, plans a change set, and commits it in one store
//! transaction. Events are returned only for writes that committed.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use coverwatch_core::{
    Assignment, AssignmentKey, CoverageRequirement, DocumentMetadata, EventPriority, Exception,
    ExceptionId, ExceptionStatus, ExtractedPolicyData, NotificationEvent, PolicySummary,
    ProjectFacts, ResolutionType, VerdictRecord, VerdictStatus, validate_requirements,
};
use coverwatch_store::{ComplianceStore, StoreError};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::compliance::plan_verdict;
use crate::error::EngineError;
use crate::exceptions::{self, ExceptionPlan, ExceptionRequest, Principal, ReauthAttestation};
use crate::verify::{VerificationRequest, Verifier};

/// A certificate submitted against one assignment.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Submission {
    pub assignment: AssignmentKey,
    pub document_id: String,
    pub policy: ExtractedPolicyData,
    pub metadata: DocumentMetadata,
    pub requirements: Vec<CoverageRequirement>,
    pub facts: ProjectFacts,
}

#[derive(Debug, Clone, Serialize)]
pub struct SubmitOutcome {
    pub record: VerdictRecord,
    pub assignment: Assignment,
    pub events: Vec<NotificationEvent>,
    /// The document was already fraud-blocked; its stored verdict was returned.
    pub replayed: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct ExceptionOutcome {
    pub exception: Exception,
    /// Assignment after the write, when the transition touched it.
    pub assignment: Option<Assignment>,
    pub events: Vec<NotificationEvent>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct SweepReport {
    pub expired: Vec<ExceptionId>,
    /// Due exceptions another writer closed first.
    pub skipped: Vec<ExceptionId>,
    pub events: Vec<NotificationEvent>,
}

/// Current compliance picture of one assignment.
#[derive(Debug, Clone, Serialize)]
pub struct AssignmentView {
    pub assignment: Assignment,
    pub latest_verdict: Option<VerdictRecord>,
    pub open_exception: Option<Exception>,
}

pub struct ComplianceService<S: ComplianceStore + ?Sized> {
    store: Arc<S>,
    verifier: Arc<Verifier>,
}

impl<S: ComplianceStore + ?Sized> ComplianceService<S> {
    pub fn new(store: Arc<S>, verifier: Arc<Verifier>) -> Self {
        Self { store, verifier }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn verifier(&self) -> &Arc<Verifier> {
        &self.verifier
    }

    /// Idempotent: an existing assignment is returned as stored.
    pub fn register_assignment(&self, key: &AssignmentKey, at: DateTime<Utc>) -> Result<Assignment, EngineError> {
        Ok(self.store.register_assignment(key, at)?)
    }

    pub fn status(&self, key: &AssignmentKey) -> Result<AssignmentView, EngineError> {
        let assignment = self.store.assignment(key)?;
        let latest_verdict = match assignment.latest_verdict {
            Some(id) => self
                .store
                .verdicts_for_assignment(key)?
                .into_iter()
                .find(|r| r.id == id),
            None => None,
        };
        let open_exception = self.store.open_exception(key)?;
        Ok(AssignmentView {
            assignment,
            latest_verdict,
            open_exception,
        })
    }

    /// Verify a submitted certificate and record the verdict.
    pub async fn submit(&self, submission: Submission, as_of: DateTime<Utc>) -> Result<SubmitOutcome, EngineError> {
        validate_requirements(&submission.requirements)?;
        let key = submission.assignment.clone();
        let assignment = self.store.assignment(&key)?;

        // A blocked document stays blocked on its assignment until a manual
        // override elsewhere.
        if let Some(prior) = self.prior_verdict(&key, &submission.document_id)?
            && prior.verdict.is_fraud_blocked()
        {
            warn!(
                document = %submission.document_id,
                verdict = %prior.id,
                "resubmission of fraud-blocked document, returning stored verdict"
            );
            return Ok(SubmitOutcome {
                record: prior,
                assignment,
                events: Vec::new(),
                replayed: true,
            });
        }

        let history = self.history(&submission)?;
        let request = Arc::new(VerificationRequest {
            document_id: submission.document_id,
            policy: submission.policy,
            metadata: submission.metadata,
            requirements: submission.requirements,
            facts: submission.facts,
            history,
            as_of: Some(as_of),
        });
        let verdict = self.verifier.verify_concurrently(Arc::clone(&request)).await?;

        let record = VerdictRecord {
            id: self.store.allocate_verdict_id()?,
            assignment: key,
            policy: PolicySummary::from_policy(request.document_id.clone(), &request.policy),
            verdict,
            recorded_at: as_of,
        };
        let (assignment, resolved) = self.apply_verdict(&record)?;
        let events = self.verdict_events(&record, resolved.as_ref());

        info!(
            assignment = %record.assignment,
            verdict = %record.id,
            status = %record.verdict.status,
            compliance = %assignment.status,
            "verdict recorded"
        );
        Ok(SubmitOutcome {
            record,
            assignment,
            events,
            replayed: false,
        })
    }

    /// Commit a verdict against the current assignment state, replanning from a
    /// fresh read when a concurrent writer gets there first.
    ///
    /// Returns the assignment as committed and any exception the verdict resolved.
    pub fn apply_verdict(&self, record: &VerdictRecord) -> Result<(Assignment, Option<Exception>), EngineError> {
        let attempts = self.verifier.config().verdict_retry_attempts.max(1);
        let mut attempt = 0;
        loop {
            attempt += 1;
            let assignment = self.store.assignment(&record.assignment)?;
            let open = self.store.open_exception(&record.assignment)?;
            let plan = plan_verdict(record.clone(), &assignment, open.as_ref(), record.recorded_at);

            match self.store.commit(plan.changes) {
                Ok(receipt) => {
                    let assignment = receipt.assignment.ok_or_else(|| {
                        EngineError::Store(StoreError::Other(format!(
                            "commit of verdict {} returned no assignment",
                            record.id
                        )))
                    })?;
                    return Ok((assignment, plan.resolved_exception));
                }
                Err(err) if err.is_conflict() && attempt < attempts => {
                    debug!(
                        assignment = %record.assignment,
                        verdict = %record.id,
                        attempt,
                        error = %err,
                        "verdict commit lost a race, retrying"
                    );
                }
                Err(err) => return Err(err.into()),
            }
        }
    }

    // ── Exceptions ──

    pub fn create_exception(
        &self,
        request: &ExceptionRequest,
        requester: &Principal,
        reauth: Option<&ReauthAttestation>,
        at: DateTime<Utc>,
    ) -> Result<ExceptionOutcome, EngineError> {
        let assignment = self.store.assignment(&request.assignment)?;
        let open = self.store.open_exception(&request.assignment)?;
        let id = self.store.allocate_exception_id()?;
        let plan = exceptions::draft(id, request, requester, reauth, &assignment, open.as_ref(), at)?;
        self.commit_exception(plan, at)
    }

    pub fn approve_exception(
        &self,
        id: ExceptionId,
        approver: &Principal,
        at: DateTime<Utc>,
    ) -> Result<ExceptionOutcome, EngineError> {
        let exception = self.store.exception(id)?;
        let assignment = self.store.assignment(&exception.assignment)?;
        let plan = exceptions::approve(&exception, approver, &assignment, at)?;
        self.commit_exception(plan, at)
    }

    pub fn reject_exception(
        &self,
        id: ExceptionId,
        approver: &Principal,
        at: DateTime<Utc>,
    ) -> Result<ExceptionOutcome, EngineError> {
        let exception = self.store.exception(id)?;
        let plan = exceptions::reject(&exception, approver, at)?;
        self.commit_exception(plan, at)
    }

    pub fn resolve_exception(&self, id: ExceptionId, at: DateTime<Utc>) -> Result<ExceptionOutcome, EngineError> {
        let exception = self.store.exception(id)?;
        let assignment = self.store.assignment(&exception.assignment)?;
        let plan = exceptions::resolve(&exception, &assignment, at)?;
        self.commit_exception(plan, at)
    }

    /// Expire every dated exception due at `as_of`. Safe to run repeatedly and
    /// alongside verdict processing: an exception that changed underneath the
    /// sweep is re-read and skipped once it is no longer due.
    pub fn sweep_expired(&self, as_of: DateTime<Utc>) -> Result<SweepReport, EngineError> {
        let mut report = SweepReport::default();
        for due in self.store.due_exceptions(as_of)? {
            match self.expire_one(due.id, as_of)? {
                Some(outcome) => {
                    report.expired.push(outcome.exception.id);
                    report.events.extend(outcome.events);
                }
                None => report.skipped.push(due.id),
            }
        }
        if !report.expired.is_empty() || !report.skipped.is_empty() {
            info!(
                expired = report.expired.len(),
                skipped = report.skipped.len(),
                "expiration sweep finished"
            );
        }
        Ok(report)
    }

    fn expire_one(&self, id: ExceptionId, as_of: DateTime<Utc>) -> Result<Option<ExceptionOutcome>, EngineError> {
        let attempts = self.verifier.config().verdict_retry_attempts.max(1);
        for attempt in 1..=attempts {
            let exception = self.store.exception(id)?;
            if !exception.is_due(as_of) {
                debug!(exception = %id, status = %exception.status, "no longer due, skipping");
                return Ok(None);
            }
            let assignment = self.store.assignment(&exception.assignment)?;
            let plan = exceptions::expire(&exception, &assignment, as_of)?;
            match self.commit_exception(plan, as_of) {
                Ok(outcome) => return Ok(Some(outcome)),
                Err(err) if err.is_retryable() => {
                    debug!(exception = %id, attempt, error = %err, "expiry lost a race");
                }
                Err(err) => return Err(err),
            }
        }
        Ok(None)
    }

    fn commit_exception(&self, plan: ExceptionPlan, at: DateTime<Utc>) -> Result<ExceptionOutcome, EngineError> {
        let receipt = self.store.commit(plan.changes)?;
        let exception = plan.exception;
        info!(
            exception = %exception.id,
            assignment = %exception.assignment,
            status = %exception.status,
            "exception updated"
        );
        let events = exception_events(&exception, at);
        Ok(ExceptionOutcome {
            exception,
            assignment: receipt.assignment,
            events,
        })
    }

    /// Latest verdict for `document_id` recorded against this assignment.
    fn prior_verdict(&self, key: &AssignmentKey, document_id: &str) -> Result<Option<VerdictRecord>, EngineError> {
        match self.store.verdict_for_document(document_id)? {
            Some(record) if record.assignment == *key => Ok(Some(record)),
            None => Ok(None),
            // The name was reused elsewhere since; fall back to this assignment's log.
            Some(_) => Ok(self
                .store
                .verdicts_for_assignment(key)?
                .into_iter()
                .rev()
                .find(|r| r.document_id() == document_id)),
        }
    }

    fn history(&self, submission: &Submission) -> Result<Vec<PolicySummary>, EngineError> {
        let Some(number) = submission
            .policy
            .policy_number
            .as_deref()
            .filter(|n| !n.trim().is_empty())
        else {
            return Ok(Vec::new());
        };
        Ok(self
            .store
            .verdicts_for_policy(number)?
            .into_iter()
            .map(|r| r.policy)
            .filter(|p| p.document_id != submission.document_id)
            .collect())
    }

    fn verdict_events(&self, record: &VerdictRecord, resolved: Option<&Exception>) -> Vec<NotificationEvent> {
        let at = record.recorded_at;
        let assignment = record.assignment.clone();
        let document_id = record.document_id().to_string();
        let mut events = Vec::new();

        match record.verdict.status {
            VerdictStatus::Pass => {
                events.push(NotificationEvent::VerificationPassed {
                    assignment,
                    verdict_id: record.id,
                    document_id,
                    occurred_at: at,
                });
                if let Some(exc) = resolved {
                    events.extend(exception_events(exc, at));
                }
            }
            VerdictStatus::Fail if record.verdict.is_fraud_blocked() => {
                let signal = &record.verdict.fraud_signal;
                events.push(NotificationEvent::FraudAlert {
                    assignment,
                    verdict_id: record.id,
                    document_id,
                    priority: EventPriority::High,
                    risk_score: signal.risk_score,
                    risk_level: signal.risk_level,
                    evidence: signal.evidence_checks.clone(),
                    occurred_at: at,
                });
            }
            VerdictStatus::Fail => {
                let due = at + Duration::days(self.verifier.config().deficiency_due_days);
                events.push(NotificationEvent::DeficienciesFound {
                    assignment,
                    verdict_id: record.id,
                    document_id,
                    deficiencies: record.verdict.deficiencies.clone(),
                    due_date: due.date_naive(),
                    occurred_at: at,
                });
            }
            // Review waits for a human; nothing to announce.
            VerdictStatus::Review => {}
        }
        events
    }
}

fn exception_events(exception: &Exception, at: DateTime<Utc>) -> Vec<NotificationEvent> {
    let assignment = exception.assignment.clone();
    let exception_id = exception.id;
    let event = match exception.status {
        ExceptionStatus::Active => NotificationEvent::ExceptionActivated {
            assignment,
            exception_id,
            expires_at: exception.expires_at,
            occurred_at: at,
        },
        ExceptionStatus::Resolved => NotificationEvent::ExceptionResolved {
            assignment,
            exception_id,
            resolution_type: exception.resolution_type.unwrap_or(ResolutionType::Manual),
            occurred_at: at,
        },
        ExceptionStatus::Expired => NotificationEvent::ExceptionExpired {
            assignment,
            exception_id,
            occurred_at: at,
        },
        ExceptionStatus::PendingApproval | ExceptionStatus::Rejected => return Vec::new(),
    };
    vec![event]
}
