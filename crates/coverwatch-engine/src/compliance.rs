//! Verdict → compliance status, planned as a change set for the store.

use chrono::{DateTime, Utc};
use coverwatch_core::{
    Assignment, ComplianceStatus, Exception, ExceptionStatus, ResolutionType, VerdictRecord,
    VerdictStatus,
};
use coverwatch_store::{AssignmentWrite, ChangeSet, ExceptionWrite};

/// The compliance status a verdict puts its assignment in.
///
/// `review` gates like `fail`: the status is binary safe/unsafe and the newest
/// committed verdict always overwrites whatever was there.
pub fn target_status(status: VerdictStatus) -> ComplianceStatus {
    match status {
        VerdictStatus::Pass => ComplianceStatus::Compliant,
        VerdictStatus::Fail | VerdictStatus::Review => ComplianceStatus::NonCompliant,
    }
}

/// The writes that recording `record` against `assignment` requires.
#[derive(Debug, Clone)]
pub struct VerdictPlan {
    pub changes: ChangeSet,
    /// Active exception that this verdict closes, as it will be stored.
    pub resolved_exception: Option<Exception>,
}

/// Plan the transition for one verdict against the assignment as last read.
///
/// The change set is conditional on `assignment.version`; if another writer
/// commits first the store rejects it and the caller replans from a fresh read.
pub fn plan_verdict(
    record: VerdictRecord,
    assignment: &Assignment,
    open_exception: Option<&Exception>,
    at: DateTime<Utc>,
) -> VerdictPlan {
    let status = target_status(record.verdict.status);
    let mut changes = ChangeSet::new(at);

    changes.assignment = Some(AssignmentWrite {
        key: assignment.key.clone(),
        expected_version: assignment.version,
        status,
        latest_verdict: Some(record.id),
    });

    // A pending request stays for its approver to decide.
    let resolved_exception = match open_exception {
        Some(exc) if status == ComplianceStatus::Compliant && exc.status == ExceptionStatus::Active => {
            let next = Exception {
                status: ExceptionStatus::Resolved,
                resolution_type: Some(ResolutionType::CocUpdated),
                updated_at: at,
                ..exc.clone()
            };
            changes.exceptions.push(ExceptionWrite::Transition {
                expected: ExceptionStatus::Active,
                next: next.clone(),
            });
            Some(next)
        }
        _ => None,
    };

    changes.verdict = Some(record);
    VerdictPlan {
        changes,
        resolved_exception,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use coverwatch_core::{
        AssignmentKey, ExpirationType, FraudSignal, PolicySummary, RiskLevel, VerdictId,
        VerificationVerdict, ExceptionId,
    };

    fn at() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 1, 9, 0, 0).unwrap()
    }

    fn assignment(status: ComplianceStatus) -> Assignment {
        Assignment {
            key: AssignmentKey::new("P1", "S1"),
            status,
            version: 4,
            latest_verdict: None,
            updated_at: at(),
        }
    }

    fn record(status: VerdictStatus) -> VerdictRecord {
        VerdictRecord {
            id: VerdictId(9),
            assignment: AssignmentKey::new("P1", "S1"),
            policy: PolicySummary {
                document_id: "doc-9".into(),
                ..Default::default()
            },
            verdict: VerificationVerdict {
                status,
                checks: Vec::new(),
                deficiencies: Vec::new(),
                confidence_score: 0.9,
                fraud_signal: FraudSignal::clean(),
            },
            recorded_at: at(),
        }
    }

    fn exception(status: ExceptionStatus) -> Exception {
        Exception {
            id: ExceptionId(3),
            assignment: AssignmentKey::new("P1", "S1"),
            status,
            risk_level: RiskLevel::Medium,
            expiration_type: ExpirationType::UntilResolved,
            expires_at: None,
            resolution_type: None,
            reason: "renewal pending".into(),
            requested_by: "pm".into(),
            decided_by: Some("risk".into()),
            created_at: at(),
            updated_at: at(),
        }
    }

    #[test]
    fn status_mapping() {
        assert_eq!(target_status(VerdictStatus::Pass), ComplianceStatus::Compliant);
        assert_eq!(target_status(VerdictStatus::Fail), ComplianceStatus::NonCompliant);
        assert_eq!(target_status(VerdictStatus::Review), ComplianceStatus::NonCompliant);
    }

    #[test]
    fn plan_is_conditional_on_read_version() {
        let plan = plan_verdict(record(VerdictStatus::Fail), &assignment(ComplianceStatus::Compliant), None, at());
        let write = plan.changes.assignment.unwrap();
        assert_eq!(write.expected_version, 4);
        assert_eq!(write.status, ComplianceStatus::NonCompliant);
        assert_eq!(write.latest_verdict, Some(VerdictId(9)));
        assert_eq!(plan.changes.verdict.unwrap().id, VerdictId(9));
        assert!(plan.changes.exceptions.is_empty());
    }

    #[test]
    fn pass_resolves_active_exception() {
        let active = exception(ExceptionStatus::Active);
        let plan = plan_verdict(
            record(VerdictStatus::Pass),
            &assignment(ComplianceStatus::Exception),
            Some(&active),
            at(),
        );
        let resolved = plan.resolved_exception.unwrap();
        assert_eq!(resolved.status, ExceptionStatus::Resolved);
        assert_eq!(resolved.resolution_type, Some(ResolutionType::CocUpdated));
        assert_eq!(
            plan.changes.exceptions,
            [ExceptionWrite::Transition {
                expected: ExceptionStatus::Active,
                next: resolved,
            }]
        );
    }

    #[test]
    fn pass_leaves_pending_exception() {
        let pending = exception(ExceptionStatus::PendingApproval);
        let plan = plan_verdict(
            record(VerdictStatus::Pass),
            &assignment(ComplianceStatus::NonCompliant),
            Some(&pending),
            at(),
        );
        assert!(plan.resolved_exception.is_none());
        assert!(plan.changes.exceptions.is_empty());
    }

    #[test]
    fn failing_verdict_keeps_active_exception() {
        let active = exception(ExceptionStatus::Active);
        let plan = plan_verdict(
            record(VerdictStatus::Review),
            &assignment(ComplianceStatus::Exception),
            Some(&active),
            at(),
        );
        assert!(plan.resolved_exception.is_none());
        assert_eq!(
            plan.changes.assignment.unwrap().status,
            ComplianceStatus::NonCompliant
        );
    }
}
