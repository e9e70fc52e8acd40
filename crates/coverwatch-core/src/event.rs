//! Events the engine hands to the notification collaborator.
//!
//! These are facts, not messages: templating and delivery happen downstream.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::compliance::{AssignmentKey, ExceptionId, ResolutionType, VerdictId};
use crate::verdict::{CheckResult, Deficiency, RiskLevel};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventPriority {
    Normal,
    High,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum NotificationEvent {
    VerificationPassed {
        assignment: AssignmentKey,
        verdict_id: VerdictId,
        document_id: String,
        occurred_at: DateTime<Utc>,
    },
    DeficienciesFound {
        assignment: AssignmentKey,
        verdict_id: VerdictId,
        document_id: String,
        deficiencies: Vec<Deficiency>,
        due_date: NaiveDate,
        occurred_at: DateTime<Utc>,
    },
    FraudAlert {
        assignment: AssignmentKey,
        verdict_id: VerdictId,
        document_id: String,
        priority: EventPriority,
        risk_score: u8,
        risk_level: RiskLevel,
        evidence: Vec<CheckResult>,
        occurred_at: DateTime<Utc>,
    },
    ExceptionActivated {
        assignment: AssignmentKey,
        exception_id: ExceptionId,
        expires_at: Option<DateTime<Utc>>,
        occurred_at: DateTime<Utc>,
    },
    ExceptionResolved {
        assignment: AssignmentKey,
        exception_id: ExceptionId,
        resolution_type: ResolutionType,
        occurred_at: DateTime<Utc>,
    },
    ExceptionExpired {
        assignment: AssignmentKey,
        exception_id: ExceptionId,
        occurred_at: DateTime<Utc>,
    },
}

impl NotificationEvent {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::VerificationPassed { .. } => "verification_passed",
            Self::DeficienciesFound { .. } => "deficiencies_found",
            Self::FraudAlert { .. } => "fraud_alert",
            Self::ExceptionActivated { .. } => "exception_activated",
            Self::ExceptionResolved { .. } => "exception_resolved",
            Self::ExceptionExpired { .. } => "exception_expired",
        }
    }

    pub fn assignment(&self) -> &AssignmentKey {
        match self {
            Self::VerificationPassed { assignment, .. }
            | Self::DeficienciesFound { assignment, .. }
            | Self::FraudAlert { assignment, .. }
            | Self::ExceptionActivated { assignment, .. }
            | Self::ExceptionResolved { assignment, .. }
            | Self::ExceptionExpired { assignment, .. } => assignment,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn event_json_is_tagged() {
        let event = NotificationEvent::ExceptionExpired {
            assignment: AssignmentKey::new("P1", "S1"),
            exception_id: ExceptionId(7),
            occurred_at: Utc.with_ymd_and_hms(2026, 3, 1, 9, 0, 0).unwrap(),
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["event"], "exception_expired");
        assert_eq!(json["exception_id"], 7);
        assert_eq!(json["assignment"]["project_id"], "P1");
        assert_eq!(event.kind(), "exception_expired");
    }

    #[test]
    fn fraud_alert_carries_priority() {
        let event = NotificationEvent::FraudAlert {
            assignment: AssignmentKey::new("P1", "S1"),
            verdict_id: VerdictId(3),
            document_id: "doc-3".into(),
            priority: EventPriority::High,
            risk_score: 95,
            risk_level: RiskLevel::Critical,
            evidence: vec![],
            occurred_at: Utc.with_ymd_and_hms(2026, 3, 1, 9, 0, 0).unwrap(),
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["priority"], "high");
        assert_eq!(json["risk_level"], "critical");
    }
}
