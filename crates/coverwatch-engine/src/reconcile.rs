//! Merge requirement evaluation and fraud signal into one verdict.
//!
//! Precedence is an ordered rule table: the first rule whose condition holds
//! decides the status and may append to the merged check and deficiency lists.
//! New overrides are added by inserting a row at the right position.

use coverwatch_core::{
    CheckResult, Deficiency, DeficiencyKind, FraudSignal, RiskLevel, VerdictStatus,
    VerificationVerdict,
};
use tracing::debug;

use crate::evaluator::Evaluation;

/// Everything the rules look at.
#[derive(Debug, Clone, Copy)]
pub struct ReconcileInput<'a> {
    pub evaluation: &'a Evaluation,
    pub fraud: &'a FraudSignal,
    /// Extraction confidence as supplied, carried into the verdict unchanged.
    pub confidence: f64,
    pub review_threshold: f64,
}

impl ReconcileInput<'_> {
    fn low_confidence(&self) -> bool {
        self.confidence.is_nan() || self.confidence.clamp(0.0, 1.0) < self.review_threshold
    }
}

struct Rule {
    name: &'static str,
    applies: fn(&ReconcileInput<'_>) -> bool,
    apply: fn(&ReconcileInput<'_>, &mut Vec<CheckResult>, &mut Vec<Deficiency>) -> VerdictStatus,
}

const RULES: &[Rule] = &[
    Rule {
        name: "fraud_block",
        applies: |input| input.fraud.is_blocked,
        apply: |input, checks, deficiencies| {
            checks.push(CheckResult::fail(
                "fraud_screening",
                "Document passes fraud screening",
                format!(
                    "risk score {} ({}): {}",
                    input.fraud.risk_score,
                    input.fraud.risk_level.as_str(),
                    input.fraud.recommendation
                ),
            ));
            checks.extend(input.fraud.evidence_checks.iter().cloned());
            deficiencies.push(Deficiency::new(
                DeficiencyKind::FraudDetected,
                "fraud_screening",
                "Document flagged as likely fraudulent",
                "Authentic certificate",
                format!("risk score {}", input.fraud.risk_score),
            ));
            VerdictStatus::Fail
        },
    },
    Rule {
        name: "requirements_failed",
        applies: |input| input.evaluation.status == VerdictStatus::Fail,
        apply: |_, _, _| VerdictStatus::Fail,
    },
    Rule {
        name: "fraud_high",
        applies: |input| {
            input.fraud.risk_level == RiskLevel::High
                && input.evaluation.status == VerdictStatus::Pass
        },
        apply: |input, checks, _| {
            checks.push(CheckResult::warning(
                "fraud_risk_warning",
                "Elevated fraud risk",
                format!(
                    "risk score {}: {}",
                    input.fraud.risk_score, input.fraud.recommendation
                ),
            ));
            VerdictStatus::Review
        },
    },
    Rule {
        name: "needs_review",
        applies: |input| input.evaluation.status == VerdictStatus::Review || input.low_confidence(),
        apply: |input, checks, _| {
            if input.low_confidence() {
                checks.push(CheckResult::warning(
                    "extraction_confidence",
                    "Extraction confidence",
                    format!(
                        "confidence {:.2} below threshold {:.2}",
                        input.confidence, input.review_threshold
                    ),
                ));
            }
            VerdictStatus::Review
        },
    },
    Rule {
        name: "pass",
        applies: |_| true,
        apply: |_, _, _| VerdictStatus::Pass,
    },
];

/// Apply the first matching rule and assemble the verdict.
pub fn reconcile(input: &ReconcileInput<'_>) -> VerificationVerdict {
    let mut checks = input.evaluation.checks.clone();
    let mut deficiencies = input.evaluation.deficiencies.clone();

    let mut status = VerdictStatus::Pass;
    for rule in RULES {
        if (rule.applies)(input) {
            status = (rule.apply)(input, &mut checks, &mut deficiencies);
            debug!(rule = rule.name, status = %status, "verdict reconciled");
            break;
        }
    }

    VerificationVerdict {
        status,
        checks,
        deficiencies,
        confidence_score: input.confidence,
        fraud_signal: input.fraud.clone(),
    }
}

/// Rule names in precedence order.
pub fn rule_order() -> impl Iterator<Item = &'static str> {
    RULES.iter().map(|r| r.name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use coverwatch_core::{CheckStatus, Severity};

    fn evaluation(status: VerdictStatus) -> Evaluation {
        let checks = match status {
            VerdictStatus::Pass => vec![CheckResult::pass("policy_validity", "Policy is current", "")],
            VerdictStatus::Review => vec![CheckResult::warning("policy_validity", "Policy is current", "soon")],
            VerdictStatus::Fail => vec![CheckResult::fail("policy_validity", "Policy is current", "expired")],
        };
        let deficiencies = match status {
            VerdictStatus::Fail => vec![Deficiency::new(
                DeficiencyKind::ExpiredPolicy,
                "policy_validity",
                "Policy is current",
                "",
                "",
            )],
            _ => Vec::new(),
        };
        Evaluation {
            checks,
            deficiencies,
            status,
        }
    }

    fn fraud(score: u8) -> FraudSignal {
        if score == 0 {
            return FraudSignal::clean();
        }
        let level = RiskLevel::from_score(score);
        FraudSignal {
            risk_score: score,
            risk_level: level,
            is_blocked: level == RiskLevel::Critical,
            evidence_checks: vec![CheckResult::fail("fraud_software", "fingerprint", "photoshop")],
            recommendation: "check".into(),
        }
    }

    fn run(status: VerdictStatus, score: u8, confidence: f64) -> VerificationVerdict {
        let eval = evaluation(status);
        let signal = fraud(score);
        reconcile(&ReconcileInput {
            evaluation: &eval,
            fraud: &signal,
            confidence,
            review_threshold: 0.70,
        })
    }

    #[test]
    fn rules_in_precedence_order() {
        assert_eq!(
            rule_order().collect::<Vec<_>>(),
            ["fraud_block", "requirements_failed", "fraud_high", "needs_review", "pass"]
        );
    }

    #[test]
    fn clean_pass() {
        let v = run(VerdictStatus::Pass, 0, 0.95);
        assert_eq!(v.status, VerdictStatus::Pass);
        assert_eq!(v.checks.len(), 1);
        assert_eq!(v.confidence_score, 0.95);
    }

    #[test]
    fn fraud_block_overrides_pass() {
        let v = run(VerdictStatus::Pass, 85, 0.95);
        assert_eq!(v.status, VerdictStatus::Fail);
        let ids: Vec<_> = v.checks.iter().map(|c| c.check_id.as_str()).collect();
        assert_eq!(ids, ["policy_validity", "fraud_screening", "fraud_software"]);
        assert_eq!(v.deficiencies.len(), 1);
        assert_eq!(v.deficiencies[0].kind, DeficiencyKind::FraudDetected);
        assert_eq!(v.deficiencies[0].severity, Severity::Critical);
        assert_eq!(v.deficiencies[0].check_id, "fraud_screening");
    }

    #[test]
    fn fraud_block_keeps_local_deficiencies() {
        let v = run(VerdictStatus::Fail, 95, 0.95);
        let kinds: Vec<_> = v.deficiencies.iter().map(|d| d.kind).collect();
        assert_eq!(kinds, [DeficiencyKind::ExpiredPolicy, DeficiencyKind::FraudDetected]);
    }

    #[test]
    fn local_fail_wins_over_high_risk() {
        let v = run(VerdictStatus::Fail, 65, 0.95);
        assert_eq!(v.status, VerdictStatus::Fail);
        assert!(v.checks.iter().all(|c| c.check_id != "fraud_risk_warning"));
    }

    #[test]
    fn high_risk_downgrades_pass_to_review() {
        let v = run(VerdictStatus::Pass, 65, 0.95);
        assert_eq!(v.status, VerdictStatus::Review);
        let warning = v.checks.last().unwrap();
        assert_eq!(warning.check_id, "fraud_risk_warning");
        assert_eq!(warning.status, CheckStatus::Warning);
        assert!(v.deficiencies.is_empty());
    }

    #[test]
    fn high_risk_on_review_stays_review_without_warning() {
        let v = run(VerdictStatus::Review, 65, 0.95);
        assert_eq!(v.status, VerdictStatus::Review);
        assert!(v.checks.iter().all(|c| c.check_id != "fraud_risk_warning"));
    }

    #[test]
    fn low_confidence_forces_review() {
        let v = run(VerdictStatus::Pass, 0, 0.55);
        assert_eq!(v.status, VerdictStatus::Review);
        assert_eq!(v.checks.last().unwrap().check_id, "extraction_confidence");
        // Carried through, not blended.
        assert_eq!(v.confidence_score, 0.55);
    }

    #[test]
    fn high_risk_and_low_confidence_emit_fraud_warning_only() {
        let v = run(VerdictStatus::Pass, 70, 0.40);
        assert_eq!(v.status, VerdictStatus::Review);
        assert_eq!(v.checks.last().unwrap().check_id, "fraud_risk_warning");
    }

    #[test]
    fn threshold_is_inclusive() {
        assert_eq!(run(VerdictStatus::Pass, 0, 0.70).status, VerdictStatus::Pass);
        assert_eq!(run(VerdictStatus::Pass, 0, f64::NAN).status, VerdictStatus::Review);
    }

    #[test]
    fn medium_risk_is_advisory_only() {
        let v = run(VerdictStatus::Pass, 45, 0.95);
        assert_eq!(v.status, VerdictStatus::Pass);
        assert_eq!(v.fraud_signal.risk_level, RiskLevel::Medium);
    }
}
