//! Vertical card display for verdicts, assignments, and exceptions.
//!
//! Everything renders into a `String` so the layout can be tested; callers
//! print the result.

use std::fmt::Write;

use coverwatch_core::{
    Assignment, CheckResult, CheckStatus, Deficiency, Exception, VerdictRecord,
    VerificationVerdict,
};
use coverwatch_engine::{AssignmentView, SweepReport};

const MAX_LIST_ITEMS: usize = 25;

// ── Public API ──

/// A verdict as a card: headline, checks grouped by outcome, deficiencies, fraud.
pub fn verdict_card(title: &str, verdict: &VerificationVerdict) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "=== {title} ===");
    let _ = writeln!(out, "{}", headline(verdict));
    out.push('\n');

    section(&mut out, "Failed", failing(&verdict.checks, CheckStatus::Fail));
    section(&mut out, "Warnings", failing(&verdict.checks, CheckStatus::Warning));
    section(&mut out, "Passed", failing(&verdict.checks, CheckStatus::Pass));

    if !verdict.deficiencies.is_empty() {
        let _ = writeln!(out, "Deficiencies");
        for d in verdict.deficiencies.iter().take(MAX_LIST_ITEMS) {
            out.push_str(&deficiency_line(d));
        }
        more(&mut out, verdict.deficiencies.len());
        out.push('\n');
    }

    let signal = &verdict.fraud_signal;
    let _ = writeln!(out, "Fraud Screening");
    field(&mut out, "risk_score", signal.risk_score);
    field(&mut out, "risk_level", signal.risk_level.as_str());
    field(&mut out, "blocked", if signal.is_blocked { "yes" } else { "no" });
    field(&mut out, "recommendation", &signal.recommendation);
    out
}

pub fn record_card(record: &VerdictRecord) -> String {
    let title = format!("{} {} ({})", record.id, record.assignment, record.document_id());
    let mut out = verdict_card(&title, &record.verdict);
    out.push('\n');
    let _ = writeln!(out, "Record");
    field(&mut out, "recorded_at", record.recorded_at.to_rfc3339());
    if let Some(number) = &record.policy.policy_number {
        field(&mut out, "policy_number", number);
    }
    out
}

pub fn assignment_card(view: &AssignmentView) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "=== {} ===", view.assignment.key);
    assignment_fields(&mut out, &view.assignment);
    out.push('\n');

    if let Some(record) = &view.latest_verdict {
        let _ = writeln!(out, "Latest Verdict");
        field(&mut out, "verdict", record.id);
        field(&mut out, "document", record.document_id());
        field(&mut out, "status", record.verdict.status);
        field(&mut out, "deficiencies", record.verdict.deficiencies.len());
        out.push('\n');
    }

    if let Some(exc) = &view.open_exception {
        let _ = writeln!(out, "Open Exception");
        exception_fields(&mut out, exc);
    }
    out
}

pub fn exception_card(exception: &Exception, assignment: Option<&Assignment>) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "=== {} {} ===", exception.id, exception.assignment);
    exception_fields(&mut out, exception);
    if let Some(assignment) = assignment {
        out.push('\n');
        let _ = writeln!(out, "Assignment");
        assignment_fields(&mut out, assignment);
    }
    out
}

pub fn sweep_summary(report: &SweepReport) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "Expiration Sweep");
    field(&mut out, "expired", report.expired.len());
    field(&mut out, "skipped", report.skipped.len());
    for id in &report.expired {
        let _ = writeln!(out, "    expired {id}");
    }
    out
}

// ── Section rendering ──

fn headline(verdict: &VerificationVerdict) -> String {
    let failed = verdict.checks.iter().filter(|c| c.is_fail()).count();
    format!(
        "{} ({} checks, {} failed, {} deficiencies, confidence {:.2})",
        verdict.status.as_str().to_uppercase(),
        verdict.checks.len(),
        failed,
        verdict.deficiencies.len(),
        verdict.confidence_score
    )
}

fn failing(checks: &[CheckResult], status: CheckStatus) -> Vec<&CheckResult> {
    checks.iter().filter(|c| c.status == status).collect()
}

fn section(out: &mut String, header: &str, checks: Vec<&CheckResult>) {
    if checks.is_empty() {
        return;
    }
    let _ = writeln!(out, "{header}");
    for check in checks.iter().take(MAX_LIST_ITEMS) {
        if check.detail.is_empty() {
            let _ = writeln!(out, "  {:<26} {}", check.check_id, check.description);
        } else {
            let _ = writeln!(
                out,
                "  {:<26} {}: {}",
                check.check_id, check.description, check.detail
            );
        }
    }
    more(out, checks.len());
    out.push('\n');
}

fn deficiency_line(d: &Deficiency) -> String {
    format!(
        "  {:<26} [{}] required {}, found {}\n",
        d.kind.as_str(),
        d.severity.as_str(),
        d.required_value,
        d.actual_value
    )
}

fn assignment_fields(out: &mut String, assignment: &Assignment) {
    field(out, "status", assignment.status);
    field(out, "version", assignment.version);
    field(out, "updated_at", assignment.updated_at.to_rfc3339());
}

fn exception_fields(out: &mut String, exc: &Exception) {
    field(out, "exception", exc.id);
    field(out, "status", exc.status);
    field(out, "risk_level", exc.risk_level.as_str());
    field(out, "expiration_type", exc.expiration_type.as_str());
    if let Some(at) = exc.expires_at {
        field(out, "expires_at", at.to_rfc3339());
    }
    field(out, "reason", &exc.reason);
    field(out, "requested_by", &exc.requested_by);
    if let Some(by) = &exc.decided_by {
        field(out, "decided_by", by);
    }
}

fn field(out: &mut String, name: &str, value: impl std::fmt::Display) {
    let _ = writeln!(out, "  {name:<26} {value}");
}

fn more(out: &mut String, len: usize) {
    if len > MAX_LIST_ITEMS {
        let _ = writeln!(out, "    ... and {} more", len - MAX_LIST_ITEMS);
    }
}
