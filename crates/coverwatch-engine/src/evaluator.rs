//! Requirement evaluation: certificate × project requirements → checks and deficiencies.
//!
//! Every rule is independent and appends in a fixed order, so the same input
//! always produces the same check list. Missing extracted fields degrade into
//! failing or warning checks; nothing here returns an error.

use std::collections::HashSet;

use chrono::{DateTime, NaiveDate, Utc};
use coverwatch_core::{
    CheckResult, CheckStatus, CoverageLine, CoverageRequirement, Deficiency, DeficiencyKind,
    EngineConfig, ExtractedPolicyData, LimitType, ProjectFacts, Severity, VerdictStatus,
    format_amount, normalize_identifier, normalize_insurer,
};
use tracing::debug;

/// Set-membership query over licensed insurers.
pub trait InsurerRegistry: Send + Sync {
    /// `normalized_name` has been through [`normalize_insurer`].
    fn is_licensed(&self, normalized_name: &str) -> bool;
}

/// Insurer allow-list held in memory.
#[derive(Debug, Clone, Default)]
pub struct InsurerAllowList {
    names: HashSet<String>,
}

impl InsurerAllowList {
    pub fn new<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            names: names
                .into_iter()
                .map(|n| normalize_insurer(n.as_ref()))
                .filter(|n| !n.is_empty())
                .collect(),
        }
    }

    pub fn from_config(config: &EngineConfig) -> Self {
        Self::new(&config.licensed_insurers)
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}

impl InsurerRegistry for InsurerAllowList {
    fn is_licensed(&self, normalized_name: &str) -> bool {
        self.names.contains(normalized_name)
    }
}

/// Output of the evaluator, before fraud reconciliation.
#[derive(Debug, Clone, PartialEq)]
pub struct Evaluation {
    pub checks: Vec<CheckResult>,
    pub deficiencies: Vec<Deficiency>,
    /// Module-local status: fail on any failure or critical gap, review on warnings.
    pub status: VerdictStatus,
}

/// Accumulates checks, keeping deficiencies paired with the check that raised them.
#[derive(Default)]
struct Findings {
    checks: Vec<CheckResult>,
    deficiencies: Vec<Deficiency>,
}

impl Findings {
    fn pass(&mut self, id: String, description: &str, detail: String) {
        self.checks.push(CheckResult::pass(id, description, detail));
    }

    fn warn(&mut self, id: String, description: &str, detail: String) {
        self.checks.push(CheckResult::warning(id, description, detail));
    }

    fn fail(
        &mut self,
        id: String,
        description: &str,
        kind: DeficiencyKind,
        required: String,
        actual: String,
    ) {
        let detail = format!("required {required}, found {actual}");
        self.deficiencies.push(Deficiency::new(
            kind,
            id.clone(),
            description,
            required,
            actual,
        ));
        self.checks.push(CheckResult::fail(id, description, detail));
    }

    fn finish(self) -> Evaluation {
        let status = local_status(&self.checks, &self.deficiencies);
        Evaluation {
            checks: self.checks,
            deficiencies: self.deficiencies,
            status,
        }
    }
}

/// Status derived from checks and deficiencies alone.
pub fn local_status(checks: &[CheckResult], deficiencies: &[Deficiency]) -> VerdictStatus {
    let has_failures = checks.iter().any(|c| c.status == CheckStatus::Fail);
    let has_critical = deficiencies.iter().any(|d| d.severity == Severity::Critical);
    if has_failures || has_critical {
        VerdictStatus::Fail
    } else if checks.iter().any(|c| c.status == CheckStatus::Warning) {
        VerdictStatus::Review
    } else {
        VerdictStatus::Pass
    }
}

pub struct RequirementEvaluator<'a> {
    config: &'a EngineConfig,
    insurers: &'a dyn InsurerRegistry,
}

impl<'a> RequirementEvaluator<'a> {
    pub fn new(config: &'a EngineConfig, insurers: &'a dyn InsurerRegistry) -> Self {
        Self { config, insurers }
    }

    /// Evaluate a certificate against a project's requirements at `as_of`.
    ///
    /// Requirements are visited in the order given. An empty requirement set
    /// is valid and leaves only the certificate-level rules.
    pub fn evaluate(
        &self,
        policy: &ExtractedPolicyData,
        requirements: &[CoverageRequirement],
        facts: &ProjectFacts,
        as_of: DateTime<Utc>,
    ) -> Evaluation {
        let mut findings = Findings::default();
        let today = as_of.date_naive();

        self.check_expiry(&mut findings, policy.period_end, today);
        check_project_period(&mut findings, policy.period_end, facts.project_end_date);
        check_identity(
            &mut findings,
            policy.insured_identifier.as_deref(),
            facts.expected_identifier.as_deref(),
        );
        self.check_insurer(&mut findings, policy.insurer_name.as_deref());

        for req in requirements {
            match policy.coverage(&req.coverage_type) {
                Some(line) => check_line(&mut findings, req, line, facts),
                None => {
                    let label = req.coverage_type.label();
                    findings.fail(
                        format!("coverage_{}", req.coverage_type),
                        &format!("{label} cover present"),
                        DeficiencyKind::MissingCoverage,
                        req.minimum_limit
                            .map(format_amount)
                            .unwrap_or_else(|| "Required".to_string()),
                        "Not found".to_string(),
                    );
                }
            }
        }

        let evaluation = findings.finish();
        debug!(
            checks = evaluation.checks.len(),
            deficiencies = evaluation.deficiencies.len(),
            status = %evaluation.status,
            "requirements evaluated"
        );
        evaluation
    }

    // ── Certificate-level rules ──

    fn check_expiry(&self, findings: &mut Findings, end: Option<NaiveDate>, today: NaiveDate) {
        const ID: &str = "policy_validity";
        const DESC: &str = "Policy is current";

        let Some(end) = end else {
            findings.warn(
                ID.into(),
                DESC,
                "coverage end date could not be read".into(),
            );
            return;
        };

        if end < today {
            findings.fail(
                ID.into(),
                DESC,
                DeficiencyKind::ExpiredPolicy,
                format!("current on {today}"),
                format!("expired {end}"),
            );
            return;
        }

        let days_left = (end - today).num_days();
        if days_left <= self.config.expiry_warning_days {
            findings.warn(
                ID.into(),
                DESC,
                format!("policy expires in {days_left} days ({end})"),
            );
        } else {
            findings.pass(ID.into(), DESC, format!("valid until {end}"));
        }
    }

    fn check_insurer(&self, findings: &mut Findings, insurer: Option<&str>) {
        const ID: &str = "insurer_licensed";
        const DESC: &str = "Insurer is licensed";

        let normalized = insurer.map(normalize_insurer).unwrap_or_default();
        if !normalized.is_empty() && self.insurers.is_licensed(&normalized) {
            findings.pass(
                ID.into(),
                DESC,
                format!("{} is on the licensed insurer list", insurer.unwrap_or_default()),
            );
        } else {
            findings.fail(
                ID.into(),
                DESC,
                DeficiencyKind::UnlicensedInsurer,
                "Licensed insurer".into(),
                insurer.filter(|s| !s.trim().is_empty()).unwrap_or("Not found").to_string(),
            );
        }
    }
}

fn check_project_period(findings: &mut Findings, end: Option<NaiveDate>, project_end: Option<NaiveDate>) {
    // Without both dates there is nothing to compare; an unread end date has
    // already been flagged by the expiry rule.
    let (Some(end), Some(project_end)) = (end, project_end) else {
        return;
    };
    const ID: &str = "project_period";
    const DESC: &str = "Policy covers the project period";
    if end < project_end {
        findings.fail(
            ID.into(),
            DESC,
            DeficiencyKind::PolicyExpiresBeforeProject,
            format!("cover until {project_end}"),
            format!("expires {end}"),
        );
    } else {
        findings.pass(ID.into(), DESC, format!("covers project end {project_end}"));
    }
}

fn check_identity(findings: &mut Findings, actual: Option<&str>, expected: Option<&str>) {
    const ID: &str = "identity_match";
    const DESC: &str = "Insured matches subcontractor";

    let Some(expected) = expected else {
        findings.pass(ID.into(), DESC, "no identifier on file to compare".into());
        return;
    };

    let expected_norm = normalize_identifier(expected);
    match actual.map(normalize_identifier) {
        Some(actual_norm) if actual_norm == expected_norm => {
            findings.pass(ID.into(), DESC, format!("identifier {expected_norm} matches"));
        }
        other => findings.fail(
            ID.into(),
            DESC,
            DeficiencyKind::IdentityMismatch,
            expected_norm,
            other
                .filter(|s| !s.is_empty())
                .unwrap_or_else(|| "Not found".to_string()),
        ),
    }
}

// ── Per-requirement rules ──

fn check_line(findings: &mut Findings, req: &CoverageRequirement, line: &CoverageLine, facts: &ProjectFacts) {
    let ct = &req.coverage_type;
    let label = ct.label();

    if let Some(minimum) = req.minimum_limit {
        let id = format!("limit_{ct}");
        let desc = format!("{label} limit");
        match line.limit {
            Some(limit) if limit >= minimum => {
                findings.pass(id, &desc, format!("{} meets {}", format_amount(limit), format_amount(minimum)));
            }
            Some(limit) => findings.fail(
                id,
                &desc,
                DeficiencyKind::InsufficientLimit,
                format_amount(minimum),
                format_amount(limit),
            ),
            None if line.limit_type == LimitType::Statutory => {
                findings.pass(id, &desc, "statutory limit".into());
            }
            None => findings.fail(
                id,
                &desc,
                DeficiencyKind::InsufficientLimit,
                format_amount(minimum),
                "Not stated".into(),
            ),
        }
    }

    if let (Some(maximum), Some(excess)) = (req.maximum_excess, line.excess) {
        let id = format!("excess_{ct}");
        let desc = format!("{label} excess");
        if excess > maximum {
            findings.fail(
                id,
                &desc,
                DeficiencyKind::ExcessTooHigh,
                format!("at most {}", format_amount(maximum)),
                format_amount(excess),
            );
        } else {
            findings.pass(id, &desc, format!("{} within {}", format_amount(excess), format_amount(maximum)));
        }
    }

    let endorsements = [
        (
            req.principal_indemnity_required,
            line.endorsements.principal_indemnity,
            "principal_indemnity",
            "Principal indemnity",
        ),
        (
            req.cross_liability_required,
            line.endorsements.cross_liability,
            "cross_liability",
            "Cross liability",
        ),
        (
            req.waiver_required,
            line.endorsements.waiver_of_subrogation,
            "waiver_of_subrogation",
            "Waiver of subrogation",
        ),
    ];
    for (required, present, key, name) in endorsements {
        if !required {
            continue;
        }
        let id = format!("endorsement_{ct}_{key}");
        let desc = format!("{label}: {name} endorsement");
        if present {
            findings.pass(id, &desc, "endorsement present".into());
        } else {
            findings.fail(
                id,
                &desc,
                DeficiencyKind::MissingEndorsement,
                name.to_string(),
                "Not endorsed".into(),
            );
        }
    }

    if req.checks_jurisdiction()
        && let (Some(theirs), Some(ours)) = (line.jurisdiction.as_deref(), facts.project_jurisdiction.as_deref())
    {
        let id = format!("jurisdiction_{ct}");
        let desc = format!("{label} jurisdiction");
        if theirs.trim().eq_ignore_ascii_case(ours.trim()) {
            findings.pass(id, &desc, format!("issued for {}", ours.trim()));
        } else {
            findings.fail(
                id,
                &desc,
                DeficiencyKind::JurisdictionMismatch,
                ours.trim().to_string(),
                theirs.trim().to_string(),
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use coverwatch_core::{CoverageType, Endorsements};

    fn as_of() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 1, 9, 0, 0).unwrap()
    }

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn policy() -> ExtractedPolicyData {
        ExtractedPolicyData {
            insured_name: Some("Acme Scaffolding Pty Ltd".into()),
            insured_identifier: Some("51 824 753 556".into()),
            insurer_name: Some("QBE Insurance (Australia) Limited".into()),
            policy_number: Some("PL-2026-00417".into()),
            period_start: Some(date(2025, 12, 1)),
            period_end: Some(date(2026, 12, 1)),
            coverages: vec![CoverageLine::new("public_liability", 20_000_000)],
            confidence: 0.95,
            ..Default::default()
        }
    }

    fn evaluate(policy: &ExtractedPolicyData, reqs: &[CoverageRequirement], facts: &ProjectFacts) -> Evaluation {
        let config = EngineConfig::default();
        let insurers = InsurerAllowList::from_config(&config);
        RequirementEvaluator::new(&config, &insurers).evaluate(policy, reqs, facts, as_of())
    }

    fn check<'e>(eval: &'e Evaluation, id: &str) -> &'e CheckResult {
        eval.checks
            .iter()
            .find(|c| c.check_id == id)
            .unwrap_or_else(|| panic!("no check {id} in {:?}", eval.checks))
    }

    #[test]
    fn clean_certificate_passes() {
        let reqs = [CoverageRequirement::new("public_liability").with_minimum_limit(10_000_000)];
        let eval = evaluate(&policy(), &reqs, &ProjectFacts::default());
        assert_eq!(eval.status, VerdictStatus::Pass);
        assert!(eval.deficiencies.is_empty());
        let ids: Vec<&str> = eval.checks.iter().map(|c| c.check_id.as_str()).collect();
        assert_eq!(
            ids,
            ["policy_validity", "identity_match", "insurer_licensed", "limit_public_liability"]
        );
    }

    #[test]
    fn zero_requirements_is_valid() {
        let eval = evaluate(&policy(), &[], &ProjectFacts::default());
        assert_eq!(eval.status, VerdictStatus::Pass);
    }

    #[test]
    fn expired_policy_is_critical() {
        let mut p = policy();
        p.period_end = Some(date(2026, 2, 28));
        let eval = evaluate(&p, &[], &ProjectFacts::default());
        assert_eq!(eval.status, VerdictStatus::Fail);
        assert_eq!(eval.deficiencies[0].kind, DeficiencyKind::ExpiredPolicy);
        assert_eq!(eval.deficiencies[0].severity, Severity::Critical);
    }

    #[test]
    fn expiring_soon_warns_without_deficiency() {
        let mut p = policy();
        p.period_end = Some(date(2026, 3, 31));
        let eval = evaluate(&p, &[], &ProjectFacts::default());
        assert_eq!(check(&eval, "policy_validity").status, CheckStatus::Warning);
        assert!(eval.deficiencies.is_empty());
        assert_eq!(eval.status, VerdictStatus::Review);
    }

    #[test]
    fn expiry_on_boundary_day() {
        // Ending today is not yet expired.
        let mut p = policy();
        p.period_end = Some(date(2026, 3, 1));
        let eval = evaluate(&p, &[], &ProjectFacts::default());
        assert_eq!(check(&eval, "policy_validity").status, CheckStatus::Warning);

        // 31 days out passes.
        p.period_end = Some(date(2026, 4, 1));
        let eval = evaluate(&p, &[], &ProjectFacts::default());
        assert_eq!(check(&eval, "policy_validity").status, CheckStatus::Pass);
    }

    #[test]
    fn unreadable_end_date_warns() {
        let mut p = policy();
        p.period_end = None;
        let facts = ProjectFacts {
            project_end_date: Some(date(2026, 6, 30)),
            ..Default::default()
        };
        let eval = evaluate(&p, &[], &facts);
        assert_eq!(check(&eval, "policy_validity").status, CheckStatus::Warning);
        assert!(eval.checks.iter().all(|c| c.check_id != "project_period"));
    }

    #[test]
    fn policy_ending_before_project() {
        let facts = ProjectFacts {
            project_end_date: Some(date(2027, 6, 30)),
            ..Default::default()
        };
        let eval = evaluate(&policy(), &[], &facts);
        assert_eq!(check(&eval, "project_period").status, CheckStatus::Fail);
        assert_eq!(eval.deficiencies[0].kind, DeficiencyKind::PolicyExpiresBeforeProject);
    }

    #[test]
    fn identity_compared_without_whitespace() {
        let facts = ProjectFacts {
            expected_identifier: Some("51824753556".into()),
            ..Default::default()
        };
        let eval = evaluate(&policy(), &[], &facts);
        assert_eq!(check(&eval, "identity_match").status, CheckStatus::Pass);

        let facts = ProjectFacts {
            expected_identifier: Some("53 004 085 616".into()),
            ..Default::default()
        };
        let eval = evaluate(&policy(), &[], &facts);
        assert_eq!(check(&eval, "identity_match").status, CheckStatus::Fail);
        assert_eq!(eval.deficiencies[0].kind, DeficiencyKind::IdentityMismatch);
        assert_eq!(eval.deficiencies[0].actual_value, "51824753556");
    }

    #[test]
    fn identity_ignores_letter_case() {
        let mut p = policy();
        p.insured_identifier = Some("wbc 1234 nsw".into());
        let facts = ProjectFacts {
            expected_identifier: Some("WBC1234NSW".into()),
            ..Default::default()
        };
        let eval = evaluate(&p, &[], &facts);
        assert_eq!(check(&eval, "identity_match").status, CheckStatus::Pass);
    }

    #[test]
    fn unknown_insurer_fails() {
        let mut p = policy();
        p.insurer_name = Some("Honest Bob's Cover Co".into());
        let eval = evaluate(&p, &[], &ProjectFacts::default());
        assert_eq!(eval.deficiencies[0].kind, DeficiencyKind::UnlicensedInsurer);

        p.insurer_name = None;
        let eval = evaluate(&p, &[], &ProjectFacts::default());
        assert_eq!(eval.deficiencies[0].actual_value, "Not found");
    }

    #[test]
    fn insurer_lookup_is_case_insensitive() {
        let mut p = policy();
        p.insurer_name = Some("qbe insurance (australia) LIMITED".into());
        let eval = evaluate(&p, &[], &ProjectFacts::default());
        assert_eq!(check(&eval, "insurer_licensed").status, CheckStatus::Pass);
    }

    #[test]
    fn missing_coverage_line() {
        let reqs = [
            CoverageRequirement::new("professional_indemnity").with_minimum_limit(5_000_000),
            CoverageRequirement::new("contract_works"),
        ];
        let eval = evaluate(&policy(), &reqs, &ProjectFacts::default());
        assert_eq!(eval.deficiencies.len(), 2);
        assert_eq!(eval.deficiencies[0].kind, DeficiencyKind::MissingCoverage);
        assert_eq!(eval.deficiencies[0].required_value, "$5,000,000");
        assert_eq!(eval.deficiencies[1].required_value, "Required");
        assert_eq!(eval.deficiencies[1].check_id, "coverage_contract_works");
        // No limit or endorsement checks for a line that is not there.
        assert!(eval.checks.iter().all(|c| !c.check_id.starts_with("limit_professional")));
    }

    #[test]
    fn insufficient_limit_is_major() {
        let mut p = policy();
        p.coverages = vec![CoverageLine::new("public_liability", 5_000_000)];
        let reqs = [CoverageRequirement::new("public_liability").with_minimum_limit(10_000_000)];
        let eval = evaluate(&p, &reqs, &ProjectFacts::default());
        assert_eq!(eval.status, VerdictStatus::Fail);
        assert_eq!(eval.deficiencies.len(), 1);
        let d = &eval.deficiencies[0];
        assert_eq!(d.kind, DeficiencyKind::InsufficientLimit);
        assert_eq!(d.severity, Severity::Major);
        assert_eq!(d.required_value, "$10,000,000");
        assert_eq!(d.actual_value, "$5,000,000");
    }

    #[test]
    fn excess_too_high_is_minor_but_fails() {
        let mut p = policy();
        p.coverages[0].excess = Some(25_000);
        let reqs = [CoverageRequirement::new("public_liability").with_maximum_excess(10_000)];
        let eval = evaluate(&p, &reqs, &ProjectFacts::default());
        assert_eq!(eval.deficiencies[0].severity, Severity::Minor);
        assert_eq!(eval.status, VerdictStatus::Fail);
    }

    #[test]
    fn unknown_excess_emits_no_check() {
        let reqs = [CoverageRequirement::new("public_liability").with_maximum_excess(10_000)];
        let eval = evaluate(&policy(), &reqs, &ProjectFacts::default());
        assert!(eval.checks.iter().all(|c| !c.check_id.starts_with("excess_")));
    }

    #[test]
    fn one_deficiency_per_missing_endorsement() {
        let mut p = policy();
        p.coverages[0].endorsements = Endorsements {
            principal_indemnity: true,
            cross_liability: false,
            waiver_of_subrogation: false,
        };
        let mut req = CoverageRequirement::new("public_liability");
        req.principal_indemnity_required = true;
        req.cross_liability_required = true;
        req.waiver_required = true;
        let eval = evaluate(&p, &[req], &ProjectFacts::default());

        let kinds: Vec<_> = eval.deficiencies.iter().map(|d| (d.kind, d.check_id.as_str())).collect();
        assert_eq!(
            kinds,
            [
                (DeficiencyKind::MissingEndorsement, "endorsement_public_liability_cross_liability"),
                (DeficiencyKind::MissingEndorsement, "endorsement_public_liability_waiver_of_subrogation"),
            ]
        );
        assert_eq!(
            check(&eval, "endorsement_public_liability_principal_indemnity").status,
            CheckStatus::Pass
        );
    }

    #[test]
    fn statutory_jurisdiction_mismatch() {
        let mut p = policy();
        let mut wc = CoverageLine::new("workers_compensation", 0);
        wc.limit = None;
        wc.limit_type = LimitType::Statutory;
        wc.jurisdiction = Some("VIC".into());
        p.coverages.push(wc);

        let reqs = [CoverageRequirement::new("workers_compensation").with_minimum_limit(1)];
        let facts = ProjectFacts {
            project_jurisdiction: Some("NSW".into()),
            ..Default::default()
        };
        let eval = evaluate(&p, &reqs, &facts);
        assert_eq!(check(&eval, "limit_workers_compensation").status, CheckStatus::Pass);
        let d = eval.deficiencies.iter().find(|d| d.kind == DeficiencyKind::JurisdictionMismatch).unwrap();
        assert_eq!(d.required_value, "NSW");
        assert_eq!(d.actual_value, "VIC");
    }

    #[test]
    fn jurisdiction_match_is_case_insensitive() {
        let mut p = policy();
        let mut wc = CoverageLine::new("workers_compensation", 1_000_000);
        wc.jurisdiction = Some("nsw".into());
        p.coverages.push(wc);
        let facts = ProjectFacts {
            project_jurisdiction: Some("NSW".into()),
            ..Default::default()
        };
        let eval = evaluate(&p, &[CoverageRequirement::new("workers_compensation")], &facts);
        assert_eq!(check(&eval, "jurisdiction_workers_compensation").status, CheckStatus::Pass);
    }

    #[test]
    fn no_jurisdiction_info_no_check() {
        let mut p = policy();
        p.coverages.push(CoverageLine::new("workers_compensation", 1_000_000));
        let eval = evaluate(&p, &[CoverageRequirement::new("workers_compensation")], &ProjectFacts::default());
        assert!(eval.checks.iter().all(|c| !c.check_id.starts_with("jurisdiction_")));
    }

    #[test]
    fn every_deficiency_has_a_failing_check() {
        let p = ExtractedPolicyData::default();
        let reqs = [
            CoverageRequirement::new("public_liability").with_minimum_limit(10_000_000),
            CoverageRequirement::new(CoverageType::WORKERS_COMPENSATION),
        ];
        let facts = ProjectFacts {
            expected_identifier: Some("51824753556".into()),
            ..Default::default()
        };
        let eval = evaluate(&p, &reqs, &facts);
        for d in &eval.deficiencies {
            let matching: Vec<_> = eval.checks.iter().filter(|c| c.check_id == d.check_id).collect();
            assert_eq!(matching.len(), 1, "{d:?}");
            assert!(matching[0].is_fail());
        }
        assert_eq!(
            eval.checks.iter().filter(|c| c.is_fail()).count(),
            eval.deficiencies.len()
        );
    }

    #[test]
    fn local_status_derivation() {
        let pass = CheckResult::pass("a", "a", "");
        let warn = CheckResult::warning("b", "b", "");
        let fail = CheckResult::fail("c", "c", "");
        assert_eq!(local_status(&[pass.clone()], &[]), VerdictStatus::Pass);
        assert_eq!(local_status(&[pass.clone(), warn.clone()], &[]), VerdictStatus::Review);
        assert_eq!(local_status(&[warn, fail], &[]), VerdictStatus::Fail);
        let critical = Deficiency::new(DeficiencyKind::MissingCoverage, "x", "x", "", "");
        assert_eq!(local_status(&[pass], &[critical]), VerdictStatus::Fail);
    }
}
