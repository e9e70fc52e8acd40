//! Fraud risk scoring from extracted fields and file-level metadata.
//!
//! Six independent signals each contribute a capped score; the document's
//! risk score is the maximum, not the sum. The scorer knows nothing about
//! project requirements.

use chrono::{DateTime, Duration, Utc};
use coverwatch_core::normalize::IdentifierCheck;
use coverwatch_core::{
    CheckResult, DocumentMetadata, EngineConfig, ExtractedPolicyData, FraudSignal, LimitType,
    PolicySummary, RiskLevel, check_business_number, format_amount, normalize_identifier,
};
use tracing::debug;

/// Longest plausible policy period before the span itself looks forged.
const MAX_PERIOD_DAYS: i64 = 550;
/// How far ahead a policy may start before it is suspicious.
const MAX_LEAD_DAYS: i64 = 365;
const FILENAME_MARKERS: [&str; 5] = ["edit", "copy", "modified", "fake", "template"];

/// Previously judged certificates, consulted for duplicate policy numbers.
pub trait SubmissionHistory {
    /// Prior submissions carrying `policy_number`, compared after
    /// whitespace stripping and uppercasing.
    fn with_policy_number(&self, policy_number: &str) -> Vec<&PolicySummary>;
}

impl SubmissionHistory for [PolicySummary] {
    fn with_policy_number(&self, policy_number: &str) -> Vec<&PolicySummary> {
        let wanted = normalize_identifier(policy_number);
        self.iter()
            .filter(|p| {
                p.policy_number
                    .as_deref()
                    .is_some_and(|n| normalize_identifier(n) == wanted)
            })
            .collect()
    }
}

impl SubmissionHistory for Vec<PolicySummary> {
    fn with_policy_number(&self, policy_number: &str) -> Vec<&PolicySummary> {
        self.as_slice().with_policy_number(policy_number)
    }
}

/// One signal's findings before capping.
struct Signal {
    check_id: &'static str,
    description: &'static str,
    cap: u8,
    hits: Vec<(u8, String)>,
}

impl Signal {
    fn new(check_id: &'static str, description: &'static str, cap: u8) -> Self {
        Self {
            check_id,
            description,
            cap,
            hits: Vec::new(),
        }
    }

    fn hit(&mut self, score: u8, detail: impl Into<String>) {
        self.hits.push((score, detail.into()));
    }

    /// Capped contribution and its audit check, if anything fired.
    fn fire(self) -> Option<(u8, CheckResult)> {
        let score = self.hits.iter().map(|(s, _)| *s).max()?.min(self.cap);
        let detail = self
            .hits
            .into_iter()
            .map(|(_, d)| d)
            .collect::<Vec<_>>()
            .join("; ");
        Some((score, CheckResult::fail(self.check_id, self.description, detail)))
    }
}

pub struct FraudScorer<'a> {
    config: &'a EngineConfig,
}

impl<'a> FraudScorer<'a> {
    pub fn new(config: &'a EngineConfig) -> Self {
        Self { config }
    }

    /// Score one document. `history` should not contain `document_id` itself;
    /// entries that do are ignored.
    pub fn score<H: SubmissionHistory + ?Sized>(
        &self,
        policy: &ExtractedPolicyData,
        metadata: &DocumentMetadata,
        history: &H,
        document_id: &str,
        as_of: DateTime<Utc>,
    ) -> FraudSignal {
        let signals = [
            identifier_signal(policy),
            date_signal(policy, metadata, as_of),
            self.software_signal(metadata),
            duplicate_signal(policy, history, document_id),
            template_signal(policy, metadata),
            self.amount_signal(policy),
        ];

        let mut risk_score = 0u8;
        let mut evidence_checks = Vec::new();
        for (score, check) in signals.into_iter().filter_map(Signal::fire) {
            risk_score = risk_score.max(score);
            evidence_checks.push(check);
        }

        if evidence_checks.is_empty() {
            return FraudSignal::clean();
        }

        let risk_level = RiskLevel::from_score(risk_score);
        debug!(
            document = document_id,
            risk_score,
            risk_level = risk_level.as_str(),
            signals = evidence_checks.len(),
            "fraud signals fired"
        );
        FraudSignal {
            risk_score,
            risk_level,
            is_blocked: risk_level == RiskLevel::Critical,
            evidence_checks,
            recommendation: recommendation(risk_level).to_string(),
        }
    }

    fn software_signal(&self, metadata: &DocumentMetadata) -> Signal {
        let mut signal = Signal::new("fraud_software", "Document software fingerprint", 70);

        for tool in [metadata.producer.as_deref(), metadata.creator.as_deref()]
            .into_iter()
            .flatten()
        {
            let lowered = tool.to_lowercase();
            if contains_any(&lowered, &self.config.suspicious_software) {
                signal.hit(70, format!("produced with image editor '{tool}'"));
            } else if contains_any(&lowered, &self.config.office_software) {
                signal.hit(35, format!("authored in office software '{tool}'"));
            }
        }

        if let (Some(created), Some(modified)) = (metadata.created_at, metadata.modified_at)
            && modified - created > Duration::days(1)
        {
            signal.hit(
                45,
                format!("modified {} days after creation", (modified - created).num_days()),
            );
        }
        signal
    }

    fn amount_signal(&self, policy: &ExtractedPolicyData) -> Signal {
        let mut signal = Signal::new("fraud_amount", "Coverage amounts plausible", 70);

        for line in &policy.coverages {
            let ct = &line.coverage_type;
            // Statutory cover carries no meaningful figure.
            if line.limit_type == LimitType::Statutory {
                continue;
            }
            let Some(limit) = line.limit else { continue };
            if limit == 0 {
                signal.hit(70, format!("{ct} limit is zero"));
                continue;
            }
            if limit > self.config.max_plausible_limit {
                signal.hit(60, format!("{ct} limit {} is implausibly high", format_amount(limit)));
            }
            if let Some(excess) = line.excess
                && excess > limit
            {
                signal.hit(
                    70,
                    format!("{ct} excess {} exceeds limit {}", format_amount(excess), format_amount(limit)),
                );
            }
            if limit % 1_000 != 0 {
                signal.hit(30, format!("{ct} limit {} is not a round figure", format_amount(limit)));
            }
        }
        signal
    }
}

fn identifier_signal(policy: &ExtractedPolicyData) -> Signal {
    let mut signal = Signal::new("fraud_identifier_checksum", "Insured identifier checksum", 80);
    if let Some(id) = policy.insured_identifier.as_deref() {
        match check_business_number(id) {
            IdentifierCheck::Valid => {}
            IdentifierCheck::Malformed => signal.hit(60, format!("identifier '{id}' is not 11 digits")),
            IdentifierCheck::BadChecksum => signal.hit(80, format!("identifier '{id}' fails checksum")),
        }
    }
    signal
}

fn date_signal(policy: &ExtractedPolicyData, metadata: &DocumentMetadata, as_of: DateTime<Utc>) -> Signal {
    let mut signal = Signal::new("fraud_date_logic", "Policy dates consistent", 90);

    if let (Some(start), Some(end)) = (policy.period_start, policy.period_end) {
        if end <= start {
            signal.hit(90, format!("period ends {end} on or before it starts {start}"));
        } else if (end - start).num_days() > MAX_PERIOD_DAYS {
            signal.hit(45, format!("period spans {} days", (end - start).num_days()));
        }
    }

    if let Some(start) = policy.period_start
        && (start - as_of.date_naive()).num_days() > MAX_LEAD_DAYS
    {
        signal.hit(50, format!("period starts {start}, more than a year ahead"));
    }

    if let (Some(created), Some(modified)) = (metadata.created_at, metadata.modified_at)
        && modified < created
    {
        signal.hit(40, "file modified before it was created");
    }
    signal
}

fn duplicate_signal<H: SubmissionHistory + ?Sized>(
    policy: &ExtractedPolicyData,
    history: &H,
    document_id: &str,
) -> Signal {
    let mut signal = Signal::new("fraud_duplicate_policy", "Policy number not reused", 95);
    let Some(number) = policy.policy_number.as_deref().filter(|n| !n.trim().is_empty()) else {
        return signal;
    };

    let insured = policy.insured_identifier.as_deref().map(normalize_identifier);
    for prior in history.with_policy_number(number) {
        if prior.document_id == document_id {
            continue;
        }
        if prior.period_end != policy.period_end {
            signal.hit(
                95,
                format!(
                    "policy {number} seen on document {} with expiry {}",
                    prior.document_id,
                    prior
                        .period_end
                        .map(|d| d.to_string())
                        .unwrap_or_else(|| "unknown".into())
                ),
            );
        } else if let (Some(ours), Some(theirs)) =
            (&insured, prior.insured_identifier.as_deref().map(normalize_identifier))
            && *ours != theirs
        {
            signal.hit(
                90,
                format!("policy {number} issued to {theirs} on document {}", prior.document_id),
            );
        }
    }
    signal
}

fn template_signal(policy: &ExtractedPolicyData, metadata: &DocumentMetadata) -> Signal {
    let mut signal = Signal::new("fraud_template", "Certificate format", 65);

    match policy.policy_number.as_deref().map(str::trim) {
        None | Some("") => signal.hit(40, "policy number missing"),
        Some(n) if n.len() < 5 || !n.chars().any(|c| c.is_ascii_digit()) => {
            signal.hit(40, format!("policy number '{n}' has an unusual format"));
        }
        Some(_) => {}
    }

    if policy.insurer_name.as_deref().is_none_or(|n| n.trim().is_empty()) {
        signal.hit(35, "insurer name missing");
    }

    if let Some(name) = metadata.filename.as_deref() {
        let lowered = name.to_lowercase();
        if let Some(marker) = FILENAME_MARKERS.iter().find(|m| lowered.contains(*m)) {
            signal.hit(30, format!("filename '{name}' contains '{marker}'"));
        }
    }

    if policy.coverages.is_empty() {
        signal.hit(50, "no coverage lines found");
    }
    signal
}

fn contains_any(haystack: &str, needles: &[String]) -> bool {
    needles
        .iter()
        .any(|n| !n.is_empty() && haystack.contains(&n.to_lowercase()))
}

fn recommendation(level: RiskLevel) -> &'static str {
    match level {
        RiskLevel::Low => "No action required",
        RiskLevel::Medium => "Review document manually before relying on it",
        RiskLevel::High => "Verify certificate directly with the insurer",
        RiskLevel::Critical => "Reject document and escalate to compliance",
    }
}
