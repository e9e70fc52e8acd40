//! One document through evaluator, scorer, and reconciler.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use coverwatch_core::{
    CoverageRequirement, DocumentMetadata, EngineConfig, ExtractedPolicyData, FraudSignal,
    PolicySummary, ProjectFacts, VerificationVerdict,
};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::EngineError;
use crate::evaluator::{Evaluation, InsurerAllowList, InsurerRegistry, RequirementEvaluator};
use crate::fraud::FraudScorer;
use crate::reconcile::{ReconcileInput, reconcile};

/// Inputs for verifying one document. Requirements and facts belong to the
/// project; history is the prior submissions sharing this policy number.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct VerificationRequest {
    pub document_id: String,
    pub policy: ExtractedPolicyData,
    pub metadata: DocumentMetadata,
    pub requirements: Vec<CoverageRequirement>,
    pub facts: ProjectFacts,
    pub history: Vec<PolicySummary>,
    /// Evaluation instant; expiry and date rules are relative to it.
    pub as_of: Option<DateTime<Utc>>,
}

impl VerificationRequest {
    fn instant(&self) -> DateTime<Utc> {
        self.as_of.unwrap_or_else(Utc::now)
    }
}

/// Produces verdicts. Holds no mutable state; share it behind an `Arc`.
pub struct Verifier {
    config: EngineConfig,
    insurers: Box<dyn InsurerRegistry>,
}

impl Verifier {
    pub fn new(config: EngineConfig, insurers: Box<dyn InsurerRegistry>) -> Self {
        Self { config, insurers }
    }

    /// Verifier using the config's own insurer allow-list.
    pub fn from_config(config: EngineConfig) -> Self {
        let insurers = InsurerAllowList::from_config(&config);
        Self::new(config, Box::new(insurers))
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn evaluate(&self, req: &VerificationRequest, as_of: DateTime<Utc>) -> Evaluation {
        RequirementEvaluator::new(&self.config, self.insurers.as_ref()).evaluate(
            &req.policy,
            &req.requirements,
            &req.facts,
            as_of,
        )
    }

    pub fn score(&self, req: &VerificationRequest, as_of: DateTime<Utc>) -> FraudSignal {
        FraudScorer::new(&self.config).score(
            &req.policy,
            &req.metadata,
            req.history.as_slice(),
            &req.document_id,
            as_of,
        )
    }

    /// Evaluate, score, reconcile. Deterministic for a fixed `as_of`.
    pub fn verify(&self, req: &VerificationRequest) -> VerificationVerdict {
        let as_of = req.instant();
        let evaluation = self.evaluate(req, as_of);
        let fraud = self.score(req, as_of);
        self.join(req, &evaluation, &fraud)
    }

    /// Run evaluator and scorer side by side on the blocking pool, then
    /// reconcile. Produces the same verdict as [`verify`](Self::verify).
    pub async fn verify_concurrently(
        self: &Arc<Self>,
        req: Arc<VerificationRequest>,
    ) -> Result<VerificationVerdict, EngineError> {
        let as_of = req.instant();

        let evaluating = {
            let this = Arc::clone(self);
            let req = Arc::clone(&req);
            tokio::task::spawn_blocking(move || this.evaluate(&req, as_of))
        };
        let scoring = {
            let this = Arc::clone(self);
            let req = Arc::clone(&req);
            tokio::task::spawn_blocking(move || this.score(&req, as_of))
        };

        let (evaluation, fraud) =
            tokio::try_join!(evaluating, scoring).map_err(|e| EngineError::Task(e.to_string()))?;
        Ok(self.join(&req, &evaluation, &fraud))
    }

    fn join(&self, req: &VerificationRequest, evaluation: &Evaluation, fraud: &FraudSignal) -> VerificationVerdict {
        let verdict = reconcile(&ReconcileInput {
            evaluation,
            fraud,
            confidence: req.policy.confidence,
            review_threshold: self.config.review_confidence_threshold,
        });
        info!(
            document = %req.document_id,
            status = %verdict.status,
            checks = verdict.checks.len(),
            deficiencies = verdict.deficiencies.len(),
            risk_score = verdict.fraud_signal.risk_score,
            "document verified"
        );
        verdict
    }
}
