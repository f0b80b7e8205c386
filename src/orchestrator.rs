//! Request orchestration: mode selection, fallback and result assembly

use crate::anomaly::{AnomalyDetector, AnomalySignal};
use crate::config::{AnomalyConfig, ScoringConfig};
use crate::error::ScoreError;
use crate::explain::ExplanationBuilder;
use crate::feature_encoder::FeatureEncoder;
use crate::heuristic::HeuristicScorer;
use crate::models::artifacts::{ArtifactBundle, FeatureImportances};
use crate::models::ensemble::EnsemblePredictor;
use crate::types::claim::ClaimRecord;
use crate::types::score::{round_to, ContributingFactor, ExplanationMethod, ScoreResult};
use std::collections::BTreeMap;
use std::panic::{self, AssertUnwindSafe};
use tracing::{debug, error, info, warn};

/// Reason prepended when the ML path failed for a single request
pub const FALLBACK_REASON: &str = "ML scoring unavailable - using heuristic fallback";

/// Vote key used for heuristic results
pub const HEURISTIC_VOTER: &str = "Heuristic";

/// Scoring path chosen once at construction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScoringMode {
    /// Classifier, scaler and feature names are all available
    Model,
    /// Rule table only
    Heuristic,
}

/// Scores claims against a fixed artifact bundle.
///
/// Holds no per-request mutable state; share it behind an `Arc` and call
/// [`Orchestrator::score`] from as many tasks as needed.
pub struct Orchestrator {
    bundle: ArtifactBundle,
    mode: ScoringMode,
    encoder: FeatureEncoder,
    ensemble: EnsemblePredictor,
    heuristic: HeuristicScorer,
    detector: Option<AnomalyDetector>,
    explainer: ExplanationBuilder,
    model_version: String,
}

impl Orchestrator {
    pub fn new(bundle: ArtifactBundle, scoring: &ScoringConfig, anomaly: &AnomalyConfig) -> Self {
        let mode = if bundle.is_complete() {
            ScoringMode::Model
        } else {
            ScoringMode::Heuristic
        };

        let detector = match mode {
            ScoringMode::Model => fit_detector(&bundle, anomaly),
            ScoringMode::Heuristic => None,
        };

        info!(
            mode = ?mode,
            models = ?bundle.model_names(),
            anomaly_detector = detector.is_some(),
            model_version = %scoring.model_version,
            "Orchestrator initialized"
        );

        Self {
            bundle,
            mode,
            encoder: FeatureEncoder::new(),
            ensemble: EnsemblePredictor::new(),
            heuristic: HeuristicScorer::new(),
            detector,
            explainer: ExplanationBuilder::new(scoring),
            model_version: scoring.model_version.clone(),
        }
    }

    pub fn mode(&self) -> ScoringMode {
        self.mode
    }

    pub fn bundle(&self) -> &ArtifactBundle {
        &self.bundle
    }

    /// Score a claim. Always returns a well-formed result.
    pub fn score(&self, claim: &ClaimRecord) -> ScoreResult {
        let claim_id = claim.id_or_generate();

        match panic::catch_unwind(AssertUnwindSafe(|| self.try_score(claim, &claim_id))) {
            Ok(Ok(result)) => {
                debug!(
                    claim_id = %claim_id,
                    probability = result.probability,
                    status = result.status.label(),
                    method = result.explanation_method.label(),
                    "Claim scored"
                );
                result
            }
            Ok(Err(e)) => {
                error!(claim_id = %claim_id, error = %e, "Scoring failed, returning neutral result");
                ScoreResult::neutral(claim_id, &self.model_version)
            }
            Err(_) => {
                error!(claim_id = %claim_id, "Scoring panicked, returning neutral result");
                ScoreResult::neutral(claim_id, &self.model_version)
            }
        }
    }

    fn try_score(&self, claim: &ClaimRecord, claim_id: &str) -> Result<ScoreResult, ScoreError> {
        match self.mode {
            ScoringMode::Heuristic => self.score_heuristic(claim, claim_id, ExplanationMethod::Heuristic),
            ScoringMode::Model => match self.score_model(claim, claim_id) {
                Ok(result) => Ok(result),
                Err(e) => {
                    warn!(claim_id = %claim_id, error = %e, "ML scoring failed, using heuristic fallback");
                    self.score_heuristic(claim, claim_id, ExplanationMethod::HeuristicFallback)
                }
            },
        }
    }

    fn score_model(&self, claim: &ClaimRecord, claim_id: &str) -> Result<ScoreResult, ScoreError> {
        let features = self.encoder.encode(claim, &self.bundle)?;
        let ensemble = self.ensemble.predict(&features, &self.bundle)?;

        let anomaly = match &self.detector {
            Some(detector) => detector.detect(&features),
            None => AnomalySignal::NONE,
        };
        let factors = self
            .bundle
            .importances
            .as_ref()
            .map(|importances: &FeatureImportances| self.explainer.top_factors(importances))
            .unwrap_or_default();

        let result = self
            .assemble(
                claim,
                claim_id,
                ensemble.mean_probability,
                ExplanationMethod::Ensemble,
                factors,
                anomaly,
            )?
            .with_confidence(ensemble.primary.max_class_probability())
            .with_votes(ensemble.votes, ensemble.agreement_pct)
            .with_model_version(self.model_version.as_str());

        Ok(result)
    }

    fn score_heuristic(
        &self,
        claim: &ClaimRecord,
        claim_id: &str,
        method: ExplanationMethod,
    ) -> Result<ScoreResult, ScoreError> {
        let outcome = self.heuristic.score(claim);
        debug!(
            claim_id = %claim_id,
            score = outcome.score,
            rules = ?outcome.triggered,
            "Heuristic rules evaluated"
        );

        let mut votes = BTreeMap::new();
        votes.insert(HEURISTIC_VOTER.to_string(), u8::from(outcome.fraud));

        let mut result = self
            .assemble(claim, claim_id, outcome.probability, method, Vec::new(), AnomalySignal::NONE)?
            .with_confidence(outcome.confidence)
            .with_votes(votes, 100.0);

        if method.is_fallback() {
            result.reasons.insert(0, FALLBACK_REASON.to_string());
            result.model_version = format!("{}-Fallback", self.model_version);
        } else {
            result.model_version = self.model_version.clone();
        }

        Ok(result)
    }

    /// Common result assembly: category, reasons, factors and anomaly.
    fn assemble(
        &self,
        claim: &ClaimRecord,
        claim_id: &str,
        probability: f64,
        method: ExplanationMethod,
        factors: Vec<ContributingFactor>,
        anomaly: AnomalySignal,
    ) -> Result<ScoreResult, ScoreError> {
        if !probability.is_finite() || !(0.0..=1.0).contains(&probability) {
            return Err(ScoreError::InvalidProbability(probability));
        }

        let probability = round_to(probability, 3);
        let status = self.explainer.risk_category(probability, anomaly.is_anomaly);
        let reasons = self.explainer.explain(claim, probability, &factors, anomaly);

        Ok(ScoreResult::new(claim_id.to_string(), probability, status, method)
            .with_reasons(reasons)
            .with_factors(factors)
            .with_anomaly(anomaly.is_anomaly, anomaly.score))
    }
}

/// Fit the anomaly detector on the bundle's reference rows, or on synthetic
/// rows when those are missing or do not match the feature list.
fn fit_detector(bundle: &ArtifactBundle, config: &AnomalyConfig) -> Option<AnomalyDetector> {
    let dimension = bundle.feature_names.as_ref()?.len();

    let fitted = match &bundle.reference {
        Some(rows) if rows.first().map(Vec::len) == Some(dimension) => AnomalyDetector::fit(rows, config),
        Some(rows) => {
            warn!(
                expected = dimension,
                actual = rows.first().map(Vec::len).unwrap_or(0),
                "Reference features do not match the feature list"
            );
            AnomalyDetector::fit_synthetic(dimension, config)
        }
        None => AnomalyDetector::fit_synthetic(dimension, config),
    };

    match fitted {
        Ok(detector) => Some(detector),
        Err(e) => {
            warn!(error = %e, "Anomaly detector unavailable, anomaly signals disabled");
            None
        }
    }
}
