//! Vote aggregation across the primary and secondary classifiers

use crate::error::ScoreError;
use crate::models::artifacts::ArtifactBundle;
use crate::models::classifier::{Classifier, ClassifierOutput};
use crate::types::score::round_to;
use std::collections::BTreeMap;
use std::panic::{self, AssertUnwindSafe};
use tracing::{debug, warn};

/// Mean probability reported when no model voted
pub const NO_VOTE_PROBABILITY: f64 = 0.5;

/// Combined output of every classifier that answered
#[derive(Debug, Clone, PartialEq)]
pub struct EnsembleResult {
    /// Binary vote per model that produced one
    pub votes: BTreeMap<String, u8>,
    /// 1 iff strictly more than half of the votes are 1
    pub majority_prediction: u8,
    /// Mean of all collected probabilities
    pub mean_probability: f64,
    /// Share of votes matching the majority, in percent (2 decimals)
    pub agreement_pct: f64,
    /// Output of the primary classifier
    pub primary: ClassifierOutput,
}

/// Majority/mean/agreement over a set of collected outputs
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VoteSummary {
    pub majority_prediction: u8,
    pub mean_probability: f64,
    pub agreement_pct: f64,
}

/// Queries the bundle's classifiers and aggregates their votes.
#[derive(Debug, Default, Clone, Copy)]
pub struct EnsemblePredictor;

impl EnsemblePredictor {
    pub fn new() -> Self {
        Self
    }

    /// Run every classifier on a scaled feature vector.
    ///
    /// The primary classifier is required and its failure fails the call.
    /// A failing secondary classifier only loses its vote.
    pub fn predict(&self, features: &[f32], bundle: &ArtifactBundle) -> Result<EnsembleResult, ScoreError> {
        let primary_model = bundle.classifier.as_deref().ok_or(ScoreError::ArtifactsIncomplete)?;
        let primary = query(primary_model, features)?;

        let mut outputs: Vec<(String, ClassifierOutput)> = Vec::with_capacity(1 + bundle.secondary.len());
        outputs.push((primary_model.name().to_string(), primary));

        for model in &bundle.secondary {
            match query(model.as_ref(), features) {
                Ok(output) => {
                    let key = vote_key(&outputs, model.name());
                    if key != model.name() {
                        warn!(model = %model.name(), key = %key, "Duplicate model name, vote recorded under a suffixed key");
                    }
                    outputs.push((key, output));
                }
                Err(e) => {
                    warn!(
                        model = %model.name(),
                        error = %e,
                        "Secondary model failed, vote dropped"
                    );
                }
            }
        }

        let summary = Self::summarize(outputs.iter().map(|(_, output)| output));

        debug!(
            votes = outputs.len(),
            majority = summary.majority_prediction,
            mean_probability = summary.mean_probability,
            agreement = summary.agreement_pct,
            "Ensemble inference complete"
        );

        Ok(EnsembleResult {
            votes: outputs
                .into_iter()
                .map(|(name, output)| (name, output.label))
                .collect(),
            majority_prediction: summary.majority_prediction,
            mean_probability: summary.mean_probability,
            agreement_pct: summary.agreement_pct,
            primary,
        })
    }

    /// Majority vote, mean probability and agreement over collected outputs.
    ///
    /// Ties resolve to 0. With no outputs the agreement is 0 and the mean
    /// probability is the maximal-uncertainty value 0.5.
    pub fn summarize<'a, I>(outputs: I) -> VoteSummary
    where
        I: IntoIterator<Item = &'a ClassifierOutput>,
    {
        let outputs: Vec<&ClassifierOutput> = outputs.into_iter().collect();
        if outputs.is_empty() {
            return VoteSummary {
                majority_prediction: 0,
                mean_probability: NO_VOTE_PROBABILITY,
                agreement_pct: 0.0,
            };
        }

        let total = outputs.len();
        let fraud_votes = outputs.iter().filter(|output| output.label == 1).count();
        let majority_prediction = u8::from(fraud_votes * 2 > total);

        let agreeing = outputs
            .iter()
            .filter(|output| output.label == majority_prediction)
            .count();
        let mean_probability = outputs.iter().map(|output| output.probability).sum::<f64>() / total as f64;

        VoteSummary {
            majority_prediction,
            mean_probability,
            agreement_pct: round_to(agreeing as f64 / total as f64 * 100.0, 2),
        }
    }
}

/// Vote-map key for `name`: the name itself, or `name#2`, `name#3`, ... when
/// an earlier model already voted under it.
fn vote_key(taken: &[(String, ClassifierOutput)], name: &str) -> String {
    let is_taken = |candidate: &str| taken.iter().any(|(key, _)| key == candidate);
    if !is_taken(name) {
        return name.to_string();
    }
    (2..)
        .map(|n| format!("{}#{}", name, n))
        .find(|candidate| !is_taken(candidate.as_str()))
        .unwrap_or_else(|| name.to_string())
}

/// Call one classifier, turning panics and out-of-range probabilities into
/// errors.
fn query(model: &dyn Classifier, features: &[f32]) -> Result<ClassifierOutput, ScoreError> {
    let output = panic::catch_unwind(AssertUnwindSafe(|| model.predict(features)))
        .map_err(|_| ScoreError::model(model.name(), "classifier panicked"))??;

    if !output.probability.is_finite() || !(0.0..=1.0).contains(&output.probability) {
        return Err(ScoreError::InvalidProbability(output.probability));
    }
    if output.label > 1 {
        return Err(ScoreError::model(
            model.name(),
            format!("label {} is not binary", output.label),
        ));
    }
    Ok(output)
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Fixed(&'static str, f64);

    impl Classifier for Fixed {
        fn name(&self) -> &str {
            self.0
        }

        fn predict(&self, _features: &[f32]) -> Result<ClassifierOutput, ScoreError> {
            Ok(ClassifierOutput::from_probability(self.1))
        }
    }

    struct Broken(&'static str);

    impl Classifier for Broken {
        fn name(&self) -> &str {
            self.0
        }

        fn predict(&self, _features: &[f32]) -> Result<ClassifierOutput, ScoreError> {
            Err(ScoreError::model(self.0, "session closed"))
        }
    }

    struct Panicking;

    impl Classifier for Panicking {
        fn name(&self) -> &str {
            "Panicking"
        }

        fn predict(&self, _features: &[f32]) -> Result<ClassifierOutput, ScoreError> {
            panic!("tensor shape mismatch")
        }
    }

    fn out(probability: f64) -> ClassifierOutput {
        ClassifierOutput::from_probability(probability)
    }

    #[test]
    fn test_majority_and_agreement() {
        let outputs = [out(0.9), out(0.8), out(0.2)];
        let summary = EnsemblePredictor::summarize(&outputs);

        assert_eq!(summary.majority_prediction, 1);
        assert_eq!(summary.agreement_pct, 66.67);
        assert!((summary.mean_probability - 0.6333).abs() < 0.001);
    }

    #[test]
    fn test_tie_resolves_to_zero() {
        let outputs = [out(0.9), out(0.1)];
        let summary = EnsemblePredictor::summarize(&outputs);

        assert_eq!(summary.majority_prediction, 0);
        assert_eq!(summary.agreement_pct, 50.0);
        assert_eq!(summary.mean_probability, 0.5);
    }

    #[test]
    fn test_no_votes() {
        let none: [ClassifierOutput; 0] = [];
        let summary = EnsemblePredictor::summarize(&none);

        assert_eq!(summary.majority_prediction, 0);
        assert_eq!(summary.agreement_pct, 0.0);
        assert_eq!(summary.mean_probability, NO_VOTE_PROBABILITY);
    }

    #[test]
    fn test_single_model_is_unanimous() {
        let bundle = ArtifactBundle::empty().with_classifier(Box::new(Fixed("RandomForest", 0.72)));
        let result = EnsemblePredictor::new().predict(&[0.0; 4], &bundle).unwrap();

        assert_eq!(result.votes.len(), 1);
        assert_eq!(result.votes["RandomForest"], 1);
        assert_eq!(result.agreement_pct, 100.0);
        assert_eq!(result.mean_probability, 0.72);
        assert_eq!(result.primary.probability, 0.72);
    }

    #[test]
    fn test_failing_secondary_is_isolated() {
        let bundle = ArtifactBundle::empty()
            .with_classifier(Box::new(Fixed("RandomForest", 0.8)))
            .with_secondary(Box::new(Broken("XGBoost")))
            .with_secondary(Box::new(Panicking))
            .with_secondary(Box::new(Fixed("DecisionTree", 0.4)));

        let result = EnsemblePredictor::new().predict(&[0.0; 4], &bundle).unwrap();

        assert_eq!(result.votes.len(), 2);
        assert!(!result.votes.contains_key("XGBoost"));
        assert!(!result.votes.contains_key("Panicking"));
        assert_eq!(result.majority_prediction, 0);
        assert_eq!(result.agreement_pct, 50.0);
        assert!((result.mean_probability - 0.6).abs() < 1e-9);
    }

    #[test]
    fn test_duplicate_names_keep_every_vote() {
        let bundle = ArtifactBundle::empty()
            .with_classifier(Box::new(Fixed("RandomForest", 0.9)))
            .with_secondary(Box::new(Fixed("RandomForest", 0.1)))
            .with_secondary(Box::new(Fixed("XGBoost", 0.2)))
            .with_secondary(Box::new(Fixed("RandomForest", 0.3)));

        let result = EnsemblePredictor::new().predict(&[0.0; 4], &bundle).unwrap();

        assert_eq!(result.votes.len(), 4);
        assert_eq!(result.votes["RandomForest"], 1);
        assert_eq!(result.votes["RandomForest#2"], 0);
        assert_eq!(result.votes["RandomForest#3"], 0);
        assert_eq!(result.votes["XGBoost"], 0);
        assert_eq!(result.agreement_pct, 75.0);
    }

    #[test]
    fn test_failing_primary_fails_prediction() {
        let bundle = ArtifactBundle::empty()
            .with_classifier(Box::new(Broken("RandomForest")))
            .with_secondary(Box::new(Fixed("XGBoost", 0.9)));

        let err = EnsemblePredictor::new().predict(&[0.0; 4], &bundle).unwrap_err();
        assert!(matches!(err, ScoreError::ModelInvocation { .. }));
    }

    #[test]
    fn test_out_of_range_probability_is_rejected() {
        let bundle = ArtifactBundle::empty().with_classifier(Box::new(Fixed("RandomForest", f64::NAN)));
        let err = EnsemblePredictor::new().predict(&[0.0; 4], &bundle).unwrap_err();
        assert!(matches!(err, ScoreError::InvalidProbability(_)));
    }

    #[test]
    fn test_missing_primary() {
        let err = EnsemblePredictor::new()
            .predict(&[0.0; 4], &ArtifactBundle::empty())
            .unwrap_err();
        assert!(matches!(err, ScoreError::ArtifactsIncomplete));
    }
}
