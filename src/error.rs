//! Error taxonomy for the scoring core

use thiserror::Error;

/// Errors raised by the scoring components.
///
/// None of these ever reach the caller of [`crate::Orchestrator::score`]; the
/// orchestrator translates each one into a degraded but well-formed result.
#[derive(Debug, Error)]
pub enum ScoreError {
    /// Generic feature encoding failure
    #[error("encoding failed: {0}")]
    Encoding(String),

    /// Feature list names a field the encoder cannot produce
    #[error("unknown feature '{0}'")]
    UnknownFeature(String),

    /// Categorical feature with no lookup table in the encoder artifact
    #[error("no category encoder for field '{0}'")]
    MissingEncoder(String),

    /// Date string could not be parsed into year/month
    #[error("invalid date '{value}' for {field}")]
    InvalidDate { field: &'static str, value: String },

    /// Vector length does not match what an artifact was fit with
    #[error("dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    /// A classifier failed (or panicked) while scoring
    #[error("model '{model}' failed: {reason}")]
    ModelInvocation { model: String, reason: String },

    /// A probability outside [0, 1] or not finite
    #[error("invalid probability {0}")]
    InvalidProbability(f64),

    /// Anomaly detector could not score the vector
    #[error("anomaly detection failed: {0}")]
    Anomaly(String),

    /// ML path requested without classifier, scaler and feature names
    #[error("artifact bundle is incomplete")]
    ArtifactsIncomplete,
}

impl ScoreError {
    /// Wrap a classifier failure.
    pub fn model(model: impl Into<String>, reason: impl ToString) -> Self {
        ScoreError::ModelInvocation {
            model: model.into(),
            reason: reason.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        let err = ScoreError::model("XGBoost", "session closed");
        assert_eq!(err.to_string(), "model 'XGBoost' failed: session closed");

        let err = ScoreError::DimensionMismatch {
            expected: 39,
            actual: 12,
        };
        assert_eq!(err.to_string(), "dimension mismatch: expected 39, got 12");
    }
}
