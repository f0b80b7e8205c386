//! Black-box classifier capability

use crate::error::ScoreError;

/// Output of one binary classifier for one feature vector
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClassifierOutput {
    /// Predicted class (0 or 1)
    pub label: u8,
    /// Probability of class 1
    pub probability: f64,
}

impl ClassifierOutput {
    /// Derive the label the way a binary argmax does: class 1 only when its
    /// probability strictly exceeds class 0's.
    pub fn from_probability(probability: f64) -> Self {
        Self {
            label: u8::from(probability > 0.5),
            probability,
        }
    }

    /// Probability of the predicted class.
    pub fn max_class_probability(&self) -> f64 {
        self.probability.max(1.0 - self.probability)
    }
}

/// A trained binary classifier over scaled feature vectors.
///
/// Implementations must be shareable across concurrent requests.
pub trait Classifier: Send + Sync {
    /// Name reported in the per-model vote map
    fn name(&self) -> &str;

    /// Score one scaled feature vector.
    fn predict(&self, features: &[f32]) -> Result<ClassifierOutput, ScoreError>;
}
