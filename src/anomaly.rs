//! Anomaly detection over scaled feature vectors.
//!
//! An isolation forest is fit once at startup on reference rows and then
//! only scores requests. Anomalies are easier to isolate and so have shorter
//! average path lengths across the trees.

use crate::config::AnomalyConfig;
use crate::error::ScoreError;
use crate::types::score::round_to;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::StandardNormal;
use tracing::{info, warn};

/// Euler-Mascheroni constant, used by the harmonic-number approximation
const EULER_GAMMA: f64 = 0.5772156649;

/// Average path length of an unsuccessful BST search over `n` points, c(n)
fn average_path_length(n: usize) -> f64 {
    if n <= 1 {
        return 0.0;
    }
    let n = n as f64;
    2.0 * (n.ln() + EULER_GAMMA) - 2.0 * (n - 1.0) / n
}

#[derive(Debug, Clone)]
enum IsolationNode {
    Leaf {
        size: usize,
    },
    Internal {
        feature_idx: usize,
        split_value: f32,
        left: Box<IsolationNode>,
        right: Box<IsolationNode>,
    },
}

impl IsolationNode {
    fn build<R: Rng>(samples: &[&[f32]], n_features: usize, depth: usize, max_depth: usize, rng: &mut R) -> Self {
        if depth >= max_depth || samples.len() <= 1 {
            return IsolationNode::Leaf { size: samples.len() };
        }

        let feature_idx = rng.gen_range(0..n_features);

        let (min_val, max_val) = samples
            .iter()
            .map(|sample| sample[feature_idx])
            .fold((f32::MAX, f32::MIN), |(min, max), v| (min.min(v), max.max(v)));

        // f32 spans can overflow to inf; widen before sampling
        let (low, high) = (f64::from(min_val), f64::from(max_val));
        if high - low <= f64::from(f32::EPSILON) {
            return IsolationNode::Leaf { size: samples.len() };
        }

        let split_value = rng.gen_range(low..high) as f32;

        let (left, right): (Vec<&[f32]>, Vec<&[f32]>) = samples
            .iter()
            .copied()
            .partition(|sample| sample[feature_idx] < split_value);

        IsolationNode::Internal {
            feature_idx,
            split_value,
            left: Box::new(Self::build(&left, n_features, depth + 1, max_depth, rng)),
            right: Box::new(Self::build(&right, n_features, depth + 1, max_depth, rng)),
        }
    }

    fn path_length(&self, sample: &[f32], depth: usize) -> f64 {
        match self {
            IsolationNode::Leaf { size } => depth as f64 + average_path_length(*size),
            IsolationNode::Internal {
                feature_idx,
                split_value,
                left,
                right,
            } => {
                let next = if sample[*feature_idx] < *split_value { left } else { right };
                next.path_length(sample, depth + 1)
            }
        }
    }
}

/// Isolation forest with a fixed dimensionality
#[derive(Debug, Clone)]
pub struct IsolationForest {
    trees: Vec<IsolationNode>,
    dimension: usize,
    /// c(n) for the per-tree sample size actually used
    normalizer: f64,
}

impl IsolationForest {
    /// Fit on `data`; every row must have the same, non-zero length.
    pub fn fit<R: Rng>(data: &[Vec<f32>], num_trees: usize, sample_size: usize, rng: &mut R) -> Result<Self, ScoreError> {
        let dimension = data
            .first()
            .map(Vec::len)
            .filter(|&len| len > 0)
            .ok_or_else(|| ScoreError::Anomaly("no reference rows".to_string()))?;

        if let Some(row) = data.iter().find(|row| row.len() != dimension) {
            return Err(ScoreError::DimensionMismatch {
                expected: dimension,
                actual: row.len(),
            });
        }
        if data.iter().flatten().any(|v| !v.is_finite()) {
            return Err(ScoreError::Anomaly("reference rows contain non-finite values".to_string()));
        }

        let sample_size = sample_size.clamp(1, data.len());
        let max_depth = (sample_size as f64).log2().ceil() as usize;

        let trees = (0..num_trees.max(1))
            .map(|_| {
                // Sample with replacement
                let sample: Vec<&[f32]> = (0..sample_size)
                    .map(|_| data[rng.gen_range(0..data.len())].as_slice())
                    .collect();
                IsolationNode::build(&sample, dimension, 0, max_depth, rng)
            })
            .collect();

        Ok(Self {
            trees,
            dimension,
            normalizer: average_path_length(sample_size),
        })
    }

    pub fn dimension(&self) -> usize {
        self.dimension
    }

    /// Anomaly score `2^(-E[h(x)] / c(n))` in (0, 1]; higher is more anomalous.
    pub fn score(&self, sample: &[f32]) -> Result<f64, ScoreError> {
        if sample.len() != self.dimension {
            return Err(ScoreError::DimensionMismatch {
                expected: self.dimension,
                actual: sample.len(),
            });
        }
        if sample.iter().any(|v| !v.is_finite()) {
            return Err(ScoreError::Anomaly("feature vector contains non-finite values".to_string()));
        }
        if self.normalizer == 0.0 {
            return Ok(0.5);
        }

        let mean_path =
            self.trees.iter().map(|tree| tree.path_length(sample, 0)).sum::<f64>() / self.trees.len() as f64;

        Ok(2.0_f64.powf(-mean_path / self.normalizer))
    }
}

/// Flag and score for one feature vector
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AnomalySignal {
    pub is_anomaly: bool,
    pub score: f64,
}

impl AnomalySignal {
    pub const NONE: AnomalySignal = AnomalySignal {
        is_anomaly: false,
        score: 0.0,
    };
}

/// Fit-once, score-many outlier detector.
#[derive(Debug, Clone)]
pub struct AnomalyDetector {
    forest: IsolationForest,
    /// Scores strictly above this are flagged
    threshold: f64,
}

impl AnomalyDetector {
    /// Fit on reference rows. The flag threshold is the `(1 - contamination)`
    /// quantile of the reference scores.
    pub fn fit(reference: &[Vec<f32>], config: &AnomalyConfig) -> Result<Self, ScoreError> {
        let mut rng = StdRng::seed_from_u64(config.seed);
        let forest = IsolationForest::fit(reference, config.num_trees, config.sample_size, &mut rng)?;

        let mut scores = reference
            .iter()
            .map(|row| forest.score(row))
            .collect::<Result<Vec<f64>, ScoreError>>()?;
        scores.sort_by(|a, b| a.total_cmp(b));

        let contamination = config.contamination.clamp(0.0, 0.5);
        let rank = ((1.0 - contamination) * scores.len() as f64).ceil() as usize;
        let threshold = scores[rank.clamp(1, scores.len()) - 1];

        info!(
            rows = reference.len(),
            dimension = forest.dimension(),
            trees = config.num_trees,
            threshold = threshold,
            "Anomaly detector fitted"
        );

        Ok(Self { forest, threshold })
    }

    /// Fit on standard-normal rows, the distribution a standard scaler
    /// produces for in-distribution data.
    pub fn fit_synthetic(dimension: usize, config: &AnomalyConfig) -> Result<Self, ScoreError> {
        let mut rng = StdRng::seed_from_u64(config.seed.wrapping_add(1));
        let rows: Vec<Vec<f32>> = (0..config.synthetic_reference_rows.max(2))
            .map(|_| (0..dimension).map(|_| rng.sample::<f32, _>(StandardNormal)).collect())
            .collect();

        warn!(
            rows = rows.len(),
            dimension = dimension,
            "No reference features, anomaly detector fitted on synthetic rows"
        );
        Self::fit(&rows, config)
    }

    pub fn dimension(&self) -> usize {
        self.forest.dimension()
    }

    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    pub fn try_detect(&self, features: &[f32]) -> Result<AnomalySignal, ScoreError> {
        if features.is_empty() {
            return Err(ScoreError::Anomaly("empty feature vector".to_string()));
        }
        let score = self.forest.score(features)?;

        Ok(AnomalySignal {
            is_anomaly: score > self.threshold,
            score: round_to(score, 4),
        })
    }

    /// Best-effort detection; any failure yields `(false, 0.0)`.
    pub fn detect(&self, features: &[f32]) -> AnomalySignal {
        match self.try_detect(features) {
            Ok(signal) => signal,
            Err(e) => {
                warn!(error = %e, "Anomaly detection failed, using defaults");
                AnomalySignal::NONE
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> AnomalyConfig {
        AnomalyConfig {
            num_trees: 50,
            sample_size: 128,
            synthetic_reference_rows: 400,
            ..Default::default()
        }
    }

    /// Uniform rows in [-1, 1)
    fn grid(dimension: usize) -> Vec<Vec<f32>> {
        let mut rng = StdRng::seed_from_u64(7);
        (0..300)
            .map(|_| (0..dimension).map(|_| rng.gen_range(-1.0..1.0)).collect())
            .collect()
    }

    #[test]
    fn test_average_path_length() {
        assert_eq!(average_path_length(0), 0.0);
        assert_eq!(average_path_length(1), 0.0);
        assert!((average_path_length(2) - 0.1544).abs() < 1e-3);
        assert!(average_path_length(256) > average_path_length(16));
    }

    #[test]
    fn test_outlier_scores_higher() {
        let detector = AnomalyDetector::fit(&grid(4), &config()).unwrap();

        let inlier = detector.try_detect(&[0.0, 0.0, 0.0, 0.0]).unwrap();
        let outlier = detector.try_detect(&[9.0, -9.0, 9.0, -9.0]).unwrap();

        assert!(outlier.score > inlier.score);
        assert!(outlier.is_anomaly);
        assert!(!inlier.is_anomaly);
        assert!(outlier.score > 0.0 && outlier.score <= 1.0);
    }

    #[test]
    fn test_fit_is_deterministic() {
        let a = AnomalyDetector::fit(&grid(3), &config()).unwrap();
        let b = AnomalyDetector::fit(&grid(3), &config()).unwrap();

        assert_eq!(a.threshold(), b.threshold());
        assert_eq!(
            a.detect(&[0.3, -0.2, 5.0]),
            b.detect(&[0.3, -0.2, 5.0])
        );
    }

    #[test]
    fn test_synthetic_reference() {
        let detector = AnomalyDetector::fit_synthetic(6, &config()).unwrap();
        assert_eq!(detector.dimension(), 6);

        assert!(detector.detect(&[8.0; 6]).is_anomaly);
        assert!(!detector.detect(&[0.0; 6]).is_anomaly);
    }

    #[test]
    fn test_malformed_vectors_default() {
        let detector = AnomalyDetector::fit(&grid(4), &config()).unwrap();

        assert_eq!(detector.detect(&[]), AnomalySignal::NONE);
        assert_eq!(detector.detect(&[0.0, 1.0]), AnomalySignal::NONE);
        assert_eq!(detector.detect(&[0.0, f32::NAN, 0.0, 0.0]), AnomalySignal::NONE);
        assert!(matches!(
            detector.try_detect(&[0.0, 1.0]),
            Err(ScoreError::DimensionMismatch { expected: 4, actual: 2 })
        ));
    }

    #[test]
    fn test_extreme_reference_values() {
        let reference = vec![vec![3.0e38, 1.0], vec![-3.0e38, -1.0], vec![0.0, 0.0], vec![f32::MAX, f32::MIN]];
        let detector = AnomalyDetector::fit(&reference, &config()).unwrap();

        let signal = detector.try_detect(&[1.0e38, 0.5]).unwrap();
        assert!(signal.score > 0.0 && signal.score <= 1.0);
    }

    #[test]
    fn test_fit_rejects_bad_reference() {
        assert!(AnomalyDetector::fit(&[], &config()).is_err());
        assert!(AnomalyDetector::fit(&[vec![0.0, 1.0], vec![0.0]], &config()).is_err());
    }
}
