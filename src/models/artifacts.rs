//! Trained artifacts consumed by the scoring core.
//!
//! The bundle is built once at startup and only ever read afterwards, so it
//! can be shared by reference across any number of concurrent requests.

use crate::error::ScoreError;
use crate::models::classifier::Classifier;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Standard scaler fit at training time: `(x - mean) / scale`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureScaler {
    pub mean: Vec<f64>,
    pub scale: Vec<f64>,
}

impl FeatureScaler {
    pub fn new(mean: Vec<f64>, scale: Vec<f64>) -> Self {
        Self { mean, scale }
    }

    /// Number of features the scaler was fit with.
    pub fn len(&self) -> usize {
        self.mean.len()
    }

    pub fn is_empty(&self) -> bool {
        self.mean.is_empty()
    }

    /// Mean and scale arrays agree in length.
    pub fn is_consistent(&self) -> bool {
        self.mean.len() == self.scale.len()
    }

    /// Scale a raw feature vector.
    pub fn transform(&self, raw: &[f64]) -> Result<Vec<f32>, ScoreError> {
        if raw.len() != self.len() || !self.is_consistent() {
            return Err(ScoreError::DimensionMismatch {
                expected: self.len(),
                actual: raw.len(),
            });
        }

        Ok(raw
            .iter()
            .zip(self.mean.iter().zip(&self.scale))
            .map(|(&x, (&mean, &scale))| {
                // Constant training columns are stored with zero scale
                let scale = if scale == 0.0 { 1.0 } else { scale };
                ((x - mean) / scale) as f32
            })
            .collect())
    }
}

/// Per-field category lookup learned at training time.
///
/// Codes are the index of the value in the field's sorted class list, the
/// same layout a label encoder persists.
#[derive(Debug, Clone)]
pub struct CategoryEncoder {
    tables: HashMap<String, HashMap<String, i64>>,
    /// Code returned for a value not seen during training
    unknown_code: i64,
}

/// Code for categories unseen at training time
pub const DEFAULT_UNKNOWN_CATEGORY_CODE: i64 = -1;

impl Default for CategoryEncoder {
    fn default() -> Self {
        Self::new(DEFAULT_UNKNOWN_CATEGORY_CODE)
    }
}

impl CategoryEncoder {
    pub fn new(unknown_code: i64) -> Self {
        Self {
            tables: HashMap::new(),
            unknown_code,
        }
    }

    /// Build from `{ field: [class0, class1, ..] }`.
    pub fn from_classes(classes: HashMap<String, Vec<String>>, unknown_code: i64) -> Self {
        let tables = classes
            .into_iter()
            .map(|(field, values)| {
                let table = values
                    .into_iter()
                    .enumerate()
                    .map(|(code, value)| (value, code as i64))
                    .collect();
                (field, table)
            })
            .collect();

        Self {
            tables,
            unknown_code,
        }
    }

    pub fn with_field(mut self, field: &str, classes: &[&str]) -> Self {
        let table = classes
            .iter()
            .enumerate()
            .map(|(code, value)| (value.to_string(), code as i64))
            .collect();
        self.tables.insert(field.to_string(), table);
        self
    }

    pub fn has_field(&self, field: &str) -> bool {
        self.tables.contains_key(field)
    }

    pub fn unknown_code(&self) -> i64 {
        self.unknown_code
    }

    /// Encode a value; unseen values map to the unknown code.
    pub fn encode(&self, field: &str, value: &str) -> Result<i64, ScoreError> {
        let table = self
            .tables
            .get(field)
            .ok_or_else(|| ScoreError::MissingEncoder(field.to_string()))?;

        Ok(table.get(value).copied().unwrap_or(self.unknown_code))
    }

    pub fn field_count(&self) -> usize {
        self.tables.len()
    }
}

/// Per-feature importance weights of the primary classifier
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FeatureImportances(pub HashMap<String, f64>);

impl FeatureImportances {
    /// Features sorted by descending importance, ties broken by name.
    pub fn ranked(&self) -> Vec<(&str, f64)> {
        let mut ranked: Vec<(&str, f64)> = self
            .0
            .iter()
            .filter(|(_, importance)| importance.is_finite())
            .map(|(name, &importance)| (name.as_str(), importance))
            .collect();

        ranked.sort_by(|a, b| {
            b.1.partial_cmp(&a.1)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.0.cmp(b.0))
        });
        ranked
    }
}

/// Everything loaded from the artifact store.
#[derive(Default)]
pub struct ArtifactBundle {
    /// Primary classifier (required for ML mode)
    pub classifier: Option<Box<dyn Classifier>>,
    /// Optional additional ensemble members
    pub secondary: Vec<Box<dyn Classifier>>,
    /// Required for ML mode
    pub scaler: Option<FeatureScaler>,
    /// Ordered feature names (required for ML mode)
    pub feature_names: Option<Vec<String>>,
    pub encoder: CategoryEncoder,
    pub importances: Option<FeatureImportances>,
    /// Scaled reference rows for fitting the anomaly detector
    pub reference: Option<Vec<Vec<f32>>>,
}

impl ArtifactBundle {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn with_classifier(mut self, classifier: Box<dyn Classifier>) -> Self {
        self.classifier = Some(classifier);
        self
    }

    pub fn with_secondary(mut self, classifier: Box<dyn Classifier>) -> Self {
        self.secondary.push(classifier);
        self
    }

    pub fn with_scaler(mut self, scaler: FeatureScaler) -> Self {
        self.scaler = Some(scaler);
        self
    }

    pub fn with_feature_names(mut self, names: Vec<String>) -> Self {
        self.feature_names = Some(names);
        self
    }

    pub fn with_encoder(mut self, encoder: CategoryEncoder) -> Self {
        self.encoder = encoder;
        self
    }

    pub fn with_importances(mut self, importances: FeatureImportances) -> Self {
        self.importances = Some(importances);
        self
    }

    pub fn with_reference(mut self, rows: Vec<Vec<f32>>) -> Self {
        self.reference = Some(rows);
        self
    }

    /// True iff classifier, scaler and feature names are all present and
    /// mutually consistent.
    pub fn is_complete(&self) -> bool {
        match (&self.classifier, &self.scaler, &self.feature_names) {
            (Some(_), Some(scaler), Some(names)) => {
                !names.is_empty() && scaler.is_consistent() && scaler.len() == names.len()
            }
            _ => false,
        }
    }

    /// Names of the classifiers present, primary first.
    pub fn model_names(&self) -> Vec<String> {
        self.classifier
            .iter()
            .chain(self.secondary.iter())
            .map(|model| model.name().to_string())
            .collect()
    }

    /// Human-readable list of what is missing, for startup logging.
    pub fn missing(&self) -> Vec<&'static str> {
        let mut missing = Vec::new();
        if self.classifier.is_none() {
            missing.push("classifier");
        }
        if self.scaler.is_none() {
            missing.push("scaler");
        }
        if self.feature_names.is_none() {
            missing.push("feature_names");
        }
        if let (Some(scaler), Some(names)) = (&self.scaler, &self.feature_names) {
            if !scaler.is_consistent() || scaler.len() != names.len() {
                missing.push("consistent scaler/feature_names");
            }
        }
        missing
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::classifier::ClassifierOutput;

    struct Constant;

    impl Classifier for Constant {
        fn name(&self) -> &str {
            "Constant"
        }

        fn predict(&self, _features: &[f32]) -> Result<ClassifierOutput, ScoreError> {
            Ok(ClassifierOutput::from_probability(0.3))
        }
    }

    fn names(n: usize) -> Vec<String> {
        (0..n).map(|i| format!("f{}", i)).collect()
    }

    #[test]
    fn test_scaler_transform() {
        let scaler = FeatureScaler::new(vec![10.0, 0.0, 5.0], vec![2.0, 1.0, 0.0]);
        let scaled = scaler.transform(&[14.0, -1.0, 7.0]).unwrap();
        assert_eq!(scaled, vec![2.0, -1.0, 2.0]);
    }

    #[test]
    fn test_scaler_rejects_wrong_length() {
        let scaler = FeatureScaler::new(vec![0.0; 3], vec![1.0; 3]);
        let err = scaler.transform(&[1.0, 2.0]).unwrap_err();
        assert!(matches!(
            err,
            ScoreError::DimensionMismatch {
                expected: 3,
                actual: 2
            }
        ));
    }

    #[test]
    fn test_encoder_unseen_category_maps_to_sentinel() {
        let encoder = CategoryEncoder::new(-1).with_field("insured_hobbies", &["chess", "golf", "polo"]);

        assert_eq!(encoder.encode("insured_hobbies", "golf").unwrap(), 1);
        assert_eq!(encoder.encode("insured_hobbies", "kite-surfing").unwrap(), -1);
        assert!(matches!(
            encoder.encode("auto_make", "Saab"),
            Err(ScoreError::MissingEncoder(_))
        ));
    }

    #[test]
    fn test_encoder_from_classes() {
        let mut classes = HashMap::new();
        classes.insert("policy_state".to_string(), vec!["IL".to_string(), "IN".to_string(), "OH".to_string()]);
        let encoder = CategoryEncoder::from_classes(classes, -1);

        assert_eq!(encoder.encode("policy_state", "OH").unwrap(), 2);
        assert_eq!(encoder.field_count(), 1);
    }

    #[test]
    fn test_importances_ranked() {
        let mut map = HashMap::new();
        map.insert("incident_severity".to_string(), 0.31);
        map.insert("insured_hobbies".to_string(), 0.12);
        map.insert("age".to_string(), 0.02);
        map.insert("auto_year".to_string(), 0.02);

        let importances = FeatureImportances(map);
        let ranked = importances.ranked();

        assert_eq!(ranked[0].0, "incident_severity");
        assert_eq!(ranked[1].0, "insured_hobbies");
        assert_eq!(ranked[2].0, "age");
        assert_eq!(ranked[3].0, "auto_year");
    }

    #[test]
    fn test_bundle_completeness() {
        assert!(!ArtifactBundle::empty().is_complete());

        let bundle = ArtifactBundle::empty()
            .with_classifier(Box::new(Constant))
            .with_scaler(FeatureScaler::new(vec![0.0; 3], vec![1.0; 3]))
            .with_feature_names(names(3));
        assert!(bundle.is_complete());
        assert!(bundle.missing().is_empty());
        assert_eq!(bundle.model_names(), vec!["Constant"]);

        let mismatched = ArtifactBundle::empty()
            .with_classifier(Box::new(Constant))
            .with_scaler(FeatureScaler::new(vec![0.0; 3], vec![1.0; 3]))
            .with_feature_names(names(4));
        assert!(!mismatched.is_complete());

        let no_scaler = ArtifactBundle::empty()
            .with_classifier(Box::new(Constant))
            .with_feature_names(names(3));
        assert!(!no_scaler.is_complete());
        assert_eq!(no_scaler.missing(), vec!["scaler"]);
    }
}
