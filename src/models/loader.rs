//! Artifact store: loads classifiers, scaler, encoders and metadata from disk

use crate::config::{ArtifactsConfig, ModelFile};
use crate::models::artifacts::{ArtifactBundle, CategoryEncoder, FeatureImportances, FeatureScaler};
use crate::models::inference::OnnxClassifier;
use anyhow::{Context, Result};
use ort::session::{builder::GraphOptimizationLevel, Session};
use serde::de::DeserializeOwned;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Loader for ONNX models
pub struct ModelLoader {
    /// Number of threads for ONNX inference
    onnx_threads: usize,
}

impl ModelLoader {
    /// Create a new model loader with specified number of threads
    pub fn with_threads(onnx_threads: usize) -> Result<Self> {
        ort::init().commit()?;
        info!(onnx_threads = onnx_threads, "ONNX Runtime initialized");
        Ok(Self { onnx_threads })
    }

    /// Load a single ONNX classifier from file
    pub fn load_model<P: AsRef<Path>>(&self, path: P, name: &str) -> Result<OnnxClassifier> {
        let path = path.as_ref();

        info!(model = %name, path = %path.display(), threads = self.onnx_threads, "Loading ONNX model");

        let session = Session::builder()?
            .with_optimization_level(GraphOptimizationLevel::Level3)?
            .with_intra_threads(self.onnx_threads)?
            .commit_from_file(path)
            .context(format!("Failed to load model from {:?}", path))?;

        let input_name = session
            .inputs
            .first()
            .map(|i| i.name.clone())
            .unwrap_or_else(|| "float_input".to_string());

        let output_name = session
            .outputs
            .iter()
            .find(|o| o.name.contains("prob"))
            .or_else(|| session.outputs.last())
            .map(|o| o.name.clone())
            .unwrap_or_else(|| "probabilities".to_string());

        info!(
            model = %name,
            input = %input_name,
            output = %output_name,
            "Model loaded successfully"
        );

        Ok(OnnxClassifier::new(name, session, input_name, output_name))
    }
}

/// Reads every configured artifact into an [`ArtifactBundle`].
///
/// Loading never fails: a missing or unreadable artifact is logged and left
/// out of the bundle, which then decides the scoring mode.
pub struct ArtifactStore<'a> {
    config: &'a ArtifactsConfig,
    unknown_category_code: i64,
}

impl<'a> ArtifactStore<'a> {
    pub fn new(config: &'a ArtifactsConfig, unknown_category_code: i64) -> Self {
        Self {
            config,
            unknown_category_code,
        }
    }

    fn path(&self, file: &str) -> PathBuf {
        Path::new(&self.config.dir).join(file)
    }

    pub fn load(&self) -> ArtifactBundle {
        let mut bundle = ArtifactBundle::empty();

        bundle.scaler = self.optional::<FeatureScaler>("scaler", &self.config.scaler_file);
        bundle.feature_names = self.optional::<Vec<String>>("feature_names", &self.config.feature_names_file);
        bundle.importances = self.optional::<FeatureImportances>("feature_importance", &self.config.importance_file);
        bundle.reference = self.optional::<Vec<Vec<f32>>>("reference_features", &self.config.reference_file);

        if let Some(classes) = self.optional::<HashMap<String, Vec<String>>>("encoders", &self.config.encoders_file) {
            bundle.encoder = CategoryEncoder::from_classes(classes, self.unknown_category_code);
        } else {
            bundle.encoder = CategoryEncoder::new(self.unknown_category_code);
        }

        self.load_classifiers(&mut bundle);

        if bundle.is_complete() {
            info!(
                dir = %self.config.dir,
                models = ?bundle.model_names(),
                features = bundle.feature_names.as_ref().map(Vec::len).unwrap_or(0),
                encoded_fields = bundle.encoder.field_count(),
                "Artifacts loaded"
            );
        } else {
            warn!(
                dir = %self.config.dir,
                missing = ?bundle.missing(),
                "Artifacts incomplete, heuristic scoring only"
            );
        }

        bundle
    }

    fn load_classifiers(&self, bundle: &mut ArtifactBundle) {
        let candidates: Vec<(&ModelFile, PathBuf)> = std::iter::once(&self.config.primary)
            .chain(self.config.secondary.iter())
            .map(|model| (model, self.path(&model.file)))
            .collect();

        for (model, path) in &candidates {
            if !path.exists() {
                warn!(model = %model.name, path = %path.display(), "Model file not found");
            }
        }

        if !candidates.iter().any(|(_, path)| path.exists()) {
            return;
        }

        let loader = match ModelLoader::with_threads(self.config.onnx_threads.max(1)) {
            Ok(loader) => loader,
            Err(e) => {
                warn!(error = %e, "Failed to initialize ONNX Runtime, no classifiers loaded");
                return;
            }
        };

        for (index, (model, path)) in candidates.iter().enumerate() {
            if !path.exists() {
                continue;
            }
            match loader.load_model(path, &model.name) {
                Ok(classifier) if index == 0 => bundle.classifier = Some(Box::new(classifier)),
                Ok(classifier) => bundle.secondary.push(Box::new(classifier)),
                Err(e) => warn!(model = %model.name, error = %e, "Failed to load model, skipping"),
            }
        }
    }

    /// Read a JSON artifact, logging and returning `None` on any problem.
    fn optional<T: DeserializeOwned>(&self, artifact: &str, file: &str) -> Option<T> {
        let path = self.path(file);
        if !path.exists() {
            warn!(artifact = %artifact, path = %path.display(), "Artifact file not found");
            return None;
        }

        match read_json(&path) {
            Ok(value) => Some(value),
            Err(e) => {
                warn!(artifact = %artifact, error = %format!("{:#}", e), "Failed to read artifact");
                None
            }
        }
    }
}

fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let contents = fs::read_to_string(path).with_context(|| format!("Failed to read {}", path.display()))?;
    serde_json::from_str(&contents).with_context(|| format!("Failed to parse {}", path.display()))
}
