//! Trained artifacts and classifier inference

pub mod artifacts;
pub mod classifier;
pub mod ensemble;
pub mod inference;
pub mod loader;

pub use artifacts::{ArtifactBundle, CategoryEncoder, FeatureImportances, FeatureScaler};
pub use classifier::{Classifier, ClassifierOutput};
pub use ensemble::{EnsemblePredictor, EnsembleResult};
pub use inference::OnnxClassifier;
pub use loader::{ArtifactStore, ModelLoader};
