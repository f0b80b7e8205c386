//! Configuration management for the claim scoring service

use crate::types::score::RiskThresholds;
use anyhow::{Context, Result};
use config::{Config, Environment, File, FileFormat, FileSourceFile};
use serde::Deserialize;
use std::path::Path;

/// Default configuration file location
pub const DEFAULT_CONFIG_PATH: &str = "config/config.toml";
/// Environment variable overriding the configuration file location
pub const CONFIG_PATH_ENV: &str = "CLAIM_SCORER_CONFIG";

/// Main application configuration
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub nats: NatsConfig,
    pub artifacts: ArtifactsConfig,
    pub scoring: ScoringConfig,
    pub anomaly: AnomalyConfig,
    pub pipeline: PipelineConfig,
    pub logging: LoggingConfig,
}

/// NATS connection configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct NatsConfig {
    /// NATS server URL
    pub url: String,
    /// Subject for incoming claims
    pub claim_subject: String,
    /// Subject every score result is published to
    pub result_subject: String,
}

impl Default for NatsConfig {
    fn default() -> Self {
        Self {
            url: "nats://localhost:4222".to_string(),
            claim_subject: "claims".to_string(),
            result_subject: "claims.scored".to_string(),
        }
    }
}

/// A classifier file and the name it votes under
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ModelFile {
    pub name: String,
    pub file: String,
}

impl ModelFile {
    fn new(name: &str, file: &str) -> Self {
        Self {
            name: name.to_string(),
            file: file.to_string(),
        }
    }
}

/// Trained artifact locations
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ArtifactsConfig {
    /// Directory containing every artifact file
    pub dir: String,
    /// Primary classifier (required for ML mode)
    pub primary: ModelFile,
    /// Additional ensemble members
    pub secondary: Vec<ModelFile>,
    pub scaler_file: String,
    pub feature_names_file: String,
    pub encoders_file: String,
    pub importance_file: String,
    /// Scaled reference rows for the anomaly detector
    pub reference_file: String,
    /// Number of threads for ONNX inference per model
    pub onnx_threads: usize,
}

impl Default for ArtifactsConfig {
    fn default() -> Self {
        Self {
            dir: "artifacts".to_string(),
            primary: ModelFile::new("RandomForest", "fraud_model.onnx"),
            secondary: vec![
                ModelFile::new("XGBoost", "xgb_model.onnx"),
                ModelFile::new("DecisionTree", "dt_model.onnx"),
            ],
            scaler_file: "scaler.json".to_string(),
            feature_names_file: "feature_names.json".to_string(),
            encoders_file: "encoders.json".to_string(),
            importance_file: "feature_importance.json".to_string(),
            reference_file: "reference_features.json".to_string(),
            onnx_threads: 1,
        }
    }
}

/// Scoring and explanation settings
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ScoringConfig {
    /// Code used for categories not seen at training time
    pub unknown_category_sentinel: i64,
    /// Number of contributing factors reported
    pub top_factors: usize,
    /// Version label attached to every result
    pub model_version: String,
    pub risk_levels: RiskThresholds,
    /// Minimum probability at which an anomaly forces the Critical category
    pub anomaly_override_probability: f64,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            unknown_category_sentinel: -1,
            top_factors: 5,
            model_version: "2.0-XAI".to_string(),
            risk_levels: RiskThresholds::default(),
            anomaly_override_probability: 0.30,
        }
    }
}

/// Isolation forest settings
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AnomalyConfig {
    pub num_trees: usize,
    /// Rows drawn per tree
    pub sample_size: usize,
    /// Expected share of outliers in the reference data
    pub contamination: f64,
    pub seed: u64,
    /// Standard-normal rows generated when no reference file exists
    pub synthetic_reference_rows: usize,
}

impl Default for AnomalyConfig {
    fn default() -> Self {
        Self {
            num_trees: 100,
            sample_size: 256,
            contamination: 0.1,
            seed: 42,
            synthetic_reference_rows: 512,
        }
    }
}

/// Pipeline configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Maximum claims scored concurrently
    pub workers: usize,
    /// Seconds between metrics summaries
    pub metrics_interval_secs: u64,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            workers: 4,
            metrics_interval_secs: 30,
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,
    /// Log format (json, pretty)
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "pretty".to_string(),
        }
    }
}

impl AppConfig {
    /// Load configuration from `CLAIM_SCORER_CONFIG` or the default path.
    /// A missing file leaves the built-in defaults, still subject to
    /// environment overrides.
    pub fn load() -> Result<Self> {
        Self::build(File::from(Path::new(&Self::path())).required(false), environment())
    }

    /// Configuration file location in effect
    pub fn path() -> String {
        std::env::var(CONFIG_PATH_ENV).unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string())
    }

    /// Load configuration from a specific path, with `CLAIM_SCORER__*`
    /// environment overrides (e.g. `CLAIM_SCORER__NATS__URL`)
    pub fn load_from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::build(File::from(path.as_ref()), environment())
    }

    fn build(file: File<FileSourceFile, FileFormat>, env: Environment) -> Result<Self> {
        let config = Config::builder()
            .add_source(file)
            .add_source(env)
            .build()
            .context("Failed to build configuration")?;

        config
            .try_deserialize()
            .context("Failed to deserialize configuration")
    }
}

fn environment() -> Environment {
    Environment::with_prefix("CLAIM_SCORER").separator("__")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.nats.url, "nats://localhost:4222");
        assert_eq!(config.artifacts.primary.name, "RandomForest");
        assert_eq!(config.artifacts.secondary.len(), 2);
        assert_eq!(config.scoring.unknown_category_sentinel, -1);
        assert_eq!(config.scoring.risk_levels.critical, 0.70);
        assert_eq!(config.anomaly.contamination, 0.1);
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(
            file,
            r#"
[nats]
url = "nats://scoring:4222"

[artifacts]
dir = "/srv/models"
secondary = [{{ name = "XGBoost", file = "xgb.onnx" }}]

[scoring]
top_factors = 3
"#
        )
        .unwrap();

        let config = AppConfig::load_from_path(file.path()).unwrap();
        assert_eq!(config.nats.url, "nats://scoring:4222");
        assert_eq!(config.nats.claim_subject, "claims");
        assert_eq!(config.artifacts.dir, "/srv/models");
        assert_eq!(config.artifacts.secondary, vec![ModelFile::new("XGBoost", "xgb.onnx")]);
        assert_eq!(config.artifacts.primary.file, "fraud_model.onnx");
        assert_eq!(config.scoring.top_factors, 3);
        assert_eq!(config.scoring.model_version, "2.0-XAI");
    }

    #[test]
    fn test_environment_overrides_without_file() {
        let vars: config::Map<String, String> = [
            ("CLAIM_SCORER__NATS__URL", "nats://override:4222"),
            ("CLAIM_SCORER__PIPELINE__WORKERS", "8"),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();

        let file = File::from(Path::new("/nonexistent/claim-scorer.toml")).required(false);
        let config = AppConfig::build(file, environment().source(Some(vars))).unwrap();

        assert_eq!(config.nats.url, "nats://override:4222");
        assert_eq!(config.nats.claim_subject, "claims");
        assert_eq!(config.pipeline.workers, 8);
        assert_eq!(config.scoring.model_version, "2.0-XAI");
    }

    #[test]
    fn test_missing_file_is_an_error() {
        assert!(AppConfig::load_from_path("/nonexistent/claim-scorer.toml").is_err());
    }
}
