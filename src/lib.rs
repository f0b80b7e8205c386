//! Claim Fraud Scorer Library
//!
//! Scores insurance claims for fraud likelihood with a trained-model ensemble,
//! an isolation-forest anomaly overlay and a rule-based fallback, and explains
//! every score with human-readable reasons.

pub mod anomaly;
pub mod config;
pub mod consumer;
pub mod error;
pub mod explain;
pub mod feature_encoder;
pub mod heuristic;
pub mod metrics;
pub mod models;
pub mod orchestrator;
pub mod producer;
pub mod types;

pub use config::AppConfig;
pub use error::ScoreError;
pub use orchestrator::{Orchestrator, ScoringMode};
pub use types::{ClaimRecord, RiskCategory, ScoreResult};
