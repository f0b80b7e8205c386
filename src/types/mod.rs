//! Request and response types

pub mod claim;
pub mod score;

pub use claim::ClaimRecord;
pub use score::{ContributingFactor, ExplanationMethod, Impact, RiskCategory, RiskThresholds, ScoreResult};
