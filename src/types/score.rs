//! Scoring result data structures

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Probability at or above which a claim is flagged as fraud
pub const FRAUD_PROBABILITY_CUTOFF: f64 = 0.5;

/// Risk category, ordered from least to most severe
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum RiskCategory {
    #[serde(rename = "Low Risk")]
    Low,
    #[serde(rename = "Medium Risk")]
    Medium,
    #[serde(rename = "High Risk")]
    High,
    #[serde(rename = "Critical")]
    Critical,
}

impl RiskCategory {
    /// Band a probability using half-open intervals: each threshold belongs
    /// to the upper band.
    pub fn from_probability(probability: f64, thresholds: &RiskThresholds) -> Self {
        if probability >= thresholds.critical {
            RiskCategory::Critical
        } else if probability >= thresholds.high {
            RiskCategory::High
        } else if probability >= thresholds.medium {
            RiskCategory::Medium
        } else {
            RiskCategory::Low
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            RiskCategory::Low => "Low Risk",
            RiskCategory::Medium => "Medium Risk",
            RiskCategory::High => "High Risk",
            RiskCategory::Critical => "Critical",
        }
    }
}

/// Probability thresholds separating the risk categories
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RiskThresholds {
    pub medium: f64,
    pub high: f64,
    pub critical: f64,
}

impl Default for RiskThresholds {
    fn default() -> Self {
        Self {
            medium: 0.20,
            high: 0.50,
            critical: 0.70,
        }
    }
}

/// Coarse impact tier of a contributing factor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Impact {
    High,
    Medium,
    Low,
}

impl Impact {
    pub fn from_importance(importance: f64) -> Self {
        if importance > 0.1 {
            Impact::High
        } else if importance > 0.05 {
            Impact::Medium
        } else {
            Impact::Low
        }
    }
}

/// A model feature paired with its importance weight
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContributingFactor {
    pub feature: String,
    pub importance: f64,
    pub impact: Impact,
}

/// Which path produced a result
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ExplanationMethod {
    #[serde(rename = "ML Models (Feature Importance + Ensemble)")]
    Ensemble,
    #[serde(rename = "Heuristic Rules")]
    Heuristic,
    #[serde(rename = "Heuristic Rules (Error Recovery)")]
    HeuristicFallback,
    #[serde(rename = "System Error")]
    SystemError,
}

impl ExplanationMethod {
    pub fn label(&self) -> &'static str {
        match self {
            ExplanationMethod::Ensemble => "ML Models (Feature Importance + Ensemble)",
            ExplanationMethod::Heuristic => "Heuristic Rules",
            ExplanationMethod::HeuristicFallback => "Heuristic Rules (Error Recovery)",
            ExplanationMethod::SystemError => "System Error",
        }
    }

    pub fn is_fallback(&self) -> bool {
        matches!(
            self,
            ExplanationMethod::HeuristicFallback | ExplanationMethod::SystemError
        )
    }
}

/// Scored claim returned to the caller
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoreResult {
    /// Echo of the claim identifier
    pub claim_id: String,

    /// 1 iff probability >= 0.5
    pub fraud: u8,

    /// Fraud probability (0.0 - 1.0, 3 decimals)
    pub probability: f64,

    /// round(probability * 100)
    #[serde(rename = "riskScore")]
    pub risk_score: u8,

    /// Risk category
    pub status: RiskCategory,

    /// Confidence in the probability (0.0 - 1.0)
    pub confidence: f64,

    /// Human-readable reasons, most important first
    pub reasons: Vec<String>,

    /// Ranked model features
    pub top_contributing_factors: Vec<ContributingFactor>,

    /// Binary vote per model that produced one
    pub ensemble_votes: BTreeMap<String, u8>,

    /// Percentage of voting models matching the majority
    pub model_agreement: f64,

    /// Higher = more unusual
    pub anomaly_score: f64,

    pub is_anomaly: bool,

    pub explanation_method: ExplanationMethod,

    pub model_version: String,

    pub scored_at: DateTime<Utc>,
}

impl ScoreResult {
    /// Create a result from a probability; the fraud flag and risk score are
    /// derived from it so they can never disagree.
    pub fn new(
        claim_id: String,
        probability: f64,
        status: RiskCategory,
        explanation_method: ExplanationMethod,
    ) -> Self {
        let probability = round_to(probability.clamp(0.0, 1.0), 3);

        Self {
            claim_id,
            fraud: u8::from(probability >= FRAUD_PROBABILITY_CUTOFF),
            probability,
            risk_score: (probability * 100.0).round() as u8,
            status,
            confidence: 0.5,
            reasons: Vec::new(),
            top_contributing_factors: Vec::new(),
            ensemble_votes: BTreeMap::new(),
            model_agreement: 0.0,
            anomaly_score: 0.0,
            is_anomaly: false,
            explanation_method,
            model_version: String::new(),
            scored_at: Utc::now(),
        }
    }

    /// Maximally conservative answer used when every scoring path failed.
    pub fn neutral(claim_id: String, model_version: &str) -> Self {
        Self::new(
            claim_id,
            0.5,
            RiskCategory::Medium,
            ExplanationMethod::SystemError,
        )
        .with_confidence(0.3)
        .with_reasons(vec!["Critical error - manual review required".to_string()])
        .with_model_version(format!("{}-Error", model_version))
    }

    pub fn with_confidence(mut self, confidence: f64) -> Self {
        self.confidence = round_to(confidence.clamp(0.0, 1.0), 3);
        self
    }

    pub fn with_reasons(mut self, reasons: Vec<String>) -> Self {
        self.reasons = reasons;
        self
    }

    pub fn with_factors(mut self, factors: Vec<ContributingFactor>) -> Self {
        self.top_contributing_factors = factors;
        self
    }

    pub fn with_votes(mut self, votes: BTreeMap<String, u8>, agreement: f64) -> Self {
        self.ensemble_votes = votes;
        self.model_agreement = agreement.clamp(0.0, 100.0);
        self
    }

    pub fn with_anomaly(mut self, is_anomaly: bool, anomaly_score: f64) -> Self {
        self.is_anomaly = is_anomaly;
        self.anomaly_score = round_to(anomaly_score, 3);
        self
    }

    pub fn with_model_version(mut self, model_version: impl Into<String>) -> Self {
        self.model_version = model_version.into();
        self
    }

    pub fn is_fraud(&self) -> bool {
        self.fraud == 1
    }
}

/// Round to a fixed number of decimal places.
pub fn round_to(value: f64, places: i32) -> f64 {
    let factor = 10f64.powi(places);
    (value * factor).round() / factor
}
