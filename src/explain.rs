//! Human-readable reasons, contributing factors and risk category

use crate::anomaly::AnomalySignal;
use crate::config::ScoringConfig;
use crate::heuristic::{
    damage_without_police_report, is_one_of, is_yes, HIGH_CLAIM_AMOUNT, NO_INDICATORS_REASON, RISKY_HOBBIES,
    RISKY_INCIDENT_TYPES, SEVERE_INCIDENTS,
};
use crate::models::artifacts::FeatureImportances;
use crate::types::claim::ClaimRecord;
use crate::types::score::{round_to, ContributingFactor, Impact, RiskCategory, RiskThresholds};

const VERY_HIGH_PROBABILITY: f64 = 0.7;
const ELEVATED_PROBABILITY: f64 = 0.5;

/// Builds the explanation part of a score result.
#[derive(Debug, Clone)]
pub struct ExplanationBuilder {
    thresholds: RiskThresholds,
    anomaly_override_probability: f64,
    top_n: usize,
}

impl Default for ExplanationBuilder {
    fn default() -> Self {
        Self::new(&ScoringConfig::default())
    }
}

impl ExplanationBuilder {
    pub fn new(config: &ScoringConfig) -> Self {
        Self {
            thresholds: config.risk_levels.clone(),
            anomaly_override_probability: config.anomaly_override_probability,
            top_n: config.top_factors,
        }
    }

    /// Ordered reasons: probability band, raw-field triggers, anomaly, then
    /// the top importance factor.
    pub fn explain(
        &self,
        claim: &ClaimRecord,
        probability: f64,
        top_factors: &[ContributingFactor],
        anomaly: AnomalySignal,
    ) -> Vec<String> {
        let mut reasons = Vec::new();

        if probability > VERY_HIGH_PROBABILITY {
            reasons.push(format!("Very high fraud probability ({:.1}%)", probability * 100.0));
        } else if probability > ELEVATED_PROBABILITY {
            reasons.push(format!("Elevated fraud probability ({:.1}%)", probability * 100.0));
        }

        if is_one_of(&claim.insured_hobbies, RISKY_HOBBIES) {
            reasons.push(format!("Risky hobby identified: {}", claim.insured_hobbies.trim()));
        }
        if is_one_of(&claim.incident_severity, SEVERE_INCIDENTS) {
            reasons.push(format!("High-severity incident: {}", claim.incident_severity.trim()));
        }
        if damage_without_police_report(claim) {
            reasons.push("Property damage reported but no police report available".to_string());
        }
        if is_yes(&claim.fraud_reported) {
            reasons.push("Fraud already reported by claimant".to_string());
        }
        if claim.total_claim_amount > HIGH_CLAIM_AMOUNT {
            reasons.push(format!("High claim amount: ${}", claim.total_claim_amount));
        }
        if is_one_of(&claim.incident_type, RISKY_INCIDENT_TYPES) {
            reasons.push(format!("High-risk incident type: {}", claim.incident_type.trim()));
        }

        if anomaly.is_anomaly {
            reasons.push(format!(
                "Anomalous claim pattern detected (anomaly score: {:.2})",
                anomaly.score
            ));
        }

        if let Some(top) = top_factors.first() {
            reasons.push(format!("Top risk factor: {}", top.feature));
        }

        if reasons.is_empty() {
            reasons.push(NO_INDICATORS_REASON.to_string());
        }
        reasons
    }

    /// The `top_n` most important features with their impact tier.
    pub fn top_factors(&self, importances: &FeatureImportances) -> Vec<ContributingFactor> {
        importances
            .ranked()
            .into_iter()
            .take(self.top_n)
            .map(|(feature, importance)| ContributingFactor {
                feature: feature.to_string(),
                importance: round_to(importance, 4),
                impact: Impact::from_importance(importance),
            })
            .collect()
    }

    /// Threshold banding, with an anomaly above the override probability
    /// forcing Critical.
    pub fn risk_category(&self, probability: f64, is_anomaly: bool) -> RiskCategory {
        if is_anomaly && probability > self.anomaly_override_probability {
            return RiskCategory::Critical;
        }
        RiskCategory::from_probability(probability, &self.thresholds)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn factor(feature: &str, importance: f64) -> ContributingFactor {
        ContributingFactor {
            feature: feature.to_string(),
            importance,
            impact: Impact::from_importance(importance),
        }
    }

    #[test]
    fn test_reason_priority_order() {
        let claim = ClaimRecord {
            insured_hobbies: "skydiving".to_string(),
            incident_severity: "Total Loss".to_string(),
            property_damage: "YES".to_string(),
            police_report_available: "No".to_string(),
            fraud_reported: "Yes".to_string(),
            total_claim_amount: 25000.0,
            incident_type: "Vehicle Theft".to_string(),
            ..Default::default()
        };
        let anomaly = AnomalySignal {
            is_anomaly: true,
            score: 0.6812,
        };

        let reasons = ExplanationBuilder::default().explain(
            &claim,
            0.834,
            &[factor("incident_severity", 0.31)],
            anomaly,
        );

        assert_eq!(
            reasons,
            vec![
                "Very high fraud probability (83.4%)",
                "Risky hobby identified: skydiving",
                "High-severity incident: Total Loss",
                "Property damage reported but no police report available",
                "Fraud already reported by claimant",
                "High claim amount: $25000",
                "High-risk incident type: Vehicle Theft",
                "Anomalous claim pattern detected (anomaly score: 0.68)",
                "Top risk factor: incident_severity",
            ]
        );
    }

    #[test]
    fn test_probability_bands() {
        let builder = ExplanationBuilder::default();
        let claim = ClaimRecord::default();

        let elevated = builder.explain(&claim, 0.55, &[], AnomalySignal::NONE);
        assert_eq!(elevated, vec!["Elevated fraud probability (55.0%)"]);

        // Bands are strict: exactly 0.5 mentions nothing
        let boundary = builder.explain(&claim, 0.5, &[], AnomalySignal::NONE);
        assert_eq!(boundary, vec![NO_INDICATORS_REASON]);
    }

    #[test]
    fn test_top_factors() {
        let mut map = HashMap::new();
        map.insert("incident_severity".to_string(), 0.312_345);
        map.insert("insured_hobbies".to_string(), 0.08);
        map.insert("age".to_string(), 0.01);

        let config = ScoringConfig {
            top_factors: 2,
            ..Default::default()
        };
        let factors = ExplanationBuilder::new(&config).top_factors(&FeatureImportances(map));

        assert_eq!(
            factors,
            vec![
                factor("incident_severity", 0.3123),
                factor("insured_hobbies", 0.08),
            ]
        );
        assert_eq!(factors[0].impact, Impact::High);
        assert_eq!(factors[1].impact, Impact::Medium);
    }

    #[test]
    fn test_risk_category_boundaries() {
        let builder = ExplanationBuilder::default();

        assert_eq!(builder.risk_category(0.19, false), RiskCategory::Low);
        assert_eq!(builder.risk_category(0.20, false), RiskCategory::Medium);
        assert_eq!(builder.risk_category(0.50, false), RiskCategory::High);
        assert_eq!(builder.risk_category(0.70, false), RiskCategory::Critical);
    }

    #[test]
    fn test_anomaly_override() {
        let builder = ExplanationBuilder::default();

        assert_eq!(builder.risk_category(0.35, false), RiskCategory::Medium);
        assert_eq!(builder.risk_category(0.35, true), RiskCategory::Critical);
        assert_eq!(builder.risk_category(0.30, true), RiskCategory::Medium);
        assert_eq!(builder.risk_category(0.10, true), RiskCategory::Low);
    }
}
