//! Insurance claim record submitted for scoring

use serde::{Deserialize, Serialize};

/// A single insurance claim, as submitted by the caller.
///
/// Categorical fields are free-form strings: values outside any known set
/// are accepted and simply match no rule. Every field defaults when absent so
/// that a sparse payload still scores.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClaimRecord {
    /// Caller-supplied identifier, echoed back in the result
    pub claim_id: Option<String>,

    // Policy and insured
    pub policy_state: String,
    /// Combined single limit tier, e.g. "250/500"
    pub policy_csl: String,
    pub insured_sex: String,
    pub insured_education_level: String,
    pub insured_occupation: String,
    pub insured_hobbies: String,
    pub insured_relationship: String,

    // Incident
    pub incident_type: String,
    /// "?" when the collision type was not recorded
    pub collision_type: String,
    pub incident_severity: String,
    pub authorities_contacted: String,
    pub incident_state: String,
    pub incident_city: String,
    pub incident_location: String,
    pub property_damage: String,
    pub police_report_available: String,
    pub fraud_reported: String,

    // Vehicle
    pub auto_make: String,
    pub auto_model: String,

    // Numeric fields
    pub months_as_customer: f64,
    pub age: f64,
    pub policy_number: f64,
    pub policy_deductable: f64,
    pub policy_annual_premium: f64,
    pub umbrella_limit: f64,
    pub insured_zip: f64,
    #[serde(alias = "capital-gains")]
    pub capital_gains: f64,
    #[serde(alias = "capital-loss")]
    pub capital_loss: f64,
    pub incident_hour_of_the_day: f64,
    pub number_of_vehicles_involved: f64,
    pub bodily_injuries: f64,
    pub witnesses: f64,
    pub total_claim_amount: f64,
    pub injury_claim: f64,
    pub property_claim: f64,
    pub vehicle_claim: f64,
    pub auto_year: f64,

    // Dates, parsed to year/month during encoding
    pub policy_bind_date: String,
    pub incident_date: String,
}

impl ClaimRecord {
    /// Identifier used for logging and the result echo.
    pub fn id_or_generate(&self) -> String {
        self.claim_id
            .clone()
            .unwrap_or_else(|| uuid::Uuid::new_v4().to_string())
    }

    /// Incident location, defaulting to "<city> Area" when blank.
    pub fn effective_incident_location(&self) -> String {
        if self.incident_location.trim().is_empty() {
            format!("{} Area", self.incident_city)
        } else {
            self.incident_location.clone()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sparse_payload_deserializes() {
        let json = r#"{"incident_severity": "Total Loss", "witnesses": 2, "capital-gains": 5300}"#;
        let claim: ClaimRecord = serde_json::from_str(json).unwrap();

        assert_eq!(claim.incident_severity, "Total Loss");
        assert_eq!(claim.witnesses, 2.0);
        assert_eq!(claim.capital_gains, 5300.0);
        assert!(claim.insured_hobbies.is_empty());
        assert!(claim.claim_id.is_none());
    }

    #[test]
    fn test_incident_location_default() {
        let mut claim = ClaimRecord {
            incident_city: "Columbus".to_string(),
            ..Default::default()
        };
        assert_eq!(claim.effective_incident_location(), "Columbus Area");

        claim.incident_location = "1234 Oak St".to_string();
        assert_eq!(claim.effective_incident_location(), "1234 Oak St");
    }

    #[test]
    fn test_claim_id_echo() {
        let claim = ClaimRecord {
            claim_id: Some("clm_42".to_string()),
            ..Default::default()
        };
        assert_eq!(claim.id_or_generate(), "clm_42");
        assert!(!ClaimRecord::default().id_or_generate().is_empty());
    }
}
