//! Feature encoding for model inference.
//!
//! Turns a claim into the numeric vector the trained artifacts expect. The
//! order comes from the feature-name list persisted at training time, not
//! from this module: every name must resolve to a claim field (raw, renamed
//! or derived) or encoding fails.

use crate::error::ScoreError;
use crate::models::artifacts::{ArtifactBundle, CategoryEncoder, FeatureScaler};
use crate::types::claim::ClaimRecord;
use chrono::{DateTime, Datelike, NaiveDate, NaiveDateTime};

/// Year and month fields derived from the claim's date strings
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DerivedDates {
    pub policy_bind_year: i32,
    pub incident_year: i32,
    pub incident_month: u32,
}

impl DerivedDates {
    pub fn from_claim(claim: &ClaimRecord) -> Result<Self, ScoreError> {
        let bind = parse_date("policy_bind_date", &claim.policy_bind_date)?;
        let incident = parse_date("incident_date", &claim.incident_date)?;

        Ok(Self {
            policy_bind_year: bind.year(),
            incident_year: incident.year(),
            incident_month: incident.month(),
        })
    }
}

/// Features computed from the claim's date strings
const DERIVED_FEATURES: &[&str] = &["policy_bind_year", "incident_year", "incident_month"];

/// Value of one named feature before scaling
#[derive(Debug, Clone, PartialEq)]
enum FieldValue {
    Categorical(String),
    Numeric(f64),
}

/// Encodes claims into scaled feature vectors.
#[derive(Debug, Default, Clone, Copy)]
pub struct FeatureEncoder;

impl FeatureEncoder {
    pub fn new() -> Self {
        Self
    }

    /// Encode and scale a claim using the bundle's feature list, category
    /// encoder and scaler.
    pub fn encode(&self, claim: &ClaimRecord, bundle: &ArtifactBundle) -> Result<Vec<f32>, ScoreError> {
        let (names, scaler) = match (&bundle.feature_names, &bundle.scaler) {
            (Some(names), Some(scaler)) => (names, scaler),
            _ => return Err(ScoreError::ArtifactsIncomplete),
        };

        self.encode_with(claim, names, &bundle.encoder, scaler)
    }

    pub fn encode_with(
        &self,
        claim: &ClaimRecord,
        names: &[String],
        encoder: &CategoryEncoder,
        scaler: &FeatureScaler,
    ) -> Result<Vec<f32>, ScoreError> {
        let raw = self.raw_features(claim, names, encoder)?;
        scaler.transform(&raw)
    }

    /// Unscaled feature values, index-aligned with `names`.
    pub fn raw_features(
        &self,
        claim: &ClaimRecord,
        names: &[String],
        encoder: &CategoryEncoder,
    ) -> Result<Vec<f64>, ScoreError> {
        let mut dates: Option<DerivedDates> = None;
        let mut features = Vec::with_capacity(names.len());

        for name in names {
            let value = match field_value(claim, name) {
                Some(value) => value,
                None if DERIVED_FEATURES.contains(&name.as_str()) => {
                    let derived = match dates {
                        Some(derived) => derived,
                        None => {
                            let derived = DerivedDates::from_claim(claim)?;
                            dates = Some(derived);
                            derived
                        }
                    };
                    derived_value(&derived, name)
                        .ok_or_else(|| ScoreError::UnknownFeature(name.clone()))?
                }
                None => return Err(ScoreError::UnknownFeature(name.clone())),
            };

            let numeric = match value {
                FieldValue::Numeric(v) => v,
                FieldValue::Categorical(v) => encoder.encode(name, &v)? as f64,
            };

            if !numeric.is_finite() {
                return Err(ScoreError::Encoding(format!("feature '{}' is not finite", name)));
            }
            features.push(numeric);
        }

        Ok(features)
    }
}

fn derived_value(dates: &DerivedDates, name: &str) -> Option<FieldValue> {
    let value = match name {
        "policy_bind_year" => dates.policy_bind_year as f64,
        "incident_year" => dates.incident_year as f64,
        "incident_month" => dates.incident_month as f64,
        _ => return None,
    };
    Some(FieldValue::Numeric(value))
}

/// Look up a raw (non-derived) field by its training column name.
fn field_value(claim: &ClaimRecord, name: &str) -> Option<FieldValue> {
    use FieldValue::{Categorical, Numeric};

    let value = match name {
        "policy_state" => Categorical(claim.policy_state.clone()),
        "policy_csl" => Categorical(claim.policy_csl.clone()),
        "insured_sex" => Categorical(claim.insured_sex.clone()),
        "insured_education_level" => Categorical(claim.insured_education_level.clone()),
        "insured_occupation" => Categorical(claim.insured_occupation.clone()),
        "insured_hobbies" => Categorical(claim.insured_hobbies.clone()),
        "insured_relationship" => Categorical(claim.insured_relationship.clone()),
        "incident_type" => Categorical(claim.incident_type.clone()),
        "collision_type" => Categorical(claim.collision_type.clone()),
        "incident_severity" => Categorical(claim.incident_severity.clone()),
        "authorities_contacted" => Categorical(claim.authorities_contacted.clone()),
        "incident_state" => Categorical(claim.incident_state.clone()),
        "incident_city" => Categorical(claim.incident_city.clone()),
        "incident_location" => Categorical(claim.effective_incident_location()),
        "property_damage" => Categorical(claim.property_damage.clone()),
        "police_report_available" => Categorical(claim.police_report_available.clone()),
        "fraud_reported" => Categorical(claim.fraud_reported.clone()),
        "auto_make" => Categorical(claim.auto_make.clone()),
        "auto_model" => Categorical(claim.auto_model.clone()),

        "months_as_customer" => Numeric(claim.months_as_customer),
        "age" => Numeric(claim.age),
        "policy_number" => Numeric(claim.policy_number),
        "policy_deductable" => Numeric(claim.policy_deductable),
        "policy_annual_premium" => Numeric(claim.policy_annual_premium),
        "umbrella_limit" => Numeric(claim.umbrella_limit),
        "insured_zip" => Numeric(claim.insured_zip),
        "capital-gains" | "capital_gains" => Numeric(claim.capital_gains),
        "capital-loss" | "capital_loss" => Numeric(claim.capital_loss),
        "incident_hour_of_the_day" => Numeric(claim.incident_hour_of_the_day),
        "number_of_vehicles_involved" => Numeric(claim.number_of_vehicles_involved),
        "bodily_injuries" => Numeric(claim.bodily_injuries),
        "witnesses" => Numeric(claim.witnesses),
        "total_claim_amount" => Numeric(claim.total_claim_amount),
        "injury_claim" => Numeric(claim.injury_claim),
        "property_claim" => Numeric(claim.property_claim),
        "vehicle_claim" => Numeric(claim.vehicle_claim),
        "auto_year" => Numeric(claim.auto_year),
        _ => return None,
    };
    Some(value)
}

/// Parse `YYYY-MM-DD` or an ISO date-time.
pub fn parse_date(field: &'static str, value: &str) -> Result<NaiveDate, ScoreError> {
    let value = value.trim();

    if let Ok(date) = NaiveDate::parse_from_str(value, "%Y-%m-%d") {
        return Ok(date);
    }
    if let Ok(datetime) = DateTime::parse_from_rfc3339(value) {
        return Ok(datetime.date_naive());
    }
    for format in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"] {
        if let Ok(datetime) = NaiveDateTime::parse_from_str(value, format) {
            return Ok(datetime.date());
        }
    }

    Err(ScoreError::InvalidDate {
        field,
        value: value.to_string(),
    })
}
