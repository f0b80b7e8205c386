//! Rule-based fraud scoring.
//!
//! Always available: needs no trained artifact. Each rule is evaluated
//! independently against raw claim fields and adds a fixed number of points;
//! the total is clamped to 0..=100 and read as a percentage.

use crate::types::claim::ClaimRecord;
use crate::types::score::{round_to, FRAUD_PROBABILITY_CUTOFF};

/// Reason emitted when no rule fires
pub const NO_INDICATORS_REASON: &str = "No strong fraud indicators detected";

pub const RISKY_COVERAGE_TIERS: &[&str] = &["500/1000", "250/500"];
pub const RISKY_OCCUPATIONS: &[&str] = &["exec-managerial", "prof-specialty", "sales", "armed-forces"];
pub const RISKY_HOBBIES: &[&str] = &[
    "skydiving",
    "base-jumping",
    "bungie-jumping",
    "yachting",
    "polo",
    "cross-fit",
];
pub const SEVERE_INCIDENTS: &[&str] = &["Total Loss", "Major Damage"];
pub const RISKY_INCIDENT_TYPES: &[&str] = &["Multi-vehicle Collision", "Vehicle Theft"];
/// Marker used in claim data when the collision type was not recorded
pub const UNKNOWN_COLLISION_MARKER: &str = "?";

pub const HIGH_CLAIM_AMOUNT: f64 = 20_000.0;

const CONFIDENCE_BASE: f64 = 0.5;
const CONFIDENCE_CAP: f64 = 0.85;

/// One row of the rule table.
pub struct Rule {
    pub name: &'static str,
    pub points: u32,
    /// Added to the heuristic confidence when the rule fires
    pub confidence: f64,
    matches: fn(&ClaimRecord) -> bool,
    reason: Option<fn(&ClaimRecord) -> String>,
}

impl Rule {
    pub fn matches(&self, claim: &ClaimRecord) -> bool {
        (self.matches)(claim)
    }

    pub fn reason(&self, claim: &ClaimRecord) -> Option<String> {
        self.reason.map(|template| template(claim))
    }
}

/// The rule table. Order only affects the order of reasons.
pub static RULES: &[Rule] = &[
    Rule {
        name: "coverage_limit",
        points: 10,
        confidence: 0.05,
        matches: |c: &ClaimRecord| is_one_of(&c.policy_csl, RISKY_COVERAGE_TIERS),
        reason: None,
    },
    Rule {
        name: "risky_occupation",
        points: 10,
        confidence: 0.05,
        matches: |c: &ClaimRecord| is_one_of(&c.insured_occupation, RISKY_OCCUPATIONS),
        reason: None,
    },
    Rule {
        name: "risky_hobby",
        points: 15,
        confidence: 0.07,
        matches: |c: &ClaimRecord| is_one_of(&c.insured_hobbies, RISKY_HOBBIES),
        reason: Some(|c: &ClaimRecord| format!("Risky hobby: {}", c.insured_hobbies.trim())),
    },
    Rule {
        name: "incident_severity",
        points: 25,
        confidence: 0.10,
        matches: |c: &ClaimRecord| is_one_of(&c.incident_severity, SEVERE_INCIDENTS),
        reason: Some(|c: &ClaimRecord| format!("Incident severity is {}", c.incident_severity.trim())),
    },
    Rule {
        name: "incident_type",
        points: 15,
        confidence: 0.07,
        matches: |c: &ClaimRecord| is_one_of(&c.incident_type, RISKY_INCIDENT_TYPES),
        reason: Some(|c: &ClaimRecord| format!("High-risk incident type: {}", c.incident_type.trim())),
    },
    Rule {
        name: "unknown_collision",
        points: 10,
        confidence: 0.05,
        matches: |c: &ClaimRecord| c.collision_type.trim() == UNKNOWN_COLLISION_MARKER,
        reason: None,
    },
    Rule {
        name: "damage_without_report",
        points: 15,
        confidence: 0.07,
        matches: damage_without_police_report,
        reason: Some(|_: &ClaimRecord| "Property damage without police report".to_string()),
    },
    Rule {
        name: "self_reported_fraud",
        points: 20,
        confidence: 0.10,
        matches: |c: &ClaimRecord| is_yes(&c.fraud_reported),
        reason: Some(|_: &ClaimRecord| "Fraud already reported flag is Yes".to_string()),
    },
    Rule {
        name: "high_claim_amount",
        points: 20,
        confidence: 0.10,
        matches: |c: &ClaimRecord| c.total_claim_amount > HIGH_CLAIM_AMOUNT,
        reason: Some(|c: &ClaimRecord| format!("High claim amount: ${}", c.total_claim_amount)),
    },
    Rule {
        name: "no_witnesses",
        points: 5,
        confidence: 0.03,
        matches: |c: &ClaimRecord| c.witnesses == 0.0,
        reason: None,
    },
    Rule {
        name: "many_vehicles",
        points: 5,
        confidence: 0.03,
        matches: |c: &ClaimRecord| c.number_of_vehicles_involved > 2.0,
        reason: None,
    },
    Rule {
        name: "large_component_claim",
        points: 10,
        confidence: 0.05,
        matches: |c: &ClaimRecord| c.injury_claim > 10_000.0 || c.property_claim > 10_000.0 || c.vehicle_claim > 15_000.0,
        reason: None,
    },
];

/// Output of the heuristic scorer
#[derive(Debug, Clone, PartialEq)]
pub struct HeuristicOutcome {
    /// Clamped point total (0 - 100)
    pub score: u32,
    /// score / 100, two decimals
    pub probability: f64,
    pub fraud: bool,
    /// 0.5 plus per-rule increments, capped at 0.85
    pub confidence: f64,
    pub reasons: Vec<String>,
    /// Names of the rules that fired
    pub triggered: Vec<&'static str>,
}

/// Rule-based scorer over [`RULES`].
#[derive(Debug, Default, Clone, Copy)]
pub struct HeuristicScorer;

impl HeuristicScorer {
    pub fn new() -> Self {
        Self
    }

    /// Score a claim. Pure and infallible.
    pub fn score(&self, claim: &ClaimRecord) -> HeuristicOutcome {
        let fired: Vec<&Rule> = RULES.iter().filter(|rule| rule.matches(claim)).collect();

        let score = fired.iter().map(|rule| rule.points).sum::<u32>().min(100);
        let probability = round_to(score as f64 / 100.0, 2);
        let confidence =
            (CONFIDENCE_BASE + fired.iter().map(|rule| rule.confidence).sum::<f64>()).min(CONFIDENCE_CAP);

        let mut reasons: Vec<String> = fired.iter().filter_map(|rule| rule.reason(claim)).collect();
        if reasons.is_empty() {
            reasons.push(NO_INDICATORS_REASON.to_string());
        }

        HeuristicOutcome {
            score,
            probability,
            fraud: probability >= FRAUD_PROBABILITY_CUTOFF,
            confidence: round_to(confidence, 3),
            reasons,
            triggered: fired.iter().map(|rule| rule.name).collect(),
        }
    }
}

/// Case- and whitespace-insensitive membership test.
pub fn is_one_of(value: &str, set: &[&str]) -> bool {
    let value = value.trim();
    set.iter().any(|candidate| candidate.eq_ignore_ascii_case(value))
}

pub fn is_yes(value: &str) -> bool {
    is_one_of(value, &["yes", "y"])
}

pub fn is_no(value: &str) -> bool {
    is_one_of(value, &["no", "n"])
}

pub fn damage_without_police_report(claim: &ClaimRecord) -> bool {
    is_yes(&claim.property_damage) && is_no(&claim.police_report_available)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn neutral_claim() -> ClaimRecord {
        ClaimRecord {
            policy_csl: "100/300".to_string(),
            insured_occupation: "craft-repair".to_string(),
            insured_hobbies: "chess".to_string(),
            incident_type: "Single Vehicle Collision".to_string(),
            collision_type: "Rear Collision".to_string(),
            incident_severity: "Minor Damage".to_string(),
            property_damage: "NO".to_string(),
            police_report_available: "YES".to_string(),
            fraud_reported: "N".to_string(),
            total_claim_amount: 1000.0,
            witnesses: 3.0,
            number_of_vehicles_involved: 1.0,
            ..Default::default()
        }
    }

    #[test]
    fn test_neutral_claim_scores_zero() {
        let outcome = HeuristicScorer::new().score(&neutral_claim());

        assert_eq!(outcome.score, 0);
        assert_eq!(outcome.probability, 0.0);
        assert!(!outcome.fraud);
        assert_eq!(outcome.confidence, 0.5);
        assert_eq!(outcome.reasons, vec![NO_INDICATORS_REASON]);
        assert!(outcome.triggered.is_empty());
    }

    #[test]
    fn test_suspicious_claim_clamps_to_100() {
        let claim = ClaimRecord {
            incident_severity: "Total Loss".to_string(),
            insured_hobbies: "skydiving".to_string(),
            property_damage: "Yes".to_string(),
            police_report_available: "No".to_string(),
            fraud_reported: "Yes".to_string(),
            total_claim_amount: 25_000.0,
            witnesses: 0.0,
            number_of_vehicles_involved: 1.0,
            ..neutral_claim()
        };

        let outcome = HeuristicScorer::new().score(&claim);

        assert_eq!(outcome.score, 100);
        assert_eq!(outcome.probability, 1.0);
        assert!(outcome.fraud);
        assert_eq!(outcome.confidence, 0.85);
        assert!(outcome.reasons.contains(&"Incident severity is Total Loss".to_string()));
        assert!(outcome.reasons.contains(&"Risky hobby: skydiving".to_string()));
        assert!(outcome
            .reasons
            .contains(&"Property damage without police report".to_string()));
        assert!(outcome
            .reasons
            .contains(&"Fraud already reported flag is Yes".to_string()));
    }

    #[test]
    fn test_fraud_boundary_is_inclusive() {
        // severity 25 + hobby 15 + no witnesses 5 + many vehicles 5 = 50
        let claim = ClaimRecord {
            incident_severity: "Major Damage".to_string(),
            insured_hobbies: "polo".to_string(),
            witnesses: 0.0,
            number_of_vehicles_involved: 3.0,
            ..neutral_claim()
        };

        let outcome = HeuristicScorer::new().score(&claim);
        assert_eq!(outcome.score, 50);
        assert_eq!(outcome.probability, 0.5);
        assert!(outcome.fraud);
    }

    #[test]
    fn test_each_rule_points() {
        let scorer = HeuristicScorer::new();
        let base = neutral_claim();

        let cases: Vec<(ClaimRecord, u32, &str)> = vec![
            (ClaimRecord { policy_csl: "500/1000".into(), ..base.clone() }, 10, "coverage_limit"),
            (ClaimRecord { insured_occupation: "sales".into(), ..base.clone() }, 10, "risky_occupation"),
            (ClaimRecord { insured_hobbies: "cross-fit".into(), ..base.clone() }, 15, "risky_hobby"),
            (ClaimRecord { incident_type: "Vehicle Theft".into(), ..base.clone() }, 15, "incident_type"),
            (ClaimRecord { collision_type: "?".into(), ..base.clone() }, 10, "unknown_collision"),
            (ClaimRecord { fraud_reported: "Y".into(), ..base.clone() }, 20, "self_reported_fraud"),
            (ClaimRecord { total_claim_amount: 20_001.0, ..base.clone() }, 20, "high_claim_amount"),
            (ClaimRecord { witnesses: 0.0, ..base.clone() }, 5, "no_witnesses"),
            (ClaimRecord { number_of_vehicles_involved: 3.0, ..base.clone() }, 5, "many_vehicles"),
            (ClaimRecord { vehicle_claim: 15_001.0, ..base.clone() }, 10, "large_component_claim"),
        ];

        for (claim, points, rule) in cases {
            let outcome = scorer.score(&claim);
            assert_eq!(outcome.score, points, "rule {}", rule);
            assert_eq!(outcome.triggered, vec![rule]);
        }
    }

    #[test]
    fn test_thresholds_are_strict() {
        let claim = ClaimRecord {
            total_claim_amount: 20_000.0,
            injury_claim: 10_000.0,
            vehicle_claim: 15_000.0,
            number_of_vehicles_involved: 2.0,
            ..neutral_claim()
        };
        assert_eq!(HeuristicScorer::new().score(&claim).score, 0);
    }

    #[test]
    fn test_unknown_categories_contribute_nothing() {
        let claim = ClaimRecord {
            insured_hobbies: "underwater-basket-weaving".to_string(),
            incident_severity: "Catastrophic".to_string(),
            collision_type: "".to_string(),
            ..neutral_claim()
        };
        assert_eq!(HeuristicScorer::new().score(&claim).score, 0);
    }

    #[test]
    fn test_matching_ignores_case_and_whitespace() {
        assert!(is_one_of(" Total Loss ", SEVERE_INCIDENTS));
        assert!(is_one_of("SKYDIVING", RISKY_HOBBIES));
        assert!(is_yes("YES"));
        assert!(is_no("n"));
        assert!(!is_yes("maybe"));
    }
}
