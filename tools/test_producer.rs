//! Test Claim Producer
//!
//! Generates synthetic claims, sends them to the scorer as NATS requests and
//! logs the scores that come back.

use claim_fraud_scorer::{ClaimRecord, ScoreResult};
use rand::Rng;
use std::time::Duration;
use tracing::{info, warn};

/// Claim generator for testing
struct ClaimGenerator {
    rng: rand::rngs::ThreadRng,
    claim_counter: u64,
}

impl ClaimGenerator {
    fn new() -> Self {
        Self {
            rng: rand::thread_rng(),
            claim_counter: 0,
        }
    }

    fn next_id(&mut self) -> String {
        self.claim_counter += 1;
        format!("clm_{:010}", self.claim_counter)
    }

    /// Fields shared by both kinds of claim
    fn base(&mut self) -> ClaimRecord {
        let bind_year = self.rng.gen_range(1990..2014);
        ClaimRecord {
            claim_id: Some(self.next_id()),
            months_as_customer: self.rng.gen_range(1..480) as f64,
            age: self.rng.gen_range(19..64) as f64,
            policy_number: self.rng.gen_range(100_000..999_999) as f64,
            policy_bind_date: format!("{}-{:02}-{:02}", bind_year, self.rng.gen_range(1..13), self.rng.gen_range(1..29)),
            policy_state: self.random_choice(&["OH", "IN", "IL"]).to_string(),
            policy_deductable: [500.0, 1000.0, 2000.0][self.rng.gen_range(0..3)],
            policy_annual_premium: self.rng.gen_range(500.0..2000.0),
            insured_zip: self.rng.gen_range(430_000..620_000) as f64,
            insured_sex: self.random_choice(&["MALE", "FEMALE"]).to_string(),
            insured_education_level: self
                .random_choice(&["High School", "Associate", "College", "Masters", "MD", "PhD"])
                .to_string(),
            insured_relationship: self
                .random_choice(&["husband", "wife", "own-child", "unmarried", "not-in-family"])
                .to_string(),
            incident_date: format!("2015-{:02}-{:02}", self.rng.gen_range(1..3), self.rng.gen_range(1..29)),
            incident_state: self.random_choice(&["NY", "SC", "WV", "VA", "NC"]).to_string(),
            incident_city: self
                .random_choice(&["Columbus", "Riverwood", "Arlington", "Springfield", "Hillsdale"])
                .to_string(),
            incident_hour_of_the_day: self.rng.gen_range(0..24) as f64,
            bodily_injuries: self.rng.gen_range(0..3) as f64,
            auto_make: self.random_choice(&["Saab", "Dodge", "Toyota", "Honda", "BMW"]).to_string(),
            auto_model: self.random_choice(&["92x", "RAM", "Corolla", "Civic", "X5"]).to_string(),
            auto_year: self.rng.gen_range(1995..2016) as f64,
            ..Default::default()
        }
    }

    /// A claim matching no risk rule
    fn generate_neutral(&mut self) -> ClaimRecord {
        let injury = self.rng.gen_range(0.0..2000.0);
        let property = self.rng.gen_range(0.0..2000.0);
        let vehicle = self.rng.gen_range(500.0..5000.0);

        ClaimRecord {
            policy_csl: "100/300".to_string(),
            insured_occupation: self
                .random_choice(&["craft-repair", "machine-op-inspct", "tech-support", "adm-clerical"])
                .to_string(),
            insured_hobbies: self.random_choice(&["reading", "chess", "golf", "movies"]).to_string(),
            incident_type: "Single Vehicle Collision".to_string(),
            collision_type: self.random_choice(&["Rear Collision", "Side Collision"]).to_string(),
            incident_severity: self.random_choice(&["Minor Damage", "Trivial Damage"]).to_string(),
            authorities_contacted: "Police".to_string(),
            number_of_vehicles_involved: 1.0,
            property_damage: "NO".to_string(),
            witnesses: self.rng.gen_range(1..4) as f64,
            police_report_available: "YES".to_string(),
            fraud_reported: "N".to_string(),
            injury_claim: injury,
            property_claim: property,
            vehicle_claim: vehicle,
            total_claim_amount: injury + property + vehicle,
            ..self.base()
        }
    }

    /// A claim hitting several risk rules
    fn generate_suspicious(&mut self) -> ClaimRecord {
        let injury = self.rng.gen_range(8000.0..20000.0);
        let property = self.rng.gen_range(8000.0..20000.0);
        let vehicle = self.rng.gen_range(20000.0..60000.0);

        ClaimRecord {
            policy_csl: self.random_choice(&["250/500", "500/1000"]).to_string(),
            insured_occupation: self
                .random_choice(&["exec-managerial", "prof-specialty", "sales"])
                .to_string(),
            insured_hobbies: self
                .random_choice(&["skydiving", "base-jumping", "polo", "cross-fit"])
                .to_string(),
            incident_type: self
                .random_choice(&["Multi-vehicle Collision", "Vehicle Theft"])
                .to_string(),
            collision_type: "?".to_string(),
            incident_severity: self.random_choice(&["Major Damage", "Total Loss"]).to_string(),
            authorities_contacted: self.random_choice(&["None", "Other"]).to_string(),
            number_of_vehicles_involved: self.rng.gen_range(3..5) as f64,
            property_damage: "YES".to_string(),
            witnesses: 0.0,
            police_report_available: "NO".to_string(),
            fraud_reported: self.random_choice(&["Y", "N"]).to_string(),
            injury_claim: injury,
            property_claim: property,
            vehicle_claim: vehicle,
            total_claim_amount: injury + property + vehicle,
            ..self.base()
        }
    }

    fn random_choice<'a>(&mut self, choices: &[&'a str]) -> &'a str {
        choices[self.rng.gen_range(0..choices.len())]
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("test_producer=info".parse()?),
        )
        .init();

    info!("Starting Test Claim Producer");

    let args: Vec<String> = std::env::args().collect();
    let nats_url = args.get(1).map(|s| s.as_str()).unwrap_or("nats://localhost:4222");
    let subject = args.get(2).map(|s| s.as_str()).unwrap_or("claims");
    let count: u64 = args.get(3).and_then(|s| s.parse().ok()).unwrap_or(50);
    let fraud_rate: f64 = args.get(4).and_then(|s| s.parse().ok()).unwrap_or(0.2);
    let delay_ms: u64 = args.get(5).and_then(|s| s.parse().ok()).unwrap_or(100);

    info!(
        nats_url = %nats_url,
        subject = %subject,
        count = count,
        fraud_rate = fraud_rate,
        delay_ms = delay_ms,
        "Configuration loaded"
    );

    let client = match async_nats::connect(nats_url).await {
        Ok(c) => {
            info!("Connected to NATS");
            c
        }
        Err(e) => {
            warn!(error = %e, "Failed to connect to NATS. Running in dry-run mode.");
            return run_dry_mode(count, fraud_rate, delay_ms).await;
        }
    };

    let mut generator = ClaimGenerator::new();
    let mut rng = rand::thread_rng();

    let mut neutral_count = 0;
    let mut suspicious_count = 0;
    let mut flagged_count = 0;

    for i in 0..count {
        let suspicious = rng.gen_bool(fraud_rate.clamp(0.0, 1.0));
        let claim = if suspicious {
            suspicious_count += 1;
            generator.generate_suspicious()
        } else {
            neutral_count += 1;
            generator.generate_neutral()
        };

        let payload = serde_json::to_vec(&claim)?;

        match client.request(subject.to_string(), payload.into()).await {
            Ok(reply) => match serde_json::from_slice::<ScoreResult>(&reply.payload) {
                Ok(result) => {
                    if result.is_fraud() {
                        flagged_count += 1;
                    }
                    info!(
                        claim_id = %result.claim_id,
                        suspicious = suspicious,
                        probability = result.probability,
                        status = result.status.label(),
                        method = result.explanation_method.label(),
                        "Scored"
                    );
                }
                Err(e) => warn!(error = %e, "Unreadable score result"),
            },
            Err(e) => warn!(error = %e, "Request failed"),
        }

        if (i + 1) % 10 == 0 {
            info!(
                "Sent {}/{} claims ({} neutral, {} suspicious, {} flagged)",
                i + 1,
                count,
                neutral_count,
                suspicious_count,
                flagged_count
            );
        }

        tokio::time::sleep(Duration::from_millis(delay_ms)).await;
    }

    info!(
        "Completed! Sent {} claims ({} neutral, {} suspicious, {} flagged)",
        count, neutral_count, suspicious_count, flagged_count
    );

    Ok(())
}

async fn run_dry_mode(count: u64, fraud_rate: f64, delay_ms: u64) -> anyhow::Result<()> {
    info!("Running in dry-run mode (no NATS connection)");

    let mut generator = ClaimGenerator::new();
    let mut rng = rand::thread_rng();

    for i in 0..count {
        let claim = if rng.gen_bool(fraud_rate.clamp(0.0, 1.0)) {
            generator.generate_suspicious()
        } else {
            generator.generate_neutral()
        };

        if (i + 1) % 10 == 0 || i == 0 {
            info!("Sample claim {}:\n{}", i + 1, serde_json::to_string_pretty(&claim)?);
        }

        tokio::time::sleep(Duration::from_millis(delay_ms)).await;
    }

    Ok(())
}
