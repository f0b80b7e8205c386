//! NATS intake for claims awaiting a score

use crate::types::claim::ClaimRecord;
use anyhow::{Context, Result};
use async_nats::{Client, Subscriber};
use tracing::info;

/// Subscribes to the claim subject and decodes payloads
pub struct ClaimConsumer {
    client: Client,
    subject: String,
}

impl ClaimConsumer {
    pub fn new(client: Client, subject: &str) -> Self {
        Self {
            client,
            subject: subject.to_string(),
        }
    }

    /// Subscribe to the claim subject
    pub async fn subscribe(&self) -> Result<Subscriber> {
        let subscriber = self.client.subscribe(self.subject.clone()).await?;
        info!(subject = %self.subject, "Subscribed to claim subject");
        Ok(subscriber)
    }

    pub fn subject(&self) -> &str {
        &self.subject
    }

    /// Decode a JSON claim payload
    pub fn decode(payload: &[u8]) -> Result<ClaimRecord> {
        serde_json::from_slice(payload).context("Failed to deserialize claim")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_claim() {
        let claim =
            ClaimConsumer::decode(br#"{"claim_id": "CLM-9", "insured_hobbies": "polo", "witnesses": 0}"#).unwrap();
        assert_eq!(claim.claim_id.as_deref(), Some("CLM-9"));
        assert_eq!(claim.insured_hobbies, "polo");
    }

    #[test]
    fn test_decode_rejects_malformed_payload() {
        assert!(ClaimConsumer::decode(b"not json").is_err());
        assert!(ClaimConsumer::decode(br#"{"witnesses": "many"}"#).is_err());
    }
}
