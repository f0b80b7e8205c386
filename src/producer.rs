//! NATS publication of score results

use crate::types::score::ScoreResult;
use anyhow::Result;
use async_nats::{Client, Subject};
use tracing::debug;

/// Publishes score results to the result subject and request replies
#[derive(Clone)]
pub struct ScoreProducer {
    client: Client,
    subject: String,
}

impl ScoreProducer {
    pub fn new(client: Client, subject: &str) -> Self {
        Self {
            client,
            subject: subject.to_string(),
        }
    }

    /// Publish a result on the result subject
    pub async fn publish(&self, result: &ScoreResult) -> Result<()> {
        let payload = serde_json::to_vec(result)?;

        self.client
            .publish(self.subject.clone(), payload.into())
            .await?;

        debug!(
            claim_id = %result.claim_id,
            risk_score = result.risk_score,
            subject = %self.subject,
            "Published score result"
        );

        Ok(())
    }

    /// Answer a request on its reply subject
    pub async fn reply(&self, reply_to: Subject, result: &ScoreResult) -> Result<()> {
        let payload = serde_json::to_vec(result)?;

        self.client.publish(reply_to.clone(), payload.into()).await?;

        debug!(claim_id = %result.claim_id, reply_to = %reply_to, "Replied with score result");
        Ok(())
    }

    pub fn subject(&self) -> &str {
        &self.subject
    }
}
