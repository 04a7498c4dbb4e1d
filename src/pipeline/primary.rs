use serde_json::Value;

use crate::models::PropertyInput;
use crate::retry::{self, RetryPolicy};

use super::payload::{self, PrimaryPayload};

#[async_trait::async_trait]
pub trait PrimaryAgent: Send + Sync {
    /// Submits the property to the external orchestration workflow. Raises
    /// only when the endpoint is unreachable after retries; a malformed 2xx
    /// body comes back as data for the orchestrator to judge.
    async fn analyze(&self, input: &PropertyInput) -> anyhow::Result<PrimaryPayload>;
}

/// The external orchestration webhook, called through the retrying requester.
pub struct WebhookAgent {
    client: reqwest::Client,
    url: String,
    policy: RetryPolicy,
}

impl WebhookAgent {
    pub fn new(client: reqwest::Client, url: String, policy: RetryPolicy) -> Self {
        Self {
            client,
            url,
            policy,
        }
    }
}

#[async_trait::async_trait]
impl PrimaryAgent for WebhookAgent {
    #[tracing::instrument(name = "agent primary", skip_all)]
    async fn analyze(&self, input: &PropertyInput) -> anyhow::Result<PrimaryPayload> {
        let response = retry::post_json(&self.client, &self.url, input, &self.policy)
            .await
            .map_err(|err| anyhow::anyhow!("could not reach the analysis agent: {err}"))?;

        let body: Value = response
            .json()
            .await
            .map_err(|err| anyhow::anyhow!("could not reach the analysis agent: {err}"))?;

        Ok(payload::classify(body))
    }
}
