//! Outbound webhook channel: POSTs the rendered request to a configured URL.

use async_trait::async_trait;
use serde_json::json;
use std::time::Duration;

use super::{Channel, CorrelationMetadata};

#[derive(Debug, Clone)]
pub struct WebhookChannelConfig {
    pub url: String,
    pub auth_header: Option<String>,
    pub timeout: Duration,
}

impl WebhookChannelConfig {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            auth_header: None,
            timeout: Duration::from_secs(10),
        }
    }
}

pub struct WebhookChannel {
    client: reqwest::Client,
    config: WebhookChannelConfig,
}

impl WebhookChannel {
    pub fn new(config: WebhookChannelConfig) -> Self {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .unwrap_or_default();
        Self { client, config }
    }
}

#[async_trait]
impl Channel for WebhookChannel {
    async fn send(
        &self,
        recipient: &str,
        rendered_text: &str,
        correlation: &CorrelationMetadata,
    ) -> bool {
        let body = json!({
            "recipient": recipient,
            "text": rendered_text,
            "interaction_id": correlation.interaction_id,
            "correlation_id": correlation.correlation_id,
            "workflow_id": correlation.workflow_id,
            "execution_id": correlation.execution_id,
        });
        let mut request = self.client.post(&self.config.url).json(&body);
        if let Some(auth) = &self.config.auth_header {
            request = request.header(reqwest::header::AUTHORIZATION, auth);
        }
        match request.send().await {
            Ok(response) if response.status().is_success() => true,
            Ok(response) => {
                tracing::warn!(
                    interaction_id = %correlation.interaction_id,
                    status = %response.status(),
                    "webhook notification rejected"
                );
                false
            }
            Err(e) => {
                tracing::warn!(
                    interaction_id = %correlation.interaction_id,
                    "webhook notification failed: {}",
                    e
                );
                false
            }
        }
    }
}
