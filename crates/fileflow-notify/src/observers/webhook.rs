//! Observer that POSTs job events to an HTTP endpoint.

use async_trait::async_trait;
use tracing::debug;

use fileflow_core::error::{AppError, ErrorKind};
use fileflow_core::events::EventEnvelope;
use fileflow_core::result::AppResult;

use crate::observer::JobObserver;

/// Sends every event envelope as JSON to a fixed URL.
#[derive(Debug, Clone)]
pub struct WebhookObserver {
    client: reqwest::Client,
    url: String,
    name: String,
}

impl WebhookObserver {
    /// Create an observer targeting `url`.
    pub fn new(url: impl Into<String>) -> Self {
        let url = url.into();
        Self {
            client: reqwest::Client::new(),
            name: format!("webhook:{url}"),
            url,
        }
    }

    async fn post(&self, envelope: &EventEnvelope) -> AppResult<()> {
        let response = self
            .client
            .post(&self.url)
            .json(envelope)
            .send()
            .await
            .map_err(|e| {
                AppError::with_source(
                    ErrorKind::ExternalService,
                    format!("Webhook request to {} failed", self.url),
                    e,
                )
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(AppError::external(format!(
                "Webhook {} answered {status}",
                self.url
            )));
        }

        debug!(url = %self.url, event_id = %envelope.id, "Webhook delivered");
        Ok(())
    }
}

#[async_trait]
impl JobObserver for WebhookObserver {
    fn name(&self) -> &str {
        &self.name
    }

    async fn handle(&self, envelope: &EventEnvelope) -> AppResult<()> {
        self.post(envelope).await
    }
}
