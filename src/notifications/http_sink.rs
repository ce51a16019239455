use async_trait::async_trait;
use std::time::Duration;

use crate::{
    config::NotificationConfig,
    error::{AppError, Result},
    notifications::{Notification, NotificationSink},
};

/// Posts notifications as JSON to the notification service, which owns
/// email, in-app and socket fan-out.
pub struct HttpSink {
    client: reqwest::Client,
    url: String,
}

impl HttpSink {
    pub fn new(config: &NotificationConfig) -> Option<Self> {
        let url = config.webhook_url.clone()?;

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| tracing::error!("Failed to build notification HTTP client: {}", e))
            .ok()?;

        Some(Self { client, url })
    }
}

#[async_trait]
impl NotificationSink for HttpSink {
    fn name(&self) -> &str {
        "http"
    }

    async fn deliver(&self, notification: &Notification) -> Result<()> {
        let response = self
            .client
            .post(&self.url)
            .json(notification)
            .send()
            .await
            .map_err(|e| AppError::Internal(format!("Notification request failed: {}", e)))?;

        if !response.status().is_success() {
            return Err(AppError::Internal(format!(
                "Notification service returned {}",
                response.status()
            )));
        }

        Ok(())
    }
}
