use async_trait::async_trait;

use crate::{
    error::Result,
    notifications::{Notification, NotificationSink},
};

/// Writes notifications to the log. Always registered, so there is a trace
/// of every notification even when no delivery service is configured.
pub struct LogSink;

#[async_trait]
impl NotificationSink for LogSink {
    fn name(&self) -> &str {
        "log"
    }

    async fn deliver(&self, notification: &Notification) -> Result<()> {
        tracing::info!(
            recipient = %notification.recipient_id,
            kind = ?notification.kind,
            payload = %notification.payload,
            "notification"
        );
        Ok(())
    }
}
