use async_trait::async_trait;
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::error::Result;

pub mod http_sink;
pub mod log_sink;

pub use http_sink::HttpSink;
pub use log_sink::LogSink;

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    /// Seller: a buyer paid for a session.
    NewPaidBooking,
    /// Buyer: the session is booked.
    BookingConfirmed,
    PaymentFailed,
    PaymentRefunded,
}

#[derive(Debug, Clone, Serialize)]
pub struct Notification {
    pub recipient_id: Uuid,
    pub kind: NotificationKind,
    pub payload: serde_json::Value,
}

impl Notification {
    pub fn new(recipient_id: Uuid, kind: NotificationKind, payload: serde_json::Value) -> Self {
        Self {
            recipient_id,
            kind,
            payload,
        }
    }
}

/// Delivery channel for domain notifications (email, in-app, socket push).
#[async_trait]
pub trait NotificationSink: Send + Sync {
    fn name(&self) -> &str;
    async fn deliver(&self, notification: &Notification) -> Result<()>;
}

/// Fans a notification out to every registered sink.
///
/// Delivery is best-effort: a failing sink is logged and skipped, and the
/// caller never sees the error.
pub struct NotificationDispatcher {
    sinks: RwLock<Vec<Arc<dyn NotificationSink>>>,
}

impl NotificationDispatcher {
    pub fn new() -> Self {
        Self {
            sinks: RwLock::new(Vec::new()),
        }
    }

    pub async fn register(&self, sink: Arc<dyn NotificationSink>) {
        tracing::info!("Registered notification sink: {}", sink.name());
        self.sinks.write().await.push(sink);
    }

    pub async fn notify(&self, notification: Notification) {
        let sinks = self.sinks.read().await;

        for sink in sinks.iter() {
            match sink.deliver(&notification).await {
                Ok(_) => {
                    tracing::debug!(
                        "Sink {} delivered {:?} to {}",
                        sink.name(),
                        notification.kind,
                        notification.recipient_id
                    );
                }
                Err(e) => {
                    tracing::error!(
                        "Sink {} failed to deliver {:?} to {}: {:?}",
                        sink.name(),
                        notification.kind,
                        notification.recipient_id,
                        e
                    );
                }
            }
        }
    }
}

impl Default for NotificationDispatcher {
    fn default() -> Self {
        Self::new()
    }
}
