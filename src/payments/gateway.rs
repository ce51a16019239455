//! Provider-neutral view of the payment gateway.
//!
//! The engine only ever talks to the provider through [`ProviderGateway`],
//! so the Stripe specifics stay in `stripe_client` and tests can script a
//! gateway of their own.

use std::collections::HashMap;

use async_trait::async_trait;
use uuid::Uuid;

use crate::error::Result;

#[derive(Debug, Clone)]
pub struct SessionRequest {
    pub payment_id: Uuid,
    pub buyer_id: Uuid,
    pub amount_cents: i64,
    pub currency: String,
    pub product_name: String,
    pub description: String,
    pub metadata: HashMap<String, String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreatedSession {
    pub session_id: String,
    pub redirect_url: String,
}

/// Whether money has moved for a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderPaymentStatus {
    Paid,
    Unpaid,
    NoPaymentRequired,
}

impl ProviderPaymentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderPaymentStatus::Paid => "paid",
            ProviderPaymentStatus::Unpaid => "unpaid",
            ProviderPaymentStatus::NoPaymentRequired => "no_payment_required",
        }
    }
}

/// Lifecycle of the hosted checkout page itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderSessionState {
    Open,
    Complete,
    Expired,
}

#[derive(Debug, Clone)]
pub struct SessionSnapshot {
    pub session_id: String,
    pub payment_status: ProviderPaymentStatus,
    pub state: Option<ProviderSessionState>,
    pub intent_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderRefund {
    pub refund_id: String,
    pub amount_cents: i64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderEvent {
    /// Provider-assigned event id, stable across redeliveries.
    pub id: String,
    pub kind: ProviderEventKind,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProviderEventKind {
    SessionCompleted {
        session_id: String,
        intent_id: Option<String>,
    },
    SessionExpired {
        session_id: String,
    },
    /// `payment_id` comes from the intent's own metadata, set at checkout,
    /// so the intent can be matched before `SessionCompleted` links it.
    IntentSucceeded {
        intent_id: String,
        payment_id: Option<Uuid>,
    },
    IntentFailed {
        intent_id: String,
        payment_id: Option<Uuid>,
    },
    /// Anything this engine does not act on.
    Other(String),
}

impl ProviderEventKind {
    pub fn name(&self) -> &str {
        match self {
            ProviderEventKind::SessionCompleted { .. } => "session.completed",
            ProviderEventKind::SessionExpired { .. } => "session.expired",
            ProviderEventKind::IntentSucceeded { .. } => "intent.succeeded",
            ProviderEventKind::IntentFailed { .. } => "intent.failed",
            ProviderEventKind::Other(kind) => kind.as_str(),
        }
    }
}

#[async_trait]
pub trait ProviderGateway: Send + Sync {
    /// Open a hosted checkout session. Fails with
    /// [`AppError::ProviderUnavailable`](crate::error::AppError) when the
    /// provider cannot be reached.
    async fn create_session(&self, request: SessionRequest) -> Result<CreatedSession>;

    /// Ground truth for a session, straight from the provider.
    async fn retrieve_session(&self, session_id: &str) -> Result<SessionSnapshot>;

    /// Refund the full intent. `idempotency_key` must be stable per payment
    /// so a retried call never refunds twice.
    async fn create_refund(
        &self,
        intent_id: &str,
        reason: &str,
        idempotency_key: &str,
    ) -> Result<ProviderRefund>;

    /// Check the signature over the raw body and parse the event.
    fn verify_event(&self, payload: &str, signature: &str) -> Result<ProviderEvent>;
}
