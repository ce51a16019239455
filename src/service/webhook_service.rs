use std::sync::Arc;
use uuid::Uuid;

use crate::{
    domain::Payment,
    error::Result,
    payments::{ProviderEvent, ProviderEventKind, ProviderGateway},
    repository::{PaymentRepository, WebhookEventRepository},
    service::state_machine::{PaymentStateMachine, TransitionResult},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WebhookOutcome {
    /// The event moved a payment.
    Applied,
    /// The event was valid but its transition had already happened.
    Discarded,
    /// This event id was handled before.
    Duplicate,
    /// Not an event this engine acts on, or it refers to no known payment.
    Ignored,
}

impl WebhookOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            WebhookOutcome::Applied => "applied",
            WebhookOutcome::Discarded => "discarded",
            WebhookOutcome::Duplicate => "duplicate",
            WebhookOutcome::Ignored => "ignored",
        }
    }

    fn from_transition(result: &TransitionResult) -> Self {
        if result.applied {
            WebhookOutcome::Applied
        } else {
            WebhookOutcome::Discarded
        }
    }
}

/// Verifies provider-pushed events and feeds them to the state machine.
///
/// Deliveries are at-least-once and may arrive in any order; every handler
/// is safe to run more than once for the same event.
pub struct WebhookProcessor {
    gateway: Arc<dyn ProviderGateway>,
    payments: Arc<dyn PaymentRepository>,
    events: Arc<dyn WebhookEventRepository>,
    state_machine: Arc<PaymentStateMachine>,
}

impl WebhookProcessor {
    pub fn new(
        gateway: Arc<dyn ProviderGateway>,
        payments: Arc<dyn PaymentRepository>,
        events: Arc<dyn WebhookEventRepository>,
        state_machine: Arc<PaymentStateMachine>,
    ) -> Self {
        Self {
            gateway,
            payments,
            events,
            state_machine,
        }
    }

    pub async fn handle(&self, payload: &str, signature: &str) -> Result<WebhookOutcome> {
        // Nothing about the event is trusted, or logged, before this passes.
        let event = self.gateway.verify_event(payload, signature)?;

        if self.events.is_processed(&event.id).await? {
            tracing::debug!("Webhook event {} already processed", event.id);
            return Ok(WebhookOutcome::Duplicate);
        }

        let outcome = self.dispatch(&event).await?;

        self.events
            .record(&event.id, event.kind.name(), outcome.as_str())
            .await?;

        tracing::info!(
            "Webhook event {} ({}) {}",
            event.id,
            event.kind.name(),
            outcome.as_str()
        );

        Ok(outcome)
    }

    async fn dispatch(&self, event: &ProviderEvent) -> Result<WebhookOutcome> {
        match &event.kind {
            ProviderEventKind::SessionCompleted { session_id, intent_id } => {
                let Some(payment) = self.payments.find_by_session_id(session_id).await? else {
                    tracing::warn!("No payment for completed session {}", session_id);
                    return Ok(WebhookOutcome::Ignored);
                };
                let result = self.state_machine
                    .mark_processing(payment.id, intent_id.as_deref())
                    .await?;
                Ok(WebhookOutcome::from_transition(&result))
            }
            ProviderEventKind::SessionExpired { session_id } => {
                let Some(payment) = self.payments.find_by_session_id(session_id).await? else {
                    tracing::warn!("No payment for expired session {}", session_id);
                    return Ok(WebhookOutcome::Ignored);
                };
                let result = self.state_machine.cancel(payment.id).await?;
                Ok(WebhookOutcome::from_transition(&result))
            }
            ProviderEventKind::IntentSucceeded { intent_id, payment_id } => {
                let Some(payment) = self.find_for_intent(intent_id, *payment_id).await? else {
                    tracing::debug!("Ignoring success of unknown intent {}", intent_id);
                    return Ok(WebhookOutcome::Ignored);
                };
                let result = self.state_machine
                    .succeed(payment.id, Some(intent_id.as_str()))
                    .await?;
                Ok(WebhookOutcome::from_transition(&result))
            }
            ProviderEventKind::IntentFailed { intent_id, payment_id } => {
                // A declined attempt on a still-open session only matches by
                // metadata; the payment is pending and the transition is
                // discarded, leaving the buyer free to retry.
                let Some(payment) = self.find_for_intent(intent_id, *payment_id).await? else {
                    tracing::debug!("Ignoring failure of unknown intent {}", intent_id);
                    return Ok(WebhookOutcome::Ignored);
                };
                let result = self.state_machine.fail(payment.id).await?;
                Ok(WebhookOutcome::from_transition(&result))
            }
            ProviderEventKind::Other(kind) => {
                tracing::debug!("Unhandled webhook event type: {}", kind);
                Ok(WebhookOutcome::Ignored)
            }
        }
    }

    /// Match an intent event to its payment: by the linked intent id, else
    /// by the payment id tagged on the intent at checkout. Intents from
    /// other products on the account match neither.
    async fn find_for_intent(
        &self,
        intent_id: &str,
        payment_id: Option<Uuid>,
    ) -> Result<Option<Payment>> {
        if let Some(payment) = self.payments.find_by_intent_id(intent_id).await? {
            return Ok(Some(payment));
        }

        let Some(payment_id) = payment_id else {
            return Ok(None);
        };
        let Some(payment) = self.payments.find_by_id(payment_id).await? else {
            return Ok(None);
        };

        match payment.provider_intent_id.as_deref() {
            Some(linked) if linked != intent_id => {
                tracing::warn!(
                    "Intent {} claims payment {} which is linked to {}",
                    intent_id,
                    payment.id,
                    linked
                );
                Ok(None)
            }
            _ => Ok(Some(payment)),
        }
    }
}
