use std::collections::HashMap;

use async_trait::async_trait;
use stripe::{
    CheckoutSession, CheckoutSessionId, CheckoutSessionMode, CheckoutSessionPaymentStatus,
    CheckoutSessionStatus, Client, CreateCheckoutSession, CreateCheckoutSessionLineItems,
    CreateCheckoutSessionPaymentIntentData, CreateRefund, Currency, EventObject, EventType,
    PaymentIntentId, Refund, RequestStrategy, Webhook, WebhookError,
};
use uuid::Uuid;

use crate::{
    error::{AppError, Result},
    payments::gateway::{
        CreatedSession, ProviderEvent, ProviderEventKind, ProviderGateway, ProviderPaymentStatus,
        ProviderRefund, ProviderSessionState, SessionRequest, SessionSnapshot,
    },
};

const PAYMENT_ID_KEY: &str = "payment_id";

pub struct StripeGateway {
    client: Client,
    webhook_secret: String,
    success_url: String,
    cancel_url: String,
}

impl StripeGateway {
    pub fn new(
        api_key: String,
        webhook_secret: String,
        success_url: String,
        cancel_url: String,
    ) -> Self {
        let client = Client::new(api_key);
        Self {
            client,
            webhook_secret,
            success_url,
            cancel_url,
        }
    }

    fn parse_currency(code: &str) -> Result<Currency> {
        serde_json::from_value(serde_json::Value::String(code.to_lowercase()))
            .map_err(|_| AppError::Internal(format!("Unsupported currency: {}", code)))
    }

    /// Intents created by other products on the account carry no (or a
    /// foreign) `payment_id`.
    fn payment_id_of(metadata: &HashMap<String, String>) -> Option<Uuid> {
        metadata
            .get(PAYMENT_ID_KEY)
            .and_then(|raw| Uuid::parse_str(raw).ok())
    }

    fn map_event(event: stripe::Event) -> ProviderEvent {
        let id = event.id.to_string();
        let kind = match (event.type_, event.data.object) {
            (EventType::CheckoutSessionCompleted, EventObject::CheckoutSession(session)) => {
                ProviderEventKind::SessionCompleted {
                    session_id: session.id.to_string(),
                    intent_id: session.payment_intent.as_ref().map(|pi| pi.id().to_string()),
                }
            }
            (EventType::CheckoutSessionExpired, EventObject::CheckoutSession(session)) => {
                ProviderEventKind::SessionExpired {
                    session_id: session.id.to_string(),
                }
            }
            (EventType::PaymentIntentSucceeded, EventObject::PaymentIntent(intent)) => {
                ProviderEventKind::IntentSucceeded {
                    payment_id: Self::payment_id_of(&intent.metadata),
                    intent_id: intent.id.to_string(),
                }
            }
            (EventType::PaymentIntentPaymentFailed, EventObject::PaymentIntent(intent)) => {
                ProviderEventKind::IntentFailed {
                    payment_id: Self::payment_id_of(&intent.metadata),
                    intent_id: intent.id.to_string(),
                }
            }
            (other, _) => ProviderEventKind::Other(other.to_string()),
        };

        ProviderEvent { id, kind }
    }
}

#[async_trait]
impl ProviderGateway for StripeGateway {
    async fn create_session(&self, request: SessionRequest) -> Result<CreatedSession> {
        let currency = Self::parse_currency(&request.currency)?;

        let mut params = CreateCheckoutSession::new();
        params.mode = Some(CheckoutSessionMode::Payment);
        params.success_url = Some(&self.success_url);
        params.cancel_url = Some(&self.cancel_url);

        params.line_items = Some(vec![CreateCheckoutSessionLineItems {
            price_data: Some(stripe::CreateCheckoutSessionLineItemsPriceData {
                currency,
                unit_amount: Some(request.amount_cents),
                product_data: Some(stripe::CreateCheckoutSessionLineItemsPriceDataProductData {
                    name: request.product_name.clone(),
                    description: Some(request.description.clone()),
                    ..Default::default()
                }),
                ..Default::default()
            }),
            quantity: Some(1),
            ..Default::default()
        }]);

        params.metadata = Some(request.metadata.clone());
        let payment_id = request.payment_id.to_string();

        // Intent events only carry the intent's own metadata.
        let mut intent_metadata = HashMap::new();
        intent_metadata.insert(PAYMENT_ID_KEY.to_string(), payment_id.clone());
        params.payment_intent_data = Some(CreateCheckoutSessionPaymentIntentData {
            metadata: Some(intent_metadata),
            ..Default::default()
        });
        params.client_reference_id = Some(&payment_id);

        let session = CheckoutSession::create(&self.client, params).await?;

        let redirect_url = session
            .url
            .ok_or_else(|| AppError::ProviderUnavailable("No checkout URL returned".to_string()))?;

        Ok(CreatedSession {
            session_id: session.id.to_string(),
            redirect_url,
        })
    }

    async fn retrieve_session(&self, session_id: &str) -> Result<SessionSnapshot> {
        let id: CheckoutSessionId = session_id
            .parse()
            .map_err(|_| AppError::Validation(format!("Malformed session id: {}", session_id)))?;

        let session = CheckoutSession::retrieve(&self.client, &id, &[]).await?;

        let payment_status = match session.payment_status {
            CheckoutSessionPaymentStatus::Paid => ProviderPaymentStatus::Paid,
            CheckoutSessionPaymentStatus::Unpaid => ProviderPaymentStatus::Unpaid,
            CheckoutSessionPaymentStatus::NoPaymentRequired => {
                ProviderPaymentStatus::NoPaymentRequired
            }
        };
        let state = session.status.map(|status| match status {
            CheckoutSessionStatus::Open => ProviderSessionState::Open,
            CheckoutSessionStatus::Complete => ProviderSessionState::Complete,
            CheckoutSessionStatus::Expired => ProviderSessionState::Expired,
        });

        Ok(SessionSnapshot {
            session_id: session.id.to_string(),
            payment_status,
            state,
            intent_id: session.payment_intent.as_ref().map(|pi| pi.id().to_string()),
        })
    }

    async fn create_refund(
        &self,
        intent_id: &str,
        reason: &str,
        idempotency_key: &str,
    ) -> Result<ProviderRefund> {
        let intent: PaymentIntentId = intent_id
            .parse()
            .map_err(|_| AppError::RefundFailed(format!("Malformed intent id: {}", intent_id)))?;

        let mut params = CreateRefund::new();
        params.payment_intent = Some(intent);
        let mut metadata = HashMap::new();
        metadata.insert("reason".to_string(), reason.to_string());
        params.metadata = Some(metadata);

        let client = self
            .client
            .clone()
            .with_strategy(RequestStrategy::Idempotent(idempotency_key.to_string()));

        let refund = Refund::create(&client, params)
            .await
            .map_err(|e| AppError::RefundFailed(e.to_string()))?;

        Ok(ProviderRefund {
            refund_id: refund.id.to_string(),
            amount_cents: refund.amount,
        })
    }

    fn verify_event(&self, payload: &str, signature: &str) -> Result<ProviderEvent> {
        let event = Webhook::construct_event(payload, signature, &self.webhook_secret)
            .map_err(|e| {
                if matches!(e, WebhookError::BadSignature) {
                    tracing::warn!("Webhook signature check failed");
                } else {
                    tracing::warn!("Webhook rejected: {}", e);
                }
                AppError::InvalidSignature
            })?;

        Ok(Self::map_event(event))
    }
}
