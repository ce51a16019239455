use std::sync::Arc;

use crate::{
    domain::{Caller, Payment, PaymentProjection, PaymentStatus},
    error::{AppError, Result},
    payments::{ProviderGateway, ProviderPaymentStatus, ProviderSessionState},
    repository::PaymentRepository,
    service::state_machine::PaymentStateMachine,
};

#[derive(Debug, Clone)]
pub struct VerificationResult {
    pub payment: PaymentProjection,
    /// Raw provider payment status, `None` when the provider was not asked.
    pub provider_status: Option<String>,
}

/// Client-pull fallback for when the webhook has not arrived yet.
pub struct SessionVerifier {
    gateway: Arc<dyn ProviderGateway>,
    payments: Arc<dyn PaymentRepository>,
    state_machine: Arc<PaymentStateMachine>,
}

impl SessionVerifier {
    pub fn new(
        gateway: Arc<dyn ProviderGateway>,
        payments: Arc<dyn PaymentRepository>,
        state_machine: Arc<PaymentStateMachine>,
    ) -> Self {
        Self {
            gateway,
            payments,
            state_machine,
        }
    }

    pub async fn verify(&self, session_id: &str, caller: Caller) -> Result<VerificationResult> {
        let payment = self.payments.find_by_session_id(session_id).await?
            .ok_or_else(|| AppError::NotFound("Checkout session not found".to_string()))?;

        if payment.buyer_id != caller.id && !caller.is_admin() {
            return Err(AppError::Forbidden);
        }

        // Only open payments and paid ones still missing a booking can move.
        let unbooked = payment.status == PaymentStatus::Succeeded && payment.booking_id.is_none();
        if !payment.status.is_open() && !unbooked {
            return Ok(VerificationResult {
                payment: PaymentProjection::from(&payment),
                provider_status: None,
            });
        }

        let (payment, provider_status) = self.reconcile(payment).await?;

        Ok(VerificationResult {
            payment: PaymentProjection::from(&payment),
            provider_status: Some(provider_status),
        })
    }

    /// Ask the provider for the truth about `payment` and apply it through
    /// the same transitions the webhook path uses.
    pub async fn reconcile(&self, payment: Payment) -> Result<(Payment, String)> {
        let snapshot = self.gateway.retrieve_session(&payment.provider_session_id).await?;
        let provider_status = snapshot.payment_status.as_str().to_string();

        let payment = match snapshot.payment_status {
            ProviderPaymentStatus::Paid => {
                self.state_machine
                    .succeed(payment.id, snapshot.intent_id.as_deref())
                    .await?
                    .payment
            }
            // An open session may still be paid; only a closed one is final.
            ProviderPaymentStatus::Unpaid
                if payment.status == PaymentStatus::Pending
                    && snapshot.state != Some(ProviderSessionState::Open) =>
            {
                self.state_machine.cancel(payment.id).await?.payment
            }
            _ => payment,
        };

        Ok((payment, provider_status))
    }
}
