use std::sync::Arc;
use serde_json::json;
use uuid::Uuid;

use crate::{
    domain::{Payment, PaymentStatus, Transition},
    error::{AppError, Result},
    notifications::{Notification, NotificationDispatcher, NotificationKind},
    repository::PaymentRepository,
    service::booking_service::BookingMaterializer,
};

#[derive(Debug, Clone)]
pub struct TransitionResult {
    /// Whether this call moved the payment. `false` means the conditional
    /// write matched nothing and the request was discarded.
    pub applied: bool,
    /// The payment as stored after the attempt.
    pub payment: Payment,
}

/// The single place payment status changes are applied from.
///
/// The webhook processor and the session verifier both drive payments
/// through these methods, so whichever path gets there first wins the
/// conditional write and the other one is discarded.
pub struct PaymentStateMachine {
    payments: Arc<dyn PaymentRepository>,
    materializer: Arc<BookingMaterializer>,
    notifier: Arc<NotificationDispatcher>,
}

impl PaymentStateMachine {
    pub fn new(
        payments: Arc<dyn PaymentRepository>,
        materializer: Arc<BookingMaterializer>,
        notifier: Arc<NotificationDispatcher>,
    ) -> Self {
        Self { payments, materializer, notifier }
    }

    async fn apply(
        &self,
        payment_id: Uuid,
        transition: Transition,
        intent_id: Option<&str>,
    ) -> Result<TransitionResult> {
        let applied = self.payments.transition(payment_id, transition, intent_id).await?;

        if !applied {
            if let Some(intent_id) = intent_id {
                self.payments.attach_intent(payment_id, intent_id).await?;
            }
        }

        let payment = self.payments.find_by_id(payment_id).await?
            .ok_or_else(|| AppError::NotFound("Payment not found".to_string()))?;

        if applied {
            tracing::info!(
                "Payment {} moved to {}",
                payment_id,
                transition.target().as_str()
            );
        } else {
            tracing::debug!(
                "Discarded {:?} for payment {} in status {}",
                transition,
                payment_id,
                payment.status.as_str()
            );
        }

        Ok(TransitionResult { applied, payment })
    }

    /// `pending -> processing`, recording the intent id.
    pub async fn mark_processing(
        &self,
        payment_id: Uuid,
        intent_id: Option<&str>,
    ) -> Result<TransitionResult> {
        self.apply(payment_id, Transition::MarkProcessing, intent_id).await
    }

    /// `pending -> cancelled`.
    pub async fn cancel(&self, payment_id: Uuid) -> Result<TransitionResult> {
        self.apply(payment_id, Transition::Cancel, None).await
    }

    /// `pending | processing -> succeeded`, then materialize the booking.
    ///
    /// Materialization runs whenever the payment ends up succeeded without
    /// a booking, not only when this call applied the transition, so a
    /// redelivery heals a crash between the two steps.
    pub async fn succeed(
        &self,
        payment_id: Uuid,
        intent_id: Option<&str>,
    ) -> Result<TransitionResult> {
        let mut result = self.apply(payment_id, Transition::Succeed, intent_id).await?;

        match result.payment.status {
            PaymentStatus::Succeeded if result.payment.booking_id.is_none() => {
                match self.materializer.materialize(payment_id).await {
                    Ok(materialization) => {
                        result.payment.booking_id = Some(materialization.booking_id);
                    }
                    // Refunded between the transition and the claim.
                    Err(AppError::InvalidState(msg)) => tracing::warn!("{}", msg),
                    Err(e) => return Err(e),
                }
            }
            PaymentStatus::Cancelled | PaymentStatus::Failed => {
                tracing::warn!(
                    "Provider reports payment {} paid but it is already {}; needs manual review",
                    payment_id,
                    result.payment.status.as_str()
                );
            }
            _ => {}
        }

        Ok(result)
    }

    /// `processing -> failed`, telling the buyer when this call applied it.
    pub async fn fail(&self, payment_id: Uuid) -> Result<TransitionResult> {
        let result = self.apply(payment_id, Transition::Fail, None).await?;

        if result.applied {
            self.notifier
                .notify(Notification::new(
                    result.payment.buyer_id,
                    NotificationKind::PaymentFailed,
                    json!({
                        "payment_id": result.payment.id,
                        "service_id": result.payment.service_id,
                        "package_name": result.payment.package_name,
                    }),
                ))
                .await;
        }

        Ok(result)
    }
}
