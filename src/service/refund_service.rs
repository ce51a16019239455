use std::sync::Arc;
use serde_json::json;
use uuid::Uuid;

use crate::{
    domain::{Caller, Payment, PaymentProjection, PaymentStatus, RefundDetails},
    error::{AppError, Result},
    notifications::{Notification, NotificationDispatcher, NotificationKind},
    payments::ProviderGateway,
    repository::{BookingRepository, PaymentRepository},
};

pub struct RefundService {
    gateway: Arc<dyn ProviderGateway>,
    payments: Arc<dyn PaymentRepository>,
    bookings: Arc<dyn BookingRepository>,
    notifier: Arc<NotificationDispatcher>,
}

impl RefundService {
    pub fn new(
        gateway: Arc<dyn ProviderGateway>,
        payments: Arc<dyn PaymentRepository>,
        bookings: Arc<dyn BookingRepository>,
        notifier: Arc<NotificationDispatcher>,
    ) -> Self {
        Self {
            gateway,
            payments,
            bookings,
            notifier,
        }
    }

    /// Refund a succeeded payment and cancel its booking.
    ///
    /// The provider is called first; if it fails nothing is written and the
    /// call can be retried.
    pub async fn refund(
        &self,
        payment_id: Uuid,
        reason: &str,
        caller: Caller,
    ) -> Result<PaymentProjection> {
        let payment = self.payments.find_by_id(payment_id).await?
            .ok_or_else(|| AppError::NotFound("Payment not found".to_string()))?;

        if payment.buyer_id != caller.id && !caller.is_admin() {
            return Err(AppError::Forbidden);
        }

        if payment.status != PaymentStatus::Succeeded {
            return Err(AppError::InvalidState(format!(
                "Only succeeded payments can be refunded, this one is {}",
                payment.status.as_str()
            )));
        }

        let intent_id = payment.provider_intent_id.as_deref().ok_or_else(|| {
            AppError::InvalidState("Payment has no provider intent to refund".to_string())
        })?;

        let provider_refund = self.gateway
            .create_refund(intent_id, reason, &format!("refund-{}", payment.id))
            .await
            .map_err(|e| match e {
                AppError::RefundFailed(msg) => AppError::RefundFailed(msg),
                other => AppError::RefundFailed(other.to_string()),
            })?;

        let details = RefundDetails {
            refund_id: provider_refund.refund_id,
            amount_cents: provider_refund.amount_cents,
            reason: reason.to_string(),
        };

        let applied = self.payments.mark_refunded(payment.id, &details).await?;

        // Re-read so a booking claimed while the provider call was in flight
        // is seen and cancelled.
        let payment = self.payments.find_by_id(payment_id).await?
            .ok_or_else(|| AppError::NotFound("Payment not found".to_string()))?;

        if !applied {
            tracing::info!(
                "Refund for payment {} already recorded (status {})",
                payment.id,
                payment.status.as_str()
            );
            return Ok(PaymentProjection::from(&payment));
        }

        tracing::info!(
            "Refunded payment {} ({} {}) as {}",
            payment.id,
            details.amount_cents,
            payment.currency,
            details.refund_id
        );

        let mut booking_cancelled = false;
        if let Some(booking_id) = payment.booking_id {
            booking_cancelled = self.bookings.cancel(booking_id, reason).await?;
            if booking_cancelled {
                tracing::info!("Cancelled booking {} after refund", booking_id);
            }
        }

        self.announce(&payment, &details, booking_cancelled).await;

        Ok(PaymentProjection::from(&payment))
    }

    async fn announce(&self, payment: &Payment, refund: &RefundDetails, booking_cancelled: bool) {
        let payload = json!({
            "payment_id": payment.id,
            "booking_id": payment.booking_id,
            "booking_cancelled": booking_cancelled,
            "refund_id": refund.refund_id,
            "amount_cents": refund.amount_cents,
            "currency": payment.currency,
            "reason": refund.reason,
        });

        for recipient in [payment.buyer_id, payment.seller_id] {
            self.notifier
                .notify(Notification::new(
                    recipient,
                    NotificationKind::PaymentRefunded,
                    payload.clone(),
                ))
                .await;
        }
    }
}
