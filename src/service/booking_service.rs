use std::sync::Arc;
use serde_json::json;
use uuid::Uuid;

use crate::{
    domain::{Booking, Payment, PaymentStatus},
    error::{AppError, Result},
    notifications::{Notification, NotificationDispatcher, NotificationKind},
    repository::{BookingRepository, MaterializeOutcome, PaymentRepository},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Materialization {
    pub booking_id: Uuid,
    /// `true` only for the caller that won the claim.
    pub created: bool,
}

/// Turns a succeeded payment into its one booking.
///
/// Both the webhook path and the session verifier end up here. Concurrent
/// callers race on the payment's booking slot; exactly one wins and creates
/// the booking, the rest get the winner's booking id back.
pub struct BookingMaterializer {
    payments: Arc<dyn PaymentRepository>,
    bookings: Arc<dyn BookingRepository>,
    notifier: Arc<NotificationDispatcher>,
}

impl BookingMaterializer {
    pub fn new(
        payments: Arc<dyn PaymentRepository>,
        bookings: Arc<dyn BookingRepository>,
        notifier: Arc<NotificationDispatcher>,
    ) -> Self {
        Self { payments, bookings, notifier }
    }

    pub async fn materialize(&self, payment_id: Uuid) -> Result<Materialization> {
        let payment = self.payments.find_by_id(payment_id).await?
            .ok_or_else(|| AppError::NotFound("Payment not found".to_string()))?;

        if let Some(booking_id) = payment.booking_id {
            return Ok(Materialization { booking_id, created: false });
        }

        if payment.status != PaymentStatus::Succeeded {
            return Err(AppError::InvalidState(format!(
                "Cannot book a {} payment",
                payment.status.as_str()
            )));
        }

        let booking = Booking::from_payment(Uuid::new_v4(), &payment);

        match self.bookings.materialize(booking).await? {
            MaterializeOutcome::Created(booking) => {
                tracing::info!(
                    "Materialized booking {} for payment {}",
                    booking.id,
                    payment.id
                );
                self.announce(&payment, &booking).await;
                Ok(Materialization { booking_id: booking.id, created: true })
            }
            MaterializeOutcome::Existing(booking_id) => {
                tracing::debug!(
                    "Payment {} already materialized as booking {}",
                    payment.id,
                    booking_id
                );
                Ok(Materialization { booking_id, created: false })
            }
            MaterializeOutcome::NotEligible(status) => Err(AppError::InvalidState(format!(
                "Payment {} moved to {} before it could be booked",
                payment.id,
                status.as_str()
            ))),
        }
    }

    async fn announce(&self, payment: &Payment, booking: &Booking) {
        let payload = json!({
            "booking_id": booking.id,
            "payment_id": payment.id,
            "service_id": booking.service_id,
            "package_name": booking.package_name,
            "scheduled_at": booking.scheduled_at,
            "duration_minutes": booking.duration_minutes,
            "amount_cents": payment.amount_cents,
            "seller_amount_cents": payment.seller_amount_cents,
            "currency": payment.currency,
        });

        self.notifier
            .notify(Notification::new(
                payment.seller_id,
                NotificationKind::NewPaidBooking,
                payload.clone(),
            ))
            .await;
        self.notifier
            .notify(Notification::new(
                payment.buyer_id,
                NotificationKind::BookingConfirmed,
                payload,
            ))
            .await;
    }
}
