use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;
use crate::domain::*;
use crate::error::Result;

pub mod booking_repository;
pub mod catalog_repository;
pub mod payment_repository;
pub mod webhook_event_repository;

pub use booking_repository::SqliteBookingRepository;
pub use catalog_repository::SqliteCatalogRepository;
pub use payment_repository::SqlitePaymentRepository;
pub use webhook_event_repository::SqliteWebhookEventRepository;

#[async_trait]
pub trait PaymentRepository: Send + Sync {
    async fn create(&self, payment: Payment) -> Result<Payment>;
    async fn find_by_id(&self, id: Uuid) -> Result<Option<Payment>>;
    async fn find_by_session_id(&self, session_id: &str) -> Result<Option<Payment>>;
    async fn find_by_intent_id(&self, intent_id: &str) -> Result<Option<Payment>>;

    /// Atomically move the payment along `transition` if, and only if, its
    /// current status is one of the transition's sources. When `intent_id`
    /// is given it is recorded unless one is already set.
    ///
    /// Returns `false` when nothing matched, i.e. the event was already
    /// applied or no longer applies.
    async fn transition(
        &self,
        id: Uuid,
        transition: Transition,
        intent_id: Option<&str>,
    ) -> Result<bool>;

    /// Record the provider intent id if none is set yet.
    async fn attach_intent(&self, id: Uuid, intent_id: &str) -> Result<bool>;

    /// `succeeded -> refunded`, storing the refund details in the same write.
    async fn mark_refunded(&self, id: Uuid, refund: &RefundDetails) -> Result<bool>;

    async fn list_succeeded_without_booking(
        &self,
        updated_before: DateTime<Utc>,
        limit: i64,
    ) -> Result<Vec<Payment>>;

    async fn list_open(&self, created_before: DateTime<Utc>, limit: i64) -> Result<Vec<Payment>>;
}

/// Result of trying to claim the booking slot of a payment.
#[derive(Debug, Clone)]
pub enum MaterializeOutcome {
    /// This caller won the claim and the booking was persisted.
    Created(Booking),
    /// Someone else already holds the slot.
    Existing(Uuid),
    /// The payment is not in `succeeded`, so no booking may exist for it.
    NotEligible(PaymentStatus),
}

#[async_trait]
pub trait BookingRepository: Send + Sync {
    /// Claim `payment.booking_id` and insert `booking` as one unit of work.
    /// A failed insert leaves the slot unclaimed.
    async fn materialize(&self, booking: Booking) -> Result<MaterializeOutcome>;
    async fn find_by_id(&self, id: Uuid) -> Result<Option<Booking>>;
    async fn find_by_payment(&self, payment_id: Uuid) -> Result<Option<Booking>>;
    /// `confirmed -> cancelled`; returns `false` if the booking was not confirmed.
    async fn cancel(&self, id: Uuid, reason: &str) -> Result<bool>;
}

#[async_trait]
pub trait CatalogRepository: Send + Sync {
    async fn find_service(&self, id: Uuid) -> Result<Option<Service>>;
    async fn find_package(&self, service_id: Uuid, package_id: Uuid) -> Result<Option<ServicePackage>>;
}

#[async_trait]
pub trait WebhookEventRepository: Send + Sync {
    async fn is_processed(&self, event_id: &str) -> Result<bool>;
    async fn record(&self, event_id: &str, kind: &str, outcome: &str) -> Result<()>;
}
