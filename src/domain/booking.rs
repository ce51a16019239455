use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::Payment;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Booking {
    pub id: Uuid,
    pub payment_id: Uuid,
    pub buyer_id: Uuid,
    pub seller_id: Uuid,
    pub service_id: Uuid,
    pub package_id: Uuid,
    pub package_name: String,
    pub scheduled_at: DateTime<Utc>,
    pub duration_minutes: u32,
    pub notes: Option<String>,
    pub status: BookingStatus,
    pub cancellation_reason: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum BookingStatus {
    Confirmed,
    Cancelled,
    Completed,
}

impl BookingStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            BookingStatus::Confirmed => "confirmed",
            BookingStatus::Cancelled => "cancelled",
            BookingStatus::Completed => "completed",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "confirmed" => Some(BookingStatus::Confirmed),
            "cancelled" => Some(BookingStatus::Cancelled),
            "completed" => Some(BookingStatus::Completed),
            _ => None,
        }
    }
}

impl Booking {
    /// Rebuild the booking from what the payment captured at checkout.
    pub fn from_payment(id: Uuid, payment: &Payment) -> Self {
        let now = Utc::now();
        Self {
            id,
            payment_id: payment.id,
            buyer_id: payment.buyer_id,
            seller_id: payment.seller_id,
            service_id: payment.metadata.service_id,
            package_id: payment.metadata.package_id,
            package_name: payment.package_name.clone(),
            scheduled_at: payment.metadata.scheduled_at,
            duration_minutes: payment.metadata.duration_minutes,
            notes: payment.metadata.notes.clone(),
            status: BookingStatus::Confirmed,
            cancellation_reason: None,
            created_at: now,
            updated_at: now,
        }
    }
}
