use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{AppError, Result};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum PaymentStatus {
    Pending,
    Processing,
    Succeeded,
    Failed,
    Cancelled,
    Refunded,
}

impl PaymentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentStatus::Pending => "pending",
            PaymentStatus::Processing => "processing",
            PaymentStatus::Succeeded => "succeeded",
            PaymentStatus::Failed => "failed",
            PaymentStatus::Cancelled => "cancelled",
            PaymentStatus::Refunded => "refunded",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(PaymentStatus::Pending),
            "processing" => Some(PaymentStatus::Processing),
            "succeeded" => Some(PaymentStatus::Succeeded),
            "failed" => Some(PaymentStatus::Failed),
            "cancelled" => Some(PaymentStatus::Cancelled),
            "refunded" => Some(PaymentStatus::Refunded),
            _ => None,
        }
    }

    /// Still waiting on the provider to settle.
    pub fn is_open(&self) -> bool {
        matches!(self, PaymentStatus::Pending | PaymentStatus::Processing)
    }
}

/// The allowed edges of the payment state machine.
///
/// A transition is applied with a single conditional write against the
/// payment row; when the row is not in one of [`Transition::sources`] the
/// write matches nothing and the request is discarded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    /// Checkout finished, waiting on the intent to settle.
    MarkProcessing,
    /// Session expired, or the provider reports it unpaid and closed.
    Cancel,
    Succeed,
    Fail,
    Refund,
}

impl Transition {
    pub fn target(&self) -> PaymentStatus {
        match self {
            Transition::MarkProcessing => PaymentStatus::Processing,
            Transition::Cancel => PaymentStatus::Cancelled,
            Transition::Succeed => PaymentStatus::Succeeded,
            Transition::Fail => PaymentStatus::Failed,
            Transition::Refund => PaymentStatus::Refunded,
        }
    }

    pub fn sources(&self) -> &'static [PaymentStatus] {
        match self {
            Transition::MarkProcessing => &[PaymentStatus::Pending],
            Transition::Cancel => &[PaymentStatus::Pending],
            Transition::Succeed => &[PaymentStatus::Pending, PaymentStatus::Processing],
            Transition::Fail => &[PaymentStatus::Processing],
            Transition::Refund => &[PaymentStatus::Succeeded],
        }
    }

    pub fn applies_to(&self, status: PaymentStatus) -> bool {
        self.sources().contains(&status)
    }
}

/// Gross amount split between the platform and the seller, in minor units.
///
/// The fee is rounded half-up; the seller receives the remainder so that
/// `amount == platform_fee + seller_amount` always holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct FeeSplit {
    pub amount: i64,
    pub platform_fee: i64,
    pub seller_amount: i64,
}

impl FeeSplit {
    pub fn compute(amount: i64, fee_bps: u32) -> Result<Self> {
        if amount <= 0 {
            return Err(AppError::InvalidPackage("Package price must be positive".to_string()));
        }
        if fee_bps > 10_000 {
            return Err(AppError::Internal(format!("Platform fee of {} bps exceeds 100%", fee_bps)));
        }

        let fee = (amount as i128 * fee_bps as i128 + 5_000) / 10_000;
        let platform_fee = fee as i64;

        Ok(Self {
            amount,
            platform_fee,
            seller_amount: amount - platform_fee,
        })
    }
}

/// Everything needed to rebuild a booking from the payment alone, captured
/// at checkout time because the booking does not exist yet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BookingMetadata {
    pub version: u16,
    pub service_id: Uuid,
    pub package_id: Uuid,
    pub scheduled_at: DateTime<Utc>,
    pub duration_minutes: u32,
    pub notes: Option<String>,
}

impl BookingMetadata {
    pub const CURRENT_VERSION: u16 = 1;

    pub fn new(
        service_id: Uuid,
        package_id: Uuid,
        scheduled_at: DateTime<Utc>,
        duration_minutes: u32,
        notes: Option<String>,
    ) -> Self {
        Self {
            version: Self::CURRENT_VERSION,
            service_id,
            package_id,
            scheduled_at,
            duration_minutes,
            notes,
        }
    }

    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string(self)
            .map_err(|e| AppError::Internal(format!("Failed to encode booking metadata: {}", e)))
    }

    pub fn from_json(raw: &str) -> Result<Self> {
        let metadata: Self = serde_json::from_str(raw)
            .map_err(|e| AppError::Database(format!("Invalid booking metadata: {}", e)))?;

        if metadata.version != Self::CURRENT_VERSION {
            return Err(AppError::Database(format!(
                "Unsupported booking metadata version: {}",
                metadata.version
            )));
        }

        Ok(metadata)
    }

    /// Flattened string form sent along with the provider session, for
    /// dashboard visibility on the provider side.
    pub fn to_provider_metadata(&self, payment_id: Uuid) -> HashMap<String, String> {
        let mut metadata = HashMap::new();
        metadata.insert("payment_id".to_string(), payment_id.to_string());
        metadata.insert("metadata_version".to_string(), self.version.to_string());
        metadata.insert("service_id".to_string(), self.service_id.to_string());
        metadata.insert("package_id".to_string(), self.package_id.to_string());
        metadata.insert("scheduled_date".to_string(), self.scheduled_at.to_rfc3339());
        metadata.insert("duration".to_string(), self.duration_minutes.to_string());
        if let Some(notes) = &self.notes {
            metadata.insert("notes".to_string(), notes.clone());
        }
        metadata
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RefundDetails {
    pub refund_id: String,
    pub amount_cents: i64,
    pub reason: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Payment {
    pub id: Uuid,
    pub provider_session_id: String,
    pub provider_intent_id: Option<String>,
    pub buyer_id: Uuid,
    pub seller_id: Uuid,
    pub service_id: Uuid,
    pub package_id: Uuid,
    pub package_name: String,
    pub amount_cents: i64,
    pub platform_fee_cents: i64,
    pub seller_amount_cents: i64,
    pub currency: String,
    pub status: PaymentStatus,
    pub metadata: BookingMetadata,
    pub booking_id: Option<Uuid>,
    pub refund: Option<RefundDetails>,
    pub paid_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Payment {
    pub fn is_party(&self, user_id: Uuid) -> bool {
        self.buyer_id == user_id || self.seller_id == user_id
    }
}

/// What callers outside the engine get to see of a payment.
#[derive(Debug, Clone, Serialize)]
pub struct PaymentProjection {
    pub id: Uuid,
    pub session_id: String,
    pub status: PaymentStatus,
    pub buyer_id: Uuid,
    pub seller_id: Uuid,
    pub service_id: Uuid,
    pub package_name: String,
    pub amount_cents: i64,
    pub platform_fee_cents: i64,
    pub seller_amount_cents: i64,
    pub currency: String,
    pub scheduled_at: DateTime<Utc>,
    pub booking_id: Option<Uuid>,
    pub refund: Option<RefundDetails>,
    pub paid_at: Option<DateTime<Utc>>,
    pub updated_at: DateTime<Utc>,
}

impl From<&Payment> for PaymentProjection {
    fn from(payment: &Payment) -> Self {
        Self {
            id: payment.id,
            session_id: payment.provider_session_id.clone(),
            status: payment.status,
            buyer_id: payment.buyer_id,
            seller_id: payment.seller_id,
            service_id: payment.service_id,
            package_name: payment.package_name.clone(),
            amount_cents: payment.amount_cents,
            platform_fee_cents: payment.platform_fee_cents,
            seller_amount_cents: payment.seller_amount_cents,
            currency: payment.currency.clone(),
            scheduled_at: payment.metadata.scheduled_at,
            booking_id: payment.booking_id,
            refund: payment.refund.clone(),
            paid_at: payment.paid_at,
            updated_at: payment.updated_at,
        }
    }
}
