use std::sync::Arc;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::{
    domain::{BookingMetadata, Caller, FeeSplit, Payment, PaymentStatus, Role},
    error::{AppError, Result},
    payments::{ProviderGateway, SessionRequest},
    repository::{CatalogRepository, PaymentRepository},
};

#[derive(Debug, Clone)]
pub struct CheckoutRequest {
    pub service_id: Uuid,
    pub package_id: Uuid,
    pub scheduled_at: DateTime<Utc>,
    pub duration_minutes: u32,
    pub notes: Option<String>,
}

#[derive(Debug, Clone)]
pub struct CheckoutSession {
    pub payment_id: Uuid,
    pub session_id: String,
    pub redirect_url: String,
}

pub struct CheckoutService {
    catalog: Arc<dyn CatalogRepository>,
    payments: Arc<dyn PaymentRepository>,
    gateway: Arc<dyn ProviderGateway>,
    platform_fee_bps: u32,
    currency: String,
}

impl CheckoutService {
    pub fn new(
        catalog: Arc<dyn CatalogRepository>,
        payments: Arc<dyn PaymentRepository>,
        gateway: Arc<dyn ProviderGateway>,
        platform_fee_bps: u32,
        currency: String,
    ) -> Self {
        Self {
            catalog,
            payments,
            gateway,
            platform_fee_bps,
            currency,
        }
    }

    /// Validate the purchase, open a provider session and persist the
    /// pending payment. Nothing is stored if the provider call fails.
    pub async fn create_checkout(
        &self,
        buyer: Caller,
        request: CheckoutRequest,
    ) -> Result<CheckoutSession> {
        if buyer.role != Role::Mentee {
            return Err(AppError::Forbidden);
        }

        if request.scheduled_at <= Utc::now() {
            return Err(AppError::InvalidSchedule(
                "Scheduled date must be in the future".to_string(),
            ));
        }
        if request.duration_minutes == 0 {
            return Err(AppError::InvalidSchedule("Duration must be positive".to_string()));
        }

        let service = self.catalog.find_service(request.service_id).await?
            .filter(|s| s.is_published)
            .ok_or_else(|| AppError::ServiceUnavailable("Service is not available".to_string()))?;

        if service.seller_id == buyer.id {
            return Err(AppError::Forbidden);
        }

        let package = self.catalog.find_package(service.id, request.package_id).await?
            .filter(|p| p.is_active)
            .ok_or_else(|| AppError::InvalidPackage("Package not found for this service".to_string()))?;

        let split = FeeSplit::compute(package.price_cents, self.platform_fee_bps)?;

        let payment_id = Uuid::new_v4();
        let metadata = BookingMetadata::new(
            service.id,
            package.id,
            request.scheduled_at,
            request.duration_minutes,
            request.notes,
        );

        let session = self.gateway
            .create_session(SessionRequest {
                payment_id,
                buyer_id: buyer.id,
                amount_cents: split.amount,
                currency: self.currency.clone(),
                product_name: format!("{} - {}", service.title, package.name),
                description: format!(
                    "{} minute session on {}",
                    request.duration_minutes,
                    request.scheduled_at.format("%Y-%m-%d %H:%M UTC")
                ),
                metadata: metadata.to_provider_metadata(payment_id),
            })
            .await?;

        let now = Utc::now();
        let payment = self.payments
            .create(Payment {
                id: payment_id,
                provider_session_id: session.session_id.clone(),
                provider_intent_id: None,
                buyer_id: buyer.id,
                seller_id: service.seller_id,
                service_id: service.id,
                package_id: package.id,
                package_name: package.name.clone(),
                amount_cents: split.amount,
                platform_fee_cents: split.platform_fee,
                seller_amount_cents: split.seller_amount,
                currency: self.currency.clone(),
                status: PaymentStatus::Pending,
                metadata,
                booking_id: None,
                refund: None,
                paid_at: None,
                created_at: now,
                updated_at: now,
            })
            .await?;

        tracing::info!(
            "Opened checkout session {} for payment {} ({} {})",
            session.session_id,
            payment.id,
            payment.amount_cents,
            payment.currency
        );

        Ok(CheckoutSession {
            payment_id: payment.id,
            session_id: session.session_id,
            redirect_url: session.redirect_url,
        })
    }
}
