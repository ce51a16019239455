use axum::{
    extract::{Extension, Path, State},
    http::{HeaderMap, StatusCode},
    Json,
};
use chrono::{DateTime, FixedOffset, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use crate::{
    api::{middleware::auth::CurrentUser, state::AppState},
    domain::PaymentProjection,
    error::{AppError, Result},
    service::CheckoutRequest,
};

const SIGNATURE_HEADER: &str = "stripe-signature";

#[derive(Debug, Deserialize, Validate)]
pub struct CreateCheckoutRequest {
    pub service_id: Uuid,
    pub package_id: Uuid,
    /// RFC 3339 with any offset; stored as UTC.
    pub scheduled_date: DateTime<FixedOffset>,
    #[validate(range(min = 1, max = 1440))]
    pub duration_minutes: u32,
    #[validate(length(max = 2000))]
    pub notes: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct CheckoutResponse {
    pub session_id: String,
    pub redirect_url: String,
}

#[derive(Debug, Serialize)]
pub struct VerifySessionResponse {
    pub payment: PaymentProjection,
    pub provider_status: Option<String>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct RefundRequest {
    #[validate(length(min = 1, max = 500))]
    pub reason: String,
}

/// Takes the body as an untouched `String`: the signature is computed over
/// the exact bytes the provider sent.
pub async fn stripe_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: String,
) -> Result<StatusCode> {
    let signature = headers
        .get(SIGNATURE_HEADER)
        .and_then(|value| value.to_str().ok())
        .ok_or_else(|| {
            tracing::warn!("Webhook rejected: missing {} header", SIGNATURE_HEADER);
            AppError::InvalidSignature
        })?;

    state.services.webhooks.handle(&body, signature).await?;

    Ok(StatusCode::OK)
}

pub async fn create_checkout(
    State(state): State<AppState>,
    Extension(current_user): Extension<CurrentUser>,
    Json(request): Json<CreateCheckoutRequest>,
) -> Result<Json<CheckoutResponse>> {
    request
        .validate()
        .map_err(|e| AppError::Validation(e.to_string()))?;

    let session = state.services.checkout
        .create_checkout(
            current_user.caller,
            CheckoutRequest {
                service_id: request.service_id,
                package_id: request.package_id,
                scheduled_at: request.scheduled_date.with_timezone(&Utc),
                duration_minutes: request.duration_minutes,
                notes: request.notes.filter(|n| !n.trim().is_empty()),
            },
        )
        .await?;

    Ok(Json(CheckoutResponse {
        session_id: session.session_id,
        redirect_url: session.redirect_url,
    }))
}

pub async fn verify_session(
    State(state): State<AppState>,
    Extension(current_user): Extension<CurrentUser>,
    Path(session_id): Path<String>,
) -> Result<Json<VerifySessionResponse>> {
    let result = state.services.verifier
        .verify(&session_id, current_user.caller)
        .await?;

    Ok(Json(VerifySessionResponse {
        payment: result.payment,
        provider_status: result.provider_status,
    }))
}

pub async fn get(
    State(state): State<AppState>,
    Extension(current_user): Extension<CurrentUser>,
    Path(id): Path<Uuid>,
) -> Result<Json<PaymentProjection>> {
    let payment = state.services.payment_repo
        .find_by_id(id)
        .await?
        .ok_or_else(|| AppError::NotFound("Payment not found".to_string()))?;

    let caller = current_user.caller;
    if !payment.is_party(caller.id) && !caller.is_admin() {
        return Err(AppError::Forbidden);
    }

    Ok(Json(PaymentProjection::from(&payment)))
}

pub async fn refund(
    State(state): State<AppState>,
    Extension(current_user): Extension<CurrentUser>,
    Path(id): Path<Uuid>,
    Json(request): Json<RefundRequest>,
) -> Result<Json<PaymentProjection>> {
    request
        .validate()
        .map_err(|e| AppError::Validation(e.to_string()))?;

    let payment = state.services.refunds
        .refund(id, &request.reason, current_user.caller)
        .await?;

    Ok(Json(payment))
}
