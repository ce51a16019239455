use axum::{
    extract::{Request, State},
    http::header::AUTHORIZATION,
    middleware::Next,
    response::Response,
};
use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    api::state::AppState,
    domain::{Caller, Role},
    error::AppError,
};

/// Claims carried by bearer tokens issued by the identity service.
#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub sub: Uuid,
    pub role: Role,
    pub exp: usize,
}

#[derive(Clone, Copy)]
pub struct CurrentUser {
    pub caller: Caller,
}

pub fn decode_caller(token: &str, secret: &str) -> Result<Caller, AppError> {
    let data = decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::new(Algorithm::HS256),
    )
    .map_err(|e| {
        tracing::debug!("Rejected bearer token: {}", e);
        AppError::Unauthorized
    })?;

    Ok(Caller::new(data.claims.sub, data.claims.role))
}

pub async fn require_auth(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let token = request
        .headers()
        .get(AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .ok_or(AppError::Unauthorized)?;

    let caller = decode_caller(token, &state.settings.auth.jwt_secret)?;

    // Insert current user into request extensions
    request.extensions_mut().insert(CurrentUser { caller });

    Ok(next.run(request).await)
}
