use axum::{extract::State, http::StatusCode, Json, response::IntoResponse};
use serde_json::json;

use crate::api::state::AppState;

pub async fn health_check(State(state): State<AppState>) -> impl IntoResponse {
    (StatusCode::OK, Json(json!({
        "status": "healthy",
        "service": "mentorbook",
        "version": env!("CARGO_PKG_VERSION"),
        "reconciliation": state.settings.reconciliation.enabled,
        "timestamp": chrono::Utc::now().to_rfc3339()
    })))
}
