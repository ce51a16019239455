pub mod handlers;
pub mod middleware;
pub mod state;

use axum::{
    Router,
    routing::{get, post},
};
use tower_http::{
    compression::CompressionLayer,
    cors::CorsLayer,
    trace::TraceLayer,
};
use std::sync::Arc;

use crate::{
    config::Settings,
    service::PaymentServices,
};
use state::AppState;

pub fn create_app(
    services: Arc<PaymentServices>,
    settings: Arc<Settings>,
) -> Router {
    let app_state = AppState::new(services, settings);

    Router::new()
        .route("/health", get(handlers::root::health_check))

        // Provider webhook: no auth, raw body
        .route("/webhooks/stripe", post(handlers::payments::stripe_webhook))

        .nest("/api", api_routes(app_state.clone()))

        // Add state to the router
        .with_state(app_state)

        // Middleware
        .layer(CompressionLayer::new())
        .layer(CorsLayer::permissive()) // Configure properly for production
        .layer(TraceLayer::new_for_http())
}

fn api_routes(state: AppState) -> Router<AppState> {
    Router::new()
        .route("/checkout", post(handlers::payments::create_checkout))
        .route("/checkout/:session_id/verify", get(handlers::payments::verify_session))
        .route("/payments/:id", get(handlers::payments::get))
        .route("/payments/:id/refund", post(handlers::payments::refund))
        .route_layer(axum::middleware::from_fn_with_state(
            state,
            middleware::auth::require_auth,
        ))
}
