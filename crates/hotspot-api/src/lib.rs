//! OpenHotspot Portal API
//!
//! HTTP boundary for the session core: portal-facing redemption and
//! payment-callback endpoints plus admin-gated voucher issuance and
//! session control.

use axum::{routing::get, Router};
use hotspot_core::PortalEngine;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

pub mod middleware;
pub mod models;
pub mod routes;

/// Shared API state
#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<PortalEngine>,
    /// Opaque shared secret gating admin routes (empty disables them)
    pub admin_key: String,
}

/// Build the API router
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(routes::health::health_check))
        .nest("/api/packages", routes::packages::router())
        .nest("/api/payments", routes::payments::router())
        .nest("/api/vouchers", routes::vouchers::router())
        .nest("/api/reconnect", routes::reconnect::router())
        .nest("/api/sessions", routes::sessions::router())
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
