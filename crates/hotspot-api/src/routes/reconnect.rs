//! Reconnection-code routes

use crate::models::{ApiError, ApiResponse, ReconnectRequest};
use crate::AppState;
use axum::extract::State;
use axum::routing::post;
use axum::{Json, Router};
use hotspot_core::Session;

pub fn router() -> Router<AppState> {
    Router::new().route("/", post(redeem_code))
}

/// Restore access with a reconnection code
async fn redeem_code(
    State(state): State<AppState>,
    Json(req): Json<ReconnectRequest>,
) -> Result<Json<ApiResponse<Session>>, ApiError> {
    let session = state
        .engine
        .redeem_reconnection_code(&req.code, &req.mac_address)
        .await?;
    Ok(Json(ApiResponse::success(session)))
}
