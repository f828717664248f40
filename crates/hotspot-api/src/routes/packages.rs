//! Package catalog routes

use crate::models::ApiResponse;
use crate::AppState;
use axum::{extract::State, routing::get, Json, Router};
use hotspot_core::AccessPackage;

pub fn router() -> Router<AppState> {
    Router::new().route("/", get(list_packages))
}

/// List purchasable access tiers
async fn list_packages(State(state): State<AppState>) -> Json<ApiResponse<Vec<AccessPackage>>> {
    Json(ApiResponse::success(state.engine.packages()))
}
