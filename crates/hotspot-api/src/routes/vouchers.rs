//! Voucher routes

use crate::middleware::auth::verify_admin;
use crate::models::{ApiError, ApiResponse, GenerateVouchersRequest, RedeemVoucherRequest};
use crate::AppState;
use axum::extract::State;
use axum::http::HeaderMap;
use axum::routing::post;
use axum::{Json, Router};
use hotspot_core::{AccessPackage, Session, Voucher};
use serde::Serialize;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/redeem", post(redeem_voucher))
        .route("/generate", post(generate_vouchers))
}

#[derive(Serialize)]
struct RedeemResponse {
    session: Session,
    package: AccessPackage,
}

/// Redeem a voucher code for the requesting device
async fn redeem_voucher(
    State(state): State<AppState>,
    Json(req): Json<RedeemVoucherRequest>,
) -> Result<Json<ApiResponse<RedeemResponse>>, ApiError> {
    let (session, package) = state
        .engine
        .redeem_voucher(&req.code, &req.mac_address)
        .await?;
    Ok(Json(ApiResponse::success(RedeemResponse {
        session,
        package,
    })))
}

/// Issue a voucher batch (admin)
async fn generate_vouchers(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(req): Json<GenerateVouchersRequest>,
) -> Result<Json<ApiResponse<Vec<Voucher>>>, ApiError> {
    verify_admin(&state.admin_key, &headers)?;
    let vouchers =
        state
            .engine
            .generate_vouchers(&req.package_id, req.quantity, req.prefix.as_deref())?;
    Ok(Json(ApiResponse::success(vouchers)))
}
