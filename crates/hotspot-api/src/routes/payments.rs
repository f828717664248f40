//! Payment routes
//!
//! Purchase initiation bookkeeping, the payment-gateway callback, and the
//! status lookup the portal polls while a push payment is in flight.

use crate::models::{
    ApiError, ApiResponse, CallbackResponse, PurchaseRequest, StkCallbackBody,
};
use crate::AppState;
use axum::extract::{Path, State};
use axum::routing::{get, post};
use axum::{Json, Router};
use hotspot_core::{CallbackOutcome, Payment, PortalError, Session};
use serde::Serialize;
use tracing::info;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/initiate", post(initiate_purchase))
        .route("/callback", post(payment_callback))
        .route("/:checkout_ref", get(payment_status))
}

#[derive(Serialize)]
struct PurchaseResponse {
    session: Session,
    payment: Payment,
}

/// Record the pending session + payment for a started push payment
async fn initiate_purchase(
    State(state): State<AppState>,
    Json(req): Json<PurchaseRequest>,
) -> Result<Json<ApiResponse<PurchaseResponse>>, ApiError> {
    let (session, payment) = state.engine.begin_purchase(
        &req.package_id,
        &req.phone_number,
        &req.mac_address,
        &req.checkout_request_id,
    )?;
    Ok(Json(ApiResponse::success(PurchaseResponse {
        session,
        payment,
    })))
}

/// Payment-gateway callback (M-Pesa STK shape)
async fn payment_callback(
    State(state): State<AppState>,
    Json(body): Json<StkCallbackBody>,
) -> Result<Json<ApiResponse<CallbackResponse>>, ApiError> {
    let callback = body.body.stk_callback;
    info!(
        "payment callback for {} (result code {})",
        callback.checkout_request_id, callback.result_code
    );

    let receipt = callback.receipt_number();
    let outcome = state
        .engine
        .activate_from_payment(&callback.checkout_request_id, callback.result_code, receipt)
        .await?;

    let status = match outcome {
        CallbackOutcome::Activated { .. } => "activated",
        CallbackOutcome::Failed(_) => "failed",
        CallbackOutcome::AlreadyProcessed => "already-processed",
    };
    Ok(Json(ApiResponse::success(CallbackResponse {
        status: status.into(),
    })))
}

/// Payment status lookup by checkout reference (portal polling)
async fn payment_status(
    State(state): State<AppState>,
    Path(checkout_ref): Path<String>,
) -> Result<Json<ApiResponse<Payment>>, ApiError> {
    let payment = state
        .engine
        .payment_by_checkout(&checkout_ref)
        .ok_or(PortalError::PaymentNotFound(checkout_ref))?;
    Ok(Json(ApiResponse::success(payment)))
}
