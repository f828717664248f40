//! Session routes
//!
//! Public status/authorization checks plus admin session control.

use crate::middleware::auth::verify_admin;
use crate::models::{
    ApiError, ApiResponse, AuthorizeRequest, AuthorizeResponse, DisconnectRequest, SweepResponse,
};
use crate::AppState;
use axum::extract::{Path, State};
use axum::http::HeaderMap;
use axum::routing::{get, post};
use axum::{Json, Router};
use hotspot_core::{AuthorizationResult, DisconnectActor, PortalError, Session};
use uuid::Uuid;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_active_sessions))
        .route("/sweep", post(sweep_expired))
        .route("/device/:mac", get(get_device_session))
        .route("/:id", get(get_session))
        .route("/:id/authorize", post(authorize_session))
        .route("/:id/disconnect", post(disconnect_session))
}

/// The device's current active session, used by the portal to restore
/// state on load
async fn get_device_session(
    State(state): State<AppState>,
    Path(mac): Path<String>,
) -> Json<ApiResponse<Option<Session>>> {
    Json(ApiResponse::success(
        state.engine.active_session_for_device(&mac),
    ))
}

/// Session status lookup (portal polling)
async fn get_session(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<Session>>, ApiError> {
    let session = state
        .engine
        .session(id)
        .ok_or(PortalError::SessionNotFound(id))?;
    Ok(Json(ApiResponse::success(session)))
}

/// Authorization decision for a session + device
async fn authorize_session(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(req): Json<AuthorizeRequest>,
) -> Json<ApiResponse<AuthorizeResponse>> {
    let response = match state.engine.authorize(id, &req.mac_address).await {
        AuthorizationResult::Granted { remaining_secs, .. } => AuthorizeResponse {
            authorized: true,
            reason: None,
            remaining_secs: Some(remaining_secs),
        },
        AuthorizationResult::Denied { reason } => AuthorizeResponse {
            authorized: false,
            reason: Some(reason),
            remaining_secs: None,
        },
    };
    Json(ApiResponse::success(response))
}

/// Active sessions for the operator dashboard (admin)
async fn list_active_sessions(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<ApiResponse<Vec<Session>>>, ApiError> {
    verify_admin(&state.admin_key, &headers)?;
    Ok(Json(ApiResponse::success(state.engine.active_sessions())))
}

/// Disconnect a session. The admin credential is required only for
/// admin-actor disconnects; a user disconnecting their own session
/// presents the (unguessable) session id.
async fn disconnect_session(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    headers: HeaderMap,
    Json(req): Json<DisconnectRequest>,
) -> Result<Json<ApiResponse<Session>>, ApiError> {
    if req.actor == DisconnectActor::Admin {
        verify_admin(&state.admin_key, &headers)?;
    }
    let session = state.engine.disconnect(id, req.actor).await?;
    Ok(Json(ApiResponse::success(session)))
}

/// Manual expiry sweep trigger (admin)
async fn sweep_expired(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<ApiResponse<SweepResponse>>, ApiError> {
    verify_admin(&state.admin_key, &headers)?;
    let expired_count = state.engine.sweep_expired().await;
    Ok(Json(ApiResponse::success(SweepResponse { expired_count })))
}
