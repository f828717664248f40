//! Admin authentication
//!
//! Admin routes are gated by an opaque shared secret presented in the
//! `x-admin-key` header and verified server-side on every request; no
//! client-held state is trusted.

use crate::models::ApiError;
use axum::http::HeaderMap;
use hotspot_core::PortalError;

/// Header carrying the admin credential
pub const ADMIN_KEY_HEADER: &str = "x-admin-key";

/// Verify the admin shared secret. An empty configured key disables all
/// admin operations rather than opening them up.
pub fn verify_admin(configured_key: &str, headers: &HeaderMap) -> Result<(), ApiError> {
    let presented = headers
        .get(ADMIN_KEY_HEADER)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default();

    if configured_key.is_empty() || presented != configured_key {
        return Err(ApiError(PortalError::Unauthorized));
    }
    Ok(())
}
