//! Error types for OpenHotspot

use thiserror::Error;

/// OpenHotspot error type
#[derive(Error, Debug)]
pub enum PortalError {
    /// Session not found
    #[error("session not found: {0}")]
    SessionNotFound(uuid::Uuid),

    /// Payment not found for a checkout reference
    #[error("payment not found for checkout reference: {0}")]
    PaymentNotFound(String),

    /// Package not found in the catalog
    #[error("package not found: {0}")]
    PackageNotFound(String),

    /// Redemption code is wrong or already consumed (intentionally
    /// ambiguous to avoid code enumeration)
    #[error("invalid or already used code")]
    InvalidOrUsedCode,

    /// Reconnection code is bound to a different device
    #[error("code is not valid for this device")]
    DeviceMismatch,

    /// Voucher batch larger than the issuance cap
    #[error("batch too large: requested {requested}, max {max}")]
    BatchTooLarge { requested: usize, max: usize },

    /// Network access gateway could not be reached (non-fatal, logged)
    #[error("gateway unreachable: {0}")]
    GatewayUnreachable(String),

    /// Admin operation without a valid credential
    #[error("unauthorized")]
    Unauthorized,

    /// Malformed or conflicting request input
    #[error("invalid request: {0}")]
    InvalidRequest(String),
}

/// Result type for OpenHotspot
pub type PortalResult<T> = Result<T, PortalError>;
