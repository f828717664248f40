//! API Models

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use hotspot_core::{DisconnectActor, PortalError};
use serde::{Deserialize, Serialize};

/// Standard API response
#[derive(Debug, Serialize, Deserialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: Option<T>,
    pub error: Option<ErrorResponse>,
}

impl<T> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }

    pub fn error(code: &str, message: &str) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(ErrorResponse {
                code: code.to_string(),
                message: message.to_string(),
            }),
        }
    }
}

/// Error response
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub code: String,
    pub message: String,
}

/// Core error carried to the wire with the right status code
#[derive(Debug)]
pub struct ApiError(pub PortalError);

impl From<PortalError> for ApiError {
    fn from(err: PortalError) -> Self {
        Self(err)
    }
}

impl ApiError {
    fn status(&self) -> StatusCode {
        match self.0 {
            PortalError::SessionNotFound(_)
            | PortalError::PaymentNotFound(_)
            | PortalError::PackageNotFound(_) => StatusCode::NOT_FOUND,
            PortalError::InvalidOrUsedCode
            | PortalError::BatchTooLarge { .. }
            | PortalError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            PortalError::DeviceMismatch => StatusCode::FORBIDDEN,
            PortalError::Unauthorized => StatusCode::UNAUTHORIZED,
            PortalError::GatewayUnreachable(_) => StatusCode::BAD_GATEWAY,
        }
    }

    fn code(&self) -> &'static str {
        match self.0 {
            PortalError::SessionNotFound(_) => "session-not-found",
            PortalError::PaymentNotFound(_) => "payment-not-found",
            PortalError::PackageNotFound(_) => "package-not-found",
            PortalError::InvalidOrUsedCode => "invalid-or-used-code",
            PortalError::DeviceMismatch => "device-mismatch",
            PortalError::BatchTooLarge { .. } => "batch-too-large",
            PortalError::Unauthorized => "unauthorized",
            PortalError::GatewayUnreachable(_) => "gateway-unreachable",
            PortalError::InvalidRequest(_) => "invalid-request",
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = ApiResponse::<()>::error(self.code(), &self.0.to_string());
        (self.status(), Json(body)).into_response()
    }
}

// ============ Requests ============

/// Start a push-payment purchase
#[derive(Debug, Deserialize)]
pub struct PurchaseRequest {
    pub package_id: String,
    pub phone_number: String,
    pub mac_address: String,
    pub checkout_request_id: String,
}

/// Voucher redemption
#[derive(Debug, Deserialize)]
pub struct RedeemVoucherRequest {
    pub code: String,
    pub mac_address: String,
}

/// Reconnection-code redemption
#[derive(Debug, Deserialize)]
pub struct ReconnectRequest {
    pub code: String,
    pub mac_address: String,
}

/// Authorization check for a session
#[derive(Debug, Deserialize)]
pub struct AuthorizeRequest {
    pub mac_address: String,
}

/// Forced disconnect (admin)
#[derive(Debug, Deserialize)]
pub struct DisconnectRequest {
    #[serde(default = "default_actor")]
    pub actor: DisconnectActor,
}

fn default_actor() -> DisconnectActor {
    DisconnectActor::Admin
}

/// Voucher batch issuance (admin)
#[derive(Debug, Deserialize)]
pub struct GenerateVouchersRequest {
    pub package_id: String,
    #[serde(default = "default_quantity")]
    pub quantity: usize,
    pub prefix: Option<String>,
}

fn default_quantity() -> usize {
    1
}

// ============ Payment gateway callback ============

/// M-Pesa STK push callback envelope
#[derive(Debug, Deserialize)]
pub struct StkCallbackBody {
    #[serde(rename = "Body")]
    pub body: StkCallbackInner,
}

#[derive(Debug, Deserialize)]
pub struct StkCallbackInner {
    #[serde(rename = "stkCallback")]
    pub stk_callback: StkCallback,
}

#[derive(Debug, Deserialize)]
pub struct StkCallback {
    #[serde(rename = "CheckoutRequestID")]
    pub checkout_request_id: String,
    #[serde(rename = "ResultCode")]
    pub result_code: i32,
    #[serde(rename = "ResultDesc")]
    pub result_desc: Option<String>,
    #[serde(rename = "CallbackMetadata")]
    pub callback_metadata: Option<CallbackMetadata>,
}

#[derive(Debug, Deserialize)]
pub struct CallbackMetadata {
    #[serde(rename = "Item", default)]
    pub items: Vec<MetadataItem>,
}

#[derive(Debug, Deserialize)]
pub struct MetadataItem {
    #[serde(rename = "Name")]
    pub name: String,
    #[serde(rename = "Value")]
    pub value: Option<serde_json::Value>,
}

impl StkCallback {
    /// Receipt reference from the callback metadata, if present
    pub fn receipt_number(&self) -> Option<String> {
        let items = &self.callback_metadata.as_ref()?.items;
        items
            .iter()
            .find(|i| i.name == "MpesaReceiptNumber")
            .and_then(|i| i.value.as_ref())
            .map(|v| match v {
                serde_json::Value::String(s) => s.clone(),
                other => other.to_string(),
            })
    }
}

// ============ Responses ============

/// Callback processing summary
#[derive(Debug, Serialize, Deserialize)]
pub struct CallbackResponse {
    pub status: String,
}

/// Authorization decision
#[derive(Debug, Serialize, Deserialize)]
pub struct AuthorizeResponse {
    pub authorized: bool,
    pub reason: Option<hotspot_core::DenyReason>,
    pub remaining_secs: Option<u64>,
}

/// Sweep summary
#[derive(Debug, Serialize, Deserialize)]
pub struct SweepResponse {
    pub expired_count: usize,
}
