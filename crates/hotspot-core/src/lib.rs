//! OpenHotspot Session Core
//!
//! Captive-portal session lifecycle and access authorization:
//! - Entitlement sources: payment completion, voucher redemption,
//!   reconnection-code redemption
//! - Single decision point for network access (grant/revoke directives
//!   to the RADIUS enforcement endpoint)
//! - Time-based expiry sweeping with lazy expiry on read
//!
//! # Architecture
//! ```text
//! ┌──────────────────────────────────────────────────────────────────┐
//! │                      SESSION CORE                                │
//! ├──────────────────────────────────────────────────────────────────┤
//! │                                                                  │
//! │  Payment ──┐                                                     │
//! │  Voucher ──┼──► Session Store ──► Authorizer ──► RADIUS Gateway  │
//! │  Reconnect─┘        ▲                  │                         │
//! │                     │                  ▼                         │
//! │               Expiry Sweeper     accept / disconnect             │
//! │                                                                  │
//! └──────────────────────────────────────────────────────────────────┘
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

pub mod authorizer;
pub mod catalog;
pub mod config;
pub mod error;
pub mod gateway;
pub mod payment;
pub mod reconnect;
pub mod store;
pub mod sweeper;
pub mod voucher;

pub use authorizer::{AuthorizationResult, Authorizer, DenyReason};
pub use catalog::{AccessPackage, PackageCatalog};
pub use config::PortalConfig;
pub use error::{PortalError, PortalResult};
pub use gateway::{AccessGateway, NullGateway, RadiusGateway};
pub use payment::{CallbackOutcome, PaymentFlow};
pub use reconnect::ReconnectService;
pub use store::SessionStore;
pub use sweeper::ExpirySweeper;
pub use voucher::VoucherService;

// =============================================================================
// Core Types
// =============================================================================

/// One device's access grant
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    pub id: Uuid,
    /// Stable device fingerprint (MAC address)
    pub mac_address: String,
    pub phone_number: String,
    /// Package the session was sold under (None for legacy records)
    pub package_id: Option<String>,
    pub status: SessionStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// Unset until an entitlement source assigns a duration
    pub expires_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum SessionStatus {
    Pending,
    Active,
    Terminated,
    Expired,
}

impl SessionStatus {
    /// Terminal statuses admit no further transitions (reconnection codes
    /// are the one sanctioned exception, see `store::consume_reconnection_code`)
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Terminated | Self::Expired)
    }
}

impl Session {
    /// New pending session awaiting payment confirmation
    pub fn pending(mac_address: &str, phone_number: &str, package_id: Option<String>) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            mac_address: mac_address.to_string(),
            phone_number: phone_number.to_string(),
            package_id,
            status: SessionStatus::Pending,
            created_at: now,
            updated_at: now,
            expires_at: None,
        }
    }

    /// New active session with an assigned expiry (voucher path)
    pub fn active(
        mac_address: &str,
        phone_number: &str,
        package_id: &str,
        expires_at: DateTime<Utc>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            mac_address: mac_address.to_string(),
            phone_number: phone_number.to_string(),
            package_id: Some(package_id.to_string()),
            status: SessionStatus::Active,
            created_at: now,
            updated_at: now,
            expires_at: Some(expires_at),
        }
    }

    /// Seconds until expiry (None if no expiry assigned, 0 if already past)
    pub fn remaining_secs(&self, now: DateTime<Utc>) -> Option<i64> {
        self.expires_at.map(|e| (e - now).num_seconds().max(0))
    }
}

/// One mobile-money transaction tied to a session
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Payment {
    pub id: Uuid,
    pub session_id: Uuid,
    pub phone_number: String,
    /// Amount in KSh
    pub amount: u32,
    /// Checkout reference recorded when the push payment was initiated
    pub checkout_request_id: String,
    pub status: PaymentStatus,
    /// External receipt reference, set on completion
    pub receipt_number: Option<String>,
    /// Single-use 6-digit code issued on completion
    pub reconnection_code: Option<String>,
    pub reconnection_code_used: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum PaymentStatus {
    Pending,
    Completed,
    Failed,
    Expired,
}

impl Payment {
    /// New pending payment for a session
    pub fn pending(
        session_id: Uuid,
        phone_number: &str,
        amount: u32,
        checkout_request_id: &str,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            session_id,
            phone_number: phone_number.to_string(),
            amount,
            checkout_request_id: checkout_request_id.to_string(),
            status: PaymentStatus::Pending,
            receipt_number: None,
            reconnection_code: None,
            reconnection_code_used: false,
            created_at: now,
            updated_at: now,
        }
    }
}

/// A prepaid single-use access code bound to a package tier
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Voucher {
    pub id: Uuid,
    pub code: String,
    pub package_id: String,
    pub status: VoucherStatus,
    /// Session the voucher activated, set on redemption
    pub session_id: Option<Uuid>,
    pub used_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum VoucherStatus {
    Unused,
    Used,
}

/// Who requested a disconnect
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum DisconnectActor {
    Admin,
    User,
    System,
}

// =============================================================================
// Portal Engine
// =============================================================================

/// Facade wiring the store, catalog, authorizer and entitlement sources
pub struct PortalEngine {
    store: Arc<SessionStore>,
    catalog: Arc<PackageCatalog>,
    authorizer: Arc<Authorizer>,
    payments: PaymentFlow,
    vouchers: VoucherService,
    reconnect: ReconnectService,
    sweeper: Arc<ExpirySweeper>,
}

impl PortalEngine {
    pub fn new(config: &PortalConfig, gateway: Arc<dyn AccessGateway>) -> Self {
        let store = Arc::new(SessionStore::new());
        let catalog = Arc::new(PackageCatalog::new());
        let authorizer = Arc::new(Authorizer::new(Arc::clone(&store), gateway));
        let payments = PaymentFlow::new(
            Arc::clone(&store),
            Arc::clone(&catalog),
            Arc::clone(&authorizer),
        );
        let vouchers = VoucherService::new(
            Arc::clone(&store),
            Arc::clone(&catalog),
            Arc::clone(&authorizer),
        );
        let reconnect = ReconnectService::new(Arc::clone(&store), Arc::clone(&authorizer));
        let sweeper = Arc::new(ExpirySweeper::new(
            Arc::clone(&store),
            Arc::clone(&authorizer),
            config.sweep_interval_secs,
        ));
        Self {
            store,
            catalog,
            authorizer,
            payments,
            vouchers,
            reconnect,
            sweeper,
        }
    }

    /// Catalog listing
    pub fn packages(&self) -> Vec<AccessPackage> {
        self.catalog.list()
    }

    /// Record a pending session + payment when a push payment starts
    pub fn begin_purchase(
        &self,
        package_id: &str,
        phone_number: &str,
        mac_address: &str,
        checkout_request_id: &str,
    ) -> PortalResult<(Session, Payment)> {
        self.payments
            .begin_purchase(package_id, phone_number, mac_address, checkout_request_id)
    }

    /// Process a payment-gateway callback
    pub async fn activate_from_payment(
        &self,
        checkout_request_id: &str,
        result_code: i32,
        receipt_number: Option<String>,
    ) -> PortalResult<CallbackOutcome> {
        self.payments
            .handle_callback(checkout_request_id, result_code, receipt_number)
            .await
    }

    /// Redeem an 8-character voucher code for the given device
    pub async fn redeem_voucher(
        &self,
        code: &str,
        mac_address: &str,
    ) -> PortalResult<(Session, AccessPackage)> {
        self.vouchers.redeem(code, mac_address).await
    }

    /// Redeem a 6-digit reconnection code for the given device
    pub async fn redeem_reconnection_code(
        &self,
        code: &str,
        mac_address: &str,
    ) -> PortalResult<Session> {
        self.reconnect.redeem(code, mac_address).await
    }

    /// Decide whether the session should have access right now
    pub async fn authorize(&self, session_id: Uuid, device_id: &str) -> AuthorizationResult {
        self.authorizer.authorize(session_id, device_id).await
    }

    /// Operator/user-initiated disconnect (idempotent)
    pub async fn disconnect(
        &self,
        session_id: Uuid,
        actor: DisconnectActor,
    ) -> PortalResult<Session> {
        self.authorizer.revoke(session_id, actor).await
    }

    /// Revoke every active session past its expiry, returns count revoked
    pub async fn sweep_expired(&self) -> usize {
        self.sweeper.sweep_once().await
    }

    /// Admin-gated voucher batch issuance
    pub fn generate_vouchers(
        &self,
        package_id: &str,
        quantity: usize,
        prefix: Option<&str>,
    ) -> PortalResult<Vec<Voucher>> {
        self.vouchers.generate(package_id, quantity, prefix)
    }

    pub fn session(&self, session_id: Uuid) -> Option<Session> {
        self.store.session(session_id)
    }

    pub fn active_sessions(&self) -> Vec<Session> {
        self.store.active_sessions()
    }

    /// The device's current active session, if any (portal restore)
    pub fn active_session_for_device(&self, mac_address: &str) -> Option<Session> {
        self.store.active_session_for_device(mac_address)
    }

    pub fn payment_by_checkout(&self, checkout_request_id: &str) -> Option<Payment> {
        self.store.payment_by_checkout(checkout_request_id)
    }

    /// Sweeper handle for spawning the background loop
    pub fn sweeper(&self) -> Arc<ExpirySweeper> {
        Arc::clone(&self.sweeper)
    }
}
