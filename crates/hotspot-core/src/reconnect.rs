//! Reconnection-Code Redemption
//!
//! Entitlement source letting a paying user restore access without a new
//! payment. The code is bound to the session's device; redeeming it from
//! another device is rejected without consuming the code.

use crate::authorizer::Authorizer;
use crate::error::{PortalError, PortalResult};
use crate::store::SessionStore;
use crate::Session;
use std::sync::Arc;
use tracing::{info, warn};

/// Reconnection code length (digits)
pub const RECONNECT_CODE_LEN: usize = 6;

/// Reconnection-code entitlement source
pub struct ReconnectService {
    store: Arc<SessionStore>,
    authorizer: Arc<Authorizer>,
}

impl ReconnectService {
    pub fn new(store: Arc<SessionStore>, authorizer: Arc<Authorizer>) -> Self {
        Self { store, authorizer }
    }

    /// Redeem a 6-digit reconnection code for the given device. The code
    /// flips to used and the bound session re-activates as one atomic
    /// unit, then the session is re-authorized (safe if already active).
    pub async fn redeem(&self, code: &str, mac_address: &str) -> PortalResult<Session> {
        let trimmed = code.trim();
        if trimmed.len() != RECONNECT_CODE_LEN || !trimmed.chars().all(|c| c.is_ascii_digit()) {
            return Err(PortalError::InvalidOrUsedCode);
        }

        let (payment, session) = self.store.consume_reconnection_code(trimmed, mac_address)?;

        let result = self
            .authorizer
            .authorize(session.id, mac_address)
            .await;
        if !result.is_granted() {
            // Past-expiry reconnects land here: the code is spent but the
            // session immediately re-expires.
            warn!("session {} not authorized after reconnection", session.id);
        }
        info!(
            "reconnection code redeemed for session {} (payment {})",
            session.id, payment.id
        );
        Ok(session)
    }
}
