//! Session Store
//!
//! Device-to-access bindings plus the payment and voucher registries.
//! Every cross-record invariant (single-use codes, one active session per
//! device, guarded status transitions) is enforced inside a single
//! writer-lock acquisition, so concurrent request workers observe each
//! conditional update as one atomic commit.

use crate::error::{PortalError, PortalResult};
use crate::{Payment, PaymentStatus, Session, SessionStatus, Voucher, VoucherStatus};
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use std::collections::HashMap;
use tracing::debug;
use uuid::Uuid;

/// Result of a guarded status transition
#[derive(Debug, Clone)]
pub enum Transition {
    /// This caller performed the transition
    Applied(Session),
    /// Session exists but was not in an expected status
    Noop(SessionStatus),
    /// Session does not exist
    Missing,
}

/// Result of completing a payment from a gateway callback
#[derive(Debug, Clone)]
pub enum Completion {
    /// Payment completed and its session activated by this call
    Completed { payment: Payment, session: Session },
    /// Payment was already completed (callback replay)
    AlreadyCompleted(Payment),
    /// Proposed reconnection code collides with an issued one
    CodeInUse,
    /// Payment already in another terminal status
    Terminal(PaymentStatus),
    /// No payment recorded for the checkout reference
    Missing,
}

#[derive(Default)]
struct Tables {
    sessions: HashMap<Uuid, Session>,
    payments: HashMap<Uuid, Payment>,
    vouchers: HashMap<Uuid, Voucher>,
    payments_by_checkout: HashMap<String, Uuid>,
}

impl Tables {
    /// Terminate any other active session bound to the device, so a device
    /// is never bound to two accept directives at once
    fn supersede_active(&mut self, mac_address: &str, keep: Option<Uuid>, now: DateTime<Utc>) {
        for session in self.sessions.values_mut() {
            if session.mac_address == mac_address
                && session.status == SessionStatus::Active
                && Some(session.id) != keep
            {
                session.status = SessionStatus::Terminated;
                session.updated_at = now;
                debug!("superseded active session {} for {}", session.id, mac_address);
            }
        }
    }
}

/// Session store
pub struct SessionStore {
    tables: RwLock<Tables>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self {
            tables: RwLock::new(Tables::default()),
        }
    }

    // ------------------------------------------------------------------
    // Sessions
    // ------------------------------------------------------------------

    pub fn insert_session(&self, session: Session) {
        self.tables.write().sessions.insert(session.id, session);
    }

    pub fn session(&self, session_id: Uuid) -> Option<Session> {
        self.tables.read().sessions.get(&session_id).cloned()
    }

    /// Compare-and-swap on session status. The transition is applied only
    /// if the current status is one of `expected`; exactly one of two
    /// racing writers observes `Applied`.
    pub fn transition_session(
        &self,
        session_id: Uuid,
        expected: &[SessionStatus],
        to: SessionStatus,
    ) -> Transition {
        let mut tables = self.tables.write();
        let Some(session) = tables.sessions.get_mut(&session_id) else {
            return Transition::Missing;
        };
        if !expected.contains(&session.status) {
            return Transition::Noop(session.status);
        }
        session.status = to;
        session.updated_at = Utc::now();
        Transition::Applied(session.clone())
    }

    pub fn active_session_for_device(&self, mac_address: &str) -> Option<Session> {
        self.tables
            .read()
            .sessions
            .values()
            .find(|s| s.mac_address == mac_address && s.status == SessionStatus::Active)
            .cloned()
    }

    pub fn active_sessions(&self) -> Vec<Session> {
        self.tables
            .read()
            .sessions
            .values()
            .filter(|s| s.status == SessionStatus::Active)
            .cloned()
            .collect()
    }

    /// Active sessions whose expiry has passed (sweeper input)
    pub fn expired_active(&self, now: DateTime<Utc>) -> Vec<Session> {
        self.tables
            .read()
            .sessions
            .values()
            .filter(|s| {
                s.status == SessionStatus::Active
                    && s.expires_at.is_some_and(|e| e <= now)
            })
            .cloned()
            .collect()
    }

    // ------------------------------------------------------------------
    // Payments
    // ------------------------------------------------------------------

    /// Record a pending payment. The checkout reference must be new.
    pub fn insert_payment(&self, payment: Payment) -> PortalResult<()> {
        let mut tables = self.tables.write();
        if tables
            .payments_by_checkout
            .contains_key(&payment.checkout_request_id)
        {
            return Err(PortalError::InvalidRequest(format!(
                "checkout reference already recorded: {}",
                payment.checkout_request_id
            )));
        }
        tables
            .payments_by_checkout
            .insert(payment.checkout_request_id.clone(), payment.id);
        tables.payments.insert(payment.id, payment);
        Ok(())
    }

    pub fn payment_by_checkout(&self, checkout_request_id: &str) -> Option<Payment> {
        let tables = self.tables.read();
        let id = tables.payments_by_checkout.get(checkout_request_id)?;
        tables.payments.get(id).cloned()
    }

    pub fn payment_for_session(&self, session_id: Uuid) -> Option<Payment> {
        self.tables
            .read()
            .payments
            .values()
            .find(|p| p.session_id == session_id)
            .cloned()
    }

    /// Complete a pending payment and activate its session in one commit:
    /// receipt + reconnection code are recorded, any other active session
    /// for the device is superseded, and the session becomes active with
    /// the given expiry. A replayed callback sees `AlreadyCompleted`.
    pub fn complete_payment(
        &self,
        checkout_request_id: &str,
        receipt_number: Option<String>,
        reconnection_code: &str,
        expires_at: DateTime<Utc>,
    ) -> Completion {
        let now = Utc::now();
        let mut tables = self.tables.write();

        let Some(&payment_id) = tables.payments_by_checkout.get(checkout_request_id) else {
            return Completion::Missing;
        };
        let Some(payment) = tables.payments.get(&payment_id) else {
            return Completion::Missing;
        };
        match payment.status {
            PaymentStatus::Completed => return Completion::AlreadyCompleted(payment.clone()),
            PaymentStatus::Failed | PaymentStatus::Expired => {
                return Completion::Terminal(payment.status)
            }
            PaymentStatus::Pending => {}
        }
        let session_id = payment.session_id;
        let Some(mac_address) = tables.sessions.get(&session_id).map(|s| s.mac_address.clone())
        else {
            return Completion::Missing;
        };

        // Reconnection codes are unique across all payments; the caller
        // regenerates on collision.
        let collision = tables
            .payments
            .values()
            .any(|p| p.id != payment_id && p.reconnection_code.as_deref() == Some(reconnection_code));
        if collision {
            return Completion::CodeInUse;
        }

        let Some(payment) = tables.payments.get_mut(&payment_id) else {
            return Completion::Missing;
        };
        payment.status = PaymentStatus::Completed;
        payment.receipt_number = receipt_number;
        payment.reconnection_code = Some(reconnection_code.to_string());
        payment.updated_at = now;
        let payment = payment.clone();

        tables.supersede_active(&mac_address, Some(session_id), now);

        let Some(session) = tables.sessions.get_mut(&session_id) else {
            return Completion::Missing;
        };
        if !session.status.is_terminal() {
            session.status = SessionStatus::Active;
            session.expires_at = Some(expires_at);
            session.updated_at = now;
        }
        let session = session.clone();

        Completion::Completed { payment, session }
    }

    /// Mark a pending payment failed. The session is left pending.
    /// Returns None if the payment was already in a terminal status.
    pub fn fail_payment(&self, checkout_request_id: &str) -> PortalResult<Option<Payment>> {
        let mut tables = self.tables.write();
        let Some(&payment_id) = tables.payments_by_checkout.get(checkout_request_id) else {
            return Err(PortalError::PaymentNotFound(checkout_request_id.to_string()));
        };
        let Some(payment) = tables.payments.get_mut(&payment_id) else {
            return Err(PortalError::PaymentNotFound(checkout_request_id.to_string()));
        };
        if payment.status != PaymentStatus::Pending {
            return Ok(None);
        }
        payment.status = PaymentStatus::Failed;
        payment.updated_at = Utc::now();
        Ok(Some(payment.clone()))
    }

    /// Consume a reconnection code for the requesting device in one commit.
    /// The code is left untouched on a device mismatch.
    pub fn consume_reconnection_code(
        &self,
        code: &str,
        mac_address: &str,
    ) -> PortalResult<(Payment, Session)> {
        let now = Utc::now();
        let mut tables = self.tables.write();

        let Some(payment_id) = tables
            .payments
            .values()
            .find(|p| {
                p.status == PaymentStatus::Completed
                    && !p.reconnection_code_used
                    && p.reconnection_code.as_deref() == Some(code)
            })
            .map(|p| p.id)
        else {
            return Err(PortalError::InvalidOrUsedCode);
        };

        let Some(session_id) = tables.payments.get(&payment_id).map(|p| p.session_id) else {
            return Err(PortalError::InvalidOrUsedCode);
        };
        let Some(session) = tables.sessions.get(&session_id) else {
            return Err(PortalError::SessionNotFound(session_id));
        };
        if session.mac_address != mac_address {
            return Err(PortalError::DeviceMismatch);
        }

        let Some(payment) = tables.payments.get_mut(&payment_id) else {
            return Err(PortalError::InvalidOrUsedCode);
        };
        payment.reconnection_code_used = true;
        payment.updated_at = now;
        let payment = payment.clone();

        tables.supersede_active(mac_address, Some(session_id), now);

        // The one sanctioned revival of a terminal session: a paid-for
        // session may reconnect within its window. The expiry clock is
        // never extended, so a stale session re-expires on authorize.
        let Some(session) = tables.sessions.get_mut(&session_id) else {
            return Err(PortalError::SessionNotFound(session_id));
        };
        session.status = SessionStatus::Active;
        session.updated_at = now;
        let session = session.clone();

        Ok((payment, session))
    }

    // ------------------------------------------------------------------
    // Vouchers
    // ------------------------------------------------------------------

    /// Insert a voucher unless its code is already taken
    pub fn insert_voucher_unique(&self, voucher: Voucher) -> bool {
        let mut tables = self.tables.write();
        if tables.vouchers.values().any(|v| v.code == voucher.code) {
            return false;
        }
        tables.vouchers.insert(voucher.id, voucher);
        true
    }

    /// Unused voucher matching the (normalized) code, if any
    pub fn unused_voucher_by_code(&self, code: &str) -> Option<Voucher> {
        self.tables
            .read()
            .vouchers
            .values()
            .find(|v| v.status == VoucherStatus::Unused && v.code == code)
            .cloned()
    }

    /// Redeem a voucher in one commit: re-check it is still unused (the
    /// precondition for the conditional update), supersede any other
    /// active session for the device, insert the new active session, and
    /// mark the voucher used. Exactly one of N racing redeemers succeeds.
    pub fn redeem_voucher(&self, voucher_id: Uuid, session: Session) -> PortalResult<Voucher> {
        let now = Utc::now();
        let mut tables = self.tables.write();

        match tables.vouchers.get(&voucher_id) {
            Some(v) if v.status == VoucherStatus::Unused => {}
            _ => return Err(PortalError::InvalidOrUsedCode),
        }

        tables.supersede_active(&session.mac_address, Some(session.id), now);
        let session_id = session.id;
        tables.sessions.insert(session_id, session);

        let Some(voucher) = tables.vouchers.get_mut(&voucher_id) else {
            return Err(PortalError::InvalidOrUsedCode);
        };
        voucher.status = VoucherStatus::Used;
        voucher.used_at = Some(now);
        voucher.session_id = Some(session_id);
        Ok(voucher.clone())
    }
}

impl Default for SessionStore {
    fn default() -> Self {
        Self::new()
    }
}
