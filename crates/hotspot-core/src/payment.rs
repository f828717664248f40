//! Payment Completion
//!
//! Entitlement source reacting to the mobile-money gateway's asynchronous
//! callback. The core never initiates the external transaction; it records
//! the pending session + payment when the push begins and settles them
//! when the callback lands. A completed payment receives a single-use
//! 6-digit reconnection code.

use crate::authorizer::Authorizer;
use crate::catalog::PackageCatalog;
use crate::error::{PortalError, PortalResult};
use crate::store::{Completion, SessionStore};
use crate::{Payment, Session};
use chrono::Utc;
use rand::Rng;
use std::sync::Arc;
use tracing::{info, warn};

/// Outcome of a payment callback
#[derive(Debug, Clone)]
pub enum CallbackOutcome {
    /// Payment completed, session activated, authorization issued
    Activated { payment: Payment, session: Session },
    /// Payment marked failed; the session stays pending
    Failed(Payment),
    /// Callback replayed for a payment already settled
    AlreadyProcessed,
}

/// Payment-completion entitlement source
pub struct PaymentFlow {
    store: Arc<SessionStore>,
    catalog: Arc<PackageCatalog>,
    authorizer: Arc<Authorizer>,
}

impl PaymentFlow {
    pub fn new(
        store: Arc<SessionStore>,
        catalog: Arc<PackageCatalog>,
        authorizer: Arc<Authorizer>,
    ) -> Self {
        Self {
            store,
            catalog,
            authorizer,
        }
    }

    /// Record the pending session + payment when a push payment is
    /// initiated. The checkout reference must not have been seen before;
    /// the later callback is matched against it.
    pub fn begin_purchase(
        &self,
        package_id: &str,
        phone_number: &str,
        mac_address: &str,
        checkout_request_id: &str,
    ) -> PortalResult<(Session, Payment)> {
        let package = self
            .catalog
            .get(package_id)
            .ok_or_else(|| PortalError::PackageNotFound(package_id.to_string()))?;

        let session = Session::pending(mac_address, phone_number, Some(package.id.clone()));
        let payment = Payment::pending(session.id, phone_number, package.price, checkout_request_id);
        self.store.insert_payment(payment.clone())?;
        self.store.insert_session(session.clone());

        info!(
            "purchase started: session {} payment {} ({} KSh, {})",
            session.id, payment.id, payment.amount, checkout_request_id
        );
        Ok((session, payment))
    }

    /// Settle a payment from the gateway callback. Result code 0 completes
    /// the payment, activates its session and authorizes it; any other
    /// code fails the payment and leaves the session pending. Replays of a
    /// settled payment are no-ops.
    pub async fn handle_callback(
        &self,
        checkout_request_id: &str,
        result_code: i32,
        receipt_number: Option<String>,
    ) -> PortalResult<CallbackOutcome> {
        if result_code != 0 {
            return match self.store.fail_payment(checkout_request_id)? {
                Some(payment) => {
                    info!(
                        "payment {} failed (result code {})",
                        payment.id, result_code
                    );
                    Ok(CallbackOutcome::Failed(payment))
                }
                None => Ok(CallbackOutcome::AlreadyProcessed),
            };
        }

        // Resolve the package duration before committing; the clock starts
        // at completion, not at purchase.
        let payment = self
            .store
            .payment_by_checkout(checkout_request_id)
            .ok_or_else(|| PortalError::PaymentNotFound(checkout_request_id.to_string()))?;
        let session = self
            .store
            .session(payment.session_id)
            .ok_or(PortalError::SessionNotFound(payment.session_id))?;
        let package_id = session
            .package_id
            .clone()
            .ok_or_else(|| PortalError::InvalidRequest("session has no package".into()))?;
        let package = self
            .catalog
            .get(&package_id)
            .ok_or(PortalError::PackageNotFound(package_id))?;
        let expires_at = Utc::now() + package.duration();

        loop {
            let code = generate_reconnection_code();
            match self.store.complete_payment(
                checkout_request_id,
                receipt_number.clone(),
                &code,
                expires_at,
            ) {
                Completion::Completed { payment, session } => {
                    info!(
                        "payment {} completed, receipt {:?}, session {} active",
                        payment.id, payment.receipt_number, session.id
                    );
                    let result = self
                        .authorizer
                        .authorize(session.id, &session.mac_address)
                        .await;
                    if !result.is_granted() {
                        warn!("session {} not authorized after completion", session.id);
                    }
                    return Ok(CallbackOutcome::Activated { payment, session });
                }
                Completion::AlreadyCompleted(payment) => {
                    info!("callback replay for settled payment {}", payment.id);
                    return Ok(CallbackOutcome::AlreadyProcessed);
                }
                Completion::Terminal(status) => {
                    warn!(
                        "success callback for {} already in status {:?}",
                        checkout_request_id, status
                    );
                    return Ok(CallbackOutcome::AlreadyProcessed);
                }
                Completion::CodeInUse => continue,
                Completion::Missing => {
                    return Err(PortalError::PaymentNotFound(
                        checkout_request_id.to_string(),
                    ))
                }
            }
        }
    }
}

/// Fresh 6-digit reconnection code candidate
fn generate_reconnection_code() -> String {
    format!("{:06}", rand::thread_rng().gen_range(0..1_000_000))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateway::testing::RecordingGateway;
    use crate::gateway::AccessGateway;
    use crate::{PaymentStatus, SessionStatus};

    const MAC: &str = "AA:BB:CC:DD:EE:FF";
    const PHONE: &str = "254700000001";

    fn setup() -> (Arc<SessionStore>, Arc<RecordingGateway>, PaymentFlow) {
        let store = Arc::new(SessionStore::new());
        let catalog = Arc::new(PackageCatalog::new());
        let gateway = Arc::new(RecordingGateway::default());
        let authorizer = Arc::new(Authorizer::new(
            Arc::clone(&store),
            Arc::clone(&gateway) as Arc<dyn AccessGateway>,
        ));
        let flow = PaymentFlow::new(Arc::clone(&store), catalog, authorizer);
        (store, gateway, flow)
    }

    #[tokio::test]
    async fn test_successful_callback_activates_session() {
        let (store, gateway, flow) = setup();
        let (session, payment) = flow
            .begin_purchase("quick-browse", PHONE, MAC, "ws_1")
            .unwrap();
        assert_eq!(session.status, SessionStatus::Pending);
        assert_eq!(payment.status, PaymentStatus::Pending);

        let outcome = flow
            .handle_callback("ws_1", 0, Some("QGR7XYZ1".into()))
            .await
            .unwrap();

        let CallbackOutcome::Activated { payment, session } = outcome else {
            panic!("expected activation");
        };
        assert_eq!(payment.status, PaymentStatus::Completed);
        assert_eq!(payment.receipt_number.as_deref(), Some("QGR7XYZ1"));
        let code = payment.reconnection_code.expect("code issued on completion");
        assert_eq!(code.len(), 6);
        assert!(code.chars().all(|c| c.is_ascii_digit()));

        let session = store.session(session.id).unwrap();
        assert_eq!(session.status, SessionStatus::Active);
        let remaining = session.remaining_secs(Utc::now()).unwrap();
        assert!((3590..=3600).contains(&remaining));
        assert_eq!(gateway.accepts(), 1);
    }

    #[tokio::test]
    async fn test_callback_replay_does_not_reissue_code() {
        let (_store, gateway, flow) = setup();
        flow.begin_purchase("quick-browse", PHONE, MAC, "ws_1")
            .unwrap();

        let first = flow
            .handle_callback("ws_1", 0, Some("QGR7XYZ1".into()))
            .await
            .unwrap();
        let CallbackOutcome::Activated { payment, .. } = first else {
            panic!("expected activation");
        };
        let issued = payment.reconnection_code.clone();

        let replay = flow
            .handle_callback("ws_1", 0, Some("QGR7XYZ1".into()))
            .await
            .unwrap();
        assert!(matches!(replay, CallbackOutcome::AlreadyProcessed));

        let payment = flow.store.payment_by_checkout("ws_1").unwrap();
        assert_eq!(payment.reconnection_code, issued);
        assert_eq!(gateway.accepts(), 1);
    }

    #[tokio::test]
    async fn test_failed_callback_leaves_session_pending() {
        let (store, gateway, flow) = setup();
        let (session, _) = flow
            .begin_purchase("quick-browse", PHONE, MAC, "ws_1")
            .unwrap();

        let outcome = flow.handle_callback("ws_1", 1032, None).await.unwrap();
        let CallbackOutcome::Failed(payment) = outcome else {
            panic!("expected failure");
        };
        assert_eq!(payment.status, PaymentStatus::Failed);
        assert!(payment.reconnection_code.is_none());
        assert_eq!(store.session(session.id).unwrap().status, SessionStatus::Pending);
        assert_eq!(gateway.accepts(), 0);
    }

    #[tokio::test]
    async fn test_unknown_checkout_reference_rejected() {
        let (_store, _gateway, flow) = setup();

        let err = flow.handle_callback("ws_unknown", 0, None).await.unwrap_err();
        assert!(matches!(err, PortalError::PaymentNotFound(_)));
    }

    #[test]
    fn test_duplicate_checkout_reference_rejected() {
        let (_store, _gateway, flow) = setup();
        flow.begin_purchase("quick-browse", PHONE, MAC, "ws_1")
            .unwrap();

        let err = flow
            .begin_purchase("quick-browse", PHONE, MAC, "ws_1")
            .unwrap_err();
        assert!(matches!(err, PortalError::InvalidRequest(_)));
    }
}
