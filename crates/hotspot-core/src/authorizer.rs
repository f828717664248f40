//! Session Authorizer
//!
//! Single decision point for "should this device have network access right
//! now", and the only component that emits accept/disconnect directives to
//! the gateway. Authorization is a local decision: gateway delivery is
//! best-effort and never alters the outcome.

use crate::error::{PortalError, PortalResult};
use crate::gateway::AccessGateway;
use crate::store::{SessionStore, Transition};
use crate::{DisconnectActor, PaymentStatus, Session, SessionStatus};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Why access was denied
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DenyReason {
    NoSuchSession,
    NotCompleted,
    Expired,
    AlreadyTerminated,
}

/// Outcome of an authorization decision
#[derive(Debug, Clone)]
pub enum AuthorizationResult {
    Granted {
        session: Session,
        remaining_secs: u64,
    },
    Denied {
        reason: DenyReason,
    },
}

impl AuthorizationResult {
    pub fn is_granted(&self) -> bool {
        matches!(self, Self::Granted { .. })
    }
}

/// Session authorizer
pub struct Authorizer {
    store: Arc<SessionStore>,
    gateway: Arc<dyn AccessGateway>,
}

impl Authorizer {
    pub fn new(store: Arc<SessionStore>, gateway: Arc<dyn AccessGateway>) -> Self {
        Self { store, gateway }
    }

    /// Decide whether the session should currently have access. On grant,
    /// forwards an accept with the remaining time budget. A session
    /// observed past its expiry is lazily expired here; the disconnect is
    /// emitted only if this call performed the transition.
    pub async fn authorize(&self, session_id: Uuid, device_id: &str) -> AuthorizationResult {
        let Some(session) = self.store.session(session_id) else {
            debug!("authorize denied, no session {}", session_id);
            return AuthorizationResult::Denied {
                reason: DenyReason::NoSuchSession,
            };
        };
        if session.mac_address != device_id {
            warn!(
                "authorize for session {} from {}, bound to {}",
                session_id, device_id, session.mac_address
            );
        }

        match session.status {
            SessionStatus::Terminated => AuthorizationResult::Denied {
                reason: DenyReason::AlreadyTerminated,
            },
            SessionStatus::Expired => AuthorizationResult::Denied {
                reason: DenyReason::Expired,
            },
            SessionStatus::Pending => AuthorizationResult::Denied {
                reason: DenyReason::NotCompleted,
            },
            SessionStatus::Active => self.authorize_active(session).await,
        }
    }

    async fn authorize_active(&self, session: Session) -> AuthorizationResult {
        // Payment-created sessions grant only once the payment completed;
        // voucher sessions carry no payment record.
        if let Some(payment) = self.store.payment_for_session(session.id) {
            if payment.status != PaymentStatus::Completed {
                return AuthorizationResult::Denied {
                    reason: DenyReason::NotCompleted,
                };
            }
        }
        let Some(expires_at) = session.expires_at else {
            warn!("active session {} has no expiry, denying", session.id);
            return AuthorizationResult::Denied {
                reason: DenyReason::NotCompleted,
            };
        };

        let now = Utc::now();
        if expires_at <= now {
            // Lazy expiry. Whichever writer observes `active` first wins;
            // only the winner emits the disconnect.
            if let Transition::Applied(expired) = self.store.transition_session(
                session.id,
                &[SessionStatus::Active],
                SessionStatus::Expired,
            ) {
                info!("session {} lazily expired", expired.id);
                if let Err(e) = self.gateway.send_disconnect(&expired.mac_address).await {
                    warn!("disconnect directive for {} not delivered: {}", expired.id, e);
                }
            }
            return AuthorizationResult::Denied {
                reason: DenyReason::Expired,
            };
        }

        let remaining_secs = u64::try_from((expires_at - now).num_seconds()).unwrap_or(0);
        if let Err(e) = self
            .gateway
            .send_accept(&session.mac_address, session.id, remaining_secs)
            .await
        {
            warn!("accept directive for {} not delivered: {}", session.id, e);
        }
        AuthorizationResult::Granted {
            session,
            remaining_secs,
        }
    }

    /// Admin/user-initiated revocation. Idempotent: revoking a session
    /// already in a terminal status is a no-op success.
    pub async fn revoke(
        &self,
        session_id: Uuid,
        actor: DisconnectActor,
    ) -> PortalResult<Session> {
        match self.store.transition_session(
            session_id,
            &[SessionStatus::Pending, SessionStatus::Active],
            SessionStatus::Terminated,
        ) {
            Transition::Applied(session) => {
                info!("session {} terminated by {:?}", session_id, actor);
                if let Err(e) = self.gateway.send_disconnect(&session.mac_address).await {
                    warn!("disconnect directive for {} not delivered: {}", session_id, e);
                }
                Ok(session)
            }
            Transition::Noop(_) => self
                .store
                .session(session_id)
                .ok_or(PortalError::SessionNotFound(session_id)),
            Transition::Missing => Err(PortalError::SessionNotFound(session_id)),
        }
    }

    /// Sweeper variant of revocation: records the time-based terminal
    /// status (`expired`, not `terminated`). Returns true only if this
    /// call performed the transition.
    pub async fn expire(&self, session_id: Uuid) -> bool {
        match self.store.transition_session(
            session_id,
            &[SessionStatus::Active],
            SessionStatus::Expired,
        ) {
            Transition::Applied(session) => {
                info!("session {} expired by sweep", session_id);
                if let Err(e) = self.gateway.send_disconnect(&session.mac_address).await {
                    warn!("disconnect directive for {} not delivered: {}", session_id, e);
                }
                true
            }
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateway::testing::{FailingGateway, RecordingGateway};
    use crate::Payment;
    use chrono::Duration;

    const MAC: &str = "AA:BB:CC:DD:EE:FF";

    fn setup() -> (Arc<SessionStore>, Arc<RecordingGateway>, Authorizer) {
        let store = Arc::new(SessionStore::new());
        let gateway = Arc::new(RecordingGateway::default());
        let authorizer = Authorizer::new(
            Arc::clone(&store),
            Arc::clone(&gateway) as Arc<dyn AccessGateway>,
        );
        (store, gateway, authorizer)
    }

    #[tokio::test]
    async fn test_grant_with_remaining_budget() {
        let (store, gateway, authorizer) = setup();
        let session = Session::active(MAC, "254700000001", "quick-browse", Utc::now() + Duration::hours(1));
        let id = session.id;
        store.insert_session(session);

        match authorizer.authorize(id, MAC).await {
            AuthorizationResult::Granted { remaining_secs, .. } => {
                assert!((3590..=3600).contains(&remaining_secs));
            }
            other => panic!("expected grant, got {other:?}"),
        }
        assert_eq!(gateway.accepts(), 1);
    }

    #[tokio::test]
    async fn test_deny_unknown_session() {
        let (_store, gateway, authorizer) = setup();

        match authorizer.authorize(Uuid::new_v4(), MAC).await {
            AuthorizationResult::Denied { reason } => {
                assert_eq!(reason, DenyReason::NoSuchSession);
            }
            other => panic!("expected deny, got {other:?}"),
        }
        assert_eq!(gateway.accepts(), 0);
    }

    #[tokio::test]
    async fn test_deny_when_payment_not_completed() {
        let (store, gateway, authorizer) = setup();
        let session = Session::active(MAC, "254700000001", "quick-browse", Utc::now() + Duration::hours(1));
        let id = session.id;
        store.insert_session(session);
        store
            .insert_payment(Payment::pending(id, "254700000001", 10, "ws_1"))
            .unwrap();

        match authorizer.authorize(id, MAC).await {
            AuthorizationResult::Denied { reason } => {
                assert_eq!(reason, DenyReason::NotCompleted);
            }
            other => panic!("expected deny, got {other:?}"),
        }
        assert_eq!(gateway.accepts(), 0);
    }

    #[tokio::test]
    async fn test_lazy_expiry_flips_status_once() {
        let (store, gateway, authorizer) = setup();
        let session = Session::active(MAC, "254700000001", "quick-browse", Utc::now() - Duration::seconds(1));
        let id = session.id;
        store.insert_session(session);

        let first = authorizer.authorize(id, MAC).await;
        assert!(matches!(
            first,
            AuthorizationResult::Denied { reason: DenyReason::Expired }
        ));
        assert_eq!(store.session(id).unwrap().status, SessionStatus::Expired);
        assert_eq!(gateway.disconnects(), 1);

        // Second call sees the terminal status; no second disconnect.
        let second = authorizer.authorize(id, MAC).await;
        assert!(matches!(
            second,
            AuthorizationResult::Denied { reason: DenyReason::Expired }
        ));
        assert_eq!(gateway.disconnects(), 1);
    }

    #[tokio::test]
    async fn test_gateway_failure_does_not_change_outcome() {
        let store = Arc::new(SessionStore::new());
        let authorizer = Authorizer::new(Arc::clone(&store), Arc::new(FailingGateway));
        let session = Session::active(MAC, "254700000001", "quick-browse", Utc::now() + Duration::hours(1));
        let id = session.id;
        store.insert_session(session);

        assert!(authorizer.authorize(id, MAC).await.is_granted());
        assert_eq!(store.session(id).unwrap().status, SessionStatus::Active);

        // Revocation still lands locally when the gateway is down.
        authorizer.revoke(id, DisconnectActor::Admin).await.unwrap();
        assert_eq!(store.session(id).unwrap().status, SessionStatus::Terminated);
    }

    #[tokio::test]
    async fn test_revoke_idempotent() {
        let (store, gateway, authorizer) = setup();
        let session = Session::active(MAC, "254700000001", "quick-browse", Utc::now() + Duration::hours(1));
        let id = session.id;
        store.insert_session(session);

        let first = authorizer.revoke(id, DisconnectActor::Admin).await.unwrap();
        assert_eq!(first.status, SessionStatus::Terminated);

        let second = authorizer.revoke(id, DisconnectActor::Admin).await.unwrap();
        assert_eq!(second.status, SessionStatus::Terminated);
        assert_eq!(gateway.disconnects(), 1);
    }

    #[tokio::test]
    async fn test_revoke_unknown_session() {
        let (_store, _gateway, authorizer) = setup();

        let err = authorizer
            .revoke(Uuid::new_v4(), DisconnectActor::User)
            .await
            .unwrap_err();
        assert!(matches!(err, PortalError::SessionNotFound(_)));
    }
}
