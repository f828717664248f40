//! Expiry Sweeper
//!
//! Periodic revocation of sessions past their expiry. Safe to race with
//! the Authorizer's lazy expiry on the same session: both go through the
//! store's guarded transition, so the loser no-ops and only one
//! disconnect directive is ever emitted.

use crate::authorizer::Authorizer;
use crate::store::SessionStore;
use chrono::Utc;
use std::sync::Arc;
use tracing::info;

/// Expiry sweeper
pub struct ExpirySweeper {
    store: Arc<SessionStore>,
    authorizer: Arc<Authorizer>,
    interval_secs: u64,
}

impl ExpirySweeper {
    pub fn new(store: Arc<SessionStore>, authorizer: Arc<Authorizer>, interval_secs: u64) -> Self {
        Self {
            store,
            authorizer,
            interval_secs,
        }
    }

    /// Run the sweep loop forever
    pub async fn run(&self) {
        let interval = std::time::Duration::from_secs(self.interval_secs);
        loop {
            tokio::time::sleep(interval).await;
            let revoked = self.sweep_once().await;
            if revoked > 0 {
                info!("expiry sweep revoked {} sessions", revoked);
            }
        }
    }

    /// One sweep pass: expire every active session past its expiry.
    /// A failure on one session never aborts the rest of the batch, and
    /// sessions already expired by another writer are not counted twice.
    pub async fn sweep_once(&self) -> usize {
        let now = Utc::now();
        let mut revoked = 0;
        for session in self.store.expired_active(now) {
            if self.authorizer.expire(session.id).await {
                revoked += 1;
            }
        }
        revoked
    }
}
