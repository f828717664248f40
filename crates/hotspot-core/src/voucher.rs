//! Voucher Issuance and Redemption
//!
//! Prepaid single-use codes bound to a package tier, independent of any
//! payment. Issuance is admin-gated at the API boundary; redemption is an
//! entitlement source.

use crate::authorizer::Authorizer;
use crate::catalog::{AccessPackage, PackageCatalog};
use crate::error::{PortalError, PortalResult};
use crate::store::SessionStore;
use crate::{Session, Voucher, VoucherStatus};
use chrono::Utc;
use rand::Rng;
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

/// Unambiguous code charset (0/O/1/I removed)
pub const CODE_CHARSET: &[u8] = b"ABCDEFGHJKLMNPQRSTUVWXYZ23456789";
/// Fixed voucher code length
pub const CODE_LEN: usize = 8;
/// Issuance cap per batch
pub const MAX_BATCH: usize = 100;

const MAX_CODE_ATTEMPTS: usize = 100;

/// Voucher entitlement source + issuance
pub struct VoucherService {
    store: Arc<SessionStore>,
    catalog: Arc<PackageCatalog>,
    authorizer: Arc<Authorizer>,
}

impl VoucherService {
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

    /// Issue a batch of vouchers for a package. Codes are generated
    /// independently at random and re-drawn on collision, so one duplicate
    /// never fails the batch. No session state is touched.
    pub fn generate(
        &self,
        package_id: &str,
        quantity: usize,
        prefix: Option<&str>,
    ) -> PortalResult<Vec<Voucher>> {
        if quantity == 0 {
            return Err(PortalError::InvalidRequest("quantity must be positive".into()));
        }
        if quantity > MAX_BATCH {
            return Err(PortalError::BatchTooLarge {
                requested: quantity,
                max: MAX_BATCH,
            });
        }
        let package = self
            .catalog
            .get(package_id)
            .ok_or_else(|| PortalError::PackageNotFound(package_id.to_string()))?;

        let prefix = prefix.unwrap_or_default().trim().to_uppercase();
        if prefix.len() >= CODE_LEN {
            return Err(PortalError::InvalidRequest(format!(
                "prefix must be shorter than {CODE_LEN} characters"
            )));
        }
        if !prefix.bytes().all(|b| CODE_CHARSET.contains(&b)) {
            return Err(PortalError::InvalidRequest(
                "prefix contains characters outside the code charset".into(),
            ));
        }

        let mut vouchers = Vec::with_capacity(quantity);
        for _ in 0..quantity {
            vouchers.push(self.allocate(&package.id, &prefix)?);
        }
        info!("generated {} vouchers for {}", vouchers.len(), package.id);
        Ok(vouchers)
    }

    fn allocate(&self, package_id: &str, prefix: &str) -> PortalResult<Voucher> {
        for _ in 0..MAX_CODE_ATTEMPTS {
            let voucher = Voucher {
                id: Uuid::new_v4(),
                code: generate_code(prefix),
                package_id: package_id.to_string(),
                status: VoucherStatus::Unused,
                session_id: None,
                used_at: None,
                created_at: Utc::now(),
            };
            let code = voucher.code.clone();
            if self.store.insert_voucher_unique(voucher.clone()) {
                return Ok(voucher);
            }
            warn!("voucher code collision on {}, regenerating", code);
        }
        Err(PortalError::InvalidRequest(
            "could not allocate a unique voucher code".into(),
        ))
    }

    /// Redeem a voucher code for the given device. Creating the active
    /// session and consuming the voucher commit as one atomic unit; of N
    /// concurrent redemptions of one code exactly one succeeds.
    pub async fn redeem(
        &self,
        code: &str,
        mac_address: &str,
    ) -> PortalResult<(Session, AccessPackage)> {
        let normalized = code.trim().to_uppercase();
        if normalized.len() != CODE_LEN {
            return Err(PortalError::InvalidOrUsedCode);
        }

        let voucher = self
            .store
            .unused_voucher_by_code(&normalized)
            .ok_or(PortalError::InvalidOrUsedCode)?;
        let package = self
            .catalog
            .get(&voucher.package_id)
            .ok_or_else(|| PortalError::PackageNotFound(voucher.package_id.clone()))?
            .clone();

        let session = Session::active(
            mac_address,
            "voucher-user",
            &package.id,
            Utc::now() + package.duration(),
        );
        self.store.redeem_voucher(voucher.id, session.clone())?;

        let result = self
            .authorizer
            .authorize(session.id, mac_address)
            .await;
        if !result.is_granted() {
            warn!("session {} not authorized after redemption", session.id);
        }
        info!("voucher {} redeemed by {}", normalized, mac_address);
        Ok((session, package))
    }
}

/// Random code of `CODE_LEN` characters starting with `prefix`
fn generate_code(prefix: &str) -> String {
    let mut rng = rand::thread_rng();
    let mut code = String::with_capacity(CODE_LEN);
    code.push_str(prefix);
    while code.len() < CODE_LEN {
        let idx = rng.gen_range(0..CODE_CHARSET.len());
        code.push(CODE_CHARSET[idx] as char);
    }
    code
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateway::testing::RecordingGateway;
    use crate::gateway::AccessGateway;
    use crate::SessionStatus;

    const MAC: &str = "AA:BB:CC:DD:EE:FF";

    fn setup() -> (Arc<SessionStore>, Arc<RecordingGateway>, VoucherService) {
        let store = Arc::new(SessionStore::new());
        let catalog = Arc::new(PackageCatalog::new());
        let gateway = Arc::new(RecordingGateway::default());
        let authorizer = Arc::new(Authorizer::new(
            Arc::clone(&store),
            Arc::clone(&gateway) as Arc<dyn AccessGateway>,
        ));
        let service = VoucherService::new(Arc::clone(&store), catalog, authorizer);
        (store, gateway, service)
    }

    fn seed_voucher(store: &SessionStore, code: &str, package_id: &str) {
        let voucher = Voucher {
            id: Uuid::new_v4(),
            code: code.to_string(),
            package_id: package_id.to_string(),
            status: VoucherStatus::Unused,
            session_id: None,
            used_at: None,
            created_at: Utc::now(),
        };
        assert!(store.insert_voucher_unique(voucher));
    }

    #[tokio::test]
    async fn test_redeem_creates_active_session() {
        let (store, gateway, service) = setup();
        seed_voucher(&store, "A1B2C3D4", "quick-browse");

        let (session, package) = service.redeem("A1B2C3D4", MAC).await.unwrap();
        assert_eq!(package.duration_minutes, 60);
        assert_eq!(session.status, SessionStatus::Active);
        let remaining = session.remaining_secs(Utc::now()).unwrap();
        assert!((3590..=3600).contains(&remaining));
        assert_eq!(gateway.accepts(), 1);

        // Same code again is indistinguishable from a code that never existed.
        let err = service.redeem("A1B2C3D4", MAC).await.unwrap_err();
        assert!(matches!(err, PortalError::InvalidOrUsedCode));
    }

    #[tokio::test]
    async fn test_redeem_normalizes_case() {
        let (store, _gateway, service) = setup();
        seed_voucher(&store, "A1B2C3D4", "quick-browse");

        assert!(service.redeem("  a1b2c3d4 ", MAC).await.is_ok());
    }

    #[tokio::test]
    async fn test_redeem_unknown_code() {
        let (_store, gateway, service) = setup();

        let err = service.redeem("ZZZZZZZZ", MAC).await.unwrap_err();
        assert!(matches!(err, PortalError::InvalidOrUsedCode));
        assert_eq!(gateway.accepts(), 0);
    }

    #[test]
    fn test_generate_batch() {
        let (_store, _gateway, service) = setup();

        let vouchers = service.generate("quick-browse", 20, None).unwrap();
        assert_eq!(vouchers.len(), 20);
        for v in &vouchers {
            assert_eq!(v.code.len(), CODE_LEN);
            assert!(v.code.bytes().all(|b| CODE_CHARSET.contains(&b)));
            assert_eq!(v.status, VoucherStatus::Unused);
        }

        let codes: std::collections::HashSet<_> =
            vouchers.iter().map(|v| v.code.clone()).collect();
        assert_eq!(codes.len(), vouchers.len());
    }

    #[test]
    fn test_generate_with_prefix() {
        let (_store, _gateway, service) = setup();

        let vouchers = service
            .generate("half-day", 5, Some("net"))
            .unwrap();
        for v in &vouchers {
            assert!(v.code.starts_with("NET"));
            assert_eq!(v.code.len(), CODE_LEN);
        }

        // Ambiguous characters are rejected up front.
        assert!(matches!(
            service.generate("half-day", 1, Some("WIFI")),
            Err(PortalError::InvalidRequest(_))
        ));
    }

    #[test]
    fn test_generate_bounds() {
        let (_store, _gateway, service) = setup();

        assert!(matches!(
            service.generate("quick-browse", 101, None),
            Err(PortalError::BatchTooLarge { .. })
        ));
        assert!(matches!(
            service.generate("quick-browse", 0, None),
            Err(PortalError::InvalidRequest(_))
        ));
        assert!(matches!(
            service.generate("no-such-package", 1, None),
            Err(PortalError::PackageNotFound(_))
        ));
    }
}
