//! Portal Configuration

use serde::{Deserialize, Serialize};

/// Portal configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PortalConfig {
    /// Expiry sweep interval (seconds)
    pub sweep_interval_secs: u64,
    /// Gateway request timeout (seconds)
    pub gateway_timeout_secs: u64,
    /// RADIUS enforcement endpoint (None disables the adapter)
    pub radius_url: Option<String>,
    /// RADIUS shared secret
    pub radius_secret: String,
    /// Admin shared secret gating voucher issuance and forced disconnect
    pub admin_key: String,
    /// API listen address
    pub listen_addr: String,
}

impl Default for PortalConfig {
    fn default() -> Self {
        Self {
            sweep_interval_secs: 45,
            gateway_timeout_secs: 5,
            radius_url: None,
            radius_secret: "testing123".into(),
            admin_key: String::new(),
            listen_addr: "0.0.0.0:8080".into(),
        }
    }
}

impl PortalConfig {
    /// Load from environment, falling back to defaults
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            sweep_interval_secs: std::env::var("SWEEP_INTERVAL_SECS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.sweep_interval_secs),
            gateway_timeout_secs: std::env::var("GATEWAY_TIMEOUT_SECS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.gateway_timeout_secs),
            radius_url: std::env::var("RADIUS_SERVER_URL").ok(),
            radius_secret: std::env::var("RADIUS_SHARED_SECRET")
                .unwrap_or(defaults.radius_secret),
            admin_key: std::env::var("ADMIN_SECRET_KEY").unwrap_or(defaults.admin_key),
            listen_addr: std::env::var("LISTEN_ADDR").unwrap_or(defaults.listen_addr),
        }
    }
}
