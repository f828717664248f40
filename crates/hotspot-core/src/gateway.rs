//! Network Access Gateway
//!
//! Adapter to the RADIUS enforcement endpoint. Directives are
//! fire-and-forget: a delivery failure is returned for the caller to log,
//! never to change an authorization outcome or session state.

use crate::error::{PortalError, PortalResult};
use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use std::time::Duration;
use tracing::debug;
use uuid::Uuid;

/// Directive sink for the network access server
#[async_trait]
pub trait AccessGateway: Send + Sync {
    /// Access-Accept for the device, with the remaining session budget
    async fn send_accept(
        &self,
        mac_address: &str,
        session_id: Uuid,
        session_timeout_secs: u64,
    ) -> PortalResult<()>;

    /// Disconnect-Request for the device
    async fn send_disconnect(&self, mac_address: &str) -> PortalResult<()>;
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct AcceptRequest<'a> {
    username: &'a str,
    session_id: Uuid,
    session_timeout: u64,
    action: &'static str,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct DisconnectRequest<'a> {
    username: &'a str,
    action: &'static str,
}

/// HTTP adapter to the RADIUS endpoint
pub struct RadiusGateway {
    base_url: String,
    shared_secret: String,
    client: Client,
}

impl RadiusGateway {
    pub fn new(base_url: &str, shared_secret: &str, timeout_secs: u64) -> PortalResult<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .map_err(|e| PortalError::GatewayUnreachable(e.to_string()))?;
        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            shared_secret: shared_secret.to_string(),
            client,
        })
    }

    async fn post<T: Serialize>(&self, path: &str, body: &T) -> PortalResult<()> {
        let url = format!("{}{}", self.base_url, path);
        debug!("POST {}", url);

        let response = self
            .client
            .post(&url)
            .header("x-shared-secret", &self.shared_secret)
            .json(body)
            .send()
            .await
            .map_err(|e| PortalError::GatewayUnreachable(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            return Err(PortalError::GatewayUnreachable(format!("{status}: {text}")));
        }
        Ok(())
    }
}

#[async_trait]
impl AccessGateway for RadiusGateway {
    async fn send_accept(
        &self,
        mac_address: &str,
        session_id: Uuid,
        session_timeout_secs: u64,
    ) -> PortalResult<()> {
        self.post(
            "/api/authorize",
            &AcceptRequest {
                username: mac_address,
                session_id,
                session_timeout: session_timeout_secs,
                action: "accept",
            },
        )
        .await
    }

    async fn send_disconnect(&self, mac_address: &str) -> PortalResult<()> {
        self.post(
            "/api/disconnect",
            &DisconnectRequest {
                username: mac_address,
                action: "disconnect",
            },
        )
        .await
    }
}

/// No-op gateway for deployments without an enforcement endpoint
pub struct NullGateway;

#[async_trait]
impl AccessGateway for NullGateway {
    async fn send_accept(
        &self,
        mac_address: &str,
        _session_id: Uuid,
        session_timeout_secs: u64,
    ) -> PortalResult<()> {
        debug!("accept {} for {}s (no gateway configured)", mac_address, session_timeout_secs);
        Ok(())
    }

    async fn send_disconnect(&self, mac_address: &str) -> PortalResult<()> {
        debug!("disconnect {} (no gateway configured)", mac_address);
        Ok(())
    }
}
