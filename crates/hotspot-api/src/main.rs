//! OpenHotspot Portal API service

use hotspot_api::{build_router, AppState};
use hotspot_core::{AccessGateway, NullGateway, PortalConfig, PortalEngine, RadiusGateway};
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = PortalConfig::from_env();

    let gateway: Arc<dyn AccessGateway> = match &config.radius_url {
        Some(url) => Arc::new(RadiusGateway::new(
            url,
            &config.radius_secret,
            config.gateway_timeout_secs,
        )?),
        None => {
            tracing::warn!("no RADIUS endpoint configured, directives are dropped");
            Arc::new(NullGateway)
        }
    };

    let engine = Arc::new(PortalEngine::new(&config, gateway));

    let sweeper = engine.sweeper();
    tokio::spawn(async move { sweeper.run().await });

    let state = AppState {
        engine,
        admin_key: config.admin_key.clone(),
    };
    let app = build_router(state);

    tracing::info!("Portal API listening on {}", config.listen_addr);
    let listener = tokio::net::TcpListener::bind(&config.listen_addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}
