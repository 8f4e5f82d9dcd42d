//! Opsgate control-plane server.
//!
//! Binds the API router over the on-disk workspace store and the
//! configured upstream API.

use opsgate_engine::OpsEngine;
use opsgate_server::{AppState, HttpUpstream, ServerConfig, create_router};
use opsgate_store::{ConfigStore, WorkspaceStore, resolve_root};
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = ServerConfig::from_env()?;
    info!("Starting Opsgate server");

    let root = resolve_root()?;
    info!(root = %root.display(), "Storage root resolved");
    let engine = OpsEngine::new(WorkspaceStore::open(&root), ConfigStore::open(&root));
    let upstream = Arc::new(HttpUpstream::new(config.upstream_base_url().clone()));

    info!(
        bind = %config.bind_addr(),
        upstream = %config.upstream_base_url(),
        require_key = config.require_key(),
        "Configuration loaded"
    );

    let bind_addr = config.bind_addr().clone();
    let state = AppState::new(config, engine, upstream);
    let router = create_router(state);

    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    info!(addr = %bind_addr, "Opsgate server listening");
    axum::serve(
        listener,
        router.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;

    Ok(())
}
