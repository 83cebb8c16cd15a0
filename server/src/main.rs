use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::net::TcpListener;
use tracing::info;
use tracing_subscriber::EnvFilter;

use cursebound_server::config::ServerConfig;
use cursebound_server::connection;
use cursebound_server::hub::Hub;
use cursebound_server::store::MemoryStore;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = ServerConfig::from_env();
    let store = Arc::new(MemoryStore::new());
    let hub = Arc::new(Hub::new(store));

    let listener = TcpListener::bind(&config.bind_addr)
        .await
        .with_context(|| format!("Failed to bind {}", config.bind_addr))?;
    info!(addr = %config.bind_addr, "cursebound server listening");

    loop {
        let (stream, peer) = listener
            .accept()
            .await
            .context("Failed to accept connection")?;
        let hub = Arc::clone(&hub);
        let conn = hub.allocate_conn();
        tokio::spawn(async move {
            if let Err(e) = connection::run(hub, stream, conn).await {
                tracing::warn!(error = %e, %peer, "connection ended with error");
            }
        });
    }
}
