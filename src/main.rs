//! Service binary: load config, install tracing, wire the stores, serve.
//!
//! Store drivers are external collaborators; this binary wires the
//! in-memory implementations so the service runs standalone for local
//! development. Production deployments swap in real drivers behind the
//! same traits.

use std::sync::Arc;

use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use commerce_sync::{
    server, AppState, InMemoryAnalyticsStore, InMemoryGraphStore, InMemoryVectorStore,
    SyncServiceConfig,
};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = load_config()?;
    if config.webhook_secret.is_none() {
        warn!("No webhook_secret configured; signature verification is disabled");
    }

    let state = Arc::new(AppState::new(
        &config,
        Arc::new(InMemoryGraphStore::new()),
        Arc::new(InMemoryVectorStore::new()),
        Arc::new(InMemoryAnalyticsStore::new()),
    ));

    server::serve(state, &config.bind_addr).await?;
    Ok(())
}

/// Read JSON config from the path given as the first argument, or fall
/// back to defaults.
fn load_config() -> Result<SyncServiceConfig, Box<dyn std::error::Error>> {
    match std::env::args().nth(1) {
        Some(path) => {
            let text = std::fs::read_to_string(&path)?;
            let config = serde_json::from_str(&text)?;
            info!(path = %path, "Loaded config");
            Ok(config)
        }
        None => Ok(SyncServiceConfig::default()),
    }
}
