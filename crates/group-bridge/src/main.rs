//! Group Bridge - HTTP API for managing messaging groups from a chat bot
//!
//! Keeps the paired-session marker and the group listing in the session
//! cache so a restart can reconnect without pairing again.

use group_bridge::pacing::Pacing;
use group_bridge::{
    start_server, BridgeConfig, BridgeError, GroupDirectory, MessagingSession, Result,
    ServerState, SharedState, UnpairedSession,
};
use session_cache::CacheManager;
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::{prelude::*, EnvFilter};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    let env_filter = EnvFilter::from_default_env()
        .add_directive("group_bridge=info".parse()?)
        .add_directive("session_cache=info".parse()?);

    // Use JSON format for GCP Cloud Logging when LOG_FORMAT=json
    if std::env::var("LOG_FORMAT")
        .map(|v| v == "json")
        .unwrap_or(false)
    {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_stackdriver::layer())
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(env_filter).init();
    };

    info!("Starting Group Bridge...");

    let config = BridgeConfig::from_env();
    info!(
        port = config.port,
        session_path = ?config.session_path,
        cache = config.cache.backend.as_str(),
        owner_configured = config.owner_id.is_some(),
        "Loaded configuration"
    );

    let auth_dir = config.session_path.join("auth");
    tokio::fs::create_dir_all(&auth_dir).await?;

    let cache = Arc::new(CacheManager::connect(&config.cache).await);
    info!(backend = cache.backend_kind().as_str(), "Cache ready");

    let session: Arc<dyn MessagingSession> = Arc::new(UnpairedSession::new(auth_dir));
    let directory = Arc::new(GroupDirectory::new(
        session.clone(),
        cache.clone(),
        Pacing::new(config.min_delay_ms, config.max_delay_ms),
    ));

    // Forward connection updates into the directory
    tokio::spawn(directory.clone().run_updates(session.subscribe()));

    if let Err(e) = directory.init().await {
        error!(error = %e, "Failed to restore session");
    }

    let state: SharedState = Arc::new(ServerState::new(directory, cache));

    start_server(state, config.port)
        .await
        .map_err(|e| BridgeError::Config(format!("Server error: {}", e)))?;

    info!("Group Bridge stopped");
    Ok(())
}
