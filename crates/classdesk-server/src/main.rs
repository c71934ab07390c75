//! # classdesk-server
//!
//! HTTP server for the Classdesk complaint tracker.
//!
//! This binary provides:
//! - **REST API** (axum) for authentication, complaint lifecycle operations,
//!   and user administration
//! - **Identity provider**: email/password signup, bearer-token sessions,
//!   password-reset tokens
//! - **Attachment storage** on local disk with size limits enforced before
//!   complaint records are created
//!
//! All lifecycle mutations go through `classdesk-core`'s engine, which gates
//! each one with the authorization predicate; the HTTP layer never touches
//! the store's complaint tables directly.

mod api;
mod attachments;
mod auth;
mod config;
mod error;

use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::info;
use tracing_subscriber::EnvFilter;

use classdesk_core::{LifecycleEngine, SessionHub};
use classdesk_store::Database;

use crate::api::AppState;
use crate::attachments::AttachmentStore;
use crate::auth::SessionManager;
use crate::config::ServerConfig;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // -----------------------------------------------------------------------
    // 1. Initialize tracing (respects RUST_LOG env var)
    // -----------------------------------------------------------------------
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,classdesk_server=debug")),
        )
        .init();

    info!("Starting Classdesk server v{}", env!("CARGO_PKG_VERSION"));

    // -----------------------------------------------------------------------
    // 2. Load configuration
    // -----------------------------------------------------------------------
    let config = ServerConfig::from_env();
    info!(?config, "Loaded configuration");

    // -----------------------------------------------------------------------
    // 3. Initialize subsystems
    // -----------------------------------------------------------------------

    // Database (runs migrations on open)
    let db = match &config.database_path {
        Some(path) => Database::open_at(path)?,
        None => Database::new()?,
    };

    // Attachment store (creates directory if missing)
    let attachments = Arc::new(
        AttachmentStore::new(config.attachment_path.clone(), config.max_attachment_size).await?,
    );

    // Lifecycle engine and sessions
    let engine = Arc::new(Mutex::new(LifecycleEngine::new(db)));
    let sessions = SessionManager::new();
    let session_hub = SessionHub::new();

    let app_state = AppState {
        engine,
        sessions: sessions.clone(),
        attachments,
        session_hub,
        config: Arc::new(config.clone()),
    };

    // -----------------------------------------------------------------------
    // 4. Spawn background tasks
    // -----------------------------------------------------------------------

    // Periodic reset-token cleanup (every 5 minutes)
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(std::time::Duration::from_secs(300));
        loop {
            interval.tick().await;
            sessions.purge_expired_resets().await;
        }
    });

    // -----------------------------------------------------------------------
    // 5. Run the HTTP API server (blocks until shutdown)
    // -----------------------------------------------------------------------
    // tokio::select! ensures that if either the HTTP server or a shutdown
    // signal arrives, we exit cleanly.
    tokio::select! {
        result = api::serve(app_state, config.http_addr) => {
            if let Err(e) = result {
                tracing::error!(error = %e, "HTTP server failed");
                return Err(e);
            }
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Received Ctrl+C, shutting down");
        }
    }

    Ok(())
}
