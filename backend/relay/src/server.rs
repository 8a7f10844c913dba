//! Relay server assembly: WebSocket surface plus the media HTTP routes.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use axum::{Json, Router, routing::get};
use tokio::net::TcpListener;
use tokio::sync::Semaphore;
use tracing::info;

use clawbridge_agent::AgentInvoker;
use clawbridge_core::BridgeConfig;
use clawbridge_media::{SnapshotStore, media_router};
use clawbridge_upload::UploadChain;

use crate::ws_server::ws_handler;

/// Everything a session pipeline needs, built once at startup and shared
/// across connections. Sessions themselves keep no shared mutable state.
#[derive(Clone)]
pub struct RelayState {
    pub cfg: Arc<BridgeConfig>,
    pub snapshots: SnapshotStore,
    pub invoker: AgentInvoker,
    pub uploads: Arc<UploadChain>,
    /// Caps concurrently running agent subprocesses across all sessions.
    pub agent_permits: Arc<Semaphore>,
}

impl RelayState {
    pub fn new(cfg: Arc<BridgeConfig>) -> Self {
        let snapshots = SnapshotStore::new(&cfg.snapshot_dir);
        let invoker = AgentInvoker::new(&cfg.agent_bin);
        let uploads = Arc::new(UploadChain::with_default_providers(Duration::from_secs(
            cfg.upload_attempt_timeout_secs,
        )));
        let agent_permits = Arc::new(Semaphore::new(cfg.max_concurrent_agents));
        Self {
            cfg,
            snapshots,
            invoker,
            uploads,
            agent_permits,
        }
    }
}

/// Build the full relay router:
///   GET /            — WebSocket upgrade for browser sessions
///   GET /media/:file — agent-generated media
///   GET /api/health  — liveness probe
pub fn build_router(state: RelayState) -> Router {
    let media_dir = PathBuf::from(&state.cfg.media_dir);
    Router::new()
        .route("/", get(ws_handler))
        .route("/api/health", get(health))
        .with_state(state)
        .nest("/media", media_router(media_dir))
}

async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "status": "ok", "service": "clawbridge" }))
}

/// Bind and run the relay until Ctrl-C.
pub async fn serve(cfg: Arc<BridgeConfig>) -> Result<()> {
    let state = RelayState::new(cfg.clone());
    let app = build_router(state);

    let addr = format!("{}:{}", cfg.bind_address, cfg.port);
    info!(
        addr = %addr,
        snapshot_dir = %cfg.snapshot_dir,
        media_dir = %cfg.media_dir,
        target = %cfg.agent_target,
        "ClawBridge listening"
    );

    let listener = TcpListener::bind(&addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(())
}

async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
    info!("Shutdown signal received, closing server");
}
