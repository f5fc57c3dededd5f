//! Agora node - configuration and wiring.
//!
//! Single daemon process: one shared RocksDB instance holds posts and
//! moderation records, one moderation engine orchestrates over it, and
//! the HTTP API exposes both to clients.

use crate::adapters::{StorageContentSource, StorageResolutionSink};
use crate::api::{self, ApiState};
use crate::error::Result;
use crate::storage::{PersistentStore, Storage};
use agora_moderation::{ModerationEngine, VOTE_WINDOW_SECS};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

/// Configuration for an Agora node.
#[derive(Debug, Clone)]
pub struct NodeConfig {
    /// Data directory for storage
    pub data_dir: PathBuf,

    /// HTTP API listen address
    pub api_addr: SocketAddr,

    /// Voting window for moderation sessions, in seconds
    pub vote_window_secs: u64,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self::from_env()
    }
}

impl NodeConfig {
    /// Create config from environment variables with sensible defaults.
    pub fn from_env() -> Self {
        let data_dir = PathBuf::from(
            std::env::var("AGORA_DATA_DIR").unwrap_or_else(|_| "./agora-data".to_string()),
        );

        let api_addr = std::env::var("AGORA_API_ADDR")
            .unwrap_or_else(|_| "0.0.0.0:8080".to_string())
            .parse()
            .expect("Invalid AGORA_API_ADDR");

        let vote_window_secs = std::env::var("AGORA_VOTE_WINDOW_SECS")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(VOTE_WINDOW_SECS);

        Self {
            data_dir,
            api_addr,
            vote_window_secs,
        }
    }
}

/// An Agora node instance.
pub struct Node {
    state: Arc<ApiState>,
    config: NodeConfig,
}

impl Node {
    /// Create a new node.
    pub fn new(config: NodeConfig) -> Result<Self> {
        // Ensure data directory exists
        std::fs::create_dir_all(&config.data_dir)?;

        // Open single shared storage instance
        let storage = Arc::new(Storage::open(&config.data_dir)?);

        let engine = ModerationEngine::new(
            PersistentStore::new(Arc::clone(&storage)),
            Arc::new(StorageContentSource::new(Arc::clone(&storage))),
            Arc::new(StorageResolutionSink::new(Arc::clone(&storage))),
        )
        .with_window(config.vote_window_secs);

        let state = Arc::new(ApiState { storage, engine });
        Ok(Self { state, config })
    }

    /// Get the shared state (for API handlers).
    pub fn state(&self) -> Arc<ApiState> {
        Arc::clone(&self.state)
    }

    /// Run the node (starts the HTTP server).
    pub async fn run(self) -> Result<()> {
        tracing::info!("Agora node starting");
        tracing::info!("  API: http://{}", self.config.api_addr);
        tracing::info!("  Data: {:?}", self.config.data_dir);
        tracing::info!("  Vote window: {}s", self.config.vote_window_secs);

        let app = api::build_router(self.state.clone());

        let listener = tokio::net::TcpListener::bind(self.config.api_addr).await?;
        tracing::info!("HTTP server listening on {}", self.config.api_addr);

        axum::serve(listener, app).await?;

        Ok(())
    }
}
