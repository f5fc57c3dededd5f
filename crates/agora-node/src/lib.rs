//! Agora Node - decentralized feed with community moderation
//!
//! A single authoritative node hosting the Agora moderation engine.
//! Stores feed posts, persists vote sessions, and exposes an HTTP API
//! for reporting, voting, and resolution.
//!
//! # Architecture
//!
//! - **Models**: the [`Post`] record the engine moderates
//! - **Storage**: RocksDB-backed persistence for posts and vote state
//! - **Adapters**: content source and resolution sink over that storage
//! - **API**: HTTP endpoints for the feed and the moderation operations
//!
//! # Example
//!
//! ```no_run
//! use agora_node::{Node, NodeConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = NodeConfig::default();
//!     let node = Node::new(config)?;
//!     node.run().await?;
//!     Ok(())
//! }
//! ```

pub mod adapters;
pub mod api;
pub mod error;
pub mod models;
pub mod node;
pub mod storage;

pub use adapters::{StorageContentSource, StorageResolutionSink};
pub use error::{Error, Result};
pub use models::Post;
pub use node::{Node, NodeConfig};
pub use storage::{PersistentStore, Storage};
