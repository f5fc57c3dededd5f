//! Agora node binary
//!
//! A feed node with community-vote content moderation.

use agora_node::{Node, NodeConfig};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "agora_node=info,agora_moderation=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting Agora Node");

    let config = NodeConfig::default();

    let node = Node::new(config)?;
    node.run().await?;

    Ok(())
}
