//! Multi-room TCP Chat Relay - Entry Point
//!
//! Binds the listener and runs the accept loop.

use std::env;

use tracing::info;
use tracing_subscriber::EnvFilter;

use chat_relay::{Server, ServerConfig};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging with environment filter
    // Use RUST_LOG env var to control log level
    // e.g., RUST_LOG=debug or RUST_LOG=chat_relay=trace
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("chat_relay=info")),
        )
        .init();

    // Get bind address from command line or use default
    let mut builder = ServerConfig::builder();
    if let Some(addr) = env::args().nth(1) {
        builder = builder.addr(addr);
    }
    let config = builder.build()?;

    let server = Server::bind(config).await?;
    info!("Bound to {}", server.local_addr()?);

    server.run().await;
    Ok(())
}
