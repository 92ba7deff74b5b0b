//! TCP server
//!
//! Holds the state shared by every connection and runs the accept loop.
//! Each accepted socket is handed to `handle_connection` on its own task;
//! only failing to bind is fatal to the process.

use std::net::SocketAddr;
use std::sync::Arc;

use tokio::net::TcpListener;
use tracing::{error, info};

use crate::config::ServerConfig;
use crate::error::AppError;
use crate::handler::handle_connection;
use crate::names::NameGenerator;
use crate::registry::{Registry, RegistryHandle};

/// State shared by every session
#[derive(Debug, Clone)]
pub struct ChatState {
    pub registry: RegistryHandle,
    pub names: Arc<NameGenerator>,
    pub config: Arc<ServerConfig>,
}

impl ChatState {
    /// Spawn the registry (with its default room) and seed a name generator
    ///
    /// Must be called from within a tokio runtime.
    pub fn new(config: ServerConfig) -> Result<Self, AppError> {
        Self::with_names(config, NameGenerator::new())
    }

    pub fn with_names(config: ServerConfig, names: NameGenerator) -> Result<Self, AppError> {
        let registry = Registry::spawn(&config)?;
        Ok(Self {
            registry,
            names: Arc::new(names),
            config: Arc::new(config),
        })
    }
}

/// Bound listener plus shared state
pub struct Server {
    listener: TcpListener,
    state: ChatState,
}

impl Server {
    /// Bind the configured address and prepare the shared state
    pub async fn bind(config: ServerConfig) -> Result<Self, AppError> {
        let listener = TcpListener::bind(&config.addr).await?;
        let state = ChatState::new(config)?;
        Ok(Self { listener, state })
    }

    pub fn local_addr(&self) -> Result<SocketAddr, AppError> {
        Ok(self.listener.local_addr()?)
    }

    pub fn state(&self) -> &ChatState {
        &self.state
    }

    /// Connection accept loop
    ///
    /// Runs until the task is dropped; accept errors are logged and skipped.
    pub async fn run(self) {
        info!(
            "Chat relay listening on {} (default room '{}')",
            self.listener
                .local_addr()
                .map(|a| a.to_string())
                .unwrap_or_else(|_| self.state.config.addr.clone()),
            self.state.config.default_room
        );

        loop {
            match self.listener.accept().await {
                Ok((stream, addr)) => {
                    info!("New connection from {}", addr);
                    let state = self.state.clone();

                    // Spawn handler task for each connection
                    tokio::spawn(async move {
                        if let Err(e) = handle_connection(stream, addr.to_string(), state).await {
                            error!("Connection handler error for {}: {}", addr, e);
                        }
                    });
                }
                Err(e) => {
                    error!("Failed to accept connection: {}", e);
                }
            }
        }
    }
}
