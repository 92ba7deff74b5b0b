//! Multi-room TCP Chat Relay Library
//!
//! A line-oriented chat relay built on tokio. Clients connect over plain
//! TCP, get a generated two-word display name and land in the default room.
//!
//! # Features
//! - Newline-delimited text protocol (`\n` or `\r\n`), lossy UTF-8
//! - Room creation and joining (`:create`, `:join`, `:rooms`, `:people`)
//! - Room broadcasts and private `@name` messages
//! - Collision-free generated display names, `:rename`
//! - Join/leave announcements
//!
//! # Architecture
//! Uses the Actor pattern with `mpsc` channels:
//! - `Registry` is the actor owning the room-name → room mapping
//! - Every `Room` is an actor owning its member list and fanning lines out
//! - Each connection runs an inbound and an outbound pump sharing one
//!   cancellation token
//! - The name generator is the only lock-protected state, never held
//!   across an `.await`
//!
//! # Example
//! ```ignore
//! use chat_relay::{Server, ServerConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), chat_relay::AppError> {
//!     let config = ServerConfig::builder().addr("127.0.0.1:6969").build()?;
//!     Server::bind(config).await?.run().await;
//!     Ok(())
//! }
//! ```

pub mod codec;
pub mod config;
pub mod error;
pub mod handler;
pub mod message;
pub mod names;
pub mod registry;
pub mod room;
pub mod server;
pub mod session;
pub mod types;

// Re-export main types for convenience
pub use config::ServerConfig;
pub use error::{AppError, SendError};
pub use handler::handle_connection;
pub use message::{ClientMessage, Command, Outbound, ServerMessage};
pub use names::NameGenerator;
pub use registry::{Registry, RegistryHandle};
pub use room::{Room, RoomHandle};
pub use server::{ChatState, Server};
pub use session::{Flow, Session};
pub use types::SessionId;
