//! Server configuration
//!
//! Built through `ServerConfig::builder()`; `build()` validates the values
//! that would otherwise panic at runtime (zero channel capacities) or break
//! the default room invariant.

use std::time::Duration;

use crate::error::AppError;
use crate::message::validate_room_name;

/// Default listen address
pub const DEFAULT_ADDR: &str = "0.0.0.0:6969";

/// Name of the room every session starts in
pub const DEFAULT_ROOM: &str = "zero";

/// Per-session inbox capacity
pub const DEFAULT_INBOX_CAPACITY: usize = 32;

/// Per-room command queue capacity
pub const DEFAULT_ROOM_QUEUE_CAPACITY: usize = 256;

/// How long fan-out waits on one full inbox before dropping the line for it
pub const DEFAULT_DELIVERY_TIMEOUT: Duration = Duration::from_millis(500);

/// How long a closing session keeps writing already queued output
pub const DEFAULT_FLUSH_TIMEOUT: Duration = Duration::from_secs(1);

/// Longest accepted inbound line, in bytes
pub const DEFAULT_MAX_LINE_LENGTH: usize = 4096;

/// Longest accepted room name, in characters
pub const DEFAULT_MAX_ROOM_NAME_LENGTH: usize = 32;

/// Longest accepted display name, in characters
pub const DEFAULT_MAX_DISPLAY_NAME_LENGTH: usize = 32;

/// Validated server configuration
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub addr: String,
    pub default_room: String,
    pub inbox_capacity: usize,
    pub room_queue_capacity: usize,
    pub delivery_timeout: Duration,
    pub flush_timeout: Duration,
    pub max_line_length: usize,
    pub max_room_name_length: usize,
    pub max_display_name_length: usize,
}

/// Accumulates optional values and produces a validated config
#[derive(Debug, Clone)]
pub struct ServerConfigBuilder {
    config: ServerConfig,
}

impl ServerConfig {
    pub fn builder() -> ServerConfigBuilder {
        ServerConfigBuilder {
            config: ServerConfig {
                addr: DEFAULT_ADDR.to_string(),
                default_room: DEFAULT_ROOM.to_string(),
                inbox_capacity: DEFAULT_INBOX_CAPACITY,
                room_queue_capacity: DEFAULT_ROOM_QUEUE_CAPACITY,
                delivery_timeout: DEFAULT_DELIVERY_TIMEOUT,
                flush_timeout: DEFAULT_FLUSH_TIMEOUT,
                max_line_length: DEFAULT_MAX_LINE_LENGTH,
                max_room_name_length: DEFAULT_MAX_ROOM_NAME_LENGTH,
                max_display_name_length: DEFAULT_MAX_DISPLAY_NAME_LENGTH,
            },
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self::builder().config
    }
}

impl ServerConfigBuilder {
    pub fn addr(mut self, addr: impl Into<String>) -> Self {
        self.config.addr = addr.into();
        self
    }

    pub fn default_room(mut self, name: impl Into<String>) -> Self {
        self.config.default_room = name.into();
        self
    }

    pub fn inbox_capacity(mut self, capacity: usize) -> Self {
        self.config.inbox_capacity = capacity;
        self
    }

    pub fn room_queue_capacity(mut self, capacity: usize) -> Self {
        self.config.room_queue_capacity = capacity;
        self
    }

    pub fn delivery_timeout(mut self, timeout: Duration) -> Self {
        self.config.delivery_timeout = timeout;
        self
    }

    pub fn flush_timeout(mut self, timeout: Duration) -> Self {
        self.config.flush_timeout = timeout;
        self
    }

    pub fn max_line_length(mut self, max: usize) -> Self {
        self.config.max_line_length = max;
        self
    }

    pub fn max_room_name_length(mut self, max: usize) -> Self {
        self.config.max_room_name_length = max;
        self
    }

    pub fn max_display_name_length(mut self, max: usize) -> Self {
        self.config.max_display_name_length = max;
        self
    }

    pub fn build(self) -> Result<ServerConfig, AppError> {
        let config = self.config;

        if config.inbox_capacity == 0 || config.room_queue_capacity == 0 {
            return Err(AppError::InvalidConfig(
                "queue capacities must be at least 1".to_string(),
            ));
        }
        if config.max_line_length == 0 {
            return Err(AppError::InvalidConfig(
                "max_line_length must be at least 1".to_string(),
            ));
        }
        if config.max_display_name_length == 0 {
            return Err(AppError::InvalidConfig(
                "max_display_name_length must be at least 1".to_string(),
            ));
        }
        validate_room_name(&config.default_room, config.max_room_name_length).map_err(|_| {
            AppError::InvalidConfig(format!("invalid default room '{}'", config.default_room))
        })?;

        Ok(config)
    }
}
