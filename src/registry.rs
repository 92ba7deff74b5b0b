//! Room registry actor
//!
//! The central actor that owns the room-name → room mapping.
//! Room creation, lookup and listing all go through its command channel,
//! so concurrent `:create` / `:join` / `:rooms` never race each other.

use std::collections::HashMap;
use std::time::Duration;

use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info};

use crate::config::ServerConfig;
use crate::error::AppError;
use crate::message::validate_room_name;
use crate::room::{Room, RoomHandle};

/// Commands sent from sessions to the Registry actor
#[derive(Debug)]
pub enum RegistryCommand {
    /// Create a new room
    Create {
        name: String,
        reply: oneshot::Sender<Result<RoomHandle, AppError>>,
    },
    /// Look up a room by name
    Find {
        name: String,
        reply: oneshot::Sender<Option<RoomHandle>>,
    },
    /// Every room, in creation order
    List {
        reply: oneshot::Sender<Vec<RoomHandle>>,
    },
}

/// The Registry actor
///
/// Rooms are never removed; the mapping only grows.
pub struct Registry {
    /// All rooms: name -> handle
    rooms: HashMap<String, RoomHandle>,
    /// Room names in creation order
    order: Vec<String>,
    /// Settings passed to each new room
    room_queue_capacity: usize,
    delivery_timeout: Duration,
    max_room_name_length: usize,
    /// Command receiver channel
    receiver: mpsc::Receiver<RegistryCommand>,
}

impl Registry {
    /// Create the registry with its default room and spawn it
    pub fn spawn(config: &ServerConfig) -> Result<RegistryHandle, AppError> {
        let (sender, receiver) = mpsc::channel(config.room_queue_capacity);
        let mut registry = Registry {
            rooms: HashMap::new(),
            order: Vec::new(),
            room_queue_capacity: config.room_queue_capacity,
            delivery_timeout: config.delivery_timeout,
            max_room_name_length: config.max_room_name_length,
            receiver,
        };
        registry.create_room(&config.default_room)?;
        tokio::spawn(registry.run());

        Ok(RegistryHandle { sender })
    }

    /// Run the Registry event loop
    ///
    /// Continuously receives and processes commands until all handles are dropped.
    async fn run(mut self) {
        info!("Registry started");

        while let Some(cmd) = self.receiver.recv().await {
            self.handle_command(cmd);
        }

        info!("Registry shutting down");
    }

    /// Process a single command
    fn handle_command(&mut self, cmd: RegistryCommand) {
        match cmd {
            RegistryCommand::Create { name, reply } => {
                let _ = reply.send(self.create_room(&name));
            }
            RegistryCommand::Find { name, reply } => {
                let _ = reply.send(self.rooms.get(&name).cloned());
            }
            RegistryCommand::List { reply } => {
                let rooms = self
                    .order
                    .iter()
                    .filter_map(|name| self.rooms.get(name).cloned())
                    .collect();
                let _ = reply.send(rooms);
            }
        }
    }

    /// Handle room creation
    fn create_room(&mut self, name: &str) -> Result<RoomHandle, AppError> {
        validate_room_name(name, self.max_room_name_length)?;

        if self.rooms.contains_key(name) {
            return Err(AppError::RoomExists(name.to_string()));
        }

        let room = Room::spawn(name, self.room_queue_capacity, self.delivery_timeout);
        self.rooms.insert(name.to_string(), room.clone());
        self.order.push(name.to_string());

        debug!("Total rooms: {}", self.rooms.len());
        Ok(room)
    }
}

/// Cloneable handle to the Registry actor
#[derive(Debug, Clone)]
pub struct RegistryHandle {
    sender: mpsc::Sender<RegistryCommand>,
}

impl RegistryHandle {
    /// Create a room; fails if the name is taken or malformed
    pub async fn create(&self, name: &str) -> Result<RoomHandle, AppError> {
        let (reply, rx) = oneshot::channel();
        self.send(RegistryCommand::Create {
            name: name.to_string(),
            reply,
        })
        .await?;
        rx.await.map_err(|_| AppError::ChannelSend)?
    }

    pub async fn find(&self, name: &str) -> Result<Option<RoomHandle>, AppError> {
        let (reply, rx) = oneshot::channel();
        self.send(RegistryCommand::Find {
            name: name.to_string(),
            reply,
        })
        .await?;
        rx.await.map_err(|_| AppError::ChannelSend)
    }

    /// Every room, in creation order
    pub async fn list(&self) -> Result<Vec<RoomHandle>, AppError> {
        let (reply, rx) = oneshot::channel();
        self.send(RegistryCommand::List { reply }).await?;
        rx.await.map_err(|_| AppError::ChannelSend)
    }

    async fn send(&self, cmd: RegistryCommand) -> Result<(), AppError> {
        self.sender
            .send(cmd)
            .await
            .map_err(|_| AppError::ChannelSend)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spawn_default() -> RegistryHandle {
        let config = ServerConfig::builder().build().unwrap();
        Registry::spawn(&config).unwrap()
    }

    #[tokio::test]
    async fn test_default_room_exists() {
        let registry = spawn_default();
        let room = registry.find("zero").await.unwrap().unwrap();
        assert_eq!(room.name(), "zero");
        assert!(registry.find("lobby").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_create_and_list_in_order() {
        let registry = spawn_default();
        registry.create("lobby").await.unwrap();
        registry.create("den").await.unwrap();

        let names: Vec<String> = registry
            .list()
            .await
            .unwrap()
            .iter()
            .map(|r| r.name().to_string())
            .collect();
        assert_eq!(names, vec!["zero", "lobby", "den"]);
    }

    #[tokio::test]
    async fn test_create_existing_fails() {
        let registry = spawn_default();
        let first = registry.create("lobby").await.unwrap();

        let result = registry.create("lobby").await;
        assert!(matches!(result, Err(AppError::RoomExists(ref name)) if name == "lobby"));

        // The first room is kept
        let found = registry.find("lobby").await.unwrap().unwrap();
        assert!(found.same_room(&first));
    }

    #[tokio::test]
    async fn test_create_invalid_name_fails() {
        let registry = spawn_default();
        let result = registry.create("two words").await;
        assert!(matches!(result, Err(AppError::InvalidRoomName(_))));
        assert_eq!(registry.list().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_concurrent_creates_have_one_winner() {
        let registry = spawn_default();
        let tasks: Vec<_> = (0..16)
            .map(|_| {
                let registry = registry.clone();
                tokio::spawn(async move { registry.create("race").await.is_ok() })
            })
            .collect();

        let mut winners = 0;
        for task in tasks {
            if task.await.unwrap() {
                winners += 1;
            }
        }
        assert_eq!(winners, 1);
        assert_eq!(registry.list().await.unwrap().len(), 2);
    }
}
