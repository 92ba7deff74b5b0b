//! Session state and command processing
//!
//! A `Session` is one connected client: its display name, its current room
//! and the sending half of its inbox. The inbound pump feeds every line to
//! `Session::handle_line`, which interprets commands, private messages and
//! broadcasts.

use tracing::{debug, info, warn};

use crate::error::{AppError, SendError};
use crate::message::{
    validate_display_name, ClientMessage, Command, Outbound, RoomSummary, ServerMessage,
    PRIVATE_USAGE,
};
use crate::room::{deliver, Inbox, Participant, RoomHandle};
use crate::server::ChatState;
use crate::types::SessionId;

/// What the inbound pump should do after a line
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Quit,
}

/// A connected client
pub struct Session {
    /// Unique identifier for this session
    id: SessionId,
    /// Current display name
    name: String,
    /// Room this session is currently in
    room: RoomHandle,
    /// Sending half of this session's inbox
    inbox: Inbox,
    state: ChatState,
}

impl Session {
    /// Register a new session
    ///
    /// Draws a unique name, queues the greeting and joins the default room.
    pub async fn connect(state: ChatState, inbox: Inbox) -> Result<Self, AppError> {
        let name = state.names.issue()?;

        let default_room = &state.config.default_room;
        let room = match state.registry.find(default_room).await {
            Ok(Some(room)) => room,
            Ok(None) => {
                state.names.release(&name);
                return Err(AppError::RoomNotFound(default_room.clone()));
            }
            Err(e) => {
                state.names.release(&name);
                return Err(e);
            }
        };

        let session = Session {
            id: SessionId::new(),
            name,
            room,
            inbox,
            state,
        };

        if let Err(e) = session.enter_default_room().await {
            session.state.names.release(&session.name);
            return Err(e);
        }

        info!("Session {} connected as '{}'", session.id, session.name);
        Ok(session)
    }

    async fn enter_default_room(&self) -> Result<(), AppError> {
        self.reply(ServerMessage::Greeting {
            name: self.name.clone(),
            room: self.room.name().to_string(),
        })
        .await?;
        self.room.join(self.participant()).await
    }

    pub fn id(&self) -> SessionId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn room(&self) -> &RoomHandle {
        &self.room
    }

    /// Interpret one inbound line
    ///
    /// Protocol and state errors are written back to the sender and the
    /// session continues; only fatal errors are returned.
    pub async fn handle_line(&mut self, line: &str) -> Result<Flow, AppError> {
        let result = match ClientMessage::parse(line) {
            Ok(msg) => self.dispatch(msg).await,
            Err(e) => Err(e),
        };

        match result {
            Ok(flow) => Ok(flow),
            Err(e) => {
                self.report(e).await?;
                Ok(Flow::Continue)
            }
        }
    }

    /// Send a non-fatal error back to the sender; fatal errors pass through
    pub async fn report(&self, err: AppError) -> Result<(), AppError> {
        if err.is_fatal() {
            return Err(err);
        }
        debug!("Session {} protocol error: {}", self.id, err);
        self.reply(ServerMessage::from(err)).await
    }

    async fn dispatch(&mut self, msg: ClientMessage) -> Result<Flow, AppError> {
        match msg {
            ClientMessage::Empty => {}
            ClientMessage::Broadcast { text } => {
                self.room
                    .post(Outbound::chat(self.id, &self.name, &text))
                    .await;
            }
            ClientMessage::Private { addressed } => self.send_private(addressed).await?,
            ClientMessage::Command(cmd) => return self.run_command(cmd).await,
        }
        Ok(Flow::Continue)
    }

    async fn run_command(&mut self, cmd: Command) -> Result<Flow, AppError> {
        match cmd {
            Command::Quit => {
                info!("{} has left the chat", self.name);
                return Ok(Flow::Quit);
            }
            Command::Help => self.reply(ServerMessage::Help).await?,
            Command::Rooms => self.list_rooms().await?,
            Command::People => {
                let names = self.room.members().await?;
                self.reply(ServerMessage::People(names)).await?;
            }
            Command::Join { room } => self.join_room(&room).await?,
            Command::Create { room } => self.create_room(&room).await?,
            Command::Rename { name } => self.rename(name).await?,
        }
        Ok(Flow::Continue)
    }

    async fn list_rooms(&self) -> Result<(), AppError> {
        let rooms = self.state.registry.list().await?;
        let mut summaries = Vec::with_capacity(rooms.len());
        for room in rooms {
            summaries.push(RoomSummary {
                name: room.name().to_string(),
                members: room.member_count().await?,
            });
        }
        self.reply(ServerMessage::RoomList(summaries)).await
    }

    async fn join_room(&mut self, name: &str) -> Result<(), AppError> {
        let room = self
            .state
            .registry
            .find(name)
            .await?
            .ok_or_else(|| AppError::RoomNotFound(name.to_string()))?;

        if room.same_room(&self.room) {
            return Err(AppError::AlreadyInRoom(name.to_string()));
        }
        self.move_to(room).await
    }

    async fn create_room(&mut self, name: &str) -> Result<(), AppError> {
        let room = self.state.registry.create(name).await?;
        info!("{} created room {}", self.name, name);
        self.move_to(room).await
    }

    /// Leave the current room and join `room`
    async fn move_to(&mut self, room: RoomHandle) -> Result<(), AppError> {
        self.room.leave(self.id).await?;
        self.reply(ServerMessage::Welcome {
            room: room.name().to_string(),
        })
        .await?;
        room.join(self.participant()).await?;

        debug!("{} moved from {} to {}", self.name, self.room.name(), room.name());
        self.room = room;
        Ok(())
    }

    async fn rename(&mut self, new_name: String) -> Result<(), AppError> {
        validate_display_name(&new_name, self.state.config.max_display_name_length)?;

        if new_name != self.name {
            if !self.state.names.try_reserve(&new_name) {
                return Err(AppError::NameTaken(new_name));
            }
            self.state.names.release(&self.name);

            let old = std::mem::replace(&mut self.name, new_name.clone());
            self.room.rename(self.id, new_name.clone()).await?;
            info!("{} is now {}", old, new_name);
        }

        self.reply(ServerMessage::Renamed { name: new_name }).await
    }

    /// Deliver `@name text` to one member of the current room
    async fn send_private(&self, addressed: String) -> Result<(), AppError> {
        let Some(recipient) = self.room.resolve(addressed.clone()).await? else {
            let name = addressed.split_whitespace().next().unwrap_or_default();
            return Err(AppError::RecipientNotFound(name.to_string()));
        };

        if recipient.text.is_empty() {
            return Err(AppError::MissingArgument(PRIVATE_USAGE));
        }

        let line = ServerMessage::Private {
            from: self.name.clone(),
            text: recipient.text,
        };
        if let Err(e) = deliver(
            &recipient.inbox,
            line.into(),
            self.state.config.delivery_timeout,
        )
        .await
        {
            warn!("Private message to {} dropped: {}", recipient.name, e);
        }
        Ok(())
    }

    /// Queue a line on this session's own inbox
    ///
    /// Subject to the same delivery timeout as room traffic, so a client
    /// that stops reading can't wedge its own inbound pump.
    async fn reply(&self, msg: ServerMessage) -> Result<(), AppError> {
        match deliver(&self.inbox, msg.into(), self.state.config.delivery_timeout).await {
            Ok(()) => Ok(()),
            Err(SendError::TimedOut) => {
                warn!("Inbox of session {} is full, dropping reply", self.id);
                Ok(())
            }
            Err(e) => Err(e.into()),
        }
    }

    fn participant(&self) -> Participant {
        Participant {
            id: self.id,
            name: self.name.clone(),
            inbox: self.inbox.clone(),
        }
    }

    /// Leave the current room and give the display name back
    pub async fn close(self) {
        self.state.names.release(&self.name);
        if let Err(e) = self.room.leave(self.id).await {
            warn!("Session {} could not leave {}: {}", self.id, self.room.name(), e);
        }
        info!("Session {} ('{}') closed", self.id, self.name);
    }
}
