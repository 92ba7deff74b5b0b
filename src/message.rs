//! Line protocol definitions
//!
//! Inbound lines are classified into commands (`:` prefix), private
//! messages (`@` prefix) and plain broadcasts. Outbound text is rendered
//! from `ServerMessage` through `Display`; every rendered item ends in `\n`.

use std::fmt;

use crate::error::AppError;
use crate::types::SessionId;

/// Static help text returned by `:help`
pub const HELP_TEXT: &str = r#"HELP (All commands must start with a ":")
"quit"      Quit the server
"rooms"     List all rooms
"create"    Create a new room
"join"      Leave current room and join a new one
"people"    List all the people in your room
"rename"    Change your name
"help"      Bring up the help menu
Send "@<name> <message>" to message someone in your room privately
"#;

/// Usage strings for commands that take an argument
pub const JOIN_USAGE: &str = ":join <room>";
pub const CREATE_USAGE: &str = ":create <room>";
pub const RENAME_USAGE: &str = ":rename <name>";
pub const PRIVATE_USAGE: &str = "@<name> <message>";

/// Commands typed by a session
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Quit,
    Help,
    Rooms,
    People,
    Join { room: String },
    Create { room: String },
    Rename { name: String },
}

/// A classified inbound line
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientMessage {
    /// `:`-prefixed command
    Command(Command),
    /// `@`-prefixed private message; `addressed` is everything after the `@`
    /// and still holds the recipient name, which may contain spaces
    Private { addressed: String },
    /// Any other line
    Broadcast { text: String },
    /// Blank line, ignored
    Empty,
}

impl ClientMessage {
    /// Classify and parse a single line with its terminator already stripped
    pub fn parse(line: &str) -> Result<Self, AppError> {
        if line.trim().is_empty() {
            return Ok(ClientMessage::Empty);
        }

        if let Some(rest) = line.strip_prefix('@') {
            let addressed = rest.trim_end();
            if addressed.trim().is_empty() {
                return Err(AppError::MissingArgument(PRIVATE_USAGE));
            }
            return Ok(ClientMessage::Private {
                addressed: addressed.to_string(),
            });
        }

        if line.starts_with(':') {
            return Command::parse(line).map(ClientMessage::Command);
        }

        Ok(ClientMessage::Broadcast {
            text: line.to_string(),
        })
    }
}

impl Command {
    /// Parse a `:`-prefixed line
    ///
    /// The command word is matched exactly. The argument of `:join`,
    /// `:create` and `:rename` is the trimmed remainder of the line.
    pub fn parse(line: &str) -> Result<Self, AppError> {
        let line = line.trim();
        let (word, args) = line
            .split_once(char::is_whitespace)
            .map(|(w, a)| (w, a.trim()))
            .unwrap_or((line, ""));

        let required = |usage: &'static str| {
            if args.is_empty() {
                Err(AppError::MissingArgument(usage))
            } else {
                Ok(args.to_string())
            }
        };

        match word {
            ":quit" => Ok(Command::Quit),
            ":help" => Ok(Command::Help),
            ":rooms" => Ok(Command::Rooms),
            ":people" => Ok(Command::People),
            ":join" => Ok(Command::Join {
                room: required(JOIN_USAGE)?,
            }),
            ":create" => Ok(Command::Create {
                room: required(CREATE_USAGE)?,
            }),
            ":rename" => Ok(Command::Rename {
                name: required(RENAME_USAGE)?,
            }),
            other => Err(AppError::UnknownCommand(
                other.trim_start_matches(':').to_string(),
            )),
        }
    }
}

/// Check a room name: non-empty, bounded, a single printable word
pub fn validate_room_name(name: &str, max_len: usize) -> Result<(), AppError> {
    let valid = !name.is_empty()
        && name.chars().count() <= max_len
        && !name.chars().any(|c| c.is_whitespace() || c.is_control());

    if valid {
        Ok(())
    } else {
        Err(AppError::InvalidRoomName(name.to_string()))
    }
}

/// Check a display name: non-empty, bounded, printable, and not starting
/// with a protocol prefix
pub fn validate_display_name(name: &str, max_len: usize) -> Result<(), AppError> {
    let valid = !name.is_empty()
        && name.chars().count() <= max_len
        && !name.starts_with(['@', ':'])
        && !name.chars().any(char::is_control);

    if valid {
        Ok(())
    } else {
        Err(AppError::InvalidName(name.to_string()))
    }
}

/// Room name and live member count, as listed by `:rooms`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoomSummary {
    pub name: String,
    pub members: usize,
}

/// Server → client text
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServerMessage {
    /// First item every session receives
    Greeting { name: String, room: String },
    /// Sent to a session that just moved into a room
    Welcome { room: String },
    /// Room broadcast
    Chat { from: String, text: String },
    /// Private message, delivered to the recipient only
    Private { from: String, text: String },
    /// Join announcement
    Joined { name: String },
    /// Leave announcement
    Left { name: String },
    /// Rename confirmation
    Renamed { name: String },
    /// Help text
    Help,
    /// Numbered room listing
    RoomList(Vec<RoomSummary>),
    /// Numbered member listing
    People(Vec<String>),
    /// Protocol or state error
    Error(String),
}

impl fmt::Display for ServerMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ServerMessage::Greeting { name, room } => write!(
                f,
                "Hello {}\nYou are now in the default chat room {}.\nType \":help\" to see the list of commands.\n",
                name, room
            ),
            ServerMessage::Welcome { room } => writeln!(f, "Welcome to {}", room),
            ServerMessage::Chat { from, text } => writeln!(f, "{}: {}", from, text),
            ServerMessage::Private { from, text } => writeln!(f, "@{}: {}", from, text),
            ServerMessage::Joined { name } => writeln!(f, "*** {} has joined the room ***", name),
            ServerMessage::Left { name } => writeln!(f, "*** {} has left the room ***", name),
            ServerMessage::Renamed { name } => writeln!(f, "You are now {}", name),
            ServerMessage::Help => f.write_str(HELP_TEXT),
            ServerMessage::RoomList(rooms) => {
                for (idx, room) in rooms.iter().enumerate() {
                    let people = match room.members {
                        1 => "1 person".to_string(),
                        n => format!("{} people", n),
                    };
                    writeln!(f, "{}. {} ({})", idx + 1, room.name, people)?;
                }
                Ok(())
            }
            ServerMessage::People(names) => {
                for (idx, name) in names.iter().enumerate() {
                    writeln!(f, "{}. {}", idx + 1, name)?;
                }
                Ok(())
            }
            ServerMessage::Error(text) => writeln!(f, "{}", text),
        }
    }
}

/// Convert AppError to ServerMessage for client notification
impl From<AppError> for ServerMessage {
    fn from(err: AppError) -> Self {
        let text = match &err {
            AppError::RoomNotFound(room) => {
                format!("\"{}\" does not exist. Type \":rooms\" to list all rooms", room)
            }
            AppError::RoomExists(room) => {
                format!("\"{}\" already exists. Type \":join {}\" to join it", room, room)
            }
            AppError::InvalidRoomName(room) => {
                format!("\"{}\" is not a valid room name. Use a single short word", room)
            }
            AppError::AlreadyInRoom(room) => format!("You are already in {}", room),
            AppError::RecipientNotFound(name) => format!(
                "\"{}\" is not present in this room. Type \":people\" to list all people in this room",
                name
            ),
            AppError::NameTaken(name) => {
                format!("\"{}\" is already taken. Pick another name", name)
            }
            AppError::InvalidName(name) => format!("\"{}\" is not a valid name", name),
            AppError::UnknownCommand(cmd) => format!(
                "\"{}\" is not a valid command. Type \":help\" to list all commands",
                cmd
            ),
            AppError::MissingArgument(usage) => format!("Usage: {}", usage),
            AppError::LineTooLong => "Line too long, message dropped".to_string(),
            // Fatal errors are not typically converted (session closes)
            _ => "Internal error".to_string(),
        };
        ServerMessage::Error(text)
    }
}

/// One item queued in a session inbox
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outbound {
    /// Written the same way to every recipient
    Line(String),
    /// Room line caused by session `origin`
    ///
    /// The origin is shown `own` instead of `line`, or nothing if `own` is `None`.
    Echo {
        origin: SessionId,
        line: String,
        own: Option<String>,
    },
}

impl Outbound {
    /// Broadcast from `origin`, shown to the sender as `You: ...`
    pub fn chat(origin: SessionId, from: &str, text: &str) -> Self {
        let line = ServerMessage::Chat {
            from: from.to_string(),
            text: text.to_string(),
        };
        let own = ServerMessage::Chat {
            from: "You".to_string(),
            text: text.to_string(),
        };
        Outbound::Echo {
            origin,
            line: line.to_string(),
            own: Some(own.to_string()),
        }
    }

    /// Join announcement, hidden from the session that joined
    pub fn joined(origin: SessionId, name: &str) -> Self {
        Outbound::Echo {
            origin,
            line: ServerMessage::Joined {
                name: name.to_string(),
            }
            .to_string(),
            own: None,
        }
    }

    /// The text every other session sees
    pub fn line(&self) -> &str {
        match self {
            Outbound::Line(line) | Outbound::Echo { line, .. } => line,
        }
    }

    /// The text `viewer` should be sent, if any
    pub fn render_for(&self, viewer: SessionId) -> Option<&str> {
        match self {
            Outbound::Echo { origin, own, .. } if *origin == viewer => own.as_deref(),
            other => Some(other.line()),
        }
    }
}

impl From<ServerMessage> for Outbound {
    fn from(msg: ServerMessage) -> Self {
        Outbound::Line(msg.to_string())
    }
}
