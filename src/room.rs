//! Room actor
//!
//! Each room runs as its own task that owns the participant list and drains
//! a single command queue. Membership changes, posts and queries are all
//! messages on that queue, so the fan-out loop never races a join or leave.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc::error::{SendTimeoutError, TrySendError};
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info, warn};

use crate::error::{AppError, SendError};
use crate::message::{Outbound, ServerMessage};
use crate::types::SessionId;

/// Sending half of a session inbox
pub type Inbox = mpsc::Sender<Outbound>;

/// A session as seen by a room
#[derive(Debug, Clone)]
pub struct Participant {
    pub id: SessionId,
    pub name: String,
    pub inbox: Inbox,
}

/// Recipient of a private message, resolved from the addressed text
#[derive(Debug, Clone)]
pub struct Recipient {
    pub name: String,
    pub inbox: Inbox,
    /// Message text with the recipient name removed
    pub text: String,
}

/// Commands handled by the room task
#[derive(Debug)]
pub enum RoomCommand {
    /// Add a participant and announce it
    Join { participant: Participant },
    /// Remove a participant and announce it
    Leave { id: SessionId },
    /// Update the name stored for a participant
    Rename { id: SessionId, name: String },
    /// Fan an item out to every participant
    Post { item: Outbound },
    /// Resolve `@name text` against the participant list
    Resolve {
        addressed: String,
        reply: oneshot::Sender<Option<Recipient>>,
    },
    /// Participant names in join order
    Members { reply: oneshot::Sender<Vec<String>> },
}

/// Deliver one item to an inbox, waiting at most `timeout` for space
pub async fn deliver(inbox: &Inbox, item: Outbound, timeout: Duration) -> Result<(), SendError> {
    inbox
        .send_timeout(item, timeout)
        .await
        .map_err(|e| match e {
            SendTimeoutError::Timeout(_) => SendError::TimedOut,
            SendTimeoutError::Closed(_) => SendError::ChannelClosed,
        })
}

/// Room state owned by the room task
#[derive(Debug)]
pub struct Room {
    /// Room name
    pub name: Arc<str>,
    /// Participants in join order
    participants: Vec<Participant>,
    /// Participants whose last delivery timed out
    lagging: HashSet<SessionId>,
    /// How long fan-out waits on one full inbox
    delivery_timeout: Duration,
    /// Command receiver channel
    receiver: mpsc::Receiver<RoomCommand>,
}

impl Room {
    /// Spawn a room task and return its handle
    ///
    /// The task runs until every handle is dropped.
    pub fn spawn(name: &str, queue_capacity: usize, delivery_timeout: Duration) -> RoomHandle {
        let (sender, receiver) = mpsc::channel(queue_capacity);
        let name: Arc<str> = Arc::from(name);
        let room = Room {
            name: Arc::clone(&name),
            participants: Vec::new(),
            lagging: HashSet::new(),
            delivery_timeout,
            receiver,
        };
        tokio::spawn(room.run());

        info!("Created new room {}", name);
        RoomHandle { name, sender }
    }

    /// Run the room event loop
    async fn run(mut self) {
        while let Some(cmd) = self.receiver.recv().await {
            self.handle_command(cmd).await;
        }
        debug!("Room {} shutting down", self.name);
    }

    /// Process a single command
    async fn handle_command(&mut self, cmd: RoomCommand) {
        match cmd {
            RoomCommand::Join { participant } => {
                let announcement = Outbound::joined(participant.id, &participant.name);
                let name = participant.name.clone();
                if self.add(participant) {
                    info!("{} joined room {}", name, self.name);
                    self.fan_out(announcement).await;
                }
            }
            RoomCommand::Leave { id } => {
                if let Some(participant) = self.remove(id) {
                    info!("{} left room {}", participant.name, self.name);
                    self.fan_out(Outbound::from(ServerMessage::Left {
                        name: participant.name,
                    }))
                    .await;
                }
            }
            RoomCommand::Rename { id, name } => {
                self.rename(id, name);
            }
            RoomCommand::Post { item } => {
                self.fan_out(item).await;
            }
            RoomCommand::Resolve { addressed, reply } => {
                let _ = reply.send(self.resolve(&addressed));
            }
            RoomCommand::Members { reply } => {
                let _ = reply.send(self.member_names());
            }
        }
    }

    /// Write `item` into every participant's inbox, in join order
    ///
    /// A full inbox holds up the rest of the room for at most
    /// `delivery_timeout`, after which the item is dropped for that
    /// participant only and it is marked as lagging. Lagging participants
    /// are never waited on: items that don't fit are dropped straight away
    /// until their inbox has room again.
    async fn fan_out(&mut self, item: Outbound) {
        for participant in &self.participants {
            if self.lagging.contains(&participant.id) {
                match participant.inbox.try_send(item.clone()) {
                    Ok(()) => {
                        self.lagging.remove(&participant.id);
                        info!("{} caught up in room {}", participant.name, self.name);
                    }
                    Err(TrySendError::Full(_)) => {
                        debug!("Skipping lagging participant {}", participant.name);
                    }
                    Err(TrySendError::Closed(_)) => {}
                }
                continue;
            }

            match deliver(&participant.inbox, item.clone(), self.delivery_timeout).await {
                Ok(()) => {}
                Err(SendError::TimedOut) => {
                    warn!(
                        "Dropping message for slow participant {} in room {}",
                        participant.name, self.name
                    );
                    self.lagging.insert(participant.id);
                }
                Err(SendError::ChannelClosed) => {
                    debug!(
                        "Inbox of {} closed, skipping delivery in room {}",
                        participant.name, self.name
                    );
                }
            }
        }
    }

    /// Add a participant
    ///
    /// Returns false if the session is already a member.
    fn add(&mut self, participant: Participant) -> bool {
        if self.contains(participant.id) {
            return false;
        }
        self.participants.push(participant);
        true
    }

    /// Remove a participant, returning it if it was a member
    fn remove(&mut self, id: SessionId) -> Option<Participant> {
        let idx = self.participants.iter().position(|p| p.id == id)?;
        self.lagging.remove(&id);
        Some(self.participants.remove(idx))
    }

    fn rename(&mut self, id: SessionId, name: String) {
        if let Some(participant) = self.participants.iter_mut().find(|p| p.id == id) {
            participant.name = name;
        }
    }

    /// Check if a session is in this room
    fn contains(&self, id: SessionId) -> bool {
        self.participants.iter().any(|p| p.id == id)
    }

    fn member_names(&self) -> Vec<String> {
        self.participants.iter().map(|p| p.name.clone()).collect()
    }

    /// Find the participant `addressed` is aimed at
    ///
    /// Names may contain spaces, so the longest name that `addressed`
    /// starts with (followed by a space or the end of the text) wins.
    fn resolve(&self, addressed: &str) -> Option<Recipient> {
        self.participants
            .iter()
            .filter_map(|p| {
                let rest = addressed.strip_prefix(p.name.as_str())?;
                if rest.is_empty() || rest.starts_with(' ') {
                    Some((p, rest.trim_start()))
                } else {
                    None
                }
            })
            .max_by_key(|(p, _)| p.name.len())
            .map(|(p, text)| Recipient {
                name: p.name.clone(),
                inbox: p.inbox.clone(),
                text: text.to_string(),
            })
    }
}

/// Cloneable handle to a room task
#[derive(Debug, Clone)]
pub struct RoomHandle {
    name: Arc<str>,
    sender: mpsc::Sender<RoomCommand>,
}

impl RoomHandle {
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Whether both handles point at the same room task
    pub fn same_room(&self, other: &RoomHandle) -> bool {
        self.sender.same_channel(&other.sender)
    }

    /// Queue an item for every current participant
    ///
    /// Never fails; an item posted to an empty room reaches no one.
    pub async fn post(&self, item: Outbound) {
        if self.sender.send(RoomCommand::Post { item }).await.is_err() {
            warn!("Room {} is gone, dropping post", self.name);
        }
    }

    pub async fn join(&self, participant: Participant) -> Result<(), AppError> {
        self.send(RoomCommand::Join { participant }).await
    }

    pub async fn leave(&self, id: SessionId) -> Result<(), AppError> {
        self.send(RoomCommand::Leave { id }).await
    }

    pub async fn rename(&self, id: SessionId, name: String) -> Result<(), AppError> {
        self.send(RoomCommand::Rename { id, name }).await
    }

    /// Resolve the recipient of a private message among current members
    pub async fn resolve(&self, addressed: String) -> Result<Option<Recipient>, AppError> {
        let (reply, rx) = oneshot::channel();
        self.send(RoomCommand::Resolve { addressed, reply }).await?;
        rx.await.map_err(|_| AppError::ChannelSend)
    }

    /// Participant names in join order
    pub async fn members(&self) -> Result<Vec<String>, AppError> {
        let (reply, rx) = oneshot::channel();
        self.send(RoomCommand::Members { reply }).await?;
        rx.await.map_err(|_| AppError::ChannelSend)
    }

    pub async fn member_count(&self) -> Result<usize, AppError> {
        Ok(self.members().await?.len())
    }

    async fn send(&self, cmd: RoomCommand) -> Result<(), AppError> {
        self.sender
            .send(cmd)
            .await
            .map_err(|_| AppError::ChannelSend)
    }
}

#[cfg(test)]
mod tests {
    use std::time::Instant;

    use super::*;

    const TIMEOUT: Duration = Duration::from_millis(50);

    fn participant(name: &str, capacity: usize) -> (Participant, mpsc::Receiver<Outbound>) {
        let (inbox, rx) = mpsc::channel(capacity);
        let participant = Participant {
            id: SessionId::new(),
            name: name.to_string(),
            inbox,
        };
        (participant, rx)
    }

    fn bare_room() -> Room {
        let (_sender, receiver) = mpsc::channel(8);
        Room {
            name: Arc::from("test"),
            participants: Vec::new(),
            lagging: HashSet::new(),
            delivery_timeout: TIMEOUT,
            receiver,
        }
    }

    fn line(text: &str) -> Outbound {
        Outbound::Line(text.to_string())
    }

    /// Everything queued so far, as the shared text
    fn queued(rx: &mut mpsc::Receiver<Outbound>) -> Vec<String> {
        std::iter::from_fn(|| rx.try_recv().ok())
            .map(|item| item.line().to_string())
            .collect()
    }

    #[test]
    fn test_add_is_idempotent() {
        let mut room = bare_room();
        let (alice, _rx) = participant("Alice", 4);

        assert!(room.add(alice.clone()));
        assert!(!room.add(alice.clone()));
        assert_eq!(room.member_names(), vec!["Alice"]);

        assert!(room.remove(alice.id).is_some());
        assert!(room.remove(alice.id).is_none());
        assert!(room.member_names().is_empty());
    }

    #[test]
    fn test_resolve_prefers_longest_name() {
        let mut room = bare_room();
        let (short, _rx1) = participant("Bold", 4);
        let (long, _rx2) = participant("Bold Yak", 4);
        room.add(short);
        room.add(long);

        let recipient = room.resolve("Bold Yak hi there").unwrap();
        assert_eq!(recipient.name, "Bold Yak");
        assert_eq!(recipient.text, "hi there");

        let recipient = room.resolve("Bold Yakety").unwrap();
        assert_eq!(recipient.name, "Bold");
        assert_eq!(recipient.text, "Yakety");

        assert!(room.resolve("Boldness").is_none());
    }

    #[test]
    fn test_rename_updates_member_list() {
        let mut room = bare_room();
        let (alice, _rx) = participant("Alice", 4);
        let id = alice.id;
        room.add(alice);

        room.rename(id, "Alicia".to_string());
        assert_eq!(room.member_names(), vec!["Alicia"]);
    }

    #[tokio::test]
    async fn test_join_announces_to_members_in_order() {
        let room = Room::spawn("lobby", 8, TIMEOUT);
        let (alice, mut alice_rx) = participant("Alice", 8);
        let (bob, mut bob_rx) = participant("Bob", 8);
        let alice_id = alice.id;

        room.join(alice).await.unwrap();
        room.join(bob).await.unwrap();
        assert_eq!(room.members().await.unwrap(), vec!["Alice", "Bob"]);

        // Alice's own announcement is queued but marked as hers
        let own = alice_rx.try_recv().unwrap();
        assert_eq!(own.line(), "*** Alice has joined the room ***\n");
        assert_eq!(own.render_for(alice_id), None);

        assert_eq!(queued(&mut alice_rx), vec!["*** Bob has joined the room ***\n"]);
        assert_eq!(queued(&mut bob_rx), vec!["*** Bob has joined the room ***\n"]);
    }

    #[tokio::test]
    async fn test_post_is_fifo_and_skips_leavers() {
        let room = Room::spawn("lobby", 8, TIMEOUT);
        let (alice, mut alice_rx) = participant("Alice", 8);
        let (bob, mut bob_rx) = participant("Bob", 8);
        let bob_id = bob.id;

        room.join(alice).await.unwrap();
        room.join(bob).await.unwrap();
        room.post(line("Alice: one\n")).await;
        room.leave(bob_id).await.unwrap();
        room.post(line("Alice: two\n")).await;
        assert_eq!(room.member_count().await.unwrap(), 1);

        assert_eq!(
            queued(&mut alice_rx),
            vec![
                "*** Alice has joined the room ***\n",
                "*** Bob has joined the room ***\n",
                "Alice: one\n",
                "*** Bob has left the room ***\n",
                "Alice: two\n",
            ]
        );
        assert_eq!(
            queued(&mut bob_rx),
            vec!["*** Bob has joined the room ***\n", "Alice: one\n"]
        );
    }

    #[tokio::test]
    async fn test_slow_participant_does_not_stall_room() {
        let room = Room::spawn("lobby", 8, TIMEOUT);
        // Capacity 1 and never drained
        let (slow, _slow_rx) = participant("Slow", 1);
        let (fast, mut fast_rx) = participant("Fast", 8);

        room.join(slow).await.unwrap();
        room.join(fast).await.unwrap();
        for i in 0..3 {
            room.post(line(&format!("Slow: {}\n", i))).await;
        }

        let mut received = Vec::new();
        while received.len() < 4 {
            let item = tokio::time::timeout(Duration::from_secs(2), fast_rx.recv())
                .await
                .unwrap()
                .unwrap();
            received.push(item.line().to_string());
        }
        assert_eq!(received[0], "*** Fast has joined the room ***\n");
        assert_eq!(received[3], "Slow: 2\n");
    }

    #[tokio::test]
    async fn test_lagging_participant_costs_one_timeout() {
        let timeout = Duration::from_millis(300);
        let room = Room::spawn("lobby", 64, timeout);
        // Fills up with its own join announcement
        let (slow, mut slow_rx) = participant("Slow", 1);
        let (fast, mut fast_rx) = participant("Fast", 64);

        let started = Instant::now();
        room.join(slow).await.unwrap();
        room.join(fast).await.unwrap();
        for i in 0..10 {
            room.post(line(&format!("Fast: {}\n", i))).await;
        }
        room.members().await.unwrap();

        // One timeout for the first miss, none after
        assert!(started.elapsed() < timeout * 3);
        let lines = queued(&mut fast_rx);
        assert_eq!(lines.len(), 11);
        assert_eq!(lines[10], "Fast: 9\n");

        // Once drained, the participant gets new items again
        assert_eq!(queued(&mut slow_rx), vec!["*** Slow has joined the room ***\n"]);
        room.post(line("Fast: back?\n")).await;
        room.members().await.unwrap();
        assert_eq!(queued(&mut slow_rx), vec!["Fast: back?\n"]);
    }

    #[tokio::test]
    async fn test_post_to_empty_room() {
        let room = Room::spawn("empty", 8, TIMEOUT);
        room.post(line("nobody: here\n")).await;
        assert_eq!(room.member_count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_same_room() {
        let a = Room::spawn("a", 8, TIMEOUT);
        let b = Room::spawn("b", 8, TIMEOUT);
        assert!(a.same_room(&a.clone()));
        assert!(!a.same_room(&b));
    }
}
