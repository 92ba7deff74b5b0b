//! Connection handler
//!
//! Drives one client: the inbound pump reads lines and feeds them to the
//! session, the outbound pump drains the session inbox onto the socket.
//! A per-session `CancellationToken` is the single termination signal;
//! whichever pump fails first cancels it and both stop.

use std::time::Duration;

use futures_util::StreamExt;
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};
use tokio::sync::mpsc;
use tokio_util::codec::FramedRead;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::codec::{ChatLineCodec, Inbound};
use crate::error::AppError;
use crate::message::Outbound;
use crate::server::ChatState;
use crate::session::{Flow, Session};
use crate::types::SessionId;

/// Handle a new connection
///
/// Registers a session, runs both pumps until quit, EOF or an I/O error,
/// then removes the session from its room and closes the stream.
pub async fn handle_connection<S>(
    stream: S,
    peer: String,
    state: ChatState,
) -> Result<(), AppError>
where
    S: AsyncRead + AsyncWrite + Send + 'static,
{
    let (reader, writer) = tokio::io::split(stream);
    let mut lines = FramedRead::new(reader, ChatLineCodec::new(state.config.max_line_length));

    // Channel for room/peer -> client items
    let (inbox_tx, inbox_rx) = mpsc::channel::<Outbound>(state.config.inbox_capacity);
    let flush_timeout = state.config.flush_timeout;

    let mut session = Session::connect(state, inbox_tx).await?;
    info!("Session {} ('{}') attached to {}", session.id(), session.name(), peer);

    let shutdown = CancellationToken::new();
    let write_task = tokio::spawn(outbound_pump(
        writer,
        inbox_rx,
        session.id(),
        shutdown.clone(),
        flush_timeout,
    ));

    // Inbound pump
    let result = loop {
        let frame = tokio::select! {
            _ = shutdown.cancelled() => {
                debug!("Outbound pump stopped, ending session {}", session.id());
                break Ok(());
            }
            frame = lines.next() => frame,
        };

        match frame {
            Some(Ok(Inbound::Line(line))) => match session.handle_line(&line).await {
                Ok(Flow::Continue) => {}
                Ok(Flow::Quit) => break Ok(()),
                Err(e) => break Err(e),
            },
            Some(Ok(Inbound::TooLong)) => {
                if let Err(e) = session.report(AppError::LineTooLong).await {
                    break Err(e);
                }
            }
            Some(Err(e)) => {
                debug!("Read failed for {}: {}", peer, e);
                break Err(e.into());
            }
            None => {
                debug!("{} closed the connection", peer);
                break Ok(());
            }
        }
    };

    session.close().await;
    shutdown.cancel();
    // Bounded by the flush timeout inside the pump
    let _ = write_task.await;

    info!("Connection {} closed", peer);
    result
}

/// Drain the inbox onto the socket, then close the write half
///
/// Items already queued when the session is cancelled are still written,
/// for at most `flush_timeout`. A write failure cancels the session.
async fn outbound_pump<W>(
    mut writer: W,
    mut inbox: mpsc::Receiver<Outbound>,
    id: SessionId,
    shutdown: CancellationToken,
    flush_timeout: Duration,
) where
    W: AsyncWrite + Unpin,
{
    let give_up = async {
        shutdown.cancelled().await;
        tokio::time::sleep(flush_timeout).await;
    };

    tokio::select! {
        _ = write_items(&mut writer, &mut inbox, id, &shutdown) => {}
        _ = give_up => {
            warn!("Session {} stopped reading, discarding unsent output", id);
        }
    }

    if tokio::time::timeout(flush_timeout, writer.shutdown())
        .await
        .is_err()
    {
        debug!("Shutdown of session {} timed out", id);
    }
    debug!("Write task ended for session {}", id);
}

/// Write inbox items until the inbox is empty after cancellation, or closed
async fn write_items<W>(
    writer: &mut W,
    inbox: &mut mpsc::Receiver<Outbound>,
    id: SessionId,
    shutdown: &CancellationToken,
) where
    W: AsyncWrite + Unpin,
{
    loop {
        let item = tokio::select! {
            biased;
            item = inbox.recv() => match item {
                Some(item) => item,
                None => break,
            },
            _ = shutdown.cancelled() => break,
        };

        let Some(line) = item.render_for(id) else {
            continue;
        };

        if let Err(e) = writer.write_all(line.as_bytes()).await {
            warn!("Couldn't send message to session {}: {}", id, e);
            shutdown.cancel();
            break;
        }
    }
}

#[cfg(test)]
mod tests {
    use tokio::io::AsyncReadExt;

    use super::*;
    use crate::message::ServerMessage;

    const FLUSH: Duration = Duration::from_millis(100);

    fn line(text: &str) -> Outbound {
        Outbound::Line(text.to_string())
    }

    #[tokio::test]
    async fn test_outbound_pump_personalizes_items() {
        let (mut client, server) = tokio::io::duplex(1024);
        let (tx, rx) = mpsc::channel(8);
        let id = SessionId::new();
        let shutdown = CancellationToken::new();
        let task = tokio::spawn(outbound_pump(server, rx, id, shutdown.clone(), FLUSH));

        tx.send(Outbound::joined(id, "Bold Yak")).await.unwrap();
        tx.send(Outbound::chat(id, "Bold Yak", "hi")).await.unwrap();
        tx.send(Outbound::chat(SessionId::new(), "Calm Emu", "yo"))
            .await
            .unwrap();
        tx.send(ServerMessage::Left {
            name: "Calm Emu".to_string(),
        }
        .into())
        .await
        .unwrap();
        drop(tx);
        task.await.unwrap();

        let mut written = String::new();
        client.read_to_string(&mut written).await.unwrap();
        assert_eq!(
            written,
            "You: hi\nCalm Emu: yo\n*** Calm Emu has left the room ***\n"
        );
    }

    #[tokio::test]
    async fn test_outbound_pump_flushes_queued_items_on_cancel() {
        let (mut client, server) = tokio::io::duplex(1024);
        let (tx, rx) = mpsc::channel(8);
        let shutdown = CancellationToken::new();

        tx.send(line("1. zero (1 person)\n")).await.unwrap();
        tx.send(line("Welcome to lobby\n")).await.unwrap();
        // Cancelled before the pump even starts; the inbox sender stays open
        shutdown.cancel();
        let task = tokio::spawn(outbound_pump(server, rx, SessionId::new(), shutdown, FLUSH));
        task.await.unwrap();

        let mut written = String::new();
        client.read_to_string(&mut written).await.unwrap();
        assert_eq!(written, "1. zero (1 person)\nWelcome to lobby\n");
        drop(tx);
    }

    #[tokio::test]
    async fn test_outbound_pump_gives_up_on_stalled_reader() {
        // Room for a few bytes only, and the client never reads
        let (_client, server) = tokio::io::duplex(8);
        let (tx, rx) = mpsc::channel(8);
        let shutdown = CancellationToken::new();
        let task = tokio::spawn(outbound_pump(
            server,
            rx,
            SessionId::new(),
            shutdown.clone(),
            FLUSH,
        ));

        tx.send(line("this line does not fit\n")).await.unwrap();
        tokio::time::sleep(Duration::from_millis(20)).await;
        shutdown.cancel();

        tokio::time::timeout(Duration::from_secs(2), task)
            .await
            .expect("pump did not stop after the flush timeout")
            .unwrap();
    }

    #[tokio::test]
    async fn test_outbound_pump_write_failure_cancels_session() {
        let (client, server) = tokio::io::duplex(64);
        drop(client);

        let (tx, rx) = mpsc::channel(4);
        let shutdown = CancellationToken::new();
        let task = tokio::spawn(outbound_pump(
            server,
            rx,
            SessionId::new(),
            shutdown.clone(),
            FLUSH,
        ));

        tx.send(line("Calm Emu: hi\n")).await.unwrap();
        task.await.unwrap();
        assert!(shutdown.is_cancelled());
    }
}
