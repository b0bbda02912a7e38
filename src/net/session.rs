//! Per-connection session: one reader loop, one writer task

use std::net::SocketAddr;

use tokio::io::{AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;
use tokio::sync::{broadcast, mpsc};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::app::AppState;

use super::hub::Outbox;
use super::protocol::{ClientFrame, ServerFrame};

/// Drive one client connection until it closes
pub async fn handle_connection(stream: TcpStream, peer: SocketAddr, state: AppState) {
    let session_id = Uuid::new_v4();

    if !state
        .hub
        .try_join(session_id, peer, state.config.max_players)
    {
        warn!(peer = %peer, max_players = state.config.max_players, "Rejecting connection, server full");
        let mut stream = stream;
        let _ = send_frame(&mut stream, &ServerFrame::Error("Server is full".into())).await;
        return;
    }

    info!(session_id = %session_id, peer = %peer, connected = state.hub.connected(), "New connection");
    if let Err(e) = stream.set_nodelay(true) {
        debug!(session_id = %session_id, error = %e, "Failed to set TCP_NODELAY");
    }

    // Subscribe before anything can be broadcast on this session's behalf
    let frames = state.hub.subscribe();
    let (reply_tx, reply_rx) = mpsc::unbounded_channel();
    let (read_half, write_half) = stream.into_split();

    let writer = tokio::spawn(run_writer(session_id, write_half, reply_rx, frames));

    run_reader(session_id, read_half, &reply_tx, &state).await;

    state.controller.disconnect(session_id);
    state.hub.leave(session_id);
    writer.abort();

    info!(session_id = %session_id, peer = %peer, "Connection closed");
}

/// Direct replies take priority over broadcasts so a client always sees the
/// answer to its own command before the state change it caused.
async fn run_writer<W>(
    session_id: Uuid,
    mut sink: W,
    mut replies: mpsc::UnboundedReceiver<ServerFrame>,
    mut frames: broadcast::Receiver<ServerFrame>,
) where
    W: AsyncWrite + Unpin,
{
    loop {
        let frame = tokio::select! {
            biased;
            direct = replies.recv() => match direct {
                Some(frame) => frame,
                None => break,
            },
            shared = frames.recv() => match shared {
                Ok(frame) => frame,
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    warn!(session_id = %session_id, lagged_count = n, "Client lagged, skipped {} frames", n);
                    continue;
                }
                Err(broadcast::error::RecvError::Closed) => {
                    debug!(session_id = %session_id, "Broadcast channel closed");
                    break;
                }
            },
        };

        if let Err(e) = send_frame(&mut sink, &frame).await {
            debug!(session_id = %session_id, error = %e, "Socket write failed");
            break;
        }
    }
}

async fn run_reader(
    session_id: Uuid,
    read_half: tokio::net::tcp::OwnedReadHalf,
    reply: &Outbox,
    state: &AppState,
) {
    let mut lines = BufReader::new(read_half).lines();
    let mut named = false;

    loop {
        let line = match lines.next_line().await {
            Ok(Some(line)) => line,
            Ok(None) => {
                debug!(session_id = %session_id, "Client closed the connection");
                break;
            }
            Err(e) => {
                debug!(session_id = %session_id, error = %e, "Socket read failed");
                break;
            }
        };

        let frame = match line.parse::<ClientFrame>() {
            Ok(frame) => frame,
            Err(e) => {
                warn!(session_id = %session_id, error = %e, line = %line, "Failed to parse client frame");
                continue;
            }
        };

        match (frame, named) {
            (ClientFrame::Name(requested), _) => {
                if let Ok(accepted) = state.controller.register(session_id, &requested, reply) {
                    debug!(session_id = %session_id, player = %accepted, "Session named");
                    named = true;
                }
            }
            (ClientFrame::Leaderboard, _) => {
                let answer = match state.controller.leaderboard().await {
                    Ok(entries) => ServerFrame::Leaderboard(entries),
                    Err(e) => {
                        error!(session_id = %session_id, error = %e, "Leaderboard read failed");
                        ServerFrame::Error("Leaderboard unavailable".into())
                    }
                };
                if reply.send(answer).is_err() {
                    debug!(session_id = %session_id, "Outbox closed before LEADERBOARD reply");
                }
            }
            (command, false) => {
                debug!(session_id = %session_id, command = %command, "Command before NAME dropped");
            }
            (ClientFrame::Ready, true) => state.controller.ready(session_id),
            (ClientFrame::Pause, true) => state.controller.pause(session_id),
            (ClientFrame::Shoot, true) => {
                if !state.controller.shoot(session_id) {
                    debug!(session_id = %session_id, "Shot refused");
                }
            }
            (ClientFrame::GameOverAck, true) => state.controller.acknowledge_game_over(session_id),
        }
    }
}

async fn send_frame<W>(sink: &mut W, frame: &ServerFrame) -> std::io::Result<()>
where
    W: AsyncWrite + Unpin,
{
    let line = format!("{frame}\n");
    sink.write_all(line.as_bytes()).await
}
