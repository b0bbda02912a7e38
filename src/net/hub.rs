//! Broadcast fan-out to every live session

use std::net::SocketAddr;
use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::{broadcast, mpsc};
use tracing::trace;
use uuid::Uuid;

use crate::util::time::unix_millis;

use super::protocol::ServerFrame;

/// Frames addressed to a single session
pub type Outbox = mpsc::UnboundedSender<ServerFrame>;

/// Frames buffered per subscriber before a slow client starts skipping
pub const BROADCAST_CAPACITY: usize = 1024;

/// A connected session
#[derive(Debug, Clone)]
pub struct SessionInfo {
    pub session_id: Uuid,
    pub peer: SocketAddr,
    pub connected_at: u64,
}

/// Fan-out of frames to all sessions.
///
/// Sending never waits on a client: each session drains its own receiver,
/// and a receiver that falls too far behind skips the oldest frames.
#[derive(Clone)]
pub struct BroadcastHub {
    tx: broadcast::Sender<ServerFrame>,
    sessions: Arc<DashMap<Uuid, SessionInfo>>,
}

impl BroadcastHub {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self {
            tx,
            sessions: Arc::new(DashMap::new()),
        }
    }

    /// Receive every frame broadcast from now on
    pub fn subscribe(&self) -> broadcast::Receiver<ServerFrame> {
        self.tx.subscribe()
    }

    /// Send to all subscribers; frames sent with nobody listening are dropped
    pub fn broadcast(&self, frame: ServerFrame) {
        if self.tx.send(frame).is_err() {
            trace!("Broadcast with no subscribers");
        }
    }

    /// Admit a session unless `max_sessions` are already connected
    pub fn try_join(&self, session_id: Uuid, peer: SocketAddr, max_sessions: usize) -> bool {
        if self.sessions.len() >= max_sessions {
            return false;
        }
        self.sessions.insert(
            session_id,
            SessionInfo {
                session_id,
                peer,
                connected_at: unix_millis(),
            },
        );
        true
    }

    pub fn leave(&self, session_id: Uuid) -> Option<SessionInfo> {
        self.sessions.remove(&session_id).map(|(_, info)| info)
    }

    pub fn connected(&self) -> usize {
        self.sessions.len()
    }
}

impl Default for BroadcastHub {
    fn default() -> Self {
        Self::new(BROADCAST_CAPACITY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn peer() -> SocketAddr {
        SocketAddr::from(([127, 0, 0, 1], 40_000))
    }

    #[test]
    fn session_cap_is_enforced() {
        let hub = BroadcastHub::default();
        let first = Uuid::new_v4();
        assert!(hub.try_join(first, peer(), 2));
        assert!(hub.try_join(Uuid::new_v4(), peer(), 2));
        assert!(!hub.try_join(Uuid::new_v4(), peer(), 2));

        assert!(hub.leave(first).is_some());
        assert!(hub.leave(first).is_none());
        assert_eq!(hub.connected(), 1);
        assert!(hub.try_join(Uuid::new_v4(), peer(), 2));
    }

    #[test]
    fn every_subscriber_sees_frames_in_order() {
        let hub = BroadcastHub::default();
        let mut a = hub.subscribe();
        let mut b = hub.subscribe();

        hub.broadcast(ServerFrame::GameStarted);
        hub.broadcast(ServerFrame::GameResumed);

        for rx in [&mut a, &mut b] {
            assert_eq!(rx.try_recv().unwrap(), ServerFrame::GameStarted);
            assert_eq!(rx.try_recv().unwrap(), ServerFrame::GameResumed);
            assert!(rx.try_recv().is_err());
        }
    }

    #[test]
    fn broadcast_without_listeners_is_harmless() {
        let hub = BroadcastHub::default();
        hub.broadcast(ServerFrame::WaitingPlayers);
    }
}
