//! TCP transport: line protocol, session handling and broadcast fan-out

pub mod hub;
pub mod protocol;
pub mod session;

use std::future::Future;

use tokio::net::TcpListener;
use tracing::{info, warn};

use crate::app::AppState;

pub use hub::{BroadcastHub, Outbox};
pub use protocol::{ClientFrame, GameStateView, PlayerSnapshot, ProtocolError, ServerFrame};

/// Accept connections until `shutdown` resolves, one task per session
pub async fn serve<F>(listener: TcpListener, state: AppState, shutdown: F)
where
    F: Future<Output = ()>,
{
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            accepted = listener.accept() => match accepted {
                Ok((stream, peer)) => {
                    tokio::spawn(session::handle_connection(stream, peer, state.clone()));
                }
                Err(e) => warn!(error = %e, "Failed to accept connection"),
            },
            _ = &mut shutdown => {
                info!(connected = state.hub.connected(), "Accept loop stopped");
                return;
            }
        }
    }
}
