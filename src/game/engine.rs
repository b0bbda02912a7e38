//! Simulation engine - target oscillators and projectile flights
//!
//! Each target and each arrow is driven by its own timer task. Tasks never
//! touch shared state directly: every tick goes through the match controller,
//! which applies it to the world under its lock.

use std::sync::Arc;

use dashmap::DashMap;
use tokio::task::{AbortHandle, JoinHandle};
use tracing::{debug, info};

use crate::util::time::tick_interval;

use super::r#match::MatchController;
use super::rules::TargetId;

/// Live projectile flight tasks keyed by arrow id
#[derive(Default)]
pub struct ProjectileSupervisor {
    flights: DashMap<String, AbortHandle>,
}

impl ProjectileSupervisor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn track(&self, projectile_id: String, handle: AbortHandle) {
        self.flights.insert(projectile_id, handle);
    }

    /// Called by a flight once it has resolved
    pub fn finish(&self, projectile_id: &str) {
        self.flights.remove(projectile_id);
    }

    /// Abort every tracked flight; returns how many were stopped
    pub fn cancel_all(&self) -> usize {
        let mut cancelled = 0;
        self.flights.retain(|_, handle| {
            handle.abort();
            cancelled += 1;
            false
        });
        cancelled
    }

    pub fn active(&self) -> usize {
        self.flights.len()
    }
}

/// Spawn the timer task flying one arrow until it hits, misses or goes stale
pub fn launch_flight(controller: Arc<MatchController>, projectile_id: String, epoch: u64) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticks = tick_interval(controller.tick());
        // First tick completes immediately
        ticks.tick().await;

        loop {
            ticks.tick().await;
            if !controller.step_projectile(&projectile_id, epoch) {
                break;
            }
        }

        controller.flights().finish(&projectile_id);
        debug!(arrow_id = %projectile_id, "Flight finished");
    })
}

/// Handle to the perpetual target oscillators
pub struct Simulation {
    controller: Arc<MatchController>,
    oscillators: Vec<JoinHandle<()>>,
}

impl Simulation {
    /// Start one oscillator per target. They idle whenever the match is not running.
    pub fn start(controller: Arc<MatchController>) -> Self {
        let oscillators = TargetId::ALL
            .into_iter()
            .map(|id| tokio::spawn(run_oscillator(Arc::clone(&controller), id)))
            .collect();

        info!(tick_ms = controller.tick().as_millis() as u64, "Simulation started");
        Self {
            controller,
            oscillators,
        }
    }

    /// Stop the oscillators and every arrow in flight
    pub fn shutdown(self) {
        for handle in &self.oscillators {
            handle.abort();
        }
        let cancelled = self.controller.flights().cancel_all();
        info!(cancelled_flights = cancelled, "Simulation stopped");
    }
}

async fn run_oscillator(controller: Arc<MatchController>, id: TargetId) {
    let mut ticks = tick_interval(controller.tick());
    loop {
        ticks.tick().await;
        controller.tick_target(id);
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::time::Duration;

    use tokio::sync::{broadcast, mpsc};
    use uuid::Uuid;

    use super::*;
    use crate::game::rules::GameRules;
    use crate::net::hub::BroadcastHub;
    use crate::net::protocol::ServerFrame;
    use crate::store::MemoryLeaderboard;

    fn drain(rx: &mut broadcast::Receiver<ServerFrame>) -> Vec<ServerFrame> {
        let mut frames = Vec::new();
        loop {
            match rx.try_recv() {
                Ok(frame) => frames.push(frame),
                Err(broadcast::error::TryRecvError::Lagged(_)) => continue,
                Err(_) => return frames,
            }
        }
    }

    #[tokio::test]
    async fn supervisor_cancels_in_bulk() {
        let supervisor = ProjectileSupervisor::new();
        let handles: Vec<_> = (0..3)
            .map(|n| {
                let handle = tokio::spawn(std::future::pending::<()>());
                supervisor.track(format!("A_0_{n}"), handle.abort_handle());
                handle
            })
            .collect();

        supervisor.finish("A_0_1");
        assert_eq!(supervisor.active(), 2);
        assert_eq!(supervisor.cancel_all(), 2);
        assert_eq!(supervisor.active(), 0);

        for (n, handle) in handles.into_iter().enumerate() {
            if n == 1 {
                handle.abort();
            }
            assert!(handle.await.unwrap_err().is_cancelled());
        }
    }

    #[tokio::test(start_paused = true)]
    async fn oscillators_only_move_targets_while_running() {
        let hub = BroadcastHub::default();
        let mut rx = hub.subscribe();
        let controller = Arc::new(MatchController::new(
            GameRules::default(),
            hub,
            Arc::new(MemoryLeaderboard::new()),
        ));
        let simulation = Simulation::start(Arc::clone(&controller));

        tokio::time::sleep(Duration::from_millis(200)).await;
        assert_eq!(controller.snapshot().target1_y, 300.0);
        assert!(drain(&mut rx).is_empty());

        let (tx, _replies) = mpsc::unbounded_channel();
        let a = Uuid::new_v4();
        controller.register(a, "A", &tx).unwrap();
        controller.ready(a);
        tokio::time::sleep(Duration::from_millis(200)).await;

        let view = controller.snapshot();
        assert!(view.target1_y > 300.0 && view.target1_y <= 500.0);
        assert!(view.target2_y > view.target1_y);
        for frame in drain(&mut rx) {
            if let ServerFrame::GameState(state) = frame {
                assert!((100.0..=500.0).contains(&state.target1_y));
                assert!((100.0..=500.0).contains(&state.target2_y));
            }
        }

        controller.pause(a);
        let held = controller.snapshot();
        tokio::time::sleep(Duration::from_millis(200)).await;
        assert_eq!(controller.snapshot(), held);

        simulation.shutdown();
    }

    #[tokio::test(start_paused = true)]
    async fn every_arrow_resolves_at_most_once() {
        let hub = BroadcastHub::default();
        let mut rx = hub.subscribe();
        let controller = Arc::new(MatchController::new(
            GameRules::default(),
            hub,
            Arc::new(MemoryLeaderboard::new()),
        ));
        let simulation = Simulation::start(Arc::clone(&controller));

        let (tx, _replies) = mpsc::unbounded_channel();
        let players: Vec<Uuid> = ["A", "B"]
            .iter()
            .map(|name| {
                let id = Uuid::new_v4();
                controller.register(id, name, &tx).unwrap();
                id
            })
            .collect();
        for id in &players {
            controller.ready(*id);
        }

        let mut frames = Vec::new();
        for _ in 0..15 {
            for id in &players {
                controller.shoot(*id);
            }
            tokio::time::sleep(Duration::from_millis(150)).await;
            frames.extend(drain(&mut rx));
        }
        tokio::time::sleep(Duration::from_secs(3)).await;
        frames.extend(drain(&mut rx));

        let mut fired = 0;
        let mut resolutions: HashMap<String, usize> = HashMap::new();
        for frame in &frames {
            match frame {
                ServerFrame::Arrow { .. } => fired += 1,
                ServerFrame::Hit { arrow_id, .. } | ServerFrame::Miss { arrow_id, .. } => {
                    *resolutions.entry(arrow_id.clone()).or_default() += 1;
                }
                _ => {}
            }
        }

        assert!(fired > 0);
        assert!(resolutions.values().all(|n| *n == 1), "{resolutions:?}");
        assert!(resolutions.len() <= fired);
        assert!(matches!(frames.last(), Some(ServerFrame::GameOver(_))));
        assert_eq!(controller.flights().active(), 0);

        simulation.shutdown();
    }
}
