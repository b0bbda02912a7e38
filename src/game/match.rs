//! Match controller: phase transitions and the single mutation boundary
//!
//! Every command and every simulation tick takes the world lock, applies its
//! change, and broadcasts the resulting frames before releasing it. Frames
//! therefore reach every session in exactly the order the world changed.
//! Leaderboard calls happen only after the lock is released.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tracing::{debug, error, info};
use uuid::Uuid;

use crate::net::hub::{BroadcastHub, Outbox};
use crate::net::protocol::{GameStateView, ServerFrame};
use crate::store::{LeaderboardEntry, LeaderboardError, LeaderboardStore};
use crate::util::time::unix_millis;

use super::engine::{launch_flight, ProjectileSupervisor};
use super::rules::{GameRules, TargetId};
use super::snapshot::SnapshotBuilder;
use super::world::{
    FlightOutcome, MatchOutcome, MatchPhase, ProjectileStep, RegistrationError, World,
};

/// The authoritative match
pub struct MatchController {
    world: Mutex<World>,
    hub: BroadcastHub,
    flights: ProjectileSupervisor,
    leaderboard: Arc<dyn LeaderboardStore>,
    tick: Duration,
}

impl MatchController {
    pub fn new(rules: GameRules, hub: BroadcastHub, leaderboard: Arc<dyn LeaderboardStore>) -> Self {
        let tick = rules.tick;
        Self {
            world: Mutex::new(World::new(rules)),
            hub,
            flights: ProjectileSupervisor::new(),
            leaderboard,
            tick,
        }
    }

    pub fn tick(&self) -> Duration {
        self.tick
    }

    pub fn flights(&self) -> &ProjectileSupervisor {
        &self.flights
    }

    pub fn phase(&self) -> MatchPhase {
        self.world.lock().phase()
    }

    pub fn snapshot(&self) -> GameStateView {
        SnapshotBuilder::build(&self.world.lock())
    }

    /// Handle `NAME:<name>`. The reply goes to `reply` before the state
    /// broadcast so the client sees its acceptance first.
    pub fn register(
        &self,
        session_id: Uuid,
        name: &str,
        reply: &Outbox,
    ) -> Result<String, RegistrationError> {
        let mut world = self.world.lock();

        match world.add_player(session_id, name) {
            Ok(player) => {
                let name = player.name.clone();
                let participating = player.participating;
                if reply.send(ServerFrame::NameAccepted).is_err() {
                    debug!(session_id = %session_id, "Outbox closed before NAME_ACCEPTED");
                }

                info!(
                    session_id = %session_id,
                    player = %name,
                    participating,
                    player_count = world.players().len(),
                    "Player registered"
                );
                self.hub.broadcast(SnapshotBuilder::frame(&world));
                Ok(name)
            }
            Err(e) => {
                if reply.send(ServerFrame::Error(e.to_string())).is_err() {
                    debug!(session_id = %session_id, error = %e, "Outbox closed before ERROR reply");
                }
                Err(e)
            }
        }
    }

    /// Handle `READY`: readiness in the lobby or after a match, resume while paused
    pub fn ready(&self, session_id: Uuid) {
        let outcome = {
            let mut world = self.world.lock();
            let Some(name) = world.player(session_id).map(|p| p.name.clone()) else {
                debug!(session_id = %session_id, "READY from unregistered session");
                return;
            };

            match world.phase() {
                MatchPhase::Paused if world.pause_owner() == Some(name.as_str()) => {
                    info!(player = %name, "Match resumed");
                    self.resume(&mut world);
                    // The match may have been decided while held
                    self.finish_if_won(&mut world)
                }
                MatchPhase::Paused => {
                    debug!(player = %name, owner = ?world.pause_owner(), "Resume refused");
                    None
                }
                MatchPhase::Running => {
                    debug!(player = %name, "READY ignored while running");
                    None
                }
                MatchPhase::Lobby | MatchPhase::Ended => {
                    world.set_ready(session_id);
                    debug!(player = %name, "Player ready");
                    self.try_start(&mut world, true);
                    None
                }
            }
        };

        self.record_win(outcome);
    }

    /// Handle `PAUSE`
    pub fn pause(&self, session_id: Uuid) {
        let mut world = self.world.lock();
        match world.pause(session_id) {
            Some(name) => {
                info!(player = %name, "Match paused");
                self.hub.broadcast(ServerFrame::GamePaused(name));
                self.hub.broadcast(SnapshotBuilder::frame(&world));
            }
            None => debug!(session_id = %session_id, "PAUSE ignored"),
        }
    }

    /// Handle `SHOOT`; returns whether an arrow was fired
    pub fn shoot(self: &Arc<Self>, session_id: Uuid) -> bool {
        let mut world = self.world.lock();
        let Some(projectile) = world.spawn_projectile(session_id, unix_millis()) else {
            debug!(session_id = %session_id, "SHOOT ignored");
            return false;
        };

        debug!(player = %projectile.owner, arrow_id = %projectile.id, y = projectile.y, "Arrow fired");
        self.hub.broadcast(ServerFrame::Arrow {
            player: projectile.owner.clone(),
            y: projectile.y,
            arrow_id: projectile.id.clone(),
        });
        self.hub.broadcast(SnapshotBuilder::frame(&world));

        // Tracked under the lock so a concurrent reset cannot miss it
        let flight = launch_flight(Arc::clone(self), projectile.id.clone(), projectile.epoch);
        self.flights.track(projectile.id, flight.abort_handle());
        true
    }

    /// Handle `GAME_OVER_ACK`
    pub fn acknowledge_game_over(&self, session_id: Uuid) {
        let world = self.world.lock();
        if let Some(player) = world.player(session_id) {
            debug!(player = %player.name, phase = ?world.phase(), "Game over acknowledged");
        }
    }

    /// A session went away: drop its player and repair the match around it
    pub fn disconnect(&self, session_id: Uuid) {
        let outcome = {
            let mut world = self.world.lock();
            let Some(player) = world.remove_player(session_id) else {
                return;
            };

            info!(
                player = %player.name,
                remaining = world.players().len(),
                "Player left"
            );
            self.hub.broadcast(SnapshotBuilder::frame(&world));

            let nobody_playing = world.players().iter().all(|p| !p.participating);
            if nobody_playing && world.phase().in_match() {
                let cancelled = self.flights.cancel_all();
                world.abandon();
                info!(cancelled_flights = cancelled, "Match abandoned, no participants left");
                self.hub.broadcast(SnapshotBuilder::frame(&world));
                None
            } else {
                match world.phase() {
                    MatchPhase::Paused if world.pause_owner() == Some(player.name.as_str()) => {
                        info!(player = %player.name, "Pause owner left, resuming");
                        self.resume(&mut world);
                        self.finish_if_won(&mut world)
                    }
                    MatchPhase::Running => self.finish_if_won(&mut world),
                    MatchPhase::Lobby | MatchPhase::Ended => {
                        self.try_start(&mut world, false);
                        None
                    }
                    MatchPhase::Paused => None,
                }
            }
        };

        self.record_win(outcome);
    }

    /// Current win table, read off the world lock
    pub async fn leaderboard(&self) -> Result<Vec<LeaderboardEntry>, LeaderboardError> {
        let store = Arc::clone(&self.leaderboard);
        tokio::task::spawn_blocking(move || store.leaderboard())
            .await
            .map_err(|e| LeaderboardError::Task(e.to_string()))?
    }

    /// One oscillator tick
    pub fn tick_target(&self, id: TargetId) {
        let mut world = self.world.lock();
        if world.advance_target(id) {
            self.hub.broadcast(SnapshotBuilder::frame(&world));
        }
    }

    /// One flight tick; returns whether the arrow is still flying
    pub fn step_projectile(&self, projectile_id: &str, epoch: u64) -> bool {
        let (flying, outcome) = {
            let mut world = self.world.lock();

            match world.advance_projectile(projectile_id, epoch) {
                ProjectileStep::Stale => (false, None),
                ProjectileStep::Held => (true, None),
                ProjectileStep::Advanced {
                    owner,
                    x,
                    y,
                    outcome,
                } => {
                    self.hub.broadcast(ServerFrame::ArrowPosition {
                        player: owner.clone(),
                        x,
                        y,
                        arrow_id: projectile_id.to_string(),
                    });

                    match outcome {
                        FlightOutcome::InFlight => (true, None),
                        FlightOutcome::Hit(hit) => {
                            info!(
                                player = %hit.shooter,
                                target = hit.target.number(),
                                points = hit.points,
                                "Target hit"
                            );
                            self.hub.broadcast(ServerFrame::Hit {
                                player: hit.shooter,
                                target: hit.target,
                                x: hit.x,
                                y: hit.y,
                                arrow_id: hit.projectile_id,
                            });
                            self.hub.broadcast(SnapshotBuilder::frame(&world));
                            (false, self.finish_if_won(&mut world))
                        }
                        FlightOutcome::Missed => {
                            self.hub.broadcast(ServerFrame::Miss {
                                player: owner,
                                arrow_id: projectile_id.to_string(),
                            });
                            (false, self.finish_if_won(&mut world))
                        }
                    }
                }
            }
        };

        self.record_win(outcome);
        flying
    }

    fn resume(&self, world: &mut World) {
        if world.resume() {
            self.hub.broadcast(ServerFrame::GameResumed);
            self.hub.broadcast(SnapshotBuilder::frame(world));
        }
    }

    /// Start once every registered player is ready
    fn try_start(&self, world: &mut World, announce_waiting: bool) {
        if world.all_ready() {
            self.start_match(world);
        } else if announce_waiting {
            self.hub.broadcast(ServerFrame::WaitingPlayers);
        }
    }

    fn start_match(&self, world: &mut World) {
        let cancelled = self.flights.cancel_all();
        world.reset_for_new_match();
        world.set_phase(MatchPhase::Running);

        info!(
            players = world.players().len(),
            epoch = world.epoch(),
            cancelled_flights = cancelled,
            "Match started"
        );
        self.hub.broadcast(ServerFrame::GameStarted);
        self.hub.broadcast(SnapshotBuilder::frame(world));
    }

    /// End the match if someone won or every shot is spent
    fn finish_if_won(&self, world: &mut World) -> Option<MatchOutcome> {
        let outcome = world.check_winner()?;
        let cancelled = self.flights.cancel_all();
        world.end_match();

        info!(
            winner = outcome.winner.as_deref().unwrap_or("None"),
            cancelled_flights = cancelled,
            "Match ended"
        );
        self.hub.broadcast(ServerFrame::ResetReady);
        self.hub.broadcast(ServerFrame::GameOver(outcome.winner.clone()));
        Some(outcome)
    }

    /// Persist a win in the background. Must be called without the world lock.
    fn record_win(&self, outcome: Option<MatchOutcome>) {
        let Some(winner) = outcome.and_then(|o| o.winner) else {
            return;
        };

        let store = Arc::clone(&self.leaderboard);
        tokio::spawn(async move {
            let name = winner.clone();
            match tokio::task::spawn_blocking(move || store.record_win(&name)).await {
                Ok(Ok(())) => info!(player = %winner, "Win recorded"),
                Ok(Err(e)) => error!(player = %winner, error = %e, "Failed to record win"),
                Err(e) => error!(player = %winner, error = %e, "Leaderboard task failed"),
            }
        });
    }
}
