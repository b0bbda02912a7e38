//! Authoritative world state
//!
//! `World` is plain data plus atomic operations on it. It is always reached
//! through the match controller's lock, so none of these methods synchronize
//! on their own. Requests that reference an unknown player or projectile are
//! no-ops rather than errors.

use std::collections::HashMap;

use uuid::Uuid;

use super::combat::{CombatSystem, HitResult, Projectile};
use super::physics::{Direction, PhysicsSystem};
use super::rules::{GameRules, TargetId};

/// Longest accepted display name
pub const MAX_NAME_LEN: usize = 32;

/// Names that collide with wire sentinels
const RESERVED_NAMES: [&str; 2] = ["None", "null"];

/// Match phase
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchPhase {
    /// Waiting for every player to be ready
    Lobby,
    /// Targets moving, shots accepted
    Running,
    /// Held by one player
    Paused,
    /// Winner decided, waiting for a restart
    Ended,
}

impl MatchPhase {
    /// Running or paused
    pub fn in_match(self) -> bool {
        matches!(self, MatchPhase::Running | MatchPhase::Paused)
    }
}

/// A moving target
#[derive(Debug, Clone, Copy)]
pub struct Target {
    pub id: TargetId,
    pub y: f64,
    pub direction: Direction,
}

/// A registered player (authoritative)
#[derive(Debug, Clone)]
pub struct Player {
    pub session_id: Uuid,
    pub name: String,
    pub score: u32,
    pub shots_remaining: u32,
    /// Signalled ready since the last reset
    pub ready: bool,
    /// False for players who joined mid-match
    pub participating: bool,
}

/// Why a name registration was refused
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RegistrationError {
    #[error("Name already taken")]
    NameTaken,

    #[error("Invalid name")]
    InvalidName,

    #[error("Already registered")]
    AlreadyRegistered,
}

/// What one flight tick did to a projectile
#[derive(Debug, Clone, PartialEq)]
pub enum ProjectileStep {
    /// Unknown id or a projectile from an earlier match
    Stale,
    /// Match is paused; position held
    Held,
    /// Moved one tick, then resolved as `outcome`
    Advanced {
        owner: String,
        x: f64,
        y: f64,
        outcome: FlightOutcome,
    },
}

/// Result of the post-move hit test
#[derive(Debug, Clone, PartialEq)]
pub enum FlightOutcome {
    InFlight,
    /// Removed; points already awarded
    Hit(HitResult),
    /// Removed after leaving the field
    Missed,
}

/// How a match ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatchOutcome {
    /// `None` when nobody leads outright
    pub winner: Option<String>,
}

/// Authoritative game state for one server
pub struct World {
    rules: GameRules,
    phase: MatchPhase,
    pause_owner: Option<String>,
    targets: [Target; 2],
    /// Registration order; drives lane placement
    players: Vec<Player>,
    projectiles: HashMap<String, Projectile>,
    /// Bumped on every reset and end so stale flights can be recognized
    epoch: u64,
    shot_seq: u64,
}

impl World {
    pub fn new(rules: GameRules) -> Self {
        let targets = Self::initial_targets(&rules);
        Self {
            rules,
            phase: MatchPhase::Lobby,
            pause_owner: None,
            targets,
            players: Vec::new(),
            projectiles: HashMap::new(),
            epoch: 0,
            shot_seq: 0,
        }
    }

    fn initial_targets(rules: &GameRules) -> [Target; 2] {
        TargetId::ALL.map(|id| Target {
            id,
            y: rules.target(id).start_y,
            direction: Direction::Down,
        })
    }

    pub fn rules(&self) -> &GameRules {
        &self.rules
    }

    pub fn phase(&self) -> MatchPhase {
        self.phase
    }

    pub fn set_phase(&mut self, phase: MatchPhase) {
        self.phase = phase;
    }

    pub fn pause_owner(&self) -> Option<&str> {
        self.pause_owner.as_deref()
    }

    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    pub fn target(&self, id: TargetId) -> &Target {
        &self.targets[id.index()]
    }

    pub fn target_ys(&self) -> [f64; 2] {
        [self.targets[0].y, self.targets[1].y]
    }

    pub fn players(&self) -> &[Player] {
        &self.players
    }

    pub fn player(&self, session_id: Uuid) -> Option<&Player> {
        self.players.iter().find(|p| p.session_id == session_id)
    }

    pub fn player_by_name(&self, name: &str) -> Option<&Player> {
        self.players.iter().find(|p| p.name == name)
    }

    fn player_mut(&mut self, session_id: Uuid) -> Option<&mut Player> {
        self.players.iter_mut().find(|p| p.session_id == session_id)
    }

    pub fn projectiles_in_flight(&self) -> usize {
        self.projectiles.len()
    }

    pub fn projectile(&self, id: &str) -> Option<&Projectile> {
        self.projectiles.get(id)
    }

    /// Register `name` for `session_id`.
    /// Players joining mid-match sit out until the next reset.
    pub fn add_player(&mut self, session_id: Uuid, name: &str) -> Result<&Player, RegistrationError> {
        let name = name.trim();
        if !valid_name(name) {
            return Err(RegistrationError::InvalidName);
        }
        if self.player(session_id).is_some() {
            return Err(RegistrationError::AlreadyRegistered);
        }
        if self.player_by_name(name).is_some() {
            return Err(RegistrationError::NameTaken);
        }

        self.players.push(Player {
            session_id,
            name: name.to_string(),
            score: 0,
            shots_remaining: self.rules.starting_shots,
            ready: false,
            participating: !self.phase.in_match(),
        });
        let idx = self.players.len() - 1;
        Ok(&self.players[idx])
    }

    pub fn remove_player(&mut self, session_id: Uuid) -> Option<Player> {
        let idx = self.players.iter().position(|p| p.session_id == session_id)?;
        Some(self.players.remove(idx))
    }

    /// Fresh scores, shots and target positions; drops every projectile
    pub fn reset_for_new_match(&mut self) {
        self.epoch += 1;
        self.targets = Self::initial_targets(&self.rules);
        self.projectiles.clear();
        self.pause_owner = None;

        let shots = self.rules.starting_shots;
        for player in &mut self.players {
            player.score = 0;
            player.shots_remaining = shots;
            player.ready = false;
            player.participating = true;
        }
    }

    /// Mark a player ready; false if the session is unknown
    pub fn set_ready(&mut self, session_id: Uuid) -> bool {
        match self.player_mut(session_id) {
            Some(player) => {
                player.ready = true;
                true
            }
            None => false,
        }
    }

    /// At least one player registered and every one of them ready
    pub fn all_ready(&self) -> bool {
        !self.players.is_empty() && self.players.iter().all(|p| p.ready)
    }

    pub fn clear_ready(&mut self) {
        for player in &mut self.players {
            player.ready = false;
        }
    }

    /// Running → Paused, owned by `session_id`'s player
    pub fn pause(&mut self, session_id: Uuid) -> Option<String> {
        if self.phase != MatchPhase::Running {
            return None;
        }
        let name = self.player(session_id)?.name.clone();
        self.phase = MatchPhase::Paused;
        self.pause_owner = Some(name.clone());
        Some(name)
    }

    /// Paused → Running regardless of who asked
    pub fn resume(&mut self) -> bool {
        if self.phase != MatchPhase::Paused {
            return false;
        }
        self.phase = MatchPhase::Running;
        self.pause_owner = None;
        true
    }

    /// Move one target a tick; only while running
    pub fn advance_target(&mut self, id: TargetId) -> bool {
        if self.phase != MatchPhase::Running {
            return false;
        }
        let spec = *self.rules.target(id);
        let target = &mut self.targets[id.index()];
        let (y, direction) = PhysicsSystem::oscillate(target.y, target.direction, &spec);
        target.y = y;
        target.direction = direction;
        true
    }

    /// Spend one shot and create its projectile.
    /// `None` unless running and the player is participating with shots left.
    pub fn spawn_projectile(&mut self, session_id: Uuid, now_millis: u64) -> Option<Projectile> {
        if self.phase != MatchPhase::Running {
            return None;
        }

        let player_count = self.players.len();
        let index = self.players.iter().position(|p| p.session_id == session_id)?;
        let lane_y = self.rules.lane_y(index, player_count);

        let player = &mut self.players[index];
        if !player.participating || player.shots_remaining == 0 {
            return None;
        }
        player.shots_remaining -= 1;
        let owner = player.name.clone();

        let id = format!("{}_{}_{}", owner, now_millis, self.shot_seq);
        self.shot_seq += 1;

        let projectile = Projectile::new(
            id.clone(),
            owner,
            session_id,
            self.rules.shooter_base_width,
            lane_y,
            self.rules.projectile_speed,
            self.epoch,
        );
        self.projectiles.insert(id, projectile.clone());
        Some(projectile)
    }

    /// Advance a projectile one tick and resolve it
    pub fn advance_projectile(&mut self, id: &str, epoch: u64) -> ProjectileStep {
        if epoch != self.epoch {
            return ProjectileStep::Stale;
        }
        if self.phase == MatchPhase::Paused {
            return if self.projectiles.contains_key(id) {
                ProjectileStep::Held
            } else {
                ProjectileStep::Stale
            };
        }
        if self.phase != MatchPhase::Running {
            return ProjectileStep::Stale;
        }

        let target_ys = self.target_ys();
        let Some(projectile) = self.projectiles.get_mut(id) else {
            return ProjectileStep::Stale;
        };

        projectile.advance();
        let (x, y, owner) = (projectile.x, projectile.y, projectile.owner.clone());

        let owner_session = projectile.owner_session;

        let outcome = if let Some(hit) = CombatSystem::resolve_hit(projectile, target_ys, &self.rules) {
            self.projectiles.remove(id);
            // A departed shooter's arrow scores for nobody, even if the name was reused
            if let Some(shooter) = self.player_mut(owner_session) {
                shooter.score += hit.points;
            }
            FlightOutcome::Hit(hit)
        } else if projectile.out_of_field(self.rules.field_width) {
            self.projectiles.remove(id);
            FlightOutcome::Missed
        } else {
            FlightOutcome::InFlight
        };

        ProjectileStep::Advanced {
            owner,
            x,
            y,
            outcome,
        }
    }

    /// Decide whether the running match is over.
    ///
    /// A participant at the winning score wins outright. Otherwise, once every
    /// participant is out of shots and nothing is in flight, the unique top
    /// scorer wins and a tie yields no winner.
    pub fn check_winner(&self) -> Option<MatchOutcome> {
        if self.phase != MatchPhase::Running {
            return None;
        }

        let participants: Vec<&Player> = self.players.iter().filter(|p| p.participating).collect();
        if let Some(leader) = participants
            .iter()
            .filter(|p| p.score >= self.rules.winning_score)
            .max_by_key(|p| p.score)
        {
            return Some(MatchOutcome {
                winner: Some(leader.name.clone()),
            });
        }

        let spent = !participants.is_empty() && participants.iter().all(|p| p.shots_remaining == 0);
        if !spent || !self.projectiles.is_empty() {
            return None;
        }

        let best = participants.iter().map(|p| p.score).max().unwrap_or(0);
        let mut leaders = participants.iter().filter(|p| p.score == best);
        let winner = match (leaders.next(), leaders.next()) {
            (Some(only), None) => Some(only.name.clone()),
            _ => None,
        };
        Some(MatchOutcome { winner })
    }

    /// Running/Paused → Ended: drops projectiles and every ready flag
    pub fn end_match(&mut self) {
        self.phase = MatchPhase::Ended;
        self.pause_owner = None;
        self.projectiles.clear();
        self.epoch += 1;
        self.clear_ready();
    }

    /// Give up a match nobody is left to play
    pub fn abandon(&mut self) {
        self.phase = MatchPhase::Lobby;
        self.pause_owner = None;
        self.projectiles.clear();
        self.epoch += 1;
        self.clear_ready();
    }
}

fn valid_name(name: &str) -> bool {
    !name.is_empty()
        && name.chars().count() <= MAX_NAME_LEN
        && !name.contains([':', ',', ';'])
        && !name.chars().any(char::is_control)
        && !RESERVED_NAMES.contains(&name)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn running_world(names: &[&str]) -> (World, Vec<Uuid>) {
        let mut world = World::new(GameRules::default());
        let ids: Vec<Uuid> = names
            .iter()
            .map(|name| {
                let id = Uuid::new_v4();
                world.add_player(id, name).unwrap();
                id
            })
            .collect();
        world.reset_for_new_match();
        world.set_phase(MatchPhase::Running);
        (world, ids)
    }

    /// Fly a projectile to completion and return its final step
    fn fly(world: &mut World, id: &str) -> ProjectileStep {
        let epoch = world.epoch();
        loop {
            let step = world.advance_projectile(id, epoch);
            match &step {
                ProjectileStep::Advanced {
                    outcome: FlightOutcome::InFlight,
                    ..
                } => continue,
                _ => return step,
            }
        }
    }

    #[test]
    fn registration_rejects_duplicates_and_bad_names() {
        let mut world = World::new(GameRules::default());
        let a = Uuid::new_v4();
        assert!(world.add_player(a, "Alice").is_ok());
        assert_eq!(
            world.add_player(Uuid::new_v4(), "Alice").unwrap_err(),
            RegistrationError::NameTaken
        );
        assert_eq!(
            world.add_player(a, "Other").unwrap_err(),
            RegistrationError::AlreadyRegistered
        );
        let too_long = "x".repeat(MAX_NAME_LEN + 1);
        for bad in ["", "   ", "a:b", "a,b", "a;b", "None", "null", too_long.as_str()] {
            assert_eq!(
                world.add_player(Uuid::new_v4(), bad).unwrap_err(),
                RegistrationError::InvalidName,
                "{bad:?}"
            );
        }
    }

    #[test]
    fn late_joiner_sits_out_until_reset() {
        let (mut world, _) = running_world(&["A"]);
        let late = Uuid::new_v4();
        world.add_player(late, "Late").unwrap();
        assert!(!world.player(late).unwrap().participating);
        assert!(world.spawn_projectile(late, 1).is_none());

        world.end_match();
        world.reset_for_new_match();
        assert!(world.player(late).unwrap().participating);
    }

    #[test]
    fn targets_hold_still_unless_running() {
        let mut world = World::new(GameRules::default());
        assert!(!world.advance_target(TargetId::One));
        assert_eq!(world.target(TargetId::One).y, 300.0);

        world.set_phase(MatchPhase::Running);
        assert!(world.advance_target(TargetId::One));
        assert!(world.advance_target(TargetId::Two));
        assert_eq!(world.target_ys(), [301.0, 302.0]);

        world.set_phase(MatchPhase::Paused);
        assert!(!world.advance_target(TargetId::Two));
        assert_eq!(world.target(TargetId::Two).y, 302.0);
    }

    #[test]
    fn shots_decrement_once_and_stop_at_zero() {
        let (mut world, ids) = running_world(&["A"]);
        let mut seen = std::collections::HashSet::new();
        for n in 0..15 {
            let p = world.spawn_projectile(ids[0], 42).expect("shot accepted");
            assert!(seen.insert(p.id.clone()), "duplicate id {}", p.id);
            assert_eq!(world.player(ids[0]).unwrap().shots_remaining, 14 - n);
        }
        assert!(world.spawn_projectile(ids[0], 42).is_none());
        assert_eq!(world.player(ids[0]).unwrap().shots_remaining, 0);
    }

    #[test]
    fn projectile_uses_lane_and_base() {
        let (mut world, ids) = running_world(&["A", "B"]);
        let p = world.spawn_projectile(ids[1], 7).unwrap();
        assert_eq!(p.owner, "B");
        assert_eq!(p.x, 72.0);
        assert_eq!(p.y, 500.0 / 3.0 * 2.0);
        assert!(p.id.starts_with("B_7_"));
    }

    #[test]
    fn aligned_shot_hits_first_target_and_scores() {
        let mut rules = GameRules::default();
        rules.lane_span = 600.0; // lone shooter lane at y = 300
        let mut world = World::new(rules);
        let a = Uuid::new_v4();
        world.add_player(a, "A").unwrap();
        world.reset_for_new_match();
        world.set_phase(MatchPhase::Running);

        let p = world.spawn_projectile(a, 1).unwrap();
        match fly(&mut world, &p.id) {
            ProjectileStep::Advanced {
                outcome: FlightOutcome::Hit(hit),
                ..
            } => {
                assert_eq!(hit.target, TargetId::One);
                assert_eq!(hit.projectile_id, p.id);
            }
            other => panic!("expected hit, got {other:?}"),
        }
        assert_eq!(world.player(a).unwrap().score, 1);
        assert_eq!(world.projectiles_in_flight(), 0);
        assert_eq!(world.advance_projectile(&p.id, world.epoch()), ProjectileStep::Stale);
    }

    #[test]
    fn unaligned_shot_misses_at_far_edge() {
        let (mut world, ids) = running_world(&["A"]);
        let p = world.spawn_projectile(ids[0], 1).unwrap();
        match fly(&mut world, &p.id) {
            ProjectileStep::Advanced {
                x,
                outcome: FlightOutcome::Missed,
                ..
            } => assert!(x >= 800.0),
            other => panic!("expected miss, got {other:?}"),
        }
        assert_eq!(world.player(ids[0]).unwrap().score, 0);
    }

    #[test]
    fn paused_flight_is_held_and_stale_epoch_ignored() {
        let (mut world, ids) = running_world(&["A"]);
        let p = world.spawn_projectile(ids[0], 1).unwrap();
        world.pause(ids[0]).unwrap();
        assert_eq!(world.advance_projectile(&p.id, p.epoch), ProjectileStep::Held);
        assert_eq!(world.projectile(&p.id).unwrap().x, 72.0);

        world.resume();
        world.end_match();
        assert_eq!(world.advance_projectile(&p.id, p.epoch), ProjectileStep::Stale);
    }

    #[test]
    fn winning_score_ends_match_even_with_shots_left() {
        let (mut world, _) = running_world(&["A", "B"]);
        world.players[0].score = 6;
        assert_eq!(
            world.check_winner(),
            Some(MatchOutcome {
                winner: Some("A".into())
            })
        );
    }

    #[test]
    fn departed_shooter_arrow_never_scores_for_a_namesake() {
        let mut rules = GameRules::default();
        rules.lane_span = 600.0;
        let mut world = World::new(rules);
        let original = Uuid::new_v4();
        world.add_player(original, "A").unwrap();
        world.reset_for_new_match();
        world.set_phase(MatchPhase::Running);

        let p = world.spawn_projectile(original, 1).unwrap();
        world.remove_player(original).unwrap();
        let namesake = Uuid::new_v4();
        world.add_player(namesake, "A").unwrap();

        assert!(matches!(
            fly(&mut world, &p.id),
            ProjectileStep::Advanced {
                outcome: FlightOutcome::Hit(_),
                ..
            }
        ));
        assert_eq!(world.player(namesake).unwrap().score, 0);
    }

    #[test]
    fn spent_shots_pick_top_scorer_or_none_on_tie() {
        let (mut world, _) = running_world(&["A", "B"]);
        for p in &mut world.players {
            p.shots_remaining = 0;
        }
        world.players[0].score = 3;
        world.players[1].score = 2;
        assert_eq!(world.check_winner().unwrap().winner.as_deref(), Some("A"));

        world.players[1].score = 3;
        assert_eq!(world.check_winner().unwrap().winner, None);
    }

    #[test]
    fn spent_shots_wait_for_arrows_in_flight() {
        let (mut world, ids) = running_world(&["A"]);
        world.players[0].shots_remaining = 1;
        let p = world.spawn_projectile(ids[0], 1).unwrap();
        assert!(world.check_winner().is_none());
        fly(&mut world, &p.id);
        assert!(world.check_winner().is_some());
    }

    #[test]
    fn only_running_matches_can_be_paused_and_resume_clears_owner() {
        let mut world = World::new(GameRules::default());
        let a = Uuid::new_v4();
        world.add_player(a, "A").unwrap();
        assert!(world.pause(a).is_none());

        world.set_phase(MatchPhase::Running);
        assert_eq!(world.pause(a).as_deref(), Some("A"));
        assert_eq!(world.pause_owner(), Some("A"));
        assert!(world.resume());
        assert_eq!(world.pause_owner(), None);
        assert_eq!(world.phase(), MatchPhase::Running);
    }

    #[test]
    fn reset_restores_shots_and_targets() {
        let (mut world, ids) = running_world(&["A"]);
        world.spawn_projectile(ids[0], 1).unwrap();
        world.advance_target(TargetId::Two);
        world.players[0].score = 4;
        let before = world.epoch();

        world.reset_for_new_match();
        let player = world.player(ids[0]).unwrap();
        assert_eq!((player.score, player.shots_remaining), (0, 15));
        assert_eq!(world.target_ys(), [300.0, 300.0]);
        assert_eq!(world.projectiles_in_flight(), 0);
        assert_eq!(world.epoch(), before + 1);
    }
}
