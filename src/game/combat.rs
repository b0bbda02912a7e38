//! Projectiles and hit detection

use uuid::Uuid;

use super::physics::PhysicsSystem;
use super::rules::{GameRules, TargetId};

/// An arrow in flight
#[derive(Debug, Clone)]
pub struct Projectile {
    pub id: String,
    /// Name of the shooter
    pub owner: String,
    /// Session that fired it; points go to this session only
    pub owner_session: Uuid,
    pub x: f64,
    /// Fixed at issue time
    pub y: f64,
    pub speed: f64,
    /// Match the arrow belongs to
    pub epoch: u64,
}

impl Projectile {
    pub fn new(
        id: String,
        owner: String,
        owner_session: Uuid,
        x: f64,
        y: f64,
        speed: f64,
        epoch: u64,
    ) -> Self {
        Self {
            id,
            owner,
            owner_session,
            x,
            y,
            speed,
            epoch,
        }
    }

    /// Advance one tick
    pub fn advance(&mut self) {
        self.x += self.speed;
    }

    /// Whether the arrow has left the far edge of the field
    pub fn out_of_field(&self, field_width: f64) -> bool {
        self.x >= field_width
    }
}

/// Outcome of a projectile hit
#[derive(Debug, Clone, PartialEq)]
pub struct HitResult {
    pub projectile_id: String,
    pub shooter: String,
    pub target: TargetId,
    pub points: u32,
    /// Impact point: the target column and the target's current y
    pub x: f64,
    pub y: f64,
}

/// Combat system for resolving arrows against targets
pub struct CombatSystem;

impl CombatSystem {
    /// First target (in priority order) the projectile hits at its current x,
    /// given the targets' current y positions
    pub fn resolve_hit(
        projectile: &Projectile,
        target_ys: [f64; 2],
        rules: &GameRules,
    ) -> Option<HitResult> {
        TargetId::ALL.into_iter().find_map(|id| {
            let spec = rules.target(id);
            let target_y = target_ys[id.index()];

            let hit = PhysicsSystem::crossed_column(projectile.x, spec.x, projectile.speed)
                && PhysicsSystem::within_radius(target_y, projectile.y, spec.radius);

            hit.then(|| HitResult {
                projectile_id: projectile.id.clone(),
                shooter: projectile.owner.clone(),
                target: id,
                points: spec.points,
                x: spec.x,
                y: target_y,
            })
        })
    }
}
