//! Game simulation modules

pub mod combat;
pub mod engine;
pub mod r#match;
pub mod physics;
pub mod rules;
pub mod snapshot;
pub mod world;

pub use engine::{ProjectileSupervisor, Simulation};
pub use r#match::MatchController;
pub use rules::{GameRules, TargetId};
pub use world::{MatchPhase, RegistrationError, World};
