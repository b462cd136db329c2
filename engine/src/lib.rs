pub mod types;
pub mod error;
pub mod config;
pub mod map;
pub mod skills;
pub mod points;
pub mod resources;
pub mod garrison;
pub mod combat;
pub mod diplomacy;
pub mod invasion;
pub mod events;
pub mod victory;
pub mod changes;
pub mod save;
pub mod setup;
pub mod engine;
pub mod visibility;

#[cfg(test)]
mod tests;

pub use types::*;
pub use config::EngineConfig;
pub use error::EngineError;
pub use engine::{advance_turn, apply_action, Action, ActionOutcome, RuleSet, TurnSummary};
pub use setup::{create_world, Scenario};
pub use visibility::FactionView;
