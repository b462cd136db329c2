pub mod agent;
pub mod random;
pub mod utility;

pub use agent::{decide_or_fallback, fallback_turn, Agent, DecisionError, NpcAction, NpcTurnResult};
pub use random::RandomAgent;
pub use utility::UtilityAgent;
