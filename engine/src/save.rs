// ═══════════════════════════════════════════════════════════════════════
// SaveData — the serialization envelope around a WorldState
// ═══════════════════════════════════════════════════════════════════════

use serde::{Deserialize, Serialize};

use crate::error::EngineError;
use crate::types::WorldState;

pub const SAVE_VERSION: u32 = 1;
/// Chat / council lines kept in a save.
pub const CHAT_LOG_CAP: usize = 50;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatEntry {
    pub speaker: String,
    pub text: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SaveMetadata {
    pub turn_count: u32,
    pub player_faction_name: String,
    pub player_castle_count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SaveData {
    pub version: u32,
    /// Caller-supplied, seconds since the epoch. The engine reads no clock.
    pub timestamp: u64,
    pub world_state: WorldState,
    pub chat_log: Vec<ChatEntry>,
    pub metadata: SaveMetadata,
}

impl SaveData {
    /// Snapshot the world. Only the newest `CHAT_LOG_CAP` chat lines are kept.
    pub fn new(world: &WorldState, timestamp: u64, chat_log: &[ChatEntry]) -> Self {
        let start = chat_log.len().saturating_sub(CHAT_LOG_CAP);
        let metadata = SaveMetadata {
            turn_count: world.turn,
            player_faction_name: world.faction(world.player).map(|f| f.name.clone()).unwrap_or_default(),
            player_castle_count: world.castle_count(world.player),
        };
        SaveData {
            version: SAVE_VERSION,
            timestamp,
            world_state: world.clone(),
            chat_log: chat_log[start..].to_vec(),
            metadata,
        }
    }

    pub fn to_json(&self) -> Result<String, EngineError> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn from_json(json: &str) -> Result<Self, EngineError> {
        let save: SaveData = serde_json::from_str(json)?;
        if save.version != SAVE_VERSION {
            return Err(EngineError::UnsupportedSaveVersion { found: save.version, expected: SAVE_VERSION });
        }
        Ok(save)
    }
}
