// ═══════════════════════════════════════════════════════════════════════
// Victory Checker — defeat first, then victory
// ═══════════════════════════════════════════════════════════════════════

use serde::{Deserialize, Serialize};

use crate::config::VictoryConfig;
use crate::types::{FactionId, WorldState};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum GameEndReason {
    Collapse,
    Bankruptcy,
    Unification,
    Mandate,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum GameEndResult {
    Victory(GameEndReason),
    Defeat(GameEndReason),
}

impl GameEndResult {
    pub fn is_victory(&self) -> bool {
        matches!(self, GameEndResult::Victory(_))
    }

    pub fn reason(&self) -> GameEndReason {
        match self {
            GameEndResult::Victory(r) | GameEndResult::Defeat(r) => *r,
        }
    }
}

pub fn check(world: &WorldState, player: FactionId, config: &VictoryConfig) -> Option<GameEndResult> {
    let owned = world.castle_count(player);
    let total = world.castles.len();

    if owned == 0 {
        return Some(GameEndResult::Defeat(GameEndReason::Collapse));
    }
    let faction = world.faction(player)?;
    if faction.gold == 0 && faction.food == 0 && faction.points.troops == 0 {
        return Some(GameEndResult::Defeat(GameEndReason::Bankruptcy));
    }

    if total > 0 && owned == total {
        return Some(GameEndResult::Victory(GameEndReason::Unification));
    }
    if total > 0
        && owned as f64 / total as f64 >= config.mandate_share
        && faction.popularity >= config.mandate_popularity
    {
        return Some(GameEndResult::Victory(GameEndReason::Mandate));
    }
    None
}
