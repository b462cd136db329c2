// ═══════════════════════════════════════════════════════════════════════
// Visibility / Information Model
//
// Information a faction may use when deciding its turn:
//   PUBLIC  — the map, castle owners and garrisons, every relation the
//             viewer is party to, rivals' troop totals and castle counts,
//             the calendar, the rules
//   PRIVATE — the viewer's own faction record in full
//   HIDDEN  — rivals' pools (AP/SP/IP/DP), treasuries, generals' stats
//             and personalities
//
// Agents MUST only receive a FactionView, never the raw WorldState.
// ═══════════════════════════════════════════════════════════════════════

use serde::{Deserialize, Serialize};

use crate::config::EngineConfig;
use crate::engine::RuleSet;
use crate::skills::SkillDef;
use crate::types::*;

/// What one faction can see of a rival.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RivalInfo {
    pub id: FactionId,
    pub name: String,
    pub is_player: bool,
    pub troops: u32,
    pub castle_count: usize,
    pub general_count: usize,
    /// Relation between the viewer and this rival.
    pub relation: DiplomaticRelation,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FactionView {
    pub viewer: FactionId,
    pub turn: u32,
    pub month: u8,
    pub season: Season,
    /// The viewer's own record, complete.
    pub me: Faction,
    /// Active rivals only, in turn order.
    pub rivals: Vec<RivalInfo>,
    pub castles: Vec<Castle>,
    /// Skills the viewer could unlock right now (SP permitting).
    pub unlockable_skills: Vec<SkillDef>,
    pub config: EngineConfig,
    pub invasion_pending: bool,
}

impl FactionView {
    /// None if the viewer is not in the world.
    pub fn build(world: &WorldState, viewer: FactionId, rules: &RuleSet) -> Option<FactionView> {
        let me = world.faction(viewer)?.clone();
        let rivals = world
            .turn_order
            .iter()
            .filter(|id| **id != viewer && world.is_active(**id))
            .filter_map(|id| world.faction(*id))
            .map(|f| RivalInfo {
                id: f.id,
                name: f.name.clone(),
                is_player: f.is_player,
                troops: f.points.troops,
                castle_count: world.castle_count(f.id),
                general_count: f.generals.len(),
                relation: world.relation(viewer, f.id),
            })
            .collect();
        let unlockable_skills = rules.skills.available(&me).into_iter().cloned().collect();

        Some(FactionView {
            viewer,
            turn: world.turn,
            month: world.month,
            season: world.season(),
            me,
            rivals,
            castles: world.castles.clone(),
            unlockable_skills,
            config: rules.config.clone(),
            invasion_pending: world.pending_invasion.is_some(),
        })
    }

    pub fn castle(&self, name: &str) -> Option<&Castle> {
        self.castles.iter().find(|c| c.name == name)
    }

    pub fn rival(&self, id: FactionId) -> Option<&RivalInfo> {
        self.rivals.iter().find(|r| r.id == id)
    }

    pub fn my_castles(&self) -> impl Iterator<Item = &Castle> {
        self.castles.iter().filter(move |c| c.owner == Some(self.viewer))
    }

    /// Castles not ours that border one of ours, in map order.
    pub fn reachable_targets(&self) -> Vec<&Castle> {
        self.castles
            .iter()
            .filter(|c| c.owner != Some(self.viewer))
            .filter(|c| {
                self.my_castles().any(|mine| mine.adjacent.iter().any(|a| *a == c.name))
            })
            .collect()
    }
}
