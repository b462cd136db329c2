// ═══════════════════════════════════════════════════════════════════════
// Skill tree — static reference data plus the unlock rule
// ═══════════════════════════════════════════════════════════════════════

use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use crate::error::EngineError;
use crate::types::Faction;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum SkillEffect {
    ApRegen(u32),
    IpRegen(u32),
    /// Multiplier bonus on diplomacy regeneration (0.5 = +50%).
    DpMultiplier(f64),
    TrainingPerTurn(f64),
    DeploymentCap(u32),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SkillDef {
    pub id: String,
    pub name: String,
    pub effect: SkillEffect,
    pub sp_cost: u32,
    #[serde(default)]
    pub prerequisites: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SkillTree {
    skills: Vec<SkillDef>,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum UnlockError {
    #[error("unknown skill")]
    UnknownSkill,
    #[error("skill already unlocked")]
    AlreadyUnlocked,
    #[error("requires {0} first")]
    MissingPrerequisite(String),
    #[error("needs {needed} SP, has {available}")]
    NotEnoughSp { needed: u32, available: u32 },
}

/// Summed skill bonuses for one faction.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct SkillBonuses {
    pub ap_regen: u32,
    pub ip_regen: u32,
    pub dp_multiplier: f64,
    pub training_per_turn: f64,
    pub deployment_cap: u32,
}

impl SkillTree {
    pub fn new(skills: Vec<SkillDef>) -> Result<Self, EngineError> {
        let mut seen: HashSet<&str> = HashSet::new();
        for s in &skills {
            if !seen.insert(s.id.as_str()) {
                return Err(EngineError::InvalidScenario(format!("duplicate skill id {}", s.id)));
            }
        }
        for s in &skills {
            for p in &s.prerequisites {
                if !seen.contains(p.as_str()) {
                    return Err(EngineError::InvalidScenario(format!(
                        "skill {} requires unknown skill {}", s.id, p
                    )));
                }
            }
        }
        Ok(SkillTree { skills })
    }

    pub fn get(&self, id: &str) -> Option<&SkillDef> {
        self.skills.iter().find(|s| s.id == id)
    }

    pub fn all(&self) -> &[SkillDef] {
        &self.skills
    }

    pub fn bonuses(&self, faction: &Faction) -> SkillBonuses {
        let mut b = SkillBonuses::default();
        for def in faction.skills.iter().filter_map(|id| self.get(id)) {
            match def.effect {
                SkillEffect::ApRegen(v) => b.ap_regen = b.ap_regen.saturating_add(v),
                SkillEffect::IpRegen(v) => b.ip_regen = b.ip_regen.saturating_add(v),
                SkillEffect::DpMultiplier(v) => b.dp_multiplier += v,
                SkillEffect::TrainingPerTurn(v) => b.training_per_turn += v,
                SkillEffect::DeploymentCap(v) => b.deployment_cap = b.deployment_cap.saturating_add(v),
            }
        }
        b
    }

    /// Skills the faction could unlock right now (prerequisites met, not owned).
    pub fn available(&self, faction: &Faction) -> Vec<&SkillDef> {
        self.skills
            .iter()
            .filter(|s| !faction.has_skill(&s.id))
            .filter(|s| s.prerequisites.iter().all(|p| faction.has_skill(p)))
            .collect()
    }

    pub fn check_unlock(&self, faction: &Faction, id: &str) -> Result<&SkillDef, UnlockError> {
        let def = self.get(id).ok_or(UnlockError::UnknownSkill)?;
        if faction.has_skill(id) {
            return Err(UnlockError::AlreadyUnlocked);
        }
        if let Some(missing) = def.prerequisites.iter().find(|p| !faction.has_skill(p)) {
            return Err(UnlockError::MissingPrerequisite(missing.clone()));
        }
        if faction.points.sp < def.sp_cost {
            return Err(UnlockError::NotEnoughSp { needed: def.sp_cost, available: faction.points.sp });
        }
        Ok(def)
    }

    /// Spend SP and record the skill. Leaves the faction untouched on error.
    pub fn unlock(&self, faction: &mut Faction, id: &str) -> Result<(), UnlockError> {
        let def = self.check_unlock(faction, id)?;
        faction.points.sp -= def.sp_cost;
        if let SkillEffect::DeploymentCap(v) = def.effect {
            faction.ruler_level.deployment_cap += v;
        }
        faction.skills.push(def.id.clone());
        Ok(())
    }
}

/// The stock skill tree shipped with the default scenario.
pub fn default_skill_tree() -> Vec<SkillDef> {
    fn skill(id: &str, name: &str, effect: SkillEffect, sp_cost: u32, prereqs: &[&str]) -> SkillDef {
        SkillDef {
            id: id.to_string(),
            name: name.to_string(),
            effect,
            sp_cost,
            prerequisites: prereqs.iter().map(|p| p.to_string()).collect(),
        }
    }
    vec![
        skill("swift_couriers", "Swift Couriers", SkillEffect::ApRegen(1), 3, &[]),
        skill("road_network", "Road Network", SkillEffect::ApRegen(2), 6, &["swift_couriers"]),
        skill("merchant_guilds", "Merchant Guilds", SkillEffect::IpRegen(3), 4, &[]),
        skill("land_survey", "Land Survey", SkillEffect::IpRegen(5), 8, &["merchant_guilds"]),
        skill("envoys", "Envoys", SkillEffect::DpMultiplier(0.5), 4, &[]),
        skill("drill_masters", "Drill Masters", SkillEffect::TrainingPerTurn(0.02), 4, &[]),
        skill("war_college", "War College", SkillEffect::TrainingPerTurn(0.03), 8, &["drill_masters"]),
        skill("levy_reform", "Levy Reform", SkillEffect::DeploymentCap(10_000), 6, &["drill_masters"]),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::setup::test_faction;

    fn tree() -> SkillTree {
        SkillTree::new(default_skill_tree()).unwrap()
    }

    #[test]
    fn unlock_requires_prerequisite() {
        let tree = tree();
        let mut f = test_faction(0);
        f.points.sp = 50;
        assert_eq!(
            tree.unlock(&mut f, "road_network"),
            Err(UnlockError::MissingPrerequisite("swift_couriers".into()))
        );
        tree.unlock(&mut f, "swift_couriers").unwrap();
        tree.unlock(&mut f, "road_network").unwrap();
        assert_eq!(f.points.sp, 50 - 3 - 6);
        assert_eq!(tree.bonuses(&f).ap_regen, 3);
    }

    #[test]
    fn unlock_without_sp_leaves_faction_untouched() {
        let tree = tree();
        let mut f = test_faction(0);
        f.points.sp = 1;
        let before = f.clone();
        assert!(matches!(tree.unlock(&mut f, "envoys"), Err(UnlockError::NotEnoughSp { .. })));
        assert_eq!(f, before);
    }

    #[test]
    fn deployment_skill_raises_cap() {
        let tree = tree();
        let mut f = test_faction(0);
        f.points.sp = 20;
        let cap = f.ruler_level.deployment_cap;
        tree.unlock(&mut f, "drill_masters").unwrap();
        tree.unlock(&mut f, "levy_reform").unwrap();
        assert_eq!(f.ruler_level.deployment_cap, cap + 10_000);
    }

    #[test]
    fn dangling_prerequisite_rejected() {
        let bad = vec![SkillDef {
            id: "a".into(),
            name: "A".into(),
            effect: SkillEffect::ApRegen(1),
            sp_cost: 1,
            prerequisites: vec!["ghost".into()],
        }];
        assert!(SkillTree::new(bad).is_err());
    }
}
