// ═══════════════════════════════════════════════════════════════════════
// Random Agent — picks affordable actions at random.
// Serves as baseline and for testing engine stability.
// ═══════════════════════════════════════════════════════════════════════

use crate::agent::{check_view, Agent, DecisionError, NpcAction, NpcTurnResult};
use kingdom_engine::diplomacy::DiplomaticAction;
use kingdom_engine::engine::{action_cost, Action, DevelopFocus};
use kingdom_engine::invasion::{ResponseKind, ResponseOption};
use kingdom_engine::types::*;
use kingdom_engine::visibility::FactionView;
use rand::seq::SliceRandom;
use rand::Rng;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

const FOCI: [DevelopFocus; 3] = [DevelopFocus::Commerce, DevelopFocus::Agriculture, DevelopFocus::Defense];
const FACILITIES: [FacilityKind; 3] = [FacilityKind::Market, FacilityKind::Farm, FacilityKind::Bank];

pub struct RandomAgent {
    faction: FactionId,
    rng: ChaCha8Rng,
}

impl RandomAgent {
    pub fn new(faction: FactionId, seed: u64) -> Self {
        RandomAgent { faction, rng: ChaCha8Rng::seed_from_u64(seed) }
    }

    fn random_action(&mut self, view: &FactionView) -> Option<Action> {
        let me = &view.me;
        let action = match self.rng.gen_range(0..7) {
            0 => {
                let city = me.cities.choose(&mut self.rng)?;
                let focus = *FOCI.choose(&mut self.rng)?;
                Action::DevelopCity { city: city.name.clone(), focus }
            }
            1 => Action::Recruit { troops: self.rng.gen_range(1..=10) * 1_000 },
            2 => Action::Train,
            3 => Action::UpgradeFacility(*FACILITIES.choose(&mut self.rng)?),
            4 => {
                let target = view.reachable_targets().choose(&mut self.rng)?.name.clone();
                let troops = self.rng.gen_range(0..=me.points.troops);
                Action::Attack { target, troops, battle_type: BattleType::Siege }
            }
            5 => {
                let rival = view.rivals.choose(&mut self.rng)?;
                let action = *DiplomaticAction::ALL.choose(&mut self.rng)?;
                Action::Diplomacy { action, target: rival.id }
            }
            _ => Action::UnlockSkill(view.unlockable_skills.choose(&mut self.rng)?.id.clone()),
        };
        Some(action)
    }
}

impl Agent for RandomAgent {
    fn name(&self) -> &str {
        "Random"
    }

    fn faction(&self) -> FactionId {
        self.faction
    }

    fn decide(&mut self, view: &FactionView) -> Result<NpcTurnResult, DecisionError> {
        check_view(self.faction, view)?;
        let mut actions = Vec::new();
        let mut ap = view.me.points.ap;
        for _ in 0..self.rng.gen_range(1..=3) {
            let Some(action) = self.random_action(view) else { continue };
            let cost = action_cost(&action, &view.me, &view.config);
            if cost.ap <= ap && cost.affordable(&view.me) {
                ap -= cost.ap;
                actions.push(NpcAction::new(action, "random"));
            }
        }
        Ok(NpcTurnResult {
            faction_id: self.faction,
            summary: format!("{} random actions", actions.len()),
            actions,
        })
    }

    fn respond_to_invasion(&mut self, options: &[ResponseOption]) -> ResponseKind {
        let open: Vec<&ResponseOption> = options.iter().filter(|o| o.available).collect();
        open.choose(&mut self.rng).map_or(ResponseKind::Battle, |o| o.kind)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kingdom_engine::engine::RuleSet;
    use kingdom_engine::map::AOYAMA;
    use kingdom_engine::setup::{create_world, Scenario};

    #[test]
    fn random_turns_are_seeded() {
        let rules = RuleSet::default();
        let world = create_world(&Scenario::default(), &rules.config).unwrap();
        let view = FactionView::build(&world, AOYAMA, &rules).unwrap();
        let a = RandomAgent::new(AOYAMA, 77).decide(&view).unwrap();
        let b = RandomAgent::new(AOYAMA, 77).decide(&view).unwrap();
        assert_eq!(a, b);
        assert!(a.actions.len() <= 3);
    }
}
