// ═══════════════════════════════════════════════════════════════════════
// Utility Agent — layered utility model for non-player factions
//
//   Strategy  — classify posture from relative strength and recent battles
//   Domestic  — develop / recruit / train / upgrade / unlock a skill
//   Combat    — attack the best reachable target by power ratio
//   Diplomacy — pick a diplomatic move from relation thresholds
//
// Each layer scores its candidates and emits the best affordable one.
// Costs are charged against a running budget so later layers never plan
// with points an earlier layer already spent.
// ═══════════════════════════════════════════════════════════════════════

use rand::Rng;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};

use crate::agent::{check_view, Agent, DecisionError, NpcAction, NpcTurnResult};
use kingdom_engine::diplomacy::DiplomaticAction;
use kingdom_engine::engine::{action_cost, deployable, Action, ActionCost, DevelopFocus};
use kingdom_engine::types::*;
use kingdom_engine::visibility::{FactionView, RivalInfo};

/// Random noise added to every score to break ties.
const JITTER: f64 = 0.05;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Posture {
    Growth,
    Offensive,
    Defensive,
}

/// Strongest rival that borders us, or the strongest
/// rival anywhere if none does.
fn main_threat(view: &FactionView) -> Option<&RivalInfo> {
    let borders = |r: &&RivalInfo| {
        view.reachable_targets().iter().any(|c| c.owner == Some(r.id))
    };
    view.rivals
        .iter()
        .filter(borders)
        .max_by_key(|r| r.troops)
        .or_else(|| view.rivals.iter().max_by_key(|r| r.troops))
}

pub fn assess_posture(view: &FactionView) -> Posture {
    let mine = f64::from(view.me.points.troops);
    let threat = main_threat(view).map_or(0, |r| r.troops);
    let ratio = if threat == 0 { 2.0 } else { mine / f64::from(threat) };
    let recent_losses = view.me.recent_battles.iter().filter(|b| **b == BattleOutcome::Lost).count();
    let aggression = f64::from(view.me.personality.aggression) / 100.0;

    if ratio < 0.8 || recent_losses >= 2 {
        Posture::Defensive
    } else if ratio >= 1.5 - 0.5 * aggression {
        Posture::Offensive
    } else {
        Posture::Growth
    }
}

/// The faction's pools as the turn's actions drain them.
struct Budget(Faction);

impl Budget {
    fn cost(&self, action: &Action, view: &FactionView) -> ActionCost {
        action_cost(action, &self.0, &view.config)
    }

    fn affordable(&self, action: &Action, view: &FactionView) -> bool {
        let skill_ok = match action {
            Action::UnlockSkill(id) => view
                .unlockable_skills
                .iter()
                .any(|s| &s.id == id && s.sp_cost <= self.0.points.sp),
            _ => true,
        };
        skill_ok && self.cost(action, view).affordable(&self.0)
    }

    fn charge(&mut self, action: &Action, view: &FactionView) {
        let c = self.cost(action, view);
        let f = &mut self.0;
        f.points.ap = f.points.ap.saturating_sub(c.ap);
        f.gold = f.gold.saturating_sub(c.gold);
        f.food = f.food.saturating_sub(c.food);
        f.points.ip = f.points.ip.saturating_sub(c.ip);
        f.points.dp = f.points.dp.saturating_sub(c.dp);
        if let Action::UnlockSkill(id) = action {
            if let Some(skill) = view.unlockable_skills.iter().find(|s| &s.id == id) {
                f.points.sp = f.points.sp.saturating_sub(skill.sp_cost);
            }
        }
    }
}

struct Candidate {
    action: Action,
    score: f64,
    details: String,
}

impl Candidate {
    fn new(action: Action, score: f64, details: impl Into<String>) -> Self {
        Candidate { action, score, details: details.into() }
    }
}

pub struct UtilityAgent {
    faction: FactionId,
    rng: ChaCha8Rng,
}

impl UtilityAgent {
    pub fn new(faction: FactionId, seed: u64) -> Self {
        UtilityAgent { faction, rng: ChaCha8Rng::seed_from_u64(seed) }
    }

    /// Best affordable candidate after jitter, charged to the budget.
    fn pick(&mut self, mut candidates: Vec<Candidate>, budget: &mut Budget, view: &FactionView) -> Option<NpcAction> {
        for c in &mut candidates {
            c.score += self.rng.gen::<f64>() * JITTER;
        }
        candidates.sort_by(|a, b| b.score.total_cmp(&a.score));
        let best = candidates
            .into_iter()
            .filter(|c| c.score > 0.0)
            .find(|c| budget.affordable(&c.action, view))?;
        budget.charge(&best.action, view);
        Some(NpcAction::new(best.action, best.details))
    }

    fn domestic(&self, view: &FactionView, posture: Posture) -> Vec<Candidate> {
        let me = &view.me;
        let development = f64::from(me.personality.development) / 100.0;
        let food_upkeep = me.points.troops / 1000;
        let gold_need = if me.gold < 100 { 1.5 } else { 1.0 };
        let food_need = if me.food < food_upkeep * 3 { 1.5 } else { 0.8 };
        let mut out = Vec::new();

        for city in &me.cities {
            let foci = [
                (DevelopFocus::Commerce, city.commerce, gold_need),
                (DevelopFocus::Agriculture, city.agriculture, food_need),
                (DevelopFocus::Defense, city.defense, if posture == Posture::Defensive { 1.2 } else { 0.4 }),
            ];
            for (focus, value, weight) in foci {
                let room = f64::from(100u32.saturating_sub(value)) / 100.0;
                out.push(Candidate::new(
                    Action::DevelopCity { city: city.name.clone(), focus },
                    room * weight * (0.5 + development / 2.0),
                    format!("{} {focus:?} at {value}", city.name),
                ));
            }
        }

        let recruit = match posture {
            Posture::Defensive => 0.9,
            Posture::Offensive => 0.6,
            Posture::Growth => 0.3,
        };
        let troops = 5_000u32.min(me.ruler_level.deployment_cap);
        out.push(Candidate::new(Action::Recruit { troops }, recruit, format!("{posture:?} levy")));

        let drill = if posture == Posture::Offensive { 1.0 } else { 0.6 };
        out.push(Candidate::new(Action::Train, (1.0 - me.points.training.clamp(0.0, 1.0)) * drill, "drill"));

        out.push(Candidate::new(
            Action::UpgradeFacility(FacilityKind::Market),
            0.35 * development * gold_need,
            "market",
        ));
        out.push(Candidate::new(
            Action::UpgradeFacility(FacilityKind::Farm),
            0.35 * development * food_need,
            "farm",
        ));

        if let Some(skill) = view.unlockable_skills.iter().min_by_key(|s| s.sp_cost) {
            out.push(Candidate::new(Action::UnlockSkill(skill.id.clone()), 0.7, skill.name.clone()));
        }
        out
    }

    fn combat(&self, view: &FactionView, posture: Posture) -> Vec<Candidate> {
        let (share, required) = match posture {
            Posture::Defensive => return Vec::new(),
            Posture::Offensive => (0.7, 1.2),
            Posture::Growth => (0.5, 2.0),
        };
        let risk = (f64::from(view.me.personality.risk_tolerance) - 50.0) / 100.0;
        let required = required - risk;
        let committed = deployable(&view.me, (f64::from(view.me.points.troops) * share) as u32);
        if committed == 0 {
            return Vec::new();
        }

        view.reachable_targets()
            .into_iter()
            .filter(|c| {
                c.owner.and_then(|o| view.rival(o)).map_or(true, |r| {
                    !r.relation.has_treaty(|k| matches!(k, TreatyKind::MilitaryAlliance | TreatyKind::NonAggression))
                })
            })
            .filter_map(|c| {
                let walls = 1.0 + f64::from(c.wall_level) * view.config.combat.wall_bonus_percent / 100.0;
                let defense = f64::from(c.garrison) * c.defense_multiplier * walls;
                let ratio = if defense <= 0.0 { 10.0 } else { f64::from(committed) / defense };
                (ratio >= required).then(|| {
                    let neutral_bonus = if c.owner.is_none() { 0.2 } else { 0.0 };
                    Candidate::new(
                        Action::Attack { target: c.name.clone(), troops: committed, battle_type: BattleType::Siege },
                        ratio.min(5.0) / 5.0 + neutral_bonus,
                        format!("{committed} troops at {:.1}x", ratio),
                    )
                })
            })
            .collect()
    }

    fn diplomacy(&self, view: &FactionView, posture: Posture) -> Vec<Candidate> {
        let cfg = &view.config.diplomacy;
        let me = &view.me;
        let diplomacy = f64::from(me.personality.diplomacy) / 100.0;
        let aggression = f64::from(me.personality.aggression) / 100.0;
        let threat = main_threat(view).map(|r| r.id);
        let mut out = Vec::new();

        for rival in &view.rivals {
            let rel = &rival.relation;
            let talk = |action| Action::Diplomacy { action, target: rival.id };
            let has = |kind: TreatyKind| rel.has_treaty(|k| *k == kind);

            if rel.score >= cfg.alliance_min_score && !has(TreatyKind::MilitaryAlliance) {
                let need = if posture == Posture::Defensive { 0.9 } else { 0.5 };
                out.push(Candidate::new(talk(DiplomaticAction::ProposeAlliance), need * (0.5 + diplomacy), "alliance"));
            }
            if rel.score >= cfg.trade_min_score && !has(TreatyKind::Trade) {
                out.push(Candidate::new(talk(DiplomaticAction::ProposeTrade), 0.5 * diplomacy, "trade"));
            }
            if posture == Posture::Defensive
                && Some(rival.id) == threat
                && rel.score >= cfg.pact_min_score
                && !has(TreatyKind::NonAggression)
            {
                out.push(Candidate::new(talk(DiplomaticAction::NonAggressionPact), 0.8, "buy time"));
            }
            let stronger = f64::from(me.points.troops) >= 2.0 * f64::from(rival.troops);
            if posture == Posture::Offensive && rel.score <= cfg.tribute_max_score && stronger {
                out.push(Candidate::new(talk(DiplomaticAction::DemandTribute), 0.6 * aggression, "tribute"));
            }
            if posture == Posture::Offensive && rel.score < -60 && rel.relation_type != RelationType::War {
                out.push(Candidate::new(talk(DiplomaticAction::DeclareWar), 0.4 * aggression, "war"));
            }
            if rel.score < cfg.alliance_min_score {
                let weight = if Some(rival.id) == threat { 0.45 } else { 0.25 };
                out.push(Candidate::new(talk(DiplomaticAction::ImproveRelations), weight * diplomacy, "goodwill"));
            }
        }
        out
    }
}

impl Agent for UtilityAgent {
    fn name(&self) -> &str {
        "Utility"
    }

    fn faction(&self) -> FactionId {
        self.faction
    }

    fn decide(&mut self, view: &FactionView) -> Result<NpcTurnResult, DecisionError> {
        check_view(self.faction, view)?;
        let posture = assess_posture(view);
        let mut budget = Budget(view.me.clone());
        let mut actions = Vec::new();

        let domestic = self.domestic(view, posture);
        actions.extend(self.pick(domestic, &mut budget, view));
        let combat = self.combat(view, posture);
        actions.extend(self.pick(combat, &mut budget, view));
        let diplomacy = self.diplomacy(view, posture);
        actions.extend(self.pick(diplomacy, &mut budget, view));

        let labels: Vec<&str> = actions.iter().map(|a| a.action.label()).collect();
        Ok(NpcTurnResult {
            faction_id: self.faction,
            summary: format!("{posture:?}: {}", if labels.is_empty() { "rests".into() } else { labels.join(", ") }),
            actions,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kingdom_engine::engine::RuleSet;
    use kingdom_engine::map::{AKANE, AOYAMA, KUROGANE, SEIRAN};
    use kingdom_engine::setup::{create_world, Scenario};

    fn world() -> (WorldState, RuleSet) {
        let rules = RuleSet::default();
        let world = create_world(&Scenario::default(), &rules.config).unwrap();
        (world, rules)
    }

    #[test]
    fn even_start_is_growth() {
        let (world, rules) = world();
        let view = FactionView::build(&world, SEIRAN, &rules).unwrap();
        assert_eq!(assess_posture(&view), Posture::Growth);
    }

    #[test]
    fn outnumbered_or_beaten_is_defensive() {
        let (mut world, rules) = world();
        world.faction_mut(AKANE).unwrap().points.troops = 10_000;
        let view = FactionView::build(&world, AKANE, &rules).unwrap();
        assert_eq!(assess_posture(&view), Posture::Defensive);

        let (mut world, rules) = self::world();
        let f = world.faction_mut(AOYAMA).unwrap();
        f.recent_battles.extend([BattleOutcome::Lost, BattleOutcome::Lost]);
        let view = FactionView::build(&world, AOYAMA, &rules).unwrap();
        assert_eq!(assess_posture(&view), Posture::Defensive);
    }

    #[test]
    fn one_action_per_layer_within_budget() {
        let (world, rules) = world();
        let view = FactionView::build(&world, AKANE, &rules).unwrap();
        let mut agent = UtilityAgent::new(AKANE, 3);
        let result = agent.decide(&view).unwrap();

        assert_eq!(result.faction_id, AKANE);
        assert!(!result.actions.is_empty() && result.actions.len() <= 3);
        let total_ap: u32 = result
            .actions
            .iter()
            .map(|a| action_cost(&a.action, &view.me, &view.config).ap)
            .sum();
        assert!(total_ap <= view.me.points.ap);
        let attacks = result.actions.iter().filter(|a| a.action.label() == "attack").count();
        assert!(attacks <= 1);
    }

    #[test]
    fn strong_faction_attacks_weak_neutral() {
        let (mut world, rules) = world();
        world.faction_mut(KUROGANE).unwrap().points.troops = 60_000;
        let view = FactionView::build(&world, KUROGANE, &rules).unwrap();
        let mut agent = UtilityAgent::new(KUROGANE, 1);
        let result = agent.decide(&view).unwrap();
        let attack = result.actions.iter().find(|a| a.action.label() == "attack");
        assert!(attack.is_some(), "{result:?}");
    }

    #[test]
    fn treaty_partner_is_never_attacked() {
        let (mut world, rules) = world();
        world.faction_mut(AKANE).unwrap().points.troops = 90_000;
        for c in world.castles.iter_mut().filter(|c| c.owner.is_none()) {
            c.garrison = 60_000;
        }
        world
            .relation_mut(AKANE, KUROGANE)
            .treaties
            .push(Treaty { kind: TreatyKind::NonAggression, turns_remaining: 5 });
        let view = FactionView::build(&world, AKANE, &rules).unwrap();
        for seed in 0..8 {
            let result = UtilityAgent::new(AKANE, seed).decide(&view).unwrap();
            for a in &result.actions {
                if let Action::Attack { target, .. } = &a.action {
                    assert_ne!(world.castle(target).unwrap().owner, Some(KUROGANE));
                }
            }
        }
    }
}
