// ═══════════════════════════════════════════════════════════════════════
// Diplomacy Engine — action outcomes, relation updates, treaty lifecycle
// ═══════════════════════════════════════════════════════════════════════

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::config::{DiplomacyConfig, EconomyConfig};
use crate::types::{
    apply_delta, DiplomaticRelation, Faction, FactionId, RelationType, Treaty, TreatyKind, WorldState,
};

pub const MIN_SCORE: i32 = -100;
pub const MAX_SCORE: i32 = 100;

/// Penalty for a proposal refused on preconditions.
const PRECONDITION_REJECTION: i32 = -5;
/// Penalty for a proposal refused on the acceptance roll.
const ROLLED_REJECTION: i32 = -2;
const TRIBUTE_FAILURE: i32 = -25;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DiplomaticAction {
    ProposeAlliance,
    ProposeTrade,
    NonAggressionPact,
    DeclareWar,
    DemandTribute,
    ImproveRelations,
}

impl DiplomaticAction {
    pub const ALL: [DiplomaticAction; 6] = [
        DiplomaticAction::ProposeAlliance,
        DiplomaticAction::ProposeTrade,
        DiplomaticAction::NonAggressionPact,
        DiplomaticAction::DeclareWar,
        DiplomaticAction::DemandTribute,
        DiplomaticAction::ImproveRelations,
    ];
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiplomacyResult {
    pub success: bool,
    pub message: String,
    pub relation_change: i32,
    /// Set when the action forces a relation type regardless of score.
    pub new_relation_type: Option<RelationType>,
    pub new_treaty: Option<Treaty>,
}

impl DiplomacyResult {
    fn rejected(message: impl Into<String>, relation_change: i32) -> Self {
        DiplomacyResult {
            success: false,
            message: message.into(),
            relation_change,
            new_relation_type: None,
            new_treaty: None,
        }
    }

    /// Relation change from a hostile act outside diplomacy, e.g. an attack.
    pub fn hostility(message: impl Into<String>, relation_change: i32) -> Self {
        DiplomacyResult::rejected(message, relation_change)
    }

    fn accepted(message: impl Into<String>, relation_change: i32, treaty: Option<Treaty>) -> Self {
        DiplomacyResult {
            success: true,
            message: message.into(),
            relation_change,
            new_relation_type: None,
            new_treaty: treaty,
        }
    }
}

/// `min(max, (score + targetDiplomacy) / 200)`, floored at zero.
pub fn accept_chance(score: i32, target: &Faction, config: &DiplomacyConfig) -> f64 {
    (f64::from(score + i32::from(target.personality.diplomacy)) / 200.0).clamp(0.0, config.max_accept_chance)
}

/// Fear-based chance that a tribute demand is met.
pub fn tribute_chance(initiator: &Faction, target: &Faction, config: &DiplomacyConfig) -> f64 {
    if target.points.troops == 0 {
        return config.max_accept_chance;
    }
    let ratio = f64::from(initiator.points.troops) / f64::from(target.points.troops);
    (0.2 + 0.4 * (ratio - 0.5)).clamp(0.0, config.max_accept_chance)
}

fn proposal<R: Rng + ?Sized>(
    relation: &DiplomaticRelation,
    target: &Faction,
    min_score: i32,
    success_change: i32,
    treaty: Treaty,
    label: &str,
    config: &DiplomacyConfig,
    rng: &mut R,
) -> DiplomacyResult {
    if relation.score < min_score {
        return DiplomacyResult::rejected(
            format!("{} refuses to consider a {label}", target.name),
            PRECONDITION_REJECTION,
        );
    }
    if rng.gen::<f64>() < accept_chance(relation.score, target, config) {
        DiplomacyResult::accepted(format!("{} agrees to a {label}", target.name), success_change, Some(treaty))
    } else {
        DiplomacyResult::rejected(format!("{} declines the {label}", target.name), ROLLED_REJECTION)
    }
}

/// Outcome of one diplomatic action. Pure apart from the RNG draws; the
/// relation is not modified here (see [`update_relation`]).
pub fn execute<R: Rng + ?Sized>(
    action: DiplomaticAction,
    initiator: &Faction,
    target: &Faction,
    relation: &DiplomaticRelation,
    config: &DiplomacyConfig,
    rng: &mut R,
) -> DiplomacyResult {
    match action {
        DiplomaticAction::ProposeAlliance => proposal(
            relation,
            target,
            config.alliance_min_score,
            20,
            Treaty { kind: TreatyKind::MilitaryAlliance, turns_remaining: config.alliance_turns },
            "military alliance",
            config,
            rng,
        ),
        DiplomaticAction::ProposeTrade => proposal(
            relation,
            target,
            config.trade_min_score,
            10,
            Treaty { kind: TreatyKind::Trade, turns_remaining: config.trade_turns },
            "trade agreement",
            config,
            rng,
        ),
        DiplomaticAction::NonAggressionPact => proposal(
            relation,
            target,
            config.pact_min_score,
            5,
            Treaty { kind: TreatyKind::NonAggression, turns_remaining: config.pact_turns },
            "non-aggression pact",
            config,
            rng,
        ),
        DiplomaticAction::DeclareWar => DiplomacyResult {
            success: true,
            message: format!("{} declares war on {}", initiator.name, target.name),
            relation_change: -50,
            new_relation_type: Some(RelationType::War),
            new_treaty: None,
        },
        DiplomaticAction::DemandTribute => {
            let strong_enough = f64::from(initiator.points.troops)
                >= config.tribute_min_troop_ratio * f64::from(target.points.troops);
            if relation.score > config.tribute_max_score || !strong_enough {
                return DiplomacyResult::rejected(
                    format!("{} scoffs at the demand for tribute", target.name),
                    TRIBUTE_FAILURE,
                );
            }
            if rng.gen::<f64>() < tribute_chance(initiator, target, config) {
                DiplomacyResult::accepted(
                    format!("{} agrees to pay tribute", target.name),
                    -20,
                    Some(Treaty { kind: TreatyKind::Tribute { payer: target.id }, turns_remaining: config.tribute_turns }),
                )
            } else {
                DiplomacyResult::rejected(format!("{} refuses to pay tribute", target.name), TRIBUTE_FAILURE)
            }
        }
        DiplomaticAction::ImproveRelations => {
            let gain = rng.gen_range(5..=15);
            DiplomacyResult::accepted(format!("Relations with {} improve", target.name), gain, None)
        }
    }
}

/// Fold a result into the relation: clamp the score, re-derive the type
/// unless forced, attach any new treaty. Entering War, or declaring it,
/// clears every treaty.
pub fn update_relation(relation: &mut DiplomaticRelation, result: &DiplomacyResult) {
    let was_war = relation.relation_type == RelationType::War;
    relation.score = (relation.score + result.relation_change).clamp(MIN_SCORE, MAX_SCORE);
    relation.relation_type = result
        .new_relation_type
        .unwrap_or_else(|| RelationType::from_score(relation.score));
    relation.type_forced = result.new_relation_type.is_some();
    if relation.relation_type == RelationType::War && (relation.type_forced || !was_war) {
        relation.treaties.clear();
    }
    if let Some(treaty) = result.new_treaty {
        relation.treaties.retain(|t| t.kind != treaty.kind);
        relation.treaties.push(treaty);
    }
}

/// Age every treaty by one turn; expired ones are dropped.
pub fn advance_treaties(relations: &mut [DiplomaticRelation]) {
    for relation in relations {
        for treaty in &mut relation.treaties {
            treaty.turns_remaining = treaty.turns_remaining.saturating_sub(1);
        }
        relation.treaties.retain(|t| t.turns_remaining > 0);
    }
}

/// Run an action against the world's relation for the pair. None if
/// either faction is gone.
pub fn perform<R: Rng + ?Sized>(
    world: &mut WorldState,
    action: DiplomaticAction,
    initiator: FactionId,
    target: FactionId,
    config: &DiplomacyConfig,
    rng: &mut R,
) -> Option<DiplomacyResult> {
    if initiator == target {
        tracing::warn!(%initiator, "diplomatic action targeting itself");
        return None;
    }
    let (Some(from), Some(to)) = (world.faction(initiator), world.faction(target)) else {
        tracing::warn!(%initiator, %target, "diplomatic action with unknown faction");
        return None;
    };
    let relation = world.relation(initiator, target);
    let result = execute(action, from, to, &relation, config, rng);
    tracing::debug!(%initiator, %target, ?action, success = result.success, change = result.relation_change, "diplomacy");
    update_relation(world.relation_mut(initiator, target), &result);
    Some(result)
}

/// Per-turn treaty income: trade pays both sides, tribute moves a share of
/// the payer's gold to the receiver.
pub fn settle_treaties(world: &mut WorldState, config: &EconomyConfig) {
    let mut transfers: Vec<(FactionId, i64)> = Vec::new();
    for relation in &world.relations {
        for treaty in &relation.treaties {
            match treaty.kind {
                TreatyKind::Trade => {
                    transfers.push((relation.a, i64::from(config.trade_income)));
                    transfers.push((relation.b, i64::from(config.trade_income)));
                }
                TreatyKind::Tribute { payer } => {
                    let receiver = relation.other(payer);
                    let gold = world.faction(payer).map_or(0, |f| f.gold);
                    let amount = (f64::from(gold) * config.tribute_rate).floor() as i64;
                    transfers.push((payer, -amount));
                    transfers.push((receiver, amount));
                }
                TreatyKind::MilitaryAlliance | TreatyKind::NonAggression => {}
            }
        }
    }
    for (id, delta) in transfers {
        if let Some(f) = world.faction_mut(id) {
            f.gold = apply_delta(f.gold, delta);
        }
    }
}

/// True when a treaty forbids `attacker` from striking `defender`.
pub fn forbids_attack(world: &WorldState, attacker: FactionId, defender: FactionId) -> bool {
    world
        .relation(attacker, defender)
        .has_treaty(|k| matches!(k, TreatyKind::MilitaryAlliance | TreatyKind::NonAggression))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::setup::{test_faction, test_world};
    use rand::{RngCore, SeedableRng};
    use rand_chacha::ChaCha8Rng;

    fn relation_with(score: i32) -> DiplomaticRelation {
        let mut r = DiplomaticRelation::neutral(FactionId(0), FactionId(1));
        r.score = score;
        r.relation_type = RelationType::from_score(score);
        r
    }

    #[test]
    fn alliance_below_threshold_rejected_without_rng() {
        let a = test_faction(0);
        let b = test_faction(1);
        let relation = relation_with(25);
        let mut rng = ChaCha8Rng::seed_from_u64(3);
        let mut untouched = rng.clone();

        let result = execute(DiplomaticAction::ProposeAlliance, &a, &b, &relation, &DiplomacyConfig::default(), &mut rng);
        assert!(!result.success);
        assert_eq!(result.relation_change, -5);
        assert!(result.new_treaty.is_none());
        assert_eq!(rng.next_u64(), untouched.next_u64());
    }

    #[test]
    fn accept_chance_is_capped() {
        let mut b = test_faction(1);
        b.personality.diplomacy = 100;
        let config = DiplomacyConfig::default();
        assert!((accept_chance(100, &b, &config) - 0.9).abs() < 1e-9);
        assert!((accept_chance(40, &b, &config) - 0.7).abs() < 1e-9);
        b.personality.diplomacy = 0;
        assert_eq!(accept_chance(-80, &b, &config), 0.0);
    }

    #[test]
    fn war_forces_type_and_clears_treaties() {
        let a = test_faction(0);
        let b = test_faction(1);
        let mut relation = relation_with(70);
        relation.treaties.push(Treaty { kind: TreatyKind::Trade, turns_remaining: 4 });
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        let result = execute(DiplomaticAction::DeclareWar, &a, &b, &relation, &DiplomacyConfig::default(), &mut rng);
        update_relation(&mut relation, &result);
        assert_eq!(relation.score, 20);
        // Forced override wins over the score-derived Friendly
        assert_eq!(relation.relation_type, RelationType::War);
        assert!(relation.treaties.is_empty());
    }

    #[test]
    fn tribute_precondition_failure_costs_25() {
        let mut a = test_faction(0);
        let mut b = test_faction(1);
        a.points.troops = 1_000;
        b.points.troops = 10_000;
        let relation = relation_with(0);
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        let result = execute(DiplomaticAction::DemandTribute, &a, &b, &relation, &DiplomacyConfig::default(), &mut rng);
        assert!(!result.success);
        assert_eq!(result.relation_change, -25);
    }

    #[test]
    fn tribute_success_names_target_as_payer() {
        let mut a = test_faction(0);
        let b = test_faction(1);
        a.points.troops = 50_000;
        let relation = relation_with(-40);
        let config = DiplomacyConfig::default();
        let successes: Vec<DiplomacyResult> = (0..40)
            .map(|seed| execute(DiplomaticAction::DemandTribute, &a, &b, &relation, &config, &mut ChaCha8Rng::seed_from_u64(seed)))
            .filter(|r| r.success)
            .collect();
        assert!(!successes.is_empty());
        for r in successes {
            assert_eq!(r.relation_change, -20);
            assert_eq!(r.new_treaty.map(|t| t.kind), Some(TreatyKind::Tribute { payer: FactionId(1) }));
        }
    }

    #[test]
    fn improve_relations_within_range() {
        let a = test_faction(0);
        let b = test_faction(1);
        let relation = relation_with(0);
        for seed in 0..30 {
            let r = execute(DiplomaticAction::ImproveRelations, &a, &b, &relation, &DiplomacyConfig::default(), &mut ChaCha8Rng::seed_from_u64(seed));
            assert!(r.success);
            assert!((5..=15).contains(&r.relation_change));
        }
    }

    #[test]
    fn score_clamped_and_relabelled() {
        let mut relation = relation_with(95);
        let result = DiplomacyResult::accepted("", 20, None);
        update_relation(&mut relation, &result);
        assert_eq!(relation.score, 100);
        assert_eq!(relation.relation_type, RelationType::Alliance);

        let mut relation = relation_with(-90);
        update_relation(&mut relation, &DiplomacyResult::rejected("", -25));
        assert_eq!(relation.score, -100);
        assert_eq!(relation.relation_type, RelationType::War);
    }

    #[test]
    fn treaty_expires_after_exactly_n_turns() {
        let mut relations = vec![relation_with(30)];
        relations[0].treaties.push(Treaty { kind: TreatyKind::Trade, turns_remaining: 3 });
        advance_treaties(&mut relations);
        advance_treaties(&mut relations);
        assert_eq!(relations[0].treaties.len(), 1);
        advance_treaties(&mut relations);
        assert!(relations[0].treaties.is_empty());
    }

    #[test]
    fn trade_and_tribute_income() {
        let mut world = test_world(Vec::new(), 2);
        world.factions[0].gold = 100;
        world.factions[1].gold = 200;
        world.relation_mut(FactionId(0), FactionId(1)).treaties = vec![
            Treaty { kind: TreatyKind::Trade, turns_remaining: 2 },
            Treaty { kind: TreatyKind::Tribute { payer: FactionId(1) }, turns_remaining: 2 },
        ];
        settle_treaties(&mut world, &EconomyConfig::default());
        assert_eq!(world.factions[0].gold, 100 + 15 + 20);
        assert_eq!(world.factions[1].gold, 200 + 15 - 20);
    }

    #[test]
    fn perform_with_unknown_faction_is_noop() {
        let mut world = test_world(Vec::new(), 1);
        let mut rng = ChaCha8Rng::seed_from_u64(0);
        let before = world.clone();
        let r = perform(&mut world, DiplomaticAction::DeclareWar, FactionId(0), FactionId(9), &DiplomacyConfig::default(), &mut rng);
        assert!(r.is_none());
        assert_eq!(world, before);
    }
}
