// ═══════════════════════════════════════════════════════════════════════
// Engine-wide test suite: reference scenarios and full campaigns
// ═══════════════════════════════════════════════════════════════════════

use rand::{RngCore, SeedableRng};
use rand_chacha::ChaCha8Rng;

use crate::changes::StateChanges;
use crate::config::{EngineConfig, GarrisonConfig, PointConfig};
use crate::diplomacy::{self, DiplomaticAction};
use crate::engine::*;
use crate::garrison;
use crate::invasion::ResponseKind;
use crate::map::*;
use crate::points;
use crate::save::SaveData;
use crate::setup::{create_world, test_castle, test_faction, test_world, Scenario};
use crate::skills::SkillTree;
use crate::types::*;
use crate::victory::{self, GameEndReason, GameEndResult};
use crate::visibility::FactionView;

// ── Helpers ─────────────────────────────────────────────────────────────

fn default_world() -> WorldState {
    create_world(&Scenario::default(), &EngineConfig::default()).unwrap()
}

/// Deterministic scripted orders: everyone develops and trains, non-player
/// factions attack their first reachable target every third turn.
fn scripted_orders(world: &WorldState, rules: &RuleSet) -> Vec<(FactionId, Action)> {
    let mut orders = Vec::new();
    for &id in &world.turn_order {
        let Some(view) = FactionView::build(world, id, rules) else { continue };
        if let Some(city) = view.me.cities.first() {
            orders.push((id, Action::DevelopCity { city: city.name.clone(), focus: DevelopFocus::Agriculture }));
        }
        orders.push((id, Action::Train));
        if id != world.player && world.turn % 3 == 0 {
            if let Some(target) = view.reachable_targets().first() {
                orders.push((
                    id,
                    Action::Attack { target: target.name.clone(), troops: view.me.points.troops / 2, battle_type: BattleType::Siege },
                ));
            }
        }
    }
    orders
}

fn play(seed: u64, turns: u32) -> WorldState {
    let rules = RuleSet::default();
    let mut world = default_world();
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    for _ in 0..turns {
        let orders = scripted_orders(&world, &rules);
        let (_, summary) = advance_turn(&mut world, &orders, &rules, &mut rng);
        if summary.game_end.is_some() {
            break;
        }
    }
    world
}

fn assert_world_invariants(world: &WorldState) {
    for c in &world.castles {
        assert!(c.garrison <= c.max_garrison, "{} over capacity", c.name);
    }
    for f in &world.factions {
        let garrisoned: u64 = world.owned_castles(f.id).iter().map(|c| u64::from(c.garrison)).sum();
        assert!(garrisoned <= u64::from(f.points.troops), "{} garrisons more than it has", f.name);
        assert!((0.0..=1.0).contains(&f.points.training));
        assert!((0.0..=MAX_MORALE).contains(&f.points.morale));
        assert!(f.popularity <= 100);
        assert!(f.recent_events.len() <= RECENT_EVENTS_CAP);
        assert!(f.recent_battles.len() <= RECENT_BATTLES_CAP);
    }
    for r in &world.relations {
        assert!((diplomacy::MIN_SCORE..=diplomacy::MAX_SCORE).contains(&r.score));
        assert!(
            r.type_forced || r.relation_type == RelationType::from_score(r.score),
            "{:?} does not match score {}",
            r.relation_type,
            r.score
        );
    }
    for t in &world.tasks {
        assert!(t.urgency <= MAX_URGENCY);
        assert!(t.turns_remaining > 0);
    }
    assert!(world.pending_invasion.is_none());
}

// ── Reference scenarios ─────────────────────────────────────────────────

#[test]
fn test_unification_when_all_castles_owned() {
    let castles = (0..45)
        .map(|i| test_castle(&format!("Castle{i}"), CastleGrade::Standard, Some(FactionId(0)), 30_000))
        .collect();
    let mut world = test_world(castles, 2);
    world.factions[0].popularity = 0;
    world.factions[0].gold = 10;

    let end = victory::check(&world, FactionId(0), &Default::default());
    assert_eq!(end, Some(GameEndResult::Victory(GameEndReason::Unification)));
}

#[test]
fn test_alliance_below_threshold_rejected_without_rng() {
    let initiator = test_faction(0);
    let target = test_faction(1);
    let mut relation = DiplomaticRelation::neutral(FactionId(0), FactionId(1));
    relation.score = 25;

    let mut rng = ChaCha8Rng::seed_from_u64(11);
    let result = diplomacy::execute(
        DiplomaticAction::ProposeAlliance,
        &initiator,
        &target,
        &relation,
        &Default::default(),
        &mut rng,
    );
    assert!(!result.success);
    assert_eq!(result.relation_change, -5);
    assert!(result.new_treaty.is_none());
    assert_eq!(rng.next_u64(), ChaCha8Rng::seed_from_u64(11).next_u64());

    diplomacy::update_relation(&mut relation, &result);
    assert_eq!(relation.score, 20);
    assert!(relation.treaties.is_empty());
}

#[test]
fn test_starvation_through_turn_start() {
    let mut world = test_world(vec![test_castle("Hokuto", CastleGrade::Capital, Some(FactionId(0)), 80_000)], 1);
    world.factions[0].points.troops = 50_000;
    world.factions[0].points.ip = 3;
    world.factions[0].food = 500;
    let rules = RuleSet { skills: SkillTree::default(), ..RuleSet::default() };

    let start = begin_turn(&mut world, &rules);
    assert_eq!(start.upkeep[0].points.maintenance_cost, 10);
    let f = &world.factions[0];
    assert_eq!(f.points.ip, 0);
    assert_eq!(f.points.troops, 45_000);
    assert!(world.tasks.iter().any(|t| t.title == "Restore the army's upkeep"));
}

#[test]
fn test_starvation_uses_configured_divisor() {
    let mut f = test_faction(0);
    f.points.troops = 50_000;
    f.points.ip = 3;
    let config = PointConfig { maintenance_divisor: 50_000, ..Default::default() };
    let adv = points::advance(&f, &SkillTree::default(), &config);
    assert_eq!(adv.maintenance_cost, 1);
    assert_eq!(adv.starvation_loss, 0);
    assert_eq!(adv.points.ip, 2);
}

#[test]
fn test_capital_and_frontline_allocation() {
    let me = FactionId(0);
    let mut capital = test_castle("Hokuto", CastleGrade::Capital, Some(me), 80_000);
    capital.adjacent = vec!["Kiso".into()];
    let mut fortress = test_castle("Kiso", CastleGrade::Fortress, Some(me), 60_000);
    fortress.adjacent = vec!["Hokuto".into(), "Minase".into()];
    let mut enemy = test_castle("Minase", CastleGrade::Standard, Some(FactionId(1)), 30_000);
    enemy.adjacent = vec!["Kiso".into()];
    let mut world = test_world(vec![capital, fortress, enemy], 2);
    world.factions[0].capital = "Hokuto".into();
    world.factions[0].points.troops = 100_000;

    let owned = world.owned_castles(me);
    let alloc = garrison::distribute(&owned, 100_000, &world, me, &GarrisonConfig::default());
    assert_eq!(alloc["Kiso"], 55_000);
    // 25 000 reserve plus the 20 000 swept remainder
    assert_eq!(alloc["Hokuto"], 45_000);
    assert_eq!(alloc.values().sum::<u32>(), 100_000);

    garrison::reallocate(&mut world, me, &GarrisonConfig::default());
    assert_eq!(world.castle("Kiso").unwrap().garrison, 55_000);
    assert_eq!(world.castle("Minase").unwrap().garrison, 0);
}

#[test]
fn test_collapse_despite_resources() {
    let mut world = test_world(vec![test_castle("Minase", CastleGrade::Standard, Some(FactionId(1)), 30_000)], 2);
    let p = &mut world.factions[0];
    p.gold = 1_000;
    p.food = 1_000;
    p.points.troops = 20_000;

    let end = victory::check(&world, FactionId(0), &Default::default());
    assert_eq!(end, Some(GameEndResult::Defeat(GameEndReason::Collapse)));
    assert!(!end.unwrap().is_victory());
}

#[test]
fn test_no_castles_at_all_is_not_unification() {
    let world = test_world(Vec::new(), 1);
    let end = victory::check(&world, FactionId(0), &Default::default());
    assert_eq!(end, Some(GameEndResult::Defeat(GameEndReason::Collapse)));
}

// ── Full campaigns ──────────────────────────────────────────────────────

#[test]
fn test_default_campaign_keeps_invariants() {
    let rules = RuleSet::default();
    let mut world = default_world();
    let mut rng = ChaCha8Rng::seed_from_u64(7);
    for _ in 0..36 {
        let orders = scripted_orders(&world, &rules);
        let (outcomes, summary) = advance_turn(&mut world, &orders, &rules, &mut rng);
        assert_eq!(outcomes.len(), orders.len());
        assert_world_invariants(&world);
        if summary.game_end.is_some() {
            break;
        }
    }
}

#[test]
fn test_deterministic_campaign() {
    assert_eq!(play(42, 24), play(42, 24));
}

#[test]
fn test_different_seeds_diverge() {
    let base = play(1, 24);
    assert!((2..6).any(|seed| play(seed, 24) != base));
}

#[test]
fn test_calendar_runs_a_full_year() {
    let rules = RuleSet::default();
    let mut world = default_world();
    let mut rng = ChaCha8Rng::seed_from_u64(3);
    for _ in 0..12 {
        advance_turn(&mut world, &[], &rules, &mut rng);
    }
    assert_eq!(world.turn, 13);
    assert_eq!(world.month, 3);
    assert_eq!(world.year, 2);
}

#[test]
fn test_player_answers_invasion_with_tribute() {
    let rules = RuleSet::default();
    let mut world = default_world();
    let mut rng = ChaCha8Rng::seed_from_u64(5);
    begin_turn(&mut world, &rules);

    // Akane borders the player's Kiso through Minase
    let attack = Action::Attack { target: "Kiso".into(), troops: 10_000, battle_type: BattleType::Siege };
    let out = apply_action(&mut world, AKANE, &attack, &rules, &mut rng);
    assert!(matches!(out, ActionOutcome::InvasionPending(_)), "{out:?}");

    let options = invasion_options(&world, &rules).unwrap();
    let tribute = options.iter().find(|o| o.kind == ResponseKind::Tribute).unwrap();
    assert!(tribute.available);
    let owner_before = world.castle("Kiso").unwrap().owner;
    let ip_before = world.faction(KUROGANE).unwrap().points.ip;

    let outcome = resolve_invasion(&mut world, ResponseKind::Tribute, &rules, &mut rng).unwrap();
    assert!(matches!(outcome, crate::invasion::InvasionOutcome::Withdrawn { .. }));
    assert!(world.pending_invasion.is_none());
    assert_eq!(world.castle("Kiso").unwrap().owner, owner_before);
    assert!(world.faction(KUROGANE).unwrap().points.ip < ip_before);
    assert!(world.tasks.iter().all(|t| t.title != defend_task_title("Kiso")));

    let summary = finish_turn(&mut world, &rules, &mut rng);
    assert!(summary.invasion.is_none());
}

#[test]
fn test_narrative_changes_and_save_roundtrip() {
    let rules = RuleSet::default();
    let mut world = default_world();
    let mut rng = ChaCha8Rng::seed_from_u64(9);
    advance_turn(&mut world, &[], &rules, &mut rng);

    let changes = StateChanges::parse_or_fallback(r#"{ "gold_delta": -100000, "new_events": ["A comet"] }"#);
    apply_changes(&mut world, &changes);
    let player = world.faction(world.player).unwrap();
    assert_eq!(player.gold, 0);
    assert_eq!(player.recent_events.back().map(String::as_str), Some("A comet"));

    let garbage = StateChanges::parse_or_fallback("{ not json");
    let before = world.clone();
    apply_changes(&mut world, &garbage);
    assert_eq!(world, before);

    let save = SaveData::new(&world, 1_700_000_000, &[]);
    let loaded = SaveData::from_json(&save.to_json().unwrap()).unwrap();
    assert_eq!(loaded.world_state.turn, world.turn);
    assert_eq!(loaded.world_state.relations, world.relations);
    let gold: Vec<u32> = loaded.world_state.factions.iter().map(|f| f.gold).collect();
    assert_eq!(gold, world.factions.iter().map(|f| f.gold).collect::<Vec<_>>());
    assert_eq!(loaded.metadata.player_castle_count, world.castle_count(world.player));
}
