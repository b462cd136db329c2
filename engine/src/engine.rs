// ═══════════════════════════════════════════════════════════════════════
// Turn Engine — orchestrates one turn and resolves faction actions
//
// Architecture:
//   The engine is a pure state machine. It never does I/O or calls agents.
//   The caller (campaign runner, CLI, UI) drives a turn in three steps:
//
//   1. `begin_turn`   — regenerate pools, collect income and treaty income
//   2. `apply_action` — once per proposed action, in faction turn order.
//                       An NPC attack on a player castle parks a
//                       `PendingInvasion`; the player answers it with
//                       `resolve_invasion`.
//   3. `finish_turn`  — settle any unanswered invasion, roll events,
//                       reallocate garrisons, age treaties and tasks,
//                       check victory, advance the calendar.
//
//   Randomness is always passed in; nothing reads an ambient RNG.
// ═══════════════════════════════════════════════════════════════════════

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::changes::{ChangeReport, StateChanges};
use crate::combat::{self, BattleResult, Force};
use crate::config::EngineConfig;
use crate::diplomacy::{self, DiplomacyResult, DiplomaticAction};
use crate::error::EngineError;
use crate::events::{self, EventTemplate, GameEvent};
use crate::garrison;
use crate::invasion::{self, InvasionOutcome, ResponseKind, ResponseOption};
use crate::points::{self, PointAdvance};
use crate::resources::{self, Income};
use crate::setup::Scenario;
use crate::skills::{default_skill_tree, SkillTree};
use crate::types::*;
use crate::victory::{self, GameEndResult};

/// Immutable reference data shared by every engine entry point.
#[derive(Debug, Clone)]
pub struct RuleSet {
    pub config: EngineConfig,
    pub skills: SkillTree,
    pub events: Vec<EventTemplate>,
}

impl RuleSet {
    pub fn new(config: EngineConfig, scenario: &Scenario) -> Result<Self, EngineError> {
        config.validate()?;
        Ok(RuleSet { config, skills: scenario.skill_tree()?, events: scenario.events.clone() })
    }
}

impl Default for RuleSet {
    fn default() -> Self {
        RuleSet {
            config: EngineConfig::default(),
            skills: SkillTree::new(default_skill_tree()).unwrap_or_default(),
            events: events::default_events(),
        }
    }
}

// ── Actions ────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DevelopFocus {
    Commerce,
    Agriculture,
    Defense,
}

/// Everything a faction can do on its turn.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Action {
    DevelopCity { city: String, focus: DevelopFocus },
    Recruit { troops: u32 },
    Train,
    UpgradeFacility(FacilityKind),
    Attack { target: String, troops: u32, battle_type: BattleType },
    Diplomacy { action: DiplomaticAction, target: FactionId },
    UnlockSkill(String),
}

impl Action {
    pub fn label(&self) -> &'static str {
        match self {
            Action::DevelopCity { .. } => "develop",
            Action::Recruit { .. } => "recruit",
            Action::Train => "train",
            Action::UpgradeFacility(_) => "upgrade",
            Action::Attack { .. } => "attack",
            Action::Diplomacy { .. } => "diplomacy",
            Action::UnlockSkill(_) => "skill",
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionCost {
    pub ap: u32,
    pub gold: u32,
    pub food: u32,
    pub ip: u32,
    pub dp: u32,
}

impl ActionCost {
    /// First pool the faction cannot cover, if any.
    pub fn shortfall(&self, faction: &Faction) -> Option<String> {
        [
            ("AP", self.ap, faction.points.ap),
            ("gold", self.gold, faction.gold),
            ("food", self.food, faction.food),
            ("IP", self.ip, faction.points.ip),
            ("DP", self.dp, faction.points.dp),
        ]
        .into_iter()
        .find(|(_, need, have)| need > have)
        .map(|(pool, need, have)| format!("needs {need} {pool}, has {have}"))
    }

    pub fn affordable(&self, faction: &Faction) -> bool {
        self.shortfall(faction).is_none()
    }

    fn pay(&self, faction: &mut Faction) {
        faction.points.ap = faction.points.ap.saturating_sub(self.ap);
        faction.gold = faction.gold.saturating_sub(self.gold);
        faction.food = faction.food.saturating_sub(self.food);
        faction.points.ip = faction.points.ip.saturating_sub(self.ip);
        faction.points.dp = faction.points.dp.saturating_sub(self.dp);
    }
}

fn per_thousand(troops: u32, rate: u32) -> u32 {
    (u64::from(troops) * u64::from(rate)).div_ceil(1000) as u32
}

/// Troops an attack may actually commit.
pub fn deployable(faction: &Faction, troops: u32) -> u32 {
    troops.min(faction.points.troops).min(faction.ruler_level.deployment_cap)
}

pub fn action_cost(action: &Action, faction: &Faction, config: &EngineConfig) -> ActionCost {
    let a = &config.actions;
    match action {
        Action::DevelopCity { .. } => ActionCost { ap: a.develop_ap, gold: a.develop_gold, ..Default::default() },
        Action::Recruit { troops } => {
            let n = (*troops).min(faction.ruler_level.deployment_cap);
            ActionCost {
                ap: a.recruit_ap,
                gold: per_thousand(n, a.recruit_gold_per_1000),
                food: per_thousand(n, a.recruit_food_per_1000),
                ..Default::default()
            }
        }
        Action::Train => ActionCost { ap: a.train_ap, ip: a.train_ip, ..Default::default() },
        Action::UpgradeFacility(kind) => {
            let fac = &faction.facilities;
            let gold = match kind {
                FacilityKind::Market => a.facility_gold * (fac.market.count + fac.market.level),
                FacilityKind::Farm => a.facility_gold * (fac.farm.count + fac.farm.level),
                FacilityKind::Bank => a.bank_gold * (fac.bank_level + 1),
            };
            ActionCost { ap: a.upgrade_ap, gold, ip: a.facility_ip, ..Default::default() }
        }
        Action::Attack { troops, .. } => ActionCost {
            ap: a.attack_ap,
            food: per_thousand(deployable(faction, *troops), a.attack_food_per_1000),
            ..Default::default()
        },
        Action::Diplomacy { action, .. } => ActionCost {
            ap: a.diplomacy_ap,
            dp: if *action == DiplomaticAction::DeclareWar { 0 } else { config.diplomacy.action_dp_cost },
            ..Default::default()
        },
        Action::UnlockSkill(_) => ActionCost { ap: a.skill_ap, ..Default::default() },
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ActionOutcome {
    Applied(String),
    Battle(BattleResult),
    Diplomacy(DiplomacyResult),
    /// The target is the player's; the attack waits for their response.
    InvasionPending(PendingInvasion),
    /// Nothing changed.
    Rejected(String),
}

impl ActionOutcome {
    pub fn is_rejected(&self) -> bool {
        matches!(self, ActionOutcome::Rejected(_))
    }
}

fn rejected(reason: impl Into<String>) -> ActionOutcome {
    ActionOutcome::Rejected(reason.into())
}

fn pay(world: &mut WorldState, id: FactionId, cost: &ActionCost) {
    if let Some(f) = world.faction_mut(id) {
        cost.pay(f);
    }
}

pub fn defend_task_title(castle: &str) -> String {
    format!("Defend {castle}")
}

/// Validate, pay for and apply one action. A rejected action leaves the
/// world exactly as it was.
pub fn apply_action<R: Rng + ?Sized>(
    world: &mut WorldState,
    id: FactionId,
    action: &Action,
    rules: &RuleSet,
    rng: &mut R,
) -> ActionOutcome {
    let Some(faction) = world.faction(id) else {
        tracing::warn!(faction = %id, "action from unknown faction");
        return rejected("unknown faction");
    };
    if !world.is_active(id) {
        return rejected("faction has been eliminated");
    }
    let cost = action_cost(action, faction, &rules.config);
    if let Some(reason) = cost.shortfall(faction) {
        return rejected(reason);
    }
    let config = &rules.config.actions;

    match action {
        Action::DevelopCity { city, focus } => {
            let Some(idx) = faction.cities.iter().position(|c| &c.name == city) else {
                tracing::warn!(faction = %id, %city, "develop on unknown city");
                return rejected(format!("no city named {city}"));
            };
            pay(world, id, &cost);
            let gain = i64::from(config.develop_gain);
            let Some(f) = world.faction_mut(id) else { return rejected("unknown faction") };
            let c = &mut f.cities[idx];
            let stat = match focus {
                DevelopFocus::Commerce => &mut c.commerce,
                DevelopFocus::Agriculture => &mut c.agriculture,
                DevelopFocus::Defense => &mut c.defense,
            };
            *stat = apply_rating_delta(*stat, gain);
            ActionOutcome::Applied(format!("Developed {city} ({focus:?})"))
        }

        Action::Recruit { troops } => {
            let n = (*troops).min(faction.ruler_level.deployment_cap);
            if n == 0 {
                return rejected("nothing to recruit");
            }
            pay(world, id, &cost);
            let recruit_training = config.recruit_training;
            let Some(f) = world.faction_mut(id) else { return rejected("unknown faction") };
            let old = f64::from(f.points.troops);
            let blended = (f.points.training.clamp(0.0, 1.0) * old + recruit_training * f64::from(n)) / (old + f64::from(n));
            f.points.training = blended;
            f.points.troops = f.points.troops.saturating_add(n);
            ActionOutcome::Applied(format!("Recruited {n} troops"))
        }

        Action::Train => {
            if faction.points.training >= 1.0 {
                return rejected("army is fully trained");
            }
            pay(world, id, &cost);
            let gain = config.train_gain;
            let Some(f) = world.faction_mut(id) else { return rejected("unknown faction") };
            f.points.training = (f.points.training + gain).min(1.0);
            ActionOutcome::Applied(format!("Training now {:.2}", f.points.training))
        }

        Action::UpgradeFacility(kind) => {
            pay(world, id, &cost);
            let max_count = config.max_facility_count;
            let Some(f) = world.faction_mut(id) else { return rejected("unknown faction") };
            let fac = match kind {
                FacilityKind::Market => &mut f.facilities.market,
                FacilityKind::Farm => &mut f.facilities.farm,
                FacilityKind::Bank => {
                    f.facilities.bank_level += 1;
                    return ActionOutcome::Applied(format!("Bank raised to level {}", f.facilities.bank_level));
                }
            };
            if fac.count < max_count {
                fac.count += 1;
            } else {
                fac.level += 1;
            }
            ActionOutcome::Applied(format!("{kind:?} now {} × level {}", fac.count, fac.level))
        }

        Action::UnlockSkill(skill) => {
            if let Err(err) = rules.skills.check_unlock(faction, skill) {
                return rejected(format!("{skill}: {err}"));
            }
            pay(world, id, &cost);
            let Some(f) = world.faction_mut(id) else { return rejected("unknown faction") };
            match rules.skills.unlock(f, skill) {
                Ok(()) => ActionOutcome::Applied(format!("Unlocked {skill}")),
                Err(err) => rejected(format!("{skill}: {err}")),
            }
        }

        Action::Diplomacy { action, target } => {
            if *target == id || !world.is_active(*target) {
                tracing::warn!(faction = %id, %target, "diplomacy with absent faction");
                return rejected(format!("{target} is not a valid partner"));
            }
            pay(world, id, &cost);
            match diplomacy::perform(world, *action, id, *target, &rules.config.diplomacy, rng) {
                Some(result) => ActionOutcome::Diplomacy(result),
                None => rejected("diplomacy failed"),
            }
        }

        Action::Attack { target, troops, battle_type } => attack(world, id, target, *troops, *battle_type, cost, rules, rng),
    }
}

#[allow(clippy::too_many_arguments)]
fn attack<R: Rng + ?Sized>(
    world: &mut WorldState,
    id: FactionId,
    target: &str,
    troops: u32,
    battle_type: BattleType,
    cost: ActionCost,
    rules: &RuleSet,
    rng: &mut R,
) -> ActionOutcome {
    let Some(faction) = world.faction(id) else { return rejected("unknown faction") };
    let Some(castle) = world.castle(target) else {
        tracing::warn!(faction = %id, castle = target, "attack on unknown castle");
        return rejected(format!("no castle named {target}"));
    };
    if castle.owner == Some(id) {
        return rejected(format!("{target} is already ours"));
    }
    let reachable = world.owned_castles(id).iter().any(|c| c.adjacent.iter().any(|a| a == target));
    if !reachable {
        return rejected(format!("{target} does not border our lands"));
    }
    let committed = deployable(faction, troops);
    if committed == 0 {
        return rejected("no troops to commit");
    }
    let defender = castle.owner;
    if let Some(def) = defender {
        if diplomacy::forbids_attack(world, id, def) {
            return rejected(format!("a treaty with {def} forbids the attack"));
        }
    }
    let player_target = defender == Some(world.player) && id != world.player;
    if player_target && world.pending_invasion.is_some() {
        return rejected("another invasion is already under way");
    }

    pay(world, id, &cost);
    if let Some(def) = defender {
        let hostility = DiplomacyResult::hostility(
            format!("{id} attacks {target}"),
            rules.config.actions.attack_relation_change,
        );
        diplomacy::update_relation(world.relation_mut(id, def), &hostility);
    }

    if player_target {
        let invasion = PendingInvasion { attacker: id, troops_estimate: committed, target_castle: target.to_string() };
        let attacker_name = world.faction(id).map(|f| f.name.clone()).unwrap_or_default();
        world.push_task(defend_task_title(target), 60, 1);
        if let Some(p) = world.faction_mut(world.player) {
            p.push_event(format!("{attacker_name} marches on {target} with {committed} troops"));
        }
        world.pending_invasion = Some(invasion.clone());
        return ActionOutcome::InvasionPending(invasion);
    }

    let generals = world.faction(id).map(|f| f.generals.clone()).unwrap_or_default();
    let attacker = Force::attacking(id, committed, generals);
    let Some(castle) = world.castle(target) else { return rejected(format!("no castle named {target}")) };
    let defender_generals = defender.and_then(|d| world.faction(d)).map(|f| f.generals.clone()).unwrap_or_default();
    let defending = Force::defending_castle(castle, defender_generals, &rules.config.combat);
    let result = combat::resolve(&attacker, &defending, battle_type, Some(target), id, &rules.config.combat, rng);
    tracing::debug!(attacker = %id, castle = target, ?battle_type, attacker_won = result.attacker_won(), "battle");
    combat::apply_battle(world, &result, target, committed, &rules.config.points);
    ActionOutcome::Battle(result)
}

// ── Invasion ───────────────────────────────────────────────────────────

pub fn invasion_options(world: &WorldState, rules: &RuleSet) -> Option<[ResponseOption; 4]> {
    world.pending_invasion.as_ref().map(|inv| invasion::options(world, inv, &rules.config))
}

/// Answer the pending invasion. None if there is none; a rejected choice
/// leaves it pending.
pub fn resolve_invasion<R: Rng + ?Sized>(
    world: &mut WorldState,
    choice: ResponseKind,
    rules: &RuleSet,
    rng: &mut R,
) -> Option<InvasionOutcome> {
    let inv = world.pending_invasion.take()?;
    let outcome = invasion::respond(world, &inv, choice, &rules.config, rng);
    if matches!(outcome, InvasionOutcome::Rejected { .. }) {
        world.pending_invasion = Some(inv);
    } else {
        let title = defend_task_title(&inv.target_castle);
        world.tasks.retain(|t| t.title != title);
    }
    Some(outcome)
}

/// Narrative-layer changes always land on the player's faction.
pub fn apply_changes(world: &mut WorldState, changes: &StateChanges) -> ChangeReport {
    let player = world.player;
    changes.apply(world, player)
}

// ── Turn phases ────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FactionUpkeep {
    pub faction: FactionId,
    pub points: PointAdvance,
    pub income: Income,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TurnStart {
    pub turn: u32,
    pub upkeep: Vec<FactionUpkeep>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TurnSummary {
    pub turn: u32,
    pub month: u8,
    pub year: u32,
    pub invasion: Option<InvasionOutcome>,
    pub events: Vec<GameEvent>,
    pub garrison_moves: usize,
    pub eliminated: Vec<FactionId>,
    pub game_end: Option<GameEndResult>,
}

/// Regenerate points and collect income for every active faction.
/// Per-faction work reads only that faction and is merged in turn order.
pub fn begin_turn(world: &mut WorldState, rules: &RuleSet) -> TurnStart {
    let season = world.season();
    let upkeep: Vec<FactionUpkeep> = world
        .turn_order
        .iter()
        .filter(|id| world.is_active(**id))
        .filter_map(|id| world.faction(*id))
        .map(|f| FactionUpkeep {
            faction: f.id,
            points: points::advance(f, &rules.skills, &rules.config.points),
            income: resources::calculate_income(f, world.castle_count(f.id), season, &rules.config.economy),
        })
        .collect();

    for u in &upkeep {
        let Some(f) = world.faction_mut(u.faction) else { continue };
        points::apply_advance(f, &u.points);
        f.gold = f.gold.saturating_add(u.income.gold);
        let hungry = i64::from(f.food) + u.income.net_food() < 0;
        f.food = apply_delta(f.food, u.income.net_food());
        if hungry {
            f.points.morale = (f.points.morale - 0.1).max(0.0);
            f.push_event("The granaries are empty");
        }
        if u.points.starved() {
            tracing::warn!(faction = %u.faction, lost = u.points.starvation_loss, "upkeep unpaid, troops desert");
            f.push_event(format!("{} troops deserted for want of upkeep", u.points.starvation_loss));
        }
        if u.points.starved() && u.faction == world.player {
            world.push_task("Restore the army's upkeep", 40, 3);
        }
    }

    diplomacy::settle_treaties(world, &rules.config.economy);
    TurnStart { turn: world.turn, upkeep }
}

/// Close the turn and commit it. The calendar moves on last, so the
/// summary reports the turn that just ended.
pub fn finish_turn<R: Rng + ?Sized>(world: &mut WorldState, rules: &RuleSet, rng: &mut R) -> TurnSummary {
    let turn = world.turn;
    let (month, year) = (world.month, world.year);

    let invasion = match world.pending_invasion.take() {
        Some(inv) => {
            tracing::info!(castle = %inv.target_castle, attacker = %inv.attacker, "unanswered invasion settled by battle");
            let title = defend_task_title(&inv.target_castle);
            world.tasks.retain(|t| t.title != title);
            Some(invasion::battle(world, &inv, ResponseKind::Battle, &rules.config, rng))
        }
        None => None,
    };

    let events = events::roll(world, &rules.events, &rules.config.events, rng);
    for e in &events {
        events::apply_event(world, e);
    }

    let mut garrison_moves = 0;
    for id in world.turn_order.clone() {
        garrison_moves += garrison::reallocate(world, id, &rules.config.garrison).len();
    }

    diplomacy::advance_treaties(&mut world.relations);
    age_tasks(world);
    let eliminated = eliminate_factions(world);
    let game_end = victory::check(world, world.player, &rules.config.victory);
    if let Some(end) = game_end {
        tracing::info!(turn, ?end, "game over");
    }

    advance_calendar(world);
    tracing::debug!(turn, month, factions = world.turn_order.len(), "turn committed");

    TurnSummary { turn, month, year, invasion, events, garrison_moves, eliminated, game_end }
}

/// Urgency rises, countdowns fall, finished tasks drop out.
pub fn age_tasks(world: &mut WorldState) {
    for task in &mut world.tasks {
        task.urgency = (task.urgency + URGENCY_PER_TURN).min(MAX_URGENCY);
        task.turns_remaining = task.turns_remaining.saturating_sub(1);
    }
    world.tasks.retain(|t| t.turns_remaining > 0);
}

pub fn advance_calendar(world: &mut WorldState) {
    world.turn += 1;
    if world.month >= 12 {
        world.month = 1;
        world.year += 1;
    } else {
        world.month += 1;
    }
}

/// Non-player factions without castles leave the turn order and lose
/// their treaties.
fn eliminate_factions(world: &mut WorldState) -> Vec<FactionId> {
    let gone: Vec<FactionId> = world
        .turn_order
        .iter()
        .copied()
        .filter(|id| *id != world.player && !world.is_active(*id))
        .collect();
    for id in &gone {
        tracing::info!(faction = %id, "faction eliminated");
        world.turn_order.retain(|t| t != id);
        for rel in world.relations.iter_mut().filter(|r| r.involves(*id)) {
            rel.treaties.clear();
        }
        if let Some(f) = world.faction_mut(*id) {
            f.push_event("Our last castle has fallen");
        }
    }
    gone
}

/// One full turn with pre-decided actions, applied in turn order.
/// Player invasions left pending are settled by battle at the end.
pub fn advance_turn<R: Rng + ?Sized>(
    world: &mut WorldState,
    actions: &[(FactionId, Action)],
    rules: &RuleSet,
    rng: &mut R,
) -> (Vec<ActionOutcome>, TurnSummary) {
    begin_turn(world, rules);
    let mut outcomes = Vec::with_capacity(actions.len());
    for id in world.turn_order.clone() {
        for (_, action) in actions.iter().filter(|(f, _)| *f == id) {
            outcomes.push(apply_action(world, id, action, rules, rng));
        }
    }
    (outcomes, finish_turn(world, rules, rng))
}
