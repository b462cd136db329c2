// ═══════════════════════════════════════════════════════════════════════
// Campaign Runner — plays a complete headless campaign with agents
//
// Per turn:
//   1. `begin_turn` commits upkeep for every faction
//   2. every active faction's agent plans against the same snapshot
//   3. plans are applied in turn order; an invasion of the player is
//      answered at once by the player's agent
//   4. `finish_turn` commits the rest and reports a game end, if any
// ═══════════════════════════════════════════════════════════════════════

use std::collections::HashMap;
use std::time::{SystemTime, UNIX_EPOCH};

use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::error::CampaignError;
use kingdom_agents::{decide_or_fallback, Agent, NpcTurnResult};
use kingdom_engine::engine::{self, ActionOutcome, RuleSet, TurnSummary};
use kingdom_engine::save::SaveData;
use kingdom_engine::setup::{create_world, Scenario};
use kingdom_engine::victory::GameEndResult;
use kingdom_engine::{EngineConfig, FactionId, WorldState};

pub type Lineup = HashMap<FactionId, Box<dyn Agent>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CampaignOptions {
    pub seed: u64,
    /// Campaigns still undecided after this many turns end unresolved.
    pub max_turns: u32,
}

impl Default for CampaignOptions {
    fn default() -> Self {
        CampaignOptions { seed: 42, max_turns: 120 }
    }
}

/// Result of a finished campaign.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CampaignResult {
    pub seed: u64,
    pub turns_played: u32,
    /// None when the turn limit was reached first.
    pub outcome: Option<GameEndResult>,
    pub faction_results: Vec<FactionResult>,
    pub final_save: SaveData,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FactionResult {
    pub faction: FactionId,
    pub name: String,
    pub agent_name: String,
    pub is_player: bool,
    pub castles: usize,
    pub troops: u32,
    pub gold: u32,
    pub food: u32,
    pub eliminated: bool,
}

impl CampaignResult {
    /// Faction holding the most castles at the end; earlier turn order wins ties.
    pub fn leader(&self) -> Option<&FactionResult> {
        self.faction_results
            .iter()
            .rev()
            .max_by_key(|r| r.castles)
    }

    pub fn outcome_label(&self) -> String {
        match self.outcome {
            Some(GameEndResult::Victory(r)) => format!("victory ({r:?})"),
            Some(GameEndResult::Defeat(r)) => format!("defeat ({r:?})"),
            None => "unresolved".into(),
        }
    }
}

fn unix_now() -> u64 {
    SystemTime::now().duration_since(UNIX_EPOCH).map_or(0, |d| d.as_secs())
}

fn plan_turn(world: &WorldState, agents: &mut Lineup, rules: &RuleSet) -> Result<Vec<NpcTurnResult>, CampaignError> {
    world
        .turn_order
        .iter()
        .filter(|id| world.is_active(**id))
        .map(|id| -> Result<NpcTurnResult, CampaignError> {
            let agent = agents.get_mut(id).ok_or(CampaignError::MissingAgent(*id))?;
            Ok(decide_or_fallback(agent.as_mut(), world, rules))
        })
        .collect()
}

/// Run one campaign. Every faction in the scenario needs an agent,
/// the player's included.
pub fn run_campaign(
    scenario: &Scenario,
    config: &EngineConfig,
    agents: &mut Lineup,
    options: CampaignOptions,
) -> Result<CampaignResult, CampaignError> {
    run_campaign_with(scenario, config, agents, options, |_, _| {})
}

/// Like [`run_campaign`], calling `on_turn` after every committed turn.
pub fn run_campaign_with<F>(
    scenario: &Scenario,
    config: &EngineConfig,
    agents: &mut Lineup,
    options: CampaignOptions,
    mut on_turn: F,
) -> Result<CampaignResult, CampaignError>
where
    F: FnMut(&TurnSummary, &WorldState),
{
    let rules = RuleSet::new(config.clone(), scenario)?;
    let mut world = create_world(scenario, &rules.config)?;
    if let Some(missing) = world.turn_order.iter().find(|id| !agents.contains_key(id)) {
        return Err(CampaignError::MissingAgent(*missing));
    }
    let mut rng = ChaCha8Rng::seed_from_u64(options.seed);
    let mut outcome = None;

    while world.turn <= options.max_turns {
        engine::begin_turn(&mut world, &rules);
        let plans = plan_turn(&world, agents, &rules)?;

        for plan in &plans {
            for proposed in &plan.actions {
                let result = engine::apply_action(&mut world, plan.faction_id, &proposed.action, &rules, &mut rng);
                if let ActionOutcome::InvasionPending(_) = result {
                    answer_invasion(&mut world, agents, &rules, &mut rng);
                }
            }
        }

        let summary = engine::finish_turn(&mut world, &rules, &mut rng);
        tracing::debug!(seed = options.seed, turn = summary.turn, events = summary.events.len(), "campaign turn");
        on_turn(&summary, &world);
        if summary.game_end.is_some() {
            outcome = summary.game_end;
            break;
        }
    }

    let turns_played = world.turn - 1;
    tracing::info!(seed = options.seed, turns_played, ?outcome, "campaign finished");
    Ok(build_result(&world, agents, options.seed, turns_played, outcome))
}

fn answer_invasion(world: &mut WorldState, agents: &mut Lineup, rules: &RuleSet, rng: &mut ChaCha8Rng) {
    let Some(options) = engine::invasion_options(world, rules) else { return };
    let choice = match agents.get_mut(&world.player) {
        Some(agent) => agent.respond_to_invasion(&options),
        None => kingdom_agents::agent::best_response(&options),
    };
    if let Some(outcome) = engine::resolve_invasion(world, choice, rules, rng) {
        tracing::debug!(?choice, ?outcome, "invasion answered");
    }
}

fn build_result(
    world: &WorldState,
    agents: &Lineup,
    seed: u64,
    turns_played: u32,
    outcome: Option<GameEndResult>,
) -> CampaignResult {
    let faction_results = world
        .factions
        .iter()
        .map(|f| FactionResult {
            faction: f.id,
            name: f.name.clone(),
            agent_name: agents.get(&f.id).map(|a| a.name().to_string()).unwrap_or_default(),
            is_player: f.is_player,
            castles: world.castle_count(f.id),
            troops: f.points.troops,
            gold: f.gold,
            food: f.food,
            eliminated: !world.turn_order.contains(&f.id),
        })
        .collect();

    CampaignResult {
        seed,
        turns_played,
        outcome,
        faction_results,
        final_save: SaveData::new(world, unix_now(), &[]),
    }
}

/// Run one campaign per seed in parallel. `lineup` builds a fresh set of
/// agents for each seed.
pub fn run_batch<F>(
    scenario: &Scenario,
    config: &EngineConfig,
    seeds: &[u64],
    max_turns: u32,
    lineup: F,
) -> Vec<(u64, Result<CampaignResult, CampaignError>)>
where
    F: Fn(u64) -> Lineup + Sync,
{
    seeds
        .par_iter()
        .map(|&seed| {
            let mut agents = lineup(seed);
            let result = run_campaign(scenario, config, &mut agents, CampaignOptions { seed, max_turns });
            (seed, result)
        })
        .collect()
}
