// ═══════════════════════════════════════════════════════════════════════
// Invasion Responder — the four answers to an attack on the player
//
// `options` reports what each response costs and how likely it is to work;
// `respond` commits one. A failed strategy or support request still leaves
// the attacker at the gates, so it falls through to a battle.
// ═══════════════════════════════════════════════════════════════════════

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::combat::{self, BattleResult, Force};
use crate::config::EngineConfig;
use crate::types::{BattleType, FactionId, PendingInvasion, WorldState};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ResponseKind {
    SpecialStrategy,
    Battle,
    RequestSupport,
    Tribute,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Pool {
    Strategy,
    Diplomacy,
    Domestic,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResponseCost {
    pub pool: Pool,
    pub amount: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResponseOption {
    pub kind: ResponseKind,
    pub cost: Option<ResponseCost>,
    pub success_rate: f64,
    pub available: bool,
    pub unavailable_reason: Option<String>,
    /// Third party asked for help (RequestSupport only).
    pub ally: Option<FactionId>,
}

impl ResponseOption {
    fn new(kind: ResponseKind, cost: Option<ResponseCost>, success_rate: f64) -> Self {
        ResponseOption { kind, cost, success_rate, available: true, unavailable_reason: None, ally: None }
    }

    fn unavailable(mut self, reason: impl Into<String>) -> Self {
        self.available = false;
        self.unavailable_reason = Some(reason.into());
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum InvasionOutcome {
    /// The attacker turned back without a fight.
    Withdrawn { response: ResponseKind, message: String },
    Battle { response: ResponseKind, result: BattleResult },
    /// Nothing changed; the option could not be taken.
    Rejected { reason: String },
}

fn pool_amount(world: &WorldState, faction: FactionId, pool: Pool) -> u32 {
    world.faction(faction).map_or(0, |f| match pool {
        Pool::Strategy => f.points.sp,
        Pool::Diplomacy => f.points.dp,
        Pool::Domestic => f.points.ip,
    })
}

fn spend(world: &mut WorldState, faction: FactionId, cost: ResponseCost) {
    if let Some(f) = world.faction_mut(faction) {
        let pool = match cost.pool {
            Pool::Strategy => &mut f.points.sp,
            Pool::Diplomacy => &mut f.points.dp,
            Pool::Domestic => &mut f.points.ip,
        };
        *pool = pool.saturating_sub(cost.amount);
    }
}

/// Third party with the best relation to the defender, if any qualifies.
pub fn best_ally(world: &WorldState, defender: FactionId, attacker: FactionId, min_score: i32) -> Option<(FactionId, i32)> {
    world
        .factions
        .iter()
        .filter(|f| f.id != defender && f.id != attacker && world.is_active(f.id))
        .map(|f| (f.id, world.relation(defender, f.id).score))
        .filter(|(_, score)| *score >= min_score)
        .max_by(|a, b| a.1.cmp(&b.1).then(b.0.cmp(&a.0)))
}

fn attacking_force(world: &WorldState, invasion: &PendingInvasion) -> Force {
    let (troops, generals) = world
        .faction(invasion.attacker)
        .map_or((0, Vec::new()), |f| (invasion.troops_estimate.min(f.points.troops), f.generals.clone()));
    Force::attacking(invasion.attacker, troops, generals)
}

fn defending_force(world: &WorldState, castle_name: &str, config: &EngineConfig) -> Option<Force> {
    let castle = world.castle(castle_name)?;
    let generals = castle
        .owner
        .and_then(|id| world.faction(id))
        .map(|f| f.generals.clone())
        .unwrap_or_default();
    Some(Force::defending_castle(castle, generals, &config.combat))
}

/// The four response options, always in the same order.
pub fn options(world: &WorldState, invasion: &PendingInvasion, config: &EngineConfig) -> [ResponseOption; 4] {
    let inv = &config.invasion;
    let defender = world.castle(&invasion.target_castle).and_then(|c| c.owner);
    let pool = |p| defender.map_or(0, |d| pool_amount(world, d, p));

    let strategy_cost = ResponseCost { pool: Pool::Strategy, amount: inv.strategy_sp_cost };
    let mut strategy = ResponseOption::new(ResponseKind::SpecialStrategy, Some(strategy_cost), inv.strategy_success_rate);
    if pool(Pool::Strategy) < strategy_cost.amount {
        strategy = strategy.unavailable(format!("needs {} SP", strategy_cost.amount));
    }

    let defender_force = defending_force(world, &invasion.target_castle, config);
    let battle = match &defender_force {
        Some(def) if def.troops > 0 => {
            let att = attacking_force(world, invasion);
            let a = combat::base_power(&att, BattleType::Siege, false, &config.combat);
            let d = combat::base_power(def, BattleType::Siege, true, &config.combat);
            let rate = if a + d > 0.0 { d / (a + d) } else { 1.0 };
            ResponseOption::new(ResponseKind::Battle, None, rate)
        }
        Some(_) => ResponseOption::new(ResponseKind::Battle, None, 0.0).unavailable("no garrison to fight with"),
        None => ResponseOption::new(ResponseKind::Battle, None, 0.0).unavailable("target castle no longer exists"),
    };

    let support_cost = ResponseCost { pool: Pool::Diplomacy, amount: inv.support_dp_cost };
    let ally = defender.and_then(|d| best_ally(world, d, invasion.attacker, inv.support_min_score));
    let mut support = match ally {
        Some((id, score)) => {
            let rate = (inv.support_base_rate + f64::from(score) * inv.support_relation_bonus)
                .clamp(0.0, inv.support_max_rate);
            let mut opt = ResponseOption::new(ResponseKind::RequestSupport, Some(support_cost), rate);
            opt.ally = Some(id);
            opt
        }
        None => ResponseOption::new(ResponseKind::RequestSupport, Some(support_cost), 0.0).unavailable("no eligible ally"),
    };
    if support.available && pool(Pool::Diplomacy) < support_cost.amount {
        support = support.unavailable(format!("needs {} DP", support_cost.amount));
    }

    let tribute_cost = ResponseCost {
        pool: Pool::Domestic,
        amount: (invasion.troops_estimate / inv.tribute_troops_per_ip.max(1)).max(inv.tribute_min_ip),
    };
    let mut tribute = ResponseOption::new(ResponseKind::Tribute, Some(tribute_cost), 1.0);
    if pool(Pool::Domestic) < tribute_cost.amount {
        tribute = tribute.unavailable(format!("needs {} IP", tribute_cost.amount));
    }

    [strategy, battle, support, tribute]
}

/// Fight it out at the target castle, whatever its garrison. Also used to
/// settle an invasion the player never answered.
pub fn battle<R: Rng + ?Sized>(
    world: &mut WorldState,
    invasion: &PendingInvasion,
    response: ResponseKind,
    config: &EngineConfig,
    rng: &mut R,
) -> InvasionOutcome {
    let Some(defender) = defending_force(world, &invasion.target_castle, config) else {
        tracing::warn!(castle = %invasion.target_castle, "invasion target vanished");
        return InvasionOutcome::Rejected { reason: "target castle no longer exists".into() };
    };
    if defender.faction == Some(invasion.attacker) {
        return InvasionOutcome::Rejected { reason: "target already belongs to the attacker".into() };
    }
    let attacker = attacking_force(world, invasion);
    let result = combat::resolve(
        &attacker,
        &defender,
        BattleType::Siege,
        Some(&invasion.target_castle),
        invasion.attacker,
        &config.combat,
        rng,
    );
    combat::apply_battle(world, &result, &invasion.target_castle, attacker.troops, &config.points);
    tracing::debug!(castle = %invasion.target_castle, attacker_won = result.attacker_won(), "invasion battle");
    InvasionOutcome::Battle { response, result }
}

/// Commit a response. Unavailable options change nothing.
pub fn respond<R: Rng + ?Sized>(
    world: &mut WorldState,
    invasion: &PendingInvasion,
    choice: ResponseKind,
    config: &EngineConfig,
    rng: &mut R,
) -> InvasionOutcome {
    let opts = options(world, invasion, config);
    let Some(option) = opts.iter().find(|o| o.kind == choice) else {
        return InvasionOutcome::Rejected { reason: "unknown response".into() };
    };
    if !option.available {
        return InvasionOutcome::Rejected {
            reason: option.unavailable_reason.clone().unwrap_or_else(|| "unavailable".into()),
        };
    }
    let Some(defender) = world.castle(&invasion.target_castle).and_then(|c| c.owner) else {
        return InvasionOutcome::Rejected { reason: "target castle has no owner".into() };
    };
    if let Some(cost) = option.cost {
        spend(world, defender, cost);
    }

    let attacker_name = world
        .faction(invasion.attacker)
        .map_or_else(|| invasion.attacker.to_string(), |f| f.name.clone());
    match choice {
        ResponseKind::Battle => battle(world, invasion, choice, config, rng),
        ResponseKind::Tribute => InvasionOutcome::Withdrawn {
            response: choice,
            message: format!("{attacker_name} accepts tribute and withdraws"),
        },
        ResponseKind::SpecialStrategy | ResponseKind::RequestSupport => {
            if rng.gen::<f64>() < option.success_rate {
                let message = match (choice, option.ally.and_then(|id| world.faction(id))) {
                    (ResponseKind::RequestSupport, Some(ally)) => {
                        format!("{} marches to help; {attacker_name} withdraws", ally.name)
                    }
                    _ => format!("A stratagem turns {attacker_name} back"),
                };
                InvasionOutcome::Withdrawn { response: choice, message }
            } else {
                battle(world, invasion, choice, config, rng)
            }
        }
    }
}
