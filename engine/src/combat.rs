// ═══════════════════════════════════════════════════════════════════════
// Combat Resolver — one battle between two forces.
//
// `resolve` is pure given its RNG stream: it reads no world state and
// writes none. `apply_battle` is the separate step that commits a result.
//
// RNG draw order (fixed for replay): attacker factor, defender factor,
// base casualty rate, one capture roll per losing general, then the
// conquest roll for Field battles only.
// ═══════════════════════════════════════════════════════════════════════

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::config::{CombatConfig, PointConfig, StatWeights};
use crate::points;
use crate::types::{BattleOutcome, BattleType, Castle, FactionId, General, WorldState};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Side {
    Attacker,
    Defender,
}

impl Side {
    pub fn other(self) -> Side {
        match self {
            Side::Attacker => Side::Defender,
            Side::Defender => Side::Attacker,
        }
    }
}

/// One side of a battle. `faction` is None for neutral garrisons.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Force {
    pub faction: Option<FactionId>,
    pub troops: u32,
    pub generals: Vec<General>,
    /// Terrain / fortification bonus in percent, applied when defending.
    pub defense_bonus_percent: f64,
}

impl Force {
    pub fn attacking(faction: FactionId, troops: u32, generals: Vec<General>) -> Self {
        Force { faction: Some(faction), troops, generals, defense_bonus_percent: 0.0 }
    }

    /// The garrison of a castle, led by the owner's generals if any.
    pub fn defending_castle(castle: &Castle, generals: Vec<General>, config: &CombatConfig) -> Self {
        let bonus = (castle.defense_multiplier - 1.0).max(0.0) * 100.0
            + f64::from(castle.wall_level) * config.wall_bonus_percent;
        Force { faction: castle.owner, troops: castle.garrison, generals, defense_bonus_percent: bonus }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BattleResult {
    pub attacker: FactionId,
    pub defender: Option<FactionId>,
    pub winner: Side,
    pub battle_type: BattleType,
    pub attacker_power: f64,
    pub defender_power: f64,
    pub attacker_losses: u32,
    pub defender_losses: u32,
    pub captured_generals: Vec<String>,
    pub castle_conquered: Option<String>,
}

impl BattleResult {
    pub fn attacker_won(&self) -> bool {
        self.winner == Side::Attacker
    }

    pub fn loser(&self) -> Side {
        self.winner.other()
    }

    pub fn faction_of(&self, side: Side) -> Option<FactionId> {
        match side {
            Side::Attacker => Some(self.attacker),
            Side::Defender => self.defender,
        }
    }
}

fn weights(battle_type: BattleType, config: &CombatConfig) -> StatWeights {
    match battle_type {
        BattleType::Field => config.field_weights,
        BattleType::Siege => config.siege_weights,
        BattleType::Ambush => config.ambush_weights,
    }
}

/// Lead general (highest warfare) blended power plus the sub-general bonus.
pub fn general_power(generals: &[General], battle_type: BattleType, config: &CombatConfig) -> f64 {
    let Some((lead_idx, lead)) = generals
        .iter()
        .enumerate()
        .max_by(|(ia, a), (ib, b)| a.warfare.cmp(&b.warfare).then(ib.cmp(ia)))
    else {
        return 0.0;
    };
    let w = weights(battle_type, config);
    let lead_power = f64::from(lead.warfare) * w.warfare
        + f64::from(lead.leadership) * w.leadership
        + f64::from(lead.intelligence) * w.intelligence;
    let sub_bonus: f64 = generals
        .iter()
        .enumerate()
        .filter(|(i, _)| *i != lead_idx)
        .map(|(_, g)| {
            config.sub_general_leadership * f64::from(g.leadership)
                + config.sub_general_warfare * f64::from(g.warfare)
        })
        .sum();
    lead_power + sub_bonus
}

/// Deterministic part of a side's power, before the random factor.
pub fn base_power(force: &Force, battle_type: BattleType, defending: bool, config: &CombatConfig) -> f64 {
    let efficiency = general_power(&force.generals, battle_type, config) / 100.0;
    let mut power = f64::from(force.troops) * (0.3 + 0.7 * efficiency);
    if defending {
        power *= 1.0 + force.defense_bonus_percent / 100.0;
        if battle_type == BattleType::Siege {
            power *= config.siege_defender_bonus;
        }
    }
    power
}

pub fn resolve<R: Rng + ?Sized>(
    attacker: &Force,
    defender: &Force,
    battle_type: BattleType,
    target_castle: Option<&str>,
    attacker_faction: FactionId,
    config: &CombatConfig,
    rng: &mut R,
) -> BattleResult {
    let factor_range = config.random_factor_min..=config.random_factor_max;
    let attacker_power = base_power(attacker, battle_type, false, config) * rng.gen_range(factor_range.clone());
    let defender_power = base_power(defender, battle_type, true, config) * rng.gen_range(factor_range);

    let total = attacker_power + defender_power;
    let attacker_wins = total > 0.0 && attacker_power / total > 0.5;
    let (winner, winner_power, loser_power) = if attacker_wins {
        (Side::Attacker, attacker_power, defender_power)
    } else {
        (Side::Defender, defender_power, attacker_power)
    };
    let power_ratio = if winner_power > 0.0 { (loser_power / winner_power).clamp(0.0, 1.0) } else { 1.0 };

    let base = rng.gen_range(config.base_casualty_min..=config.base_casualty_max);
    let loser_rate = (base + (1.0 - power_ratio) * 0.3).min(config.max_loser_loss_rate);
    let winner_rate = (base * power_ratio * 0.5).max(config.min_winner_loss_rate);
    let losses = |troops: u32, rate: f64| ((f64::from(troops) * rate).floor() as u32).min(troops);

    let (attacker_losses, defender_losses) = if attacker_wins {
        (losses(attacker.troops, winner_rate), losses(defender.troops, loser_rate))
    } else {
        (losses(attacker.troops, loser_rate), losses(defender.troops, winner_rate))
    };

    let losing_generals = if attacker_wins { &defender.generals } else { &attacker.generals };
    let captured_generals = losing_generals
        .iter()
        .filter(|_| rng.gen_bool(config.capture_chance))
        .map(|g| g.name.clone())
        .collect();

    let conquers = attacker_wins
        && match battle_type {
            BattleType::Siege => true,
            BattleType::Field => rng.gen_bool(config.field_conquest_chance),
            BattleType::Ambush => false,
        };

    BattleResult {
        attacker: attacker_faction,
        defender: defender.faction,
        winner,
        battle_type,
        attacker_power,
        defender_power,
        attacker_losses,
        defender_losses,
        captured_generals,
        castle_conquered: if conquers { target_castle.map(str::to_string) } else { None },
    }
}

/// Commit a battle: troop losses (part wounded), garrison losses, captured
/// generals, battle records and conquest. `committed` is how many attacking
/// troops marched; survivors garrison a conquered castle.
pub fn apply_battle(
    world: &mut WorldState,
    result: &BattleResult,
    target_castle: &str,
    committed: u32,
    point_config: &PointConfig,
) {
    let attacker_survivors = committed.saturating_sub(result.attacker_losses);

    if let Some(f) = world.faction_mut(result.attacker) {
        f.points.troops = f.points.troops.saturating_sub(result.attacker_losses);
        points::add_wounded(f, result.attacker_losses, point_config);
        f.record_battle(if result.attacker_won() { BattleOutcome::Won } else { BattleOutcome::Lost });
    } else {
        tracing::warn!(faction = %result.attacker, "battle result for unknown attacker");
    }

    if let Some(def) = result.defender {
        if let Some(f) = world.faction_mut(def) {
            f.points.troops = f.points.troops.saturating_sub(result.defender_losses);
            points::add_wounded(f, result.defender_losses, point_config);
            f.record_battle(if result.attacker_won() { BattleOutcome::Lost } else { BattleOutcome::Won });
        }
    }

    // Captured generals move from loser to winner's captives
    let loser = result.faction_of(result.loser());
    let winner = result.faction_of(result.winner);
    let mut taken = Vec::new();
    if let Some(f) = loser.and_then(|id| world.faction_mut(id)) {
        for name in &result.captured_generals {
            if let Some(pos) = f.generals.iter().position(|g| &g.name == name) {
                taken.push(f.generals.remove(pos));
            }
        }
        if !taken.is_empty() {
            f.push_event(format!("{} general(s) captured at {target_castle}", taken.len()));
        }
    }
    if let Some(f) = winner.and_then(|id| world.faction_mut(id)) {
        f.captives.extend(taken);
    }

    let Some(castle) = world.castle_mut(target_castle) else {
        tracing::warn!(castle = target_castle, "battle at unknown castle");
        return;
    };
    castle.garrison = castle.garrison.saturating_sub(result.defender_losses);
    if result.castle_conquered.as_deref() == Some(target_castle) {
        castle.owner = Some(result.attacker);
        castle.garrison = attacker_survivors.min(castle.max_garrison);
        tracing::info!(castle = target_castle, attacker = %result.attacker, "castle conquered");
        let message = format!("Took {target_castle}");
        if let Some(f) = world.faction_mut(result.attacker) {
            f.push_event(message);
        }
        if let Some(f) = result.defender.and_then(|id| world.faction_mut(id)) {
            f.push_event(format!("Lost {target_castle}"));
        }
    }
}
