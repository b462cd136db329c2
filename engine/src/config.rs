// ═══════════════════════════════════════════════════════════════════════
// Engine configuration — every tunable constant of the simulation.
// Loaded once at startup and passed by reference; never mutated mid-game.
// ═══════════════════════════════════════════════════════════════════════

use serde::{Deserialize, Serialize};

use crate::error::EngineError;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub points: PointConfig,
    pub economy: EconomyConfig,
    pub garrison: GarrisonConfig,
    pub combat: CombatConfig,
    pub diplomacy: DiplomacyConfig,
    pub invasion: InvasionConfig,
    pub events: EventConfig,
    pub victory: VictoryConfig,
    pub actions: ActionConfig,
}

impl EngineConfig {
    /// Parse a (possibly partial) JSON config. Missing fields keep defaults.
    pub fn from_json(json: &str) -> Result<Self, EngineError> {
        let config: EngineConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), EngineError> {
        let ratios = [
            ("points.ap_carryover_rate", self.points.ap_carryover_rate),
            ("points.starvation_rate", self.points.starvation_rate),
            ("points.wounded_ratio", self.points.wounded_ratio),
            ("garrison.capital_ratio", self.garrison.capital_ratio),
            ("garrison.frontline_ratio", self.garrison.frontline_ratio),
            ("combat.base_casualty_min", self.combat.base_casualty_min),
            ("combat.base_casualty_max", self.combat.base_casualty_max),
            ("combat.max_loser_loss_rate", self.combat.max_loser_loss_rate),
            ("combat.min_winner_loss_rate", self.combat.min_winner_loss_rate),
            ("combat.capture_chance", self.combat.capture_chance),
            ("combat.field_conquest_chance", self.combat.field_conquest_chance),
            ("diplomacy.max_accept_chance", self.diplomacy.max_accept_chance),
            ("invasion.strategy_success_rate", self.invasion.strategy_success_rate),
            ("invasion.support_max_rate", self.invasion.support_max_rate),
            ("events.trigger_chance", self.events.trigger_chance),
            ("victory.mandate_share", self.victory.mandate_share),
            ("actions.recruit_training", self.actions.recruit_training),
        ];
        for (name, value) in ratios {
            if !(0.0..=1.0).contains(&value) {
                return Err(EngineError::InvalidConfig(format!("{name} must be in [0, 1], got {value}")));
            }
        }
        if self.points.maintenance_divisor == 0 || self.economy.food_upkeep_divisor == 0 {
            return Err(EngineError::InvalidConfig("divisors must be non-zero".into()));
        }
        if self.points.recovery_turns == 0 {
            return Err(EngineError::InvalidConfig("points.recovery_turns must be non-zero".into()));
        }
        let combat = &self.combat;
        if !(combat.random_factor_min.is_finite() && combat.random_factor_max.is_finite())
            || combat.random_factor_min > combat.random_factor_max
        {
            return Err(EngineError::InvalidConfig("combat random factor range is inverted".into()));
        }
        if combat.base_casualty_min > combat.base_casualty_max {
            return Err(EngineError::InvalidConfig("combat casualty range is inverted".into()));
        }
        Ok(())
    }
}

// ── Point Calculator ───────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PointConfig {
    pub ap_carryover_rate: f64,
    pub ap_regen: u32,
    pub market_coefficient: u32,
    pub farm_coefficient: u32,
    pub ip_base_cap: u32,
    pub ip_cap_per_bank_level: u32,
    pub maintenance_divisor: u32,
    pub starvation_rate: f64,
    pub sp_per_turn: u32,
    pub dp_per_turn: u32,
    /// Turns a freshly wounded batch needs to fully recover.
    pub recovery_turns: u32,
    /// Share of battle losses that become wounded instead of dead.
    pub wounded_ratio: f64,
}

impl Default for PointConfig {
    fn default() -> Self {
        Self {
            ap_carryover_rate: 0.5,
            ap_regen: 3,
            market_coefficient: 2,
            farm_coefficient: 1,
            ip_base_cap: 100,
            ip_cap_per_bank_level: 50,
            maintenance_divisor: 5000,
            starvation_rate: 0.1,
            sp_per_turn: 1,
            dp_per_turn: 2,
            recovery_turns: 3,
            wounded_ratio: 0.4,
        }
    }
}

// ── Resource Calculator ────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EconomyConfig {
    pub gold_per_commerce: f64,
    pub castle_gold: u32,
    pub food_per_agriculture: f64,
    pub spring_food_factor: f64,
    pub summer_food_factor: f64,
    pub autumn_food_factor: f64,
    pub winter_food_factor: f64,
    /// Troops fed by one unit of food per turn.
    pub food_upkeep_divisor: u32,
    pub trade_income: u32,
    pub tribute_rate: f64,
}

impl Default for EconomyConfig {
    fn default() -> Self {
        Self {
            gold_per_commerce: 0.5,
            castle_gold: 20,
            food_per_agriculture: 1.0,
            spring_food_factor: 1.0,
            summer_food_factor: 1.2,
            autumn_food_factor: 1.5,
            winter_food_factor: 0.5,
            food_upkeep_divisor: 1000,
            trade_income: 15,
            tribute_rate: 0.1,
        }
    }
}

// ── Garrison Allocator ─────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GarrisonConfig {
    pub capital_ratio: f64,
    pub frontline_ratio: f64,
    pub frontline_priority: u32,
    pub fortress_priority: u32,
    pub capital_grade_priority: u32,
}

impl Default for GarrisonConfig {
    fn default() -> Self {
        Self {
            capital_ratio: 0.25,
            frontline_ratio: 0.55,
            frontline_priority: 50,
            fortress_priority: 20,
            capital_grade_priority: 10,
        }
    }
}

// ── Combat Resolver ────────────────────────────────────────────────────

/// Weights blending warfare / leadership / intelligence into general power.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StatWeights {
    pub warfare: f64,
    pub leadership: f64,
    pub intelligence: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CombatConfig {
    pub field_weights: StatWeights,
    pub siege_weights: StatWeights,
    pub ambush_weights: StatWeights,
    pub sub_general_leadership: f64,
    pub sub_general_warfare: f64,
    pub siege_defender_bonus: f64,
    /// Extra defense percent per wall level.
    pub wall_bonus_percent: f64,
    pub random_factor_min: f64,
    pub random_factor_max: f64,
    pub base_casualty_min: f64,
    pub base_casualty_max: f64,
    pub max_loser_loss_rate: f64,
    pub min_winner_loss_rate: f64,
    pub capture_chance: f64,
    pub field_conquest_chance: f64,
}

impl Default for CombatConfig {
    fn default() -> Self {
        Self {
            field_weights: StatWeights { warfare: 0.5, leadership: 0.3, intelligence: 0.2 },
            siege_weights: StatWeights { warfare: 0.2, leadership: 0.4, intelligence: 0.4 },
            ambush_weights: StatWeights { warfare: 0.2, leadership: 0.2, intelligence: 0.6 },
            sub_general_leadership: 0.1,
            sub_general_warfare: 0.05,
            siege_defender_bonus: 1.3,
            wall_bonus_percent: 5.0,
            random_factor_min: 0.85,
            random_factor_max: 1.15,
            base_casualty_min: 0.1,
            base_casualty_max: 0.25,
            max_loser_loss_rate: 0.6,
            min_winner_loss_rate: 0.03,
            capture_chance: 0.15,
            field_conquest_chance: 0.4,
        }
    }
}

// ── Diplomacy Engine ───────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DiplomacyConfig {
    pub alliance_min_score: i32,
    pub trade_min_score: i32,
    pub pact_min_score: i32,
    pub tribute_max_score: i32,
    pub tribute_min_troop_ratio: f64,
    pub max_accept_chance: f64,
    pub alliance_turns: u32,
    pub trade_turns: u32,
    pub pact_turns: u32,
    pub tribute_turns: u32,
    /// DP spent by the initiator for any action except war.
    pub action_dp_cost: u32,
}

impl Default for DiplomacyConfig {
    fn default() -> Self {
        Self {
            alliance_min_score: 30,
            trade_min_score: -30,
            pact_min_score: -10,
            tribute_max_score: 20,
            tribute_min_troop_ratio: 0.5,
            max_accept_chance: 0.9,
            alliance_turns: 10,
            trade_turns: 5,
            pact_turns: 8,
            tribute_turns: 3,
            action_dp_cost: 2,
        }
    }
}

// ── Invasion Responder ─────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct InvasionConfig {
    pub strategy_sp_cost: u32,
    pub strategy_success_rate: f64,
    pub support_dp_cost: u32,
    pub support_base_rate: f64,
    pub support_relation_bonus: f64,
    pub support_max_rate: f64,
    /// Minimum relation score for a third party to be asked for help.
    pub support_min_score: i32,
    pub tribute_min_ip: u32,
    /// Attacking troops per IP of tribute.
    pub tribute_troops_per_ip: u32,
}

impl Default for InvasionConfig {
    fn default() -> Self {
        Self {
            strategy_sp_cost: 3,
            strategy_success_rate: 0.6,
            support_dp_cost: 2,
            support_base_rate: 0.2,
            support_relation_bonus: 0.007,
            support_max_rate: 0.9,
            support_min_score: 20,
            tribute_min_ip: 10,
            tribute_troops_per_ip: 1000,
        }
    }
}

// ── Turn actions ───────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ActionConfig {
    pub develop_ap: u32,
    pub develop_gold: u32,
    /// Rating points a city gains per development.
    pub develop_gain: u32,
    pub recruit_ap: u32,
    pub recruit_gold_per_1000: u32,
    pub recruit_food_per_1000: u32,
    /// Training level of fresh recruits, blended into the army.
    pub recruit_training: f64,
    pub train_ap: u32,
    pub train_ip: u32,
    pub train_gain: f64,
    pub upgrade_ap: u32,
    pub facility_gold: u32,
    pub facility_ip: u32,
    pub bank_gold: u32,
    /// Facility count after which upgrades raise the level instead.
    pub max_facility_count: u32,
    pub attack_ap: u32,
    pub attack_food_per_1000: u32,
    /// Relation change when one faction attacks another's castle.
    pub attack_relation_change: i32,
    pub diplomacy_ap: u32,
    pub skill_ap: u32,
}

impl Default for ActionConfig {
    fn default() -> Self {
        Self {
            develop_ap: 1,
            develop_gold: 30,
            develop_gain: 5,
            recruit_ap: 1,
            recruit_gold_per_1000: 20,
            recruit_food_per_1000: 10,
            recruit_training: 0.3,
            train_ap: 1,
            train_ip: 10,
            train_gain: 0.05,
            upgrade_ap: 2,
            facility_gold: 50,
            facility_ip: 5,
            bank_gold: 100,
            max_facility_count: 5,
            attack_ap: 2,
            attack_food_per_1000: 2,
            attack_relation_change: -15,
            diplomacy_ap: 1,
            skill_ap: 1,
        }
    }
}

// ── Event Roller / Victory ─────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EventConfig {
    pub trigger_chance: f64,
}

impl Default for EventConfig {
    fn default() -> Self {
        Self { trigger_chance: 0.3 }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VictoryConfig {
    pub mandate_share: f64,
    pub mandate_popularity: u32,
}

impl Default for VictoryConfig {
    fn default() -> Self {
        Self { mandate_share: 0.7, mandate_popularity: 90 }
    }
}
