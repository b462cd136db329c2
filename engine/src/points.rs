// ═══════════════════════════════════════════════════════════════════════
// Point Calculator — per-turn regeneration of a faction's five pools,
// troop maintenance / starvation, and wounded recovery.
// ═══════════════════════════════════════════════════════════════════════

use serde::{Deserialize, Serialize};

use crate::config::PointConfig;
use crate::skills::SkillTree;
use crate::types::{Facility, Faction, Points, WoundedEntry, MAX_MORALE};

/// Everything one regeneration step produces. Nothing is written back
/// until [`apply_advance`] is called.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PointAdvance {
    pub points: Points,
    pub wounded: Vec<WoundedEntry>,
    pub recovered_troops: u32,
    pub maintenance_cost: u32,
    pub starvation_loss: u32,
    pub ip_regen: u32,
    pub ip_cap: u32,
    pub mp: u32,
}

impl PointAdvance {
    pub fn starved(&self) -> bool {
        self.starvation_loss > 0
    }
}

pub fn ip_cap(faction: &Faction, config: &PointConfig) -> u32 {
    config
        .ip_base_cap
        .saturating_add(faction.facilities.bank_level.saturating_mul(config.ip_cap_per_bank_level))
}

pub fn ip_regen(faction: &Faction, skills: &SkillTree, config: &PointConfig) -> u32 {
    let f = &faction.facilities;
    let yield_of = |fac: &Facility, coefficient: u32| fac.count.saturating_mul(fac.level).saturating_mul(coefficient);
    yield_of(&f.market, config.market_coefficient)
        .saturating_add(yield_of(&f.farm, config.farm_coefficient))
        .saturating_add(skills.bonuses(faction).ip_regen)
}

/// Compute the faction's next pools. Total over any input: out-of-range
/// training / morale are clamped first.
pub fn advance(faction: &Faction, skills: &SkillTree, config: &PointConfig) -> PointAdvance {
    let bonuses = skills.bonuses(faction);
    let mut p = faction.points;
    p.training = p.training.clamp(0.0, 1.0);
    p.morale = p.morale.clamp(0.0, MAX_MORALE);

    // Action points: partial carry-over plus regen
    let carried = (f64::from(p.ap) * config.ap_carryover_rate).floor() as u32;
    p.ap = carried.saturating_add(config.ap_regen).saturating_add(bonuses.ap_regen).min(p.ap_max);

    // Domestic points
    let regen = ip_regen(faction, skills, config);
    let cap = ip_cap(faction, config);
    p.ip = p.ip.saturating_add(regen).min(cap);

    // Maintenance: pay in full or starve, never a blend
    let cost = p.troops / config.maintenance_divisor.max(1);
    let mut starvation_loss = 0;
    if p.ip >= cost {
        p.ip -= cost;
    } else {
        starvation_loss = (f64::from(p.troops) * config.starvation_rate).floor() as u32;
        p.troops -= starvation_loss.min(p.troops);
        p.ip = 0;
    }

    p.sp = p.sp.saturating_add(config.sp_per_turn);
    let dp_gain = (f64::from(config.dp_per_turn) * (1.0 + bonuses.dp_multiplier)).floor() as u32;
    p.dp = p.dp.saturating_add(dp_gain);
    p.training = (p.training + bonuses.training_per_turn).min(1.0);

    // Wounded recovery
    let mut recovered = 0u32;
    let mut wounded = Vec::with_capacity(faction.wounded.len());
    for entry in &faction.wounded {
        let turns = entry.recovery_turns.max(1);
        let back = entry.amount.div_ceil(turns);
        recovered = recovered.saturating_add(back);
        let remaining = entry.amount - back;
        if remaining > 0 {
            wounded.push(WoundedEntry { amount: remaining, recovery_turns: turns - 1 });
        }
    }
    p.troops = p.troops.saturating_add(recovered);

    PointAdvance {
        points: p,
        wounded,
        recovered_troops: recovered,
        maintenance_cost: cost,
        starvation_loss,
        ip_regen: regen,
        ip_cap: cap,
        mp: p.mp(),
    }
}

pub fn apply_advance(faction: &mut Faction, advance: &PointAdvance) {
    faction.points = advance.points;
    faction.wounded = advance.wounded.clone();
}

/// Move a share of battle losses into the wounded pool.
pub fn add_wounded(faction: &mut Faction, losses: u32, config: &PointConfig) {
    let amount = (f64::from(losses) * config.wounded_ratio).floor() as u32;
    if amount > 0 {
        faction.wounded.push(WoundedEntry { amount, recovery_turns: config.recovery_turns });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::setup::test_faction;
    use crate::skills::{default_skill_tree, SkillTree};
    use crate::types::Facility;

    fn empty_tree() -> SkillTree {
        SkillTree::default()
    }

    #[test]
    fn huge_coefficients_saturate() {
        let config = PointConfig {
            market_coefficient: u32::MAX,
            ip_cap_per_bank_level: u32::MAX,
            ap_regen: u32::MAX,
            ..PointConfig::default()
        };
        let mut f = test_faction(0);
        f.facilities.market = Facility { count: 4, level: 3 };
        f.facilities.bank_level = 2;
        assert_eq!(ip_regen(&f, &empty_tree(), &config), u32::MAX);
        assert_eq!(ip_cap(&f, &config), u32::MAX);
        let adv = advance(&f, &empty_tree(), &config);
        assert_eq!(adv.points.ap, f.points.ap_max);
    }

    #[test]
    fn starvation_branch_when_upkeep_unpaid() {
        let config = PointConfig::default();
        let mut f = test_faction(0);
        f.points.troops = 50_000;
        f.points.ip = 3;
        let adv = advance(&f, &empty_tree(), &config);
        assert_eq!(adv.maintenance_cost, 10);
        assert_eq!(adv.points.ip, 0);
        assert_eq!(adv.starvation_loss, 5_000);
        assert_eq!(adv.points.troops, 45_000);
    }

    #[test]
    fn upkeep_paid_in_full() {
        let config = PointConfig::default();
        let mut f = test_faction(0);
        f.points.troops = 50_000;
        f.points.ip = 30;
        let adv = advance(&f, &empty_tree(), &config);
        assert_eq!(adv.points.ip, 20);
        assert_eq!(adv.starvation_loss, 0);
        assert_eq!(adv.points.troops, 50_000);
    }

    #[test]
    fn action_points_carry_half_and_cap() {
        let config = PointConfig::default();
        let mut f = test_faction(0);
        f.points.ap = 9;
        f.points.ap_max = 10;
        assert_eq!(advance(&f, &empty_tree(), &config).points.ap, 4 + 3);
        f.points.ap_max = 5;
        f.points.ap = 5;
        assert_eq!(advance(&f, &empty_tree(), &config).points.ap, 5);
    }

    #[test]
    fn facilities_regen_capped_by_bank() {
        let config = PointConfig::default();
        let mut f = test_faction(0);
        f.facilities.market = Facility { count: 3, level: 2 };
        f.facilities.farm = Facility { count: 2, level: 1 };
        f.facilities.bank_level = 1;
        f.points.ip = 140;
        let adv = advance(&f, &empty_tree(), &config);
        assert_eq!(adv.ip_regen, 12 + 2);
        assert_eq!(adv.ip_cap, 150);
        assert_eq!(adv.points.ip, 150);
    }

    #[test]
    fn wounded_recover_in_ceil_steps() {
        let config = PointConfig::default();
        let mut f = test_faction(0);
        f.points.troops = 100;
        f.wounded = vec![WoundedEntry { amount: 10, recovery_turns: 3 }];
        let tree = empty_tree();

        let a1 = advance(&f, &tree, &config);
        assert_eq!(a1.recovered_troops, 4);
        assert_eq!(a1.wounded, vec![WoundedEntry { amount: 6, recovery_turns: 2 }]);
        apply_advance(&mut f, &a1);

        let a2 = advance(&f, &tree, &config);
        assert_eq!(a2.recovered_troops, 3);
        apply_advance(&mut f, &a2);

        let a3 = advance(&f, &tree, &config);
        assert_eq!(a3.recovered_troops, 3);
        assert!(a3.wounded.is_empty());
        assert_eq!(a3.points.troops, 110);
    }

    #[test]
    fn mp_recomputed_after_recovery() {
        let config = PointConfig::default();
        let mut f = test_faction(0);
        f.points.troops = 1000;
        f.points.ip = 100;
        f.points.training = 0.5;
        f.points.morale = 1.0;
        f.wounded = vec![WoundedEntry { amount: 1000, recovery_turns: 1 }];
        let adv = advance(&f, &empty_tree(), &config);
        assert_eq!(adv.points.troops, 2000);
        assert_eq!(adv.mp, 1000);
    }

    #[test]
    fn skills_drive_training_and_diplomacy() {
        let config = PointConfig::default();
        let tree = SkillTree::new(default_skill_tree()).unwrap();
        let mut f = test_faction(0);
        f.skills = vec!["drill_masters".into(), "envoys".into()];
        f.points.training = 0.99;
        f.points.dp = 0;
        let adv = advance(&f, &tree, &config);
        assert!((adv.points.training - 1.0).abs() < 1e-9);
        assert_eq!(adv.points.dp, 3);
    }

    #[test]
    fn malformed_rates_clamped() {
        let config = PointConfig::default();
        let mut f = test_faction(0);
        f.points.training = -3.0;
        f.points.morale = 9.0;
        let adv = advance(&f, &empty_tree(), &config);
        assert!(adv.points.training >= 0.0);
        assert!(adv.points.morale <= MAX_MORALE);
    }
}
