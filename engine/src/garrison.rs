// ═══════════════════════════════════════════════════════════════════════
// Garrison Allocator
//
// Two separate steps:
//   1. `distribute` — pure function producing a TARGET allocation
//      (capital reserve → frontline pool by priority → even rear split →
//      overflow sweep).
//   2. `adjustments` — diff of that target against current garrisons, so
//      callers apply incremental moves instead of a hard reset.
// ═══════════════════════════════════════════════════════════════════════

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::config::GarrisonConfig;
use crate::types::{Castle, CastleGrade, FactionId, WorldState};

pub type Allocation = BTreeMap<String, u32>;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GarrisonAdjustment {
    pub castle: String,
    pub delta: i64,
}

/// Priority used to split the frontline pool.
pub fn priority_score(castle: &Castle, is_capital: bool, is_frontline: bool, config: &GarrisonConfig) -> u32 {
    if is_capital {
        return 100;
    }
    let mut score = 0;
    if is_frontline {
        score += config.frontline_priority;
    }
    match castle.grade {
        CastleGrade::Fortress => score += config.fortress_priority,
        CastleGrade::Capital => score += config.capital_grade_priority,
        CastleGrade::Standard => {}
    }
    score
}

/// Target distribution of `total_troops` over the faction's owned castles.
/// Every entry is ≤ that castle's capacity and the sum is ≤ `total_troops`.
pub fn distribute(
    owned: &[&Castle],
    total_troops: u32,
    world: &WorldState,
    faction: FactionId,
    config: &GarrisonConfig,
) -> Allocation {
    let mut alloc = Allocation::new();
    if total_troops == 0 || owned.is_empty() {
        return alloc;
    }
    for c in owned {
        alloc.insert(c.name.clone(), 0);
    }
    let total = u64::from(total_troops);
    let mut pool = total;

    // 1. Capital reserve
    let capital_name = world.faction(faction).map(|f| f.capital.as_str());
    let capital = owned
        .iter()
        .find(|c| Some(c.name.as_str()) == capital_name)
        .or_else(|| owned.iter().find(|c| c.grade == CastleGrade::Capital))
        .copied();
    if let Some(cap) = capital {
        let reserve = ((total as f64 * config.capital_ratio).floor() as u64).min(u64::from(cap.max_garrison));
        alloc.insert(cap.name.clone(), reserve as u32);
        pool -= reserve;
    }

    // 2. Frontline pool, split by priority
    let (frontline, rear): (Vec<&Castle>, Vec<&Castle>) = owned
        .iter()
        .copied()
        .filter(|c| Some(c.name.as_str()) != capital.map(|cap| cap.name.as_str()))
        .partition(|c| world.is_frontline(c));

    if !frontline.is_empty() {
        let frontline_pool = pool.min((total as f64 * config.frontline_ratio).floor() as u64);
        let scores: Vec<u64> = frontline
            .iter()
            .map(|c| u64::from(priority_score(c, false, true, config)))
            .collect();
        let score_sum: u64 = scores.iter().sum();
        for (c, score) in frontline.iter().zip(&scores) {
            let share = if score_sum == 0 {
                frontline_pool / frontline.len() as u64
            } else {
                frontline_pool * score / score_sum
            };
            let given = share.min(u64::from(c.max_garrison));
            alloc.insert(c.name.clone(), given as u32);
            pool -= given;
        }
    }

    // 3. Even split across the rear
    if !rear.is_empty() {
        let even = pool / rear.len() as u64;
        for c in &rear {
            let given = even.min(u64::from(c.max_garrison));
            alloc.insert(c.name.clone(), given as u32);
            pool -= given;
        }
    }

    // 4. Sweep leftovers into any spare capacity, in iteration order
    for c in owned {
        if pool == 0 {
            break;
        }
        if let Some(current) = alloc.get_mut(&c.name) {
            let spare = u64::from(c.max_garrison.saturating_sub(*current));
            let extra = spare.min(pool);
            *current += extra as u32;
            pool -= extra;
        }
    }

    alloc
}

/// Incremental moves that turn current garrisons into `target`.
/// Castles absent from the target are emptied.
pub fn adjustments(owned: &[&Castle], target: &Allocation) -> Vec<GarrisonAdjustment> {
    owned
        .iter()
        .filter_map(|c| {
            let want = i64::from(target.get(&c.name).copied().unwrap_or(0));
            let delta = want - i64::from(c.garrison);
            (delta != 0).then(|| GarrisonAdjustment { castle: c.name.clone(), delta })
        })
        .collect()
}

/// Apply adjustments, clamping every garrison to `[0, max_garrison]`.
pub fn apply_adjustments(world: &mut WorldState, adjustments: &[GarrisonAdjustment]) {
    for adj in adjustments {
        match world.castle_mut(&adj.castle) {
            Some(castle) => {
                let next = (i64::from(castle.garrison) + adj.delta).clamp(0, i64::from(castle.max_garrison));
                castle.garrison = next as u32;
            }
            None => tracing::warn!(castle = %adj.castle, "garrison adjustment for unknown castle"),
        }
    }
}

/// Recompute and apply one faction's garrisons from its troop total.
pub fn reallocate(world: &mut WorldState, faction: FactionId, config: &GarrisonConfig) -> Vec<GarrisonAdjustment> {
    let Some(troops) = world.faction(faction).map(|f| f.points.troops) else {
        tracing::warn!(%faction, "reallocation for unknown faction");
        return Vec::new();
    };
    let owned = world.owned_castles(faction);
    let target = distribute(&owned, troops, world, faction, config);
    let adj = adjustments(&owned, &target);
    apply_adjustments(world, &adj);
    adj
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::setup::{test_castle, test_world};

    /// Capital + one frontline fortress; the fortress borders a rival castle.
    fn two_castle_world() -> WorldState {
        let me = FactionId(0);
        let rival = FactionId(1);
        let mut capital = test_castle("Hokuto", CastleGrade::Capital, Some(me), 80_000);
        capital.adjacent = vec!["Kiso".into()];
        let mut fortress = test_castle("Kiso", CastleGrade::Fortress, Some(me), 60_000);
        fortress.adjacent = vec!["Hokuto".into(), "Minase".into()];
        let mut enemy = test_castle("Minase", CastleGrade::Standard, Some(rival), 30_000);
        enemy.adjacent = vec!["Kiso".into()];
        let mut world = test_world(vec![capital, fortress, enemy], 2);
        world.factions[0].capital = "Hokuto".into();
        world
    }

    #[test]
    fn capital_and_frontline_tiers() {
        let world = two_castle_world();
        let owned = world.owned_castles(FactionId(0));
        let alloc = distribute(&owned, 100_000, &world, FactionId(0), &GarrisonConfig::default());

        assert!(alloc["Kiso"] >= 55_000);
        assert!(alloc["Kiso"] <= 60_000);
        assert!(alloc["Hokuto"] >= 25_000);
        assert_eq!(alloc.values().sum::<u32>(), 100_000);
    }

    #[test]
    fn tier_amounts_before_sweep() {
        // Sweep goes capital first, so the fortress keeps exactly its frontline share.
        let world = two_castle_world();
        let owned = world.owned_castles(FactionId(0));
        let alloc = distribute(&owned, 100_000, &world, FactionId(0), &GarrisonConfig::default());
        assert_eq!(alloc["Kiso"], 55_000);
        assert_eq!(alloc["Hokuto"], 45_000);
    }

    #[test]
    fn empty_inputs_give_empty_map() {
        let world = two_castle_world();
        let owned = world.owned_castles(FactionId(0));
        assert!(distribute(&owned, 0, &world, FactionId(0), &GarrisonConfig::default()).is_empty());
        assert!(distribute(&[], 5_000, &world, FactionId(0), &GarrisonConfig::default()).is_empty());
    }

    #[test]
    fn no_frontline_goes_to_rear() {
        let me = FactionId(0);
        let mut capital = test_castle("Aoba", CastleGrade::Capital, Some(me), 80_000);
        capital.adjacent = vec!["Otowa".into()];
        let mut rear1 = test_castle("Otowa", CastleGrade::Standard, Some(me), 30_000);
        rear1.adjacent = vec!["Aoba".into(), "Tsurugi".into()];
        let mut rear2 = test_castle("Tsurugi", CastleGrade::Fortress, Some(me), 60_000);
        rear2.adjacent = vec!["Otowa".into()];
        let mut world = test_world(vec![capital, rear1, rear2], 1);
        world.factions[0].capital = "Aoba".into();

        let owned = world.owned_castles(me);
        let alloc = distribute(&owned, 40_000, &world, me, &GarrisonConfig::default());
        assert_eq!(alloc["Aoba"], 10_000);
        assert_eq!(alloc["Otowa"], 15_000);
        assert_eq!(alloc["Tsurugi"], 15_000);
    }

    #[test]
    fn overflow_beyond_total_capacity_is_dropped() {
        let world = two_castle_world();
        let owned = world.owned_castles(FactionId(0));
        let alloc = distribute(&owned, 500_000, &world, FactionId(0), &GarrisonConfig::default());
        assert_eq!(alloc["Hokuto"], 80_000);
        assert_eq!(alloc["Kiso"], 60_000);
    }

    #[test]
    fn adjustments_are_incremental() {
        let mut world = two_castle_world();
        world.castle_mut("Hokuto").unwrap().garrison = 30_000;
        world.castle_mut("Kiso").unwrap().garrison = 55_000;
        let owned = world.owned_castles(FactionId(0));
        let target = distribute(&owned, 100_000, &world, FactionId(0), &GarrisonConfig::default());
        let adj = adjustments(&owned, &target);
        assert_eq!(adj, vec![GarrisonAdjustment { castle: "Hokuto".into(), delta: 15_000 }]);

        apply_adjustments(&mut world, &adj);
        assert_eq!(world.castle("Hokuto").unwrap().garrison, 45_000);
    }
}
