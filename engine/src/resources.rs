// ═══════════════════════════════════════════════════════════════════════
// Resource Calculator — gold / food income and troop upkeep
// ═══════════════════════════════════════════════════════════════════════

use serde::{Deserialize, Serialize};

use crate::config::EconomyConfig;
use crate::types::{Faction, Season};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Income {
    pub gold: u32,
    pub food: u32,
    /// Food eaten by the army this turn.
    pub upkeep: u32,
}

impl Income {
    pub fn net_food(&self) -> i64 {
        i64::from(self.food) - i64::from(self.upkeep)
    }
}

pub fn season_food_factor(season: Season, config: &EconomyConfig) -> f64 {
    match season {
        Season::Spring => config.spring_food_factor,
        Season::Summer => config.summer_food_factor,
        Season::Autumn => config.autumn_food_factor,
        Season::Winter => config.winter_food_factor,
    }
}

/// Pure mapping from a faction's holdings and the season to this turn's income.
pub fn calculate_income(faction: &Faction, owned_castles: usize, season: Season, config: &EconomyConfig) -> Income {
    let commerce: u32 = faction.cities.iter().map(|c| c.commerce).sum();
    let agriculture: u32 = faction.cities.iter().map(|c| c.agriculture).sum();

    let gold = (f64::from(commerce) * config.gold_per_commerce).floor() as u32
        + config.castle_gold * owned_castles as u32;
    let food = (f64::from(agriculture) * config.food_per_agriculture * season_food_factor(season, config))
        .floor() as u32;
    let upkeep = faction.points.troops / config.food_upkeep_divisor.max(1);

    Income { gold, food, upkeep }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::setup::test_faction;
    use crate::types::City;

    fn faction_with_city(commerce: u32, agriculture: u32, troops: u32) -> Faction {
        let mut f = test_faction(0);
        f.cities = vec![City { name: "Town".into(), defense: 10, commerce, agriculture }];
        f.points.troops = troops;
        f
    }

    #[test]
    fn autumn_harvest_beats_winter() {
        let config = EconomyConfig::default();
        let f = faction_with_city(40, 60, 0);
        let autumn = calculate_income(&f, 1, Season::Autumn, &config);
        let winter = calculate_income(&f, 1, Season::Winter, &config);
        assert_eq!(autumn.food, 90);
        assert_eq!(winter.food, 30);
        assert_eq!(autumn.gold, 20 + 20);
    }

    #[test]
    fn upkeep_scales_with_troops() {
        let config = EconomyConfig::default();
        let f = faction_with_city(0, 0, 12_500);
        let income = calculate_income(&f, 0, Season::Spring, &config);
        assert_eq!(income.upkeep, 12);
        assert_eq!(income.gold, 0);
        assert_eq!(income.net_food(), -12);
    }
}
