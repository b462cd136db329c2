// ═══════════════════════════════════════════════════════════════════════
// StateChanges — structured mutations proposed by the narrative layer
//
// Parsed and typed at the boundary; every present field is applied with
// clamps, absent fields are no-ops. Malformed input becomes the all-zero
// fallback so the turn can still advance.
// ═══════════════════════════════════════════════════════════════════════

use serde::{Deserialize, Serialize};

use crate::error::EngineError;
use crate::types::{apply_delta, apply_rating_delta, FactionId, WorldState};

pub const FALLBACK_MESSAGE: &str = "The council adjourns without a decision.";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CityUpdate {
    pub city: String,
    pub defense_delta: Option<i64>,
    pub commerce_delta: Option<i64>,
    pub agriculture_delta: Option<i64>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralUpdate {
    pub general: String,
    /// New assignment; an empty string clears it.
    pub task: Option<String>,
    pub loyalty_delta: Option<i64>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StateChanges {
    pub gold_delta: Option<i64>,
    pub food_delta: Option<i64>,
    pub troops_delta: Option<i64>,
    pub popularity_delta: Option<i64>,
    pub city_updates: Vec<CityUpdate>,
    pub general_updates: Vec<GeneralUpdate>,
    pub new_events: Vec<String>,
    pub result_message: String,
}

/// What `apply` did. Unknown cities / generals are skipped, not fatal.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChangeReport {
    pub applied: usize,
    pub skipped: Vec<String>,
}

impl StateChanges {
    pub fn from_json(json: &str) -> Result<Self, EngineError> {
        Ok(serde_json::from_str(json)?)
    }

    /// All-zero changes with a generic message.
    pub fn fallback() -> Self {
        StateChanges { result_message: FALLBACK_MESSAGE.into(), ..Default::default() }
    }

    pub fn parse_or_fallback(json: &str) -> Self {
        match Self::from_json(json) {
            Ok(changes) => changes,
            Err(err) => {
                tracing::warn!(%err, "malformed state changes, using fallback");
                Self::fallback()
            }
        }
    }

    pub fn is_empty(&self) -> bool {
        self.gold_delta.is_none()
            && self.food_delta.is_none()
            && self.troops_delta.is_none()
            && self.popularity_delta.is_none()
            && self.city_updates.is_empty()
            && self.general_updates.is_empty()
            && self.new_events.is_empty()
    }

    pub fn apply(&self, world: &mut WorldState, faction: FactionId) -> ChangeReport {
        let mut report = ChangeReport::default();
        let Some(f) = world.faction_mut(faction) else {
            tracing::warn!(%faction, "state changes for unknown faction");
            report.skipped.push(format!("faction {faction}"));
            return report;
        };

        if let Some(d) = self.gold_delta {
            f.gold = apply_delta(f.gold, d);
            report.applied += 1;
        }
        if let Some(d) = self.food_delta {
            f.food = apply_delta(f.food, d);
            report.applied += 1;
        }
        if let Some(d) = self.troops_delta {
            f.points.troops = apply_delta(f.points.troops, d);
            report.applied += 1;
        }
        if let Some(d) = self.popularity_delta {
            f.popularity = apply_rating_delta(f.popularity, d);
            report.applied += 1;
        }

        for update in &self.city_updates {
            let Some(city) = f.cities.iter_mut().find(|c| c.name == update.city) else {
                tracing::warn!(city = %update.city, "state change for unknown city");
                report.skipped.push(format!("city {}", update.city));
                continue;
            };
            if let Some(d) = update.defense_delta {
                city.defense = apply_rating_delta(city.defense, d);
            }
            if let Some(d) = update.commerce_delta {
                city.commerce = apply_rating_delta(city.commerce, d);
            }
            if let Some(d) = update.agriculture_delta {
                city.agriculture = apply_rating_delta(city.agriculture, d);
            }
            report.applied += 1;
        }

        for update in &self.general_updates {
            let Some(general) = f.generals.iter_mut().find(|g| g.name == update.general) else {
                tracing::warn!(general = %update.general, "state change for unknown general");
                report.skipped.push(format!("general {}", update.general));
                continue;
            };
            if let Some(task) = &update.task {
                general.task = (!task.is_empty()).then(|| task.clone());
            }
            if let Some(d) = update.loyalty_delta {
                general.loyalty = apply_rating_delta(general.loyalty, d);
            }
            report.applied += 1;
        }

        for event in &self.new_events {
            f.push_event(event.clone());
            report.applied += 1;
        }
        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::setup::test_world;
    use crate::types::{City, General, RECENT_EVENTS_CAP};

    fn world() -> WorldState {
        let mut w = test_world(Vec::new(), 1);
        let f = &mut w.factions[0];
        f.gold = 50;
        f.food = 50;
        f.popularity = 95;
        f.cities = vec![City { name: "Hokuto".into(), defense: 90, commerce: 40, agriculture: 5 }];
        f.generals = vec![General { name: "Kenji".into(), warfare: 70, leadership: 60, intelligence: 50, loyalty: 98, task: None }];
        w
    }

    #[test]
    fn absent_fields_are_noops() {
        let mut w = world();
        let before = w.clone();
        let report = StateChanges::default().apply(&mut w, FactionId(0));
        assert_eq!(report.applied, 0);
        assert_eq!(w, before);
    }

    #[test]
    fn deltas_clamped_at_floor_and_ceiling() {
        let mut w = world();
        let changes = StateChanges::from_json(
            r#"{
                "gold_delta": -500,
                "popularity_delta": 20,
                "city_updates": [{ "city": "Hokuto", "defense_delta": 30, "agriculture_delta": -10 }],
                "general_updates": [{ "general": "Kenji", "task": "Patrol the border", "loyalty_delta": 10 }],
                "result_message": "Done"
            }"#,
        )
        .unwrap();
        let report = changes.apply(&mut w, FactionId(0));
        let f = &w.factions[0];
        assert_eq!(f.gold, 0);
        assert_eq!(f.food, 50);
        assert_eq!(f.popularity, 100);
        assert_eq!(f.cities[0].defense, 100);
        assert_eq!(f.cities[0].agriculture, 0);
        assert_eq!(f.generals[0].loyalty, 100);
        assert_eq!(f.generals[0].task.as_deref(), Some("Patrol the border"));
        assert_eq!(report.applied, 4);
    }

    #[test]
    fn unknown_targets_are_skipped() {
        let mut w = world();
        let changes = StateChanges {
            city_updates: vec![CityUpdate { city: "Atlantis".into(), defense_delta: Some(5), ..Default::default() }],
            general_updates: vec![GeneralUpdate { general: "Nobody".into(), loyalty_delta: Some(-5), ..Default::default() }],
            ..Default::default()
        };
        let report = changes.apply(&mut w, FactionId(0));
        assert_eq!(report.applied, 0);
        assert_eq!(report.skipped.len(), 2);
    }

    #[test]
    fn malformed_json_falls_back() {
        let changes = StateChanges::parse_or_fallback("{ not json");
        assert!(changes.is_empty());
        assert_eq!(changes.result_message, FALLBACK_MESSAGE);

        let mut w = world();
        let before = w.clone();
        changes.apply(&mut w, FactionId(0));
        assert_eq!(w, before);
    }

    #[test]
    fn new_events_respect_ring_bound() {
        let mut w = world();
        let changes = StateChanges {
            new_events: (0..8).map(|i| format!("event {i}")).collect(),
            ..Default::default()
        };
        changes.apply(&mut w, FactionId(0));
        let events = &w.factions[0].recent_events;
        assert_eq!(events.len(), RECENT_EVENTS_CAP);
        assert_eq!(events.back().map(String::as_str), Some("event 7"));
    }
}
