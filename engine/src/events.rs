// ═══════════════════════════════════════════════════════════════════════
// Event Roller — weighted random events, at most one per faction per turn
// ═══════════════════════════════════════════════════════════════════════

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::config::EventConfig;
use crate::types::{apply_delta, apply_rating_delta, Faction, FactionId, Season, WorldState, MAX_MORALE};

/// Fixed payload of an event.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PointDeltas {
    pub ip_delta: i64,
    pub gold_delta: i64,
    pub food_delta: i64,
    pub mp_troops_delta: i64,
    pub mp_morale_delta: f64,
    pub popularity_delta: i64,
}

/// Eligibility test over one faction's state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Condition {
    MinTroops(u32),
    MaxFood(u32),
    MinGold(u32),
    MinPopularity(u32),
    MaxPopularity(u32),
    InSeason(Season),
    HasSkill(String),
}

impl Condition {
    pub fn holds(&self, faction: &Faction, season: Season) -> bool {
        match self {
            Condition::MinTroops(n) => faction.points.troops >= *n,
            Condition::MaxFood(n) => faction.food <= *n,
            Condition::MinGold(n) => faction.gold >= *n,
            Condition::MinPopularity(n) => faction.popularity >= *n,
            Condition::MaxPopularity(n) => faction.popularity <= *n,
            Condition::InSeason(s) => season == *s,
            Condition::HasSkill(id) => faction.has_skill(id),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventTemplate {
    pub id: String,
    pub title: String,
    pub weight: u32,
    /// All must hold; empty means always eligible.
    #[serde(default)]
    pub conditions: Vec<Condition>,
    pub deltas: PointDeltas,
}

impl EventTemplate {
    pub fn eligible(&self, faction: &Faction, season: Season) -> bool {
        self.weight > 0 && self.conditions.iter().all(|c| c.holds(faction, season))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GameEvent {
    pub faction: FactionId,
    pub template_id: String,
    pub title: String,
    pub deltas: PointDeltas,
}

/// Cumulative-weight draw among the eligible templates.
pub fn pick<'a, R: Rng + ?Sized>(eligible: &[&'a EventTemplate], rng: &mut R) -> Option<&'a EventTemplate> {
    let total: u32 = eligible.iter().map(|t| t.weight).sum();
    if total == 0 {
        return None;
    }
    let mut roll = rng.gen_range(0..total);
    for t in eligible {
        if roll < t.weight {
            return Some(t);
        }
        roll -= t.weight;
    }
    None
}

/// One gated draw per active faction, in turn order.
pub fn roll<R: Rng + ?Sized>(
    world: &WorldState,
    templates: &[EventTemplate],
    config: &EventConfig,
    rng: &mut R,
) -> Vec<GameEvent> {
    let season = world.season();
    let mut events = Vec::new();
    for id in &world.turn_order {
        let Some(faction) = world.faction(*id) else { continue };
        if !world.is_active(*id) {
            continue;
        }
        if !rng.gen_bool(config.trigger_chance) {
            continue;
        }
        let eligible: Vec<&EventTemplate> = templates.iter().filter(|t| t.eligible(faction, season)).collect();
        if let Some(t) = pick(&eligible, rng) {
            events.push(GameEvent {
                faction: *id,
                template_id: t.id.clone(),
                title: t.title.clone(),
                deltas: t.deltas,
            });
        }
    }
    events
}

pub fn apply_event(world: &mut WorldState, event: &GameEvent) {
    let Some(f) = world.faction_mut(event.faction) else {
        tracing::warn!(faction = %event.faction, event = %event.template_id, "event for unknown faction");
        return;
    };
    let d = &event.deltas;
    f.points.ip = apply_delta(f.points.ip, d.ip_delta);
    f.gold = apply_delta(f.gold, d.gold_delta);
    f.food = apply_delta(f.food, d.food_delta);
    f.points.troops = apply_delta(f.points.troops, d.mp_troops_delta);
    f.points.morale = (f.points.morale + d.mp_morale_delta).clamp(0.0, MAX_MORALE);
    f.popularity = apply_rating_delta(f.popularity, d.popularity_delta);
    f.push_event(event.title.clone());
}

fn template(id: &str, title: &str, weight: u32, conditions: Vec<Condition>, deltas: PointDeltas) -> EventTemplate {
    EventTemplate { id: id.into(), title: title.into(), weight, conditions, deltas }
}

pub fn default_events() -> Vec<EventTemplate> {
    vec![
        template("bumper_harvest", "Bumper harvest", 10, vec![Condition::InSeason(Season::Autumn)],
            PointDeltas { food_delta: 60, popularity_delta: 3, ..Default::default() }),
        template("merchant_caravan", "A merchant caravan arrives", 8, vec![],
            PointDeltas { gold_delta: 40, ip_delta: 5, ..Default::default() }),
        template("plague", "Plague in the barracks", 4, vec![Condition::MinTroops(10_000)],
            PointDeltas { mp_troops_delta: -2_000, mp_morale_delta: -0.1, ..Default::default() }),
        template("bandits", "Bandits raid the granaries", 6, vec![],
            PointDeltas { food_delta: -30, popularity_delta: -2, ..Default::default() }),
        template("famine_riots", "Famine riots", 5, vec![Condition::MaxFood(20)],
            PointDeltas { popularity_delta: -8, mp_morale_delta: -0.2, ..Default::default() }),
        template("ronin_volunteers", "Ronin volunteer for service", 6, vec![Condition::MinPopularity(60)],
            PointDeltas { mp_troops_delta: 1_500, ..Default::default() }),
        template("winter_storm", "Heavy snow closes the passes", 7, vec![Condition::InSeason(Season::Winter)],
            PointDeltas { food_delta: -20, mp_morale_delta: -0.05, ..Default::default() }),
        template("festival", "Spring festival", 6, vec![Condition::InSeason(Season::Spring), Condition::MinGold(50)],
            PointDeltas { gold_delta: -30, popularity_delta: 6, mp_morale_delta: 0.1, ..Default::default() }),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::setup::{test_castle, test_faction, test_world};
    use crate::types::CastleGrade;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    #[test]
    fn ineligible_templates_never_drawn() {
        let mut f = test_faction(0);
        f.food = 500;
        let templates = default_events();
        for seed in 0..200 {
            let eligible: Vec<&EventTemplate> =
                templates.iter().filter(|t| t.eligible(&f, Season::Summer)).collect();
            let picked = pick(&eligible, &mut ChaCha8Rng::seed_from_u64(seed)).unwrap();
            assert_ne!(picked.id, "famine_riots");
            assert_ne!(picked.id, "bumper_harvest");
            assert_ne!(picked.id, "plague");
        }
    }

    #[test]
    fn zero_weight_is_ineligible() {
        let t = template("never", "Never", 0, vec![], PointDeltas::default());
        assert!(!t.eligible(&test_faction(0), Season::Spring));
        assert!(pick(&[], &mut ChaCha8Rng::seed_from_u64(0)).is_none());
    }

    #[test]
    fn cumulative_draw_respects_weights() {
        let heavy = template("heavy", "Heavy", 9, vec![], PointDeltas::default());
        let light = template("light", "Light", 1, vec![], PointDeltas::default());
        let pool = vec![&heavy, &light];
        let mut rng = ChaCha8Rng::seed_from_u64(5);
        let heavy_hits = (0..1000).filter(|_| pick(&pool, &mut rng).unwrap().id == "heavy").count();
        assert!((850..950).contains(&heavy_hits), "heavy drawn {heavy_hits} times");
    }

    #[test]
    fn eliminated_factions_get_no_events() {
        let castle = test_castle("Aoba", CastleGrade::Capital, Some(FactionId(0)), 80_000);
        let world = test_world(vec![castle], 2);
        let config = EventConfig { trigger_chance: 1.0 };
        let events = roll(&world, &default_events(), &config, &mut ChaCha8Rng::seed_from_u64(1));
        assert!(events.iter().all(|e| e.faction == FactionId(0)));
        assert_eq!(events.len(), 1);
    }

    #[test]
    fn applied_deltas_are_clamped() {
        let mut world = test_world(Vec::new(), 1);
        world.factions[0].food = 10;
        world.factions[0].popularity = 1;
        let event = GameEvent {
            faction: FactionId(0),
            template_id: "bandits".into(),
            title: "Bandits".into(),
            deltas: PointDeltas { food_delta: -30, popularity_delta: -2, mp_morale_delta: -5.0, ..Default::default() },
        };
        apply_event(&mut world, &event);
        let f = &world.factions[0];
        assert_eq!(f.food, 0);
        assert_eq!(f.popularity, 0);
        assert_eq!(f.points.morale, 0.0);
        assert_eq!(f.recent_events.back().map(String::as_str), Some("Bandits"));
    }
}
