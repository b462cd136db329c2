// ═══════════════════════════════════════════════════════════════════════
// Game setup — scenarios (static reference data) and the initial WorldState
// ═══════════════════════════════════════════════════════════════════════

use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};

use crate::config::EngineConfig;
use crate::error::EngineError;
use crate::events::{default_events, EventTemplate};
use crate::garrison;
use crate::map::{self, CastleDef, AKANE, AOYAMA, KUROGANE, SEIRAN};
use crate::skills::{default_skill_tree, SkillDef, SkillTree};
use crate::types::*;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CastleSpec {
    pub name: String,
    pub grade: CastleGrade,
    pub owner: Option<FactionId>,
    pub garrison: u32,
    /// Defaults to the grade's capacity tier.
    pub max_garrison: Option<u32>,
    /// Defaults to the grade's base multiplier.
    pub defense_multiplier: Option<f64>,
    pub wall_level: u32,
    pub adjacent: Vec<String>,
}

impl Default for CastleSpec {
    fn default() -> Self {
        CastleSpec {
            name: String::new(),
            grade: CastleGrade::Standard,
            owner: None,
            garrison: 0,
            max_garrison: None,
            defense_multiplier: None,
            wall_level: 0,
            adjacent: Vec::new(),
        }
    }
}

impl From<&CastleDef> for CastleSpec {
    fn from(def: &CastleDef) -> Self {
        let castle = def.to_castle();
        CastleSpec {
            name: castle.name,
            grade: castle.grade,
            owner: castle.owner,
            garrison: castle.garrison,
            max_garrison: None,
            defense_multiplier: None,
            wall_level: castle.wall_level,
            adjacent: castle.adjacent,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FactionSpec {
    pub id: FactionId,
    pub name: String,
    pub ruler: String,
    pub capital: String,
    pub points: Points,
    pub gold: u32,
    pub food: u32,
    pub popularity: u32,
    pub facilities: Facilities,
    pub skills: Vec<String>,
    pub personality: Personality,
    pub generals: Vec<General>,
    pub cities: Vec<City>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelationSpec {
    pub a: FactionId,
    pub b: FactionId,
    pub score: i32,
}

fn default_start_month() -> u8 {
    3
}

fn default_start_year() -> u32 {
    1
}

/// Static configuration: map, roster and reference data. Never mutated
/// during a game.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Scenario {
    pub name: String,
    pub player: FactionId,
    #[serde(default = "default_start_month")]
    pub start_month: u8,
    #[serde(default = "default_start_year")]
    pub start_year: u32,
    pub castles: Vec<CastleSpec>,
    pub factions: Vec<FactionSpec>,
    #[serde(default)]
    pub relations: Vec<RelationSpec>,
    #[serde(default = "default_skill_tree")]
    pub skills: Vec<SkillDef>,
    #[serde(default = "default_events")]
    pub events: Vec<EventTemplate>,
}

impl Scenario {
    pub fn from_json(json: &str) -> Result<Self, EngineError> {
        let scenario: Scenario = serde_json::from_str(json)?;
        scenario.validate()?;
        Ok(scenario)
    }

    pub fn skill_tree(&self) -> Result<SkillTree, EngineError> {
        SkillTree::new(self.skills.clone())
    }

    pub fn validate(&self) -> Result<(), EngineError> {
        let bad = |msg: String| Err(EngineError::InvalidScenario(msg));

        if !(1..=12).contains(&self.start_month) {
            return bad(format!("start month {} out of range", self.start_month));
        }

        let mut faction_ids = HashSet::new();
        for f in &self.factions {
            if !faction_ids.insert(f.id) {
                return bad(format!("duplicate faction id {}", f.id));
            }
        }
        if !faction_ids.contains(&self.player) {
            return bad(format!("player faction {} not in roster", self.player));
        }

        let mut owners: HashMap<&str, Option<FactionId>> = HashMap::new();
        for c in &self.castles {
            if owners.insert(c.name.as_str(), c.owner).is_some() {
                return bad(format!("duplicate castle {}", c.name));
            }
            if let Some(owner) = c.owner {
                if !faction_ids.contains(&owner) {
                    return bad(format!("castle {} owned by unknown {owner}", c.name));
                }
            }
            let cap = c.max_garrison.unwrap_or(c.grade.default_capacity());
            if c.garrison > cap {
                return bad(format!("castle {} garrison {} exceeds capacity {cap}", c.name, c.garrison));
            }
        }
        for c in &self.castles {
            if let Some(adj) = c.adjacent.iter().find(|a| !owners.contains_key(a.as_str())) {
                return bad(format!("castle {} adjacent to unknown {adj}", c.name));
            }
        }

        for f in &self.factions {
            if f.capital.is_empty() {
                continue;
            }
            match owners.get(f.capital.as_str()) {
                Some(owner) if *owner == Some(f.id) => {}
                _ => return bad(format!("{} capital {} is not one of its castles", f.name, f.capital)),
            }
        }

        for r in &self.relations {
            if r.a == r.b || !faction_ids.contains(&r.a) || !faction_ids.contains(&r.b) {
                return bad(format!("bad relation {} / {}", r.a, r.b));
            }
        }

        let tree = self.skill_tree()?;
        for f in &self.factions {
            if let Some(s) = f.skills.iter().find(|s| tree.get(s).is_none()) {
                return bad(format!("{} starts with unknown skill {s}", f.name));
            }
        }
        Ok(())
    }
}

fn general(name: &str, warfare: u32, leadership: u32, intelligence: u32, loyalty: u32) -> General {
    General { name: name.into(), warfare, leadership, intelligence, loyalty, task: None }
}

fn city(name: &str, defense: u32, commerce: u32, agriculture: u32) -> City {
    City { name: name.into(), defense, commerce, agriculture }
}

fn starting_faction(id: FactionId, name: &str, ruler: &str, capital: &str, personality: Personality) -> FactionSpec {
    FactionSpec {
        id,
        name: name.into(),
        ruler: ruler.into(),
        capital: capital.into(),
        points: Points { ap: 6, ap_max: 10, sp: 2, ip: 30, dp: 4, troops: 30_000, training: 0.5, morale: 1.0 },
        gold: 200,
        food: 150,
        popularity: 60,
        facilities: Facilities {
            market: Facility { count: 1, level: 1 },
            farm: Facility { count: 1, level: 1 },
            bank_level: 0,
        },
        personality,
        ..Default::default()
    }
}

impl Default for Scenario {
    /// Four rival clans on the 16-castle realm; the player leads Kurogane.
    fn default() -> Self {
        let mut kurogane = starting_faction(
            KUROGANE,
            "Kurogane",
            "Kurogane Tadakatsu",
            "Hokuto",
            Personality { aggression: 60, diplomacy: 40, development: 50, risk_tolerance: 55 },
        );
        kurogane.generals = vec![
            general("Kurogane Tadakatsu", 85, 75, 60, 100),
            general("Ishida Renzo", 60, 70, 65, 80),
            general("Mori Kaede", 45, 55, 85, 75),
        ];
        kurogane.cities = vec![city("Hokuto", 60, 45, 40), city("Kiso", 50, 25, 55)];

        let mut seiran = starting_faction(
            SEIRAN,
            "Seiran",
            "Seiran Mitsuhide",
            "Seiryu",
            Personality { aggression: 35, diplomacy: 75, development: 60, risk_tolerance: 40 },
        );
        seiran.generals = vec![
            general("Seiran Mitsuhide", 65, 80, 85, 100),
            general("Kuroda Shin", 75, 60, 55, 70),
            general("Yagyu Aoi", 55, 65, 70, 85),
        ];
        seiran.cities = vec![city("Seiryu", 55, 55, 35), city("Takane", 60, 30, 45)];

        let mut akane = starting_faction(
            AKANE,
            "Akane",
            "Akane Shingen",
            "Hinode",
            Personality { aggression: 80, diplomacy: 25, development: 35, risk_tolerance: 70 },
        );
        akane.generals = vec![
            general("Akane Shingen", 90, 80, 55, 100),
            general("Baba Nobuharu", 80, 70, 50, 85),
            general("Yamamoto Kansuke", 50, 60, 90, 80),
        ];
        akane.cities = vec![city("Hinode", 50, 35, 50), city("Kagami", 65, 20, 40)];

        let mut aoyama = starting_faction(
            AOYAMA,
            "Aoyama",
            "Aoyama Ujiyasu",
            "Aoba",
            Personality { aggression: 30, diplomacy: 55, development: 85, risk_tolerance: 35 },
        );
        aoyama.generals = vec![
            general("Aoyama Ujiyasu", 70, 75, 75, 100),
            general("Hojo Tsunashige", 70, 65, 50, 90),
            general("Fuma Kotaro", 55, 45, 80, 70),
        ];
        aoyama.cities = vec![city("Aoba", 55, 50, 60), city("Otowa", 40, 30, 55)];
        aoyama.facilities.bank_level = 1;

        Scenario {
            name: "Sengoku Realm".into(),
            player: KUROGANE,
            start_month: default_start_month(),
            start_year: default_start_year(),
            castles: map::CASTLES.iter().map(CastleSpec::from).collect(),
            factions: vec![kurogane, seiran, akane, aoyama],
            relations: vec![
                RelationSpec { a: KUROGANE, b: SEIRAN, score: 10 },
                RelationSpec { a: KUROGANE, b: AKANE, score: -25 },
                RelationSpec { a: SEIRAN, b: AOYAMA, score: 30 },
                RelationSpec { a: AKANE, b: AOYAMA, score: -30 },
            ],
            skills: default_skill_tree(),
            events: default_events(),
        }
    }
}

/// Build the opening WorldState: validated scenario, neutral relations for
/// every pair (overridden by the scenario's), garrisons allocated.
pub fn create_world(scenario: &Scenario, config: &EngineConfig) -> Result<WorldState, EngineError> {
    scenario.validate()?;

    let castles = scenario
        .castles
        .iter()
        .map(|c| Castle {
            name: c.name.clone(),
            grade: c.grade,
            owner: c.owner,
            garrison: c.garrison,
            max_garrison: c.max_garrison.unwrap_or(c.grade.default_capacity()),
            defense_multiplier: c.defense_multiplier.unwrap_or(c.grade.base_defense_multiplier()),
            wall_level: c.wall_level,
            adjacent: c.adjacent.clone(),
        })
        .collect();

    let factions: Vec<Faction> = scenario
        .factions
        .iter()
        .map(|s| Faction {
            id: s.id,
            name: s.name.clone(),
            ruler: s.ruler.clone(),
            is_player: s.id == scenario.player,
            capital: s.capital.clone(),
            points: s.points,
            gold: s.gold,
            food: s.food,
            popularity: s.popularity.min(100),
            facilities: s.facilities,
            ruler_level: RulerLevel::default(),
            skills: s.skills.clone(),
            wounded: Vec::new(),
            recent_events: Default::default(),
            recent_battles: Default::default(),
            personality: s.personality,
            generals: s.generals.clone(),
            captives: Vec::new(),
            cities: s.cities.clone(),
        })
        .collect();

    let mut turn_order: Vec<FactionId> = factions.iter().map(|f| f.id).collect();
    turn_order.sort();

    let mut relations = Vec::new();
    for (i, a) in turn_order.iter().enumerate() {
        for b in &turn_order[i + 1..] {
            relations.push(DiplomaticRelation::neutral(*a, *b));
        }
    }

    let mut world = WorldState {
        turn: 1,
        month: scenario.start_month,
        year: scenario.start_year,
        player: scenario.player,
        factions,
        relations,
        castles,
        turn_order,
        tasks: Vec::new(),
        pending_invasion: None,
    };

    for r in &scenario.relations {
        let rel = world.relation_mut(r.a, r.b);
        rel.score = r.score.clamp(-100, 100);
        rel.relation_type = RelationType::from_score(rel.score);
    }

    let ids = world.turn_order.clone();
    for id in ids {
        garrison::reallocate(&mut world, id, &config.garrison);
    }
    Ok(world)
}

// ── Test fixtures ──────────────────────────────────────────────────────

#[cfg(test)]
pub(crate) fn test_faction(id: u8) -> Faction {
    Faction {
        id: FactionId(id),
        name: format!("Faction {id}"),
        ruler: format!("Ruler {id}"),
        is_player: id == 0,
        capital: String::new(),
        points: Points::default(),
        gold: 0,
        food: 0,
        popularity: 50,
        facilities: Facilities::default(),
        ruler_level: RulerLevel::default(),
        skills: Vec::new(),
        wounded: Vec::new(),
        recent_events: Default::default(),
        recent_battles: Default::default(),
        personality: Personality::default(),
        generals: Vec::new(),
        captives: Vec::new(),
        cities: Vec::new(),
    }
}

#[cfg(test)]
pub(crate) fn test_castle(name: &str, grade: CastleGrade, owner: Option<FactionId>, max_garrison: u32) -> Castle {
    Castle {
        name: name.into(),
        grade,
        owner,
        garrison: 0,
        max_garrison,
        defense_multiplier: grade.base_defense_multiplier(),
        wall_level: 0,
        adjacent: Vec::new(),
    }
}

#[cfg(test)]
pub(crate) fn test_world(castles: Vec<Castle>, factions: u8) -> WorldState {
    WorldState {
        turn: 1,
        month: 3,
        year: 1,
        player: FactionId(0),
        factions: (0..factions).map(test_faction).collect(),
        relations: Vec::new(),
        castles,
        turn_order: (0..factions).map(FactionId).collect(),
        tasks: Vec::new(),
        pending_invasion: None,
    }
}
