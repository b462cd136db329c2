// ═══════════════════════════════════════════════════════════════════════
// Core types — the world state and everything reachable from it
// ═══════════════════════════════════════════════════════════════════════

use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

/// Length of the per-faction recent event ring.
pub const RECENT_EVENTS_CAP: usize = 5;
/// Length of the per-faction recent battle ring.
pub const RECENT_BATTLES_CAP: usize = 5;
pub const MAX_MORALE: f64 = 2.0;
pub const MAX_URGENCY: u32 = 100;
pub const URGENCY_PER_TURN: u32 = 10;

/// Apply a signed delta to an unsigned pool, flooring at zero.
pub fn apply_delta(value: u32, delta: i64) -> u32 {
    i64::from(value).saturating_add(delta).clamp(0, i64::from(u32::MAX)) as u32
}

/// Apply a signed delta to a 0–100 rating.
pub fn apply_rating_delta(value: u32, delta: i64) -> u32 {
    i64::from(value).saturating_add(delta).clamp(0, 100) as u32
}

// ── Enums ──────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct FactionId(pub u8);

impl std::fmt::Display for FactionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "faction#{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CastleGrade {
    Capital,
    Fortress,
    Standard,
}

impl CastleGrade {
    pub fn base_defense_multiplier(self) -> f64 {
        match self {
            CastleGrade::Capital => 1.5,
            CastleGrade::Fortress => 1.3,
            CastleGrade::Standard => 1.0,
        }
    }

    /// Default garrison capacity tier.
    pub fn default_capacity(self) -> u32 {
        match self {
            CastleGrade::Capital => 80_000,
            CastleGrade::Fortress => 60_000,
            CastleGrade::Standard => 30_000,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Season {
    Spring,
    Summer,
    Autumn,
    Winter,
}

impl Season {
    pub fn from_month(month: u8) -> Season {
        match month {
            3..=5 => Season::Spring,
            6..=8 => Season::Summer,
            9..=11 => Season::Autumn,
            _ => Season::Winter,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RelationType {
    Alliance,
    Friendly,
    Neutral,
    Hostile,
    War,
}

impl RelationType {
    /// The single authoritative score → label mapping.
    pub fn from_score(score: i32) -> RelationType {
        match score {
            s if s >= 60 => RelationType::Alliance,
            s if s >= 20 => RelationType::Friendly,
            s if s >= -20 => RelationType::Neutral,
            s if s >= -60 => RelationType::Hostile,
            _ => RelationType::War,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TreatyKind {
    MilitaryAlliance,
    Trade,
    NonAggression,
    /// `payer` hands a share of its gold to the other party each turn.
    Tribute { payer: FactionId },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Treaty {
    pub kind: TreatyKind,
    pub turns_remaining: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BattleType {
    Field,
    Siege,
    Ambush,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BattleOutcome {
    Won,
    Lost,
}

// ── Points ─────────────────────────────────────────────────────────────

/// The five per-faction pools. Military points are derived from troops,
/// training and morale and never stored.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Points {
    pub ap: u32,
    pub ap_max: u32,
    pub sp: u32,
    pub ip: u32,
    pub dp: u32,
    pub troops: u32,
    pub training: f64,
    pub morale: f64,
}

impl Points {
    pub fn mp(&self) -> u32 {
        (f64::from(self.troops) * self.training.clamp(0.0, 1.0) * self.morale.clamp(0.0, MAX_MORALE))
            .floor() as u32
    }
}

impl Default for Points {
    fn default() -> Self {
        Points { ap: 0, ap_max: 10, sp: 0, ip: 0, dp: 0, troops: 0, training: 0.5, morale: 1.0 }
    }
}

// ── Faction parts ──────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Facility {
    pub count: u32,
    pub level: u32,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Facilities {
    pub market: Facility,
    pub farm: Facility,
    pub bank_level: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FacilityKind {
    Market,
    Farm,
    Bank,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RulerLevel {
    pub level: u32,
    /// Maximum troops a single action may commit.
    pub deployment_cap: u32,
}

impl Default for RulerLevel {
    fn default() -> Self {
        RulerLevel { level: 1, deployment_cap: 20_000 }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WoundedEntry {
    pub amount: u32,
    pub recovery_turns: u32,
}

/// NPC temperament, each axis 0–100.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Personality {
    pub aggression: u8,
    pub diplomacy: u8,
    pub development: u8,
    pub risk_tolerance: u8,
}

impl Default for Personality {
    fn default() -> Self {
        Personality { aggression: 50, diplomacy: 50, development: 50, risk_tolerance: 50 }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct General {
    pub name: String,
    pub warfare: u32,
    pub leadership: u32,
    pub intelligence: u32,
    pub loyalty: u32,
    pub task: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct City {
    pub name: String,
    pub defense: u32,
    pub commerce: u32,
    pub agriculture: u32,
}

// ── Faction ────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Faction {
    pub id: FactionId,
    pub name: String,
    pub ruler: String,
    pub is_player: bool,
    /// Name of the faction's fixed capital castle.
    pub capital: String,
    pub points: Points,
    pub gold: u32,
    pub food: u32,
    pub popularity: u32,
    pub facilities: Facilities,
    pub ruler_level: RulerLevel,
    pub skills: Vec<String>,
    pub wounded: Vec<WoundedEntry>,
    pub recent_events: VecDeque<String>,
    pub recent_battles: VecDeque<BattleOutcome>,
    pub personality: Personality,
    pub generals: Vec<General>,
    pub captives: Vec<General>,
    pub cities: Vec<City>,
}

impl Faction {
    pub fn push_event(&mut self, event: impl Into<String>) {
        self.recent_events.push_back(event.into());
        while self.recent_events.len() > RECENT_EVENTS_CAP {
            self.recent_events.pop_front();
        }
    }

    pub fn record_battle(&mut self, outcome: BattleOutcome) {
        self.recent_battles.push_back(outcome);
        while self.recent_battles.len() > RECENT_BATTLES_CAP {
            self.recent_battles.pop_front();
        }
    }

    pub fn has_skill(&self, id: &str) -> bool {
        self.skills.iter().any(|s| s == id)
    }

    pub fn general(&self, name: &str) -> Option<&General> {
        self.generals.iter().find(|g| g.name == name)
    }

    pub fn wounded_total(&self) -> u32 {
        self.wounded.iter().map(|w| w.amount).sum()
    }
}

// ── Castle ─────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Castle {
    pub name: String,
    pub grade: CastleGrade,
    pub owner: Option<FactionId>, // None = neutral
    pub garrison: u32,
    pub max_garrison: u32,
    pub defense_multiplier: f64,
    pub wall_level: u32,
    pub adjacent: Vec<String>,
}

// ── Diplomatic relation ────────────────────────────────────────────────

/// One record per unordered faction pair; `a < b` always.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiplomaticRelation {
    pub a: FactionId,
    pub b: FactionId,
    pub score: i32,
    pub relation_type: RelationType,
    /// The type is an action's override, not the score's band.
    #[serde(default)]
    pub type_forced: bool,
    pub treaties: Vec<Treaty>,
}

impl DiplomaticRelation {
    pub fn neutral(x: FactionId, y: FactionId) -> Self {
        let (a, b) = if x <= y { (x, y) } else { (y, x) };
        DiplomaticRelation { a, b, score: 0, relation_type: RelationType::Neutral, type_forced: false, treaties: Vec::new() }
    }

    pub fn involves(&self, f: FactionId) -> bool {
        self.a == f || self.b == f
    }

    pub fn other(&self, f: FactionId) -> FactionId {
        if self.a == f { self.b } else { self.a }
    }

    pub fn has_treaty(&self, matches: impl Fn(&TreatyKind) -> bool) -> bool {
        self.treaties.iter().any(|t| matches(&t.kind))
    }
}

// ── Tasks / invasions ──────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GameTask {
    pub title: String,
    pub urgency: u32,
    pub turns_remaining: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingInvasion {
    pub attacker: FactionId,
    pub troops_estimate: u32,
    pub target_castle: String,
}

// ── World State ────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorldState {
    pub turn: u32,
    pub month: u8, // 1–12
    pub year: u32,
    pub player: FactionId,
    pub factions: Vec<Faction>,
    pub relations: Vec<DiplomaticRelation>,
    pub castles: Vec<Castle>,
    /// Fixed per-turn processing order.
    pub turn_order: Vec<FactionId>,
    pub tasks: Vec<GameTask>,
    /// Lives only between an attack and the player's response.
    #[serde(skip)]
    pub pending_invasion: Option<PendingInvasion>,
}

impl WorldState {
    pub fn season(&self) -> Season {
        Season::from_month(self.month)
    }

    pub fn faction(&self, id: FactionId) -> Option<&Faction> {
        self.factions.iter().find(|f| f.id == id)
    }

    pub fn faction_mut(&mut self, id: FactionId) -> Option<&mut Faction> {
        self.factions.iter_mut().find(|f| f.id == id)
    }

    pub fn castle(&self, name: &str) -> Option<&Castle> {
        self.castles.iter().find(|c| c.name == name)
    }

    pub fn castle_mut(&mut self, name: &str) -> Option<&mut Castle> {
        self.castles.iter_mut().find(|c| c.name == name)
    }

    /// Castles owned by a faction, in world order. Ownership lives on the
    /// castle; this is the faction's castle list.
    pub fn owned_castles(&self, id: FactionId) -> Vec<&Castle> {
        self.castles.iter().filter(|c| c.owner == Some(id)).collect()
    }

    pub fn castle_count(&self, id: FactionId) -> usize {
        self.castles.iter().filter(|c| c.owner == Some(id)).count()
    }

    /// A faction still in the game (owns at least one castle).
    pub fn is_active(&self, id: FactionId) -> bool {
        self.castle_count(id) > 0
    }

    /// True if any adjacent castle has a different owner.
    pub fn is_frontline(&self, castle: &Castle) -> bool {
        castle.adjacent.iter().any(|adj| {
            self.castle(adj).is_some_and(|other| other.owner != castle.owner)
        })
    }

    /// Relation between two factions; neutral if never touched.
    pub fn relation(&self, x: FactionId, y: FactionId) -> DiplomaticRelation {
        let neutral = DiplomaticRelation::neutral(x, y);
        self.relations
            .iter()
            .find(|r| r.a == neutral.a && r.b == neutral.b)
            .cloned()
            .unwrap_or(neutral)
    }

    /// Mutable relation, created lazily on first access.
    pub fn relation_mut(&mut self, x: FactionId, y: FactionId) -> &mut DiplomaticRelation {
        let neutral = DiplomaticRelation::neutral(x, y);
        let idx = match self.relations.iter().position(|r| r.a == neutral.a && r.b == neutral.b) {
            Some(i) => i,
            None => {
                self.relations.push(neutral);
                self.relations.len() - 1
            }
        };
        &mut self.relations[idx]
    }

    pub fn push_task(&mut self, title: impl Into<String>, urgency: u32, turns: u32) {
        let title = title.into();
        if self.tasks.iter().any(|t| t.title == title) {
            return;
        }
        self.tasks.push(GameTask { title, urgency: urgency.min(MAX_URGENCY), turns_remaining: turns });
    }
}
