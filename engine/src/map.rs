// ═══════════════════════════════════════════════════════════════════════
// Static map data — the default 16-castle realm
// A 4×4 grid, each castle adjacent to its orthogonal neighbours.
// ═══════════════════════════════════════════════════════════════════════

use crate::types::{Castle, CastleGrade, FactionId};

/// Static description of a castle (compile-time constant).
#[derive(Debug, Clone)]
pub struct CastleDef {
    pub name: &'static str,
    pub grade: CastleGrade,
    pub owner: Option<FactionId>,
    /// Starting garrison for neutral castles; owned castles are allocated.
    pub neutral_garrison: u32,
    pub wall_level: u32,
    pub adjacent: &'static [&'static str],
}

impl CastleDef {
    pub fn to_castle(&self) -> Castle {
        Castle {
            name: self.name.to_string(),
            grade: self.grade,
            owner: self.owner,
            garrison: if self.owner.is_none() { self.neutral_garrison } else { 0 },
            max_garrison: self.grade.default_capacity(),
            defense_multiplier: self.grade.base_defense_multiplier(),
            wall_level: self.wall_level,
            adjacent: self.adjacent.iter().map(|a| a.to_string()).collect(),
        }
    }
}

pub const KUROGANE: FactionId = FactionId(0);
pub const SEIRAN: FactionId = FactionId(1);
pub const AKANE: FactionId = FactionId(2);
pub const AOYAMA: FactionId = FactionId(3);

pub const NUM_CASTLES: usize = 16;

macro_rules! castle {
    ($name:expr, $grade:ident, owner: $o:expr, walls: $w:expr, adj: [$($a:expr),*]) => {
        CastleDef {
            name: $name, grade: CastleGrade::$grade, owner: Some($o),
            neutral_garrison: 0, wall_level: $w, adjacent: &[$($a),*],
        }
    };
    ($name:expr, $grade:ident, neutral: $g:expr, walls: $w:expr, adj: [$($a:expr),*]) => {
        CastleDef {
            name: $name, grade: CastleGrade::$grade, owner: None,
            neutral_garrison: $g, wall_level: $w, adjacent: &[$($a),*],
        }
    };
}

pub static CASTLES: [CastleDef; NUM_CASTLES] = [
    // Row 0 — the northern ridge
    castle!("Hokuto", Capital, owner: KUROGANE, walls: 2, adj: ["Yukimura", "Kiso"]),
    castle!("Yukimura", Standard, owner: KUROGANE, walls: 0, adj: ["Hokuto", "Kitayama", "Fujimi"]),
    castle!("Kitayama", Fortress, neutral: 12_000, walls: 1, adj: ["Yukimura", "Shirane", "Takane"]),
    castle!("Shirane", Standard, owner: SEIRAN, walls: 0, adj: ["Kitayama", "Seiryu"]),
    // Row 1
    castle!("Kiso", Fortress, owner: KUROGANE, walls: 1, adj: ["Hokuto", "Fujimi", "Minase"]),
    castle!("Fujimi", Standard, neutral: 6_000, walls: 0, adj: ["Yukimura", "Kiso", "Takane", "Nakatsu"]),
    castle!("Takane", Fortress, owner: SEIRAN, walls: 1, adj: ["Kitayama", "Fujimi", "Seiryu", "Sakaki"]),
    castle!("Seiryu", Capital, owner: SEIRAN, walls: 2, adj: ["Shirane", "Takane", "Otowa"]),
    // Row 2
    castle!("Minase", Standard, owner: AKANE, walls: 0, adj: ["Kiso", "Nakatsu", "Hinode"]),
    castle!("Nakatsu", Fortress, neutral: 12_000, walls: 1, adj: ["Fujimi", "Minase", "Sakaki", "Kagami"]),
    castle!("Sakaki", Standard, neutral: 6_000, walls: 0, adj: ["Takane", "Nakatsu", "Otowa", "Tsurugi"]),
    castle!("Otowa", Standard, owner: AOYAMA, walls: 0, adj: ["Seiryu", "Sakaki", "Aoba"]),
    // Row 3 — the southern coast
    castle!("Hinode", Capital, owner: AKANE, walls: 2, adj: ["Minase", "Kagami"]),
    castle!("Kagami", Fortress, owner: AKANE, walls: 1, adj: ["Nakatsu", "Hinode", "Tsurugi"]),
    castle!("Tsurugi", Fortress, owner: AOYAMA, walls: 1, adj: ["Sakaki", "Kagami", "Aoba"]),
    castle!("Aoba", Capital, owner: AOYAMA, walls: 2, adj: ["Otowa", "Tsurugi"]),
];

#[cfg(test)]
mod tests {
    use super::*;

    fn castle_def(name: &str) -> Option<&'static CastleDef> {
        CASTLES.iter().find(|c| c.name == name)
    }

    #[test]
    fn adjacency_is_symmetric() {
        for c in &CASTLES {
            for adj in c.adjacent {
                let other = castle_def(adj).unwrap_or_else(|| panic!("{} lists unknown {adj}", c.name));
                assert!(other.adjacent.contains(&c.name), "{} -> {adj} is one-way", c.name);
            }
        }
    }

    #[test]
    fn four_factions_three_castles_each() {
        for id in [KUROGANE, SEIRAN, AKANE, AOYAMA] {
            let owned: Vec<_> = CASTLES.iter().filter(|c| c.owner == Some(id)).collect();
            assert_eq!(owned.len(), 3);
            assert_eq!(owned.iter().filter(|c| c.grade == CastleGrade::Capital).count(), 1);
        }
        assert_eq!(CASTLES.iter().filter(|c| c.owner.is_none()).count(), 4);
    }

    #[test]
    fn neutral_castles_start_garrisoned() {
        let castles: Vec<Castle> = CASTLES.iter().map(CastleDef::to_castle).collect();
        let kitayama = castles.iter().find(|c| c.name == "Kitayama").unwrap();
        assert_eq!(kitayama.garrison, 12_000);
        assert_eq!(kitayama.max_garrison, 60_000);
        assert!(castles.iter().all(|c| c.garrison <= c.max_garrison));
    }
}
