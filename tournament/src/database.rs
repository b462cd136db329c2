// ═══════════════════════════════════════════════════════════════════════
// Database — SQLite storage for campaign results and agent standings
// ═══════════════════════════════════════════════════════════════════════

use rusqlite::{params, Connection, OptionalExtension};

use crate::error::CampaignError;
use crate::runner::CampaignResult;
use kingdom_engine::save::SaveData;

/// One row of the standings table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Standing {
    pub agent: String,
    pub campaigns: u32,
    /// Campaigns in which a faction played by this agent ended as leader.
    pub wins: u32,
}

pub struct Database {
    conn: Connection,
}

impl Database {
    /// Open (or create) a database at the given path.
    pub fn new(path: &str) -> Result<Self, CampaignError> {
        let db = Database { conn: Connection::open(path)? };
        db.create_schema()?;
        Ok(db)
    }

    /// In-memory database (useful for tests).
    pub fn in_memory() -> Result<Self, CampaignError> {
        let db = Database { conn: Connection::open_in_memory()? };
        db.create_schema()?;
        Ok(db)
    }

    fn create_schema(&self) -> Result<(), CampaignError> {
        self.conn.execute_batch("
            CREATE TABLE IF NOT EXISTS agents (
                id          INTEGER PRIMARY KEY,
                name        TEXT NOT NULL UNIQUE,
                campaigns   INTEGER NOT NULL DEFAULT 0,
                wins        INTEGER NOT NULL DEFAULT 0
            );

            CREATE TABLE IF NOT EXISTS campaigns (
                id          INTEGER PRIMARY KEY,
                seed        INTEGER NOT NULL,
                turns       INTEGER NOT NULL,
                outcome     TEXT NOT NULL,
                leader      TEXT,
                save_json   TEXT NOT NULL,
                played_at   TEXT NOT NULL DEFAULT (datetime('now'))
            );

            CREATE TABLE IF NOT EXISTS campaign_factions (
                id          INTEGER PRIMARY KEY,
                campaign_id INTEGER NOT NULL REFERENCES campaigns(id),
                agent_id    INTEGER NOT NULL REFERENCES agents(id),
                faction     TEXT NOT NULL,
                is_player   INTEGER NOT NULL,
                castles     INTEGER NOT NULL,
                troops      INTEGER NOT NULL,
                gold        INTEGER NOT NULL,
                food        INTEGER NOT NULL,
                eliminated  INTEGER NOT NULL
            );
        ")?;
        Ok(())
    }

    /// Register an agent (or return existing ID).
    pub fn register_agent(&self, name: &str) -> Result<i64, CampaignError> {
        self.conn.execute("INSERT OR IGNORE INTO agents (name) VALUES (?1)", params![name])?;
        let id = self.conn.query_row("SELECT id FROM agents WHERE name = ?1", params![name], |row| row.get(0))?;
        Ok(id)
    }

    /// Store a finished campaign, its final save and per-faction results,
    /// and update every participating agent's standing.
    pub fn store_campaign(&mut self, result: &CampaignResult) -> Result<i64, CampaignError> {
        let save_json = result.final_save.to_json()?;
        let leader = result.leader().map(|l| l.name.clone());
        let tx = self.conn.transaction()?;

        tx.execute(
            "INSERT INTO campaigns (seed, turns, outcome, leader, save_json) VALUES (?1, ?2, ?3, ?4, ?5)",
            params![result.seed as i64, result.turns_played, result.outcome_label(), leader, save_json],
        )?;
        let campaign_id = tx.last_insert_rowid();

        let mut seen: Vec<&str> = Vec::new();
        for fr in &result.faction_results {
            tx.execute("INSERT OR IGNORE INTO agents (name) VALUES (?1)", params![fr.agent_name])?;
            let agent_id: i64 =
                tx.query_row("SELECT id FROM agents WHERE name = ?1", params![fr.agent_name], |row| row.get(0))?;
            tx.execute(
                "INSERT INTO campaign_factions
                     (campaign_id, agent_id, faction, is_player, castles, troops, gold, food, eliminated)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
                params![
                    campaign_id,
                    agent_id,
                    fr.name,
                    fr.is_player,
                    fr.castles as i64,
                    fr.troops,
                    fr.gold,
                    fr.food,
                    fr.eliminated,
                ],
            )?;

            // One campaign counts once per agent, however many factions it played
            if !seen.contains(&fr.agent_name.as_str()) {
                seen.push(&fr.agent_name);
                let won = result.leader().is_some_and(|l| l.agent_name == fr.agent_name);
                tx.execute(
                    "UPDATE agents SET campaigns = campaigns + 1, wins = wins + ?1 WHERE id = ?2",
                    params![i64::from(won), agent_id],
                )?;
            }
        }

        tx.commit()?;
        Ok(campaign_id)
    }

    /// Agents ordered by wins, then by name.
    pub fn standings(&self) -> Result<Vec<Standing>, CampaignError> {
        let mut stmt = self.conn.prepare("SELECT name, campaigns, wins FROM agents ORDER BY wins DESC, name ASC")?;
        let rows = stmt.query_map([], |row| {
            Ok(Standing { agent: row.get(0)?, campaigns: row.get(1)?, wins: row.get(2)? })
        })?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    /// The final save of a stored campaign.
    pub fn load_save(&self, campaign_id: i64) -> Result<Option<SaveData>, CampaignError> {
        let json: Option<String> = self
            .conn
            .query_row("SELECT save_json FROM campaigns WHERE id = ?1", params![campaign_id], |row| row.get(0))
            .optional()?;
        json.map(|j| SaveData::from_json(&j).map_err(CampaignError::from)).transpose()
    }

    /// Get total number of campaigns stored.
    pub fn campaign_count(&self) -> Result<u32, CampaignError> {
        Ok(self.conn.query_row("SELECT COUNT(*) FROM campaigns", [], |row| row.get(0))?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runner::{run_campaign, CampaignOptions, Lineup};
    use kingdom_agents::{Agent, RandomAgent, UtilityAgent};
    use kingdom_engine::setup::Scenario;
    use kingdom_engine::EngineConfig;

    fn mixed_lineup(scenario: &Scenario, seed: u64) -> Lineup {
        scenario
            .factions
            .iter()
            .map(|f| {
                let agent: Box<dyn Agent> = if f.id.0 % 2 == 0 {
                    Box::new(UtilityAgent::new(f.id, seed))
                } else {
                    Box::new(RandomAgent::new(f.id, seed))
                };
                (f.id, agent)
            })
            .collect()
    }

    fn short_campaign(seed: u64) -> CampaignResult {
        let scenario = Scenario::default();
        let options = CampaignOptions { seed, max_turns: 4 };
        run_campaign(&scenario, &EngineConfig::default(), &mut mixed_lineup(&scenario, seed), options).unwrap()
    }

    #[test]
    fn stores_campaigns_and_counts_standings() {
        let mut db = Database::in_memory().unwrap();
        for seed in [1, 2] {
            db.store_campaign(&short_campaign(seed)).unwrap();
        }
        assert_eq!(db.campaign_count().unwrap(), 2);

        let standings = db.standings().unwrap();
        assert_eq!(standings.len(), 2);
        for s in &standings {
            assert_eq!(s.campaigns, 2);
        }
        assert_eq!(standings.iter().map(|s| s.wins).sum::<u32>(), 2);
    }

    #[test]
    fn final_save_round_trips() {
        let mut db = Database::in_memory().unwrap();
        let result = short_campaign(5);
        let id = db.store_campaign(&result).unwrap();
        let save = db.load_save(id).unwrap().unwrap();
        assert_eq!(save.metadata.turn_count, result.final_save.metadata.turn_count);
        assert!(db.load_save(id + 100).unwrap().is_none());
    }

    #[test]
    fn register_agent_is_idempotent() {
        let db = Database::in_memory().unwrap();
        let a = db.register_agent("Utility").unwrap();
        let b = db.register_agent("Utility").unwrap();
        assert_eq!(a, b);
    }
}
