// ═══════════════════════════════════════════════════════════════════════
// Runner — CLI entry point for running campaigns and batches
// ═══════════════════════════════════════════════════════════════════════

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::{Parser, Subcommand, ValueEnum};
use tracing_subscriber::EnvFilter;

use kingdom_agents::{Agent, RandomAgent, UtilityAgent};
use kingdom_campaign::database::Database;
use kingdom_campaign::runner::Lineup;
use kingdom_campaign::{run_batch, run_campaign_with, CampaignError, CampaignOptions, CampaignResult};
use kingdom_engine::engine::TurnSummary;
use kingdom_engine::setup::Scenario;
use kingdom_engine::{EngineConfig, WorldState};

#[derive(Parser)]
#[command(name = "kingdom", about = "Warring-states kingdom simulation")]
struct Cli {
    /// Scenario JSON; the built-in realm when omitted
    #[arg(long, global = true)]
    scenario: Option<PathBuf>,
    /// Engine config JSON; missing fields keep their defaults
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    /// Log filter, e.g. "kingdom=debug"; RUST_LOG wins when set
    #[arg(long, global = true, default_value = "kingdom=info")]
    log: String,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, PartialEq, Eq, ValueEnum)]
enum AgentKind {
    Utility,
    Random,
    /// Utility on even faction ids, random on odd
    Mixed,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a single campaign and print the result
    Play {
        #[arg(short, long, default_value_t = 42)]
        seed: u64,
        #[arg(short, long, default_value_t = 120)]
        turns: u32,
        #[arg(short, long, value_enum, default_value_t = AgentKind::Utility)]
        agent: AgentKind,
        /// Write the final save to this path
        #[arg(long)]
        save: Option<PathBuf>,
        /// Print the final standings as JSON
        #[arg(long)]
        json: bool,
    },
    /// Run N campaigns in parallel and store them
    Batch {
        #[arg(short, long, default_value_t = 100)]
        campaigns: u32,
        #[arg(short, long, default_value_t = 120)]
        turns: u32,
        #[arg(short, long, default_value = "campaigns.db")]
        db: String,
        #[arg(short, long, value_enum, default_value_t = AgentKind::Mixed)]
        agent: AgentKind,
    },
    /// Show per-agent standings from the database
    Standings {
        #[arg(short, long, default_value = "campaigns.db")]
        db: String,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&cli.log));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let result = match &cli.command {
        Commands::Play { seed, turns, agent, save, json } => {
            cmd_play(&cli, *seed, *turns, *agent, save.as_deref(), *json)
        }
        Commands::Batch { campaigns, turns, db, agent } => cmd_batch(&cli, *campaigns, *turns, db, *agent),
        Commands::Standings { db } => cmd_standings(db),
    };
    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e}");
            ExitCode::FAILURE
        }
    }
}

fn read(path: &Path) -> Result<String, CampaignError> {
    Ok(std::fs::read_to_string(path)?)
}

fn load_inputs(cli: &Cli) -> Result<(Scenario, EngineConfig), CampaignError> {
    let scenario = match &cli.scenario {
        Some(path) => Scenario::from_json(&read(path)?)?,
        None => Scenario::default(),
    };
    let config = match &cli.config {
        Some(path) => EngineConfig::from_json(&read(path)?)?,
        None => EngineConfig::default(),
    };
    Ok((scenario, config))
}

fn cmd_play(
    cli: &Cli,
    seed: u64,
    turns: u32,
    kind: AgentKind,
    save: Option<&Path>,
    json: bool,
) -> Result<(), CampaignError> {
    let (scenario, config) = load_inputs(cli)?;
    let mut agents = make_agents(&scenario, seed, kind);
    tracing::info!(scenario = %scenario.name, seed, turns, "starting campaign");
    if !json {
        println!("=== {} ===\n", scenario.name);
    }
    let options = CampaignOptions { seed, max_turns: turns };
    let result = run_campaign_with(&scenario, &config, &mut agents, options, |summary, world| {
        if !json {
            print_turn(summary, world);
        }
    })?;

    if json {
        println!("{}", serde_json::to_string_pretty(&result.faction_results)?);
    } else {
        println!();
        print_result(&result);
    }
    if let Some(path) = save {
        std::fs::write(path, result.final_save.to_json()?)?;
        tracing::info!(path = %path.display(), "final save written");
    }
    Ok(())
}

fn print_turn(summary: &TurnSummary, world: &WorldState) {
    let holdings: Vec<String> = world
        .factions
        .iter()
        .map(|f| format!("{} {}", f.name, world.castle_count(f.id)))
        .collect();
    let mut line = format!(
        "Turn {:>3} (Y{} M{:>2}) | {}",
        summary.turn,
        summary.year,
        summary.month,
        holdings.join(", ")
    );
    if !summary.events.is_empty() {
        line.push_str(&format!(" | {} events", summary.events.len()));
    }
    if summary.invasion.is_some() {
        line.push_str(" | invasion settled");
    }
    for id in &summary.eliminated {
        if let Some(f) = world.faction(*id) {
            line.push_str(&format!(" | {} eliminated", f.name));
        }
    }
    println!("{line}");
}

fn print_result(result: &CampaignResult) {
    println!("Campaign finished after {} turns: {}", result.turns_played, result.outcome_label());
    if let Some(leader) = result.leader() {
        println!("  Leader: {} ({})", leader.name, leader.agent_name);
    }
    println!();
    println!("  Final standings:");
    for fr in &result.faction_results {
        println!(
            "    {:10} {:8} -- castles: {:>2}, troops: {:>6}, gold: {:>5}, food: {:>5}{}{}",
            fr.name,
            fr.agent_name,
            fr.castles,
            fr.troops,
            fr.gold,
            fr.food,
            if fr.is_player { "  [player]" } else { "" },
            if fr.eliminated { "  [eliminated]" } else { "" },
        );
    }
}

fn cmd_batch(cli: &Cli, campaigns: u32, turns: u32, db_path: &str, kind: AgentKind) -> Result<(), CampaignError> {
    let (scenario, config) = load_inputs(cli)?;
    println!("=== Batch: {campaigns} campaigns, turn limit {turns} ===\n");

    let seeds: Vec<u64> = (0..u64::from(campaigns)).map(|g| 42 + g * 1000).collect();
    let results = run_batch(&scenario, &config, &seeds, turns, |seed| make_agents(&scenario, seed, kind));

    let mut db = Database::new(db_path)?;
    let mut errors = 0u32;
    for (seed, result) in results {
        match result {
            Ok(r) => {
                let id = db.store_campaign(&r)?;
                tracing::debug!(seed, id, turns = r.turns_played, "campaign stored");
            }
            Err(e) => {
                errors += 1;
                eprintln!("Seed {seed}: ERROR -- {e}");
            }
        }
    }

    println!("--- Summary ({campaigns} campaigns, {errors} errors) ---");
    print_standings(&db)?;
    println!("\nResults saved to: {db_path}");
    println!("Total campaigns in DB: {}", db.campaign_count()?);
    Ok(())
}

fn cmd_standings(db_path: &str) -> Result<(), CampaignError> {
    let db = Database::new(db_path)?;
    print_standings(&db)
}

fn print_standings(db: &Database) -> Result<(), CampaignError> {
    let board = db.standings()?;
    if board.is_empty() {
        println!("No agents found. Run some batches first.");
        return Ok(());
    }
    println!("{:<20} {:>10} {:>8} {:>8}", "Agent", "Campaigns", "Wins", "Win %");
    println!("{}", "-".repeat(50));
    for s in &board {
        let pct = if s.campaigns > 0 { f64::from(s.wins) / f64::from(s.campaigns) * 100.0 } else { 0.0 };
        println!("{:<20} {:>10} {:>8} {:>7.1}%", s.agent, s.campaigns, s.wins, pct);
    }
    Ok(())
}

fn make_agents(scenario: &Scenario, seed: u64, kind: AgentKind) -> Lineup {
    scenario
        .factions
        .iter()
        .map(|f| {
            let agent_seed = seed + u64::from(f.id.0);
            let agent: Box<dyn Agent> = match kind {
                AgentKind::Utility => Box::new(UtilityAgent::new(f.id, agent_seed)),
                AgentKind::Random => Box::new(RandomAgent::new(f.id, agent_seed)),
                AgentKind::Mixed if f.id.0 % 2 == 0 => Box::new(UtilityAgent::new(f.id, agent_seed)),
                AgentKind::Mixed => Box::new(RandomAgent::new(f.id, agent_seed)),
            };
            (f.id, agent)
        })
        .collect()
}
