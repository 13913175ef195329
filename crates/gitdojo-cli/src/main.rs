//! gitdojo - staged, scored git exercises
//!
//! ## Commands
//!
//! - `play`: interactive session through every stage
//! - `list`: show the stage catalog
//! - `leaderboard`: best score per player
//! - `doctor`: check that git and the workspace are usable

mod repl;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use gitdojo_core::{
    run_doctor, EngineConfig, GitCliEngine, LeaderboardEntry, ScenarioCatalog, SessionLedger,
    SessionManager, StageRuntime,
};
use gitdojo_state::{LedgerConfig, SurrealSessionLedger};
use serde::Serialize;
use tracing::{info, Level};

#[derive(Parser)]
#[command(name = "gitdojo")]
#[command(version = gitdojo_core::VERSION)]
#[command(about = "Practise git in throwaway repositories, one stage at a time", long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit JSON-formatted log lines
    #[arg(long, global = true)]
    json: bool,

    /// Load stages from a TOML file instead of the built-in set
    #[arg(long, global = true, env = "GITDOJO_CATALOG")]
    catalog: Option<PathBuf>,

    /// Session ledger endpoint (`mem://`, `surrealkv://<path>`)
    #[arg(long, global = true, env = "GITDOJO_DB_URL")]
    db_url: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Play through the stages
    Play {
        /// Name shown on the leaderboard
        #[arg(short, long, env = "GITDOJO_PLAYER")]
        player: String,
    },

    /// List the stages
    List {
        /// Print as JSON
        #[arg(long)]
        as_json: bool,
    },

    /// Show the best score per player
    Leaderboard {
        /// Maximum number of rows
        #[arg(short, long, default_value = "10")]
        limit: usize,

        /// Print as JSON
        #[arg(long)]
        as_json: bool,
    },

    /// Check the local environment
    Doctor,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Logs share the terminal with the play loop, so stay quiet by default.
    let level = if cli.verbose { Level::DEBUG } else { Level::WARN };
    gitdojo_core::telemetry::init_tracing(cli.json, level);

    let config = EngineConfig::from_env();
    match cli.command {
        Commands::Play { player } => {
            let catalog = load_catalog(cli.catalog.as_deref())?;
            let ledger = connect_ledger(cli.db_url.as_deref()).await?;
            cmd_play(catalog, ledger, &config, &player).await
        }
        Commands::List { as_json } => {
            let catalog = load_catalog(cli.catalog.as_deref())?;
            cmd_list(&catalog, as_json)
        }
        Commands::Leaderboard { limit, as_json } => {
            let ledger = connect_ledger(cli.db_url.as_deref()).await?;
            cmd_leaderboard(ledger.as_ref(), limit, as_json).await
        }
        Commands::Doctor => cmd_doctor(&config).await,
    }
}

fn load_catalog(path: Option<&std::path::Path>) -> Result<ScenarioCatalog> {
    let catalog = match path {
        Some(path) => ScenarioCatalog::from_path(path)
            .with_context(|| format!("Failed to load catalog {}", path.display()))?,
        None => ScenarioCatalog::builtin().context("Built-in catalog is invalid")?,
    };
    info!(stages = catalog.len(), "catalog loaded");
    Ok(catalog)
}

async fn connect_ledger(url: Option<&str>) -> Result<Arc<dyn SessionLedger>> {
    let config = match url {
        Some(url) => LedgerConfig::new(url),
        None => LedgerConfig::from_env(),
    };
    let ledger = SurrealSessionLedger::connect(&config)
        .await
        .with_context(|| format!("Failed to open session ledger at {}", config.url))?;
    Ok(Arc::new(ledger))
}

async fn cmd_play(
    catalog: ScenarioCatalog,
    ledger: Arc<dyn SessionLedger>,
    config: &EngineConfig,
    player: &str,
) -> Result<()> {
    let engine = Arc::new(GitCliEngine::with_binary(config.git_bin.clone()));
    let runtime = Arc::new(StageRuntime::new(Arc::new(catalog), engine, config));
    let manager = SessionManager::new(runtime, ledger);

    let stdin = tokio::io::BufReader::new(tokio::io::stdin());
    let mut stdout = std::io::stdout();
    repl::run(&manager, player, stdin, &mut stdout).await
}

#[derive(Serialize)]
struct StageRow<'a> {
    stage_id: u32,
    title: &'a str,
    objective: &'a str,
}

fn cmd_list(catalog: &ScenarioCatalog, as_json: bool) -> Result<()> {
    let rows: Vec<StageRow<'_>> = catalog
        .list()
        .iter()
        .map(|s| StageRow {
            stage_id: s.stage_id,
            title: &s.title,
            objective: &s.objective,
        })
        .collect();
    if as_json {
        println!("{}", serde_json::to_string_pretty(&rows)?);
        return Ok(());
    }
    for row in rows {
        println!("{:>3}  {}", row.stage_id, row.title);
        println!("     {}", row.objective);
    }
    Ok(())
}

async fn cmd_leaderboard(ledger: &dyn SessionLedger, limit: usize, as_json: bool) -> Result<()> {
    let records = ledger.list().await.context("Failed to read session ledger")?;
    let board = gitdojo_core::rank_leaderboard(&records, limit);
    if as_json {
        println!("{}", serde_json::to_string_pretty(&board)?);
        return Ok(());
    }
    if board.is_empty() {
        println!("No completed sessions yet. Run 'gitdojo play --player <name>' first.");
        return Ok(());
    }
    for line in render_leaderboard(&board) {
        println!("{line}");
    }
    Ok(())
}

fn render_leaderboard(board: &[LeaderboardEntry]) -> Vec<String> {
    board
        .iter()
        .enumerate()
        .map(|(rank, entry)| {
            format!(
                "{:>2}. {:<20} {:>6.0}  ({} commands, {}s, {} hints, {} solutions)",
                rank + 1,
                entry.player,
                entry.score,
                entry.metrics.total_commands,
                entry.metrics.elapsed_secs(),
                entry.metrics.hints_used,
                entry.metrics.solutions_used,
            )
        })
        .collect()
}

async fn cmd_doctor(config: &EngineConfig) -> Result<()> {
    let checks = run_doctor(config).await;
    for check in &checks {
        let mark = if check.ok { "ok" } else { "FAIL" };
        println!("[{mark:>4}] {}: {}", check.name, check.detail);
    }
    if checks.iter().any(|c| !c.ok) {
        bail!("environment check failed");
    }
    Ok(())
}
