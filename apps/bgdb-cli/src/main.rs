//! bgdb - backgammon position search
//!
//! Runs command-grammar searches over a position database, manages the
//! filter library and the search history.

use std::error::Error;
use std::path::{Path, PathBuf};

use bgdb_domain::{Position, PositionRecord, Side};
use bgdb_engine::{EngineConfig, EngineError, SearchEngine, SearchRequest, SearchResults};
use bgdb_query::{Perspective, ResultOrder};
use bgdb_store::SqliteStore;
use clap::{Parser, Subcommand, ValueEnum};
use tracing::debug;
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

#[derive(Parser)]
#[command(name = "bgdb")]
#[command(about = "Search a backgammon position database")]
struct Cli {
    /// Configuration file (defaults to bgdb/bgdb.toml in the config dir)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Database file, overriding the configuration
    #[arg(long, global = true)]
    db: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a search command, e.g. `bgdb search "dt=cube sc>60 tp2>50"`
    Search {
        /// Command text
        query: String,
        /// JSON file holding the current position (anchor for `cp`)
        #[arg(long)]
        current: Option<PathBuf>,
        /// Match board patterns for either side
        #[arg(long, value_enum)]
        perspective: Option<PerspectiveArg>,
        /// Result order
        #[arg(long, value_enum)]
        order: Option<OrderArg>,
        /// Print matching records as JSON
        #[arg(long)]
        json: bool,
    },
    /// Saved filter management
    Filter {
        #[command(subcommand)]
        action: FilterAction,
    },
    /// Search history
    History {
        #[command(subcommand)]
        action: HistoryAction,
    },
    /// Import positions from a JSON array of records
    Import { file: PathBuf },
}

#[derive(Subcommand)]
enum FilterAction {
    /// List saved filters, oldest first
    List,
    /// Save a command under a name
    Save {
        name: String,
        query: String,
        /// JSON file holding the anchor position for `cp`
        #[arg(long)]
        anchor: Option<PathBuf>,
    },
    /// Replace a saved filter's name and command
    Update {
        id: Uuid,
        name: String,
        query: String,
        #[arg(long)]
        anchor: Option<PathBuf>,
    },
    /// Delete a saved filter
    Delete { id: Uuid },
    /// Run a saved filter
    Run {
        id: Uuid,
        #[arg(long)]
        current: Option<PathBuf>,
        #[arg(long)]
        json: bool,
    },
}

#[derive(Subcommand)]
enum HistoryAction {
    /// List searches, most recent first
    List,
    /// Remove all entries
    Clear,
    /// Re-run an entry with its recorded position
    Replay {
        id: i64,
        #[arg(long)]
        json: bool,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum PerspectiveArg {
    OnRoll,
    Either,
}

impl From<PerspectiveArg> for Perspective {
    fn from(arg: PerspectiveArg) -> Self {
        match arg {
            PerspectiveArg::OnRoll => Perspective::OnRoll,
            PerspectiveArg::Either => Perspective::Either,
        }
    }
}

#[derive(Clone, Copy, ValueEnum)]
enum OrderArg {
    Id,
    Match,
}

impl From<OrderArg> for ResultOrder {
    fn from(arg: OrderArg) -> Self {
        match arg {
            OrderArg::Id => ResultOrder::Id,
            OrderArg::Match => ResultOrder::MatchChronological,
        }
    }
}

fn main() -> Result<(), Box<dyn Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let mut config = match &cli.config {
        Some(path) => EngineConfig::load(path)?,
        None => EngineConfig::load_default()?,
    };
    if let Some(db) = cli.db {
        config.database.path = Some(db);
    }
    debug!(database = ?config.database.path, "Loaded configuration");
    let engine = SearchEngine::open(config)?;

    match cli.command {
        Commands::Search {
            query,
            current,
            perspective,
            order,
            json,
        } => {
            let mut request =
                SearchRequest::new(query).with_current(read_position(current.as_deref())?);
            if let Some(perspective) = perspective {
                request = request.with_perspective(perspective.into());
            }
            if let Some(order) = order {
                request = request.with_order(order.into());
            }
            let results = report(&request.command, engine.search(&request))?;
            print_results(&results, json)?;
        }
        Commands::Filter { action } => handle_filter(&engine, action)?,
        Commands::History { action } => handle_history(&engine, action)?,
        Commands::Import { file } => {
            let text = std::fs::read_to_string(&file)?;
            let records: Vec<PositionRecord> = serde_json::from_str(&text)?;
            let ids = engine.import_positions(&records)?;
            println!("Imported {} position(s)", ids.len());
        }
    }

    Ok(())
}

fn handle_filter(
    engine: &SearchEngine<SqliteStore>,
    action: FilterAction,
) -> Result<(), Box<dyn Error>> {
    match action {
        FilterAction::List => {
            let filters = engine.list_filters()?;
            if filters.is_empty() {
                println!("No saved filters.");
            }
            for filter in &filters {
                println!(
                    "{}  {:<24} {}{}",
                    filter.id,
                    filter.name,
                    filter.command,
                    if filter.anchor.is_some() { "  [anchored]" } else { "" }
                );
            }
        }
        FilterAction::Save {
            name,
            query,
            anchor,
        } => {
            let anchor = read_position(anchor.as_deref())?;
            let saved = report(&query, engine.save_filter(&name, &query, anchor))?;
            println!("Saved {} as {}", saved.name, saved.id);
        }
        FilterAction::Update {
            id,
            name,
            query,
            anchor,
        } => {
            let anchor = read_position(anchor.as_deref())?;
            let saved = report(&query, engine.update_filter(id, &name, &query, anchor))?;
            println!("Updated {}", saved.id);
        }
        FilterAction::Delete { id } => {
            engine.delete_filter(id)?;
            println!("Deleted {}", id);
        }
        FilterAction::Run { id, current, json } => {
            let current = read_position(current.as_deref())?;
            let results = engine.run_filter(id, current.as_ref())?;
            print_results(&results, json)?;
        }
    }
    Ok(())
}

fn handle_history(
    engine: &SearchEngine<SqliteStore>,
    action: HistoryAction,
) -> Result<(), Box<dyn Error>> {
    match action {
        HistoryAction::List => {
            for entry in engine.history()? {
                let when = entry
                    .timestamp()
                    .map(|t| t.format("%Y-%m-%d %H:%M:%S").to_string())
                    .unwrap_or_default();
                println!("{:>6}  {}  {}", entry.id, when, entry.command);
            }
        }
        HistoryAction::Clear => {
            engine.clear_history()?;
            println!("History cleared");
        }
        HistoryAction::Replay { id, json } => {
            let results = engine.replay(id)?;
            print_results(&results, json)?;
        }
    }
    Ok(())
}

/// Echo parse errors under the command with a caret at the failing clause.
fn report<T>(command: &str, result: Result<T, EngineError>) -> Result<T, EngineError> {
    if let Err(EngineError::Parse(err)) = &result {
        let column = command
            .get(..err.position)
            .map(|head| head.chars().count())
            .unwrap_or(0);
        eprintln!("  {}", command);
        eprintln!("  {}^ {}", " ".repeat(column), err.kind);
    }
    result
}

fn read_position(path: Option<&Path>) -> Result<Option<Position>, Box<dyn Error>> {
    match path {
        Some(path) => {
            let text = std::fs::read_to_string(path)?;
            Ok(Some(serde_json::from_str(&text)?))
        }
        None => Ok(None),
    }
}

fn print_results(results: &SearchResults, json: bool) -> Result<(), Box<dyn Error>> {
    if json {
        println!("{}", serde_json::to_string_pretty(&results.records)?);
        return Ok(());
    }
    for record in &results.records {
        let p = &record.position;
        let score = match (p.score.away_for(Side::Player1), p.score.away_for(Side::Player2)) {
            (Some(a), Some(b)) => format!("{}-away/{}-away", a, b),
            _ => "money".to_string(),
        };
        println!(
            "{:>8}  {:<7} cube {:<3} {:<16} pips {}/{}",
            record.id,
            p.decision_type.as_str(),
            p.cube.value,
            score,
            p.pip_count(Side::Player1),
            p.pip_count(Side::Player2),
        );
    }
    println!("{} match(es)", results.len());
    Ok(())
}
