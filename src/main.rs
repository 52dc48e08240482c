//! patmem - Pattern memory and multi-signal scoring
//!
//! Thin command line over [`patmem::Engine`]. Reports are printed as JSON on
//! stdout; logs go to stderr.

use anyhow::{Context, Result};
use chrono::NaiveDate;
use clap::{Parser, Subcommand, ValueEnum};
use patmem::engine::LifecycleEvent;
use patmem::habits::HabitFilters;
use patmem::memory::Outcome;
use patmem::store::PromotionKind;
use patmem::{Engine, EngineBuilder, PatmemConfig};
use serde::Serialize;
use std::io::Read;
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "patmem")]
#[command(author = "A3S Lab Team")]
#[command(version)]
#[command(about = "Pattern memory and multi-signal scoring for session notes")]
struct Cli {
    /// Configuration file path (.toml, .yaml or .json)
    #[arg(short, long, env = "PATMEM_CONFIG")]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// Log output format
    #[arg(long, value_enum, default_value_t = LogFormat::Text)]
    log_format: LogFormat,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, ValueEnum)]
enum LogFormat {
    Text,
    Json,
}

#[derive(Subcommand)]
enum Commands {
    /// Archive session notes read from a file or stdin
    IngestNotes {
        /// Session date (defaults to today)
        #[arg(long)]
        date: Option<NaiveDate>,

        /// Notes file; stdin when omitted
        #[arg(long)]
        file: Option<PathBuf>,
    },

    /// Index, update, score and reinforce after a session
    SessionEnd {
        /// Session date (defaults to today)
        #[arg(long)]
        date: Option<NaiveDate>,
    },

    /// Recompute every signal and the composite score
    Score,

    /// Merge near-duplicate patterns
    Consolidate {
        /// Maximum edit distance
        #[arg(long)]
        threshold: Option<usize>,

        /// Only list the pairs that would be merged
        #[arg(long)]
        dry_run: bool,
    },

    /// Find stored patterns close to a word
    Similar {
        word: String,

        /// Maximum edit distance
        #[arg(long, default_value = "2")]
        distance: usize,
    },

    /// Search habit notes
    Search {
        query: String,

        #[arg(long)]
        min_confidence: Option<f64>,

        #[arg(long)]
        min_freshness: Option<f64>,

        #[arg(long)]
        top_k: Option<usize>,
    },

    /// Record the outcome of using a note
    Feedback {
        note_id: String,

        /// success, partial or failure
        outcome: Outcome,
    },

    /// Spaced-repetition reviews
    Review {
        #[command(subcommand)]
        action: ReviewAction,
    },

    /// Mark a pattern promoted, or list candidates when no pattern is given
    Promote {
        pattern: Option<String>,

        /// skill or agent
        #[arg(long, default_value = "skill")]
        kind: PromotionKind,

        /// Location of the promoted artifact
        #[arg(long)]
        path: Option<String>,
    },

    /// Show store statistics
    Stats,

    /// Replace the store with an empty one, copying the old document aside
    ResetStore,

    /// Show configuration
    Config {
        /// Show default configuration
        #[arg(long)]
        default: bool,
    },
}

#[derive(Subcommand)]
enum ReviewAction {
    /// Patterns due for review
    Due {
        /// Reference date (defaults to today)
        #[arg(long)]
        date: Option<NaiveDate>,
    },

    /// Grade one review 0-5
    Apply { pattern: String, quality: u8 },

    /// Review schedule counts
    Summary {
        #[arg(long)]
        date: Option<NaiveDate>,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let log_level = if cli.verbose { "debug" } else { "info" };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| format!("patmem={}", log_level).into());
    match cli.log_format {
        LogFormat::Text => tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init(),
        LogFormat::Json => tracing_subscriber::registry()
            .with(filter)
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_writer(std::io::stderr),
            )
            .init(),
    }

    // Load configuration
    let config = match &cli.config {
        Some(path) => PatmemConfig::from_file(path)
            .with_context(|| format!("Failed to load config {}", path.display()))?,
        None => PatmemConfig::default(),
    };

    if let Commands::Config { default } = cli.command {
        return show_config(if default { None } else { Some(&config) });
    }

    let mut engine = EngineBuilder::new(config).build()?;
    run(&mut engine, cli.command)
}

fn run(engine: &mut Engine, command: Commands) -> Result<()> {
    let today = engine.today();
    match command {
        Commands::IngestNotes { date, file } => {
            let content = match file {
                Some(path) => std::fs::read_to_string(&path)
                    .with_context(|| format!("Failed to read notes {}", path.display()))?,
                None => {
                    let mut buf = String::new();
                    std::io::stdin().read_to_string(&mut buf)?;
                    buf
                }
            };
            let report = engine.ingest(LifecycleEvent::SessionNotes {
                date: date.unwrap_or(today),
                content,
            })?;
            print_json(&report)
        }
        Commands::SessionEnd { date } => {
            let report = engine.ingest(LifecycleEvent::SessionEnd {
                date: date.unwrap_or(today),
            })?;
            print_json(&report)
        }
        Commands::Score => print_json(&engine.score_all()?),
        Commands::Consolidate { threshold, dry_run } => {
            if dry_run {
                print_json(&engine.similar_pairs(threshold)?)
            } else {
                print_json(&engine.ingest(LifecycleEvent::Consolidate { threshold })?)
            }
        }
        Commands::Similar { word, distance } => print_json(&engine.find_similar(&word, distance)?),
        Commands::Search {
            query,
            min_confidence,
            min_freshness,
            top_k,
        } => {
            let defaults = HabitFilters::from(&engine.config().habits);
            let filters = HabitFilters {
                min_confidence: min_confidence.unwrap_or(defaults.min_confidence),
                min_freshness: min_freshness.unwrap_or(defaults.min_freshness),
                top_k: top_k.unwrap_or(defaults.top_k),
                ..defaults
            };
            print_json(&engine.search_habits(&query, Some(filters))?)
        }
        Commands::Feedback { note_id, outcome } => {
            print_json(&engine.ingest(LifecycleEvent::Feedback { note_id, outcome })?)
        }
        Commands::Review { action } => match action {
            ReviewAction::Due { date } => print_json(&engine.due_reviews(date.unwrap_or(today))?),
            ReviewAction::Apply { pattern, quality } => {
                print_json(&engine.ingest(LifecycleEvent::Review { pattern, quality })?)
            }
            ReviewAction::Summary { date } => {
                print_json(&engine.review_summary(date.unwrap_or(today))?)
            }
        },
        Commands::Promote {
            pattern,
            kind,
            path,
        } => match pattern {
            Some(pattern) => print_json(&engine.mark_promoted(&pattern, kind, path)?),
            None => print_json(&engine.promotion_candidates()?),
        },
        Commands::Stats => print_json(&engine.stats()?),
        Commands::ResetStore => {
            let preserved = engine.reset_store()?;
            print_json(&serde_json::json!({
                "preserved": preserved.map(|p| p.display().to_string())
            }))
        }
        Commands::Config { .. } => Ok(()),
    }
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn show_config(config: Option<&PatmemConfig>) -> Result<()> {
    let config = config.cloned().unwrap_or_default();
    let toml = toml::to_string_pretty(&config)?;
    println!("{}", toml);
    Ok(())
}
