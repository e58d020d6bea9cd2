//! quicksearch: live fuzzy search over a record store snapshot.
//!
//! Usage:
//!   quicksearch search --store <snapshot.json> <pattern>   # One-shot search
//!   quicksearch live --store <snapshot.json>               # Each stdin line is the new
//!                                                          # search text, "!" commits

use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use quicksearch::controller::{ControllerConfig, SearchController, SearchSink, SearchStatus};
use quicksearch::services::{SearchExecutor, SearchQuery, TransliterationIndex};
use quicksearch::settings::{CaseSensitivity, SearchSettings};
use quicksearch::store::RecordStore;
use quicksearch::types::RecordId;
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::AsyncBufReadExt;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::EnvFilter;

const DEFAULT_LOG_FILTER: &str = "quicksearch=info";

#[derive(Parser)]
#[command(name = "quicksearch")]
#[command(about = "Live fuzzy search with pinyin matching over a record store")]
#[command(version)]
struct Cli {
    /// JSON file with search settings (missing keys keep their defaults)
    #[arg(long, global = true)]
    settings: Option<PathBuf>,

    #[command(flatten)]
    overrides: SettingsOverrides,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct SettingsOverrides {
    /// Match letter case exactly
    #[arg(long, global = true)]
    case_sensitive: bool,

    /// Skip records whose expiry time has passed
    #[arg(long, global = true)]
    exclude_expired: bool,

    /// Also search groups that have searching disabled
    #[arg(long, global = true)]
    ignore_group_settings: bool,

    /// Also search the password field
    #[arg(long, global = true)]
    passwords: bool,

    /// Also search the full group path of each record
    #[arg(long, global = true)]
    group_path: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Search a store once and print the matches
    Search {
        /// Store snapshot (JSON)
        #[arg(long)]
        store: PathBuf,

        /// Search text; whitespace separates tokens
        #[arg(required = true)]
        pattern: Vec<String>,
    },

    /// Drive a live search from stdin, printing status and results as JSON lines
    Live {
        /// Store snapshot (JSON)
        #[arg(long)]
        store: PathBuf,

        /// Quiet period before a search starts, in milliseconds
        #[arg(long, default_value = "200")]
        debounce_ms: u64,
    },
}

/// A matching record as printed by the CLI.
#[derive(Serialize)]
struct Hit<'a> {
    id: RecordId,
    title: &'a str,
    group: String,
}

fn hits<'a>(store: &'a RecordStore, ids: &[RecordId]) -> Vec<Hit<'a>> {
    ids.iter()
        .filter_map(|&id| store.record(id))
        .map(|record| Hit {
            id: record.id(),
            title: record.title(),
            group: store.group_path(record.parent(), true),
        })
        .collect()
}

#[derive(Serialize)]
#[serde(tag = "event", rename_all = "lowercase")]
enum Event<'a> {
    Status { status: SearchStatus },
    Results { records: Vec<Hit<'a>> },
    Unfiltered { count: usize },
}

/// Prints controller output to stdout, one JSON object per line.
struct StdoutSink {
    store: Arc<RecordStore>,
}

impl StdoutSink {
    fn emit(&self, event: &Event<'_>) {
        match serde_json::to_string(event) {
            Ok(line) => println!("{line}"),
            Err(e) => tracing::warn!("Failed to encode event: {}", e),
        }
    }
}

impl SearchSink for StdoutSink {
    fn status(&self, status: SearchStatus) {
        self.emit(&Event::Status { status });
    }

    fn results(&self, records: &[RecordId]) {
        self.emit(&Event::Results {
            records: hits(&self.store, records),
        });
    }

    fn unfiltered(&self, records: &[RecordId]) {
        self.emit(&Event::Unfiltered {
            count: records.len(),
        });
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // stdout carries results; logs go to stderr
    tracing_subscriber::fmt()
        .with_env_filter(log_filter(std::env::var("RUST_LOG").ok().as_deref()))
        .with_writer(std::io::stderr)
        .init();

    let settings = load_settings(cli.settings.as_deref(), &cli.overrides)?;
    let index = Arc::new(TransliterationIndex::pinyin());
    index.warm_up();

    match cli.command {
        Commands::Search { store, pattern } => {
            run_search(&store, &pattern.join(" "), settings, index).await
        }
        Commands::Live { store, debounce_ms } => {
            let config = ControllerConfig {
                debounce: Duration::from_millis(debounce_ms),
            };
            run_live(&store, settings, index, config).await
        }
    }
}

/// `RUST_LOG` wins when set and valid; otherwise only our own info logs.
fn log_filter(env: Option<&str>) -> EnvFilter {
    env.filter(|spec| !spec.trim().is_empty())
        .and_then(|spec| EnvFilter::try_new(spec).ok())
        .unwrap_or_else(|| EnvFilter::new(DEFAULT_LOG_FILTER))
}

fn load_settings(
    path: Option<&Path>,
    overrides: &SettingsOverrides,
) -> anyhow::Result<SearchSettings> {
    let mut settings = match path {
        Some(path) => SearchSettings::load_json(path)
            .with_context(|| format!("reading settings from {}", path.display()))?,
        None => SearchSettings::default(),
    };
    if overrides.case_sensitive {
        settings.case_sensitivity = CaseSensitivity::Sensitive;
    }
    settings.exclude_expired |= overrides.exclude_expired;
    settings.ignore_group_settings |= overrides.ignore_group_settings;
    settings.search_in_password |= overrides.passwords;
    settings.search_in_group_path |= overrides.group_path;
    Ok(settings)
}

async fn load_store(path: &Path) -> anyhow::Result<Arc<RecordStore>> {
    let owned = path.to_path_buf();
    let store = tokio::task::spawn_blocking(move || RecordStore::load_json(&owned))
        .await?
        .with_context(|| format!("loading store from {}", path.display()))?;
    tracing::info!(
        "Loaded {} records in {} groups from {}",
        store.record_count(),
        store.group_count(),
        path.display()
    );
    Ok(Arc::new(store))
}

async fn run_search(
    path: &Path,
    pattern: &str,
    settings: SearchSettings,
    index: Arc<TransliterationIndex>,
) -> anyhow::Result<()> {
    let store = load_store(path).await?;
    let executor = SearchExecutor::new(index);
    let mut query = SearchQuery::new(pattern, settings);

    let scan_store = Arc::clone(&store);
    let (query, stats) = tokio::task::spawn_blocking(move || {
        let stats = executor.execute(&scan_store, &mut query, &CancellationToken::new());
        (query, stats)
    })
    .await?;
    let stats = stats?;
    tracing::info!(
        "{} matches, {} records visited in {:?}",
        stats.matches,
        stats.records_visited,
        stats.elapsed
    );

    println!("{}", serde_json::to_string_pretty(&hits(&store, query.results()))?);
    Ok(())
}

async fn run_live(
    path: &Path,
    settings: SearchSettings,
    index: Arc<TransliterationIndex>,
    config: ControllerConfig,
) -> anyhow::Result<()> {
    let store = load_store(path).await?;
    let sink = Arc::new(StdoutSink {
        store: Arc::clone(&store),
    });
    let handle = SearchController::spawn(
        store,
        Arc::new(settings),
        SearchExecutor::new(index),
        sink,
        config,
    );

    let mut lines = tokio::io::BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        if line == "!" {
            handle.commit()?;
        } else {
            handle.input_changed(line)?;
        }
    }

    // Let the last input run to completion before exiting.
    handle.commit()?;
    handle.settled().await?;
    handle.shutdown()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_filter_defaults_to_info() {
        assert_eq!(log_filter(None).max_level_hint(), Some(LevelFilter::INFO));
        assert_eq!(log_filter(Some("  ")).max_level_hint(), Some(LevelFilter::INFO));
    }

    #[test]
    fn test_log_filter_honours_rust_log() {
        let filter = log_filter(Some("quicksearch=debug"));
        assert_eq!(filter.max_level_hint(), Some(LevelFilter::DEBUG));
        assert_eq!(filter.to_string(), "quicksearch=debug");
    }

    #[test]
    fn test_log_filter_ignores_invalid_rust_log() {
        let filter = log_filter(Some("quicksearch=loud"));
        assert_eq!(filter.max_level_hint(), Some(LevelFilter::INFO));
    }
}
