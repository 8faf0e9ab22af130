use std::io::Read;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use chrono::Utc;
use clap::{Parser, Subcommand, ValueEnum};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use civ_stats::config::AppConfig;
use civ_stats::models::PatchTimeline;
use civ_stats::rollup::{RollupEvent, RollupKind, RollupRunner, RollupSettings, RollupSummary};
use civ_stats::storage::{JsonlStore, StatsStore, StorageConfig};

#[derive(Parser)]
#[command(name = "civ-stats")]
#[command(about = "Roll up 1v1 match results into per-civilization stats")]
#[command(version)]
struct Cli {
    /// Path to configuration file (default: ./civ-stats.toml if present)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Data directory path (overrides config)
    #[arg(long)]
    data_dir: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error); overrides config
    #[arg(long)]
    log_level: Option<String>,

    /// Output logs as JSON
    #[arg(long)]
    json_logs: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Roll up yesterday (UTC) or a custom date range into the daily target
    Daily {
        /// Stats collection to append to
        #[arg(long)]
        target: Option<String>,

        /// First day of a custom range (MM/DD/YYYY or YYYY-MM-DD)
        #[arg(long, requires = "to")]
        from: Option<String>,

        /// Day after the last day of a custom range (exclusive)
        #[arg(long, requires = "from")]
        to: Option<String>,

        /// Compute but don't write
        #[arg(long)]
        dry_run: bool,
    },

    /// Roll up the latest build (or all builds) into the patch target
    Patches {
        /// Stats collection to upsert into
        #[arg(long)]
        target: Option<String>,

        /// Roll up every known build
        #[arg(long)]
        all: bool,

        /// Compute but don't write
        #[arg(long)]
        dry_run: bool,
    },

    /// Run a rollup from a JSON event payload
    Invoke {
        /// Which rollup handles the event
        #[arg(long, value_enum)]
        handler: Handler,

        /// Event file, or "-" for stdin
        #[arg(long, default_value = "-")]
        event: String,

        /// Compute but don't write
        #[arg(long)]
        dry_run: bool,
    },

    /// Print the build timeline and each build's window
    Builds,

    /// Print the Elo bracket table
    Brackets,

    /// Print the effective configuration
    ShowConfig,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum Handler {
    Daily,
    Patches,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = AppConfig::load(cli.config.as_deref()).context("Failed to load config")?;
    if let Some(dir) = &cli.data_dir {
        config.data_dir = dir.clone();
    }
    let log_level = cli.log_level.as_deref().unwrap_or(&config.log_level);

    // Initialize tracing
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(log_level));

    let registry = tracing_subscriber::registry().with(filter);
    if cli.json_logs {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }

    tracing::info!("Starting civ-stats v{}", env!("CARGO_PKG_VERSION"));

    let store = Arc::new(JsonlStore::new(StorageConfig::new(config.data_dir.clone())));

    let result = match cli.command {
        Commands::Daily {
            target,
            from,
            to,
            dry_run,
        } => {
            let event = RollupEvent {
                target,
                ingest_custom_range: from.is_some(),
                start_date: from,
                end_date: to,
                ingest_all: false,
            };
            run_handler(&config, store, Handler::Daily, &event, dry_run).await
        }

        Commands::Patches {
            target,
            all,
            dry_run,
        } => {
            let event = RollupEvent {
                target,
                ingest_all: all,
                ..Default::default()
            };
            run_handler(&config, store, Handler::Patches, &event, dry_run).await
        }

        Commands::Invoke {
            handler,
            event,
            dry_run,
        } => {
            let payload = read_event(&event)?;
            let event = RollupEvent::from_json(&payload)?;
            run_handler(&config, store, handler, &event, dry_run).await
        }

        Commands::Builds => {
            let builds = store.builds().await?;
            if builds.is_empty() {
                println!("No builds found in {:?}", store.config().builds_path());
                return Ok(());
            }

            let timeline = PatchTimeline::from_builds(&builds, Utc::now());
            println!("=== Build Timeline ({} builds) ===\n", timeline.all().len());
            for patch in timeline.all() {
                let marker = if patch.is_current { " (current)" } else { "" };
                println!("  {}{}: {}", patch.build_number, marker, patch.description);
                println!("    Window: {}", patch.window);
            }
            Ok(())
        }

        Commands::Brackets => {
            let brackets = config.brackets()?;
            println!("=== Elo Brackets ({}) ===\n", brackets.brackets().len());
            for bracket in brackets.brackets() {
                println!("  {:<12} {:>6} .. {:<6}", bracket.label, bracket.lower, bracket.upper);
            }
            let all = brackets.all_elo();
            println!("  {:<12} {:>6} .. {:<6} (synthetic)", all.label, all.lower, all.upper);
            Ok(())
        }

        Commands::ShowConfig => {
            print!("{}", config.to_toml()?);
            Ok(())
        }
    };

    if let Err(e) = &result {
        tracing::error!("civ-stats failed: {:#}", e);
    }
    result
}

async fn run_handler(
    config: &AppConfig,
    store: Arc<dyn StatsStore>,
    handler: Handler,
    event: &RollupEvent,
    dry_run: bool,
) -> Result<()> {
    let settings = RollupSettings::from_config(config, dry_run)?;
    let runner = RollupRunner::new(store, settings);
    let now = Utc::now();

    let summary = match handler {
        Handler::Daily => {
            let request = event.daily_request(&config.daily)?;
            runner.run_daily(&request, now).await?
        }
        Handler::Patches => {
            let request = event.patch_request(&config.patch)?;
            runner.run_patches(&request, now).await?
        }
    };

    print_summary(&summary);
    Ok(())
}

fn read_event(source: &str) -> Result<String> {
    if source == "-" {
        let mut payload = String::new();
        std::io::stdin()
            .read_to_string(&mut payload)
            .context("Failed to read event from stdin")?;
        return Ok(payload);
    }

    let path = PathBuf::from(source);
    if !path.exists() {
        bail!("Event file not found: {}", source);
    }
    std::fs::read_to_string(&path).with_context(|| format!("Failed to read {}", source))
}

fn print_summary(summary: &RollupSummary) {
    let title = match summary.kind {
        RollupKind::Daily => "Daily Rollup",
        RollupKind::Patch => "Patch Rollup",
    };
    println!("\n=== {} Results ===", title);
    println!("  Target:   {}", summary.target);
    for window in &summary.windows {
        println!(
            "  {:<12} {} matches ({} skipped) -> {} records, {} written",
            window.label, window.matches, window.matches_skipped, window.records, window.written
        );
        println!("    Window: {}", window.window);
    }
    println!("  Records:  {}", summary.total_records());
    println!("  Written:  {}", summary.total_written());
    if summary.duplicates > 0 {
        println!("  Already present (appended again): {}", summary.duplicates);
    }
    if summary.dry_run {
        println!("  Dry run: nothing was written");
    }
    println!("  Duration: {:?}", summary.duration);
}
