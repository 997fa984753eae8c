//! KernelCI regression tracker
//!
//! Replays stored test group reports through the regression engine and
//! prints the resulting regression documents.

#![forbid(unsafe_code)]

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use kci_common::{LogConfig, RegressionConfig, init_logging};
use kci_regress::{
    EventBus, LocalLockService, RegressionFinder, RegressionQuery, ReplayFixture, TrackerSettings,
    overall_status, replay,
};
use serde_json::json;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};

#[derive(Parser)]
#[command(name = "kci-regress")]
#[command(author, version, about = "KernelCI test group regression tracker")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// TOML configuration file
    #[arg(short, long, global = true, env = "KCI_CONFIG")]
    config: Option<PathBuf>,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Track regressions for every top-level report in a fixture
    Replay {
        /// JSON file with `reports` and `test_cases`
        fixture: PathBuf,

        /// Concurrent configurations; reports of one configuration always
        /// run oldest first
        #[arg(short, long, default_value_t = 1, conflicts_with = "parallel")]
        jobs: usize,

        /// Use the configured worker count (`KCI_WORKERS`) as `--jobs`
        #[arg(long)]
        parallel: bool,

        /// Include tracking events in the output
        #[arg(long)]
        events: bool,
    },

    /// Replay a fixture, then print the regression history of one report
    Show {
        /// JSON file with `reports` and `test_cases`
        fixture: PathBuf,

        /// Report id (24 hex characters)
        report_id: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config =
        RegressionConfig::load(cli.config.as_deref()).context("Failed to load configuration")?;

    let mut log_config = LogConfig::from_env(&config.log_level).with_json(config.log_json);
    if cli.verbose {
        log_config = log_config.with_level("debug");
    }
    init_logging(&log_config)?;

    match cli.command {
        Commands::Replay {
            fixture,
            jobs,
            parallel,
            events,
        } => {
            let fixture = ReplayFixture::from_path(&fixture)?;
            let report_count = fixture.reports.len();
            let store = Arc::new(fixture.into_store());

            let bus = EventBus::new(report_count.saturating_mul(4));
            let mut rx = bus.subscribe();
            let mut finder = RegressionFinder::new(
                store.clone(),
                Arc::new(LocalLockService::new()),
                TrackerSettings::from(&config),
            );
            if events {
                finder = finder.with_events(bus);
            }

            let jobs = if parallel { config.workers } else { jobs };
            let results = replay(&store, Arc::new(finder), jobs).await;

            let mut emitted = Vec::new();
            while let Ok(line) = rx.try_recv() {
                match serde_json::from_str::<serde_json::Value>(&line) {
                    Ok(value) => emitted.push(value),
                    Err(err) => warn!("Dropping malformed event: {}", err),
                }
            }

            let status = overall_status(results.iter().map(|r| &r.outcome));
            let mut output = json!({
                "status": status,
                "outcomes": results,
                "regressions": store.regressions(),
                "index": store.index_entries(),
            });
            if events {
                output["events"] = json!(emitted);
            }
            println!("{}", serde_json::to_string_pretty(&output)?);

            info!("Replay finished with status {}", status);
            if !status.is_success() {
                std::process::exit(1);
            }
            Ok(())
        }

        Commands::Show { fixture, report_id } => {
            let store = Arc::new(ReplayFixture::from_path(&fixture)?.into_store());
            let finder = RegressionFinder::new(
                store.clone(),
                Arc::new(LocalLockService::new()),
                TrackerSettings::from(&config),
            );
            replay(&store, Arc::new(finder), 1).await;

            let response = RegressionQuery::new(store).regressions_for(&report_id).await;
            println!("{}", serde_json::to_string_pretty(&response)?);
            if !response.status.is_success() {
                std::process::exit(1);
            }
            Ok(())
        }
    }
}
