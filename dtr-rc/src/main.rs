//! dtr-rc - Drive table reconciliation job
//!
//! Runs one reconciliation pass against the configured drive table and
//! prints the run summary as JSON on stdout. Exits non-zero only when the
//! run could not be attempted or a required read failed.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use clap::Parser;
use dtr_common::config::{load_toml_config, resolve_config_path};
use dtr_common::db::init_database;
use dtr_common::time::FixedClock;
use dtr_common::ReconciliationConfig;
use dtr_rc::{DriveTableGateway, MemoryGateway, PipelineScope, Reconciler, RunSummary, SqliteGateway};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info, warn};

/// Command-line arguments for dtr-rc
#[derive(Parser, Debug)]
#[command(name = "dtr-rc")]
#[command(about = "Drive table reconciliation job")]
#[command(version)]
struct Args {
    /// Config file (TOML)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// SQLite database path, overrides `database_path` in the config
    #[arg(short, long, env = "DTR_DATABASE")]
    database: Option<PathBuf>,

    /// Run against an empty in-memory table instead of the database
    #[arg(long)]
    dry_run: bool,

    /// Treat this instant as "now" (RFC 3339)
    #[arg(long, value_parser = parse_now)]
    now: Option<DateTime<Utc>>,
}

fn parse_now(raw: &str) -> std::result::Result<DateTime<Utc>, String> {
    DateTime::parse_from_rfc3339(raw)
        .map(|ts| ts.with_timezone(&Utc))
        .map_err(|e| format!("expected an RFC 3339 timestamp: {}", e))
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let config_path = resolve_config_path(args.config.as_deref())?;
    let toml_config = load_toml_config(&config_path)?;

    // RUST_LOG wins over the configured level
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&toml_config.logging.level)),
        )
        .init();

    info!(
        "Starting Drive Table Reconciler (dtr-rc) v{} [{}] built {} ({})",
        env!("CARGO_PKG_VERSION"),
        env!("GIT_HASH"),
        env!("BUILD_TIMESTAMP"),
        env!("BUILD_PROFILE")
    );
    info!("Config file: {}", config_path.display());

    // Fails on bad durations, granularity or timezone before touching the database
    let config = match ReconciliationConfig::from_toml(&toml_config) {
        Ok(config) => config,
        Err(e) => {
            if e.is_configuration() {
                error!(error = %e, "Config rejected, no database access attempted");
            }
            return Err(e).context("Invalid reconciliation config");
        }
    };
    let scope = PipelineScope::from_identity(&config.pipeline);

    let summary = if args.dry_run {
        warn!("Dry run: reconciling an empty in-memory table, nothing is persisted");
        let reconciler = Reconciler::new(MemoryGateway::new(scope), config);
        run(reconciler, args.now).await?
    } else {
        let db_path = args
            .database
            .or(toml_config.database_path)
            .context("No database path (pass --database or set database_path)")?;
        info!("Database path: {}", db_path.display());

        let pool = init_database(&db_path, &config.table)
            .await
            .with_context(|| format!("Failed to open database {}", db_path.display()))?;
        let gateway = SqliteGateway::new(pool.clone(), &config.table, scope, config.max_lock_wait_ms)?;
        let summary = run(Reconciler::new(gateway, config), args.now).await?;
        pool.close().await;
        summary
    };

    println!("{}", serde_json::to_string_pretty(&summary)?);

    if !summary.is_clean() {
        warn!(
            failed_records = summary.failed_records.len(),
            failed_days = summary.failed_days.len(),
            "Run finished with failures"
        );
    }
    Ok(())
}

async fn run<G: DriveTableGateway>(
    reconciler: Reconciler<G>,
    now: Option<DateTime<Utc>>,
) -> Result<RunSummary> {
    let reconciler = match now {
        Some(now) => {
            info!(%now, "Clock pinned");
            reconciler.with_clock(Arc::new(FixedClock(now)))
        }
        None => reconciler,
    };
    match reconciler.run().await {
        Ok(summary) => Ok(summary),
        Err(e) => {
            if e.is_persistence() {
                error!(error = %e, "Storage read failed, run aborted before further writes");
            } else {
                error!(error = %e, "Run aborted");
            }
            Err(e).context("Reconciliation run failed")
        }
    }
}
