//! Runs one recovery sweep against the `PostgreSQL` queue store.
//!
//! Usage:
//!
//! ```text
//! ANALYSIS_QUEUE_DATABASE_URL=postgres://... queue_recovery \
//!     --alive-worker <worker-uuid> --alive-worker <worker-uuid> \
//!     --stuck-after-secs 3600
//! ```
//!
//! Connection settings come from the environment (see
//! [`QueueConfig::from_env`]); `--database-url` overrides the URL.
//!
//! Every in-progress task whose worker is not listed with `--alive-worker` is
//! handed back to the pending pool. Tasks still in progress after the sweep
//! and started more than `--stuck-after-secs` ago are reported, and reset as
//! well when `--reset-stuck` is given.

use analysis_queue::config::{ConfigError, DATABASE_URL_VAR, QueueConfig};
use analysis_queue::queue::{
    adapters::postgres::PostgresQueueRepository, domain::WorkerUuid, services::RecoveryService,
};
use chrono::TimeDelta;
use clap::Parser;
use mockable::DefaultClock;
use std::env;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

/// Boxed error type for the main result.
type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Command-line arguments for a recovery sweep.
#[derive(Debug, Parser)]
#[command(name = "queue_recovery", about = "Recover tasks abandoned by dead workers")]
struct Args {
    /// `PostgreSQL` connection URL, overriding `ANALYSIS_QUEUE_DATABASE_URL`.
    #[arg(long)]
    database_url: Option<String>,

    /// Identifier of a worker known to be alive. Repeat for each worker.
    #[arg(long = "alive-worker")]
    alive_workers: Vec<String>,

    /// Age after which an in-progress task is reported as stuck.
    #[arg(long, default_value_t = 3600)]
    stuck_after_secs: u32,

    /// Reset stuck tasks instead of only reporting them.
    #[arg(long)]
    reset_stuck: bool,

    /// Log filter used when `RUST_LOG` is unset.
    #[arg(short, long, default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() -> Result<(), BoxError> {
    let args = Args::parse();

    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_level)))
        .init();

    let alive_workers = args
        .alive_workers
        .iter()
        .map(WorkerUuid::new)
        .collect::<Result<Vec<_>, _>>()?;

    let pool = load_config(args.database_url.as_deref())?.build_pool()?;
    let recovery = RecoveryService::new(
        Arc::new(PostgresQueueRepository::new(pool)),
        Arc::new(DefaultClock),
    );

    let reset = recovery
        .reset_tasks_with_unknown_workers(&alive_workers)
        .await?;
    let max_age = TimeDelta::seconds(i64::from(args.stuck_after_secs));
    let stuck = if args.reset_stuck {
        recovery.reset_stuck_tasks(max_age).await?
    } else {
        u64::try_from(recovery.stuck_tasks(max_age).await?.len())?
    };
    let worn_out = recovery.worn_out_tasks().await?.len();

    info!(
        reset,
        stuck,
        reset_stuck = args.reset_stuck,
        worn_out,
        "recovery sweep finished"
    );
    Ok(())
}

/// Reads the connection settings, letting `database_url` replace the one
/// found in the environment.
fn load_config(database_url: Option<&str>) -> Result<QueueConfig, ConfigError> {
    match database_url {
        None => QueueConfig::from_env(),
        Some(url) => QueueConfig::from_lookup(|name| {
            if name == DATABASE_URL_VAR {
                Some(url.to_owned())
            } else {
                env::var(name).ok()
            }
        }),
    }
}
