//! Runs one embedded `PostgreSQL` lifecycle step on behalf of the test suite.
//!
//! ```text
//! pg_worker <setup|start|stop> <payload.json>
//! ```
//!
//! The payload is a [`WorkerPayload`] written by `pg-embed-setup-unpriv`. When
//! launched as root the worker becomes `nobody` before touching the cluster,
//! since `postgres` refuses to run with superuser privileges. A started
//! server outlives the worker.

#[cfg(unix)]
use camino::{Utf8Path, Utf8PathBuf};
#[cfg(unix)]
use clap::{Parser, ValueEnum};
#[cfg(unix)]
use nix::unistd::{Uid, User, initgroups, setgid, setuid};
#[cfg(unix)]
use pg_embedded_setup_unpriv::ambient_dir_and_path;
#[cfg(unix)]
use pg_embedded_setup_unpriv::worker::{PlainSecret, WorkerPayload};
#[cfg(unix)]
use postgresql_embedded::{PostgreSQL, Status};
#[cfg(unix)]
use std::ffi::CString;
#[cfg(unix)]
use std::io::Read;
#[cfg(unix)]
use std::mem::ManuallyDrop;
#[cfg(unix)]
use thiserror::Error;

#[cfg(unix)]
const UNPRIVILEGED_USER: &str = "nobody";

#[cfg(unix)]
#[derive(Debug, Error)]
enum WorkerError {
    #[error("failed to read payload {path}: {message}")]
    PayloadRead { path: Utf8PathBuf, message: String },
    #[error("failed to parse payload: {0}")]
    PayloadParse(#[from] serde_json::Error),
    #[error("invalid settings in payload: {0}")]
    Settings(String),
    #[error("failed to become {UNPRIVILEGED_USER}: {0}")]
    PrivilegeDrop(String),
    #[error("failed to build runtime: {0}")]
    Runtime(#[from] std::io::Error),
    #[error("{operation:?} failed: {message}")]
    Postgres {
        operation: Operation,
        message: String,
    },
}

#[cfg(unix)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Operation {
    Setup,
    Start,
    Stop,
}

#[cfg(unix)]
#[derive(Debug, Parser)]
#[command(name = "pg_worker", about = "Embedded PostgreSQL lifecycle worker")]
struct Args {
    /// Lifecycle step to run.
    #[arg(value_enum)]
    operation: Operation,

    /// JSON payload describing the cluster.
    payload: Utf8PathBuf,
}

#[cfg(unix)]
fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let args = Args::parse();
    let payload = load_payload(&args.payload)?;
    become_unprivileged()?;
    apply_environment(&payload.environment);
    let settings = payload
        .settings
        .into_settings()
        .map_err(|err| WorkerError::Settings(err.to_string()))?;

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .map_err(WorkerError::Runtime)?;
    runtime.block_on(run(args.operation, PostgreSQL::new(settings)))?;
    Ok(())
}

#[cfg(unix)]
async fn run(operation: Operation, mut postgres: PostgreSQL) -> Result<(), WorkerError> {
    let failed = |err: postgresql_embedded::Error| WorkerError::Postgres {
        operation,
        message: err.to_string(),
    };
    match operation {
        Operation::Setup => postgres.setup().await.map_err(failed),
        Operation::Start => {
            if !matches!(postgres.status(), Status::Started) {
                postgres.start().await.map_err(failed)?;
            }
            // Dropping the handle would stop the server.
            let _running = ManuallyDrop::new(postgres);
            Ok(())
        }
        Operation::Stop => postgres.stop().await.map_err(failed),
    }
}

#[cfg(unix)]
fn load_payload(path: &Utf8Path) -> Result<WorkerPayload, WorkerError> {
    let read_error = |message: String| WorkerError::PayloadRead {
        path: path.to_owned(),
        message,
    };
    let (dir, relative) = ambient_dir_and_path(path).map_err(|err| read_error(err.to_string()))?;
    let mut file = dir
        .open(relative.as_std_path())
        .map_err(|err| read_error(err.to_string()))?;
    let mut bytes = Vec::new();
    file.read_to_end(&mut bytes)
        .map_err(|err| read_error(err.to_string()))?;
    Ok(serde_json::from_slice(&bytes)?)
}

#[cfg(unix)]
fn become_unprivileged() -> Result<(), WorkerError> {
    if !Uid::effective().is_root() {
        return Ok(());
    }
    let denied = |err: nix::Error| WorkerError::PrivilegeDrop(err.to_string());
    let user = User::from_name(UNPRIVILEGED_USER)
        .map_err(denied)?
        .ok_or_else(|| WorkerError::PrivilegeDrop("no such user".to_owned()))?;
    let name = CString::new(user.name.clone())
        .map_err(|err| WorkerError::PrivilegeDrop(err.to_string()))?;
    initgroups(&name, user.gid).map_err(denied)?;
    setgid(user.gid).map_err(denied)?;
    setuid(user.uid).map_err(denied)?;

    // SAFETY: no other thread exists yet.
    unsafe {
        std::env::set_var("HOME", &user.dir);
        std::env::set_var("USER", &user.name);
        std::env::set_var("LOGNAME", &user.name);
    }
    Ok(())
}

#[cfg(unix)]
fn apply_environment(environment: &[(String, Option<PlainSecret>)]) {
    for (key, value) in environment {
        // SAFETY: no other thread exists yet.
        unsafe {
            match value {
                Some(secret) => std::env::set_var(key, secret.expose()),
                None => std::env::remove_var(key),
            }
        }
    }
}

#[cfg(not(unix))]
fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    Err("pg_worker needs a Unix host".into())
}
