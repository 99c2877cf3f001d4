//! Embedded `PostgreSQL` cluster shared by the integration suite.
//!
//! The first test that needs a server boots one cluster through
//! `pg-embed-setup-unpriv`; every later test reuses it. Unprivileged runs
//! start `postgresql_embedded` in process, root runs delegate to the
//! `pg_worker` binary so the server never runs as root. Setting
//! [`TEST_DATABASE_URL_VAR`] skips the cluster and uses that server instead.

use cap_std::ambient_authority;
use cap_std::fs::Dir;
use eyre::{Result, WrapErr, eyre};
use pg_embedded_setup_unpriv::worker_process_test_api::{
    WorkerOperation, WorkerRequest, WorkerRequestArgs, run as run_worker,
};
use pg_embedded_setup_unpriv::{
    ExecutionPrivileges, TestBootstrapSettings, bootstrap_for_tests, detect_execution_privileges,
};
use postgresql_embedded::{PostgreSQL, Settings, Status};
use std::env;
use std::ffi::OsString;
use std::io::ErrorKind;
use std::net::TcpListener;
use std::path::Path;
use std::sync::{Mutex, MutexGuard, OnceLock, PoisonError};
use std::time::Duration;
use tokio::runtime::Runtime;

/// Variable naming an existing server to use instead of the embedded one.
pub const TEST_DATABASE_URL_VAR: &str = "ANALYSIS_QUEUE_TEST_DATABASE_URL";

const PG_PORT_VAR: &str = "PG_PORT";
const PG_WORKER_VAR: &str = "PG_EMBEDDED_WORKER";

static CLUSTER: OnceLock<EmbeddedCluster> = OnceLock::new();
static ENV_LOCK: Mutex<()> = Mutex::new(());

/// Returns the URL of the maintenance database of the test server.
///
/// # Panics
///
/// Panics with a `SKIP-TEST-CLUSTER` message when the embedded cluster
/// cannot be started.
pub fn server_url() -> String {
    if let Some(url) = env::var(TEST_DATABASE_URL_VAR)
        .ok()
        .filter(|value| !value.trim().is_empty())
    {
        return url;
    }
    tokio::task::block_in_place(|| shared_cluster().maintenance_url())
}

fn shared_cluster() -> &'static EmbeddedCluster {
    CLUSTER.get_or_init(|| match EmbeddedCluster::start() {
        Ok(cluster) => cluster,
        Err(err) => panic!("SKIP-TEST-CLUSTER: failed to start PostgreSQL: {err:#}"),
    })
}

struct EmbeddedCluster {
    bootstrap: TestBootstrapSettings,
    env_vars: Vec<(String, Option<String>)>,
    runtime: Option<Runtime>,
    postgres: Option<PostgreSQL>,
}

impl EmbeddedCluster {
    fn start() -> Result<Self> {
        let overrides = bootstrap_overrides()?;
        let mut bootstrap = {
            let _scoped = ScopedEnv::apply(&overrides);
            bootstrap_for_tests().wrap_err("prepare embedded PostgreSQL settings")?
        };
        adopt_password_file(&mut bootstrap.settings)?;
        let env_vars = bootstrap.environment.to_env();

        let mut cluster = Self {
            bootstrap,
            env_vars,
            runtime: None,
            postgres: None,
        };
        match cluster.bootstrap.privileges {
            ExecutionPrivileges::Root => cluster.start_with_worker()?,
            ExecutionPrivileges::Unprivileged => cluster.start_in_process()?,
        }
        Ok(cluster)
    }

    fn maintenance_url(&self) -> String {
        self.bootstrap.settings.url("postgres")
    }

    fn start_in_process(&mut self) -> Result<()> {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .wrap_err("build the cluster runtime")?;
        let mut postgres = PostgreSQL::new(self.bootstrap.settings.clone());
        {
            let _scoped = ScopedEnv::apply(&as_os_pairs(&self.env_vars));
            runtime.block_on(async {
                postgres.setup().await.wrap_err("set up PostgreSQL")?;
                if !matches!(postgres.status(), Status::Started) {
                    postgres.start().await.wrap_err("start PostgreSQL")?;
                }
                Ok::<(), eyre::Report>(())
            })?;
        }
        self.bootstrap.settings = postgres.settings().clone();
        adopt_pid_file_port(&mut self.bootstrap.settings)?;
        self.runtime = Some(runtime);
        self.postgres = Some(postgres);
        Ok(())
    }

    fn start_with_worker(&mut self) -> Result<()> {
        self.delegate(WorkerOperation::Setup, self.bootstrap.setup_timeout)
            .wrap_err("pg_worker setup")?;
        self.delegate(WorkerOperation::Start, self.bootstrap.start_timeout)
            .wrap_err("pg_worker start")?;
        adopt_pid_file_port(&mut self.bootstrap.settings)
    }

    fn delegate(&self, operation: WorkerOperation, timeout: Duration) -> Result<()> {
        let worker = self
            .bootstrap
            .worker_binary
            .as_ref()
            .ok_or_else(|| eyre!("{PG_WORKER_VAR} must name pg_worker when running as root"))?;
        let request = WorkerRequest::new(WorkerRequestArgs {
            worker: worker.as_path(),
            settings: &self.bootstrap.settings,
            env_vars: &self.env_vars,
            operation,
            timeout,
        });
        run_worker(&request)?;
        Ok(())
    }

    fn stop(&mut self) -> Result<()> {
        match (self.postgres.take(), self.runtime.as_ref()) {
            (Some(postgres), Some(runtime)) => runtime
                .block_on(postgres.stop())
                .wrap_err("stop PostgreSQL"),
            (None, _) if matches!(self.bootstrap.privileges, ExecutionPrivileges::Root) => {
                self.delegate(WorkerOperation::Stop, self.bootstrap.shutdown_timeout)
            }
            _ => Ok(()),
        }
    }
}

impl Drop for EmbeddedCluster {
    fn drop(&mut self) {
        drop(self.stop());
    }
}

/// Process environment changes held for the guard's lifetime.
struct ScopedEnv {
    previous: Vec<(OsString, Option<OsString>)>,
    _lock: MutexGuard<'static, ()>,
}

impl ScopedEnv {
    fn apply(changes: &[(OsString, Option<OsString>)]) -> Self {
        let lock = ENV_LOCK.lock().unwrap_or_else(PoisonError::into_inner);
        let previous = changes
            .iter()
            .map(|(key, value)| {
                let before = env::var_os(key);
                set_or_remove(key, value.as_ref());
                (key.clone(), before)
            })
            .collect();
        Self {
            previous,
            _lock: lock,
        }
    }
}

impl Drop for ScopedEnv {
    fn drop(&mut self) {
        for (key, value) in self.previous.drain(..).rev() {
            set_or_remove(&key, value.as_ref());
        }
    }
}

fn set_or_remove(key: &OsString, value: Option<&OsString>) {
    // SAFETY: ENV_LOCK serializes every environment write made by the suite.
    unsafe {
        match value {
            Some(present) => env::set_var(key, present),
            None => env::remove_var(key),
        }
    }
}

fn bootstrap_overrides() -> Result<Vec<(OsString, Option<OsString>)>> {
    let mut changes = Vec::new();
    if env::var_os(PG_PORT_VAR).is_none() {
        changes.push((
            OsString::from(PG_PORT_VAR),
            Some(OsString::from(free_port()?.to_string())),
        ));
    }
    if matches!(detect_execution_privileges(), ExecutionPrivileges::Root)
        && env::var_os(PG_WORKER_VAR).is_none()
    {
        changes.push((
            OsString::from(PG_WORKER_VAR),
            Some(OsString::from(env!("CARGO_BIN_EXE_pg_worker"))),
        ));
    }
    Ok(changes)
}

fn free_port() -> Result<u16> {
    let listener = TcpListener::bind(("127.0.0.1", 0)).wrap_err("reserve a local port")?;
    Ok(listener.local_addr()?.port())
}

fn as_os_pairs(pairs: &[(String, Option<String>)]) -> Vec<(OsString, Option<OsString>)> {
    pairs
        .iter()
        .map(|(key, value)| (OsString::from(key), value.as_ref().map(OsString::from)))
        .collect()
}

/// Uses the generated superuser password when the bootstrap wrote one.
fn adopt_password_file(settings: &mut Settings) -> Result<()> {
    let Some(contents) = read_optional(&settings.password_file)? else {
        return Ok(());
    };
    let password = contents.trim_end();
    if !password.is_empty() {
        password.clone_into(&mut settings.password);
    }
    Ok(())
}

/// Uses the port the postmaster actually bound, read from its pid file.
fn adopt_pid_file_port(settings: &mut Settings) -> Result<()> {
    let Some(contents) = read_optional(&settings.data_dir.join("postmaster.pid"))? else {
        return Ok(());
    };
    if let Some(port) = contents
        .lines()
        .nth(3)
        .and_then(|line| line.trim().parse::<u16>().ok())
    {
        settings.port = port;
    }
    Ok(())
}

fn read_optional(path: &Path) -> Result<Option<String>> {
    let (Some(parent), Some(name)) = (path.parent(), path.file_name()) else {
        return Err(eyre!("{} does not name a file", path.display()));
    };
    let dir = match Dir::open_ambient_dir(parent, ambient_authority()) {
        Ok(dir) => dir,
        Err(err) if err.kind() == ErrorKind::NotFound => return Ok(None),
        Err(err) => return Err(err).wrap_err_with(|| format!("open {}", parent.display())),
    };
    match dir.read_to_string(name) {
        Ok(contents) => Ok(Some(contents)),
        Err(err) if err.kind() == ErrorKind::NotFound => Ok(None),
        Err(err) => Err(err).wrap_err_with(|| format!("read {}", path.display())),
    }
}
