//! Shared test helpers for `PostgreSQL` integration tests.

use super::cluster::server_url;
use analysis_queue::config::QueueConfig;
use analysis_queue::queue::{
    adapters::postgres::{PostgresQueueRepository, QueuePgPool},
    domain::{EntityUuid, NewQueueTask, QueueTask, TaskType, TaskUuid, WorkerUuid},
};
use chrono::{DateTime, TimeDelta, TimeZone, Utc};
use diesel::connection::SimpleConnection;
use diesel::pg::PgConnection;
use diesel::r2d2::{self, ConnectionManager, CustomizeConnection, PooledConnection};
use mockable::DefaultClock;
use uuid::Uuid;

/// SQL creating the queue tables.
pub const CREATE_QUEUE_TABLES_SQL: &str =
    include_str!("../../migrations/2026-10-01-000000_create_queue_tables/up.sql");

/// Pins every pooled connection to the test schema.
#[derive(Debug)]
struct SearchPath(String);

impl CustomizeConnection<PgConnection, r2d2::Error> for SearchPath {
    fn on_acquire(&self, conn: &mut PgConnection) -> Result<(), r2d2::Error> {
        conn.batch_execute(&format!("SET search_path TO {}", self.0))
            .map_err(r2d2::Error::QueryError)
    }
}

/// A migrated schema that is dropped with the value.
pub struct TestSchema {
    pub repository: PostgresQueueRepository,
    pool: QueuePgPool,
    schema: String,
}

impl TestSchema {
    /// Checks out a raw connection pinned to the schema.
    ///
    /// # Errors
    ///
    /// Returns an error if no connection is available.
    pub fn connection(&self) -> eyre::Result<PooledConnection<ConnectionManager<PgConnection>>> {
        Ok(self.pool.get()?)
    }
}

impl Drop for TestSchema {
    fn drop(&mut self) {
        if let Ok(mut conn) = self.pool.get() {
            let _dropped = conn.batch_execute(&format!("DROP SCHEMA IF EXISTS {} CASCADE", self.schema));
        }
    }
}

/// Creates a migrated schema on the test server.
///
/// # Errors
///
/// Returns an error if the pool cannot be built or the migration fails.
pub fn test_schema() -> eyre::Result<TestSchema> {
    let url = server_url();
    let schema = format!("queue_test_{}", Uuid::new_v4().simple());

    let bootstrap = QueueConfig::new(url.clone()).with_pool_size(1).build_pool()?;
    bootstrap
        .get()?
        .batch_execute(&format!("CREATE SCHEMA {schema}"))?;

    let pool = r2d2::Pool::builder()
        .max_size(8)
        .connection_customizer(Box::new(SearchPath(schema.clone())))
        .build(ConnectionManager::<PgConnection>::new(url))?;
    pool.get()?.batch_execute(CREATE_QUEUE_TABLES_SQL)?;

    Ok(TestSchema {
        repository: PostgresQueueRepository::new(pool.clone()),
        pool,
        schema,
    })
}

/// Returns a fixed instant `seconds` after the test epoch.
#[must_use]
pub fn at(seconds: i64) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0)
        .single()
        .unwrap_or(DateTime::<Utc>::MIN_UTC)
        + TimeDelta::seconds(seconds)
}

/// Parses a task identifier.
///
/// # Errors
///
/// Returns an error if `value` is not a valid identifier.
pub fn task_uuid(value: &str) -> eyre::Result<TaskUuid> {
    Ok(TaskUuid::new(value)?)
}

/// Parses a worker identifier.
///
/// # Errors
///
/// Returns an error if `value` is not a valid identifier.
pub fn worker(value: &str) -> eyre::Result<WorkerUuid> {
    Ok(WorkerUuid::new(value)?)
}

/// Parses an entity identifier.
///
/// # Errors
///
/// Returns an error if `value` is not a valid identifier.
pub fn entity(value: &str) -> eyre::Result<EntityUuid> {
    Ok(EntityUuid::new(value)?)
}

/// Builds a pending report created at `created_at`, optionally owned by
/// `project`.
///
/// # Errors
///
/// Returns an error if an identifier is invalid.
pub fn pending(uuid: &str, project: Option<&str>, created_at: i64) -> eyre::Result<QueueTask> {
    let mut described = NewQueueTask::new(task_uuid(uuid)?, TaskType::report())
        .with_created_at(at(created_at))
        .with_updated_at(at(created_at));
    if let Some(owner) = project {
        described = described.with_entity(entity(owner)?);
    }
    Ok(described.into_task(&DefaultClock)?)
}

/// Builds a pending task of `task_type` created at `created_at`.
///
/// # Errors
///
/// Returns an error if an identifier or the type is invalid.
pub fn pending_of_type(uuid: &str, task_type: &str, created_at: i64) -> eyre::Result<QueueTask> {
    Ok(NewQueueTask::new(task_uuid(uuid)?, TaskType::new(task_type)?)
        .with_created_at(at(created_at))
        .with_updated_at(at(created_at))
        .into_task(&DefaultClock)?)
}

/// Builds a report claimed by `worker_uuid` at `started_at`.
///
/// # Errors
///
/// Returns an error if an identifier is invalid.
pub fn claimed(
    uuid: &str,
    project: Option<&str>,
    worker_uuid: &str,
    started_at: i64,
) -> eyre::Result<QueueTask> {
    let mut described = NewQueueTask::new(task_uuid(uuid)?, TaskType::report())
        .with_created_at(at(started_at))
        .with_updated_at(at(started_at))
        .in_progress(worker(worker_uuid)?, at(started_at));
    if let Some(owner) = project {
        described = described.with_entity(entity(owner)?);
    }
    Ok(described.into_task(&DefaultClock)?)
}
