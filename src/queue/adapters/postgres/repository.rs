//! `PostgreSQL` repository implementation for the analysis task queue.
//!
//! Claims and guarded deletes are single conditional statements whose
//! predicate includes the expected prior status, so concurrent workers can
//! never both win the same task.

use super::{
    models::{CharacteristicRow, NewCharacteristicRow, NewQueueRow, QueueRow},
    schema::{ce_queue, ce_task_characteristics},
};
use crate::queue::{
    domain::{
        CharacteristicUuid, ComponentUuid, EntityUuid, PR_OR_BRANCH_BATCH_SIZE, PersistedTaskData,
        PrOrBranchTask, QueueTask, SubmitterUuid, TaskCharacteristic, TaskQuery, TaskStatus,
        TaskType, TaskUuid, WorkerUuid, ensure_owned_by, keys,
    },
    ports::{ClaimOutcome, QueueRepository, QueueRepositoryError, QueueRepositoryResult},
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use diesel::dsl::{count_star, exists, min, not};
use diesel::pg::{Pg, PgConnection};
use diesel::prelude::*;
use diesel::r2d2::{ConnectionManager, Pool};
use diesel::result::{DatabaseErrorInformation, DatabaseErrorKind, Error as DieselError};
use std::collections::HashMap;

/// `PostgreSQL` connection pool type used by queue adapters.
pub type QueuePgPool = Pool<ConnectionManager<PgConnection>>;

const PENDING: &str = TaskStatus::Pending.as_str();
const IN_PROGRESS: &str = TaskStatus::InProgress.as_str();

/// Assignments returning a task to the pending state.
type BackToPending = (
    diesel::dsl::Eq<ce_queue::status, &'static str>,
    diesel::dsl::Eq<ce_queue::worker_uuid, Option<String>>,
    diesel::dsl::Eq<ce_queue::updated_at, DateTime<Utc>>,
);

fn back_to_pending(now: DateTime<Utc>) -> BackToPending {
    (
        ce_queue::status.eq(PENDING),
        ce_queue::worker_uuid.eq(None::<String>),
        ce_queue::updated_at.eq(now),
    )
}

/// `PostgreSQL`-backed queue repository.
#[derive(Debug, Clone)]
pub struct PostgresQueueRepository {
    pool: QueuePgPool,
}

impl PostgresQueueRepository {
    /// Creates a new repository from a `PostgreSQL` connection pool.
    #[must_use]
    pub const fn new(pool: QueuePgPool) -> Self {
        Self { pool }
    }

    async fn run_blocking<F, T>(&self, f: F) -> QueueRepositoryResult<T>
    where
        F: FnOnce(&mut PgConnection) -> QueueRepositoryResult<T> + Send + 'static,
        T: Send + 'static,
    {
        let pool = self.pool.clone();
        tokio::task::spawn_blocking(move || {
            let mut connection = pool.get().map_err(QueueRepositoryError::persistence)?;
            f(&mut connection)
        })
        .await
        .map_err(QueueRepositoryError::persistence)?
    }
}

#[async_trait]
impl QueueRepository for PostgresQueueRepository {
    async fn insert(
        &self,
        task: &QueueTask,
        characteristics: &[TaskCharacteristic],
    ) -> QueueRepositoryResult<()> {
        ensure_owned_by(task.uuid(), characteristics)?;
        let task_uuid = task.uuid().clone();
        let new_row = to_new_row(task)?;
        let characteristic_rows: Vec<NewCharacteristicRow> =
            characteristics.iter().map(to_new_characteristic_row).collect();

        self.run_blocking(move |connection| {
            connection.transaction::<_, QueueRepositoryError, _>(|tx| {
                diesel::insert_into(ce_queue::table)
                    .values(&new_row)
                    .execute(tx)
                    .map_err(|err| match err {
                        DieselError::DatabaseError(DatabaseErrorKind::UniqueViolation, ref info)
                            if is_task_primary_key_violation(info.as_ref()) =>
                        {
                            QueueRepositoryError::DuplicateTask(task_uuid.clone())
                        }
                        _ => QueueRepositoryError::persistence(err),
                    })?;

                if !characteristic_rows.is_empty() {
                    diesel::insert_into(ce_task_characteristics::table)
                        .values(&characteristic_rows)
                        .execute(tx)
                        .map_err(QueueRepositoryError::persistence)?;
                }
                Ok(())
            })
        })
        .await
    }

    async fn select_by_uuid(&self, uuid: &TaskUuid) -> QueueRepositoryResult<Option<QueueTask>> {
        let lookup = uuid.as_str().to_owned();
        self.run_blocking(move |connection| {
            let row = ce_queue::table
                .filter(ce_queue::uuid.eq(&lookup))
                .select(QueueRow::as_select())
                .first::<QueueRow>(connection)
                .optional()
                .map_err(QueueRepositoryError::persistence)?;
            row.map(row_to_task).transpose()
        })
        .await
    }

    async fn select_characteristics(
        &self,
        task_uuid: &TaskUuid,
    ) -> QueueRepositoryResult<Vec<TaskCharacteristic>> {
        let lookup = task_uuid.as_str().to_owned();
        self.run_blocking(move |connection| {
            let rows = ce_task_characteristics::table
                .filter(ce_task_characteristics::task_uuid.eq(&lookup))
                .order(ce_task_characteristics::position.asc())
                .select(CharacteristicRow::as_select())
                .load::<CharacteristicRow>(connection)
                .map_err(QueueRepositoryError::persistence)?;
            rows.into_iter().map(row_to_characteristic).collect()
        })
        .await
    }

    async fn claim(
        &self,
        uuid: &TaskUuid,
        worker_uuid: &WorkerUuid,
        now: DateTime<Utc>,
    ) -> QueueRepositoryResult<ClaimOutcome> {
        let task_uuid = uuid.as_str().to_owned();
        let worker = worker_uuid.as_str().to_owned();
        self.run_blocking(move |connection| {
            let claimed = diesel::update(
                ce_queue::table
                    .filter(ce_queue::uuid.eq(&task_uuid))
                    .filter(ce_queue::status.eq(PENDING)),
            )
            .set((
                ce_queue::status.eq(IN_PROGRESS),
                ce_queue::worker_uuid.eq(Some(worker.as_str())),
                ce_queue::started_at.eq(Some(now)),
                ce_queue::updated_at.eq(now),
            ))
            .returning(QueueRow::as_returning())
            .get_result::<QueueRow>(connection)
            .optional()
            .map_err(QueueRepositoryError::persistence)?;

            if let Some(row) = claimed {
                return row_to_task(row).map(ClaimOutcome::Claimed);
            }

            let task_exists =
                diesel::select(exists(ce_queue::table.filter(ce_queue::uuid.eq(&task_uuid))))
                    .get_result::<bool>(connection)
                    .map_err(QueueRepositoryError::persistence)?;
            Ok(if task_exists {
                ClaimOutcome::Conflict
            } else {
                ClaimOutcome::NotFound
            })
        })
        .await
    }

    async fn select_not_pending_for_worker(
        &self,
        worker_uuid: &WorkerUuid,
    ) -> QueueRepositoryResult<Vec<QueueTask>> {
        let worker = worker_uuid.as_str().to_owned();
        self.run_blocking(move |connection| {
            let rows = ce_queue::table
                .filter(ce_queue::status.eq(IN_PROGRESS))
                .filter(ce_queue::worker_uuid.eq(&worker))
                .select(QueueRow::as_select())
                .load::<QueueRow>(connection)
                .map_err(QueueRepositoryError::persistence)?;
            rows_to_tasks(rows)
        })
        .await
    }

    async fn reset_to_pending_by_uuid(
        &self,
        uuid: &TaskUuid,
        now: DateTime<Utc>,
    ) -> QueueRepositoryResult<u64> {
        let task_uuid = uuid.as_str().to_owned();
        self.run_blocking(move |connection| {
            let updated = diesel::update(ce_queue::table.filter(ce_queue::uuid.eq(&task_uuid)))
                .set(back_to_pending(now))
                .execute(connection)
                .map_err(QueueRepositoryError::persistence)?;
            Ok(affected(updated))
        })
        .await
    }

    async fn reset_in_progress_for_worker(
        &self,
        worker_uuid: &WorkerUuid,
        now: DateTime<Utc>,
    ) -> QueueRepositoryResult<u64> {
        let worker = worker_uuid.as_str().to_owned();
        self.run_blocking(move |connection| {
            let updated = diesel::update(
                ce_queue::table
                    .filter(ce_queue::status.eq(IN_PROGRESS))
                    .filter(ce_queue::worker_uuid.eq(&worker)),
            )
            .set(back_to_pending(now))
            .execute(connection)
            .map_err(QueueRepositoryError::persistence)?;
            Ok(affected(updated))
        })
        .await
    }

    async fn reset_tasks_with_unknown_worker_uuids(
        &self,
        alive_workers: &[WorkerUuid],
        now: DateTime<Utc>,
    ) -> QueueRepositoryResult<u64> {
        let alive: Vec<String> = alive_workers
            .iter()
            .map(|worker| worker.as_str().to_owned())
            .collect();
        self.run_blocking(move |connection| {
            let in_progress = ce_queue::table.filter(ce_queue::status.eq(IN_PROGRESS));
            let updated = if alive.is_empty() {
                diesel::update(in_progress)
                    .set(back_to_pending(now))
                    .execute(connection)
            } else {
                diesel::update(in_progress.filter(
                    ce_queue::worker_uuid
                        .is_null()
                        .or(not(ce_queue::worker_uuid.eq_any(alive))),
                ))
                .set(back_to_pending(now))
                .execute(connection)
            }
            .map_err(QueueRepositoryError::persistence)?;
            Ok(affected(updated))
        })
        .await
    }

    async fn select_in_progress_started_before(
        &self,
        threshold: DateTime<Utc>,
    ) -> QueueRepositoryResult<Vec<QueueTask>> {
        self.run_blocking(move |connection| {
            let rows = ce_queue::table
                .filter(ce_queue::status.eq(IN_PROGRESS))
                .filter(ce_queue::started_at.lt(threshold))
                .select(QueueRow::as_select())
                .load::<QueueRow>(connection)
                .map_err(QueueRepositoryError::persistence)?;
            rows_to_tasks(rows)
        })
        .await
    }

    async fn reset_in_progress_started_before(
        &self,
        threshold: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> QueueRepositoryResult<u64> {
        self.run_blocking(move |connection| {
            let updated = diesel::update(
                ce_queue::table
                    .filter(ce_queue::status.eq(IN_PROGRESS))
                    .filter(ce_queue::started_at.lt(threshold)),
            )
            .set(back_to_pending(now))
            .execute(connection)
            .map_err(QueueRepositoryError::persistence)?;
            Ok(affected(updated))
        })
        .await
    }

    async fn select_wornout(&self) -> QueueRepositoryResult<Vec<QueueTask>> {
        self.run_blocking(move |connection| {
            let rows = ce_queue::table
                .filter(ce_queue::status.eq(PENDING))
                .filter(ce_queue::started_at.is_not_null())
                .select(QueueRow::as_select())
                .load::<QueueRow>(connection)
                .map_err(QueueRepositoryError::persistence)?;
            rows_to_tasks(rows)
        })
        .await
    }

    async fn select_pending(&self) -> QueueRepositoryResult<Vec<QueueTask>> {
        self.run_blocking(move |connection| {
            let rows = ce_queue::table
                .filter(ce_queue::status.eq(PENDING))
                .select(QueueRow::as_select())
                .load::<QueueRow>(connection)
                .map_err(QueueRepositoryError::persistence)?;
            rows_to_tasks(rows)
        })
        .await
    }

    async fn select_oldest_pending_pr_or_branch(
        &self,
    ) -> QueueRepositoryResult<Vec<PrOrBranchTask>> {
        let limit = batch_limit(PR_OR_BRANCH_BATCH_SIZE);
        self.run_blocking(move |connection| {
            connection.transaction::<_, QueueRepositoryError, _>(|tx| {
                let rows = ce_queue::table
                    .filter(ce_queue::status.eq(PENDING))
                    .filter(ce_queue::task_type.eq(TaskType::REPORT))
                    .order((ce_queue::created_at.asc(), ce_queue::uuid.asc()))
                    .limit(limit)
                    .select(QueueRow::as_select())
                    .load::<QueueRow>(tx)
                    .map_err(QueueRepositoryError::persistence)?;
                enrich_with_characteristics(tx, rows)
            })
        })
        .await
    }

    async fn select_oldest_pending(
        &self,
        exclude_issue_sync: bool,
    ) -> QueueRepositoryResult<Vec<QueueTask>> {
        let limit = batch_limit(PR_OR_BRANCH_BATCH_SIZE);
        self.run_blocking(move |connection| {
            let mut pending = ce_queue::table
                .filter(ce_queue::status.eq(PENDING))
                .into_boxed();
            if exclude_issue_sync {
                pending = pending.filter(ce_queue::task_type.ne(TaskType::ISSUE_SYNC));
            }
            let rows = pending
                .order((ce_queue::created_at.asc(), ce_queue::uuid.asc()))
                .limit(limit)
                .select(QueueRow::as_select())
                .load::<QueueRow>(connection)
                .map_err(QueueRepositoryError::persistence)?;
            rows_to_tasks(rows)
        })
        .await
    }

    async fn select_in_progress_with_characteristics(
        &self,
    ) -> QueueRepositoryResult<Vec<PrOrBranchTask>> {
        self.run_blocking(move |connection| {
            connection.transaction::<_, QueueRepositoryError, _>(|tx| {
                let rows = ce_queue::table
                    .filter(ce_queue::status.eq(IN_PROGRESS))
                    .order((ce_queue::created_at.asc(), ce_queue::uuid.asc()))
                    .select(QueueRow::as_select())
                    .load::<QueueRow>(tx)
                    .map_err(QueueRepositoryError::persistence)?;
                enrich_with_characteristics(tx, rows)
            })
        })
        .await
    }

    async fn select_by_query_in_desc_order(
        &self,
        query: &TaskQuery,
        limit: usize,
    ) -> QueueRepositoryResult<Vec<QueueTask>> {
        if query.matches_nothing() || limit == 0 {
            return Ok(Vec::new());
        }
        let owned_query = query.clone();
        let row_limit = batch_limit(limit);
        self.run_blocking(move |connection| {
            let rows = filtered(&owned_query)
                .order((ce_queue::created_at.desc(), ce_queue::uuid.desc()))
                .limit(row_limit)
                .select(QueueRow::as_select())
                .load::<QueueRow>(connection)
                .map_err(QueueRepositoryError::persistence)?;
            rows_to_tasks(rows)
        })
        .await
    }

    async fn count_by_query(&self, query: &TaskQuery) -> QueueRepositoryResult<u64> {
        if query.matches_nothing() {
            return Ok(0);
        }
        let owned_query = query.clone();
        self.run_blocking(move |connection| {
            let total = filtered(&owned_query)
                .count()
                .get_result::<i64>(connection)
                .map_err(QueueRepositoryError::persistence)?;
            to_count(total)
        })
        .await
    }

    async fn select_by_entity_uuid(
        &self,
        entity_uuid: &EntityUuid,
    ) -> QueueRepositoryResult<Vec<QueueTask>> {
        let entity = entity_uuid.as_str().to_owned();
        self.run_blocking(move |connection| {
            let rows = ce_queue::table
                .filter(ce_queue::entity_uuid.eq(&entity))
                .select(QueueRow::as_select())
                .load::<QueueRow>(connection)
                .map_err(QueueRepositoryError::persistence)?;
            rows_to_tasks(rows)
        })
        .await
    }

    async fn select_all_in_asc_order(&self) -> QueueRepositoryResult<Vec<QueueTask>> {
        self.run_blocking(move |connection| {
            let rows = ce_queue::table
                .order((ce_queue::created_at.asc(), ce_queue::uuid.asc()))
                .select(QueueRow::as_select())
                .load::<QueueRow>(connection)
                .map_err(QueueRepositoryError::persistence)?;
            rows_to_tasks(rows)
        })
        .await
    }

    async fn count_by_status(&self, status: TaskStatus) -> QueueRepositoryResult<u64> {
        self.run_blocking(move |connection| {
            let total = ce_queue::table
                .filter(ce_queue::status.eq(status.as_str()))
                .count()
                .get_result::<i64>(connection)
                .map_err(QueueRepositoryError::persistence)?;
            to_count(total)
        })
        .await
    }

    async fn count_by_status_and_entity_uuid(
        &self,
        status: TaskStatus,
        entity_uuid: &EntityUuid,
    ) -> QueueRepositoryResult<u64> {
        let entity = entity_uuid.as_str().to_owned();
        self.run_blocking(move |connection| {
            let total = ce_queue::table
                .filter(ce_queue::status.eq(status.as_str()))
                .filter(ce_queue::entity_uuid.eq(&entity))
                .count()
                .get_result::<i64>(connection)
                .map_err(QueueRepositoryError::persistence)?;
            to_count(total)
        })
        .await
    }

    async fn count_by_status_and_entity_uuids(
        &self,
        status: TaskStatus,
        entity_uuids: &[EntityUuid],
    ) -> QueueRepositoryResult<HashMap<EntityUuid, u64>> {
        if entity_uuids.is_empty() {
            return Ok(HashMap::new());
        }
        let entities: Vec<String> = entity_uuids
            .iter()
            .map(|entity| entity.as_str().to_owned())
            .collect();
        self.run_blocking(move |connection| {
            let rows = ce_queue::table
                .filter(ce_queue::status.eq(status.as_str()))
                .filter(ce_queue::entity_uuid.eq_any(entities))
                .group_by(ce_queue::entity_uuid)
                .select((ce_queue::entity_uuid, count_star()))
                .load::<(Option<String>, i64)>(connection)
                .map_err(QueueRepositoryError::persistence)?;

            let mut counts = HashMap::with_capacity(rows.len());
            for (raw_entity, total) in rows {
                let Some(entity) = raw_entity else { continue };
                let parsed =
                    EntityUuid::new(entity).map_err(QueueRepositoryError::invalid_persisted_data)?;
                counts.insert(parsed, to_count(total)?);
            }
            Ok(counts)
        })
        .await
    }

    async fn has_any_issue_sync_task_pending_or_in_progress(&self) -> QueueRepositoryResult<bool> {
        self.run_blocking(move |connection| {
            diesel::select(exists(
                ce_queue::table
                    .filter(ce_queue::task_type.eq(TaskType::ISSUE_SYNC))
                    .filter(ce_queue::status.eq_any([PENDING, IN_PROGRESS])),
            ))
            .get_result::<bool>(connection)
            .map_err(QueueRepositoryError::persistence)
        })
        .await
    }

    async fn select_creation_date_of_oldest_pending_by_entity_uuid(
        &self,
        entity_uuid: Option<&EntityUuid>,
    ) -> QueueRepositoryResult<Option<DateTime<Utc>>> {
        let scope = entity_uuid.map(|entity| entity.as_str().to_owned());
        self.run_blocking(move |connection| {
            let mut pending = ce_queue::table
                .filter(ce_queue::status.eq(PENDING))
                .into_boxed();
            if let Some(owner) = scope {
                pending = pending.filter(ce_queue::entity_uuid.eq(owner));
            }
            pending
                .select(min(ce_queue::created_at))
                .get_result::<Option<DateTime<Utc>>>(connection)
                .map_err(QueueRepositoryError::persistence)
        })
        .await
    }

    async fn delete_by_uuid(&self, uuid: &TaskUuid) -> QueueRepositoryResult<u64> {
        let task_uuid = uuid.as_str().to_owned();
        self.run_blocking(move |connection| {
            let deleted = diesel::delete(ce_queue::table.filter(ce_queue::uuid.eq(&task_uuid)))
                .execute(connection)
                .map_err(QueueRepositoryError::persistence)?;
            Ok(affected(deleted))
        })
        .await
    }

    async fn delete_by_uuid_if(
        &self,
        uuid: &TaskUuid,
        expected_status: TaskStatus,
    ) -> QueueRepositoryResult<u64> {
        let task_uuid = uuid.as_str().to_owned();
        self.run_blocking(move |connection| {
            let deleted = diesel::delete(
                ce_queue::table
                    .filter(ce_queue::uuid.eq(&task_uuid))
                    .filter(ce_queue::status.eq(expected_status.as_str())),
            )
            .execute(connection)
            .map_err(QueueRepositoryError::persistence)?;
            Ok(affected(deleted))
        })
        .await
    }
}

/// Builds the `WHERE` clause of an operator search.
fn filtered(query: &TaskQuery) -> ce_queue::BoxedQuery<'static, Pg> {
    let mut statement = ce_queue::table.into_boxed();
    if let Some(entity_uuids) = query.entity_uuids() {
        let entities: Vec<String> = entity_uuids
            .iter()
            .map(|entity| entity.as_str().to_owned())
            .collect();
        statement = statement.filter(ce_queue::entity_uuid.eq_any(entities));
    }
    if let Some(wanted) = query.statuses() {
        let statuses: Vec<&'static str> = wanted.iter().map(|status| status.as_str()).collect();
        statement = statement.filter(ce_queue::status.eq_any(statuses));
    }
    if let Some(task_type) = query.task_type() {
        statement = statement.filter(ce_queue::task_type.eq(task_type.as_str().to_owned()));
    }
    if let Some(min_submitted_at) = query.min_submitted_at() {
        statement = statement.filter(ce_queue::created_at.ge(min_submitted_at));
    }
    if let Some(max_executed_at) = query.max_executed_at() {
        statement = statement.filter(ce_queue::started_at.le(max_executed_at));
    }
    statement
}

fn enrich_with_characteristics(
    connection: &mut PgConnection,
    rows: Vec<QueueRow>,
) -> QueueRepositoryResult<Vec<PrOrBranchTask>> {
    let tasks = rows_to_tasks(rows)?;
    if tasks.is_empty() {
        return Ok(Vec::new());
    }
    let task_uuids: Vec<String> = tasks
        .iter()
        .map(|task| task.uuid().as_str().to_owned())
        .collect();
    let characteristic_rows = ce_task_characteristics::table
        .filter(ce_task_characteristics::task_uuid.eq_any(task_uuids))
        .filter(ce_task_characteristics::kee.eq_any([keys::BRANCH, keys::PULL_REQUEST]))
        .order(ce_task_characteristics::position.asc())
        .select(CharacteristicRow::as_select())
        .load::<CharacteristicRow>(connection)
        .map_err(QueueRepositoryError::persistence)?;

    let mut by_task: HashMap<TaskUuid, Vec<TaskCharacteristic>> = HashMap::new();
    for row in characteristic_rows {
        let characteristic = row_to_characteristic(row)?;
        by_task
            .entry(characteristic.task_uuid().clone())
            .or_default()
            .push(characteristic);
    }

    Ok(tasks
        .iter()
        .map(|task| {
            let characteristics = by_task
                .get(task.uuid())
                .map(Vec::as_slice)
                .unwrap_or_default();
            PrOrBranchTask::from_task(task, characteristics)
        })
        .collect())
}

fn to_new_row(task: &QueueTask) -> QueueRepositoryResult<NewQueueRow> {
    let part_count =
        i32::try_from(task.part_count()).map_err(QueueRepositoryError::persistence)?;
    Ok(NewQueueRow {
        uuid: task.uuid().as_str().to_owned(),
        task_type: task.task_type().as_str().to_owned(),
        status: task.status().as_str().to_owned(),
        entity_uuid: task.entity_uuid().map(|value| value.as_str().to_owned()),
        component_uuid: task.component_uuid().map(|value| value.as_str().to_owned()),
        submitter_uuid: task.submitter_uuid().map(|value| value.as_str().to_owned()),
        worker_uuid: task.worker_uuid().map(|value| value.as_str().to_owned()),
        created_at: task.created_at(),
        updated_at: task.updated_at(),
        started_at: task.started_at(),
        part_count,
    })
}

fn to_new_characteristic_row(characteristic: &TaskCharacteristic) -> NewCharacteristicRow {
    NewCharacteristicRow {
        uuid: characteristic.uuid().as_str().to_owned(),
        task_uuid: characteristic.task_uuid().as_str().to_owned(),
        kee: characteristic.key().to_owned(),
        text_value: characteristic.value().to_owned(),
    }
}

fn rows_to_tasks(rows: Vec<QueueRow>) -> QueueRepositoryResult<Vec<QueueTask>> {
    rows.into_iter().map(row_to_task).collect()
}

fn row_to_task(row: QueueRow) -> QueueRepositoryResult<QueueTask> {
    let QueueRow {
        uuid,
        task_type,
        status,
        entity_uuid,
        component_uuid,
        submitter_uuid,
        worker_uuid,
        created_at,
        updated_at,
        started_at,
        part_count,
    } = row;

    let data = PersistedTaskData {
        uuid: TaskUuid::new(uuid).map_err(QueueRepositoryError::invalid_persisted_data)?,
        task_type: TaskType::new(task_type)
            .map_err(QueueRepositoryError::invalid_persisted_data)?,
        status: TaskStatus::try_from(status.as_str())
            .map_err(QueueRepositoryError::invalid_persisted_data)?,
        entity_uuid: entity_uuid
            .map(EntityUuid::new)
            .transpose()
            .map_err(QueueRepositoryError::invalid_persisted_data)?,
        component_uuid: component_uuid
            .map(ComponentUuid::new)
            .transpose()
            .map_err(QueueRepositoryError::invalid_persisted_data)?,
        submitter_uuid: submitter_uuid
            .map(SubmitterUuid::new)
            .transpose()
            .map_err(QueueRepositoryError::invalid_persisted_data)?,
        worker_uuid: worker_uuid
            .map(WorkerUuid::new)
            .transpose()
            .map_err(QueueRepositoryError::invalid_persisted_data)?,
        created_at,
        updated_at,
        started_at,
        part_count: u32::try_from(part_count)
            .map_err(QueueRepositoryError::invalid_persisted_data)?,
    };
    Ok(QueueTask::from_persisted(data))
}

fn row_to_characteristic(row: CharacteristicRow) -> QueueRepositoryResult<TaskCharacteristic> {
    let CharacteristicRow {
        uuid,
        task_uuid,
        kee,
        text_value,
    } = row;
    let characteristic_uuid =
        CharacteristicUuid::new(uuid).map_err(QueueRepositoryError::invalid_persisted_data)?;
    let owner = TaskUuid::new(task_uuid).map_err(QueueRepositoryError::invalid_persisted_data)?;
    TaskCharacteristic::with_uuid(characteristic_uuid, owner, kee, text_value)
        .map_err(QueueRepositoryError::invalid_persisted_data)
}

fn is_task_primary_key_violation(info: &dyn DatabaseErrorInformation) -> bool {
    info.constraint_name()
        .is_some_and(|name| name == "ce_queue_pkey")
}

fn affected(rows: usize) -> u64 {
    u64::try_from(rows).unwrap_or(u64::MAX)
}

fn to_count(total: i64) -> QueueRepositoryResult<u64> {
    u64::try_from(total).map_err(QueueRepositoryError::invalid_persisted_data)
}

fn batch_limit(limit: usize) -> i64 {
    i64::try_from(limit).unwrap_or(i64::MAX)
}
