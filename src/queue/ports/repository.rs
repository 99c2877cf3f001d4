//! Repository port for queued tasks and their characteristics.
//!
//! Mutating operations take the timestamp to record as an argument so that
//! callers decide when the clock is read. Operations addressing a single
//! task never fail because the task is missing: reads return `None`, writes
//! report zero affected rows and claims report [`ClaimOutcome::NotFound`].

use crate::queue::domain::{
    EntityUuid, PrOrBranchTask, QueueDomainError, QueueTask, TaskCharacteristic, TaskQuery,
    TaskStatus, TaskUuid, WorkerUuid,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;

/// Result type for queue repository operations.
pub type QueueRepositoryResult<T> = Result<T, QueueRepositoryError>;

/// Result of an attempt to claim a task for a worker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClaimOutcome {
    /// The task was pending and now belongs to the worker.
    Claimed(QueueTask),
    /// The task exists but was not pending at the time of the write.
    Conflict,
    /// No task has the given identifier.
    NotFound,
}

impl ClaimOutcome {
    /// Returns the claimed task, if the claim succeeded.
    #[must_use]
    pub fn into_claimed(self) -> Option<QueueTask> {
        match self {
            Self::Claimed(task) => Some(task),
            Self::Conflict | Self::NotFound => None,
        }
    }
}

/// Queue persistence contract.
#[async_trait]
pub trait QueueRepository: Send + Sync {
    /// Stores a new task together with its characteristics.
    ///
    /// # Errors
    ///
    /// Returns [`QueueRepositoryError::DuplicateTask`] when the task
    /// identifier already exists and [`QueueRepositoryError::Domain`] when a
    /// characteristic names another task.
    async fn insert(
        &self,
        task: &QueueTask,
        characteristics: &[TaskCharacteristic],
    ) -> QueueRepositoryResult<()>;

    /// Finds a task by identifier.
    async fn select_by_uuid(&self, uuid: &TaskUuid) -> QueueRepositoryResult<Option<QueueTask>>;

    /// Returns the characteristics of a task in insertion order.
    async fn select_characteristics(
        &self,
        task_uuid: &TaskUuid,
    ) -> QueueRepositoryResult<Vec<TaskCharacteristic>>;

    /// Atomically moves a pending task to in-progress for `worker_uuid`,
    /// recording `now` as both start and update time.
    async fn claim(
        &self,
        uuid: &TaskUuid,
        worker_uuid: &WorkerUuid,
        now: DateTime<Utc>,
    ) -> QueueRepositoryResult<ClaimOutcome>;

    /// Returns every in-progress task owned by `worker_uuid`.
    async fn select_not_pending_for_worker(
        &self,
        worker_uuid: &WorkerUuid,
    ) -> QueueRepositoryResult<Vec<QueueTask>>;

    /// Reverts one task to pending, clearing its worker and keeping its start
    /// time. Returns the number of rows changed.
    async fn reset_to_pending_by_uuid(
        &self,
        uuid: &TaskUuid,
        now: DateTime<Utc>,
    ) -> QueueRepositoryResult<u64>;

    /// Reverts every in-progress task owned by `worker_uuid` in one
    /// statement. Returns the number of rows changed.
    async fn reset_in_progress_for_worker(
        &self,
        worker_uuid: &WorkerUuid,
        now: DateTime<Utc>,
    ) -> QueueRepositoryResult<u64>;

    /// Reverts every in-progress task whose worker is not in `alive_workers`.
    ///
    /// An empty `alive_workers` reverts all in-progress tasks. Returns the
    /// number of rows changed.
    async fn reset_tasks_with_unknown_worker_uuids(
        &self,
        alive_workers: &[WorkerUuid],
        now: DateTime<Utc>,
    ) -> QueueRepositoryResult<u64>;

    /// Returns in-progress tasks started strictly before `threshold`.
    async fn select_in_progress_started_before(
        &self,
        threshold: DateTime<Utc>,
    ) -> QueueRepositoryResult<Vec<QueueTask>>;

    /// Reverts every task still in progress with a start strictly before
    /// `threshold`, re-checking both conditions at write time. Returns the
    /// number of rows changed.
    async fn reset_in_progress_started_before(
        &self,
        threshold: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> QueueRepositoryResult<u64>;

    /// Returns pending tasks that were claimed at least once.
    async fn select_wornout(&self) -> QueueRepositoryResult<Vec<QueueTask>>;

    /// Returns every pending task, in no particular order.
    async fn select_pending(&self) -> QueueRepositoryResult<Vec<QueueTask>>;

    /// Returns the oldest pending report tasks, at most
    /// [`crate::queue::domain::PR_OR_BRANCH_BATCH_SIZE`], oldest first.
    async fn select_oldest_pending_pr_or_branch(&self)
    -> QueueRepositoryResult<Vec<PrOrBranchTask>>;

    /// Returns the oldest pending tasks of any type, at most
    /// [`crate::queue::domain::PR_OR_BRANCH_BATCH_SIZE`], oldest first.
    /// Issue synchronization tasks are left out when `exclude_issue_sync`
    /// is set.
    async fn select_oldest_pending(
        &self,
        exclude_issue_sync: bool,
    ) -> QueueRepositoryResult<Vec<QueueTask>>;

    /// Returns every in-progress task with its branch characteristic.
    async fn select_in_progress_with_characteristics(
        &self,
    ) -> QueueRepositoryResult<Vec<PrOrBranchTask>>;

    /// Returns tasks matching `query`, newest first, at most `limit`.
    async fn select_by_query_in_desc_order(
        &self,
        query: &TaskQuery,
        limit: usize,
    ) -> QueueRepositoryResult<Vec<QueueTask>>;

    /// Counts tasks matching `query`.
    async fn count_by_query(&self, query: &TaskQuery) -> QueueRepositoryResult<u64>;

    /// Returns every task of an entity.
    async fn select_by_entity_uuid(
        &self,
        entity_uuid: &EntityUuid,
    ) -> QueueRepositoryResult<Vec<QueueTask>>;

    /// Returns every task, oldest first.
    async fn select_all_in_asc_order(&self) -> QueueRepositoryResult<Vec<QueueTask>>;

    /// Counts tasks in `status`.
    async fn count_by_status(&self, status: TaskStatus) -> QueueRepositoryResult<u64>;

    /// Counts tasks in `status` belonging to `entity_uuid`.
    async fn count_by_status_and_entity_uuid(
        &self,
        status: TaskStatus,
        entity_uuid: &EntityUuid,
    ) -> QueueRepositoryResult<u64>;

    /// Counts tasks in `status` per entity. Entities without matches are
    /// absent from the map.
    async fn count_by_status_and_entity_uuids(
        &self,
        status: TaskStatus,
        entity_uuids: &[EntityUuid],
    ) -> QueueRepositoryResult<HashMap<EntityUuid, u64>>;

    /// Returns `true` when an issue synchronization task is queued or
    /// running.
    async fn has_any_issue_sync_task_pending_or_in_progress(&self) -> QueueRepositoryResult<bool>;

    /// Returns the creation time of the oldest pending task, scoped to
    /// `entity_uuid` when given.
    async fn select_creation_date_of_oldest_pending_by_entity_uuid(
        &self,
        entity_uuid: Option<&EntityUuid>,
    ) -> QueueRepositoryResult<Option<DateTime<Utc>>>;

    /// Deletes a task and its characteristics. Returns the number of tasks
    /// deleted.
    async fn delete_by_uuid(&self, uuid: &TaskUuid) -> QueueRepositoryResult<u64>;

    /// Deletes a task only while it is in `expected_status`. Returns the
    /// number of tasks deleted.
    async fn delete_by_uuid_if(
        &self,
        uuid: &TaskUuid,
        expected_status: TaskStatus,
    ) -> QueueRepositoryResult<u64>;
}

/// Errors returned by queue repository implementations.
#[derive(Debug, Clone, Error)]
pub enum QueueRepositoryError {
    /// A task with the same identifier already exists.
    #[error("duplicate task identifier: {0}")]
    DuplicateTask(TaskUuid),

    /// The data handed to the repository violates a domain rule.
    #[error(transparent)]
    Domain(#[from] QueueDomainError),

    /// Persisted data could not be reconstructed into domain types.
    #[error("invalid persisted data: {0}")]
    InvalidPersistedData(Arc<dyn std::error::Error + Send + Sync>),

    /// Persistence-layer failure.
    #[error("persistence error: {0}")]
    Persistence(Arc<dyn std::error::Error + Send + Sync>),
}

impl QueueRepositoryError {
    /// Wraps a data-quality or deserialization error from persisted rows.
    pub fn invalid_persisted_data(err: impl std::error::Error + Send + Sync + 'static) -> Self {
        Self::InvalidPersistedData(Arc::new(err))
    }

    /// Wraps a persistence error.
    pub fn persistence(err: impl std::error::Error + Send + Sync + 'static) -> Self {
        Self::Persistence(Arc::new(err))
    }
}

impl From<diesel::result::Error> for QueueRepositoryError {
    fn from(err: diesel::result::Error) -> Self {
        Self::persistence(err)
    }
}
