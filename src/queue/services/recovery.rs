//! Recovery of tasks abandoned by dead or stalled workers.

use super::QueueServiceResult;
use crate::queue::{
    domain::{QueueTask, TaskUuid, WorkerUuid},
    ports::QueueRepository,
};
use chrono::{DateTime, TimeDelta, Utc};
use mockable::Clock;
use std::sync::Arc;
use tracing::{info, warn};

/// Recovery coordinator operations.
///
/// The caller supplies liveness information; this service only applies it.
#[derive(Clone)]
pub struct RecoveryService<R, C>
where
    R: QueueRepository,
    C: Clock + Send + Sync,
{
    repository: Arc<R>,
    clock: Arc<C>,
}

impl<R, C> RecoveryService<R, C>
where
    R: QueueRepository,
    C: Clock + Send + Sync,
{
    /// Creates a new recovery service.
    #[must_use]
    pub const fn new(repository: Arc<R>, clock: Arc<C>) -> Self {
        Self { repository, clock }
    }

    /// Returns every in-progress task whose worker is not in
    /// `alive_workers` to the pending pool. An empty list resets all
    /// in-progress tasks.
    ///
    /// # Errors
    ///
    /// Returns [`super::QueueServiceError::Repository`] when the store
    /// fails.
    pub async fn reset_tasks_with_unknown_workers(
        &self,
        alive_workers: &[WorkerUuid],
    ) -> QueueServiceResult<u64> {
        let now = self.clock.utc();
        let reset = self
            .repository
            .reset_tasks_with_unknown_worker_uuids(alive_workers, now)
            .await?;
        info!(
            count = reset,
            alive_workers = alive_workers.len(),
            "reset tasks of unknown workers"
        );
        Ok(reset)
    }

    /// Forces a single task back to pending. Returns `false` when the task
    /// does not exist.
    ///
    /// # Errors
    ///
    /// Returns [`super::QueueServiceError::Repository`] when the store
    /// fails.
    pub async fn reset_task(&self, task_uuid: &TaskUuid) -> QueueServiceResult<bool> {
        let now = self.clock.utc();
        let reset = self
            .repository
            .reset_to_pending_by_uuid(task_uuid, now)
            .await?;
        if reset > 0 {
            info!(task_uuid = %task_uuid, "task reset to pending");
        }
        Ok(reset > 0)
    }

    /// Lists in-progress tasks started strictly more than `max_age` ago.
    ///
    /// # Errors
    ///
    /// Returns [`super::QueueServiceError::Repository`] when the store
    /// fails.
    pub async fn stuck_tasks(&self, max_age: TimeDelta) -> QueueServiceResult<Vec<QueueTask>> {
        let cutoff = threshold(self.clock.utc(), max_age);
        let stuck = self
            .repository
            .select_in_progress_started_before(cutoff)
            .await?;
        for task in &stuck {
            warn!(
                task_uuid = %task.uuid(),
                worker_uuid = task.worker_uuid().map(WorkerUuid::as_str),
                started_at = ?task.started_at(),
                "task stuck in progress"
            );
        }
        Ok(stuck)
    }

    /// Resets every task [`Self::stuck_tasks`] would report at the time of
    /// the write. A task reclaimed since it was last seen stuck carries a
    /// fresh start and stays with its new worker. Returns the number of
    /// tasks reset.
    ///
    /// # Errors
    ///
    /// Returns [`super::QueueServiceError::Repository`] when the store
    /// fails.
    pub async fn reset_stuck_tasks(&self, max_age: TimeDelta) -> QueueServiceResult<u64> {
        let now = self.clock.utc();
        let reset = self
            .repository
            .reset_in_progress_started_before(threshold(now, max_age), now)
            .await?;
        info!(count = reset, "reset stuck tasks");
        Ok(reset)
    }

    /// Lists pending tasks that were claimed before and handed back.
    ///
    /// # Errors
    ///
    /// Returns [`super::QueueServiceError::Repository`] when the store
    /// fails.
    pub async fn worn_out_tasks(&self) -> QueueServiceResult<Vec<QueueTask>> {
        Ok(self.repository.select_wornout().await?)
    }
}

fn threshold(now: DateTime<Utc>, max_age: TimeDelta) -> DateTime<Utc> {
    now.checked_sub_signed(max_age)
        .unwrap_or(DateTime::<Utc>::MIN_UTC)
}
