//! Worker-side queue access: claiming and completing tasks.

use super::{QueueServiceError, QueueServiceResult};
use crate::queue::{
    domain::{QueueTask, TaskStatus, TaskUuid, WorkerUuid},
    ports::{ClaimOutcome, QueueRepository},
};
use chrono::{DateTime, Utc};
use mockable::Clock;
use std::collections::HashSet;
use std::sync::{
    Arc,
    atomic::{AtomicBool, Ordering},
};
use tracing::{debug, info};

/// Claim loop used by worker processes.
///
/// Pausing is local to this process: it stops `peek` from handing out work
/// but leaves tasks already claimed untouched.
#[derive(Clone)]
pub struct WorkerService<R, C>
where
    R: QueueRepository,
    C: Clock + Send + Sync,
{
    repository: Arc<R>,
    clock: Arc<C>,
    paused: Arc<AtomicBool>,
}

impl<R, C> WorkerService<R, C>
where
    R: QueueRepository,
    C: Clock + Send + Sync,
{
    /// Creates a new, unpaused worker service.
    #[must_use]
    pub fn new(repository: Arc<R>, clock: Arc<C>) -> Self {
        Self {
            repository,
            clock,
            paused: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Claims the next task for `worker_uuid`.
    ///
    /// Any task `worker_uuid` still holds is handed back first, so a
    /// restarted worker never keeps stale claims. Report tasks come from the
    /// prioritized pending selection; when none can be claimed the oldest
    /// pending task of any type is tried, leaving issue synchronization
    /// tasks alone when `exclude_issue_sync` is set. A candidate lost to
    /// another worker is skipped.
    ///
    /// Returns `Ok(None)` when workers are paused or nothing is claimable.
    ///
    /// # Errors
    ///
    /// Returns [`QueueServiceError::Repository`] when the store fails.
    pub async fn peek(
        &self,
        worker_uuid: &WorkerUuid,
        exclude_issue_sync: bool,
    ) -> QueueServiceResult<Option<QueueTask>> {
        if self.is_paused() {
            debug!(worker_uuid = %worker_uuid, "workers paused, nothing claimed");
            return Ok(None);
        }

        let now = self.clock.utc();
        let released = self
            .repository
            .reset_in_progress_for_worker(worker_uuid, now)
            .await?;
        if released > 0 {
            info!(
                worker_uuid = %worker_uuid,
                count = released,
                "reset tasks still claimed by worker"
            );
        }

        let mut tried = HashSet::new();
        let reports = self.repository.select_oldest_pending_pr_or_branch().await?;
        for candidate in reports {
            if let Some(task) = self
                .try_claim(&candidate.task_uuid, worker_uuid, now)
                .await?
            {
                debug!(
                    task_uuid = %task.uuid(),
                    worker_uuid = %worker_uuid,
                    branch_type = candidate.branch_type.as_str(),
                    "report task claimed"
                );
                return Ok(Some(task));
            }
            tried.insert(candidate.task_uuid);
        }

        let others = self
            .repository
            .select_oldest_pending(exclude_issue_sync)
            .await?;
        for candidate in others.iter().filter(|task| !tried.contains(task.uuid())) {
            if let Some(task) = self.try_claim(candidate.uuid(), worker_uuid, now).await? {
                debug!(
                    task_uuid = %task.uuid(),
                    worker_uuid = %worker_uuid,
                    task_type = task.task_type().as_str(),
                    "task claimed"
                );
                return Ok(Some(task));
            }
        }
        Ok(None)
    }

    async fn try_claim(
        &self,
        task_uuid: &TaskUuid,
        worker_uuid: &WorkerUuid,
        now: DateTime<Utc>,
    ) -> QueueServiceResult<Option<QueueTask>> {
        let outcome = self.repository.claim(task_uuid, worker_uuid, now).await?;
        if matches!(outcome, ClaimOutcome::Conflict | ClaimOutcome::NotFound) {
            debug!(
                task_uuid = %task_uuid,
                worker_uuid = %worker_uuid,
                "candidate taken by another worker"
            );
        }
        Ok(outcome.into_claimed())
    }

    /// Removes a finished task from the queue.
    ///
    /// # Errors
    ///
    /// Returns [`QueueServiceError::NotInQueue`] when the task is no longer
    /// in progress, for instance because a recovery sweep handed it back.
    pub async fn complete(&self, task_uuid: &TaskUuid) -> QueueServiceResult<()> {
        let deleted = self
            .repository
            .delete_by_uuid_if(task_uuid, TaskStatus::InProgress)
            .await?;
        if deleted == 0 {
            return Err(QueueServiceError::NotInQueue(task_uuid.clone()));
        }
        debug!(task_uuid = %task_uuid, "task completed");
        Ok(())
    }

    /// Stops handing out work from this process.
    pub fn pause_workers(&self) {
        self.paused.store(true, Ordering::SeqCst);
        info!("workers paused");
    }

    /// Resumes handing out work from this process.
    pub fn resume_workers(&self) {
        self.paused.store(false, Ordering::SeqCst);
        info!("workers resumed");
    }

    /// Returns `true` while workers are paused.
    #[must_use]
    pub fn is_paused(&self) -> bool {
        self.paused.load(Ordering::SeqCst)
    }
}
