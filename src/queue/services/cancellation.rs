//! Removal of queued tasks on behalf of operators.

use super::{QueueServiceError, QueueServiceResult};
use crate::queue::{
    domain::{TaskStatus, TaskUuid},
    ports::QueueRepository,
};
use std::sync::Arc;
use tracing::info;

/// Cancels queued tasks.
///
/// Every delete is guarded on the status the task was observed in, so a task
/// claimed concurrently is never removed from under its worker.
#[derive(Clone)]
pub struct CancellationService<R>
where
    R: QueueRepository,
{
    repository: Arc<R>,
}

impl<R> CancellationService<R>
where
    R: QueueRepository,
{
    /// Creates a new cancellation service.
    #[must_use]
    pub const fn new(repository: Arc<R>) -> Self {
        Self { repository }
    }

    /// Cancels a pending task.
    ///
    /// # Errors
    ///
    /// Returns [`QueueServiceError::TaskInProgress`] when a worker already
    /// holds the task and [`QueueServiceError::NotInQueue`] when it is
    /// absent.
    pub async fn cancel(&self, task_uuid: &TaskUuid) -> QueueServiceResult<()> {
        let deleted = self
            .repository
            .delete_by_uuid_if(task_uuid, TaskStatus::Pending)
            .await?;
        if deleted > 0 {
            info!(task_uuid = %task_uuid, "task cancelled");
            return Ok(());
        }

        match self.repository.select_by_uuid(task_uuid).await? {
            Some(task) if task.status() == TaskStatus::InProgress => {
                Err(QueueServiceError::TaskInProgress(task_uuid.clone()))
            }
            _ => Err(QueueServiceError::NotInQueue(task_uuid.clone())),
        }
    }

    /// Cancels every pending task, and in-progress ones when
    /// `include_in_progress` is set. Returns the number of tasks removed.
    ///
    /// # Errors
    ///
    /// Returns [`QueueServiceError::Repository`] when the store fails.
    pub async fn cancel_all(&self, include_in_progress: bool) -> QueueServiceResult<u64> {
        let mut cancelled = 0;
        for task in self.repository.select_all_in_asc_order().await? {
            let status = task.status();
            if status == TaskStatus::InProgress && !include_in_progress {
                continue;
            }
            cancelled += self.repository.delete_by_uuid_if(task.uuid(), status).await?;
        }
        info!(count = cancelled, include_in_progress, "cancelled queued tasks");
        Ok(cancelled)
    }

    /// Cancels every worn-out task. Returns the number of tasks removed.
    ///
    /// # Errors
    ///
    /// Returns [`QueueServiceError::Repository`] when the store fails.
    pub async fn cancel_worn_outs(&self) -> QueueServiceResult<u64> {
        let mut cancelled = 0;
        for task in self.repository.select_wornout().await? {
            cancelled += self
                .repository
                .delete_by_uuid_if(task.uuid(), TaskStatus::Pending)
                .await?;
        }
        info!(count = cancelled, "cancelled worn-out tasks");
        Ok(cancelled)
    }
}
