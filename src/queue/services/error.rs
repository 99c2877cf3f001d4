//! Errors shared by the queue services.

use crate::queue::{
    domain::{QueueDomainError, TaskUuid},
    ports::QueueRepositoryError,
};
use thiserror::Error;

/// Service-level errors for queue operations.
#[derive(Debug, Error)]
pub enum QueueServiceError {
    /// Domain validation failed.
    #[error(transparent)]
    Domain(#[from] QueueDomainError),
    /// Repository operation failed.
    #[error(transparent)]
    Repository(#[from] QueueRepositoryError),
    /// The task is not (or no longer) in the queue in the expected state.
    #[error("task {0} is not in the queue")]
    NotInQueue(TaskUuid),
    /// The task is already being processed and cannot be cancelled.
    #[error("task {0} is in progress and cannot be cancelled")]
    TaskInProgress(TaskUuid),
}

/// Result type for queue service operations.
pub type QueueServiceResult<T> = Result<T, QueueServiceError>;
