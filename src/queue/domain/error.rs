//! Error types for queue domain validation and parsing.

use super::{CharacteristicUuid, TaskUuid};
use thiserror::Error;

/// Errors returned while constructing queue domain values.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum QueueDomainError {
    /// An identifier was empty after trimming.
    #[error("{kind} must not be empty")]
    EmptyIdentifier {
        /// Human-readable identifier kind.
        kind: &'static str,
    },

    /// An identifier exceeds its column width.
    #[error("{kind} '{value}' exceeds {max} characters")]
    IdentifierTooLong {
        /// Human-readable identifier kind.
        kind: &'static str,
        /// Rejected value.
        value: String,
        /// Maximum accepted length.
        max: usize,
    },

    /// The characteristic key is empty after trimming.
    #[error("characteristic key must not be empty")]
    EmptyCharacteristicKey,

    /// A task was described as in progress without an owning worker.
    #[error("task {0} is in progress but has no worker")]
    InProgressWithoutWorker(TaskUuid),

    /// A pending task was given an owning worker.
    #[error("task {0} is pending but names a worker")]
    PendingWithWorker(TaskUuid),

    /// An in-progress task was described without a start timestamp.
    #[error("task {0} is in progress but has no start timestamp")]
    InProgressWithoutStart(TaskUuid),

    /// A characteristic was attached to a task other than the one it names.
    #[error("characteristic {characteristic} belongs to task {owner}, not {task}")]
    CharacteristicTaskMismatch {
        /// Task being stored.
        task: TaskUuid,
        /// Offending characteristic.
        characteristic: CharacteristicUuid,
        /// Task named by the characteristic.
        owner: TaskUuid,
    },
}

/// Error returned while parsing task statuses from persistence.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("unknown task status: {0}")]
pub struct ParseTaskStatusError(pub String);
