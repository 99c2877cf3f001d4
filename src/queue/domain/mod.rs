//! Domain model for the analysis task queue.
//!
//! Tasks, their characteristics and the read models produced by the
//! selection engine. No infrastructure concerns cross this boundary.

mod characteristic;
mod error;
mod ids;
mod selection;
mod task;

pub use characteristic::{TaskCharacteristic, ensure_owned_by, keys};
pub use error::{ParseTaskStatusError, QueueDomainError};
pub use ids::{
    CharacteristicUuid, ComponentUuid, EntityUuid, SubmitterUuid, TaskUuid, WorkerUuid,
};
pub use selection::{
    BranchType, PR_OR_BRANCH_BATCH_SIZE, PrOrBranchTask, TaskQuery, branch_characteristic,
};
pub use task::{NewQueueTask, PersistedTaskData, QueueTask, TaskStatus, TaskType};
