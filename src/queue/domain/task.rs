//! Queued task aggregate and its status and type values.

use super::{
    ComponentUuid, EntityUuid, ParseTaskStatusError, QueueDomainError, SubmitterUuid, TaskUuid,
    WorkerUuid,
};
use chrono::{DateTime, Utc};
use mockable::Clock;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Width of the `task_type` column.
const MAX_TASK_TYPE_LENGTH: usize = 40;

/// Queue-local state of a task.
///
/// A task leaves the queue entirely once processed, so there is no terminal
/// state here.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TaskStatus {
    /// Waiting to be claimed by a worker.
    Pending,
    /// Claimed by exactly one worker.
    InProgress,
}

impl TaskStatus {
    /// Returns the canonical storage representation.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "PENDING",
            Self::InProgress => "IN_PROGRESS",
        }
    }
}

impl TryFrom<&str> for TaskStatus {
    type Error = ParseTaskStatusError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value.trim().to_ascii_uppercase().as_str() {
            "PENDING" => Ok(Self::Pending),
            "IN_PROGRESS" => Ok(Self::InProgress),
            _ => Err(ParseTaskStatusError(value.to_owned())),
        }
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Tag describing what kind of work a task represents.
///
/// Only [`TaskType::REPORT`] tasks take part in branch and pull request
/// prioritization; [`TaskType::ISSUE_SYNC`] is a maintenance type.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TaskType(String);

impl TaskType {
    /// Primary analysis of a submitted report.
    pub const REPORT: &'static str = "REPORT";

    /// Issue synchronization between branches.
    pub const ISSUE_SYNC: &'static str = "ISSUE_SYNC";

    /// Creates a validated task type.
    ///
    /// # Errors
    ///
    /// Returns [`QueueDomainError::EmptyIdentifier`] when the value is blank
    /// or [`QueueDomainError::IdentifierTooLong`] when it exceeds 40
    /// characters.
    pub fn new(value: impl Into<String>) -> Result<Self, QueueDomainError> {
        let raw = value.into();
        let normalized = raw.trim();
        if normalized.is_empty() {
            return Err(QueueDomainError::EmptyIdentifier { kind: "task type" });
        }
        if normalized.chars().count() > MAX_TASK_TYPE_LENGTH {
            return Err(QueueDomainError::IdentifierTooLong {
                kind: "task type",
                value: raw,
                max: MAX_TASK_TYPE_LENGTH,
            });
        }
        Ok(Self(normalized.to_owned()))
    }

    /// The primary analysis task type.
    #[must_use]
    pub fn report() -> Self {
        Self(Self::REPORT.to_owned())
    }

    /// The issue synchronization task type.
    #[must_use]
    pub fn issue_sync() -> Self {
        Self(Self::ISSUE_SYNC.to_owned())
    }

    /// Returns the task type as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns `true` for the primary analysis type.
    #[must_use]
    pub fn is_report(&self) -> bool {
        self.0 == Self::REPORT
    }

    /// Returns `true` for the issue synchronization type.
    #[must_use]
    pub fn is_issue_sync(&self) -> bool {
        self.0 == Self::ISSUE_SYNC
    }
}

impl fmt::Display for TaskType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A unit of queued analysis work.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueTask {
    uuid: TaskUuid,
    task_type: TaskType,
    status: TaskStatus,
    entity_uuid: Option<EntityUuid>,
    component_uuid: Option<ComponentUuid>,
    submitter_uuid: Option<SubmitterUuid>,
    worker_uuid: Option<WorkerUuid>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    started_at: Option<DateTime<Utc>>,
    part_count: u32,
}

/// Parameter object for reconstructing a persisted task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PersistedTaskData {
    /// Persisted task identifier.
    pub uuid: TaskUuid,
    /// Persisted task type.
    pub task_type: TaskType,
    /// Persisted queue status.
    pub status: TaskStatus,
    /// Persisted owning entity.
    pub entity_uuid: Option<EntityUuid>,
    /// Persisted component.
    pub component_uuid: Option<ComponentUuid>,
    /// Persisted submitter.
    pub submitter_uuid: Option<SubmitterUuid>,
    /// Persisted owning worker.
    pub worker_uuid: Option<WorkerUuid>,
    /// Persisted creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Persisted latest mutation timestamp.
    pub updated_at: DateTime<Utc>,
    /// Persisted first-claim timestamp.
    pub started_at: Option<DateTime<Utc>>,
    /// Persisted part count.
    pub part_count: u32,
}

impl QueueTask {
    /// Reconstructs a task from persisted storage.
    #[must_use]
    pub fn from_persisted(data: PersistedTaskData) -> Self {
        Self {
            uuid: data.uuid,
            task_type: data.task_type,
            status: data.status,
            entity_uuid: data.entity_uuid,
            component_uuid: data.component_uuid,
            submitter_uuid: data.submitter_uuid,
            worker_uuid: data.worker_uuid,
            created_at: data.created_at,
            updated_at: data.updated_at,
            started_at: data.started_at,
            part_count: data.part_count,
        }
    }

    /// Returns the task identifier.
    #[must_use]
    pub const fn uuid(&self) -> &TaskUuid {
        &self.uuid
    }

    /// Returns the task type.
    #[must_use]
    pub const fn task_type(&self) -> &TaskType {
        &self.task_type
    }

    /// Returns the queue status.
    #[must_use]
    pub const fn status(&self) -> TaskStatus {
        self.status
    }

    /// Returns the owning entity, if any.
    #[must_use]
    pub const fn entity_uuid(&self) -> Option<&EntityUuid> {
        self.entity_uuid.as_ref()
    }

    /// Returns the component, if any.
    #[must_use]
    pub const fn component_uuid(&self) -> Option<&ComponentUuid> {
        self.component_uuid.as_ref()
    }

    /// Returns the submitter, if any.
    #[must_use]
    pub const fn submitter_uuid(&self) -> Option<&SubmitterUuid> {
        self.submitter_uuid.as_ref()
    }

    /// Returns the worker holding the claim, if any.
    #[must_use]
    pub const fn worker_uuid(&self) -> Option<&WorkerUuid> {
        self.worker_uuid.as_ref()
    }

    /// Returns the creation timestamp.
    #[must_use]
    pub const fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Returns the latest mutation timestamp.
    #[must_use]
    pub const fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    /// Returns the first-claim timestamp, if the task was ever claimed.
    #[must_use]
    pub const fn started_at(&self) -> Option<DateTime<Utc>> {
        self.started_at
    }

    /// Returns the number of logical parts the job comprises.
    #[must_use]
    pub const fn part_count(&self) -> u32 {
        self.part_count
    }

    /// Returns `true` when the task was claimed and later handed back.
    #[must_use]
    pub const fn is_worn_out(&self) -> bool {
        matches!(self.status, TaskStatus::Pending) && self.started_at.is_some()
    }

    /// Moves a pending task into the claimed state.
    ///
    /// Returns `false` and leaves the task untouched when it is not pending.
    pub(crate) fn claim(&mut self, worker_uuid: WorkerUuid, now: DateTime<Utc>) -> bool {
        if self.status != TaskStatus::Pending {
            return false;
        }
        self.status = TaskStatus::InProgress;
        self.worker_uuid = Some(worker_uuid);
        self.started_at = Some(now);
        self.updated_at = now;
        true
    }

    /// Hands the task back to the queue, keeping its start timestamp.
    pub(crate) fn reset_to_pending(&mut self, now: DateTime<Utc>) {
        self.status = TaskStatus::Pending;
        self.worker_uuid = None;
        self.updated_at = now;
    }
}

/// Submission-side description of a task before it is stored.
///
/// Timestamps left unset are filled from a single clock observation when the
/// task is built; each one is defaulted independently of the other.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewQueueTask {
    uuid: TaskUuid,
    task_type: TaskType,
    status: TaskStatus,
    entity_uuid: Option<EntityUuid>,
    component_uuid: Option<ComponentUuid>,
    submitter_uuid: Option<SubmitterUuid>,
    worker_uuid: Option<WorkerUuid>,
    created_at: Option<DateTime<Utc>>,
    updated_at: Option<DateTime<Utc>>,
    started_at: Option<DateTime<Utc>>,
    part_count: u32,
}

impl NewQueueTask {
    /// Starts describing a pending task.
    #[must_use]
    pub const fn new(uuid: TaskUuid, task_type: TaskType) -> Self {
        Self {
            uuid,
            task_type,
            status: TaskStatus::Pending,
            entity_uuid: None,
            component_uuid: None,
            submitter_uuid: None,
            worker_uuid: None,
            created_at: None,
            updated_at: None,
            started_at: None,
            part_count: 0,
        }
    }

    /// Sets the owning entity.
    #[must_use]
    pub fn with_entity(mut self, entity_uuid: EntityUuid) -> Self {
        self.entity_uuid = Some(entity_uuid);
        self
    }

    /// Sets the component.
    #[must_use]
    pub fn with_component(mut self, component_uuid: ComponentUuid) -> Self {
        self.component_uuid = Some(component_uuid);
        self
    }

    /// Sets the submitter.
    #[must_use]
    pub fn with_submitter(mut self, submitter_uuid: SubmitterUuid) -> Self {
        self.submitter_uuid = Some(submitter_uuid);
        self
    }

    /// Sets the part count.
    #[must_use]
    pub const fn with_part_count(mut self, part_count: u32) -> Self {
        self.part_count = part_count;
        self
    }

    /// Supplies an explicit creation timestamp.
    #[must_use]
    pub const fn with_created_at(mut self, created_at: DateTime<Utc>) -> Self {
        self.created_at = Some(created_at);
        self
    }

    /// Supplies an explicit update timestamp.
    #[must_use]
    pub const fn with_updated_at(mut self, updated_at: DateTime<Utc>) -> Self {
        self.updated_at = Some(updated_at);
        self
    }

    /// Describes a task already claimed by `worker_uuid` at `started_at`.
    #[must_use]
    pub fn in_progress(mut self, worker_uuid: WorkerUuid, started_at: DateTime<Utc>) -> Self {
        self.status = TaskStatus::InProgress;
        self.worker_uuid = Some(worker_uuid);
        self.started_at = Some(started_at);
        self
    }

    /// Returns the identifier the task will be stored under.
    #[must_use]
    pub const fn uuid(&self) -> &TaskUuid {
        &self.uuid
    }

    /// Builds the task, reading `clock` at most once.
    ///
    /// # Errors
    ///
    /// Returns a [`QueueDomainError`] when status, worker and start timestamp
    /// disagree.
    pub fn into_task(self, clock: &impl Clock) -> Result<QueueTask, QueueDomainError> {
        match (self.status, self.worker_uuid.is_some()) {
            (TaskStatus::Pending, true) => {
                return Err(QueueDomainError::PendingWithWorker(self.uuid));
            }
            (TaskStatus::InProgress, false) => {
                return Err(QueueDomainError::InProgressWithoutWorker(self.uuid));
            }
            _ => {}
        }
        if self.status == TaskStatus::InProgress && self.started_at.is_none() {
            return Err(QueueDomainError::InProgressWithoutStart(self.uuid));
        }

        let (created_at, updated_at) = match (self.created_at, self.updated_at) {
            (Some(created_at), Some(updated_at)) => (created_at, updated_at),
            (created_at, updated_at) => {
                let now = clock.utc();
                (created_at.unwrap_or(now), updated_at.unwrap_or(now))
            }
        };

        Ok(QueueTask {
            uuid: self.uuid,
            task_type: self.task_type,
            status: self.status,
            entity_uuid: self.entity_uuid,
            component_uuid: self.component_uuid,
            submitter_uuid: self.submitter_uuid,
            worker_uuid: self.worker_uuid,
            created_at,
            updated_at,
            started_at: self.started_at,
            part_count: self.part_count,
        })
    }
}
