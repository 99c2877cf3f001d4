//! Service layer for enqueuing analysis tasks.

use super::QueueServiceResult;
use crate::queue::{
    domain::{
        ComponentUuid, EntityUuid, NewQueueTask, QueueTask, SubmitterUuid, TaskCharacteristic,
        TaskType, TaskUuid,
    },
    ports::QueueRepository,
};
use mockable::Clock;
use std::sync::Arc;
use tracing::info;

/// Request payload for enqueuing a task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubmitTaskRequest {
    uuid: Option<TaskUuid>,
    task_type: TaskType,
    entity_uuid: Option<EntityUuid>,
    component_uuid: Option<ComponentUuid>,
    submitter_uuid: Option<SubmitterUuid>,
    part_count: u32,
    characteristics: Vec<(String, String)>,
}

impl SubmitTaskRequest {
    /// Creates a request for a task of `task_type`.
    #[must_use]
    pub const fn new(task_type: TaskType) -> Self {
        Self {
            uuid: None,
            task_type,
            entity_uuid: None,
            component_uuid: None,
            submitter_uuid: None,
            part_count: 0,
            characteristics: Vec::new(),
        }
    }

    /// Uses a caller-assigned identifier instead of a generated one.
    #[must_use]
    pub fn with_uuid(mut self, uuid: TaskUuid) -> Self {
        self.uuid = Some(uuid);
        self
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

    /// Adds a characteristic. Keys may repeat.
    #[must_use]
    pub fn with_characteristic(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.characteristics.push((key.into(), value.into()));
        self
    }
}

/// Enqueues tasks on behalf of submitters.
#[derive(Clone)]
pub struct SubmissionService<R, C>
where
    R: QueueRepository,
    C: Clock + Send + Sync,
{
    repository: Arc<R>,
    clock: Arc<C>,
}

impl<R, C> SubmissionService<R, C>
where
    R: QueueRepository,
    C: Clock + Send + Sync,
{
    /// Creates a new submission service.
    #[must_use]
    pub const fn new(repository: Arc<R>, clock: Arc<C>) -> Self {
        Self { repository, clock }
    }

    /// Enqueues a single pending task with its characteristics.
    ///
    /// # Errors
    ///
    /// Returns [`super::QueueServiceError::Domain`] when a characteristic is
    /// invalid and [`super::QueueServiceError::Repository`] when the task
    /// cannot be stored, including a duplicate identifier.
    pub async fn submit(&self, request: SubmitTaskRequest) -> QueueServiceResult<QueueTask> {
        let SubmitTaskRequest {
            uuid,
            task_type,
            entity_uuid,
            component_uuid,
            submitter_uuid,
            part_count,
            characteristics,
        } = request;

        let task_uuid = uuid.unwrap_or_else(TaskUuid::generate);
        let mut new_task =
            NewQueueTask::new(task_uuid.clone(), task_type).with_part_count(part_count);
        if let Some(owner) = entity_uuid {
            new_task = new_task.with_entity(owner);
        }
        if let Some(component) = component_uuid {
            new_task = new_task.with_component(component);
        }
        if let Some(submitter) = submitter_uuid {
            new_task = new_task.with_submitter(submitter);
        }

        let tags = characteristics
            .into_iter()
            .map(|(key, value)| TaskCharacteristic::new(task_uuid.clone(), key, value))
            .collect::<Result<Vec<_>, _>>()?;

        let task = new_task.into_task(&*self.clock)?;
        self.repository.insert(&task, &tags).await?;
        info!(
            task_uuid = %task.uuid(),
            task_type = %task.task_type(),
            "task submitted"
        );
        Ok(task)
    }

    /// Enqueues several tasks in order.
    ///
    /// Stops at the first failure; tasks submitted before it stay queued.
    ///
    /// # Errors
    ///
    /// Same as [`Self::submit`].
    pub async fn mass_submit(
        &self,
        requests: Vec<SubmitTaskRequest>,
    ) -> QueueServiceResult<Vec<QueueTask>> {
        let mut submitted = Vec::with_capacity(requests.len());
        for request in requests {
            submitted.push(self.submit(request).await?);
        }
        Ok(submitted)
    }
}
