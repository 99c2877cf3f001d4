//! In-memory repository for the analysis task queue.
//!
//! Every operation runs under a single lock acquisition, which gives claims
//! and guarded deletes the same all-or-nothing behaviour as the conditional
//! statements of the `PostgreSQL` adapter.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::queue::{
    domain::{
        EntityUuid, PR_OR_BRANCH_BATCH_SIZE, PrOrBranchTask, QueueTask, TaskCharacteristic,
        TaskQuery, TaskStatus, TaskUuid, WorkerUuid, ensure_owned_by,
    },
    ports::{ClaimOutcome, QueueRepository, QueueRepositoryError, QueueRepositoryResult},
};

/// Thread-safe in-memory queue repository.
#[derive(Debug, Clone, Default)]
pub struct InMemoryQueueRepository {
    state: Arc<RwLock<InMemoryQueueState>>,
}

#[derive(Debug, Default)]
struct InMemoryQueueState {
    tasks: HashMap<TaskUuid, QueueTask>,
    characteristics: HashMap<TaskUuid, Vec<TaskCharacteristic>>,
}

impl InMemoryQueueState {
    fn tasks_where(&self, predicate: impl Fn(&QueueTask) -> bool) -> Vec<QueueTask> {
        self.tasks
            .values()
            .filter(|task| predicate(task))
            .cloned()
            .collect()
    }

    fn enrich(&self, task: &QueueTask) -> PrOrBranchTask {
        let characteristics = self
            .characteristics
            .get(task.uuid())
            .map(Vec::as_slice)
            .unwrap_or_default();
        PrOrBranchTask::from_task(task, characteristics)
    }

    fn reset_where(&mut self, now: DateTime<Utc>, predicate: impl Fn(&QueueTask) -> bool) -> u64 {
        let mut reset = 0;
        for task in self.tasks.values_mut() {
            if task.status() == TaskStatus::InProgress && predicate(task) {
                task.reset_to_pending(now);
                reset += 1;
            }
        }
        reset
    }

    fn remove(&mut self, uuid: &TaskUuid) -> u64 {
        self.characteristics.remove(uuid);
        u64::from(self.tasks.remove(uuid).is_some())
    }
}

impl InMemoryQueueRepository {
    /// Creates an empty in-memory repository.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> QueueRepositoryResult<RwLockReadGuard<'_, InMemoryQueueState>> {
        self.state.read().map_err(|err| {
            QueueRepositoryError::persistence(std::io::Error::other(err.to_string()))
        })
    }

    fn write(&self) -> QueueRepositoryResult<RwLockWriteGuard<'_, InMemoryQueueState>> {
        self.state.write().map_err(|err| {
            QueueRepositoryError::persistence(std::io::Error::other(err.to_string()))
        })
    }
}

fn sort_ascending(tasks: &mut [QueueTask]) {
    tasks.sort_by(|left, right| {
        left.created_at()
            .cmp(&right.created_at())
            .then_with(|| left.uuid().cmp(right.uuid()))
    });
}

fn count(len: usize) -> u64 {
    u64::try_from(len).unwrap_or(u64::MAX)
}

#[async_trait]
impl QueueRepository for InMemoryQueueRepository {
    async fn insert(
        &self,
        task: &QueueTask,
        characteristics: &[TaskCharacteristic],
    ) -> QueueRepositoryResult<()> {
        ensure_owned_by(task.uuid(), characteristics)?;
        let mut state = self.write()?;
        if state.tasks.contains_key(task.uuid()) {
            return Err(QueueRepositoryError::DuplicateTask(task.uuid().clone()));
        }
        state.tasks.insert(task.uuid().clone(), task.clone());
        if !characteristics.is_empty() {
            state
                .characteristics
                .entry(task.uuid().clone())
                .or_default()
                .extend_from_slice(characteristics);
        }
        Ok(())
    }

    async fn select_by_uuid(&self, uuid: &TaskUuid) -> QueueRepositoryResult<Option<QueueTask>> {
        let state = self.read()?;
        Ok(state.tasks.get(uuid).cloned())
    }

    async fn select_characteristics(
        &self,
        task_uuid: &TaskUuid,
    ) -> QueueRepositoryResult<Vec<TaskCharacteristic>> {
        let state = self.read()?;
        Ok(state
            .characteristics
            .get(task_uuid)
            .cloned()
            .unwrap_or_default())
    }

    async fn claim(
        &self,
        uuid: &TaskUuid,
        worker_uuid: &WorkerUuid,
        now: DateTime<Utc>,
    ) -> QueueRepositoryResult<ClaimOutcome> {
        let mut state = self.write()?;
        let Some(task) = state.tasks.get_mut(uuid) else {
            return Ok(ClaimOutcome::NotFound);
        };
        if task.claim(worker_uuid.clone(), now) {
            Ok(ClaimOutcome::Claimed(task.clone()))
        } else {
            Ok(ClaimOutcome::Conflict)
        }
    }

    async fn select_not_pending_for_worker(
        &self,
        worker_uuid: &WorkerUuid,
    ) -> QueueRepositoryResult<Vec<QueueTask>> {
        let state = self.read()?;
        Ok(state.tasks_where(|task| {
            task.status() == TaskStatus::InProgress && task.worker_uuid() == Some(worker_uuid)
        }))
    }

    async fn reset_to_pending_by_uuid(
        &self,
        uuid: &TaskUuid,
        now: DateTime<Utc>,
    ) -> QueueRepositoryResult<u64> {
        let mut state = self.write()?;
        let Some(task) = state.tasks.get_mut(uuid) else {
            return Ok(0);
        };
        task.reset_to_pending(now);
        Ok(1)
    }

    async fn reset_in_progress_for_worker(
        &self,
        worker_uuid: &WorkerUuid,
        now: DateTime<Utc>,
    ) -> QueueRepositoryResult<u64> {
        let mut state = self.write()?;
        Ok(state.reset_where(now, |task| task.worker_uuid() == Some(worker_uuid)))
    }

    async fn reset_tasks_with_unknown_worker_uuids(
        &self,
        alive_workers: &[WorkerUuid],
        now: DateTime<Utc>,
    ) -> QueueRepositoryResult<u64> {
        let mut state = self.write()?;
        Ok(state.reset_where(now, |task| {
            task.worker_uuid()
                .is_none_or(|worker| !alive_workers.contains(worker))
        }))
    }

    async fn select_in_progress_started_before(
        &self,
        threshold: DateTime<Utc>,
    ) -> QueueRepositoryResult<Vec<QueueTask>> {
        let state = self.read()?;
        Ok(state.tasks_where(|task| {
            task.status() == TaskStatus::InProgress
                && task.started_at().is_some_and(|started| started < threshold)
        }))
    }

    async fn reset_in_progress_started_before(
        &self,
        threshold: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> QueueRepositoryResult<u64> {
        let mut state = self.write()?;
        Ok(state.reset_where(now, |task| {
            task.started_at().is_some_and(|started| started < threshold)
        }))
    }

    async fn select_wornout(&self) -> QueueRepositoryResult<Vec<QueueTask>> {
        let state = self.read()?;
        Ok(state.tasks_where(QueueTask::is_worn_out))
    }

    async fn select_pending(&self) -> QueueRepositoryResult<Vec<QueueTask>> {
        let state = self.read()?;
        Ok(state.tasks_where(|task| task.status() == TaskStatus::Pending))
    }

    async fn select_oldest_pending_pr_or_branch(
        &self,
    ) -> QueueRepositoryResult<Vec<PrOrBranchTask>> {
        let state = self.read()?;
        let mut candidates = state.tasks_where(|task| {
            task.status() == TaskStatus::Pending && task.task_type().is_report()
        });
        sort_ascending(&mut candidates);
        Ok(candidates
            .iter()
            .take(PR_OR_BRANCH_BATCH_SIZE)
            .map(|task| state.enrich(task))
            .collect())
    }

    async fn select_oldest_pending(
        &self,
        exclude_issue_sync: bool,
    ) -> QueueRepositoryResult<Vec<QueueTask>> {
        let state = self.read()?;
        let mut candidates = state.tasks_where(|task| {
            task.status() == TaskStatus::Pending
                && !(exclude_issue_sync && task.task_type().is_issue_sync())
        });
        sort_ascending(&mut candidates);
        candidates.truncate(PR_OR_BRANCH_BATCH_SIZE);
        Ok(candidates)
    }

    async fn select_in_progress_with_characteristics(
        &self,
    ) -> QueueRepositoryResult<Vec<PrOrBranchTask>> {
        let state = self.read()?;
        let mut in_progress = state.tasks_where(|task| task.status() == TaskStatus::InProgress);
        sort_ascending(&mut in_progress);
        Ok(in_progress.iter().map(|task| state.enrich(task)).collect())
    }

    async fn select_by_query_in_desc_order(
        &self,
        query: &TaskQuery,
        limit: usize,
    ) -> QueueRepositoryResult<Vec<QueueTask>> {
        let state = self.read()?;
        let mut matching = state.tasks_where(|task| query.matches(task));
        sort_ascending(&mut matching);
        matching.reverse();
        matching.truncate(limit);
        Ok(matching)
    }

    async fn count_by_query(&self, query: &TaskQuery) -> QueueRepositoryResult<u64> {
        let state = self.read()?;
        Ok(count(
            state.tasks.values().filter(|task| query.matches(task)).count(),
        ))
    }

    async fn select_by_entity_uuid(
        &self,
        entity_uuid: &EntityUuid,
    ) -> QueueRepositoryResult<Vec<QueueTask>> {
        let state = self.read()?;
        Ok(state.tasks_where(|task| task.entity_uuid() == Some(entity_uuid)))
    }

    async fn select_all_in_asc_order(&self) -> QueueRepositoryResult<Vec<QueueTask>> {
        let state = self.read()?;
        let mut all: Vec<QueueTask> = state.tasks.values().cloned().collect();
        sort_ascending(&mut all);
        Ok(all)
    }

    async fn count_by_status(&self, status: TaskStatus) -> QueueRepositoryResult<u64> {
        let state = self.read()?;
        Ok(count(
            state
                .tasks
                .values()
                .filter(|task| task.status() == status)
                .count(),
        ))
    }

    async fn count_by_status_and_entity_uuid(
        &self,
        status: TaskStatus,
        entity_uuid: &EntityUuid,
    ) -> QueueRepositoryResult<u64> {
        let state = self.read()?;
        Ok(count(
            state
                .tasks
                .values()
                .filter(|task| task.status() == status && task.entity_uuid() == Some(entity_uuid))
                .count(),
        ))
    }

    async fn count_by_status_and_entity_uuids(
        &self,
        status: TaskStatus,
        entity_uuids: &[EntityUuid],
    ) -> QueueRepositoryResult<HashMap<EntityUuid, u64>> {
        let state = self.read()?;
        let mut counts = HashMap::new();
        for task in state.tasks.values().filter(|task| task.status() == status) {
            if let Some(entity) = task.entity_uuid()
                && entity_uuids.contains(entity)
            {
                *counts.entry(entity.clone()).or_insert(0) += 1;
            }
        }
        Ok(counts)
    }

    async fn has_any_issue_sync_task_pending_or_in_progress(&self) -> QueueRepositoryResult<bool> {
        let state = self.read()?;
        Ok(state
            .tasks
            .values()
            .any(|task| task.task_type().is_issue_sync()))
    }

    async fn select_creation_date_of_oldest_pending_by_entity_uuid(
        &self,
        entity_uuid: Option<&EntityUuid>,
    ) -> QueueRepositoryResult<Option<DateTime<Utc>>> {
        let state = self.read()?;
        Ok(state
            .tasks
            .values()
            .filter(|task| task.status() == TaskStatus::Pending)
            .filter(|task| entity_uuid.is_none_or(|entity| task.entity_uuid() == Some(entity)))
            .map(QueueTask::created_at)
            .min())
    }

    async fn delete_by_uuid(&self, uuid: &TaskUuid) -> QueueRepositoryResult<u64> {
        let mut state = self.write()?;
        Ok(state.remove(uuid))
    }

    async fn delete_by_uuid_if(
        &self,
        uuid: &TaskUuid,
        expected_status: TaskStatus,
    ) -> QueueRepositoryResult<u64> {
        let mut state = self.write()?;
        let matches = state
            .tasks
            .get(uuid)
            .is_some_and(|task| task.status() == expected_status);
        if !matches {
            return Ok(0);
        }
        Ok(state.remove(uuid))
    }
}
