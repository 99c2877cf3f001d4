//! Read models used by the selection engine.

use super::{
    ComponentUuid, EntityUuid, QueueTask, TaskCharacteristic, TaskStatus, TaskType, TaskUuid,
    keys,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Maximum number of rows returned by branch/pull request prioritization.
pub const PR_OR_BRANCH_BATCH_SIZE: usize = 100;

/// Whether a task analyses a branch or a pull request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BranchType {
    /// Long-lived or short-lived branch analysis.
    Branch,
    /// Pull request analysis.
    PullRequest,
}

impl BranchType {
    /// Returns the canonical representation.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Branch => "BRANCH",
            Self::PullRequest => "PULL_REQUEST",
        }
    }
}

/// Task row enriched with its branch or pull request characteristic.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrOrBranchTask {
    /// Queued task identifier.
    pub task_uuid: TaskUuid,
    /// Owning entity, if any.
    pub entity_uuid: Option<EntityUuid>,
    /// Component, falling back to the entity when the task has none.
    pub component_uuid: Option<ComponentUuid>,
    /// Task type.
    pub task_type: TaskType,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Branch or pull request, `Branch` when no characteristic says otherwise.
    pub branch_type: BranchType,
    /// Branch name or pull request identifier from the characteristic.
    pub branch_reference: Option<String>,
}

impl PrOrBranchTask {
    /// Enriches `task` with the branch characteristic found among
    /// `characteristics`.
    #[must_use]
    pub fn from_task<'a, I>(task: &QueueTask, characteristics: I) -> Self
    where
        I: IntoIterator<Item = &'a TaskCharacteristic>,
    {
        let (branch_type, branch_reference) = branch_characteristic(characteristics);
        let component_uuid = task
            .component_uuid()
            .cloned()
            .or_else(|| task.entity_uuid().map(ComponentUuid::from));
        Self {
            task_uuid: task.uuid().clone(),
            entity_uuid: task.entity_uuid().cloned(),
            component_uuid,
            task_type: task.task_type().clone(),
            created_at: task.created_at(),
            branch_type,
            branch_reference,
        }
    }
}

/// Picks the characteristic describing a task's branch.
///
/// A pull request characteristic wins over a branch characteristic; any other
/// key is ignored.
#[must_use]
pub fn branch_characteristic<'a, I>(characteristics: I) -> (BranchType, Option<String>)
where
    I: IntoIterator<Item = &'a TaskCharacteristic>,
{
    let mut branch = None;
    for characteristic in characteristics {
        match characteristic.key() {
            keys::PULL_REQUEST => {
                return (
                    BranchType::PullRequest,
                    Some(characteristic.value().to_owned()),
                );
            }
            keys::BRANCH if branch.is_none() => {
                branch = Some(characteristic.value().to_owned());
            }
            _ => {}
        }
    }
    (BranchType::Branch, branch)
}

/// Filter for operator searches over the queue.
///
/// Unset fields do not constrain the result.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TaskQuery {
    entity_uuids: Option<Vec<EntityUuid>>,
    statuses: Option<Vec<TaskStatus>>,
    task_type: Option<TaskType>,
    min_submitted_at: Option<DateTime<Utc>>,
    max_executed_at: Option<DateTime<Utc>>,
    only_current: bool,
}

impl TaskQuery {
    /// Creates an unconstrained query.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Restricts results to the given entities. An empty list matches
    /// nothing.
    #[must_use]
    pub fn with_entity_uuids(mut self, entity_uuids: impl IntoIterator<Item = EntityUuid>) -> Self {
        self.entity_uuids = Some(entity_uuids.into_iter().collect());
        self
    }

    /// Restricts results to the given statuses. An empty list is ignored.
    #[must_use]
    pub fn with_statuses(mut self, statuses: impl IntoIterator<Item = TaskStatus>) -> Self {
        self.statuses = Some(statuses.into_iter().collect());
        self
    }

    /// Restricts results to one task type.
    #[must_use]
    pub fn with_task_type(mut self, task_type: TaskType) -> Self {
        self.task_type = Some(task_type);
        self
    }

    /// Keeps tasks created at or after `min_submitted_at`.
    #[must_use]
    pub const fn with_min_submitted_at(mut self, min_submitted_at: DateTime<Utc>) -> Self {
        self.min_submitted_at = Some(min_submitted_at);
        self
    }

    /// Keeps tasks started at or before `max_executed_at`. Tasks never
    /// started do not match.
    #[must_use]
    pub const fn with_max_executed_at(mut self, max_executed_at: DateTime<Utc>) -> Self {
        self.max_executed_at = Some(max_executed_at);
        self
    }

    /// Keeps only the latest finished analysis of each component.
    ///
    /// Queued tasks are by definition unfinished, so a query with this flag
    /// set never matches anything in the queue.
    #[must_use]
    pub const fn with_only_current(mut self, only_current: bool) -> Self {
        self.only_current = only_current;
        self
    }

    /// Returns the entity restriction.
    #[must_use]
    pub fn entity_uuids(&self) -> Option<&[EntityUuid]> {
        self.entity_uuids.as_deref()
    }

    /// Returns the status restriction, treating an empty list as none.
    #[must_use]
    pub fn statuses(&self) -> Option<&[TaskStatus]> {
        self.statuses.as_deref().filter(|statuses| !statuses.is_empty())
    }

    /// Returns the task type restriction.
    #[must_use]
    pub const fn task_type(&self) -> Option<&TaskType> {
        self.task_type.as_ref()
    }

    /// Returns the lower creation bound.
    #[must_use]
    pub const fn min_submitted_at(&self) -> Option<DateTime<Utc>> {
        self.min_submitted_at
    }

    /// Returns the upper start bound.
    #[must_use]
    pub const fn max_executed_at(&self) -> Option<DateTime<Utc>> {
        self.max_executed_at
    }

    /// Returns the only-current flag.
    #[must_use]
    pub const fn only_current(&self) -> bool {
        self.only_current
    }

    /// Returns `true` when the query cannot match any queued task.
    #[must_use]
    pub fn matches_nothing(&self) -> bool {
        self.only_current || self.entity_uuids.as_ref().is_some_and(Vec::is_empty)
    }

    /// Evaluates the filter against a single task.
    #[must_use]
    pub fn matches(&self, task: &QueueTask) -> bool {
        if self.matches_nothing() {
            return false;
        }
        let entity_ok = self.entity_uuids().is_none_or(|entities| {
            task.entity_uuid()
                .is_some_and(|entity| entities.contains(entity))
        });
        let status_ok = self
            .statuses()
            .is_none_or(|statuses| statuses.contains(&task.status()));
        let type_ok = self
            .task_type()
            .is_none_or(|task_type| task.task_type() == task_type);
        let submitted_ok = self
            .min_submitted_at
            .is_none_or(|min| task.created_at() >= min);
        let executed_ok = self.max_executed_at.is_none_or(|max| {
            task.started_at()
                .is_some_and(|started_at| started_at <= max)
        });
        entity_ok && status_ok && type_ok && submitted_ok && executed_ok
    }
}
