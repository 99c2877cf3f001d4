//! Shared world state for queue recovery BDD scenarios.

use std::collections::HashMap;
use std::sync::Arc;

use analysis_queue::queue::{
    adapters::memory::InMemoryQueueRepository,
    domain::QueueTask,
    services::{QueueServiceError, RecoveryService, WorkerService},
};
use mockable::DefaultClock;
use rstest::fixture;

/// Scenario world for queue recovery behaviour tests.
pub struct QueueRecoveryWorld {
    pub repository: Arc<InMemoryQueueRepository>,
    pub workers: WorkerService<InMemoryQueueRepository, DefaultClock>,
    pub recovery: RecoveryService<InMemoryQueueRepository, DefaultClock>,
    /// Last peek result per worker identifier.
    pub claims: HashMap<String, Option<QueueTask>>,
    pub last_reset_count: Option<u64>,
    pub last_completion: Option<Result<(), QueueServiceError>>,
}

impl QueueRecoveryWorld {
    /// Creates a world over an empty queue.
    #[must_use]
    pub fn new() -> Self {
        let repository = Arc::new(InMemoryQueueRepository::new());
        let clock = Arc::new(DefaultClock);
        Self {
            workers: WorkerService::new(Arc::clone(&repository), Arc::clone(&clock)),
            recovery: RecoveryService::new(Arc::clone(&repository), clock),
            repository,
            claims: HashMap::new(),
            last_reset_count: None,
            last_completion: None,
        }
    }
}

impl Default for QueueRecoveryWorld {
    fn default() -> Self {
        Self::new()
    }
}

/// Fixture that creates a new scenario world.
#[fixture]
pub fn world() -> QueueRecoveryWorld {
    QueueRecoveryWorld::default()
}

/// Runs an async operation within sync step definitions.
pub fn run_async<T>(future: impl std::future::Future<Output = T>) -> T {
    tokio::task::block_in_place(|| tokio::runtime::Handle::current().block_on(future))
}
