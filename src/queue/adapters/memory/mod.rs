//! In-memory adapters for the analysis task queue.

mod queue;

pub use queue::InMemoryQueueRepository;
