//! Port contracts for the analysis task queue.
//!
//! Ports define infrastructure-agnostic interfaces used by queue services.

pub mod repository;

pub use repository::{ClaimOutcome, QueueRepository, QueueRepositoryError, QueueRepositoryResult};
