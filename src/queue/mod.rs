//! Persistent analysis task queue.
//!
//! Submitters enqueue tasks, workers claim them exclusively, and a recovery
//! coordinator returns tasks abandoned by dead workers to the pending pool.
//! The module follows hexagonal architecture:
//!
//! - Domain types in [`domain`]
//! - Port contracts in [`ports`]
//! - Adapter implementations in [`adapters`]
//! - Orchestration services in [`services`]

pub mod adapters;
pub mod domain;
pub mod ports;
pub mod services;

#[cfg(test)]
mod tests;
