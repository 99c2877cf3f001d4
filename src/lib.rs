//! Analysis queue: persistent, crash-recoverable job queue for code analysis.
//!
//! Submitters enqueue analysis tasks, a pool of independent workers claims
//! them exclusively through a conditional status transition, and a recovery
//! coordinator hands tasks held by dead workers back to the pending pool.
//! Workers coordinate only through the shared store.
//!
//! # Architecture
//!
//! The queue follows hexagonal architecture principles:
//!
//! - **Domain**: Pure business logic with no infrastructure dependencies
//! - **Ports**: Abstract trait interfaces for persistence
//! - **Adapters**: In-memory and `PostgreSQL` implementations of the ports
//!
//! # Modules
//!
//! - [`queue`]: Task model, claim protocol, recovery and selection
//! - [`config`]: Environment-driven store configuration

pub mod config;
pub mod queue;
