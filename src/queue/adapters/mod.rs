//! Adapter implementations of the queue ports.
//!
//! - [`memory`]: lock-guarded in-process storage
//! - [`postgres`]: Diesel-backed `PostgreSQL` storage

pub mod memory;
pub mod postgres;
