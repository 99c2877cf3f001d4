//! `PostgreSQL` adapters for queue persistence.

mod models;
mod repository;
mod schema;

pub use repository::{PostgresQueueRepository, QueuePgPool};
