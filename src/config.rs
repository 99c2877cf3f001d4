//! Environment-driven configuration for the `PostgreSQL` queue store.

use crate::queue::adapters::postgres::QueuePgPool;
use diesel::pg::PgConnection;
use diesel::r2d2::{ConnectionManager, Pool, PoolError};
use std::env;
use std::time::Duration;
use thiserror::Error;

/// Variable holding the `PostgreSQL` connection URL.
pub const DATABASE_URL_VAR: &str = "ANALYSIS_QUEUE_DATABASE_URL";
/// Variable holding the maximum number of pooled connections.
pub const POOL_SIZE_VAR: &str = "ANALYSIS_QUEUE_POOL_SIZE";
/// Variable holding the connection checkout timeout in seconds.
pub const CONNECT_TIMEOUT_VAR: &str = "ANALYSIS_QUEUE_CONNECT_TIMEOUT_SECS";

/// Default maximum number of pooled connections.
pub const DEFAULT_POOL_SIZE: u32 = 4;
/// Default connection checkout timeout in seconds.
pub const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 10;

/// Errors raised while loading configuration or opening the pool.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A required variable is unset.
    #[error("missing required environment variable {0}")]
    Missing(&'static str),
    /// A variable holds a value that does not parse.
    #[error("invalid value {value:?} for {name}")]
    Invalid {
        /// Variable name.
        name: &'static str,
        /// Offending value.
        value: String,
    },
    /// The pool size must allow at least one connection.
    #[error("pool size must be at least 1")]
    EmptyPool,
    /// The connection pool could not be created.
    #[error("failed to build connection pool: {0}")]
    Pool(#[from] PoolError),
}

/// Connection settings for the queue store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueueConfig {
    database_url: String,
    pool_size: u32,
    connect_timeout: Duration,
}

impl QueueConfig {
    /// Creates a configuration with default pool settings.
    #[must_use]
    pub fn new(database_url: impl Into<String>) -> Self {
        Self {
            database_url: database_url.into(),
            pool_size: DEFAULT_POOL_SIZE,
            connect_timeout: Duration::from_secs(DEFAULT_CONNECT_TIMEOUT_SECS),
        }
    }

    /// Sets the maximum number of pooled connections.
    #[must_use]
    pub const fn with_pool_size(mut self, pool_size: u32) -> Self {
        self.pool_size = pool_size;
        self
    }

    /// Sets the connection checkout timeout.
    #[must_use]
    pub const fn with_connect_timeout(mut self, connect_timeout: Duration) -> Self {
        self.connect_timeout = connect_timeout;
        self
    }

    /// Loads the configuration from the process environment.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Missing`] when the database URL is unset and
    /// [`ConfigError::Invalid`] when a numeric setting does not parse.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Loads the configuration through `lookup`, which maps a variable name
    /// to its value.
    ///
    /// # Errors
    ///
    /// Same as [`Self::from_env`].
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let database_url = lookup(DATABASE_URL_VAR)
            .filter(|value| !value.trim().is_empty())
            .ok_or(ConfigError::Missing(DATABASE_URL_VAR))?;
        let pool_size = parse_or(&lookup, POOL_SIZE_VAR, DEFAULT_POOL_SIZE)?;
        let timeout_secs = parse_or(&lookup, CONNECT_TIMEOUT_VAR, DEFAULT_CONNECT_TIMEOUT_SECS)?;
        Ok(Self::new(database_url)
            .with_pool_size(pool_size)
            .with_connect_timeout(Duration::from_secs(timeout_secs)))
    }

    /// Returns the database URL.
    #[must_use]
    pub fn database_url(&self) -> &str {
        &self.database_url
    }

    /// Returns the maximum number of pooled connections.
    #[must_use]
    pub const fn pool_size(&self) -> u32 {
        self.pool_size
    }

    /// Returns the connection checkout timeout.
    #[must_use]
    pub const fn connect_timeout(&self) -> Duration {
        self.connect_timeout
    }

    /// Opens the r2d2 pool used by
    /// [`crate::queue::adapters::postgres::PostgresQueueRepository`].
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::EmptyPool`] for a zero pool size and
    /// [`ConfigError::Pool`] when no connection can be established.
    pub fn build_pool(&self) -> Result<QueuePgPool, ConfigError> {
        if self.pool_size == 0 {
            return Err(ConfigError::EmptyPool);
        }
        let manager = ConnectionManager::<PgConnection>::new(&self.database_url);
        Ok(Pool::builder()
            .max_size(self.pool_size)
            .connection_timeout(self.connect_timeout)
            .build(manager)?)
    }
}

fn parse_or<T: std::str::FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    name: &'static str,
    default: T,
) -> Result<T, ConfigError> {
    match lookup(name) {
        None => Ok(default),
        Some(value) => value
            .trim()
            .parse()
            .map_err(|_| ConfigError::Invalid { name, value }),
    }
}
