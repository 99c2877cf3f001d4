//! Identifier types for queued tasks and the parties that touch them.
//!
//! Queue identifiers are opaque strings assigned by callers (submission API,
//! worker runtime), so they are validated only for presence and column width.

use super::QueueDomainError;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Width of the `VARCHAR(40)` identifier columns.
const MAX_UUID_LENGTH: usize = 40;

/// Width of the `submitter_uuid` column.
const MAX_SUBMITTER_LENGTH: usize = 255;

fn validate(kind: &'static str, raw: String, max: usize) -> Result<String, QueueDomainError> {
    let normalized = raw.trim();
    if normalized.is_empty() {
        return Err(QueueDomainError::EmptyIdentifier { kind });
    }
    if normalized.chars().count() > max {
        return Err(QueueDomainError::IdentifierTooLong {
            kind,
            value: raw,
            max,
        });
    }
    Ok(normalized.to_owned())
}

macro_rules! string_identifier {
    ($(#[$meta:meta])* $name:ident, $kind:literal, $max:expr) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            #[doc = concat!("Creates a validated ", $kind, ".")]
            ///
            /// # Errors
            ///
            /// Returns [`QueueDomainError::EmptyIdentifier`] when the value is
            /// blank or [`QueueDomainError::IdentifierTooLong`] when it does
            /// not fit its column.
            pub fn new(value: impl Into<String>) -> Result<Self, QueueDomainError> {
                validate($kind, value.into(), $max).map(Self)
            }

            /// Returns the identifier as a string slice.
            #[must_use]
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                self.as_str()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl TryFrom<&str> for $name {
            type Error = QueueDomainError;

            fn try_from(value: &str) -> Result<Self, Self::Error> {
                Self::new(value)
            }
        }
    };
}

string_identifier!(
    /// Unique identifier of a queued task. Never reassigned.
    TaskUuid,
    "task uuid",
    MAX_UUID_LENGTH
);

string_identifier!(
    /// Identity of a worker process holding claims on tasks.
    WorkerUuid,
    "worker uuid",
    MAX_UUID_LENGTH
);

string_identifier!(
    /// Owning project or workspace of a task.
    EntityUuid,
    "entity uuid",
    MAX_UUID_LENGTH
);

string_identifier!(
    /// Branch or component scope of a task, finer-grained than its entity.
    ComponentUuid,
    "component uuid",
    MAX_UUID_LENGTH
);

string_identifier!(
    /// Identity of the user or system that submitted a task.
    SubmitterUuid,
    "submitter uuid",
    MAX_SUBMITTER_LENGTH
);

string_identifier!(
    /// Identifier of a single characteristic row.
    CharacteristicUuid,
    "characteristic uuid",
    MAX_UUID_LENGTH
);

impl TaskUuid {
    /// Generates a fresh random task identifier.
    #[must_use]
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }
}

impl CharacteristicUuid {
    /// Generates a fresh random characteristic identifier.
    #[must_use]
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }
}

impl From<&EntityUuid> for ComponentUuid {
    fn from(entity: &EntityUuid) -> Self {
        Self(entity.as_str().to_owned())
    }
}
