//! Key/value tags attached to queued tasks.

use super::{CharacteristicUuid, QueueDomainError, TaskUuid};
use serde::{Deserialize, Serialize};

/// Well-known characteristic keys.
pub mod keys {
    /// Name of the analysed branch.
    pub const BRANCH: &str = "branch";
    /// Kind of the analysed branch.
    pub const BRANCH_TYPE: &str = "branchType";
    /// Identifier of the analysed pull request.
    pub const PULL_REQUEST: &str = "pullRequest";
}

/// Width of the `kee` and `text_value` columns.
const MAX_CHARACTERISTIC_LENGTH: usize = 512;

/// A single key/value tag on a task.
///
/// Several rows may share a key on the same task; this layer does not reject
/// duplicates.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskCharacteristic {
    uuid: CharacteristicUuid,
    task_uuid: TaskUuid,
    key: String,
    value: String,
}

impl TaskCharacteristic {
    /// Creates a characteristic with a generated identifier.
    ///
    /// # Errors
    ///
    /// Returns [`QueueDomainError::EmptyCharacteristicKey`] when the key is
    /// blank or [`QueueDomainError::IdentifierTooLong`] when the key or value
    /// do not fit their columns.
    pub fn new(
        task_uuid: TaskUuid,
        key: impl Into<String>,
        value: impl Into<String>,
    ) -> Result<Self, QueueDomainError> {
        Self::with_uuid(CharacteristicUuid::generate(), task_uuid, key, value)
    }

    /// Creates a characteristic with an explicit identifier.
    ///
    /// # Errors
    ///
    /// Same as [`Self::new`].
    pub fn with_uuid(
        uuid: CharacteristicUuid,
        task_uuid: TaskUuid,
        key: impl Into<String>,
        value: impl Into<String>,
    ) -> Result<Self, QueueDomainError> {
        let raw_key = key.into();
        let key_trimmed = raw_key.trim();
        if key_trimmed.is_empty() {
            return Err(QueueDomainError::EmptyCharacteristicKey);
        }
        if key_trimmed.chars().count() > MAX_CHARACTERISTIC_LENGTH {
            return Err(QueueDomainError::IdentifierTooLong {
                kind: "characteristic key",
                value: raw_key,
                max: MAX_CHARACTERISTIC_LENGTH,
            });
        }
        let value_str = value.into();
        if value_str.chars().count() > MAX_CHARACTERISTIC_LENGTH {
            return Err(QueueDomainError::IdentifierTooLong {
                kind: "characteristic value",
                value: value_str,
                max: MAX_CHARACTERISTIC_LENGTH,
            });
        }
        Ok(Self {
            uuid,
            task_uuid,
            key: key_trimmed.to_owned(),
            value: value_str,
        })
    }

    /// Returns the characteristic identifier.
    #[must_use]
    pub const fn uuid(&self) -> &CharacteristicUuid {
        &self.uuid
    }

    /// Returns the task this characteristic belongs to.
    #[must_use]
    pub const fn task_uuid(&self) -> &TaskUuid {
        &self.task_uuid
    }

    /// Returns the key.
    #[must_use]
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Returns the value.
    #[must_use]
    pub fn value(&self) -> &str {
        &self.value
    }
}

/// Checks that every characteristic names `task_uuid` as its owner.
///
/// # Errors
///
/// Returns [`QueueDomainError::CharacteristicTaskMismatch`] for the first
/// characteristic owned by another task.
pub fn ensure_owned_by(
    task_uuid: &TaskUuid,
    characteristics: &[TaskCharacteristic],
) -> Result<(), QueueDomainError> {
    match characteristics
        .iter()
        .find(|characteristic| characteristic.task_uuid() != task_uuid)
    {
        Some(stray) => Err(QueueDomainError::CharacteristicTaskMismatch {
            task: task_uuid.clone(),
            characteristic: stray.uuid().clone(),
            owner: stray.task_uuid().clone(),
        }),
        None => Ok(()),
    }
}
