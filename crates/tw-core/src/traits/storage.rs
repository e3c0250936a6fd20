//! Local persistence trait

use crate::error::StorageError;

/// String key/value store the roster is mirrored to
///
/// Modelled on browser local storage: one string value per key, read and
/// written synchronously.
pub trait KeyValueStorage: Send + Sync {
    /// Read a value; `Ok(None)` if the key was never written
    fn get(&self, key: &str) -> Result<Option<String>, StorageError>;

    /// Replace the value stored under `key`
    fn set(&self, key: &str, value: &str) -> Result<(), StorageError>;
}
