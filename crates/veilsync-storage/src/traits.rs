//! KeyValueStore trait definition.

use std::sync::Arc;

use crate::error::{StorageError, StorageResult};

/// Maximum length of a key or namespace.
pub const MAX_KEY_LENGTH: usize = 255;

/// Abstract storage interface for opaque values keyed by string.
///
/// Implementations must be thread-safe (Send + Sync). All operations are
/// synchronous: callers hold no locks of their own across them and the
/// values involved are small.
pub trait KeyValueStore: Send + Sync + 'static {
    /// The namespace this store is scoped to.
    fn namespace(&self) -> &str;

    /// Gets the value stored under `key`, or `None` if absent.
    fn get(&self, key: &str) -> StorageResult<Option<Vec<u8>>>;

    /// Stores `value` under `key`, replacing any previous value.
    fn set(&self, key: &str, value: &[u8]) -> StorageResult<()>;

    /// Removes `key`. Removing an absent key is not an error.
    fn remove(&self, key: &str) -> StorageResult<()>;
}

impl<S: KeyValueStore + ?Sized> KeyValueStore for Arc<S> {
    fn namespace(&self) -> &str {
        (**self).namespace()
    }

    fn get(&self, key: &str) -> StorageResult<Option<Vec<u8>>> {
        (**self).get(key)
    }

    fn set(&self, key: &str, value: &[u8]) -> StorageResult<()> {
        (**self).set(key, value)
    }

    fn remove(&self, key: &str) -> StorageResult<()> {
        (**self).remove(key)
    }
}

fn check_segment(value: &str) -> Result<(), &'static str> {
    if value.is_empty() {
        return Err("cannot be empty");
    }
    if value.len() > MAX_KEY_LENGTH {
        return Err("exceeds maximum length");
    }
    if value == "." || value == ".." {
        return Err("cannot be a relative path component");
    }
    if value
        .chars()
        .any(|c| c == '/' || c == '\\' || c == '\0' || c.is_control())
    {
        return Err("contains a path separator or control character");
    }
    Ok(())
}

/// Validates a key.
///
/// Keys double as file names in the file-backed store, so path separators
/// and control characters are rejected for every backend.
pub fn validate_key(key: &str) -> StorageResult<()> {
    check_segment(key).map_err(|message| StorageError::InvalidKey {
        key: key.to_string(),
        message: message.to_string(),
    })
}

/// Validates a namespace using the same rules as keys.
pub fn validate_namespace(namespace: &str) -> StorageResult<()> {
    check_segment(namespace).map_err(|message| StorageError::InvalidNamespace {
        namespace: namespace.to_string(),
        message: message.to_string(),
    })
}
