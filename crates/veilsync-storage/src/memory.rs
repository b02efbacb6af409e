//! In-memory storage implementation.
//!
//! Backed by a `DashMap` so concurrent readers and writers never contend on
//! a single global lock. Nothing survives the process; use it for tests and
//! for hosts that re-sync on every launch.

use std::sync::Arc;

use dashmap::DashMap;

use crate::error::StorageResult;
use crate::traits::{validate_key, validate_namespace, KeyValueStore};

/// In-memory implementation of KeyValueStore.
#[derive(Debug)]
pub struct MemoryKeyValueStore {
    namespace: String,
    values: DashMap<String, Vec<u8>>,
}

impl MemoryKeyValueStore {
    /// Creates a new in-memory store scoped to `namespace`.
    pub fn new(namespace: impl Into<String>) -> StorageResult<Self> {
        let namespace = namespace.into();
        validate_namespace(&namespace)?;
        Ok(Self {
            namespace,
            values: DashMap::new(),
        })
    }

    /// Creates a new in-memory store wrapped in Arc.
    pub fn new_shared(namespace: impl Into<String>) -> StorageResult<Arc<Self>> {
        Self::new(namespace).map(Arc::new)
    }

    /// Number of keys currently stored.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Returns true if no keys are stored.
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

impl KeyValueStore for MemoryKeyValueStore {
    fn namespace(&self) -> &str {
        &self.namespace
    }

    fn get(&self, key: &str) -> StorageResult<Option<Vec<u8>>> {
        validate_key(key)?;
        Ok(self.values.get(key).map(|v| v.value().clone()))
    }

    fn set(&self, key: &str, value: &[u8]) -> StorageResult<()> {
        validate_key(key)?;
        self.values.insert(key.to_string(), value.to_vec());
        Ok(())
    }

    fn remove(&self, key: &str) -> StorageResult<()> {
        validate_key(key)?;
        self.values.remove(key);
        Ok(())
    }
}
