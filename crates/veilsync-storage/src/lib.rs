//! veilsync-storage: Key-value persistence layer
//!
//! This crate provides the storage abstraction used by the policy cache,
//! the user blacklist and the client session ids:
//! - KeyValueStore trait with get/set/remove semantics
//! - In-memory implementation for tests and ephemeral hosts
//! - File-backed implementation for durable storage
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────┐
//! │              veilsync-storage               │
//! ├─────────────────────────────────────────────┤
//! │  traits.rs  - KeyValueStore trait           │
//! │  memory.rs  - In-memory implementation      │
//! │  file.rs    - File-per-key implementation   │
//! └─────────────────────────────────────────────┘
//! ```
//!
//! Every store is scoped to a namespace so that several processes of the
//! host application can share one location without clobbering unrelated
//! keys.

pub mod error;
pub mod file;
pub mod memory;
pub mod traits;

pub use error::{StorageError, StorageResult};
pub use file::FileKeyValueStore;
pub use memory::MemoryKeyValueStore;
pub use traits::{validate_key, validate_namespace, KeyValueStore};
