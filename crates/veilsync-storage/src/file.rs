//! File-backed storage implementation.
//!
//! Each key is stored as a single file under `<root>/<namespace>/`. Writes
//! go to a sibling temporary file that is then renamed over the target, so
//! a reader never observes a half-written value.

use std::fs;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tracing::debug;

use crate::error::{StorageError, StorageResult};
use crate::traits::{validate_key, validate_namespace, KeyValueStore};

const VALUE_EXTENSION: &str = "val";

/// File-per-key implementation of KeyValueStore.
#[derive(Debug)]
pub struct FileKeyValueStore {
    namespace: String,
    dir: PathBuf,
    tmp_counter: AtomicU64,
}

impl FileKeyValueStore {
    /// Opens (creating if needed) the store rooted at `root` for `namespace`.
    pub fn open(root: impl AsRef<Path>, namespace: impl Into<String>) -> StorageResult<Self> {
        let namespace = namespace.into();
        validate_namespace(&namespace)?;

        let dir = root.as_ref().join(&namespace);
        fs::create_dir_all(&dir).map_err(|source| StorageError::Io {
            key: namespace.clone(),
            source,
        })?;
        debug!(path = %dir.display(), "Opened file key-value store");

        Ok(Self {
            namespace,
            dir,
            tmp_counter: AtomicU64::new(0),
        })
    }

    /// Opens the store wrapped in Arc.
    pub fn open_shared(
        root: impl AsRef<Path>,
        namespace: impl Into<String>,
    ) -> StorageResult<Arc<Self>> {
        Self::open(root, namespace).map(Arc::new)
    }

    /// Directory holding this namespace's files.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn value_path(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{key}.{VALUE_EXTENSION}"))
    }

    fn temp_path(&self, key: &str) -> PathBuf {
        let n = self.tmp_counter.fetch_add(1, Ordering::Relaxed);
        self.dir
            .join(format!(".{key}.{}.{n}.tmp", std::process::id()))
    }
}

impl KeyValueStore for FileKeyValueStore {
    fn namespace(&self) -> &str {
        &self.namespace
    }

    fn get(&self, key: &str) -> StorageResult<Option<Vec<u8>>> {
        validate_key(key)?;
        match fs::read(self.value_path(key)) {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(source) => Err(StorageError::Io {
                key: key.to_string(),
                source,
            }),
        }
    }

    fn set(&self, key: &str, value: &[u8]) -> StorageResult<()> {
        validate_key(key)?;
        let io_err = |source| StorageError::Io {
            key: key.to_string(),
            source,
        };

        let tmp = self.temp_path(key);
        let result = (|| {
            let mut file = fs::File::create(&tmp)?;
            file.write_all(value)?;
            file.sync_all()?;
            fs::rename(&tmp, self.value_path(key))
        })();

        if result.is_err() {
            let _ = fs::remove_file(&tmp);
        }
        result.map_err(io_err)
    }

    fn remove(&self, key: &str) -> StorageResult<()> {
        validate_key(key)?;
        match fs::remove_file(self.value_path(key)) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(source) => Err(StorageError::Io {
                key: key.to_string(),
                source,
            }),
        }
    }
}
