//! Users for whom no policy request may be sent.
//!
//! An id is added when an account-deletion flow starts and removed again if
//! that flow fails, so no sync leaks the id while deletion is pending. The
//! set lives in memory and is written through to the store on every change.

use std::collections::BTreeSet;
use std::sync::{Arc, Mutex, PoisonError};

use tracing::{debug, warn};
use veilsync_storage::KeyValueStore;

/// Store key of the persisted blacklist.
pub const BLACKLIST_KEY: &str = "user_blacklist";

/// Persisted set of suppressed user ids.
pub struct Blacklist {
    store: Arc<dyn KeyValueStore>,
    ids: Mutex<BTreeSet<i64>>,
}

impl std::fmt::Debug for Blacklist {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Blacklist")
            .field("ids", &*self.ids.lock().unwrap_or_else(PoisonError::into_inner))
            .finish()
    }
}

impl Blacklist {
    /// Loads the persisted blacklist. Unreadable data loads as empty.
    pub fn load(store: Arc<dyn KeyValueStore>) -> Self {
        let ids = match store.get(BLACKLIST_KEY) {
            Ok(Some(bytes)) => serde_json::from_slice::<Vec<i64>>(&bytes)
                .map(|ids| ids.into_iter().collect())
                .unwrap_or_else(|e| {
                    warn!(error = %e, "Persisted blacklist is malformed, starting empty");
                    BTreeSet::new()
                }),
            Ok(None) => BTreeSet::new(),
            Err(e) => {
                warn!(error = %e, "Failed to load blacklist, starting empty");
                BTreeSet::new()
            }
        };

        Self {
            store,
            ids: Mutex::new(ids),
        }
    }

    /// Adds `user_id`. Returns true if it was not already present.
    pub fn add(&self, user_id: i64) -> bool {
        let mut ids = self.lock();
        let added = ids.insert(user_id);
        if added {
            debug!(user_id, "Blacklisted user");
            self.persist(&ids);
        }
        added
    }

    /// Removes `user_id`. Returns true if it was present.
    pub fn remove(&self, user_id: i64) -> bool {
        let mut ids = self.lock();
        let removed = ids.remove(&user_id);
        if removed {
            debug!(user_id, "Removed user from blacklist");
            self.persist(&ids);
        }
        removed
    }

    pub fn contains(&self, user_id: i64) -> bool {
        self.lock().contains(&user_id)
    }

    /// Empties the blacklist. Hosts call this once at process start.
    pub fn clear(&self) {
        let mut ids = self.lock();
        ids.clear();
        self.persist(&ids);
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, BTreeSet<i64>> {
        self.ids.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn persist(&self, ids: &BTreeSet<i64>) {
        let result = serde_json::to_vec(&ids.iter().collect::<Vec<_>>())
            .map_err(crate::DomainError::from)
            .and_then(|bytes| Ok(self.store.set(BLACKLIST_KEY, &bytes)?));
        if let Err(e) = result {
            warn!(error = %e, "Failed to persist blacklist");
        }
    }
}
