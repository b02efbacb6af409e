//! Policy snapshot cache with write-through persistence.
//!
//! The cache holds the last known [`PolicySnapshot`] behind a single
//! reader/writer lock:
//!
//! - `read` is lazy: the first call loads the persisted snapshot once, every
//!   later call is an in-memory clone of an `Arc`.
//! - `commit` applies the merge rule against the current snapshot, swaps in
//!   the result and writes it through to the store while still holding the
//!   write lock, so commits are totally ordered and readers never see a
//!   partially merged document.
//!
//! # Merge rule
//!
//! If the incoming snapshot belongs to a different organization than the
//! cached one, it replaces the cache wholesale. Otherwise every access
//! decision the incoming snapshot is silent about is carried forward from
//! the cached one. Scalar flags always come from the incoming snapshot.
//!
//! # Failure handling
//!
//! A missing, unreadable or malformed persisted snapshot reads as "no
//! snapshot". A failed write is logged and not retried; the in-memory
//! snapshot still reflects the commit.

use std::sync::{Arc, PoisonError, RwLock};

use tracing::{debug, info, warn};
use veilsync_storage::KeyValueStore;

use crate::model::codec::{decode_snapshot, encode_snapshot};
use crate::model::PolicySnapshot;

#[cfg(test)]
mod merge_proptest;

/// Store key of the persisted snapshot.
pub const SNAPSHOT_KEY: &str = "policy_snapshot";

/// How a committed snapshot was combined with the cached one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommitOutcome {
    /// Nothing was cached; the snapshot was stored as-is.
    Initial,
    /// Same organization; `backfilled` decisions were carried forward.
    Merged { backfilled: usize },
    /// Organization changed; the cache was replaced wholesale.
    Replaced,
}

/// Applies the merge rule to `incoming` given the `previous` snapshot.
pub fn merge_snapshot(
    previous: Option<&PolicySnapshot>,
    mut incoming: PolicySnapshot,
) -> (PolicySnapshot, CommitOutcome) {
    let Some(previous) = previous else {
        return (incoming, CommitOutcome::Initial);
    };

    if previous.organization_id() != incoming.organization_id() {
        return (incoming, CommitOutcome::Replaced);
    }

    let backfilled = incoming.access.backfill_from(&previous.access);
    (incoming, CommitOutcome::Merged { backfilled })
}

#[derive(Debug, Default)]
struct CacheState {
    snapshot: Option<Arc<PolicySnapshot>>,
    loaded: bool,
}

/// Thread-safe cache of the current policy snapshot.
pub struct PolicyCache {
    store: Arc<dyn KeyValueStore>,
    state: RwLock<CacheState>,
}

impl std::fmt::Debug for PolicyCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state.read().unwrap_or_else(PoisonError::into_inner);
        f.debug_struct("PolicyCache")
            .field("namespace", &self.store.namespace())
            .field("loaded", &state.loaded)
            .field("has_snapshot", &state.snapshot.is_some())
            .finish()
    }
}

impl PolicyCache {
    /// Creates a cache backed by `store`. Nothing is loaded until first read.
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self {
            store,
            state: RwLock::new(CacheState::default()),
        }
    }

    /// Returns the current snapshot, or `None` if never synced.
    pub fn read(&self) -> Option<Arc<PolicySnapshot>> {
        {
            let state = self.state.read().unwrap_or_else(PoisonError::into_inner);
            if state.loaded {
                return state.snapshot.clone();
            }
        }

        let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
        self.ensure_loaded(&mut state);
        state.snapshot.clone()
    }

    /// Merges `incoming` into the cache, swaps it in and persists it.
    pub fn commit(&self, incoming: PolicySnapshot) -> CommitOutcome {
        let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
        self.ensure_loaded(&mut state);

        let (merged, outcome) = merge_snapshot(state.snapshot.as_deref(), incoming);
        match outcome {
            CommitOutcome::Replaced => info!(
                organization_id = ?merged.organization_id(),
                "Organization changed, replacing cached policy"
            ),
            CommitOutcome::Merged { backfilled } => debug!(
                backfilled,
                "Merged policy snapshot into cache"
            ),
            CommitOutcome::Initial => debug!("Cached first policy snapshot"),
        }

        self.persist(&merged);
        state.snapshot = Some(Arc::new(merged));
        outcome
    }

    fn ensure_loaded(&self, state: &mut CacheState) {
        if state.loaded {
            return;
        }
        state.snapshot = self.load().map(Arc::new);
        state.loaded = true;
    }

    fn load(&self) -> Option<PolicySnapshot> {
        let bytes = match self.store.get(SNAPSHOT_KEY) {
            Ok(Some(bytes)) => bytes,
            Ok(None) => return None,
            Err(e) => {
                warn!(error = %e, "Failed to load persisted policy, starting empty");
                return None;
            }
        };

        match decode_snapshot(&bytes) {
            Ok(snapshot) => Some(snapshot),
            Err(e) => {
                warn!(error = %e, "Persisted policy is malformed, ignoring it");
                None
            }
        }
    }

    fn persist(&self, snapshot: &PolicySnapshot) {
        let result = encode_snapshot(snapshot)
            .and_then(|bytes| self.store.set(SNAPSHOT_KEY, &bytes).map_err(Into::into));
        if let Err(e) = result {
            warn!(error = %e, "Failed to persist policy snapshot");
        }
    }
}
