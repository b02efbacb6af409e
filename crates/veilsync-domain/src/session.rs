//! Client session state that outlives a process.
//!
//! The policy service correlates a device across restarts by the session
//! id sent with every request. Ids are generated lazily on first use and
//! persisted under `client_id__<user id>`. The requester identity the
//! host last set is kept under `requester_identity`, so syncs can resume
//! after a restart before the host sets it again.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use tracing::{debug, warn};
use uuid::Uuid;
use veilsync_storage::KeyValueStore;

use crate::model::RequesterIdentity;

/// Store key of the last requester identity.
pub const REQUESTER_KEY: &str = "requester_identity";

/// Store key of the session id for `user_id`.
pub fn session_key(user_id: i64) -> String {
    format!("client_id__{user_id}")
}

/// Lazily generated, persisted session id per user.
pub struct ClientSessionIds {
    store: Arc<dyn KeyValueStore>,
    known: Mutex<HashMap<i64, String>>,
}

impl std::fmt::Debug for ClientSessionIds {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientSessionIds")
            .field("namespace", &self.store.namespace())
            .finish_non_exhaustive()
    }
}

impl ClientSessionIds {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self {
            store,
            known: Mutex::new(HashMap::new()),
        }
    }

    /// Returns the session id for `user_id`, generating it on first use.
    pub fn session_id(&self, user_id: i64) -> String {
        let mut known = self.known.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(id) = known.get(&user_id) {
            return id.clone();
        }

        let key = session_key(user_id);
        let persisted = match self.store.get(&key) {
            Ok(Some(bytes)) => String::from_utf8(bytes).ok().filter(|s| !s.is_empty()),
            Ok(None) => None,
            Err(e) => {
                warn!(user_id, error = %e, "Failed to read client session id");
                None
            }
        };

        let id = match persisted {
            Some(id) => id,
            None => {
                let id = Uuid::new_v4().to_string().to_uppercase();
                debug!(user_id, "Generated client session id");
                if let Err(e) = self.store.set(&key, id.as_bytes()) {
                    warn!(user_id, error = %e, "Failed to persist client session id");
                }
                id
            }
        };

        known.insert(user_id, id.clone());
        id
    }

    /// The requester identity persisted by the last
    /// [`save_requester`](Self::save_requester), if any.
    pub fn requester(&self) -> Option<RequesterIdentity> {
        match self.store.get(REQUESTER_KEY) {
            Ok(Some(bytes)) => match serde_json::from_slice(&bytes) {
                Ok(identity) => Some(identity),
                Err(e) => {
                    warn!(error = %e, "Ignoring malformed persisted requester identity");
                    None
                }
            },
            Ok(None) => None,
            Err(e) => {
                warn!(error = %e, "Failed to read persisted requester identity");
                None
            }
        }
    }

    /// Persists `identity` as the current requester.
    pub fn save_requester(&self, identity: &RequesterIdentity) {
        let result = serde_json::to_vec(identity)
            .map_err(crate::DomainError::from)
            .and_then(|bytes| Ok(self.store.set(REQUESTER_KEY, &bytes)?));
        if let Err(e) = result {
            warn!(user_id = identity.user_id, error = %e, "Failed to persist requester identity");
        }
    }
}
