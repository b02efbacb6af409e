//! Account deletion flow.
//!
//! Deleting an account is a two-step exchange with the policy service:
//! a policy request returns a one-time `remove_account_url`, and a plain
//! GET against that URL performs the deletion.
//!
//! The user is blacklisted for the whole exchange so no regular sync leaks
//! their id while the deletion is pending. If any step fails the blacklist
//! entry is rolled back and syncs resume.

use std::sync::Arc;

use thiserror::Error;
use tracing::{info, instrument, warn};
use url::Url;
use veilsync_domain::Blacklist;

use crate::coordinator::RequestCoordinator;
use crate::transport::{PolicyTransport, TransportError};

/// Why an account deletion did not go through.
#[derive(Debug, Error)]
pub enum AccountDeletionError {
    /// The policy request carrying the deletion URL failed.
    #[error("could not fetch policy settings: {0}")]
    SettingsUnavailable(#[source] TransportError),

    /// The policy service did not return a deletion URL.
    #[error("policy service returned no account removal url")]
    MissingUrl,

    /// The returned deletion URL does not parse.
    #[error("invalid account removal url {url}: {source}")]
    InvalidUrl {
        url: String,
        #[source]
        source: url::ParseError,
    },

    /// The deletion request itself failed.
    #[error("account removal request failed: {0}")]
    Http(#[source] TransportError),

    /// The deletion endpoint answered with a non-2xx status.
    #[error("account removal returned status {status}")]
    Status { status: u16 },
}

/// Drives account deletion for the users known to a coordinator.
#[derive(Clone)]
pub struct AccountDeletion {
    coordinator: RequestCoordinator,
    blacklist: Arc<Blacklist>,
    transport: Arc<dyn PolicyTransport>,
}

impl std::fmt::Debug for AccountDeletion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AccountDeletion")
            .field("coordinator", &self.coordinator)
            .field("blacklisted", &self.blacklist.len())
            .finish()
    }
}

impl AccountDeletion {
    pub fn new(
        coordinator: RequestCoordinator,
        blacklist: Arc<Blacklist>,
        transport: Arc<dyn PolicyTransport>,
    ) -> Self {
        Self {
            coordinator,
            blacklist,
            transport,
        }
    }

    /// Fetches the one-time deletion URL for `user_id`.
    ///
    /// The request carries only the user id. It bypasses the blacklist and
    /// the throttle, and its response is not committed to the policy cache.
    #[instrument(skip(self))]
    pub async fn deletion_url(&self, user_id: i64) -> Result<Url, AccountDeletionError> {
        let request = self.coordinator.bare_request(user_id);
        let timeout = self.coordinator.settings().request_timeout;

        let snapshot = match tokio::time::timeout(timeout, self.transport.fetch(&request)).await {
            Ok(result) => result.map_err(AccountDeletionError::SettingsUnavailable)?,
            Err(_) => {
                return Err(AccountDeletionError::SettingsUnavailable(
                    TransportError::Timeout { timeout },
                ))
            }
        };

        let raw = snapshot
            .remove_account_url
            .filter(|url| !url.trim().is_empty())
            .ok_or(AccountDeletionError::MissingUrl)?;

        Url::parse(raw.trim())
            .map_err(|source| AccountDeletionError::InvalidUrl { url: raw, source })
    }

    /// Deletes the account of `user_id`.
    ///
    /// On success the user stays blacklisted. On failure the blacklist
    /// entry is removed again so syncs resume.
    #[instrument(skip(self))]
    pub async fn delete_account(&self, user_id: i64) -> Result<(), AccountDeletionError> {
        self.blacklist.add(user_id);

        let result = self.run(user_id).await;
        match &result {
            Ok(()) => info!(user_id, "Account removal accepted"),
            Err(e) => {
                warn!(user_id, error = %e, "Account removal failed");
                self.blacklist.remove(user_id);
            }
        }
        result
    }

    async fn run(&self, user_id: i64) -> Result<(), AccountDeletionError> {
        let url = self.deletion_url(user_id).await?;
        let status = self
            .transport
            .get_status(&url)
            .await
            .map_err(AccountDeletionError::Http)?;

        if (200..300).contains(&status) {
            Ok(())
        } else {
            Err(AccountDeletionError::Status { status })
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use async_trait::async_trait;
    use tokio::runtime::Handle;
    use veilsync_domain::{
        ClientSessionIds, EntityKind, PendingRequest, PolicyCache, PolicySnapshot,
        RequesterIdentity, TrackedEntity,
    };
    use veilsync_storage::MemoryKeyValueStore;

    use super::*;
    use crate::coordinator::CoordinatorSettings;

    /// Serves a fixed removal URL and a fixed GET status.
    struct DeletionTransport {
        remove_account_url: Option<String>,
        fetch_fails: bool,
        status: u16,
        fetched: Mutex<Vec<PendingRequest>>,
        requested: Mutex<Vec<Url>>,
    }

    impl DeletionTransport {
        fn new(remove_account_url: Option<&str>, status: u16) -> Self {
            Self {
                remove_account_url: remove_account_url.map(str::to_string),
                fetch_fails: false,
                status,
                fetched: Mutex::new(Vec::new()),
                requested: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl PolicyTransport for DeletionTransport {
        async fn fetch(&self, request: &PendingRequest) -> Result<PolicySnapshot, TransportError> {
            self.fetched.lock().unwrap().push(request.clone());
            if self.fetch_fails {
                return Err(TransportError::Status { status: 502 });
            }
            Ok(PolicySnapshot {
                remove_account_url: self.remove_account_url.clone(),
                ..Default::default()
            })
        }

        async fn get_status(&self, url: &Url) -> Result<u16, TransportError> {
            self.requested.lock().unwrap().push(url.clone());
            Ok(self.status)
        }
    }

    const USER: i64 = 42;

    fn deletion(
        transport: DeletionTransport,
    ) -> (AccountDeletion, Arc<Blacklist>, Arc<DeletionTransport>) {
        let store = MemoryKeyValueStore::new_shared("group.test").unwrap();
        let blacklist = Arc::new(Blacklist::load(store.clone()));
        let transport = Arc::new(transport);
        let coordinator = RequestCoordinator::new(
            Arc::new(PolicyCache::new(store.clone())),
            Arc::clone(&blacklist),
            Arc::new(ClientSessionIds::new(store)),
            transport.clone(),
            CoordinatorSettings::default(),
            Handle::current(),
        );
        coordinator.set_identity(RequesterIdentity::new(USER, "+15550100", "alice"));
        let flow = AccountDeletion::new(coordinator, Arc::clone(&blacklist), transport.clone());
        (flow, blacklist, transport)
    }

    #[tokio::test]
    async fn test_successful_deletion_keeps_user_blacklisted() {
        let (flow, blacklist, transport) =
            deletion(DeletionTransport::new(Some("https://example.org/remove/abc"), 200));

        flow.delete_account(USER).await.unwrap();

        assert!(blacklist.contains(USER));
        assert_eq!(transport.fetched.lock().unwrap()[0].user_id(), USER);
        assert_eq!(
            transport.requested.lock().unwrap()[0].as_str(),
            "https://example.org/remove/abc"
        );
    }

    #[tokio::test]
    async fn test_deletion_request_does_not_upload_tracked_entities() {
        let (flow, _, transport) =
            deletion(DeletionTransport::new(Some("https://example.org/remove/abc"), 200));
        flow.coordinator.add_entity(EntityKind::Group, TrackedEntity::new(-100));
        flow.coordinator.idle().await;

        flow.deletion_url(USER).await.unwrap();

        let fetched = transport.fetched.lock().unwrap();
        assert_eq!(fetched.len(), 2);
        assert!(fetched[0].entities.contains(EntityKind::Group, -100));
        assert_eq!(fetched[1].identity, RequesterIdentity::new(USER, "", ""));
        assert!(fetched[1].entities.is_empty());
    }

    #[tokio::test]
    async fn test_deletion_url_bypasses_blacklist_without_touching_it() {
        let (flow, blacklist, transport) =
            deletion(DeletionTransport::new(Some("https://example.org/remove/abc"), 200));
        blacklist.add(USER);

        let url = flow.deletion_url(USER).await.unwrap();

        assert_eq!(url.as_str(), "https://example.org/remove/abc");
        assert_eq!(transport.fetched.lock().unwrap().len(), 1);
        assert!(transport.requested.lock().unwrap().is_empty());
        assert!(blacklist.contains(USER));
    }

    #[tokio::test]
    async fn test_non_2xx_status_rolls_back_blacklist() {
        let (flow, blacklist, _) =
            deletion(DeletionTransport::new(Some("https://example.org/remove/abc"), 404));

        let err = flow.delete_account(USER).await.unwrap_err();

        assert!(matches!(err, AccountDeletionError::Status { status: 404 }));
        assert!(!blacklist.contains(USER));
    }

    #[tokio::test]
    async fn test_missing_url_rolls_back_blacklist() {
        let (flow, blacklist, transport) = deletion(DeletionTransport::new(None, 200));

        let err = flow.delete_account(USER).await.unwrap_err();

        assert!(matches!(err, AccountDeletionError::MissingUrl));
        assert!(!blacklist.contains(USER));
        assert!(transport.requested.lock().unwrap().is_empty());

        let (flow, _, _) = deletion(DeletionTransport::new(Some("  "), 200));
        assert!(matches!(
            flow.delete_account(USER).await.unwrap_err(),
            AccountDeletionError::MissingUrl
        ));
    }

    #[tokio::test]
    async fn test_invalid_url_is_reported() {
        let (flow, blacklist, _) = deletion(DeletionTransport::new(Some("not a url"), 200));

        let err = flow.delete_account(USER).await.unwrap_err();

        assert!(matches!(err, AccountDeletionError::InvalidUrl { .. }));
        assert!(!blacklist.contains(USER));
    }

    #[tokio::test]
    async fn test_settings_failure_rolls_back_blacklist() {
        let mut transport = DeletionTransport::new(Some("https://example.org/remove/abc"), 200);
        transport.fetch_fails = true;
        let (flow, blacklist, _) = deletion(transport);

        let err = flow.delete_account(USER).await.unwrap_err();

        assert!(matches!(err, AccountDeletionError::SettingsUnavailable(_)));
        assert!(!blacklist.contains(USER));
    }
}
