//! Component wiring.
//!
//! [`PolicyClient`] owns one instance of every component for a process and
//! hands out references. The host keeps it in its own context and passes it
//! to whatever needs policy answers.

use std::sync::Arc;

use thiserror::Error;
use tokio::runtime::Handle;
use tracing::info;
use veilsync_domain::{
    AccessEvaluator, Blacklist, ClientSessionIds, PolicyCache, StaticPolicySettings,
};
use veilsync_storage::{KeyValueStore, StorageError};

use crate::account::AccountDeletion;
use crate::config::{ClientConfig, ConfigLoadError};
use crate::coordinator::{CoordinatorSettings, RequestCoordinator};
use crate::transport::{HttpPolicyTransport, PolicyTransport, TransportError};

/// Errors assembling a [`PolicyClient`].
#[derive(Debug, Error)]
pub enum ClientError {
    #[error(transparent)]
    Config(#[from] ConfigLoadError),

    #[error("failed to open policy store: {0}")]
    Storage(#[from] StorageError),

    #[error("failed to create policy transport: {0}")]
    Transport(#[from] TransportError),
}

/// Every policy component of a process, wired together.
#[derive(Debug, Clone)]
pub struct PolicyClient {
    cache: Arc<PolicyCache>,
    blacklist: Arc<Blacklist>,
    evaluator: AccessEvaluator,
    coordinator: RequestCoordinator,
    account: AccountDeletion,
}

impl PolicyClient {
    /// Builds the client from validated configuration with the HTTP
    /// transport.
    pub fn from_config(config: &ClientConfig, runtime: Handle) -> Result<Self, ClientError> {
        config.validate()?;
        let store = config.storage.open_store()?;
        let transport = Arc::new(HttpPolicyTransport::from_settings(&config.transport)?);
        Ok(Self::with_parts(
            store,
            transport,
            config.coordinator_settings(),
            StaticPolicySettings::default(),
            runtime,
        ))
    }

    /// Builds the client from explicit parts.
    ///
    /// The blacklist is cleared here; deletions interrupted by a previous
    /// process exit are not resumed.
    pub fn with_parts(
        store: Arc<dyn KeyValueStore>,
        transport: Arc<dyn PolicyTransport>,
        settings: CoordinatorSettings,
        statics: StaticPolicySettings,
        runtime: Handle,
    ) -> Self {
        let cache = Arc::new(PolicyCache::new(Arc::clone(&store)));
        let blacklist = Arc::new(Blacklist::load(Arc::clone(&store)));
        if !blacklist.is_empty() {
            info!(entries = blacklist.len(), "Clearing user blacklist left by previous run");
        }
        blacklist.clear();
        let sessions = Arc::new(ClientSessionIds::new(store));

        let evaluator = AccessEvaluator::new(Arc::clone(&cache)).with_static_settings(statics);
        let coordinator = RequestCoordinator::new(
            Arc::clone(&cache),
            Arc::clone(&blacklist),
            sessions,
            Arc::clone(&transport),
            settings,
            runtime,
        );
        let account = AccountDeletion::new(coordinator.clone(), Arc::clone(&blacklist), transport);

        Self {
            cache,
            blacklist,
            evaluator,
            coordinator,
            account,
        }
    }

    pub fn cache(&self) -> &Arc<PolicyCache> {
        &self.cache
    }

    pub fn blacklist(&self) -> &Arc<Blacklist> {
        &self.blacklist
    }

    pub fn evaluator(&self) -> &AccessEvaluator {
        &self.evaluator
    }

    pub fn coordinator(&self) -> &RequestCoordinator {
        &self.coordinator
    }

    pub fn account(&self) -> &AccountDeletion {
        &self.account
    }
}
