//! Request coordination for policy syncs.
//!
//! The coordinator turns "the host just saw these entities" notifications
//! into as few policy requests as possible:
//!
//! - Entity sets are cumulative. Every request carries every entity seen
//!   since the user was set.
//! - At most one request is in flight. Requests built while one flies are
//!   coalesced into a single queued follow-up, which is sent only if it
//!   still differs from what just landed.
//! - A request identical to the last successfully sent one is dropped until
//!   the refresh interval has elapsed.
//! - Nothing is sent for a blacklisted user or before an identity is set.
//!   The identity is persisted, so a restarted process resumes with the
//!   last requester.
//!
//! All public methods are synchronous and only take the internal lock
//! briefly. The network call runs on a spawned task with the lock released;
//! its completion re-enters the lock to commit the response and chain the
//! queued request.
//!
//! # Example
//!
//! ```ignore
//! coordinator.set_identity(RequesterIdentity::new(42, "+15550100", "alice"));
//! coordinator.add_entity(EntityKind::Group, TrackedEntity::new(-100).with_title("Chat"));
//! coordinator.idle().await;
//! ```

mod state;


use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::runtime::Handle;
use tokio::sync::watch;
use tokio::time::Instant;
use tracing::{debug, info, info_span, warn, Instrument};
use veilsync_domain::model::ClientInfo;
use veilsync_domain::{
    Blacklist, ClientSessionIds, EntityKind, PendingRequest, PolicyCache, RequesterIdentity,
    TrackedEntities, TrackedEntity,
};

use crate::transport::PolicyTransport;

pub use state::SyncState;
use state::{CoordinatorState, Plan};

/// Tunables and the client metadata attached to every request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CoordinatorSettings {
    /// Minimum age of the last identical request before it is resent.
    pub refresh_interval: Duration,
    /// Upper bound on a single transport call.
    pub request_timeout: Duration,
    pub client_os_type: String,
    pub client_version_code: String,
    pub client_version_name: String,
}

impl Default for CoordinatorSettings {
    fn default() -> Self {
        Self {
            refresh_interval: Duration::from_secs(600),
            request_timeout: Duration::from_secs(10),
            client_os_type: "iOS".to_string(),
            client_version_code: String::new(),
            client_version_name: String::new(),
        }
    }
}

struct Shared {
    cache: Arc<PolicyCache>,
    blacklist: Arc<Blacklist>,
    sessions: Arc<ClientSessionIds>,
    transport: Arc<dyn PolicyTransport>,
    settings: CoordinatorSettings,
    runtime: Handle,
    state: Mutex<CoordinatorState>,
    state_tx: watch::Sender<SyncState>,
    generation_tx: watch::Sender<u64>,
}

/// Deduplicates, coalesces and throttles policy sync requests.
///
/// Cloning is cheap; clones share the same state.
#[derive(Clone)]
pub struct RequestCoordinator {
    shared: Arc<Shared>,
}

impl std::fmt::Debug for RequestCoordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RequestCoordinator")
            .field("state", &self.state())
            .field("settings", &self.shared.settings)
            .finish()
    }
}

impl RequestCoordinator {
    /// Creates a coordinator that runs its network calls on `runtime`.
    ///
    /// The requester persisted by a previous process, if any, is restored.
    pub fn new(
        cache: Arc<PolicyCache>,
        blacklist: Arc<Blacklist>,
        sessions: Arc<ClientSessionIds>,
        transport: Arc<dyn PolicyTransport>,
        settings: CoordinatorSettings,
        runtime: Handle,
    ) -> Self {
        let (state_tx, _) = watch::channel(SyncState::Idle);
        let (generation_tx, _) = watch::channel(0);
        let identity = sessions.requester();
        if let Some(identity) = &identity {
            debug!(user_id = identity.user_id, "Restored persisted requester");
        }
        Self {
            shared: Arc::new(Shared {
                cache,
                blacklist,
                sessions,
                transport,
                settings,
                runtime,
                state: Mutex::new(CoordinatorState {
                    identity,
                    ..Default::default()
                }),
                state_tx,
                generation_tx,
            }),
        }
    }

    pub fn settings(&self) -> &CoordinatorSettings {
        &self.shared.settings
    }

    /// Sets and persists the requesting user. Switching to another user id
    /// drops every tracked entity and any queued request of the previous
    /// user.
    pub fn set_identity(&self, identity: RequesterIdentity) {
        let user_id = identity.user_id;
        let mut state = self.shared.lock();
        if state.identity.as_ref() != Some(&identity) {
            self.shared.sessions.save_requester(&identity);
        }
        if state.set_identity(identity) {
            info!(user_id, "Requester changed, tracked entities reset");
            self.shared.publish_state(&state);
        }
    }

    pub fn identity(&self) -> Option<RequesterIdentity> {
        self.shared.lock().identity.clone()
    }

    /// Everything tracked for the current user so far.
    pub fn tracked_entities(&self) -> TrackedEntities {
        self.shared.lock().tracked.clone()
    }

    /// Adds `entities` to the tracked set and sends a request if needed.
    ///
    /// Returns immediately; the request, if any, is sent on the runtime.
    pub fn sync(&self, entities: &TrackedEntities) {
        let shared = &self.shared;
        let mut state = shared.lock();

        let Some(identity) = state.identity.clone() else {
            debug!("No requester identity set, skipping sync");
            return;
        };
        let user_id = identity.user_id;

        if shared.blacklist.contains(user_id) {
            debug!(user_id, "Requester is blacklisted, skipping sync");
            return;
        }

        let added = state.tracked.merge(entities);
        let request = shared.build_request(identity, state.tracked.clone());

        match state.plan(request, Instant::now(), shared.settings.refresh_interval) {
            Plan::Throttled => {
                debug!(user_id, "Request unchanged since last sync, throttled");
            }
            Plan::Queued => {
                debug!(user_id, added, "Request queued behind in-flight sync");
                shared.publish_state(&state);
            }
            Plan::Dispatch(request) => {
                debug!(user_id, added, entities = request.entities.len(), "Dispatching sync");
                shared.publish_state(&state);
                drop(state);
                Shared::spawn_flight(Arc::clone(shared), request);
            }
        }
    }

    /// Re-sends the tracked set, subject to the usual throttle.
    pub fn refresh(&self) {
        self.sync(&TrackedEntities::new());
    }

    /// Tracks a single entity.
    ///
    /// An entity that is already tracked triggers no request, but settings
    /// observers are still notified.
    pub fn add_entity(&self, kind: EntityKind, entity: TrackedEntity) {
        let already_tracked = self.shared.lock().tracked.contains(kind, entity.id);
        if already_tracked {
            self.shared.notify_settings();
            return;
        }
        self.sync(&TrackedEntities::new().with(kind, entity));
    }

    /// Builds a request carrying only `user_id` and the client metadata.
    ///
    /// No phone, name or tracked entity is attached. Neither the blacklist
    /// nor the throttle is consulted.
    pub fn bare_request(&self, user_id: i64) -> PendingRequest {
        self.shared.build_request(
            RequesterIdentity::new(user_id, "", ""),
            TrackedEntities::new(),
        )
    }

    pub fn state(&self) -> SyncState {
        *self.shared.state_tx.borrow()
    }

    /// Resolves once no request is in flight or queued.
    pub async fn idle(&self) {
        let mut rx = self.shared.state_tx.subscribe();
        // The sender lives in `shared`, so the channel cannot close here
        let _ = rx.wait_for(|state| *state == SyncState::Idle).await;
    }

    /// Watch channel bumped whenever settings may have changed: after every
    /// completed request and on every no-op [`add_entity`](Self::add_entity).
    pub fn settings_updated(&self) -> watch::Receiver<u64> {
        self.shared.generation_tx.subscribe()
    }
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, CoordinatorState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn build_request(
        &self,
        identity: RequesterIdentity,
        entities: TrackedEntities,
    ) -> PendingRequest {
        let client = ClientInfo {
            client_os_type: self.settings.client_os_type.clone(),
            client_session_id: self.sessions.session_id(identity.user_id),
            client_version_code: self.settings.client_version_code.clone(),
            client_version_name: self.settings.client_version_name.clone(),
        };
        PendingRequest::new(identity, entities, client)
    }

    fn publish_state(&self, state: &CoordinatorState) {
        self.state_tx.send_replace(state.sync_state());
    }

    fn notify_settings(&self) {
        self.generation_tx.send_modify(|generation| *generation += 1);
    }

    fn spawn_flight(shared: Arc<Self>, request: PendingRequest) {
        let span = info_span!("policy_sync", user_id = request.user_id());
        let runtime = shared.runtime.clone();
        runtime.spawn(Self::fly(shared, request).instrument(span));
    }

    /// Sends `request`, then keeps sending queued follow-ups until none is
    /// left.
    async fn fly(shared: Arc<Self>, mut request: PendingRequest) {
        loop {
            let sent_at = Instant::now();
            let succeeded = shared.send_once(&request).await;

            let next = {
                let mut state = shared.lock();
                let mut next = state.complete(request, succeeded, sent_at);
                if let Some(queued) = &next {
                    if shared.blacklist.contains(queued.user_id()) {
                        debug!(
                            user_id = queued.user_id(),
                            "Dropping queued request of blacklisted requester"
                        );
                        state.in_flight = false;
                        next = None;
                    }
                }
                shared.publish_state(&state);
                next
            };
            shared.notify_settings();

            match next {
                Some(queued) => {
                    debug!(entities = queued.entities.len(), "Sending queued request");
                    request = queued;
                }
                None => break,
            }
        }
    }

    async fn send_once(&self, request: &PendingRequest) -> bool {
        let timeout = self.settings.request_timeout;
        match tokio::time::timeout(timeout, self.transport.fetch(request)).await {
            Ok(Ok(snapshot)) => {
                let outcome = self.cache.commit(snapshot);
                info!(?outcome, "Policy sync committed");
                true
            }
            Ok(Err(e)) => {
                warn!(error = %e, "Policy sync failed, keeping cached policy");
                false
            }
            Err(_) => {
                warn!(
                    timeout_secs = timeout.as_secs(),
                    "Policy sync timed out, keeping cached policy"
                );
                false
            }
        }
    }
}
