//! Coordinator state machine.
//!
//! Everything here is synchronous and clock-agnostic; the caller passes
//! `now` in and performs whatever the returned [`Plan`] asks for.

use std::time::Duration;

use tokio::time::Instant;
use veilsync_domain::{PendingRequest, RequesterIdentity, TrackedEntities};

/// Externally visible coordinator state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncState {
    /// No request in flight.
    Idle,
    /// A request is in flight and another one waits behind it.
    RequestQueued,
    /// A request is in flight, nothing waits behind it.
    RequestInFlight,
}

/// What to do with a freshly built request.
#[derive(Debug, PartialEq, Eq)]
pub(crate) enum Plan {
    /// Identical to the last sent request, which is still fresh.
    Throttled,
    /// Stored as the next pending request behind the in-flight one.
    Queued,
    /// Send it now; the state is already marked in flight.
    Dispatch(PendingRequest),
}

#[derive(Debug)]
pub(crate) struct LastSent {
    pub(crate) request: PendingRequest,
    pub(crate) at: Instant,
}

/// Mutable coordinator state, guarded by the coordinator's mutex.
#[derive(Debug, Default)]
pub(crate) struct CoordinatorState {
    pub(crate) identity: Option<RequesterIdentity>,
    /// Cumulative; entities are never removed while the user stays the same.
    pub(crate) tracked: TrackedEntities,
    pub(crate) last_sent: Option<LastSent>,
    pub(crate) in_flight: bool,
    pub(crate) next_pending: Option<PendingRequest>,
}

impl CoordinatorState {
    pub(crate) fn sync_state(&self) -> SyncState {
        match (self.in_flight, self.next_pending.is_some()) {
            (false, _) => SyncState::Idle,
            (true, true) => SyncState::RequestQueued,
            (true, false) => SyncState::RequestInFlight,
        }
    }

    /// Replaces the identity. Returns true if the user changed, in which
    /// case tracked entities and any queued request are dropped.
    pub(crate) fn set_identity(&mut self, identity: RequesterIdentity) -> bool {
        let user_changed = self
            .identity
            .as_ref()
            .map_or(true, |current| current.user_id != identity.user_id);
        if user_changed {
            self.tracked = TrackedEntities::new();
            self.next_pending = None;
        }
        self.identity = Some(identity);
        user_changed
    }

    /// Decides what to do with `request`.
    pub(crate) fn plan(
        &mut self,
        request: PendingRequest,
        now: Instant,
        refresh_interval: Duration,
    ) -> Plan {
        if let Some(last) = &self.last_sent {
            if last.request == request && now.saturating_duration_since(last.at) < refresh_interval
            {
                return Plan::Throttled;
            }
        }

        if self.in_flight {
            self.next_pending = Some(request);
            return Plan::Queued;
        }

        self.in_flight = true;
        Plan::Dispatch(request)
    }

    /// Records the end of a flight dispatched at `sent_at` and returns the
    /// request to chain, if any.
    ///
    /// Only successful flights count as sent; the throttle window starts at
    /// dispatch. A queued request that equals the one that just flew is
    /// dropped.
    pub(crate) fn complete(
        &mut self,
        sent: PendingRequest,
        succeeded: bool,
        sent_at: Instant,
    ) -> Option<PendingRequest> {
        let next = self.next_pending.take().filter(|next| *next != sent);

        if succeeded {
            self.last_sent = Some(LastSent {
                request: sent,
                at: sent_at,
            });
        }

        if next.is_none() {
            self.in_flight = false;
        }
        next
    }
}
