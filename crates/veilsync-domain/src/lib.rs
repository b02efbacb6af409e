//! veilsync-domain: Core policy domain logic
//!
//! This crate contains the policy logic that does not touch the network:
//! - Policy snapshot and sync request model, plus their JSON wire codec
//! - Policy cache with the incremental merge rule
//! - Access evaluation over the cached snapshot
//! - User blacklist, per-user client session ids and the persisted requester
//! - Link filtering helpers
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────┐
//! │               veilsync-domain               │
//! ├─────────────────────────────────────────────┤
//! │  model/      - Snapshot, request, codec     │
//! │  cache/      - PolicyCache & merge rule     │
//! │  evaluator/  - Access queries               │
//! │  blacklist   - Suppressed user ids          │
//! │  session     - Session ids, requester       │
//! │  link_filter - Ignored / whitelisted links  │
//! └─────────────────────────────────────────────┘
//! ```

pub mod blacklist;
pub mod cache;
pub mod error;
pub mod evaluator;
pub mod link_filter;
pub mod model;
pub mod session;

// Re-export commonly used types at the crate root
pub use blacklist::Blacklist;
pub use cache::{CommitOutcome, PolicyCache};
pub use error::{DomainError, DomainResult};
pub use evaluator::{AccessEvaluator, StaticPolicySettings, SUPPORT_BOT_ID};
pub use link_filter::LinkFilter;
pub use model::{
    AccessMap, AccessTable, EntityKind, EntitySet, Organization, PendingRequest, PolicySnapshot,
    RequesterIdentity, TrackedEntities, TrackedEntity,
};
pub use session::ClientSessionIds;
