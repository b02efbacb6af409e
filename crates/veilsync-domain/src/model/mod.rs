//! Policy data model.
//!
//! This module contains the documents exchanged with the policy service:
//! - `PolicySnapshot`: the cached policy document
//! - `PendingRequest`: the outgoing sync request
//! - `codec`: the JSON wire encoding of both

pub mod codec;
mod request;
mod snapshot;

pub use request::{
    ClientInfo, EntitySet, PendingRequest, RequesterIdentity, TrackedEntities, TrackedEntity,
};
pub use snapshot::{AccessMap, AccessTable, EntityKind, Organization, PolicySnapshot};
