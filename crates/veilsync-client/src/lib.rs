//! veilsync-client: Policy sync runtime
//!
//! This crate wires the policy domain to the network:
//! - Request coordinator with coalescing, throttling and blacklist checks
//! - HTTP policy transport
//! - Account deletion flow
//! - Configuration management and logging setup
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────┐
//! │               veilsync-client               │
//! ├─────────────────────────────────────────────┤
//! │  config.rs      - Configuration management  │
//! │  client.rs      - Component wiring          │
//! │  coordinator/   - Sync state machine        │
//! │  transport.rs   - PolicyTransport & HTTP    │
//! │  account.rs     - Account deletion flow     │
//! │  observability/ - Logging setup             │
//! └─────────────────────────────────────────────┘
//! ```

pub mod account;
pub mod client;
pub mod config;
pub mod coordinator;
pub mod observability;
pub mod transport;

// Re-exports for convenience
pub use account::{AccountDeletion, AccountDeletionError};
pub use client::{ClientError, PolicyClient};
pub use config::{ClientConfig, ConfigLoadError};
pub use coordinator::{CoordinatorSettings, RequestCoordinator, SyncState};
pub use transport::{HttpPolicyTransport, PolicyTransport, TransportError};
