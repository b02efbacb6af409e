//! Observability setup for the policy client.
//!
//! Only structured logging lives here; the client exposes no metrics or
//! trace exporters of its own.

mod logging;

pub use logging::{create_json_layer, init_logging, LoggingConfig};
