//! Process-wide tracing setup shared by warden binaries and tests.

pub mod tracing;

pub use crate::tracing::{LogFormat, TracingConfig};

/// Initialize tracing from the environment (`RUST_LOG`, `WARDEN_LOG_FORMAT`).
///
/// Safe to call multiple times; subsequent calls are no-ops.
pub fn init() {
    tracing::init(&TracingConfig::from_env());
}
