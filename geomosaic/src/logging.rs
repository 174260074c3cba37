//! Logging setup.
//!
//! Console logging via `tracing`, filterable with the `RUST_LOG` environment
//! variable (`info` when unset). Called once by the binary entry point;
//! library code only emits events and never installs a subscriber.

use tracing_subscriber::EnvFilter;

/// Installs the global console subscriber.
///
/// A second call is a no-op, which keeps tests that exercise the full
/// pipeline from tripping over an already-installed subscriber.
pub fn init() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .try_init();
}
