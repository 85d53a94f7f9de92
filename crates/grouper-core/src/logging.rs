use std::sync::Once;

use tracing_subscriber::{fmt, EnvFilter};

static INIT: Once = Once::new();

/// Install the global tracing subscriber. Idempotent so tests and the
/// process bootstrap can both call it.
pub fn init() {
    INIT.call_once(|| {
        let filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new("info,grouper_core=debug"));

        fmt()
            .with_env_filter(filter)
            .with_target(true)
            .init();
    });
}
