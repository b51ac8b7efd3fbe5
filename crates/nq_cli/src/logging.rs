use std::sync::Once;
use tracing_subscriber::EnvFilter;

static INIT: Once = Once::new();

const DEFAULT_FILTER: &str = "info";

/// Installs the global fmt subscriber once. `RUST_LOG` overrides the default level.
pub fn init_logging() {
    if !tracing::dispatcher::has_been_set() {
        INIT.call_once(|| {
            let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));
            tracing_subscriber::fmt().with_env_filter(filter).init();
        });
    }
}
