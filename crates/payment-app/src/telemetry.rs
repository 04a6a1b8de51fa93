use std::sync::Once;

use tracing_subscriber::{fmt, EnvFilter};

const DEFAULT_FILTER: &str = "payment_model=info,payment_report=info";

static TRACING_INIT: Once = Once::new();

/// Installs the stderr fmt subscriber; `RUST_LOG` overrides the default filter.
pub fn init_tracing() {
    TRACING_INIT.call_once(|| {
        let filter =
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));
        fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .init();
    });
}
