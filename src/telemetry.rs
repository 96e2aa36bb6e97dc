use std::sync::OnceLock;
use tracing_subscriber::{fmt, layer::SubscriberExt as _, util::SubscriberInitExt as _, EnvFilter};

static INIT: OnceLock<()> = OnceLock::new();

/// Install the global tracing subscriber (`RUST_LOG`, default `info`).
/// Safe to call more than once.
pub fn init_tracing() {
    let _ = INIT.get_or_init(|| {
        let env_filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new("info,tower_http=info"));
        let _ = tracing_subscriber::registry()
            .with(fmt::layer().with_target(false))
            .with(env_filter)
            .try_init();
    });
}
