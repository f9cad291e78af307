use std::sync::OnceLock;
use tracing_subscriber::{
    EnvFilter, fmt,
    layer::SubscriberExt as _,
    util::SubscriberInitExt as _,
};

static INIT: OnceLock<()> = OnceLock::new();

/// Initializes the global tracing subscriber. Safe to call more than once;
/// later calls are no-ops (tests share one process).
pub fn init_tracing() {
    let _ = INIT.get_or_init(|| {
        let env_filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new("info,smc_agent=debug,tower_http=info"));
        let _ = tracing_subscriber::registry()
            .with(fmt::layer())
            .with(env_filter)
            .try_init();
    });
}
