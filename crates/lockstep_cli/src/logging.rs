//! Tracing subscriber setup.

use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::GlobalArgs;

/// Picks the filter directive: `--verbose` and `--quiet` win, then
/// `RUST_LOG`, then the configured level.
pub fn filter_directive(global: &GlobalArgs, configured: &str, env: Option<&str>) -> String {
    if global.verbose {
        "debug".to_string()
    } else if global.quiet {
        "error".to_string()
    } else if let Some(env) = env.filter(|e| !e.trim().is_empty()) {
        env.to_string()
    } else {
        configured.to_string()
    }
}

/// Installs a compact stderr logger. Does nothing if one is already set.
pub fn init(global: &GlobalArgs, configured: &str) {
    let env = std::env::var(EnvFilter::DEFAULT_ENV).ok();
    let directive = filter_directive(global, configured, env.as_deref());
    let filter = EnvFilter::try_new(&directive).unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(filter)
        .with(
            fmt::layer()
                .compact()
                .with_target(global.verbose)
                .with_writer(std::io::stderr),
        )
        .try_init()
        .ok();
}
