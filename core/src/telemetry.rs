// Logging setup
//
// Installs a tracing-subscriber fmt layer filtered by RUST_LOG.

use tracing::info;
use tracing_subscriber::EnvFilter;

const DEFAULT_DIRECTIVES: &str = "info,gridwatch_core=info";

/// Initialize tracing with the default filter (`RUST_LOG` overrides it)
pub fn init_tracing() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    init_tracing_with(DEFAULT_DIRECTIVES)
}

/// Initialize tracing, falling back to `directives` when `RUST_LOG` is unset
///
/// Fails if a global subscriber is already installed.
pub fn init_tracing_with(directives: &str) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(directives));

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(true)
        .try_init()?;

    info!(target: "telemetry", "Tracing initialized");
    Ok(())
}
