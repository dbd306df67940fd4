// Telemetry: tracing subscriber setup
use tracing::info;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use crate::{Result, TallyError};

/// Default directive when RUST_LOG is unset
pub const DEFAULT_FILTER: &str = "info,tally_core=info,tally_bridge=info";

/// Install a fmt subscriber honoring `RUST_LOG`, falling back to `default_filter`.
///
/// Fails if a global subscriber is already installed.
pub fn init_tracing(default_filter: &str) -> Result<()> {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_filter));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer().with_target(true))
        .try_init()
        .map_err(|e| TallyError::Internal(format!("failed to install tracing subscriber: {e}")))?;

    info!(target: "telemetry", "Tracing initialized");
    Ok(())
}
