//! Tracing subscriber setup for processes embedding the verifier

use crate::config::ObservabilityConfig;
use anyhow::anyhow;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Install a global subscriber: `RUST_LOG` if set, otherwise the configured
/// level; JSON or human-readable output.
pub fn init_tracing(config: &ObservabilityConfig) -> crate::Result<()> {
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.log_level))
        .map_err(|e| anyhow!("invalid log filter {:?}: {e}", config.log_level))?;

    let result = if config.json_logs {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer().json())
            .try_init()
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer())
            .try_init()
    };

    result.map_err(|e| anyhow!("failed to install tracing subscriber: {e}"))?;
    Ok(())
}
