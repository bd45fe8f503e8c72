//! Tracing subscriber setup

use medool_domain::{LoggingConfig, MedoolError, Result};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

/// `RUST_LOG` when set, otherwise the configured level.
///
/// # Errors
/// Returns `MedoolError::Config` when neither is a valid filter directive.
pub fn build_filter(config: &LoggingConfig) -> Result<EnvFilter> {
    if let Ok(filter) = EnvFilter::try_from_default_env() {
        return Ok(filter);
    }
    EnvFilter::try_new(&config.level).map_err(|err| {
        MedoolError::Config(format!("invalid log level '{}': {err}", config.level))
    })
}

/// Install a global subscriber.
///
/// Safe to call more than once: when a subscriber is already installed
/// (by an earlier call or by the host) this logs at debug and returns `Ok`.
///
/// # Errors
/// Returns `MedoolError::Config` for an invalid level.
pub fn init_tracing(config: &LoggingConfig) -> Result<()> {
    let filter = build_filter(config)?;
    let registry = tracing_subscriber::registry().with(filter);

    let installed = if config.json {
        registry.with(fmt::layer().json().with_current_span(true)).try_init()
    } else {
        registry.with(fmt::layer().with_target(true).compact()).try_init()
    };

    if let Err(err) = installed {
        tracing::debug!(error = %err, "tracing subscriber already installed");
    }
    Ok(())
}
