//! Process-wide `tracing` subscriber installation.
//!
//! The protocol crates only emit events; embedding applications decide
//! whether and how to collect them. [`initialise`] is the stock way to do so.

use std::io::{self, IsTerminal};

use once_cell::sync::OnceCell;
use tether_config::{Config, LogFormat};
use thiserror::Error;
use tracing::{Subscriber, subscriber::SetGlobalDefaultError};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt;

static TELEMETRY_GUARD: OnceCell<()> = OnceCell::new();

/// Proof that telemetry has been initialised.
#[derive(Debug, Default, Clone, Copy)]
pub struct TelemetryHandle;

/// Errors encountered while configuring telemetry.
#[derive(Debug, Error)]
pub enum TelemetryError {
    /// The configured filter expression did not parse.
    #[error("invalid log filter: {0}")]
    Filter(String),
    /// Another subscriber was already installed by someone else.
    #[error("failed to install telemetry subscriber: {0}")]
    Subscriber(SetGlobalDefaultError),
}

/// Installs a global subscriber writing to stderr.
///
/// Only the first successful call has an effect; later calls return a
/// handle without touching global state, whatever their configuration.
///
/// ```
/// use tether::telemetry;
/// use tether_config::{Config, LogFormat};
///
/// # fn main() -> Result<(), telemetry::TelemetryError> {
/// let config = Config::default().with_log_format(LogFormat::Compact);
/// telemetry::initialise(&config)?;
/// telemetry::initialise(&Config::default())?;
/// # Ok(())
/// # }
/// ```
///
/// # Errors
///
/// Returns [`TelemetryError::Filter`] for an invalid filter expression and
/// [`TelemetryError::Subscriber`] when a foreign global subscriber exists.
pub fn initialise(config: &Config) -> Result<TelemetryHandle, TelemetryError> {
    TELEMETRY_GUARD
        .get_or_try_init(|| install_subscriber(config))
        .map(|_| TelemetryHandle)
}

fn parse_filter(config: &Config) -> Result<EnvFilter, TelemetryError> {
    EnvFilter::try_new(config.log_filter())
        .map_err(|error| TelemetryError::Filter(error.to_string()))
}

fn install_subscriber(config: &Config) -> Result<(), TelemetryError> {
    let format = config.log_format();
    let builder = fmt::Subscriber::builder()
        .with_env_filter(parse_filter(config)?)
        .with_writer(io::stderr)
        .with_ansi(io::stderr().is_terminal() && !format.is_structured());

    let subscriber: Box<dyn Subscriber + Send + Sync> = match format {
        LogFormat::Json => Box::new(builder.json().flatten_event(true).finish()),
        LogFormat::Compact => Box::new(builder.compact().finish()),
        LogFormat::Pretty => Box::new(builder.pretty().finish()),
    };
    tracing::subscriber::set_global_default(subscriber).map_err(TelemetryError::Subscriber)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_invalid_filters() {
        let config = Config::default().with_log_filter("tether=notalevel[");
        let err = install_subscriber(&config).expect_err("filter should not parse");
        assert!(matches!(err, TelemetryError::Filter(_)), "got {err}");
    }

    #[test]
    fn accepts_per_target_directives() {
        let config = Config::default().with_log_filter("warn,tether::channel=trace");
        assert!(parse_filter(&config).is_ok());
    }
}
