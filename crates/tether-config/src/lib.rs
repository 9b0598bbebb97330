//! Configuration shared by the tether protocol crates.
//!
//! [`Config`] is a plain serde structure so embedding applications can load
//! it from whatever format they already use. Every field has a default;
//! an empty document yields [`Config::default`].
//!
//! ```
//! use std::time::Duration;
//! use tether_config::{Config, LogFormat};
//!
//! let config = Config::default()
//!     .with_log_format(LogFormat::Compact)
//!     .with_request_timeout(Some(Duration::from_secs(5)));
//! assert_eq!(config.log_filter(), "info");
//! assert_eq!(config.request_timeout(), Some(Duration::from_secs(5)));
//! ```

pub mod defaults;
mod logging;

use std::time::Duration;

use serde::{Deserialize, Serialize};

pub use crate::logging::{LogFormat, LogFormatParseError};

/// Runtime settings for one protocol connection and its telemetry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    #[serde(default = "defaults::default_log_filter_string")]
    log_filter: String,
    #[serde(default = "defaults::default_log_format")]
    log_format: LogFormat,
    /// Whole seconds a property request may stay unanswered. Absent means
    /// requests wait until answered or disconnected.
    request_timeout_secs: Option<u64>,
    #[serde(default = "defaults::default_max_frame_bytes")]
    max_frame_bytes: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            log_filter: defaults::default_log_filter_string(),
            log_format: defaults::default_log_format(),
            request_timeout_secs: None,
            max_frame_bytes: defaults::default_max_frame_bytes(),
        }
    }
}

impl Config {
    /// Returns the `tracing` filter expression, e.g. `info,tether=debug`.
    #[must_use]
    pub fn log_filter(&self) -> &str {
        &self.log_filter
    }

    /// Returns the log output format.
    #[must_use]
    pub const fn log_format(&self) -> LogFormat {
        self.log_format
    }

    /// Returns how long a property request may wait for its response.
    ///
    /// `None` disables expiry.
    #[must_use]
    pub const fn request_timeout(&self) -> Option<Duration> {
        match self.request_timeout_secs {
            Some(secs) => Some(Duration::from_secs(secs)),
            None => None,
        }
    }

    /// Returns the largest inbound frame accepted by line-framed sources.
    #[must_use]
    pub const fn max_frame_bytes(&self) -> usize {
        self.max_frame_bytes
    }

    /// Replaces the log filter expression.
    #[must_use]
    pub fn with_log_filter(mut self, filter: impl Into<String>) -> Self {
        self.log_filter = filter.into();
        self
    }

    /// Replaces the log output format.
    #[must_use]
    pub const fn with_log_format(mut self, format: LogFormat) -> Self {
        self.log_format = format;
        self
    }

    /// Replaces the request timeout. Sub-second precision is discarded.
    #[must_use]
    pub const fn with_request_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.request_timeout_secs = match timeout {
            Some(duration) => Some(duration.as_secs()),
            None => None,
        };
        self
    }

    /// Replaces the inbound frame limit.
    #[must_use]
    pub const fn with_max_frame_bytes(mut self, limit: usize) -> Self {
        self.max_frame_bytes = limit;
        self
    }
}
