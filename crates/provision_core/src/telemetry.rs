//! Tracing subscriber setup.
//!
//! [`TracingConfig`] describes how a node wants its logs: the default level,
//! an optional per-target filter, the output format, and whether span
//! enter/exit events are printed. [`TracingConfig::init`] installs a
//! `tracing-subscriber` registry accordingly.
//!
//! # Example
//!
//! ```
//! use provision_core::{TracingConfig, TracingFormat};
//! use tracing::Level;
//!
//! // Development: pretty output with span events
//! let dev = TracingConfig::new()
//!     .with_level(Level::DEBUG)
//!     .with_format(TracingFormat::Pretty)
//!     .with_span_events(true);
//!
//! // Production: JSON lines for log aggregation
//! let prod = TracingConfig::new()
//!     .with_format(TracingFormat::Json)
//!     .with_env_filter("provision_engine=info,provision_store=warn");
//! # let _ = (dev, prod);
//! ```

use core::str::FromStr;
use thiserror::Error;
use tracing::Level;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

/// Environment variable holding an `EnvFilter` directive, e.g. `debug` or
/// `provision_engine=trace,info`.
pub const LOG_ENV: &str = "PROVISION_LOG";

/// Environment variable selecting the output format: `pretty`, `compact` or
/// `json`.
pub const LOG_FORMAT_ENV: &str = "PROVISION_LOG_FORMAT";

/// Tracing output format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum TracingFormat {
    /// Human-readable colored output (default).
    #[default]
    Pretty,
    /// Compact single-line output.
    Compact,
    /// JSON structured output.
    Json,
}

/// Error returned when a format name is not recognized.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown tracing format '{0}', expected one of: pretty, compact, json")]
pub struct ParseFormatError(String);

impl FromStr for TracingFormat {
    type Err = ParseFormatError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "pretty" => Ok(Self::Pretty),
            "compact" => Ok(Self::Compact),
            "json" => Ok(Self::Json),
            _ => Err(ParseFormatError(s.to_owned())),
        }
    }
}

/// Tracing configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TracingConfig {
    /// Maximum level when no filter is set.
    pub level: Level,
    /// Output format.
    pub format: TracingFormat,
    /// Filter directive (e.g. `provision_engine=debug,info`). Takes
    /// precedence over `level` when valid.
    pub env_filter: Option<String>,
    /// Whether to include span enter/exit events.
    pub span_events: bool,
}

impl Default for TracingConfig {
    fn default() -> Self {
        Self {
            level: Level::INFO,
            format: TracingFormat::Pretty,
            env_filter: None,
            span_events: false,
        }
    }
}

impl TracingConfig {
    /// Creates a configuration with default settings.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Reads [`LOG_ENV`] and [`LOG_FORMAT_ENV`] from the process environment.
    ///
    /// Unset or empty variables keep their defaults.
    pub fn from_env() -> Result<Self, ParseFormatError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Like [`from_env`](Self::from_env), with variables resolved through
    /// `lookup`.
    pub fn from_lookup(
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, ParseFormatError> {
        let mut config = Self::default();

        if let Some(filter) = lookup(LOG_ENV).filter(|v| !v.trim().is_empty()) {
            config.env_filter = Some(filter);
        }
        if let Some(format) = lookup(LOG_FORMAT_ENV).filter(|v| !v.trim().is_empty()) {
            config.format = format.parse()?;
        }
        Ok(config)
    }

    /// Sets the maximum log level.
    #[must_use]
    pub fn with_level(mut self, level: Level) -> Self {
        self.level = level;
        self
    }

    /// Sets the output format.
    #[must_use]
    pub fn with_format(mut self, format: TracingFormat) -> Self {
        self.format = format;
        self
    }

    /// Sets a filter directive.
    ///
    /// Format: `target=level,target=level,...`
    #[must_use]
    pub fn with_env_filter(mut self, filter: impl Into<String>) -> Self {
        self.env_filter = Some(filter.into());
        self
    }

    /// Enables span enter/exit events in output.
    #[must_use]
    pub fn with_span_events(mut self, enabled: bool) -> Self {
        self.span_events = enabled;
        self
    }

    /// Builds the filter. An invalid directive falls back to `level`.
    pub fn filter(&self) -> EnvFilter {
        match &self.env_filter {
            Some(filter) => {
                EnvFilter::try_new(filter).unwrap_or_else(|_| EnvFilter::new(self.level.as_str()))
            }
            None => EnvFilter::new(self.level.as_str()),
        }
    }

    /// Installs the global subscriber.
    ///
    /// Returns `false` if a global subscriber was already installed, in which
    /// case this call changes nothing.
    pub fn init(&self) -> bool {
        let span_events = if self.span_events {
            FmtSpan::ENTER | FmtSpan::EXIT
        } else {
            FmtSpan::NONE
        };

        let registry = tracing_subscriber::registry().with(self.filter());
        let installed = match self.format {
            TracingFormat::Pretty => registry
                .with(
                    tracing_subscriber::fmt::layer()
                        .pretty()
                        .with_span_events(span_events),
                )
                .try_init()
                .is_ok(),
            TracingFormat::Compact => registry
                .with(
                    tracing_subscriber::fmt::layer()
                        .compact()
                        .with_span_events(span_events),
                )
                .try_init()
                .is_ok(),
            TracingFormat::Json => registry
                .with(
                    tracing_subscriber::fmt::layer()
                        .json()
                        .with_span_events(span_events),
                )
                .try_init()
                .is_ok(),
        };

        if installed {
            tracing::info!(
                level = %self.level,
                format = ?self.format,
                filter = self.env_filter.as_deref(),
                "tracing initialized"
            );
        }
        installed
    }
}
