//! Core infrastructure shared by provision nodes.
//!
//! Currently this is the tracing setup: [`TracingConfig`] collects level,
//! filter and format settings, either through its builder or from the
//! `PROVISION_LOG` / `PROVISION_LOG_FORMAT` environment variables, and
//! installs the global subscriber.

mod telemetry;

pub use telemetry::{LOG_ENV, LOG_FORMAT_ENV, ParseFormatError, TracingConfig, TracingFormat};
