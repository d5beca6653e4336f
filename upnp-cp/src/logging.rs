//! Logging setup for control point applications
//!
//! The library only emits `tracing` events; applications choose how they are
//! rendered. Console tools that draw their own device lists usually want
//! [`LoggingMode::Silent`].

use tracing_subscriber::{fmt, EnvFilter, Registry};

/// Logging mode for different use cases
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoggingMode {
    /// No subscriber is installed
    Silent,
    /// Compact stderr output
    Development,
    /// Verbose output with thread ids and source locations
    Debug,
}

/// Logging configuration error
#[derive(Debug, thiserror::Error)]
pub enum LoggingError {
    #[error("Failed to initialize tracing subscriber: {0}")]
    TracingInit(String),
}

/// Initialize logging with the specified mode
///
/// # Environment Variables
///
/// - `UPNP_CP_LOG_LEVEL`: filter directives (`debug`, `upnp_cp=trace`, ...),
///   falling back to `RUST_LOG`
pub fn init_logging(mode: LoggingMode) -> Result<(), LoggingError> {
    use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

    match mode {
        LoggingMode::Silent => Ok(()),
        LoggingMode::Development => Registry::default()
            .with(
                fmt::layer()
                    .with_target(false)
                    .with_thread_ids(false)
                    .with_file(false)
                    .with_line_number(false)
                    .compact(),
            )
            .with(create_env_filter("info"))
            .try_init()
            .map_err(|e| LoggingError::TracingInit(e.to_string())),
        LoggingMode::Debug => Registry::default()
            .with(
                fmt::layer()
                    .pretty()
                    .with_thread_ids(true)
                    .with_thread_names(true)
                    .with_file(true)
                    .with_line_number(true),
            )
            .with(create_env_filter("debug"))
            .try_init()
            .map_err(|e| LoggingError::TracingInit(e.to_string())),
    }
}

/// Initialize logging from `UPNP_CP_LOG_MODE` (`silent`, `development`, `debug`).
///
/// Defaults to silent when unset or unrecognized.
pub fn init_logging_from_env() -> Result<(), LoggingError> {
    init_logging(mode_from(std::env::var("UPNP_CP_LOG_MODE").ok().as_deref()))
}

fn mode_from(value: Option<&str>) -> LoggingMode {
    match value.map(str::trim) {
        Some(v) if v.eq_ignore_ascii_case("development") => LoggingMode::Development,
        Some(v) if v.eq_ignore_ascii_case("debug") => LoggingMode::Debug,
        _ => LoggingMode::Silent,
    }
}

/// UPNP_CP_LOG_LEVEL, then RUST_LOG, then `default_level`
fn create_env_filter(default_level: &str) -> EnvFilter {
    if let Ok(level) = std::env::var("UPNP_CP_LOG_LEVEL") {
        EnvFilter::new(level)
    } else if let Ok(rust_log) = std::env::var("RUST_LOG") {
        EnvFilter::new(rust_log)
    } else {
        EnvFilter::new(default_level)
    }
}

/// Whether a global subscriber has been installed
pub fn is_initialized() -> bool {
    tracing::dispatcher::has_been_set()
}
