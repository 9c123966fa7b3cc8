//! Logging configuration for plexus-di
//!
//! Easy setup for structured logging with JSON (production) or pretty
//! (development) output.
//!
//! # Features
//!
//! - `logging` - emit `tracing` events from the container (default)
//! - `logging-json` - JSON structured output (production)
//! - `logging-pretty` - colorful output (development)
//!
//! # Example
//!
//! ```rust,ignore
//! use plexus_di::logging;
//!
//! logging::init_pretty();
//!
//! // Or configure explicitly
//! logging::builder()
//!     .with_level(tracing::Level::TRACE)
//!     .di_only()
//!     .compact()
//!     .init();
//! ```

#[cfg(feature = "logging")]
use tracing::Level;

/// Logging format configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    /// JSON structured logging (production default)
    #[default]
    Json,
    /// Pretty colorful output (development)
    Pretty,
    /// Compact single-line output
    Compact,
}

/// Builder for logging configuration
#[cfg(feature = "logging")]
#[derive(Debug, Clone)]
pub struct LoggingBuilder {
    level: Level,
    format: LogFormat,
    target: Option<&'static str>,
}

#[cfg(feature = "logging")]
impl Default for LoggingBuilder {
    fn default() -> Self {
        Self {
            level: Level::DEBUG,
            format: LogFormat::Json,
            target: None,
        }
    }
}

#[cfg(feature = "logging")]
impl LoggingBuilder {
    /// Create a new logging builder with default settings
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the minimum log level
    pub fn with_level(mut self, level: Level) -> Self {
        self.level = level;
        self
    }

    /// Filter to only show logs from a specific target
    pub fn with_target_filter(mut self, target: &'static str) -> Self {
        self.target = Some(target);
        self
    }

    /// Only show plexus-di logs
    pub fn di_only(self) -> Self {
        self.with_target_filter("plexus_di")
    }

    /// Use JSON structured logging format
    pub fn json(mut self) -> Self {
        self.format = LogFormat::Json;
        self
    }

    /// Use pretty colorful logging format
    pub fn pretty(mut self) -> Self {
        self.format = LogFormat::Pretty;
        self
    }

    /// Use compact single-line logging format
    pub fn compact(mut self) -> Self {
        self.format = LogFormat::Compact;
        self
    }

    /// Install the logging subscriber with the configured settings.
    ///
    /// Installation happens at most once per process; later calls are
    /// silently ignored. Requires either `logging-json` or
    /// `logging-pretty`.
    #[cfg(any(feature = "logging-json", feature = "logging-pretty"))]
    pub fn init(self) {
        use once_cell::sync::OnceCell;
        use tracing_subscriber::{EnvFilter, fmt, prelude::*};

        static INSTALLED: OnceCell<()> = OnceCell::new();

        INSTALLED.get_or_init(|| {
            let filter = if let Some(target) = self.target {
                EnvFilter::new(format!("{}={}", target, self.level))
            } else {
                EnvFilter::new(self.level.to_string())
            };

            match self.format {
                #[cfg(feature = "logging-json")]
                LogFormat::Json => {
                    let _ = tracing_subscriber::registry()
                        .with(filter)
                        .with(fmt::layer().json().with_target(true))
                        .try_init();
                }
                #[cfg(not(feature = "logging-json"))]
                LogFormat::Json => {
                    let _ = tracing_subscriber::registry()
                        .with(filter)
                        .with(fmt::layer().with_target(true))
                        .try_init();
                }
                LogFormat::Pretty => {
                    let _ = tracing_subscriber::registry()
                        .with(filter)
                        .with(fmt::layer().pretty().with_target(true))
                        .try_init();
                }
                LogFormat::Compact => {
                    let _ = tracing_subscriber::registry()
                        .with(filter)
                        .with(fmt::layer().compact().with_target(true))
                        .try_init();
                }
            }
        });
    }

    /// Initialize (no-op when subscriber features not available)
    #[cfg(not(any(feature = "logging-json", feature = "logging-pretty")))]
    pub fn init(self) {
        // No-op: requires logging-json or logging-pretty
    }
}

/// Create a new logging builder
#[cfg(feature = "logging")]
pub fn builder() -> LoggingBuilder {
    LoggingBuilder::new()
}

/// Initialize logging with default settings.
///
/// JSON format when `logging-json` is enabled, pretty otherwise.
#[cfg(feature = "logging")]
pub fn init() {
    #[cfg(feature = "logging-json")]
    builder().json().init();
    #[cfg(not(feature = "logging-json"))]
    builder().pretty().init();
}

/// Initialize JSON structured logging
#[cfg(feature = "logging")]
pub fn init_json() {
    builder().json().init();
}

/// Initialize pretty colorful logging
#[cfg(feature = "logging")]
pub fn init_pretty() {
    builder().pretty().init();
}

#[cfg(all(test, feature = "logging"))]
mod tests {
    use super::*;

    #[test]
    fn builder_defaults() {
        let builder = LoggingBuilder::default();
        assert_eq!(builder.level, Level::DEBUG);
        assert_eq!(builder.format, LogFormat::Json);
        assert!(builder.target.is_none());
    }

    #[test]
    fn builder_chain() {
        let builder = LoggingBuilder::new()
            .with_level(Level::TRACE)
            .pretty()
            .di_only();

        assert_eq!(builder.level, Level::TRACE);
        assert_eq!(builder.format, LogFormat::Pretty);
        assert_eq!(builder.target, Some("plexus_di"));
    }
}
