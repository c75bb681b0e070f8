//! Trellis Logging
//!
//! Installs a `tracing` subscriber for the Trellis crates, controlled by
//! environment variables so that services can switch formats without a
//! rebuild.
//!
//! # Usage
//!
//! ```rust,no_run
//! use trellis_log::{info, LogConfig};
//!
//! LogConfig::from_env().init();
//! info!(port = 8080, "router ready");
//! ```
//!
//! # Environment Variables
//!
//! - `TRELLIS_DEBUG=1` - Enable debug logging
//! - `TRELLIS_LOG_LEVEL=trace|debug|info|warn|error|off` - Set log level
//! - `TRELLIS_LOG_FORMAT=json|pretty|compact` - Set output format
//! - `TRELLIS_LOG_COLOR=1|0` - Enable/disable colors
//! - `TRELLIS_LOG_TIMESTAMPS=1|0` - Include timestamps
//! - `RUST_LOG` - When set, overrides the level with a full filter directive

use once_cell::sync::Lazy;
use std::env;
use tracing_subscriber::fmt;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::{SubscriberInitExt, TryInitError};
use tracing_subscriber::{EnvFilter, Layer, Registry};

pub use tracing::{debug, error, info, instrument, trace, warn};

// ============================================================================
// Log Levels
// ============================================================================

/// Log level for Trellis logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Level {
    /// Trace level (most verbose)
    Trace,
    /// Debug level
    Debug,
    /// Info level
    Info,
    /// Warning level
    Warn,
    /// Error level (least verbose)
    Error,
    /// Off (no logging)
    Off,
}

impl Level {
    /// Get level from string.
    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "trace" => Some(Level::Trace),
            "debug" => Some(Level::Debug),
            "info" => Some(Level::Info),
            "warn" | "warning" => Some(Level::Warn),
            "error" => Some(Level::Error),
            "off" | "none" => Some(Level::Off),
            _ => None,
        }
    }

    /// Directive understood by `EnvFilter`.
    pub fn as_directive(&self) -> &'static str {
        match self {
            Level::Trace => "trace",
            Level::Debug => "debug",
            Level::Info => "info",
            Level::Warn => "warn",
            Level::Error => "error",
            Level::Off => "off",
        }
    }
}

impl std::fmt::Display for Level {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.as_directive().to_uppercase())
    }
}

// ============================================================================
// Log Format
// ============================================================================

/// Output format for log messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    /// Multi-line human readable output
    Pretty,
    /// Compact single-line format
    Compact,
    /// JSON format for structured logging
    Json,
}

impl Format {
    /// Get format from string.
    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "pretty" => Some(Format::Pretty),
            "compact" => Some(Format::Compact),
            "json" => Some(Format::Json),
            _ => None,
        }
    }
}

// ============================================================================
// Configuration
// ============================================================================

/// Environment snapshot taken on first use.
static ENV_CONFIG: Lazy<LogConfig> = Lazy::new(LogConfig::read_env);

/// Logging configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogConfig {
    /// Minimum log level
    pub level: Level,
    /// Output format
    pub format: Format,
    /// Whether ANSI colors are enabled (ignored for JSON)
    pub color: bool,
    /// Whether to include timestamps
    pub timestamps: bool,
    /// Whether to include the event target (module path)
    pub targets: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: Level::Info,
            format: Format::Json,
            color: false,
            timestamps: true,
            targets: true,
        }
    }
}

impl LogConfig {
    /// Create the default configuration (JSON, info level).
    pub fn new() -> Self {
        Self::default()
    }

    /// Configuration read from the `TRELLIS_*` environment variables.
    ///
    /// The environment is read once per process; later calls return the
    /// same snapshot.
    pub fn from_env() -> Self {
        ENV_CONFIG.clone()
    }

    fn read_env() -> Self {
        let flag = |name: &str| {
            env::var(name)
                .ok()
                .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
        };

        let debug = flag("TRELLIS_DEBUG").unwrap_or(false);

        let level = env::var("TRELLIS_LOG_LEVEL")
            .ok()
            .and_then(|s| Level::from_str(&s))
            .unwrap_or(if debug { Level::Debug } else { Level::Info });

        let format = env::var("TRELLIS_LOG_FORMAT")
            .ok()
            .and_then(|s| Format::from_str(&s))
            .unwrap_or(Format::Json);

        let color = flag("TRELLIS_LOG_COLOR")
            .unwrap_or_else(|| env::var("NO_COLOR").is_err() && env::var("TERM").is_ok());

        Self {
            level,
            format,
            color: color && format != Format::Json,
            timestamps: flag("TRELLIS_LOG_TIMESTAMPS").unwrap_or(true),
            targets: true,
        }
    }

    /// Set the minimum level.
    pub fn level(mut self, level: Level) -> Self {
        self.level = level;
        self
    }

    /// Set the output format.
    pub fn format(mut self, format: Format) -> Self {
        self.format = format;
        self
    }

    /// Enable or disable colors.
    pub fn with_color(mut self, color: bool) -> Self {
        self.color = color;
        self
    }

    /// Enable or disable timestamps.
    pub fn with_timestamps(mut self, timestamps: bool) -> Self {
        self.timestamps = timestamps;
        self
    }

    /// Enable or disable event targets.
    pub fn with_targets(mut self, targets: bool) -> Self {
        self.targets = targets;
        self
    }

    /// Build the filter. `RUST_LOG` wins over the configured level.
    pub fn env_filter(&self) -> EnvFilter {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(self.level.as_directive()))
    }

    fn fmt_layer(&self) -> Box<dyn Layer<Registry> + Send + Sync> {
        let base = fmt::layer()
            .with_writer(std::io::stderr)
            .with_target(self.targets)
            .with_ansi(self.color);

        match (self.format, self.timestamps) {
            #[cfg(feature = "json")]
            (Format::Json, true) => base.json().boxed(),
            #[cfg(feature = "json")]
            (Format::Json, false) => base.json().without_time().boxed(),
            (Format::Pretty, true) => base.pretty().boxed(),
            (Format::Pretty, false) => base.pretty().without_time().boxed(),
            (_, true) => base.compact().boxed(),
            (_, false) => base.compact().without_time().boxed(),
        }
    }

    /// Install the global subscriber, failing if one is already set.
    pub fn try_init(&self) -> Result<(), TryInitError> {
        tracing_subscriber::registry()
            .with(self.fmt_layer())
            .with(self.env_filter())
            .try_init()
    }

    /// Install the global subscriber.
    ///
    /// A subscriber installed earlier (for example by a test harness) is
    /// left in place.
    pub fn init(&self) {
        if self.try_init().is_err() {
            tracing::debug!("global subscriber already installed, keeping it");
        }
    }
}

/// Initialize logging from the environment.
pub fn init() {
    LogConfig::from_env().init();
}

// ============================================================================
// Tests
// ============================================================================
