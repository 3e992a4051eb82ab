//! Tracing configuration for the jarlock CLI
//!
//! Diagnostics go to stderr through `tracing-subscriber`. `RUST_LOG` wins
//! over `--log-level` when set.

use std::io;
pub use tracing::Level;
use tracing_subscriber::{
    EnvFilter, Layer, Registry, layer::SubscriberExt, util::SubscriberInitExt,
};

/// Crates whose diagnostics the default filter enables.
const CRATES: &[&str] = &["jarlock", "jarlock_core", "jarlock_events", "jarlock_resolver"];

/// Targets the event macros mirror to; the listener already shows these.
const MIRRORED_TARGETS: &[&str] = &["jarlock::phase", "jarlock::log"];

/// `--log-format` values
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum TracingFormat {
    /// Multi-line output with targets and source locations
    Pretty,
    /// One line per event
    Compact,
    /// Newline-delimited JSON, including the mirrored progress events
    Json,
}

/// `--log-level` values
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum LogLevel {
    Trace,
    Debug,
    Info,
    /// The default
    Warn,
    Error,
}

impl From<LogLevel> for Level {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::Trace => Self::TRACE,
            LogLevel::Debug => Self::DEBUG,
            LogLevel::Info => Self::INFO,
            LogLevel::Warn => Self::WARN,
            LogLevel::Error => Self::ERROR,
        }
    }
}

/// Subscriber settings derived from the command line.
#[derive(Debug, Clone)]
pub struct TracingConfig {
    pub format: TracingFormat,
    pub level: Level,
}

/// Filter directive used when `RUST_LOG` is unset.
fn default_directive(level: Level, format: TracingFormat) -> String {
    let level = level.as_str().to_ascii_lowercase();
    let enabled = CRATES.iter().map(|krate| format!("{krate}={level}"));
    let silenced = MIRRORED_TARGETS
        .iter()
        .filter(|_| format != TracingFormat::Json)
        .map(|target| format!("{target}=off"));
    enabled.chain(silenced).collect::<Vec<_>>().join(",")
}

fn env_filter(config: &TracingConfig) -> miette::Result<EnvFilter> {
    EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(default_directive(config.level, config.format)))
        .map_err(|e| miette::miette!("Invalid log filter: {e}"))
}

/// Install the global subscriber, writing to stderr.
pub fn init_tracing(config: TracingConfig) -> miette::Result<()> {
    let fmt = tracing_subscriber::fmt::layer().with_writer(io::stderr);
    let layer: Box<dyn Layer<Registry> + Send + Sync> = match config.format {
        TracingFormat::Pretty => fmt.pretty().boxed(),
        TracingFormat::Compact => fmt.compact().with_target(false).boxed(),
        TracingFormat::Json => fmt.json().with_current_span(true).boxed(),
    };

    tracing_subscriber::registry()
        .with(layer.with_filter(env_filter(&config)?))
        .try_init()
        .map_err(|e| miette::miette!("Failed to install tracing subscriber: {e}"))?;

    tracing::debug!(version = env!("CARGO_PKG_VERSION"), format = ?config.format, "Tracing ready");
    Ok(())
}
