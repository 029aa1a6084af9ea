//! Tracing subscriber setup shared by the Beacon binaries.
//!
//! `RUST_LOG` selects levels (default `info`), `RUST_LOG_FORMAT=json` switches
//! to one JSON object per line for log shippers.

use std::env::var;
use std::str::FromStr;

use tracing::{level_filters::LevelFilter, warn};
use tracing_subscriber::{
    Layer, filter::EnvFilter, layer::SubscriberExt, util::SubscriberInitExt, util::TryInitError,
};

/// Output format of the installed subscriber
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    #[default]
    Compact,
    Json,
}

impl FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "" | "compact" | "text" => Ok(LogFormat::Compact),
            "json" => Ok(LogFormat::Json),
            other => Err(format!("unknown log format: {other}")),
        }
    }
}

impl LogFormat {
    /// Format requested through `RUST_LOG_FORMAT`, compact when unset
    pub fn from_env() -> Self {
        let Ok(raw) = var("RUST_LOG_FORMAT") else {
            return LogFormat::Compact;
        };
        raw.parse().unwrap_or_else(|error| {
            eprintln!("{error}, falling back to compact logs");
            LogFormat::Compact
        })
    }
}

/// Install the global subscriber at `info`
pub fn init_tracing() {
    init_with_level(LevelFilter::INFO);
}

/// Install the global subscriber with `level` as the default directive.
///
/// A second call is a no-op apart from a warning.
pub fn init_with_level(level: LevelFilter) {
    if let Err(error) = try_init(level, LogFormat::from_env()) {
        warn!("Tracing already initialized: {error}");
    }
}

pub fn try_init(level: LevelFilter, format: LogFormat) -> Result<(), TryInitError> {
    let env_filter = EnvFilter::builder().with_default_directive(level.into()).from_env_lossy();

    let log_layer = match format {
        LogFormat::Json => tracing_subscriber::fmt::layer()
            .json()
            .with_current_span(false)
            .with_filter(env_filter)
            .boxed(),
        LogFormat::Compact => tracing_subscriber::fmt::layer()
            .compact()
            .with_target(false)
            .with_filter(env_filter)
            .boxed(),
    };

    tracing_subscriber::registry().with(log_layer).try_init()
}
