//! Tracing/logging initialization.
//!
//! The filter comes from `RUST_LOG` (default `info`); the output format from
//! [`LOG_FORMAT_VAR`].

use std::str::FromStr;

use thiserror::Error;
use tracing_subscriber::EnvFilter;

pub const LOG_FORMAT_VAR: &str = "FACTURLY_LOG_FORMAT";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LogFormat {
    /// One JSON object per line with timestamps.
    #[default]
    Json,
    /// Multi-line, human-readable.
    Pretty,
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error("unknown log format {0:?} (expected \"json\" or \"pretty\")")]
pub struct ParseLogFormatError(String);

impl FromStr for LogFormat {
    type Err = ParseLogFormatError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "json" => Ok(LogFormat::Json),
            "pretty" => Ok(LogFormat::Pretty),
            _ => Err(ParseLogFormatError(s.to_string())),
        }
    }
}

impl LogFormat {
    /// Format from [`LOG_FORMAT_VAR`]; unset or unknown values fall back to JSON.
    pub fn from_env() -> Self {
        Self::from_value(std::env::var(LOG_FORMAT_VAR).ok().as_deref())
    }

    fn from_value(value: Option<&str>) -> Self {
        match value.map(str::parse::<LogFormat>) {
            Some(Ok(format)) => format,
            Some(Err(e)) => {
                eprintln!("{e}; using json");
                LogFormat::Json
            }
            None => LogFormat::Json,
        }
    }
}

/// Install the global subscriber.
///
/// Returns `false` when one was already installed (the call is then a no-op).
pub fn init(format: LogFormat) -> bool {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let installed = match format {
        LogFormat::Json => tracing_subscriber::fmt()
            .with_env_filter(filter)
            .json()
            .with_timer(tracing_subscriber::fmt::time::SystemTime)
            .with_target(false)
            .try_init(),
        LogFormat::Pretty => tracing_subscriber::fmt()
            .with_env_filter(filter)
            .pretty()
            .try_init(),
    };
    let installed = installed.is_ok();
    if installed {
        ::tracing::debug!(?format, "logging initialized");
    }
    installed
}
