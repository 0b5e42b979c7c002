//! Logging setup.
//!
//! The filter comes from `RUST_LOG` when set, otherwise from the `[logging]`
//! table of the configuration file. Output is pretty, compact or JSON.

use serde::{Deserialize, Serialize};
use tracing::Level;
use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::prelude::*;
use tracing_subscriber::{EnvFilter, Layer, Registry};

/// Output format of the fmt layer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Pretty,
    Compact,
    Json,
}

/// `[logging]` table.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct LogConfig {
    /// error, warn, info, debug, trace
    pub level: String,
    /// pretty, compact, json
    pub format: String,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "pretty".to_string(),
        }
    }
}

impl LogConfig {
    /// Configured level, `None` if unrecognised
    pub fn level(&self) -> Option<Level> {
        match self.level.to_lowercase().as_str() {
            "error" => Some(Level::ERROR),
            "warn" => Some(Level::WARN),
            "info" => Some(Level::INFO),
            "debug" => Some(Level::DEBUG),
            "trace" => Some(Level::TRACE),
            _ => None,
        }
    }

    /// Configured format, `None` if unrecognised
    pub fn format(&self) -> Option<LogFormat> {
        match self.format.as_str() {
            "pretty" => Some(LogFormat::Pretty),
            "compact" => Some(LogFormat::Compact),
            "json" => Some(LogFormat::Json),
            _ => None,
        }
    }

    /// Filter directive: the configured level for this crate, warn elsewhere
    pub fn filter_directive(&self) -> String {
        let level = self.level().unwrap_or(Level::INFO);
        format!("warn,{}={}", env!("CARGO_CRATE_NAME"), level.as_str().to_lowercase())
    }
}

/// Installs the global subscriber.
///
/// `RUST_LOG` wins over `config`; without either, info level pretty output.
/// Returns false if a subscriber was already installed.
pub fn init_logging(config: Option<&LogConfig>) -> bool {
    let defaults = LogConfig::default();
    let config = config.unwrap_or(&defaults);

    let filter = if std::env::var("RUST_LOG").is_ok() {
        EnvFilter::from_default_env()
    } else {
        EnvFilter::new(config.filter_directive())
    };

    let fmt_layer: Box<dyn Layer<Registry> + Send + Sync> =
        match config.format().unwrap_or(LogFormat::Pretty) {
            LogFormat::Json => tracing_subscriber::fmt::layer()
                .json()
                .with_span_events(FmtSpan::CLOSE)
                .boxed(),
            LogFormat::Compact => tracing_subscriber::fmt::layer().compact().boxed(),
            LogFormat::Pretty => tracing_subscriber::fmt::layer().boxed(),
        };

    tracing_subscriber::registry()
        .with(fmt_layer)
        .with(filter)
        .try_init()
        .is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(level: &str, format: &str) -> LogConfig {
        LogConfig {
            level: level.into(),
            format: format.into(),
        }
    }

    #[test]
    fn test_level() {
        assert_eq!(config("error", "pretty").level(), Some(Level::ERROR));
        assert_eq!(config("DEBUG", "pretty").level(), Some(Level::DEBUG));
        assert_eq!(config("trace", "pretty").level(), Some(Level::TRACE));
        assert_eq!(config("loud", "pretty").level(), None);
    }

    #[test]
    fn test_format() {
        assert_eq!(config("info", "json").format(), Some(LogFormat::Json));
        assert_eq!(config("info", "compact").format(), Some(LogFormat::Compact));
        assert_eq!(config("info", "JSON").format(), None);
    }

    #[test]
    fn test_filter_directive() {
        assert_eq!(config("debug", "pretty").filter_directive(), "warn,flowgate=debug");
        assert_eq!(config("bogus", "pretty").filter_directive(), "warn,flowgate=info");
    }

    #[test]
    fn test_partial_table() {
        let config: LogConfig = toml::from_str(r#"level = "debug""#).unwrap();
        assert_eq!(config.level, "debug");
        assert_eq!(config.format, "pretty");
    }
}
