//! Structured logging for the ANN index engine.
//!
//! Opt-in: the core never requires a subscriber to be installed. Hosts that
//! want tracing output call [`init_logging`] or [`init_from_env`] once at
//! startup.

use anyhow::Result;
use std::io;
use tracing_subscriber::{
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    EnvFilter, Layer, Registry,
};

/// Logging configuration.
#[derive(Clone, Debug)]
pub struct LogConfig {
    /// Log level (trace, debug, info, warn, error).
    pub level: String,

    /// Enable JSON output (default: true).
    pub json_format: bool,

    /// Enable span enter/exit events (default: true).
    pub log_spans: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json_format: true,
            log_spans: true,
        }
    }
}

impl LogConfig {
    pub fn production() -> Self {
        Self {
            level: "info".to_string(),
            json_format: true,
            log_spans: true,
        }
    }

    pub fn development() -> Self {
        Self {
            level: "debug".to_string(),
            json_format: false,
            log_spans: true,
        }
    }

    pub fn verbose() -> Self {
        Self {
            level: "trace".to_string(),
            json_format: false,
            log_spans: true,
        }
    }
}

/// Initialize structured logging with the given configuration.
pub fn init_logging(config: LogConfig) -> Result<()> {
    let filter = EnvFilter::try_new(&config.level).or_else(|_| EnvFilter::try_new("info"))?;

    let span_events = if config.log_spans {
        FmtSpan::NEW | FmtSpan::CLOSE
    } else {
        FmtSpan::NONE
    };

    if config.json_format {
        let fmt_layer = fmt::layer()
            .json()
            .with_span_events(span_events)
            .with_current_span(true)
            .with_target(true)
            .with_writer(io::stdout);

        let subscriber = Registry::default().with(filter).with(fmt_layer);
        tracing::subscriber::set_global_default(subscriber)?;
    } else {
        let fmt_layer = fmt::layer()
            .pretty()
            .with_span_events(span_events)
            .with_target(true)
            .with_writer(io::stdout);

        let subscriber = Registry::default().with(filter).with(fmt_layer);
        tracing::subscriber::set_global_default(subscriber)?;
    }

    Ok(())
}

/// Initialize logging from `RUST_LOG` and `ANNIDX_LOG_FORMAT` environment variables.
pub fn init_from_env() -> Result<()> {
    let level = std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string());
    let json_format = std::env::var("ANNIDX_LOG_FORMAT")
        .map(|v| v == "json")
        .unwrap_or(true);

    init_logging(LogConfig {
        level,
        json_format,
        log_spans: true,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_json_info() {
        let config = LogConfig::default();
        assert_eq!(config.level, "info");
        assert!(config.json_format);
    }

    #[test]
    fn test_development_config_is_pretty_debug() {
        let config = LogConfig::development();
        assert_eq!(config.level, "debug");
        assert!(!config.json_format);
    }

    #[test]
    fn test_verbose_config_is_trace() {
        assert_eq!(LogConfig::verbose().level, "trace");
    }
}
