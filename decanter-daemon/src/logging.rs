//! Tracing setup for decanter-daemon.
//!
//! Collector lifecycle (listener bound, loops started and stopped) is
//! logged at `info`. Rejected connections, malformed or oversized records
//! and dropped bus events are logged at `warn`. Every collected event is
//! logged at `debug` by the event logger task, so `debug` is noisy on a
//! busy bus. All output goes to stderr.

use std::fmt;
use std::str::FromStr;

use anyhow::{Context, Result};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use decanter_core::config::GeneralConfig;

/// Output format of the daemon log.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    /// One JSON object per line, for log shippers.
    Json,
    /// Multi-line colored output for a terminal.
    Pretty,
}

impl FromStr for LogFormat {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "json" => Ok(Self::Json),
            "pretty" => Ok(Self::Pretty),
            other => Err(anyhow::anyhow!(
                "unknown log format '{other}', expected 'json' or 'pretty'"
            )),
        }
    }
}

impl fmt::Display for LogFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Json => "json",
            Self::Pretty => "pretty",
        })
    }
}

/// Build the event filter. `RUST_LOG` wins over the configured level.
fn build_filter(log_level: &str) -> Result<EnvFilter> {
    match EnvFilter::try_from_default_env() {
        Ok(filter) => Ok(filter),
        Err(_) => EnvFilter::try_new(log_level)
            .with_context(|| format!("invalid log level '{log_level}'")),
    }
}

/// Install the global tracing subscriber for the daemon.
///
/// Must be called once, before the orchestrator is built, so collector
/// startup is captured.
pub fn init_tracing(config: &GeneralConfig) -> Result<()> {
    let format: LogFormat = config.log_format.parse()?;
    let filter = build_filter(&config.log_level)?;
    let layer = tracing_subscriber::fmt::layer().with_writer(std::io::stderr);

    let installed = match format {
        LogFormat::Json => tracing_subscriber::registry()
            .with(filter)
            .with(layer.json())
            .try_init(),
        LogFormat::Pretty => tracing_subscriber::registry()
            .with(filter)
            .with(layer.pretty())
            .try_init(),
    };
    installed.with_context(|| format!("failed to install {format} log subscriber"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn log_format_parses_known_names() {
        assert_eq!("json".parse::<LogFormat>().unwrap(), LogFormat::Json);
        assert_eq!("pretty".parse::<LogFormat>().unwrap(), LogFormat::Pretty);
        assert_eq!(LogFormat::Json.to_string(), "json");
    }

    #[test]
    fn log_format_rejects_unknown_name() {
        let err = "xml".parse::<LogFormat>().unwrap_err();
        assert!(err.to_string().contains("xml"));
    }

    #[test]
    fn unknown_format_fails_before_install() {
        let config = GeneralConfig {
            log_format: "yaml".to_owned(),
            ..Default::default()
        };
        assert!(init_tracing(&config).is_err());
    }
}
