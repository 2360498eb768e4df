//! Logging initialization for ChipClaw.
//!
//! Supports three formats:
//! - `pretty`: multi-line human-readable output for a terminal
//! - `compact`: one line per event, `[LEVEL] target message {fields}`; use the
//!   [`log_component!`] macro to tag events with a `component` field
//! - `json`: structured JSON lines for log shippers

use crate::config::{LogFormat, LoggingConfig};
use crate::error::{ChipClawError, Result};

/// Initialize the global tracing subscriber from config.
///
/// Call this once at startup before any tracing events are emitted.
/// `RUST_LOG` takes precedence over `cfg.level` when set.
///
/// # Errors
/// Returns `ChipClawError::Config` if a subscriber is already installed and
/// `ChipClawError::Io` if the configured log file cannot be opened.
pub fn init_logging(cfg: &LoggingConfig) -> Result<()> {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&cfg.level));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true);

    let installed = match (&cfg.format, &cfg.file) {
        (LogFormat::Json, Some(path)) => {
            let file = std::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)?;
            builder
                .json()
                .with_writer(std::sync::Mutex::new(file))
                .try_init()
        }
        (LogFormat::Json, None) => builder.json().try_init(),
        (LogFormat::Pretty, _) => builder.pretty().try_init(),
        (LogFormat::Compact, _) => builder.compact().try_init(),
    };

    installed.map_err(|e| ChipClawError::Config(format!("failed to install logger: {}", e)))
}

/// Emit a component-tagged tracing event.
///
/// ```
/// # use chipclaw::log_component;
/// log_component!(info, "uart", "line received");
/// log_component!(warn, "mqtt", "reconnecting", attempt = 3u32);
/// let err = std::io::Error::other("port busy");
/// log_component!(error, "uart", "open failed", error = %err);
/// ```
#[macro_export]
macro_rules! log_component {
    ($level:ident, $component:expr, $msg:expr) => {
        tracing::$level!(component = $component, $msg)
    };
    ($level:ident, $component:expr, $msg:expr, $($fields:tt)+) => {
        tracing::$level!(component = $component, $($fields)+, $msg)
    };
}

#[cfg(test)]
mod tests {
    use crate::config::{LogFormat, LoggingConfig};

    #[test]
    fn test_default_logging_config() {
        let cfg = LoggingConfig::default();
        assert_eq!(cfg.format, LogFormat::Compact);
        assert_eq!(cfg.level, "info");
        assert!(cfg.file.is_none());
    }

    #[test]
    fn test_log_format_deserialize() {
        let cfg: LoggingConfig =
            serde_json::from_str(r#"{"format":"json","level":"debug"}"#).unwrap();
        assert_eq!(cfg.format, LogFormat::Json);
        assert_eq!(cfg.level, "debug");

        let cfg: LoggingConfig = serde_json::from_str(r#"{"format":"pretty"}"#).unwrap();
        assert_eq!(cfg.format, LogFormat::Pretty);
        assert_eq!(cfg.level, "info");
    }

    #[test]
    fn test_log_format_partial_config_uses_defaults() {
        let cfg: LoggingConfig = serde_json::from_str(r#"{"level":"trace"}"#).unwrap();
        assert_eq!(cfg.format, LogFormat::Compact);
        assert!(cfg.file.is_none());
        assert_eq!(cfg.level, "trace");
    }
}
