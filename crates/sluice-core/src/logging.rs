//! Logging setup for applications running sluice steps.
//!
//! Steps only emit `tracing` events. An application installs a subscriber
//! once, usually from the `[logging]` table of its configuration:
//!
//! ```ignore
//! use sluice_core::logging::{LogConfig, init_logging};
//! use sluice_model::{ConfigModel, Context};
//!
//! let ctx = Context::from_toml(r#"
//!     [logging]
//!     level = "debug"
//!     format = "json"
//! "#)?;
//! init_logging(&LogConfig::from_context_or_default(&ctx)?)?;
//! ```
//!
//! Levels used by the lifecycle and transformations:
//!
//! - `error`: failed step runs
//! - `warn`: skipped columns, empty selections
//! - `info`: step start and finish
//! - `debug`: step inputs and output summaries
//! - `trace`: per-column dispatch and nested execute calls
//!
//! Step inputs are redacted leaf by leaf unless [`LogConfig::log_data`]
//! is set.

use std::io;
use std::sync::atomic::{AtomicBool, Ordering};

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use sluice_model::{ConfigModel, Context};
use tracing::Level;
use tracing_subscriber::fmt::{self, MakeWriter};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer, Registry};

pub use sluice_model::REDACTED_VALUE;

/// Context key holding the logging table.
pub const LOGGING_KEY: &str = "logging";

static LOG_DATA_ENABLED: AtomicBool = AtomicBool::new(false);

pub fn log_data_enabled() -> bool {
    LOG_DATA_ENABLED.load(Ordering::Relaxed)
}

/// Returns `value` when data logging is enabled, otherwise the redaction marker.
pub fn redact_value(value: &str) -> &str {
    if log_data_enabled() {
        value
    } else {
        REDACTED_VALUE
    }
}

/// Redacts every leaf of a JSON document, keeping object keys and nulls.
pub fn redact_json(value: &JsonValue) -> JsonValue {
    if log_data_enabled() {
        value.clone()
    } else {
        redact_leaves(value)
    }
}

fn redact_leaves(value: &JsonValue) -> JsonValue {
    match value {
        JsonValue::Object(map) => JsonValue::Object(
            map.iter()
                .map(|(k, v)| (k.clone(), redact_leaves(v)))
                .collect(),
        ),
        JsonValue::Null => JsonValue::Null,
        _ => JsonValue::String(REDACTED_VALUE.to_string()),
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Error,
    Warn,
    #[default]
    Info,
    Debug,
    Trace,
}

impl From<LogLevel> for Level {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::Error => Level::ERROR,
            LogLevel::Warn => Level::WARN,
            LogLevel::Info => Level::INFO,
            LogLevel::Debug => Level::DEBUG,
            LogLevel::Trace => Level::TRACE,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Multi-field human-readable lines.
    #[default]
    Pretty,
    Compact,
    /// One JSON object per event.
    Json,
}

/// How step logs are rendered and filtered.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    /// Level for the sluice crates; other crates stay at `warn`.
    pub level: LogLevel,
    pub format: LogFormat,
    pub timestamps: bool,
    pub ansi: bool,
    /// Show step input values instead of the redaction marker.
    pub log_data: bool,
}

impl ConfigModel for LogConfig {}

impl LogConfig {
    /// Reads the `[logging]` table of `ctx`, or the defaults when it is absent.
    pub fn from_context_or_default(ctx: &Context) -> sluice_model::Result<Self> {
        if ctx.contains(LOGGING_KEY) {
            Self::from_context_at(ctx, LOGGING_KEY)
        } else {
            Ok(Self::default())
        }
    }

    #[must_use]
    pub fn level(mut self, level: LogLevel) -> Self {
        self.level = level;
        self
    }

    #[must_use]
    pub fn format(mut self, format: LogFormat) -> Self {
        self.format = format;
        self
    }

    #[must_use]
    pub fn timestamps(mut self, enable: bool) -> Self {
        self.timestamps = enable;
        self
    }

    #[must_use]
    pub fn ansi(mut self, enable: bool) -> Self {
        self.ansi = enable;
        self
    }

    #[must_use]
    pub fn log_data(mut self, enable: bool) -> Self {
        self.log_data = enable;
        self
    }

    /// The filter for this config; `RUST_LOG` wins when set.
    pub fn env_filter(&self) -> EnvFilter {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            let level = Level::from(self.level).as_str().to_lowercase();
            EnvFilter::new(format!(
                "warn,sluice_core={level},sluice_model={level},sluice_transform={level}"
            ))
        })
    }

    fn layer<W>(&self, writer: W) -> Box<dyn Layer<Registry> + Send + Sync>
    where
        W: for<'writer> MakeWriter<'writer> + Send + Sync + 'static,
    {
        let base = fmt::layer().with_writer(writer).with_ansi(self.ansi);
        match (self.format, self.timestamps) {
            (LogFormat::Json, _) => base.json().boxed(),
            (LogFormat::Compact, true) => base.compact().boxed(),
            (LogFormat::Compact, false) => base.compact().without_time().boxed(),
            (LogFormat::Pretty, true) => base.boxed(),
            (LogFormat::Pretty, false) => base.without_time().boxed(),
        }
    }
}

/// Installs the global subscriber, writing to stderr.
///
/// # Errors
///
/// Fails when a global subscriber is already installed.
pub fn init_logging(config: &LogConfig) -> io::Result<()> {
    init_logging_with_writer(config, io::stderr)
}

/// Installs the global subscriber with a custom writer.
///
/// # Errors
///
/// Fails when a global subscriber is already installed.
pub fn init_logging_with_writer<W>(config: &LogConfig, writer: W) -> io::Result<()>
where
    W: for<'writer> MakeWriter<'writer> + Send + Sync + 'static,
{
    LOG_DATA_ENABLED.store(config.log_data, Ordering::Relaxed);
    tracing_subscriber::registry()
        .with(config.layer(writer).with_filter(config.env_filter()))
        .try_init()
        .map_err(io::Error::other)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_redact_leaves_keeps_keys() {
        let redacted = redact_leaves(&json!({"a": "secret", "n": {"x": 1}, "gone": null}));
        assert_eq!(
            redacted,
            json!({"a": REDACTED_VALUE, "n": {"x": REDACTED_VALUE}, "gone": null})
        );
    }

    #[test]
    fn test_redact_value_default_hides() {
        assert_eq!(redact_value("patient-42"), REDACTED_VALUE);
    }

    #[test]
    fn test_config_from_logging_table() {
        let ctx = Context::from_toml(
            r#"
            [logging]
            level = "trace"
            format = "compact"
            log_data = true
            "#,
        )
        .unwrap();
        let config = LogConfig::from_context_or_default(&ctx).unwrap();
        assert_eq!(config.level, LogLevel::Trace);
        assert_eq!(config.format, LogFormat::Compact);
        assert!(config.log_data);
        assert!(!config.timestamps);
    }

    #[test]
    fn test_config_defaults_without_table() {
        let config = LogConfig::from_context_or_default(&Context::new()).unwrap();
        assert_eq!(config, LogConfig::default());
        assert_eq!(Level::from(config.level), Level::INFO);
    }

    #[test]
    fn test_unknown_level_is_rejected() {
        let err = LogConfig::build(json!({"level": "loud"})).unwrap_err();
        assert!(err.to_string().contains("LogConfig"));
    }
}
