//! Logging configuration types.

use super::defaults::{
    default_enable_file_logging, default_log_dir, default_log_filename, default_log_format,
    default_rotation,
};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Output format for log lines.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Json,
    Text,
}

/// Log verbosity; maps onto a tracing `EnvFilter` directive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

impl LogLevel {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Trace => "trace",
            Self::Debug => "debug",
            Self::Info => "info",
            Self::Warn => "warn",
            Self::Error => "error",
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Explicit level; when absent the `RUST_LOG` env var applies, falling
    /// back to `info`.
    #[serde(default)]
    pub level: Option<LogLevel>,
    #[serde(default = "default_log_format")]
    pub format: LogFormat,
    #[serde(default = "default_enable_file_logging")]
    pub enable_file_logging: bool,
    #[serde(default = "default_log_dir")]
    pub dir: String,
    #[serde(default = "default_log_filename")]
    pub filename: String,
    /// `daily`, `hourly`, or `never`.
    #[serde(default = "default_rotation")]
    pub rotation: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: None,
            format: default_log_format(),
            enable_file_logging: default_enable_file_logging(),
            dir: default_log_dir(),
            filename: default_log_filename(),
            rotation: default_rotation(),
        }
    }
}
