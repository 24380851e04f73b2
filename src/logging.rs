use tracing_appender::non_blocking::NonBlocking;
use tracing_subscriber::{fmt::time::UtcTime, prelude::*, EnvFilter};

use crate::config::{LogFormat, LoggingConfig};

/// Initialize logging: console plus an optional rolling file appender,
/// configured from [`LoggingConfig`]. Filter precedence is the configured
/// level, then `RUST_LOG`, then `info`.
pub fn init_with_config(cfg: &LoggingConfig) {
    let filter = match &cfg.level {
        Some(level) => EnvFilter::new(level.as_str()),
        None => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
    };

    let file_writer = if cfg.enable_file_logging {
        rolling_writer(cfg)
    } else {
        None
    };

    let registry = tracing_subscriber::registry().with(filter);
    match cfg.format {
        LogFormat::Json => {
            let console = tracing_subscriber::fmt::layer()
                .json()
                .with_ansi(false)
                .with_timer(UtcTime::rfc_3339())
                .with_writer(std::io::stdout);
            let file = file_writer.map(|w| {
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_ansi(false)
                    .with_timer(UtcTime::rfc_3339())
                    .with_writer(w)
            });
            let _ = registry.with(console).with(file).try_init();
        }
        LogFormat::Text => {
            let console = tracing_subscriber::fmt::layer()
                .with_ansi(true)
                .with_timer(UtcTime::rfc_3339())
                .with_writer(std::io::stdout);
            let file = file_writer.map(|w| {
                tracing_subscriber::fmt::layer()
                    .with_ansi(false)
                    .with_timer(UtcTime::rfc_3339())
                    .with_writer(w)
            });
            let _ = registry.with(console).with(file).try_init();
        }
    }
}

/// Build the non-blocking rolling file writer, or `None` when the log
/// directory cannot be created (console logging continues either way).
fn rolling_writer(cfg: &LoggingConfig) -> Option<NonBlocking> {
    let rotation = match cfg.rotation.to_lowercase().as_str() {
        "hourly" => tracing_appender::rolling::Rotation::HOURLY,
        "never" => tracing_appender::rolling::Rotation::NEVER,
        _ => tracing_appender::rolling::Rotation::DAILY,
    };

    if std::fs::create_dir_all(&cfg.dir).is_err() {
        eprintln!(
            "Failed to create log directory '{}', continuing with stdout logs",
            cfg.dir
        );
        return None;
    }

    let appender =
        tracing_appender::rolling::RollingFileAppender::new(rotation, &cfg.dir, &cfg.filename);
    let (non_blocking, guard) = tracing_appender::non_blocking(appender);

    // Keep guard alive for process lifetime
    let _leaked: &'static _ = Box::leak(Box::new(guard));

    Some(non_blocking)
}
