use std::fs;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use crate::config::LoggingConfig;

/// Initializes the logging system with both console and file output.
///
/// The level is taken from `config.debug` unless `RUST_LOG` is set. The
/// returned guard must stay alive for buffered file logs to be flushed.
pub fn init_logging(config: &LoggingConfig) -> Option<WorkerGuard> {
    let level = if config.debug { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("card_album={level}")));

    // Fall back to console-only logging when the log directory is unusable
    if let Err(e) = fs::create_dir_all(&config.log_dir) {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().with_writer(std::io::stdout))
            .init();
        tracing::warn!("Log directory {} unavailable: {}", config.log_dir.display(), e);
        return None;
    }

    // Daily rotated JSON file log
    let file_appender = tracing_appender::rolling::daily(&config.log_dir, "card_album.log");
    let (non_blocking_writer, guard) = tracing_appender::non_blocking(file_appender);
    let file_layer = fmt::layer().json().with_writer(non_blocking_writer);
    let console_layer = fmt::layer().with_writer(std::io::stdout);

    tracing_subscriber::registry()
        .with(filter)
        .with(file_layer)
        .with(console_layer)
        .init();

    Some(guard)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_logging_creates_log_dir_and_keeps_guard() {
        let dir = tempfile::tempdir().unwrap();
        let config = LoggingConfig {
            debug: true,
            log_dir: dir.path().join("logs"),
        };

        let guard = init_logging(&config);
        tracing::info!("logging initialized");

        assert!(guard.is_some());
        assert!(config.log_dir.is_dir());
    }
}
