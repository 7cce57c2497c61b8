//! Tracing bootstrap shared by the CLI and embedders.

use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

/// Initializes logging: human-readable output on stderr, plus a daily
/// rolling file when `SHADOWCAST_LOG_DIR` points at a directory. Returns the
/// appender guard; dropping it flushes buffered log lines.
pub fn init_logging(component: &str, default_level: &str) -> Option<WorkerGuard> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_level.to_string()));

    let stderr_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_ansi(true)
        .with_target(false);

    let registry = tracing_subscriber::registry().with(filter).with(stderr_layer);

    match std::env::var("SHADOWCAST_LOG_DIR") {
        Ok(dir) if !dir.is_empty() => {
            let _ = std::fs::create_dir_all(&dir);
            let appender = tracing_appender::rolling::daily(dir, component);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let file_layer = fmt::layer()
                .with_writer(writer)
                .with_ansi(false)
                .with_target(true);
            registry.with(file_layer).init();
            Some(guard)
        }
        _ => {
            registry.init();
            None
        }
    }
}
