//! Logging configuration.
//!
//! Warnings and errors always reach stderr. When the archive has a `log/`
//! directory, every event passing the filter is also written to a per-run
//! file named `<timestamp>.<command>.log`.

use anyhow::Result;
use chrono::Local;
use std::path::Path;
use tracing_subscriber::{
    filter::LevelFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer,
};

/// Environment variable holding the log filter, e.g. `PHODB_LOG=debug`.
pub const LOG_ENV: &str = "PHODB_LOG";

/// Timestamp shared by every file a single run writes to `log/`.
pub fn run_stamp() -> String {
    Local::now().format("%Y-%m-%d-%H-%M-%S").to_string()
}

/// Initialize the logging system for one command.
///
/// Log level can be controlled via the `PHODB_LOG` environment variable:
/// - `PHODB_LOG=debug` for per-file decisions
/// - `PHODB_LOG=info` for run milestones (default)
/// - `PHODB_LOG=warn` for per-file failures only
///
/// Calling this a second time in the same process is a no-op.
pub fn init(log_dir: Option<&Path>, stamp: &str, command: &str) -> Result<()> {
    let env_filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new("info"));

    let stderr_layer = fmt::layer()
        .compact()
        .with_target(false)
        .with_writer(std::io::stderr)
        .with_filter(LevelFilter::WARN);

    let Some(log_dir) = log_dir else {
        let _ = tracing_subscriber::registry()
            .with(env_filter)
            .with(stderr_layer)
            .try_init();
        return Ok(());
    };

    std::fs::create_dir_all(log_dir)?;

    let file_appender = tracing_appender::rolling::never(log_dir, format!("{stamp}.{command}.log"));
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    // The worker flushes on drop, so the guard has to outlive main
    static GUARD: std::sync::OnceLock<tracing_appender::non_blocking::WorkerGuard> =
        std::sync::OnceLock::new();
    if GUARD.set(guard).is_err() {
        return Ok(());
    }

    let _ = tracing_subscriber::registry()
        .with(env_filter)
        .with(stderr_layer)
        .with(fmt::layer().with_writer(non_blocking).with_ansi(false))
        .try_init();

    tracing::info!("Logging {} run to {}", command, log_dir.display());
    Ok(())
}
