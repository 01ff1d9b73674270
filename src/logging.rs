//! Structured logging setup.
//!
//! Console shows errors only for a clean user experience; the full
//! env-filtered stream goes to daily-rotating JSON files under the user's
//! data directory.

use std::path::PathBuf;

use tracing::Level;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

#[derive(Debug, Clone)]
pub struct LoggingConfig {
    pub level: Level,
    pub log_directory: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: Level::INFO,
            log_directory: None,
        }
    }
}

/// Initialize the global tracing subscriber.
pub fn init_logging(config: LoggingConfig) -> Result<(), Box<dyn std::error::Error>> {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("madspark={}", config.level)));

    let console_layer = tracing_subscriber::fmt::layer()
        .with_target(false)
        .with_timer(tracing_subscriber::fmt::time::UtcTime::rfc_3339())
        .with_level(true)
        .with_ansi(true)
        .with_filter(tracing_subscriber::filter::LevelFilter::ERROR);

    let log_dir = config.log_directory.unwrap_or_else(|| {
        dirs::data_dir()
            .unwrap_or_else(|| PathBuf::from("/tmp"))
            .join("madspark")
            .join("logs")
    });
    std::fs::create_dir_all(&log_dir)?;

    let file_appender = tracing_appender::rolling::daily(&log_dir, "madspark.log");
    let file_layer = tracing_subscriber::fmt::layer()
        .with_writer(file_appender)
        .with_ansi(false)
        .json()
        .with_filter(env_filter);

    tracing_subscriber::registry()
        .with(console_layer)
        .with(file_layer)
        .init();

    tracing::info!(
        app_name = "madspark",
        version = env!("CARGO_PKG_VERSION"),
        log_level = %config.level,
        log_directory = %log_dir.display(),
        "Logging initialized"
    );

    Ok(())
}
