use std::env;
use std::io;
use std::path::PathBuf;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

pub struct LoggerConfig {
    /// Filter directive, e.g. `info` or `reconciler=debug,info`.
    pub level: String,
    pub log_dir: PathBuf,
    pub file_prefix: String,
    pub console_enabled: bool,
    pub file_enabled: bool,
    /// One JSON object per line in the file layer, for the audit trail.
    pub file_json: bool,
}

fn env_flag(name: &str, default: bool) -> bool {
    env::var(name)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

impl Default for LoggerConfig {
    fn default() -> Self {
        Self {
            level: env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
            log_dir: PathBuf::from(env::var("LOG_DIR").unwrap_or_else(|_| "./logs".to_string())),
            file_prefix: env::var("LOG_FILE_PREFIX").unwrap_or_else(|_| "sweeper".to_string()),
            console_enabled: env_flag("LOG_CONSOLE_ENABLED", true),
            file_enabled: env_flag("LOG_FILE_ENABLED", true),
            file_json: env_flag("LOG_FILE_JSON", false),
        }
    }
}

/// Initialize tracing with console and daily-rolling file output.
///
/// # Environment Variables
/// - `LOG_LEVEL` (default `info`, `RUST_LOG` wins when set)
/// - `LOG_DIR` (default `./logs`)
/// - `LOG_FILE_PREFIX` (default `sweeper`)
/// - `LOG_CONSOLE_ENABLED`, `LOG_FILE_ENABLED` (default `true`)
/// - `LOG_FILE_JSON` (default `false`)
///
/// Keep the returned guard alive for the whole program; dropping it flushes
/// and closes the file writer.
pub fn init_logger() -> io::Result<WorkerGuard> {
    init_logger_with_config(LoggerConfig::default())
}

pub fn init_logger_with_config(config: LoggerConfig) -> io::Result<WorkerGuard> {
    if config.file_enabled {
        std::fs::create_dir_all(&config.log_dir)?;
    }

    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.level))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    let mut layers = Vec::new();

    if config.console_enabled {
        let console_layer = tracing_subscriber::fmt::layer()
            .with_target(true)
            .with_thread_ids(false)
            .with_thread_names(false)
            .with_span_events(FmtSpan::CLOSE)
            .with_ansi(true)
            .boxed();
        layers.push(console_layer);
    }

    let guard = if config.file_enabled {
        let file_appender = tracing_appender::rolling::daily(&config.log_dir, &config.file_prefix);
        let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

        let base = tracing_subscriber::fmt::layer()
            .with_writer(non_blocking)
            .with_target(true)
            .with_ansi(false);
        let layer = if config.file_json {
            base.json().boxed()
        } else {
            base.with_span_events(FmtSpan::CLOSE).boxed()
        };
        layers.push(layer);
        guard
    } else {
        let (_, guard) = tracing_appender::non_blocking(io::sink());
        guard
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(layers)
        .try_init()
        .map_err(io::Error::other)?;

    Ok(guard)
}
