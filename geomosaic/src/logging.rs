//! Tracing subscriber setup.
//!
//! Console output goes to stderr with local RFC 3339 timestamps. When a log
//! directory is configured, a daily-rolling file gets the same events
//! through a non-blocking writer. `RUST_LOG` overrides the configured level.

use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing_appender::non_blocking::{NonBlocking, WorkerGuard};
use tracing_appender::rolling::{Builder as RollingBuilder, Rotation};
use tracing_subscriber::fmt::time::LocalTime;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

/// Default filter when neither config nor `RUST_LOG` set one.
pub const DEFAULT_LOG_LEVEL: &str = "info";

/// Prefix of rolling log file names.
pub const DEFAULT_LOG_FILE_PREFIX: &str = "geomosaic";

/// Rolled log files kept on disk.
const MAX_LOG_FILES: usize = 5;

#[derive(Debug, Error)]
pub enum LoggingError {
    #[error("invalid log filter '{filter}': {reason}")]
    InvalidFilter { filter: String, reason: String },

    #[error("failed to create log directory {}: {source}", .path.display())]
    CreateDirectory {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to open log file in {}: {reason}", .path.display())]
    Appender { path: PathBuf, reason: String },

    #[error("logging already initialized: {0}")]
    AlreadyInitialized(String),
}

/// Logging settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoggingConfig {
    /// `EnvFilter` directive, e.g. `info` or `geomosaic=debug,warn`.
    pub level: String,
    /// Directory for rolling log files; console only when `None`.
    pub directory: Option<PathBuf>,
    pub file_prefix: String,
    pub ansi: bool,
    /// Chrome trace output; needs the `profiling` feature.
    pub chrome_trace: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: DEFAULT_LOG_LEVEL.to_string(),
            directory: None,
            file_prefix: DEFAULT_LOG_FILE_PREFIX.to_string(),
            ansi: true,
            chrome_trace: None,
        }
    }
}

impl LoggingConfig {
    pub fn with_level(mut self, level: impl Into<String>) -> Self {
        self.level = level.into();
        self
    }

    pub fn with_directory(mut self, directory: impl Into<PathBuf>) -> Self {
        self.directory = Some(directory.into());
        self
    }

    pub fn with_ansi(mut self, ansi: bool) -> Self {
        self.ansi = ansi;
        self
    }

    pub fn with_chrome_trace(mut self, path: impl Into<PathBuf>) -> Self {
        self.chrome_trace = Some(path.into());
        self
    }
}

/// Keeps background writers alive; flushes them on drop.
#[must_use = "dropping the guard stops file logging"]
pub struct LoggingGuard {
    _file: Option<WorkerGuard>,
    #[cfg(feature = "profiling")]
    _chrome: Option<tracing_chrome::FlushGuard>,
}

/// Installs the global tracing subscriber.
pub fn init_logging(config: &LoggingConfig) -> Result<LoggingGuard, LoggingError> {
    let env = std::env::var("RUST_LOG").ok();
    let filter = build_filter(env.as_deref(), &config.level)?;

    let console_layer = tracing_subscriber::fmt::layer()
        .with_timer(LocalTime::rfc_3339())
        .with_target(true)
        .with_ansi(config.ansi)
        .with_writer(std::io::stderr);

    let (file_layer, file_guard) = match &config.directory {
        Some(directory) => {
            let (writer, guard) = file_writer(directory, &config.file_prefix)?;
            let layer = tracing_subscriber::fmt::layer()
                .with_timer(LocalTime::rfc_3339())
                .with_target(true)
                .with_ansi(false)
                .with_writer(writer);
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    let registry = tracing_subscriber::registry()
        .with(filter)
        .with(console_layer)
        .with(file_layer);

    #[cfg(feature = "profiling")]
    let (registry, chrome_guard) = {
        let (layer, guard) = match &config.chrome_trace {
            Some(path) => {
                let (layer, guard) = tracing_chrome::ChromeLayerBuilder::new()
                    .file(path)
                    .include_args(true)
                    .build();
                (Some(layer), Some(guard))
            }
            None => (None, None),
        };
        (registry.with(layer), guard)
    };

    registry
        .try_init()
        .map_err(|e| LoggingError::AlreadyInitialized(e.to_string()))?;

    #[cfg(not(feature = "profiling"))]
    if config.chrome_trace.is_some() {
        tracing::warn!("Chrome trace requested but the profiling feature is disabled");
    }

    tracing::debug!(
        level = %config.level,
        directory = ?config.directory,
        "Logging initialized"
    );

    Ok(LoggingGuard {
        _file: file_guard,
        #[cfg(feature = "profiling")]
        _chrome: chrome_guard,
    })
}

/// Builds the filter from `RUST_LOG` if set and valid, else from `level`.
fn build_filter(env: Option<&str>, level: &str) -> Result<EnvFilter, LoggingError> {
    if let Some(directives) = env.filter(|d| !d.trim().is_empty()) {
        if let Ok(filter) = EnvFilter::try_new(directives) {
            return Ok(filter);
        }
    }

    EnvFilter::try_new(level).map_err(|e| LoggingError::InvalidFilter {
        filter: level.to_string(),
        reason: e.to_string(),
    })
}

fn file_writer(directory: &Path, prefix: &str) -> Result<(NonBlocking, WorkerGuard), LoggingError> {
    std::fs::create_dir_all(directory).map_err(|source| LoggingError::CreateDirectory {
        path: directory.to_path_buf(),
        source,
    })?;

    let appender = RollingBuilder::new()
        .rotation(Rotation::DAILY)
        .filename_prefix(prefix)
        .filename_suffix("log")
        .max_log_files(MAX_LOG_FILES)
        .build(directory)
        .map_err(|e| LoggingError::Appender {
            path: directory.to_path_buf(),
            reason: e.to_string(),
        })?;

    Ok(tracing_appender::non_blocking(appender))
}
