//! INI configuration.
//!
//! ```ini
//! [fetch]
//! max_concurrent = 5
//! retry_attempts = 3
//! attempt_timeout_secs = 60
//! progress_interval_ms = 50
//! max_tiles = 4096
//!
//! [source]
//! name = openstreetmap
//! ; url = https://tiles.example.com/{z}/{x}/{y}.png
//! ; access_token = ...
//!
//! [logging]
//! level = info
//! ; directory = /var/log/geomosaic
//! ```
//!
//! Every key is optional; missing keys keep their defaults.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use ini::{Ini, Properties};
use thiserror::Error;

use crate::fetch::{
    FetchConfig, DEFAULT_ATTEMPT_TIMEOUT_SECS, DEFAULT_MAX_CONCURRENT,
    DEFAULT_PROGRESS_INTERVAL_MS, DEFAULT_RETRY_ATTEMPTS,
};
use crate::grid::DEFAULT_MAX_TILES;
use crate::logging::{LoggingConfig, DEFAULT_LOG_LEVEL};
use crate::provider::{SourceError, TileSource, DEFAULT_SOURCE_NAME};

/// Config file name under the platform config directory.
pub const CONFIG_FILE_NAME: &str = "config.ini";

/// Application directory under the platform config directory.
pub const CONFIG_DIR_NAME: &str = "geomosaic";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {}: {reason}", .path.display())]
    Read { path: PathBuf, reason: String },

    #[error("failed to parse config: {0}")]
    Parse(String),

    #[error("invalid value '{value}' for [{section}] {key}: {reason}")]
    InvalidValue {
        section: &'static str,
        key: &'static str,
        value: String,
        reason: String,
    },

    #[error(transparent)]
    Source(#[from] SourceError),
}

/// Fetch section.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchSettings {
    pub max_concurrent: usize,
    pub retry_attempts: u32,
    pub attempt_timeout: Duration,
    pub progress_interval: Duration,
    pub max_tiles: u64,
}

impl Default for FetchSettings {
    fn default() -> Self {
        Self {
            max_concurrent: DEFAULT_MAX_CONCURRENT,
            retry_attempts: DEFAULT_RETRY_ATTEMPTS,
            attempt_timeout: Duration::from_secs(DEFAULT_ATTEMPT_TIMEOUT_SECS),
            progress_interval: Duration::from_millis(DEFAULT_PROGRESS_INTERVAL_MS),
            max_tiles: DEFAULT_MAX_TILES,
        }
    }
}

/// Source section. A `url` template takes precedence over `name`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceSettings {
    pub name: String,
    pub url: Option<String>,
    pub access_token: Option<String>,
}

impl Default for SourceSettings {
    fn default() -> Self {
        Self {
            name: DEFAULT_SOURCE_NAME.to_string(),
            url: None,
            access_token: None,
        }
    }
}

/// Complete configuration.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct MosaicConfig {
    pub fetch: FetchSettings,
    pub source: SourceSettings,
    pub logging: LoggingConfig,
}

impl MosaicConfig {
    /// `<config dir>/geomosaic/config.ini`, if the platform has a config dir.
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join(CONFIG_DIR_NAME).join(CONFIG_FILE_NAME))
    }

    /// Loads the file at `path`.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Read {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
        let config = Self::from_ini_str(&content)?;
        tracing::debug!(path = %path.display(), "Loaded configuration");
        Ok(config)
    }

    /// Loads the default file, or defaults when it does not exist.
    pub fn load_default() -> Result<Self, ConfigError> {
        match Self::default_path() {
            Some(path) if path.exists() => Self::load(&path),
            _ => Ok(Self::default()),
        }
    }

    pub fn from_ini_str(content: &str) -> Result<Self, ConfigError> {
        let ini = Ini::load_from_str(content).map_err(|e| ConfigError::Parse(e.to_string()))?;
        let mut config = Self::default();

        if let Some(section) = ini.section(Some("fetch")) {
            let fetch = &mut config.fetch;
            if let Some(v) = parse::<usize>(section, "fetch", "max_concurrent")? {
                if v == 0 {
                    return Err(invalid("fetch", "max_concurrent", "0", "must be at least 1"));
                }
                fetch.max_concurrent = v;
            }
            if let Some(v) = parse::<u32>(section, "fetch", "retry_attempts")? {
                fetch.retry_attempts = v;
            }
            if let Some(v) = parse::<u64>(section, "fetch", "attempt_timeout_secs")? {
                fetch.attempt_timeout = Duration::from_secs(v);
            }
            if let Some(v) = parse::<u64>(section, "fetch", "progress_interval_ms")? {
                fetch.progress_interval = Duration::from_millis(v);
            }
            if let Some(v) = parse::<u64>(section, "fetch", "max_tiles")? {
                if v == 0 {
                    return Err(invalid("fetch", "max_tiles", "0", "must be at least 1"));
                }
                fetch.max_tiles = v;
            }
        }

        if let Some(section) = ini.section(Some("source")) {
            if let Some(name) = non_empty(section, "name") {
                config.source.name = name;
            }
            config.source.url = non_empty(section, "url");
            config.source.access_token = non_empty(section, "access_token");
        }

        if let Some(section) = ini.section(Some("logging")) {
            if let Some(level) = non_empty(section, "level") {
                config.logging.level = level;
            }
            config.logging.directory = non_empty(section, "directory").map(PathBuf::from);
        }

        Ok(config)
    }

    pub fn with_max_concurrent(mut self, max_concurrent: usize) -> Self {
        self.fetch.max_concurrent = max_concurrent.max(1);
        self
    }

    pub fn with_retry_attempts(mut self, attempts: u32) -> Self {
        self.fetch.retry_attempts = attempts;
        self
    }

    pub fn with_attempt_timeout(mut self, timeout: Duration) -> Self {
        self.fetch.attempt_timeout = timeout;
        self
    }

    pub fn with_max_tiles(mut self, max_tiles: u64) -> Self {
        self.fetch.max_tiles = max_tiles.max(1);
        self
    }

    pub fn with_source_name(mut self, name: impl Into<String>) -> Self {
        self.source.name = name.into();
        self.source.url = None;
        self
    }

    pub fn with_source_url(mut self, url: impl Into<String>) -> Self {
        self.source.url = Some(url.into());
        self
    }

    pub fn with_access_token(mut self, token: impl Into<String>) -> Self {
        self.source.access_token = Some(token.into());
        self
    }

    pub fn with_log_level(mut self, level: impl Into<String>) -> Self {
        self.logging.level = level.into();
        self
    }

    /// Fetcher settings. Zero retry attempts disables retries.
    pub fn to_fetch_config(&self) -> FetchConfig {
        FetchConfig::new()
            .with_max_concurrent(self.fetch.max_concurrent)
            .with_retry_attempts(self.fetch.retry_attempts)
            .with_attempt_timeout(self.fetch.attempt_timeout)
            .with_progress_interval(self.fetch.progress_interval)
            .with_max_tiles(self.fetch.max_tiles)
    }

    /// Resolves the configured tile source, merging `extra` parameters.
    pub fn to_tile_source(&self, extra: &HashMap<String, String>) -> Result<TileSource, ConfigError> {
        let source = match &self.source.url {
            Some(url) => TileSource::from_template(url.as_str())?,
            None => {
                let mut params = extra.clone();
                if let Some(token) = &self.source.access_token {
                    params
                        .entry("access_token".to_string())
                        .or_insert_with(|| token.clone());
                }
                TileSource::named(&self.source.name, &params)?
            }
        };
        Ok(source)
    }
}

fn non_empty(section: &Properties, key: &str) -> Option<String> {
    section
        .get(key)
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

fn parse<T>(
    section: &Properties,
    section_name: &'static str,
    key: &'static str,
) -> Result<Option<T>, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    let Some(raw) = non_empty(section, key) else {
        return Ok(None);
    };
    raw.parse::<T>()
        .map(Some)
        .map_err(|e| invalid(section_name, key, &raw, &e.to_string()))
}

fn invalid(section: &'static str, key: &'static str, value: &str, reason: &str) -> ConfigError {
    ConfigError::InvalidValue {
        section,
        key,
        value: value.to_string(),
        reason: reason.to_string(),
    }
}
