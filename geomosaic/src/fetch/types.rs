//! Fetch configuration, results and errors.

use std::fmt;
use std::time::Duration;

use thiserror::Error;

use super::policy::RetryPolicy;
use crate::coord::TileIndex;
use crate::grid::DEFAULT_MAX_TILES;
use crate::provider::{HttpResponse, ProviderError, SourceError};

/// Default number of tiles fetched concurrently.
pub const DEFAULT_MAX_CONCURRENT: usize = 5;

/// Default per-attempt timeout (60 seconds).
pub const DEFAULT_ATTEMPT_TIMEOUT_SECS: u64 = 60;

/// Default minimum interval between progress callbacks (50ms).
pub const DEFAULT_PROGRESS_INTERVAL_MS: u64 = 50;

/// Configuration for a [`TileFetcher`](super::TileFetcher).
#[derive(Debug, Clone, PartialEq)]
pub struct FetchConfig {
    /// Maximum number of requests in flight at once.
    pub max_concurrent: usize,
    /// Per-tile retry budget.
    pub retry: RetryPolicy,
    /// Deadline for a single request attempt.
    pub attempt_timeout: Duration,
    /// Minimum time between two progress callbacks.
    pub progress_interval: Duration,
    /// Largest tile grid a single mosaic may request.
    pub max_tiles: u64,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            max_concurrent: DEFAULT_MAX_CONCURRENT,
            retry: RetryPolicy::default(),
            attempt_timeout: Duration::from_secs(DEFAULT_ATTEMPT_TIMEOUT_SECS),
            progress_interval: Duration::from_millis(DEFAULT_PROGRESS_INTERVAL_MS),
            max_tiles: DEFAULT_MAX_TILES,
        }
    }
}

impl FetchConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the concurrency limit (at least 1).
    pub fn with_max_concurrent(mut self, max_concurrent: usize) -> Self {
        self.max_concurrent = max_concurrent.max(1);
        self
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Requests per tile with the default back-off; 0 and 1 both mean a
    /// single attempt.
    pub fn with_retry_attempts(mut self, attempts: u32) -> Self {
        self.retry = RetryPolicy::new(attempts);
        self
    }

    pub fn with_attempt_timeout(mut self, timeout: Duration) -> Self {
        self.attempt_timeout = timeout;
        self
    }

    /// Sets the tile ceiling (at least 1).
    pub fn with_max_tiles(mut self, max_tiles: u64) -> Self {
        self.max_tiles = max_tiles.max(1);
        self
    }

    /// Sets the progress interval (at least 1ms).
    pub fn with_progress_interval(mut self, interval: Duration) -> Self {
        self.progress_interval = interval.max(Duration::from_millis(1));
        self
    }
}

/// Payload of one fetched tile.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TileData {
    /// Encoded image bytes as served.
    Present(Vec<u8>),
    /// The server has no tile here (404 or an empty body).
    Absent,
}

impl TileData {
    pub fn is_present(&self) -> bool {
        matches!(self, Self::Present(_))
    }
}

/// A tile and its payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchedTile {
    pub index: TileIndex,
    pub data: TileData,
}

impl FetchedTile {
    pub fn present(index: TileIndex, bytes: Vec<u8>) -> Self {
        Self {
            index,
            data: TileData::Present(bytes),
        }
    }

    pub fn absent(index: TileIndex) -> Self {
        Self {
            index,
            data: TileData::Absent,
        }
    }
}

/// Why a single request attempt failed.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum AttemptError {
    #[error(transparent)]
    Transport(#[from] ProviderError),

    #[error("timed out after {0:?}")]
    Timeout(Duration),

    #[error("HTTP status {0}")]
    Status(u16),
}

impl AttemptError {
    /// Transport failures, timeouts, `5xx`, `408` and `429` are transient.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Transport(_) | Self::Timeout(_) => true,
            Self::Status(status) => *status >= 500 || *status == 408 || *status == 429,
        }
    }
}

/// Interprets a response: `404` and empty successful bodies mean absent.
pub(crate) fn classify_response(response: HttpResponse) -> Result<TileData, AttemptError> {
    if response.status == 404 {
        return Ok(TileData::Absent);
    }
    if !response.is_success() {
        return Err(AttemptError::Status(response.status));
    }
    if response.body.is_empty() {
        Ok(TileData::Absent)
    } else {
        Ok(TileData::Present(response.body))
    }
}

/// Errors that abort a fetch.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum FetchError {
    /// The progress callback requested cancellation.
    #[error("tile fetch cancelled")]
    Cancelled,

    /// A tile failed permanently or exhausted its retry budget.
    #[error("tile {tile} failed after {attempts} attempt(s): {reason}")]
    Tile {
        tile: TileIndex,
        attempts: u32,
        reason: AttemptError,
    },

    /// The tile source cannot serve the request.
    #[error(transparent)]
    Source(#[from] SourceError),
}

impl FetchError {
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }
}

/// Short tile summary for logs.
pub(crate) struct TileSummary<'a>(pub &'a [FetchedTile]);

impl fmt::Display for TileSummary<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let present = self.0.iter().filter(|t| t.data.is_present()).count();
        write!(f, "{} present, {} absent", present, self.0.len() - present)
    }
}
