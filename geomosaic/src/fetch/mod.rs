//! Concurrent tile downloading
//!
//! [`TileFetcher`] downloads a list of tiles with bounded concurrency,
//! per-tile retry and timeout, rate-limited progress reporting and
//! cooperative cancellation.
//!
//! # Failure semantics
//!
//! | Outcome | Result |
//! |---------|--------|
//! | `2xx` with a body | [`TileData::Present`] |
//! | `404`, or `2xx` with an empty body | [`TileData::Absent`], not retried |
//! | transport error, timeout, `5xx`, `408`, `429` | retried per [`RetryPolicy`], then [`FetchError::Tile`] |
//! | any other status | [`FetchError::Tile`] immediately |
//! | progress callback returns [`Cancelled`] | [`FetchError::Cancelled`] |

mod fetcher;
mod policy;
mod progress;
mod types;

pub use fetcher::TileFetcher;
pub use policy::{RetryPolicy, DEFAULT_BACKOFF_BASE_MS, DEFAULT_RETRY_ATTEMPTS, MAX_BACKOFF_SECS};
pub use progress::{CancellationFlag, Cancelled, FetchProgress};
pub use types::{
    AttemptError, FetchConfig, FetchError, FetchedTile, TileData, DEFAULT_ATTEMPT_TIMEOUT_SECS,
    DEFAULT_MAX_CONCURRENT, DEFAULT_PROGRESS_INTERVAL_MS,
};
