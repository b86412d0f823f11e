//! Bounded-concurrency tile fetcher.
//!
//! Tiles are fetched through a sliding window of at most `max_concurrent`
//! request futures: a new request starts only when one finishes. The window
//! is driven on the caller's task, alongside a progress ticker:
//!
//! ```text
//! loop {
//!     select! {
//!         tile finished  => store it, start the next pending tile
//!         ticker fired   => call progress, stop on Cancelled
//!     }
//! }
//! ```
//!
//! Returning early drops the window, which cancels every in-flight request.

use std::sync::Arc;

use futures::stream::{FuturesUnordered, StreamExt};
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use super::progress::{Cancelled, FetchProgress};
use super::types::{
    classify_response, AttemptError, FetchConfig, FetchError, FetchedTile, TileSummary,
};
use crate::coord::TileIndex;
use crate::provider::{AsyncHttpClient, TileSource};

/// Fetches tiles from a [`TileSource`] through a shared HTTP client.
pub struct TileFetcher<C: AsyncHttpClient> {
    client: Arc<C>,
    config: FetchConfig,
}

impl<C: AsyncHttpClient> TileFetcher<C> {
    /// Creates a fetcher.
    ///
    /// # Arguments
    ///
    /// * `client` - HTTP client shared by all requests
    /// * `config` - Concurrency, retry and timeout settings
    pub fn new(client: Arc<C>, config: FetchConfig) -> Self {
        Self { client, config }
    }

    pub fn config(&self) -> &FetchConfig {
        &self.config
    }

    pub fn client(&self) -> &Arc<C> {
        &self.client
    }

    /// Fetches every tile in `tiles`.
    ///
    /// `progress` is called once before the first request, then at most once
    /// per `progress_interval`, then once after the last tile. Returning
    /// [`Cancelled`] stops the fetch: pending tiles are never requested,
    /// in-flight requests are dropped and the call fails with
    /// [`FetchError::Cancelled`].
    ///
    /// Results carry their [`TileIndex`]; their order is unspecified.
    pub async fn fetch_all<F>(
        &self,
        source: &TileSource,
        tiles: Vec<TileIndex>,
        mut progress: F,
    ) -> Result<Vec<FetchedTile>, FetchError>
    where
        F: FnMut(FetchProgress) -> Result<(), Cancelled> + Send,
    {
        for tile in &tiles {
            source.check_zoom(tile.z)?;
        }

        let total = tiles.len();
        info!(
            source = source.name(),
            tiles = total,
            max_concurrent = self.config.max_concurrent,
            "Fetching tiles"
        );

        progress(FetchProgress {
            completed: 0,
            total,
            advanced: 0,
        })
        .map_err(|Cancelled| FetchError::Cancelled)?;

        let mut pending = tiles.into_iter();
        let mut in_flight = FuturesUnordered::new();
        for tile in pending.by_ref().take(self.config.max_concurrent) {
            in_flight.push(self.fetch_tile(source, tile));
        }

        let mut ticker = tokio::time::interval(self.config.progress_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // The first tick fires immediately; the initial report already went out.
        ticker.tick().await;

        let mut fetched = Vec::with_capacity(total);
        let mut reported = 0usize;

        while !in_flight.is_empty() {
            tokio::select! {
                Some(result) = in_flight.next() => {
                    fetched.push(result?);

                    if let Some(tile) = pending.next() {
                        in_flight.push(self.fetch_tile(source, tile));
                    }
                }
                _ = ticker.tick() => {
                    let completed = fetched.len();
                    let report = FetchProgress {
                        completed,
                        total,
                        advanced: completed - reported,
                    };
                    if progress(report).is_err() {
                        info!(
                            completed,
                            in_flight = in_flight.len(),
                            pending = pending.len(),
                            "Tile fetch cancelled"
                        );
                        return Err(FetchError::Cancelled);
                    }
                    reported = completed;
                }
            }
        }

        progress(FetchProgress {
            completed: fetched.len(),
            total,
            advanced: fetched.len() - reported,
        })
        .map_err(|Cancelled| FetchError::Cancelled)?;

        info!(summary = %TileSummary(&fetched), "Tile fetch complete");
        Ok(fetched)
    }

    /// Fetches one tile, retrying transient failures.
    async fn fetch_tile(&self, source: &TileSource, tile: TileIndex) -> Result<FetchedTile, FetchError> {
        let url = source.url_for(&tile);
        let timeout = self.config.attempt_timeout;
        let mut attempt = 0u32;

        loop {
            attempt += 1;

            let outcome = match tokio::time::timeout(timeout, self.client.get(&url)).await {
                Err(_) => Err(AttemptError::Timeout(timeout)),
                Ok(Err(e)) => Err(AttemptError::Transport(e)),
                Ok(Ok(response)) => classify_response(response),
            };

            match outcome {
                Ok(data) => {
                    debug!(tile = %tile, present = data.is_present(), attempt, "Tile fetched");
                    return Ok(FetchedTile { index: tile, data });
                }
                Err(reason) => {
                    let Some(delay) = self.config.retry.retry_after(attempt, &reason) else {
                        return Err(FetchError::Tile {
                            tile,
                            attempts: attempt,
                            reason,
                        });
                    };
                    warn!(
                        tile = %tile,
                        attempt,
                        max_attempts = self.config.retry.attempts(),
                        delay_ms = delay.as_millis() as u64,
                        error = %reason,
                        "Tile fetch failed, retrying"
                    );
                    tokio::time::sleep(delay).await;
                }
            }
        }
    }
}
