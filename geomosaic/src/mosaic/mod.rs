//! Mosaic assembly
//!
//! Pastes fetched tiles into a canvas covering the whole [`TileGrid`] and
//! crops it to the fractional query bounds.
//!
//! [`TileGrid`]: crate::grid::TileGrid

mod compositor;

pub use compositor::{compose, MosaicCompositor};

use thiserror::Error;

use crate::coord::TileIndex;
use crate::grid::GridError;

/// Errors that abort mosaic assembly.
#[derive(Debug, Error)]
pub enum MosaicError {
    /// Tile bytes are not a decodable image.
    #[error("failed to decode tile {tile}: {source}")]
    Decode {
        tile: TileIndex,
        #[source]
        source: image::ImageError,
    },

    /// A tile's dimensions differ from the size learned from the first tile.
    #[error("tile {tile} is {}x{}, expected {}x{}", .actual.0, .actual.1, .expected.0, .expected.1)]
    TileSizeMismatch {
        tile: TileIndex,
        expected: (u32, u32),
        actual: (u32, u32),
    },

    /// The canvas overflows, or the learned tile size crops it to nothing.
    #[error(transparent)]
    Grid(#[from] GridError),

    /// The tile does not belong to the grid being assembled.
    #[error("tile {0} is outside the mosaic grid")]
    TileOutsideGrid(TileIndex),
}
