//! Tile grid planning.
//!
//! Turns a geographic bounding box and zoom level into the rectangular range
//! of XYZ tiles that covers it, together with the fractional tile bounds used
//! later to crop the stitched mosaic to the exact query window.

use std::fmt;
use std::ops::Range;

use thiserror::Error;

use crate::coord::{lat_lng_to_tile_fraction, BoundingBox, CoordError, TileIndex, TILE_SIZE};

/// Largest grid [`TileGrid::plan`] accepts, in tiles.
pub const DEFAULT_MAX_TILES: u64 = 4096;

/// Errors raised while planning a tile grid.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum GridError {
    /// A corner could not be projected.
    #[error(transparent)]
    Coord(#[from] CoordError),

    /// The bounding box covers no tiles or crops to zero pixels.
    #[error("degenerate grid at zoom {zoom}: {reason}")]
    Degenerate { zoom: u8, reason: String },

    /// The grid holds more tiles than allowed, or its canvas overflows.
    #[error("grid too large at zoom {zoom}: {reason}")]
    TooLarge { zoom: u8, reason: String },

    /// A corner projects outside the Web Mercator square.
    #[error("bounding box leaves the Web Mercator world at zoom {zoom}: tile y {y:.3}")]
    OutsideWorld { zoom: u8, y: f64 },
}

/// Fractional tile coordinates of the query window, normalized so that
/// `x0 <= x1` and `y0 <= y1`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FractionalBounds {
    pub x0: f64,
    pub y0: f64,
    pub x1: f64,
    pub y1: f64,
}

/// A pixel rectangle inside the stitched canvas.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PixelWindow {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl fmt::Display for PixelWindow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}+{}+{}", self.width, self.height, self.x, self.y)
    }
}

/// Tile range covering a bounding box at one zoom level.
#[derive(Debug, Clone, PartialEq)]
pub struct TileGrid {
    zoom: u8,
    x_range: Range<u32>,
    y_range: Range<u32>,
    bounds: FractionalBounds,
}

impl TileGrid {
    /// Plans the tile grid for `bbox` at `zoom`, allowing up to
    /// [`DEFAULT_MAX_TILES`] tiles.
    pub fn plan(bbox: &BoundingBox, zoom: u8) -> Result<Self, GridError> {
        Self::plan_with_limit(bbox, zoom, DEFAULT_MAX_TILES)
    }

    /// Plans the tile grid for `bbox` at `zoom`.
    ///
    /// The range is `[floor(x0), ceil(x1)) × [floor(y0), ceil(y1))`. Grids
    /// of more than `max_tiles` tiles are rejected before anything is
    /// allocated for them.
    pub fn plan_with_limit(
        bbox: &BoundingBox,
        zoom: u8,
        max_tiles: u64,
    ) -> Result<Self, GridError> {
        let ne = bbox.ne();
        let sw = bbox.sw();
        let (ax, ay) = lat_lng_to_tile_fraction(ne.lat, ne.lng, zoom)?;
        let (bx, by) = lat_lng_to_tile_fraction(sw.lat, sw.lng, zoom)?;

        let bounds = FractionalBounds {
            x0: ax.min(bx),
            y0: ay.min(by),
            x1: ax.max(bx),
            y1: ay.max(by),
        };

        let world = 2.0_f64.powi(zoom as i32);
        for y in [bounds.y0, bounds.y1] {
            if !(0.0..=world).contains(&y) {
                return Err(GridError::OutsideWorld { zoom, y });
            }
        }

        let x_range = bounds.x0.floor() as u32..bounds.x1.ceil() as u32;
        let y_range = bounds.y0.floor() as u32..bounds.y1.ceil() as u32;
        if x_range.is_empty() || y_range.is_empty() {
            return Err(GridError::Degenerate {
                zoom,
                reason: format!("empty tile range x {:?} y {:?}", x_range, y_range),
            });
        }

        let grid = Self {
            zoom,
            x_range,
            y_range,
            bounds,
        };

        let tiles = u64::from(grid.columns()) * u64::from(grid.rows());
        if tiles > max_tiles {
            return Err(GridError::TooLarge {
                zoom,
                reason: format!(
                    "{}x{} = {} tiles exceeds the limit of {}",
                    grid.columns(),
                    grid.rows(),
                    tiles,
                    max_tiles
                ),
            });
        }

        grid.usable_window(TILE_SIZE, TILE_SIZE)?;

        tracing::debug!(
            zoom = zoom,
            columns = grid.columns(),
            rows = grid.rows(),
            "Planned tile grid"
        );

        Ok(grid)
    }

    pub fn zoom(&self) -> u8 {
        self.zoom
    }

    pub fn bounds(&self) -> FractionalBounds {
        self.bounds
    }

    /// Index of the top-left tile of the range.
    pub fn origin(&self) -> (u32, u32) {
        (self.x_range.start, self.y_range.start)
    }

    pub fn columns(&self) -> u32 {
        self.x_range.end - self.x_range.start
    }

    pub fn rows(&self) -> u32 {
        self.y_range.end - self.y_range.start
    }

    pub fn tile_count(&self) -> usize {
        self.columns() as usize * self.rows() as usize
    }

    /// All tiles of the range, x-major then y.
    pub fn tiles(&self) -> Vec<TileIndex> {
        let mut tiles = Vec::with_capacity(self.tile_count());
        for x in self.x_range.clone() {
            for y in self.y_range.clone() {
                tiles.push(TileIndex::new(x, y, self.zoom));
            }
        }
        tiles
    }

    /// Returns true if `tile` belongs to this grid.
    pub fn contains(&self, tile: &TileIndex) -> bool {
        tile.z == self.zoom && self.x_range.contains(&tile.x) && self.y_range.contains(&tile.y)
    }

    /// Canvas size in pixels for the given tile size.
    pub fn canvas_size(&self, tile_width: u32, tile_height: u32) -> Result<(u32, u32), GridError> {
        match (
            self.columns().checked_mul(tile_width),
            self.rows().checked_mul(tile_height),
        ) {
            (Some(width), Some(height)) => Ok((width, height)),
            _ => Err(GridError::TooLarge {
                zoom: self.zoom,
                reason: format!(
                    "{}x{} tiles of {}x{} pixels overflow the canvas",
                    self.columns(),
                    self.rows(),
                    tile_width,
                    tile_height
                ),
            }),
        }
    }

    /// Crop window of the query bounds inside the stitched canvas.
    ///
    /// Independently rounded offset and extent can overshoot the canvas by a
    /// pixel, so the extent is clamped to what remains.
    pub fn crop_window(&self, tile_width: u32, tile_height: u32) -> Result<PixelWindow, GridError> {
        let (origin_x, origin_y) = self.origin();
        let tw = f64::from(tile_width);
        let th = f64::from(tile_height);
        let (canvas_w, canvas_h) = self.canvas_size(tile_width, tile_height)?;

        let x = (tw * (self.bounds.x0 - f64::from(origin_x))).round() as u32;
        let y = (th * (self.bounds.y0 - f64::from(origin_y))).round() as u32;
        let width = (tw * (self.bounds.x1 - self.bounds.x0)).round() as u32;
        let height = (th * (self.bounds.y1 - self.bounds.y0)).round() as u32;

        let x = x.min(canvas_w);
        let y = y.min(canvas_h);
        Ok(PixelWindow {
            x,
            y,
            width: width.min(canvas_w - x),
            height: height.min(canvas_h - y),
        })
    }

    /// Crop window for the given tile size, rejecting one with no pixels.
    pub fn usable_window(&self, tile_width: u32, tile_height: u32) -> Result<PixelWindow, GridError> {
        let window = self.crop_window(tile_width, tile_height)?;
        if window.width == 0 || window.height == 0 {
            return Err(GridError::Degenerate {
                zoom: self.zoom,
                reason: format!(
                    "crop window {} has no pixels with {}x{} tiles",
                    window, tile_width, tile_height
                ),
            });
        }
        Ok(window)
    }
}
