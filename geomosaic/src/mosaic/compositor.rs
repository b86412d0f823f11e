//! Stitches fetched tiles into one canvas and crops it to the query window.

use image::{imageops, DynamicImage, RgbaImage};
use tracing::{debug, info};

use super::MosaicError;
use crate::coord::TILE_SIZE;
use crate::fetch::{FetchedTile, TileData};
use crate::grid::TileGrid;

/// Accumulates tiles of one [`TileGrid`] into an RGBA canvas.
///
/// The canvas is allocated when the first tile decodes, sized by that
/// tile's dimensions. Placement is keyed by tile index, so the order in
/// which tiles are pasted does not change the result.
pub struct MosaicCompositor<'a> {
    grid: &'a TileGrid,
    canvas: Option<RgbaImage>,
    tile_size: Option<(u32, u32)>,
    pasted: usize,
    skipped: usize,
}

impl<'a> MosaicCompositor<'a> {
    pub fn new(grid: &'a TileGrid) -> Self {
        Self {
            grid,
            canvas: None,
            tile_size: None,
            pasted: 0,
            skipped: 0,
        }
    }

    /// Tile size learned from the first decoded tile, 256×256 until then.
    pub fn tile_size(&self) -> (u32, u32) {
        self.tile_size.unwrap_or((TILE_SIZE, TILE_SIZE))
    }

    /// Number of tiles drawn onto the canvas.
    pub fn pasted(&self) -> usize {
        self.pasted
    }

    /// Pastes one tile. Absent and fully transparent tiles are skipped.
    pub fn paste(&mut self, tile: FetchedTile) -> Result<(), MosaicError> {
        let index = tile.index;
        if !self.grid.contains(&index) {
            return Err(MosaicError::TileOutsideGrid(index));
        }

        let bytes = match tile.data {
            TileData::Present(bytes) => bytes,
            TileData::Absent => {
                debug!(tile = %index, "Tile absent, leaving transparent");
                self.skipped += 1;
                return Ok(());
            }
        };

        let decoded = image::load_from_memory(&bytes)
            .map_err(|source| MosaicError::Decode { tile: index, source })?;
        let has_alpha = decoded.color().has_alpha();
        let rgba = decoded.into_rgba8();

        if has_alpha && rgba.pixels().all(|p| p[3] == 0) {
            debug!(tile = %index, "Tile fully transparent, skipping");
            self.skipped += 1;
            return Ok(());
        }

        let size = rgba.dimensions();
        let (tile_w, tile_h) = match self.tile_size {
            Some(expected) if expected != size => {
                return Err(MosaicError::TileSizeMismatch {
                    tile: index,
                    expected,
                    actual: size,
                });
            }
            Some(expected) => expected,
            None => {
                debug!(width = size.0, height = size.1, "Learned tile size");
                self.tile_size = Some(size);
                size
            }
        };

        let (canvas_w, canvas_h) = self.grid.canvas_size(tile_w, tile_h)?;
        let canvas = self
            .canvas
            .get_or_insert_with(|| RgbaImage::new(canvas_w, canvas_h));

        let (origin_x, origin_y) = self.grid.origin();
        let offset_x = i64::from(index.x - origin_x) * i64::from(tile_w);
        let offset_y = i64::from(index.y - origin_y) * i64::from(tile_h);
        imageops::replace(canvas, &rgba, offset_x, offset_y);

        self.pasted += 1;
        Ok(())
    }

    /// Crops the canvas to the query window.
    ///
    /// A fully opaque result is returned as RGB, anything else as RGBA. If
    /// no tile was pasted the result is a transparent canvas of the default
    /// size. Tiles smaller than the default can shrink the window to
    /// nothing, which is reported as a degenerate grid.
    pub fn finish(self) -> Result<DynamicImage, MosaicError> {
        let (tile_w, tile_h) = self.tile_size();
        let window = self.grid.usable_window(tile_w, tile_h)?;
        let canvas = match self.canvas {
            Some(canvas) => canvas,
            None => {
                let (w, h) = self.grid.canvas_size(tile_w, tile_h)?;
                RgbaImage::new(w, h)
            }
        };

        let cropped =
            imageops::crop_imm(&canvas, window.x, window.y, window.width, window.height).to_image();

        info!(
            pasted = self.pasted,
            skipped = self.skipped,
            window = %window,
            "Mosaic assembled"
        );

        let opaque = cropped.pixels().all(|p| p[3] == u8::MAX);
        let image = DynamicImage::ImageRgba8(cropped);
        Ok(if opaque {
            DynamicImage::ImageRgb8(image.to_rgb8())
        } else {
            image
        })
    }
}

/// Assembles `tiles` over `grid` and crops the result.
///
/// Tiles are pasted in index order so that the learned tile size, and any
/// size mismatch reported, do not depend on fetch completion order.
pub fn compose(grid: &TileGrid, mut tiles: Vec<FetchedTile>) -> Result<DynamicImage, MosaicError> {
    tiles.sort_by_key(|t| t.index);

    let mut compositor = MosaicCompositor::new(grid);
    for tile in tiles {
        compositor.paste(tile)?;
    }
    compositor.finish()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::coord::{BoundingBox, GeoPoint, TileIndex};
    use crate::grid::GridError;
    use image::{ImageFormat, Rgba};
    use std::io::Cursor;

    /// Index of the tile covering canvas pixel `(x, y)`.
    fn tile_at_pixel(grid: &TileGrid, tile_size: (u32, u32), x: u32, y: u32) -> TileIndex {
        let (origin_x, origin_y) = grid.origin();
        TileIndex::new(
            origin_x + x / tile_size.0,
            origin_y + y / tile_size.1,
            grid.zoom(),
        )
    }

    fn encode_png(image: &RgbaImage) -> Vec<u8> {
        let mut bytes = Vec::new();
        DynamicImage::ImageRgba8(image.clone())
            .write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)
            .unwrap();
        bytes
    }

    fn solid_tile(size: u32, color: [u8; 4]) -> Vec<u8> {
        encode_png(&RgbaImage::from_pixel(size, size, Rgba(color)))
    }

    fn color_for(tile: &TileIndex) -> [u8; 4] {
        [(tile.x % 256) as u8, (tile.y % 256) as u8, 200, 255]
    }

    fn sicily_grid() -> TileGrid {
        let bbox =
            BoundingBox::new(GeoPoint::new(39.036, 15.040), GeoPoint::new(38.303, 13.634)).unwrap();
        TileGrid::plan(&bbox, 10).unwrap()
    }

    fn all_tiles(grid: &TileGrid) -> Vec<FetchedTile> {
        grid.tiles()
            .into_iter()
            .map(|t| FetchedTile::present(t, solid_tile(256, color_for(&t))))
            .collect()
    }

    #[test]
    fn test_compose_crops_to_window() {
        let grid = sicily_grid();
        let image = compose(&grid, all_tiles(&grid)).unwrap();

        assert_eq!(image.width(), 1024);
        assert_eq!(image.height(), 684);
        // All tiles are opaque, so alpha is dropped
        assert!(matches!(image, DynamicImage::ImageRgb8(_)));
    }

    #[test]
    fn test_tiles_land_at_their_index() {
        let grid = sicily_grid();
        let window = grid.crop_window(256, 256).unwrap();
        let image = compose(&grid, all_tiles(&grid)).unwrap().to_rgb8();

        for (x, y) in [(0, 0), (500, 300), (1023, 683)] {
            let tile = tile_at_pixel(&grid, (256, 256), x + window.x, y + window.y);
            let expected = color_for(&tile);
            assert_eq!(image.get_pixel(x, y).0, [expected[0], expected[1], expected[2]]);
        }
    }

    #[test]
    fn test_compose_is_order_independent() {
        let grid = sicily_grid();
        let forward = compose(&grid, all_tiles(&grid)).unwrap();

        let mut reversed = all_tiles(&grid);
        reversed.reverse();
        let backward = compose(&grid, reversed).unwrap();

        assert_eq!(forward.as_bytes(), backward.as_bytes());
    }

    #[test]
    fn test_absent_tiles_leave_transparency() {
        let grid = sicily_grid();
        let tiles: Vec<_> = grid
            .tiles()
            .into_iter()
            .enumerate()
            .map(|(i, t)| {
                if i == 0 {
                    FetchedTile::absent(t)
                } else {
                    FetchedTile::present(t, solid_tile(256, color_for(&t)))
                }
            })
            .collect();

        let image = compose(&grid, tiles).unwrap();

        let rgba = match image {
            DynamicImage::ImageRgba8(rgba) => rgba,
            other => panic!("Expected RGBA, got {:?}", other.color()),
        };
        // Top-left of the window lies in the first tile
        assert_eq!(rgba.get_pixel(0, 0)[3], 0);
        assert_eq!(rgba.get_pixel(1023, 683)[3], 255);
    }

    #[test]
    fn test_no_tiles_gives_blank_canvas() {
        let grid = sicily_grid();
        let tiles = grid.tiles().into_iter().map(FetchedTile::absent).collect();

        let image = compose(&grid, tiles).unwrap();

        assert_eq!((image.width(), image.height()), (1024, 684));
        assert!(image.to_rgba8().pixels().all(|p| p[3] == 0));
    }

    #[test]
    fn test_transparent_tile_is_skipped() {
        let grid = sicily_grid();
        let first = grid.tiles()[0];
        let mut compositor = MosaicCompositor::new(&grid);

        compositor
            .paste(FetchedTile::present(first, solid_tile(512, [0, 0, 0, 0])))
            .unwrap();

        assert_eq!(compositor.pasted(), 0);
        // A skipped tile does not teach the tile size
        assert_eq!(compositor.tile_size(), (256, 256));
    }

    #[test]
    fn test_learns_tile_size_from_first_tile() {
        let grid = sicily_grid();
        let tiles: Vec<_> = grid
            .tiles()
            .into_iter()
            .map(|t| FetchedTile::present(t, solid_tile(512, color_for(&t))))
            .collect();

        let image = compose(&grid, tiles).unwrap();

        let window = grid.crop_window(512, 512).unwrap();
        assert_eq!((image.width(), image.height()), (window.width, window.height));
    }

    #[test]
    fn test_small_tiles_recheck_degenerate_window() {
        // 0.6 pixels wide with 256 px tiles, 0.3 with 128 px tiles
        let west = 5.0;
        let east = west + 0.6 * 360.0 / 256.0;
        let bbox =
            BoundingBox::new(GeoPoint::new(20.0, east), GeoPoint::new(10.0, west)).unwrap();
        let grid = TileGrid::plan(&bbox, 0).unwrap();
        let tile = grid.tiles()[0];

        let result = compose(&grid, vec![FetchedTile::present(tile, solid_tile(128, [9, 9, 9, 255]))]);
        assert!(matches!(
            result,
            Err(MosaicError::Grid(GridError::Degenerate { zoom: 0, .. }))
        ));

        let image = compose(&grid, vec![FetchedTile::present(tile, solid_tile(256, [9, 9, 9, 255]))])
            .unwrap();
        assert_eq!(image.width(), 1);
    }

    #[test]
    fn test_size_mismatch_is_error() {
        let grid = sicily_grid();
        let tiles = grid.tiles();
        let mut compositor = MosaicCompositor::new(&grid);
        compositor
            .paste(FetchedTile::present(tiles[0], solid_tile(256, [1, 2, 3, 255])))
            .unwrap();

        let result = compositor.paste(FetchedTile::present(tiles[1], solid_tile(512, [1, 2, 3, 255])));

        assert!(matches!(
            result,
            Err(MosaicError::TileSizeMismatch {
                expected: (256, 256),
                actual: (512, 512),
                ..
            })
        ));
    }

    #[test]
    fn test_undecodable_tile_is_error() {
        let grid = sicily_grid();
        let tile = grid.tiles()[0];
        let result = compose(&grid, vec![FetchedTile::present(tile, b"not a png".to_vec())]);
        assert!(matches!(result, Err(MosaicError::Decode { tile: t, .. }) if t == tile));
    }

    #[test]
    fn test_tile_outside_grid_is_error() {
        let grid = sicily_grid();
        let stray = TileIndex::new(0, 0, 10);
        let result = compose(&grid, vec![FetchedTile::present(stray, solid_tile(256, [0; 4]))]);
        assert!(matches!(result, Err(MosaicError::TileOutsideGrid(t)) if t == stray));
    }
}
