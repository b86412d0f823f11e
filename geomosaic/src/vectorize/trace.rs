//! Region labeling and boundary tracing on the pixel grid.
//!
//! Regions come from `imageproc`'s 4-connected component labeling. Each
//! region is then redrawn at double resolution, every pixel as a 3x3 block
//! overlapping its neighbours, so that pixel corners land on cells of their
//! own. Suzuki-Abe border following over that canvas yields the region's
//! outer border and one hole border per enclosed 4-connected background
//! area.
//!
//! Rings run along pixel edges, so their vertices are pixel corners:
//! `(col, row)` in raster space with rows growing downward. Exterior rings
//! are positive in shoelace area and holes negative, each starting at its
//! top-left vertex.
//!
//! Where a region touches itself diagonally, the shared corner belongs to
//! the region. Holes meeting at a corner then stay separate rings, and a
//! hole touching the exterior meets it at a single vertex.

use image::{GrayImage, ImageBuffer, Luma};
use imageproc::contours::{find_contours, BorderType, Contour};
use imageproc::region_labelling::{connected_components, Connectivity};

use super::LabelMask;

/// A 4-connected set of pixels sharing one value.
#[derive(Debug, Clone)]
pub(crate) struct Region {
    pub value: u8,
    pub pixels: Vec<(u32, u32)>,
}

/// The regions of a mask, in scan order of their first pixel.
pub(crate) struct Labeling {
    pub regions: Vec<Region>,
}

impl Labeling {
    pub fn new(mask: &LabelMask) -> Self {
        let (width, height) = (mask.width(), mask.height());
        let data = mask.data();
        if data.is_empty() {
            return Self {
                regions: Vec::new(),
            };
        }

        // Shifted by one so that no pixel equals the reserved background.
        let shifted: ImageBuffer<Luma<u16>, Vec<u16>> =
            ImageBuffer::from_fn(width, height, |x, y| {
                Luma([u16::from(data[y as usize * width as usize + x as usize]) + 1])
            });
        let components = connected_components(&shifted, Connectivity::Four, Luma([0u16]));

        let mut region_of: Vec<Option<usize>> = vec![None; data.len() + 1];
        let mut regions: Vec<Region> = Vec::new();
        for (x, y, label) in components.enumerate_pixels() {
            let Some(slot) = region_of.get_mut(label[0] as usize) else {
                continue;
            };
            let id = *slot.get_or_insert_with(|| {
                regions.push(Region {
                    value: data[y as usize * width as usize + x as usize],
                    pixels: Vec::new(),
                });
                regions.len() - 1
            });
            regions[id].pixels.push((x, y));
        }

        Self { regions }
    }

    /// Traces the boundary rings of region `id`, exterior first.
    pub fn rings(&self, id: usize) -> Vec<Ring> {
        let Some(region) = self.regions.get(id) else {
            return Vec::new();
        };
        let Some((min_x, min_y, max_x, max_y)) = bounds(&region.pixels) else {
            return Vec::new();
        };

        // One blank cell of padding on every side keeps borders off the edge.
        let mut canvas = GrayImage::new(2 * (max_x - min_x) + 5, 2 * (max_y - min_y) + 5);
        for &(x, y) in &region.pixels {
            let (left, top) = (2 * (x - min_x) + 1, 2 * (y - min_y) + 1);
            for dy in 0..3 {
                for dx in 0..3 {
                    canvas.put_pixel(left + dx, top + dy, Luma([255]));
                }
            }
        }

        let origin = (i64::from(min_x), i64::from(min_y));
        let mut rings: Vec<Ring> = find_contours::<u32>(&canvas)
            .iter()
            .filter_map(|contour| Ring::from_contour(contour, origin))
            .collect();
        rings.sort_by_key(|ring| !ring.is_exterior());
        rings
    }
}

fn bounds(pixels: &[(u32, u32)]) -> Option<(u32, u32, u32, u32)> {
    let (&(x, y), rest) = pixels.split_first()?;
    Some(rest.iter().fold((x, y, x, y), |(x0, y0, x1, y1), &(x, y)| {
        (x0.min(x), y0.min(y), x1.max(x), y1.max(y))
    }))
}

/// Pixel corners sit on odd cells of the padded canvas.
fn is_corner(cell: (i64, i64)) -> bool {
    cell.0 % 2 == 1 && cell.1 % 2 == 1
}

fn step(from: (i64, i64), to: (i64, i64)) -> (i64, i64) {
    ((to.0 - from.0).signum(), (to.1 - from.1).signum())
}

/// Closed ring of pixel-corner vertices without collinear points.
///
/// The first vertex is repeated at the end.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Ring {
    pub vertices: Vec<(i64, i64)>,
}

impl Ring {
    /// Maps a border traced on the doubled canvas back to pixel corners.
    fn from_contour(contour: &Contour<u32>, origin: (i64, i64)) -> Option<Self> {
        let cells: Vec<(i64, i64)> = contour
            .points
            .iter()
            .map(|p| (i64::from(p.x), i64::from(p.y)))
            .collect();

        let mut path = Vec::with_capacity(cells.len() * 2);
        for (i, &cell) in cells.iter().enumerate() {
            let next = cells[(i + 1) % cells.len()];
            if cell == next {
                continue;
            }
            path.push(cell);
            // Diagonal steps cut across a pixel corner.
            if cell.0 != next.0 && cell.1 != next.1 {
                let corner = if is_corner((next.0, cell.1)) {
                    (next.0, cell.1)
                } else {
                    (cell.0, next.1)
                };
                path.push(corner);
            }
        }

        let n = path.len();
        let mut vertices: Vec<(i64, i64)> = (0..n)
            .filter(|&i| {
                let (prev, here, next) = (path[(i + n - 1) % n], path[i], path[(i + 1) % n]);
                step(prev, here) != step(here, next)
            })
            .map(|i| {
                let (x, y) = path[i];
                ((x - 1) / 2 + origin.0, (y - 1) / 2 + origin.1)
            })
            .collect();
        if vertices.len() < 3 {
            return None;
        }

        let exterior = matches!(contour.border_type, BorderType::Outer);
        if (shoelace(&vertices) + closing_term(&vertices) > 0) != exterior {
            vertices.reverse();
        }
        let start = (0..vertices.len())
            .min_by_key(|&i| (vertices[i].1, vertices[i].0))
            .unwrap_or(0);
        vertices.rotate_left(start);
        vertices.push(vertices[0]);

        Some(Self { vertices })
    }

    /// Twice the shoelace area; positive for exterior rings.
    pub fn doubled_area(&self) -> i64 {
        shoelace(&self.vertices)
    }

    pub fn is_exterior(&self) -> bool {
        self.doubled_area() > 0
    }
}

fn shoelace(vertices: &[(i64, i64)]) -> i64 {
    vertices
        .windows(2)
        .map(|w| w[0].0 * w[1].1 - w[1].0 * w[0].1)
        .sum()
}

/// Shoelace term from the last vertex back to the first of an open ring.
fn closing_term(vertices: &[(i64, i64)]) -> i64 {
    match (vertices.first(), vertices.last()) {
        (Some(&(x0, y0)), Some(&(x1, y1))) => x1 * y0 - x0 * y1,
        _ => 0,
    }
}
