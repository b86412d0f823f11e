//! Mask vectorization
//!
//! Converts a label raster into GeoJSON polygons:
//!
//! 1. label 4-connected regions of equal value
//! 2. trace each region's boundary along pixel edges into rings
//! 3. map ring vertices through the raster's [`AffineTransform`] into Web
//!    Mercator meters
//! 4. reproject to longitude/latitude (EPSG:4326)
//!
//! Exterior rings are counter-clockwise and holes clockwise, following
//! RFC 7946.

mod geojson;
mod trace;

pub use geojson::{Feature, FeatureCollection, FeatureProperties, Geometry};

use geo::algorithm::orient::{Direction, Orient};
use geo::{Coord, LineString, MapCoords, Polygon};
use image::{DynamicImage, GrayImage};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info};

use crate::affine::AffineTransform;
use crate::coord::web_mercator_to_lat_lng;
use trace::{Labeling, Ring};

/// Errors constructing a [`LabelMask`].
#[derive(Debug, Clone, PartialEq, Error)]
pub enum MaskError {
    #[error("mask data has {len} bytes, expected {width}x{height}")]
    DimensionMismatch { width: u32, height: u32, len: usize },
}

/// Row-major label raster; non-zero values are foreground.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LabelMask {
    width: u32,
    height: u32,
    data: Vec<u8>,
}

impl LabelMask {
    pub fn new(width: u32, height: u32, data: Vec<u8>) -> Result<Self, MaskError> {
        if data.len() != width as usize * height as usize {
            return Err(MaskError::DimensionMismatch {
                width,
                height,
                len: data.len(),
            });
        }
        Ok(Self {
            width,
            height,
            data,
        })
    }

    /// An all-background mask.
    pub fn zeros(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            data: vec![0; width as usize * height as usize],
        }
    }

    pub fn from_gray(image: GrayImage) -> Self {
        let (width, height) = image.dimensions();
        Self {
            width,
            height,
            data: image.into_raw(),
        }
    }

    /// Uses the luma channel of any image as labels.
    pub fn from_image(image: &DynamicImage) -> Self {
        Self::from_gray(image.to_luma8())
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn get(&self, x: u32, y: u32) -> Option<u8> {
        if x >= self.width || y >= self.height {
            return None;
        }
        self.data
            .get(y as usize * self.width as usize + x as usize)
            .copied()
    }

    pub fn set(&mut self, x: u32, y: u32, value: u8) {
        if x < self.width && y < self.height {
            self.data[y as usize * self.width as usize + x as usize] = value;
        }
    }

    /// Number of non-zero pixels.
    pub fn foreground_count(&self) -> usize {
        self.data.iter().filter(|&&v| v != 0).count()
    }
}

/// Options for [`vectorize_with`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct VectorizeOptions {
    /// Also emit polygons for value-0 regions.
    pub include_background: bool,
}

/// Vectorized mask: the features plus their count.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VectorizedMask {
    pub geojson: FeatureCollection,
    pub n_shapes: usize,
}

/// Vectorizes the foreground (non-zero) regions of `mask`.
///
/// Value-0 regions are dropped; use [`vectorize_with`] and
/// [`VectorizeOptions::include_background`] to keep them.
pub fn vectorize(mask: &LabelMask, transform: &AffineTransform) -> VectorizedMask {
    vectorize_with(mask, transform, VectorizeOptions::default())
}

/// Vectorizes `mask` with explicit options.
pub fn vectorize_with(
    mask: &LabelMask,
    transform: &AffineTransform,
    options: VectorizeOptions,
) -> VectorizedMask {
    let labeling = Labeling::new(mask);
    let mut features = Vec::new();

    for (id, region) in labeling.regions.iter().enumerate() {
        if region.value == 0 && !options.include_background {
            continue;
        }

        for polygon in assemble_polygons(labeling.rings(id)) {
            let geographic = polygon
                .map_coords(|c| {
                    let (x, y) = transform.apply(c.x, c.y);
                    let point = web_mercator_to_lat_lng(x, y);
                    Coord {
                        x: point.lng,
                        y: point.lat,
                    }
                })
                .orient(Direction::Default);
            features.push(Feature::from_polygon(&geographic, region.value));
        }
    }

    let n_shapes = features.len();
    info!(
        width = mask.width(),
        height = mask.height(),
        regions = labeling.regions.len(),
        n_shapes,
        "Mask vectorized"
    );

    VectorizedMask {
        geojson: FeatureCollection { features },
        n_shapes,
    }
}

/// Groups a region's rings into polygons in raster space.
///
/// The largest exterior ring takes every hole. A 4-connected region has a
/// single exterior; any other exterior ring becomes its own polygon.
fn assemble_polygons(rings: Vec<Ring>) -> Vec<Polygon<f64>> {
    let (mut exteriors, holes): (Vec<_>, Vec<_>) =
        rings.into_iter().partition(|r| r.is_exterior());
    exteriors.sort_by_key(|r| std::cmp::Reverse(r.doubled_area()));

    if exteriors.len() > 1 {
        debug!(exteriors = exteriors.len(), "Region traced to several exteriors");
    }

    let to_line = |ring: &Ring| -> LineString<f64> {
        ring.vertices
            .iter()
            .map(|&(x, y)| (x as f64, y as f64))
            .collect::<Vec<_>>()
            .into()
    };

    let mut interiors: Vec<LineString<f64>> = holes.iter().map(to_line).collect();
    exteriors
        .iter()
        .map(|exterior| Polygon::new(to_line(exterior), std::mem::take(&mut interiors)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::coord::{BoundingBox, GeoPoint};
    use geo::{Area, Centroid, Contains, Point};

    fn bbox() -> BoundingBox {
        BoundingBox::new(GeoPoint::new(39.036, 15.040), GeoPoint::new(38.303, 13.634)).unwrap()
    }

    fn transform(width: u32, height: u32) -> AffineTransform {
        AffineTransform::from_bbox(&bbox(), width, height).unwrap()
    }

    fn square_blob(size: u32, from: u32, to: u32, value: u8) -> LabelMask {
        let mut mask = LabelMask::zeros(size, size);
        for y in from..to {
            for x in from..to {
                mask.set(x, y, value);
            }
        }
        mask
    }

    #[test]
    fn test_label_mask_dimension_check() {
        let result = LabelMask::new(3, 3, vec![0; 8]);
        assert_eq!(
            result,
            Err(MaskError::DimensionMismatch {
                width: 3,
                height: 3,
                len: 8
            })
        );
    }

    #[test]
    fn test_empty_mask_has_no_shapes() {
        let mask = LabelMask::zeros(64, 64);
        let result = vectorize(&mask, &transform(64, 64));
        assert_eq!(result.n_shapes, 0);
        assert!(result.geojson.is_empty());
    }

    #[test]
    fn test_single_blob_is_one_feature() {
        let mask = square_blob(64, 16, 48, 1);
        let result = vectorize(&mask, &transform(64, 64));

        assert_eq!(result.n_shapes, 1);
        let feature = &result.geojson.features[0];
        assert_eq!(feature.properties.raster_val, 1.0);

        let polygon = feature.to_polygon();
        assert!(polygon.interiors().is_empty());
        // Four corners plus closing vertex
        assert_eq!(polygon.exterior().0.len(), 5);
    }

    #[test]
    fn test_blob_is_georeferenced() {
        let mask = square_blob(64, 16, 48, 1);
        let t = transform(64, 64);
        let result = vectorize(&mask, &t);
        let polygon = result.geojson.features[0].to_polygon();

        // The blob centre is the raster centre
        let (cx, cy) = t.apply(32.0, 32.0);
        let expected = web_mercator_to_lat_lng(cx, cy);
        let centroid = polygon.centroid().unwrap();
        assert!((centroid.x() - expected.lng).abs() < 1e-3);
        assert!((centroid.y() - expected.lat).abs() < 1e-3);
        assert!(bbox().contains(GeoPoint::new(centroid.y(), centroid.x())));
    }

    #[test]
    fn test_full_mask_matches_bbox() {
        let mask = square_blob(8, 0, 8, 1);
        let result = vectorize(&mask, &transform(8, 8));
        let polygon = result.geojson.features[0].to_polygon();

        let lngs: Vec<f64> = polygon.exterior().coords().map(|c| c.x).collect();
        let lats: Vec<f64> = polygon.exterior().coords().map(|c| c.y).collect();
        let min = |v: &[f64]| v.iter().copied().fold(f64::INFINITY, f64::min);
        let max = |v: &[f64]| v.iter().copied().fold(f64::NEG_INFINITY, f64::max);

        assert!((min(&lngs) - 13.634).abs() < 1e-9);
        assert!((max(&lngs) - 15.040).abs() < 1e-9);
        assert!((min(&lats) - 38.303).abs() < 1e-9);
        assert!((max(&lats) - 39.036).abs() < 1e-9);
    }

    #[test]
    fn test_exterior_is_counter_clockwise() {
        let mask = square_blob(32, 4, 20, 1);
        let result = vectorize(&mask, &transform(32, 32));
        let polygon = result.geojson.features[0].to_polygon();
        let exterior = Polygon::new(polygon.exterior().clone(), vec![]);
        assert!(exterior.signed_area() > 0.0);
    }

    #[test]
    fn test_background_included_on_request() {
        let mask = square_blob(16, 4, 12, 1);
        let t = transform(16, 16);
        let options = VectorizeOptions {
            include_background: true,
        };

        let default = vectorize(&mask, &t);
        assert_eq!(default.n_shapes, 1);
        assert!(default
            .geojson
            .features
            .iter()
            .all(|f| f.properties.raster_val != 0.0));

        let result = vectorize_with(&mask, &t, options);

        assert_eq!(result.n_shapes, 2);
        let background = result
            .geojson
            .features
            .iter()
            .find(|f| f.properties.raster_val == 0.0)
            .unwrap()
            .to_polygon();
        assert_eq!(background.interiors().len(), 1);

        // Hole winds clockwise
        let hole = Polygon::new(background.interiors()[0].clone(), vec![]);
        assert!(hole.signed_area() < 0.0);

        // A point inside the blob is not inside the background polygon
        let (x, y) = t.apply(8.0, 8.0);
        let inside = web_mercator_to_lat_lng(x, y);
        assert!(!background.contains(&Point::new(inside.lng, inside.lat)));
    }

    #[test]
    fn test_values_become_separate_features() {
        let mut mask = LabelMask::zeros(10, 4);
        for y in 0..4 {
            mask.set(1, y, 1);
            mask.set(2, y, 1);
            mask.set(6, y, 2);
        }

        let result = vectorize(&mask, &transform(10, 4));

        assert_eq!(result.n_shapes, 2);
        let mut values: Vec<f64> = result
            .geojson
            .features
            .iter()
            .map(|f| f.properties.raster_val)
            .collect();
        values.sort_by(f64::total_cmp);
        assert_eq!(values, vec![1.0, 2.0]);
    }

    #[test]
    fn test_ring_with_hole() {
        // A donut: 6x6 block with a 2x2 hole
        let mut mask = square_blob(8, 1, 7, 1);
        for y in 3..5 {
            for x in 3..5 {
                mask.set(x, y, 0);
            }
        }

        let result = vectorize(&mask, &transform(8, 8));

        assert_eq!(result.n_shapes, 1);
        let polygon = result.geojson.features[0].to_polygon();
        assert_eq!(polygon.interiors().len(), 1);
        let outer = Polygon::new(polygon.exterior().clone(), vec![]).unsigned_area();
        assert!(polygon.unsigned_area() < outer);
    }

    #[test]
    fn test_diagonal_pixels_are_two_shapes() {
        let mut mask = LabelMask::zeros(4, 4);
        mask.set(1, 1, 1);
        mask.set(2, 2, 1);

        let result = vectorize(&mask, &transform(4, 4));

        assert_eq!(result.n_shapes, 2);
    }

    #[test]
    fn test_from_gray() {
        let mut image = GrayImage::new(4, 2);
        image.put_pixel(3, 1, image::Luma([255]));
        let mask = LabelMask::from_gray(image);
        assert_eq!(mask.get(3, 1), Some(255));
        assert_eq!(mask.foreground_count(), 1);
        assert_eq!(mask.get(4, 0), None);
    }
}
