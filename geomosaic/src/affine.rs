//! Affine georeferencing.
//!
//! An [`AffineTransform`] maps raster pixel coordinates `(col, row)` to Web
//! Mercator meters using the six GDAL-ordered coefficients:
//!
//! ```text
//! x = origin_x + col · pixel_width + row · rotation_x
//! y = origin_y + col · rotation_y  + row · pixel_height
//! ```
//!
//! North-up rasters have `pixel_width > 0`, `pixel_height < 0` and zero
//! rotation.

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::coord::{lat_lng_to_web_mercator, BoundingBox};

/// Errors building or parsing an affine transform.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum AffineError {
    #[error("expected exactly 6 affine coefficients, got {0}")]
    CoefficientCount(usize),

    #[error("affine coefficient {index} is not finite: {value}")]
    NonFinite { index: usize, value: f64 },

    #[error("pixel width must be positive, got {0}")]
    InvalidPixelWidth(f64),

    #[error("pixel height must be negative, got {0}")]
    InvalidPixelHeight(f64),

    #[error("raster must have non-zero size, got {width}x{height}")]
    EmptyRaster { width: u32, height: u32 },

    #[error("affine transform is singular and cannot be inverted")]
    Singular,
}

/// Six-coefficient affine transform in GDAL order.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Vec<f64>", into = "[f64; 6]")]
pub struct AffineTransform {
    origin_x: f64,
    pixel_width: f64,
    rotation_x: f64,
    origin_y: f64,
    rotation_y: f64,
    pixel_height: f64,
}

impl AffineTransform {
    /// Builds a north-up transform from two opposite world corners (meters)
    /// and the raster size they span.
    pub fn from_corners(
        a: (f64, f64),
        b: (f64, f64),
        width: u32,
        height: u32,
    ) -> Result<Self, AffineError> {
        if width == 0 || height == 0 {
            return Err(AffineError::EmptyRaster { width, height });
        }

        let pixel_width = (b.0 - a.0).abs() / f64::from(width);
        let pixel_height = (b.1 - a.1).abs() / f64::from(height);

        Self::from_gdal(&[
            a.0.min(b.0),
            pixel_width,
            0.0,
            a.1.max(b.1),
            0.0,
            -pixel_height,
        ])
    }

    /// Builds the transform of a raster covering `bbox`.
    pub fn from_bbox(bbox: &BoundingBox, width: u32, height: u32) -> Result<Self, AffineError> {
        let ne = bbox.ne();
        let sw = bbox.sw();
        let ne_m = lat_lng_to_web_mercator(ne.lat, ne.lng);
        let sw_m = lat_lng_to_web_mercator(sw.lat, sw.lng);
        Self::from_corners(sw_m, ne_m, width, height)
    }

    /// Parses six GDAL-ordered coefficients.
    ///
    /// Rejects any other count, non-finite values, and coefficients that
    /// break `pixel_width > 0` or `pixel_height < 0`.
    pub fn from_gdal(coefficients: &[f64]) -> Result<Self, AffineError> {
        let c: [f64; 6] = coefficients
            .try_into()
            .map_err(|_| AffineError::CoefficientCount(coefficients.len()))?;

        if let Some((index, &value)) = c.iter().enumerate().find(|(_, v)| !v.is_finite()) {
            return Err(AffineError::NonFinite { index, value });
        }
        if c[1] <= 0.0 {
            return Err(AffineError::InvalidPixelWidth(c[1]));
        }
        if c[5] >= 0.0 {
            return Err(AffineError::InvalidPixelHeight(c[5]));
        }

        Ok(Self {
            origin_x: c[0],
            pixel_width: c[1],
            rotation_x: c[2],
            origin_y: c[3],
            rotation_y: c[4],
            pixel_height: c[5],
        })
    }

    pub fn to_gdal(&self) -> [f64; 6] {
        [
            self.origin_x,
            self.pixel_width,
            self.rotation_x,
            self.origin_y,
            self.rotation_y,
            self.pixel_height,
        ]
    }

    pub fn origin(&self) -> (f64, f64) {
        (self.origin_x, self.origin_y)
    }

    pub fn pixel_width(&self) -> f64 {
        self.pixel_width
    }

    pub fn pixel_height(&self) -> f64 {
        self.pixel_height
    }

    /// Maps pixel `(col, row)` to world coordinates.
    #[inline]
    pub fn apply(&self, col: f64, row: f64) -> (f64, f64) {
        (
            self.origin_x + col * self.pixel_width + row * self.rotation_x,
            self.origin_y + col * self.rotation_y + row * self.pixel_height,
        )
    }

    /// Returns the inverse mapping, world coordinates to `(col, row)`.
    ///
    /// The inverse of a north-up transform is itself north-up, but with a
    /// rotation it may not satisfy the sign invariants, so it is only
    /// meaningful through [`apply`](Self::apply).
    pub fn invert(&self) -> Result<Self, AffineError> {
        let det = self.pixel_width * self.pixel_height - self.rotation_x * self.rotation_y;
        if det == 0.0 || !det.is_finite() {
            return Err(AffineError::Singular);
        }

        let pixel_width = self.pixel_height / det;
        let rotation_x = -self.rotation_x / det;
        let rotation_y = -self.rotation_y / det;
        let pixel_height = self.pixel_width / det;

        Ok(Self {
            origin_x: -(pixel_width * self.origin_x + rotation_x * self.origin_y),
            pixel_width,
            rotation_x,
            origin_y: -(rotation_y * self.origin_x + pixel_height * self.origin_y),
            rotation_y,
            pixel_height,
        })
    }
}

impl TryFrom<Vec<f64>> for AffineTransform {
    type Error = AffineError;

    fn try_from(coefficients: Vec<f64>) -> Result<Self, Self::Error> {
        Self::from_gdal(&coefficients)
    }
}

impl From<AffineTransform> for [f64; 6] {
    fn from(transform: AffineTransform) -> Self {
        transform.to_gdal()
    }
}

impl fmt::Display for AffineTransform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let c = self.to_gdal();
        write!(
            f,
            "({}, {}, {}, {}, {}, {})",
            c[0], c[1], c[2], c[3], c[4], c[5]
        )
    }
}
