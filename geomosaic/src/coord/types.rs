//! Coordinate types and validation errors.

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Earth's equatorial radius in meters (WGS 84 / Pseudo-Mercator sphere).
pub const EARTH_EQUATORIAL_RADIUS: f64 = 6_378_137.0;

/// Pixel size of one Web Mercator tile.
pub const TILE_SIZE: u32 = 256;

/// Minimum supported zoom level.
pub const MIN_ZOOM: u8 = 0;

/// Maximum supported zoom level.
pub const MAX_ZOOM: u8 = 22;

/// Minimum valid latitude in degrees.
pub const MIN_LAT: f64 = -90.0;

/// Maximum valid latitude in degrees.
pub const MAX_LAT: f64 = 90.0;

/// Minimum valid longitude in degrees.
pub const MIN_LON: f64 = -180.0;

/// Maximum valid longitude in degrees.
pub const MAX_LON: f64 = 180.0;

/// Clamp applied to `sin(lat)` before the Mercator log term.
///
/// Both the world-pixel and the meter projections saturate here, which
/// corresponds to roughly ±89.19° of latitude.
pub const MERCATOR_SIN_LIMIT: f64 = 0.9999;

/// Errors that can occur during coordinate conversion.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum CoordError {
    /// Latitude is outside the projectable range.
    #[error("invalid latitude {0}: must be finite and strictly between -90 and 90")]
    InvalidLatitude(f64),

    /// Longitude is outside -180..=180.
    #[error("invalid longitude {0}: must be between -180 and 180")]
    InvalidLongitude(f64),

    /// Zoom level above [`MAX_ZOOM`].
    #[error("invalid zoom level {0}: must be between {MIN_ZOOM} and {MAX_ZOOM}")]
    InvalidZoom(u8),

    /// The two corners do not describe a usable bounding box.
    #[error("invalid bounding box: {0}")]
    InvalidBoundingBox(String),
}

/// A geographic point in degrees (EPSG:4326).
///
/// Longitude wrapping is not performed; callers normalize.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub lat: f64,
    pub lng: f64,
}

impl GeoPoint {
    pub fn new(lat: f64, lng: f64) -> Self {
        Self { lat, lng }
    }

    /// Checks the point lies inside the geographic domain.
    pub fn validate(&self) -> Result<(), CoordError> {
        if !self.lat.is_finite() || !(MIN_LAT..=MAX_LAT).contains(&self.lat) {
            return Err(CoordError::InvalidLatitude(self.lat));
        }
        if !self.lng.is_finite() || !(MIN_LON..=MAX_LON).contains(&self.lng) {
            return Err(CoordError::InvalidLongitude(self.lng));
        }
        Ok(())
    }
}

impl fmt::Display for GeoPoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({:.6}, {:.6})", self.lat, self.lng)
    }
}

/// Raw corner pair as it arrives over the wire, before validation.
#[derive(Debug, Clone, Copy, Deserialize)]
struct RawBoundingBox {
    ne: GeoPoint,
    sw: GeoPoint,
}

/// A geographic bounding box given by its north-east and south-west corners.
///
/// # Invariants
///
/// - `ne.lat > sw.lat`
/// - the corners differ in longitude, so the box never collapses to a line
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawBoundingBox")]
pub struct BoundingBox {
    ne: GeoPoint,
    sw: GeoPoint,
}

impl BoundingBox {
    /// Creates a bounding box from its north-east and south-west corners.
    pub fn new(ne: GeoPoint, sw: GeoPoint) -> Result<Self, CoordError> {
        ne.validate()?;
        sw.validate()?;
        if ne.lat <= sw.lat {
            return Err(CoordError::InvalidBoundingBox(format!(
                "north-east latitude {} must be greater than south-west latitude {}",
                ne.lat, sw.lat
            )));
        }
        if ne.lng == sw.lng {
            return Err(CoordError::InvalidBoundingBox(format!(
                "corners share longitude {}",
                ne.lng
            )));
        }
        Ok(Self { ne, sw })
    }

    /// Creates a bounding box from any two opposite corners.
    pub fn from_corners(a: GeoPoint, b: GeoPoint) -> Result<Self, CoordError> {
        let ne = GeoPoint::new(a.lat.max(b.lat), a.lng.max(b.lng));
        let sw = GeoPoint::new(a.lat.min(b.lat), a.lng.min(b.lng));
        Self::new(ne, sw)
    }

    pub fn ne(&self) -> GeoPoint {
        self.ne
    }

    pub fn sw(&self) -> GeoPoint {
        self.sw
    }

    /// Returns true if the point falls inside the box (inclusive).
    pub fn contains(&self, point: GeoPoint) -> bool {
        let (west, east) = (self.sw.lng.min(self.ne.lng), self.sw.lng.max(self.ne.lng));
        (self.sw.lat..=self.ne.lat).contains(&point.lat) && (west..=east).contains(&point.lng)
    }
}

impl TryFrom<RawBoundingBox> for BoundingBox {
    type Error = CoordError;

    fn try_from(raw: RawBoundingBox) -> Result<Self, Self::Error> {
        Self::new(raw.ne, raw.sw)
    }
}

impl fmt::Display for BoundingBox {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ne{} sw{}", self.ne, self.sw)
    }
}

/// Integer tile coordinate at a zoom level.
///
/// - `x`: column, increasing eastward
/// - `y`: row, increasing southward
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TileIndex {
    pub x: u32,
    pub y: u32,
    pub z: u8,
}

impl TileIndex {
    pub fn new(x: u32, y: u32, z: u8) -> Self {
        Self { x, y, z }
    }
}

impl fmt::Display for TileIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.z, self.x, self.y)
    }
}

/// Integer pixel coordinate, either in world-pixel space or as an offset
/// into a raster.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PixelCoord {
    pub x: i64,
    pub y: i64,
}

impl PixelCoord {
    pub fn new(x: i64, y: i64) -> Self {
        Self { x, y }
    }
}
