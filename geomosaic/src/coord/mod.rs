//! Coordinate conversion module
//!
//! Provides conversions between geographic coordinates (latitude/longitude),
//! Web Mercator meters (EPSG:3857), fractional tile coordinates and
//! world-pixel coordinates used by XYZ tile servers.

mod types;

pub use types::{
    BoundingBox, CoordError, GeoPoint, PixelCoord, TileIndex, EARTH_EQUATORIAL_RADIUS, MAX_LAT,
    MAX_LON, MAX_ZOOM, MERCATOR_SIN_LIMIT, MIN_LAT, MIN_LON, MIN_ZOOM, TILE_SIZE,
};

use std::f64::consts::PI;

/// Number of tiles along one axis at the given zoom level.
#[inline]
fn tiles_per_axis(zoom: u8) -> f64 {
    2.0_f64.powi(zoom as i32)
}

/// Validates a zoom level against [`MAX_ZOOM`].
#[inline]
pub fn validate_zoom(zoom: u8) -> Result<u8, CoordError> {
    if zoom > MAX_ZOOM {
        return Err(CoordError::InvalidZoom(zoom));
    }
    Ok(zoom)
}

/// Converts geographic coordinates to fractional tile coordinates.
///
/// The integer part of each component is the tile index, the fractional
/// part the position inside that tile.
///
/// # Arguments
///
/// * `lat` - Latitude in degrees, strictly between -90 and 90
/// * `lng` - Longitude in degrees (-180.0 to 180.0)
/// * `zoom` - Zoom level (0 to 22)
///
/// # Errors
///
/// `tan(lat)` is undefined at the poles, so `|lat| >= 90` is rejected, as are
/// non-finite inputs and zooms above [`MAX_ZOOM`].
#[inline]
pub fn lat_lng_to_tile_fraction(lat: f64, lng: f64, zoom: u8) -> Result<(f64, f64), CoordError> {
    if !lat.is_finite() || lat.abs() >= MAX_LAT {
        return Err(CoordError::InvalidLatitude(lat));
    }
    if !lng.is_finite() || !(MIN_LON..=MAX_LON).contains(&lng) {
        return Err(CoordError::InvalidLongitude(lng));
    }
    validate_zoom(zoom)?;

    let n = tiles_per_axis(zoom);
    let x = (lng + 180.0) / 360.0 * n;
    let y = (1.0 - lat.to_radians().tan().asinh() / PI) * n / 2.0;

    Ok((x, y))
}

/// Converts fractional tile coordinates back to geographic coordinates.
#[inline]
pub fn tile_fraction_to_lat_lng(x: f64, y: f64, zoom: u8) -> GeoPoint {
    let n = tiles_per_axis(zoom);
    let lng = x / n * 360.0 - 180.0;
    let lat = (PI * (1.0 - 2.0 * y / n)).sinh().atan().to_degrees();
    GeoPoint::new(lat, lng)
}

/// Converts geographic coordinates to Web Mercator meters (EPSG:3857).
///
/// Uses the identity `ln(tan(45° + φ/2)) = atanh(sin φ)` so that the same
/// [`MERCATOR_SIN_LIMIT`] clamp as [`lat_lng_to_pixel_at_zoom`] keeps the
/// result finite at the poles.
#[inline]
pub fn lat_lng_to_web_mercator(lat: f64, lng: f64) -> (f64, f64) {
    let x = lng.to_radians() * EARTH_EQUATORIAL_RADIUS;
    let sin_lat = lat
        .to_radians()
        .sin()
        .clamp(-MERCATOR_SIN_LIMIT, MERCATOR_SIN_LIMIT);
    let y = sin_lat.atanh() * EARTH_EQUATORIAL_RADIUS;
    (x, y)
}

/// Converts Web Mercator meters (EPSG:3857) to geographic coordinates.
#[inline]
pub fn web_mercator_to_lat_lng(x: f64, y: f64) -> GeoPoint {
    let lng = (x / EARTH_EQUATORIAL_RADIUS).to_degrees();
    let lat = (y / EARTH_EQUATORIAL_RADIUS).sinh().atan().to_degrees();
    GeoPoint::new(lat, lng)
}

/// Projects a geographic point to unfloored world-pixel coordinates.
#[inline]
pub fn world_pixel_at_zoom(lat: f64, lng: f64, zoom: u8) -> (f64, f64) {
    let sin_y = (lat * PI / 180.0)
        .sin()
        .clamp(-MERCATOR_SIN_LIMIT, MERCATOR_SIN_LIMIT);
    let tile = f64::from(TILE_SIZE);

    let x = tile * (0.5 + lng / 360.0);
    let y = tile * (0.5 - ((1.0 + sin_y) / (1.0 - sin_y)).ln() / (4.0 * PI));

    let scale = tiles_per_axis(zoom);
    (x * scale, y * scale)
}

/// Projects a geographic point to integer world-pixel coordinates.
///
/// This is the projection used by web map clients for pointer positions,
/// so it is what prompt coordinates are measured in.
#[inline]
pub fn lat_lng_to_pixel_at_zoom(lat: f64, lng: f64, zoom: u8) -> PixelCoord {
    let (x, y) = world_pixel_at_zoom(lat, lng, zoom);
    PixelCoord::new(x.floor() as i64, y.floor() as i64)
}

/// Inverse of [`world_pixel_at_zoom`].
#[inline]
pub fn world_pixel_to_lat_lng(px: f64, py: f64, zoom: u8) -> GeoPoint {
    let scale = f64::from(TILE_SIZE) * tiles_per_axis(zoom);
    let lng = px / scale * 360.0 - 180.0;
    let lat = (PI * (1.0 - 2.0 * py / scale)).sinh().atan().to_degrees();
    GeoPoint::new(lat, lng)
}

/// Converts a geographic point into a pixel offset relative to the raster
/// covering `ne`/`sw`.
///
/// The offset is measured from the western edge (`sw`) horizontally and
/// from the northern edge (`ne`) vertically, i.e. from the raster's top-left
/// corner.
pub fn prompt_point_to_pixel_offset(
    ne: GeoPoint,
    sw: GeoPoint,
    point: GeoPoint,
    zoom: u8,
) -> PixelCoord {
    let origin_ne = lat_lng_to_pixel_at_zoom(ne.lat, ne.lng, zoom);
    let origin_sw = lat_lng_to_pixel_at_zoom(sw.lat, sw.lng, zoom);
    let current = lat_lng_to_pixel_at_zoom(point.lat, point.lng, zoom);

    PixelCoord::new(
        (origin_sw.x - current.x).abs(),
        (origin_ne.y - current.y).abs(),
    )
}
