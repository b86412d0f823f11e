//! Minimal GeoJSON (RFC 7946) output types.

use geo::Polygon;
use serde::{Deserialize, Serialize};

/// A GeoJSON `FeatureCollection`.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(tag = "type")]
pub struct FeatureCollection {
    pub features: Vec<Feature>,
}

impl FeatureCollection {
    pub fn len(&self) -> usize {
        self.features.len()
    }

    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }
}

/// A GeoJSON `Feature` carrying the raster value of its region.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub struct Feature {
    pub geometry: Geometry,
    pub properties: FeatureProperties,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureProperties {
    pub raster_val: f64,
}

/// GeoJSON geometry. Positions are `[longitude, latitude]`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Geometry {
    Polygon { coordinates: Vec<Vec<[f64; 2]>> },
}

impl Feature {
    /// Wraps a polygon whose coordinates are already `(lng, lat)`.
    pub fn from_polygon(polygon: &Polygon<f64>, raster_val: u8) -> Self {
        let ring = |line: &geo::LineString<f64>| -> Vec<[f64; 2]> {
            line.coords().map(|c| [c.x, c.y]).collect()
        };

        let mut coordinates = Vec::with_capacity(1 + polygon.interiors().len());
        coordinates.push(ring(polygon.exterior()));
        coordinates.extend(polygon.interiors().iter().map(ring));

        Self {
            geometry: Geometry::Polygon { coordinates },
            properties: FeatureProperties {
                raster_val: f64::from(raster_val),
            },
        }
    }

    /// Converts the geometry back into a `geo` polygon.
    pub fn to_polygon(&self) -> Polygon<f64> {
        let Geometry::Polygon { coordinates } = &self.geometry;
        let mut rings = coordinates.iter().map(|ring| {
            geo::LineString::from(ring.iter().map(|&[x, y]| (x, y)).collect::<Vec<_>>())
        });
        let exterior = rings.next().unwrap_or_else(|| geo::LineString::new(Vec::new()));
        Polygon::new(exterior, rings.collect())
    }
}
