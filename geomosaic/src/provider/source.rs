//! Tile source descriptors.
//!
//! A [`TileSource`] is a validated XYZ URL template. It is either built from
//! a raw template or looked up by name among the known providers:
//!
//! | Name | Template | Max zoom |
//! |------|----------|----------|
//! | `openstreetmap`, `openstreetmap.mapnik` | `https://tile.openstreetmap.org/{z}/{x}/{y}.png` | 19 |
//! | `esri.worldimagery` | `https://server.arcgisonline.com/ArcGIS/rest/services/World_Imagery/MapServer/tile/{z}/{y}/{x}` | 19 |
//! | `mapbox.terrain-rgb` | `https://api.mapbox.com/v4/mapbox.terrain-rgb/{z}/{x}/{y}.pngraw?access_token={access_token}` | 15 |
//! | `nextzen.terrarium` | `https://s3.amazonaws.com/elevation-tiles-prod/terrarium/{z}/{x}/{y}.png` | 15 |

use std::collections::HashMap;
use std::fmt;

use super::types::SourceError;
use crate::coord::{TileIndex, MAX_ZOOM};
use crate::terrain::TerrainEncoding;

/// Name of the provider used when none is requested.
pub const DEFAULT_SOURCE_NAME: &str = "openstreetmap";

/// Placeholders every template must carry.
const COORDINATE_PLACEHOLDERS: [&str; 3] = ["z", "x", "y"];

struct ProviderDescriptor {
    names: &'static [&'static str],
    template: &'static str,
    max_zoom: u8,
    required: &'static [&'static str],
    terrain: Option<TerrainEncoding>,
}

const PROVIDERS: &[ProviderDescriptor] = &[
    ProviderDescriptor {
        names: &["openstreetmap", "openstreetmap.mapnik"],
        template: "https://tile.openstreetmap.org/{z}/{x}/{y}.png",
        max_zoom: 19,
        required: &[],
        terrain: None,
    },
    ProviderDescriptor {
        names: &["esri.worldimagery"],
        template:
            "https://server.arcgisonline.com/ArcGIS/rest/services/World_Imagery/MapServer/tile/{z}/{y}/{x}",
        max_zoom: 19,
        required: &[],
        terrain: None,
    },
    ProviderDescriptor {
        names: &["mapbox.terrain-rgb"],
        template:
            "https://api.mapbox.com/v4/mapbox.terrain-rgb/{z}/{x}/{y}.pngraw?access_token={access_token}",
        max_zoom: 15,
        required: &["access_token"],
        terrain: Some(TerrainEncoding::MapboxTerrainRgb),
    },
    ProviderDescriptor {
        names: &["nextzen.terrarium"],
        template: "https://s3.amazonaws.com/elevation-tiles-prod/terrarium/{z}/{x}/{y}.png",
        max_zoom: 15,
        required: &[],
        terrain: Some(TerrainEncoding::Terrarium),
    },
];

/// A validated XYZ tile URL template.
#[derive(Debug, Clone, PartialEq)]
pub struct TileSource {
    name: String,
    template: String,
    max_zoom: u8,
    terrain: Option<TerrainEncoding>,
}

impl TileSource {
    /// Creates a source from a raw URL template with `{z}`, `{x}` and `{y}`.
    pub fn from_template(template: impl Into<String>) -> Result<Self, SourceError> {
        let template = template.into();
        validate_template(&template)?;
        Ok(Self {
            name: "custom".to_string(),
            template,
            max_zoom: MAX_ZOOM,
            terrain: None,
        })
    }

    /// Looks up a known provider by case-insensitive name.
    ///
    /// Named parameters (for example `access_token`) are substituted into
    /// the template here; anything left unresolved is an error.
    pub fn named(name: &str, params: &HashMap<String, String>) -> Result<Self, SourceError> {
        let wanted = name.trim().to_ascii_lowercase();
        let descriptor = PROVIDERS
            .iter()
            .find(|p| p.names.contains(&wanted.as_str()))
            .ok_or_else(|| SourceError::UnknownProvider(name.to_string()))?;

        for param in descriptor.required {
            if !params.get(*param).is_some_and(|v| !v.is_empty()) {
                return Err(SourceError::MissingParameter {
                    provider: descriptor.names[0].to_string(),
                    param: (*param).to_string(),
                });
            }
        }

        let mut template = descriptor.template.to_string();
        for (key, value) in params {
            if COORDINATE_PLACEHOLDERS.contains(&key.as_str()) {
                continue;
            }
            template = template.replace(&format!("{{{}}}", key), value);
        }
        validate_template(&template)?;

        Ok(Self {
            name: descriptor.names[0].to_string(),
            template,
            max_zoom: descriptor.max_zoom,
            terrain: descriptor.terrain,
        })
    }

    /// Overrides the maximum zoom level.
    pub fn with_max_zoom(mut self, max_zoom: u8) -> Self {
        self.max_zoom = max_zoom.min(MAX_ZOOM);
        self
    }

    /// Overrides the display name.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn template(&self) -> &str {
        &self.template
    }

    pub fn max_zoom(&self) -> u8 {
        self.max_zoom
    }

    /// Elevation encoding, if this is a terrain-RGB source.
    pub fn terrain_encoding(&self) -> Option<TerrainEncoding> {
        self.terrain
    }

    pub fn supports_zoom(&self, zoom: u8) -> bool {
        zoom <= self.max_zoom
    }

    /// Rejects zoom levels the source does not serve.
    pub fn check_zoom(&self, zoom: u8) -> Result<(), SourceError> {
        if self.supports_zoom(zoom) {
            Ok(())
        } else {
            Err(SourceError::UnsupportedZoom {
                source_name: self.name.clone(),
                zoom,
                max_zoom: self.max_zoom,
            })
        }
    }

    /// Builds the URL of one tile.
    pub fn url_for(&self, tile: &TileIndex) -> String {
        self.template
            .replace("{z}", &tile.z.to_string())
            .replace("{x}", &tile.x.to_string())
            .replace("{y}", &tile.y.to_string())
    }
}

impl fmt::Display for TileSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.name, self.template)
    }
}

/// Checks that braces balance, that `{z}`, `{x}` and `{y}` are present, and
/// that no other placeholder remains.
fn validate_template(template: &str) -> Result<(), SourceError> {
    let mut placeholders = Vec::new();
    let mut open: Option<usize> = None;

    for (i, c) in template.char_indices() {
        match c {
            '{' if open.is_none() => open = Some(i),
            '}' => match open.take() {
                Some(start) => placeholders.push(&template[start + 1..i]),
                None => return Err(SourceError::UnbalancedBraces(template.to_string())),
            },
            '{' => return Err(SourceError::UnbalancedBraces(template.to_string())),
            _ => {}
        }
    }
    if open.is_some() {
        return Err(SourceError::UnbalancedBraces(template.to_string()));
    }

    for required in COORDINATE_PLACEHOLDERS {
        if !placeholders.contains(&required) {
            return Err(SourceError::MissingCoordinate {
                template: template.to_string(),
                placeholder: required,
            });
        }
    }

    if let Some(unknown) = placeholders
        .iter()
        .find(|p| !COORDINATE_PLACEHOLDERS.contains(p))
    {
        return Err(SourceError::UnresolvedPlaceholder {
            template: template.to_string(),
            placeholder: (*unknown).to_string(),
        });
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn no_params() -> HashMap<String, String> {
        HashMap::new()
    }

    #[test]
    fn test_named_openstreetmap() {
        let source = TileSource::named("openstreetmap", &no_params()).unwrap();
        assert_eq!(source.name(), "openstreetmap");
        assert_eq!(source.max_zoom(), 19);
        assert_eq!(
            source.url_for(&TileIndex::new(550, 391, 10)),
            "https://tile.openstreetmap.org/10/550/391.png"
        );
    }

    #[test]
    fn test_named_is_case_insensitive() {
        let source = TileSource::named("OpenStreetMap.Mapnik", &no_params()).unwrap();
        assert_eq!(source.name(), "openstreetmap");
    }

    #[test]
    fn test_esri_uses_row_before_column() {
        let source = TileSource::named("esri.worldimagery", &no_params()).unwrap();
        let url = source.url_for(&TileIndex::new(200, 100, 15));
        assert!(url.ends_with("/tile/15/100/200"));
    }

    #[test]
    fn test_unknown_provider() {
        let result = TileSource::named("stamen.toner", &no_params());
        assert_eq!(
            result,
            Err(SourceError::UnknownProvider("stamen.toner".to_string()))
        );
    }

    #[test]
    fn test_mapbox_requires_token() {
        let result = TileSource::named("mapbox.terrain-rgb", &no_params());
        assert!(matches!(
            result,
            Err(SourceError::MissingParameter { ref param, .. }) if param == "access_token"
        ));
    }

    #[test]
    fn test_mapbox_substitutes_token() {
        let mut params = HashMap::new();
        params.insert("access_token".to_string(), "pk.test".to_string());
        let source = TileSource::named("mapbox.terrain-rgb", &params).unwrap();
        assert_eq!(
            source.terrain_encoding(),
            Some(TerrainEncoding::MapboxTerrainRgb)
        );
        let url = source.url_for(&TileIndex::new(1, 2, 3));
        assert!(url.ends_with("/3/1/2.pngraw?access_token=pk.test"));
    }

    #[test]
    fn test_nextzen_terrarium_encoding() {
        let source = TileSource::named("nextzen.terrarium", &no_params()).unwrap();
        assert_eq!(source.terrain_encoding(), Some(TerrainEncoding::Terrarium));
    }

    #[test]
    fn test_template_with_unresolved_placeholder() {
        let result = TileSource::from_template("https://tiles.example/{z}/{x}/{y}.png?key={apikey}");
        assert!(matches!(
            result,
            Err(SourceError::UnresolvedPlaceholder { ref placeholder, .. }) if placeholder == "apikey"
        ));
    }

    #[test]
    fn test_template_missing_coordinate() {
        let result = TileSource::from_template("https://tiles.example/{z}/{x}.png");
        assert!(matches!(
            result,
            Err(SourceError::MissingCoordinate { placeholder: "y", .. })
        ));
    }

    #[test]
    fn test_template_unbalanced_braces() {
        for template in [
            "https://tiles.example/{z}/{x}/{y.png",
            "https://tiles.example/{z}/{x}/y}.png",
            "https://tiles.example/{{z}/{x}/{y}.png",
        ] {
            let result = TileSource::from_template(template);
            assert!(
                matches!(result, Err(SourceError::UnbalancedBraces(_))),
                "{}",
                template
            );
        }
    }

    #[test]
    fn test_check_zoom() {
        let source = TileSource::named("openstreetmap", &no_params()).unwrap();
        assert!(source.check_zoom(19).is_ok());
        assert!(matches!(
            source.check_zoom(20),
            Err(SourceError::UnsupportedZoom { zoom: 20, max_zoom: 19, .. })
        ));
    }

    #[test]
    fn test_custom_template_defaults() {
        let source = TileSource::from_template("http://localhost/{z}/{x}/{y}.png")
            .unwrap()
            .with_max_zoom(12)
            .with_name("local");
        assert_eq!(source.name(), "local");
        assert!(source.supports_zoom(12));
        assert!(!source.supports_zoom(13));
        assert_eq!(source.terrain_encoding(), None);
    }
}
