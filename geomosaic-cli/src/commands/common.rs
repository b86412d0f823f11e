//! Argument parsers and helpers shared across CLI commands.

use std::path::Path;

use geomosaic::{AffineTransform, GeoPoint, MosaicConfig};

use crate::error::CliError;

/// Parses `LAT,LNG` in degrees.
pub fn parse_point(s: &str) -> Result<GeoPoint, String> {
    let (lat, lng) = s
        .split_once(',')
        .ok_or_else(|| format!("expected LAT,LNG, got '{}'", s))?;
    let lat: f64 = lat
        .trim()
        .parse()
        .map_err(|_| format!("invalid latitude '{}'", lat.trim()))?;
    let lng: f64 = lng
        .trim()
        .parse()
        .map_err(|_| format!("invalid longitude '{}'", lng.trim()))?;

    let point = GeoPoint::new(lat, lng);
    point.validate().map_err(|e| e.to_string())?;
    Ok(point)
}

/// Parses a `key=value` provider parameter.
pub fn parse_param(s: &str) -> Result<(String, String), String> {
    let (key, value) = s
        .split_once('=')
        .ok_or_else(|| format!("expected KEY=VALUE, got '{}'", s))?;
    let key = key.trim();
    if key.is_empty() {
        return Err(format!("empty parameter name in '{}'", s));
    }
    Ok((key.to_string(), value.trim().to_string()))
}

/// Parses six comma-separated GDAL-ordered coefficients.
pub fn parse_transform(s: &str) -> Result<AffineTransform, CliError> {
    let coefficients = s
        .split(',')
        .map(|c| {
            c.trim()
                .parse::<f64>()
                .map_err(|_| CliError::Args(format!("invalid transform coefficient '{}'", c.trim())))
        })
        .collect::<Result<Vec<_>, _>>()?;
    Ok(AffineTransform::from_gdal(&coefficients)?)
}

/// Loads the config file: explicit path, else the default location.
pub fn load_config(path: Option<&Path>) -> Result<MosaicConfig, CliError> {
    match path {
        Some(path) => Ok(MosaicConfig::load(path)?),
        None => Ok(MosaicConfig::load_default()?),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_point() {
        let point = parse_point("38.9, 14.2").unwrap();
        assert_eq!(point, GeoPoint::new(38.9, 14.2));
    }

    #[test]
    fn test_parse_point_rejects_garbage() {
        assert!(parse_point("38.9").is_err());
        assert!(parse_point("north,14.2").is_err());
        assert!(parse_point("95.0,14.2").is_err());
    }

    #[test]
    fn test_parse_param() {
        assert_eq!(
            parse_param("access_token=abc=def").unwrap(),
            ("access_token".to_string(), "abc=def".to_string())
        );
        assert!(parse_param("=value").is_err());
        assert!(parse_param("novalue").is_err());
    }

    #[test]
    fn test_parse_transform() {
        let t = parse_transform("100.0, 1.0, 0.0, 500.0, 0.0, -1.0").unwrap();
        assert_eq!(t.to_gdal(), [100.0, 1.0, 0.0, 500.0, 0.0, -1.0]);

        assert!(matches!(parse_transform("1,2,3"), Err(CliError::Args(_))));
        assert!(matches!(parse_transform("1,x,3,4,5,6"), Err(CliError::Args(_))));
    }

    #[test]
    fn test_load_config_from_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.ini");
        std::fs::write(&path, "[fetch]\nmax_concurrent = 7\n").unwrap();

        let config = load_config(Some(&path)).unwrap();
        assert_eq!(config.fetch.max_concurrent, 7);
    }
}
