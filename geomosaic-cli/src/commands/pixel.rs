//! Pixel command - offset of a point inside the raster of a bounding box.

use geomosaic::coord::validate_zoom;
use geomosaic::{BoundingBox, GeoPoint, GeoPrompt, Prompt, PromptLabel};

use crate::error::CliError;

/// Arguments for the pixel command.
pub struct PixelArgs {
    pub ne: GeoPoint,
    pub sw: GeoPoint,
    pub point: GeoPoint,
    pub zoom: u8,
}

/// Pixel offset of `args.point` from the raster's top-left corner.
pub fn offset(args: &PixelArgs) -> Result<[i64; 2], CliError> {
    validate_zoom(args.zoom).map_err(|e| CliError::Args(e.to_string()))?;
    let bbox =
        BoundingBox::from_corners(args.ne, args.sw).map_err(|e| CliError::Args(e.to_string()))?;

    let prompt = GeoPrompt::Point {
        data: args.point,
        label: PromptLabel::Include,
    };
    match prompt.to_pixel(&bbox, args.zoom) {
        Prompt::Point { pixel, .. } => Ok(pixel),
        Prompt::Rectangle { .. } => Err(CliError::Args("expected a point prompt".to_string())),
    }
}

/// Run the pixel command.
pub fn run(args: PixelArgs) -> Result<(), CliError> {
    let [x, y] = offset(&args)?;
    println!("{} {}", x, y);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_north_west_corner_is_origin() {
        let args = PixelArgs {
            ne: GeoPoint::new(39.036, 15.040),
            sw: GeoPoint::new(38.303, 13.634),
            point: GeoPoint::new(39.036, 13.634),
            zoom: 10,
        };
        assert_eq!(offset(&args).unwrap(), [0, 0]);
    }

    #[test]
    fn test_rejects_bad_zoom() {
        let args = PixelArgs {
            ne: GeoPoint::new(39.036, 15.040),
            sw: GeoPoint::new(38.303, 13.634),
            point: GeoPoint::new(38.9, 14.2),
            zoom: 30,
        };
        assert!(matches!(offset(&args), Err(CliError::Args(_))));
    }
}
