//! Vectorize command - turn a label mask image into GeoJSON.

use std::path::PathBuf;

use geomosaic::vectorize::vectorize_with;
use geomosaic::{LabelMask, VectorizeOptions};

use super::common::parse_transform;
use crate::error::CliError;

/// Arguments for the vectorize command.
pub struct VectorizeArgs {
    pub mask: PathBuf,
    pub transform: String,
    pub include_background: bool,
    pub output: Option<PathBuf>,
}

/// Run the vectorize command.
pub fn run(args: VectorizeArgs) -> Result<(), CliError> {
    let transform = parse_transform(&args.transform)?;
    let image = image::open(&args.mask).map_err(|e| CliError::io(&args.mask, e))?;
    let mask = LabelMask::from_image(&image);

    let result = vectorize_with(
        &mask,
        &transform,
        VectorizeOptions {
            include_background: args.include_background,
        },
    );
    let json = serde_json::to_string(&result.geojson)
        .map_err(|e| CliError::io(&args.mask, e))?;

    match &args.output {
        Some(path) => {
            std::fs::write(path, json).map_err(|e| CliError::io(path, e))?;
            eprintln!("Wrote {} shapes to {}", result.n_shapes, path.display());
        }
        None => println!("{}", json),
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{GrayImage, Luma};

    #[test]
    fn test_vectorize_mask_file() {
        let dir = tempfile::tempdir().unwrap();
        let mask_path = dir.path().join("mask.png");
        let out_path = dir.path().join("shapes.geojson");

        let mut mask = GrayImage::new(8, 8);
        for y in 2..5 {
            for x in 2..6 {
                mask.put_pixel(x, y, Luma([1]));
            }
        }
        mask.save(&mask_path).unwrap();

        run(VectorizeArgs {
            mask: mask_path,
            transform: "1000.0,10.0,0.0,5000.0,0.0,-10.0".to_string(),
            include_background: false,
            output: Some(out_path.clone()),
        })
        .unwrap();

        let geojson: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(out_path).unwrap()).unwrap();
        assert_eq!(geojson["type"], "FeatureCollection");
        assert_eq!(geojson["features"].as_array().unwrap().len(), 1);
        assert_eq!(geojson["features"][0]["properties"]["raster_val"], 1.0);
    }

    #[test]
    fn test_vectorize_missing_mask() {
        let err = run(VectorizeArgs {
            mask: PathBuf::from("/nonexistent/mask.png"),
            transform: "0,1,0,0,0,-1".to_string(),
            include_background: false,
            output: None,
        })
        .unwrap_err();
        assert!(matches!(err, CliError::Io { .. }));
    }
}
