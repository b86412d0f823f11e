//! Fetch command - download a georeferenced mosaic for a bounding box.

use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;

use geomosaic::{
    BoundingBox, CancellationFlag, GeoPoint, MosaicConfig, MosaicOptions, MosaicService,
    ServiceError, TileGrid,
};
use indicatif::{ProgressBar, ProgressStyle};

use crate::error::CliError;

/// Arguments for the fetch command.
pub struct FetchArgs {
    pub ne: GeoPoint,
    pub sw: GeoPoint,
    pub zoom: u8,
    pub source: Option<String>,
    pub url: Option<String>,
    pub params: Vec<(String, String)>,
    pub output: Option<PathBuf>,
    pub transform_out: Option<PathBuf>,
    pub parallel: Option<usize>,
    pub timeout: Option<u64>,
    pub no_image: bool,
}

/// Run the fetch command.
pub fn run(args: FetchArgs, config: MosaicConfig) -> Result<(), CliError> {
    let bbox = BoundingBox::from_corners(args.ne, args.sw)
        .map_err(|e| CliError::Args(e.to_string()))?;

    // CLI takes precedence over the config file
    let mut config = config;
    if let Some(parallel) = args.parallel {
        config = config.with_max_concurrent(parallel);
    }
    if let Some(timeout) = args.timeout {
        config = config.with_attempt_timeout(Duration::from_secs(timeout));
    }
    match (args.source, args.url) {
        (Some(_), Some(_)) => {
            return Err(CliError::Args(
                "--source and --url are mutually exclusive".to_string(),
            ))
        }
        (Some(name), None) => config = config.with_source_name(name),
        (None, Some(url)) => config = config.with_source_url(url),
        (None, None) => {}
    }

    let params: HashMap<String, String> = args.params.into_iter().collect();
    let source = config.to_tile_source(&params)?;
    let grid = TileGrid::plan_with_limit(&bbox, args.zoom, config.fetch.max_tiles)
        .map_err(ServiceError::from)?;
    let service = MosaicService::from_config(&config)?;

    println!("Source: {}", source);
    println!(
        "Grid:   {} tiles ({}x{}) at zoom {}",
        grid.tile_count(),
        grid.columns(),
        grid.rows(),
        args.zoom
    );

    // Ctrl+C flips the flag; the fetcher stops at its next progress tick
    let cancel = CancellationFlag::new();
    let handler_flag = cancel.clone();
    ctrlc::set_handler(move || handler_flag.cancel())
        .map_err(|e| CliError::Config(format!("Failed to set signal handler: {}", e)))?;

    let bar = ProgressBar::new(grid.tile_count() as u64);
    bar.set_style(
        ProgressStyle::with_template("{spinner} [{elapsed_precise}] {bar:40} {pos}/{len} tiles")
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("=> "),
    );
    let progress = cancel.progress_callback({
        let bar = bar.clone();
        move |p| bar.set_position(p.completed as u64)
    });

    let options = MosaicOptions {
        assemble_image: !args.no_image,
    };
    let runtime = tokio::runtime::Runtime::new()
        .map_err(|e| CliError::Config(format!("Failed to start runtime: {}", e)))?;
    let result = runtime.block_on(service.fetch_mosaic(
        &bbox,
        args.zoom,
        &source,
        options,
        progress,
    ));
    bar.finish_and_clear();
    let raster = result?;

    if let (Some(image), Some(output)) = (&raster.image, &args.output) {
        image.save(output).map_err(|e| CliError::io(output, e))?;
        println!(
            "Wrote {}x{} mosaic to {}",
            raster.width,
            raster.height,
            output.display()
        );
    }

    if let Some(elevation) = raster.elevation() {
        if let Some((min, max)) = elevation.range() {
            println!("Elevation: {:.1} m to {:.1} m", min, max);
        }
    }

    match &args.transform_out {
        Some(path) => {
            let json = serde_json::to_string_pretty(&raster.transform)
                .map_err(|e| CliError::io(path, e))?;
            std::fs::write(path, json).map_err(|e| CliError::io(path, e))?;
            println!("Wrote transform to {}", path.display());
        }
        None => println!("Transform: {}", raster.transform),
    }

    Ok(())
}
