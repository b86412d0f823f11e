//! geomosaic CLI - Command-line interface
//!
//! Fetches georeferenced tile mosaics, vectorizes segmentation masks and
//! converts prompt coordinates to pixel offsets.

mod commands;
mod error;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use geomosaic::{init_logging, GeoPoint};

use commands::common::{load_config, parse_param, parse_point};
use error::CliError;

#[derive(Parser)]
#[command(name = "geomosaic")]
#[command(version, about = "Georeferenced tile mosaics and mask vectorization", long_about = None)]
struct Cli {
    /// Config file (default: <config dir>/geomosaic/config.ini)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Log filter, e.g. "debug" or "geomosaic=trace" (RUST_LOG wins)
    #[arg(long, global = true)]
    log_level: Option<String>,

    /// Also write rolling log files to this directory
    #[arg(long, global = true)]
    log_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Fetch the tiles covering a bounding box and stitch them into one image
    Fetch {
        /// North-east corner as LAT,LNG
        #[arg(long, value_parser = parse_point, allow_hyphen_values = true)]
        ne: GeoPoint,

        /// South-west corner as LAT,LNG
        #[arg(long, value_parser = parse_point, allow_hyphen_values = true)]
        sw: GeoPoint,

        /// Zoom level (0-22)
        #[arg(long)]
        zoom: u8,

        /// Named tile provider (openstreetmap, esri.worldimagery, mapbox.terrain-rgb, nextzen.terrarium)
        #[arg(long, conflicts_with = "url")]
        source: Option<String>,

        /// Custom tile URL template with {z}, {x} and {y}
        #[arg(long)]
        url: Option<String>,

        /// Provider parameter as KEY=VALUE (e.g. access_token=...)
        #[arg(long = "param", value_parser = parse_param)]
        params: Vec<(String, String)>,

        /// Output image (PNG, JPEG, ... by extension)
        #[arg(long, short, required_unless_present = "no_image")]
        output: Option<PathBuf>,

        /// Write the affine transform as JSON to this file
        #[arg(long)]
        transform_out: Option<PathBuf>,

        /// Maximum concurrent tile requests
        #[arg(long)]
        parallel: Option<usize>,

        /// Per-request timeout in seconds
        #[arg(long)]
        timeout: Option<u64>,

        /// Only compute the transform; download nothing
        #[arg(long)]
        no_image: bool,
    },

    /// Convert a label mask image into GeoJSON polygons
    Vectorize {
        /// Mask image; each non-zero gray value is a class
        #[arg(long)]
        mask: PathBuf,

        /// Six comma-separated GDAL affine coefficients
        #[arg(long, allow_hyphen_values = true)]
        transform: String,

        /// Also emit polygons for value-0 regions
        #[arg(long)]
        include_background: bool,

        /// Write GeoJSON here instead of stdout
        #[arg(long, short)]
        output: Option<PathBuf>,
    },

    /// Print the pixel offset of a point inside a bounding box's raster
    Pixel {
        /// North-east corner as LAT,LNG
        #[arg(long, value_parser = parse_point, allow_hyphen_values = true)]
        ne: GeoPoint,

        /// South-west corner as LAT,LNG
        #[arg(long, value_parser = parse_point, allow_hyphen_values = true)]
        sw: GeoPoint,

        /// Point as LAT,LNG
        #[arg(long, value_parser = parse_point, allow_hyphen_values = true)]
        point: GeoPoint,

        /// Zoom level (0-22)
        #[arg(long)]
        zoom: u8,
    },
}

fn main() {
    let cli = Cli::parse();

    if let Err(e) = run(cli) {
        eprintln!("Error: {}", e);
        std::process::exit(e.exit_code());
    }
}

fn run(cli: Cli) -> Result<(), CliError> {
    let mut config = load_config(cli.config.as_deref())?;
    if let Some(level) = cli.log_level {
        config = config.with_log_level(level);
    }
    if let Some(dir) = cli.log_dir {
        config.logging.directory = Some(dir);
    }
    let _logging = init_logging(&config.logging)?;
    tracing::debug!(fetch = ?config.fetch, source = %config.source.name, "Resolved configuration");

    match cli.command {
        Commands::Fetch {
            ne,
            sw,
            zoom,
            source,
            url,
            params,
            output,
            transform_out,
            parallel,
            timeout,
            no_image,
        } => commands::fetch::run(
            commands::fetch::FetchArgs {
                ne,
                sw,
                zoom,
                source,
                url,
                params,
                output,
                transform_out,
                parallel,
                timeout,
                no_image,
            },
            config,
        ),
        Commands::Vectorize {
            mask,
            transform,
            include_background,
            output,
        } => commands::vectorize::run(commands::vectorize::VectorizeArgs {
            mask,
            transform,
            include_background,
            output,
        }),
        Commands::Pixel { ne, sw, point, zoom } => {
            commands::pixel::run(commands::pixel::PixelArgs { ne, sw, point, zoom })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_fetch() {
        let cli = Cli::try_parse_from([
            "geomosaic",
            "fetch",
            "--ne",
            "39.036,15.040",
            "--sw",
            "38.303,13.634",
            "--zoom",
            "10",
            "--param",
            "access_token=abc",
            "-o",
            "out.png",
        ])
        .unwrap();

        match cli.command {
            Commands::Fetch {
                ne, zoom, params, ..
            } => {
                assert_eq!(ne, GeoPoint::new(39.036, 15.040));
                assert_eq!(zoom, 10);
                assert_eq!(params, vec![("access_token".to_string(), "abc".to_string())]);
            }
            _ => panic!("Expected fetch"),
        }
    }

    #[test]
    fn test_fetch_requires_output_unless_no_image() {
        let base = ["geomosaic", "fetch", "--ne", "1,1", "--sw", "0,0", "--zoom", "5"];
        assert!(Cli::try_parse_from(base).is_err());

        let mut with_flag = base.to_vec();
        with_flag.push("--no-image");
        assert!(Cli::try_parse_from(with_flag).is_ok());
    }

    #[test]
    fn test_source_conflicts_with_url() {
        let result = Cli::try_parse_from([
            "geomosaic",
            "fetch",
            "--ne",
            "1,1",
            "--sw",
            "0,0",
            "--zoom",
            "5",
            "--source",
            "openstreetmap",
            "--url",
            "https://t/{z}/{x}/{y}.png",
            "--no-image",
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn test_negative_coordinates() {
        let cli = Cli::try_parse_from([
            "geomosaic",
            "pixel",
            "--ne",
            "-10.5,-40.0",
            "--sw",
            "-11.0,-41.0",
            "--point",
            "-10.7,-40.5",
            "--zoom",
            "8",
        ])
        .unwrap();
        assert!(matches!(cli.command, Commands::Pixel { .. }));
    }
}
