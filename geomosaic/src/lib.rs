//! geomosaic - Georeferenced tile mosaics for geospatial segmentation
//!
//! This library fetches XYZ map tiles covering a bounding box, stitches
//! them into one raster cropped to the box, ties the raster to Web Mercator
//! through an affine transform, and turns segmentation masks over that
//! raster back into geographic GeoJSON polygons.

pub mod affine;
pub mod config;
pub mod coord;
pub mod fetch;
pub mod grid;
pub mod inference;
pub mod logging;
pub mod mosaic;
pub mod prompt;
pub mod provider;
pub mod service;
pub mod terrain;
pub mod vectorize;

pub use affine::{AffineError, AffineTransform};
pub use config::{ConfigError, MosaicConfig};
pub use coord::{BoundingBox, CoordError, GeoPoint, PixelCoord, TileIndex};
pub use fetch::{CancellationFlag, Cancelled, FetchConfig, FetchError, FetchProgress};
pub use grid::{GridError, TileGrid, DEFAULT_MAX_TILES};
pub use inference::{Inference, InferenceEngine, InferenceError, ModelRegistry};
pub use logging::{init_logging, LoggingConfig, LoggingError, LoggingGuard};
pub use mosaic::MosaicError;
pub use prompt::{GeoPrompt, Prompt, PromptLabel};
pub use provider::{AsyncHttpClient, HttpResponse, ProviderError, ReqwestClient, SourceError, TileSource};
pub use terrain::{prediction_image, ElevationModel, PredictionImageOptions, TerrainEncoding};
pub use service::{
    GeoRaster, MosaicOptions, MosaicService, Prediction, PredictionRequest, SegmentationService,
    ServiceError,
};
pub use vectorize::{LabelMask, MaskError, VectorizeOptions, VectorizedMask};
