//! Request-level facade.
//!
//! [`MosaicService`] turns a bounding box into a georeferenced raster and a
//! label mask back into GeoJSON. [`SegmentationService`] chains both around
//! an inference engine to answer a [`PredictionRequest`]:
//!
//! ```text
//! bbox + zoom ──► grid ──► fetch ──► mosaic ──► (raster, transform)
//!                                                   │
//!                                      terrain sources: DEM ──► slope/curvature RGB
//!                                                   │
//!                   geo prompts ──► pixel prompts ──┤
//!                                                   ▼
//!                                          InferenceEngine::infer
//!                                                   │
//!                                   mask + transform ──► vectorize ──► GeoJSON
//! ```

use std::collections::HashMap;
use std::sync::Arc;

use image::DynamicImage;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info};

use crate::affine::{AffineError, AffineTransform};
use crate::config::{ConfigError, MosaicConfig};
use crate::coord::{BoundingBox, CoordError, TILE_SIZE};
use crate::fetch::{Cancelled, FetchConfig, FetchError, FetchProgress, TileFetcher};
use crate::grid::{GridError, TileGrid};
use crate::inference::{InferenceError, ModelRegistry};
use crate::mosaic::{compose, MosaicError};
use crate::prompt::{to_pixel_prompts, GeoPrompt};
use crate::provider::{
    AsyncHttpClient, ProviderError, ReqwestClient, SourceError, TileSource, DEFAULT_SOURCE_NAME,
};
use crate::terrain::{prediction_image, ElevationModel, PredictionImageOptions, TerrainEncoding};
use crate::vectorize::{self, LabelMask, MaskError, VectorizeOptions, VectorizedMask};

/// Errors surfaced by the service layer.
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error(transparent)]
    Coord(#[from] CoordError),

    #[error(transparent)]
    Grid(#[from] GridError),

    #[error(transparent)]
    Source(#[from] SourceError),

    #[error(transparent)]
    Provider(#[from] ProviderError),

    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error(transparent)]
    Mosaic(#[from] MosaicError),

    #[error(transparent)]
    Affine(#[from] AffineError),

    #[error(transparent)]
    Mask(#[from] MaskError),

    #[error(transparent)]
    Inference(#[from] InferenceError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("failed to serialize GeoJSON: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("invalid request: {0}")]
    InvalidRequest(String),
}

impl ServiceError {
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Fetch(e) if e.is_cancelled())
    }
}

/// Options for [`MosaicService::fetch_mosaic`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MosaicOptions {
    /// Fetch and stitch tiles. When off, only the transform is computed.
    pub assemble_image: bool,
}

impl Default for MosaicOptions {
    fn default() -> Self {
        Self {
            assemble_image: true,
        }
    }
}

/// A raster with its pixel-to-world mapping.
#[derive(Debug, Clone)]
pub struct GeoRaster {
    pub image: Option<DynamicImage>,
    pub width: u32,
    pub height: u32,
    pub transform: AffineTransform,
    /// Elevation encoding of the source, for terrain providers.
    pub terrain: Option<TerrainEncoding>,
}

impl GeoRaster {
    /// Decodes elevation when the raster came from a terrain source.
    pub fn elevation(&self) -> Option<ElevationModel> {
        let encoding = self.terrain?;
        let image = self.image.as_ref()?;
        Some(ElevationModel::from_raster(image, encoding))
    }
}

/// Fetches mosaics and vectorizes masks.
pub struct MosaicService<C: AsyncHttpClient> {
    fetcher: TileFetcher<C>,
}

impl MosaicService<ReqwestClient> {
    /// Builds a service over a real HTTP client.
    pub fn from_config(config: &MosaicConfig) -> Result<Self, ServiceError> {
        let client = ReqwestClient::new()?;
        Ok(Self::new(Arc::new(client), config.to_fetch_config()))
    }
}

impl<C: AsyncHttpClient> MosaicService<C> {
    pub fn new(client: Arc<C>, config: FetchConfig) -> Self {
        Self {
            fetcher: TileFetcher::new(client, config),
        }
    }

    pub fn fetcher(&self) -> &TileFetcher<C> {
        &self.fetcher
    }

    /// Fetches the tiles covering `bbox` at `zoom` and crops them to it.
    ///
    /// `progress` follows [`TileFetcher::fetch_all`]; returning
    /// [`Cancelled`] aborts with a cancelled [`ServiceError`].
    pub async fn fetch_mosaic<F>(
        &self,
        bbox: &BoundingBox,
        zoom: u8,
        source: &TileSource,
        options: MosaicOptions,
        progress: F,
    ) -> Result<GeoRaster, ServiceError>
    where
        F: FnMut(FetchProgress) -> Result<(), Cancelled> + Send,
    {
        let grid = TileGrid::plan_with_limit(bbox, zoom, self.fetcher.config().max_tiles)?;
        source.check_zoom(zoom)?;

        if !options.assemble_image {
            let window = grid.crop_window(TILE_SIZE, TILE_SIZE)?;
            let transform = AffineTransform::from_bbox(bbox, window.width, window.height)?;
            debug!(window = %window, "Skipping image assembly");
            return Ok(GeoRaster {
                image: None,
                width: window.width,
                height: window.height,
                transform,
                terrain: source.terrain_encoding(),
            });
        }

        let tiles = self.fetcher.fetch_all(source, grid.tiles(), progress).await?;
        let image = compose(&grid, tiles)?;
        let (width, height) = (image.width(), image.height());
        let transform = AffineTransform::from_bbox(bbox, width, height)?;

        info!(
            zoom,
            source = source.name(),
            width,
            height,
            transform = %transform,
            "Mosaic ready"
        );

        Ok(GeoRaster {
            image: Some(image),
            width,
            height,
            transform,
            terrain: source.terrain_encoding(),
        })
    }

    /// Vectorizes the foreground of `mask`.
    pub fn vectorize(&self, mask: &LabelMask, transform: &AffineTransform) -> VectorizedMask {
        vectorize::vectorize(mask, transform)
    }

    pub fn vectorize_with(
        &self,
        mask: &LabelMask,
        transform: &AffineTransform,
        options: VectorizeOptions,
    ) -> VectorizedMask {
        vectorize::vectorize_with(mask, transform, options)
    }
}

fn default_source_type() -> String {
    DEFAULT_SOURCE_NAME.to_string()
}

/// A segmentation request as sent by clients.
///
/// ```json
/// {
///   "bbox": {"ne": {"lat": 39.036, "lng": 15.040}, "sw": {"lat": 38.303, "lng": 13.634}},
///   "prompt": [{"type": "point", "data": {"lat": 38.9, "lng": 14.2}, "label": 1}],
///   "zoom": 10,
///   "source_type": "OpenStreetMap.Mapnik"
/// }
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictionRequest {
    #[serde(default)]
    pub id: String,
    pub bbox: BoundingBox,
    pub prompt: Vec<GeoPrompt>,
    /// Integer or fractional; the fractional part is dropped.
    pub zoom: f64,
    /// Provider name or a raw `{z}/{x}/{y}` URL template.
    #[serde(default = "default_source_type")]
    pub source_type: String,
    #[serde(default)]
    pub debug: bool,
}

impl PredictionRequest {
    /// Integer zoom level of the request.
    pub fn zoom_level(&self) -> Result<u8, ServiceError> {
        if !self.zoom.is_finite() || self.zoom < 0.0 || self.zoom >= 256.0 {
            return Err(ServiceError::InvalidRequest(format!(
                "zoom {} is not a valid zoom level",
                self.zoom
            )));
        }
        let zoom = self.zoom.trunc() as u8;
        crate::coord::validate_zoom(zoom)?;
        Ok(zoom)
    }

    /// Resolves `source_type` to a tile source.
    pub fn resolve_source(&self, params: &HashMap<String, String>) -> Result<TileSource, SourceError> {
        if self.source_type.contains('{') {
            TileSource::from_template(self.source_type.as_str())
        } else {
            TileSource::named(&self.source_type, params)
        }
    }
}

/// Result of a segmentation request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Prediction {
    pub n_predictions: usize,
    /// Serialized GeoJSON `FeatureCollection`.
    pub geojson: String,
    #[serde(rename = "n_shapes_geojson")]
    pub n_shapes: usize,
}

/// Runs segmentation requests end to end.
pub struct SegmentationService<C: AsyncHttpClient> {
    mosaic: MosaicService<C>,
    models: Arc<ModelRegistry>,
    source_params: HashMap<String, String>,
    terrain_image: PredictionImageOptions,
}

impl<C: AsyncHttpClient> SegmentationService<C> {
    pub fn new(mosaic: MosaicService<C>, models: Arc<ModelRegistry>) -> Self {
        Self {
            mosaic,
            models,
            source_params: HashMap::new(),
            terrain_image: PredictionImageOptions::default(),
        }
    }

    /// How terrain rasters are turned into model input.
    pub fn with_terrain_image(mut self, options: PredictionImageOptions) -> Self {
        self.terrain_image = options;
        self
    }

    /// Parameters substituted into named provider templates.
    pub fn with_source_params(mut self, params: HashMap<String, String>) -> Self {
        self.source_params = params;
        self
    }

    pub fn mosaic(&self) -> &MosaicService<C> {
        &self.mosaic
    }

    pub fn models(&self) -> &Arc<ModelRegistry> {
        &self.models
    }

    pub async fn predict(
        &self,
        request: &PredictionRequest,
        model_name: &str,
    ) -> Result<Prediction, ServiceError> {
        self.predict_with_progress(request, model_name, |_| Ok(())).await
    }

    /// Fetches the mosaic, runs the model and vectorizes its mask.
    ///
    /// Request validation and model lookup happen before any tile is
    /// requested.
    pub async fn predict_with_progress<F>(
        &self,
        request: &PredictionRequest,
        model_name: &str,
        progress: F,
    ) -> Result<Prediction, ServiceError>
    where
        F: FnMut(FetchProgress) -> Result<(), Cancelled> + Send,
    {
        let zoom = request.zoom_level()?;
        if request.prompt.is_empty() {
            return Err(InferenceError::NoPrompts.into());
        }
        let engine = self.models.get(model_name)?;
        let source = request.resolve_source(&self.source_params)?;

        info!(
            id = %request.id,
            model = model_name,
            zoom,
            source = source.name(),
            prompts = request.prompt.len(),
            "Prediction requested"
        );

        let raster = self
            .mosaic
            .fetch_mosaic(&request.bbox, zoom, &source, MosaicOptions::default(), progress)
            .await?;
        let Some(image) = raster.image else {
            return Err(ServiceError::InvalidRequest(
                "mosaic was not assembled".to_string(),
            ));
        };

        let prompts = to_pixel_prompts(&request.prompt, &request.bbox, zoom);
        let terrain = raster.terrain;
        let terrain_image = self.terrain_image;

        // Terrain decoding and inference are CPU-bound
        let inference = tokio::task::spawn_blocking(move || {
            let input = match terrain {
                Some(encoding) => {
                    let dem = ElevationModel::from_raster(&image, encoding);
                    DynamicImage::ImageRgb8(prediction_image(&dem, &terrain_image))
                }
                None => image,
            };
            let inference = engine.infer(&input, &prompts)?;
            inference.check_size(&input)?;
            Ok::<_, InferenceError>(inference)
        })
        .await
        .map_err(|e| InferenceError::Engine(e.to_string()))??;

        let vectorized = self.mosaic.vectorize(&inference.mask, &raster.transform);
        let geojson = serde_json::to_string(&vectorized.geojson)?;

        info!(
            id = %request.id,
            n_predictions = inference.n_predictions,
            n_shapes = vectorized.n_shapes,
            "Prediction complete"
        );

        Ok(Prediction {
            n_predictions: inference.n_predictions,
            geojson,
            n_shapes: vectorized.n_shapes,
        })
    }
}
