//! Terrain-RGB decoding.
//!
//! Elevation providers pack heights in meters into the RGB channels of
//! ordinary PNG tiles. [`ElevationModel::from_raster`] decodes a stitched
//! mosaic of such tiles into a 32-bit digital elevation model, and
//! [`prediction_image`] turns that model into the RGB input a segmentation
//! model sees for terrain sources:
//!
//! | Channel | Content | Scale |
//! |---------|---------|-------|
//! | red | elevation | 0..=64 |
//! | green | weighted blend of elevation, slope and curvature | 0..=128 |
//! | blue | curvature | 0..=192 |
//!
//! Each channel is inverted afterwards unless disabled.

use image::{DynamicImage, Rgb, RgbImage};

/// Decoded values below this height (meters) are treated as missing data.
pub const NO_DATA_THRESHOLD: f32 = -12_000.0;

/// Slope window, in pixels, for a raster [`REFERENCE_WIDTH`] pixels wide.
pub const DEFAULT_SLOPE_CELLSIZE: u32 = 61;

/// Raster width [`DEFAULT_SLOPE_CELLSIZE`] is tuned for.
pub const REFERENCE_WIDTH: u32 = 1024;

/// Weights of elevation, slope and curvature in the green channel.
const CHANNEL_EXAGGERATIONS: [f32; 3] = [2.5, 1.1, 2.0];

/// How elevation is packed into RGB.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TerrainEncoding {
    /// Mapbox Terrain-RGB: `(R·65536 + G·256 + B)·0.1 - 10000`.
    MapboxTerrainRgb,
    /// Nextzen Terrarium: `(R·256 + G + B/256) - 32768`.
    Terrarium,
}

impl TerrainEncoding {
    /// Decodes one pixel into meters.
    pub fn decode(&self, r: u8, g: u8, b: u8) -> f32 {
        let (r, g, b) = (f64::from(r), f64::from(g), f64::from(b));
        let meters = match self {
            Self::MapboxTerrainRgb => (r * 65_536.0 + g * 256.0 + b) * 0.1 - 10_000.0,
            Self::Terrarium => (r * 256.0 + g + b / 256.0) - 32_768.0,
        };
        meters as f32
    }
}

/// Row-major grid of elevations in meters; `NaN` marks missing data.
#[derive(Debug, Clone, PartialEq)]
pub struct ElevationModel {
    width: u32,
    height: u32,
    data: Vec<f32>,
}

impl ElevationModel {
    /// Decodes every pixel of `raster` with `encoding`.
    ///
    /// Any alpha channel is ignored.
    pub fn from_raster(raster: &DynamicImage, encoding: TerrainEncoding) -> Self {
        let rgb = raster.to_rgb8();
        let (width, height) = rgb.dimensions();
        let data = rgb
            .pixels()
            .map(|p| {
                let meters = encoding.decode(p[0], p[1], p[2]);
                if meters < NO_DATA_THRESHOLD {
                    f32::NAN
                } else {
                    meters
                }
            })
            .collect();

        tracing::debug!(width, height, ?encoding, "Decoded elevation model");
        Self {
            width,
            height,
            data,
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn data(&self) -> &[f32] {
        &self.data
    }

    /// Elevation at a pixel, `None` when out of bounds.
    pub fn get(&self, x: u32, y: u32) -> Option<f32> {
        if x >= self.width || y >= self.height {
            return None;
        }
        self.data
            .get(y as usize * self.width as usize + x as usize)
            .copied()
    }

    /// Lowest and highest valid elevation, ignoring `NaN`.
    pub fn range(&self) -> Option<(f32, f32)> {
        self.data
            .iter()
            .filter(|v| !v.is_nan())
            .fold(None, |acc, &v| match acc {
                None => Some((v, v)),
                Some((lo, hi)) => Some((lo.min(v), hi.max(v))),
            })
    }

    /// Slope in degrees and curvature (slope of the slope, normalized to
    /// `0.0..=1.0`), both from central differences with `cellsize` spacing.
    pub fn slope_curvature(&self, cellsize: u32) -> (Vec<f32>, Vec<f32>) {
        let spacing = f64::from(cellsize.max(1));
        let slope = slope_degrees(self.width, self.height, &self.data, spacing);
        let slope_of_slope = slope_degrees(self.width, self.height, &slope, spacing);
        let curvature = normalize(&slope_of_slope, 1.0);
        (slope, curvature)
    }
}

/// Settings for [`prediction_image`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PredictionImageOptions {
    /// Slope window in pixels; scaled from the raster width when `None`.
    pub slope_cellsize: Option<u32>,
    /// Invert every channel (`255 - v`).
    pub invert: bool,
}

impl Default for PredictionImageOptions {
    fn default() -> Self {
        Self {
            slope_cellsize: None,
            invert: true,
        }
    }
}

impl PredictionImageOptions {
    pub fn with_slope_cellsize(mut self, cellsize: u32) -> Self {
        self.slope_cellsize = Some(cellsize.max(1));
        self
    }

    pub fn with_invert(mut self, invert: bool) -> Self {
        self.invert = invert;
        self
    }

    /// Cell size used for a raster `width` pixels wide.
    pub fn cellsize_for(&self, width: u32) -> u32 {
        self.slope_cellsize
            .unwrap_or_else(|| slope_cellsize_for_width(width))
    }
}

/// [`DEFAULT_SLOPE_CELLSIZE`] scaled to `width`, at least 1.
pub fn slope_cellsize_for_width(width: u32) -> u32 {
    let scaled = u64::from(width) * u64::from(DEFAULT_SLOPE_CELLSIZE) / u64::from(REFERENCE_WIDTH);
    u32::try_from(scaled).unwrap_or(u32::MAX).max(1)
}

/// Builds the elevation / blend / curvature RGB image for a terrain raster.
///
/// A channel without spread (flat terrain, or all no-data) comes out as
/// zeros before inversion. No-data pixels are zero in every channel they
/// touch.
pub fn prediction_image(dem: &ElevationModel, options: &PredictionImageOptions) -> RgbImage {
    let cellsize = options.cellsize_for(dem.width);
    let (slope, curvature) = dem.slope_curvature(cellsize);

    let weighted = [&dem.data, &slope, &curvature];
    let mut blend = vec![0.0f32; dem.data.len()];
    for (channel, exaggeration) in weighted.iter().zip(CHANNEL_EXAGGERATIONS) {
        for (acc, v) in blend.iter_mut().zip(normalize(channel, 1.0)) {
            *acc += v * exaggeration;
        }
    }
    let count = weighted.len() as f32;
    blend.iter_mut().for_each(|v| *v /= count);

    let red = normalize(&dem.data, 64.0);
    let green = normalize(&blend, 128.0);
    let blue = normalize(&curvature, 192.0);

    // NaN casts to 0
    let level = |v: f32| -> u8 {
        let v = v as u8;
        if options.invert {
            !v
        } else {
            v
        }
    };

    tracing::debug!(
        width = dem.width,
        height = dem.height,
        cellsize,
        invert = options.invert,
        "Built terrain prediction image"
    );

    RgbImage::from_fn(dem.width, dem.height, |x, y| {
        let i = y as usize * dem.width as usize + x as usize;
        Rgb([level(red[i]), level(green[i]), level(blue[i])])
    })
}

/// Gradient magnitude as an angle in degrees.
///
/// Interior samples use central differences, edges one-sided ones; an axis
/// shorter than two samples has no gradient.
fn slope_degrees(width: u32, height: u32, values: &[f32], spacing: f64) -> Vec<f32> {
    let (w, h) = (width as usize, height as usize);
    let at = |x: usize, y: usize| f64::from(values[y * w + x]);

    let derivative = |len: usize, i: usize, sample: &dyn Fn(usize) -> f64| -> f64 {
        if len < 2 {
            0.0
        } else if i == 0 {
            (sample(1) - sample(0)) / spacing
        } else if i == len - 1 {
            (sample(len - 1) - sample(len - 2)) / spacing
        } else {
            (sample(i + 1) - sample(i - 1)) / (2.0 * spacing)
        }
    };

    let mut out = Vec::with_capacity(values.len());
    for y in 0..h {
        for x in 0..w {
            let dx = derivative(w, x, &|i| at(i, y));
            let dy = derivative(h, y, &|i| at(x, i));
            out.push(dx.hypot(dy).atan().to_degrees() as f32);
        }
    }
    out
}

/// Rescales finite values onto `0.0..=high`; NaN stays NaN.
fn normalize(values: &[f32], high: f32) -> Vec<f32> {
    let bounds = values
        .iter()
        .filter(|v| v.is_finite())
        .fold(None, |acc: Option<(f32, f32)>, &v| match acc {
            None => Some((v, v)),
            Some((lo, hi)) => Some((lo.min(v), hi.max(v))),
        });

    match bounds {
        Some((lo, hi)) if hi > lo => values.iter().map(|&v| high * (v - lo) / (hi - lo)).collect(),
        _ => values
            .iter()
            .map(|&v| if v.is_nan() { f32::NAN } else { 0.0 })
            .collect(),
    }
}
