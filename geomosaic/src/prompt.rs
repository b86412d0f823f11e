//! Segmentation prompts.
//!
//! Clients send prompts in geographic coordinates ([`GeoPrompt`]); the
//! inference engine needs them as pixel offsets into the fetched raster
//! ([`Prompt`]).
//!
//! ```json
//! {"type": "point", "data": {"lat": 38.9, "lng": 14.2}, "label": 1}
//! {"type": "rectangle", "data": {"ne": {"lat": 38.9, "lng": 14.3}, "sw": {"lat": 38.8, "lng": 14.2}}}
//! ```

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::coord::{prompt_point_to_pixel_offset, BoundingBox, GeoPoint};

/// Error for a point label other than 0 or 1.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("invalid prompt label {0}: expected 0 (exclude) or 1 (include)")]
pub struct InvalidPromptLabel(pub u8);

/// Whether a point marks the object or the background.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum PromptLabel {
    Exclude,
    Include,
}

impl TryFrom<u8> for PromptLabel {
    type Error = InvalidPromptLabel;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Self::Exclude),
            1 => Ok(Self::Include),
            other => Err(InvalidPromptLabel(other)),
        }
    }
}

impl From<PromptLabel> for u8 {
    fn from(label: PromptLabel) -> Self {
        match label {
            PromptLabel::Exclude => 0,
            PromptLabel::Include => 1,
        }
    }
}

/// A prompt in geographic coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum GeoPrompt {
    Point { data: GeoPoint, label: PromptLabel },
    Rectangle { data: BoundingBox },
}

/// A prompt in pixel offsets from the raster's top-left corner.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Prompt {
    Point {
        #[serde(rename = "data")]
        pixel: [i64; 2],
        label: PromptLabel,
    },
    /// Corners as `[west, north, east, south]` pixel offsets.
    Rectangle {
        #[serde(rename = "data")]
        corners: [i64; 4],
    },
}

impl GeoPrompt {
    /// Translates the prompt into pixel offsets for a raster covering `bbox`
    /// fetched at `zoom`.
    pub fn to_pixel(&self, bbox: &BoundingBox, zoom: u8) -> Prompt {
        let offset = |point: GeoPoint| prompt_point_to_pixel_offset(bbox.ne(), bbox.sw(), point, zoom);

        match self {
            Self::Point { data, label } => {
                let pixel = offset(*data);
                Prompt::Point {
                    pixel: [pixel.x, pixel.y],
                    label: *label,
                }
            }
            Self::Rectangle { data } => {
                let ne = offset(data.ne());
                let sw = offset(data.sw());
                Prompt::Rectangle {
                    corners: [sw.x, ne.y, ne.x, sw.y],
                }
            }
        }
    }
}

/// Translates a list of prompts.
pub fn to_pixel_prompts(prompts: &[GeoPrompt], bbox: &BoundingBox, zoom: u8) -> Vec<Prompt> {
    let translated: Vec<Prompt> = prompts.iter().map(|p| p.to_pixel(bbox, zoom)).collect();
    tracing::debug!(prompts = ?translated, "Translated prompts to pixel offsets");
    translated
}
