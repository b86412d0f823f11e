//! Segmentation inference seam.
//!
//! The crate does not run models itself. An [`InferenceEngine`] takes the
//! fetched raster plus pixel-space prompts and returns a label mask;
//! engines are looked up by name in a [`ModelRegistry`] that the caller
//! owns and injects.

use std::collections::HashMap;
use std::sync::Arc;

use image::DynamicImage;
use parking_lot::RwLock;
use thiserror::Error;
use tracing::{debug, info};

use crate::prompt::Prompt;
use crate::vectorize::LabelMask;

/// Errors raised by inference engines and the registry.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum InferenceError {
    #[error("no model registered under '{0}'")]
    UnknownModel(String),

    #[error("failed to load model '{name}': {reason}")]
    Load { name: String, reason: String },

    #[error("inference requires at least one prompt")]
    NoPrompts,

    #[error("mask is {actual_width}x{actual_height}, raster is {width}x{height}")]
    MaskSizeMismatch {
        width: u32,
        height: u32,
        actual_width: u32,
        actual_height: u32,
    },

    #[error("inference failed: {0}")]
    Engine(String),
}

/// Output of one inference call.
#[derive(Debug, Clone, PartialEq)]
pub struct Inference {
    pub mask: LabelMask,
    pub n_predictions: usize,
}

impl Inference {
    /// Checks that the mask covers the raster pixel for pixel.
    pub fn check_size(&self, raster: &DynamicImage) -> Result<(), InferenceError> {
        if self.mask.width() != raster.width() || self.mask.height() != raster.height() {
            return Err(InferenceError::MaskSizeMismatch {
                width: raster.width(),
                height: raster.height(),
                actual_width: self.mask.width(),
                actual_height: self.mask.height(),
            });
        }
        Ok(())
    }
}

/// A segmentation model.
pub trait InferenceEngine: Send + Sync {
    fn infer(&self, raster: &DynamicImage, prompts: &[Prompt]) -> Result<Inference, InferenceError>;
}

/// Named inference engines, loaded once and shared.
#[derive(Default)]
pub struct ModelRegistry {
    models: RwLock<HashMap<String, Arc<dyn InferenceEngine>>>,
}

impl ModelRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `engine` under `name`, replacing any previous entry.
    pub fn register(&self, name: impl Into<String>, engine: Arc<dyn InferenceEngine>) {
        let name = name.into();
        debug!(model = %name, "Registering model");
        self.models.write().insert(name, engine);
    }

    pub fn get(&self, name: &str) -> Result<Arc<dyn InferenceEngine>, InferenceError> {
        self.models
            .read()
            .get(name)
            .cloned()
            .ok_or_else(|| InferenceError::UnknownModel(name.to_string()))
    }

    /// Returns the engine under `name`, loading it with `load` on first use.
    ///
    /// `load` runs under the write lock, so concurrent callers never load
    /// the same model twice.
    pub fn get_or_try_insert_with<F>(
        &self,
        name: &str,
        load: F,
    ) -> Result<Arc<dyn InferenceEngine>, InferenceError>
    where
        F: FnOnce() -> Result<Arc<dyn InferenceEngine>, InferenceError>,
    {
        if let Some(engine) = self.models.read().get(name) {
            return Ok(Arc::clone(engine));
        }

        let mut models = self.models.write();
        if let Some(engine) = models.get(name) {
            return Ok(Arc::clone(engine));
        }

        info!(model = %name, "Loading model");
        let engine = load()?;
        models.insert(name.to_string(), Arc::clone(&engine));
        Ok(engine)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.models.read().contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.models.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.models.read().is_empty()
    }
}

impl std::fmt::Debug for ModelRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let models = self.models.read();
        let mut names: Vec<&String> = models.keys().collect();
        names.sort();
        f.debug_struct("ModelRegistry").field("models", &names).finish()
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Engine that marks every included point's pixel as foreground.
    #[derive(Default)]
    pub struct PointEngine {
        pub calls: AtomicUsize,
    }

    impl InferenceEngine for PointEngine {
        fn infer(
            &self,
            raster: &DynamicImage,
            prompts: &[Prompt],
        ) -> Result<Inference, InferenceError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if prompts.is_empty() {
                return Err(InferenceError::NoPrompts);
            }

            let mut mask = LabelMask::zeros(raster.width(), raster.height());
            for prompt in prompts {
                if let Prompt::Point {
                    pixel: [x, y],
                    label: crate::prompt::PromptLabel::Include,
                } = *prompt
                {
                    if x >= 0 && y >= 0 {
                        mask.set(x as u32, y as u32, 1);
                    }
                }
            }
            Ok(Inference {
                mask,
                n_predictions: prompts.len(),
            })
        }
    }

    #[test]
    fn test_get_unknown_model() {
        let registry = ModelRegistry::new();
        assert_eq!(
            registry.get("sam").err(),
            Some(InferenceError::UnknownModel("sam".to_string()))
        );
    }

    #[test]
    fn test_register_and_get() {
        let registry = ModelRegistry::new();
        registry.register("sam", Arc::new(PointEngine::default()));
        assert!(registry.contains("sam"));
        assert_eq!(registry.len(), 1);
        assert!(registry.get("sam").is_ok());
    }

    #[test]
    fn test_get_or_try_insert_loads_once() {
        let registry = ModelRegistry::new();
        let loads = AtomicUsize::new(0);

        for _ in 0..3 {
            registry
                .get_or_try_insert_with("sam", || {
                    loads.fetch_add(1, Ordering::SeqCst);
                    Ok(Arc::new(PointEngine::default()))
                })
                .unwrap();
        }

        assert_eq!(loads.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_get_or_try_insert_propagates_load_error() {
        let registry = ModelRegistry::new();
        let result = registry.get_or_try_insert_with("sam", || {
            Err(InferenceError::Load {
                name: "sam".to_string(),
                reason: "weights missing".to_string(),
            })
        });

        assert!(matches!(result, Err(InferenceError::Load { .. })));
        assert!(registry.is_empty());
    }

    #[test]
    fn test_check_size() {
        let raster = DynamicImage::new_rgb8(4, 3);
        let ok = Inference {
            mask: LabelMask::zeros(4, 3),
            n_predictions: 1,
        };
        assert!(ok.check_size(&raster).is_ok());

        let bad = Inference {
            mask: LabelMask::zeros(3, 4),
            n_predictions: 1,
        };
        assert_eq!(
            bad.check_size(&raster),
            Err(InferenceError::MaskSizeMismatch {
                width: 4,
                height: 3,
                actual_width: 3,
                actual_height: 4
            })
        );
    }

    #[test]
    fn test_debug_lists_model_names() {
        let registry = ModelRegistry::new();
        registry.register("b", Arc::new(PointEngine::default()));
        registry.register("a", Arc::new(PointEngine::default()));
        assert_eq!(
            format!("{:?}", registry),
            r#"ModelRegistry { models: ["a", "b"] }"#
        );
    }
}
