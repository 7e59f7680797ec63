//! Model registry for dynamic model creation.
//!
//! The registry allows creating classifiers dynamically by name from JSON
//! configuration, so a service can choose its architecture from a config
//! file rather than code.
//!
//! # Example
//!
//! ```rust,ignore
//! use neuroscan_models::registry::default_registry;
//! use serde_json::json;
//!
//! let registry = default_registry::<Autodiff<NdArray>>();
//! let model = registry.create("TumorNet", &json!({"num_classes": 4}), &device)?;
//! ```

use std::collections::HashMap;
use std::sync::Arc;

use burn::prelude::*;
use burn::tensor::backend::AutodiffBackend;
use serde_json::Value;
use thiserror::Error;

use crate::classifier::TumorClassifier;
use crate::cnn::TumorNetConfig;

/// Error type for model registry operations.
#[derive(Error, Debug)]
pub enum RegistryError {
    /// Model not found in registry.
    #[error("Model '{0}' not found in registry")]
    ModelNotFound(String),

    /// Invalid configuration.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

/// Result type for registry operations.
pub type Result<T> = std::result::Result<T, RegistryError>;

/// Type alias for model constructor.
pub type ModelConstructor<B> = Arc<
    dyn Fn(&Value, &<B as Backend>::Device) -> Result<Box<dyn TumorClassifier<B>>> + Send + Sync,
>;

/// Registry for dynamically creating classifiers by name.
pub struct ModelRegistry<B: AutodiffBackend> {
    models: HashMap<String, ModelConstructor<B>>,
}

impl<B: AutodiffBackend> Default for ModelRegistry<B> {
    fn default() -> Self {
        Self::new()
    }
}

impl<B: AutodiffBackend> ModelRegistry<B> {
    /// Create a new empty registry.
    pub fn new() -> Self {
        Self {
            models: HashMap::new(),
        }
    }

    /// Register a model constructor.
    pub fn register<F>(&mut self, name: &str, constructor: F)
    where
        F: Fn(&Value, &<B as Backend>::Device) -> Result<Box<dyn TumorClassifier<B>>>
            + Send
            + Sync
            + 'static,
    {
        self.models.insert(name.to_string(), Arc::new(constructor));
    }

    /// Create a classifier by name.
    pub fn create(
        &self,
        name: &str,
        config: &Value,
        device: &<B as Backend>::Device,
    ) -> Result<Box<dyn TumorClassifier<B>>> {
        let constructor = self
            .models
            .get(name)
            .ok_or_else(|| RegistryError::ModelNotFound(name.to_string()))?;
        constructor(config, device)
    }

    /// List all registered model names.
    pub fn list(&self) -> Vec<&str> {
        self.models.keys().map(|s| s.as_str()).collect()
    }

    /// Check if a model is registered.
    pub fn contains(&self, name: &str) -> bool {
        self.models.contains_key(name)
    }
}

fn get_usize_or(config: &Value, key: &str, default: usize) -> usize {
    config
        .get(key)
        .and_then(|v| v.as_u64())
        .map(|v| v as usize)
        .unwrap_or(default)
}

fn get_f64_or(config: &Value, key: &str, default: f64) -> f64 {
    config.get(key).and_then(|v| v.as_f64()).unwrap_or(default)
}

/// Create a registry with all available classifiers pre-registered.
///
/// # Available Models
///
/// - `TumorNet` — compact four-stage CNN
///
/// # Config Fields
///
/// - `num_classes` (default 4)
/// - `n_filters_1` … `n_filters_4` (defaults 16/32/64/128)
/// - `dropout` (default 0.0)
pub fn default_registry<B: AutodiffBackend>() -> ModelRegistry<B> {
    let mut registry = ModelRegistry::new();

    registry.register("TumorNet", |config, device| {
        let model_config = TumorNetConfig {
            num_classes: get_usize_or(config, "num_classes", 4),
            n_filters: [
                get_usize_or(config, "n_filters_1", 16),
                get_usize_or(config, "n_filters_2", 32),
                get_usize_or(config, "n_filters_3", 64),
                get_usize_or(config, "n_filters_4", 128),
            ],
            dropout: get_f64_or(config, "dropout", 0.0),
        };

        Ok(Box::new(model_config.init::<B>(device)) as Box<dyn TumorClassifier<B>>)
    });

    registry
}
