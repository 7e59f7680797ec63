//! The explanation orchestrator.
//!
//! Drives one explanation request through its states:
//! target resolution → method dispatch → rendering → result packaging,
//! short-circuiting to a failure when the classifier is not loaded.
//! Method names are parsed into [`Method`] exactly once at this boundary;
//! nothing deeper in the call stack matches on strings.

use burn::prelude::*;
use burn::tensor::backend::AutodiffBackend;
use serde::{Deserialize, Serialize};

use neuroscan_core::{ClassList, ComputeConfig, MriTensor, Normalizer};
use neuroscan_models::TumorClassifier;
use neuroscan_render::{
    render_diverging_overlay, render_heatmap_overlay, render_placeholder, OverlayConfig,
    RenderedMap,
};

use crate::cam::{grad_cam, CamConfig};
use crate::capability::Capabilities;
use crate::error::{ExplainError, Result};
use crate::predict::{predict, Prediction};
use crate::shapley::{shapley, ShapleyConfig};
use crate::surrogate::{surrogate, SurrogateConfig};

/// The explanation methods the engine can dispatch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Method {
    /// Gradient-based class-activation mapping.
    Cam,
    /// Shapley-value approximation.
    Shapley,
    /// Local perturbation-based surrogate.
    Surrogate,
}

impl Method {
    /// Parse a case-insensitive method name.
    ///
    /// Accepted spellings: `gradcam`/`cam`, `shap`/`shapley`,
    /// `lime`/`surrogate`.
    ///
    /// # Errors
    ///
    /// Returns [`ExplainError::UnsupportedMethod`] for anything else.
    pub fn parse(name: &str) -> Result<Self> {
        match name.to_ascii_lowercase().as_str() {
            "gradcam" | "cam" => Ok(Self::Cam),
            "shap" | "shapley" => Ok(Self::Shapley),
            "lime" | "surrogate" => Ok(Self::Surrogate),
            _ => Err(ExplainError::UnsupportedMethod(name.to_string())),
        }
    }

    /// Canonical name of the method.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Cam => "gradcam",
            Self::Shapley => "shap",
            Self::Surrogate => "lime",
        }
    }
}

/// How the target class for an explanation is chosen.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TargetSpec {
    /// Use the classifier's arg-max prediction.
    Predicted,
    /// Explicit class index.
    Index(usize),
    /// Class name, resolved against the configured class list.
    Label(String),
}

/// Engine-wide configuration.
#[derive(Debug, Clone, Default)]
pub struct EngineConfig {
    /// Compute target and perturbation batch size.
    pub compute: ComputeConfig,
    /// Grad-CAM settings.
    pub cam: CamConfig,
    /// Shapley settings.
    pub shapley: ShapleyConfig,
    /// Surrogate settings.
    pub surrogate: SurrogateConfig,
    /// Overlay rendering settings.
    pub overlay: OverlayConfig,
}

/// The packaged outcome of one explanation request.
#[derive(Debug, Clone)]
pub struct ExplanationResult {
    /// The method that produced the explanation.
    pub method: Method,
    /// Resolved target class index.
    pub target_class: usize,
    /// Label of the target class.
    pub class_label: String,
    /// The rendered artifact (a placeholder when the method absorbed a
    /// computation failure).
    pub rendered: RenderedMap,
    /// True when the map is an explicitly labeled approximation (the
    /// Shapley gradient fallback).
    pub approximate: bool,
}

/// The explanation engine.
///
/// Stateless across requests apart from the shared read-only classifier;
/// safe to drive from a worker pool with one engine per model.
pub struct XaiEngine<B: AutodiffBackend> {
    model: Option<Box<dyn TumorClassifier<B>>>,
    classes: ClassList,
    normalizer: Normalizer,
    capabilities: Capabilities,
    config: EngineConfig,
}

impl<B: AutodiffBackend> XaiEngine<B> {
    /// Create an engine.
    ///
    /// `model` may be `None` when the checkpoint failed to load; every
    /// request will then report [`ExplainError::ModelUnready`] instead
    /// of crashing the host.
    pub fn new(model: Option<Box<dyn TumorClassifier<B>>>, classes: ClassList) -> Self {
        Self {
            model,
            classes,
            normalizer: Normalizer::default(),
            capabilities: Capabilities::detect(),
            config: EngineConfig::default(),
        }
    }

    /// Override the capability registry (used by hosts that probe their
    /// runtime, and by tests).
    #[must_use]
    pub fn with_capabilities(mut self, capabilities: Capabilities) -> Self {
        self.capabilities = capabilities;
        self
    }

    /// Override the engine configuration.
    #[must_use]
    pub fn with_config(mut self, config: EngineConfig) -> Self {
        self.config = config;
        self
    }

    /// Override the normalization statistics.
    #[must_use]
    pub fn with_normalizer(mut self, normalizer: Normalizer) -> Self {
        self.normalizer = normalizer;
        self
    }

    /// Whether a classifier is loaded.
    #[must_use]
    pub fn is_ready(&self) -> bool {
        self.model.is_some()
    }

    /// The capability registry.
    #[must_use]
    pub const fn capabilities(&self) -> &Capabilities {
        &self.capabilities
    }

    /// The configured class list.
    #[must_use]
    pub const fn classes(&self) -> &ClassList {
        &self.classes
    }

    /// Classify an image.
    pub fn predict(&self, input: &MriTensor<B>) -> Result<Prediction> {
        let model = self.model.as_deref().ok_or(ExplainError::ModelUnready)?;
        predict(model, &self.classes, input)
    }

    /// Resolve the target class for a request.
    ///
    /// Happens once per request; the resolved index is shared by the
    /// dispatched method and the renderer.
    pub fn resolve_target(&self, input: &MriTensor<B>, spec: &TargetSpec) -> Result<usize> {
        let model = self.model.as_deref().ok_or(ExplainError::ModelUnready)?;
        let n_classes = model.num_classes();

        match spec {
            TargetSpec::Index(index) => {
                if *index < n_classes {
                    Ok(*index)
                } else {
                    Err(ExplainError::UnknownClass(format!(
                        "class index {index} out of range (num_classes = {n_classes})"
                    )))
                }
            }
            TargetSpec::Label(name) => {
                let index = self
                    .classes
                    .index_of(name)
                    .ok_or_else(|| ExplainError::UnknownClass(name.clone()))?;
                if index < n_classes {
                    Ok(index)
                } else {
                    Err(ExplainError::UnknownClass(format!(
                        "label '{name}' maps to index {index}, outside the model's {n_classes} outputs"
                    )))
                }
            }
            TargetSpec::Predicted => {
                let logits = model.forward(input.inner().clone().detach());
                let index: i64 = logits.argmax(1).into_scalar().elem();
                Ok(index as usize)
            }
        }
    }

    /// Run one explanation request by method name.
    ///
    /// Convenience wrapper for callers holding a raw string; the name is
    /// parsed here and never again.
    pub fn explain_named(
        &self,
        input: &MriTensor<B>,
        method_name: &str,
        target: &TargetSpec,
    ) -> Result<ExplanationResult> {
        let method = Method::parse(method_name)?;
        self.explain(input, method, target)
    }

    /// Run one explanation request.
    pub fn explain(
        &self,
        input: &MriTensor<B>,
        method: Method,
        target: &TargetSpec,
    ) -> Result<ExplanationResult> {
        let model = self.model.as_deref().ok_or(ExplainError::ModelUnready)?;

        let target_class = self.resolve_target(input, target)?;
        tracing::debug!(method = method.as_str(), target_class, "target resolved");

        let result = self.dispatch_and_render(model, input, method, target_class, target);

        // Distinguished error kinds pass through untouched; unexpected
        // internal failures surface as the generic explanation error,
        // logged with the original message, and never crash the host.
        result.map_err(|err| match err {
            ExplainError::Explanation(msg) => {
                tracing::error!(method = method.as_str(), error = %msg, "explanation failed");
                ExplainError::Explanation(msg)
            }
            distinguished => distinguished,
        })
    }

    fn dispatch_and_render(
        &self,
        model: &dyn TumorClassifier<B>,
        input: &MriTensor<B>,
        method: Method,
        target_class: usize,
        target: &TargetSpec,
    ) -> Result<ExplanationResult> {
        let original = self.normalizer.denormalize(&input.to_chw()?);
        let batch_size = self.config.compute.eval_batch_size;
        let overlay = &self.config.overlay;

        let (rendered, approximate) = match method {
            Method::Cam => {
                let attr = grad_cam(model, input, target_class, &self.config.cam);
                let rendered = match attr.map {
                    Some(map) => render_heatmap_overlay(&map, &original, overlay)?,
                    None => render_placeholder(
                        &original,
                        "explanation unavailable: gradient could not be computed",
                    )?,
                };
                (rendered, false)
            }
            Method::Shapley => {
                let attr = shapley(
                    model,
                    input,
                    target_class,
                    &self.normalizer,
                    &self.capabilities,
                    &self.config.shapley,
                    batch_size,
                )?;
                let rendered = match &attr.values {
                    Some(values) => {
                        render_heatmap_overlay(&values.to_plane(), &original, overlay)?
                    }
                    None => render_placeholder(
                        &original,
                        "explanation unavailable: Shapley estimation failed",
                    )?,
                };
                (rendered, attr.approximate)
            }
            Method::Surrogate => {
                // The surrogate owns its own top-label search when the
                // caller did not pin a class.
                let explicit = match target {
                    TargetSpec::Predicted => None,
                    _ => Some(target_class),
                };
                let attr = surrogate(
                    model,
                    input,
                    explicit,
                    &self.normalizer,
                    &self.capabilities,
                    &self.config.surrogate,
                    batch_size,
                )?;
                let rendered =
                    render_diverging_overlay(&attr.weights, &attr.selection, &original, overlay)?;
                return Ok(ExplanationResult {
                    method,
                    target_class: attr.target_class,
                    class_label: self.label_for(attr.target_class),
                    rendered,
                    approximate: false,
                });
            }
        };

        Ok(ExplanationResult {
            method,
            target_class,
            class_label: self.label_for(target_class),
            rendered,
            approximate,
        })
    }

    fn label_for(&self, index: usize) -> String {
        self.classes
            .label(index)
            .map_or_else(|| format!("class_{index}"), str::to_string)
    }
}
