//! # neuroscan
//!
//! Brain tumor MRI classification with visual explanations, in Rust.
//!
//! neuroscan-rs pairs a CNN classifier with an explainability engine
//! that computes per-pixel and per-region attribution maps:
//!
//! - **Core**: input tensor contract, normalization, class taxonomy
//! - **Models**: the differentiable classifier contract and TumorNet
//! - **Explain**: Grad-CAM, Shapley approximation, LIME-style surrogate,
//!   orchestrated behind a capability registry
//! - **Render**: attribution normalization and heatmap overlays
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use neuroscan::prelude::*;
//!
//! let device = Default::default();
//! let model = TumorNetConfig::new(4).init::<Autodiff<NdArray>>(&device);
//! let engine = XaiEngine::new(Some(Box::new(model)), ClassList::brain_tumor());
//!
//! let result = engine.explain(&input, Method::Cam, &TargetSpec::Predicted)?;
//! result.rendered.save("overlay.png")?;
//! ```
//!
//! ## Feature Flags
//!
//! - `backend-ndarray` (default): CPU backend using ndarray
//! - `backend-wgpu`: GPU backend using WGPU
//! - `backend-tch`: PyTorch backend via tch-rs
//! - `partition-shap` (default): Shapley estimation backends
//! - `surrogate` (default): LIME-style surrogate explainer

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]

// Re-export all crates
pub use neuroscan_core as core;
pub use neuroscan_explain as explain;
pub use neuroscan_models as models;
pub use neuroscan_render as render;

/// Prelude module for convenient imports.
///
/// ```rust,ignore
/// use neuroscan::prelude::*;
/// ```
pub mod prelude {
    // Core types
    pub use neuroscan_core::{
        ClassList, ComputeConfig, MriTensor, Normalizer, Result, Seed,
    };

    // Models
    pub use neuroscan_models::{TumorClassifier, TumorNet, TumorNetConfig};

    // Explain
    pub use neuroscan_explain::{
        Capabilities, EngineConfig, ExplainError, ExplanationResult, Method, Prediction,
        TargetSpec, XaiEngine,
    };

    // Render
    pub use neuroscan_render::{OverlayConfig, RenderedMap};
}

/// All module for importing everything commonly needed.
pub mod all {
    pub use super::prelude::*;

    pub use neuroscan_core::backend;
    pub use neuroscan_explain::cam::{CamConfig, CamVariant};
    pub use neuroscan_explain::segmentation::{slic, SlicConfig};
    pub use neuroscan_explain::shapley::{ShapleyConfig, ShapleyStrategy};
    pub use neuroscan_explain::surrogate::SurrogateConfig;
    pub use neuroscan_render::{bilinear_resize, reduce_channels, Colormap};
}
