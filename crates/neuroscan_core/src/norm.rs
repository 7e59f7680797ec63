//! Per-channel normalization of image tensors.

use ndarray::Array3;
use serde::{Deserialize, Serialize};

/// Per-channel mean/std normalization matching the classifier's training
/// distribution.
///
/// The preprocessor standardizes `[0, 1]` RGB pixels with these statistics
/// before the tensor ever reaches the engine; perturbation-based
/// explanation methods invert the transform to work in pixel space and
/// re-apply it before every classifier call.
///
/// Defaults to the ImageNet statistics used for transfer-learning
/// fine-tuning.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Normalizer {
    /// Per-channel mean, RGB order.
    pub mean: [f32; 3],
    /// Per-channel standard deviation, RGB order.
    pub std: [f32; 3],
}

impl Default for Normalizer {
    fn default() -> Self {
        Self {
            mean: [0.485, 0.456, 0.406],
            std: [0.229, 0.224, 0.225],
        }
    }
}

impl Normalizer {
    /// Create a normalizer with explicit statistics.
    #[must_use]
    pub const fn new(mean: [f32; 3], std: [f32; 3]) -> Self {
        Self { mean, std }
    }

    /// Standardize a `(3, H, W)` array of `[0, 1]` pixels.
    #[must_use]
    pub fn normalize(&self, pixels: &Array3<f32>) -> Array3<f32> {
        let mut out = pixels.clone();
        for (c, mut plane) in out.outer_iter_mut().enumerate() {
            let mean = self.mean[c];
            let std = self.std[c];
            plane.mapv_inplace(|v| (v - mean) / std);
        }
        out
    }

    /// Invert [`normalize`](Self::normalize), clipping to `[0, 1]`.
    ///
    /// Clipping only affects values that were out of the pixel range
    /// before standardization; for tensors produced from real images the
    /// round trip is exact up to floating-point error.
    #[must_use]
    pub fn denormalize(&self, standardized: &Array3<f32>) -> Array3<f32> {
        let mut out = standardized.clone();
        for (c, mut plane) in out.outer_iter_mut().enumerate() {
            let mean = self.mean[c];
            let std = self.std[c];
            plane.mapv_inplace(|v| (v * std + mean).clamp(0.0, 1.0));
        }
        out
    }
}
