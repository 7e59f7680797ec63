//! Gradient-based class-activation mapping.
//!
//! Two variants produce a spatial importance map for a target class:
//!
//! - **Input-gradient** (default, portable): backpropagate the target
//!   class score to the input tensor, average the gradient across
//!   channels, rectify, and scale by the map's own maximum.
//! - **Layer-gradient**: use the classifier's optional late-layer
//!   capability to weight late conv activations by their pooled
//!   gradients; the map stays at the layer's spatial resolution and is
//!   upsampled at render time.
//!
//! Gradient failures are absorbed: the method logs and returns a
//! sentinel "no map" result with the resolved target class, never an
//! error.

use burn::prelude::*;
use burn::tensor::backend::AutodiffBackend;
use ndarray::Array2;
use serde::{Deserialize, Serialize};

use neuroscan_core::{tensor_to_plane, MriTensor};
use neuroscan_models::TumorClassifier;

const EPS: f32 = 1e-8;

/// Which Grad-CAM computation to run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CamVariant {
    /// Gradient of the class score with respect to the input tensor.
    InputGradient,
    /// Gradient-weighted activations of a late conv layer.
    LayerGradient,
}

/// Configuration for the Grad-CAM explainer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CamConfig {
    /// Variant to compute.
    pub variant: CamVariant,
}

impl Default for CamConfig {
    fn default() -> Self {
        Self {
            variant: CamVariant::InputGradient,
        }
    }
}

/// Result of a Grad-CAM computation.
#[derive(Debug, Clone)]
pub struct CamAttribution {
    /// Non-negative single-channel map scaled into `[0, 1]`, or `None`
    /// when gradient computation failed.
    pub map: Option<Array2<f32>>,
    /// The resolved target class, reported even when the map is absent.
    pub target_class: usize,
}

/// Compute a Grad-CAM attribution map for the given (already resolved)
/// target class.
///
/// The input is cloned and detached before gradients are enabled, so the
/// caller's tensor graph is never touched.
pub fn grad_cam<B, M>(
    model: &M,
    input: &MriTensor<B>,
    target_class: usize,
    config: &CamConfig,
) -> CamAttribution
where
    B: AutodiffBackend,
    M: TumorClassifier<B> + ?Sized,
{
    let map = match config.variant {
        CamVariant::InputGradient => input_gradient_map(model, input, target_class),
        CamVariant::LayerGradient => layer_gradient_map(model, input, target_class),
    };

    if map.is_none() {
        tracing::warn!(target_class, variant = ?config.variant, "Grad-CAM produced no map");
    }

    CamAttribution {
        map,
        target_class,
    }
}

fn input_gradient_map<B, M>(
    model: &M,
    input: &MriTensor<B>,
    target_class: usize,
) -> Option<Array2<f32>>
where
    B: AutodiffBackend,
    M: TumorClassifier<B> + ?Sized,
{
    let x = input.inner().clone().detach();
    let grad = crate::gradient::input_gradient(model, x, target_class)?;

    // Channel-mean, rectify, scale by own max. The epsilon keeps an
    // all-zero gradient from dividing by zero.
    let cam = grad.mean_dim(1).clamp_min(0.0);
    let max: f32 = cam.clone().max().into_scalar().elem();
    let cam = cam / (max + EPS);

    tensor_to_plane(cam).ok()
}

fn layer_gradient_map<B, M>(
    model: &M,
    input: &MriTensor<B>,
    target_class: usize,
) -> Option<Array2<f32>>
where
    B: AutodiffBackend,
    M: TumorClassifier<B> + ?Sized,
{
    let capture = model.late_layer_capture(input.inner().clone().detach(), target_class)?;

    // Global-average-pool the gradients into per-channel weights, then
    // combine the weighted activations into a single channel.
    let weights = capture.gradients.mean_dim(3).mean_dim(2);
    let weighted = capture.activations * weights;
    let cam = weighted.sum_dim(1).clamp_min(0.0);

    let max: f32 = cam.clone().max().into_scalar().elem();
    let cam = cam / (max + EPS);

    tensor_to_plane(cam).ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn_autodiff::Autodiff;
    use burn_ndarray::NdArray;
    use neuroscan_models::TumorNetConfig;

    type TestBackend = Autodiff<NdArray>;

    fn small_model() -> neuroscan_models::TumorNet<TestBackend> {
        let device = Default::default();
        TumorNetConfig::new(4)
            .with_filters([2, 4, 4, 8])
            .init(&device)
    }

    #[test]
    fn test_input_gradient_map_properties() {
        let device = Default::default();
        let model = small_model();
        let input = MriTensor::<TestBackend>::zeros(&device);

        let attr = grad_cam(&model, &input, 0, &CamConfig::default());
        assert_eq!(attr.target_class, 0);

        let map = attr.map.expect("input-gradient map should exist");
        assert_eq!(map.dim(), (224, 224));

        let mut max = 0.0f32;
        for &v in map.iter() {
            assert!(v >= 0.0, "CAM values must be non-negative");
            max = max.max(v);
        }
        assert!(max <= 1.0 + 1e-6, "CAM max must not exceed 1");
    }

    #[test]
    fn test_all_zero_input_does_not_divide_by_zero() {
        let device = Default::default();
        let model = small_model();
        let input = MriTensor::<TestBackend>::zeros(&device);

        // Must not panic even if the gradient is degenerate.
        let attr = grad_cam(&model, &input, 0, &CamConfig::default());
        if let Some(map) = attr.map {
            for &v in map.iter() {
                assert!(v.is_finite());
                assert!(v >= 0.0);
            }
        }
    }

    #[test]
    fn test_idempotent_for_same_input_and_target() {
        let device = Default::default();
        let model = small_model();
        let data: Vec<f32> = (0..3 * 224 * 224)
            .map(|i| ((i % 97) as f32) / 97.0 - 0.5)
            .collect();
        let chw = ndarray::Array3::from_shape_vec((3, 224, 224), data).unwrap();
        let input = MriTensor::<TestBackend>::from_chw(&chw, &device).unwrap();

        let a = grad_cam(&model, &input, 2, &CamConfig::default());
        let b = grad_cam(&model, &input, 2, &CamConfig::default());

        let (ma, mb) = (a.map.unwrap(), b.map.unwrap());
        for (x, y) in ma.iter().zip(mb.iter()) {
            assert!((x - y).abs() < 1e-6);
        }
    }

    #[test]
    fn test_out_of_range_target_yields_sentinel() {
        let device = Default::default();
        let model = small_model();
        let input = MriTensor::<TestBackend>::zeros(&device);

        let attr = grad_cam(&model, &input, 99, &CamConfig::default());
        assert!(attr.map.is_none());
        assert_eq!(attr.target_class, 99);
    }

    #[test]
    fn test_layer_gradient_variant() {
        let device = Default::default();
        let model = small_model();
        let data: Vec<f32> = (0..3 * 224 * 224)
            .map(|i| ((i % 53) as f32) / 53.0)
            .collect();
        let chw = ndarray::Array3::from_shape_vec((3, 224, 224), data).unwrap();
        let input = MriTensor::<TestBackend>::from_chw(&chw, &device).unwrap();

        let config = CamConfig {
            variant: CamVariant::LayerGradient,
        };
        let attr = grad_cam(&model, &input, 1, &config);

        let map = attr.map.expect("layer-gradient map should exist");
        // Map stays at the late layer's spatial resolution.
        assert_eq!(map.dim(), (28, 28));
        for &v in map.iter() {
            assert!(v >= 0.0);
            assert!(v <= 1.0 + 1e-6);
        }
    }
}
