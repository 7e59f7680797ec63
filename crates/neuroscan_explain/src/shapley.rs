//! Shapley-value approximation.
//!
//! Three strategies estimate per-segment or per-pixel marginal
//! contributions of the input to the target-class score:
//!
//! - [`ShapleyStrategy::Partition`] (default): superpixel segments are
//!   the players; a permutation-sampling estimator reveals segments one
//!   at a time against a hidden baseline under a bounded evaluation
//!   budget. Per permutation, the segment contributions sum exactly to
//!   `f(input) − f(baseline)`.
//! - [`ShapleyStrategy::Background`]: expected-gradients style deep
//!   approximation against a distribution of random noise baselines.
//! - [`ShapleyStrategy::GradientFallback`]: the absolute input gradient
//!   scaled by its maximum. Not a true Shapley estimate; the result is
//!   labeled `approximate` so downstream consumers can say so.
//!
//! The partition and background strategies require the Shapley
//! estimation backend; when it is unavailable they fail fast with a
//! distinguished error instead of silently degrading.

use burn::prelude::*;
use burn::tensor::backend::AutodiffBackend;
use ndarray::{Array2, Array3};
use rand::seq::SliceRandom;
use rand::Rng;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use neuroscan_core::{tensor_to_chw, MriTensor, Normalizer, Seed, IMG_SIZE};
use neuroscan_models::TumorClassifier;

use crate::capability::Capabilities;
use crate::error::{ExplainError, Result};
use crate::segmentation::{slic, Segmentation, SlicConfig};

const EPS: f32 = 1e-8;

/// Which Shapley estimation strategy to run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ShapleyStrategy {
    /// Segment-partition permutation estimator.
    Partition,
    /// Background-sampling deep approximation (expected gradients).
    Background,
    /// Absolute input gradient, explicitly labeled as an approximation.
    GradientFallback,
}

/// Configuration for the Shapley explainer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShapleyConfig {
    /// Estimation strategy.
    pub strategy: ShapleyStrategy,
    /// Superpixel segmentation for the partition estimator.
    pub slic: SlicConfig,
    /// Maximum number of classifier evaluations the partition estimator
    /// may spend.
    pub max_evals: usize,
    /// Number of noise baselines for the background strategy.
    pub background_samples: usize,
    /// Pixel value used for hidden segments in the partition baseline.
    pub hide_color: f32,
    /// Seed for permutation and baseline sampling.
    pub seed: Seed,
}

impl Default for ShapleyConfig {
    fn default() -> Self {
        Self {
            strategy: ShapleyStrategy::Partition,
            slic: SlicConfig::default(),
            max_evals: 500,
            background_samples: 50,
            hide_color: 0.0,
            seed: Seed::new(0),
        }
    }
}

/// The estimated attribution values.
#[derive(Debug, Clone)]
pub enum ShapleyValues {
    /// Signed per-channel, per-pixel values `(3, H, W)`.
    PerPixel(Array3<f32>),
    /// One signed value per segment, with the segmentation and the
    /// values broadcast back to pixel resolution.
    PerSegment {
        /// The segmentation the values refer to.
        segmentation: Segmentation,
        /// One value per segment.
        values: Vec<f32>,
        /// Values broadcast to `(H, W)`.
        map: Array2<f32>,
    },
}

impl ShapleyValues {
    /// A single-channel view of the values for rendering.
    #[must_use]
    pub fn to_plane(&self) -> Array2<f32> {
        match self {
            Self::PerPixel(values) => neuroscan_render::reduce_channels(values),
            Self::PerSegment { map, .. } => map.clone(),
        }
    }
}

/// Result of a Shapley computation.
#[derive(Debug, Clone)]
pub struct ShapleyAttribution {
    /// The estimated values, or `None` when a gradient-based strategy
    /// absorbed a computation failure.
    pub values: Option<ShapleyValues>,
    /// The resolved target class.
    pub target_class: usize,
    /// True when the values come from the gradient fallback rather than
    /// a true Shapley estimator.
    pub approximate: bool,
}

/// Estimate Shapley attributions for the given (already resolved) target
/// class.
///
/// # Errors
///
/// - [`ExplainError::DependencyUnavailable`] when the partition or
///   background strategy is selected but the estimation backend is
///   absent.
/// - [`ExplainError::Computation`] when the partition estimator cannot
///   evaluate the classifier.
pub fn shapley<B, M>(
    model: &M,
    input: &MriTensor<B>,
    target_class: usize,
    normalizer: &Normalizer,
    capabilities: &Capabilities,
    config: &ShapleyConfig,
    eval_batch_size: usize,
) -> Result<ShapleyAttribution>
where
    B: AutodiffBackend,
    M: TumorClassifier<B> + ?Sized,
{
    match config.strategy {
        ShapleyStrategy::Partition => {
            if !capabilities.shapley {
                return Err(ExplainError::DependencyUnavailable { method: "shap" });
            }
            partition(model, input, target_class, normalizer, config, eval_batch_size)
        }
        ShapleyStrategy::Background => {
            if !capabilities.shapley {
                return Err(ExplainError::DependencyUnavailable { method: "shap" });
            }
            Ok(background(model, input, target_class, config))
        }
        ShapleyStrategy::GradientFallback => Ok(gradient_fallback(model, input, target_class)),
    }
}

/// Segment-partition permutation estimator.
fn partition<B, M>(
    model: &M,
    input: &MriTensor<B>,
    target_class: usize,
    normalizer: &Normalizer,
    config: &ShapleyConfig,
    eval_batch_size: usize,
) -> Result<ShapleyAttribution>
where
    B: AutodiffBackend,
    M: TumorClassifier<B> + ?Sized,
{
    let device = input.device();
    let pixels = normalizer.denormalize(&input.to_chw()?);
    let segmentation = slic(&pixels, &config.slic);
    let n = segmentation.n_segments;

    let baseline = Array3::<f32>::from_elem(pixels.dim(), config.hide_color);
    let f0 = eval_target_scores(
        model,
        normalizer,
        std::slice::from_ref(&baseline),
        target_class,
        &device,
        eval_batch_size,
    )?[0];

    // Each permutation spends n evaluations; keep the total within the
    // caller's budget.
    let n_perms = (config.max_evals.saturating_sub(1) / n.max(1)).max(1);
    tracing::debug!(n_segments = n, n_perms, "running partition estimator");

    let mut rng = config.seed.derive("partition").to_rng();
    let mut contributions = vec![0.0f32; n];

    for _ in 0..n_perms {
        let mut order: Vec<usize> = (0..n).collect();
        order.shuffle(&mut rng);

        // Reveal segments cumulatively in permutation order.
        let images: Vec<Array3<f32>> = (1..=n)
            .into_par_iter()
            .map(|i| {
                let mut active = vec![false; n];
                for &s in &order[..i] {
                    active[s] = true;
                }
                segmentation.apply_mask(&pixels, &baseline, &active)
            })
            .collect();

        let scores = eval_target_scores(
            model,
            normalizer,
            &images,
            target_class,
            &device,
            eval_batch_size,
        )?;

        let mut prev = f0;
        for (i, &score) in scores.iter().enumerate() {
            contributions[order[i]] += score - prev;
            prev = score;
        }
    }

    let values: Vec<f32> = contributions
        .into_iter()
        .map(|c| c / n_perms as f32)
        .collect();
    let map = segmentation.broadcast(&values);

    Ok(ShapleyAttribution {
        values: Some(ShapleyValues::PerSegment {
            segmentation,
            values,
            map,
        }),
        target_class,
        approximate: false,
    })
}

/// Background-sampling deep approximation: average `(x − b) · ∇f` over
/// interpolations toward random noise baselines.
fn background<B, M>(
    model: &M,
    input: &MriTensor<B>,
    target_class: usize,
    config: &ShapleyConfig,
) -> ShapleyAttribution
where
    B: AutodiffBackend,
    M: TumorClassifier<B> + ?Sized,
{
    let device = input.device();
    let x = input.inner().clone().detach();
    let x_inner = x.clone().inner();
    let n_samples = config.background_samples.max(1);

    let mut rng = config.seed.derive("background").to_rng();
    let mut accum: Option<Tensor<B::InnerBackend, 4>> = None;

    for _ in 0..n_samples {
        // Noise baseline in normalized tensor space.
        let noise: Vec<f32> = (0..3 * IMG_SIZE * IMG_SIZE)
            .map(|_| {
                let u1: f32 = rng.gen::<f32>().max(1e-7);
                let u2: f32 = rng.gen();
                (-2.0 * u1.ln()).sqrt() * (std::f32::consts::TAU * u2).cos()
            })
            .collect();
        let baseline = Tensor::<B, 1>::from_floats(noise.as_slice(), &device).reshape([
            1,
            3,
            IMG_SIZE,
            IMG_SIZE,
        ]);

        let alpha: f32 = rng.gen();
        let interpolated = baseline.clone() + (x.clone() - baseline.clone()) * alpha;

        let Some(grad) =
            crate::gradient::input_gradient(model, interpolated.detach(), target_class)
        else {
            tracing::warn!(target_class, "background Shapley gradient unavailable");
            return ShapleyAttribution {
                values: None,
                target_class,
                approximate: false,
            };
        };

        let term = (x_inner.clone() - baseline.inner()) * grad;
        accum = Some(match accum {
            Some(a) => a + term,
            None => term,
        });
    }

    let attribution = accum.map(|a| a / n_samples as f32);
    let values = attribution
        .and_then(|a| tensor_to_chw(a).ok())
        .map(ShapleyValues::PerPixel);

    ShapleyAttribution {
        values,
        target_class,
        approximate: false,
    }
}

/// Absolute input gradient scaled by its maximum. Documented
/// approximation, not true Shapley values.
fn gradient_fallback<B, M>(
    model: &M,
    input: &MriTensor<B>,
    target_class: usize,
) -> ShapleyAttribution
where
    B: AutodiffBackend,
    M: TumorClassifier<B> + ?Sized,
{
    let x = input.inner().clone().detach();
    let values = match crate::gradient::input_gradient(model, x, target_class) {
        Some(grad) => {
            let abs = grad.abs();
            let max: f32 = abs.clone().max().into_scalar().elem();
            let scaled = abs / (max + EPS);
            tensor_to_chw(scaled).ok().map(ShapleyValues::PerPixel)
        }
        None => {
            tracing::warn!(target_class, "gradient fallback produced no map");
            None
        }
    };

    ShapleyAttribution {
        values,
        target_class,
        approximate: true,
    }
}

/// Evaluate the classifier on a batch of pixel-space images and return
/// the target-class logit for each.
fn eval_target_scores<B, M>(
    model: &M,
    normalizer: &Normalizer,
    images: &[Array3<f32>],
    target_class: usize,
    device: &B::Device,
    batch_size: usize,
) -> Result<Vec<f32>>
where
    B: AutodiffBackend,
    M: TumorClassifier<B> + ?Sized,
{
    let mut scores = Vec::with_capacity(images.len());
    let batch_size = batch_size.max(1);

    for chunk in images.chunks(batch_size) {
        let mut data = Vec::with_capacity(chunk.len() * 3 * IMG_SIZE * IMG_SIZE);
        for img in chunk {
            data.extend(normalizer.normalize(img).iter().copied());
        }
        let batch = Tensor::<B, 1>::from_floats(data.as_slice(), device).reshape([
            chunk.len(),
            3,
            IMG_SIZE,
            IMG_SIZE,
        ]);

        let logits = model.forward(batch);
        let [_, n_classes] = logits.dims();
        if target_class >= n_classes {
            return Err(ExplainError::Computation(format!(
                "target class {target_class} out of range for {n_classes} outputs"
            )));
        }

        let flat = logits
            .into_data()
            .to_vec::<f32>()
            .map_err(|e| ExplainError::Computation(format!("{e:?}")))?;
        for row in flat.chunks(n_classes) {
            scores.push(row[target_class]);
        }
    }

    Ok(scores)
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

    fn gradient_input() -> MriTensor<TestBackend> {
        let device = Default::default();
        let data: Vec<f32> = (0..3 * 224 * 224)
            .map(|i| ((i % 71) as f32) / 71.0 - 0.5)
            .collect();
        let chw = Array3::from_shape_vec((3, 224, 224), data).unwrap();
        MriTensor::from_chw(&chw, &device).unwrap()
    }

    #[test]
    fn test_dependency_unavailable_when_backend_absent() {
        let model = small_model();
        let input = gradient_input();
        let caps = Capabilities {
            cam: true,
            shapley: false,
            surrogate: true,
        };

        let result = shapley(
            &model,
            &input,
            0,
            &Normalizer::default(),
            &caps,
            &ShapleyConfig::default(),
            8,
        );
        assert!(matches!(
            result,
            Err(ExplainError::DependencyUnavailable { method: "shap" })
        ));
    }

    #[test]
    fn test_gradient_fallback_available_without_backend() {
        let model = small_model();
        let input = gradient_input();
        let caps = Capabilities {
            cam: true,
            shapley: false,
            surrogate: false,
        };
        let config = ShapleyConfig {
            strategy: ShapleyStrategy::GradientFallback,
            ..Default::default()
        };

        let attr = shapley(
            &model,
            &input,
            1,
            &Normalizer::default(),
            &caps,
            &config,
            8,
        )
        .unwrap();
        assert!(attr.approximate, "fallback must be labeled approximate");

        let values = attr.values.expect("fallback values should exist");
        let ShapleyValues::PerPixel(map) = values else {
            panic!("fallback is per-pixel");
        };
        let mut max = 0.0f32;
        for &v in map.iter() {
            assert!(v >= 0.0);
            max = max.max(v);
        }
        assert!(max <= 1.0 + 1e-6);
    }

    #[test]
    fn test_partition_sums_to_output_deviation() {
        let model = small_model();
        let input = gradient_input();
        let normalizer = Normalizer::default();
        let config = ShapleyConfig {
            slic: SlicConfig {
                n_segments: 8,
                ..Default::default()
            },
            // One full permutation.
            max_evals: 9,
            ..Default::default()
        };

        let attr = shapley(
            &model,
            &input,
            0,
            &normalizer,
            &Capabilities::all(),
            &config,
            8,
        )
        .unwrap();
        assert!(!attr.approximate);

        let Some(ShapleyValues::PerSegment {
            segmentation,
            values,
            ..
        }) = attr.values
        else {
            panic!("partition is per-segment");
        };

        // With a single permutation the contributions telescope exactly
        // to f(input) − f(baseline).
        let device = Default::default();
        let pixels = normalizer.denormalize(&input.to_chw().unwrap());
        let baseline = Array3::<f32>::zeros(pixels.dim());
        let f1 = eval_target_scores::<TestBackend, _>(
            &model,
            &normalizer,
            std::slice::from_ref(&pixels),
            0,
            &device,
            4,
        )
        .unwrap()[0];
        let f0 = eval_target_scores::<TestBackend, _>(
            &model,
            &normalizer,
            std::slice::from_ref(&baseline),
            0,
            &device,
            4,
        )
        .unwrap()[0];

        let total: f32 = values.iter().sum();
        assert_eq!(values.len(), segmentation.n_segments);
        assert!(
            (total - (f1 - f0)).abs() < 1e-3,
            "sum {total} vs deviation {}",
            f1 - f0
        );
    }

    #[test]
    fn test_background_produces_signed_per_pixel() {
        let model = small_model();
        let input = gradient_input();
        let config = ShapleyConfig {
            strategy: ShapleyStrategy::Background,
            background_samples: 3,
            ..Default::default()
        };

        let attr = shapley(
            &model,
            &input,
            2,
            &Normalizer::default(),
            &Capabilities::all(),
            &config,
            8,
        )
        .unwrap();
        assert!(!attr.approximate);
        let Some(ShapleyValues::PerPixel(map)) = attr.values else {
            panic!("background is per-pixel");
        };
        assert_eq!(map.dim(), (3, 224, 224));
        for &v in map.iter() {
            assert!(v.is_finite());
        }
    }

    #[test]
    fn test_apply_mask_reveals_only_active() {
        let mut pixels = Array3::<f32>::zeros((3, 4, 4));
        pixels.fill(0.8);
        let baseline = Array3::<f32>::zeros((3, 4, 4));
        let segmentation = Segmentation {
            labels: Array2::from_shape_fn((4, 4), |(y, _)| u32::from(y >= 2)),
            n_segments: 2,
        };

        let out = segmentation.apply_mask(&pixels, &baseline, &[true, false]);
        assert!((out[[0, 0, 0]] - 0.8).abs() < 1e-6);
        assert!(out[[0, 3, 0]].abs() < 1e-6);
    }
}
