//! Local surrogate (perturbation-based) explanation.
//!
//! Explains a single prediction by hiding random subsets of superpixel
//! segments, observing how the classifier's output moves, and fitting a
//! weighted ridge regression over the binary segment indicators. The
//! fitted coefficients attribute importance to each segment.
//!
//! The explainer owns the pixel-space round trip: the normalized input
//! is denormalized before segmentation and perturbation, and every
//! perturbed image is re-normalized before it reaches the classifier.

use burn::prelude::*;
use burn::tensor::activation::softmax;
use burn::tensor::backend::AutodiffBackend;
use ndarray::{Array2, Array3};
use rand::Rng;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use neuroscan_core::{MriTensor, Normalizer, Seed, IMG_SIZE};
use neuroscan_models::TumorClassifier;

use crate::capability::Capabilities;
use crate::error::{ExplainError, Result};
use crate::segmentation::{slic, SlicConfig};

/// Configuration for the surrogate explainer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SurrogateConfig {
    /// Number of perturbed samples to evaluate. More samples trade
    /// runtime for explanation stability.
    pub num_samples: usize,
    /// Number of top segments kept in the selection mask.
    pub num_features: usize,
    /// Superpixel segmentation parameters.
    pub slic: SlicConfig,
    /// When true, negative segment contributions are clamped to zero.
    pub positive_only: bool,
    /// Width of the exponential locality kernel over mask distance.
    pub kernel_width: f32,
    /// Ridge regularization strength.
    pub ridge: f32,
    /// Pixel value shown for hidden segments.
    pub hide_color: f32,
    /// Seed for mask sampling.
    pub seed: Seed,
}

impl Default for SurrogateConfig {
    fn default() -> Self {
        Self {
            num_samples: 100,
            num_features: 10,
            slic: SlicConfig::default(),
            positive_only: true,
            kernel_width: 0.25,
            ridge: 1.0,
            hide_color: 0.0,
            seed: Seed::new(0),
        }
    }
}

/// Result of a surrogate explanation.
#[derive(Debug, Clone)]
pub struct SurrogateAttribution {
    /// Per-pixel segment weights (signed, or non-negative when
    /// `positive_only` is set).
    pub weights: Array2<f32>,
    /// The selection mask actually used: pixels of the top-ranked
    /// segments.
    pub selection: Array2<bool>,
    /// The resolved target class.
    pub target_class: usize,
}

/// Fit a local surrogate explanation.
///
/// If `target_class` is `None` it defaults to the surrogate's own
/// top-label search: the arg-max of the unperturbed sample's predicted
/// probabilities.
///
/// # Errors
///
/// - [`ExplainError::DependencyUnavailable`] when the surrogate backend
///   is absent (raised at call time, not at engine construction).
/// - [`ExplainError::Computation`] when the perturbation evaluation or
///   the ridge fit fails.
pub fn surrogate<B, M>(
    model: &M,
    input: &MriTensor<B>,
    target_class: Option<usize>,
    normalizer: &Normalizer,
    capabilities: &Capabilities,
    config: &SurrogateConfig,
    eval_batch_size: usize,
) -> Result<SurrogateAttribution>
where
    B: AutodiffBackend,
    M: TumorClassifier<B> + ?Sized,
{
    if !capabilities.surrogate {
        return Err(ExplainError::DependencyUnavailable { method: "lime" });
    }

    let device = input.device();
    let pixels = normalizer.denormalize(&input.to_chw()?);
    let segmentation = slic(&pixels, &config.slic);
    let n = segmentation.n_segments;
    let num_samples = config.num_samples.max(2);

    // Sample binary masks; the first row is the unperturbed instance and
    // anchors both the locality kernel and the top-label search.
    let mut rng = config.seed.derive("masks").to_rng();
    let mut masks: Vec<Vec<bool>> = Vec::with_capacity(num_samples);
    masks.push(vec![true; n]);
    for _ in 1..num_samples {
        masks.push((0..n).map(|_| rng.gen::<bool>()).collect());
    }

    let baseline = Array3::<f32>::from_elem(pixels.dim(), config.hide_color);
    let images: Vec<Array3<f32>> = masks
        .par_iter()
        .map(|mask| segmentation.apply_mask(&pixels, &baseline, mask))
        .collect();

    let probs = eval_probabilities(model, normalizer, &images, &device, eval_batch_size)?;
    let n_classes = probs.dim().1;

    let target = match target_class {
        Some(t) if t < n_classes => t,
        Some(t) => {
            return Err(ExplainError::Computation(format!(
                "target class {t} out of range for {n_classes} outputs"
            )))
        }
        None => {
            let row = probs.row(0);
            let mut best = 0;
            for (i, &p) in row.iter().enumerate() {
                if p > row[best] {
                    best = i;
                }
            }
            best
        }
    };

    // Locality weights: samples that hide more segments are farther from
    // the instance and count less in the fit.
    let kernel_width = config.kernel_width.max(1e-3);
    let sample_weights: Vec<f64> = masks
        .iter()
        .map(|mask| {
            let active = mask.iter().filter(|&&m| m).count() as f32;
            let distance = 1.0 - active / n as f32;
            f64::from((-(distance * distance) / (kernel_width * kernel_width)).exp())
        })
        .collect();

    let targets: Vec<f64> = (0..num_samples)
        .map(|i| f64::from(probs[[i, target]]))
        .collect();

    let coefficients = weighted_ridge(&masks, &targets, &sample_weights, f64::from(config.ridge))
        .ok_or_else(|| {
            ExplainError::Computation("surrogate ridge fit is singular".to_string())
        })?;

    let mut segment_weights: Vec<f32> = coefficients.iter().map(|&c| c as f32).collect();
    if config.positive_only {
        for w in &mut segment_weights {
            *w = w.max(0.0);
        }
    }

    // Keep the top-ranked segments by absolute weight.
    let mut ranked: Vec<usize> = (0..n).collect();
    ranked.sort_by(|&a, &b| {
        segment_weights[b]
            .abs()
            .partial_cmp(&segment_weights[a].abs())
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    let selected: Vec<usize> = ranked
        .into_iter()
        .take(config.num_features.max(1))
        .filter(|&s| segment_weights[s].abs() > 0.0)
        .collect();

    let weights = segmentation.broadcast(&segment_weights);
    let selection = segmentation.mask_of(&selected);

    Ok(SurrogateAttribution {
        weights,
        selection,
        target_class: target,
    })
}

/// Evaluate the classifier on perturbed pixel-space images, returning a
/// `(samples, classes)` matrix of softmax probabilities.
fn eval_probabilities<B, M>(
    model: &M,
    normalizer: &Normalizer,
    images: &[Array3<f32>],
    device: &B::Device,
    batch_size: usize,
) -> Result<Array2<f32>>
where
    B: AutodiffBackend,
    M: TumorClassifier<B> + ?Sized,
{
    let mut rows: Vec<f32> = Vec::new();
    let mut n_classes = 0;
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

        let probs = softmax(model.forward(batch), 1);
        let [_, classes] = probs.dims();
        n_classes = classes;

        let flat = probs
            .into_data()
            .to_vec::<f32>()
            .map_err(|e| ExplainError::Computation(format!("{e:?}")))?;
        rows.extend(flat);
    }

    Array2::from_shape_vec((images.len(), n_classes), rows)
        .map_err(|e| ExplainError::Computation(e.to_string()))
}

/// Solve the weighted ridge regression `(XᵀWX + λI) β = XᵀWy` over
/// binary mask features. Returns `None` if the system is singular.
fn weighted_ridge(
    masks: &[Vec<bool>],
    targets: &[f64],
    sample_weights: &[f64],
    ridge: f64,
) -> Option<Vec<f64>> {
    let n = masks.first()?.len();
    let mut xtwx = vec![vec![0.0f64; n]; n];
    let mut xtwy = vec![0.0f64; n];

    for ((mask, &y), &w) in masks.iter().zip(targets).zip(sample_weights) {
        for j in 0..n {
            if !mask[j] {
                continue;
            }
            xtwy[j] += w * y;
            for k in j..n {
                if mask[k] {
                    xtwx[j][k] += w;
                }
            }
        }
    }
    for j in 0..n {
        for k in 0..j {
            xtwx[j][k] = xtwx[k][j];
        }
        xtwx[j][j] += ridge.max(1e-12);
    }

    solve_linear_system(xtwx, xtwy)
}

/// Gaussian elimination with partial pivoting.
fn solve_linear_system(mut a: Vec<Vec<f64>>, mut b: Vec<f64>) -> Option<Vec<f64>> {
    let n = b.len();

    for col in 0..n {
        let mut pivot = col;
        for row in col + 1..n {
            if a[row][col].abs() > a[pivot][col].abs() {
                pivot = row;
            }
        }
        if a[pivot][col].abs() < 1e-12 {
            return None;
        }
        a.swap(col, pivot);
        b.swap(col, pivot);

        for row in col + 1..n {
            let factor = a[row][col] / a[col][col];
            if factor == 0.0 {
                continue;
            }
            for k in col..n {
                a[row][k] -= factor * a[col][k];
            }
            b[row] -= factor * b[col];
        }
    }

    let mut x = vec![0.0f64; n];
    for col in (0..n).rev() {
        let mut sum = b[col];
        for k in col + 1..n {
            sum -= a[col][k] * x[k];
        }
        x[col] = sum / a[col][col];
    }
    Some(x)
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

    fn structured_input() -> MriTensor<TestBackend> {
        let device = Default::default();
        let data: Vec<f32> = (0..3 * 224 * 224)
            .map(|i| ((i % 113) as f32) / 113.0 - 0.4)
            .collect();
        let chw = Array3::from_shape_vec((3, 224, 224), data).unwrap();
        MriTensor::from_chw(&chw, &device).unwrap()
    }

    fn fast_config() -> SurrogateConfig {
        SurrogateConfig {
            num_samples: 12,
            slic: SlicConfig {
                n_segments: 8,
                ..Default::default()
            },
            ..Default::default()
        }
    }

    #[test]
    fn test_dependency_unavailable_raised_at_call_time() {
        let model = small_model();
        let input = structured_input();
        let caps = Capabilities {
            cam: true,
            shapley: true,
            surrogate: false,
        };

        let result = surrogate(
            &model,
            &input,
            None,
            &Normalizer::default(),
            &caps,
            &fast_config(),
            8,
        );
        assert!(matches!(
            result,
            Err(ExplainError::DependencyUnavailable { method: "lime" })
        ));
    }

    #[test]
    fn test_positive_only_has_no_negative_weights() {
        let model = small_model();
        let input = structured_input();

        let attr = surrogate(
            &model,
            &input,
            Some(0),
            &Normalizer::default(),
            &Capabilities::all(),
            &fast_config(),
            8,
        )
        .unwrap();

        for &w in attr.weights.iter() {
            assert!(w >= 0.0, "positive_only mask must be non-negative");
        }
        assert_eq!(attr.target_class, 0);
    }

    #[test]
    fn test_signed_mode_allows_negative_weights() {
        let model = small_model();
        let input = structured_input();
        let config = SurrogateConfig {
            positive_only: false,
            ..fast_config()
        };

        let attr = surrogate(
            &model,
            &input,
            Some(1),
            &Normalizer::default(),
            &Capabilities::all(),
            &config,
            8,
        )
        .unwrap();
        assert_eq!(attr.weights.dim(), (224, 224));
        assert_eq!(attr.selection.dim(), (224, 224));
    }

    #[test]
    fn test_top_label_search_when_target_omitted() {
        let model = small_model();
        let input = structured_input();

        let attr = surrogate(
            &model,
            &input,
            None,
            &Normalizer::default(),
            &Capabilities::all(),
            &fast_config(),
            8,
        )
        .unwrap();
        assert!(attr.target_class < 4);
    }

    #[test]
    fn test_out_of_range_target_is_computation_error() {
        let model = small_model();
        let input = structured_input();

        let result = surrogate(
            &model,
            &input,
            Some(17),
            &Normalizer::default(),
            &Capabilities::all(),
            &fast_config(),
            8,
        );
        assert!(matches!(result, Err(ExplainError::Computation(_))));
    }

    #[test]
    fn test_selection_bounded_by_num_features() {
        let model = small_model();
        let input = structured_input();
        let config = SurrogateConfig {
            num_features: 2,
            positive_only: false,
            ..fast_config()
        };

        let attr = surrogate(
            &model,
            &input,
            Some(0),
            &Normalizer::default(),
            &Capabilities::all(),
            &config,
            8,
        )
        .unwrap();

        // Selected pixels come from at most num_features segments, so
        // they carry at most that many distinct weights.
        let mut distinct: Vec<f32> = Vec::new();
        for ((y, x), &sel) in attr.selection.indexed_iter() {
            if sel {
                let w = attr.weights[[y, x]];
                if !distinct.iter().any(|&d| (d - w).abs() < f32::EPSILON) {
                    distinct.push(w);
                }
            }
        }
        assert!(distinct.len() <= 2);
    }

    #[test]
    fn test_weighted_ridge_recovers_linear_model() {
        // y = 2·x0 + 0·x1 + 1·x2 over all 8 mask combinations.
        let mut masks = Vec::new();
        let mut targets = Vec::new();
        for bits in 0..8u32 {
            let mask: Vec<bool> = (0..3).map(|j| bits & (1 << j) != 0).collect();
            let y = 2.0 * f64::from(u8::from(mask[0])) + f64::from(u8::from(mask[2]));
            masks.push(mask);
            targets.push(y);
        }
        let weights = vec![1.0f64; 8];

        let beta = weighted_ridge(&masks, &targets, &weights, 1e-6).unwrap();
        assert!((beta[0] - 2.0).abs() < 1e-3);
        assert!(beta[1].abs() < 1e-3);
        assert!((beta[2] - 1.0).abs() < 1e-3);
    }

    #[test]
    fn test_solver_rejects_singular_system() {
        let a = vec![vec![1.0, 1.0], vec![1.0, 1.0]];
        let b = vec![1.0, 2.0];
        assert!(solve_linear_system(a, b).is_none());
    }
}
