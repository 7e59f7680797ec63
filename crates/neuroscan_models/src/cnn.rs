//! TumorNet: a compact CNN classifier for brain-MRI slices.
//!
//! A four-stage convolutional feature extractor followed by global average
//! pooling, dropout, and a linear head. The reference implementation
//! fine-tuned a large pretrained backbone; TumorNet keeps the same
//! interface (224×224 RGB in, class logits out) at a size that trains and
//! evaluates quickly on CPU.

use burn::nn::{
    conv::{Conv2d, Conv2dConfig},
    pool::{AdaptiveAvgPool2d, AdaptiveAvgPool2dConfig, MaxPool2d, MaxPool2dConfig},
    Dropout, DropoutConfig, GroupNorm, GroupNormConfig, Linear, LinearConfig, PaddingConfig2d,
    Relu,
};
use burn::prelude::*;
use burn::tensor::activation::softmax;
use burn::tensor::backend::AutodiffBackend;
use serde::{Deserialize, Serialize};

use crate::classifier::{LateLayerCapture, TumorClassifier};

/// Configuration for the TumorNet model.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TumorNetConfig {
    /// Number of output classes.
    pub num_classes: usize,
    /// Number of filters in the four conv stages.
    pub n_filters: [usize; 4],
    /// Dropout probability applied before the final linear layer.
    /// Explanation requires a deterministic forward pass, so this is
    /// zero unless a training pipeline overrides it.
    pub dropout: f64,
}

impl Default for TumorNetConfig {
    fn default() -> Self {
        Self {
            num_classes: 4,
            n_filters: [16, 32, 64, 128],
            dropout: 0.0,
        }
    }
}

impl TumorNetConfig {
    /// Create a config for the given number of classes.
    #[must_use]
    pub fn new(num_classes: usize) -> Self {
        Self {
            num_classes,
            ..Default::default()
        }
    }

    /// Set the filter counts for the four conv stages.
    #[must_use]
    pub fn with_filters(mut self, n_filters: [usize; 4]) -> Self {
        self.n_filters = n_filters;
        self
    }

    /// Set the head dropout probability.
    #[must_use]
    pub fn with_dropout(mut self, dropout: f64) -> Self {
        self.dropout = dropout;
        self
    }

    /// Initialize the model.
    pub fn init<B: Backend>(&self, device: &B::Device) -> TumorNet<B> {
        TumorNet::new(self.clone(), device)
    }
}

/// A single convolutional block: Conv2d -> GroupNorm -> ReLU
///
/// Normalization is per-sample: explanation methods evaluate many masked
/// images in one batch, and scores must not couple across the batch.
#[derive(Module, Debug)]
pub struct ConvBlock<B: Backend> {
    conv: Conv2d<B>,
    norm: GroupNorm<B>,
}

impl<B: Backend> ConvBlock<B> {
    /// Create a new convolutional block.
    pub fn new(in_channels: usize, out_channels: usize, device: &B::Device) -> Self {
        let conv = Conv2dConfig::new([in_channels, out_channels], [3, 3])
            .with_padding(PaddingConfig2d::Same)
            .with_bias(false)
            .init(device);

        let norm = GroupNormConfig::new(1, out_channels).init(device);

        Self { conv, norm }
    }

    /// Forward pass through the block.
    pub fn forward(&self, x: Tensor<B, 4>) -> Tensor<B, 4> {
        let out = self.conv.forward(x);
        let out = self.norm.forward(out);
        Relu::new().forward(out)
    }
}

/// CNN classifier for 224×224 RGB MRI slices.
///
/// Architecture:
/// - 4 × (Conv2d 3×3 -> GroupNorm -> ReLU), MaxPool 2×2 between stages
/// - Global average pooling
/// - Dropout
/// - Linear(n_filters\[3\], num_classes)
///
/// The last conv stage's output is the "late layer" exposed to the
/// layer-gradient Grad-CAM variant.
#[derive(Module, Debug)]
pub struct TumorNet<B: Backend> {
    block1: ConvBlock<B>,
    block2: ConvBlock<B>,
    block3: ConvBlock<B>,
    block4: ConvBlock<B>,
    pool: MaxPool2d,
    gap: AdaptiveAvgPool2d,
    dropout: Dropout,
    fc: Linear<B>,
}

impl<B: Backend> TumorNet<B> {
    /// Create a new TumorNet model.
    pub fn new(config: TumorNetConfig, device: &B::Device) -> Self {
        let [f1, f2, f3, f4] = config.n_filters;

        Self {
            block1: ConvBlock::new(3, f1, device),
            block2: ConvBlock::new(f1, f2, device),
            block3: ConvBlock::new(f2, f3, device),
            block4: ConvBlock::new(f3, f4, device),
            pool: MaxPool2dConfig::new([2, 2]).with_strides([2, 2]).init(),
            gap: AdaptiveAvgPool2dConfig::new([1, 1]).init(),
            dropout: DropoutConfig::new(config.dropout).init(),
            fc: LinearConfig::new(f4, config.num_classes).init(device),
        }
    }

    /// Number of output classes, read off the head's weight shape.
    #[must_use]
    pub fn num_classes(&self) -> usize {
        self.fc.weight.val().dims()[1]
    }

    /// Feature extractor: everything up to (and including) the last conv
    /// block.
    ///
    /// # Returns
    ///
    /// Activations of shape `(batch, n_filters[3], 28, 28)` for 224×224
    /// input.
    pub fn forward_features(&self, x: Tensor<B, 4>) -> Tensor<B, 4> {
        let out = self.block1.forward(x);
        let out = self.pool.forward(out);
        let out = self.block2.forward(out);
        let out = self.pool.forward(out);
        let out = self.block3.forward(out);
        let out = self.pool.forward(out);
        self.block4.forward(out)
    }

    /// Classifier head over extracted features.
    pub fn forward_head(&self, features: Tensor<B, 4>) -> Tensor<B, 2> {
        let out = self.gap.forward(features);
        let [batch, channels, _, _] = out.dims();
        let out = out.reshape([batch, channels]);
        let out = self.dropout.forward(out);
        self.fc.forward(out)
    }

    /// Forward pass.
    ///
    /// # Arguments
    ///
    /// * `x` - Input tensor of shape `(batch, 3, 224, 224)`
    ///
    /// # Returns
    ///
    /// Logits tensor of shape `(batch, num_classes)`.
    pub fn forward(&self, x: Tensor<B, 4>) -> Tensor<B, 2> {
        let features = self.forward_features(x);
        self.forward_head(features)
    }

    /// Forward pass returning probabilities.
    pub fn forward_probs(&self, x: Tensor<B, 4>) -> Tensor<B, 2> {
        let logits = self.forward(x);
        softmax(logits, 1)
    }
}

impl<B: AutodiffBackend> TumorClassifier<B> for TumorNet<B> {
    fn forward(&self, x: Tensor<B, 4>) -> Tensor<B, 2> {
        Self::forward(self, x)
    }

    fn num_classes(&self) -> usize {
        Self::num_classes(self)
    }

    fn late_layer_capture(
        &self,
        x: Tensor<B, 4>,
        target: usize,
    ) -> Option<LateLayerCapture<B>> {
        if target >= Self::num_classes(self) {
            return None;
        }

        // Split the forward pass at the last conv block so the feature
        // map becomes a gradient leaf.
        let features = self.forward_features(x).detach().require_grad();
        let logits = self.forward_head(features.clone());

        let score = logits.slice([0..1, target..target + 1]).sum();
        let grads = score.backward();
        let gradients = features.grad(&grads)?;

        Some(LateLayerCapture {
            activations: features.inner(),
            gradients,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn_autodiff::Autodiff;
    use burn_ndarray::NdArray;

    type TestBackend = Autodiff<NdArray>;

    #[test]
    fn test_config_default() {
        let config = TumorNetConfig::default();
        assert_eq!(config.num_classes, 4);
        assert_eq!(config.n_filters, [16, 32, 64, 128]);
        assert_eq!(config.dropout, 0.0);
    }

    #[test]
    fn test_config_builder() {
        let config = TumorNetConfig::new(12)
            .with_filters([8, 16, 32, 64])
            .with_dropout(0.5);
        assert_eq!(config.num_classes, 12);
        assert_eq!(config.n_filters[3], 64);
        assert!((config.dropout - 0.5).abs() < 1e-9);
    }

    #[test]
    fn test_forward_shapes() {
        let device = Default::default();
        let config = TumorNetConfig::new(4).with_filters([4, 8, 8, 16]);
        let model: TumorNet<TestBackend> = config.init(&device);

        let x = Tensor::<TestBackend, 4>::zeros([1, 3, 224, 224], &device);
        let logits = model.forward(x);
        assert_eq!(logits.dims(), [1, 4]);
    }

    #[test]
    fn test_feature_resolution() {
        let device = Default::default();
        let config = TumorNetConfig::new(4).with_filters([4, 8, 8, 16]);
        let model: TumorNet<TestBackend> = config.init(&device);

        let x = Tensor::<TestBackend, 4>::zeros([1, 3, 224, 224], &device);
        let features = model.forward_features(x);
        assert_eq!(features.dims(), [1, 16, 28, 28]);
    }

    #[test]
    fn test_late_layer_capture_shapes() {
        let device = Default::default();
        let config = TumorNetConfig::new(4).with_filters([4, 8, 8, 16]);
        let model: TumorNet<TestBackend> = config.init(&device);

        let x = Tensor::<TestBackend, 4>::random(
            [1, 3, 224, 224],
            burn::tensor::Distribution::Normal(0.0, 1.0),
            &device,
        );
        let capture = TumorClassifier::late_layer_capture(&model, x, 0)
            .expect("capture should be available");
        assert_eq!(capture.activations.dims(), [1, 16, 28, 28]);
        assert_eq!(capture.gradients.dims(), [1, 16, 28, 28]);
    }

    #[test]
    fn test_late_layer_capture_rejects_bad_target() {
        let device = Default::default();
        let config = TumorNetConfig::new(4).with_filters([4, 8, 8, 16]);
        let model: TumorNet<TestBackend> = config.init(&device);

        let x = Tensor::<TestBackend, 4>::zeros([1, 3, 224, 224], &device);
        assert!(TumorClassifier::late_layer_capture(&model, x, 99).is_none());
    }

    #[test]
    fn test_probs_sum_to_one() {
        let device = Default::default();
        let config = TumorNetConfig::new(4).with_filters([4, 8, 8, 16]);
        let model: TumorNet<TestBackend> = config.init(&device);

        let x = Tensor::<TestBackend, 4>::zeros([1, 3, 224, 224], &device);
        let probs = model.forward_probs(x);
        let total: f32 = probs.sum().into_scalar().elem();
        assert!((total - 1.0).abs() < 1e-5);
    }
}
