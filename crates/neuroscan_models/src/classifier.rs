//! The differentiable black-box classifier contract.

use burn::prelude::*;
use burn::tensor::backend::AutodiffBackend;

/// Late convolutional activations paired with the gradient of a class
/// score with respect to them.
///
/// Both tensors have shape `(1, C, h, w)` at the layer's own spatial
/// resolution and live on the inner (non-autodiff) backend.
pub struct LateLayerCapture<B: AutodiffBackend> {
    /// Activations of the captured layer.
    pub activations: Tensor<B::InnerBackend, 4>,
    /// Gradient of the target-class score w.r.t. the activations.
    pub gradients: Tensor<B::InnerBackend, 4>,
}

/// A trained image classifier viewed as an opaque differentiable function.
///
/// The explanation engine only requires forward evaluation; gradient
/// backpropagation to the input happens through Burn's autodiff backend on
/// tensors the engine marks as requiring gradients. Implementations never
/// need to expose their internal layers.
///
/// [`late_layer_capture`](Self::late_layer_capture) is an optional
/// capability for the layer-gradient Grad-CAM variant; the default
/// implementation reports the capability as absent and the engine falls
/// back to the portable input-gradient variant.
pub trait TumorClassifier<B: AutodiffBackend> {
    /// Forward pass.
    ///
    /// # Arguments
    ///
    /// * `x` - Input tensor of shape `(batch, 3, 224, 224)`
    ///
    /// # Returns
    ///
    /// Logits tensor of shape `(batch, num_classes)`.
    fn forward(&self, x: Tensor<B, 4>) -> Tensor<B, 2>;

    /// Number of output classes.
    fn num_classes(&self) -> usize;

    /// Optional capability: activations of a late convolutional layer and
    /// the gradient of the `target` class score with respect to them.
    ///
    /// Returns `None` when the implementation does not expose its
    /// feature extractor, or when the gradient could not be computed.
    fn late_layer_capture(
        &self,
        x: Tensor<B, 4>,
        target: usize,
    ) -> Option<LateLayerCapture<B>> {
        let _ = (x, target);
        None
    }
}

impl<B: AutodiffBackend, M: TumorClassifier<B> + ?Sized> TumorClassifier<B> for Box<M> {
    fn forward(&self, x: Tensor<B, 4>) -> Tensor<B, 2> {
        (**self).forward(x)
    }

    fn num_classes(&self) -> usize {
        (**self).num_classes()
    }

    fn late_layer_capture(
        &self,
        x: Tensor<B, 4>,
        target: usize,
    ) -> Option<LateLayerCapture<B>> {
        (**self).late_layer_capture(x, target)
    }
}
