//! Shared input-gradient plumbing.

use burn::prelude::*;
use burn::tensor::backend::AutodiffBackend;

use neuroscan_models::TumorClassifier;

/// Gradient of the target-class score with respect to `x`.
///
/// `x` must already be detached from any caller-owned graph; this
/// function marks it as a gradient leaf, runs one forward/backward pass,
/// and extracts the leaf gradient. Returns `None` when the target is out
/// of range or the backend reports no gradient for the leaf (disconnected
/// graph).
pub(crate) fn input_gradient<B, M>(
    model: &M,
    x: Tensor<B, 4>,
    target_class: usize,
) -> Option<Tensor<B::InnerBackend, 4>>
where
    B: AutodiffBackend,
    M: TumorClassifier<B> + ?Sized,
{
    let leaf = x.require_grad();
    let logits = model.forward(leaf.clone());

    let [_, n_classes] = logits.dims();
    if target_class >= n_classes {
        return None;
    }

    let score = logits.slice([0..1, target_class..target_class + 1]).sum();
    let grads = score.backward();
    leaf.grad(&grads)
}
