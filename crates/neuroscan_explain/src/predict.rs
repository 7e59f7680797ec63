//! Prediction bundle for the inference path.

use burn::tensor::activation::softmax;
use burn::tensor::backend::AutodiffBackend;
use serde::Serialize;

use neuroscan_core::{ClassList, MriTensor};
use neuroscan_models::TumorClassifier;

use crate::error::{ExplainError, Result};

/// The classifier's verdict on a single image.
#[derive(Debug, Clone, Serialize)]
pub struct Prediction {
    /// Arg-max class index.
    pub class_index: usize,
    /// Label of the predicted class.
    pub label: String,
    /// Softmax probability of the predicted class.
    pub confidence: f32,
    /// Per-class probabilities in label order.
    pub probabilities: Vec<(String, f32)>,
}

pub(crate) fn predict<B, M>(
    model: &M,
    classes: &ClassList,
    input: &MriTensor<B>,
) -> Result<Prediction>
where
    B: AutodiffBackend,
    M: TumorClassifier<B> + ?Sized,
{
    let logits = model.forward(input.inner().clone().detach());
    let probs = softmax(logits, 1);

    let values = probs
        .into_data()
        .to_vec::<f32>()
        .map_err(|e| ExplainError::Computation(format!("{e:?}")))?;

    let mut class_index = 0;
    for (i, &p) in values.iter().enumerate() {
        if p > values[class_index] {
            class_index = i;
        }
    }

    let label_for = |i: usize| {
        classes
            .label(i)
            .map_or_else(|| format!("class_{i}"), str::to_string)
    };

    Ok(Prediction {
        class_index,
        label: label_for(class_index),
        confidence: values[class_index],
        probabilities: values
            .iter()
            .enumerate()
            .map(|(i, &p)| (label_for(i), p))
            .collect(),
    })
}
