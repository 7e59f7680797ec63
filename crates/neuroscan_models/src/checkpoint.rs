//! Model checkpointing via Burn's record system.
//!
//! Weights are stored as named MessagePack (`*.mpk`). A service that
//! cannot find or read its checkpoint stays in the model-unready state and
//! reports it per request; checkpoint problems are never fatal to the
//! hosting process.
//!
//! # Example
//!
//! ```rust,ignore
//! use neuroscan_models::checkpoint::{load_weights, save_weights};
//! use neuroscan_models::TumorNetConfig;
//!
//! let model = TumorNetConfig::new(4).init::<B>(&device);
//! save_weights(model.clone(), "tumor_model.mpk")?;
//! let restored = load_weights(TumorNetConfig::new(4).init::<B>(&device), "tumor_model.mpk", &device)?;
//! ```

use std::path::Path;

use burn::module::Module;
use burn::prelude::*;
use burn::record::{FullPrecisionSettings, NamedMpkFileRecorder};
use thiserror::Error;

/// Error type for checkpoint operations.
#[derive(Error, Debug)]
pub enum CheckpointError {
    /// Saving failed.
    #[error("Failed to save checkpoint: {0}")]
    Save(String),

    /// Loading failed.
    #[error("Failed to load checkpoint: {0}")]
    Load(String),
}

/// Result type for checkpoint operations.
pub type Result<T> = std::result::Result<T, CheckpointError>;

/// Save a model's weights to a named-MessagePack checkpoint file.
pub fn save_weights<B, M>(model: M, path: impl AsRef<Path>) -> Result<()>
where
    B: Backend,
    M: Module<B>,
{
    let recorder = NamedMpkFileRecorder::<FullPrecisionSettings>::new();
    model
        .save_file(path.as_ref().to_path_buf(), &recorder)
        .map_err(|e| CheckpointError::Save(e.to_string()))
}

/// Load weights from a checkpoint file into a freshly initialized model.
///
/// The model passed in supplies the architecture; its parameters are
/// replaced by the recorded values.
pub fn load_weights<B, M>(model: M, path: impl AsRef<Path>, device: &B::Device) -> Result<M>
where
    B: Backend,
    M: Module<B>,
{
    let path = path.as_ref();
    if !path.exists() {
        return Err(CheckpointError::Load(format!(
            "checkpoint not found: {}",
            path.display()
        )));
    }

    let recorder = NamedMpkFileRecorder::<FullPrecisionSettings>::new();
    model
        .load_file(path.to_path_buf(), &recorder, device)
        .map_err(|e| CheckpointError::Load(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cnn::TumorNetConfig;
    use burn_autodiff::Autodiff;
    use burn_ndarray::NdArray;

    type TestBackend = Autodiff<NdArray>;

    #[test]
    fn test_save_load_round_trip() {
        let device = Default::default();
        let config = TumorNetConfig::new(4).with_filters([2, 4, 4, 8]);
        let model = config.init::<TestBackend>(&device);

        let dir = std::env::temp_dir().join("neuroscan_checkpoint_test");
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("model.mpk");

        save_weights(model.clone(), &path).unwrap();

        let restored = load_weights(config.init::<TestBackend>(&device), &path, &device).unwrap();

        // Same weights must produce the same logits.
        let x = burn::tensor::Tensor::<TestBackend, 4>::ones([1, 3, 224, 224], &device);
        let a: Vec<f32> = model
            .forward(x.clone())
            .into_data()
            .to_vec()
            .unwrap();
        let b: Vec<f32> = restored.forward(x).into_data().to_vec().unwrap();
        for (x, y) in a.iter().zip(b.iter()) {
            assert!((x - y).abs() < 1e-6);
        }

        std::fs::remove_file(&path).ok();
    }

    #[test]
    fn test_load_missing_file() {
        let device = Default::default();
        let config = TumorNetConfig::new(4).with_filters([2, 4, 4, 8]);
        let model = config.init::<TestBackend>(&device);

        let result = load_weights(model, "/nonexistent/model.mpk", &device);
        assert!(matches!(result, Err(CheckpointError::Load(_))));
    }
}
