//! # neuroscan_core
//!
//! Core types and contracts for neuroscan-rs brain-MRI classification.
//!
//! This crate provides:
//! - [`MriTensor`] wrapper enforcing the `(1, 3, 224, 224)` input contract
//! - [`Normalizer`] for the pixel-space ↔ standardized-tensor round trip
//! - [`ClassList`] for the external, taxonomy-agnostic class configuration
//! - [`Seed`] for deterministic random number generation
//! - [`ComputeConfig`] naming the compute target explicitly
//! - Error types and tensor ↔ ndarray conversion helpers
//!
//! ## Shape Convention
//!
//! Image tensors follow the convention `(N, C, H, W)`:
//! - `N`: Batch size (1 for a single explanation request)
//! - `C`: Channels (3, RGB)
//! - `H`, `W`: Spatial dimensions (224 × 224)

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]

mod compute;
mod error;
mod labels;
mod norm;
mod seed;
mod tensor;

pub use compute::{ComputeConfig, ComputeTarget};
pub use error::{CoreError, Result};
pub use labels::ClassList;
pub use norm::Normalizer;
pub use seed::Seed;
pub use tensor::{tensor_to_chw, tensor_to_plane, MriTensor, IMG_CHANNELS, IMG_SIZE};

/// Backend type aliases for convenience
pub mod backend {
    #[cfg(feature = "backend-ndarray")]
    pub use burn_ndarray::NdArray;

    #[cfg(feature = "backend-wgpu")]
    pub use burn_wgpu::Wgpu;

    #[cfg(feature = "backend-tch")]
    pub use burn_tch::LibTorch;
}
