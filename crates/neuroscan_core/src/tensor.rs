//! MRI image tensor types and host-memory conversion helpers.

use burn::prelude::*;
use ndarray::{Array2, Array3};

use crate::error::{CoreError, Result};

/// Spatial side length expected by the classifier (224 × 224).
pub const IMG_SIZE: usize = 224;

/// Number of image channels (RGB).
pub const IMG_CHANNELS: usize = 3;

/// A single normalized MRI input tensor.
///
/// Wraps a Burn tensor and enforces the `(1, 3, 224, 224)` contract that
/// the preprocessor produces and the classifier consumes: batch of one,
/// RGB channel order, f32 values standardized by per-channel mean/std.
///
/// The wrapper is cheap to clone; explanation methods always operate on a
/// detached clone and never mutate the caller's tensor in place.
///
/// # Type Parameters
///
/// * `B` - The Burn backend type
#[derive(Debug, Clone)]
pub struct MriTensor<B: Backend> {
    inner: Tensor<B, 4>,
}

impl<B: Backend> MriTensor<B> {
    /// Create a new MriTensor from a Burn tensor.
    ///
    /// # Errors
    ///
    /// Returns an error unless the tensor has shape `(1, 3, 224, 224)`.
    pub fn new(tensor: Tensor<B, 4>) -> Result<Self> {
        let dims = tensor.dims();
        if dims != [1, IMG_CHANNELS, IMG_SIZE, IMG_SIZE] {
            return Err(CoreError::InvalidShape {
                expected: format!("(1, {IMG_CHANNELS}, {IMG_SIZE}, {IMG_SIZE})"),
                got: format!("{dims:?}"),
            });
        }
        Ok(Self { inner: tensor })
    }

    /// Create an all-zero MriTensor.
    pub fn zeros(device: &B::Device) -> Self {
        Self {
            inner: Tensor::zeros([1, IMG_CHANNELS, IMG_SIZE, IMG_SIZE], device),
        }
    }

    /// Build an MriTensor from a `(3, 224, 224)` host array.
    ///
    /// # Errors
    ///
    /// Returns an error if the array does not have the expected shape.
    pub fn from_chw(chw: &Array3<f32>, device: &B::Device) -> Result<Self> {
        let shape = chw.dim();
        if shape != (IMG_CHANNELS, IMG_SIZE, IMG_SIZE) {
            return Err(CoreError::InvalidShape {
                expected: format!("({IMG_CHANNELS}, {IMG_SIZE}, {IMG_SIZE})"),
                got: format!("{shape:?}"),
            });
        }
        let data: Vec<f32> = chw.iter().copied().collect();
        let tensor = Tensor::<B, 1>::from_floats(data.as_slice(), device).reshape([
            1,
            IMG_CHANNELS,
            IMG_SIZE,
            IMG_SIZE,
        ]);
        Ok(Self { inner: tensor })
    }

    /// Get a reference to the underlying Burn tensor.
    #[must_use]
    pub const fn inner(&self) -> &Tensor<B, 4> {
        &self.inner
    }

    /// Consume self and return the underlying Burn tensor.
    #[must_use]
    pub fn into_inner(self) -> Tensor<B, 4> {
        self.inner
    }

    /// Get the device the tensor is on.
    pub fn device(&self) -> B::Device {
        self.inner.device()
    }

    /// Copy the tensor contents to a `(3, 224, 224)` host array.
    pub fn to_chw(&self) -> Result<Array3<f32>> {
        tensor_to_chw(self.inner.clone())
    }
}

/// Extract a `(C, H, W)` host array from a `(1, C, H, W)` tensor.
///
/// # Errors
///
/// Returns an error if the batch dimension is not 1 or the data cannot be
/// read back to host memory.
pub fn tensor_to_chw<B: Backend>(tensor: Tensor<B, 4>) -> Result<Array3<f32>> {
    let [n, c, h, w] = tensor.dims();
    if n != 1 {
        return Err(CoreError::InvalidShape {
            expected: "batch size 1".to_string(),
            got: format!("batch size {n}"),
        });
    }
    let data = tensor
        .into_data()
        .to_vec::<f32>()
        .map_err(|e| CoreError::TensorData(format!("{e:?}")))?;
    Array3::from_shape_vec((c, h, w), data)
        .map_err(|e| CoreError::TensorData(e.to_string()))
}

/// Extract an `(H, W)` host array from a `(1, 1, H, W)` tensor.
///
/// # Errors
///
/// Returns an error unless both leading dimensions are 1.
pub fn tensor_to_plane<B: Backend>(tensor: Tensor<B, 4>) -> Result<Array2<f32>> {
    let [n, c, h, w] = tensor.dims();
    if n != 1 || c != 1 {
        return Err(CoreError::InvalidShape {
            expected: "(1, 1, H, W)".to_string(),
            got: format!("({n}, {c}, {h}, {w})"),
        });
    }
    let data = tensor
        .into_data()
        .to_vec::<f32>()
        .map_err(|e| CoreError::TensorData(format!("{e:?}")))?;
    Array2::from_shape_vec((h, w), data)
        .map_err(|e| CoreError::TensorData(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn_ndarray::NdArray;

    type TestBackend = NdArray;

    #[test]
    fn test_mri_tensor_zeros() {
        let device = Default::default();
        let t = MriTensor::<TestBackend>::zeros(&device);
        assert_eq!(t.inner().dims(), [1, 3, 224, 224]);
    }

    #[test]
    fn test_mri_tensor_rejects_bad_shape() {
        let device = Default::default();
        let tensor = Tensor::<TestBackend, 4>::zeros([1, 1, 224, 224], &device);
        assert!(MriTensor::new(tensor).is_err());
    }

    #[test]
    fn test_chw_round_trip() {
        let device = Default::default();
        let mut chw = Array3::<f32>::zeros((3, 224, 224));
        chw[[0, 0, 0]] = 1.0;
        chw[[2, 223, 223]] = -2.5;

        let t = MriTensor::<TestBackend>::from_chw(&chw, &device).unwrap();
        let back = t.to_chw().unwrap();

        assert_eq!(back.dim(), (3, 224, 224));
        assert!((back[[0, 0, 0]] - 1.0).abs() < 1e-6);
        assert!((back[[2, 223, 223]] + 2.5).abs() < 1e-6);
    }

    #[test]
    fn test_tensor_to_plane() {
        let device = Default::default();
        let tensor = Tensor::<TestBackend, 4>::ones([1, 1, 4, 4], &device);
        let plane = tensor_to_plane(tensor).unwrap();
        assert_eq!(plane.dim(), (4, 4));
        assert!((plane[[3, 3]] - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_tensor_to_plane_rejects_multichannel() {
        let device = Default::default();
        let tensor = Tensor::<TestBackend, 4>::ones([1, 3, 4, 4], &device);
        assert!(tensor_to_plane(tensor).is_err());
    }
}
