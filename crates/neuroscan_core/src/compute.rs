//! Compute-target configuration.

use serde::{Deserialize, Serialize};

/// Which class of device the engine should run on.
///
/// The target is explicit configuration handed to the engine at
/// construction; nothing in the explanation path consults process-wide
/// device state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ComputeTarget {
    /// CPU execution (ndarray backend).
    Cpu,
    /// GPU execution (wgpu or libtorch backend, feature-dependent).
    Gpu,
}

/// Compute configuration for an engine instance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComputeConfig {
    /// The compute target to run forward and backward passes on.
    pub target: ComputeTarget,
    /// Batch size for perturbation-based methods that evaluate many
    /// masked images per request.
    pub eval_batch_size: usize,
}

impl Default for ComputeConfig {
    fn default() -> Self {
        Self {
            target: ComputeTarget::Cpu,
            eval_batch_size: 16,
        }
    }
}

impl ComputeConfig {
    /// Create a config for the given target.
    #[must_use]
    pub fn new(target: ComputeTarget) -> Self {
        Self {
            target,
            ..Default::default()
        }
    }

    /// Set the perturbation evaluation batch size.
    #[must_use]
    pub fn with_eval_batch_size(mut self, size: usize) -> Self {
        self.eval_batch_size = size.max(1);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_cpu() {
        let config = ComputeConfig::default();
        assert_eq!(config.target, ComputeTarget::Cpu);
        assert_eq!(config.eval_batch_size, 16);
    }

    #[test]
    fn test_batch_size_floor() {
        let config = ComputeConfig::default().with_eval_batch_size(0);
        assert_eq!(config.eval_batch_size, 1);
    }
}
