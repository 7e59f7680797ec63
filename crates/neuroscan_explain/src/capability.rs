//! Capability registry for optional explanation backends.

use serde::{Deserialize, Serialize};

use crate::engine::Method;

/// Which explanation backends are available in this runtime.
///
/// Resolved once at engine construction from the crate's feature flags,
/// then queried per request. A method whose backend is absent fails fast
/// with a distinguished error instead of degrading silently.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Capabilities {
    /// Gradient-based class-activation mapping. Always available: it
    /// only needs the classifier's own backward pass.
    pub cam: bool,
    /// Shapley estimation backends (partition estimator, background deep
    /// approximation). The gradient-magnitude fallback does not depend
    /// on this flag.
    pub shapley: bool,
    /// LIME-style local surrogate explainer.
    pub surrogate: bool,
}

impl Capabilities {
    /// Detect capabilities from the compiled feature set.
    #[must_use]
    pub fn detect() -> Self {
        Self {
            cam: true,
            shapley: cfg!(feature = "partition-shap"),
            surrogate: cfg!(feature = "surrogate"),
        }
    }

    /// All backends available.
    #[must_use]
    pub fn all() -> Self {
        Self {
            cam: true,
            shapley: true,
            surrogate: true,
        }
    }

    /// Whether the backend for a method is available.
    #[must_use]
    pub fn supports(&self, method: Method) -> bool {
        match method {
            Method::Cam => self.cam,
            Method::Shapley => self.shapley,
            Method::Surrogate => self.surrogate,
        }
    }
}

impl Default for Capabilities {
    fn default() -> Self {
        Self::detect()
    }
}
