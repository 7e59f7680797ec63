//! Error types for the explanation engine.

use thiserror::Error;

/// Result type alias using [`ExplainError`].
pub type Result<T> = std::result::Result<T, ExplainError>;

/// Errors surfaced by the explanation engine.
///
/// The first five variants are the distinguished kinds callers are
/// expected to match on; [`Explanation`](ExplainError::Explanation) is
/// the generic catch-all the orchestrator wraps unexpected internal
/// failures into, preserving the underlying message for diagnostics.
#[derive(Error, Debug)]
pub enum ExplainError {
    /// Caller-supplied class name or index is not in the known class
    /// list.
    #[error("Unknown class: {0}")]
    UnknownClass(String),

    /// Requested explanation method name is not recognized.
    #[error("Unsupported explanation method: {0}")]
    UnsupportedMethod(String),

    /// An optional estimation backend required by the selected method is
    /// not available in this build. Distinguished from generic failures
    /// so the caller can suggest an alternative method.
    #[error("Explanation backend '{method}' is not available; choose another method")]
    DependencyUnavailable {
        /// The unavailable backend.
        method: &'static str,
    },

    /// Gradient or perturbation computation failed for numerical or
    /// internal reasons.
    #[error("Attribution computation failed: {0}")]
    Computation(String),

    /// Classifier not loaded/initialized. Fatal for all methods and
    /// never retried automatically.
    #[error("Model is not loaded; explanation is unavailable")]
    ModelUnready,

    /// Unexpected internal failure caught at the orchestrator boundary.
    #[error("Explanation error: {0}")]
    Explanation(String),
}

impl From<neuroscan_core::CoreError> for ExplainError {
    fn from(err: neuroscan_core::CoreError) -> Self {
        Self::Computation(err.to_string())
    }
}

impl From<neuroscan_render::RenderError> for ExplainError {
    fn from(err: neuroscan_render::RenderError) -> Self {
        Self::Explanation(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dependency_unavailable_is_distinct_from_computation() {
        let dep = ExplainError::DependencyUnavailable { method: "shap" };
        let comp = ExplainError::Computation("nan".to_string());
        assert!(matches!(
            dep,
            ExplainError::DependencyUnavailable { .. }
        ));
        assert!(!matches!(comp, ExplainError::DependencyUnavailable { .. }));
    }

    #[test]
    fn test_messages_carry_context() {
        let err = ExplainError::UnknownClass("astrocytoma".to_string());
        assert!(err.to_string().contains("astrocytoma"));
    }
}
