//! Class taxonomy configuration.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{CoreError, Result};

/// The ordered list of class labels the classifier was trained on.
///
/// The engine is taxonomy-agnostic: the concrete label set is external
/// configuration, not a core invariant. Datasets with 4-class and
/// 12-class taxonomies are both in circulation, so the list is loadable
/// from JSON and only its length is contractual (it must match the
/// classifier's output width).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassList {
    labels: Vec<String>,
}

impl ClassList {
    /// Create a class list from label strings.
    pub fn new<S: Into<String>>(labels: impl IntoIterator<Item = S>) -> Self {
        Self {
            labels: labels.into_iter().map(Into::into).collect(),
        }
    }

    /// The four-class brain-tumor taxonomy used by the reference
    /// checkpoints.
    #[must_use]
    pub fn brain_tumor() -> Self {
        Self::new(["no_tumor", "glioma", "meningioma", "pituitary"])
    }

    /// Load a class list from a JSON array of strings.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        let labels: Vec<String> =
            serde_json::from_str(&text).map_err(|e| CoreError::Serialization(e.to_string()))?;
        Ok(Self { labels })
    }

    /// Number of classes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.labels.len()
    }

    /// Whether the list is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    /// Label for a class index, if in range.
    #[must_use]
    pub fn label(&self, index: usize) -> Option<&str> {
        self.labels.get(index).map(String::as_str)
    }

    /// Index of a label, matched case-insensitively.
    #[must_use]
    pub fn index_of(&self, label: &str) -> Option<usize> {
        self.labels
            .iter()
            .position(|l| l.eq_ignore_ascii_case(label))
    }

    /// Iterate over the labels in index order.
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.labels.iter().map(String::as_str)
    }
}
