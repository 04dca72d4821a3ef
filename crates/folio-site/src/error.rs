//! Pipeline error types.

use std::fmt;
use std::path::PathBuf;

use folio_storage::StorageError;

/// Fatal pipeline error.
///
/// Per-page problems (bad front matter, missing layouts, render failures)
/// never surface here; they become error documents in the output.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    /// Invalid configuration, detected at construction.
    #[error("Configuration error: {0}")]
    Configuration(String),
    /// A content transform failed while the abort policy is active.
    #[error("Transform failed for {}: {source}", path.display())]
    Transform {
        /// Source file being transformed.
        path: PathBuf,
        /// Underlying step failure.
        source: TransformError,
    },
    /// Source discovery failed.
    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Error returned by a transform step function.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{0}")]
pub struct StepError(String);

impl StepError {
    /// Create a step error with a message.
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}

/// A transform step failed.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("step \"{step}\" failed: {message}")]
pub struct TransformError {
    /// Step name.
    pub step: String,
    /// Failure message.
    pub message: String,
}

/// Error returned by a collection transform.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{0}")]
pub struct CollectionError(String);

impl CollectionError {
    /// Create a collection error with a message.
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}

/// Kind of supporting asset that failed to load.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssetKind {
    /// Layout template.
    Layout,
    /// Fragment template.
    Fragment,
    /// Helper registration.
    Helper,
    /// Global data file.
    Data,
    /// Locale table.
    Locale,
    /// Collection definition.
    Collection,
}

impl fmt::Display for AssetKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Layout => "layout",
            Self::Fragment => "fragment",
            Self::Helper => "helper",
            Self::Data => "data file",
            Self::Locale => "locale",
            Self::Collection => "collection",
        })
    }
}

/// A supporting asset skipped during a refresh.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Skipped {kind} {}: {message}", path.display())]
pub struct AssetLoadError {
    /// Asset kind.
    pub kind: AssetKind,
    /// Offending file.
    pub path: PathBuf,
    /// Failure message.
    pub message: String,
}

impl AssetLoadError {
    pub(crate) fn new(kind: AssetKind, path: impl Into<PathBuf>, message: impl fmt::Display) -> Self {
        Self {
            kind,
            path: path.into(),
            message: message.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transform_error_display() {
        let err = PipelineError::Transform {
            path: PathBuf::from("pages/a.md"),
            source: TransformError {
                step: "replace".to_owned(),
                message: "expected 2 arguments".to_owned(),
            },
        };
        assert_eq!(
            err.to_string(),
            "Transform failed for pages/a.md: step \"replace\" failed: expected 2 arguments"
        );
    }

    #[test]
    fn test_asset_load_error_display() {
        let err = AssetLoadError::new(AssetKind::Data, "data/nav.yml", "bad indent");
        assert_eq!(err.to_string(), "Skipped data file data/nav.yml: bad indent");
    }
}
