//! Template and helper errors.

use crate::Capability;

/// Error registering a template with a [`TemplateSet`](crate::TemplateSet).
#[derive(Debug, thiserror::Error)]
pub enum TemplateError {
    /// Template source failed to compile.
    #[error("Template \"{name}\" failed to compile: {message}")]
    Compile {
        /// Layout or fragment name.
        name: String,
        /// Engine error message.
        message: String,
    },
    /// The engine does not support this kind of template.
    #[error("Renderer does not support {0}")]
    Unsupported(Capability),
}

/// Error returned by a helper function.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{0}")]
pub struct HelperError(String);

impl HelperError {
    /// Create a helper error with a message.
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}
