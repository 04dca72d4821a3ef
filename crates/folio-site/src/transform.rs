//! Extension-keyed content transforms.

use folio_config::{TransformRules, TransformStep};

use crate::error::TransformError;
use crate::plugin::PluginRegistry;

/// Applies configured transform steps to page content.
///
/// Rules are keyed by source file extension. "Before" steps run on the page
/// body ahead of rendering, "after" steps on the rendered output.
#[derive(Debug, Clone, Default)]
pub struct TransformPipeline {
    registry: PluginRegistry,
    rules: TransformRules,
}

impl TransformPipeline {
    /// Create a pipeline resolving step names against `registry`.
    #[must_use]
    pub fn new(registry: PluginRegistry, rules: TransformRules) -> Self {
        Self { registry, rules }
    }

    /// Apply `steps` to `content`, strictly in order.
    ///
    /// Steps naming an unregistered transform are skipped with a warning.
    ///
    /// # Errors
    ///
    /// Returns [`TransformError`] for the first step that fails.
    pub fn apply(&self, content: String, steps: &[TransformStep]) -> Result<String, TransformError> {
        let mut content = content;
        for step in steps {
            let Some(transform) = self.registry.transform(&step.name) else {
                tracing::warn!(step = %step.name, "Unknown transform step, skipping");
                continue;
            };
            content = transform(&content, &step.args).map_err(|e| TransformError {
                step: step.name.clone(),
                message: e.to_string(),
            })?;
        }
        Ok(content)
    }

    /// Whether any "before" steps match `extension`.
    #[must_use]
    pub fn has_before(&self, extension: &str) -> bool {
        self.rules
            .for_extension(extension)
            .is_some_and(|steps| !steps.before.is_empty())
    }

    /// Apply the "before" steps for `extension`; content passes through
    /// unchanged when none match.
    ///
    /// # Errors
    ///
    /// Returns [`TransformError`] if a step fails.
    pub fn before(&self, extension: &str, content: String) -> Result<String, TransformError> {
        match self.rules.for_extension(extension) {
            Some(steps) => self.apply(content, &steps.before),
            None => Ok(content),
        }
    }

    /// Apply the "after" steps for `extension`.
    ///
    /// # Errors
    ///
    /// Returns [`TransformError`] if a step fails.
    pub fn after(&self, extension: &str, content: String) -> Result<String, TransformError> {
        match self.rules.for_extension(extension) {
            Some(steps) => self.apply(content, &steps.after),
            None => Ok(content),
        }
    }
}
