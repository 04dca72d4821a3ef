//! Renderer and template set traits.

use std::sync::Arc;

use serde_json::Value;

use crate::{Capabilities, Capability, HelperError, TemplateError, error_page};

/// Helper function callable from templates.
///
/// Receives the evaluated helper arguments and the root data context of the
/// page being rendered.
pub type HelperFn = Arc<dyn Fn(&[Value], &Value) -> Result<Value, HelperError> + Send + Sync>;

/// Engine options shared by all renderers.
#[derive(Debug, Clone, Copy)]
pub struct RenderOptions {
    /// Register built-in helpers (`markdown`, `repeat`, `ifpage`, ...).
    pub builtins: bool,
    /// HTML-escape `{{expr}}` output.
    pub html_escape: bool,
}

impl Default for RenderOptions {
    fn default() -> Self {
        Self {
            builtins: true,
            html_escape: false,
        }
    }
}

/// Everything needed to render one page.
#[derive(Debug, Clone, Copy)]
pub struct RenderInput<'a> {
    /// Page body template.
    pub body: &'a str,
    /// Resolved layout name.
    pub layout: &'a str,
    /// Assembled data context.
    pub data: &'a Value,
    /// Source path shown in error documents.
    pub source: &'a str,
}

/// A template engine.
pub trait Renderer: Send + Sync {
    /// Engine name.
    fn name(&self) -> &'static str;

    /// Capabilities the engine supports.
    fn capabilities(&self) -> Capabilities;

    /// Whether the engine supports `capability`.
    fn supports(&self, capability: Capability) -> bool {
        self.capabilities().contains(capability)
    }

    /// File extensions (without dot) of layout and fragment sources.
    fn template_extensions(&self) -> &'static [&'static str];

    /// Create an empty template set.
    fn template_set(&self) -> Box<dyn TemplateSet>;
}

/// Compiled layouts, fragments and helpers for one render context.
///
/// Registration is last-write-wins by name. Adding a fragment or helper
/// replaces any previous definition with the same name.
pub trait TemplateSet: Send + Sync {
    /// Compile and register a layout.
    fn add_layout(&mut self, name: &str, source: &str) -> Result<(), TemplateError>;

    /// Whether a layout is registered.
    fn has_layout(&self, name: &str) -> bool;

    /// Registered layout names, sorted.
    fn layout_names(&self) -> Vec<String>;

    /// Compile and register a fragment.
    fn add_fragment(&mut self, name: &str, source: &str) -> Result<(), TemplateError>;

    /// Remove a fragment. Unknown names are ignored.
    fn remove_fragment(&mut self, name: &str);

    /// Registered fragment names, sorted.
    fn fragment_names(&self) -> Vec<String>;

    /// Register a helper function.
    fn add_helper(&mut self, name: &str, helper: HelperFn) -> Result<(), TemplateError>;

    /// Remove a helper. Unknown names are ignored.
    fn remove_helper(&mut self, name: &str);

    /// Registered helper names (built-ins included), sorted.
    fn helper_names(&self) -> Vec<String>;

    /// Render a page.
    ///
    /// Never fails: any fault produces output containing
    /// [`ERROR_MARKER`](crate::ERROR_MARKER).
    fn render(&self, input: &RenderInput<'_>) -> String;

    /// Render an error document for a page that could not be processed.
    fn render_error(&self, message: &str, input: &RenderInput<'_>) -> String {
        error_page(message, input.source)
    }
}
