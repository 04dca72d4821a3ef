//! Pass-through renderer without template features.

use crate::{
    Capabilities, Capability, HelperFn, RenderInput, Renderer, TemplateError, TemplateSet,
};

/// Renderer that emits page bodies unchanged.
///
/// Supports no capabilities: layouts, fragments and helpers are rejected.
#[derive(Debug, Default, Clone, Copy)]
pub struct RawRenderer;

impl Renderer for RawRenderer {
    fn name(&self) -> &'static str {
        "raw"
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities::NONE
    }

    fn template_extensions(&self) -> &'static [&'static str] {
        &[]
    }

    fn template_set(&self) -> Box<dyn TemplateSet> {
        Box::new(RawTemplates)
    }
}

struct RawTemplates;

impl TemplateSet for RawTemplates {
    fn add_layout(&mut self, _name: &str, _source: &str) -> Result<(), TemplateError> {
        Err(TemplateError::Unsupported(Capability::Layouts))
    }

    fn has_layout(&self, _name: &str) -> bool {
        false
    }

    fn layout_names(&self) -> Vec<String> {
        Vec::new()
    }

    fn add_fragment(&mut self, _name: &str, _source: &str) -> Result<(), TemplateError> {
        Err(TemplateError::Unsupported(Capability::Fragments))
    }

    fn remove_fragment(&mut self, _name: &str) {}

    fn fragment_names(&self) -> Vec<String> {
        Vec::new()
    }

    fn add_helper(&mut self, _name: &str, _helper: HelperFn) -> Result<(), TemplateError> {
        Err(TemplateError::Unsupported(Capability::Helpers))
    }

    fn remove_helper(&mut self, _name: &str) {}

    fn helper_names(&self) -> Vec<String> {
        Vec::new()
    }

    fn render(&self, input: &RenderInput<'_>) -> String {
        input.body.to_owned()
    }
}
