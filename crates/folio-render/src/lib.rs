//! Capability-tagged template renderers for Folio.
//!
//! A [`Renderer`] describes a template engine: its name, the
//! [`Capabilities`] it supports, and how to create an empty
//! [`TemplateSet`]. A template set holds compiled layouts, fragments and
//! helpers, and turns a page body plus its data into a finished document.
//!
//! Rendering never fails. Template errors, missing layouts and helper
//! failures become an error document carrying [`ERROR_MARKER`], so a build
//! can count failed pages without aborting.
//!
//! # Example
//!
//! ```
//! use folio_render::{HandlebarsRenderer, RenderInput, RenderOptions, Renderer};
//! use serde_json::json;
//!
//! let renderer = HandlebarsRenderer::new(RenderOptions::default());
//! let mut templates = renderer.template_set();
//! templates.add_layout("default", "<title>{{page}}</title>{{body}}").unwrap();
//!
//! let data = json!({ "page": "index" });
//! let html = templates.render(&RenderInput {
//!     body: "<p>Hello</p>",
//!     layout: "default",
//!     data: &data,
//!     source: "pages/index.html",
//! });
//! assert_eq!(html, "<title>index</title><p>Hello</p>");
//! ```

mod capability;
mod error;
mod hbs;
mod helpers;
mod markdown;
mod marker;
mod raw;
mod renderer;

pub use capability::{Capabilities, Capability};
pub use error::{HelperError, TemplateError};
pub use hbs::HandlebarsRenderer;
pub use helpers::TRANSLATIONS_KEY;
pub use markdown::markdown_to_html;
pub use marker::{ERROR_MARKER, contains_error_marker, error_block, error_page, escape_html};
pub use raw::RawRenderer;
pub use renderer::{HelperFn, RenderInput, RenderOptions, Renderer, TemplateSet};

use std::sync::Arc;

/// Create a renderer by engine name.
///
/// Known engines are `handlebars` (alias `hbs`) and `raw`. Returns `None`
/// for anything else.
#[must_use]
pub fn renderer_by_name(name: &str, options: RenderOptions) -> Option<Arc<dyn Renderer>> {
    match name {
        "handlebars" | "hbs" => Some(Arc::new(HandlebarsRenderer::new(options))),
        "raw" => Some(Arc::new(RawRenderer)),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_renderer_by_name() {
        let hbs = renderer_by_name("handlebars", RenderOptions::default()).unwrap();
        assert_eq!(hbs.name(), "handlebars");
        let raw = renderer_by_name("raw", RenderOptions::default()).unwrap();
        assert_eq!(raw.name(), "raw");
        assert!(renderer_by_name("pug", RenderOptions::default()).is_none());
    }
}
