//! Handlebars template engine.

use std::collections::BTreeSet;

use handlebars::{Handlebars, RenderError};
use serde_json::Value;

use crate::helpers::{BUILTIN_HELPERS, RegistryHelper, RemovedHelper, register_builtins};
use crate::{
    Capabilities, Capability, HelperFn, RenderInput, RenderOptions, Renderer, TemplateError,
    TemplateSet, contains_error_marker, error_block, error_page,
};

/// Layout used when a page names none and no folder mapping applies.
const DEFAULT_LAYOUT: &str = "default";

/// Registry key prefix separating layouts from fragments.
const LAYOUT_PREFIX: &str = "layout:";

fn layout_key(name: &str) -> String {
    format!("{LAYOUT_PREFIX}{name}")
}

/// Message for a page whose resolved layout is not registered.
fn missing_layout_message(layout: &str) -> String {
    if layout == DEFAULT_LAYOUT {
        format!("You must have a layout named \"{DEFAULT_LAYOUT}\".")
    } else {
        format!("No layout named \"{layout}\" exists.")
    }
}

/// Copy of `data` with `body` set to the rendered page body.
fn with_body(data: &Value, body: String) -> Value {
    let mut data = match data {
        Value::Object(_) => data.clone(),
        _ => Value::Object(serde_json::Map::new()),
    };
    if let Value::Object(map) = &mut data {
        map.insert("body".to_owned(), Value::String(body));
    }
    data
}

/// Handlebars renderer supporting layouts, fragments (partials) and helpers.
#[derive(Debug, Default, Clone, Copy)]
pub struct HandlebarsRenderer {
    options: RenderOptions,
}

impl HandlebarsRenderer {
    /// Create a renderer with the given options.
    #[must_use]
    pub fn new(options: RenderOptions) -> Self {
        Self { options }
    }
}

impl Renderer for HandlebarsRenderer {
    fn name(&self) -> &'static str {
        "handlebars"
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities::NONE
            .with(Capability::Layouts)
            .with(Capability::Fragments)
            .with(Capability::Helpers)
    }

    fn template_extensions(&self) -> &'static [&'static str] {
        &["html", "hbs", "handlebars"]
    }

    fn template_set(&self) -> Box<dyn TemplateSet> {
        Box::new(HandlebarsTemplates::new(self.options))
    }
}

struct HandlebarsTemplates {
    registry: Handlebars<'static>,
    layouts: BTreeSet<String>,
    fragments: BTreeSet<String>,
    helpers: BTreeSet<String>,
}

impl HandlebarsTemplates {
    fn new(options: RenderOptions) -> Self {
        let mut registry = Handlebars::new();
        if !options.html_escape {
            registry.register_escape_fn(handlebars::no_escape);
        }
        let mut helpers = BTreeSet::new();
        if options.builtins {
            register_builtins(&mut registry);
            helpers.extend(BUILTIN_HELPERS.iter().map(|name| (*name).to_owned()));
        }
        Self {
            registry,
            layouts: BTreeSet::new(),
            fragments: BTreeSet::new(),
            helpers,
        }
    }

    fn render_page(&self, input: &RenderInput<'_>) -> Result<String, RenderError> {
        let body = self.registry.render_template(input.body, input.data)?;
        let data = with_body(input.data, body);
        self.registry.render(&layout_key(input.layout), &data)
    }
}

impl TemplateSet for HandlebarsTemplates {
    fn add_layout(&mut self, name: &str, source: &str) -> Result<(), TemplateError> {
        self.registry
            .register_template_string(&layout_key(name), source)
            .map_err(|e| TemplateError::Compile {
                name: name.to_owned(),
                message: e.to_string(),
            })?;
        self.layouts.insert(name.to_owned());
        Ok(())
    }

    fn has_layout(&self, name: &str) -> bool {
        self.layouts.contains(name)
    }

    fn layout_names(&self) -> Vec<String> {
        self.layouts.iter().cloned().collect()
    }

    fn add_fragment(&mut self, name: &str, source: &str) -> Result<(), TemplateError> {
        self.remove_fragment(name);
        self.registry
            .register_partial(name, source)
            .map_err(|e| TemplateError::Compile {
                name: name.to_owned(),
                message: e.to_string(),
            })?;
        self.fragments.insert(name.to_owned());
        Ok(())
    }

    fn remove_fragment(&mut self, name: &str) {
        if self.fragments.remove(name) {
            self.registry.unregister_template(name);
        }
    }

    fn fragment_names(&self) -> Vec<String> {
        self.fragments.iter().cloned().collect()
    }

    fn add_helper(&mut self, name: &str, helper: HelperFn) -> Result<(), TemplateError> {
        self.remove_helper(name);
        self.registry.register_helper(
            name,
            Box::new(RegistryHelper {
                name: name.to_owned(),
                func: helper,
            }),
        );
        self.helpers.insert(name.to_owned());
        Ok(())
    }

    fn remove_helper(&mut self, name: &str) {
        if self.helpers.remove(name) {
            self.registry.register_helper(
                name,
                Box::new(RemovedHelper {
                    name: name.to_owned(),
                }),
            );
        }
    }

    fn helper_names(&self) -> Vec<String> {
        self.helpers.iter().cloned().collect()
    }

    fn render(&self, input: &RenderInput<'_>) -> String {
        if !self.has_layout(input.layout) {
            let message = missing_layout_message(input.layout);
            tracing::warn!(source = input.source, layout = input.layout, "{message}");
            return self.render_error(&message, input);
        }
        match self.render_page(input) {
            Ok(output) => output,
            Err(e) => {
                tracing::warn!(source = input.source, error = %e, "Failed to render page");
                self.render_error(&e.to_string(), input)
            }
        }
    }

    /// Substitute the error block into the page's own layout, then the
    /// `default` layout, taking the first that renders it cleanly. Otherwise
    /// emit a standalone error document.
    fn render_error(&self, message: &str, input: &RenderInput<'_>) -> String {
        let data = with_body(input.data, error_block(message, input.source));
        let own = Some(input.layout).filter(|layout| *layout != DEFAULT_LAYOUT);
        for layout in own.into_iter().chain([DEFAULT_LAYOUT]) {
            if !self.has_layout(layout) {
                continue;
            }
            if let Ok(output) = self.registry.render(&layout_key(layout), &data)
                && contains_error_marker(&output)
            {
                return output;
            }
        }
        error_page(message, input.source)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use std::sync::Arc;

    static_assertions::assert_impl_all!(HandlebarsRenderer: Send, Sync);

    fn templates() -> Box<dyn TemplateSet> {
        HandlebarsRenderer::new(RenderOptions::default()).template_set()
    }

    fn render(templates: &dyn TemplateSet, body: &str, layout: &str, data: &Value) -> String {
        templates.render(&RenderInput {
            body,
            layout,
            data,
            source: "pages/index.html",
        })
    }

    #[test]
    fn test_capabilities() {
        let renderer = HandlebarsRenderer::default();
        assert!(renderer.supports(Capability::Layouts));
        assert!(renderer.supports(Capability::Fragments));
        assert!(renderer.supports(Capability::Helpers));
        assert!(!renderer.supports(Capability::Filters));
    }

    #[test]
    fn test_render_body_into_layout() {
        let mut t = templates();
        t.add_layout("default", "<title>{{page}}</title>\n{{body}}").unwrap();
        let out = render(
            t.as_ref(),
            "<h1>{{title}}</h1>",
            "default",
            &json!({"page": "index", "title": "Home"}),
        );
        assert_eq!(out, "<title>index</title>\n<h1>Home</h1>");
    }

    #[test]
    fn test_missing_named_layout_uses_default_layout() {
        let mut t = templates();
        t.add_layout("default", "<main>{{body}}</main>").unwrap();
        let out = render(t.as_ref(), "hi", "special", &json!({}));
        assert!(out.starts_with("<main>"));
        assert!(contains_error_marker(&out));
        assert!(out.contains("No layout named &quot;special&quot; exists."));
    }

    #[test]
    fn test_missing_default_layout_is_standalone_error() {
        let t = templates();
        let out = render(t.as_ref(), "hi", "default", &json!({}));
        assert!(out.starts_with("<!DOCTYPE html>"));
        assert!(contains_error_marker(&out));
        assert!(out.contains("You must have a layout named &quot;default&quot;."));
    }

    #[test]
    fn test_default_layout_without_body_falls_back_to_standalone() {
        let mut t = templates();
        t.add_layout("default", "<p>static</p>").unwrap();
        let out = render(t.as_ref(), "hi", "other", &json!({}));
        assert!(out.starts_with("<!DOCTYPE html>"));
        assert!(contains_error_marker(&out));
    }

    #[test]
    fn test_body_error_uses_page_layout() {
        let mut t = templates();
        t.add_layout("default", "<main>{{body}}</main>").unwrap();
        t.add_layout("docs", "<article>{{body}}</article>").unwrap();
        let out = render(t.as_ref(), "{{> missing}}", "docs", &json!({}));
        assert!(out.starts_with("<article>"));
        assert!(contains_error_marker(&out));
    }

    #[test]
    fn test_broken_page_layout_falls_back_to_default() {
        let mut t = templates();
        t.add_layout("default", "<main>{{body}}</main>").unwrap();
        t.add_layout("docs", "<article>{{> missing}}{{body}}</article>").unwrap();
        let out = render(t.as_ref(), "hi", "docs", &json!({}));
        assert!(out.starts_with("<main>"));
        assert!(contains_error_marker(&out));
    }

    #[test]
    fn test_runtime_error_is_marked() {
        let mut t = templates();
        t.add_layout("default", "{{body}}").unwrap();
        let out = render(t.as_ref(), "{{> missing}}", "default", &json!({}));
        assert!(contains_error_marker(&out));
    }

    #[test]
    fn test_layout_compile_error() {
        let mut t = templates();
        let err = t.add_layout("broken", "{{#if}}").unwrap_err();
        assert!(matches!(err, TemplateError::Compile { ref name, .. } if name == "broken"));
        assert!(!t.has_layout("broken"));
    }

    #[test]
    fn test_fragment_replace_and_remove() {
        let mut t = templates();
        t.add_layout("default", "{{body}}").unwrap();
        t.add_fragment("nav", "<nav>one</nav>").unwrap();
        t.add_fragment("nav", "<nav>two</nav>").unwrap();
        assert_eq!(
            render(t.as_ref(), "{{> nav}}", "default", &json!({})),
            "<nav>two</nav>"
        );
        assert_eq!(t.fragment_names(), vec!["nav".to_owned()]);

        t.remove_fragment("nav");
        assert!(t.fragment_names().is_empty());
        let out = render(t.as_ref(), "{{> nav}}", "default", &json!({}));
        assert!(contains_error_marker(&out));
    }

    #[test]
    fn test_nested_fragment_name() {
        let mut t = templates();
        t.add_layout("default", "{{body}}").unwrap();
        t.add_fragment("blocks/card", "[{{title}}]").unwrap();
        let out = render(
            t.as_ref(),
            "{{> blocks/card}}",
            "default",
            &json!({"title": "x"}),
        );
        assert_eq!(out, "[x]");
    }

    #[test]
    fn test_helper_replace_and_remove() {
        let mut t = templates();
        t.add_layout("default", "{{body}}").unwrap();
        t.add_helper("shout", Arc::new(|_: &[Value], _: &Value| Ok(json!("a"))))
            .unwrap();
        t.add_helper("shout", Arc::new(|_: &[Value], _: &Value| Ok(json!("b"))))
            .unwrap();
        assert_eq!(render(t.as_ref(), "{{shout}}", "default", &json!({})), "b");

        t.remove_helper("shout");
        assert!(!t.helper_names().contains(&"shout".to_owned()));
        let out = render(t.as_ref(), "{{shout 1}}", "default", &json!({}));
        assert!(contains_error_marker(&out));
    }

    #[test]
    fn test_builtins_toggle() {
        let with = templates();
        assert!(with.helper_names().contains(&"repeat".to_owned()));
        let without = HandlebarsRenderer::new(RenderOptions {
            builtins: false,
            html_escape: false,
        })
        .template_set();
        assert!(without.helper_names().is_empty());
    }

    #[test]
    fn test_html_escape_option() {
        let mut escaped = HandlebarsRenderer::new(RenderOptions {
            builtins: true,
            html_escape: true,
        })
        .template_set();
        escaped.add_layout("default", "{{{body}}}").unwrap();
        let out = render(escaped.as_ref(), "{{x}}", "default", &json!({"x": "<b>"}));
        assert_eq!(out, "&lt;b&gt;");

        let mut raw = templates();
        raw.add_layout("default", "{{body}}").unwrap();
        let out = render(raw.as_ref(), "{{x}}", "default", &json!({"x": "<b>"}));
        assert_eq!(out, "<b>");
    }
}
