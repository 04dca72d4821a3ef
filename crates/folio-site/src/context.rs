//! Render context: everything pages are rendered against.

use std::collections::BTreeMap;
use std::fmt;

use folio_render::{Renderer, TemplateSet};
use serde_json::{Map, Value};

use crate::collection::CollectionDefinition;
use crate::error::AssetLoadError;

/// Compiled templates plus global data, locale tables and collection
/// definitions.
///
/// A context is immutable once built. A refresh builds a complete new
/// context and swaps it in; readers keep the snapshot they already hold.
pub struct RenderContext {
    templates: Box<dyn TemplateSet>,
    global_data: Map<String, Value>,
    locale_data: BTreeMap<String, Value>,
    collections: BTreeMap<String, CollectionDefinition>,
    warnings: Vec<AssetLoadError>,
}

impl fmt::Debug for RenderContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RenderContext")
            .field("layouts", &self.templates.layout_names())
            .field("fragments", &self.templates.fragment_names())
            .field("helpers", &self.templates.helper_names())
            .field("global_data", &self.global_data)
            .field("locales", &self.locales())
            .field("collections", &self.collections.keys().collect::<Vec<_>>())
            .field("warnings", &self.warnings.len())
            .finish()
    }
}

impl RenderContext {
    /// Create a context around a template set, with no data.
    #[must_use]
    pub fn new(templates: Box<dyn TemplateSet>) -> Self {
        Self {
            templates,
            global_data: Map::new(),
            locale_data: BTreeMap::new(),
            collections: BTreeMap::new(),
            warnings: Vec::new(),
        }
    }

    /// Empty context for `renderer`, used before the first refresh.
    #[must_use]
    pub fn empty(renderer: &dyn Renderer) -> Self {
        Self::new(renderer.template_set())
    }

    /// Set the global data.
    #[must_use]
    pub fn with_global_data(mut self, data: Map<String, Value>) -> Self {
        self.global_data = data;
        self
    }

    /// Add a locale with its translation table.
    #[must_use]
    pub fn with_locale(mut self, locale: impl Into<String>, table: Value) -> Self {
        self.locale_data.insert(locale.into(), table);
        self
    }

    /// Add a collection definition.
    #[must_use]
    pub fn with_collection(mut self, definition: CollectionDefinition) -> Self {
        self.collections.insert(definition.name.clone(), definition);
        self
    }

    /// Attach load warnings.
    #[must_use]
    pub fn with_warnings(mut self, warnings: Vec<AssetLoadError>) -> Self {
        self.warnings = warnings;
        self
    }

    /// Compiled layouts, fragments and helpers.
    #[must_use]
    pub fn templates(&self) -> &dyn TemplateSet {
        self.templates.as_ref()
    }

    /// Data shared by every page.
    #[must_use]
    pub fn global_data(&self) -> &Map<String, Value> {
        &self.global_data
    }

    /// Locale names, sorted.
    #[must_use]
    pub fn locales(&self) -> Vec<&str> {
        self.locale_data.keys().map(String::as_str).collect()
    }

    /// Translation table for `locale`.
    #[must_use]
    pub fn locale_table(&self, locale: &str) -> Option<&Value> {
        self.locale_data.get(locale)
    }

    /// Collection definitions by name.
    #[must_use]
    pub fn collections(&self) -> &BTreeMap<String, CollectionDefinition> {
        &self.collections
    }

    /// Assets skipped while this context was loaded.
    #[must_use]
    pub fn warnings(&self) -> &[AssetLoadError] {
        &self.warnings
    }
}

#[cfg(test)]
mod tests {
    use folio_render::{HandlebarsRenderer, RenderOptions};
    use serde_json::json;

    use super::*;

    static_assertions::assert_impl_all!(RenderContext: Send, Sync);

    #[test]
    fn test_empty_context() {
        let renderer = HandlebarsRenderer::new(RenderOptions::default());
        let context = RenderContext::empty(&renderer);
        assert!(context.locales().is_empty());
        assert!(context.global_data().is_empty());
        assert!(!context.templates().has_layout("default"));
    }

    #[test]
    fn test_locales_sorted() {
        let renderer = HandlebarsRenderer::new(RenderOptions::default());
        let context = RenderContext::empty(&renderer)
            .with_locale("jp", json!({"hello": "konnichiwa"}))
            .with_locale("en", json!({"hello": "hello"}));
        assert_eq!(context.locales(), vec!["en", "jp"]);
        assert_eq!(context.locale_table("jp").unwrap()["hello"], json!("konnichiwa"));
        assert!(context.locale_table("fr").is_none());
    }
}
