//! Building render contexts from supporting directories.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use folio_config::PathsConfig;
use folio_render::{Capability, Renderer, TemplateSet};
use rayon::prelude::*;
use serde_json::Value;

use crate::collection::load_definitions;
use crate::context::RenderContext;
use crate::data::{is_data_file, load_data_dir, load_tree, parse_data_file};
use crate::error::{AssetKind, AssetLoadError};
use crate::page::{extension_of, page_name, to_slash};
use crate::plugin::PluginRegistry;

/// Convert Duration to milliseconds as f64.
pub(crate) fn elapsed_ms(start: Instant) -> f64 {
    start.elapsed().as_secs_f64() * 1000.0
}

/// Produces a complete render context.
///
/// Called on a blocking thread by the refresher. Implementations never fail:
/// unusable assets are skipped and recorded in
/// [`RenderContext::warnings`].
pub trait ContextLoader: Send + Sync {
    /// Build a fresh context.
    fn load(&self) -> RenderContext;
}

/// Loads layouts, fragments, data, locales and collections from disk.
pub struct FsContextLoader {
    paths: PathsConfig,
    renderer: Arc<dyn Renderer>,
    plugins: PluginRegistry,
}

impl FsContextLoader {
    /// Create a loader for the project described by `paths`.
    #[must_use]
    pub fn new(paths: PathsConfig, renderer: Arc<dyn Renderer>, plugins: PluginRegistry) -> Self {
        Self {
            paths,
            renderer,
            plugins,
        }
    }

    /// Layout and fragment files under `root`, sorted.
    fn template_files(&self, root: &Path, kind: AssetKind, warnings: &mut Vec<AssetLoadError>) -> Vec<PathBuf> {
        let extensions = self.renderer.template_extensions();
        match folio_storage::glob_entries(root, "**/*.*") {
            Ok(entries) => entries
                .into_iter()
                .filter(|p| p.is_file() && extensions.contains(&extension_of(p).as_str()))
                .collect(),
            Err(e) => {
                warnings.push(AssetLoadError::new(kind, root, e));
                Vec::new()
            }
        }
    }

    /// Read template files in parallel, keyed by template name.
    fn read_templates(
        &self,
        root: &Path,
        kind: AssetKind,
        name_of: fn(&Path, &Path) -> String,
        warnings: &mut Vec<AssetLoadError>,
    ) -> Vec<(String, PathBuf, String)> {
        let files = self.template_files(root, kind, warnings);
        let results: Vec<_> = files
            .par_iter()
            .map(|path| (path, fs::read_to_string(path)))
            .collect();

        let mut sources = Vec::with_capacity(results.len());
        for (path, result) in results {
            match result {
                Ok(source) => sources.push((name_of(root, path), path.clone(), source)),
                Err(e) => warnings.push(AssetLoadError::new(kind, path, e)),
            }
        }
        sources
    }

    fn load_layouts(&self, templates: &mut dyn TemplateSet, warnings: &mut Vec<AssetLoadError>) {
        let sources = self.read_templates(&self.paths.layouts, AssetKind::Layout, |_, p| page_name(p), warnings);
        for (name, path, source) in sources {
            if let Err(e) = templates.add_layout(&name, &source) {
                warnings.push(AssetLoadError::new(AssetKind::Layout, path, e));
            }
        }
    }

    fn load_fragments(&self, templates: &mut dyn TemplateSet, warnings: &mut Vec<AssetLoadError>) {
        let sources = self.read_templates(&self.paths.partials, AssetKind::Fragment, fragment_name, warnings);
        for (name, path, source) in sources {
            templates.remove_fragment(&name);
            if let Err(e) = templates.add_fragment(&name, &source) {
                warnings.push(AssetLoadError::new(AssetKind::Fragment, path, e));
            }
        }
    }

    fn load_helpers(&self, templates: &mut dyn TemplateSet, warnings: &mut Vec<AssetLoadError>) {
        for (name, helper) in self.plugins.helpers() {
            templates.remove_helper(name);
            if let Err(e) = templates.add_helper(name, Arc::clone(helper)) {
                warnings.push(AssetLoadError::new(AssetKind::Helper, name, e));
            }
        }
    }

    /// Children of the locales root: directories become nested trees, data
    /// files their parsed contents.
    fn load_locales(&self, warnings: &mut Vec<AssetLoadError>) -> Vec<(String, Value)> {
        let root = &self.paths.locales;
        let children = match folio_storage::glob_entries(root, "*") {
            Ok(children) => children,
            Err(e) => {
                warnings.push(AssetLoadError::new(AssetKind::Locale, root, e));
                return Vec::new();
            }
        };

        let mut locales = Vec::new();
        for child in children {
            if child.is_dir() {
                let tree = load_tree(&child, AssetKind::Locale, warnings);
                locales.push((page_name(&child), Value::Object(tree)));
            } else if is_data_file(&child) {
                match parse_data_file(&child) {
                    Ok(value) => locales.push((page_name(&child), value)),
                    Err(message) => warnings.push(AssetLoadError::new(AssetKind::Locale, &child, message)),
                }
            }
        }
        locales
    }
}

/// Fragment name: path relative to the root, without extension.
fn fragment_name(root: &Path, path: &Path) -> String {
    let relative = path.strip_prefix(root).unwrap_or(path);
    to_slash(&relative.with_extension(""))
}

impl ContextLoader for FsContextLoader {
    fn load(&self) -> RenderContext {
        let start = Instant::now();
        let mut templates = self.renderer.template_set();
        let mut warnings = Vec::new();

        if self.renderer.supports(Capability::Layouts) {
            self.load_layouts(templates.as_mut(), &mut warnings);
        }
        if self.renderer.supports(Capability::Fragments) {
            self.load_fragments(templates.as_mut(), &mut warnings);
        }
        if self.renderer.supports(Capability::Helpers) {
            self.load_helpers(templates.as_mut(), &mut warnings);
        }

        let (global_data, data_warnings) = load_data_dir(&self.paths.data);
        warnings.extend(data_warnings);
        let locales = self.load_locales(&mut warnings);
        let (collections, collection_warnings) = load_definitions(&self.paths.collections);
        warnings.extend(collection_warnings);

        for warning in &warnings {
            tracing::warn!(kind = %warning.kind, path = %warning.path.display(), error = %warning.message, "Skipped asset");
        }

        let mut context = RenderContext::new(templates).with_global_data(global_data);
        for (locale, table) in locales {
            context = context.with_locale(locale, table);
        }
        for definition in collections.into_values() {
            context = context.with_collection(definition);
        }
        let context = context.with_warnings(warnings);

        tracing::info!(
            layouts = context.templates().layout_names().len(),
            fragments = context.templates().fragment_names().len(),
            locales = context.locales().len(),
            collections = context.collections().len(),
            warnings = context.warnings().len(),
            elapsed_ms = elapsed_ms(start),
            "Render context loaded"
        );
        context
    }
}

#[cfg(test)]
mod tests {
    use folio_render::{HandlebarsRenderer, RawRenderer, RenderInput, RenderOptions};
    use pretty_assertions::assert_eq;
    use serde_json::json;

    use super::*;

    static_assertions::assert_impl_all!(FsContextLoader: Send, Sync);

    fn write(root: &Path, rel: &str, contents: &str) {
        let path = root.join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, contents).unwrap();
    }

    fn paths(root: &Path) -> PathsConfig {
        let input = root.join("src");
        PathsConfig {
            pages: input.join("pages"),
            layouts: input.join("layouts"),
            partials: input.join("partials"),
            data: input.join("data"),
            locales: input.join("locales"),
            collections: input.join("collections"),
            output: root.join("dist"),
            input,
        }
    }

    fn project() -> tempfile::TempDir {
        let temp = tempfile::tempdir().unwrap();
        let src = temp.path().join("src");
        write(&src, "layouts/default.html", "<main>{{> nav}}{{body}}</main>");
        write(&src, "layouts/post.hbs", "<article>{{body}}</article>");
        write(&src, "layouts/notes.txt", "ignored");
        write(&src, "layouts/broken.html", "{{#if}}");
        write(&src, "partials/nav.html", "<nav>{{site.title}}</nav>");
        write(&src, "partials/blocks/card.html", "<div>card</div>");
        write(&src, "data/data.yml", "site:\n  title: Folio\n");
        write(&src, "data/nav.json", "[\"home\"]");
        write(&src, "locales/en.yml", "hello: Hello");
        write(&src, "locales/jp/common.yml", "hello: Konnichiwa");
        write(&src, "collections/blog/collection.toml", "input = \"posts/*.md\"\noutput = \"blog\"\n");
        write(&src, "collections/blog/template.html", "{{{body}}}");
        temp
    }

    #[test]
    fn test_load_full_project() {
        let temp = project();
        let renderer: Arc<dyn Renderer> = Arc::new(HandlebarsRenderer::new(RenderOptions::default()));
        let plugins = PluginRegistry::new().with_helper("shout", Arc::new(|args, _| {
            Ok(json!(args.first().and_then(Value::as_str).unwrap_or_default().to_uppercase()))
        }));
        let context = FsContextLoader::new(paths(temp.path()), renderer, plugins).load();

        assert_eq!(context.templates().layout_names(), vec!["default", "post"]);
        assert_eq!(context.templates().fragment_names(), vec!["blocks/card", "nav"]);
        assert!(context.templates().helper_names().contains(&"shout".to_owned()));
        assert_eq!(context.global_data()["site"], json!({"title": "Folio"}));
        assert_eq!(context.global_data()["nav"], json!(["home"]));
        assert_eq!(context.locales(), vec!["en", "jp"]);
        assert_eq!(context.locale_table("jp").unwrap(), &json!({"common": {"hello": "Konnichiwa"}}));
        assert_eq!(context.collections().keys().collect::<Vec<_>>(), vec!["blog"]);

        assert_eq!(context.warnings().len(), 1);
        assert_eq!(context.warnings()[0].kind, AssetKind::Layout);
        assert!(context.warnings()[0].path.ends_with("broken.html"));

        let data = json!({"site": {"title": "Folio"}});
        let html = context.templates().render(&RenderInput {
            body: "{{shout \"hi\"}}",
            layout: "default",
            data: &data,
            source: "index.html",
        });
        assert_eq!(html, "<main><nav>Folio</nav>HI</main>");
    }

    #[test]
    fn test_capabilities_limit_loading() {
        let temp = project();
        let context = FsContextLoader::new(paths(temp.path()), Arc::new(RawRenderer), PluginRegistry::new()).load();
        assert!(context.templates().layout_names().is_empty());
        assert!(context.templates().fragment_names().is_empty());
        assert!(context.warnings().is_empty());
        assert_eq!(context.global_data()["site"], json!({"title": "Folio"}));
    }

    #[test]
    fn test_missing_directories_load_empty() {
        let temp = tempfile::tempdir().unwrap();
        let renderer: Arc<dyn Renderer> = Arc::new(HandlebarsRenderer::new(RenderOptions::default()));
        let context = FsContextLoader::new(paths(temp.path()), renderer, PluginRegistry::new()).load();
        assert!(context.templates().layout_names().is_empty());
        assert!(context.locales().is_empty());
        assert!(context.collections().is_empty());
        assert!(context.warnings().is_empty());
    }
}
