//! Collections: synthetic pages generated from non-page files.
//!
//! Each directory under the collections root defines one collection:
//!
//! ```text
//! collections/blog/
//! ├── collection.toml   # input = "posts/*.md", output = "blog"
//! └── template.html     # page template shared by every entry
//! ```
//!
//! Every entry matching `input` (relative to the project input root) is
//! passed to the named collection transform, which returns the entry's
//! output name and data. The template then renders once per entry.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::Deserialize;

use crate::context::RenderContext;
use crate::error::{AssetKind, AssetLoadError};
use crate::page::{PageOrigin, page_name};
use crate::parser::PageSeed;
use crate::plugin::PluginRegistry;
use folio_storage::{RawDocument, glob_entries};

/// Definition file names, in lookup order.
const DEFINITION_FILES: &[&str] = &["collection.toml", "collection.yml", "collection.yaml"];

/// A loaded collection definition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CollectionDefinition {
    /// Collection name (its directory name).
    pub name: String,
    /// Glob pattern relative to the project input root.
    pub input: String,
    /// Output directory relative to the output root.
    pub output_dir: PathBuf,
    /// Registered collection transform name.
    pub transform: String,
    /// Page template contents.
    pub template: String,
    /// Whether matched files are read and passed to the transform.
    pub read_source_contents: bool,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct DefinitionFile {
    input: String,
    output: String,
    #[serde(default = "default_read")]
    read: bool,
    #[serde(default = "default_transform")]
    transform: String,
}

fn default_read() -> bool {
    true
}

fn default_transform() -> String {
    "markdown".to_owned()
}

impl CollectionDefinition {
    /// Load the collection defined in `dir`.
    fn load(dir: &Path) -> Result<Self, AssetLoadError> {
        let fail = |path: &Path, message: String| AssetLoadError::new(AssetKind::Collection, path, message);

        let definition_path = DEFINITION_FILES
            .iter()
            .map(|name| dir.join(name))
            .find(|path| path.is_file())
            .ok_or_else(|| fail(dir, "missing collection.toml".to_owned()))?;
        let content = fs::read_to_string(&definition_path)
            .map_err(|e| fail(&definition_path, e.to_string()))?;
        let raw: DefinitionFile = if definition_path.extension().is_some_and(|e| e == "toml") {
            toml::from_str(&content).map_err(|e| fail(&definition_path, e.to_string()))?
        } else {
            serde_yaml::from_str(&content).map_err(|e| fail(&definition_path, e.to_string()))?
        };
        if raw.input.trim().is_empty() {
            return Err(fail(&definition_path, "input cannot be empty".to_owned()));
        }

        let template_path = glob_entries(dir, "template.*")
            .map_err(|e| fail(dir, e.to_string()))?
            .into_iter()
            .find(|path| path.is_file())
            .ok_or_else(|| fail(dir, "missing template file".to_owned()))?;
        let template = fs::read_to_string(&template_path)
            .map_err(|e| fail(&template_path, e.to_string()))?;

        Ok(Self {
            name: dir
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default(),
            input: raw.input,
            output_dir: PathBuf::from(raw.output.trim_matches('/')),
            transform: raw.transform,
            template,
            read_source_contents: raw.read,
        })
    }
}

/// Load every collection definition under `root`.
pub(crate) fn load_definitions(
    root: &Path,
) -> (BTreeMap<String, CollectionDefinition>, Vec<AssetLoadError>) {
    let mut definitions = BTreeMap::new();
    let mut warnings = Vec::new();

    let dirs = match glob_entries(root, "*") {
        Ok(entries) => entries,
        Err(e) => {
            warnings.push(AssetLoadError::new(AssetKind::Collection, root, e));
            return (definitions, warnings);
        }
    };

    for dir in dirs.iter().filter(|p| p.is_dir()) {
        match CollectionDefinition::load(dir) {
            Ok(definition) => {
                definitions.insert(definition.name.clone(), definition);
            }
            Err(e) => warnings.push(e),
        }
    }
    (definitions, warnings)
}

/// Synthesizes page seeds from the collection definitions of a context.
#[derive(Debug, Clone)]
pub struct CollectionBuilder {
    input_root: PathBuf,
    registry: PluginRegistry,
}

impl CollectionBuilder {
    /// Create a builder matching collection inputs under `input_root`.
    #[must_use]
    pub fn new(input_root: PathBuf, registry: PluginRegistry) -> Self {
        Self { input_root, registry }
    }

    /// Generate seeds for every entry of every collection.
    ///
    /// Each seed carries the collection template as its contents and the
    /// transform's data as document data. Unknown transforms, failing
    /// transforms and unreadable entries are skipped with a warning.
    #[must_use]
    pub fn build(&self, context: &RenderContext) -> Vec<PageSeed> {
        context
            .collections()
            .values()
            .flat_map(|definition| self.build_collection(definition))
            .collect()
    }

    fn build_collection(&self, definition: &CollectionDefinition) -> Vec<PageSeed> {
        let Some(transform) = self.registry.collection_transform(&definition.transform) else {
            tracing::warn!(
                collection = %definition.name,
                transform = %definition.transform,
                "Unknown collection transform, skipping collection"
            );
            return Vec::new();
        };

        let matches = match glob_entries(&self.input_root, &definition.input) {
            Ok(matches) => matches,
            Err(e) => {
                tracing::warn!(collection = %definition.name, error = %e, "Invalid collection input");
                return Vec::new();
            }
        };

        let mut seeds = Vec::with_capacity(matches.len());
        for path in matches {
            let contents = if definition.read_source_contents && path.is_file() {
                match fs::read_to_string(&path) {
                    Ok(contents) => Some(contents),
                    Err(e) => {
                        tracing::warn!(path = %path.display(), error = %e, "Skipping unreadable collection entry");
                        continue;
                    }
                }
            } else {
                None
            };

            let entry = match transform(&path, contents.as_deref()) {
                Ok(entry) => entry,
                Err(e) => {
                    tracing::warn!(
                        collection = %definition.name,
                        path = %path.display(),
                        error = %e,
                        "Collection transform failed, skipping entry"
                    );
                    continue;
                }
            };

            let output_path = definition.output_dir.join(&entry.name);
            let document = RawDocument {
                path: path.clone(),
                relative: output_path.clone(),
                contents: definition.template.clone(),
                data: entry.data,
            };
            tracing::debug!(
                collection = %definition.name,
                page = %page_name(&output_path),
                "Generated collection page"
            );
            seeds.push(PageSeed {
                document: Arc::new(document),
                locale: None,
                output_path,
                origin: PageOrigin::Collection(definition.name.clone()),
            });
        }
        seeds
    }
}
