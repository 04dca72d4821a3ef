//! Explicit registry of helpers, transform steps and collection transforms.
//!
//! The embedding program populates a [`PluginRegistry`] at startup and hands
//! it to the [`Pipeline`](crate::Pipeline). Every refresh registers the
//! registry's helpers into the fresh template set, so helpers follow the
//! same replace-on-refresh rules as layouts and fragments.

use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;
use std::sync::Arc;

use folio_render::{HelperFn, markdown_to_html};
use serde_json::{Map, Value};

use crate::error::{CollectionError, StepError};
use crate::front_matter;

/// Content transform step: `(content, args) -> content`.
pub type TransformFn = Arc<dyn Fn(&str, &[Value]) -> Result<String, StepError> + Send + Sync>;

/// Collection transform: `(path, contents) -> entry`.
///
/// `contents` is `None` when the match is a directory or the collection
/// does not read source contents.
pub type CollectionFn =
    Arc<dyn Fn(&Path, Option<&str>) -> Result<CollectionEntry, CollectionError> + Send + Sync>;

/// One synthetic page produced by a collection transform.
#[derive(Debug, Clone, PartialEq)]
pub struct CollectionEntry {
    /// Output file name, relative to the collection output directory.
    pub name: String,
    /// Data merged into the page context.
    pub data: Map<String, Value>,
}

/// Named helpers, transform steps and collection transforms.
#[derive(Clone, Default)]
pub struct PluginRegistry {
    helpers: BTreeMap<String, HelperFn>,
    transforms: BTreeMap<String, TransformFn>,
    collections: BTreeMap<String, CollectionFn>,
}

impl fmt::Debug for PluginRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PluginRegistry")
            .field("helpers", &self.helpers.keys().collect::<Vec<_>>())
            .field("transforms", &self.transforms.keys().collect::<Vec<_>>())
            .field("collections", &self.collections.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl PluginRegistry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a registry with the built-in transform steps (`markdown`,
    /// `trim`, `replace`, `prepend`, `append`) and collection transforms
    /// (`markdown`, `file`).
    #[must_use]
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        registry.register_transform("markdown", Arc::new(|content, _| Ok(markdown_to_html(content))));
        registry.register_transform("trim", Arc::new(|content, _| Ok(content.trim().to_owned())));
        registry.register_transform("replace", Arc::new(replace_step));
        registry.register_transform(
            "prepend",
            Arc::new(|content, args| Ok(format!("{}{content}", string_arg(args, 0, "prepend")?))),
        );
        registry.register_transform(
            "append",
            Arc::new(|content, args| Ok(format!("{content}{}", string_arg(args, 0, "append")?))),
        );
        registry.register_collection_transform("markdown", Arc::new(markdown_entry));
        registry.register_collection_transform("file", Arc::new(file_entry));
        registry
    }

    /// Register a template helper, replacing any previous one with the same name.
    pub fn register_helper(&mut self, name: impl Into<String>, helper: HelperFn) {
        self.helpers.insert(name.into(), helper);
    }

    /// Builder form of [`register_helper`](Self::register_helper).
    #[must_use]
    pub fn with_helper(mut self, name: impl Into<String>, helper: HelperFn) -> Self {
        self.register_helper(name, helper);
        self
    }

    /// Register a transform step.
    pub fn register_transform(&mut self, name: impl Into<String>, step: TransformFn) {
        self.transforms.insert(name.into(), step);
    }

    /// Builder form of [`register_transform`](Self::register_transform).
    #[must_use]
    pub fn with_transform(mut self, name: impl Into<String>, step: TransformFn) -> Self {
        self.register_transform(name, step);
        self
    }

    /// Register a collection transform.
    pub fn register_collection_transform(&mut self, name: impl Into<String>, transform: CollectionFn) {
        self.collections.insert(name.into(), transform);
    }

    /// Builder form of [`register_collection_transform`](Self::register_collection_transform).
    #[must_use]
    pub fn with_collection_transform(mut self, name: impl Into<String>, transform: CollectionFn) -> Self {
        self.register_collection_transform(name, transform);
        self
    }

    /// Registered helpers, sorted by name.
    pub fn helpers(&self) -> impl Iterator<Item = (&str, &HelperFn)> {
        self.helpers.iter().map(|(name, helper)| (name.as_str(), helper))
    }

    /// Look up a transform step.
    #[must_use]
    pub fn transform(&self, name: &str) -> Option<&TransformFn> {
        self.transforms.get(name)
    }

    /// Look up a collection transform.
    #[must_use]
    pub fn collection_transform(&self, name: &str) -> Option<&CollectionFn> {
        self.collections.get(name)
    }
}

fn string_arg<'a>(args: &'a [Value], index: usize, step: &str) -> Result<&'a str, StepError> {
    args.get(index).and_then(Value::as_str).ok_or_else(|| {
        StepError::new(format!("{step} expects a string argument at position {}", index + 1))
    })
}

fn replace_step(content: &str, args: &[Value]) -> Result<String, StepError> {
    let from = string_arg(args, 0, "replace")?;
    let to = string_arg(args, 1, "replace")?;
    if from.is_empty() {
        return Err(StepError::new("replace pattern cannot be empty"));
    }
    Ok(content.replace(from, to))
}

fn file_name(path: &Path) -> Result<String, CollectionError> {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .ok_or_else(|| CollectionError::new(format!("{} has no file name", path.display())))
}

/// Front matter becomes the data, the rendered markdown body becomes `body`.
fn markdown_entry(path: &Path, contents: Option<&str>) -> Result<CollectionEntry, CollectionError> {
    let contents = contents
        .ok_or_else(|| CollectionError::new("markdown transform requires file contents"))?;
    let parsed = front_matter::parse(contents).map_err(|e| CollectionError::new(e.to_string()))?;
    let mut data = parsed.attributes;
    data.insert("body".to_owned(), Value::String(markdown_to_html(&parsed.body)));
    Ok(CollectionEntry {
        name: file_name(path)?,
        data,
    })
}

fn file_entry(path: &Path, contents: Option<&str>) -> Result<CollectionEntry, CollectionError> {
    let name = file_name(path)?;
    let mut data = Map::new();
    data.insert("path".to_owned(), Value::String(path.to_string_lossy().into_owned()));
    data.insert("name".to_owned(), Value::String(name.clone()));
    data.insert(
        "contents".to_owned(),
        contents.map_or(Value::Null, |c| Value::String(c.to_owned())),
    );
    Ok(CollectionEntry { name, data })
}
