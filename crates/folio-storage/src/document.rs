//! Documents flowing in and out of a build pass.

use std::path::PathBuf;

use serde_json::{Map, Value};

/// A source document as discovered, before front matter is parsed.
#[derive(Debug, Clone, PartialEq)]
pub struct RawDocument {
    /// Identity path (usually the absolute file path).
    pub path: PathBuf,
    /// Path relative to the pages root (e.g. `docs/intro.md`).
    pub relative: PathBuf,
    /// Full file contents.
    pub contents: String,
    /// Data attached by the source, merged under the front matter.
    pub data: Map<String, Value>,
}

impl RawDocument {
    /// Create a document whose identity path is its relative path.
    pub fn new(relative: impl Into<PathBuf>, contents: impl Into<String>) -> Self {
        let relative = relative.into();
        Self {
            path: relative.clone(),
            relative,
            contents: contents.into(),
            data: Map::new(),
        }
    }

    /// Attach source data.
    #[must_use]
    pub fn with_data(mut self, data: Map<String, Value>) -> Self {
        self.data = data;
        self
    }
}

/// Message sent by a source to a build pass.
///
/// A source sends every document and then exactly one
/// [`Exhausted`](SourceEvent::Exhausted). Closing the channel without it is
/// treated the same way.
#[derive(Debug, Clone, PartialEq)]
pub enum SourceEvent {
    /// One discovered document.
    Document(RawDocument),
    /// No more documents will follow.
    Exhausted,
}

/// A finished page ready to be written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputDocument {
    /// Path relative to the output root (e.g. `jp/about.html`).
    pub path: PathBuf,
    /// Rendered contents.
    pub contents: String,
}
