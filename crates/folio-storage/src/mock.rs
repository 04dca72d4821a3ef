//! In-memory source and sink for testing.

use std::collections::{BTreeMap, BTreeSet};
use std::path::PathBuf;
use std::sync::RwLock;

use crate::{OutputDocument, RawDocument, Sink, Source, StorageError, StorageErrorKind, StorageOp};

const BACKEND: &str = "Memory";

/// Source serving documents from memory.
///
/// # Example
///
/// ```ignore
/// use folio_storage::{MemorySource, Source};
///
/// let source = MemorySource::new()
///     .with_document("index.html", "<p>home</p>")
///     .with_document("about.html", "<p>about</p>");
/// assert_eq!(source.scan()?.len(), 2);
/// ```
#[derive(Debug, Default)]
pub struct MemorySource {
    documents: RwLock<BTreeMap<PathBuf, RawDocument>>,
}

impl MemorySource {
    /// Create an empty source.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a document at a path relative to the pages root.
    ///
    /// # Panics
    ///
    /// Panics if the internal lock is poisoned.
    #[must_use]
    pub fn with_document(self, relative: impl Into<PathBuf>, contents: impl Into<String>) -> Self {
        self.add(RawDocument::new(relative, contents));
        self
    }

    /// Add or replace a document.
    ///
    /// # Panics
    ///
    /// Panics if the internal lock is poisoned.
    pub fn add(&self, document: RawDocument) {
        self.documents
            .write()
            .unwrap()
            .insert(document.relative.clone(), document);
    }
}

impl Source for MemorySource {
    fn scan(&self) -> Result<Vec<RawDocument>, StorageError> {
        Ok(self.documents.read().unwrap().values().cloned().collect())
    }
}

/// Sink collecting pages in memory.
#[derive(Debug, Default)]
pub struct MemorySink {
    written: RwLock<BTreeMap<PathBuf, String>>,
    failing: RwLock<BTreeSet<PathBuf>>,
}

impl MemorySink {
    /// Create an empty sink.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Make writes to `path` fail.
    ///
    /// # Panics
    ///
    /// Panics if the internal lock is poisoned.
    #[must_use]
    pub fn failing_on(self, path: impl Into<PathBuf>) -> Self {
        self.failing.write().unwrap().insert(path.into());
        self
    }

    /// Contents written to `path`, if any.
    ///
    /// # Panics
    ///
    /// Panics if the internal lock is poisoned.
    #[must_use]
    pub fn get(&self, path: &str) -> Option<String> {
        self.written.read().unwrap().get(&PathBuf::from(path)).cloned()
    }

    /// All written paths, sorted.
    ///
    /// # Panics
    ///
    /// Panics if the internal lock is poisoned.
    #[must_use]
    pub fn paths(&self) -> Vec<PathBuf> {
        self.written.read().unwrap().keys().cloned().collect()
    }

    /// Number of written pages.
    ///
    /// # Panics
    ///
    /// Panics if the internal lock is poisoned.
    #[must_use]
    pub fn len(&self) -> usize {
        self.written.read().unwrap().len()
    }

    /// Whether nothing has been written.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Sink for MemorySink {
    fn write(&self, document: &OutputDocument) -> Result<(), StorageError> {
        if self.failing.read().unwrap().contains(&document.path) {
            return Err(StorageError::new(StorageErrorKind::PermissionDenied)
                .during(StorageOp::Write)
                .with_path(&document.path)
                .with_backend(BACKEND));
        }
        self.written
            .write()
            .unwrap()
            .insert(document.path.clone(), document.contents.clone());
        Ok(())
    }
}
