//! Source and sink traits.

use crate::{OutputDocument, RawDocument, StorageError};

/// Discovers raw page documents.
pub trait Source: Send + Sync {
    /// Discover every page document.
    ///
    /// Documents are returned sorted by relative path.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError`] if the source as a whole cannot be read.
    /// Individual unreadable documents are skipped with a warning.
    fn scan(&self) -> Result<Vec<RawDocument>, StorageError>;
}

/// Receives finished pages.
pub trait Sink: Send + Sync {
    /// Write one page.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError`] if the page cannot be written.
    fn write(&self, document: &OutputDocument) -> Result<(), StorageError>;
}
