//! Storage error type.

use std::fmt;
use std::io;
use std::path::PathBuf;

/// What went wrong, independent of backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum StorageErrorKind {
    /// Resource does not exist.
    NotFound,
    /// Permission denied.
    PermissionDenied,
    /// Path escapes its root or is not representable.
    InvalidPath,
    /// Content is not valid UTF-8.
    InvalidEncoding,
    /// File watching could not be started.
    Watch,
    /// Anything else.
    Other,
}

impl StorageErrorKind {
    fn as_str(self) -> &'static str {
        match self {
            Self::NotFound => "not found",
            Self::PermissionDenied => "permission denied",
            Self::InvalidPath => "invalid path",
            Self::InvalidEncoding => "invalid encoding",
            Self::Watch => "watch failed",
            Self::Other => "error",
        }
    }
}

impl From<io::ErrorKind> for StorageErrorKind {
    fn from(kind: io::ErrorKind) -> Self {
        match kind {
            io::ErrorKind::NotFound => Self::NotFound,
            io::ErrorKind::PermissionDenied => Self::PermissionDenied,
            io::ErrorKind::InvalidData => Self::InvalidEncoding,
            _ => Self::Other,
        }
    }
}

/// Operation a storage error happened during.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageOp {
    /// Listing a source root.
    Scan,
    /// Reading one page.
    Read,
    /// Writing one output page.
    Write,
    /// Starting a file watcher.
    Watch,
}

impl fmt::Display for StorageOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Scan => "scan",
            Self::Read => "read",
            Self::Write => "write",
            Self::Watch => "watch",
        })
    }
}

/// Error raised by page sources, sinks and watchers.
///
/// Built up with the `with_*` methods:
///
/// ```
/// use folio_storage::{StorageError, StorageErrorKind, StorageOp};
///
/// let err = StorageError::new(StorageErrorKind::InvalidPath)
///     .during(StorageOp::Write)
///     .with_path("../escape.html")
///     .with_backend("Fs");
/// assert_eq!(err.to_string(), "[Fs] write: invalid path (path: ../escape.html)");
/// ```
#[derive(Debug)]
pub struct StorageError {
    /// Error category.
    pub kind: StorageErrorKind,
    /// Failing operation, when known.
    pub op: Option<StorageOp>,
    /// Path context.
    pub path: Option<PathBuf>,
    /// Backend name ("Fs", "Memory").
    pub backend: Option<&'static str>,
    source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

impl StorageError {
    #[must_use]
    pub fn new(kind: StorageErrorKind) -> Self {
        Self {
            kind,
            op: None,
            path: None,
            backend: None,
            source: None,
        }
    }

    /// Record the failing operation.
    #[must_use]
    pub fn during(mut self, op: StorageOp) -> Self {
        self.op = Some(op);
        self
    }

    #[must_use]
    pub fn with_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.path = Some(path.into());
        self
    }

    #[must_use]
    pub fn with_backend(mut self, backend: &'static str) -> Self {
        self.backend = Some(backend);
        self
    }

    #[must_use]
    pub fn with_source(mut self, source: impl std::error::Error + Send + Sync + 'static) -> Self {
        self.source = Some(Box::new(source));
        self
    }

    /// Missing root or page.
    #[must_use]
    pub fn not_found(path: impl Into<PathBuf>) -> Self {
        Self::new(StorageErrorKind::NotFound).with_path(path)
    }

    /// Wrap an I/O failure on `path`, deriving the kind from the I/O kind.
    #[must_use]
    pub fn io(err: io::Error, path: impl Into<PathBuf>) -> Self {
        Self::new(err.kind().into()).with_path(path).with_source(err)
    }
}

impl fmt::Display for StorageError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(backend) = self.backend {
            write!(f, "[{backend}] ")?;
        }
        if let Some(op) = self.op {
            write!(f, "{op}: ")?;
        }
        f.write_str(self.kind.as_str())?;
        if let Some(source) = &self.source {
            write!(f, ": {source}")?;
        }
        if let Some(path) = &self.path {
            write!(f, " (path: {})", path.display())?;
        }
        Ok(())
    }
}

impl std::error::Error for StorageError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.source
            .as_ref()
            .map(|s| s.as_ref() as &(dyn std::error::Error + 'static))
    }
}
