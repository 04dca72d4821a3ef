//! Filesystem source and sink.

use std::fs;
use std::path::{Component, Path, PathBuf};

use glob::MatchOptions;
use rayon::prelude::*;

use crate::{OutputDocument, RawDocument, Sink, Source, StorageError, StorageErrorKind, StorageOp};

const BACKEND: &str = "Fs";

/// Glob options shared by every filesystem walk: hidden entries are never
/// matched by wildcards.
const MATCH_OPTIONS: MatchOptions = MatchOptions {
    case_sensitive: true,
    require_literal_separator: false,
    require_literal_leading_dot: true,
};

/// Find entries (files and directories) matching `pattern` under `root`.
///
/// `pattern` is relative to `root`. Wildcards never match hidden entries.
/// Returns paths sorted, or an empty list when `root` does not exist.
///
/// # Errors
///
/// Returns [`StorageError`] with [`StorageErrorKind::InvalidPath`] if the
/// pattern is malformed or `root` is not valid UTF-8.
pub fn glob_entries(root: &Path, pattern: &str) -> Result<Vec<PathBuf>, StorageError> {
    if !root.exists() {
        return Ok(Vec::new());
    }
    let base = root.to_str().ok_or_else(|| {
        StorageError::new(StorageErrorKind::InvalidPath)
            .with_path(root)
            .with_backend(BACKEND)
    })?;
    let full = format!(
        "{}/{}",
        glob::Pattern::escape(base.trim_end_matches('/')),
        pattern.trim_start_matches('/')
    );
    let entries = glob::glob_with(&full, MATCH_OPTIONS).map_err(|e| {
        StorageError::new(StorageErrorKind::InvalidPath)
            .with_path(root)
            .with_backend(BACKEND)
            .with_source(e)
    })?;

    let mut paths: Vec<PathBuf> = entries
        .filter_map(|entry| match entry {
            Ok(path) => Some(path),
            Err(e) => {
                tracing::warn!(path = %e.path().display(), error = %e, "Skipping unreadable entry");
                None
            }
        })
        .collect();
    paths.sort();
    Ok(paths)
}

/// Discovers page documents under a root directory.
///
/// Every non-hidden file with an extension (`**/*.*`) is a page.
#[derive(Debug, Clone)]
pub struct FsSource {
    root: PathBuf,
}

impl FsSource {
    /// Create a source rooted at `root`.
    #[must_use]
    pub fn new(root: PathBuf) -> Self {
        Self { root }
    }

    /// Pages root directory.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn discover(&self) -> Result<Vec<PathBuf>, StorageError> {
        if !self.root.is_dir() {
            return Err(StorageError::not_found(&self.root)
                .during(StorageOp::Scan)
                .with_backend(BACKEND));
        }
        Ok(glob_entries(&self.root, "**/*.*")?
            .into_iter()
            .filter(|path| path.is_file())
            .collect())
    }

    fn read_document(&self, path: &Path) -> Result<RawDocument, StorageError> {
        let contents = fs::read_to_string(path)
            .map_err(|e| StorageError::io(e, path).during(StorageOp::Read).with_backend(BACKEND))?;
        let relative = path
            .strip_prefix(&self.root)
            .map_err(|_| {
                StorageError::new(StorageErrorKind::InvalidPath)
                    .during(StorageOp::Read)
                    .with_path(path)
                    .with_backend(BACKEND)
            })?
            .to_path_buf();
        Ok(RawDocument {
            path: path.to_path_buf(),
            relative,
            contents,
            data: serde_json::Map::new(),
        })
    }
}

impl Source for FsSource {
    fn scan(&self) -> Result<Vec<RawDocument>, StorageError> {
        let paths = self.discover()?;
        let results: Vec<Result<RawDocument, StorageError>> =
            paths.par_iter().map(|p| self.read_document(p)).collect();

        let mut documents = Vec::with_capacity(results.len());
        for result in results {
            match result {
                Ok(doc) => documents.push(doc),
                Err(e) => tracing::warn!(error = %e, "Skipping unreadable page"),
            }
        }
        documents.sort_by(|a, b| a.relative.cmp(&b.relative));
        Ok(documents)
    }
}

/// Writes pages under an output root, creating directories as needed.
#[derive(Debug, Clone)]
pub struct FsSink {
    root: PathBuf,
}

impl FsSink {
    /// Create a sink writing under `root`.
    #[must_use]
    pub fn new(root: PathBuf) -> Self {
        Self { root }
    }

    /// Output root directory.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }
}

/// Whether `path` stays inside the directory it is joined to.
fn is_contained(path: &Path) -> bool {
    path.components()
        .all(|c| matches!(c, Component::Normal(_) | Component::CurDir))
}

impl Sink for FsSink {
    fn write(&self, document: &OutputDocument) -> Result<(), StorageError> {
        if !is_contained(&document.path) {
            return Err(StorageError::new(StorageErrorKind::InvalidPath)
                .during(StorageOp::Write)
                .with_path(&document.path)
                .with_backend(BACKEND));
        }
        let target = self.root.join(&document.path);
        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent)
                .map_err(|e| StorageError::io(e, parent).during(StorageOp::Write).with_backend(BACKEND))?;
        }
        fs::write(&target, &document.contents)
            .map_err(|e| StorageError::io(e, &target).during(StorageOp::Write).with_backend(BACKEND))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn assert_send_sync<T: Send + Sync>() {}

    #[test]
    fn test_fs_types_are_send_sync() {
        assert_send_sync::<FsSource>();
        assert_send_sync::<FsSink>();
    }

    fn write(root: &Path, rel: &str, contents: &[u8]) {
        let path = root.join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, contents).unwrap();
    }

    #[test]
    fn test_scan_missing_root() {
        let source = FsSource::new(PathBuf::from("/nonexistent/pages"));
        let err = source.scan().unwrap_err();
        assert_eq!(err.kind, StorageErrorKind::NotFound);
    }

    #[test]
    fn test_scan_empty_root() {
        let temp = tempfile::tempdir().unwrap();
        let source = FsSource::new(temp.path().to_path_buf());
        assert!(source.scan().unwrap().is_empty());
    }

    #[test]
    fn test_scan_nested_sorted_and_skips_hidden() {
        let temp = tempfile::tempdir().unwrap();
        write(temp.path(), "index.html", b"home");
        write(temp.path(), "docs/b.md", b"b");
        write(temp.path(), "docs/a.md", b"a");
        write(temp.path(), ".hidden.html", b"x");
        write(temp.path(), ".git/config.txt", b"x");
        write(temp.path(), "README", b"no extension");

        let docs = FsSource::new(temp.path().to_path_buf()).scan().unwrap();
        let relative: Vec<_> = docs.iter().map(|d| d.relative.clone()).collect();
        assert_eq!(
            relative,
            vec![
                PathBuf::from("docs/a.md"),
                PathBuf::from("docs/b.md"),
                PathBuf::from("index.html"),
            ]
        );
        assert_eq!(docs[0].contents, "a");
        assert_eq!(docs[0].path, temp.path().join("docs/a.md"));
    }

    #[test]
    fn test_scan_skips_non_utf8() {
        let temp = tempfile::tempdir().unwrap();
        write(temp.path(), "ok.html", b"fine");
        write(temp.path(), "logo.png", &[0xff, 0xfe, 0x00, 0x80]);

        let docs = FsSource::new(temp.path().to_path_buf()).scan().unwrap();
        assert_eq!(docs.len(), 1);
        assert_eq!(docs[0].relative, PathBuf::from("ok.html"));
    }

    #[test]
    fn test_glob_entries_includes_directories() {
        let temp = tempfile::tempdir().unwrap();
        write(temp.path(), "posts/a.md", b"a");
        write(temp.path(), "posts/drafts/b.md", b"b");
        write(temp.path(), "posts/.c.md", b"c");

        let entries = glob_entries(temp.path(), "posts/*").unwrap();
        assert_eq!(
            entries,
            vec![temp.path().join("posts/a.md"), temp.path().join("posts/drafts")]
        );
        assert!(glob_entries(&temp.path().join("missing"), "*").unwrap().is_empty());
    }

    #[test]
    fn test_sink_creates_directories() {
        let temp = tempfile::tempdir().unwrap();
        let sink = FsSink::new(temp.path().join("dist"));
        sink.write(&OutputDocument {
            path: PathBuf::from("jp/about.html"),
            contents: "<p>hi</p>".to_owned(),
        })
        .unwrap();
        assert_eq!(
            fs::read_to_string(temp.path().join("dist/jp/about.html")).unwrap(),
            "<p>hi</p>"
        );
    }

    #[test]
    fn test_sink_rejects_escaping_paths() {
        let temp = tempfile::tempdir().unwrap();
        let sink = FsSink::new(temp.path().to_path_buf());
        let err = sink
            .write(&OutputDocument {
                path: PathBuf::from("../outside.html"),
                contents: String::new(),
            })
            .unwrap_err();
        assert_eq!(err.kind, StorageErrorKind::InvalidPath);
    }
}
