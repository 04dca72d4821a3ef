//! Page records and path helpers.

use std::path::{Path, PathBuf};

use serde_json::{Map, Value};

/// Why a page could not be parsed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParseErrorTag {
    /// Front matter is not valid YAML or not a mapping.
    MetadataSyntax,
    /// A "before" transform failed.
    Transform,
}

impl ParseErrorTag {
    /// Stable tag string.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::MetadataSyntax => "metadata-syntax-error",
            Self::Transform => "transform-error",
        }
    }
}

/// Parse failure recorded on a page; the page renders as an error document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseErrorInfo {
    /// Failure category.
    pub tag: ParseErrorTag,
    /// Human-readable message.
    pub message: String,
}

/// Where a page record came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PageOrigin {
    /// A document discovered by the source.
    Source,
    /// Synthesized by the named collection.
    Collection(String),
}

/// One unit of build work.
#[derive(Debug, Clone, PartialEq)]
pub struct PageRecord {
    /// Identity path of the source document (or collection entry).
    pub source: PathBuf,
    /// Output path relative to the output root, before extension normalization.
    pub output_path: PathBuf,
    /// Body template (front matter removed, "before" transforms applied).
    pub raw_body: String,
    /// Front matter attributes (or collection entry data).
    pub front_matter: Map<String, Value>,
    /// Base name without extension.
    pub page: String,
    /// Resolved layout name. Never empty.
    pub layout: String,
    /// Relative path from the page to the output root (`""`, `"../"`, ...).
    pub root_prefix: String,
    /// Locale tag, when locales are configured.
    pub locale: Option<String>,
    /// Parse failure, if any.
    pub parse_error: Option<ParseErrorInfo>,
    /// Assembled data context.
    pub data: Map<String, Value>,
    /// Source or collection.
    pub origin: PageOrigin,
}

impl PageRecord {
    /// File extension of the source (lowercase, without dot).
    #[must_use]
    pub fn source_extension(&self) -> String {
        extension_of(&self.source)
    }
}

/// Lowercase extension without the leading dot, or `""`.
pub(crate) fn extension_of(path: &Path) -> String {
    path.extension()
        .map(|e| e.to_string_lossy().to_ascii_lowercase())
        .unwrap_or_default()
}

/// File stem as a string.
pub(crate) fn page_name(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default()
}

/// Replace the extension of an output path with the canonical one.
pub(crate) fn with_output_extension(path: &Path, extension: &str) -> PathBuf {
    path.with_extension(extension)
}

/// Slash-separated form of a relative path.
pub(crate) fn to_slash(path: &Path) -> String {
    path.components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}

/// Relative path from an output file back to the output root.
///
/// `index.html` gives `""`, `docs/a.html` gives `"../"`.
pub(crate) fn root_prefix(output_path: &Path) -> String {
    let depth = output_path.components().count().saturating_sub(1);
    "../".repeat(depth)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_root_prefix_depths() {
        assert_eq!(root_prefix(Path::new("index.html")), "");
        assert_eq!(root_prefix(Path::new("jp/about.html")), "../");
        assert_eq!(root_prefix(Path::new("a/b/c.html")), "../../");
    }

    #[test]
    fn test_output_extension() {
        assert_eq!(
            with_output_extension(Path::new("docs/intro.md"), "html"),
            PathBuf::from("docs/intro.html")
        );
        assert_eq!(
            with_output_extension(Path::new("blog/hello"), "html"),
            PathBuf::from("blog/hello.html")
        );
    }

    #[test]
    fn test_page_name_and_extension() {
        assert_eq!(page_name(Path::new("docs/intro.md")), "intro");
        assert_eq!(extension_of(Path::new("docs/INTRO.MD")), "md");
        assert_eq!(extension_of(Path::new("README")), "");
    }

    #[test]
    fn test_to_slash() {
        assert_eq!(to_slash(Path::new("jp/docs/a.html")), "jp/docs/a.html");
    }

    #[test]
    fn test_parse_error_tags() {
        assert_eq!(ParseErrorTag::MetadataSyntax.as_str(), "metadata-syntax-error");
        assert_eq!(ParseErrorTag::Transform.as_str(), "transform-error");
    }
}
