//! Locale fan-out.

use std::path::{Component, PathBuf};
use std::sync::Arc;

use folio_storage::RawDocument;

use crate::page::PageOrigin;
use crate::parser::PageSeed;

/// Fans a source document out into one seed per locale.
#[derive(Debug, Clone, Default)]
pub struct LocaleExpander {
    default_locale: Option<String>,
}

impl LocaleExpander {
    /// Create an expander. Pages rendered for `default_locale` keep their
    /// output path; every other locale gets a leading path segment.
    #[must_use]
    pub fn new(default_locale: Option<String>) -> Self {
        Self { default_locale }
    }

    /// Expand `document` for `locales`.
    ///
    /// - No locales: one untagged seed at the document's own path.
    /// - Document inside a locale folder (`jp/about.html`): one seed tagged
    ///   with that locale, path unchanged.
    /// - Otherwise: one seed per locale.
    #[must_use]
    pub fn expand(&self, document: &Arc<RawDocument>, locales: &[&str]) -> Vec<PageSeed> {
        if locales.is_empty() {
            return vec![PageSeed::untagged(Arc::clone(document))];
        }

        if let Some(locale) = Self::folder_locale(document, locales) {
            return vec![PageSeed {
                document: Arc::clone(document),
                locale: Some(locale.to_owned()),
                output_path: document.relative.clone(),
                origin: PageOrigin::Source,
            }];
        }

        locales
            .iter()
            .map(|locale| {
                let output_path = if self.default_locale.as_deref() == Some(*locale) {
                    document.relative.clone()
                } else {
                    PathBuf::from(locale).join(&document.relative)
                };
                PageSeed {
                    document: Arc::clone(document),
                    locale: Some((*locale).to_owned()),
                    output_path,
                    origin: PageOrigin::Source,
                }
            })
            .collect()
    }

    /// Locale named by the first path segment, if the document has more than
    /// one segment.
    fn folder_locale<'a>(document: &RawDocument, locales: &[&'a str]) -> Option<&'a str> {
        let mut components = document.relative.components();
        let first = match components.next()? {
            Component::Normal(first) => first.to_str()?,
            _ => return None,
        };
        components.next()?;
        locales.iter().copied().find(|locale| *locale == first)
    }
}
