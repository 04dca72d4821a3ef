//! Turns raw documents into page records.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use folio_config::TransformFailure;
use folio_render::TRANSLATIONS_KEY;
use folio_storage::RawDocument;
use serde_json::{Map, Value};

use crate::context::RenderContext;
use crate::data::merge_maps;
use crate::error::PipelineError;
use crate::front_matter;
use crate::page::{
    PageOrigin, PageRecord, ParseErrorInfo, ParseErrorTag, extension_of, page_name, root_prefix, to_slash,
};
use crate::transform::TransformPipeline;

/// Layout used when nothing else selects one.
pub const DEFAULT_LAYOUT: &str = "default";

/// One document scheduled for parsing, already assigned a locale and output
/// path.
#[derive(Debug, Clone, PartialEq)]
pub struct PageSeed {
    /// Source document, shared between locale variants.
    pub document: Arc<RawDocument>,
    /// Locale tag.
    pub locale: Option<String>,
    /// Output path relative to the output root.
    pub output_path: PathBuf,
    /// Source or collection.
    pub origin: PageOrigin,
}

impl PageSeed {
    /// Seed that renders a document at its own relative path, untagged.
    #[must_use]
    pub fn untagged(document: Arc<RawDocument>) -> Self {
        Self {
            output_path: document.relative.clone(),
            document,
            locale: None,
            origin: PageOrigin::Source,
        }
    }
}

/// Parses front matter, resolves layouts and assembles page data.
#[derive(Debug, Clone)]
pub struct PageParser {
    page_layouts: BTreeMap<String, String>,
    transforms: TransformPipeline,
    policy: TransformFailure,
}

impl PageParser {
    /// Create a parser.
    ///
    /// `page_layouts` maps folders relative to the pages root to layout
    /// names.
    #[must_use]
    pub fn new(
        page_layouts: BTreeMap<String, String>,
        transforms: TransformPipeline,
        policy: TransformFailure,
    ) -> Self {
        Self {
            page_layouts,
            transforms,
            policy,
        }
    }

    /// Parse one seed against `context`.
    ///
    /// Bad front matter and failing "before" transforms produce a record
    /// with `parse_error` set rather than an error.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::Transform`] only when a transform fails under
    /// the `abort` policy.
    pub fn parse(&self, seed: &PageSeed, context: &RenderContext) -> Result<PageRecord, PipelineError> {
        let document = seed.document.as_ref();

        let (mut front_matter, mut body, mut parse_error) = match front_matter::parse(&document.contents) {
            Ok(parsed) => (parsed.attributes, parsed.body, None),
            Err(e) => {
                tracing::warn!(path = %document.path.display(), error = %e, "Invalid front matter");
                (
                    Map::new(),
                    String::new(),
                    Some(ParseErrorInfo {
                        tag: ParseErrorTag::MetadataSyntax,
                        message: e.to_string(),
                    }),
                )
            }
        };

        if parse_error.is_none() && seed.origin == PageOrigin::Source {
            let extension = extension_of(&document.path);
            match self.transforms.before(&extension, body) {
                Ok(transformed) => body = transformed,
                Err(source) if self.policy == TransformFailure::Abort => {
                    return Err(PipelineError::Transform {
                        path: document.path.clone(),
                        source,
                    });
                }
                Err(e) => {
                    tracing::warn!(path = %document.path.display(), error = %e, "Transform failed");
                    body = String::new();
                    parse_error = Some(ParseErrorInfo {
                        tag: ParseErrorTag::Transform,
                        message: e.to_string(),
                    });
                }
            }
        }
        if let Some(stripped) = body.strip_prefix('\u{feff}') {
            body = stripped.to_owned();
        }

        let layout = self.resolve_layout(&front_matter, document);
        let page = page_name(&seed.output_path);
        let root_prefix = root_prefix(&seed.output_path);

        let mut data = context.global_data().clone();
        merge_maps(&mut data, document.data.clone());
        merge_maps(&mut data, front_matter.clone());
        data.insert("page".to_owned(), Value::String(page.clone()));
        data.insert("layout".to_owned(), Value::String(layout.clone()));
        data.insert("rootPrefix".to_owned(), Value::String(root_prefix.clone()));
        if let Some(locale) = &seed.locale {
            data.insert("locale".to_owned(), Value::String(locale.clone()));
            if let Some(table) = context.locale_table(locale) {
                data.insert(TRANSLATIONS_KEY.to_owned(), table.clone());
            }
        }

        if seed.origin != PageOrigin::Source {
            // Collection entries expose their transform data as front matter.
            let mut entry = document.data.clone();
            merge_maps(&mut entry, std::mem::take(&mut front_matter));
            front_matter = entry;
        }

        Ok(PageRecord {
            source: document.path.clone(),
            output_path: seed.output_path.clone(),
            raw_body: body,
            front_matter,
            page,
            layout,
            root_prefix,
            locale: seed.locale.clone(),
            parse_error,
            data,
            origin: seed.origin.clone(),
        })
    }

    /// Front matter `layout`, then document data `layout`, then the most
    /// specific `page_layouts` folder, then [`DEFAULT_LAYOUT`].
    fn resolve_layout(&self, front_matter: &Map<String, Value>, document: &RawDocument) -> String {
        let explicit = |map: &Map<String, Value>| {
            map.get("layout")
                .and_then(Value::as_str)
                .filter(|s| !s.is_empty())
                .map(str::to_owned)
        };
        explicit(front_matter)
            .or_else(|| explicit(&document.data))
            .or_else(|| self.folder_layout(&document.relative))
            .unwrap_or_else(|| DEFAULT_LAYOUT.to_owned())
    }

    fn folder_layout(&self, relative: &Path) -> Option<String> {
        let folder = relative.parent().map(to_slash).unwrap_or_default();
        self.page_layouts
            .iter()
            .filter_map(|(key, layout)| {
                let key = key.trim_matches('/');
                let matches = key.is_empty()
                    || folder == key
                    || folder.strip_prefix(key).is_some_and(|rest| rest.starts_with('/'));
                matches.then(|| (key.split('/').filter(|s| !s.is_empty()).count(), layout))
            })
            .max_by_key(|(depth, _)| *depth)
            .map(|(_, layout)| layout.clone())
    }
}
