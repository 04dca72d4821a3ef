//! Build phase: render every page of a pass concurrently.

use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use folio_config::TransformFailure;
use folio_render::{RenderInput, contains_error_marker};
use folio_storage::{OutputDocument, Sink};
use serde_json::{Map, Value};
use tokio::task::JoinSet;

use crate::context::RenderContext;
use crate::error::PipelineError;
use crate::loader::elapsed_ms;
use crate::page::{PageOrigin, PageRecord, to_slash, with_output_extension};
use crate::transform::TransformPipeline;

/// Result of one build pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BuildSummary {
    /// Pages processed.
    pub page_count: usize,
    /// Pages whose output carries the error marker.
    pub error_count: usize,
    /// Pages the sink failed to write.
    pub failed_writes: usize,
}

/// Where a build pass is.
#[derive(Debug)]
enum PassState {
    /// Accepting parsed records.
    Collecting(Vec<PageRecord>),
    /// Records handed to the builder.
    Building,
    /// Summary produced.
    Done,
}

/// Parse-to-build barrier for one pass.
///
/// Records are collected until [`start_building`](Self::start_building) is
/// called, which happens exactly once.
#[derive(Debug)]
pub struct BuildPass {
    state: PassState,
}

impl Default for BuildPass {
    fn default() -> Self {
        Self::new()
    }
}

impl BuildPass {
    /// Start a pass in the collecting state.
    #[must_use]
    pub fn new() -> Self {
        Self {
            state: PassState::Collecting(Vec::new()),
        }
    }

    /// Add a parsed record. Returns `false` once building has started.
    pub fn collect(&mut self, record: PageRecord) -> bool {
        match &mut self.state {
            PassState::Collecting(records) => {
                records.push(record);
                true
            }
            PassState::Building | PassState::Done => {
                tracing::warn!(source = %record.source.display(), "Page arrived after the parse barrier");
                false
            }
        }
    }

    /// Close the barrier and take the final page list.
    ///
    /// Records are ordered with source pages before collection pages, then by
    /// source and output path. A record whose normalized output path was
    /// already taken is dropped with a warning. Returns `None` if building
    /// already started.
    pub fn start_building(&mut self, extension: &str) -> Option<Vec<PageRecord>> {
        let PassState::Collecting(mut records) = std::mem::replace(&mut self.state, PassState::Building) else {
            return None;
        };

        records.sort_by(|a, b| {
            let rank = |r: &PageRecord| u8::from(r.origin != PageOrigin::Source);
            rank(a)
                .cmp(&rank(b))
                .then_with(|| a.source.cmp(&b.source))
                .then_with(|| a.output_path.cmp(&b.output_path))
        });

        let mut seen: HashSet<PathBuf> = HashSet::with_capacity(records.len());
        records.retain(|record| {
            let path = with_output_extension(&record.output_path, extension);
            if seen.insert(path.clone()) {
                true
            } else {
                tracing::warn!(
                    source = %record.source.display(),
                    output = %path.display(),
                    "Duplicate output path, dropping page"
                );
                false
            }
        });
        Some(records)
    }

    /// Mark the pass finished.
    pub fn finish(&mut self) {
        self.state = PassState::Done;
    }

    /// Whether the pass has finished.
    #[must_use]
    pub fn is_done(&self) -> bool {
        matches!(self.state, PassState::Done)
    }
}

/// Outcome of one page task.
struct PageOutcome {
    has_error: bool,
    written: bool,
}

/// Renders, transforms and writes the pages of a pass.
#[derive(Debug, Clone)]
pub struct PageBuilder {
    transforms: TransformPipeline,
    policy: TransformFailure,
    extension: String,
}

impl PageBuilder {
    /// Create a builder writing pages with the canonical `extension`.
    #[must_use]
    pub fn new(transforms: TransformPipeline, policy: TransformFailure, extension: impl Into<String>) -> Self {
        Self {
            transforms,
            policy,
            extension: extension.into(),
        }
    }

    /// Build every page concurrently on the blocking pool.
    ///
    /// Each page sees the full page list under `pages`. A page that fails to
    /// render, fails a transform or panics still counts towards
    /// `page_count`; it never stops the other pages.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::Transform`] if an "after" transform fails
    /// under the `abort` policy. Remaining pages still finish first.
    pub async fn build(
        &self,
        pages: Vec<PageRecord>,
        context: Arc<RenderContext>,
        sink: Arc<dyn Sink>,
    ) -> Result<BuildSummary, PipelineError> {
        let start = Instant::now();
        let entries = Arc::new(Value::Array(
            pages.iter().map(|page| page_entry(page, &self.extension)).collect(),
        ));
        let mut summary = BuildSummary {
            page_count: pages.len(),
            ..BuildSummary::default()
        };

        let mut tasks = JoinSet::new();
        for page in pages {
            let builder = self.clone();
            let context = Arc::clone(&context);
            let sink = Arc::clone(&sink);
            let entries = Arc::clone(&entries);
            tasks.spawn_blocking(move || builder.build_page(&page, &context, sink.as_ref(), &entries));
        }

        let mut aborted = None;
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(Ok(outcome)) => {
                    if outcome.has_error {
                        summary.error_count += 1;
                    }
                    if !outcome.written {
                        summary.failed_writes += 1;
                    }
                }
                Ok(Err(e)) => {
                    summary.error_count += 1;
                    aborted.get_or_insert(e);
                }
                Err(e) => {
                    tracing::error!(error = %e, "Page task panicked");
                    summary.error_count += 1;
                }
            }
        }

        if let Some(e) = aborted {
            return Err(e);
        }

        tracing::info!(
            page_count = summary.page_count,
            error_count = summary.error_count,
            failed_writes = summary.failed_writes,
            elapsed_ms = elapsed_ms(start),
            "Build pass finished"
        );
        Ok(summary)
    }

    fn build_page(
        &self,
        page: &PageRecord,
        context: &RenderContext,
        sink: &dyn Sink,
        entries: &Value,
    ) -> Result<PageOutcome, PipelineError> {
        let mut data = page.data.clone();
        data.insert("pages".to_owned(), entries.clone());
        let data = Value::Object(data);
        let source_path = page.source.display().to_string();
        let input = RenderInput {
            body: &page.raw_body,
            layout: &page.layout,
            data: &data,
            source: &source_path,
        };

        let templates = context.templates();
        let rendered = match &page.parse_error {
            Some(error) => templates.render_error(&error.message, &input),
            None => templates.render(&input),
        };

        let contents = match self.transforms.after(&page.source_extension(), rendered) {
            Ok(contents) => contents,
            Err(source) if self.policy == TransformFailure::Abort => {
                return Err(PipelineError::Transform {
                    path: page.source.clone(),
                    source,
                });
            }
            Err(e) => {
                tracing::warn!(source = %page.source.display(), error = %e, "Transform failed");
                templates.render_error(&e.to_string(), &input)
            }
        };

        let document = OutputDocument {
            path: with_output_extension(&page.output_path, &self.extension),
            contents,
        };
        let has_error = contains_error_marker(&document.contents);
        let written = match sink.write(&document) {
            Ok(()) => true,
            Err(e) => {
                tracing::error!(path = %document.path.display(), error = %e, "Failed to write page");
                false
            }
        };
        tracing::debug!(path = %document.path.display(), has_error, "Built page");
        Ok(PageOutcome { has_error, written })
    }
}

/// Entry describing one page in the `pages` list.
fn page_entry(page: &PageRecord, extension: &str) -> Value {
    let mut entry = Map::new();
    entry.insert("page".to_owned(), Value::String(page.page.clone()));
    entry.insert(
        "path".to_owned(),
        Value::String(to_slash(&with_output_extension(&page.output_path, extension))),
    );
    entry.insert("layout".to_owned(), Value::String(page.layout.clone()));
    entry.insert(
        "locale".to_owned(),
        page.locale.clone().map_or(Value::Null, Value::String),
    );
    entry.insert("source".to_owned(), Value::String(to_slash(&page.source)));
    entry.insert("data".to_owned(), Value::Object(page.front_matter.clone()));
    Value::Object(entry)
}

#[cfg(test)]
mod tests {
    use std::path::Path;

    use folio_config::{TransformRules, TransformStep, TransformSteps};
    use folio_render::{ERROR_MARKER, HandlebarsRenderer, RenderOptions, Renderer};
    use folio_storage::MemorySink;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    use super::*;
    use crate::error::StepError;
    use crate::page::{ParseErrorInfo, ParseErrorTag};
    use crate::plugin::PluginRegistry;

    fn record(source: &str, output: &str, body: &str, layout: &str) -> PageRecord {
        let mut data = Map::new();
        let page = Path::new(output).file_stem().unwrap().to_string_lossy().into_owned();
        data.insert("page".to_owned(), json!(page));
        PageRecord {
            source: PathBuf::from(source),
            output_path: PathBuf::from(output),
            raw_body: body.to_owned(),
            front_matter: Map::new(),
            page,
            layout: layout.to_owned(),
            root_prefix: String::new(),
            locale: None,
            parse_error: None,
            data,
            origin: PageOrigin::Source,
        }
    }

    fn context(layouts: &[(&str, &str)]) -> Arc<RenderContext> {
        let mut templates = HandlebarsRenderer::new(RenderOptions::default()).template_set();
        for (name, source) in layouts {
            templates.add_layout(name, source).unwrap();
        }
        Arc::new(RenderContext::new(templates))
    }

    fn builder() -> PageBuilder {
        PageBuilder::new(TransformPipeline::default(), TransformFailure::Isolate, "html")
    }

    #[test]
    fn test_pass_state_transitions_once() {
        let mut pass = BuildPass::new();
        assert!(pass.collect(record("a.md", "a.md", "", "default")));
        assert_eq!(pass.start_building("html").unwrap().len(), 1);
        assert!(pass.start_building("html").is_none());
        assert!(!pass.collect(record("b.md", "b.md", "", "default")));
        pass.finish();
        assert!(pass.is_done());
    }

    #[test]
    fn test_duplicate_output_paths_are_dropped() {
        let mut pass = BuildPass::new();
        let mut synthetic = record("posts/about.md", "about.md", "", "default");
        synthetic.origin = PageOrigin::Collection("blog".to_owned());
        pass.collect(synthetic);
        pass.collect(record("about.html", "about.html", "", "default"));
        pass.collect(record("about.md", "about.md", "", "default"));

        let pages = pass.start_building("html").unwrap();
        assert_eq!(pages.len(), 1);
        assert_eq!(pages[0].source, PathBuf::from("about.html"));
    }

    #[tokio::test]
    async fn test_build_renders_layout_and_page_list() {
        let sink = Arc::new(MemorySink::new());
        let pages = vec![
            record("index.md", "index.md", "<p>Home</p>", "default"),
            record("docs/a.html", "docs/a.html", "{{#each pages}}[{{path}}]{{/each}}", "default"),
        ];
        let summary = builder()
            .build(pages, context(&[("default", "<title>{{page}}</title>{{body}}")]), Arc::clone(&sink) as Arc<dyn Sink>)
            .await
            .unwrap();

        assert_eq!(
            summary,
            BuildSummary {
                page_count: 2,
                error_count: 0,
                failed_writes: 0,
            }
        );
        assert_eq!(sink.get("index.html").unwrap(), "<title>index</title><p>Home</p>");
        assert_eq!(sink.get("docs/a.html").unwrap(), "<title>a</title>[index.html][docs/a.html]");
    }

    #[tokio::test]
    async fn test_errors_are_isolated() {
        let sink = Arc::new(MemorySink::new().failing_on("locked.html"));
        let mut bad = record("bad.md", "bad.md", "", "default");
        bad.parse_error = Some(ParseErrorInfo {
            tag: ParseErrorTag::MetadataSyntax,
            message: "Invalid front matter".to_owned(),
        });
        let pages = vec![
            bad,
            record("special.md", "special.md", "x", "special"),
            record("ok.md", "ok.md", "fine", "default"),
            record("locked.md", "locked.md", "nope", "default"),
        ];
        let summary = builder()
            .build(pages, context(&[("default", "<main>{{body}}</main>")]), Arc::clone(&sink) as Arc<dyn Sink>)
            .await
            .unwrap();

        assert_eq!(summary.page_count, 4);
        assert_eq!(summary.error_count, 2);
        assert_eq!(summary.failed_writes, 1);
        assert_eq!(sink.get("ok.html").unwrap(), "<main>fine</main>");
        let bad = sink.get("bad.html").unwrap();
        assert!(bad.starts_with("<main>") && bad.contains(ERROR_MARKER));
        let special = sink.get("special.html").unwrap();
        assert!(special.contains("No layout named &quot;special&quot; exists."));
    }

    #[tokio::test]
    async fn test_missing_default_layout() {
        let sink = Arc::new(MemorySink::new());
        let summary = builder()
            .build(vec![record("a.md", "a.md", "x", "default")], context(&[]), Arc::clone(&sink) as Arc<dyn Sink>)
            .await
            .unwrap();
        assert_eq!(summary.error_count, 1);
        let output = sink.get("a.html").unwrap();
        assert!(output.contains("You must have a layout named &quot;default&quot;."));
        assert!(output.contains("<!DOCTYPE html>"));
    }

    fn after_transforms(step: &str) -> TransformPipeline {
        let registry = PluginRegistry::with_builtins()
            .with_transform("explode", Arc::new(|_, _| Err(StepError::new("boom"))));
        let mut rules = TransformRules::default();
        rules.insert(
            "md",
            TransformSteps {
                before: Vec::new(),
                after: vec![TransformStep::named(step)],
            },
        );
        TransformPipeline::new(registry, rules)
    }

    #[tokio::test]
    async fn test_after_transform_applies_by_source_extension() {
        let sink = Arc::new(MemorySink::new());
        let builder = PageBuilder::new(after_transforms("trim"), TransformFailure::Isolate, "html");
        builder
            .build(
                vec![record("a.md", "a.md", " x ", "default"), record("b.html", "b.html", " y ", "default")],
                context(&[("default", "{{body}}")]),
                Arc::clone(&sink) as Arc<dyn Sink>,
            )
            .await
            .unwrap();
        assert_eq!(sink.get("a.html").unwrap(), "x");
        assert_eq!(sink.get("b.html").unwrap(), " y ");
    }

    #[tokio::test]
    async fn test_after_transform_failure_policies() {
        let pages = || vec![record("a.md", "a.md", "x", "default"), record("b.html", "b.html", "y", "default")];

        let sink = Arc::new(MemorySink::new());
        let isolate = PageBuilder::new(after_transforms("explode"), TransformFailure::Isolate, "html");
        let summary = isolate
            .build(pages(), context(&[("default", "{{body}}")]), Arc::clone(&sink) as Arc<dyn Sink>)
            .await
            .unwrap();
        assert_eq!(summary.error_count, 1);
        assert!(sink.get("a.html").unwrap().contains(ERROR_MARKER));
        assert_eq!(sink.get("b.html").unwrap(), "y");

        let sink = Arc::new(MemorySink::new());
        let abort = PageBuilder::new(after_transforms("explode"), TransformFailure::Abort, "html");
        let err = abort
            .build(pages(), context(&[("default", "{{body}}")]), Arc::clone(&sink) as Arc<dyn Sink>)
            .await
            .unwrap_err();
        assert!(matches!(err, PipelineError::Transform { .. }));
        assert_eq!(sink.get("b.html").unwrap(), "y");
    }
}
