//! Pipeline: owns the render context and runs build passes.
//!
//! A build pass has two phases separated by a barrier:
//!
//! 1. **Parse.** Every document received from the source is fanned out by
//!    locale and parsed into page records. Parse tasks wait for the render
//!    context to be ready. The phase ends once the source sends
//!    [`SourceEvent::Exhausted`] (or closes its channel) and every parse task
//!    has joined.
//! 2. **Build.** Collection pages are added, then every record is rendered
//!    concurrently and written to the sink.
//!
//! Progress is published as [`PipelineEvent`]s on a broadcast channel.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use folio_config::{Config, PathsConfig};
use folio_render::{Capability, RenderOptions, Renderer, renderer_by_name};
use folio_storage::{FsSource, RawDocument, Sink, Source, SourceEvent, watch_paths};
use tokio::sync::{OnceCell, broadcast, mpsc};
use tokio::task::JoinSet;

use crate::builder::{BuildPass, BuildSummary, PageBuilder};
use crate::collection::CollectionBuilder;
use crate::context::RenderContext;
use crate::error::PipelineError;
use crate::loader::{ContextLoader, FsContextLoader, elapsed_ms};
use crate::locale::LocaleExpander;
use crate::page::PageRecord;
use crate::parser::{PageParser, PageSeed};
use crate::plugin::PluginRegistry;
use crate::refresher::Refresher;
use crate::transform::TransformPipeline;

/// Capacity of the event broadcast channel.
const EVENT_CAPACITY: usize = 64;

/// Capacity of the document channel used by [`Pipeline::build_all`].
const SOURCE_CAPACITY: usize = 256;

/// Phase signals published during refreshes and build passes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PipelineEvent {
    /// A refresh started; the context is not ready.
    Refreshing,
    /// The context is ready.
    Ready,
    /// A build pass started parsing.
    Parsing,
    /// The parse barrier closed; `pages` records are being built.
    Building {
        /// Number of records in the pass.
        pages: usize,
    },
    /// A build pass finished.
    Built(BuildSummary),
    /// A build pass failed.
    Failed(String),
}

/// Page compilation pipeline.
pub struct Pipeline {
    paths: PathsConfig,
    debounce: Duration,
    extension: String,
    renderer: Arc<dyn Renderer>,
    refresher: Arc<Refresher>,
    parser: Arc<PageParser>,
    expander: LocaleExpander,
    collections: CollectionBuilder,
    builder: PageBuilder,
    events: broadcast::Sender<PipelineEvent>,
}

impl Pipeline {
    /// Create a pipeline for `config`, loading assets from disk.
    ///
    /// The pipeline starts not ready; call [`refresh`](Self::refresh) before
    /// builds can make progress.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::Configuration`] if the input directory does
    /// not exist or the template engine is unknown.
    pub fn new(config: &Config, plugins: PluginRegistry) -> Result<Self, PipelineError> {
        let paths = &config.paths_resolved;
        if !paths.input.is_dir() {
            return Err(PipelineError::Configuration(format!(
                "Must specify an existing input directory: {}",
                paths.input.display()
            )));
        }
        let renderer = renderer_by_name(
            &config.site.engine,
            RenderOptions {
                builtins: config.site.builtins,
                html_escape: config.site.html_escape,
            },
        )
        .ok_or_else(|| {
            PipelineError::Configuration(format!("Unknown template engine \"{}\"", config.site.engine))
        })?;

        let loader = Arc::new(FsContextLoader::new(paths.clone(), Arc::clone(&renderer), plugins.clone()));
        Ok(Self::with_loader(config, plugins, renderer, loader))
    }

    /// Create a pipeline with a custom context loader.
    ///
    /// Performs no validation.
    #[must_use]
    pub fn with_loader(
        config: &Config,
        plugins: PluginRegistry,
        renderer: Arc<dyn Renderer>,
        loader: Arc<dyn ContextLoader>,
    ) -> Self {
        let transforms = TransformPipeline::new(plugins.clone(), config.transform.clone());
        let policy = config.build.transform_failure;
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            paths: config.paths_resolved.clone(),
            debounce: Duration::from_millis(config.watch.debounce_ms),
            extension: config.output_extension().to_owned(),
            refresher: Arc::new(Refresher::new(loader, RenderContext::empty(renderer.as_ref()))),
            renderer,
            parser: Arc::new(PageParser::new(config.page_layouts.clone(), transforms.clone(), policy)),
            expander: LocaleExpander::new(config.site.default_locale.clone()),
            collections: CollectionBuilder::new(config.paths_resolved.input.clone(), plugins),
            builder: PageBuilder::new(transforms, policy, config.output_extension()),
            events,
        }
    }

    /// Subscribe to phase signals.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<PipelineEvent> {
        self.events.subscribe()
    }

    /// Resolved project paths.
    #[must_use]
    pub fn paths(&self) -> &PathsConfig {
        &self.paths
    }

    /// Template engine in use.
    #[must_use]
    pub fn renderer(&self) -> &Arc<dyn Renderer> {
        &self.renderer
    }

    /// Render context cache.
    #[must_use]
    pub fn refresher(&self) -> &Arc<Refresher> {
        &self.refresher
    }

    fn emit(&self, event: PipelineEvent) {
        // No subscribers is fine.
        let _ = self.events.send(event);
    }

    /// Reload supporting assets and swap in the new context.
    pub async fn refresh(&self) -> Arc<RenderContext> {
        self.emit(PipelineEvent::Refreshing);
        let context = self.refresher.refresh().await;
        if self.refresher.is_ready() {
            self.emit(PipelineEvent::Ready);
        }
        context
    }

    /// Wait until the render context is ready.
    pub async fn on_ready(&self) -> Arc<RenderContext> {
        self.refresher.on_ready().await
    }

    /// Run one build pass over the documents received on `source`.
    ///
    /// The whole pass uses the first context that becomes ready after it
    /// starts. A refresh finishing mid-pass applies to the next pass.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::Transform`] if a transform fails under the
    /// `abort` policy. Per-page problems never fail the pass.
    pub async fn build(
        &self,
        mut source: mpsc::Receiver<SourceEvent>,
        sink: Arc<dyn Sink>,
    ) -> Result<BuildSummary, PipelineError> {
        let start = Instant::now();
        self.emit(PipelineEvent::Parsing);

        let pinned: Arc<OnceCell<Arc<RenderContext>>> = Arc::new(OnceCell::new());
        let mut tasks = JoinSet::new();
        let mut spawned = 0usize;
        while let Some(SourceEvent::Document(document)) = source.recv().await {
            let refresher = Arc::clone(&self.refresher);
            let pinned = Arc::clone(&pinned);
            let parser = Arc::clone(&self.parser);
            let expander = self.expander.clone();
            let document = Arc::new(document);
            tasks.spawn(async move {
                let context = Arc::clone(pinned.get_or_init(|| refresher.on_ready()).await);
                let seeds = expander.expand(&document, &context.locales());
                parse_seeds(&parser, &seeds, &context)
            });
            spawned += 1;
        }

        let mut pass = BuildPass::new();
        let mut joined = 0usize;
        let mut lost = 0usize;
        let mut aborted = None;
        while let Some(result) = tasks.join_next().await {
            joined += 1;
            match result {
                Ok(Ok(records)) => {
                    for record in records {
                        pass.collect(record);
                    }
                }
                Ok(Err(e)) => {
                    aborted.get_or_insert(e);
                }
                Err(e) => {
                    tracing::error!(error = %e, "Parse task panicked");
                    lost += 1;
                }
            }
        }
        debug_assert_eq!(spawned, joined);
        if let Some(e) = aborted {
            return Err(self.fail(e));
        }

        let context = Arc::clone(pinned.get_or_init(|| self.refresher.on_ready()).await);
        let seeds = {
            let collections = self.collections.clone();
            let context = Arc::clone(&context);
            tokio::task::spawn_blocking(move || collections.build(&context))
                .await
                .unwrap_or_else(|e| {
                    tracing::error!(error = %e, "Collection build panicked");
                    Vec::new()
                })
        };
        match parse_seeds(&self.parser, &seeds, &context) {
            Ok(records) => {
                for record in records {
                    pass.collect(record);
                }
            }
            Err(e) => return Err(self.fail(e)),
        }

        let pages = pass.start_building(&self.extension).unwrap_or_default();
        tracing::info!(
            documents = spawned,
            pages = pages.len(),
            parse_ms = elapsed_ms(start),
            "Parse phase finished"
        );
        self.emit(PipelineEvent::Building { pages: pages.len() });

        let mut summary = match self.builder.build(pages, context, sink).await {
            Ok(summary) => summary,
            Err(e) => return Err(self.fail(e)),
        };
        summary.page_count += lost;
        summary.error_count += lost;
        pass.finish();
        self.emit(PipelineEvent::Built(summary));
        Ok(summary)
    }

    fn fail(&self, error: PipelineError) -> PipelineError {
        tracing::error!(error = %error, "Build pass failed");
        self.emit(PipelineEvent::Failed(error.to_string()));
        error
    }

    /// Scan `source` and run one build pass over its documents.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::Storage`] if the source cannot be scanned,
    /// otherwise as [`build`](Self::build).
    pub async fn build_all(&self, source: Arc<dyn Source>, sink: Arc<dyn Sink>) -> Result<BuildSummary, PipelineError> {
        let documents = tokio::task::spawn_blocking(move || source.scan())
            .await
            .map_err(|e| PipelineError::Configuration(format!("Source scan panicked: {e}")))?
            .map_err(|e| self.fail(e.into()))?;

        let (tx, rx) = mpsc::channel(SOURCE_CAPACITY);
        let producer = tokio::spawn(send_documents(tx, documents));
        let summary = self.build(rx, sink).await;
        if let Err(e) = producer.await {
            tracing::error!(error = %e, "Document producer panicked");
        }
        summary
    }

    /// Build every page under the pages root.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::Storage`] if the pages root is missing,
    /// otherwise as [`build`](Self::build).
    pub async fn build_site(&self, sink: Arc<dyn Sink>) -> Result<BuildSummary, PipelineError> {
        let source = Arc::new(FsSource::new(self.paths.pages.clone()));
        self.build_all(source, sink).await
    }

    /// Supporting directories watched for changes.
    ///
    /// Layouts and fragments are included only when the renderer supports
    /// them.
    #[must_use]
    pub fn watch_roots(&self) -> Vec<PathBuf> {
        let mut roots = Vec::new();
        if self.renderer.supports(Capability::Layouts) {
            roots.push(self.paths.layouts.clone());
        }
        if self.renderer.supports(Capability::Fragments) {
            roots.push(self.paths.partials.clone());
        }
        roots.push(self.paths.data.clone());
        roots.push(self.paths.locales.clone());
        roots.push(self.paths.collections.clone());
        roots
    }

    /// Refresh whenever supporting assets change.
    ///
    /// Events arriving during a refresh are coalesced into one follow-up
    /// refresh. Runs until the watcher stops.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::Storage`] if watching cannot start.
    pub async fn watch_assets(&self) -> Result<(), PipelineError> {
        self.watch_loop(self.watch_roots(), None).await
    }

    /// Refresh and rebuild the site whenever assets or pages change.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::Storage`] if watching cannot start.
    pub async fn watch_site(&self, sink: Arc<dyn Sink>) -> Result<(), PipelineError> {
        let mut roots = self.watch_roots();
        roots.push(self.paths.pages.clone());
        self.watch_loop(roots, Some(sink)).await
    }

    async fn watch_loop(&self, roots: Vec<PathBuf>, sink: Option<Arc<dyn Sink>>) -> Result<(), PipelineError> {
        let (mut events, handle) = watch_paths(&roots, self.debounce)?;
        tracing::info!(roots = roots.len(), "Watching for changes");

        while let Some(event) = events.recv().await {
            let coalesced = events.drain();
            tracing::info!(path = %event.path.display(), kind = ?event.kind, coalesced, "Change detected");
            self.refresh().await;
            if let Some(sink) = &sink {
                match self.build_site(Arc::clone(sink)).await {
                    Ok(summary) => tracing::info!(
                        page_count = summary.page_count,
                        error_count = summary.error_count,
                        "Rebuilt site"
                    ),
                    Err(e) => tracing::error!(error = %e, "Rebuild failed"),
                }
            }
        }

        handle.stop();
        Ok(())
    }
}

/// Parse every seed, stopping at the first aborting transform failure.
fn parse_seeds(
    parser: &PageParser,
    seeds: &[PageSeed],
    context: &RenderContext,
) -> Result<Vec<PageRecord>, PipelineError> {
    seeds.iter().map(|seed| parser.parse(seed, context)).collect()
}

async fn send_documents(tx: mpsc::Sender<SourceEvent>, documents: Vec<RawDocument>) {
    for document in documents {
        if tx.send(SourceEvent::Document(document)).await.is_err() {
            return;
        }
    }
    let _ = tx.send(SourceEvent::Exhausted).await;
}
