//! Page compilation pipeline for Folio.
//!
//! This crate provides:
//! - [`Pipeline`]: two-phase (parse, then build) concurrent page compilation
//! - [`Refresher`]: readiness-gated [`RenderContext`] cache with hot refresh
//! - [`PageParser`], [`LocaleExpander`], [`CollectionBuilder`] and
//!   [`PageBuilder`]: the stages of a build pass
//! - [`PluginRegistry`] and [`TransformPipeline`]: helpers, content
//!   transforms and collection transforms
//!
//! # Quick Start
//!
//! ```no_run
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! use std::path::Path;
//! use std::sync::Arc;
//! use folio_config::Config;
//! use folio_site::{Pipeline, PluginRegistry};
//! use folio_storage::FsSink;
//!
//! let config = Config::load(Some(Path::new("folio.toml")), None)?;
//! let pipeline = Pipeline::new(&config, PluginRegistry::with_builtins())?;
//! pipeline.refresh().await;
//!
//! let sink = Arc::new(FsSink::new(config.paths_resolved.output.clone()));
//! let summary = pipeline.build_site(sink).await?;
//! println!("{} pages built", summary.page_count);
//! # Ok(())
//! # }
//! ```

mod builder;
mod collection;
mod context;
mod data;
mod error;
mod front_matter;
mod loader;
mod locale;
mod page;
mod parser;
mod pipeline;
mod plugin;
mod refresher;
mod transform;

pub use builder::{BuildPass, BuildSummary, PageBuilder};
pub use collection::{CollectionBuilder, CollectionDefinition};
pub use context::RenderContext;
pub use data::{deep_merge, merge_maps};
pub use error::{AssetKind, AssetLoadError, CollectionError, PipelineError, StepError, TransformError};
pub use loader::{ContextLoader, FsContextLoader};
pub use locale::LocaleExpander;
pub use page::{PageOrigin, PageRecord, ParseErrorInfo, ParseErrorTag};
pub use parser::{DEFAULT_LAYOUT, PageParser, PageSeed};
pub use pipeline::{Pipeline, PipelineEvent};
pub use plugin::{CollectionEntry, CollectionFn, PluginRegistry, TransformFn};
pub use refresher::Refresher;
pub use transform::TransformPipeline;
