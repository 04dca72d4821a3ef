//! `folio build` command implementation.

use std::path::PathBuf;
use std::sync::Arc;

use clap::Args;
use folio_config::{CliSettings, Config};
use folio_site::{BuildSummary, Pipeline, PluginRegistry};
use folio_storage::{FsSink, Sink};

use crate::error::CliError;
use crate::output::Output;

/// Arguments for the build command.
#[derive(Args)]
pub(crate) struct BuildArgs {
    /// Project input directory (overrides config).
    input: Option<PathBuf>,

    /// Output directory (overrides config).
    output: Option<PathBuf>,

    /// Path to configuration file (default: auto-discover folio.toml).
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Template engine (overrides config).
    #[arg(long)]
    engine: Option<String>,

    /// Locale whose pages keep unprefixed paths (overrides config).
    #[arg(long)]
    default_locale: Option<String>,

    /// Rebuild whenever pages or supporting assets change.
    #[arg(short, long)]
    watch: bool,

    /// Enable verbose output (timing and asset warnings).
    #[arg(short, long)]
    pub verbose: bool,
}

impl BuildArgs {
    /// Execute the build command.
    ///
    /// # Errors
    ///
    /// Returns an error if configuration is invalid or the build cannot run.
    pub(crate) async fn execute(self) -> Result<(), CliError> {
        let output = Output::new();

        let cli_settings = CliSettings {
            input: self.input,
            output: self.output,
            engine: self.engine,
            default_locale: self.default_locale,
        };
        let config = Config::load(self.config.as_deref(), Some(&cli_settings))?;

        let pipeline = Pipeline::new(&config, PluginRegistry::with_builtins())?;
        output.field("Input", config.paths_resolved.input.display());
        output.field("Output", config.paths_resolved.output.display());
        output.field("Engine", &config.site.engine);

        let context = pipeline.refresh().await;
        for warning in context.warnings() {
            output.warning(&format!("Warning: {warning}"));
        }

        std::fs::create_dir_all(&config.paths_resolved.output)?;
        let sink: Arc<dyn Sink> = Arc::new(FsSink::new(config.paths_resolved.output.clone()));
        let summary = pipeline.build_site(Arc::clone(&sink)).await?;
        tracing::debug!(
            page_count = summary.page_count,
            error_count = summary.error_count,
            failed_writes = summary.failed_writes,
            "Initial build finished"
        );
        report(&output, &summary);

        if self.watch {
            output.info("Watching for changes (press Ctrl+C to stop)");
            tokio::select! {
                result = pipeline.watch_site(sink) => result?,
                _ = tokio::signal::ctrl_c() => output.info("Stopped watching"),
            }
        }

        Ok(())
    }
}

fn report(output: &Output, summary: &BuildSummary) {
    let message = summary_message(summary);
    if summary.error_count > 0 {
        output.warning(&message);
    } else {
        output.success(&message);
    }
    if summary.failed_writes > 0 {
        output.error(&format!("{} pages could not be written", summary.failed_writes));
    }
}

/// One-line result of a build pass.
fn summary_message(summary: &BuildSummary) -> String {
    if summary.error_count == 0 {
        format!("{} pages built", summary.page_count)
    } else {
        format!(
            "{} pages built, {} had errors",
            summary.page_count, summary.error_count
        )
    }
}
