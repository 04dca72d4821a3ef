//! Configuration management for Folio.
//!
//! Parses `folio.toml` configuration files with serde and provides
//! auto-discovery of config files in parent directories.
//!
//! CLI settings can be applied during load via [`CliSettings`].
//!
//! ## Layout
//!
//! ```toml
//! [site]
//! engine = "handlebars"
//! default_locale = "en"
//!
//! [paths]
//! input = "src"
//! output = "dist"
//! layouts = "layouts"
//!
//! [page_layouts]
//! "docs/api" = "api"
//!
//! [transform.".md"]
//! before = ["markdown"]
//! after = [["replace", "{{year}}", "2026"]]
//! ```
//!
//! Folder paths (`pages`, `layouts`, `partials`, `data`, `locales`,
//! `collections`) are relative to the input root. `paths.input` and
//! `paths.output` are relative to the config file and support `${VAR}` and
//! `${VAR:-default}` expansion.

mod expand;

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::Deserialize;

/// CLI settings that override configuration file values.
///
/// All fields are optional. Only non-None values override the loaded config.
#[derive(Debug, Default)]
pub struct CliSettings {
    /// Override the project input root.
    pub input: Option<PathBuf>,
    /// Override the output root.
    pub output: Option<PathBuf>,
    /// Override the rendering engine.
    pub engine: Option<String>,
    /// Override the default locale.
    pub default_locale: Option<String>,
}

/// Configuration filename to search for.
const CONFIG_FILENAME: &str = "folio.toml";

/// Application configuration.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Site-wide rendering settings.
    pub site: SiteConfig,
    /// Directory layout (relative strings from TOML).
    paths: PathsConfigRaw,
    /// Folder (relative to the pages root) to layout name.
    pub page_layouts: BTreeMap<String, String>,
    /// Content transforms keyed by file extension.
    pub transform: TransformRules,
    /// Asset watching configuration.
    pub watch: WatchConfig,
    /// Build pass configuration.
    pub build: BuildConfig,

    /// Resolved paths (set after loading).
    #[serde(skip)]
    pub paths_resolved: PathsConfig,
    /// Path to the config file (set after loading).
    #[serde(skip)]
    pub config_path: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self::default_with_base(Path::new("."))
    }
}

/// Site-wide rendering settings.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct SiteConfig {
    /// Rendering engine name (`handlebars` or `raw`).
    pub engine: String,
    /// Locale whose pages keep their output path unprefixed.
    pub default_locale: Option<String>,
    /// Whether built-in helpers are registered.
    pub builtins: bool,
    /// Whether `{{expr}}` output is HTML-escaped.
    pub html_escape: bool,
    /// Canonical output extension, without the leading dot.
    pub extension: String,
}

impl Default for SiteConfig {
    fn default() -> Self {
        Self {
            engine: "handlebars".to_owned(),
            default_locale: None,
            builtins: true,
            html_escape: false,
            extension: "html".to_owned(),
        }
    }
}

/// Raw path configuration as parsed from TOML.
#[derive(Debug, Deserialize, Default)]
#[serde(default)]
struct PathsConfigRaw {
    input: Option<String>,
    output: Option<String>,
    pages: Option<String>,
    layouts: Option<String>,
    partials: Option<String>,
    data: Option<String>,
    locales: Option<String>,
    collections: Option<String>,
}

/// Resolved directory layout with absolute (or base-relative) paths.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct PathsConfig {
    /// Project input root. Collection globs are relative to it.
    pub input: PathBuf,
    /// Output root.
    pub output: PathBuf,
    /// Page sources.
    pub pages: PathBuf,
    /// Layout templates.
    pub layouts: PathBuf,
    /// Fragment templates.
    pub partials: PathBuf,
    /// Global data files.
    pub data: PathBuf,
    /// Locale tables.
    pub locales: PathBuf,
    /// Collection definitions.
    pub collections: PathBuf,
}

impl PathsConfig {
    fn resolve(raw: &PathsConfigRaw, input: PathBuf, output: PathBuf) -> Self {
        let folder = |name: Option<&str>, default: &str| input.join(name.unwrap_or(default));
        Self {
            pages: folder(raw.pages.as_deref(), "pages"),
            layouts: folder(raw.layouts.as_deref(), "layouts"),
            partials: folder(raw.partials.as_deref(), "partials"),
            data: folder(raw.data.as_deref(), "data"),
            locales: folder(raw.locales.as_deref(), "locales"),
            collections: folder(raw.collections.as_deref(), "collections"),
            input,
            output,
        }
    }
}

/// One transform step: a registered step name plus optional arguments.
///
/// Written in TOML either as `"name"` or as `["name", arg, ...]`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(try_from = "StepRaw")]
pub struct TransformStep {
    /// Registered step name.
    pub name: String,
    /// Extra arguments passed to the step.
    pub args: Vec<serde_json::Value>,
}

impl TransformStep {
    /// Create a step without arguments.
    #[must_use]
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            args: Vec::new(),
        }
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum StepRaw {
    Name(String),
    Call(Vec<serde_json::Value>),
}

impl TryFrom<StepRaw> for TransformStep {
    type Error = String;

    fn try_from(raw: StepRaw) -> Result<Self, Self::Error> {
        match raw {
            StepRaw::Name(name) if !name.is_empty() => Ok(Self::named(name)),
            StepRaw::Call(mut items) => {
                if items.is_empty() {
                    return Err("transform step list cannot be empty".to_owned());
                }
                match items.remove(0) {
                    serde_json::Value::String(name) if !name.is_empty() => {
                        Ok(Self { name, args: items })
                    }
                    _ => Err("transform step must start with a step name".to_owned()),
                }
            }
            StepRaw::Name(_) => Err("transform step name cannot be empty".to_owned()),
        }
    }
}

/// Steps applied to one extension before and after rendering.
#[derive(Debug, Default, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct TransformSteps {
    /// Applied to the page body before rendering.
    pub before: Vec<TransformStep>,
    /// Applied to the rendered output.
    pub after: Vec<TransformStep>,
}

/// Transform rules keyed by file extension.
///
/// Keys may be written with or without the leading dot (`".md"` or `"md"`).
#[derive(Debug, Default, Clone, PartialEq, Deserialize)]
#[serde(transparent)]
pub struct TransformRules {
    rules: BTreeMap<String, TransformSteps>,
}

impl TransformRules {
    /// Insert rules for an extension.
    pub fn insert(&mut self, extension: &str, steps: TransformSteps) {
        self.rules.insert(extension.to_owned(), steps);
    }

    /// Look up the rules for a file extension (case-insensitive, dot optional).
    #[must_use]
    pub fn for_extension(&self, extension: &str) -> Option<&TransformSteps> {
        let wanted = extension.trim_start_matches('.');
        self.rules
            .iter()
            .find(|(key, _)| key.trim_start_matches('.').eq_ignore_ascii_case(wanted))
            .map(|(_, steps)| steps)
    }

    /// Whether no rules are configured.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

/// Asset watching configuration.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct WatchConfig {
    /// Debounce window for file-system events, in milliseconds.
    pub debounce_ms: u64,
}

impl Default for WatchConfig {
    fn default() -> Self {
        Self { debounce_ms: 100 }
    }
}

/// What a failing content transform does to a build pass.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransformFailure {
    /// The failing page becomes an error document; the pass continues.
    #[default]
    Isolate,
    /// The failure aborts the whole pass.
    Abort,
}

/// Build pass configuration.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct BuildConfig {
    /// Policy for failing content transforms.
    pub transform_failure: TransformFailure,
}

/// Configuration error.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// File not found.
    #[error("Configuration file not found: {}", .0.display())]
    NotFound(PathBuf),
    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    /// TOML parsing error.
    #[error("TOML parse error: {0}")]
    Parse(#[from] toml::de::Error),
    /// Validation error.
    #[error("Configuration error: {0}")]
    Validation(String),
    /// Environment variable error during expansion.
    #[error("Environment variable error in {field}: {message}")]
    EnvVar {
        /// Config field path (e.g., "`paths.output`").
        field: String,
        /// Error message (e.g., "${`OUT_DIR`} not set").
        message: String,
    },
}

/// Require a string field to be non-empty.
fn require_non_empty(value: &str, field: &str) -> Result<(), ConfigError> {
    if value.is_empty() {
        return Err(ConfigError::Validation(format!("{field} cannot be empty")));
    }
    Ok(())
}

impl Config {
    /// Load configuration from file with optional CLI settings.
    ///
    /// If `config_path` is provided, loads from that file.
    /// Otherwise, searches for `folio.toml` in current directory and parents.
    ///
    /// CLI settings are applied after loading and path resolution, allowing CLI
    /// arguments to take precedence over config file values.
    ///
    /// # Errors
    ///
    /// Returns error if explicit `config_path` doesn't exist, parsing fails,
    /// or the resulting configuration is invalid.
    pub fn load(
        config_path: Option<&Path>,
        cli_settings: Option<&CliSettings>,
    ) -> Result<Self, ConfigError> {
        let mut config = if let Some(path) = config_path {
            if !path.exists() {
                return Err(ConfigError::NotFound(path.to_path_buf()));
            }
            Self::load_from_file(path)?
        } else if let Some(discovered) = Self::discover_config() {
            Self::load_from_file(&discovered)?
        } else {
            Self::default_with_cwd()
        };

        if let Some(settings) = cli_settings {
            config.apply_cli_settings(settings);
            config.validate()?;
        }

        Ok(config)
    }

    /// Parse configuration from a TOML string, resolving paths against `base`.
    ///
    /// # Errors
    ///
    /// Returns error if parsing, expansion or validation fails.
    pub fn from_toml_str(content: &str, base: &Path) -> Result<Self, ConfigError> {
        let mut config: Self = toml::from_str(content)?;
        config.expand_env_vars()?;
        config.resolve_paths(base);
        config.validate()?;
        Ok(config)
    }

    /// Create default config with paths relative to given base directory.
    ///
    /// The input root is `<base>/src` and the output root `<base>/dist`.
    #[must_use]
    pub fn default_with_base(base: &Path) -> Self {
        let paths = PathsConfigRaw::default();
        let paths_resolved = PathsConfig::resolve(&paths, base.join("src"), base.join("dist"));
        Self {
            site: SiteConfig::default(),
            paths,
            page_layouts: BTreeMap::new(),
            transform: TransformRules::default(),
            watch: WatchConfig::default(),
            build: BuildConfig::default(),
            paths_resolved,
            config_path: None,
        }
    }

    /// Point the configuration at new input and output roots.
    ///
    /// Folder paths are re-resolved under the new input root.
    pub fn set_roots(&mut self, input: PathBuf, output: PathBuf) {
        self.paths_resolved = PathsConfig::resolve(&self.paths, input, output);
    }

    /// Apply CLI settings to the configuration.
    fn apply_cli_settings(&mut self, settings: &CliSettings) {
        if settings.input.is_some() || settings.output.is_some() {
            let input = settings
                .input
                .clone()
                .unwrap_or_else(|| self.paths_resolved.input.clone());
            let output = settings
                .output
                .clone()
                .unwrap_or_else(|| self.paths_resolved.output.clone());
            self.set_roots(input, output);
        }
        if let Some(engine) = &settings.engine {
            self.site.engine.clone_from(engine);
        }
        if let Some(locale) = &settings.default_locale {
            self.site.default_locale = Some(locale.clone());
        }
    }

    /// Search for config file in current directory and parents.
    fn discover_config() -> Option<PathBuf> {
        let mut current = std::env::current_dir().ok()?;
        loop {
            let candidate = current.join(CONFIG_FILENAME);
            if candidate.exists() {
                return Some(candidate);
            }
            if !current.pop() {
                return None;
            }
        }
    }

    /// Create default config with paths relative to current working directory.
    fn default_with_cwd() -> Self {
        let cwd = std::env::current_dir().unwrap_or_default();
        Self::default_with_base(&cwd)
    }

    /// Load configuration from a specific file.
    fn load_from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let config_dir = path.parent().unwrap_or(Path::new("."));
        let mut config = Self::from_toml_str(&content, config_dir)?;
        config.config_path = Some(path.to_path_buf());
        Ok(config)
    }

    /// Validate configuration values.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Validation` if any validation fails.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.validate_site()?;
        self.validate_page_layouts()?;
        self.validate_watch()?;
        Ok(())
    }

    fn validate_site(&self) -> Result<(), ConfigError> {
        require_non_empty(&self.site.engine, "site.engine")?;
        require_non_empty(self.site.extension.trim_start_matches('.'), "site.extension")?;
        if let Some(locale) = &self.site.default_locale {
            require_non_empty(locale, "site.default_locale")?;
        }
        Ok(())
    }

    fn validate_page_layouts(&self) -> Result<(), ConfigError> {
        for (folder, layout) in &self.page_layouts {
            require_non_empty(layout, &format!("page_layouts.\"{folder}\""))?;
        }
        Ok(())
    }

    fn validate_watch(&self) -> Result<(), ConfigError> {
        const MAX_DEBOUNCE_MS: u64 = 10_000;

        if self.watch.debounce_ms == 0 {
            return Err(ConfigError::Validation(
                "watch.debounce_ms must be greater than 0".to_owned(),
            ));
        }
        if self.watch.debounce_ms > MAX_DEBOUNCE_MS {
            return Err(ConfigError::Validation(format!(
                "watch.debounce_ms cannot exceed {MAX_DEBOUNCE_MS}"
            )));
        }
        Ok(())
    }

    /// Canonical output extension without the leading dot.
    #[must_use]
    pub fn output_extension(&self) -> &str {
        self.site.extension.trim_start_matches('.')
    }

    /// Expand environment variable references in root paths.
    fn expand_env_vars(&mut self) -> Result<(), ConfigError> {
        if let Some(ref input) = self.paths.input {
            self.paths.input = Some(expand::expand_env(input, "paths.input")?);
        }
        if let Some(ref output) = self.paths.output {
            self.paths.output = Some(expand::expand_env(output, "paths.output")?);
        }
        Ok(())
    }

    /// Resolve relative paths against the config directory.
    fn resolve_paths(&mut self, config_dir: &Path) {
        let input = config_dir.join(self.paths.input.as_deref().unwrap_or("src"));
        let output = config_dir.join(self.paths.output.as_deref().unwrap_or("dist"));
        self.paths_resolved = PathsConfig::resolve(&self.paths, input, output);
    }
}
