//! Application configuration for Fathom.
//!
//! User config lives at `~/.fathom/fathom.toml`.
//! CLI flags override config file values, which override defaults.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{FathomError, Result};
use crate::types::SearchMode;

/// Default configuration file name.
const CONFIG_FILE_NAME: &str = "fathom.toml";

/// Default config directory name under the user's home.
const CONFIG_DIR_NAME: &str = ".fathom";

/// Hard ceiling on sources returned by one retrieval.
pub const MAX_SOURCES_CAP: usize = 10;

// ---------------------------------------------------------------------------
// Config structs (matching fathom.toml schema)
// ---------------------------------------------------------------------------

/// Top-level application config, deserialized from TOML.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Request defaults.
    #[serde(default)]
    pub defaults: DefaultsConfig,

    /// OpenRouter settings.
    #[serde(default)]
    pub openrouter: OpenRouterConfig,

    /// Web retrieval tuning.
    #[serde(default)]
    pub retrieval: RetrievalSection,

    /// Deep-research pacing and budgets.
    #[serde(default)]
    pub research: ResearchSection,
}

/// `[defaults]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DefaultsConfig {
    /// Analysis depth used when a request does not specify one.
    #[serde(default)]
    pub search_mode: SearchMode,

    /// Sources requested when a request does not specify a count.
    #[serde(default = "default_max_sources")]
    pub max_sources: usize,

    /// Whether fast mode is on unless a request says otherwise.
    #[serde(default)]
    pub fast_mode: bool,
}

impl Default for DefaultsConfig {
    fn default() -> Self {
        Self {
            search_mode: SearchMode::default(),
            max_sources: default_max_sources(),
            fast_mode: false,
        }
    }
}

fn default_max_sources() -> usize {
    MAX_SOURCES_CAP
}

/// `[openrouter]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OpenRouterConfig {
    /// Name of the env var holding the API key (never store the key itself).
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,

    /// Model used for every pipeline call.
    #[serde(default = "default_model")]
    pub default_model: String,

    /// Base URL of the OpenAI-compatible API.
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Per-call HTTP timeout.
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
}

impl Default for OpenRouterConfig {
    fn default() -> Self {
        Self {
            api_key_env: default_api_key_env(),
            default_model: default_model(),
            base_url: default_base_url(),
            request_timeout_secs: default_request_timeout(),
        }
    }
}

fn default_api_key_env() -> String {
    "OPENROUTER_API_KEY".into()
}
fn default_model() -> String {
    "openai/gpt-4o-mini".into()
}
fn default_base_url() -> String {
    "https://openrouter.ai/api/v1".into()
}
fn default_request_timeout() -> u64 {
    120
}

/// `[retrieval]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrievalSection {
    /// Per-fetch timeout in milliseconds.
    #[serde(default = "default_fetch_timeout_ms")]
    pub fetch_timeout_ms: u64,

    /// URLs fetched concurrently per batch.
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,

    /// Batch size in fast mode.
    #[serde(default = "default_fast_batch_size")]
    pub fast_batch_size: usize,

    /// A source is accepted only if its body is longer than this.
    #[serde(default = "default_min_content_chars")]
    pub min_content_chars: usize,

    /// Acceptance threshold in fast mode.
    #[serde(default = "default_fast_min_content_chars")]
    pub fast_min_content_chars: usize,

    /// Floor guaranteed by synthetic top-up.
    #[serde(default = "default_min_sources")]
    pub min_sources: usize,

    /// Upper bound on returned sources (never above 10).
    #[serde(default = "default_max_sources")]
    pub max_sources: usize,

    /// Maximum characters kept from an extracted page body.
    #[serde(default = "default_body_max_chars")]
    pub body_max_chars: usize,

    /// Allow fetching loopback/private hosts (local testing only).
    #[serde(default)]
    pub allow_private_hosts: bool,

    /// Candidate URL templates; `{query}` and `{slug}` are substituted.
    /// Empty means the built-in reference domains.
    #[serde(default)]
    pub templates: Vec<String>,
}

impl Default for RetrievalSection {
    fn default() -> Self {
        Self {
            fetch_timeout_ms: default_fetch_timeout_ms(),
            batch_size: default_batch_size(),
            fast_batch_size: default_fast_batch_size(),
            min_content_chars: default_min_content_chars(),
            fast_min_content_chars: default_fast_min_content_chars(),
            min_sources: default_min_sources(),
            max_sources: default_max_sources(),
            body_max_chars: default_body_max_chars(),
            allow_private_hosts: false,
            templates: Vec::new(),
        }
    }
}

fn default_fetch_timeout_ms() -> u64 {
    2_000
}
fn default_batch_size() -> usize {
    5
}
fn default_fast_batch_size() -> usize {
    3
}
fn default_min_content_chars() -> usize {
    100
}
fn default_fast_min_content_chars() -> usize {
    50
}
fn default_min_sources() -> usize {
    5
}
fn default_body_max_chars() -> usize {
    600
}

/// `[research]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResearchSection {
    /// Delay after each subtask call, in milliseconds.
    #[serde(default = "default_pacing_ms")]
    pub pacing_ms: u64,

    /// Overall budget for one pipeline run, in seconds.
    #[serde(default = "default_pipeline_timeout")]
    pub pipeline_timeout_secs: u64,
}

impl Default for ResearchSection {
    fn default() -> Self {
        Self {
            pacing_ms: default_pacing_ms(),
            pipeline_timeout_secs: default_pipeline_timeout(),
        }
    }
}

fn default_pacing_ms() -> u64 {
    1_000
}
fn default_pipeline_timeout() -> u64 {
    300
}

// ---------------------------------------------------------------------------
// Runtime configs (merged from config + CLI flags)
// ---------------------------------------------------------------------------

/// Runtime retrieval configuration.
#[derive(Debug, Clone)]
pub struct RetrievalConfig {
    pub fetch_timeout: Duration,
    pub batch_size: usize,
    pub fast_batch_size: usize,
    pub min_content_chars: usize,
    pub fast_min_content_chars: usize,
    pub min_sources: usize,
    pub max_sources: usize,
    pub body_max_chars: usize,
    pub allow_private_hosts: bool,
    pub templates: Vec<String>,
}

impl RetrievalConfig {
    /// Batch size for the given mode, never zero.
    pub fn batch_size_for(&self, fast: bool) -> usize {
        let size = if fast {
            self.fast_batch_size
        } else {
            self.batch_size
        };
        size.max(1)
    }

    /// Minimum body length a source must exceed to be accepted.
    pub fn min_content_for(&self, fast: bool) -> usize {
        if fast {
            self.fast_min_content_chars
        } else {
            self.min_content_chars
        }
    }
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self::from(&AppConfig::default())
    }
}

impl From<&AppConfig> for RetrievalConfig {
    fn from(config: &AppConfig) -> Self {
        let section = &config.retrieval;
        Self {
            fetch_timeout: Duration::from_millis(section.fetch_timeout_ms),
            batch_size: section.batch_size,
            fast_batch_size: section.fast_batch_size,
            min_content_chars: section.min_content_chars,
            fast_min_content_chars: section.fast_min_content_chars,
            min_sources: section.min_sources,
            max_sources: section.max_sources.min(MAX_SOURCES_CAP),
            body_max_chars: section.body_max_chars,
            allow_private_hosts: section.allow_private_hosts,
            templates: section.templates.clone(),
        }
    }
}

/// Runtime deep-research configuration.
#[derive(Debug, Clone)]
pub struct ResearchConfig {
    /// Pause inserted after every subtask call.
    pub pacing: Duration,
    /// Overall budget for one pipeline run.
    pub pipeline_timeout: Duration,
    /// Analysis depth when a request does not specify one.
    pub default_search_mode: SearchMode,
    /// Source count when a request does not specify one.
    pub default_max_sources: usize,
    /// Fast mode when a request does not specify it.
    pub default_fast_mode: bool,
}

impl Default for ResearchConfig {
    fn default() -> Self {
        Self::from(&AppConfig::default())
    }
}

impl From<&AppConfig> for ResearchConfig {
    fn from(config: &AppConfig) -> Self {
        Self {
            pacing: Duration::from_millis(config.research.pacing_ms),
            pipeline_timeout: Duration::from_secs(config.research.pipeline_timeout_secs),
            default_search_mode: config.defaults.search_mode,
            default_max_sources: config.defaults.max_sources,
            default_fast_mode: config.defaults.fast_mode,
        }
    }
}

// ---------------------------------------------------------------------------
// Config loading
// ---------------------------------------------------------------------------

/// Get the path to the config directory (`~/.fathom/`).
pub fn config_dir() -> Result<PathBuf> {
    let home =
        dirs::home_dir().ok_or_else(|| FathomError::config("could not determine home directory"))?;
    Ok(home.join(CONFIG_DIR_NAME))
}

/// Get the path to the config file (`~/.fathom/fathom.toml`).
pub fn config_file_path() -> Result<PathBuf> {
    Ok(config_dir()?.join(CONFIG_FILE_NAME))
}

/// Load the application config from disk. Returns defaults if the file does not exist.
pub fn load_config() -> Result<AppConfig> {
    let path = config_file_path()?;

    if !path.exists() {
        tracing::debug!(?path, "config file not found, using defaults");
        return Ok(AppConfig::default());
    }

    load_config_from(&path)
}

/// Load the application config from a specific file path.
pub fn load_config_from(path: &Path) -> Result<AppConfig> {
    let content = std::fs::read_to_string(path).map_err(|e| FathomError::io(path, e))?;

    toml::from_str(&content)
        .map_err(|e| FathomError::config(format!("failed to parse {}: {e}", path.display())))
}

/// Create the config directory and write a default config file.
/// Returns the path to the created file.
pub fn init_config() -> Result<PathBuf> {
    let dir = config_dir()?;
    std::fs::create_dir_all(&dir).map_err(|e| FathomError::io(&dir, e))?;

    let path = dir.join(CONFIG_FILE_NAME);
    let config = AppConfig::default();
    let content =
        toml::to_string_pretty(&config).map_err(|e| FathomError::config(e.to_string()))?;

    std::fs::write(&path, content).map_err(|e| FathomError::io(&path, e))?;
    tracing::info!(?path, "created default config file");

    Ok(path)
}

/// Check that the OpenRouter API key env var is set and non-empty.
pub fn validate_api_key(config: &AppConfig) -> Result<()> {
    let var_name = &config.openrouter.api_key_env;
    match std::env::var(var_name) {
        Ok(val) if !val.is_empty() => Ok(()),
        _ => Err(FathomError::config(format!(
            "OpenRouter API key not found. Set the {var_name} environment variable.\n\
             Get a key at https://openrouter.ai/keys"
        ))),
    }
}
