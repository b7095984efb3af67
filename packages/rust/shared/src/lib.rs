//! Shared types, error model, and configuration for Fathom.
//!
//! This crate is the foundation depended on by all other Fathom crates.
//! It provides:
//! - [`FathomError`] and [`ProviderError`] — the error taxonomy
//! - Domain types ([`Subtask`], [`SubtaskResult`], [`SourceRecord`], [`SearchResult`])
//! - Request/response envelopes ([`ResearchRequest`], [`ResearchResponse`])
//! - Configuration ([`AppConfig`], [`RetrievalConfig`], [`ResearchConfig`], config loading)

pub mod config;
pub mod error;
pub mod types;

// Re-export public API at crate root for ergonomic imports.
pub use config::{
    AppConfig, DefaultsConfig, MAX_SOURCES_CAP, OpenRouterConfig, ResearchConfig, ResearchSection,
    RetrievalConfig, RetrievalSection, config_dir, config_file_path, init_config, load_config,
    load_config_from, validate_api_key,
};
pub use error::{FathomError, ProviderError, Result};
pub use types::{
    ChatTurn, ELLIPSIS, ResearchRequest, ResearchResponse, RunId, SNIPPET_MAX_CHARS, SearchMode,
    SearchResult, SourceRecord, Subtask, SubtaskResult, truncate_chars,
};
