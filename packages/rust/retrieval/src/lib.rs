//! Web retrieval, content extraction, and synthesized fallbacks.
//!
//! This crate provides:
//! - [`candidates`] — Query → candidate URL expansion over reference domains
//! - [`extract`] — HTML → plain text with page chrome removed
//! - [`synthesizer`] — Fetch-or-synthesize content for a single URL
//! - [`engine`] — Concurrent, batch-bounded source retrieval

pub mod candidates;
pub mod engine;
pub mod extract;
pub mod synthesizer;

pub use candidates::{DEFAULT_TEMPLATES, candidate_urls};
pub use engine::{WebRetriever, filler_sources};
pub use extract::{ExtractedPage, extract_page};
pub use synthesizer::{Aspect, ContentSynthesizer, SynthesizedContent, fallback_content};
