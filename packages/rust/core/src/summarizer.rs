//! Search summarizer: query + sources → prose summary.

use tracing::{debug, instrument};

use fathom_provider::{LanguageModel, PromptRequest};
use fathom_shared::{Result, SearchMode, SourceRecord};

const ANALYST_SYSTEM: &str = "You are a search analyst. You summarize web sources \
accurately, cite them by number, and never invent facts that are not in the sources.";

/// Output token budget for each analysis depth.
pub fn max_tokens_for(mode: SearchMode) -> u32 {
    match mode {
        SearchMode::Quick => 600,
        SearchMode::Comprehensive => 1500,
        SearchMode::Exploratory => 2500,
    }
}

fn mode_instructions(mode: SearchMode) -> &'static str {
    match mode {
        SearchMode::Quick => {
            "Give a short, direct answer in two or three paragraphs, focusing on the \
             most important facts."
        }
        SearchMode::Comprehensive => {
            "Give a thorough summary covering the main points, supporting details and \
             any disagreements between sources."
        }
        SearchMode::Exploratory => {
            "Give an in-depth exploration: cover the main points, related subtopics, \
             open questions and promising directions for further reading."
        }
    }
}

/// Summarizes a set of sources with one model call.
pub struct SearchSummarizer<'a> {
    model: &'a dyn LanguageModel,
}

impl<'a> SearchSummarizer<'a> {
    pub fn new(model: &'a dyn LanguageModel) -> Self {
        Self { model }
    }

    /// Summarize `sources` for `query`. With no sources the fallback text is
    /// returned and the model is not called.
    #[instrument(skip_all, fields(sources = sources.len(), mode = %mode))]
    pub async fn summarize(
        &self,
        query: &str,
        sources: &[SourceRecord],
        mode: SearchMode,
    ) -> Result<String> {
        if sources.is_empty() {
            debug!("no sources to summarize");
            return Ok(fallback_summary(query, sources));
        }

        let request = PromptRequest::new(summary_prompt(query, sources, mode))
            .with_system(ANALYST_SYSTEM)
            .with_max_tokens(max_tokens_for(mode));
        let summary = self.model.invoke(request).await?;

        Ok(summary.trim().to_string())
    }
}

/// Deterministic summary used when no model output is available.
pub fn fallback_summary(query: &str, sources: &[SourceRecord]) -> String {
    let query = query.trim();
    if sources.is_empty() {
        return format!(
            "No sources could be retrieved for \"{query}\". Try rephrasing the query \
             or searching again later."
        );
    }

    let titles = sources
        .iter()
        .take(3)
        .map(|s| s.title.as_str())
        .collect::<Vec<_>>()
        .join("; ");
    format!(
        "Search results for \"{query}\" are limited and could not be analyzed automatically. \
         {count} source(s) were found, including: {titles}. Review the sources below for details.",
        count = sources.len(),
    )
}

fn summary_prompt(query: &str, sources: &[SourceRecord], mode: SearchMode) -> String {
    let listing = sources
        .iter()
        .enumerate()
        .map(|(i, s)| format!("[{}] {}\nURL: {}\n{}", i + 1, s.title, s.url, s.snippet))
        .collect::<Vec<_>>()
        .join("\n\n");

    format!(
        "Query: {query}\n\nSources:\n\n{listing}\n\n{instructions} \
         Reference sources by their bracketed number.",
        instructions = mode_instructions(mode),
    )
}
