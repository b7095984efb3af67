//! Research orchestration for Fathom.
//!
//! This crate ties together planning, sequential subtask execution, report
//! compilation, web retrieval, and summarization into end-to-end modes
//! (deep research, web search, summary-only, and chat).

pub mod compiler;
pub mod executor;
pub mod pipeline;
pub mod planner;
pub mod summarizer;

#[cfg(test)]
mod test_support;

pub use compiler::{ReportCompiler, findings_block};
pub use executor::{ExecutionProgress, SilentExecutionProgress, TaskExecutor};
pub use pipeline::{
    ProgressReporter, ResearchPhase, ResearchPipeline, SearchOptions, SilentProgress, chat_prompt,
};
pub use planner::{MIN_SUBTASKS, ParseError, ResearchPlanner, parse_subtask_list};
pub use summarizer::{SearchSummarizer, fallback_summary, max_tokens_for};
