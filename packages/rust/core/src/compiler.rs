//! Report compiler: subtask findings → one structured report.

use tracing::{info, instrument};

use fathom_provider::{LanguageModel, PromptRequest};
use fathom_shared::{Result, SubtaskResult};

const EDITOR_SYSTEM: &str = "You are a research editor. You turn raw findings from several \
research subtasks into a single coherent, well-structured report.";

/// Combines subtask results into a final report with one model call.
pub struct ReportCompiler<'a> {
    model: &'a dyn LanguageModel,
}

impl<'a> ReportCompiler<'a> {
    pub fn new(model: &'a dyn LanguageModel) -> Self {
        Self { model }
    }

    /// Compile `results` into a report on `topic`. The model text is returned trimmed,
    /// without any further post-processing.
    #[instrument(skip_all, fields(results = results.len()))]
    pub async fn compile(&self, topic: &str, results: &[SubtaskResult]) -> Result<String> {
        let request =
            PromptRequest::new(compile_prompt(topic, results)).with_system(EDITOR_SYSTEM);
        let report = self.model.invoke(request).await?;
        let report = report.trim().to_string();

        info!(chars = report.len(), "report compiled");
        Ok(report)
    }
}

/// Findings labelled by task id, in execution order.
pub fn findings_block(results: &[SubtaskResult]) -> String {
    results
        .iter()
        .map(|r| format!("### Task {}\n{}", r.task_id, r.content.trim()))
        .collect::<Vec<_>>()
        .join("\n\n")
}

fn compile_prompt(topic: &str, results: &[SubtaskResult]) -> String {
    format!(
        "Research topic: {topic}\n\n\
         Findings from the research subtasks:\n\n{findings}\n\n\
         Write a comprehensive research report on the topic using these findings. \
         Structure it with the following sections:\n\
         1. Introduction\n\
         2. Methodology\n\
         3. Findings, with one subsection per major theme\n\
         4. Conclusion\n\n\
         Where a subtask reports an error, work around the missing information and \
         say so briefly instead of inventing results.",
        findings = findings_block(results),
    )
}
