//! Sequential subtask execution.
//!
//! Subtasks run one at a time, in input order, with a fixed pause after each
//! call so a single provider key is never hit concurrently. A failing subtask
//! is recorded as an error string and the batch continues.

use std::time::Duration;

use tracing::{info, instrument, warn};

use fathom_provider::{LanguageModel, PromptRequest};
use fathom_shared::{Subtask, SubtaskResult};

/// Prefix of the content recorded for a failed subtask.
pub const SUBTASK_ERROR_PREFIX: &str = "Error conducting research";

const ANALYST_SYSTEM: &str = "You are a research analyst. You work on one subtask of a \
larger research project and report concrete, well-organized findings.";

/// Per-subtask progress callback.
pub trait ExecutionProgress: Send + Sync {
    /// Called after subtask `current` of `total` finished, successfully or not.
    fn subtask_finished(&self, task_id: &str, current: usize, total: usize);
}

/// No-op execution progress.
pub struct SilentExecutionProgress;

impl ExecutionProgress for SilentExecutionProgress {
    fn subtask_finished(&self, _task_id: &str, _current: usize, _total: usize) {}
}

/// Runs subtasks against the model one after another.
pub struct TaskExecutor<'a> {
    model: &'a dyn LanguageModel,
    pacing: Duration,
}

impl<'a> TaskExecutor<'a> {
    pub fn new(model: &'a dyn LanguageModel, pacing: Duration) -> Self {
        Self { model, pacing }
    }

    /// Execute every subtask in order. Always returns one result per subtask.
    #[instrument(skip_all, fields(subtasks = subtasks.len()))]
    pub async fn execute(
        &self,
        topic: &str,
        subtasks: &[Subtask],
        progress: &dyn ExecutionProgress,
    ) -> Vec<SubtaskResult> {
        let total = subtasks.len();
        let mut results = Vec::with_capacity(total);
        let mut failures = 0usize;

        for (i, subtask) in subtasks.iter().enumerate() {
            let request =
                PromptRequest::new(subtask_prompt(topic, subtask)).with_system(ANALYST_SYSTEM);

            let content = match self.model.invoke(request).await {
                Ok(text) => text,
                Err(e) => {
                    failures += 1;
                    warn!(task_id = %subtask.id, error = %e, "subtask failed");
                    format!("{SUBTASK_ERROR_PREFIX} for task {}: {e}", subtask.id)
                }
            };

            results.push(SubtaskResult {
                task_id: subtask.id.clone(),
                content,
            });
            progress.subtask_finished(&subtask.id, i + 1, total);

            if !self.pacing.is_zero() {
                tokio::time::sleep(self.pacing).await;
            }
        }

        info!(total, failures, "subtask execution complete");
        results
    }
}

fn subtask_prompt(topic: &str, subtask: &Subtask) -> String {
    format!(
        "Overall research topic: {topic}\n\n\
         Subtask {id}: {description}\n\n\
         Carry out this subtask thoroughly. Present the key facts, evidence and \
         reasoning you find, note important uncertainties, and keep the answer \
         focused on this subtask only.",
        id = subtask.id,
        description = subtask.description,
    )
}
