//! Research planner: topic → ordered subtasks.
//!
//! The model is asked for a JSON array, but its output is untrusted text that
//! may wrap the array in prose or code fences. All leniency lives in
//! [`parse_subtask_list`]; the planner itself only sees a typed result.

use serde::Deserialize;
use tracing::{info, instrument, warn};

use fathom_provider::{LanguageModel, PromptRequest};
use fathom_shared::{FathomError, Result, Subtask};

/// Subtasks the prompt asks for; fewer is accepted with a warning.
pub const MIN_SUBTASKS: usize = 4;

const PLANNER_SYSTEM: &str = "You are a research planner. You decompose research topics \
into ordered, self-contained subtasks and answer with JSON only.";

/// Why a model response could not be turned into subtasks.
#[derive(Debug, thiserror::Error)]
pub enum ParseError {
    #[error("no JSON array found in model output")]
    NoList,

    #[error("malformed subtask list: {0}")]
    Malformed(String),

    #[error("subtask list is empty")]
    Empty,
}

#[derive(Debug, Deserialize)]
struct RawSubtask {
    id: RawId,
    #[serde(alias = "task")]
    description: String,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RawId {
    Text(String),
    Number(serde_json::Number),
}

impl RawId {
    fn into_string(self) -> String {
        match self {
            Self::Text(s) => s.trim().to_string(),
            Self::Number(n) => n.to_string(),
        }
    }
}

/// Extract the first well-formed list of `{id, description}` objects from `text`.
pub fn parse_subtask_list(text: &str) -> std::result::Result<Vec<Subtask>, ParseError> {
    let mut last_error: Option<serde_json::Error> = None;

    for (start, _) in text.match_indices('[') {
        let mut stream =
            serde_json::Deserializer::from_str(&text[start..]).into_iter::<Vec<RawSubtask>>();
        match stream.next() {
            Some(Ok(raw)) => return validate(raw),
            Some(Err(e)) => last_error = Some(e),
            None => {}
        }
    }

    match last_error {
        Some(e) => Err(ParseError::Malformed(e.to_string())),
        None => Err(ParseError::NoList),
    }
}

fn validate(raw: Vec<RawSubtask>) -> std::result::Result<Vec<Subtask>, ParseError> {
    if raw.is_empty() {
        return Err(ParseError::Empty);
    }

    raw.into_iter()
        .enumerate()
        .map(|(i, item)| {
            let id = item.id.into_string();
            let description = item.description.trim().to_string();
            if id.is_empty() {
                return Err(ParseError::Malformed(format!("subtask #{} has an empty id", i + 1)));
            }
            if description.is_empty() {
                return Err(ParseError::Malformed(format!(
                    "subtask {id} has an empty description"
                )));
            }
            Ok(Subtask { id, description })
        })
        .collect()
}

fn planning_prompt(topic: &str) -> String {
    format!(
        "Break the research topic below into an ordered list of at least {MIN_SUBTASKS} \
         subtasks. Together they must cover, in this order: a literature review of existing \
         knowledge, gathering of relevant data and evidence, analysis of that data, and a \
         synthesis of the conclusions.\n\n\
         Respond with ONLY a JSON array in exactly this shape, with no commentary:\n\
         [{{\"id\": \"1\", \"description\": \"...\"}}, {{\"id\": \"2\", \"description\": \"...\"}}]\n\n\
         Research topic: {topic}"
    )
}

/// Decomposes a topic into subtasks with a single model call.
pub struct ResearchPlanner<'a> {
    model: &'a dyn LanguageModel,
}

impl<'a> ResearchPlanner<'a> {
    pub fn new(model: &'a dyn LanguageModel) -> Self {
        Self { model }
    }

    /// Plan `topic`. Never returns an empty list; there is no retry.
    #[instrument(skip_all, fields(topic = %topic.trim()))]
    pub async fn plan(&self, topic: &str) -> Result<Vec<Subtask>> {
        let topic = topic.trim();
        if topic.is_empty() {
            return Err(FathomError::input("research topic must not be empty"));
        }

        let request = PromptRequest::new(planning_prompt(topic))
            .with_system(PLANNER_SYSTEM)
            .with_temperature(0.2);
        let response = self.model.invoke(request).await?;

        let subtasks = parse_subtask_list(&response)
            .map_err(|e| FathomError::planning(format!("could not parse subtasks: {e}")))?;

        if subtasks.len() < MIN_SUBTASKS {
            warn!(count = subtasks.len(), "planner returned fewer subtasks than requested");
        }
        info!(count = subtasks.len(), "research plan ready");

        Ok(subtasks)
    }
}
