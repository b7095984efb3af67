//! Language-model capability for Fathom.
//!
//! The research pipeline only needs `invoke(prompt) -> text`. This crate
//! defines that seam as the [`LanguageModel`] trait and ships one backend,
//! [`OpenRouterClient`], speaking the OpenAI-compatible chat API.

mod openrouter;

use async_trait::async_trait;

pub use fathom_shared::ProviderError;
pub use openrouter::OpenRouterClient;

/// A single prompt plus optional generation limits.
#[derive(Debug, Clone, PartialEq)]
pub struct PromptRequest {
    /// Instructions sent ahead of the prompt, if any.
    pub system: Option<String>,
    /// The user prompt.
    pub prompt: String,
    /// Upper bound on generated tokens.
    pub max_tokens: Option<u32>,
    /// Sampling temperature.
    pub temperature: Option<f32>,
}

impl PromptRequest {
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            system: None,
            prompt: prompt.into(),
            max_tokens: None,
            temperature: None,
        }
    }

    pub fn with_system(mut self, system: impl Into<String>) -> Self {
        self.system = Some(system.into());
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }
}

/// Provider-agnostic text generation.
///
/// Implementations must be safe to share across tasks; the pipeline holds
/// them behind `Arc<dyn LanguageModel>`.
#[async_trait]
pub trait LanguageModel: Send + Sync {
    /// Generate a completion for `request`.
    async fn invoke(&self, request: PromptRequest) -> Result<String, ProviderError>;

    /// Model identifier for tracing.
    fn model_name(&self) -> &str;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prompt_request_builder() {
        let req = PromptRequest::new("hello")
            .with_system("be brief")
            .with_max_tokens(256)
            .with_temperature(0.2);
        assert_eq!(req.prompt, "hello");
        assert_eq!(req.system.as_deref(), Some("be brief"));
        assert_eq!(req.max_tokens, Some(256));
        assert_eq!(req.temperature, Some(0.2));
    }
}
