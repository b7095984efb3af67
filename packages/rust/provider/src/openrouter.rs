//! OpenRouter backend (OpenAI-compatible chat completions).

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument, warn};

use fathom_shared::{FathomError, OpenRouterConfig, ProviderError, Result};

use crate::{LanguageModel, PromptRequest};

/// User-Agent string for API requests.
const USER_AGENT: &str = concat!("Fathom/", env!("CARGO_PKG_VERSION"));

/// Maximum number of error-body characters kept in an error message.
const ERROR_BODY_CHARS: usize = 300;

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<Choice>,
    #[serde(default)]
    error: Option<ApiError>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ApiError {
    #[serde(default)]
    code: Option<u16>,
    message: String,
}

/// Chat-completions client for OpenRouter or any OpenAI-compatible endpoint.
pub struct OpenRouterClient {
    client: Client,
    base_url: String,
    model: String,
    api_key: Option<String>,
}

impl OpenRouterClient {
    /// Build a client with an explicit API key (`None` makes every call fail
    /// with [`ProviderError::Unavailable`]).
    pub fn new(config: &OpenRouterConfig, api_key: Option<String>) -> Result<Self> {
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()
            .map_err(|e| FathomError::Network(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            model: config.default_model.clone(),
            api_key: api_key.filter(|k| !k.trim().is_empty()),
        })
    }

    /// Build a client reading the API key from the env var named in config.
    pub fn from_env(config: &OpenRouterConfig) -> Result<Self> {
        let api_key = std::env::var(&config.api_key_env).ok();
        if api_key.is_none() {
            warn!(var = %config.api_key_env, "API key env var not set; model calls will fail");
        }
        Self::new(config, api_key)
    }

    fn endpoint(&self) -> String {
        format!("{}/chat/completions", self.base_url)
    }
}

#[async_trait]
impl LanguageModel for OpenRouterClient {
    #[instrument(skip_all, fields(model = %self.model, prompt_chars = request.prompt.len()))]
    async fn invoke(&self, request: PromptRequest) -> std::result::Result<String, ProviderError> {
        let api_key = self
            .api_key
            .as_deref()
            .ok_or_else(|| ProviderError::Unavailable("API key is not configured".into()))?;

        let mut messages = Vec::with_capacity(2);
        if let Some(system) = request.system.as_deref() {
            messages.push(ChatMessage {
                role: "system",
                content: system,
            });
        }
        messages.push(ChatMessage {
            role: "user",
            content: &request.prompt,
        });

        let body = ChatRequest {
            model: &self.model,
            messages,
            max_tokens: request.max_tokens,
            temperature: request.temperature,
        };

        let response = self
            .client
            .post(self.endpoint())
            .bearer_auth(api_key)
            .header("X-Title", "Fathom")
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                if e.is_connect() || e.is_timeout() {
                    ProviderError::Unavailable(e.to_string())
                } else {
                    ProviderError::InvalidResponse(e.to_string())
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(status_error(status, &text));
        }

        let parsed: ChatResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::InvalidResponse(format!("failed to decode body: {e}")))?;

        if let Some(err) = parsed.error {
            let status = err
                .code
                .and_then(|c| StatusCode::from_u16(c).ok())
                .unwrap_or(StatusCode::BAD_GATEWAY);
            return Err(status_error(status, &err.message));
        }

        let text = parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .map(|c| c.trim().to_string())
            .filter(|c| !c.is_empty())
            .ok_or_else(|| ProviderError::InvalidResponse("response contained no text".into()))?;

        debug!(chars = text.len(), "completion received");
        Ok(text)
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}

/// Map a non-success status to the provider error taxonomy.
fn status_error(status: StatusCode, body: &str) -> ProviderError {
    let message: String = body.chars().take(ERROR_BODY_CHARS).collect();
    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
            ProviderError::Unavailable(format!("authentication rejected: {message}"))
        }
        StatusCode::PAYMENT_REQUIRED => ProviderError::QuotaExceeded(message),
        StatusCode::TOO_MANY_REQUESTS => ProviderError::RateLimited(message),
        _ => ProviderError::Upstream {
            status: status.as_u16(),
            message,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn config_for(server: &MockServer) -> OpenRouterConfig {
        OpenRouterConfig {
            base_url: format!("{}/api/v1", server.uri()),
            default_model: "test/model".into(),
            request_timeout_secs: 5,
            ..OpenRouterConfig::default()
        }
    }

    #[tokio::test]
    async fn returns_first_choice_text() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/v1/chat/completions"))
            .and(header("authorization", "Bearer sk-test"))
            .and(body_partial_json(serde_json::json!({
                "model": "test/model",
                "max_tokens": 64,
                "messages": [{"role": "user", "content": "hello"}]
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "choices": [{"message": {"role": "assistant", "content": "  hi there \n"}}]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let client = OpenRouterClient::new(&config_for(&server), Some("sk-test".into())).unwrap();
        let text = client
            .invoke(PromptRequest::new("hello").with_max_tokens(64))
            .await
            .unwrap();
        assert_eq!(text, "hi there");
        assert_eq!(client.model_name(), "test/model");
    }

    #[tokio::test]
    async fn missing_key_is_unavailable_without_calling_out() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let client = OpenRouterClient::new(&config_for(&server), Some("  ".into())).unwrap();
        let err = client.invoke(PromptRequest::new("hello")).await.unwrap_err();
        assert!(err.is_unavailable());
    }

    #[tokio::test]
    async fn status_codes_map_to_taxonomy() {
        let cases = [
            (429, "rate"),
            (402, "quota"),
            (401, "unavailable"),
            (503, "upstream"),
        ];
        for (status, kind) in cases {
            let server = MockServer::start().await;
            Mock::given(method("POST"))
                .respond_with(ResponseTemplate::new(status).set_body_string("nope"))
                .mount(&server)
                .await;

            let client =
                OpenRouterClient::new(&config_for(&server), Some("sk-test".into())).unwrap();
            let err = client.invoke(PromptRequest::new("x")).await.unwrap_err();
            let matched = match kind {
                "rate" => matches!(err, ProviderError::RateLimited(_)),
                "quota" => matches!(err, ProviderError::QuotaExceeded(_)),
                "unavailable" => err.is_unavailable(),
                _ => matches!(err, ProviderError::Upstream { status: 503, .. }),
            };
            assert!(matched, "status {status} mapped to {err:?}");
        }
    }

    #[tokio::test]
    async fn embedded_error_object_is_surfaced() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "error": {"code": 429, "message": "upstream busy"}
            })))
            .mount(&server)
            .await;

        let client = OpenRouterClient::new(&config_for(&server), Some("sk-test".into())).unwrap();
        let err = client.invoke(PromptRequest::new("x")).await.unwrap_err();
        assert_eq!(err, ProviderError::RateLimited("upstream busy".into()));
    }

    #[tokio::test]
    async fn empty_choice_is_invalid() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "choices": [{"message": {"content": ""}}]
            })))
            .mount(&server)
            .await;

        let client = OpenRouterClient::new(&config_for(&server), Some("sk-test".into())).unwrap();
        let err = client.invoke(PromptRequest::new("x")).await.unwrap_err();
        assert!(matches!(err, ProviderError::InvalidResponse(_)));
    }

    #[tokio::test]
    async fn unreachable_endpoint_is_unavailable() {
        let config = OpenRouterConfig {
            base_url: "http://127.0.0.1:9/api/v1".into(),
            request_timeout_secs: 2,
            ..OpenRouterConfig::default()
        };
        let client = OpenRouterClient::new(&config, Some("sk-test".into())).unwrap();
        let err = client.invoke(PromptRequest::new("x")).await.unwrap_err();
        assert!(err.is_unavailable(), "{err:?}");
    }
}
