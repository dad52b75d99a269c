// codeatlas-core/src/infrastructure/adapters/llm_http.rs
//
// `LLMClient` over an OpenAI-compatible chat-completions endpoint via
// `reqwest`: one thin struct holding a configured client, methods that
// map transport errors into `InfrastructureError` variants.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::instrument;

use crate::error::AtlasError;
use crate::infrastructure::config::LlmConfig;
use crate::infrastructure::error::{InfrastructureError, LlmError};
use crate::ports::llm_client::{LLMClient, LlmResponse, TokenStats};

pub struct HttpLlmClient {
    client: reqwest::Client,
    endpoint: String,
    api_key: String,
    model: String,
}

impl HttpLlmClient {
    pub fn new(config: &LlmConfig) -> Result<Self, InfrastructureError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| InfrastructureError::Config(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            endpoint: config.endpoint.clone(),
            api_key: config.api_key.clone(),
            model: config.model.clone(),
        })
    }
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
    #[serde(default)]
    usage: Option<ChatUsage>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatResponseMessage,
}

#[derive(Deserialize)]
struct ChatResponseMessage {
    content: String,
}

#[derive(Deserialize, Default)]
struct ChatUsage {
    #[serde(default)]
    prompt_tokens: u32,
    #[serde(default)]
    completion_tokens: u32,
}

#[async_trait]
impl LLMClient for HttpLlmClient {
    #[instrument(skip(self, prompt))]
    async fn complete(&self, prompt: &str) -> Result<LlmResponse, AtlasError> {
        let body = ChatRequest {
            model: &self.model,
            messages: vec![ChatMessage {
                role: "user",
                content: prompt,
            }],
        };

        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| InfrastructureError::Llm(LlmError::Transport(e.to_string())))?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            return Err(AtlasError::Infrastructure(InfrastructureError::Llm(
                LlmError::Transport(format!("HTTP {status}: {text}")),
            )));
        }

        let parsed: ChatResponse = response
            .json()
            .await
            .map_err(|e| InfrastructureError::Llm(LlmError::Transport(e.to_string())))?;

        let text = parsed
            .choices
            .into_iter()
            .next()
            .map(|c| c.message.content)
            .ok_or_else(|| {
                AtlasError::Infrastructure(InfrastructureError::Llm(LlmError::Transport(
                    "empty choices array in LLM response".to_string(),
                )))
            })?;

        let usage = parsed.usage.unwrap_or_default();
        Ok(LlmResponse {
            text,
            tokens: TokenStats {
                prompt_tokens: usage.prompt_tokens,
                completion_tokens: usage.completion_tokens,
            },
        })
    }
}
