// codeatlas-core/src/infrastructure/llm_json.rs
//
// `LLMClient.CompleteJSON` (spec.md §4.3): sanitize, parse, and on
// failure re-invoke the LLM with a corrective prompt up to
// `MAX_SELF_HEAL_ATTEMPTS` times before surfacing `ErrLLMUnparseable`.

use serde::de::DeserializeOwned;
use tracing::{instrument, warn};

use crate::error::AtlasError;
use crate::infrastructure::error::{InfrastructureError, LlmError};
use crate::infrastructure::sanitizer::sanitize;
use crate::ports::llm_client::LLMClient;

pub const MAX_SELF_HEAL_ATTEMPTS: u32 = 2;

/// Calls `client.complete(prompt)`, sanitizes the response, and parses it
/// as `T`. On a parse failure, re-prompts with the prior output and error
/// folded in, up to `MAX_SELF_HEAL_ATTEMPTS` times, then returns
/// `AtlasError` wrapping `LlmError::Unparseable`.
#[instrument(skip(client, prompt))]
pub async fn complete_json<T: DeserializeOwned>(
    client: &dyn LLMClient,
    prompt: &str,
) -> Result<T, AtlasError> {
    let mut current_prompt = prompt.to_string();

    for attempt in 0..=MAX_SELF_HEAL_ATTEMPTS {
        let response = client.complete(&current_prompt).await?;
        let sanitized = sanitize(&response.text);

        match serde_json::from_str::<T>(&sanitized) {
            Ok(value) => return Ok(value),
            Err(parse_err) => {
                warn!(attempt, error = %parse_err, "LLM response failed to parse as JSON");
                if attempt == MAX_SELF_HEAL_ATTEMPTS {
                    return Err(AtlasError::Infrastructure(InfrastructureError::Llm(
                        LlmError::Unparseable,
                    )));
                }
                current_prompt = corrective_prompt(prompt, &response.text, &parse_err.to_string());
            }
        }
    }

    Err(AtlasError::Infrastructure(InfrastructureError::Llm(
        LlmError::Unparseable,
    )))
}

fn corrective_prompt(original_prompt: &str, prior_output: &str, error: &str) -> String {
    format!(
        "{original_prompt}\n\n---\nYour previous response could not be parsed as valid JSON.\n\
         Previous response:\n{prior_output}\n\nParse error: {error}\n\n\
         Respond again with ONLY valid JSON matching the requested shape."
    )
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::ports::llm_client::LlmResponse;
    use async_trait::async_trait;
    use serde::Deserialize;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[derive(Debug, Deserialize, PartialEq)]
    struct Shape {
        value: u32,
    }

    struct ScriptedClient {
        responses: Vec<&'static str>,
        call_count: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl LLMClient for ScriptedClient {
        async fn complete(&self, _prompt: &str) -> Result<LlmResponse, AtlasError> {
            let idx = self.call_count.fetch_add(1, Ordering::SeqCst);
            let text = self.responses[idx.min(self.responses.len() - 1)].to_string();
            Ok(LlmResponse {
                text,
                tokens: Default::default(),
            })
        }
    }

    #[tokio::test]
    async fn test_parses_clean_response_on_first_try() {
        let client = ScriptedClient {
            responses: vec![r#"{"value": 1}"#],
            call_count: Arc::new(AtomicUsize::new(0)),
        };
        let parsed: Shape = complete_json(&client, "prompt").await.unwrap();
        assert_eq!(parsed, Shape { value: 1 });
    }

    #[tokio::test]
    async fn test_self_heals_after_bad_json() {
        let client = ScriptedClient {
            responses: vec!["not json at all", r#"{"value": 2}"#],
            call_count: Arc::new(AtomicUsize::new(0)),
        };
        let parsed: Shape = complete_json(&client, "prompt").await.unwrap();
        assert_eq!(parsed, Shape { value: 2 });
    }

    #[tokio::test]
    async fn test_gives_up_after_max_self_heal_attempts() {
        let client = ScriptedClient {
            responses: vec!["not json", "still not json", "never json"],
            call_count: Arc::new(AtomicUsize::new(0)),
        };
        let result: Result<Shape, _> = complete_json(&client, "prompt").await;
        assert!(matches!(
            result,
            Err(AtlasError::Infrastructure(InfrastructureError::Llm(
                LlmError::Unparseable
            )))
        ));
    }
}
