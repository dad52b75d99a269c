// codeatlas-core/src/infrastructure/adapters/llm_stub.rs
//
// A scripted `LLMClient` test double for tests and for `codeatlas run
// --offline`: cycles through a fixed response list, then holds the last
// one indefinitely.

use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use crate::error::AtlasError;
use crate::ports::llm_client::{LLMClient, LlmResponse, TokenStats};

pub struct StubLlmClient {
    responses: Mutex<Vec<String>>,
    cursor: AtomicUsize,
}

impl StubLlmClient {
    pub fn new(responses: Vec<String>) -> Self {
        Self {
            responses: Mutex::new(responses),
            cursor: AtomicUsize::new(0),
        }
    }

    /// Always answers with an empty-POI / empty-relationship response,
    /// useful for dry-running the pipeline shape without a real model.
    pub fn empty() -> Self {
        Self::new(vec![r#"{"pois":[]}"#.to_string()])
    }
}

#[async_trait]
impl LLMClient for StubLlmClient {
    async fn complete(&self, _prompt: &str) -> Result<LlmResponse, AtlasError> {
        let responses = self
            .responses
            .lock()
            .map_err(|_| AtlasError::Internal("StubLlmClient mutex poisoned".to_string()))?;
        if responses.is_empty() {
            return Err(AtlasError::Internal("StubLlmClient has no scripted responses".to_string()));
        }
        let idx = self.cursor.fetch_add(1, Ordering::SeqCst).min(responses.len() - 1);
        Ok(LlmResponse {
            text: responses[idx].clone(),
            tokens: TokenStats::default(),
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_cycles_through_scripted_responses_then_holds_last() {
        let client = StubLlmClient::new(vec!["a".to_string(), "b".to_string()]);
        assert_eq!(client.complete("x").await.unwrap().text, "a");
        assert_eq!(client.complete("x").await.unwrap().text, "b");
        assert_eq!(client.complete("x").await.unwrap().text, "b");
    }
}
