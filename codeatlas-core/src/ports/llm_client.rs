// codeatlas-core/src/ports/llm_client.rs
//
// The raw LLM transport contract (spec.md §4.3, §1 "LLM provider wire
// format ... abstracted as LLMClient.Complete"). Concurrency bounding,
// retry, sanitization, and self-healing are layered on top of this trait
// (see `infrastructure::adapters::llm_bounded` and
// `infrastructure::llm_json`) rather than baked into it, so any transport
// — HTTP, a local stub, a future gRPC client — only needs to implement
// this one method.

use async_trait::async_trait;

use crate::error::AtlasError;

#[derive(Debug, Clone, Default)]
pub struct TokenStats {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
}

#[derive(Debug, Clone)]
pub struct LlmResponse {
    pub text: String,
    pub tokens: TokenStats,
}

#[async_trait]
pub trait LLMClient: Send + Sync {
    async fn complete(&self, prompt: &str) -> Result<LlmResponse, AtlasError>;
}
