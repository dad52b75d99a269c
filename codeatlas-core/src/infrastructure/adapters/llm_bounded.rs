// codeatlas-core/src/infrastructure/adapters/llm_bounded.rs
//
// Wraps any `LLMClient` with a concurrency limiter (`maxLLMConcurrency`,
// spec.md §6) and a retry-with-backoff policy for transient transport
// errors, via `tokio::sync::Semaphore` and `backon`. Kept as a decorator
// rather than baked into `HttpLlmClient` so the stub client can be
// wrapped identically in tests.

use async_trait::async_trait;
use backon::{ExponentialBuilder, Retryable};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tracing::warn;

use crate::error::AtlasError;
use crate::infrastructure::error::InfrastructureError;
use crate::ports::llm_client::{LLMClient, LlmResponse};

pub struct BoundedLlmClient {
    inner: Arc<dyn LLMClient>,
    semaphore: Arc<Semaphore>,
}

impl BoundedLlmClient {
    pub fn new(inner: Arc<dyn LLMClient>, max_concurrency: usize) -> Self {
        Self {
            inner,
            semaphore: Arc::new(Semaphore::new(max_concurrency.max(1))),
        }
    }
}

#[async_trait]
impl LLMClient for BoundedLlmClient {
    async fn complete(&self, prompt: &str) -> Result<LlmResponse, AtlasError> {
        let _permit = self
            .semaphore
            .acquire()
            .await
            .map_err(|_| AtlasError::Internal("LLM concurrency semaphore closed".to_string()))?;

        let inner = Arc::clone(&self.inner);
        let prompt = prompt.to_string();

        (|| {
            let inner = Arc::clone(&inner);
            let prompt = prompt.clone();
            async move { inner.complete(&prompt).await }
        })
        .retry(
            ExponentialBuilder::default()
                .with_min_delay(Duration::from_millis(250))
                .with_max_delay(Duration::from_secs(16))
                .with_max_times(3),
        )
        .when(|err: &AtlasError| is_retryable(err))
        .notify(|err, delay| {
            warn!(error = %err, ?delay, "retrying LLM call after transient failure");
        })
        .await
    }
}

fn is_retryable(err: &AtlasError) -> bool {
    matches!(
        err,
        AtlasError::Infrastructure(InfrastructureError::Llm(
            crate::infrastructure::error::LlmError::Transport(_) | crate::infrastructure::error::LlmError::Busy
        ))
    )
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::infrastructure::adapters::llm_stub::StubLlmClient;

    #[tokio::test]
    async fn test_passes_through_successful_completion() {
        let stub: Arc<dyn LLMClient> = Arc::new(StubLlmClient::new(vec!["ok".to_string()]));
        let bounded = BoundedLlmClient::new(stub, 2);
        let response = bounded.complete("hi").await.unwrap();
        assert_eq!(response.text, "ok");
    }
}
