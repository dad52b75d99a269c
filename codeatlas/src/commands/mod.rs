// codeatlas/src/commands/mod.rs

pub mod dlq;
pub mod reconcile;
pub mod run;
pub mod sweep;

use std::path::Path;
use std::sync::Arc;

use codeatlas_core::infrastructure::adapters::graph_store_memory::InMemoryGraphStore;
use codeatlas_core::infrastructure::adapters::llm_bounded::BoundedLlmClient;
use codeatlas_core::infrastructure::adapters::llm_http::HttpLlmClient;
use codeatlas_core::infrastructure::adapters::llm_stub::StubLlmClient;
use codeatlas_core::infrastructure::adapters::metrics_tracing::TracingMetrics;
use codeatlas_core::infrastructure::adapters::queue_memory::InMemoryQueue;
use codeatlas_core::infrastructure::adapters::sqlite_rel_store::SqliteRelStore;
use codeatlas_core::infrastructure::config::load_run_options;
use codeatlas_core::ports::clock::SystemClock;
use codeatlas_core::ports::llm_client::LLMClient;
use codeatlas_core::{PipelineContext, RunOptions};

/// Builds the `PipelineContext` every subcommand runs against: loads
/// `RunOptions` from the project directory, then wires one concrete
/// adapter per port.
pub fn build_context(
    project_dir: &Path,
    offline: bool,
) -> Result<PipelineContext, codeatlas_core::infrastructure::error::InfrastructureError> {
    let options: RunOptions = load_run_options(project_dir)?;

    let rel_store: Arc<dyn codeatlas_core::ports::rel_store::RelStore> =
        Arc::new(SqliteRelStore::new(&options.rel_store.path)?);
    let queue: Arc<dyn codeatlas_core::ports::queue::Queue> = Arc::new(InMemoryQueue::new());
    let graph_store: Arc<dyn codeatlas_core::ports::graph_store::GraphStore> =
        Arc::new(InMemoryGraphStore::new());

    let llm_inner: Arc<dyn LLMClient> = if offline {
        Arc::new(StubLlmClient::new(vec![
            r#"{"pois": []}"#.to_string(),
        ]))
    } else {
        Arc::new(HttpLlmClient::new(&options.llm)?)
    };
    let llm_client: Arc<dyn LLMClient> =
        Arc::new(BoundedLlmClient::new(llm_inner, options.max_llm_concurrency));

    Ok(PipelineContext {
        rel_store,
        queue,
        llm_client,
        graph_store,
        clock: Arc::new(SystemClock),
        metrics: Arc::new(TracingMetrics),
        options,
        root_path: project_dir.to_path_buf(),
    })
}

pub fn new_run_id() -> String {
    uuid::Uuid::new_v4().to_string()
}
