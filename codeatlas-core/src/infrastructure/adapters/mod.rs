pub mod graph_store_memory;
pub mod llm_bounded;
pub mod llm_http;
pub mod llm_stub;
pub mod metrics_tracing;
pub mod queue_memory;
pub mod sqlite_rel_store;
