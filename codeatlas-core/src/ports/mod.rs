pub mod clock;
pub mod graph_store;
pub mod llm_client;
pub mod metrics;
pub mod queue;
pub mod rel_store;

pub use clock::Clock;
pub use graph_store::GraphStore;
pub use llm_client::LLMClient;
pub use metrics::Metrics;
pub use queue::Queue;
pub use rel_store::RelStore;
