pub mod patterns;
pub mod run_options;

pub use run_options::{load_run_options, LlmConfig, QueueConfig, RelStoreConfig, RunOptions};
