// codeatlas-core/src/infrastructure/error.rs

use miette::Diagnostic;
use thiserror::Error;

#[derive(Error, Debug, Diagnostic)]
pub enum StoreError {
    #[error("RelStore engine error: {0}")]
    #[diagnostic(
        code(codeatlas::infra::store::sqlite),
        help("An error occurred inside the embedded sqlite engine.")
    )]
    Sqlite(#[from] rusqlite::Error),

    #[error("RelStore transaction exceeded its timeout")]
    #[diagnostic(code(codeatlas::infra::store::timeout))]
    Timeout,
}

#[derive(Error, Debug, Diagnostic)]
pub enum QueueError {
    #[error("Queue '{0}' is paused")]
    #[diagnostic(code(codeatlas::infra::queue::paused))]
    Paused(String),

    #[error("Job not found: {0}")]
    #[diagnostic(code(codeatlas::infra::queue::job_not_found))]
    JobNotFound(String),
}

#[derive(Error, Debug, Diagnostic)]
pub enum LlmError {
    #[error("LLM transport error: {0}")]
    #[diagnostic(
        code(codeatlas::infra::llm::transport),
        help("Check the endpoint/apiKey/model in `llm` config.")
    )]
    Transport(String),

    #[error("LLM response was unparseable after retries and self-heal attempts")]
    #[diagnostic(
        code(codeatlas::infra::llm::unparseable),
        help("The job should be DLQ'd; the pipeline continues without it.")
    )]
    Unparseable,

    #[error("LLM concurrency limiter is busy")]
    #[diagnostic(code(codeatlas::infra::llm::busy))]
    Busy,
}

#[derive(Error, Debug, Diagnostic)]
pub enum GraphError {
    #[error("Graph store batch error: {0}")]
    #[diagnostic(code(codeatlas::infra::graph::batch))]
    Batch(String),
}

#[derive(Error, Debug, Diagnostic)]
pub enum InfrastructureError {
    #[error(transparent)]
    #[diagnostic(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Queue(#[from] QueueError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Llm(#[from] LlmError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Graph(#[from] GraphError),

    #[error("File System Error: {0}")]
    #[diagnostic(
        code(codeatlas::infra::io),
        help("Check file permissions or path validity.")
    )]
    Io(#[from] std::io::Error),

    #[error("YAML Parsing Error: {0}")]
    #[diagnostic(code(codeatlas::infra::yaml), help("Check your YAML syntax."))]
    Yaml(#[from] serde_yaml::Error),

    #[error("JSON Error: {0}")]
    #[diagnostic(code(codeatlas::infra::json))]
    Json(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    #[diagnostic(code(codeatlas::infra::config))]
    Config(String),

    #[error("Project configuration not found at '{0}'")]
    #[diagnostic(code(codeatlas::infra::config_missing))]
    ConfigNotFound(String),
}

impl From<rusqlite::Error> for InfrastructureError {
    fn from(err: rusqlite::Error) -> Self {
        InfrastructureError::Store(StoreError::Sqlite(err))
    }
}
