// codeatlas-core/src/error.rs

use crate::domain::error::DomainError;
use crate::infrastructure::error::InfrastructureError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AtlasError {
    // --- DOMAIN ERRORS (contract violations, invalid confidence, bad hashes) ---
    #[error(transparent)]
    Domain(#[from] DomainError),

    // --- INFRASTRUCTURE ERRORS (RelStore, Queue, LLM, GraphStore transport) ---
    #[error(transparent)]
    Infrastructure(#[from] InfrastructureError),

    // --- GENERIC / APPLICATION ERRORS ---
    #[error("Internal error: {0}")]
    Internal(String),

    // --- FATAL (spec.md §7 "Fatal" row: pipeline aborts, exit code 3) ---
    #[error("Fatal pipeline error: {0}")]
    Fatal(String),

    #[error("Run canceled")]
    Canceled,
}

impl From<std::io::Error> for AtlasError {
    fn from(err: std::io::Error) -> Self {
        AtlasError::Infrastructure(InfrastructureError::Io(err))
    }
}

impl AtlasError {
    /// Maps to the CLI exit codes of spec.md §6.
    pub fn exit_code(&self) -> i32 {
        match self {
            AtlasError::Fatal(_) => 3,
            AtlasError::Canceled => 130,
            AtlasError::Infrastructure(InfrastructureError::Config(_)) => 2,
            _ => 1,
        }
    }
}
