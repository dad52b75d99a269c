// codeatlas-core/src/domain/error.rs

use miette::Diagnostic;
use thiserror::Error;

#[derive(Error, Debug, Diagnostic)]
pub enum DomainError {
    #[error("Relationship `from` POI ({actual}) does not match primary POI ({expected})")]
    #[diagnostic(
        code(codeatlas::domain::from_mismatch),
        help("The item was discarded; this is a contract violation, not a retryable error.")
    )]
    FromMismatch { expected: String, actual: String },

    #[error("Unknown relationship type: {0}")]
    #[diagnostic(code(codeatlas::domain::unknown_relationship_type))]
    UnknownRelationshipType(String),

    #[error("Confidence {0} is outside the [0,1] range")]
    #[diagnostic(code(codeatlas::domain::confidence_range))]
    ConfidenceOutOfRange(f64),

    #[error("POI not found: {0}")]
    #[diagnostic(code(codeatlas::domain::poi_not_found))]
    PoiNotFound(String),

    #[error("File not found in manifest: {0}")]
    #[diagnostic(code(codeatlas::domain::file_not_found))]
    FileNotFound(String),

    #[error("Manifest error: {0}")]
    #[diagnostic(code(codeatlas::domain::manifest))]
    ManifestError(String),
}
