// codeatlas-core/src/domain/evidence.rs

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::relationship::RelationshipType;

/// The analysis context a piece of evidence was produced in (GLOSSARY:
/// "Pass").
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Pass {
    IntraFile,
    IntraDirectory,
    Global,
    Deterministic,
}

/// One raw observation of a (possibly later validated) relationship,
/// produced by one analysis pass. Append-only within a run (spec.md §3).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RelationshipEvidence {
    pub id: String,
    pub relationship_hash: String,
    pub run_id: String,
    pub source_poi_id: String,
    pub target_poi_id: String,
    pub rel_type: RelationshipType,
    pub raw_confidence: f64,
    pub pass: Pass,
    /// Opaque payload (the raw LLM evidence text / candidate-relationship
    /// reason), kept for audit and for the Reconciler's disagreement check.
    pub payload: String,
    pub created_at: DateTime<Utc>,
}

impl RelationshipEvidence {
    pub fn new(
        relationship_hash: String,
        run_id: String,
        source_poi_id: String,
        target_poi_id: String,
        rel_type: RelationshipType,
        raw_confidence: f64,
        pass: Pass,
        payload: String,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            relationship_hash,
            run_id,
            source_poi_id,
            target_poi_id,
            rel_type,
            raw_confidence,
            pass,
            payload,
            created_at,
        }
    }
}
