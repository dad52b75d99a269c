// codeatlas-core/src/domain/directory_summary.rs

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DirectorySummary {
    pub id: String,
    pub directory_path: String,
    pub run_id: String,
    pub summary_text: String,
}

/// Raw shape returned by the LLM for directory summarization (spec.md
/// §6): `{"summary","candidate_relationships":[{"from","to","type","reason"}]}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DirectorySummaryResponse {
    pub summary: String,
    #[serde(default)]
    pub candidate_relationships: Vec<crate::domain::outbox::CandidateRelationship>,
}
