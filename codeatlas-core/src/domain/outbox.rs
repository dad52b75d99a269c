// codeatlas-core/src/domain/outbox.rs
//
// The transactional outbox row: the single mechanism by which in-DB
// writes become queue publications (spec.md §9 "Outbox vs. direct
// publish").

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutboxStatus {
    Pending,
    Published,
    Failed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum EventType {
    FileAnalysisFinding,
    RelationshipFinding,
    DirectorySummaryFinding,
}

impl EventType {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventType::FileAnalysisFinding => "file-analysis-finding",
            EventType::RelationshipFinding => "relationship-finding",
            EventType::DirectorySummaryFinding => "directory-summary-finding",
        }
    }
}

/// A row in the outbox table. `id` is monotonic and assigned by the
/// RelStore on insert; rows transition `pending -> published` exactly
/// once, owned by the OutboxPublisher.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutboxEvent {
    pub id: i64,
    pub run_id: String,
    pub event_type: EventType,
    pub payload_json: String,
    pub status: OutboxStatus,
    pub attempts: u32,
    pub created_at: chrono::DateTime<chrono::Utc>,
    pub published_at: Option<chrono::DateTime<chrono::Utc>>,
}

/// Payload for a `file-analysis-finding` event (spec.md §4.4 fan-out rule).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileAnalysisFindingPayload {
    pub file_id: String,
    pub file_path: String,
    pub run_id: String,
    pub pois: Vec<crate::domain::poi::Poi>,
}

/// Payload for a `relationship-finding` event (spec.md §4.7 step 5).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RelationshipFindingPayload {
    pub run_id: String,
    pub evidence: crate::domain::evidence::RelationshipEvidence,
}

/// Payload for a `directory-summary-finding` event (spec.md §4.8 step 4).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DirectorySummaryFindingPayload {
    pub run_id: String,
    pub directory_path: String,
    pub candidate_relationships: Vec<CandidateRelationship>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CandidateRelationship {
    pub from: String,
    pub to: String,
    #[serde(rename = "type")]
    pub rel_type: String,
    pub reason: String,
}

/// Job payload enqueued by the publisher for `relationship-analysis-poi`
/// (spec.md §4.4 fan-out rule: one job per POI).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RelationshipJobPayload {
    pub primary_poi: crate::domain::poi::Poi,
    pub contextual_pois: Vec<crate::domain::poi::Poi>,
    pub file_path: String,
    pub run_id: String,
}
