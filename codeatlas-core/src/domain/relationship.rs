// codeatlas-core/src/domain/relationship.rs

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::domain::error::DomainError;

/// The closed set of relationship types a RelationshipWorker may emit
/// (spec.md §4.7 step 3). Anything else is discarded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum RelationshipType {
    Calls,
    Imports,
    Uses,
    Extends,
    Implements,
    Contains,
    Writes,
    Reads,
}

impl RelationshipType {
    pub fn as_str(&self) -> &'static str {
        match self {
            RelationshipType::Calls => "CALLS",
            RelationshipType::Imports => "IMPORTS",
            RelationshipType::Uses => "USES",
            RelationshipType::Extends => "EXTENDS",
            RelationshipType::Implements => "IMPLEMENTS",
            RelationshipType::Contains => "CONTAINS",
            RelationshipType::Writes => "WRITES",
            RelationshipType::Reads => "READS",
        }
    }
}

impl fmt::Display for RelationshipType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for RelationshipType {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_uppercase().as_str() {
            "CALLS" => Ok(RelationshipType::Calls),
            "IMPORTS" => Ok(RelationshipType::Imports),
            "USES" => Ok(RelationshipType::Uses),
            "EXTENDS" => Ok(RelationshipType::Extends),
            "IMPLEMENTS" => Ok(RelationshipType::Implements),
            "CONTAINS" => Ok(RelationshipType::Contains),
            "WRITES" => Ok(RelationshipType::Writes),
            "READS" => Ok(RelationshipType::Reads),
            other => Err(DomainError::UnknownRelationshipType(other.to_string())),
        }
    }
}

/// `relationship_hash = H(source_poi_id ‖ ":" ‖ target_poi_id ‖ ":" ‖
/// uppercase(type))` (spec.md §3 invariants), computed identically by
/// every component.
pub fn relationship_hash(source_poi_id: &str, target_poi_id: &str, rel_type: RelationshipType) -> String {
    let mut hasher = blake3::Hasher::new();
    hasher.update(source_poi_id.as_bytes());
    hasher.update(b":");
    hasher.update(target_poi_id.as_bytes());
    hasher.update(b":");
    hasher.update(rel_type.as_str().as_bytes());
    hasher.finalize().to_hex().to_string()
}

/// The validated relationship row (spec.md §3 `Relationship`).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Relationship {
    pub id: String,
    pub relationship_hash: String,
    pub run_id: String,
    pub source_poi_id: String,
    pub target_poi_id: String,
    pub rel_type: RelationshipType,
    pub confidence: f64,
    pub status: RelationshipStatus,
    pub evidence_count: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RelationshipStatus {
    Validated,
    Rejected,
}

/// Raw shape returned by the LLM for relationship extraction (spec.md §6):
/// `{"relationships":[{"from","to","type","evidence","confidence"}]}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawRelationship {
    pub from: String,
    pub to: String,
    #[serde(rename = "type")]
    pub rel_type: String,
    #[serde(default)]
    pub evidence: String,
    pub confidence: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RelationshipExtractionResponse {
    pub relationships: Vec<RawRelationship>,
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_relationship_hash_deterministic_and_order_sensitive() {
        let a = relationship_hash("p1", "p2", RelationshipType::Calls);
        let b = relationship_hash("p1", "p2", RelationshipType::Calls);
        let c = relationship_hash("p2", "p1", RelationshipType::Calls);
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn test_relationship_hash_type_sensitive() {
        let calls = relationship_hash("p1", "p2", RelationshipType::Calls);
        let imports = relationship_hash("p1", "p2", RelationshipType::Imports);
        assert_ne!(calls, imports);
    }

    #[test]
    fn test_from_str_roundtrip() {
        for t in [
            RelationshipType::Calls,
            RelationshipType::Imports,
            RelationshipType::Uses,
            RelationshipType::Extends,
            RelationshipType::Implements,
            RelationshipType::Contains,
            RelationshipType::Writes,
            RelationshipType::Reads,
        ] {
            let parsed: RelationshipType = t.as_str().parse().unwrap();
            assert_eq!(parsed, t);
        }
    }

    #[test]
    fn test_unknown_type_is_rejected() {
        let result: Result<RelationshipType, _> = "FRIENDS_WITH".parse();
        assert!(matches!(result, Err(DomainError::UnknownRelationshipType(_))));
    }
}
