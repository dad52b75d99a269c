// codeatlas-core/src/domain/file.rs

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FileStatus {
    Pending,
    Processing,
    Completed,
    Failed,
    PendingDeletion,
}

/// First-match-wins classification applied during discovery (spec.md
/// §4.5 step 2).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SpecialType {
    Manifest,
    Entrypoint,
    Config,
    Schema,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct File {
    pub id: String,
    pub path: String,
    pub checksum: String,
    pub status: FileStatus,
    pub special_type: Option<SpecialType>,
    pub run_id: String,
}

impl File {
    pub fn new(path: String, checksum: String, run_id: String, special_type: Option<SpecialType>) -> Self {
        Self {
            id: Self::compute_id(&path),
            path,
            checksum,
            status: FileStatus::Pending,
            special_type,
            run_id,
        }
    }

    /// File ids are derived from the (unique) path rather than a random
    /// uuid so `UpsertFile` is naturally idempotent across runs.
    pub fn compute_id(path: &str) -> String {
        blake3::hash(path.as_bytes()).to_hex().to_string()
    }
}

/// One configured `{regex, type}` pair from `specialFilePatterns`
/// (spec.md §4.5 / §6).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpecialFilePatternSpec {
    pub regex: String,
    #[serde(rename = "type")]
    pub special_type: SpecialType,
}
