// codeatlas-core/src/domain/manifest.rs
//
// Per-run metadata describing expected work (spec.md §3 `RunManifest`,
// §4.5 step 6, §9 "Run manifest contract"). Populated in two stages:
// EntityScout writes `total_files` / `files_by_directory` up front;
// `expected_evidence_counts` almost always stays empty because
// EntityScout cannot predict discovered relationships ahead of time —
// the Validator must tolerate that and fall back to the quiescence-window
// rule (spec.md §4.9, §9).

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct RunManifest {
    pub run_id: String,
    pub total_files: usize,
    pub files_by_directory: HashMap<String, usize>,
    /// `relationship_hash -> expected_evidence_count`. Populated lazily
    /// and partially, if ever; absence is the common case (spec.md §9).
    #[serde(default)]
    pub expected_evidence_counts: HashMap<String, u32>,
}

impl RunManifest {
    pub fn new(run_id: String) -> Self {
        Self {
            run_id,
            ..Default::default()
        }
    }

    pub fn expected_count_for(&self, relationship_hash: &str) -> Option<u32> {
        self.expected_evidence_counts.get(relationship_hash).copied()
    }
}
