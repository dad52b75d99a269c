// codeatlas-core/src/ports/rel_store.rs
//
// What the application needs from the embedded relational store, without
// knowing how it is implemented — the shape of the outlet in the wall,
// not whether the power comes from sqlite, postgres, or something else.

use async_trait::async_trait;

use crate::domain::evidence::RelationshipEvidence;
use crate::domain::file::{File, FileStatus};
use crate::domain::manifest::RunManifest;
use crate::domain::outbox::{EventType, OutboxEvent};
use crate::domain::poi::Poi;
use crate::domain::relationship::Relationship;
use crate::error::AtlasError;

/// Everything a `RelStore` implementation must provide (spec.md §4.1).
///
/// Implementations must coalesce worker writes into batches (buffer +
/// periodic flush, max delay ~100ms or max batch ~200 rows) to avoid
/// writer contention (spec.md §4.1 "Guarantees"); callers should not
/// assume each call round-trips to disk immediately.
#[async_trait]
pub trait RelStore: Send + Sync {
    // --- Files ---
    async fn upsert_file(&self, file: &File) -> Result<(), AtlasError>;
    async fn mark_file_status(&self, file_id: &str, status: FileStatus) -> Result<(), AtlasError>;
    async fn mark_file_failed(&self, file_id: &str, reason: &str) -> Result<(), AtlasError>;
    async fn list_files_with_status(
        &self,
        run_id: &str,
        status: FileStatus,
    ) -> Result<Vec<File>, AtlasError>;
    async fn list_all_file_paths(&self, run_id: &str) -> Result<Vec<String>, AtlasError>;
    async fn mark_files_pending_deletion(&self, paths: &[String]) -> Result<usize, AtlasError>;
    async fn delete_files_by_path(&self, paths: &[String]) -> Result<usize, AtlasError>;

    // --- POIs ---
    /// Insert-or-replace by id: re-running the same file produces the
    /// same POI ids, so a duplicated job produces no duplicate rows
    /// (spec.md §4.6 "Idempotency").
    async fn insert_pois(&self, pois: &[Poi]) -> Result<(), AtlasError>;
    async fn list_pois_for_file(&self, file_id: &str) -> Result<Vec<Poi>, AtlasError>;
    async fn list_pois_for_run(&self, run_id: &str) -> Result<Vec<Poi>, AtlasError>;

    /// Inserts POIs, marks the file completed, and inserts the
    /// `file-analysis-finding` outbox row in one transaction (spec.md
    /// §4.6 step 5 — evidence/outbox visibility ordering).
    async fn complete_file_analysis(
        &self,
        file_id: &str,
        pois: &[Poi],
        outbox_payload_json: &str,
        run_id: &str,
    ) -> Result<(), AtlasError>;

    // --- Evidence & validated relationships ---
    /// Appends evidence rows and inserts one outbox event per
    /// relationship, in one transaction (spec.md §4.7 step 5).
    async fn append_evidence_with_outbox(
        &self,
        evidence: &[RelationshipEvidence],
        run_id: &str,
    ) -> Result<(), AtlasError>;
    async fn list_evidence_for_hash(
        &self,
        run_id: &str,
        relationship_hash: &str,
    ) -> Result<Vec<RelationshipEvidence>, AtlasError>;
    /// Atomically increments the evidence counter for a relationship hash
    /// and returns the new count (spec.md §4.9 step 2).
    async fn increment_evidence_count(
        &self,
        run_id: &str,
        relationship_hash: &str,
    ) -> Result<u32, AtlasError>;
    async fn evidence_count(&self, run_id: &str, relationship_hash: &str) -> Result<u32, AtlasError>;
    /// Other relationship hashes observed between the same ordered POI
    /// pair, excluding `relationship_hash` itself — used by the
    /// Reconciler's disagreement-penalty check (spec.md §4.9).
    async fn contradicting_hashes(
        &self,
        run_id: &str,
        source_poi_id: &str,
        target_poi_id: &str,
        relationship_hash: &str,
    ) -> Result<Vec<String>, AtlasError>;
    async fn upsert_validated_relationship(&self, relationship: &Relationship) -> Result<(), AtlasError>;
    async fn list_validated_relationships(&self, run_id: &str) -> Result<Vec<Relationship>, AtlasError>;

    // --- Directory summaries ---
    async fn insert_directory_summary_with_outbox(
        &self,
        run_id: &str,
        directory_path: &str,
        summary_text: &str,
        outbox_payload_json: &str,
    ) -> Result<(), AtlasError>;

    // --- Outbox ---
    async fn fetch_pending_outbox(&self, limit: usize) -> Result<Vec<OutboxEvent>, AtlasError>;
    async fn mark_outbox_published(&self, ids: &[i64]) -> Result<(), AtlasError>;
    async fn mark_outbox_failed(&self, id: i64, error: &str) -> Result<(), AtlasError>;
    async fn insert_outbox(
        &self,
        run_id: &str,
        event_type: EventType,
        payload_json: &str,
    ) -> Result<i64, AtlasError>;

    // --- Run manifest ---
    async fn save_manifest(&self, manifest: &RunManifest) -> Result<(), AtlasError>;
    async fn load_manifest(&self, run_id: &str) -> Result<Option<RunManifest>, AtlasError>;
}
