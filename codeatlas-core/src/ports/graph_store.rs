// codeatlas-core/src/ports/graph_store.rs
//
// The final knowledge graph (spec.md §1 "Graph store driver ... abstracted
// as GraphStore.ExecuteBatch"). Writes are idempotent batches of node/edge
// upserts, keyed by POI id and `(source_id, target_id, type)` respectively
// (spec.md §3, §4.10).

use async_trait::async_trait;

use crate::error::AtlasError;

#[derive(Debug, Clone)]
pub struct PoiNode {
    pub id: String,
    pub name: String,
    pub poi_type: String,
    pub file_path: String,
    pub start_line: u32,
    pub end_line: u32,
}

#[derive(Debug, Clone)]
pub struct RelationshipEdge {
    pub source_id: String,
    pub target_id: String,
    pub rel_type: String,
    pub confidence: f64,
}

#[async_trait]
pub trait GraphStore: Send + Sync {
    /// `MERGE`s a batch of POI nodes on `id` (spec.md §4.10 step 1).
    async fn upsert_nodes(&self, nodes: &[PoiNode]) -> Result<(), AtlasError>;

    /// `MERGE`s a batch of relationship edges on `(source_id, target_id,
    /// type)` (spec.md §4.10 step 2).
    async fn upsert_edges(&self, edges: &[RelationshipEdge]) -> Result<(), AtlasError>;

    /// Deletes every node (and incident edges) whose `file_path` is in
    /// `paths`, in one batch (spec.md §4.11 sweep phase).
    async fn delete_nodes_by_file_path(&self, paths: &[String]) -> Result<usize, AtlasError>;

    async fn node_count(&self) -> Result<usize, AtlasError>;
    async fn edge_count(&self) -> Result<usize, AtlasError>;
}
