// codeatlas-core/src/application/graph_builder.rs
//
// GraphBuilder (spec.md §4.10): the finalization stage. Streams every POI
// and every validated relationship for the run into the GraphStore in
// batches, both idempotent so a retried finalization run never duplicates
// nodes or edges. Driven directly from `pipeline.rs` once the run has
// fully quiesced, rather than through a queue: relationship jobs are
// created dynamically via the outbox well after the file-analysis jobs
// EntityScout seeds are acked, so a `depends_on` rooted only in those ids
// would make finalization dequeue-eligible before any relationship
// evidence exists (the bug spec.md §4.10 "runs only after all analysis
// work is complete" guards against).

use std::collections::HashMap;
use std::time::Duration;

use backon::{ExponentialBuilder, Retryable};
use tracing::{instrument, warn};

use crate::application::pipeline::PipelineContext;
use crate::domain::file::FileStatus;
use crate::error::AtlasError;
use crate::ports::graph_store::{PoiNode, RelationshipEdge};

/// Batch size for GraphStore upserts (spec.md §4.10 "batched ~1000 rows").
const BATCH_SIZE: usize = 1000;

/// Builds the graph for `run_id`, retrying the whole pass on a transient
/// store error rather than leaving the run with a partially-built graph.
#[instrument(skip(ctx), fields(run_id))]
pub async fn run_graph_finalization(ctx: &PipelineContext, run_id: &str) -> Result<(), AtlasError> {
    (|| build_graph(ctx, run_id))
        .retry(
            ExponentialBuilder::default()
                .with_min_delay(Duration::from_millis(250))
                .with_max_delay(Duration::from_secs(8))
                .with_max_times(3),
        )
        .notify(|err, delay| {
            warn!(error = %err, ?delay, "graph finalization failed transiently, retrying");
        })
        .await
}

async fn build_graph(ctx: &PipelineContext, run_id: &str) -> Result<(), AtlasError> {
    let files = ctx.rel_store.list_files_with_status(run_id, FileStatus::Completed).await?;
    let path_by_file_id: HashMap<String, String> =
        files.into_iter().map(|f| (f.id, f.path)).collect();

    let pois = ctx.rel_store.list_pois_for_run(run_id).await?;
    for chunk in pois.chunks(BATCH_SIZE) {
        let nodes: Vec<PoiNode> = chunk
            .iter()
            .map(|p| PoiNode {
                id: p.id.clone(),
                name: p.name.clone(),
                poi_type: p.poi_type.clone(),
                file_path: path_by_file_id.get(&p.file_id).cloned().unwrap_or_default(),
                start_line: p.start_line,
                end_line: p.end_line,
            })
            .collect();
        ctx.graph_store.upsert_nodes(&nodes).await?;
    }

    let relationships = ctx.rel_store.list_validated_relationships(run_id).await?;
    for chunk in relationships.chunks(BATCH_SIZE) {
        let edges: Vec<RelationshipEdge> = chunk
            .iter()
            .map(|r| RelationshipEdge {
                source_id: r.source_poi_id.clone(),
                target_id: r.target_poi_id.clone(),
                rel_type: r.rel_type.as_str().to_string(),
                confidence: r.confidence,
            })
            .collect();
        ctx.graph_store.upsert_edges(&edges).await?;
    }

    ctx.metrics.incr_counter("graph_finalized_runs", 1);
    Ok(())
}
