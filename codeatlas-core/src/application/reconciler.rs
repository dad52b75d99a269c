// codeatlas-core/src/application/reconciler.rs
//
// Reconciler (spec.md §4.9): loads all evidence for a relationship hash,
// computes final confidence, and upserts the validated (or rejected) row.

use serde::Deserialize;
use tracing::{instrument, warn};
use uuid::Uuid;

use crate::application::pipeline::PipelineContext;
use crate::domain::confidence::{compute_confidence, ConfidenceInputs};
use crate::domain::evidence::Pass;
use crate::domain::relationship::{Relationship, RelationshipStatus};
use crate::ports::queue::Outcome;

#[derive(Debug, Deserialize)]
pub struct ReconciliationJobPayload {
    pub run_id: String,
    pub relationship_hash: String,
}

#[instrument(skip(ctx, payload), fields(relationship_hash = tracing::field::Empty))]
pub async fn handle_reconciliation_job(ctx: &PipelineContext, payload: &str) -> Outcome {
    let job: ReconciliationJobPayload = match serde_json::from_str(payload) {
        Ok(job) => job,
        Err(e) => return Outcome::Dead(format!("malformed reconciliation payload: {e}")),
    };

    match process_job(ctx, &job).await {
        Ok(()) => Outcome::Ack,
        Err(e) => {
            warn!(error = %e, "reconciliation failed transiently, retrying");
            Outcome::Retry(std::time::Duration::from_secs(2))
        }
    }
}

async fn process_job(
    ctx: &PipelineContext,
    job: &ReconciliationJobPayload,
) -> Result<(), crate::error::AtlasError> {
    let evidence = ctx
        .rel_store
        .list_evidence_for_hash(&job.run_id, &job.relationship_hash)
        .await?;

    let Some(first) = evidence.first() else {
        return Ok(());
    };

    let contradicting = ctx
        .rel_store
        .contradicting_hashes(&job.run_id, &first.source_poi_id, &first.target_poi_id, &job.relationship_hash)
        .await?;

    let inputs = ConfidenceInputs {
        raw_confidences: evidence.iter().map(|e| e.raw_confidence).collect(),
        contradicting_passes: contradicting.len() as u32,
        has_deterministic_evidence: evidence.iter().any(|e| e.pass == Pass::Deterministic),
    };
    let confidence = compute_confidence(&inputs);

    let status = if confidence >= ctx.options.accept_threshold {
        RelationshipStatus::Validated
    } else {
        RelationshipStatus::Rejected
    };

    let relationship = Relationship {
        id: Uuid::new_v4().to_string(),
        relationship_hash: job.relationship_hash.clone(),
        run_id: job.run_id.clone(),
        source_poi_id: first.source_poi_id.clone(),
        target_poi_id: first.target_poi_id.clone(),
        rel_type: first.rel_type,
        confidence,
        status,
        evidence_count: evidence.len() as u32,
    };

    ctx.rel_store.upsert_validated_relationship(&relationship).await?;
    ctx.metrics.incr_counter("relationships_reconciled", 1);
    Ok(())
}
