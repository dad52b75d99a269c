// codeatlas-core/src/application/validator.rs
//
// Validator (spec.md §4.9): consumes `relationship-finding` events off
// the `validation` queue, appends evidence, bumps the evidence counter,
// and schedules reconciliation once the quiescence rule is satisfied —
// the design point spec.md §9 calls out as most commonly missed.

use serde::Deserialize;
use tracing::{instrument, warn};

use crate::application::pipeline::PipelineContext;
use crate::domain::evidence::RelationshipEvidence;
use crate::ports::queue::{EnqueueOptions, Outcome};

pub const VALIDATION_QUEUE: &str = "validation";
pub const RECONCILIATION_QUEUE: &str = "reconciliation";

/// Minimum evidence rows before a hash becomes eligible for
/// reconciliation when the manifest has no expected-count entry for it
/// (spec.md §4.9 step 3).
const MIN_EVIDENCE_FOR_RECONCILIATION: u32 = 2;

#[derive(Debug, Deserialize)]
pub struct ValidationJobPayload {
    pub run_id: String,
    pub evidence: RelationshipEvidence,
}

#[instrument(skip(ctx, payload), fields(relationship_hash = tracing::field::Empty))]
pub async fn handle_validation_job(ctx: &PipelineContext, payload: &str) -> Outcome {
    let job: ValidationJobPayload = match serde_json::from_str(payload) {
        Ok(job) => job,
        Err(e) => return Outcome::Dead(format!("malformed validation payload: {e}")),
    };

    match process_job(ctx, &job).await {
        Ok(()) => Outcome::Ack,
        Err(e) => {
            warn!(error = %e, "validation failed transiently, retrying");
            Outcome::Retry(std::time::Duration::from_secs(1))
        }
    }
}

async fn process_job(ctx: &PipelineContext, job: &ValidationJobPayload) -> Result<(), crate::error::AtlasError> {
    let relationship_hash = job.evidence.relationship_hash.clone();

    // The evidence row and its counter were already committed atomically by
    // RelationshipWorker (spec.md §4.7 step 5); this stage only reads the
    // counter to decide reconciliation eligibility, so it never double-counts.
    let count = ctx.rel_store.evidence_count(&job.run_id, &relationship_hash).await?;

    let manifest = ctx.rel_store.load_manifest(&job.run_id).await?;
    let expected = manifest.as_ref().and_then(|m| m.expected_count_for(&relationship_hash));

    let eligible = match expected {
        Some(expected_count) => count >= expected_count,
        None => count >= MIN_EVIDENCE_FOR_RECONCILIATION,
    };

    if eligible {
        // Quiescence: the delayed job's dedupKey ensures only the latest
        // delay survives, so reconciliation fires `quietWindow` after the
        // *last* evidence row for this hash, not the first.
        ctx.queue
            .enqueue(
                RECONCILIATION_QUEUE,
                &serde_json::json!({ "run_id": job.run_id, "relationship_hash": relationship_hash }).to_string(),
                EnqueueOptions {
                    dedup_key: Some(format!("reconciliation:{}:{}", job.run_id, relationship_hash)),
                    delay: Some(ctx.options.quiet_window()),
                    ..Default::default()
                },
            )
            .await?;
    }

    ctx.metrics.incr_counter("evidence_rows_validated", 1);
    Ok(())
}
