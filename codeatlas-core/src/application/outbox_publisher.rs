// codeatlas-core/src/application/outbox_publisher.rs
//
// OutboxPublisher (spec.md §4.4): polls pending outbox rows and enqueues
// them, applying the per-event-type fan-out rule. One `relationship-finding`
// job per event; one `relationship-analysis-poi` job **per POI** for a
// `file-analysis-finding` event — the central scalability mechanism.

use std::sync::Arc;
use std::time::Duration;
use tracing::{info, instrument, warn};

use crate::application::validator::VALIDATION_QUEUE;
use crate::domain::evidence::{Pass, RelationshipEvidence};
use crate::domain::outbox::{
    DirectorySummaryFindingPayload, EventType, FileAnalysisFindingPayload, OutboxEvent,
    RelationshipFindingPayload, RelationshipJobPayload,
};
use crate::domain::relationship::{relationship_hash, RelationshipType};
use crate::error::AtlasError;
use crate::ports::queue::{EnqueueOptions, Queue};
use crate::ports::rel_store::RelStore;

pub const RELATIONSHIP_ANALYSIS_QUEUE: &str = "relationship-analysis-poi";

const POLL_BATCH_SIZE: usize = 200;
const POLL_INTERVAL: Duration = Duration::from_millis(200);

/// Confidence assigned to evidence derived from a directory summary's
/// `candidate_relationships` (spec.md §6 wire contract carries no
/// confidence field for this pass, unlike intra-file evidence). Treated
/// as a neutral prior — weaker than a direct intra-file observation,
/// strong enough to matter once corroborated by another pass.
const INTRA_DIRECTORY_CONFIDENCE: f64 = 0.5;

/// Runs the publisher loop until `should_stop` reports true and a final
/// poll finds no more pending rows.
#[instrument(skip(rel_store, queue, should_stop))]
pub async fn run_outbox_publisher(
    rel_store: Arc<dyn RelStore>,
    queue: Arc<dyn Queue>,
    should_stop: impl Fn() -> bool,
) -> Result<(), AtlasError> {
    loop {
        let pending = rel_store.fetch_pending_outbox(POLL_BATCH_SIZE).await?;
        if pending.is_empty() {
            if should_stop() {
                return Ok(());
            }
            tokio::time::sleep(POLL_INTERVAL).await;
            continue;
        }

        let mut published_ids = Vec::with_capacity(pending.len());
        for event in &pending {
            match publish_one(&rel_store, &queue, event).await {
                Ok(()) => published_ids.push(event.id),
                Err(e) => warn!(outbox_id = event.id, error = %e, "failed to enqueue outbox event, leaving pending"),
            }
        }

        if !published_ids.is_empty() {
            rel_store.mark_outbox_published(&published_ids).await?;
            info!(count = published_ids.len(), "published outbox events");
        }
    }
}

async fn publish_one(rel_store: &Arc<dyn RelStore>, queue: &Arc<dyn Queue>, event: &OutboxEvent) -> Result<(), AtlasError> {
    match event.event_type {
        EventType::FileAnalysisFinding => {
            let payload: FileAnalysisFindingPayload = serde_json::from_str(&event.payload_json)
                .map_err(crate::infrastructure::error::InfrastructureError::Json)?;

            for primary in &payload.pois {
                let contextual_pois: Vec<_> = payload
                    .pois
                    .iter()
                    .filter(|p| p.id != primary.id)
                    .cloned()
                    .collect();

                let job_payload = RelationshipJobPayload {
                    primary_poi: primary.clone(),
                    contextual_pois,
                    file_path: payload.file_path.clone(),
                    run_id: payload.run_id.clone(),
                };
                queue
                    .enqueue(
                        RELATIONSHIP_ANALYSIS_QUEUE,
                        &serde_json::to_string(&job_payload)
                            .map_err(crate::infrastructure::error::InfrastructureError::Json)?,
                        EnqueueOptions {
                            dedup_key: Some(format!("relationship-analysis-poi:{}", primary.id)),
                            ..Default::default()
                        },
                    )
                    .await?;
            }
            Ok(())
        }
        EventType::RelationshipFinding => {
            let payload: RelationshipFindingPayload = serde_json::from_str(&event.payload_json)
                .map_err(crate::infrastructure::error::InfrastructureError::Json)?;

            queue
                .enqueue(
                    VALIDATION_QUEUE,
                    &event.payload_json,
                    EnqueueOptions {
                        dedup_key: Some(format!("validation:{}", payload.evidence.id)),
                        ..Default::default()
                    },
                )
                .await?;
            Ok(())
        }
        EventType::DirectorySummaryFinding => {
            let payload: DirectorySummaryFindingPayload = serde_json::from_str(&event.payload_json)
                .map_err(crate::infrastructure::error::InfrastructureError::Json)?;

            // Candidates are summary-derived hints, not evidence yet — turn
            // each into an `IntraDirectory` evidence row (discarding unknown
            // types, same closed set `RelationshipWorker` enforces) and run
            // it through the same append-evidence-then-outbox path a
            // `RelationshipWorker` finding takes, rather than shoehorning
            // the raw `{from,to,type,reason}` shape onto `VALIDATION_QUEUE`
            // (its consumer expects a full `RelationshipEvidence`).
            let now = chrono::Utc::now();
            let evidence: Vec<RelationshipEvidence> = payload
                .candidate_relationships
                .iter()
                .filter_map(|candidate| {
                    let rel_type: RelationshipType = candidate.rel_type.parse().ok()?;
                    let hash = relationship_hash(&candidate.from, &candidate.to, rel_type);
                    Some(RelationshipEvidence::new(
                        hash,
                        payload.run_id.clone(),
                        candidate.from.clone(),
                        candidate.to.clone(),
                        rel_type,
                        INTRA_DIRECTORY_CONFIDENCE,
                        Pass::IntraDirectory,
                        candidate.reason.clone(),
                        now,
                    ))
                })
                .collect();

            if !evidence.is_empty() {
                rel_store.append_evidence_with_outbox(&evidence, &payload.run_id).await?;
            }

            Ok(())
        }
    }
}
