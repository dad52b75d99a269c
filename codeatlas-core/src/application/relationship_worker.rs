// codeatlas-core/src/application/relationship_worker.rs
//
// RelationshipWorker (spec.md §4.7): for one POI + same-file context,
// asks the LLM what relationships exist to each contextual POI, enforces
// `from == primaryPOI.id`, discards unknown types, tie-breaks duplicates
// by max confidence, then appends evidence + outbox rows atomically.

use serde::Deserialize;
use std::collections::HashMap;
use tracing::{instrument, warn};

use crate::application::pipeline::PipelineContext;
use crate::domain::evidence::{Pass, RelationshipEvidence};
use crate::domain::poi::Poi;
use crate::domain::relationship::{relationship_hash, RawRelationship, RelationshipExtractionResponse, RelationshipType};
use crate::error::AtlasError;
use crate::infrastructure::error::{InfrastructureError, LlmError};
use crate::infrastructure::llm_json::complete_json;
use crate::ports::queue::Outcome;

#[derive(Debug, Deserialize)]
pub struct RelationshipJobPayload {
    pub primary_poi: Poi,
    pub contextual_pois: Vec<Poi>,
    pub file_path: String,
    pub run_id: String,
}

#[instrument(skip(ctx, payload), fields(primary_poi = tracing::field::Empty))]
pub async fn handle_relationship_job(ctx: &PipelineContext, payload: &str) -> Outcome {
    let job: RelationshipJobPayload = match serde_json::from_str(payload) {
        Ok(job) => job,
        Err(e) => return Outcome::Dead(format!("malformed relationship-analysis payload: {e}")),
    };

    match process_job(ctx, &job).await {
        Ok(()) => Outcome::Ack,
        Err(e) => {
            warn!(error = %e, "relationship extraction failed transiently, retrying");
            Outcome::Retry(std::time::Duration::from_secs(2))
        }
    }
}

async fn process_job(ctx: &PipelineContext, job: &RelationshipJobPayload) -> Result<(), crate::error::AtlasError> {
    let prompt = relationship_prompt(job);

    // Unparseable-after-self-heal is a legitimate "no relationships found"
    // (the LLM had nothing coherent to say about this POI); any other
    // error — a transport failure that outlasted `BoundedLlmClient`'s own
    // retries, say — is propagated so `handle_relationship_job` retries
    // the job instead of silently discarding the evidence it would have
    // produced.
    let response: RelationshipExtractionResponse =
        match complete_json(ctx.llm_client.as_ref(), &prompt).await {
            Ok(response) => response,
            Err(AtlasError::Infrastructure(InfrastructureError::Llm(LlmError::Unparseable))) => {
                RelationshipExtractionResponse { relationships: Vec::new() }
            }
            Err(e) => return Err(e),
        };

    let accepted = filter_and_tie_break(&job.primary_poi.id, response.relationships);

    if accepted.is_empty() {
        return Ok(());
    }

    let now = ctx.clock.now();
    let evidence: Vec<RelationshipEvidence> = accepted
        .into_iter()
        .map(|(rel_type, raw)| {
            let hash = relationship_hash(&job.primary_poi.id, &raw.to, rel_type);
            RelationshipEvidence::new(
                hash,
                job.run_id.clone(),
                job.primary_poi.id.clone(),
                raw.to.clone(),
                rel_type,
                raw.confidence.clamp(0.0, 1.0),
                Pass::IntraFile,
                raw.evidence,
                now,
            )
        })
        .collect();

    ctx.rel_store
        .append_evidence_with_outbox(&evidence, &job.run_id)
        .await?;
    ctx.metrics.incr_counter("relationship_evidence_appended", evidence.len() as u64);
    Ok(())
}

/// Enforces `from == primary_poi_id`, discards unknown types, and keeps
/// only the max-confidence item per `(to, type)` pair when the LLM
/// emitted duplicates (spec.md §4.7 step 2-3, "Tie-break").
fn filter_and_tie_break(primary_poi_id: &str, items: Vec<RawRelationship>) -> Vec<(RelationshipType, RawRelationship)> {
    let mut best: HashMap<(String, RelationshipType), RawRelationship> = HashMap::new();

    for item in items {
        if item.from != primary_poi_id {
            continue;
        }
        let Ok(rel_type) = item.rel_type.parse::<RelationshipType>() else {
            continue;
        };
        let key = (item.to.clone(), rel_type);
        match best.get(&key) {
            Some(existing) if existing.confidence >= item.confidence => {}
            _ => {
                best.insert(key, item);
            }
        }
    }

    best.into_iter().map(|((_, rel_type), raw)| (rel_type, raw)).collect()
}

fn relationship_prompt(job: &RelationshipJobPayload) -> String {
    let contextual_summaries: Vec<String> = job
        .contextual_pois
        .iter()
        .map(|p| format!("- id={} name={} type={} lines={}-{}", p.id, p.name, p.poi_type, p.start_line, p.end_line))
        .collect();

    format!(
        "In file `{}`, the primary point of interest is `{}` (id={}, type={}).\n\
         Other points of interest in the same file:\n{}\n\n\
         For each of the other points of interest, determine whether `{}` has a relationship to \
         it. Respond with ONLY JSON matching \
         {{\"relationships\":[{{\"from\":string,\"to\":string,\"type\":string,\"evidence\":string,\
         \"confidence\":number}}]}}. `from` must equal \"{}\"; `type` must be one of CALLS, \
         IMPORTS, USES, EXTENDS, IMPLEMENTS, CONTAINS, WRITES, READS.",
        job.file_path,
        job.primary_poi.name,
        job.primary_poi.id,
        job.primary_poi.poi_type,
        contextual_summaries.join("\n"),
        job.primary_poi.name,
        job.primary_poi.id,
    )
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn raw(from: &str, to: &str, rel_type: &str, confidence: f64) -> RawRelationship {
        RawRelationship {
            from: from.to_string(),
            to: to.to_string(),
            rel_type: rel_type.to_string(),
            evidence: "saw it".to_string(),
            confidence,
        }
    }

    #[test]
    fn test_discards_from_mismatch() {
        let items = vec![raw("A", "B", "CALLS", 0.9), raw("X", "Y", "CALLS", 0.9)];
        let accepted = filter_and_tie_break("A", items);
        assert_eq!(accepted.len(), 1);
        assert_eq!(accepted[0].1.to, "B");
    }

    #[test]
    fn test_discards_unknown_type() {
        let items = vec![raw("A", "B", "FRIENDS_WITH", 0.9)];
        assert!(filter_and_tie_break("A", items).is_empty());
    }

    #[test]
    fn test_tie_break_keeps_max_confidence() {
        let items = vec![raw("A", "B", "CALLS", 0.4), raw("A", "B", "CALLS", 0.9)];
        let accepted = filter_and_tie_break("A", items);
        assert_eq!(accepted.len(), 1);
        assert!((accepted[0].1.confidence - 0.9).abs() < 1e-9);
    }
}
