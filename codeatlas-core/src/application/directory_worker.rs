// codeatlas-core/src/application/directory_worker.rs
//
// DirectoryWorker (spec.md §4.8): summarizes a directory once all its
// files are analyzed (gated by the queue's `dependsOn`), loading the
// top-K POIs per file by type priority.

use serde::Deserialize;
use tracing::{instrument, warn};

use crate::application::pipeline::PipelineContext;
use crate::domain::directory_summary::DirectorySummaryResponse;
use crate::domain::file::FileStatus;
use crate::domain::outbox::DirectorySummaryFindingPayload;
use crate::domain::poi::Poi;
use crate::infrastructure::llm_json::complete_json;
use crate::ports::queue::Outcome;

/// Top-K POIs considered per file when building the summarization prompt.
const TOP_K_POIS_PER_FILE: usize = 20;

#[derive(Debug, Deserialize)]
pub struct DirectoryResolutionJobPayload {
    pub directory_path: String,
    pub run_id: String,
}

#[instrument(skip(ctx, payload), fields(directory_path = tracing::field::Empty))]
pub async fn handle_directory_job(ctx: &PipelineContext, payload: &str) -> Outcome {
    let job: DirectoryResolutionJobPayload = match serde_json::from_str(payload) {
        Ok(job) => job,
        Err(e) => return Outcome::Dead(format!("malformed directory-resolution payload: {e}")),
    };

    match process_job(ctx, &job).await {
        Ok(()) => Outcome::Ack,
        Err(e) => {
            warn!(error = %e, "directory summarization failed transiently, retrying");
            Outcome::Retry(std::time::Duration::from_secs(2))
        }
    }
}

async fn process_job(
    ctx: &PipelineContext,
    job: &DirectoryResolutionJobPayload,
) -> Result<(), crate::error::AtlasError> {
    let completed_files = ctx
        .rel_store
        .list_files_with_status(&job.run_id, FileStatus::Completed)
        .await?;
    let files_in_directory: Vec<_> = completed_files
        .into_iter()
        .filter(|f| std::path::Path::new(&f.path).parent().map(|p| p.to_string_lossy().to_string()) == Some(job.directory_path.clone()))
        .collect();

    let mut in_directory: Vec<Poi> = Vec::new();
    for file in &files_in_directory {
        in_directory.extend(ctx.rel_store.list_pois_for_file(&file.id).await?);
    }
    let refs: Vec<&Poi> = in_directory.iter().collect();
    let top_pois = top_k_by_type_priority(&refs, TOP_K_POIS_PER_FILE);
    let prompt = summary_prompt(&job.directory_path, &top_pois);

    let response: DirectorySummaryResponse = complete_json(ctx.llm_client.as_ref(), &prompt).await?;

    let outbox_payload = serde_json::to_string(&DirectorySummaryFindingPayload {
        run_id: job.run_id.clone(),
        directory_path: job.directory_path.clone(),
        candidate_relationships: response.candidate_relationships.clone(),
    })
    .map_err(crate::infrastructure::error::InfrastructureError::Json)?;

    ctx.rel_store
        .insert_directory_summary_with_outbox(
            &job.run_id,
            &job.directory_path,
            &response.summary,
            &outbox_payload,
        )
        .await?;

    ctx.metrics.incr_counter("directories_summarized", 1);
    Ok(())
}

fn top_k_by_type_priority<'a>(pois: &[&'a Poi], k: usize) -> Vec<&'a Poi> {
    let priority = |poi_type: &str| -> u8 {
        match poi_type {
            "class" | "module" => 0,
            "function" | "method" => 1,
            _ => 2,
        }
    };
    let mut sorted: Vec<&Poi> = pois.to_vec();
    sorted.sort_by_key(|p| priority(&p.poi_type));
    sorted.into_iter().take(k).collect()
}

fn summary_prompt(directory_path: &str, pois: &[&Poi]) -> String {
    let listing: Vec<String> = pois
        .iter()
        .map(|p| format!("- {} ({}) in {}", p.name, p.poi_type, p.file_id))
        .collect();

    format!(
        "Summarize the responsibility of the directory `{directory_path}` given these points of \
         interest:\n{}\n\nRespond with ONLY JSON matching {{\"summary\":string,\
         \"candidate_relationships\":[{{\"from\":string,\"to\":string,\"type\":string,\
         \"reason\":string}}]}}.",
        listing.join("\n")
    )
}
