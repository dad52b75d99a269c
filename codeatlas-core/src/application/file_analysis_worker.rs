// codeatlas-core/src/application/file_analysis_worker.rs
//
// FileAnalysisWorker (spec.md §4.6): extracts POIs from one file via the
// LLM, windowing oversized files by line count, merging POIs by id, and
// committing POIs + file status + outbox row in a single RelStore
// transaction.

use serde::Deserialize;
use tracing::{instrument, warn};

use crate::application::pipeline::PipelineContext;
use crate::domain::outbox::FileAnalysisFindingPayload;
use crate::domain::poi::{FileExtractionResponse, Poi};
use crate::infrastructure::llm_json::complete_json;
use crate::ports::queue::Outcome;

/// Window size, in lines, above which a file is split for extraction.
const CHUNK_THRESHOLD_LINES: usize = 400;
/// Overlap between consecutive windows, as a fraction of window size.
const WINDOW_OVERLAP_RATIO: f64 = 0.2;
const MAX_WINDOW_OVERLAP_LINES: usize = 200;
/// Outer retry of the whole extraction call, independent of the
/// self-heal loop inside `complete_json` (spec.md §4.6 step 4).
const MAX_EXTRACTION_ATTEMPTS: u32 = 2;

#[derive(Debug, Deserialize)]
pub struct FileAnalysisJobPayload {
    pub file_id: String,
    pub file_path: String,
    pub run_id: String,
}

#[instrument(skip(ctx, payload), fields(file_path = %payload.file_path))]
pub async fn handle_file_analysis_job(ctx: &PipelineContext, payload: &str) -> Outcome {
    let job: FileAnalysisJobPayload = match serde_json::from_str(payload) {
        Ok(job) => job,
        Err(e) => return Outcome::Dead(format!("malformed file-analysis payload: {e}")),
    };

    match process_file(ctx, &job).await {
        Ok(()) => Outcome::Ack,
        Err(FileAnalysisError::Unreadable(reason)) => {
            if let Err(e) = ctx.rel_store.mark_file_failed(&job.file_id, &reason).await {
                warn!(error = %e, "failed to mark file failed");
            }
            Outcome::Dead(reason)
        }
        Err(FileAnalysisError::Unparseable) => {
            if let Err(e) = ctx
                .rel_store
                .mark_file_failed(&job.file_id, "LLM response unparseable after retries")
                .await
            {
                warn!(error = %e, "failed to mark file failed");
            }
            Outcome::Dead("LLM response unparseable after retries".to_string())
        }
        Err(FileAnalysisError::Retryable(reason)) => {
            warn!(reason = %reason, "file analysis failed transiently, retrying");
            Outcome::Retry(std::time::Duration::from_secs(2))
        }
    }
}

enum FileAnalysisError {
    Unreadable(String),
    Unparseable,
    Retryable(String),
}

async fn process_file(
    ctx: &PipelineContext,
    job: &FileAnalysisJobPayload,
) -> Result<(), FileAnalysisError> {
    let absolute_path = ctx.root_path.join(&job.file_path);
    let content = std::fs::read_to_string(&absolute_path)
        .map_err(|e| FileAnalysisError::Unreadable(format!("cannot read {}: {e}", job.file_path)))?;

    let windows = split_into_windows(&content);
    let mut merged: std::collections::HashMap<String, Poi> = std::collections::HashMap::new();

    for window in &windows {
        let pois = extract_pois(ctx, &job.file_path, window).await?;
        for raw in pois {
            let poi = Poi::new(
                &job.file_path,
                job.file_id.clone(),
                job.run_id.clone(),
                raw.name,
                raw.poi_type,
                raw.start_line,
                raw.end_line,
                raw.snippet,
            );
            merged.insert(poi.id.clone(), poi);
        }
    }

    let pois: Vec<Poi> = merged.into_values().collect();
    let outbox_payload = serde_json::to_string(&FileAnalysisFindingPayload {
        file_id: job.file_id.clone(),
        file_path: job.file_path.clone(),
        run_id: job.run_id.clone(),
        pois: pois.clone(),
    })
    .map_err(|e| FileAnalysisError::Retryable(e.to_string()))?;

    ctx.rel_store
        .complete_file_analysis(&job.file_id, &pois, &outbox_payload, &job.run_id)
        .await
        .map_err(|e| FileAnalysisError::Retryable(e.to_string()))?;

    ctx.metrics.incr_counter("files_analyzed", 1);
    Ok(())
}

async fn extract_pois(
    ctx: &PipelineContext,
    file_path: &str,
    window: &str,
) -> Result<Vec<crate::domain::poi::RawPoi>, FileAnalysisError> {
    let prompt = extraction_prompt(file_path, window);

    let mut last_err = None;
    for _attempt in 0..MAX_EXTRACTION_ATTEMPTS {
        match complete_json::<FileExtractionResponse>(ctx.llm_client.as_ref(), &prompt).await {
            Ok(response) => return Ok(response.pois),
            Err(e) => {
                warn!(error = %e, "file extraction attempt failed");
                last_err = Some(e);
            }
        }
    }
    let _ = last_err;
    Err(FileAnalysisError::Unparseable)
}

fn extraction_prompt(file_path: &str, window: &str) -> String {
    format!(
        "You are analyzing the source file `{file_path}`. Identify every point of interest \
         (function, class, variable, import, table, etc.) in the following content and respond \
         with ONLY JSON matching {{\"pois\":[{{\"name\":string,\"type\":string,\"start_line\":int,\
         \"end_line\":int,\"snippet\":string}}]}}.\n\n```\n{window}\n```"
    )
}

/// Splits `content` into overlapping line-bounded windows when it exceeds
/// `CHUNK_THRESHOLD_LINES` (spec.md §4.6 step 2).
fn split_into_windows(content: &str) -> Vec<String> {
    let lines: Vec<&str> = content.lines().collect();
    if lines.len() <= CHUNK_THRESHOLD_LINES {
        return vec![content.to_string()];
    }

    let overlap = ((CHUNK_THRESHOLD_LINES as f64 * WINDOW_OVERLAP_RATIO) as usize)
        .min(MAX_WINDOW_OVERLAP_LINES)
        .max(1);
    let step = CHUNK_THRESHOLD_LINES.saturating_sub(overlap).max(1);

    let mut windows = Vec::new();
    let mut start = 0;
    while start < lines.len() {
        let end = (start + CHUNK_THRESHOLD_LINES).min(lines.len());
        windows.push(lines[start..end].join("\n"));
        if end == lines.len() {
            break;
        }
        start += step;
    }
    windows
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_short_file_is_a_single_window() {
        let content = "line\n".repeat(10);
        assert_eq!(split_into_windows(&content).len(), 1);
    }

    #[test]
    fn test_long_file_is_split_with_overlap() {
        let content = (0..1000).map(|i| format!("line{i}")).collect::<Vec<_>>().join("\n");
        let windows = split_into_windows(&content);
        assert!(windows.len() > 1);
    }
}
