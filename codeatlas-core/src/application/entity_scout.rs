// codeatlas-core/src/application/entity_scout.rs
//
// EntityScout (spec.md §4.5): walks the tree, seeds `file-analysis` and
// `directory-resolution` jobs (paused), writes the run manifest, then
// resumes queues. Pause-then-resume is load bearing — see the module doc
// on `PipelineContext::run` for why. GraphBuilder finalization is not
// seeded here: relationship jobs are created dynamically via the outbox
// long after the file-analysis jobs this scout enqueues are acked, so
// finalization is instead triggered directly from `pipeline.rs` once the
// whole run has quiesced (spec.md §4.10).

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use tracing::{info, instrument};

use crate::domain::file::File;
use crate::domain::manifest::RunManifest;
use crate::error::AtlasError;
use crate::infrastructure::config::patterns::PatternSet;
use crate::infrastructure::config::RunOptions;
use crate::infrastructure::fs::{checksum_file, discover_files};
use crate::ports::queue::{EnqueueOptions, Queue};
use crate::ports::rel_store::RelStore;

pub const FILE_ANALYSIS_QUEUE: &str = "file-analysis";
pub const DIRECTORY_RESOLUTION_QUEUE: &str = "directory-resolution";

#[derive(Debug, serde::Serialize)]
pub struct ScoutReport {
    pub total_files: usize,
    pub total_directories: usize,
}

#[instrument(skip(rel_store, queue, options, root_path))]
pub async fn run_entity_scout(
    run_id: &str,
    root_path: &Path,
    rel_store: &dyn RelStore,
    queue: Arc<dyn Queue>,
    options: &RunOptions,
) -> Result<ScoutReport, AtlasError> {
    let patterns = PatternSet::compile(&options.special_file_patterns)
        .map_err(crate::error::AtlasError::Infrastructure)?;

    let discovered = discover_files(root_path, &options.ignore, options.max_file_bytes)
        .map_err(crate::error::AtlasError::Infrastructure)?;

    queue.pause(FILE_ANALYSIS_QUEUE).await?;
    queue.pause(DIRECTORY_RESOLUTION_QUEUE).await?;

    let mut files_by_directory: HashMap<String, usize> = HashMap::new();
    let mut analysis_job_ids = Vec::with_capacity(discovered.len());

    for found in &discovered {
        let relative = found
            .path
            .strip_prefix(root_path)
            .unwrap_or(&found.path)
            .to_string_lossy()
            .to_string();

        let checksum = checksum_file(&found.path).map_err(crate::error::AtlasError::Infrastructure)?;
        let special_type = patterns.classify(&relative);
        let file = File::new(relative.clone(), checksum, run_id.to_string(), special_type);
        rel_store.upsert_file(&file).await?;

        if let Some(dir) = Path::new(&relative).parent() {
            let dir_str = dir.to_string_lossy().to_string();
            *files_by_directory.entry(dir_str).or_insert(0) += 1;
        }

        let payload = serde_json::json!({ "file_id": file.id, "file_path": relative, "run_id": run_id })
            .to_string();
        let job_id = queue
            .enqueue(
                FILE_ANALYSIS_QUEUE,
                &payload,
                EnqueueOptions {
                    dedup_key: Some(format!("file-analysis:{}", file.id)),
                    ..Default::default()
                },
            )
            .await?;
        analysis_job_ids.push(job_id);
    }

    for (directory, file_count) in &files_by_directory {
        let payload = serde_json::json!({
            "directory_path": directory,
            "run_id": run_id,
            "expected_file_count": file_count,
        })
        .to_string();
        queue
            .enqueue(
                DIRECTORY_RESOLUTION_QUEUE,
                &payload,
                EnqueueOptions {
                    dedup_key: Some(format!("directory-resolution:{run_id}:{directory}")),
                    depends_on: analysis_job_ids.clone(),
                    ..Default::default()
                },
            )
            .await?;
    }

    let mut manifest = RunManifest::new(run_id.to_string());
    manifest.total_files = discovered.len();
    manifest.files_by_directory = files_by_directory.clone();
    rel_store.save_manifest(&manifest).await?;

    queue.resume(FILE_ANALYSIS_QUEUE).await?;
    queue.resume(DIRECTORY_RESOLUTION_QUEUE).await?;

    info!(
        total_files = discovered.len(),
        total_directories = files_by_directory.len(),
        "EntityScout seeded run"
    );

    Ok(ScoutReport {
        total_files: discovered.len(),
        total_directories: files_by_directory.len(),
    })
}
