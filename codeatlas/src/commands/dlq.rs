// codeatlas/src/commands/dlq.rs
//
// USE CASE: inspect files that ended a run `failed` (spec.md §6 exit code
// 4 "partial failure"). Reads from the rel store rather than the queue's
// dead-letter list, since the in-memory queue adapter does not outlive
// the process that ran the pipeline.

use std::path::PathBuf;

use codeatlas_core::domain::file::FileStatus;

use crate::commands::build_context;

pub async fn list(project_dir: PathBuf, run_id: String) -> anyhow::Result<i32> {
    let ctx = build_context(&project_dir, true)?;

    let failed = ctx.rel_store.list_files_with_status(&run_id, FileStatus::Failed).await?;
    if failed.is_empty() {
        println!("No dead-lettered files for run {run_id}.");
        return Ok(0);
    }

    println!("{} dead-lettered file(s) for run {run_id}:", failed.len());
    for file in &failed {
        println!("  {} ({})", file.path, file.id);
    }
    Ok(1)
}
