// codeatlas/src/commands/run.rs
//
// USE CASE: run the pipeline end to end.

use std::path::PathBuf;

use codeatlas_core::Pipeline;

use crate::commands::{build_context, new_run_id};

pub async fn execute(project_dir: PathBuf, run_id: Option<String>, offline: bool) -> anyhow::Result<i32> {
    let run_id = run_id.unwrap_or_else(new_run_id);
    let start = std::time::Instant::now();

    println!("Loading configuration from {project_dir:?}...");
    let ctx = build_context(&project_dir, offline)?;
    let pipeline = Pipeline::new(ctx);

    println!("Running pipeline (run_id={run_id})...");
    let result = pipeline.run(&run_id).await?;

    println!(
        "Finished in {:.2?}: {} files, {} directories, {} validated relationships, {} graph nodes, {} graph edges",
        start.elapsed(),
        result.total_files,
        result.total_directories,
        result.validated_relationships,
        result.graph_nodes,
        result.graph_edges,
    );

    if result.dead_letters.is_empty() {
        println!("Run completed cleanly.");
        Ok(0)
    } else {
        eprintln!("Run completed with {} dead-lettered job(s):", result.dead_letters.len());
        for dl in &result.dead_letters {
            eprintln!("  [{}] job {}: {}", dl.queue, dl.job_id, dl.error);
        }
        Ok(4)
    }
}
