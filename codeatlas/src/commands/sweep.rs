// codeatlas/src/commands/sweep.rs
//
// USE CASE: delete pending_deletion files from the graph store then the
// rel store (spec.md §4.11 sweep phase). Operator-triggered; never run
// automatically during analysis.

use std::path::PathBuf;

use codeatlas_core::application::self_cleaner::SelfCleaner;

use crate::commands::build_context;

pub async fn execute(project_dir: PathBuf, run_id: String) -> anyhow::Result<i32> {
    let ctx = build_context(&project_dir, true)?;
    let cleaner = SelfCleaner::new(ctx.rel_store, ctx.graph_store);

    let removed = cleaner.sweep(&run_id).await?;
    println!("Swept {removed} file(s) from the graph store and rel store.");
    Ok(0)
}
