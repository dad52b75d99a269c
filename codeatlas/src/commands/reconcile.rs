// codeatlas/src/commands/reconcile.rs
//
// USE CASE: mark files deleted on disk since the last run pending_deletion,
// without sweeping them yet (spec.md §4.11 mark phase).

use std::path::PathBuf;

use codeatlas_core::application::self_cleaner::SelfCleaner;

use crate::commands::build_context;

pub async fn execute(project_dir: PathBuf, run_id: String) -> anyhow::Result<i32> {
    let ctx = build_context(&project_dir, true)?;
    let cleaner = SelfCleaner::new(ctx.rel_store, ctx.graph_store);

    let marked = cleaner.reconcile(&run_id, &project_dir).await?;
    println!("Marked {marked} file(s) pending_deletion.");
    Ok(0)
}
