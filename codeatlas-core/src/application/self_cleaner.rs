// codeatlas-core/src/application/self_cleaner.rs
//
// SelfCleaner (spec.md §4.11): reconciles the store against the current
// tree and sweeps rows for files that have been deleted on disk since the
// last run. Two-phase so a crash between the phases just leaves rows
// `pending_deletion` for the next run to retry, rather than losing data.

use std::collections::HashSet;
use std::path::Path;
use std::sync::Arc;

use tracing::{info, instrument, warn};

use crate::error::AtlasError;
use crate::ports::graph_store::GraphStore;
use crate::ports::rel_store::RelStore;

pub struct SelfCleaner {
    rel_store: Arc<dyn RelStore>,
    graph_store: Arc<dyn GraphStore>,
}

impl SelfCleaner {
    pub fn new(rel_store: Arc<dyn RelStore>, graph_store: Arc<dyn GraphStore>) -> Self {
        Self { rel_store, graph_store }
    }

    /// Phase 1: marks every known file whose path no longer exists under
    /// `root_path` as `pending_deletion` (spec.md §4.11 step 1).
    #[instrument(skip(self, root_path))]
    pub async fn reconcile(&self, run_id: &str, root_path: &Path) -> Result<usize, AtlasError> {
        let known_paths = self.rel_store.list_all_file_paths(run_id).await?;
        let existing: HashSet<String> = known_paths
            .iter()
            .filter(|p| root_path.join(p).exists())
            .cloned()
            .collect();

        let orphaned: Vec<String> = known_paths
            .into_iter()
            .filter(|p| !existing.contains(p))
            .collect();

        if orphaned.is_empty() {
            return Ok(0);
        }

        let marked = self.rel_store.mark_files_pending_deletion(&orphaned).await?;
        info!(run_id, orphaned = marked, "marked deleted files pending_deletion");
        Ok(marked)
    }

    /// Phase 2: deletes GraphStore nodes then RelStore rows for every
    /// `pending_deletion` file. If the GraphStore delete fails, the File
    /// rows are left `pending_deletion` so the next run's reconcile sees
    /// and retries them rather than orphaning graph nodes (spec.md §4.11
    /// step 2 "tolerate partial failure").
    #[instrument(skip(self))]
    pub async fn sweep(&self, run_id: &str) -> Result<usize, AtlasError> {
        let pending = self
            .rel_store
            .list_files_with_status(run_id, crate::domain::file::FileStatus::PendingDeletion)
            .await?;
        if pending.is_empty() {
            return Ok(0);
        }

        let paths: Vec<String> = pending.into_iter().map(|f| f.path).collect();

        if let Err(e) = self.graph_store.delete_nodes_by_file_path(&paths).await {
            warn!(error = %e, "graph store sweep failed, leaving files pending_deletion for retry");
            return Err(e);
        }

        let removed = self.rel_store.delete_files_by_path(&paths).await?;
        info!(run_id, removed, "swept deleted files from rel store and graph store");
        Ok(removed)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::domain::file::File;
    use crate::infrastructure::adapters::graph_store_memory::InMemoryGraphStore;
    use crate::infrastructure::adapters::sqlite_rel_store::SqliteRelStore;
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_reconcile_marks_missing_files_pending_deletion() {
        let rel_store: Arc<dyn RelStore> = Arc::new(SqliteRelStore::new(":memory:").unwrap());
        let graph_store: Arc<dyn GraphStore> = Arc::new(InMemoryGraphStore::new());
        let dir = tempdir().unwrap();

        std::fs::write(dir.path().join("kept.py"), "x = 1").unwrap();
        rel_store
            .upsert_file(&File::new("kept.py".into(), "c1".into(), "run1".into(), None))
            .await
            .unwrap();
        rel_store
            .upsert_file(&File::new("gone.py".into(), "c2".into(), "run1".into(), None))
            .await
            .unwrap();

        let cleaner = SelfCleaner::new(Arc::clone(&rel_store), graph_store);
        let marked = cleaner.reconcile("run1", dir.path()).await.unwrap();
        assert_eq!(marked, 1);
    }

    #[tokio::test]
    async fn test_sweep_removes_pending_deletion_files() {
        let rel_store: Arc<dyn RelStore> = Arc::new(SqliteRelStore::new(":memory:").unwrap());
        let graph_store: Arc<dyn GraphStore> = Arc::new(InMemoryGraphStore::new());

        let file = File::new("gone.py".into(), "c1".into(), "run1".into(), None);
        rel_store.upsert_file(&file).await.unwrap();
        rel_store.mark_files_pending_deletion(&[file.path.clone()]).await.unwrap();

        let cleaner = SelfCleaner::new(Arc::clone(&rel_store), graph_store);
        let removed = cleaner.sweep("run1").await.unwrap();
        assert_eq!(removed, 1);

        let remaining = rel_store.list_all_file_paths("run1").await.unwrap();
        assert!(remaining.is_empty());
    }
}
