// codeatlas-core/src/application/pipeline.rs
//
// The orchestrator (spec.md §6 `Pipeline.Run`): wires the ports together
// into a `PipelineContext`, runs EntityScout to seed the run, then drives
// one bounded worker pool per queue plus the OutboxPublisher concurrently
// until every queue drains. GraphBuilder and SelfCleaner are not queues —
// they run only once the watchdog confirms the whole run has quiesced,
// so GraphBuilder always sees every relationship that will ever be
// validated for this run (spec.md §4.10).

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tracing::{info, instrument};

use crate::application::directory_worker::handle_directory_job;
use crate::application::entity_scout::{run_entity_scout, DIRECTORY_RESOLUTION_QUEUE, FILE_ANALYSIS_QUEUE};
use crate::application::file_analysis_worker::handle_file_analysis_job;
use crate::application::graph_builder::run_graph_finalization;
use crate::application::outbox_publisher::{run_outbox_publisher, RELATIONSHIP_ANALYSIS_QUEUE};
use crate::application::reconciler::handle_reconciliation_job;
use crate::application::relationship_worker::handle_relationship_job;
use crate::application::self_cleaner::SelfCleaner;
use crate::application::validator::{handle_validation_job, RECONCILIATION_QUEUE, VALIDATION_QUEUE};
use crate::application::worker_pool::run_worker_pool;
pub use crate::infrastructure::config::RunOptions;
use crate::error::AtlasError;
use crate::ports::clock::Clock;
use crate::ports::graph_store::GraphStore;
use crate::ports::llm_client::LLMClient;
use crate::ports::metrics::Metrics;
use crate::ports::queue::Queue;
use crate::ports::rel_store::RelStore;

/// Drain poll interval shared by every worker pool and the publisher.
const DRAIN_POLL_INTERVAL: Duration = Duration::from_millis(150);
/// How long every queue must report empty+idle before a run is declared
/// drained (spec.md §6 "the pipeline completes once all queues are
/// empty and no jobs are in flight").
const QUIESCENT_ROUNDS_TO_STOP: u32 = 3;

/// Everything a worker/validator/reconciler function needs, threaded
/// through by reference from `Pipeline::run`.
pub struct PipelineContext {
    pub rel_store: Arc<dyn RelStore>,
    pub queue: Arc<dyn Queue>,
    pub llm_client: Arc<dyn LLMClient>,
    pub graph_store: Arc<dyn GraphStore>,
    pub clock: Arc<dyn Clock>,
    pub metrics: Arc<dyn Metrics>,
    pub options: RunOptions,
    pub root_path: PathBuf,
}

#[derive(Debug, Clone, Serialize)]
pub struct RunResult {
    pub run_id: String,
    pub total_files: usize,
    pub total_directories: usize,
    pub validated_relationships: usize,
    pub graph_nodes: usize,
    pub graph_edges: usize,
    pub dead_letters: Vec<DeadLetterSummary>,
}

#[derive(Debug, Clone, Serialize)]
pub struct DeadLetterSummary {
    pub queue: String,
    pub job_id: String,
    pub error: String,
}

pub struct Pipeline {
    ctx: Arc<PipelineContext>,
}

impl Pipeline {
    pub fn new(ctx: PipelineContext) -> Self {
        Self { ctx: Arc::new(ctx) }
    }

    #[instrument(skip(self), fields(run_id))]
    pub async fn run(&self, run_id: &str) -> Result<RunResult, AtlasError> {
        let scout_report = run_entity_scout(
            run_id,
            &self.ctx.root_path,
            self.ctx.rel_store.as_ref(),
            Arc::clone(&self.ctx.queue),
            &self.ctx.options,
        )
        .await?;

        let stop = Arc::new(AtomicBool::new(false));
        let watchdog = tokio::spawn(watch_for_quiescence(Arc::clone(&self.ctx.queue), Arc::clone(&stop)));

        let concurrency = self.ctx.options.max_llm_concurrency;
        let queue = Arc::clone(&self.ctx.queue);

        let file_analysis = {
            let ctx = Arc::clone(&self.ctx);
            let stop = Arc::clone(&stop);
            run_worker_pool(
                Arc::clone(&queue),
                FILE_ANALYSIS_QUEUE,
                "worker-file-analysis",
                concurrency,
                DRAIN_POLL_INTERVAL,
                move || stop.load(Ordering::Relaxed),
                move |job| {
                    let ctx = Arc::clone(&ctx);
                    async move { handle_file_analysis_job(&ctx, &job.payload).await }
                },
            )
        };

        let relationship_analysis = {
            let ctx = Arc::clone(&self.ctx);
            let stop = Arc::clone(&stop);
            run_worker_pool(
                Arc::clone(&queue),
                RELATIONSHIP_ANALYSIS_QUEUE,
                "worker-relationship-analysis",
                concurrency,
                DRAIN_POLL_INTERVAL,
                move || stop.load(Ordering::Relaxed),
                move |job| {
                    let ctx = Arc::clone(&ctx);
                    async move { handle_relationship_job(&ctx, &job.payload).await }
                },
            )
        };

        let directory_resolution = {
            let ctx = Arc::clone(&self.ctx);
            let stop = Arc::clone(&stop);
            run_worker_pool(
                Arc::clone(&queue),
                DIRECTORY_RESOLUTION_QUEUE,
                "worker-directory-resolution",
                concurrency,
                DRAIN_POLL_INTERVAL,
                move || stop.load(Ordering::Relaxed),
                move |job| {
                    let ctx = Arc::clone(&ctx);
                    async move { handle_directory_job(&ctx, &job.payload).await }
                },
            )
        };

        let validation = {
            let ctx = Arc::clone(&self.ctx);
            let stop = Arc::clone(&stop);
            run_worker_pool(
                Arc::clone(&queue),
                VALIDATION_QUEUE,
                "worker-validation",
                concurrency,
                DRAIN_POLL_INTERVAL,
                move || stop.load(Ordering::Relaxed),
                move |job| {
                    let ctx = Arc::clone(&ctx);
                    async move { handle_validation_job(&ctx, &job.payload).await }
                },
            )
        };

        let reconciliation = {
            let ctx = Arc::clone(&self.ctx);
            let stop = Arc::clone(&stop);
            run_worker_pool(
                Arc::clone(&queue),
                RECONCILIATION_QUEUE,
                "worker-reconciliation",
                concurrency,
                DRAIN_POLL_INTERVAL,
                move || stop.load(Ordering::Relaxed),
                move |job| {
                    let ctx = Arc::clone(&ctx);
                    async move { handle_reconciliation_job(&ctx, &job.payload).await }
                },
            )
        };

        let publisher = {
            let rel_store = Arc::clone(&self.ctx.rel_store);
            let stop = Arc::clone(&stop);
            run_outbox_publisher(rel_store, Arc::clone(&queue), move || stop.load(Ordering::Relaxed))
        };

        let (r1, r2, r3, r4, r5, r6) = tokio::join!(
            file_analysis,
            relationship_analysis,
            directory_resolution,
            validation,
            reconciliation,
            publisher,
        );
        r1?;
        r2?;
        r3?;
        r4?;
        r5?;
        r6?;
        watchdog.await.map_err(|e| AtlasError::Internal(e.to_string()))??;

        // Every work queue is idle and every in-flight job has been acked
        // by the time the watchdog returns, so the relationship set for
        // this run is final: build the graph now, not as a queue job that
        // could race ahead of evidence still working through validation.
        run_graph_finalization(&self.ctx, run_id).await?;

        let cleaner = SelfCleaner::new(Arc::clone(&self.ctx.rel_store), Arc::clone(&self.ctx.graph_store));
        cleaner.reconcile(run_id, &self.ctx.root_path).await?;
        cleaner.sweep(run_id).await?;

        let validated = self.ctx.rel_store.list_validated_relationships(run_id).await?;
        let dead_letters = collect_dead_letters(self.ctx.queue.as_ref()).await?;

        let result = RunResult {
            run_id: run_id.to_string(),
            total_files: scout_report.total_files,
            total_directories: scout_report.total_directories,
            validated_relationships: validated.len(),
            graph_nodes: self.ctx.graph_store.node_count().await?,
            graph_edges: self.ctx.graph_store.edge_count().await?,
            dead_letters,
        };

        info!(
            run_id,
            files = result.total_files,
            relationships = result.validated_relationships,
            dead_letters = result.dead_letters.len(),
            "pipeline run complete"
        );
        Ok(result)
    }
}

/// Polls every pipeline queue until all report zero depth for
/// `QUIESCENT_ROUNDS_TO_STOP` consecutive rounds, then flips `stop` so
/// every worker pool and the publisher exit their drain loops.
async fn watch_for_quiescence(queue: Arc<dyn Queue>, stop: Arc<AtomicBool>) -> Result<(), AtlasError> {
    let queues = [
        FILE_ANALYSIS_QUEUE,
        RELATIONSHIP_ANALYSIS_QUEUE,
        DIRECTORY_RESOLUTION_QUEUE,
        VALIDATION_QUEUE,
        RECONCILIATION_QUEUE,
    ];

    let mut quiet_rounds = 0;
    loop {
        tokio::time::sleep(DRAIN_POLL_INTERVAL).await;

        let mut all_empty = true;
        for name in queues {
            if queue.depth(name).await? > 0 {
                all_empty = false;
                break;
            }
        }

        if all_empty {
            quiet_rounds += 1;
            if quiet_rounds >= QUIESCENT_ROUNDS_TO_STOP {
                stop.store(true, Ordering::Relaxed);
                return Ok(());
            }
        } else {
            quiet_rounds = 0;
        }
    }
}

async fn collect_dead_letters(queue: &dyn Queue) -> Result<Vec<DeadLetterSummary>, AtlasError> {
    let queues = [
        FILE_ANALYSIS_QUEUE,
        RELATIONSHIP_ANALYSIS_QUEUE,
        DIRECTORY_RESOLUTION_QUEUE,
        VALIDATION_QUEUE,
        RECONCILIATION_QUEUE,
    ];
    let mut out = Vec::new();
    for name in queues {
        for dl in queue.dead_letters(name).await? {
            out.push(DeadLetterSummary {
                queue: name.to_string(),
                job_id: dl.job_id,
                error: dl.error,
            });
        }
    }
    Ok(out)
}
