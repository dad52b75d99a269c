// codeatlas-core/src/application/worker_pool.rs
//
// One bounded worker pool per queue (spec.md §9: "express control flow as
// handler functions returning ack|retry|dead; use the host's native
// concurrency primitive ... one bounded worker pool per queue"). Built on
// `tokio::task::JoinSet`: a pull-based consumer loop that keeps up to
// `concurrency` jobs in flight.

use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

use crate::error::AtlasError;
use crate::ports::queue::{Job, Outcome, Queue};

/// Runs `handler` against jobs popped from `queue_name`, with at most
/// `concurrency` jobs in flight at once, until `should_stop` returns
/// true and no jobs remain in flight or ready.
pub async fn run_worker_pool<F, Fut>(
    queue: Arc<dyn Queue>,
    queue_name: &str,
    worker_id: &str,
    concurrency: usize,
    poll_interval: Duration,
    should_stop: impl Fn() -> bool,
    handler: F,
) -> Result<(), AtlasError>
where
    F: Fn(Job) -> Fut + Send + Sync + 'static,
    Fut: std::future::Future<Output = Outcome> + Send + 'static,
{
    let handler = Arc::new(handler);
    let mut join_set = tokio::task::JoinSet::new();

    loop {
        while join_set.len() < concurrency {
            let job = match queue.dequeue(queue_name, worker_id).await? {
                Some(job) => job,
                None => break,
            };
            let queue = Arc::clone(&queue);
            let handler = Arc::clone(&handler);
            join_set.spawn(async move {
                let outcome = handler(job.clone()).await;
                apply_outcome(&*queue, job, outcome).await;
            });
        }

        if join_set.is_empty() {
            if should_stop() {
                return Ok(());
            }
            tokio::time::sleep(poll_interval).await;
            continue;
        }

        if let Some(result) = join_set.join_next().await {
            if let Err(join_err) = result {
                warn!(error = %join_err, "worker task panicked");
            }
        }
    }
}

async fn apply_outcome(queue: &dyn Queue, job: Job, outcome: Outcome) {
    match outcome {
        Outcome::Ack => {
            if let Err(e) = queue.ack(&job).await {
                warn!(job_id = %job.id, error = %e, "failed to ack job");
            }
        }
        Outcome::Retry(delay) => {
            debug!(job_id = %job.id, ?delay, "retrying job");
            if let Err(e) = queue.retry(job.clone(), delay, "handler requested retry").await {
                warn!(job_id = %job.id, error = %e, "failed to schedule retry");
            }
        }
        Outcome::Dead(reason) => {
            warn!(job_id = %job.id, reason = %reason, "dead-lettering job");
            if let Err(e) = queue.dead_letter(job.clone(), &reason, "worker-pool").await {
                warn!(job_id = %job.id, error = %e, "failed to dead-letter job");
            }
        }
    }
}
