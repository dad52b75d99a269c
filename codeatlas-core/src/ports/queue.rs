// codeatlas-core/src/ports/queue.rs
//
// A durable, at-least-once job queue with retries, dead-lettering, and
// dependency-gated delivery (spec.md §4.2). Handlers are expressed as
// plain functions returning an `Outcome`; the concurrency primitive
// (bounded worker pool) lives in `application::worker_pool`, not here —
// this trait only needs to be dequeue/ack/retry/dead-letter, which keeps
// it object-safe and swappable for a real broker later.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::time::Duration;

use crate::error::AtlasError;

#[derive(Debug, Clone, Default)]
pub struct EnqueueOptions {
    /// Deduplication key (e.g. `file-analysis:{file_id}`); a duplicated
    /// enqueue with the same key does not create duplicate work.
    pub dedup_key: Option<String>,
    /// Delay before the job becomes eligible for dequeue.
    pub delay: Option<Duration>,
    pub parent_job_id: Option<String>,
    /// Job ids that must reach `ack` before this job becomes eligible.
    pub depends_on: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct Job {
    pub id: String,
    pub queue: String,
    pub payload: String,
    pub attempts: u32,
    pub dedup_key: Option<String>,
}

#[derive(Debug, Clone)]
pub enum Outcome {
    Ack,
    Retry(Duration),
    Dead(String),
}

#[derive(Debug, Clone)]
pub struct DeadLetter {
    pub job_id: String,
    pub queue: String,
    pub payload: String,
    pub error: String,
    pub attempts: u32,
    pub worker_id: String,
    pub timestamp: DateTime<Utc>,
}

/// Minimum automatic retries before dead-lettering (spec.md §4.2).
pub const MIN_RETRIES: u32 = 3;

/// The exponential backoff schedule named in spec.md §4.2:
/// 250ms -> 2s -> 16s, then capped, plus jitter (applied by the adapter).
pub fn backoff_for_attempt(attempt: u32) -> Duration {
    let base_ms: u64 = match attempt {
        0 => 250,
        1 => 2_000,
        _ => 16_000,
    };
    Duration::from_millis(base_ms)
}

#[async_trait]
pub trait Queue: Send + Sync {
    async fn enqueue(
        &self,
        queue: &str,
        payload: &str,
        opts: EnqueueOptions,
    ) -> Result<String, AtlasError>;

    /// Pops one job ready to run (not delayed, not paused, all
    /// dependencies acked), or `None` if nothing is ready.
    async fn dequeue(&self, queue: &str, worker_id: &str) -> Result<Option<Job>, AtlasError>;

    async fn ack(&self, job: &Job) -> Result<(), AtlasError>;

    /// Re-enqueues with the given delay and an incremented attempt
    /// counter; dead-letters automatically once `MIN_RETRIES` is
    /// exceeded, matching spec.md §4.2's "final failure" semantics.
    async fn retry(&self, job: Job, delay: Duration, error: &str) -> Result<(), AtlasError>;

    async fn dead_letter(&self, job: Job, error: &str, worker_id: &str) -> Result<(), AtlasError>;

    async fn pause(&self, queue: &str) -> Result<(), AtlasError>;
    async fn resume(&self, queue: &str) -> Result<(), AtlasError>;
    async fn is_paused(&self, queue: &str) -> Result<bool, AtlasError>;

    async fn depth(&self, queue: &str) -> Result<usize, AtlasError>;
    async fn dead_letters(&self, queue: &str) -> Result<Vec<DeadLetter>, AtlasError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backoff_schedule_matches_spec() {
        assert_eq!(backoff_for_attempt(0), Duration::from_millis(250));
        assert_eq!(backoff_for_attempt(1), Duration::from_secs(2));
        assert_eq!(backoff_for_attempt(2), Duration::from_secs(16));
        assert_eq!(backoff_for_attempt(10), Duration::from_secs(16));
    }
}
