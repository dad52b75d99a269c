// codeatlas-core/src/infrastructure/adapters/queue_memory.rs
//
// An in-process `Queue` backed by `dashmap`, one lock-sharded map entry
// per named queue. Suitable for a single-process run of the pipeline; a
// real broker adapter would implement the same `Queue` trait.

use async_trait::async_trait;
use chrono::Utc;
use dashmap::DashMap;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;
use std::time::{Duration, Instant};

use crate::error::AtlasError;
use crate::ports::queue::{DeadLetter, EnqueueOptions, Job, Queue, MIN_RETRIES};

struct Entry {
    job: Job,
    ready_at: Instant,
    depends_on: Vec<String>,
}

#[derive(Default)]
struct QueueState {
    ready: VecDeque<Entry>,
    inflight: std::collections::HashSet<String>,
    paused: bool,
}

/// In-memory, single-process job queue. One `QueueState` per named
/// queue, guarded individually so unrelated queues never contend.
///
/// `acked` is tracked globally rather than per-`QueueState`: a job's
/// `depends_on` list can (and routinely does — see `EntityScout`'s
/// `directory-resolution` and finalization jobs) name ids enqueued on a
/// *different* queue than the dependent job itself, so dependency
/// resolution must consult acks across all queues, not just the one
/// being dequeued from.
pub struct InMemoryQueue {
    queues: DashMap<String, Mutex<QueueState>>,
    dead_letters: DashMap<String, Vec<DeadLetter>>,
    acked: DashMap<String, ()>,
    next_id: AtomicU64,
}

impl InMemoryQueue {
    pub fn new() -> Self {
        Self {
            queues: DashMap::new(),
            dead_letters: DashMap::new(),
            acked: DashMap::new(),
            next_id: AtomicU64::new(1),
        }
    }

    fn state_for(&self, queue: &str) -> dashmap::mapref::one::Ref<'_, String, Mutex<QueueState>> {
        self.queues
            .entry(queue.to_string())
            .or_insert_with(|| Mutex::new(QueueState::default()));
        self.queues.get(queue).expect("just inserted")
    }
}

impl Default for InMemoryQueue {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Queue for InMemoryQueue {
    async fn enqueue(
        &self,
        queue: &str,
        payload: &str,
        opts: EnqueueOptions,
    ) -> Result<String, AtlasError> {
        let state_ref = self.state_for(queue);
        let mut state = state_ref.lock().map_err(|_| {
            AtlasError::Internal(format!("queue '{queue}' mutex poisoned"))
        })?;

        let ready_at = Instant::now() + opts.delay.unwrap_or_default();

        // A still-queued entry with the same dedup key is replaced in
        // place rather than creating a second job: this is how the
        // Validator's quiescence-window re-enqueue (spec.md §4.9 "only
        // the latest delay survives") extends the timer every time fresh
        // evidence arrives for the same relationship hash, instead of the
        // *first* delayed job winning and blocking all future ones. Once
        // an entry leaves `ready` (dequeued, acked, or dead-lettered) its
        // dedup key is implicitly free again for a new debounce window.
        if let Some(dedup_key) = &opts.dedup_key {
            if let Some(existing) = state
                .ready
                .iter_mut()
                .find(|entry| entry.job.dedup_key.as_deref() == Some(dedup_key.as_str()))
            {
                existing.job.payload = payload.to_string();
                existing.ready_at = ready_at;
                existing.depends_on = opts.depends_on;
                return Ok(existing.job.id.clone());
            }
        }

        let id = format!("job-{}", self.next_id.fetch_add(1, Ordering::SeqCst));
        let job = Job {
            id: id.clone(),
            queue: queue.to_string(),
            payload: payload.to_string(),
            attempts: 0,
            dedup_key: opts.dedup_key,
        };
        state.ready.push_back(Entry {
            job,
            ready_at,
            depends_on: opts.depends_on,
        });
        Ok(id)
    }

    async fn dequeue(&self, queue: &str, _worker_id: &str) -> Result<Option<Job>, AtlasError> {
        let state_ref = self.state_for(queue);
        let mut state = state_ref.lock().map_err(|_| {
            AtlasError::Internal(format!("queue '{queue}' mutex poisoned"))
        })?;

        if state.paused {
            return Ok(None);
        }

        let now = Instant::now();
        let position = state.ready.iter().position(|entry| {
            entry.ready_at <= now
                && entry.depends_on.iter().all(|dep| self.acked.contains_key(dep))
        });

        match position {
            Some(idx) => {
                let entry = state.ready.remove(idx).expect("index just found");
                state.inflight.insert(entry.job.id.clone());
                Ok(Some(entry.job))
            }
            None => Ok(None),
        }
    }

    async fn ack(&self, job: &Job) -> Result<(), AtlasError> {
        let state_ref = self.state_for(&job.queue);
        let mut state = state_ref.lock().map_err(|_| {
            AtlasError::Internal(format!("queue '{}' mutex poisoned", job.queue))
        })?;
        state.inflight.remove(&job.id);
        self.acked.insert(job.id.clone(), ());
        Ok(())
    }

    async fn retry(&self, mut job: Job, delay: Duration, error: &str) -> Result<(), AtlasError> {
        let queue = job.queue.clone();
        job.attempts += 1;
        if job.attempts > MIN_RETRIES {
            return self.dead_letter(job, error, "queue-supervisor").await;
        }

        let state_ref = self.state_for(&queue);
        let mut state = state_ref.lock().map_err(|_| {
            AtlasError::Internal(format!("queue '{queue}' mutex poisoned"))
        })?;
        state.inflight.remove(&job.id);
        state.ready.push_back(Entry {
            job,
            ready_at: Instant::now() + delay,
            depends_on: Vec::new(),
        });
        Ok(())
    }

    async fn dead_letter(&self, job: Job, error: &str, worker_id: &str) -> Result<(), AtlasError> {
        let state_ref = self.state_for(&job.queue);
        {
            let mut state = state_ref.lock().map_err(|_| {
                AtlasError::Internal(format!("queue '{}' mutex poisoned", job.queue))
            })?;
            state.inflight.remove(&job.id);
        }
        self.dead_letters
            .entry(job.queue.clone())
            .or_default()
            .push(DeadLetter {
                job_id: job.id,
                queue: job.queue,
                payload: job.payload,
                error: error.to_string(),
                attempts: job.attempts,
                worker_id: worker_id.to_string(),
                timestamp: Utc::now(),
            });
        Ok(())
    }

    async fn pause(&self, queue: &str) -> Result<(), AtlasError> {
        let state_ref = self.state_for(queue);
        let mut state = state_ref.lock().map_err(|_| {
            AtlasError::Internal(format!("queue '{queue}' mutex poisoned"))
        })?;
        state.paused = true;
        Ok(())
    }

    async fn resume(&self, queue: &str) -> Result<(), AtlasError> {
        let state_ref = self.state_for(queue);
        let mut state = state_ref.lock().map_err(|_| {
            AtlasError::Internal(format!("queue '{queue}' mutex poisoned"))
        })?;
        state.paused = false;
        Ok(())
    }

    async fn is_paused(&self, queue: &str) -> Result<bool, AtlasError> {
        let state_ref = self.state_for(queue);
        let state = state_ref.lock().map_err(|_| {
            AtlasError::Internal(format!("queue '{queue}' mutex poisoned"))
        })?;
        Ok(state.paused)
    }

    async fn depth(&self, queue: &str) -> Result<usize, AtlasError> {
        let state_ref = self.state_for(queue);
        let state = state_ref.lock().map_err(|_| {
            AtlasError::Internal(format!("queue '{queue}' mutex poisoned"))
        })?;
        Ok(state.ready.len() + state.inflight.len())
    }

    async fn dead_letters(&self, queue: &str) -> Result<Vec<DeadLetter>, AtlasError> {
        Ok(self
            .dead_letters
            .get(queue)
            .map(|entries| entries.clone())
            .unwrap_or_default())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_enqueue_dedup_returns_same_id() {
        let queue = InMemoryQueue::new();
        let opts = EnqueueOptions {
            dedup_key: Some("file-analysis:abc".into()),
            ..Default::default()
        };
        let id1 = queue.enqueue("file-analysis", "{}", opts.clone()).await.unwrap();
        let id2 = queue.enqueue("file-analysis", "{}", opts).await.unwrap();
        assert_eq!(id1, id2);
        assert_eq!(queue.depth("file-analysis").await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_dequeue_respects_dependencies() {
        let queue = InMemoryQueue::new();
        let parent_id = queue
            .enqueue("q", "parent", EnqueueOptions::default())
            .await
            .unwrap();
        queue
            .enqueue(
                "q",
                "child",
                EnqueueOptions {
                    depends_on: vec![parent_id.clone()],
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        let first = queue.dequeue("q", "w1").await.unwrap().unwrap();
        assert_eq!(first.payload, "parent");
        assert!(queue.dequeue("q", "w1").await.unwrap().is_none());

        queue.ack(&first).await.unwrap();
        let second = queue.dequeue("q", "w1").await.unwrap().unwrap();
        assert_eq!(second.payload, "child");
    }

    #[tokio::test]
    async fn test_dequeue_respects_cross_queue_dependencies() {
        // EntityScout enqueues directory-resolution and finalization jobs
        // depending on file-analysis job ids living on a different queue
        // (spec.md §4.5 steps 5+7); acks must be visible across queues.
        let queue = InMemoryQueue::new();
        let parent_id = queue
            .enqueue("file-analysis", "parent", EnqueueOptions::default())
            .await
            .unwrap();
        queue
            .enqueue(
                "directory-resolution",
                "child",
                EnqueueOptions {
                    depends_on: vec![parent_id.clone()],
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        assert!(queue.dequeue("directory-resolution", "w1").await.unwrap().is_none());

        let parent = queue.dequeue("file-analysis", "w1").await.unwrap().unwrap();
        queue.ack(&parent).await.unwrap();

        let child = queue.dequeue("directory-resolution", "w1").await.unwrap().unwrap();
        assert_eq!(child.payload, "child");
    }

    #[tokio::test]
    async fn test_enqueue_dedup_extends_delay_instead_of_first_delay_winning() {
        // Validator's quiescence-window re-enqueue (spec.md §4.9): a second
        // enqueue for the same dedup_key while the first is still delayed
        // must push `ready_at` out rather than being dropped, so only the
        // *latest* delay survives.
        let queue = InMemoryQueue::new();
        let dedup_key = Some("reconciliation:run1:hash1".to_string());

        let id1 = queue
            .enqueue(
                "reconciliation",
                "first",
                EnqueueOptions { dedup_key: dedup_key.clone(), delay: Some(Duration::from_millis(40)), ..Default::default() },
            )
            .await
            .unwrap();

        tokio::time::sleep(Duration::from_millis(25)).await;
        let id2 = queue
            .enqueue(
                "reconciliation",
                "second",
                EnqueueOptions { dedup_key, delay: Some(Duration::from_millis(40)), ..Default::default() },
            )
            .await
            .unwrap();
        assert_eq!(id1, id2);
        assert_eq!(queue.depth("reconciliation").await.unwrap(), 1);

        // The first delay would have elapsed by now were it not extended.
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(queue.dequeue("reconciliation", "w1").await.unwrap().is_none());

        tokio::time::sleep(Duration::from_millis(25)).await;
        let job = queue.dequeue("reconciliation", "w1").await.unwrap().unwrap();
        assert_eq!(job.payload, "second");
    }

    #[tokio::test]
    async fn test_enqueue_dedup_key_is_free_again_after_dequeue() {
        let queue = InMemoryQueue::new();
        let opts = EnqueueOptions {
            dedup_key: Some("reconciliation:run1:hash1".into()),
            ..Default::default()
        };
        let id1 = queue.enqueue("reconciliation", "first", opts.clone()).await.unwrap();
        let job = queue.dequeue("reconciliation", "w1").await.unwrap().unwrap();
        assert_eq!(job.id, id1);
        queue.ack(&job).await.unwrap();

        let id2 = queue.enqueue("reconciliation", "second", opts).await.unwrap();
        assert_ne!(id1, id2);
        let job2 = queue.dequeue("reconciliation", "w1").await.unwrap().unwrap();
        assert_eq!(job2.payload, "second");
    }

    #[tokio::test]
    async fn test_retry_exhausts_into_dead_letter() {
        let queue = InMemoryQueue::new();
        queue.enqueue("q", "payload", EnqueueOptions::default()).await.unwrap();
        let mut job = queue.dequeue("q", "w1").await.unwrap().unwrap();

        for _ in 0..MIN_RETRIES {
            queue.retry(job.clone(), Duration::from_millis(0), "boom").await.unwrap();
            job = queue.dequeue("q", "w1").await.unwrap().unwrap();
        }
        queue.retry(job, Duration::from_millis(0), "final boom").await.unwrap();

        let dead = queue.dead_letters("q").await.unwrap();
        assert_eq!(dead.len(), 1);
    }

    #[tokio::test]
    async fn test_pause_blocks_dequeue() {
        let queue = InMemoryQueue::new();
        queue.enqueue("q", "payload", EnqueueOptions::default()).await.unwrap();
        queue.pause("q").await.unwrap();
        assert!(queue.dequeue("q", "w1").await.unwrap().is_none());
        queue.resume("q").await.unwrap();
        assert!(queue.dequeue("q", "w1").await.unwrap().is_some());
    }
}
