use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use parking_lot::RwLock;
use tokio::sync::broadcast;
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::StreamExt;
use tracing::debug;

use crate::engine::{BoxStream, JobHandle, ProcessHandler, QueueEngine, SortOrder};
use crate::types::{JobEvent, JobId, JobRecord, JobState};
use crate::{EngineError, EngineResult};

/// Default key prefix for mock-mode storage
pub const DEFAULT_PREFIX: &str = "queue-mock";

/// In-memory queue engine for testing and development
///
/// Implements the full engine boundary: install-once process handlers,
/// whole-queue counting, ascending listing, and per-job removal. Jobs of a
/// type with no registered handler stay `Waiting`; registering a handler
/// delivers any jobs already waiting for that type.
#[derive(Clone)]
pub struct MemoryEngine {
    inner: Arc<EngineInner>,
}

struct EngineInner {
    /// Key prefix namespacing this engine's storage
    prefix: String,

    /// Sequential id allocator (ascending id order is enqueue order)
    next_id: AtomicU64,

    /// Job records indexed by job_id, iterated in ascending id order
    jobs: RwLock<BTreeMap<JobId, JobRecord>>,

    /// Registered process handlers by job type (install-once)
    handlers: RwLock<HashMap<String, ProcessHandler>>,

    /// Event broadcaster for lifecycle observability
    events: broadcast::Sender<JobEvent>,
}

impl EngineInner {
    fn emit(&self, event: JobEvent) {
        // No subscribers is fine
        let _ = self.events.send(event);
    }
}

impl MemoryEngine {
    pub fn new() -> Self {
        Self::with_prefix(DEFAULT_PREFIX)
    }

    /// Create an engine namespaced by the given key prefix
    pub fn with_prefix(prefix: impl Into<String>) -> Self {
        let (events, _) = broadcast::channel(1024);
        Self {
            inner: Arc::new(EngineInner {
                prefix: prefix.into(),
                next_id: AtomicU64::new(1),
                jobs: RwLock::new(BTreeMap::new()),
                handlers: RwLock::new(HashMap::new()),
                events,
            }),
        }
    }

    /// The key prefix this engine was created with
    pub fn prefix(&self) -> &str {
        &self.inner.prefix
    }

    /// Enqueue a job
    ///
    /// If a process handler is registered for `job_type`, delivery is
    /// spawned onto the current Tokio runtime; otherwise the job stays
    /// `Waiting` until a handler is registered.
    ///
    /// # Panics
    ///
    /// Panics if a handler is registered for `job_type` and this is called
    /// outside a Tokio runtime context. Enqueuing a job with no handler
    /// spawns nothing and needs no runtime.
    pub fn create(&self, job_type: &str, payload: serde_json::Value) -> JobId {
        let job_id = JobId(self.inner.next_id.fetch_add(1, Ordering::SeqCst));
        let record = JobRecord::new(job_id, job_type, payload);

        self.inner.jobs.write().insert(job_id, record);
        self.inner.emit(JobEvent::Enqueued {
            job_id,
            job_type: job_type.to_string(),
            at: Utc::now(),
        });
        debug!(prefix = %self.inner.prefix, %job_id, job_type, "enqueued job");

        let has_handler = self.inner.handlers.read().contains_key(job_type);
        if has_handler {
            tokio::spawn(deliver(Arc::clone(&self.inner), job_id));
        }

        job_id
    }

    /// Get a snapshot of one job record
    pub fn record(&self, job_id: JobId) -> Option<JobRecord> {
        self.inner.jobs.read().get(&job_id).cloned()
    }

    /// Count persisted jobs currently in the given state
    pub fn count_in_state(&self, state: JobState) -> u64 {
        self.inner
            .jobs
            .read()
            .values()
            .filter(|record| record.state == state)
            .count() as u64
    }

    /// Wait until the job reaches a terminal state and return it
    ///
    /// Returns [`EngineError::JobNotFound`] if the job does not exist or is
    /// removed before settling.
    pub async fn settled(&self, job_id: JobId) -> EngineResult<JobState> {
        // Subscribe before inspecting state so no transition is missed
        let mut events = self.inner.events.subscribe();
        loop {
            match self.record(job_id) {
                Some(record) if record.state.is_terminal() => return Ok(record.state),
                Some(_) => {}
                None => return Err(EngineError::JobNotFound(job_id)),
            }
            match events.recv().await {
                Ok(_) | Err(broadcast::error::RecvError::Lagged(_)) => continue,
                Err(broadcast::error::RecvError::Closed) => {
                    return Err(EngineError::JobNotFound(job_id));
                }
            }
        }
    }

    /// Subscribe to lifecycle events
    pub fn subscribe(&self) -> broadcast::Receiver<JobEvent> {
        self.inner.events.subscribe()
    }

    /// Lifecycle event stream (boxed for stable Rust)
    pub fn event_stream(&self) -> BoxStream<JobEvent> {
        Box::pin(BroadcastStream::new(self.subscribe()).filter_map(|event| event.ok()))
    }
}

impl Default for MemoryEngine {
    fn default() -> Self {
        Self::new()
    }
}

/// Run one job through its registered process handler
async fn deliver(inner: Arc<EngineInner>, job_id: JobId) {
    let record = {
        let mut jobs = inner.jobs.write();
        match jobs.get_mut(&job_id) {
            Some(record) if record.state == JobState::Waiting => {
                record.start();
                record.clone()
            }
            // Removed, or already picked up by another delivery
            _ => return,
        }
    };

    let handler = {
        let handlers = inner.handlers.read();
        match handlers.get(&record.job_type) {
            Some(handler) => Arc::clone(handler),
            None => return,
        }
    };

    inner.emit(JobEvent::Started {
        job_id,
        job_type: record.job_type.clone(),
        at: Utc::now(),
    });

    let result = handler(record).await;

    let event = {
        let mut jobs = inner.jobs.write();
        match jobs.get_mut(&job_id) {
            Some(record) => match result {
                Ok(()) => {
                    record.complete();
                    Some(JobEvent::Completed { job_id, at: Utc::now() })
                }
                Err(error) => {
                    record.fail(error.to_string());
                    Some(JobEvent::Failed {
                        job_id,
                        error: error.to_string(),
                        at: Utc::now(),
                    })
                }
            },
            // Removed while in flight
            None => None,
        }
    };
    if let Some(event) = event {
        inner.emit(event);
    }
}

#[async_trait]
impl QueueEngine for MemoryEngine {
    async fn process(&self, job_type: &str, handler: ProcessHandler) -> EngineResult<()> {
        {
            let mut handlers = self.inner.handlers.write();
            if handlers.contains_key(job_type) {
                return Err(EngineError::HandlerAlreadyRegistered(job_type.to_string()));
            }
            handlers.insert(job_type.to_string(), handler);
        }
        debug!(prefix = %self.inner.prefix, job_type, "registered process handler");

        // Deliver jobs that were enqueued before the handler existed
        let pending: Vec<JobId> = self
            .inner
            .jobs
            .read()
            .values()
            .filter(|record| record.job_type == job_type && record.state == JobState::Waiting)
            .map(|record| record.job_id)
            .collect();
        for job_id in pending {
            tokio::spawn(deliver(Arc::clone(&self.inner), job_id));
        }

        Ok(())
    }

    async fn count_jobs(&self) -> EngineResult<u64> {
        Ok(self.inner.jobs.read().len() as u64)
    }

    async fn list_range(
        &self,
        start: u64,
        end: u64,
        order: SortOrder,
    ) -> EngineResult<Vec<Arc<dyn JobHandle>>> {
        if end < start {
            return Ok(Vec::new());
        }

        let mut ids: Vec<JobId> = self.inner.jobs.read().keys().copied().collect();
        if order == SortOrder::Descending {
            ids.reverse();
        }

        let take = (end - start + 1) as usize;
        let handles = ids
            .into_iter()
            .skip(start as usize)
            .take(take)
            .map(|job_id| {
                Arc::new(MemoryJobHandle {
                    inner: Arc::clone(&self.inner),
                    job_id,
                }) as Arc<dyn JobHandle>
            })
            .collect();

        Ok(handles)
    }
}

/// Handle to one job stored in a [`MemoryEngine`]
struct MemoryJobHandle {
    inner: Arc<EngineInner>,
    job_id: JobId,
}

#[async_trait]
impl JobHandle for MemoryJobHandle {
    fn job_id(&self) -> JobId {
        self.job_id
    }

    async fn remove(&self) -> EngineResult<()> {
        let removed = self.inner.jobs.write().remove(&self.job_id);
        match removed {
            Some(_) => {
                self.inner.emit(JobEvent::Removed {
                    job_id: self.job_id,
                    at: Utc::now(),
                });
                debug!(job_id = %self.job_id, "removed job");
                Ok(())
            }
            None => Err(EngineError::JobNotFound(self.job_id)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::JobError;

    fn noop_handler() -> ProcessHandler {
        Arc::new(|_job| Box::pin(async { Ok::<(), JobError>(()) }))
    }

    #[test]
    fn create_without_a_handler_needs_no_runtime() {
        let engine = MemoryEngine::new();
        let job_id = engine.create("orphan", serde_json::json!({}));
        assert_eq!(engine.record(job_id).unwrap().state, JobState::Waiting);
    }

    #[tokio::test]
    async fn job_without_handler_stays_waiting() {
        let engine = MemoryEngine::new();
        let job_id = engine.create("orphan", serde_json::json!({}));

        assert_eq!(engine.record(job_id).unwrap().state, JobState::Waiting);
        assert_eq!(engine.count_jobs().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn registering_handler_delivers_already_waiting_jobs() {
        let engine = MemoryEngine::new();
        let job_id = engine.create("late_handler", serde_json::json!({"n": 1}));

        engine.process("late_handler", noop_handler()).await.unwrap();

        assert_eq!(engine.settled(job_id).await.unwrap(), JobState::Completed);
    }

    #[tokio::test]
    async fn handler_error_fails_the_job() {
        let engine = MemoryEngine::new();
        engine
            .process(
                "doomed",
                Arc::new(|_job| Box::pin(async { Err(JobError::new("Oops!")) })),
            )
            .await
            .unwrap();

        let job_id = engine.create("doomed", serde_json::json!({}));

        assert_eq!(engine.settled(job_id).await.unwrap(), JobState::Failed);
        let record = engine.record(job_id).unwrap();
        assert_eq!(record.last_error.as_deref(), Some("Oops!"));
    }

    #[tokio::test]
    async fn process_is_install_once() {
        let engine = MemoryEngine::new();
        engine.process("once", noop_handler()).await.unwrap();

        let result = engine.process("once", noop_handler()).await;
        assert_eq!(
            result,
            Err(EngineError::HandlerAlreadyRegistered("once".to_string()))
        );
    }

    #[tokio::test]
    async fn list_range_is_ascending_and_inclusive() {
        let engine = MemoryEngine::new();
        let first = engine.create("a", serde_json::json!({}));
        let second = engine.create("b", serde_json::json!({}));
        let third = engine.create("c", serde_json::json!({}));

        let count = engine.count_jobs().await.unwrap();
        let handles = engine.list_range(0, count, SortOrder::Ascending).await.unwrap();

        let ids: Vec<JobId> = handles.iter().map(|handle| handle.job_id()).collect();
        assert_eq!(ids, vec![first, second, third]);
    }

    #[tokio::test]
    async fn remove_deletes_and_second_remove_reports_missing() {
        let engine = MemoryEngine::new();
        let job_id = engine.create("removable", serde_json::json!({}));

        let handles = engine.list_range(0, 1, SortOrder::Ascending).await.unwrap();
        assert_eq!(handles.len(), 1);

        handles[0].remove().await.unwrap();
        assert_eq!(engine.count_jobs().await.unwrap(), 0);

        assert_eq!(
            handles[0].remove().await,
            Err(EngineError::JobNotFound(job_id))
        );
    }
}
