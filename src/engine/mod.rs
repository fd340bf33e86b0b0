pub mod memory;

use async_trait::async_trait;
use futures::future::BoxFuture;
use futures_core::Stream;
use std::pin::Pin;
use std::sync::Arc;

use crate::{EngineResult, JobError, types::{JobId, JobRecord}};

/// Type alias for boxed streams (stable Rust compatible)
pub type BoxStream<T> = Pin<Box<dyn Stream<Item = T> + Send + 'static>>;

/// Type-erased process handler invoked by the engine for each delivered job
///
/// Returning `Ok(())` completes the job; returning `Err` fails it. This is
/// the async rendition of a `(job, done)` completion-callback handler.
pub type ProcessHandler =
    Arc<dyn Fn(JobRecord) -> BoxFuture<'static, Result<(), JobError>> + Send + Sync>;

/// Listing order for job enumeration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortOrder {
    Ascending,
    Descending,
}

/// Boundary trait for the external queue engine
///
/// The engine owns persistence, state transitions, and handler invocation.
/// Its registration slot is append-only: exactly one process handler per
/// job type for the lifetime of the engine, with no unregistration. The
/// stub registry works around that constraint; this trait only states it.
#[async_trait]
pub trait QueueEngine: Send + Sync {
    /// Register the single process handler for a job type.
    ///
    /// Registering the same type twice is an error
    /// ([`EngineError::HandlerAlreadyRegistered`](crate::EngineError::HandlerAlreadyRegistered)).
    async fn process(&self, job_type: &str, handler: ProcessHandler) -> EngineResult<()>;

    /// Total persisted job count across all lifecycle states
    async fn count_jobs(&self) -> EngineResult<u64>;

    /// List job handles covering indices `[start, end]` (inclusive) in the
    /// given order
    async fn list_range(
        &self,
        start: u64,
        end: u64,
        order: SortOrder,
    ) -> EngineResult<Vec<Arc<dyn JobHandle>>>;
}

/// Handle to one persisted job, sufficient to remove it
#[async_trait]
pub trait JobHandle: Send + Sync {
    /// The job this handle refers to
    fn job_id(&self) -> JobId;

    /// Remove the job from the backing store regardless of its state
    async fn remove(&self) -> EngineResult<()>;
}
