use futures::future;
use tracing::{debug, instrument, warn};

use crate::engine::{QueueEngine, SortOrder};
use crate::EngineResult;

/// Remove every persisted job regardless of lifecycle state
///
/// Counts the persisted jobs, lists that many handles in ascending order,
/// and removes them concurrently. Counting and listing failures are fatal
/// before any removal is attempted. An individual removal failure does not
/// stop sibling removals; the first failure in join order (which is listing
/// order) becomes the overall result. Errors propagate unchanged.
#[instrument(skip(engine))]
pub async fn drain_all(engine: &dyn QueueEngine) -> EngineResult<()> {
    let count = engine.count_jobs().await?;
    let handles = engine.list_range(0, count, SortOrder::Ascending).await?;

    // Fire all removals, then join; join_all never cancels siblings.
    let results = future::join_all(handles.iter().map(|handle| handle.remove())).await;

    let attempted = results.len();
    let mut failed = 0usize;
    let mut first_error = None;
    for result in results {
        if let Err(error) = result {
            failed += 1;
            if first_error.is_none() {
                first_error = Some(error);
            }
        }
    }

    match first_error {
        None => {
            debug!(removed = attempted, "queue drained");
            Ok(())
        }
        Some(error) => {
            warn!(failed, attempted, "queue drain finished with failures");
            Err(error)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    use crate::engine::{JobHandle, ProcessHandler};
    use crate::types::JobId;
    use crate::EngineError;

    struct ScriptedHandle {
        job_id: JobId,
        failure: Option<EngineError>,
        removals: AtomicUsize,
    }

    impl ScriptedHandle {
        fn ok(id: u64) -> Arc<Self> {
            Arc::new(Self {
                job_id: JobId(id),
                failure: None,
                removals: AtomicUsize::new(0),
            })
        }

        fn failing(id: u64, msg: &str) -> Arc<Self> {
            Arc::new(Self {
                job_id: JobId(id),
                failure: Some(EngineError::backend(msg)),
                removals: AtomicUsize::new(0),
            })
        }

        fn removals(&self) -> usize {
            self.removals.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl JobHandle for ScriptedHandle {
        fn job_id(&self) -> JobId {
            self.job_id
        }

        async fn remove(&self) -> EngineResult<()> {
            self.removals.fetch_add(1, Ordering::SeqCst);
            match &self.failure {
                Some(error) => Err(error.clone()),
                None => Ok(()),
            }
        }
    }

    struct ScriptedEngine {
        count: Result<u64, EngineError>,
        listing: Result<Vec<Arc<ScriptedHandle>>, EngineError>,
        count_calls: AtomicUsize,
        list_calls: AtomicUsize,
    }

    impl ScriptedEngine {
        fn with_handles(handles: Vec<Arc<ScriptedHandle>>) -> Self {
            Self {
                count: Ok(handles.len() as u64),
                listing: Ok(handles),
                count_calls: AtomicUsize::new(0),
                list_calls: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl QueueEngine for ScriptedEngine {
        async fn process(&self, _job_type: &str, _handler: ProcessHandler) -> EngineResult<()> {
            Ok(())
        }

        async fn count_jobs(&self) -> EngineResult<u64> {
            self.count_calls.fetch_add(1, Ordering::SeqCst);
            self.count.clone()
        }

        async fn list_range(
            &self,
            _start: u64,
            _end: u64,
            _order: SortOrder,
        ) -> EngineResult<Vec<Arc<dyn JobHandle>>> {
            self.list_calls.fetch_add(1, Ordering::SeqCst);
            self.listing.clone().map(|handles| {
                handles
                    .into_iter()
                    .map(|handle| handle as Arc<dyn JobHandle>)
                    .collect()
            })
        }
    }

    #[tokio::test]
    async fn removes_every_handle_and_succeeds() {
        let handles = vec![ScriptedHandle::ok(1), ScriptedHandle::ok(2), ScriptedHandle::ok(3)];
        let engine = ScriptedEngine::with_handles(handles.clone());

        drain_all(&engine).await.unwrap();

        for handle in &handles {
            assert_eq!(handle.removals(), 1);
        }
    }

    #[tokio::test]
    async fn one_removal_failure_does_not_stop_the_siblings() {
        let handles = vec![
            ScriptedHandle::ok(1),
            ScriptedHandle::failing(2, "remove failure"),
            ScriptedHandle::ok(3),
        ];
        let engine = ScriptedEngine::with_handles(handles.clone());

        let result = drain_all(&engine).await;

        assert_eq!(result.unwrap_err(), EngineError::backend("remove failure"));
        for handle in &handles {
            assert_eq!(handle.removals(), 1);
        }
    }

    #[tokio::test]
    async fn first_failure_in_listing_order_wins() {
        let handles = vec![
            ScriptedHandle::failing(1, "first failure"),
            ScriptedHandle::failing(2, "second failure"),
        ];
        let engine = ScriptedEngine::with_handles(handles);

        let result = drain_all(&engine).await;

        assert_eq!(result.unwrap_err(), EngineError::backend("first failure"));
    }

    #[tokio::test]
    async fn counting_failure_is_fatal_before_listing() {
        let engine = ScriptedEngine {
            count: Err(EngineError::backend("count failure")),
            listing: Ok(Vec::new()),
            count_calls: AtomicUsize::new(0),
            list_calls: AtomicUsize::new(0),
        };

        let result = drain_all(&engine).await;

        assert_eq!(result.unwrap_err(), EngineError::backend("count failure"));
        assert_eq!(engine.list_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn listing_failure_is_fatal_before_removals() {
        let doomed = ScriptedHandle::ok(1);
        let engine = ScriptedEngine {
            count: Ok(1),
            listing: Err(EngineError::backend("listing failure")),
            count_calls: AtomicUsize::new(0),
            list_calls: AtomicUsize::new(0),
        };

        let result = drain_all(&engine).await;

        assert_eq!(result.unwrap_err(), EngineError::backend("listing failure"));
        assert_eq!(doomed.removals(), 0);
    }

    #[tokio::test]
    async fn empty_queue_drains_cleanly() {
        let engine = ScriptedEngine::with_handles(Vec::new());

        drain_all(&engine).await.unwrap();
        assert_eq!(engine.count_calls.load(Ordering::SeqCst), 1);
    }
}
