use std::future::Future;
use std::sync::Arc;

use tracing::{info, instrument};

use crate::drain;
use crate::engine::memory::{MemoryEngine, DEFAULT_PREFIX};
use crate::engine::QueueEngine;
use crate::stub::{handler_fn, JobStub, StubRegistry};
use crate::types::JobRecord;
use crate::{EngineResult, JobError};

/// Facade configuration
#[derive(Debug, Clone)]
pub struct MockConfig {
    /// Key prefix namespacing mock-mode storage, so mock usage never
    /// collides with a production queue sharing the same backend
    pub prefix: String,
}

impl Default for MockConfig {
    fn default() -> Self {
        Self {
            prefix: DEFAULT_PREFIX.to_string(),
        }
    }
}

/// Test-support facade over a queue engine
///
/// [`stub`](Self::stub) replaces a job type's processing logic with an
/// observable stand-in; [`clean`](Self::clean) drains every persisted job
/// between test cases.
pub struct MockQueue {
    engine: Arc<dyn QueueEngine>,
    registry: StubRegistry,
    config: MockConfig,
}

impl MockQueue {
    /// Wrap an existing engine with the default configuration
    pub fn new(engine: Arc<dyn QueueEngine>) -> Self {
        Self::with_config(engine, MockConfig::default())
    }

    /// Wrap an existing engine with an explicit configuration
    pub fn with_config(engine: Arc<dyn QueueEngine>, config: MockConfig) -> Self {
        Self {
            registry: StubRegistry::new(Arc::clone(&engine)),
            engine,
            config,
        }
    }

    /// Create a facade backed by a fresh in-memory engine
    ///
    /// Returns the engine alongside the facade so tests can enqueue jobs
    /// and observe lifecycle state directly.
    pub fn in_memory() -> (Self, MemoryEngine) {
        Self::in_memory_with(MockConfig::default())
    }

    /// Like [`in_memory`](Self::in_memory) with an explicit configuration
    pub fn in_memory_with(config: MockConfig) -> (Self, MemoryEngine) {
        let engine = MemoryEngine::with_prefix(config.prefix.clone());
        let facade = Self::with_config(Arc::new(engine.clone()), config);
        (facade, engine)
    }

    /// Stub the job process for `job_type` with an observable no-op
    ///
    /// Every call returns a fresh stub and supersedes the previous one for
    /// the same type (last writer wins).
    #[instrument(skip(self))]
    pub async fn stub(&self, job_type: &str) -> EngineResult<JobStub> {
        let stub = self.registry.register(job_type, None).await?;
        info!(job_type, "stubbed job process");
        Ok(stub)
    }

    /// Stub the job process for `job_type` with a custom implementation
    #[instrument(skip(self, f))]
    pub async fn stub_with<F, Fut>(&self, job_type: &str, f: F) -> EngineResult<JobStub>
    where
        F: Fn(JobRecord) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), JobError>> + Send + 'static,
    {
        let stub = self.registry.register(job_type, Some(handler_fn(f))).await?;
        info!(job_type, "stubbed job process with custom implementation");
        Ok(stub)
    }

    /// Release a stub, restoring no-op behavior for its type
    ///
    /// A no-op if the stub has already been superseded or released.
    pub fn release(&self, stub: &JobStub) {
        self.registry.release(stub);
    }

    /// Remove all persisted jobs of every lifecycle state
    ///
    /// Resolves once every removal has settled; fails with the first error
    /// encountered while still attempting every removal. See
    /// [`drain_all`](crate::drain::drain_all) for the exact semantics.
    #[instrument(skip(self))]
    pub async fn clean(&self) -> EngineResult<()> {
        drain::drain_all(self.engine.as_ref()).await
    }

    /// The engine this facade operates on
    pub fn engine(&self) -> &Arc<dyn QueueEngine> {
        &self.engine
    }

    /// Get the configuration
    pub fn config(&self) -> &MockConfig {
        &self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_uses_the_crate_prefix() {
        assert_eq!(MockConfig::default().prefix, "queue-mock");
    }

    #[tokio::test]
    async fn in_memory_facade_shares_the_returned_engine() {
        let (mock, engine) = MockQueue::in_memory_with(MockConfig {
            prefix: "isolated".to_string(),
        });

        assert_eq!(engine.prefix(), "isolated");
        assert_eq!(mock.config().prefix, "isolated");

        engine.create("untouched", serde_json::json!({}));
        assert_eq!(engine.count_jobs().await.unwrap(), 1);

        mock.clean().await.unwrap();
        assert_eq!(engine.count_jobs().await.unwrap(), 0);
    }
}
