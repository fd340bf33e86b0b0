use std::collections::{HashMap, HashSet};
use std::future::Future;
use std::sync::Arc;

use futures::future::BoxFuture;
use parking_lot::{Mutex, RwLock};
use tokio::sync::Mutex as AsyncMutex;
use tracing::debug;

use crate::engine::{ProcessHandler, QueueEngine};
use crate::types::JobRecord;
use crate::{EngineResult, JobError};

/// Replaceable stub implementation held by a [`JobStub`]
///
/// Same shape as [`ProcessHandler`]: `Ok(())` completes the job, `Err`
/// fails it.
pub type StubHandler =
    Arc<dyn Fn(JobRecord) -> BoxFuture<'static, Result<(), JobError>> + Send + Sync>;

/// Adapt a plain async closure into a [`StubHandler`]
pub fn handler_fn<F, Fut>(f: F) -> StubHandler
where
    F: Fn(JobRecord) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<(), JobError>> + Send + 'static,
{
    Arc::new(move |job| Box::pin(f(job)))
}

/// Auto-completing no-op; invocation recording is the stub's own concern
fn default_handler() -> StubHandler {
    Arc::new(|_job| Box::pin(async { Ok::<(), JobError>(()) }))
}

/// An observable stand-in for one job type's processing logic
///
/// Records every invocation (count and received job records) and forwards
/// to its current handler. The handler can be replaced after creation with
/// [`set_handler`](Self::set_handler); replacement takes effect on the next
/// invocation and is an atomic swap, so an in-flight delivery sees either
/// the old or the new handler, never a torn value.
#[derive(Clone)]
pub struct JobStub {
    shared: Arc<StubShared>,
}

struct StubShared {
    job_type: String,
    handler: RwLock<StubHandler>,
    calls: Mutex<Vec<JobRecord>>,
}

impl JobStub {
    fn new(job_type: String, handler: StubHandler) -> Self {
        Self {
            shared: Arc::new(StubShared {
                job_type,
                handler: RwLock::new(handler),
                calls: Mutex::new(Vec::new()),
            }),
        }
    }

    /// The job type this stub stands in for
    pub fn job_type(&self) -> &str {
        &self.shared.job_type
    }

    /// Replace the stub implementation; applies from the next invocation
    pub fn set_handler<F, Fut>(&self, f: F)
    where
        F: Fn(JobRecord) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), JobError>> + Send + 'static,
    {
        *self.shared.handler.write() = handler_fn(f);
    }

    /// Number of times this stub has been invoked
    pub fn call_count(&self) -> usize {
        self.shared.calls.lock().len()
    }

    /// Whether this stub has been invoked at least once
    pub fn was_called(&self) -> bool {
        self.call_count() > 0
    }

    /// Snapshot of the job records this stub received, in invocation order
    pub fn calls(&self) -> Vec<JobRecord> {
        self.shared.calls.lock().clone()
    }

    fn invoke(shared: &Arc<StubShared>, job: JobRecord) -> BoxFuture<'static, Result<(), JobError>> {
        shared.calls.lock().push(job.clone());
        let handler = Arc::clone(&*shared.handler.read());
        handler(job)
    }
}

impl std::fmt::Debug for JobStub {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JobStub")
            .field("job_type", &self.shared.job_type)
            .field("call_count", &self.call_count())
            .finish()
    }
}

/// Maps each job type to its current stub behind the engine's single,
/// permanent process-handler slot
///
/// The engine allows exactly one `process` registration per job type and
/// exposes no unregistration, so the registry installs one bridging handler
/// per type and indirects through it: the bridge resolves the *current*
/// stub at invocation time. Restubbing a type replaces only the mapping
/// slot (last writer wins); the installed set never shrinks.
pub struct StubRegistry {
    engine: Arc<dyn QueueEngine>,
    shared: Arc<RegistryShared>,
}

struct RegistryShared {
    /// Job type -> current stub (at most one live entry per type)
    mapping: RwLock<HashMap<String, Arc<StubShared>>>,

    /// Job types whose bridging handler is installed with the engine
    installed: Mutex<HashSet<String>>,

    /// Serializes bridge installation: a concurrent register for a type
    /// whose installation is in flight waits here instead of observing
    /// "installed" early and skipping the engine call
    install_lock: AsyncMutex<()>,
}

impl StubRegistry {
    pub fn new(engine: Arc<dyn QueueEngine>) -> Self {
        Self {
            engine,
            shared: Arc::new(RegistryShared {
                mapping: RwLock::new(HashMap::new()),
                installed: Mutex::new(HashSet::new()),
                install_lock: AsyncMutex::new(()),
            }),
        }
    }

    /// Register a stub for `job_type`, superseding any current one
    ///
    /// Installs the bridging handler with the engine on first use of the
    /// type. `handler` defaults to an auto-completing no-op.
    pub async fn register(
        &self,
        job_type: &str,
        handler: Option<StubHandler>,
    ) -> EngineResult<JobStub> {
        self.install_bridge(job_type).await?;

        let stub = JobStub::new(
            job_type.to_string(),
            handler.unwrap_or_else(default_handler),
        );
        self.shared
            .mapping
            .write()
            .insert(job_type.to_string(), Arc::clone(&stub.shared));
        debug!(job_type, "registered stub");

        Ok(stub)
    }

    /// Clear the mapping slot if `stub` is still the current entry
    ///
    /// Idempotent; releasing a superseded stub is a no-op. The bridging
    /// handler stays installed, so further jobs of the type complete as
    /// no-ops until a new stub is registered.
    pub fn release(&self, stub: &JobStub) {
        let mut mapping = self.shared.mapping.write();
        if let Some(current) = mapping.get(stub.job_type()) {
            if Arc::ptr_eq(current, &stub.shared) {
                mapping.remove(stub.job_type());
                debug!(job_type = stub.job_type(), "released stub");
            }
        }
    }

    /// Whether the bridging handler for `job_type` has been installed
    pub fn is_installed(&self, job_type: &str) -> bool {
        self.shared.installed.lock().contains(job_type)
    }

    async fn install_bridge(&self, job_type: &str) -> EngineResult<()> {
        let _guard = self.shared.install_lock.lock().await;

        if self.shared.installed.lock().contains(job_type) {
            return Ok(());
        }

        let shared = Arc::clone(&self.shared);
        let bridge_type = job_type.to_string();
        let bridge: ProcessHandler = Arc::new(move |job: JobRecord| {
            // Resolve the current stub at invocation time so restubs and
            // releases take effect without re-registering with the engine.
            let current = shared.mapping.read().get(&bridge_type).cloned();
            match current {
                Some(stub) => JobStub::invoke(&stub, job),
                // No current stub: complete the job as a no-op so it never
                // hangs the queue or a later drain.
                None => Box::pin(async { Ok(()) }),
            }
        });

        // The type counts as installed only once the engine accepted the
        // registration; on failure the next register retries.
        self.engine.process(job_type, bridge).await?;
        self.shared.installed.lock().insert(job_type.to_string());
        debug!(job_type, "installed bridging handler");
        Ok(())
    }
}
