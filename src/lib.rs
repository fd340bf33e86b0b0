//! # queue-mock: Test-Support Shim for Background Job Queues
//!
//! **Observable process stubs and deterministic queue draining**
//!
//! Background queue engines typically allow exactly one process-handler
//! registration per job type for the lifetime of the process and expose no
//! unregistration. That makes test suites leaky: the first test to register
//! a handler owns the type forever, and jobs pile up across cases.
//! queue-mock solves both problems:
//!
//! - **Stub registry**: many logical stubs share the single handler slot
//!   per job type. One bridging handler is installed with the engine per
//!   type; it resolves the *current* stub at invocation time, so restubbing
//!   (last writer wins) and explicit release work without ever
//!   re-registering. Stubs are observable (call counts and received jobs)
//!   and default to an auto-completing no-op.
//! - **Queue draining**: `clean()` counts every persisted job across all
//!   lifecycle states, lists that many handles in ascending order, and
//!   removes them concurrently — every handle gets its attempt even when an
//!   earlier removal fails, and the first failure becomes the one reported.
//!
//! ## Quick Start
//!
//! ```rust
//! use std::sync::Arc;
//! use queue_mock::{JobState, MemoryEngine, MockQueue, QueueEngine};
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> Result<(), queue_mock::EngineError> {
//! let engine = Arc::new(MemoryEngine::new());
//! let mock = MockQueue::new(engine.clone());
//!
//! // Replace the real processing logic with an observable stand-in.
//! let stub = mock.stub("send_email").await?;
//!
//! let job_id = engine.create("send_email", serde_json::json!({ "to": "user@example.com" }));
//! assert_eq!(engine.settled(job_id).await?, JobState::Completed);
//! assert_eq!(stub.call_count(), 1);
//!
//! // Drain everything between test cases.
//! mock.clean().await?;
//! assert_eq!(engine.count_jobs().await?, 0);
//! # Ok(())
//! # }
//! ```

pub mod drain;
pub mod engine;
pub mod error;
pub mod mock;
pub mod stub;
pub mod types;

// Core API exports
pub use drain::drain_all;
pub use engine::memory::MemoryEngine;
pub use engine::{JobHandle, ProcessHandler, QueueEngine, SortOrder};
pub use error::{EngineError, EngineResult, JobError};
pub use mock::{MockConfig, MockQueue};
pub use stub::{handler_fn, JobStub, StubHandler, StubRegistry};
pub use types::{JobEvent, JobId, JobRecord, JobState};

/// Prelude for test suites built on the mock facade
pub mod prelude {
    // Facade and stubbing
    pub use crate::{JobStub, MockConfig, MockQueue};

    // Engine boundary
    pub use crate::{JobHandle, MemoryEngine, QueueEngine, SortOrder};

    // Job model and lifecycle events
    pub use crate::{JobEvent, JobId, JobRecord, JobState};

    // Errors
    pub use crate::{EngineError, EngineResult, JobError};

    // Essential traits
    pub use async_trait::async_trait;
}
