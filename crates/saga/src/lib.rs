//! Saga orchestration engine.
//!
//! A saga is a set of named steps with declared dependencies. The engine
//! runs every step whose dependencies have finished, concurrently with its
//! independent peers, expands list inputs into one invocation per element,
//! and skips steps whose activation predicate is false. When any
//! invocation fails, the engine stops launching work, waits for in-flight
//! invocations, and runs the registered compensation of every succeeded
//! invocation in reverse completion order.
//!
//! ```no_run
//! use std::sync::Arc;
//! use saga::{
//!     EngineConfig, SagaContext, SagaDefinition, SagaEngine, StepDefinition, StepInputs,
//!     StepRegistry, compensation_fn, step_fn,
//! };
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let mut registry = StepRegistry::new();
//! registry.register(
//!     SagaDefinition::builder("Transfer")
//!         .step(
//!             StepDefinition::new("debit").compensate("refund"),
//!             step_fn(|amount: u64, _ctx: SagaContext| async move { Ok(Some(amount)) }),
//!         )
//!         .step(
//!             StepDefinition::new("credit").depends_on(["debit"]),
//!             step_fn(|amount: u64, _ctx: SagaContext| async move { Ok(Some(amount)) }),
//!         )
//!         .compensation(
//!             "refund",
//!             compensation_fn(|_amount: Option<u64>, _ctx: SagaContext| async move { Ok(()) }),
//!         ),
//! )?;
//!
//! let engine = SagaEngine::new(Arc::new(registry), EngineConfig::default());
//! let inputs = StepInputs::builder()
//!     .for_step("debit", 100u64)
//!     .for_step("credit", 100u64)
//!     .build()?;
//! let result = engine.execute("Transfer", inputs).await?;
//! assert!(result.is_completed());
//! # Ok(())
//! # }
//! ```

mod cancel;
mod compensation;
pub mod config;
pub mod context;
pub mod definition;
pub mod engine;
pub mod error;
pub mod events;
pub mod inputs;
pub mod registry;
pub mod result;
pub mod state;

pub use cancel::{CancelHandle, CancelSignal, cancellation};
pub use config::EngineConfig;
pub use context::{ContextKey, SagaContext};
pub use definition::{
    BoxFuture, CompensationHandler, Predicate, RetryPolicy, SagaBuilder, SagaDefinition,
    StepDefinition, StepHandler, compensation_fn, step_fn,
};
pub use engine::{CANCELLED_STEP, SagaEngine};
pub use error::{
    CompensationError, FailureKind, SagaError, StepError, StepExecutionError, ValidationError,
};
pub use events::{
    EventPublisher, InMemoryEventPublisher, PublishError, StepEvent, TracingEventPublisher,
};
pub use inputs::{ExpandEach, StepInput, StepInputs, StepInputsBuilder};
pub use registry::StepRegistry;
pub use result::{
    CompensationOutcome, CompensationRecord, SagaResult, SagaStatus, SkipReason, StepResult,
};
pub use state::StepState;
