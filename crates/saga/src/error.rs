//! Saga error types.
//!
//! Four kinds of failure are kept apart:
//! - [`ValidationError`]: a malformed saga definition, raised at registration.
//! - [`StepError`]: a step or compensation body's own failure.
//! - [`StepExecutionError`] / [`CompensationError`]: a [`StepError`] tied to
//!   the invocation that produced it, as reported in a `SagaResult`.
//! - [`SagaError`]: `execute` could not start at all.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors raised while registering a saga definition.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    /// Saga name is empty.
    #[error("Saga name must not be empty")]
    EmptySagaName,

    /// A saga with this name is already registered.
    #[error("Saga '{0}' is already registered")]
    DuplicateSaga(String),

    /// Two steps share the same id.
    #[error("Saga '{saga}' declares step '{step}' more than once")]
    DuplicateStep { saga: String, step: String },

    /// A step depends on a step id the saga does not declare.
    #[error("Step '{step}' of saga '{saga}' depends on unknown step '{dependency}'")]
    UnknownDependency {
        saga: String,
        step: String,
        dependency: String,
    },

    /// The dependency graph has a cycle through `step`.
    #[error("Saga '{saga}' has a dependency cycle through step '{step}'")]
    CyclicDependency { saga: String, step: String },

    /// A step names a compensation that has no registered body.
    #[error("Step '{step}' of saga '{saga}' names unknown compensation '{compensation}'")]
    UnknownCompensation {
        saga: String,
        step: String,
        compensation: String,
    },
}

/// Classification of a step failure, used by callers to decide how to
/// surface it (conflict, retry later, operator alert...).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FailureKind {
    /// The downstream service rejected the request as conflicting.
    Conflict,
    /// A referenced resource does not exist.
    NotFound,
    /// The input could not be used (bad shape, failed validation).
    InvalidInput,
    /// The downstream service could not be reached.
    Unavailable,
    /// The invocation exceeded its timeout.
    Timeout,
    /// The execution was cancelled by its caller.
    Cancelled,
    /// Anything else.
    Internal,
}

impl FailureKind {
    /// Returns true if a later attempt may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, FailureKind::Unavailable | FailureKind::Timeout)
    }

    /// Returns the kind name as a string.
    pub fn as_str(&self) -> &'static str {
        match self {
            FailureKind::Conflict => "Conflict",
            FailureKind::NotFound => "NotFound",
            FailureKind::InvalidInput => "InvalidInput",
            FailureKind::Unavailable => "Unavailable",
            FailureKind::Timeout => "Timeout",
            FailureKind::Cancelled => "Cancelled",
            FailureKind::Internal => "Internal",
        }
    }
}

impl std::fmt::Display for FailureKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Failure returned by a step body or a compensation body.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[error("{kind}: {message}")]
pub struct StepError {
    kind: FailureKind,
    message: String,
}

impl StepError {
    /// Creates a step error of the given kind.
    pub fn new(kind: FailureKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        Self::new(FailureKind::Conflict, message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(FailureKind::NotFound, message)
    }

    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::new(FailureKind::InvalidInput, message)
    }

    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::new(FailureKind::Unavailable, message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(FailureKind::Internal, message)
    }

    /// An attempt that ran longer than `limit`.
    pub fn timeout(limit: Duration) -> Self {
        Self::new(
            FailureKind::Timeout,
            format!("step timed out after {}ms", limit.as_millis()),
        )
    }

    /// The failure induced by cancelling an execution.
    pub fn cancelled() -> Self {
        Self::new(FailureKind::Cancelled, "saga execution cancelled by caller")
    }

    pub fn kind(&self) -> FailureKind {
        self.kind
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn is_retryable(&self) -> bool {
        self.kind.is_retryable()
    }
}

impl From<serde_json::Error> for StepError {
    fn from(e: serde_json::Error) -> Self {
        StepError::invalid_input(e.to_string())
    }
}

/// The terminal failure of one step invocation.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[error("Saga step '{step}'{} failed after {attempts} attempt(s): {source}", fmt_index(.index))]
pub struct StepExecutionError {
    /// The step that failed.
    pub step: String,
    /// Fan-out element index, if the step was expanded.
    pub index: Option<usize>,
    /// Number of attempts made.
    pub attempts: u32,
    /// The body's error.
    #[source]
    pub source: StepError,
}

impl StepExecutionError {
    pub fn kind(&self) -> FailureKind {
        self.source.kind()
    }
}

/// A compensation body that failed; recorded, never thrown.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[error("Compensation '{compensation}' for step '{step}'{} failed: {source}", fmt_index(.index))]
pub struct CompensationError {
    /// The step being compensated.
    pub step: String,
    /// Fan-out element index, if the step was expanded.
    pub index: Option<usize>,
    /// The compensation id that was invoked.
    pub compensation: String,
    /// The compensation body's error.
    #[source]
    pub source: StepError,
}

/// Errors that prevent a saga execution from starting.
#[derive(Debug, Error)]
pub enum SagaError {
    /// No saga is registered under this name.
    #[error("Unknown saga: {0}")]
    UnknownSaga(String),

    /// Inputs were bound to a step the saga does not declare.
    #[error("Saga '{saga}' has no step '{step}'")]
    UnknownStep { saga: String, step: String },

    /// An input value could not be converted for transport to its step.
    #[error("Input for step '{step}' could not be serialized: {source}")]
    InputSerialization {
        step: String,
        #[source]
        source: serde_json::Error,
    },

    /// The task driving the execution panicked or was aborted by the runtime.
    #[error("Execution of saga '{saga}' aborted: {reason}")]
    Aborted { saga: String, reason: String },

    /// Registration error surfaced through an engine entry point.
    #[error(transparent)]
    Validation(#[from] ValidationError),
}

/// Convenience type alias for saga results.
pub type Result<T> = std::result::Result<T, SagaError>;

fn fmt_index(index: &Option<usize>) -> String {
    index.map(|i| format!("[{i}]")).unwrap_or_default()
}
