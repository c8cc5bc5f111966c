//! Execution outcome types.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use common::ExecutionId;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{CompensationError, StepError, StepExecutionError};
use crate::state::StepState;

/// Why a step was recorded as skipped. Not an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SkipReason {
    /// The activation predicate was false.
    Condition,
    /// The step requires an input and none was bound.
    NoInput,
}

/// Outcome of one step invocation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepResult {
    pub step: String,
    /// Fan-out element index; `None` for non-expanded steps.
    pub index: Option<usize>,
    pub state: StepState,
    pub output: Option<Value>,
    pub error: Option<StepError>,
    pub skip_reason: Option<SkipReason>,
    pub attempts: u32,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl StepResult {
    fn pending(step: &str, index: Option<usize>) -> Self {
        Self {
            step: step.to_string(),
            index,
            state: StepState::Pending,
            output: None,
            error: None,
            skip_reason: None,
            attempts: 0,
            started_at: None,
            completed_at: None,
        }
    }

    pub(crate) fn skipped(step: &str, reason: SkipReason) -> Self {
        let mut result = Self::pending(step, None);
        result.advance(StepState::Skipped);
        result.skip_reason = Some(reason);
        result.completed_at = Some(Utc::now());
        result
    }

    /// An invocation whose body has returned, before its outcome is applied.
    pub(crate) fn running(
        step: &str,
        index: Option<usize>,
        started_at: DateTime<Utc>,
        attempts: u32,
    ) -> Self {
        let mut result = Self::pending(step, index);
        result.advance(StepState::Running);
        result.started_at = Some(started_at);
        result.attempts = attempts;
        result
    }

    /// Moves to `next` if the step state machine allows it. An illegal
    /// transition leaves the state unchanged and returns false.
    pub(crate) fn advance(&mut self, next: StepState) -> bool {
        if !self.state.can_transition_to(next) {
            tracing::error!(
                step = %self.label(),
                from = %self.state,
                to = %next,
                "illegal step state transition"
            );
            return false;
        }
        self.state = next;
        true
    }

    /// Returns the `step[index]` label used in logs.
    pub fn label(&self) -> String {
        match self.index {
            Some(i) => format!("{}[{i}]", self.step),
            None => self.step.clone(),
        }
    }
}

/// Result of one compensation call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", content = "error")]
pub enum CompensationOutcome {
    Compensated,
    Failed(StepError),
}

/// One entry of the compensation report, in the order compensations ran.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompensationRecord {
    pub step: String,
    pub index: Option<usize>,
    pub compensation: String,
    pub outcome: CompensationOutcome,
}

impl CompensationRecord {
    pub fn is_success(&self) -> bool {
        matches!(self.outcome, CompensationOutcome::Compensated)
    }

    /// Returns the failure as a [`CompensationError`], if any.
    pub fn error(&self) -> Option<CompensationError> {
        match &self.outcome {
            CompensationOutcome::Compensated => None,
            CompensationOutcome::Failed(source) => Some(CompensationError {
                step: self.step.clone(),
                index: self.index,
                compensation: self.compensation.clone(),
                source: source.clone(),
            }),
        }
    }
}

/// Overall status of an execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SagaStatus {
    /// Every step ran or was skipped.
    Completed,
    /// A step failed and every compensation succeeded.
    Failed,
    /// A step failed and at least one compensation also failed.
    CompensationIncomplete,
}

impl SagaStatus {
    pub fn is_failed(&self) -> bool {
        !matches!(self, SagaStatus::Completed)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SagaStatus::Completed => "Completed",
            SagaStatus::Failed => "Failed",
            SagaStatus::CompensationIncomplete => "CompensationIncomplete",
        }
    }
}

impl std::fmt::Display for SagaStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Aggregate outcome of one execution.
///
/// `steps` lists invocations in the order the engine observed their
/// completion; compensation ran over them in reverse.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SagaResult {
    pub execution_id: ExecutionId,
    pub saga: String,
    pub status: SagaStatus,
    pub steps: Vec<StepResult>,
    /// The failure that triggered compensation.
    pub failure: Option<StepExecutionError>,
    pub compensations: Vec<CompensationRecord>,
    /// Final context variables.
    pub context: HashMap<String, Value>,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

impl SagaResult {
    pub fn is_completed(&self) -> bool {
        self.status == SagaStatus::Completed
    }

    /// Results recorded for `step`, one per invocation.
    pub fn results_for<'a>(&'a self, step: &'a str) -> impl Iterator<Item = &'a StepResult> + 'a {
        self.steps.iter().filter(move |r| r.step == step)
    }

    /// The single result of a non-expanded step.
    pub fn step(&self, step: &str) -> Option<&StepResult> {
        self.steps
            .iter()
            .find(|r| r.step == step && r.index.is_none())
    }

    /// Compensations that failed.
    pub fn compensation_errors(&self) -> Vec<CompensationError> {
        self.compensations
            .iter()
            .filter_map(CompensationRecord::error)
            .collect()
    }

    /// `step[index]` labels in the order they were compensated.
    pub fn compensated(&self) -> Vec<String> {
        self.compensations
            .iter()
            .map(|c| match c.index {
                Some(i) => format!("{}[{i}]", c.step),
                None => c.step.clone(),
            })
            .collect()
    }
}
