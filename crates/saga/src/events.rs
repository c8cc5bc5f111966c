//! Step events published after successful steps.

use std::sync::{Arc, PoisonError, RwLock};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use common::ExecutionId;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

/// Announces that a step with a declared event type succeeded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepEvent {
    /// The declared event type, e.g. `party.registered`.
    pub event_type: String,
    pub saga: String,
    pub step: String,
    /// Fan-out element index, if the step was expanded.
    pub index: Option<usize>,
    pub execution_id: ExecutionId,
    /// The step's output, `null` if it produced none.
    pub payload: Value,
    pub occurred_at: DateTime<Utc>,
}

/// Failure to hand an event to its destination.
#[derive(Debug, Clone, Error)]
#[error("Failed to publish event '{event_type}': {reason}")]
pub struct PublishError {
    pub event_type: String,
    pub reason: String,
}

/// Destination for step events.
///
/// Publishing is fire-and-forget from the saga's point of view: the
/// engine logs a failed publish and carries on.
#[async_trait]
pub trait EventPublisher: Send + Sync {
    async fn publish(&self, event: StepEvent) -> Result<(), PublishError>;
}

/// Publisher that writes events to the log.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingEventPublisher;

#[async_trait]
impl EventPublisher for TracingEventPublisher {
    async fn publish(&self, event: StepEvent) -> Result<(), PublishError> {
        tracing::info!(
            event_type = %event.event_type,
            saga = %event.saga,
            step = %event.step,
            index = ?event.index,
            execution_id = %event.execution_id,
            "step event"
        );
        Ok(())
    }
}

#[derive(Debug, Default)]
struct InMemoryPublisherState {
    events: Vec<StepEvent>,
    fail: bool,
}

/// Publisher that keeps events in memory, for testing.
#[derive(Debug, Clone, Default)]
pub struct InMemoryEventPublisher {
    state: Arc<RwLock<InMemoryPublisherState>>,
}

impl InMemoryEventPublisher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Configures every subsequent publish to fail.
    pub fn set_fail_on_publish(&self, fail: bool) {
        self.state
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .fail = fail;
    }

    /// Returns a copy of all published events, in publish order.
    pub fn events(&self) -> Vec<StepEvent> {
        self.state
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .events
            .clone()
    }

    /// Returns the published event types, in publish order.
    pub fn event_types(&self) -> Vec<String> {
        self.events().into_iter().map(|e| e.event_type).collect()
    }
}

#[async_trait]
impl EventPublisher for InMemoryEventPublisher {
    async fn publish(&self, event: StepEvent) -> Result<(), PublishError> {
        let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
        if state.fail {
            return Err(PublishError {
                event_type: event.event_type,
                reason: "publisher configured to fail".to_string(),
            });
        }
        state.events.push(event);
        Ok(())
    }
}
