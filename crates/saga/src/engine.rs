//! Dependency-graph scheduler.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, Utc};
use common::ExecutionId;
use futures_util::StreamExt;
use futures_util::stream::FuturesUnordered;
use serde_json::Value;
use tracing::Instrument;

use crate::cancel::CancelSignal;
use crate::compensation;
use crate::config::EngineConfig;
use crate::context::SagaContext;
use crate::definition::{BoxFuture, RetryPolicy, SagaDefinition};
use crate::error::{FailureKind, Result, SagaError, StepError, StepExecutionError};
use crate::events::{EventPublisher, StepEvent, TracingEventPublisher};
use crate::inputs::{StepInput, StepInputs};
use crate::registry::StepRegistry;
use crate::result::{SagaResult, SagaStatus, SkipReason, StepResult};
use crate::state::StepState;

/// Step id reported when an execution is cancelled by its caller.
pub const CANCELLED_STEP: &str = "<cancelled>";

/// Executes registered sagas.
///
/// The engine holds no per-execution state; one instance can run any
/// number of executions concurrently, each with its own [`SagaContext`].
#[derive(Clone)]
pub struct SagaEngine {
    registry: Arc<StepRegistry>,
    config: EngineConfig,
    publisher: Arc<dyn EventPublisher>,
}

impl SagaEngine {
    pub fn new(registry: Arc<StepRegistry>, config: EngineConfig) -> Self {
        Self {
            registry,
            config,
            publisher: Arc::new(TracingEventPublisher),
        }
    }

    /// Replaces the default log-only event publisher.
    pub fn with_publisher(mut self, publisher: Arc<dyn EventPublisher>) -> Self {
        self.publisher = publisher;
        self
    }

    pub fn registry(&self) -> &StepRegistry {
        &self.registry
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Runs `saga_name` to completion with a fresh context.
    ///
    /// Returns `Err` only if the execution could not start; step failures
    /// are reported through the returned [`SagaResult`].
    pub async fn execute(&self, saga_name: &str, inputs: StepInputs) -> Result<SagaResult> {
        self.execute_with_cancel(saga_name, inputs, CancelSignal::never())
            .await
    }

    /// Like [`execute`](Self::execute), treating a triggered `cancel` as a
    /// step failure: nothing new is launched, in-flight invocations finish,
    /// then compensation runs.
    #[tracing::instrument(skip(self, inputs, cancel), fields(execution_id = tracing::field::Empty))]
    pub async fn execute_with_cancel(
        &self,
        saga_name: &str,
        inputs: StepInputs,
        cancel: CancelSignal,
    ) -> Result<SagaResult> {
        let definition = self
            .registry
            .get(saga_name)
            .ok_or_else(|| SagaError::UnknownSaga(saga_name.to_string()))?;
        if let Some(step) = inputs.steps().find(|s| !definition.contains_step(s)) {
            return Err(SagaError::UnknownStep {
                saga: saga_name.to_string(),
                step: step.to_string(),
            });
        }

        let execution_id = ExecutionId::new();
        tracing::Span::current().record("execution_id", tracing::field::display(execution_id));
        metrics::counter!("saga_executions_total", "saga" => saga_name.to_string()).increment(1);
        tracing::info!(steps = definition.len(), "saga started");

        let execution = Execution::new(
            definition,
            inputs,
            execution_id,
            self.config,
            Arc::clone(&self.publisher),
        );
        // Dropping the caller must not drop the execution or its compensation.
        let task = tokio::spawn(execution.run(cancel).in_current_span());
        task.await.map_err(|e| SagaError::Aborted {
            saga: saga_name.to_string(),
            reason: e.to_string(),
        })
    }
}

impl std::fmt::Debug for SagaEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SagaEngine")
            .field("sagas", &self.registry.len())
            .field("config", &self.config)
            .finish()
    }
}

/// Outcome of one spawned invocation, as seen by the scheduler.
struct Completion {
    step: String,
    index: Option<usize>,
    started_at: DateTime<Utc>,
    attempts: u32,
    outcome: std::result::Result<Option<Value>, StepError>,
}

/// Fan-out elements of one step not yet launched.
struct Siblings {
    queued: VecDeque<(usize, Value)>,
    in_flight: usize,
    limit: usize,
}

type Running = FuturesUnordered<BoxFuture<Completion>>;

/// State of one execution.
struct Execution {
    definition: Arc<SagaDefinition>,
    inputs: StepInputs,
    ctx: SagaContext,
    execution_id: ExecutionId,
    config: EngineConfig,
    publisher: Arc<dyn EventPublisher>,
    started_at: DateTime<Utc>,
    /// Unfinished dependencies per step.
    waiting_on: HashMap<String, usize>,
    /// Outstanding invocations per launched step.
    outstanding: HashMap<String, usize>,
    siblings: HashMap<String, Siblings>,
    ready: VecDeque<String>,
    /// Results in the order the scheduler observed them.
    results: Vec<StepResult>,
    failure: Option<StepExecutionError>,
}

impl Execution {
    fn new(
        definition: Arc<SagaDefinition>,
        inputs: StepInputs,
        execution_id: ExecutionId,
        config: EngineConfig,
        publisher: Arc<dyn EventPublisher>,
    ) -> Self {
        let waiting_on = definition.dependency_counts();
        let ready = definition
            .topological_order()
            .iter()
            .filter(|id| waiting_on.get(id.as_str()) == Some(&0))
            .cloned()
            .collect();
        Self {
            definition,
            inputs,
            ctx: SagaContext::new(),
            execution_id,
            config,
            publisher,
            started_at: Utc::now(),
            waiting_on,
            outstanding: HashMap::new(),
            siblings: HashMap::new(),
            ready,
            results: Vec::new(),
            failure: None,
        }
    }

    async fn run(mut self, mut cancel: CancelSignal) -> SagaResult {
        let clock = Instant::now();
        let mut running: Running = FuturesUnordered::new();

        loop {
            if self.failure.is_none() && cancel.is_cancelled() {
                self.cancelled();
            }
            while self.failure.is_none() {
                let Some(step) = self.ready.pop_front() else {
                    break;
                };
                self.start_step(&step, &mut running);
            }
            if running.is_empty() {
                break;
            }

            tokio::select! {
                biased;
                _ = cancel.cancelled(), if self.failure.is_none() => {
                    self.cancelled();
                }
                Some(completion) = running.next() => {
                    self.on_completion(completion, &mut running).await;
                }
                else => break,
            }
        }

        self.finish(clock).await
    }

    fn cancelled(&mut self) {
        tracing::warn!(
            outstanding = self.outstanding.values().sum::<usize>(),
            "saga cancelled"
        );
        self.failure = Some(StepExecutionError {
            step: CANCELLED_STEP.to_string(),
            index: None,
            attempts: 0,
            source: StepError::cancelled(),
        });
    }

    /// Decides whether a ready step runs, is skipped, or fans out.
    fn start_step(&mut self, step: &str, running: &mut Running) {
        let saga = Arc::clone(&self.definition);
        let Some(definition) = saga.step(step) else {
            return;
        };

        if !definition.is_active(&self.ctx) {
            tracing::debug!(step, "step skipped: activation predicate is false");
            self.skip(step, SkipReason::Condition);
            return;
        }

        let input = self.inputs.get(step).cloned();
        match input {
            None if definition.input_required() => {
                tracing::debug!(step, "step skipped: no input bound");
                self.skip(step, SkipReason::NoInput);
            }
            None => self.launch(step, None, Value::Null, running),
            Some(StepInput::Single(value)) => self.launch(step, None, value, running),
            Some(StepInput::Each(values)) if values.is_empty() => {
                tracing::debug!(step, "fan-out over empty list");
                self.step_finished(step);
            }
            Some(StepInput::Each(values)) => {
                let limit = definition.parallelism().unwrap_or(usize::MAX);
                let mut siblings = Siblings {
                    queued: values.into_iter().enumerate().collect(),
                    in_flight: 0,
                    limit,
                };
                self.outstanding
                    .insert(step.to_string(), siblings.queued.len());
                while siblings.in_flight < siblings.limit {
                    let Some((index, value)) = siblings.queued.pop_front() else {
                        break;
                    };
                    siblings.in_flight += 1;
                    self.spawn(step, Some(index), value, running);
                }
                self.siblings.insert(step.to_string(), siblings);
            }
        }
    }

    fn skip(&mut self, step: &str, reason: SkipReason) {
        self.results.push(StepResult::skipped(step, reason));
        self.step_finished(step);
    }

    fn launch(&mut self, step: &str, index: Option<usize>, input: Value, running: &mut Running) {
        self.outstanding.insert(step.to_string(), 1);
        self.spawn(step, index, input, running);
    }

    /// Spawns one invocation onto the runtime.
    fn spawn(&self, step: &str, index: Option<usize>, input: Value, running: &mut Running) {
        let (Some(definition), Some(handler)) =
            (self.definition.step(step), self.definition.handler(step).cloned())
        else {
            return;
        };
        let policy = definition.retry_policy(&self.config);
        // A timed-out attempt of a compensable step may still land remotely
        // without an output to undo it with, so it is not repeated.
        let retry_timeouts = definition.compensation_id().is_none();
        let span = tracing::info_span!(
            "saga_step",
            saga = %self.definition.name(),
            step,
            index,
            execution_id = %self.execution_id,
        );
        let ctx = self.ctx.clone();
        let saga = self.definition.name().to_string();
        let step_name = step.to_string();
        let started_at = Utc::now();

        let handle = tokio::spawn(
            async move {
                tracing::debug!("step started");
                run_with_retry(&policy, retry_timeouts, &saga, &step_name, || {
                    handler(input.clone(), ctx.clone())
                })
                .await
            }
            .instrument(span),
        );

        let step = step.to_string();
        running.push(Box::pin(async move {
            let (attempts, outcome) = handle.await.unwrap_or_else(|join_error| {
                (1, Err(StepError::internal(format!("step task aborted: {join_error}"))))
            });
            Completion {
                step,
                index,
                started_at,
                attempts,
                outcome,
            }
        }));
    }

    async fn on_completion(&mut self, completion: Completion, running: &mut Running) {
        let Completion {
            step,
            index,
            started_at,
            attempts,
            outcome,
        } = completion;

        let mut result = StepResult::running(&step, index, started_at, attempts);
        match outcome {
            Ok(output) => {
                self.record_success(&step, index, output.as_ref()).await;
                result.output = output;
                result.advance(StepState::Succeeded);
            }
            Err(error) => {
                metrics::counter!(
                    "saga_step_failures_total",
                    "saga" => self.definition.name().to_string(),
                    "step" => step.clone()
                )
                .increment(1);
                tracing::warn!(step = %step, index = ?index, attempts, error = %error, "saga step failed");
                if self.failure.is_none() {
                    self.failure = Some(StepExecutionError {
                        step: step.clone(),
                        index,
                        attempts,
                        source: error.clone(),
                    });
                }
                result.error = Some(error);
                result.advance(StepState::Failed);
            }
        }
        result.completed_at = Some(Utc::now());
        self.results.push(result);

        let failed = self.failure.is_some();
        let next = self.siblings.get_mut(&step).and_then(|siblings| {
            siblings.in_flight -= 1;
            let next = if failed { None } else { siblings.queued.pop_front() };
            if next.is_some() {
                siblings.in_flight += 1;
            }
            next
        });
        if let Some((index, value)) = next {
            self.spawn(&step, Some(index), value, running);
        }

        let remaining = self.outstanding.entry(step.clone()).or_insert(1);
        *remaining = remaining.saturating_sub(1);
        let remaining = *remaining;
        if remaining == 0 && !failed {
            self.step_finished(&step);
        }
    }

    async fn record_success(&self, step: &str, index: Option<usize>, output: Option<&Value>) {
        tracing::info!(step, index = ?index, "saga step succeeded");
        match (index, output) {
            (None, Some(value)) => self.ctx.record_output(step, None, value.clone()),
            (None, None) => {}
            (Some(i), value) => {
                self.ctx
                    .record_output(step, Some(i), value.cloned().unwrap_or(Value::Null))
            }
        }

        let Some(event_type) = self.definition.step(step).and_then(|d| d.event_type()) else {
            return;
        };
        let event = StepEvent {
            event_type: event_type.to_string(),
            saga: self.definition.name().to_string(),
            step: step.to_string(),
            index,
            execution_id: self.execution_id,
            payload: output.cloned().unwrap_or(Value::Null),
            occurred_at: Utc::now(),
        };
        if let Err(e) = self.publisher.publish(event).await {
            tracing::warn!(step, error = %e, "failed to publish step event");
        }
    }

    /// Marks `step` done for dependency purposes and readies dependents.
    fn step_finished(&mut self, step: &str) {
        for dependent in self.definition.dependents(step) {
            if let Some(count) = self.waiting_on.get_mut(dependent) {
                *count = count.saturating_sub(1);
                if *count == 0 {
                    self.ready.push_back(dependent.clone());
                }
            }
        }
    }

    async fn finish(mut self, clock: Instant) -> SagaResult {
        let saga = self.definition.name().to_string();
        let (status, compensations) = match &self.failure {
            None => {
                metrics::counter!("saga_completed", "saga" => saga.clone()).increment(1);
                tracing::info!(steps = self.results.len(), "saga completed successfully");
                (SagaStatus::Completed, Vec::new())
            }
            Some(failure) => {
                tracing::warn!(reason = %failure, "saga failed, compensating");
                let records = compensation::compensate(
                    &self.definition,
                    &self.config,
                    &self.ctx,
                    &mut self.results,
                )
                .await;
                if records.iter().all(|r| r.is_success()) {
                    metrics::counter!("saga_failed", "saga" => saga.clone()).increment(1);
                    (SagaStatus::Failed, records)
                } else {
                    metrics::counter!("saga_compensation_incomplete", "saga" => saga.clone())
                        .increment(1);
                    tracing::error!(
                        failed = records.iter().filter(|r| !r.is_success()).count(),
                        "saga compensation incomplete"
                    );
                    (SagaStatus::CompensationIncomplete, records)
                }
            }
        };

        let duration = clock.elapsed().as_secs_f64();
        metrics::histogram!("saga_duration_seconds", "saga" => saga.clone()).record(duration);

        SagaResult {
            execution_id: self.execution_id,
            saga,
            status,
            steps: self.results,
            failure: self.failure,
            compensations,
            context: self.ctx.snapshot(),
            started_at: self.started_at,
            finished_at: Utc::now(),
        }
    }
}

/// Runs `call` under `policy`: each attempt is bounded by the timeout and
/// retryable failures are retried after the backoff. Timeouts are retried
/// only when `retry_timeouts` is set.
///
/// Returns the number of attempts made and the last outcome.
pub(crate) async fn run_with_retry<T, F>(
    policy: &RetryPolicy,
    retry_timeouts: bool,
    saga: &str,
    step: &str,
    mut call: F,
) -> (u32, std::result::Result<T, StepError>)
where
    F: FnMut() -> BoxFuture<std::result::Result<T, StepError>>,
{
    let mut attempt = 0;
    loop {
        attempt += 1;
        let outcome = match policy.timeout {
            Some(limit) => tokio::time::timeout(limit, call())
                .await
                .unwrap_or_else(|_| Err(StepError::timeout(limit))),
            None => call().await,
        };
        match outcome {
            Err(e)
                if e.is_retryable()
                    && (retry_timeouts || e.kind() != FailureKind::Timeout)
                    && attempt < policy.max_attempts() =>
            {
                metrics::counter!(
                    "saga_step_retries_total",
                    "saga" => saga.to_string(),
                    "step" => step.to_string()
                )
                .increment(1);
                tracing::warn!(attempt, error = %e, backoff_ms = policy.backoff.as_millis() as u64, "attempt failed, retrying");
                tokio::time::sleep(policy.backoff).await;
            }
            other => return (attempt, other),
        }
    }
}
