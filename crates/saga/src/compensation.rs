//! Best-effort unwind of succeeded steps.

use tracing::Instrument;

use crate::config::EngineConfig;
use crate::context::SagaContext;
use crate::definition::SagaDefinition;
use crate::engine::run_with_retry;
use crate::error::{FailureKind, StepError};
use crate::result::{CompensationOutcome, CompensationRecord, StepResult};
use crate::state::StepState;

/// Compensates every succeeded invocation in `results`, newest first.
///
/// `results` must be in completion order. Dependents always complete after
/// their dependencies, so walking it backwards undoes a step only once
/// everything built on it has been undone. A failed compensation is
/// recorded and the sweep moves on.
///
/// A compensable invocation that failed by timing out may have taken
/// effect remotely without returning the output its compensation needs. It
/// is reported as a failed compensation so the execution ends
/// `CompensationIncomplete`.
pub(crate) async fn compensate(
    definition: &SagaDefinition,
    config: &EngineConfig,
    ctx: &SagaContext,
    results: &mut [StepResult],
) -> Vec<CompensationRecord> {
    let saga = definition.name();
    let mut records = Vec::new();

    for result in results.iter_mut().rev() {
        let Some(step) = definition.step(&result.step) else {
            continue;
        };
        let Some(compensation) = step.compensation_id() else {
            continue;
        };
        if timed_out(result) {
            records.push(unresolved(saga, compensation, result));
            continue;
        }
        if !result.state.can_compensate() {
            continue;
        }
        let Some(handler) = definition.compensation_handler(compensation).cloned() else {
            continue;
        };

        result.advance(StepState::Compensating);
        metrics::counter!(
            "saga_compensations_total",
            "saga" => saga.to_string(),
            "step" => result.step.clone()
        )
        .increment(1);

        let policy = step.retry_policy(config);
        let output = result.output.clone();
        let ctx = ctx.clone();
        let span = tracing::info_span!(
            "saga_compensation",
            saga,
            step = %result.step,
            index = result.index,
            compensation,
        );
        let (saga_name, step_name) = (saga.to_string(), result.step.clone());
        let task = tokio::spawn(
            async move {
                run_with_retry(&policy, true, &saga_name, &step_name, || {
                    handler(output.clone(), ctx.clone())
                })
                .await
            }
            .instrument(span),
        );
        let outcome = match task.await {
            Ok((_, outcome)) => outcome,
            Err(join_error) => Err(StepError::internal(format!(
                "compensation task aborted: {join_error}"
            ))),
        };

        let outcome = match outcome {
            Ok(()) => {
                tracing::info!(step = %result.label(), compensation, "step compensated");
                result.advance(StepState::Compensated);
                CompensationOutcome::Compensated
            }
            Err(error) => {
                metrics::counter!(
                    "saga_compensation_failures_total",
                    "saga" => saga.to_string(),
                    "step" => result.step.clone()
                )
                .increment(1);
                tracing::error!(
                    step = %result.label(),
                    compensation,
                    error = %error,
                    "compensation failed, continuing"
                );
                result.advance(StepState::CompensationFailed);
                CompensationOutcome::Failed(error)
            }
        };
        records.push(CompensationRecord {
            step: result.step.clone(),
            index: result.index,
            compensation: compensation.to_string(),
            outcome,
        });
    }

    records
}

fn timed_out(result: &StepResult) -> bool {
    result.state == StepState::Failed
        && result
            .error
            .as_ref()
            .is_some_and(|e| e.kind() == FailureKind::Timeout)
}

fn unresolved(saga: &str, compensation: &str, result: &StepResult) -> CompensationRecord {
    metrics::counter!(
        "saga_compensation_failures_total",
        "saga" => saga.to_string(),
        "step" => result.step.clone()
    )
    .increment(1);
    tracing::error!(
        step = %result.label(),
        compensation,
        "step timed out with unknown outcome, side effect cannot be compensated"
    );
    CompensationRecord {
        step: result.step.clone(),
        index: result.index,
        compensation: compensation.to_string(),
        outcome: CompensationOutcome::Failed(StepError::new(
            FailureKind::Timeout,
            format!("{} timed out; its outcome is unknown", result.label()),
        )),
    }
}
