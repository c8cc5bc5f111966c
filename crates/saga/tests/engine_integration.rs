//! Integration tests for the saga engine.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use saga::{
    CANCELLED_STEP, CompensationHandler, ContextKey, EngineConfig, ExpandEach, FailureKind,
    InMemoryEventPublisher, SagaContext, SagaDefinition, SagaEngine, SagaError, SagaStatus,
    SkipReason, StepDefinition, StepError, StepHandler, StepInputs, StepRegistry, StepState,
    cancellation, compensation_fn, step_fn,
};
use serde_json::Value;

const KIND: ContextKey<String> = ContextKey::new("kind");
const SEEN: ContextKey<bool> = ContextKey::new("seen");

/// Ordered record of step runs and compensations.
#[derive(Clone, Default)]
struct Journal(Arc<Mutex<Vec<String>>>);

impl Journal {
    fn push(&self, entry: impl Into<String>) {
        self.0.lock().unwrap().push(entry.into());
    }

    fn entries(&self) -> Vec<String> {
        self.0.lock().unwrap().clone()
    }

    fn ran(&self, step: &str) -> bool {
        self.entries().contains(&format!("run:{step}"))
    }

    fn undone(&self) -> Vec<String> {
        self.entries()
            .into_iter()
            .filter_map(|e| e.strip_prefix("undo:").map(str::to_string))
            .collect()
    }
}

fn ok_step(journal: &Journal, name: &'static str) -> StepHandler {
    let journal = journal.clone();
    step_fn(move |(): (), _ctx: SagaContext| {
        let journal = journal.clone();
        async move {
            journal.push(format!("run:{name}"));
            Ok(Some(name.to_string()))
        }
    })
}

fn slow_step(journal: &Journal, name: &'static str, delay: Duration) -> StepHandler {
    let journal = journal.clone();
    step_fn(move |(): (), _ctx: SagaContext| {
        let journal = journal.clone();
        async move {
            tokio::time::sleep(delay).await;
            journal.push(format!("run:{name}"));
            Ok(Some(name.to_string()))
        }
    })
}

fn failing_step(journal: &Journal, name: &'static str, delay: Duration) -> StepHandler {
    let journal = journal.clone();
    step_fn(move |(): (), _ctx: SagaContext| {
        let journal = journal.clone();
        async move {
            tokio::time::sleep(delay).await;
            journal.push(format!("run:{name}"));
            Err::<Option<()>, _>(StepError::conflict(format!("{name} rejected")))
        }
    })
}

/// Fan-out step over integers that fails on `fail_on`; later elements are
/// delayed by `stagger * index` so completion order follows list order.
fn item_step(journal: &Journal, name: &'static str, fail_on: i64, stagger: Duration) -> StepHandler {
    let journal = journal.clone();
    step_fn(move |item: i64, _ctx: SagaContext| {
        let journal = journal.clone();
        async move {
            tokio::time::sleep(stagger * item as u32).await;
            journal.push(format!("run:{name}:{item}"));
            if item == fail_on {
                return Err(StepError::unavailable(format!("{name} {item} failed")));
            }
            Ok(Some(item))
        }
    })
}

fn undo(journal: &Journal, name: &'static str) -> CompensationHandler {
    let journal = journal.clone();
    compensation_fn(move |_output: Option<Value>, _ctx: SagaContext| {
        let journal = journal.clone();
        async move {
            journal.push(format!("undo:{name}"));
            Ok(())
        }
    })
}

fn undo_item(journal: &Journal, name: &'static str) -> CompensationHandler {
    let journal = journal.clone();
    compensation_fn(move |item: Option<i64>, _ctx: SagaContext| {
        let journal = journal.clone();
        async move {
            journal.push(format!("undo:{name}:{}", item.unwrap_or(-1)));
            Ok(())
        }
    })
}

fn engine_with(saga: saga::SagaBuilder) -> SagaEngine {
    let mut registry = StepRegistry::new();
    registry.register(saga).unwrap();
    SagaEngine::new(Arc::new(registry), EngineConfig::default())
}

#[tokio::test]
async fn test_all_steps_succeed_without_compensation() {
    let journal = Journal::default();
    let barrier = Arc::new(tokio::sync::Barrier::new(2));
    // B and C each wait for the other, so they only finish if they overlap.
    let rendezvous = |name: &'static str| {
        let barrier = Arc::clone(&barrier);
        let journal = journal.clone();
        step_fn(move |(): (), _ctx: SagaContext| {
            let barrier = Arc::clone(&barrier);
            let journal = journal.clone();
            async move {
                tokio::time::timeout(Duration::from_secs(2), barrier.wait())
                    .await
                    .map_err(|_| StepError::internal("sibling never started"))?;
                journal.push(format!("run:{name}"));
                Ok(None::<()>)
            }
        })
    };

    let engine = engine_with(
        SagaDefinition::builder("Concurrent")
            .step(StepDefinition::new("a").compensate("undoA"), ok_step(&journal, "a"))
            .step(StepDefinition::new("b").depends_on(["a"]), rendezvous("b"))
            .step(StepDefinition::new("c").depends_on(["a"]), rendezvous("c"))
            .compensation("undoA", undo(&journal, "a")),
    );

    let result = engine
        .execute("Concurrent", StepInputs::empty())
        .await
        .unwrap();

    assert_eq!(result.status, SagaStatus::Completed);
    assert!(result.failure.is_none());
    assert!(result.compensations.is_empty());
    assert!(journal.undone().is_empty());
    assert_eq!(result.steps.len(), 3);
    assert_eq!(result.steps[0].step, "a");
    assert!(result.steps.iter().all(|s| s.state == StepState::Succeeded));
}

#[tokio::test]
async fn test_sibling_failure_compensates_finished_sibling_and_root() {
    let journal = Journal::default();
    let engine = engine_with(
        SagaDefinition::builder("Diamond")
            .step(StepDefinition::new("a").compensate("undoA"), ok_step(&journal, "a"))
            .step(
                StepDefinition::new("b").depends_on(["a"]).compensate("undoB"),
                failing_step(&journal, "b", Duration::from_millis(50)),
            )
            .step(
                StepDefinition::new("c").depends_on(["a"]).compensate("undoC"),
                ok_step(&journal, "c"),
            )
            .compensation("undoA", undo(&journal, "a"))
            .compensation("undoB", undo(&journal, "b"))
            .compensation("undoC", undo(&journal, "c")),
    );

    let result = engine.execute("Diamond", StepInputs::empty()).await.unwrap();

    assert_eq!(result.status, SagaStatus::Failed);
    let failure = result.failure.as_ref().unwrap();
    assert_eq!(failure.step, "b");
    assert_eq!(failure.kind(), FailureKind::Conflict);
    assert_eq!(journal.undone(), vec!["c", "a"]);
    assert_eq!(result.compensated(), vec!["c", "a"]);
    assert_eq!(result.step("b").unwrap().state, StepState::Failed);
    assert_eq!(result.step("c").unwrap().state, StepState::Compensated);
    assert_eq!(result.step("a").unwrap().state, StepState::Compensated);
}

#[tokio::test]
async fn test_steps_after_failure_are_never_invoked() {
    let journal = Journal::default();
    let engine = engine_with(
        SagaDefinition::builder("Chain")
            .step(StepDefinition::new("a").compensate("undoA"), ok_step(&journal, "a"))
            .step(
                StepDefinition::new("b").depends_on(["a"]).compensate("undoB"),
                failing_step(&journal, "b", Duration::ZERO),
            )
            .step(
                StepDefinition::new("c").depends_on(["b"]).compensate("undoC"),
                ok_step(&journal, "c"),
            )
            .compensation("undoA", undo(&journal, "a"))
            .compensation("undoB", undo(&journal, "b"))
            .compensation("undoC", undo(&journal, "c")),
    );

    let result = engine.execute("Chain", StepInputs::empty()).await.unwrap();

    assert_eq!(result.status, SagaStatus::Failed);
    assert!(!journal.ran("c"));
    assert!(result.step("c").is_none());
    assert_eq!(journal.undone(), vec!["a"]);
}

#[tokio::test]
async fn test_skipped_step_unblocks_dependents_and_is_not_compensated() {
    let journal = Journal::default();
    let writer = {
        let journal = journal.clone();
        step_fn(move |(): (), ctx: SagaContext| {
            let journal = journal.clone();
            async move {
                ctx.put(&KIND, "ORGANIZATION".to_string())?;
                journal.push("run:a");
                Ok(Some(1))
            }
        })
    };
    let engine = engine_with(
        SagaDefinition::builder("Conditional")
            .step(StepDefinition::new("a").compensate("undoA"), writer)
            .step(
                StepDefinition::new("person")
                    .depends_on(["a"])
                    .compensate("undoPerson")
                    .when(|ctx| ctx.matches(&KIND, "INDIVIDUAL".to_string())),
                ok_step(&journal, "person"),
            )
            .step(
                StepDefinition::new("entity")
                    .depends_on(["a"])
                    .compensate("undoEntity")
                    .when(|ctx| ctx.matches(&KIND, "ORGANIZATION".to_string())),
                ok_step(&journal, "entity"),
            )
            .step(
                StepDefinition::new("last").depends_on(["person", "entity"]),
                failing_step(&journal, "last", Duration::ZERO),
            )
            .compensation("undoA", undo(&journal, "a"))
            .compensation("undoPerson", undo(&journal, "person"))
            .compensation("undoEntity", undo(&journal, "entity")),
    );

    let result = engine
        .execute("Conditional", StepInputs::empty())
        .await
        .unwrap();

    assert!(!journal.ran("person"));
    assert!(journal.ran("entity"));
    assert!(journal.ran("last"));
    let person = result.step("person").unwrap();
    assert_eq!(person.state, StepState::Skipped);
    assert_eq!(person.skip_reason, Some(SkipReason::Condition));
    assert_eq!(journal.undone(), vec!["entity", "a"]);
    assert_eq!(result.status, SagaStatus::Failed);
}

#[tokio::test]
async fn test_sequential_fan_out_failure_compensates_only_earlier_elements() {
    let journal = Journal::default();
    let engine = engine_with(
        SagaDefinition::builder("FanOut")
            .step(
                StepDefinition::new("items")
                    .compensate("undoItem")
                    .max_parallel(1),
                item_step(&journal, "items", 1, Duration::ZERO),
            )
            .compensation("undoItem", undo_item(&journal, "items")),
    );
    let inputs = StepInputs::builder()
        .for_step_expanded("items", ExpandEach::of([0i64, 1, 2]))
        .build()
        .unwrap();

    let result = engine.execute("FanOut", inputs).await.unwrap();

    assert_eq!(result.status, SagaStatus::Failed);
    assert_eq!(result.failure.as_ref().unwrap().index, Some(1));
    assert!(!journal.ran("items:2"));
    assert_eq!(journal.undone(), vec!["items:0"]);
    assert_eq!(result.compensated(), vec!["items[0]"]);
}

#[tokio::test]
async fn test_concurrent_fan_out_compensates_every_succeeded_sibling() {
    let journal = Journal::default();
    let engine = engine_with(
        SagaDefinition::builder("WideFanOut")
            .step(
                StepDefinition::new("items").compensate("undoItem"),
                item_step(&journal, "items", 2, Duration::from_millis(20)),
            )
            .compensation("undoItem", undo_item(&journal, "items")),
    );
    let inputs = StepInputs::builder()
        .for_step_expanded("items", ExpandEach::of([0i64, 1, 2]))
        .build()
        .unwrap();

    let result = engine.execute("WideFanOut", inputs).await.unwrap();

    assert_eq!(result.status, SagaStatus::Failed);
    assert_eq!(journal.undone(), vec!["items:1", "items:0"]);
    let failed: Vec<_> = result
        .results_for("items")
        .filter(|r| r.state == StepState::Failed)
        .map(|r| r.index)
        .collect();
    assert_eq!(failed, vec![Some(2)]);
}

#[tokio::test]
async fn test_fan_out_dependents_wait_for_every_sibling() {
    let journal = Journal::default();
    let engine = engine_with(
        SagaDefinition::builder("Gather")
            .step(
                StepDefinition::new("items"),
                item_step(&journal, "items", -1, Duration::from_millis(5)),
            )
            .step(
                StepDefinition::new("after").depends_on(["items"]),
                ok_step(&journal, "after"),
            ),
    );
    let inputs = StepInputs::builder()
        .for_step_expanded("items", ExpandEach::of([0i64, 1, 2, 3]))
        .build()
        .unwrap();

    let result = engine.execute("Gather", inputs).await.unwrap();

    assert!(result.is_completed());
    assert_eq!(result.results_for("items").count(), 4);
    assert_eq!(journal.entries().last().map(String::as_str), Some("run:after"));
}

#[tokio::test]
async fn test_empty_fan_out_unblocks_dependents() {
    let journal = Journal::default();
    let engine = engine_with(
        SagaDefinition::builder("Empty")
            .step(
                StepDefinition::new("items"),
                item_step(&journal, "items", -1, Duration::ZERO),
            )
            .step(
                StepDefinition::new("after").depends_on(["items"]),
                ok_step(&journal, "after"),
            ),
    );
    let inputs = StepInputs::builder()
        .for_step_expanded("items", ExpandEach::<i64>::of([]))
        .build()
        .unwrap();

    let result = engine.execute("Empty", inputs).await.unwrap();

    assert!(result.is_completed());
    assert_eq!(result.results_for("items").count(), 0);
    assert!(journal.ran("after"));
}

#[tokio::test]
async fn test_step_requiring_input_is_skipped_when_unbound() {
    let journal = Journal::default();
    let engine = engine_with(
        SagaDefinition::builder("Optional")
            .step(
                StepDefinition::new("pep").requires_input(),
                ok_step(&journal, "pep"),
            )
            .step(
                StepDefinition::new("after").depends_on(["pep"]),
                ok_step(&journal, "after"),
            ),
    );

    let result = engine
        .execute("Optional", StepInputs::empty())
        .await
        .unwrap();

    assert!(result.is_completed());
    assert!(!journal.ran("pep"));
    assert_eq!(result.step("pep").unwrap().skip_reason, Some(SkipReason::NoInput));
    assert!(journal.ran("after"));
}

#[tokio::test]
async fn test_each_execution_gets_a_fresh_context() {
    let guard = step_fn(|(): (), ctx: SagaContext| async move {
        if ctx.contains(&SEEN) {
            return Err(StepError::internal("context leaked between executions"));
        }
        ctx.put(&SEEN, true)?;
        Ok(None::<()>)
    });
    let fail = step_fn(|(): (), _ctx: SagaContext| async move {
        Err::<Option<()>, _>(StepError::conflict("always"))
    });
    let engine = engine_with(
        SagaDefinition::builder("Fresh")
            .step(StepDefinition::new("guard").compensate("noop"), guard)
            .step(StepDefinition::new("fail").depends_on(["guard"]), fail)
            .compensation(
                "noop",
                compensation_fn(|_: Option<Value>, _ctx: SagaContext| async move { Ok(()) }),
            ),
    );

    let first = engine.execute("Fresh", StepInputs::empty()).await.unwrap();
    let second = engine.execute("Fresh", StepInputs::empty()).await.unwrap();

    for result in [&first, &second] {
        assert_eq!(result.status, SagaStatus::Failed);
        assert_eq!(result.failure.as_ref().unwrap().step, "fail");
        assert_eq!(result.compensated(), vec!["guard"]);
    }
    assert_ne!(first.execution_id, second.execution_id);
}

#[tokio::test]
async fn test_later_steps_read_earlier_outputs() {
    let produce = step_fn(|(): (), _ctx: SagaContext| async move { Ok(Some(41i64)) });
    let consume = step_fn(|(): (), ctx: SagaContext| async move {
        let previous: i64 = ctx
            .step_output("produce")
            .ok_or_else(|| StepError::internal("missing output"))?;
        Ok(Some(previous + 1))
    });
    let engine = engine_with(
        SagaDefinition::builder("Outputs")
            .step(StepDefinition::new("produce"), produce)
            .step(StepDefinition::new("consume").depends_on(["produce"]), consume),
    );

    let result = engine.execute("Outputs", StepInputs::empty()).await.unwrap();

    assert!(result.is_completed());
    assert_eq!(result.step("consume").unwrap().output, Some(Value::from(42)));
}

#[tokio::test]
async fn test_cancellation_lets_in_flight_finish_then_compensates() {
    let journal = Journal::default();
    let engine = engine_with(
        SagaDefinition::builder("Cancellable")
            .step(
                StepDefinition::new("a").compensate("undoA"),
                slow_step(&journal, "a", Duration::from_millis(100)),
            )
            .step(StepDefinition::new("b").depends_on(["a"]), ok_step(&journal, "b"))
            .compensation("undoA", undo(&journal, "a")),
    );
    let (handle, signal) = cancellation();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(20)).await;
        handle.cancel();
    });

    let result = engine
        .execute_with_cancel("Cancellable", StepInputs::empty(), signal)
        .await
        .unwrap();

    assert_eq!(result.status, SagaStatus::Failed);
    let failure = result.failure.as_ref().unwrap();
    assert_eq!(failure.step, CANCELLED_STEP);
    assert_eq!(failure.kind(), FailureKind::Cancelled);
    assert!(journal.ran("a"));
    assert!(!journal.ran("b"));
    assert_eq!(journal.undone(), vec!["a"]);
}

#[tokio::test]
async fn test_cancelled_before_start_runs_nothing() {
    let journal = Journal::default();
    let engine = engine_with(
        SagaDefinition::builder("Never").step(StepDefinition::new("a"), ok_step(&journal, "a")),
    );
    let (handle, signal) = cancellation();
    handle.cancel();

    let result = engine
        .execute_with_cancel("Never", StepInputs::empty(), signal)
        .await
        .unwrap();

    assert_eq!(result.status, SagaStatus::Failed);
    assert!(result.steps.is_empty());
    assert!(journal.entries().is_empty());
}

#[tokio::test]
async fn test_retryable_failures_are_retried() {
    let attempts = Arc::new(Mutex::new(0u32));
    let flaky = {
        let attempts = Arc::clone(&attempts);
        step_fn(move |(): (), _ctx: SagaContext| {
            let attempts = Arc::clone(&attempts);
            async move {
                let n = {
                    let mut guard = attempts.lock().unwrap();
                    *guard += 1;
                    *guard
                };
                if n < 3 {
                    Err(StepError::unavailable("service warming up"))
                } else {
                    Ok(Some(n))
                }
            }
        })
    };
    let engine = engine_with(SagaDefinition::builder("Flaky").step(
        StepDefinition::new("flaky")
            .retry(3)
            .backoff(Duration::from_millis(1)),
        flaky,
    ));

    let result = engine.execute("Flaky", StepInputs::empty()).await.unwrap();

    assert!(result.is_completed());
    assert_eq!(result.step("flaky").unwrap().attempts, 3);
}

#[tokio::test]
async fn test_timeout_fails_the_step() {
    let journal = Journal::default();
    let engine = engine_with(
        SagaDefinition::builder("Slow").step(
            StepDefinition::new("slow").timeout(Duration::from_millis(20)),
            slow_step(&journal, "slow", Duration::from_secs(5)),
        ),
    );

    let result = engine.execute("Slow", StepInputs::empty()).await.unwrap();

    assert_eq!(result.status, SagaStatus::Failed);
    assert_eq!(result.failure.as_ref().unwrap().kind(), FailureKind::Timeout);
    assert!(!journal.ran("slow"));
}

#[tokio::test]
async fn test_compensation_failure_does_not_stop_the_sweep() {
    let journal = Journal::default();
    let broken = compensation_fn(|_: Option<Value>, _ctx: SagaContext| async move {
        Err(StepError::unavailable("downstream gone"))
    });
    let engine = engine_with(
        SagaDefinition::builder("Unwind")
            .step(StepDefinition::new("a").compensate("undoA"), ok_step(&journal, "a"))
            .step(
                StepDefinition::new("b").depends_on(["a"]).compensate("undoB"),
                ok_step(&journal, "b"),
            )
            .step(
                StepDefinition::new("c").depends_on(["b"]),
                failing_step(&journal, "c", Duration::ZERO),
            )
            .compensation("undoA", undo(&journal, "a"))
            .compensation("undoB", broken),
    );

    let result = engine.execute("Unwind", StepInputs::empty()).await.unwrap();

    assert_eq!(result.status, SagaStatus::CompensationIncomplete);
    assert_eq!(result.compensated(), vec!["b", "a"]);
    assert_eq!(journal.undone(), vec!["a"]);
    let errors = result.compensation_errors();
    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0].step, "b");
    assert_eq!(errors[0].compensation, "undoB");
    assert_eq!(result.step("b").unwrap().state, StepState::CompensationFailed);
    assert_eq!(result.step("a").unwrap().state, StepState::Compensated);
}

#[tokio::test]
async fn test_panicking_step_is_an_internal_failure() {
    let journal = Journal::default();
    let panics = step_fn(|(): (), _ctx: SagaContext| async move {
        if true {
            panic!("step body panicked");
        }
        Ok(None::<()>)
    });
    let engine = engine_with(
        SagaDefinition::builder("Panic")
            .step(StepDefinition::new("a").compensate("undoA"), ok_step(&journal, "a"))
            .step(StepDefinition::new("b").depends_on(["a"]), panics)
            .compensation("undoA", undo(&journal, "a")),
    );

    let result = engine.execute("Panic", StepInputs::empty()).await.unwrap();

    assert_eq!(result.status, SagaStatus::Failed);
    assert_eq!(result.failure.as_ref().unwrap().kind(), FailureKind::Internal);
    assert_eq!(journal.undone(), vec!["a"]);
}

#[tokio::test]
async fn test_events_are_published_for_successful_steps() {
    let journal = Journal::default();
    let publisher = InMemoryEventPublisher::new();
    let mut registry = StepRegistry::new();
    registry
        .register(
            SagaDefinition::builder("Events")
                .step(StepDefinition::new("a").event("a.done"), ok_step(&journal, "a"))
                .step(
                    StepDefinition::new("b").depends_on(["a"]),
                    ok_step(&journal, "b"),
                ),
        )
        .unwrap();
    let engine = SagaEngine::new(Arc::new(registry), EngineConfig::default())
        .with_publisher(Arc::new(publisher.clone()));

    let result = engine.execute("Events", StepInputs::empty()).await.unwrap();

    assert!(result.is_completed());
    let events = publisher.events();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].event_type, "a.done");
    assert_eq!(events[0].execution_id, result.execution_id);
    assert_eq!(events[0].payload, Value::from("a"));
}

#[tokio::test]
async fn test_publish_failure_does_not_fail_the_saga() {
    let journal = Journal::default();
    let publisher = InMemoryEventPublisher::new();
    publisher.set_fail_on_publish(true);
    let mut registry = StepRegistry::new();
    registry
        .register(
            SagaDefinition::builder("Events")
                .step(StepDefinition::new("a").event("a.done"), ok_step(&journal, "a")),
        )
        .unwrap();
    let engine = SagaEngine::new(Arc::new(registry), EngineConfig::default())
        .with_publisher(Arc::new(publisher));

    let result = engine.execute("Events", StepInputs::empty()).await.unwrap();
    assert!(result.is_completed());
}

#[tokio::test]
async fn test_unknown_saga_and_unknown_step_inputs_are_rejected() {
    let journal = Journal::default();
    let engine = engine_with(
        SagaDefinition::builder("Known").step(StepDefinition::new("a"), ok_step(&journal, "a")),
    );

    let err = engine
        .execute("Missing", StepInputs::empty())
        .await
        .unwrap_err();
    assert!(matches!(err, SagaError::UnknownSaga(ref name) if name == "Missing"));

    let inputs = StepInputs::builder().for_step("ghost", 1).build().unwrap();
    let err = engine.execute("Known", inputs).await.unwrap_err();
    assert!(matches!(err, SagaError::UnknownStep { ref step, .. } if step == "ghost"));
    assert!(journal.entries().is_empty());
}

#[tokio::test]
async fn test_engine_defaults_apply_to_steps() {
    let journal = Journal::default();
    let mut registry = StepRegistry::new();
    registry
        .register(SagaDefinition::builder("Defaults").step(
            StepDefinition::new("slow"),
            slow_step(&journal, "slow", Duration::from_secs(5)),
        ))
        .unwrap();
    let config = EngineConfig {
        step_timeout: Some(Duration::from_millis(10)),
        retries: 1,
        backoff: Duration::from_millis(1),
    };
    let engine = SagaEngine::new(Arc::new(registry), config);

    let result = engine.execute("Defaults", StepInputs::empty()).await.unwrap();

    assert_eq!(result.status, SagaStatus::Failed);
    let failure = result.failure.as_ref().unwrap();
    assert_eq!(failure.kind(), FailureKind::Timeout);
    assert_eq!(failure.attempts, 2);
}

#[tokio::test]
async fn test_dropped_execution_still_compensates() {
    let journal = Journal::default();
    let engine = engine_with(
        SagaDefinition::builder("Abandoned")
            .step(StepDefinition::new("a").compensate("undoA"), ok_step(&journal, "a"))
            .step(
                StepDefinition::new("b").depends_on(["a"]),
                failing_step(&journal, "b", Duration::from_millis(150)),
            )
            .compensation("undoA", undo(&journal, "a")),
    );

    let abandoned = tokio::time::timeout(
        Duration::from_millis(30),
        engine.execute("Abandoned", StepInputs::empty()),
    )
    .await;
    assert!(abandoned.is_err());

    tokio::time::sleep(Duration::from_millis(400)).await;
    assert!(journal.ran("b"));
    assert_eq!(journal.undone(), vec!["a"]);
}

#[tokio::test]
async fn test_timed_out_compensable_step_is_not_retried_and_left_unresolved() {
    let journal = Journal::default();
    let create = {
        let journal = journal.clone();
        step_fn(move |(): (), _ctx: SagaContext| {
            let journal = journal.clone();
            async move {
                journal.push("run:create");
                tokio::time::sleep(Duration::from_millis(100)).await;
                Ok(Some(1i64))
            }
        })
    };
    let engine = engine_with(
        SagaDefinition::builder("SlowCreate")
            .step(
                StepDefinition::new("create")
                    .compensate("remove")
                    .timeout(Duration::from_millis(20))
                    .retry(1)
                    .backoff(Duration::from_millis(1)),
                create,
            )
            .step(
                StepDefinition::new("next").depends_on(["create"]),
                ok_step(&journal, "next"),
            )
            .compensation("remove", undo(&journal, "create")),
    );

    let result = engine.execute("SlowCreate", StepInputs::empty()).await.unwrap();

    assert_eq!(result.status, SagaStatus::CompensationIncomplete);
    let failure = result.failure.as_ref().unwrap();
    assert_eq!(failure.step, "create");
    assert_eq!(failure.kind(), FailureKind::Timeout);
    assert_eq!(failure.attempts, 1);
    assert_eq!(
        journal.entries().iter().filter(|e| *e == "run:create").count(),
        1
    );
    assert!(!journal.ran("next"));
    assert!(journal.undone().is_empty());

    let errors = result.compensation_errors();
    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0].step, "create");
    assert_eq!(errors[0].compensation, "remove");
    assert_eq!(errors[0].source.kind(), FailureKind::Timeout);
    assert_eq!(result.step("create").unwrap().state, StepState::Failed);
}
