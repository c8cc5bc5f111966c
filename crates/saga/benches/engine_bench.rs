use std::sync::Arc;

use criterion::{Criterion, criterion_group, criterion_main};
use saga::{
    EngineConfig, ExpandEach, SagaContext, SagaDefinition, SagaEngine, StepDefinition,
    StepInputs, StepRegistry, compensation_fn, step_fn,
};
use serde_json::Value;

fn echo() -> saga::StepHandler {
    step_fn(|n: Option<u64>, _ctx: SagaContext| async move { Ok(n) })
}

fn engine() -> SagaEngine {
    let mut registry = StepRegistry::new();

    let mut chain = SagaDefinition::builder("Chain");
    for i in 0..50 {
        let mut step = StepDefinition::new(format!("s{i}"));
        if i > 0 {
            step = step.depends_on([format!("s{}", i - 1)]);
        }
        chain = chain.step(step, echo());
    }
    registry.register(chain).unwrap();

    registry
        .register(
            SagaDefinition::builder("FanOut")
                .step(StepDefinition::new("root"), echo())
                .step(
                    StepDefinition::new("items")
                        .depends_on(["root"])
                        .compensate("undo"),
                    echo(),
                )
                .compensation(
                    "undo",
                    compensation_fn(|_: Option<Value>, _ctx: SagaContext| async move { Ok(()) }),
                ),
        )
        .unwrap();

    SagaEngine::new(Arc::new(registry), EngineConfig::default())
}

fn bench_deep_chain(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();
    let engine = engine();

    c.bench_function("saga/deep_chain_50", |b| {
        b.iter(|| {
            rt.block_on(async {
                let result = engine.execute("Chain", StepInputs::empty()).await.unwrap();
                assert!(result.is_completed());
            });
        });
    });
}

fn bench_wide_fan_out(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();
    let engine = engine();

    c.bench_function("saga/fan_out_200", |b| {
        b.iter(|| {
            rt.block_on(async {
                let inputs = StepInputs::builder()
                    .for_step_expanded("items", ExpandEach::of(0u64..200))
                    .build()
                    .unwrap();
                let result = engine.execute("FanOut", inputs).await.unwrap();
                assert!(result.is_completed());
            });
        });
    });
}

criterion_group!(benches, bench_deep_chain, bench_wide_fan_out);
criterion_main!(benches);
