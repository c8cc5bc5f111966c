//! Saga registration and validation.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use petgraph::algo::toposort;
use petgraph::graphmap::DiGraphMap;

use crate::definition::{RegisteredStep, SagaBuilder, SagaDefinition};
use crate::error::ValidationError;

/// Holds every saga known to an engine, keyed by name.
///
/// Sagas are validated once here and shared immutably by all executions.
#[derive(Debug, Default)]
pub struct StepRegistry {
    sagas: HashMap<String, Arc<SagaDefinition>>,
}

impl StepRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Validates and stores a saga.
    ///
    /// Fails if the name is empty or taken, a step id repeats, a dependency
    /// or compensation is unknown, or the dependency graph has a cycle.
    #[tracing::instrument(skip(self, saga), fields(saga = %saga.name))]
    pub fn register(&mut self, saga: SagaBuilder) -> Result<Arc<SagaDefinition>, ValidationError> {
        if saga.name.is_empty() {
            return Err(ValidationError::EmptySagaName);
        }
        if self.sagas.contains_key(&saga.name) {
            return Err(ValidationError::DuplicateSaga(saga.name));
        }

        let definition = Arc::new(validate(saga)?);
        tracing::debug!(
            steps = definition.len(),
            layers = definition.layers().len(),
            "saga registered"
        );
        self.sagas
            .insert(definition.name.clone(), Arc::clone(&definition));
        Ok(definition)
    }

    pub fn get(&self, name: &str) -> Option<Arc<SagaDefinition>> {
        self.sagas.get(name).cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.sagas.contains_key(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.sagas.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.sagas.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sagas.is_empty()
    }
}

fn validate(saga: SagaBuilder) -> Result<SagaDefinition, ValidationError> {
    let SagaBuilder {
        name,
        steps,
        compensations,
    } = saga;

    let mut seen: HashSet<&str> = HashSet::new();
    let mut graph: DiGraphMap<&str, ()> = DiGraphMap::new();
    for step in &steps {
        let id = step.definition.id();
        if !seen.insert(id) {
            return Err(ValidationError::DuplicateStep {
                saga: name.clone(),
                step: id.to_string(),
            });
        }
        graph.add_node(id);
    }
    for step in &steps {
        let id = step.definition.id();
        for dependency in step.definition.dependencies() {
            if !seen.contains(dependency.as_str()) {
                return Err(ValidationError::UnknownDependency {
                    saga: name.clone(),
                    step: id.to_string(),
                    dependency: dependency.clone(),
                });
            }
            graph.add_edge(dependency.as_str(), id, ());
        }
        if let Some(compensation) = step.definition.compensation_id()
            && !compensations.contains_key(compensation)
        {
            return Err(ValidationError::UnknownCompensation {
                saga: name.clone(),
                step: id.to_string(),
                compensation: compensation.to_string(),
            });
        }
    }

    let sorted = toposort(&graph, None).map_err(|cycle| ValidationError::CyclicDependency {
        saga: name.clone(),
        step: cycle.node_id().to_string(),
    })?;

    // Stable order: a step goes after its dependencies, otherwise in
    // declaration order, so launches are reproducible across runs.
    let order = stable_order(&steps, sorted.len());

    let mut dependents: HashMap<String, Vec<String>> = HashMap::new();
    for step in &steps {
        let mut unique: Vec<&String> = step.definition.dependencies().iter().collect();
        unique.sort();
        unique.dedup();
        for dependency in unique {
            dependents
                .entry(dependency.clone())
                .or_default()
                .push(step.definition.id().to_string());
        }
    }

    let steps: HashMap<String, RegisteredStep> = steps
        .into_iter()
        .map(|s| (s.definition.id().to_string(), s))
        .collect();

    Ok(SagaDefinition {
        name,
        steps,
        compensations,
        order,
        dependents,
    })
}

/// Kahn's algorithm picking the earliest-declared ready step each round.
/// Only called once the graph is known to be acyclic.
fn stable_order(steps: &[RegisteredStep], count: usize) -> Vec<String> {
    let unique_deps: Vec<HashSet<&str>> = steps
        .iter()
        .map(|s| s.definition.dependencies().iter().map(String::as_str).collect())
        .collect();
    let mut remaining: Vec<usize> = unique_deps.iter().map(HashSet::len).collect();
    let mut done = vec![false; steps.len()];
    let mut order = Vec::with_capacity(count);

    while let Some(next) = (0..steps.len()).find(|&i| !done[i] && remaining[i] == 0) {
        done[next] = true;
        let id = steps[next].definition.id();
        order.push(id.to_string());
        for (i, deps) in unique_deps.iter().enumerate() {
            if !done[i] && deps.contains(id) {
                remaining[i] -= 1;
            }
        }
    }
    order
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::SagaContext;
    use crate::definition::{StepDefinition, compensation_fn, step_fn};

    fn noop_step() -> crate::StepHandler {
        step_fn(|(): (), _ctx: SagaContext| async move { Ok(None::<i64>) })
    }

    fn noop_compensation() -> crate::CompensationHandler {
        compensation_fn(|_out: Option<i64>, _ctx: SagaContext| async move { Ok(()) })
    }

    fn diamond() -> SagaBuilder {
        SagaDefinition::builder("Diamond")
            .step(StepDefinition::new("d").depends_on(["b", "c"]), noop_step())
            .step(StepDefinition::new("b").depends_on(["a"]), noop_step())
            .step(StepDefinition::new("c").depends_on(["a"]), noop_step())
            .step(StepDefinition::new("a"), noop_step())
    }

    #[test]
    fn test_register_valid_saga() {
        let mut registry = StepRegistry::new();
        let saga = registry.register(diamond()).unwrap();

        assert_eq!(saga.name(), "Diamond");
        assert_eq!(saga.len(), 4);
        assert_eq!(saga.topological_order(), &["a", "b", "c", "d"]);
        assert_eq!(saga.roots().collect::<Vec<_>>(), vec!["a"]);
        assert_eq!(saga.dependents("a"), &["b".to_string(), "c".to_string()]);
        assert_eq!(
            saga.layers(),
            vec![
                vec!["a".to_string()],
                vec!["b".to_string(), "c".to_string()],
                vec!["d".to_string()]
            ]
        );
        assert!(registry.contains("Diamond"));
        assert!(registry.get("Diamond").is_some());
    }

    #[test]
    fn test_cycle_is_rejected() {
        let mut registry = StepRegistry::new();
        let saga = SagaDefinition::builder("Cyclic")
            .step(StepDefinition::new("a").depends_on(["c"]), noop_step())
            .step(StepDefinition::new("b").depends_on(["a"]), noop_step())
            .step(StepDefinition::new("c").depends_on(["b"]), noop_step());

        let err = registry.register(saga).unwrap_err();
        assert!(matches!(err, ValidationError::CyclicDependency { ref saga, .. } if saga == "Cyclic"));
        assert!(!registry.contains("Cyclic"));
    }

    #[test]
    fn test_self_dependency_is_a_cycle() {
        let mut registry = StepRegistry::new();
        let saga = SagaDefinition::builder("SelfLoop")
            .step(StepDefinition::new("a").depends_on(["a"]), noop_step());
        assert_eq!(
            registry.register(saga).unwrap_err(),
            ValidationError::CyclicDependency {
                saga: "SelfLoop".to_string(),
                step: "a".to_string()
            }
        );
    }

    #[test]
    fn test_unknown_dependency_is_rejected() {
        let mut registry = StepRegistry::new();
        let saga = SagaDefinition::builder("Dangling")
            .step(StepDefinition::new("a"), noop_step())
            .step(StepDefinition::new("b").depends_on(["ghost"]), noop_step());
        assert_eq!(
            registry.register(saga).unwrap_err(),
            ValidationError::UnknownDependency {
                saga: "Dangling".to_string(),
                step: "b".to_string(),
                dependency: "ghost".to_string(),
            }
        );
    }

    #[test]
    fn test_duplicate_step_is_rejected() {
        let mut registry = StepRegistry::new();
        let saga = SagaDefinition::builder("Twice")
            .step(StepDefinition::new("a"), noop_step())
            .step(StepDefinition::new("a"), noop_step());
        assert!(matches!(
            registry.register(saga),
            Err(ValidationError::DuplicateStep { .. })
        ));
    }

    #[test]
    fn test_unknown_compensation_is_rejected() {
        let mut registry = StepRegistry::new();
        let saga = SagaDefinition::builder("NoUndo")
            .step(StepDefinition::new("a").compensate("undoA"), noop_step());
        assert_eq!(
            registry.register(saga).unwrap_err(),
            ValidationError::UnknownCompensation {
                saga: "NoUndo".to_string(),
                step: "a".to_string(),
                compensation: "undoA".to_string(),
            }
        );

        let saga = SagaDefinition::builder("NoUndo")
            .step(StepDefinition::new("a").compensate("undoA"), noop_step())
            .compensation("undoA", noop_compensation());
        assert!(registry.register(saga).is_ok());
    }

    #[test]
    fn test_duplicate_saga_and_empty_name() {
        let mut registry = StepRegistry::new();
        registry.register(diamond()).unwrap();
        assert_eq!(
            registry.register(diamond()).unwrap_err(),
            ValidationError::DuplicateSaga("Diamond".to_string())
        );
        assert_eq!(
            registry
                .register(SagaDefinition::builder(""))
                .unwrap_err(),
            ValidationError::EmptySagaName
        );
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_repeated_dependency_counts_once() {
        let mut registry = StepRegistry::new();
        let saga = SagaDefinition::builder("Repeat")
            .step(StepDefinition::new("a"), noop_step())
            .step(StepDefinition::new("b").depends_on(["a", "a"]), noop_step());
        let saga = registry.register(saga).unwrap();
        assert_eq!(saga.dependents("a"), &["b".to_string()]);
        assert_eq!(saga.dependency_counts()["b"], 1);
    }
}
