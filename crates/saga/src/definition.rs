//! Static saga definitions: steps, their bodies and their compensations.

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::config::EngineConfig;
use crate::context::SagaContext;
use crate::error::StepError;

/// Boxed future returned by type-erased step and compensation bodies.
pub type BoxFuture<T> = Pin<Box<dyn Future<Output = T> + Send + 'static>>;

/// Type-erased step body: `(input, context) -> output or nothing`.
pub type StepHandler =
    Arc<dyn Fn(Value, SagaContext) -> BoxFuture<Result<Option<Value>, StepError>> + Send + Sync>;

/// Type-erased compensation body: `(recorded output, context) -> ()`.
pub type CompensationHandler =
    Arc<dyn Fn(Option<Value>, SagaContext) -> BoxFuture<Result<(), StepError>> + Send + Sync>;

/// Activation predicate evaluated against the context when a step becomes ready.
pub type Predicate = Arc<dyn Fn(&SagaContext) -> bool + Send + Sync>;

/// Wraps a typed step body.
///
/// The bound input is deserialized into `I` (a missing input arrives as
/// `null`, so `()` and `Option<_>` inputs work) and the output is
/// serialized back for recording.
pub fn step_fn<I, O, F, Fut>(body: F) -> StepHandler
where
    I: DeserializeOwned + Send + 'static,
    O: Serialize + Send + 'static,
    F: Fn(I, SagaContext) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Option<O>, StepError>> + Send + 'static,
{
    let body = Arc::new(body);
    Arc::new(move |input: Value, ctx: SagaContext| {
        let body = Arc::clone(&body);
        Box::pin(async move {
            let input: I = serde_json::from_value(input)?;
            match body(input, ctx).await? {
                Some(output) => Ok(Some(serde_json::to_value(output)?)),
                None => Ok(None),
            }
        }) as BoxFuture<Result<Option<Value>, StepError>>
    })
}

/// Wraps a typed compensation body. The step's recorded output arrives
/// as `None` when the step produced nothing.
pub fn compensation_fn<O, F, Fut>(body: F) -> CompensationHandler
where
    O: DeserializeOwned + Send + 'static,
    F: Fn(Option<O>, SagaContext) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<(), StepError>> + Send + 'static,
{
    let body = Arc::new(body);
    Arc::new(move |output: Option<Value>, ctx: SagaContext| {
        let body = Arc::clone(&body);
        Box::pin(async move {
            let output: Option<O> = match output {
                Some(value) => serde_json::from_value(value)?,
                None => None,
            };
            body(output, ctx).await
        }) as BoxFuture<Result<(), StepError>>
    })
}

/// Retry, backoff and timeout for one step (and its compensation).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub retries: u32,
    pub backoff: Duration,
    pub timeout: Option<Duration>,
}

impl RetryPolicy {
    pub fn max_attempts(&self) -> u32 {
        self.retries.saturating_add(1)
    }
}

/// Declaration of one step.
#[derive(Clone)]
pub struct StepDefinition {
    id: String,
    depends_on: Vec<String>,
    compensation: Option<String>,
    event_type: Option<String>,
    activation: Option<Predicate>,
    requires_input: bool,
    retries: Option<u32>,
    backoff: Option<Duration>,
    timeout: Option<Duration>,
    max_parallel: Option<usize>,
}

impl StepDefinition {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            depends_on: Vec::new(),
            compensation: None,
            event_type: None,
            activation: None,
            requires_input: false,
            retries: None,
            backoff: None,
            timeout: None,
            max_parallel: None,
        }
    }

    /// Adds dependencies; the step starts only after all of them succeeded
    /// or were skipped.
    pub fn depends_on<I, S>(mut self, steps: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.depends_on.extend(steps.into_iter().map(Into::into));
        self
    }

    /// Names the compensation that undoes this step.
    pub fn compensate(mut self, compensation: impl Into<String>) -> Self {
        self.compensation = Some(compensation.into());
        self
    }

    /// Event type published when the step succeeds.
    pub fn event(mut self, event_type: impl Into<String>) -> Self {
        self.event_type = Some(event_type.into());
        self
    }

    /// Runs the step only if `predicate` holds when the step becomes ready.
    pub fn when<P>(mut self, predicate: P) -> Self
    where
        P: Fn(&SagaContext) -> bool + Send + Sync + 'static,
    {
        self.activation = Some(Arc::new(predicate));
        self
    }

    /// Skips the step when the caller bound no input to it.
    pub fn requires_input(mut self) -> Self {
        self.requires_input = true;
        self
    }

    pub fn retry(mut self, retries: u32) -> Self {
        self.retries = Some(retries);
        self
    }

    pub fn backoff(mut self, backoff: Duration) -> Self {
        self.backoff = Some(backoff);
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Limits how many fan-out siblings run at once. `1` runs elements one
    /// after another in list order.
    pub fn max_parallel(mut self, limit: usize) -> Self {
        self.max_parallel = Some(limit.max(1));
        self
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn dependencies(&self) -> &[String] {
        &self.depends_on
    }

    pub fn compensation_id(&self) -> Option<&str> {
        self.compensation.as_deref()
    }

    pub fn event_type(&self) -> Option<&str> {
        self.event_type.as_deref()
    }

    pub fn has_activation(&self) -> bool {
        self.activation.is_some()
    }

    /// Evaluates the activation predicate; absent predicate means active.
    pub fn is_active(&self, ctx: &SagaContext) -> bool {
        self.activation.as_ref().is_none_or(|p| p(ctx))
    }

    pub fn input_required(&self) -> bool {
        self.requires_input
    }

    pub fn parallelism(&self) -> Option<usize> {
        self.max_parallel
    }

    /// Resolves this step's retry policy against engine defaults.
    pub fn retry_policy(&self, defaults: &EngineConfig) -> RetryPolicy {
        RetryPolicy {
            retries: self.retries.unwrap_or(defaults.retries),
            backoff: self.backoff.unwrap_or(defaults.backoff),
            timeout: self.timeout.or(defaults.step_timeout),
        }
    }
}

impl fmt::Debug for StepDefinition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StepDefinition")
            .field("id", &self.id)
            .field("depends_on", &self.depends_on)
            .field("compensation", &self.compensation)
            .field("event_type", &self.event_type)
            .field("conditional", &self.activation.is_some())
            .field("requires_input", &self.requires_input)
            .field("max_parallel", &self.max_parallel)
            .finish()
    }
}

pub(crate) struct RegisteredStep {
    pub(crate) definition: StepDefinition,
    pub(crate) handler: StepHandler,
}

/// Collects steps and compensations before registration.
pub struct SagaBuilder {
    pub(crate) name: String,
    pub(crate) steps: Vec<RegisteredStep>,
    pub(crate) compensations: HashMap<String, CompensationHandler>,
}

impl SagaBuilder {
    /// Adds a step with its body.
    pub fn step(mut self, definition: StepDefinition, handler: StepHandler) -> Self {
        self.steps.push(RegisteredStep {
            definition,
            handler,
        });
        self
    }

    /// Registers a compensation body under `id`.
    pub fn compensation(mut self, id: impl Into<String>, handler: CompensationHandler) -> Self {
        self.compensations.insert(id.into(), handler);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

/// A validated, immutable saga.
///
/// Built only through [`StepRegistry::register`](crate::StepRegistry::register),
/// which guarantees the dependency graph is acyclic and every referenced
/// step and compensation exists.
pub struct SagaDefinition {
    pub(crate) name: String,
    pub(crate) steps: HashMap<String, RegisteredStep>,
    pub(crate) compensations: HashMap<String, CompensationHandler>,
    /// Step ids in a topological order; ties keep declaration order.
    pub(crate) order: Vec<String>,
    pub(crate) dependents: HashMap<String, Vec<String>>,
}

impl SagaDefinition {
    pub fn builder(name: impl Into<String>) -> SagaBuilder {
        SagaBuilder {
            name: name.into(),
            steps: Vec::new(),
            compensations: HashMap::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn step(&self, id: &str) -> Option<&StepDefinition> {
        self.steps.get(id).map(|s| &s.definition)
    }

    pub fn contains_step(&self, id: &str) -> bool {
        self.steps.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Step ids in topological order.
    pub fn topological_order(&self) -> &[String] {
        &self.order
    }

    /// Steps with no dependencies.
    pub fn roots(&self) -> impl Iterator<Item = &str> {
        self.order
            .iter()
            .filter(|id| self.steps[id.as_str()].definition.depends_on.is_empty())
            .map(String::as_str)
    }

    /// Steps that directly depend on `id`.
    pub fn dependents(&self, id: &str) -> &[String] {
        self.dependents.get(id).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Groups step ids into layers: every step sits one layer after its
    /// deepest dependency.
    pub fn layers(&self) -> Vec<Vec<String>> {
        let mut depth: HashMap<&str, usize> = HashMap::new();
        let mut layers: Vec<Vec<String>> = Vec::new();
        for id in &self.order {
            let step = &self.steps[id.as_str()].definition;
            let level = step
                .depends_on
                .iter()
                .filter_map(|d| depth.get(d.as_str()))
                .map(|d| d + 1)
                .max()
                .unwrap_or(0);
            depth.insert(id.as_str(), level);
            if layers.len() <= level {
                layers.resize_with(level + 1, Vec::new);
            }
            layers[level].push(id.clone());
        }
        layers
    }

    pub(crate) fn handler(&self, id: &str) -> Option<&StepHandler> {
        self.steps.get(id).map(|s| &s.handler)
    }

    pub(crate) fn compensation_handler(&self, id: &str) -> Option<&CompensationHandler> {
        self.compensations.get(id)
    }

    pub(crate) fn dependency_counts(&self) -> HashMap<String, usize> {
        self.steps
            .iter()
            .map(|(id, s)| {
                let unique: HashSet<&String> = s.definition.depends_on.iter().collect();
                (id.clone(), unique.len())
            })
            .collect()
    }
}

impl fmt::Debug for SagaDefinition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SagaDefinition")
            .field("name", &self.name)
            .field("order", &self.order)
            .field("compensations", &self.compensations.keys().collect::<Vec<_>>())
            .finish()
    }
}
