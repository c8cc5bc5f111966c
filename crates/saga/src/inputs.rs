//! Caller-supplied step inputs.

use std::collections::HashMap;

use serde::Serialize;
use serde_json::Value;

use crate::error::{Result, SagaError};

/// Marks a list input as "run the step once per element".
#[derive(Debug, Clone)]
pub struct ExpandEach<T> {
    items: Vec<T>,
}

impl<T> ExpandEach<T> {
    pub fn of(items: impl IntoIterator<Item = T>) -> Self {
        Self {
            items: items.into_iter().collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

/// The value bound to one step.
#[derive(Debug, Clone, PartialEq)]
pub enum StepInput {
    /// One invocation with this value.
    Single(Value),
    /// One sibling invocation per element.
    Each(Vec<Value>),
}

/// Per-execution binding of input values to step ids.
///
/// Steps with no binding run once with a `null` input (or are skipped
/// if they require an input).
#[derive(Debug, Clone, Default)]
pub struct StepInputs {
    inputs: HashMap<String, StepInput>,
}

impl StepInputs {
    pub fn builder() -> StepInputsBuilder {
        StepInputsBuilder::default()
    }

    /// Inputs with no bindings at all.
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn get(&self, step: &str) -> Option<&StepInput> {
        self.inputs.get(step)
    }

    pub fn steps(&self) -> impl Iterator<Item = &str> {
        self.inputs.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.inputs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inputs.is_empty()
    }
}

/// Builder for [`StepInputs`].
///
/// Serialization errors are held until [`build`](Self::build) so calls
/// can be chained.
#[derive(Debug, Default)]
pub struct StepInputsBuilder {
    inputs: HashMap<String, StepInput>,
    error: Option<SagaError>,
}

impl StepInputsBuilder {
    /// Binds a single value to `step`.
    pub fn for_step<T: Serialize>(mut self, step: impl Into<String>, value: T) -> Self {
        let step = step.into();
        match serde_json::to_value(value) {
            Ok(value) => {
                self.inputs.insert(step, StepInput::Single(value));
            }
            Err(source) => self.record_error(step, source),
        }
        self
    }

    /// Binds `value` to `step` if present; leaves the step unbound otherwise.
    pub fn for_step_opt<T: Serialize>(self, step: impl Into<String>, value: Option<T>) -> Self {
        match value {
            Some(value) => self.for_step(step, value),
            None => self,
        }
    }

    /// Binds a list to `step`; the step runs once per element.
    pub fn for_step_expanded<T: Serialize>(
        mut self,
        step: impl Into<String>,
        each: ExpandEach<T>,
    ) -> Self {
        let step = step.into();
        let values: std::result::Result<Vec<Value>, _> =
            each.items.into_iter().map(serde_json::to_value).collect();
        match values {
            Ok(values) => {
                self.inputs.insert(step, StepInput::Each(values));
            }
            Err(source) => self.record_error(step, source),
        }
        self
    }

    fn record_error(&mut self, step: String, source: serde_json::Error) {
        if self.error.is_none() {
            self.error = Some(SagaError::InputSerialization { step, source });
        }
    }

    pub fn build(self) -> Result<StepInputs> {
        match self.error {
            Some(err) => Err(err),
            None => Ok(StepInputs {
                inputs: self.inputs,
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[derive(Serialize)]
    struct Address {
        city: &'static str,
    }

    #[test]
    fn test_single_and_expanded_bindings() {
        let inputs = StepInputs::builder()
            .for_step("registerParty", json!({"partyKind": "INDIVIDUAL"}))
            .for_step_expanded(
                "registerAddress",
                ExpandEach::of([Address { city: "Madrid" }, Address { city: "Lima" }]),
            )
            .build()
            .unwrap();

        assert_eq!(inputs.len(), 2);
        assert_eq!(
            inputs.get("registerParty"),
            Some(&StepInput::Single(json!({"partyKind": "INDIVIDUAL"})))
        );
        assert_eq!(
            inputs.get("registerAddress"),
            Some(&StepInput::Each(vec![
                json!({"city": "Madrid"}),
                json!({"city": "Lima"})
            ]))
        );
        assert!(inputs.get("registerEmail").is_none());
    }

    #[test]
    fn test_optional_binding() {
        let inputs = StepInputs::builder()
            .for_step_opt("registerPep", None::<u32>)
            .for_step_opt("registerNaturalPerson", Some(1))
            .build()
            .unwrap();
        assert!(inputs.get("registerPep").is_none());
        assert!(inputs.get("registerNaturalPerson").is_some());
    }

    #[test]
    fn test_empty_expansion_is_kept() {
        let inputs = StepInputs::builder()
            .for_step_expanded("registerEmail", ExpandEach::<u32>::of([]))
            .build()
            .unwrap();
        assert_eq!(inputs.get("registerEmail"), Some(&StepInput::Each(vec![])));
    }

    #[test]
    fn test_serialization_error_surfaces_on_build() {
        let mut bad = HashMap::new();
        bad.insert((1, 2), "tuple keys are not valid JSON object keys");
        let result = StepInputs::builder()
            .for_step("ok", 1)
            .for_step("bad", bad)
            .build();
        assert!(matches!(
            result,
            Err(SagaError::InputSerialization { ref step, .. }) if step == "bad"
        ));
    }
}
