//! Per-execution shared state.

use std::collections::HashMap;
use std::fmt;
use std::marker::PhantomData;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::error::StepError;

/// Name and value type of one context entry.
///
/// Sagas declare their keys as constants so the set of keys a saga reads
/// and writes is part of its documented contract:
///
/// ```
/// use saga::ContextKey;
///
/// pub const CTX_PARTY_ID: ContextKey<i64> = ContextKey::new("partyId");
/// ```
pub struct ContextKey<T> {
    name: &'static str,
    _type: PhantomData<fn() -> T>,
}

impl<T> ContextKey<T> {
    pub const fn new(name: &'static str) -> Self {
        Self {
            name,
            _type: PhantomData,
        }
    }

    pub const fn name(&self) -> &'static str {
        self.name
    }
}

impl<T> Clone for ContextKey<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for ContextKey<T> {}

impl<T> fmt::Debug for ContextKey<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("ContextKey").field(&self.name).finish()
    }
}

#[derive(Debug, Default)]
struct ContextState {
    variables: HashMap<String, Value>,
    outputs: HashMap<String, Value>,
}

/// Mutable key/value store shared by every step of one execution.
///
/// Cloning is cheap and yields a handle to the same store. All reads and
/// writes go through a single mutex; the lock is never held across an
/// `.await`, so accessors are plain synchronous calls usable from
/// activation predicates.
#[derive(Clone, Default)]
pub struct SagaContext {
    state: Arc<Mutex<ContextState>>,
}

impl SagaContext {
    /// Creates an empty context.
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, ContextState> {
        // A step that panicked while holding the lock cannot leave a map
        // half-written, so the data is still usable.
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Stores `value` under `key`, replacing any previous value.
    pub fn put<T: Serialize>(&self, key: &ContextKey<T>, value: T) -> Result<(), StepError> {
        let value = serde_json::to_value(value)?;
        self.lock().variables.insert(key.name.to_string(), value);
        Ok(())
    }

    /// Reads the value stored under `key`.
    ///
    /// Returns `None` if the key is absent or holds a value of another type.
    pub fn get<T: DeserializeOwned>(&self, key: &ContextKey<T>) -> Option<T> {
        let value = self.lock().variables.get(key.name).cloned()?;
        serde_json::from_value(value).ok()
    }

    /// Reads the value stored under `key`, failing the step if it is missing.
    pub fn require<T: DeserializeOwned>(&self, key: &ContextKey<T>) -> Result<T, StepError> {
        let value = self
            .lock()
            .variables
            .get(key.name)
            .cloned()
            .ok_or_else(|| {
                StepError::internal(format!("saga context has no value for '{}'", key.name))
            })?;
        Ok(serde_json::from_value(value)?)
    }

    pub fn contains<T>(&self, key: &ContextKey<T>) -> bool {
        self.lock().variables.contains_key(key.name)
    }

    /// Removes and returns the value stored under `key`.
    pub fn remove<T: DeserializeOwned>(&self, key: &ContextKey<T>) -> Option<T> {
        let value = self.lock().variables.remove(key.name)?;
        serde_json::from_value(value).ok()
    }

    /// Returns true if `key` holds exactly `expected`.
    pub fn matches<T: Serialize>(&self, key: &ContextKey<T>, expected: T) -> bool {
        let Ok(expected) = serde_json::to_value(expected) else {
            return false;
        };
        self.lock().variables.get(key.name) == Some(&expected)
    }

    /// Reads the recorded output of an earlier step.
    ///
    /// For fan-out steps the output is the list of element outputs in
    /// element order, with `null` for elements that produced nothing.
    pub fn step_output<T: DeserializeOwned>(&self, step: &str) -> Option<T> {
        let value = self.lock().outputs.get(step).cloned()?;
        serde_json::from_value(value).ok()
    }

    pub(crate) fn record_output(&self, step: &str, index: Option<usize>, output: Value) {
        let mut state = self.lock();
        match index {
            None => {
                state.outputs.insert(step.to_string(), output);
            }
            Some(i) => {
                let entry = state
                    .outputs
                    .entry(step.to_string())
                    .or_insert_with(|| Value::Array(Vec::new()));
                if let Value::Array(items) = entry {
                    if items.len() <= i {
                        items.resize(i + 1, Value::Null);
                    }
                    items[i] = output;
                }
            }
        }
    }

    /// Returns a copy of all variables, for reporting.
    pub fn snapshot(&self) -> HashMap<String, Value> {
        self.lock().variables.clone()
    }
}

impl fmt::Debug for SagaContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.lock();
        f.debug_struct("SagaContext")
            .field("variables", &state.variables)
            .field("outputs", &state.outputs.keys().collect::<Vec<_>>())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PARTY_ID: ContextKey<i64> = ContextKey::new("partyId");
    const KIND: ContextKey<String> = ContextKey::new("customerType");

    #[test]
    fn test_put_and_get() {
        let ctx = SagaContext::new();
        assert_eq!(ctx.get(&PARTY_ID), None);
        assert!(!ctx.contains(&PARTY_ID));

        ctx.put(&PARTY_ID, 42).unwrap();
        assert_eq!(ctx.get(&PARTY_ID), Some(42));
        assert!(ctx.contains(&PARTY_ID));
    }

    #[test]
    fn test_clones_share_state() {
        let ctx = SagaContext::new();
        let other = ctx.clone();
        other.put(&KIND, "INDIVIDUAL".to_string()).unwrap();
        assert_eq!(ctx.get(&KIND).as_deref(), Some("INDIVIDUAL"));
    }

    #[test]
    fn test_require_missing_key_is_step_error() {
        let ctx = SagaContext::new();
        let err = ctx.require(&PARTY_ID).unwrap_err();
        assert_eq!(err.kind(), crate::FailureKind::Internal);
        assert!(err.message().contains("partyId"));
    }

    #[test]
    fn test_get_with_wrong_type_is_none() {
        let ctx = SagaContext::new();
        ctx.put(&KIND, "ORGANIZATION".to_string()).unwrap();
        let as_number: ContextKey<i64> = ContextKey::new("customerType");
        assert_eq!(ctx.get(&as_number), None);
        assert!(ctx.require(&as_number).is_err());
    }

    #[test]
    fn test_matches() {
        let ctx = SagaContext::new();
        assert!(!ctx.matches(&KIND, "ORGANIZATION".to_string()));
        ctx.put(&KIND, "ORGANIZATION".to_string()).unwrap();
        assert!(ctx.matches(&KIND, "ORGANIZATION".to_string()));
        assert!(!ctx.matches(&KIND, "INDIVIDUAL".to_string()));
    }

    #[test]
    fn test_remove() {
        let ctx = SagaContext::new();
        ctx.put(&PARTY_ID, 7).unwrap();
        assert_eq!(ctx.remove(&PARTY_ID), Some(7));
        assert!(!ctx.contains(&PARTY_ID));
    }

    #[test]
    fn test_step_outputs_single_and_fan_out() {
        let ctx = SagaContext::new();
        ctx.record_output("registerParty", None, Value::from(10));
        ctx.record_output("registerAddress", Some(1), Value::from(22));
        ctx.record_output("registerAddress", Some(0), Value::from(21));

        assert_eq!(ctx.step_output::<i64>("registerParty"), Some(10));
        assert_eq!(
            ctx.step_output::<Vec<i64>>("registerAddress"),
            Some(vec![21, 22])
        );
        assert_eq!(ctx.step_output::<i64>("missing"), None);
    }

    #[test]
    fn test_snapshot_contains_variables_only() {
        let ctx = SagaContext::new();
        ctx.put(&PARTY_ID, 1).unwrap();
        ctx.record_output("registerParty", None, Value::from(1));
        let snapshot = ctx.snapshot();
        assert_eq!(snapshot.len(), 1);
        assert_eq!(snapshot.get("partyId"), Some(&Value::from(1)));
    }
}
