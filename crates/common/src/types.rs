use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Correlates everything one saga run produces: its log span, its step
/// events and the `executionId` reported to HTTP clients.
///
/// Serialized as the bare UUID string.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ExecutionId(Uuid);

impl ExecutionId {
    /// A fresh random (v4) id.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ExecutionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ExecutionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

/// Parses the form produced by `Display`, e.g. an id copied out of a log line.
impl FromStr for ExecutionId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s).map(Self)
    }
}

impl AsRef<Uuid> for ExecutionId {
    fn as_ref(&self) -> &Uuid {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_each_run_gets_its_own_id() {
        assert_ne!(ExecutionId::new(), ExecutionId::default());
    }

    #[test]
    fn test_display_parses_back() {
        let id = ExecutionId::new();
        let parsed: ExecutionId = id.to_string().parse().unwrap();
        assert_eq!(parsed, id);
        assert_eq!(parsed.as_ref().get_version_num(), 4);
    }

    #[test]
    fn test_rejects_malformed_ids() {
        assert!("not-an-execution".parse::<ExecutionId>().is_err());
    }

    #[test]
    fn test_serializes_as_bare_string() {
        let id = ExecutionId::new();
        let json = serde_json::to_value(id).unwrap();
        assert_eq!(json, serde_json::Value::String(id.to_string()));
        assert_eq!(serde_json::from_value::<ExecutionId>(json).unwrap(), id);
    }
}
