//! Engine-wide defaults.

use std::time::Duration;

/// Defaults applied to steps that do not declare their own policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EngineConfig {
    /// Per-attempt timeout; `None` lets attempts run indefinitely.
    pub step_timeout: Option<Duration>,
    /// Extra attempts after a retryable failure.
    pub retries: u32,
    /// Pause between attempts.
    pub backoff: Duration,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            step_timeout: None,
            retries: 0,
            backoff: Duration::from_millis(100),
        }
    }
}
