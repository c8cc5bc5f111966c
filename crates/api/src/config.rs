//! Application configuration loaded from environment variables.

use std::time::Duration;

use saga::EngineConfig;

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

impl LogFormat {
    fn parse(value: &str) -> Self {
        if value.eq_ignore_ascii_case("json") {
            LogFormat::Json
        } else {
            LogFormat::Text
        }
    }
}

/// Server configuration with sensible defaults.
///
/// Reads from environment variables:
/// - `HOST`: bind address (default: `"0.0.0.0"`)
/// - `PORT`: listen port (default: `3000`)
/// - `RUST_LOG`: tracing filter directive (default: `"info"`)
/// - `LOG_FORMAT`: `text` or `json` (default: `text`)
/// - `SAGA_STEP_TIMEOUT_MS`: per-attempt step timeout (default: none)
/// - `SAGA_STEP_RETRIES`: retries for retryable step failures (default: `0`)
/// - `SAGA_STEP_BACKOFF_MS`: pause between attempts (default: `100`)
///
/// Unparsable values fall back to the defaults.
#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub log_level: String,
    pub log_format: LogFormat,
    pub step_timeout: Option<Duration>,
    pub step_retries: u32,
    pub step_backoff: Duration,
}

impl Config {
    /// Loads configuration from environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        let millis = |key: &str| {
            lookup(key)
                .and_then(|v| v.parse::<u64>().ok())
                .map(Duration::from_millis)
        };
        Self {
            host: lookup("HOST").unwrap_or(defaults.host),
            port: lookup("PORT")
                .and_then(|p| p.parse().ok())
                .unwrap_or(defaults.port),
            log_level: lookup("RUST_LOG").unwrap_or(defaults.log_level),
            log_format: lookup("LOG_FORMAT")
                .map(|f| LogFormat::parse(&f))
                .unwrap_or(defaults.log_format),
            step_timeout: millis("SAGA_STEP_TIMEOUT_MS"),
            step_retries: lookup("SAGA_STEP_RETRIES")
                .and_then(|r| r.parse().ok())
                .unwrap_or(defaults.step_retries),
            step_backoff: millis("SAGA_STEP_BACKOFF_MS").unwrap_or(defaults.step_backoff),
        }
    }

    /// Returns the `"host:port"` bind address string.
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Engine defaults for steps that declare no policy of their own.
    pub fn engine(&self) -> EngineConfig {
        EngineConfig {
            step_timeout: self.step_timeout,
            retries: self.step_retries,
            backoff: self.step_backoff,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        let engine = EngineConfig::default();
        Self {
            host: "0.0.0.0".to_string(),
            port: 3000,
            log_level: "info".to_string(),
            log_format: LogFormat::Text,
            step_timeout: engine.step_timeout,
            step_retries: engine.retries,
            step_backoff: engine.backoff,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn from_pairs(pairs: &[(&str, &str)]) -> Config {
        let env: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|key| env.get(key).cloned())
    }

    #[test]
    fn test_default_values() {
        let config = Config::default();
        assert_eq!(config.host, "0.0.0.0");
        assert_eq!(config.port, 3000);
        assert_eq!(config.log_level, "info");
        assert_eq!(config.log_format, LogFormat::Text);
        assert_eq!(config.engine(), EngineConfig::default());
    }

    #[test]
    fn test_addr_formatting() {
        let config = Config {
            host: "127.0.0.1".to_string(),
            port: 8080,
            ..Config::default()
        };
        assert_eq!(config.addr(), "127.0.0.1:8080");
    }

    #[test]
    fn test_engine_settings_from_env() {
        let config = from_pairs(&[
            ("LOG_FORMAT", "JSON"),
            ("SAGA_STEP_TIMEOUT_MS", "2500"),
            ("SAGA_STEP_RETRIES", "3"),
            ("SAGA_STEP_BACKOFF_MS", "50"),
        ]);

        assert_eq!(config.log_format, LogFormat::Json);
        let engine = config.engine();
        assert_eq!(engine.step_timeout, Some(Duration::from_millis(2500)));
        assert_eq!(engine.retries, 3);
        assert_eq!(engine.backoff, Duration::from_millis(50));
    }

    #[test]
    fn test_unparsable_values_fall_back_to_defaults() {
        let config = from_pairs(&[
            ("PORT", "not-a-port"),
            ("SAGA_STEP_TIMEOUT_MS", "soon"),
            ("SAGA_STEP_RETRIES", "-1"),
        ]);

        assert_eq!(config.port, 3000);
        assert_eq!(config.step_timeout, None);
        assert_eq!(config.step_retries, 0);
        assert_eq!(config.step_backoff, Duration::from_millis(100));
    }
}
