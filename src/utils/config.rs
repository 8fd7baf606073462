// src/utils/config.rs
//! Engine and run configuration
//!
//! Two layers:
//!
//! - [`EngineConfig`]: engine tuning (retry policy, pacing, oracle endpoint,
//!   storage fallback). Loaded with the `config` crate from defaults, an
//!   optional `beta-swarm.toml` and `BETA_SWARM__*` environment variables.
//! - [`RunConfig`]: the immutable per-run settings every agent shares. Built
//!   from the platform environment variables (`{PLATFORM}_BASE_URL`, ...) on
//!   top of an `EngineConfig`.

use crate::runtime::pacing::PacingPolicy;
use crate::utils::errors::{EngineError, Result};
use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Default target address when `{PLATFORM}_BASE_URL` is unset
pub const DEFAULT_BASE_URL: &str = "http://localhost:3000";

/// Default transport timeout when `TEST_TIMEOUT_MS` is unset
pub const DEFAULT_TIMEOUT_MS: u64 = 30_000;

/// Engine tuning loaded from file + environment
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Retry policy for retryable steps
    pub retry: RetrySettings,

    /// Human-delay pacing between steps
    pub pacing: PacingSettings,

    /// Decision/content oracle endpoint
    pub oracle: OracleSettings,

    /// Run storage
    pub storage: StorageSettings,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrySettings {
    /// Attempt budget for retryable steps
    pub max_retries: u32,

    /// Linear backoff unit: the wait after attempt k is `base_delay_ms * k`
    pub base_delay_ms: u64,
}

impl Default for RetrySettings {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay_ms: 1000,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PacingSettings {
    /// Insert human delays between steps
    pub enabled: bool,

    /// Multiplier applied to every base delay (1.0 = realistic pacing)
    pub scale: f64,
}

impl Default for PacingSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            scale: 1.0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OracleSettings {
    pub api_url: String,
    pub model: String,
    pub max_tokens: u32,
    pub timeout_ms: u64,
}

impl Default for OracleSettings {
    fn default() -> Self {
        Self {
            api_url: "https://api.anthropic.com/v1/messages".to_string(),
            model: "claude-3-5-sonnet-20241022".to_string(),
            max_tokens: 500,
            timeout_ms: 30_000,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageSettings {
    /// SQLite path used when `DATABASE_URL` is not provided
    pub database_url: Option<String>,
}

impl EngineConfig {
    /// Load configuration from `beta-swarm.toml` (optional) and environment
    pub fn load() -> Result<Self> {
        let config = Config::builder()
            .add_source(File::with_name("beta-swarm").required(false))
            .add_source(
                Environment::with_prefix("BETA_SWARM")
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        let engine: EngineConfig = config.try_deserialize()?;
        engine.validate()?;
        Ok(engine)
    }

    /// Validate engine settings
    pub fn validate(&self) -> Result<()> {
        if self.retry.max_retries == 0 {
            return Err(EngineError::Validation(
                "retry.max_retries must be at least 1".to_string(),
            ));
        }
        if !self.pacing.scale.is_finite() || self.pacing.scale < 0.0 {
            return Err(EngineError::Validation(format!(
                "pacing.scale must be a non-negative number, got {}",
                self.pacing.scale
            )));
        }
        Ok(())
    }

    /// Pacing policy derived from the pacing settings
    pub fn pacing_policy(&self) -> PacingPolicy {
        if self.pacing.enabled {
            PacingPolicy::realistic().scaled(self.pacing.scale)
        } else {
            PacingPolicy::disabled()
        }
    }
}

/// Immutable settings shared read-only by every agent of a run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunConfig {
    /// Platform label (`lumina`, `mednext`, ...)
    pub platform: String,

    /// Target service base address
    pub base_url: String,

    /// Optional bearer credential for the target service
    #[serde(skip_serializing)]
    pub api_key: Option<String>,

    /// Transport timeout per request
    #[serde(with = "duration_ms")]
    pub timeout: Duration,

    /// Attempt budget for retryable steps
    pub max_retries: u32,

    /// Linear backoff unit
    #[serde(with = "duration_ms")]
    pub retry_base_delay: Duration,

    /// Concurrency ceiling (1 in serial mode)
    pub max_concurrent: usize,

    /// Debug-level logging for agents
    pub detailed_logging: bool,

    /// Human-delay pacing between steps
    pub pacing: PacingPolicy,
}

impl RunConfig {
    /// Minimal configuration for a platform, mostly useful in tests
    pub fn new(platform: impl Into<String>, base_url: impl Into<String>) -> Self {
        let retry = RetrySettings::default();
        Self {
            platform: platform.into(),
            base_url: base_url.into(),
            api_key: None,
            timeout: Duration::from_millis(DEFAULT_TIMEOUT_MS),
            max_retries: retry.max_retries,
            retry_base_delay: Duration::from_millis(retry.base_delay_ms),
            max_concurrent: 1,
            detailed_logging: false,
            pacing: PacingPolicy::realistic(),
        }
    }

    /// Build from the process environment
    pub fn from_env(platform: &str, engine: &EngineConfig, max_concurrent: usize) -> Result<Self> {
        Self::from_lookup(platform, engine, max_concurrent, |key| std::env::var(key).ok())
    }

    /// Build from an arbitrary variable lookup
    pub fn from_lookup<F>(
        platform: &str,
        engine: &EngineConfig,
        max_concurrent: usize,
        lookup: F,
    ) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let prefix = platform.to_uppercase().replace('-', "_");

        let base_url = lookup(&format!("{}_BASE_URL", prefix))
            .filter(|v| !v.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_string());

        let api_key = lookup(&format!("{}_API_KEY", prefix)).filter(|v| !v.is_empty());

        let timeout_ms = match lookup("TEST_TIMEOUT_MS") {
            Some(raw) => raw.trim().parse::<u64>().map_err(|e| {
                EngineError::Configuration(format!("TEST_TIMEOUT_MS={:?}: {}", raw, e))
            })?,
            None => DEFAULT_TIMEOUT_MS,
        };

        let detailed_logging = lookup("ENABLE_DETAILED_LOGGING")
            .map(|v| v == "true" || v == "1")
            .unwrap_or(false);

        let config = Self {
            platform: platform.to_string(),
            base_url,
            api_key,
            timeout: Duration::from_millis(timeout_ms),
            max_retries: engine.retry.max_retries,
            retry_base_delay: Duration::from_millis(engine.retry.base_delay_ms),
            max_concurrent,
            detailed_logging,
            pacing: engine.pacing_policy(),
        };
        config.validate()?;
        Ok(config)
    }

    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    pub fn with_retry_base_delay(mut self, delay: Duration) -> Self {
        self.retry_base_delay = delay;
        self
    }

    pub fn with_max_concurrent(mut self, max_concurrent: usize) -> Self {
        self.max_concurrent = max_concurrent;
        self
    }

    pub fn with_pacing(mut self, pacing: PacingPolicy) -> Self {
        self.pacing = pacing;
        self
    }

    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    /// Validate run settings
    pub fn validate(&self) -> Result<()> {
        if self.base_url.trim().is_empty() {
            return Err(EngineError::Validation("base_url cannot be empty".to_string()));
        }
        if self.max_retries == 0 {
            return Err(EngineError::Validation(
                "max_retries must be at least 1".to_string(),
            ));
        }
        if self.max_concurrent == 0 {
            return Err(EngineError::Validation(
                "max_concurrent must be at least 1".to_string(),
            ));
        }
        if self.timeout.is_zero() {
            return Err(EngineError::Validation("timeout cannot be 0".to_string()));
        }
        Ok(())
    }
}

/// Fetch a required environment variable
pub fn require_env(key: &str) -> Result<String> {
    std::env::var(key)
        .ok()
        .filter(|v| !v.trim().is_empty())
        .ok_or_else(|| EngineError::MissingEnv(key.to_string()))
}

pub(crate) mod duration_ms {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(value.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_millis)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults_without_env() {
        let engine = EngineConfig::default();
        let config = RunConfig::from_lookup("lumina", &engine, 5, lookup_from(&[])).unwrap();

        assert_eq!(config.base_url, DEFAULT_BASE_URL);
        assert_eq!(config.timeout, Duration::from_millis(30_000));
        assert_eq!(config.max_retries, 3);
        assert_eq!(config.retry_base_delay, Duration::from_millis(1000));
        assert_eq!(config.max_concurrent, 5);
        assert!(config.api_key.is_none());
        assert!(!config.detailed_logging);
    }

    #[test]
    fn test_platform_prefixed_variables() {
        let engine = EngineConfig::default();
        let lookup = lookup_from(&[
            ("MEDNEXT_BASE_URL", "https://staging.mednext.test"),
            ("MEDNEXT_API_KEY", "k-123"),
            ("TEST_TIMEOUT_MS", "5000"),
            ("ENABLE_DETAILED_LOGGING", "true"),
        ]);
        let config = RunConfig::from_lookup("mednext", &engine, 1, lookup).unwrap();

        assert_eq!(config.base_url, "https://staging.mednext.test");
        assert_eq!(config.api_key.as_deref(), Some("k-123"));
        assert_eq!(config.timeout, Duration::from_millis(5000));
        assert!(config.detailed_logging);
    }

    #[test]
    fn test_bad_timeout_is_rejected() {
        let engine = EngineConfig::default();
        let lookup = lookup_from(&[("TEST_TIMEOUT_MS", "soon")]);
        let err = RunConfig::from_lookup("lumina", &engine, 1, lookup).unwrap_err();
        assert!(matches!(err, EngineError::Configuration(_)));
    }

    #[test]
    fn test_validation() {
        assert!(RunConfig::new("lumina", "http://x").validate().is_ok());
        assert!(RunConfig::new("lumina", "http://x").with_max_retries(0).validate().is_err());
        assert!(RunConfig::new("lumina", "http://x").with_max_concurrent(0).validate().is_err());
        assert!(RunConfig::new("lumina", "").validate().is_err());

        let mut engine = EngineConfig::default();
        engine.pacing.scale = -1.0;
        assert!(engine.validate().is_err());
    }

    #[test]
    fn test_disabled_pacing_policy() {
        let mut engine = EngineConfig::default();
        engine.pacing.enabled = false;
        assert!(!engine.pacing_policy().is_enabled());
    }

    #[test]
    fn test_api_key_not_serialized() {
        let config = RunConfig::new("lumina", "http://x").with_api_key("secret");
        let json = serde_json::to_string(&config).unwrap();
        assert!(!json.contains("secret"));
        assert!(json.contains("\"timeout\":30000"));
    }
}
