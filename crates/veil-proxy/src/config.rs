//! Orchestrator Configuration
//!
//! Tunables for the proxy feature: the recovery delay after a failed
//! connectivity test and the pass-through domain list the bypass surface
//! consults.

use serde::Deserialize;
use std::time::Duration;

/// Default recovery delay after a failed connectivity test (milliseconds).
pub const DEFAULT_RETRY_DELAY_MS: u64 = 5000;

/// Configuration for the proxy orchestrator.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct OrchestratorConfig {
    /// Fixed delay before re-running recomputation after a connectivity
    /// failure. No backoff: each flap restarts the same delay.
    pub retry_delay_ms: u64,
    /// Domains that never go through the proxy (suffix match on the host).
    pub excluded_domains: Vec<String>,
}

impl OrchestratorConfig {
    /// Parse from a TOML document.
    pub fn from_toml_str(input: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(input).map_err(|e| ConfigError::Parse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Recovery delay as a `Duration`.
    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.retry_delay_ms == 0 {
            return Err(ConfigError::InvalidRetryDelay);
        }
        Ok(())
    }
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            retry_delay_ms: DEFAULT_RETRY_DELAY_MS,
            excluded_domains: Vec::new(),
        }
    }
}

/// Configuration errors
#[derive(Debug, Clone, thiserror::Error)]
pub enum ConfigError {
    #[error("Retry delay must be nonzero")]
    InvalidRetryDelay,

    #[error("Invalid configuration: {0}")]
    Parse(String),
}
