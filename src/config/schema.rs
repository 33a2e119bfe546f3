//! Configuration schema definitions.
//!
//! All types derive Serde traits for deserialization from TOML. Every field
//! has a default so an empty file is a valid configuration.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Root configuration for the interception engine and its tooling.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct TinkerConfig {
    /// Log filter and output format.
    pub logging: LoggingConfig,

    /// Interception switch and pending request policy.
    pub interception: InterceptionConfig,

    /// Script engine options applied to every compiled handler.
    pub script: ScriptConfig,
}

/// Logging configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// `EnvFilter` directive used when `RUST_LOG` is unset.
    pub filter: String,

    /// Output format: "full" or "compact".
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: "response_tinker=info".to_string(),
            format: "full".to_string(),
        }
    }
}

/// Interception configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct InterceptionConfig {
    /// Whether the engine starts with interception switched on.
    pub enabled: bool,

    /// Age in seconds after which an unanswered request is dropped.
    /// Zero keeps pending requests until their response arrives.
    pub pending_ttl_secs: u64,
}

impl Default for InterceptionConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            pending_ttl_secs: 0,
        }
    }
}

impl InterceptionConfig {
    /// The eviction TTL, if one is configured.
    pub fn pending_ttl(&self) -> Option<Duration> {
        match self.pending_ttl_secs {
            0 => None,
            secs => Some(Duration::from_secs(secs)),
        }
    }
}

/// Script engine configuration.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct ScriptConfig {
    /// Reject handler source that reads undeclared variables.
    pub strict_variables: bool,
}
