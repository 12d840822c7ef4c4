//! Error types for the adapters module

use engage_types::ErrorInfo;
use serde_json::{json, Value};
use thiserror::Error;

/// Result type alias for adapter operations
pub type Result<T> = std::result::Result<T, AdapterError>;

/// Main error type for adapter operations
#[derive(Debug, Error)]
pub enum AdapterError {
    /// Input or output failed schema validation
    #[error("Validation failed: {0}")]
    Validation(String),

    /// Adapter gated off by its feature flag
    #[error("Adapter {adapter} is disabled via feature flag")]
    Disabled {
        /// Adapter name
        adapter: String,
    },

    /// Requested row does not exist
    #[error("{entity} {id} not found")]
    NotFound {
        /// Entity kind, e.g. "Employee"
        entity: &'static str,
        /// Raw id that was looked up
        id: u64,
    },

    /// Caller may not perform the action on this row
    #[error("Not allowed to {action}")]
    Forbidden {
        /// What was attempted, e.g. "delete post 4"
        action: String,
    },

    /// Wrapped operation exceeded the configured timeout
    #[error("Operation {operation} timed out after {timeout_ms}ms")]
    Timeout {
        /// Operation id
        operation: String,
        /// Configured timeout
        timeout_ms: u64,
    },

    /// Per-operation rate limit exhausted
    #[error("Rate limit exceeded for {operation}")]
    RateLimited {
        /// Operation id
        operation: String,
    },

    /// Administrative feature-flag write failed
    #[error("Feature flag update failed: {0}")]
    FeatureFlag(String),

    /// Adapter configuration rejected
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Wrapped operation panicked
    #[error("Operation panicked: {0}")]
    Panicked(String),

    /// Data collaborator failure
    #[error(transparent)]
    Store(#[from] anyhow::Error),
}

impl AdapterError {
    /// Stable code carried in the result envelope
    pub fn code(&self) -> &'static str {
        match self {
            AdapterError::Validation(_) => "VALIDATION_ERROR",
            AdapterError::Disabled { .. } => "ADAPTER_DISABLED",
            AdapterError::NotFound { .. } => "NOT_FOUND",
            AdapterError::Forbidden { .. } => "FORBIDDEN",
            AdapterError::Timeout { .. } => "TIMEOUT",
            AdapterError::RateLimited { .. } => "RATE_LIMITED",
            AdapterError::FeatureFlag(_) => "FEATURE_FLAG_ERROR",
            AdapterError::Configuration(_) => "CONFIGURATION_ERROR",
            AdapterError::Panicked(_) | AdapterError::Store(_) => "ADAPTER_ERROR",
        }
    }

    /// Check if a caller may reasonably retry the operation
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            AdapterError::Timeout { .. } | AdapterError::RateLimited { .. } | AdapterError::Store(_)
        )
    }

    /// Check if this error comes from gating rather than from the operation
    pub fn is_disabled(&self) -> bool {
        matches!(self, AdapterError::Disabled { .. })
    }

    /// Check if a configured fallback may answer in place of this error
    ///
    /// Caller errors (bad input, missing rows, denied actions and exhausted
    /// rate limits) always reach the caller unchanged.
    pub fn allows_fallback(&self) -> bool {
        matches!(
            self,
            AdapterError::Disabled { .. }
                | AdapterError::Timeout { .. }
                | AdapterError::FeatureFlag(_)
                | AdapterError::Configuration(_)
                | AdapterError::Panicked(_)
                | AdapterError::Store(_)
        )
    }

    /// Build the envelope error, enriched with where it happened
    pub fn to_error_info(&self, operation: &str, adapter: &str, version: &str) -> ErrorInfo {
        let mut details = json!({
            "operation": operation,
            "adapter": adapter,
            "version": version,
        });

        if let Value::Object(map) = &mut details {
            match self {
                AdapterError::NotFound { entity, id } => {
                    map.insert("entity".to_string(), json!(entity));
                    map.insert("id".to_string(), json!(id));
                }
                AdapterError::Timeout { timeout_ms, .. } => {
                    map.insert("timeoutMs".to_string(), json!(timeout_ms));
                }
                AdapterError::Store(err) => {
                    let chain: Vec<String> = err.chain().skip(1).map(|c| c.to_string()).collect();
                    if !chain.is_empty() {
                        map.insert("causes".to_string(), json!(chain));
                    }
                }
                _ => {}
            }
        }

        ErrorInfo::new(self.code(), self.to_string()).with_details(details)
    }
}

impl From<engage_types::ValidationError> for AdapterError {
    fn from(err: engage_types::ValidationError) -> Self {
        AdapterError::Validation(err.to_string())
    }
}
