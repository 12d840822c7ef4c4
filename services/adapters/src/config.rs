//! Configuration module for adapters
//!
//! [`AdapterConfig`] is the resolved, read-only configuration of one adapter
//! instance. Every optional setting is defaulted exactly once, when the config
//! is built; the adapter never consults defaults afterwards.

use engage_config::service::adapters;
use engage_config::AdapterSettings;
use serde::Serialize;
use std::time::Duration;

use crate::error::{AdapterError, Result};

/// Resolved configuration of a single adapter
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AdapterConfig {
    /// Adapter name used in operation ids, logs and errors
    pub adapter_name: String,

    /// Version reported in result metadata
    pub version: String,

    /// Flag gating every operation; `None` means always enabled
    pub feature_flag: Option<String>,

    /// Reserved for response caching; results always report `cacheHit=false`
    pub cache_enabled: bool,
    pub cache_ttl: Duration,

    /// Whether an operation's fallback hook may run after a failure
    pub fallback_enabled: bool,
    pub fallback_adapter: Option<String>,

    pub rate_limit_enabled: bool,
    pub rate_limit_max: u32,
    pub rate_limit_window: Duration,

    /// Upper bound on a single wrapped operation
    pub operation_timeout: Duration,
}

impl AdapterConfig {
    /// Config with every optional field at its default
    pub fn new(adapter_name: impl Into<String>) -> Self {
        Self {
            adapter_name: adapter_name.into(),
            version: adapters::DEFAULT_VERSION.to_string(),
            feature_flag: None,
            cache_enabled: adapters::CACHE_ENABLED,
            cache_ttl: Duration::from_secs(adapters::CACHE_TTL_SECS),
            fallback_enabled: adapters::FALLBACK_ENABLED,
            fallback_adapter: None,
            rate_limit_enabled: adapters::RATE_LIMIT_ENABLED,
            rate_limit_max: adapters::RATE_LIMIT_MAX,
            rate_limit_window: Duration::from_millis(adapters::RATE_LIMIT_WINDOW_MS),
            operation_timeout: Duration::from_millis(adapters::OPERATION_TIMEOUT_MS),
        }
    }

    /// Resolve a config-file section
    ///
    /// An unset `feature_flag` takes `default_flag`; an empty string turns
    /// gating off.
    pub fn from_settings(
        adapter_name: impl Into<String>,
        settings: &AdapterSettings,
        default_flag: &str,
    ) -> Result<Self> {
        let adapter_name = adapter_name.into();
        settings
            .validate(&adapter_name)
            .map_err(|e| AdapterError::Configuration(e.to_string()))?;

        let feature_flag = match settings.feature_flag.as_deref() {
            None => Some(default_flag.to_string()),
            Some("") => None,
            Some(flag) => Some(flag.to_string()),
        };

        Ok(Self {
            version: settings
                .version
                .clone()
                .unwrap_or_else(|| adapters::DEFAULT_VERSION.to_string()),
            feature_flag,
            cache_enabled: settings.cache_enabled,
            cache_ttl: Duration::from_secs(settings.cache_ttl_secs),
            fallback_enabled: settings.fallback_enabled,
            fallback_adapter: settings.fallback_adapter.clone(),
            rate_limit_enabled: settings.rate_limit_enabled,
            rate_limit_max: settings.rate_limit_max,
            rate_limit_window: Duration::from_millis(settings.rate_limit_window_ms),
            operation_timeout: Duration::from_millis(settings.operation_timeout_ms),
            adapter_name,
        })
    }

    pub fn with_feature_flag(mut self, flag: impl Into<String>) -> Self {
        self.feature_flag = Some(flag.into());
        self
    }

    pub fn without_feature_flag(mut self) -> Self {
        self.feature_flag = None;
        self
    }

    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.version = version.into();
        self
    }

    /// Enable the fallback hook, naming where fallback data comes from
    pub fn with_fallback(mut self, fallback_adapter: impl Into<String>) -> Self {
        self.fallback_enabled = true;
        self.fallback_adapter = Some(fallback_adapter.into());
        self
    }

    pub fn with_rate_limit(mut self, max: u32, window: Duration) -> Self {
        self.rate_limit_enabled = true;
        self.rate_limit_max = max;
        self.rate_limit_window = window;
        self
    }

    pub fn with_operation_timeout(mut self, timeout: Duration) -> Self {
        self.operation_timeout = timeout;
        self
    }

    /// Fallback runs only when enabled and a target is named
    pub fn fallback_configured(&self) -> bool {
        self.fallback_enabled && self.fallback_adapter.is_some()
    }
}
