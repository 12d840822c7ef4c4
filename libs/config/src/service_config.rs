//! Service Configuration Module
//!
//! Loads the adapter service configuration from TOML with environment-specific
//! overrides and `ENGAGE_`-prefixed environment variables
//! (`ENGAGE_HEALTH__PORT=9000`, `ENGAGE_ADAPTERS__SOCIAL__RATE_LIMIT_MAX=20`).

use anyhow::{bail, Context, Result};
use config_crate::{Config, Environment as EnvSource, File, FileFormat};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use crate::environment::Environment;
use crate::service::{adapters, health};

/// Default location of the base configuration file
pub const DEFAULT_CONFIG_PATH: &str = "config/engage.toml";

/// Main service configuration structure
#[derive(Debug, Deserialize, Serialize, Clone, Default)]
#[serde(default)]
pub struct ServiceConfig {
    /// Process-wide settings
    pub service: ServiceSection,

    /// Observability endpoint
    pub health: HealthSection,

    /// Adapter factory gating
    pub factory: FactorySection,

    /// Per-adapter execution settings
    pub adapters: AdapterSections,

    /// Initial values for the in-process flag evaluator
    pub flags: HashMap<String, bool>,
}

/// Process-wide settings
#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(default)]
pub struct ServiceSection {
    pub environment: Environment,
    pub log_level: String,
    pub log_format: LogFormat,
}

/// Log output format
#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

impl Default for ServiceSection {
    fn default() -> Self {
        Self {
            environment: Environment::Development,
            log_level: "info".to_string(),
            log_format: LogFormat::Pretty,
        }
    }
}

/// Health endpoint settings
#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(default)]
pub struct HealthSection {
    pub bind_address: String,
    pub port: u16,
}

impl Default for HealthSection {
    fn default() -> Self {
        Self {
            bind_address: health::BIND_ADDRESS.to_string(),
            port: health::PORT,
        }
    }
}

/// Adapter factory settings
#[derive(Debug, Deserialize, Serialize, Clone, Default)]
#[serde(default)]
pub struct FactorySection {
    /// Hand out adapters when the flag evaluator fails. Unset means
    /// "fail open in development only".
    pub fail_open_on_evaluator_error: Option<bool>,
}

/// Settings for the three adapters
#[derive(Debug, Deserialize, Serialize, Clone, Default)]
#[serde(default)]
pub struct AdapterSections {
    pub employee: AdapterSettings,
    pub recognition: AdapterSettings,
    pub social: AdapterSettings,
}

/// Execution settings for one adapter
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
#[serde(default)]
pub struct AdapterSettings {
    /// Flag gating the adapter. Unset uses `<type>_adapter_enabled`; an empty
    /// string disables gating.
    pub feature_flag: Option<String>,
    pub version: Option<String>,
    pub cache_enabled: bool,
    pub cache_ttl_secs: u64,
    pub fallback_enabled: bool,
    pub fallback_adapter: Option<String>,
    pub rate_limit_enabled: bool,
    pub rate_limit_max: u32,
    pub rate_limit_window_ms: u64,
    pub operation_timeout_ms: u64,
}

impl Default for AdapterSettings {
    fn default() -> Self {
        Self {
            feature_flag: None,
            version: None,
            cache_enabled: adapters::CACHE_ENABLED,
            cache_ttl_secs: adapters::CACHE_TTL_SECS,
            fallback_enabled: adapters::FALLBACK_ENABLED,
            fallback_adapter: None,
            rate_limit_enabled: adapters::RATE_LIMIT_ENABLED,
            rate_limit_max: adapters::RATE_LIMIT_MAX,
            rate_limit_window_ms: adapters::RATE_LIMIT_WINDOW_MS,
            operation_timeout_ms: adapters::OPERATION_TIMEOUT_MS,
        }
    }
}

impl AdapterSettings {
    /// Validate a single adapter section
    pub fn validate(&self, name: &str) -> Result<()> {
        if self.rate_limit_enabled && self.rate_limit_max == 0 {
            bail!("adapters.{}.rate_limit_max must be greater than 0", name);
        }
        if self.rate_limit_enabled && self.rate_limit_window_ms == 0 {
            bail!("adapters.{}.rate_limit_window_ms must be greater than 0", name);
        }
        if self.operation_timeout_ms == 0 {
            bail!("adapters.{}.operation_timeout_ms must be greater than 0", name);
        }
        if self.fallback_enabled && self.fallback_adapter.is_none() {
            warn!(
                "adapters.{} has fallback_enabled without fallback_adapter; fallback will not run",
                name
            );
        }
        Ok(())
    }
}

impl ServiceConfig {
    /// Load configuration from files with environment overrides
    ///
    /// Sources, lowest precedence first: `base_path` (default
    /// [`DEFAULT_CONFIG_PATH`], optional), `environments/<env>.toml` next to
    /// it (optional), then `ENGAGE_` environment variables.
    pub fn load(base_path: Option<&Path>, environment: Option<Environment>) -> Result<Self> {
        let base = base_path.unwrap_or(Path::new(DEFAULT_CONFIG_PATH));

        let mut builder = Config::builder().add_source(File::from(base).required(false));

        if let Some(env) = environment {
            let env_file = Self::environment_file(base, env);

            if env_file.exists() {
                info!("Loading environment config: {:?}", env_file);
                builder = builder.add_source(File::from(env_file));
            } else {
                debug!("Environment config not found: {:?}", env_file);
            }
        }

        builder = builder.add_source(
            EnvSource::with_prefix("ENGAGE")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

        let config = builder.build().context("Failed to build configuration")?;

        let mut loaded: ServiceConfig = config
            .try_deserialize()
            .context("Failed to deserialize configuration")?;

        // An explicit environment argument wins over the file
        if let Some(env) = environment {
            loaded.service.environment = env;
        }

        loaded.validate()?;
        Ok(loaded)
    }

    /// Parse configuration from a TOML string (no file or env sources)
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config = Config::builder()
            .add_source(File::from_str(content, FileFormat::Toml))
            .build()
            .context("Failed to build configuration")?;

        let loaded: ServiceConfig = config
            .try_deserialize()
            .context("Failed to deserialize configuration")?;
        loaded.validate()?;
        Ok(loaded)
    }

    /// Validate all sections
    pub fn validate(&self) -> Result<()> {
        if self.health.port == 0 {
            bail!("health.port must be greater than 0");
        }
        self.adapters.employee.validate("employee")?;
        self.adapters.recognition.validate("recognition")?;
        self.adapters.social.validate("social")?;
        Ok(())
    }

    /// Render the effective configuration as TOML
    pub fn to_toml_string(&self) -> Result<String> {
        toml::to_string_pretty(self).context("Failed to serialize configuration")
    }

    /// Resolve the path of an environment override file for `base`
    pub fn environment_file(base: &Path, environment: Environment) -> PathBuf {
        base.parent()
            .unwrap_or(Path::new("."))
            .join("environments")
            .join(format!("{}.toml", environment))
    }
}

/// Convenience function to load configuration with defaults
pub fn load_config(environment: Option<Environment>) -> Result<ServiceConfig> {
    ServiceConfig::load(None, environment)
}
