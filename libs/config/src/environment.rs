//! Deployment environment
//!
//! Feature flags are evaluated per environment, and the adapter factory
//! derives its evaluator-failure policy from it.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Environment variable consulted by [`Environment::from_env`]
pub const ENVIRONMENT_VAR: &str = "ENGAGE_ENV";

/// Deployment environment the service runs in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    #[default]
    Development,
    Test,
    Staging,
    Production,
}

/// Unrecognized environment name
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("unknown environment '{0}' (expected development, test, staging or production)")]
pub struct UnknownEnvironment(pub String);

impl Environment {
    /// Read [`ENVIRONMENT_VAR`], falling back to `Development` when unset or invalid
    pub fn from_env() -> Self {
        match std::env::var(ENVIRONMENT_VAR) {
            Ok(raw) => raw.parse().unwrap_or_else(|e: UnknownEnvironment| {
                tracing::warn!("{}, defaulting to development", e);
                Environment::Development
            }),
            Err(_) => Environment::Development,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Environment::Development => "development",
            Environment::Test => "test",
            Environment::Staging => "staging",
            Environment::Production => "production",
        }
    }

    pub fn is_development(&self) -> bool {
        matches!(self, Environment::Development)
    }

    pub fn is_production(&self) -> bool {
        matches!(self, Environment::Production)
    }
}

impl FromStr for Environment {
    type Err = UnknownEnvironment;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "development" | "dev" | "local" => Ok(Environment::Development),
            "test" => Ok(Environment::Test),
            "staging" | "stage" => Ok(Environment::Staging),
            "production" | "prod" => Ok(Environment::Production),
            _ => Err(UnknownEnvironment(s.to_string())),
        }
    }
}

impl fmt::Display for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
