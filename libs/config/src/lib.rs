//! # Engage Centralized Configuration
//!
//! Configuration management and shared defaults for Engage services.
//!
//! ## Features
//!
//! - **Environment**: deployment environment used for flag evaluation
//! - **Service Configuration**: TOML + environment-variable loading of adapter,
//!   factory, health and flag settings
//! - **Defaults**: the single source of every default value
//!
//! ## Usage
//!
//! ```rust,no_run
//! use engage_config::{load_config, Environment};
//!
//! let config = load_config(Some(Environment::Staging))?;
//! println!("health port: {}", config.health.port);
//! # Ok::<(), anyhow::Error>(())
//! ```

pub mod environment;
pub mod service;
pub mod service_config;

pub use environment::{Environment, UnknownEnvironment, ENVIRONMENT_VAR};
pub use service_config::{
    load_config, AdapterSections, AdapterSettings, FactorySection, HealthSection, LogFormat,
    ServiceConfig, ServiceSection, DEFAULT_CONFIG_PATH,
};
