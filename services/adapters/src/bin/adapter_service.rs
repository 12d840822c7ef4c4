//! Adapter service - builds the adapter registry and serves health endpoints
//!
//! Usage: cargo run --bin adapter_service -- --config config/engage.toml --environment staging

use adapter_service::adapters::{
    EmployeeAdapter, InMemoryEmployeeStore, InMemoryRecognitionStore, InMemorySocialStore,
    RecognitionAdapter, SocialAdapter,
};
use adapter_service::config::AdapterConfig;
use adapter_service::factory::{
    AdapterFactory, AdapterRegistry, AdapterType, EvaluatorFailurePolicy,
};
use adapter_service::flags::{FeatureFlagEvaluator, InMemoryFlagEvaluator};
use anyhow::{Context, Result};
use clap::Parser;
use engage_config::{Environment, LogFormat, ServiceConfig};
use engage_health_check::HealthCheckServer;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[clap(name = "adapter_service")]
struct Args {
    /// Base configuration file
    #[clap(long, default_value = engage_config::DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    /// Deployment environment; overrides the value in the config file
    #[clap(long)]
    environment: Option<Environment>,
}

fn init_tracing(config: &ServiceConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.service.log_level));

    match config.service.log_format {
        LogFormat::Pretty => tracing_subscriber::fmt().with_env_filter(filter).init(),
        LogFormat::Json => tracing_subscriber::fmt().json().with_env_filter(filter).init(),
    }
}

fn build_factory(config: &ServiceConfig) -> Result<AdapterFactory> {
    let environment = config.service.environment;
    let evaluator: Arc<dyn FeatureFlagEvaluator> = Arc::new(InMemoryFlagEvaluator::with_defaults(
        config.flags.iter().map(|(key, value)| (key.clone(), *value)),
    ));

    let employee = EmployeeAdapter::with_config(
        AdapterConfig::from_settings(
            EmployeeAdapter::NAME,
            &config.adapters.employee,
            AdapterType::Employee.flag_key(),
        )?,
        Arc::new(InMemoryEmployeeStore::new()),
        Arc::clone(&evaluator),
        environment,
    );
    let recognition = RecognitionAdapter::with_config(
        AdapterConfig::from_settings(
            RecognitionAdapter::NAME,
            &config.adapters.recognition,
            AdapterType::Recognition.flag_key(),
        )?,
        Arc::new(InMemoryRecognitionStore::new()),
        Arc::clone(&evaluator),
        environment,
    );
    let social = SocialAdapter::with_config(
        AdapterConfig::from_settings(
            SocialAdapter::NAME,
            &config.adapters.social,
            AdapterType::Social.flag_key(),
        )?,
        Arc::new(InMemorySocialStore::new()),
        Arc::clone(&evaluator),
        environment,
    );

    let registry = AdapterRegistry::new(employee, recognition, social);
    let policy = EvaluatorFailurePolicy::from_config(&config.factory, environment);
    Ok(AdapterFactory::new(registry, evaluator, environment).with_failure_policy(policy))
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let config = ServiceConfig::load(Some(&args.config), args.environment)
        .context("Failed to load configuration")?;
    init_tracing(&config);

    info!("Starting adapter service");
    info!("   Config: {}", args.config.display());
    info!("   Environment: {}", config.service.environment);
    info!("   Seeded flags: {}", config.flags.len());

    let factory = Arc::new(build_factory(&config).context("Failed to build adapters")?);
    info!("   Evaluator failure policy: {:?}", factory.failure_policy());

    let addr: SocketAddr = format!("{}:{}", config.health.bind_address, config.health.port)
        .parse()
        .context("Invalid health bind address")?;

    let server = HealthCheckServer::new(factory, addr);
    server
        .serve_until(async {
            if tokio::signal::ctrl_c().await.is_ok() {
                info!("Received Ctrl+C, shutting down...");
            }
        })
        .await?;

    info!("Adapter service stopped");
    Ok(())
}
