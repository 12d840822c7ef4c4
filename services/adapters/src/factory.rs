//! # Adapter Factory
//!
//! ## Purpose
//!
//! Hands out adapters to route handlers and manages organization-scoped
//! rollout of the adapter layer.
//!
//! ## Gating
//!
//! The factory checks `<type>_adapter_enabled` before handing an adapter out;
//! the adapter checks its own flag again on every operation, so a flag flipped
//! between acquisition and use still takes effect. When the evaluator fails,
//! the factory follows its [`EvaluatorFailurePolicy`]; the adapter always
//! fails closed.
//!
//! ## Rollout
//!
//! ```text
//! migrate_organization_to_adapters(org, {employee: true, ..}, 10%)
//!     └─ configure_organization_adapters(org, {employee: 10%, recognition: off, social: off})
//!          ├─ enable_adapter_for_organization(employee, org, 10)
//!          ├─ disable_adapter_for_organization(recognition, org)
//!          └─ disable_adapter_for_organization(social, org)
//! ```

use engage_config::service::rollout::{FULL_ROLLOUT_PERCENTAGE, MIGRATION_ROLLOUT_PERCENTAGE};
use engage_config::{Environment, FactorySection};
use engage_health_check::{HealthLevel, HealthSource};
use engage_types::{AdapterContext, OrganizationId, UserId};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use tracing::{error, info, warn};

use crate::adapters::{EmployeeAdapter, RecognitionAdapter, SocialAdapter};
use crate::common::DomainAdapter;
use crate::error::{AdapterError, Result};
use crate::flags::{
    evaluate_within, FeatureFlagEvaluator, FlagContext, OrganizationFlagUpdate, RolloutStrategy,
};
use crate::health::HealthStatus;
use crate::latency_instrumentation::PerformanceMetrics;

/// The adapter kinds the registry holds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AdapterType {
    Employee,
    Recognition,
    Social,
}

impl AdapterType {
    pub const ALL: [AdapterType; 3] =
        [AdapterType::Employee, AdapterType::Recognition, AdapterType::Social];

    pub fn as_str(&self) -> &'static str {
        match self {
            AdapterType::Employee => "employee",
            AdapterType::Recognition => "recognition",
            AdapterType::Social => "social",
        }
    }

    /// `"<type>_adapter_enabled"`
    pub fn flag_key(&self) -> &'static str {
        match self {
            AdapterType::Employee => "employee_adapter_enabled",
            AdapterType::Recognition => "recognition_adapter_enabled",
            AdapterType::Social => "social_adapter_enabled",
        }
    }
}

impl fmt::Display for AdapterType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AdapterType {
    type Err = AdapterError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "employee" => Ok(AdapterType::Employee),
            "recognition" => Ok(AdapterType::Recognition),
            "social" => Ok(AdapterType::Social),
            other => Err(AdapterError::Validation(format!(
                "adapterType: unknown adapter type '{}'",
                other
            ))),
        }
    }
}

/// An adapter handed out by the factory
#[derive(Clone)]
pub enum AdapterHandle {
    Employee(Arc<EmployeeAdapter>),
    Recognition(Arc<RecognitionAdapter>),
    Social(Arc<SocialAdapter>),
}

impl AdapterHandle {
    pub fn adapter_type(&self) -> AdapterType {
        match self {
            AdapterHandle::Employee(_) => AdapterType::Employee,
            AdapterHandle::Recognition(_) => AdapterType::Recognition,
            AdapterHandle::Social(_) => AdapterType::Social,
        }
    }

    pub fn as_domain(&self) -> &dyn DomainAdapter {
        match self {
            AdapterHandle::Employee(a) => a.as_ref(),
            AdapterHandle::Recognition(a) => a.as_ref(),
            AdapterHandle::Social(a) => a.as_ref(),
        }
    }

    pub fn into_employee(self) -> Option<Arc<EmployeeAdapter>> {
        match self {
            AdapterHandle::Employee(a) => Some(a),
            _ => None,
        }
    }

    pub fn into_recognition(self) -> Option<Arc<RecognitionAdapter>> {
        match self {
            AdapterHandle::Recognition(a) => Some(a),
            _ => None,
        }
    }

    pub fn into_social(self) -> Option<Arc<SocialAdapter>> {
        match self {
            AdapterHandle::Social(a) => Some(a),
            _ => None,
        }
    }
}

impl fmt::Debug for AdapterHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("AdapterHandle")
            .field(&self.as_domain().base().name())
            .finish()
    }
}

/// Fixed set of adapter instances, built once at startup
pub struct AdapterRegistry {
    pub employee: Arc<EmployeeAdapter>,
    pub recognition: Arc<RecognitionAdapter>,
    pub social: Arc<SocialAdapter>,
}

impl AdapterRegistry {
    pub fn new(
        employee: EmployeeAdapter,
        recognition: RecognitionAdapter,
        social: SocialAdapter,
    ) -> Self {
        Self {
            employee: Arc::new(employee),
            recognition: Arc::new(recognition),
            social: Arc::new(social),
        }
    }

    pub fn get(&self, adapter_type: AdapterType) -> AdapterHandle {
        match adapter_type {
            AdapterType::Employee => AdapterHandle::Employee(Arc::clone(&self.employee)),
            AdapterType::Recognition => AdapterHandle::Recognition(Arc::clone(&self.recognition)),
            AdapterType::Social => AdapterHandle::Social(Arc::clone(&self.social)),
        }
    }

    fn domain(&self, adapter_type: AdapterType) -> &dyn DomainAdapter {
        match adapter_type {
            AdapterType::Employee => self.employee.as_ref(),
            AdapterType::Recognition => self.recognition.as_ref(),
            AdapterType::Social => self.social.as_ref(),
        }
    }
}

/// What a gate decides when the flag evaluator fails
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EvaluatorFailurePolicy {
    FailOpen,
    FailClosed,
}

impl EvaluatorFailurePolicy {
    /// Open in development, closed everywhere else
    pub fn for_environment(environment: Environment) -> Self {
        if environment.is_development() {
            EvaluatorFailurePolicy::FailOpen
        } else {
            EvaluatorFailurePolicy::FailClosed
        }
    }

    /// Explicit config override, else the environment default
    pub fn from_config(section: &FactorySection, environment: Environment) -> Self {
        match section.fail_open_on_evaluator_error {
            Some(true) => EvaluatorFailurePolicy::FailOpen,
            Some(false) => EvaluatorFailurePolicy::FailClosed,
            None => Self::for_environment(environment),
        }
    }

    fn on_failure(self) -> bool {
        matches!(self, EvaluatorFailurePolicy::FailOpen)
    }
}

/// Desired rollout of one adapter type for an organization
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdapterRollout {
    pub enabled: bool,
    pub rollout_percentage: Option<u8>,
}

impl AdapterRollout {
    pub fn enabled(rollout_percentage: u8) -> Self {
        Self {
            enabled: true,
            rollout_percentage: Some(rollout_percentage),
        }
    }

    pub fn disabled() -> Self {
        Self {
            enabled: false,
            rollout_percentage: None,
        }
    }
}

/// Rollout of all three adapter types for an organization
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrganizationAdapterConfig {
    pub employee: AdapterRollout,
    pub recognition: AdapterRollout,
    pub social: AdapterRollout,
}

impl OrganizationAdapterConfig {
    pub fn get(&self, adapter_type: AdapterType) -> AdapterRollout {
        match adapter_type {
            AdapterType::Employee => self.employee,
            AdapterType::Recognition => self.recognition,
            AdapterType::Social => self.social,
        }
    }
}

/// Which adapters an organization moves onto
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct MigrationStrategy {
    pub employee: bool,
    pub recognition: bool,
    pub social: bool,
}

/// Registry front door with per-type gating and org rollout
pub struct AdapterFactory {
    registry: AdapterRegistry,
    evaluator: Arc<dyn FeatureFlagEvaluator>,
    environment: Environment,
    failure_policy: EvaluatorFailurePolicy,
}

impl AdapterFactory {
    /// Factory with the environment's default failure policy
    pub fn new(
        registry: AdapterRegistry,
        evaluator: Arc<dyn FeatureFlagEvaluator>,
        environment: Environment,
    ) -> Self {
        Self {
            registry,
            evaluator,
            environment,
            failure_policy: EvaluatorFailurePolicy::for_environment(environment),
        }
    }

    pub fn with_failure_policy(mut self, policy: EvaluatorFailurePolicy) -> Self {
        self.failure_policy = policy;
        self
    }

    pub fn environment(&self) -> Environment {
        self.environment
    }

    pub fn failure_policy(&self) -> EvaluatorFailurePolicy {
        self.failure_policy
    }

    pub fn registry(&self) -> &AdapterRegistry {
        &self.registry
    }

    /// Evaluate `<type>_adapter_enabled` for this request
    pub async fn is_adapter_enabled(
        &self,
        adapter_type: AdapterType,
        ctx: &AdapterContext,
    ) -> bool {
        let flag = adapter_type.flag_key();
        let flag_ctx = FlagContext::from_adapter_context(ctx, self.environment);
        let handle = self.registry.get(adapter_type);
        let timeout = handle.as_domain().base().config().operation_timeout;

        match evaluate_within(self.evaluator.as_ref(), flag, &flag_ctx, timeout).await {
            Ok(evaluation) => evaluation.value,
            Err(e) => {
                let decision = self.failure_policy.on_failure();
                error!(
                    adapter_type = %adapter_type,
                    flag,
                    error = %e,
                    policy = ?self.failure_policy,
                    enabled = decision,
                    request_id = %ctx.request_id,
                    "Adapter flag evaluation failed"
                );
                decision
            }
        }
    }

    /// The adapter for `adapter_type`, or `None` when gated off
    pub async fn get_adapter(
        &self,
        adapter_type: AdapterType,
        ctx: &AdapterContext,
    ) -> Option<AdapterHandle> {
        if !self.is_adapter_enabled(adapter_type, ctx).await {
            info!(
                adapter_type = %adapter_type,
                user_id = ?ctx.user_id.map(|u| u.inner()),
                organization_id = ?ctx.organization_id.map(|o| o.inner()),
                request_id = %ctx.request_id,
                "Adapter disabled for request"
            );
            return None;
        }
        Some(self.registry.get(adapter_type))
    }

    /// String entry point; unknown names log an error and yield `None`
    pub async fn get_adapter_by_name(
        &self,
        name: &str,
        ctx: &AdapterContext,
    ) -> Option<AdapterHandle> {
        match name.parse::<AdapterType>() {
            Ok(adapter_type) => self.get_adapter(adapter_type, ctx).await,
            Err(_) => {
                error!(adapter_type = name, request_id = %ctx.request_id, "Unknown adapter type");
                None
            }
        }
    }

    pub async fn get_employee_adapter(&self, ctx: &AdapterContext) -> Option<Arc<EmployeeAdapter>> {
        self.get_adapter(AdapterType::Employee, ctx)
            .await
            .and_then(AdapterHandle::into_employee)
    }

    pub async fn get_recognition_adapter(
        &self,
        ctx: &AdapterContext,
    ) -> Option<Arc<RecognitionAdapter>> {
        self.get_adapter(AdapterType::Recognition, ctx)
            .await
            .and_then(AdapterHandle::into_recognition)
    }

    pub async fn get_social_adapter(&self, ctx: &AdapterContext) -> Option<Arc<SocialAdapter>> {
        self.get_adapter(AdapterType::Social, ctx)
            .await
            .and_then(AdapterHandle::into_social)
    }

    /// Health of every registered adapter
    pub fn get_all_adapter_health(&self) -> BTreeMap<AdapterType, HealthStatus> {
        AdapterType::ALL
            .iter()
            .map(|t| (*t, self.registry.domain(*t).get_health_status()))
            .collect()
    }

    pub fn get_adapter_metrics(&self, adapter_type: AdapterType) -> PerformanceMetrics {
        self.registry.domain(adapter_type).get_performance_metrics()
    }

    /// `None` for an unknown adapter type name
    pub fn get_adapter_metrics_by_name(&self, name: &str) -> Option<PerformanceMetrics> {
        match name.parse::<AdapterType>() {
            Ok(adapter_type) => Some(self.get_adapter_metrics(adapter_type)),
            Err(_) => {
                warn!(adapter_type = name, "Metrics requested for unknown adapter type");
                None
            }
        }
    }

    /// Enable an adapter for an organization at a rollout percentage (default 100)
    pub async fn enable_adapter_for_organization(
        &self,
        adapter_type: AdapterType,
        organization_id: OrganizationId,
        rollout_percentage: Option<u8>,
        enabled_by: Option<UserId>,
    ) -> Result<()> {
        let rollout_percentage = rollout_percentage.unwrap_or(FULL_ROLLOUT_PERCENTAGE);
        self.write_organization_flag(
            adapter_type,
            organization_id,
            true,
            rollout_percentage,
            enabled_by,
        )
        .await?;
        info!(
            adapter_type = %adapter_type,
            organization_id = %organization_id,
            rollout_percentage,
            enabled_by = ?enabled_by.map(|u| u.inner()),
            "Adapter enabled for organization"
        );
        Ok(())
    }

    pub async fn disable_adapter_for_organization(
        &self,
        adapter_type: AdapterType,
        organization_id: OrganizationId,
        disabled_by: Option<UserId>,
    ) -> Result<()> {
        self.write_organization_flag(adapter_type, organization_id, false, 0, disabled_by).await?;
        info!(
            adapter_type = %adapter_type,
            organization_id = %organization_id,
            disabled_by = ?disabled_by.map(|u| u.inner()),
            "Adapter disabled for organization"
        );
        Ok(())
    }

    /// Apply a rollout to all three adapter types concurrently
    pub async fn configure_organization_adapters(
        &self,
        organization_id: OrganizationId,
        config: OrganizationAdapterConfig,
        configured_by: Option<UserId>,
    ) -> Result<()> {
        let by = configured_by;
        tokio::try_join!(
            self.apply_rollout(AdapterType::Employee, organization_id, config.employee, by),
            self.apply_rollout(AdapterType::Recognition, organization_id, config.recognition, by),
            self.apply_rollout(AdapterType::Social, organization_id, config.social, by),
        )?;

        info!(
            organization_id = %organization_id,
            config = ?config,
            configured_by = ?configured_by.map(|u| u.inner()),
            "Organization adapters configured"
        );
        Ok(())
    }

    /// Move an organization onto the chosen adapters at a conservative
    /// starting percentage (default 10)
    pub async fn migrate_organization_to_adapters(
        &self,
        organization_id: OrganizationId,
        strategy: MigrationStrategy,
        rollout_percentage: Option<u8>,
        migrated_by: Option<UserId>,
    ) -> Result<()> {
        let rollout_percentage = rollout_percentage.unwrap_or(MIGRATION_ROLLOUT_PERCENTAGE);
        let rollout = |selected: bool| {
            if selected {
                AdapterRollout::enabled(rollout_percentage)
            } else {
                AdapterRollout::disabled()
            }
        };
        let config = OrganizationAdapterConfig {
            employee: rollout(strategy.employee),
            recognition: rollout(strategy.recognition),
            social: rollout(strategy.social),
        };

        info!(
            organization_id = %organization_id,
            strategy = ?strategy,
            rollout_percentage,
            "Migrating organization to adapters"
        );
        self.configure_organization_adapters(organization_id, config, migrated_by).await
    }

    async fn apply_rollout(
        &self,
        adapter_type: AdapterType,
        organization_id: OrganizationId,
        rollout: AdapterRollout,
        by: Option<UserId>,
    ) -> Result<()> {
        if rollout.enabled {
            let percentage = rollout.rollout_percentage;
            self.enable_adapter_for_organization(adapter_type, organization_id, percentage, by)
                .await
        } else {
            self.disable_adapter_for_organization(adapter_type, organization_id, by).await
        }
    }

    async fn write_organization_flag(
        &self,
        adapter_type: AdapterType,
        organization_id: OrganizationId,
        is_enabled: bool,
        rollout_percentage: u8,
        by: Option<UserId>,
    ) -> Result<()> {
        let update = OrganizationFlagUpdate {
            is_enabled,
            rollout_percentage,
            rollout_strategy: RolloutStrategy::Percentage,
            environment: self.environment,
            enabled_by: by,
        };
        self.evaluator
            .set_organization_flag(adapter_type.flag_key(), organization_id, update)
            .await
            .map_err(|e| {
                error!(
                    adapter_type = %adapter_type,
                    organization_id = %organization_id,
                    error = %e,
                    "Organization flag update failed"
                );
                AdapterError::FeatureFlag(e.to_string())
            })
    }
}

impl HealthSource for AdapterFactory {
    fn service_name(&self) -> &str {
        "adapter_service"
    }

    fn overall_level(&self) -> HealthLevel {
        HealthLevel::worst(self.get_all_adapter_health().values().map(|h| h.status))
    }

    fn component_health(&self) -> Value {
        serde_json::to_value(self.get_all_adapter_health()).unwrap_or(Value::Null)
    }

    fn component_metrics(&self, component: &str) -> Option<Value> {
        self.get_adapter_metrics_by_name(component)
            .and_then(|metrics| serde_json::to_value(metrics).ok())
    }
}
