//! # Feature Flags
//!
//! The evaluator trait every gate in this crate goes through, plus an
//! in-process implementation used by the service binary and tests.
//!
//! ## Evaluation order ([`InMemoryFlagEvaluator`])
//!
//! 1. Organization override for the caller's organization and environment:
//!    disabled ⇒ `false`; enabled ⇒ percentage rollout bucket.
//! 2. Global default set with [`InMemoryFlagEvaluator::set_default`].
//! 3. `false`.
//!
//! The rollout bucket is `crc32("<flag>:<subject>") % 100`, where the subject
//! is the user id when present and the organization id otherwise, so a given
//! user lands on the same side of a rollout on every request.

use async_trait::async_trait;
use dashmap::DashMap;
use engage_config::Environment;
use engage_types::{AdapterContext, OrganizationId, UserId};
use futures::FutureExt;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::panic::AssertUnwindSafe;
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

use crate::common::panic_message;

/// Inputs to a flag evaluation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FlagContext {
    pub user_id: Option<UserId>,
    pub organization_id: Option<OrganizationId>,
    pub environment: Environment,
}

impl FlagContext {
    pub fn from_adapter_context(ctx: &AdapterContext, environment: Environment) -> Self {
        Self {
            user_id: ctx.user_id,
            organization_id: ctx.organization_id,
            environment,
        }
    }
}

/// Why an evaluation came out the way it did
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EvaluationReason {
    /// Organization override disabled the flag
    OrganizationDisabled,
    /// Organization override with rollout; subject fell inside / outside it
    Rollout,
    /// Global default
    Default,
    /// Flag unknown to the evaluator
    NotConfigured,
}

/// Outcome of a flag evaluation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FlagEvaluation {
    pub value: bool,
    pub reason: EvaluationReason,
    pub rollout_percentage: Option<u8>,
}

/// Rollout strategy attached to an organization override
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RolloutStrategy {
    #[default]
    Percentage,
}

impl fmt::Display for RolloutStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RolloutStrategy::Percentage => f.write_str("percentage"),
        }
    }
}

/// Organization-scoped flag write
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrganizationFlagUpdate {
    pub is_enabled: bool,
    pub rollout_percentage: u8,
    pub rollout_strategy: RolloutStrategy,
    pub environment: Environment,
    pub enabled_by: Option<UserId>,
}

/// Flag evaluator failures
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum FlagError {
    /// Backing service could not be reached
    #[error("Feature flag service unavailable: {0}")]
    Unavailable(String),

    /// Rollout percentage outside 0..=100
    #[error("Invalid rollout percentage {0}; must be between 0 and 100")]
    InvalidRollout(u8),

    /// Evaluation did not finish within the caller's budget
    #[error("Feature flag evaluation timed out after {timeout_ms}ms")]
    TimedOut { timeout_ms: u64 },

    /// Evaluator panicked
    #[error("Feature flag evaluator panicked: {0}")]
    Panicked(String),
}

/// Feature-flag evaluator collaborator
///
/// Called on every adapter operation, so implementations should be cheap or
/// cache internally.
#[async_trait]
pub trait FeatureFlagEvaluator: Send + Sync {
    /// Evaluate `flag_key` for the given user / organization / environment
    async fn evaluate_flag(
        &self,
        flag_key: &str,
        ctx: &FlagContext,
    ) -> Result<FlagEvaluation, FlagError>;

    /// Write an organization-scoped override
    async fn set_organization_flag(
        &self,
        flag_key: &str,
        organization_id: OrganizationId,
        update: OrganizationFlagUpdate,
    ) -> Result<(), FlagError>;
}

/// Evaluate `flag_key` within `timeout`
///
/// A hung evaluator resolves to [`FlagError::TimedOut`] and a panicking one
/// to [`FlagError::Panicked`], so callers only ever see a `Result`.
pub async fn evaluate_within(
    evaluator: &dyn FeatureFlagEvaluator,
    flag_key: &str,
    ctx: &FlagContext,
    timeout: Duration,
) -> Result<FlagEvaluation, FlagError> {
    let evaluation = AssertUnwindSafe(evaluator.evaluate_flag(flag_key, ctx)).catch_unwind();
    match tokio::time::timeout(timeout, evaluation).await {
        Ok(Ok(result)) => result,
        Ok(Err(payload)) => Err(FlagError::Panicked(panic_message(payload.as_ref()))),
        Err(_) => Err(FlagError::TimedOut {
            timeout_ms: u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX),
        }),
    }
}

/// Rollout bucket in `0..100` for a flag and subject
pub fn rollout_bucket(flag_key: &str, subject: u64) -> u8 {
    let mut hasher = crc32fast::Hasher::new();
    hasher.update(flag_key.as_bytes());
    hasher.update(b":");
    hasher.update(subject.to_string().as_bytes());
    (hasher.finalize() % 100) as u8
}

#[derive(Debug, Clone, Copy)]
struct OrganizationOverride {
    is_enabled: bool,
    rollout_percentage: u8,
}

/// Process-local evaluator backed by concurrent maps
#[derive(Debug, Default)]
pub struct InMemoryFlagEvaluator {
    defaults: DashMap<String, bool>,
    overrides: DashMap<(String, OrganizationId, Environment), OrganizationOverride>,
}

impl InMemoryFlagEvaluator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed from `(flag, enabled)` pairs, e.g. the `[flags]` config table
    pub fn with_defaults<I, K>(flags: I) -> Self
    where
        I: IntoIterator<Item = (K, bool)>,
        K: Into<String>,
    {
        let evaluator = Self::new();
        for (key, value) in flags {
            evaluator.set_default(key, value);
        }
        evaluator
    }

    /// Set the global value of a flag
    pub fn set_default(&self, flag_key: impl Into<String>, value: bool) {
        self.defaults.insert(flag_key.into(), value);
    }

    /// Number of organization overrides currently stored
    pub fn override_count(&self) -> usize {
        self.overrides.len()
    }
}

#[async_trait]
impl FeatureFlagEvaluator for InMemoryFlagEvaluator {
    async fn evaluate_flag(
        &self,
        flag_key: &str,
        ctx: &FlagContext,
    ) -> Result<FlagEvaluation, FlagError> {
        if let Some(org) = ctx.organization_id {
            let key = (flag_key.to_string(), org, ctx.environment);
            if let Some(entry) = self.overrides.get(&key) {
                let ov = *entry.value();
                if !ov.is_enabled {
                    return Ok(FlagEvaluation {
                        value: false,
                        reason: EvaluationReason::OrganizationDisabled,
                        rollout_percentage: Some(ov.rollout_percentage),
                    });
                }
                let subject = ctx.user_id.map(|u| u.inner()).unwrap_or_else(|| org.inner());
                let bucket = rollout_bucket(flag_key, subject);
                let value = bucket < ov.rollout_percentage;
                debug!(
                    flag = flag_key,
                    organization_id = %org,
                    bucket,
                    rollout = ov.rollout_percentage,
                    value,
                    "Evaluated organization rollout"
                );
                return Ok(FlagEvaluation {
                    value,
                    reason: EvaluationReason::Rollout,
                    rollout_percentage: Some(ov.rollout_percentage),
                });
            }
        }

        Ok(match self.defaults.get(flag_key) {
            Some(value) => FlagEvaluation {
                value: *value,
                reason: EvaluationReason::Default,
                rollout_percentage: None,
            },
            None => FlagEvaluation {
                value: false,
                reason: EvaluationReason::NotConfigured,
                rollout_percentage: None,
            },
        })
    }

    async fn set_organization_flag(
        &self,
        flag_key: &str,
        organization_id: OrganizationId,
        update: OrganizationFlagUpdate,
    ) -> Result<(), FlagError> {
        if update.rollout_percentage > 100 {
            return Err(FlagError::InvalidRollout(update.rollout_percentage));
        }
        self.overrides.insert(
            (flag_key.to_string(), organization_id, update.environment),
            OrganizationOverride {
                is_enabled: update.is_enabled,
                rollout_percentage: update.rollout_percentage,
            },
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{HangingEvaluator, PanickingEvaluator};

    fn ctx(user: Option<u64>, org: Option<u64>) -> FlagContext {
        FlagContext {
            user_id: user.map(UserId::new),
            organization_id: org.map(OrganizationId::new),
            environment: Environment::Test,
        }
    }

    fn update(is_enabled: bool, rollout_percentage: u8) -> OrganizationFlagUpdate {
        OrganizationFlagUpdate {
            is_enabled,
            rollout_percentage,
            rollout_strategy: RolloutStrategy::Percentage,
            environment: Environment::Test,
            enabled_by: None,
        }
    }

    #[tokio::test]
    async fn test_unknown_flag_is_false() {
        let evaluator = InMemoryFlagEvaluator::new();
        let eval = evaluator.evaluate_flag("missing", &ctx(None, None)).await.unwrap();
        assert!(!eval.value);
        assert_eq!(eval.reason, EvaluationReason::NotConfigured);
    }

    #[tokio::test]
    async fn test_default_value() {
        let evaluator = InMemoryFlagEvaluator::with_defaults([("employee_adapter_enabled", true)]);
        let eval = evaluator
            .evaluate_flag("employee_adapter_enabled", &ctx(Some(1), Some(2)))
            .await
            .unwrap();
        assert!(eval.value);
        assert_eq!(eval.reason, EvaluationReason::Default);
    }

    #[tokio::test]
    async fn test_override_beats_default() {
        let evaluator = InMemoryFlagEvaluator::with_defaults([("social_adapter_enabled", true)]);
        evaluator
            .set_organization_flag(
                "social_adapter_enabled",
                OrganizationId::new(42),
                update(false, 0),
            )
            .await
            .unwrap();

        let inside = evaluator
            .evaluate_flag("social_adapter_enabled", &ctx(Some(1), Some(42)))
            .await
            .unwrap();
        assert!(!inside.value);
        assert_eq!(inside.reason, EvaluationReason::OrganizationDisabled);

        // Other organizations keep the default
        let other = evaluator
            .evaluate_flag("social_adapter_enabled", &ctx(Some(1), Some(43)))
            .await
            .unwrap();
        assert!(other.value);
    }

    #[tokio::test]
    async fn test_override_is_scoped_to_environment() {
        let evaluator = InMemoryFlagEvaluator::new();
        evaluator
            .set_organization_flag("f", OrganizationId::new(1), update(true, 100))
            .await
            .unwrap();
        let mut prod = ctx(None, Some(1));
        prod.environment = Environment::Production;
        assert!(!evaluator.evaluate_flag("f", &prod).await.unwrap().value);
        assert!(evaluator.evaluate_flag("f", &ctx(None, Some(1))).await.unwrap().value);
    }

    #[tokio::test]
    async fn test_full_and_zero_rollout() {
        let evaluator = InMemoryFlagEvaluator::new();
        let org = OrganizationId::new(5);
        evaluator.set_organization_flag("full", org, update(true, 100)).await.unwrap();
        evaluator.set_organization_flag("none", org, update(true, 0)).await.unwrap();

        for user in 1..50 {
            let c = ctx(Some(user), Some(5));
            assert!(evaluator.evaluate_flag("full", &c).await.unwrap().value);
            assert!(!evaluator.evaluate_flag("none", &c).await.unwrap().value);
        }
    }

    #[tokio::test]
    async fn test_partial_rollout_is_sticky_per_user() {
        let evaluator = InMemoryFlagEvaluator::new();
        evaluator
            .set_organization_flag("f", OrganizationId::new(9), update(true, 30))
            .await
            .unwrap();

        let mut enabled = 0;
        for user in 1..=1000u64 {
            let c = ctx(Some(user), Some(9));
            let first = evaluator.evaluate_flag("f", &c).await.unwrap().value;
            let second = evaluator.evaluate_flag("f", &c).await.unwrap().value;
            assert_eq!(first, second);
            assert_eq!(first, rollout_bucket("f", user) < 30);
            if first {
                enabled += 1;
            }
        }
        assert!(enabled > 0 && enabled < 1000);
    }

    #[tokio::test]
    async fn test_rejects_rollout_above_100() {
        let evaluator = InMemoryFlagEvaluator::new();
        let err = evaluator
            .set_organization_flag("f", OrganizationId::new(1), update(true, 101))
            .await
            .unwrap_err();
        assert_eq!(err, FlagError::InvalidRollout(101));
        assert_eq!(evaluator.override_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_evaluate_within_bounds_hung_evaluator() {
        let c = ctx(Some(1), Some(2));
        let err = evaluate_within(&HangingEvaluator, "f", &c, Duration::from_millis(100))
            .await
            .unwrap_err();
        assert_eq!(err, FlagError::TimedOut { timeout_ms: 100 });
    }

    #[tokio::test]
    async fn test_evaluate_within_contains_panic() {
        let c = ctx(None, None);
        let err = evaluate_within(&PanickingEvaluator, "f", &c, Duration::from_secs(1))
            .await
            .unwrap_err();
        assert_eq!(err, FlagError::Panicked("evaluator bug".to_string()));
    }

    #[tokio::test]
    async fn test_evaluate_within_passes_result_through() {
        let evaluator = InMemoryFlagEvaluator::with_defaults([("f", true)]);
        let eval = evaluate_within(&evaluator, "f", &ctx(None, None), Duration::from_secs(1))
            .await
            .unwrap();
        assert!(eval.value);
    }

    #[test]
    fn test_bucket_range() {
        for subject in 0..500 {
            assert!(rollout_bucket("employee_adapter_enabled", subject) < 100);
        }
    }
}
