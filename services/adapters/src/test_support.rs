//! Mock collaborators for unit tests

use async_trait::async_trait;
use engage_types::OrganizationId;
use parking_lot::Mutex;

use crate::flags::{
    EvaluationReason, FeatureFlagEvaluator, FlagContext, FlagError, FlagEvaluation,
    OrganizationFlagUpdate,
};

/// Returns the same value for every flag
pub struct StaticEvaluator {
    value: bool,
}

impl StaticEvaluator {
    pub fn new(value: bool) -> Self {
        Self { value }
    }
}

#[async_trait]
impl FeatureFlagEvaluator for StaticEvaluator {
    async fn evaluate_flag(
        &self,
        _flag_key: &str,
        _ctx: &FlagContext,
    ) -> Result<FlagEvaluation, FlagError> {
        Ok(FlagEvaluation {
            value: self.value,
            reason: EvaluationReason::Default,
            rollout_percentage: None,
        })
    }

    async fn set_organization_flag(
        &self,
        _flag_key: &str,
        _organization_id: OrganizationId,
        _update: OrganizationFlagUpdate,
    ) -> Result<(), FlagError> {
        Ok(())
    }
}

/// Every call fails
pub struct FailingEvaluator;

#[async_trait]
impl FeatureFlagEvaluator for FailingEvaluator {
    async fn evaluate_flag(
        &self,
        _flag_key: &str,
        _ctx: &FlagContext,
    ) -> Result<FlagEvaluation, FlagError> {
        Err(FlagError::Unavailable("connection refused".to_string()))
    }

    async fn set_organization_flag(
        &self,
        _flag_key: &str,
        _organization_id: OrganizationId,
        _update: OrganizationFlagUpdate,
    ) -> Result<(), FlagError> {
        Err(FlagError::Unavailable("connection refused".to_string()))
    }
}

/// Every evaluation panics
pub struct PanickingEvaluator;

#[async_trait]
impl FeatureFlagEvaluator for PanickingEvaluator {
    async fn evaluate_flag(
        &self,
        _flag_key: &str,
        _ctx: &FlagContext,
    ) -> Result<FlagEvaluation, FlagError> {
        panic!("evaluator bug")
    }

    async fn set_organization_flag(
        &self,
        _flag_key: &str,
        _organization_id: OrganizationId,
        _update: OrganizationFlagUpdate,
    ) -> Result<(), FlagError> {
        panic!("evaluator bug")
    }
}

/// Evaluations never resolve
pub struct HangingEvaluator;

#[async_trait]
impl FeatureFlagEvaluator for HangingEvaluator {
    async fn evaluate_flag(
        &self,
        _flag_key: &str,
        _ctx: &FlagContext,
    ) -> Result<FlagEvaluation, FlagError> {
        std::future::pending().await
    }

    async fn set_organization_flag(
        &self,
        _flag_key: &str,
        _organization_id: OrganizationId,
        _update: OrganizationFlagUpdate,
    ) -> Result<(), FlagError> {
        std::future::pending().await
    }
}

/// Enabled for every flag; records organization writes in call order
#[derive(Default)]
pub struct RecordingEvaluator {
    pub writes: Mutex<Vec<(String, OrganizationId, OrganizationFlagUpdate)>>,
}

#[async_trait]
impl FeatureFlagEvaluator for RecordingEvaluator {
    async fn evaluate_flag(
        &self,
        _flag_key: &str,
        _ctx: &FlagContext,
    ) -> Result<FlagEvaluation, FlagError> {
        Ok(FlagEvaluation {
            value: true,
            reason: EvaluationReason::Default,
            rollout_percentage: None,
        })
    }

    async fn set_organization_flag(
        &self,
        flag_key: &str,
        organization_id: OrganizationId,
        update: OrganizationFlagUpdate,
    ) -> Result<(), FlagError> {
        self.writes.lock().push((flag_key.to_string(), organization_id, update));
        Ok(())
    }
}
