//! # Recognition Adapter
//!
//! Peer recognition: create, lookup, organization and per-employee listings,
//! and an organization summary. Gated by `recognition_adapter_enabled`.
//!
//! Points are checked to be a positive integer within
//! [`MAX_RECOGNITION_POINTS`]; budgets and balances belong to the caller.

use anyhow::Context;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use engage_config::Environment;
use engage_types::{
    AdapterContext, AdapterResult, EmployeeId, OrganizationId, Page, PaginatedResult,
    PaginationParams, RecognitionId,
};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use super::page_of;
use crate::common::{BaseAdapter, DomainAdapter};
use crate::config::AdapterConfig;
use crate::error::AdapterError;
use crate::factory::AdapterType;
use crate::flags::FeatureFlagEvaluator;
use crate::validation::{
    validate_sort_field, AdapterValidator, IdSchema, PaginationInput, PaginationSchema, Schema,
    SchemaViolations, TextBounds, ViolationCollector,
};

/// Upper bound on points attached to one recognition
pub const MAX_RECOGNITION_POINTS: i64 = 1_000;

/// Recipients listed in a summary
pub const SUMMARY_TOP_RECIPIENTS: usize = 5;

const SORT_FIELDS: &[&str] = &["createdAt", "points"];

/// Recognition row
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Recognition {
    pub id: RecognitionId,
    pub organization_id: OrganizationId,
    pub sender_id: EmployeeId,
    pub recipient_id: EmployeeId,
    pub message: String,
    pub points: u32,
    pub category: Option<String>,
    pub is_public: bool,
    pub created_at: DateTime<Utc>,
}

/// Raw create request
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateRecognitionInput {
    pub organization_id: i64,
    pub sender_id: i64,
    pub recipient_id: i64,
    pub message: String,
    pub points: i64,
    pub category: Option<String>,
    pub is_public: Option<bool>,
}

/// Validated create request
#[derive(Debug, Clone, PartialEq)]
pub struct NewRecognition {
    pub organization_id: OrganizationId,
    pub sender_id: EmployeeId,
    pub recipient_id: EmployeeId,
    pub message: String,
    pub points: u32,
    pub category: Option<String>,
    pub is_public: bool,
}

/// Per-recipient totals inside a summary
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RecipientTotal {
    pub employee_id: EmployeeId,
    pub recognitions: u64,
    pub points: u64,
}

/// Organization-wide recognition counts
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RecognitionSummary {
    pub organization_id: OrganizationId,
    pub total_recognitions: u64,
    pub total_points: u64,
    pub unique_senders: u64,
    pub unique_recipients: u64,
    /// Highest point totals first
    pub top_recipients: Vec<RecipientTotal>,
}

/// Recognition data collaborator
#[async_trait]
pub trait RecognitionStore: Send + Sync {
    async fn insert_recognition(&self, recognition: NewRecognition) -> anyhow::Result<Recognition>;

    async fn find_recognition(&self, id: RecognitionId) -> anyhow::Result<Option<Recognition>>;

    async fn list_recognitions(
        &self,
        organization_id: OrganizationId,
        params: &PaginationParams,
    ) -> anyhow::Result<Page<Recognition>>;

    /// Recognitions received by `employee_id`
    async fn list_recognitions_for_employee(
        &self,
        employee_id: EmployeeId,
        params: &PaginationParams,
    ) -> anyhow::Result<Page<Recognition>>;

    async fn summarize(
        &self,
        organization_id: OrganizationId,
    ) -> anyhow::Result<RecognitionSummary>;
}

struct CreateRecognitionSchema;

impl Schema<CreateRecognitionInput> for CreateRecognitionSchema {
    type Output = NewRecognition;

    fn parse(
        &self,
        input: CreateRecognitionInput,
    ) -> std::result::Result<NewRecognition, SchemaViolations> {
        let mut v = ViolationCollector::new();
        let sender_id: EmployeeId = v.id("senderId", input.sender_id);
        let recipient_id: EmployeeId = v.id("recipientId", input.recipient_id);
        v.ensure(
            input.sender_id != input.recipient_id,
            "recipientId",
            "cannot recognize yourself",
        );
        let points = v.range("points", input.points, 1, MAX_RECOGNITION_POINTS);

        let recognition = NewRecognition {
            organization_id: v.id("organizationId", input.organization_id),
            sender_id,
            recipient_id,
            message: v.text("message", &input.message, TextBounds::DESCRIPTION),
            points: u32::try_from(points.clamp(0, MAX_RECOGNITION_POINTS)).unwrap_or(0),
            category: v.optional_text("category", input.category.as_deref(), TextBounds::NAME),
            is_public: input.is_public.unwrap_or(true),
        };
        v.ensure(!recognition.message.is_empty(), "message", "is required");
        v.finish(recognition)
    }
}

struct RecognitionRecordSchema;

impl Schema<Recognition> for RecognitionRecordSchema {
    type Output = Recognition;

    fn parse(
        &self,
        recognition: Recognition,
    ) -> std::result::Result<Recognition, SchemaViolations> {
        let mut v = ViolationCollector::new();
        v.ensure(!recognition.id.is_null(), "id", "must be a positive integer");
        v.ensure(
            recognition.points >= 1 && i64::from(recognition.points) <= MAX_RECOGNITION_POINTS,
            "points",
            format!("must be between 1 and {}", MAX_RECOGNITION_POINTS),
        );
        v.finish(recognition)
    }
}

/// Peer recognition adapter
pub struct RecognitionAdapter {
    base: BaseAdapter,
    store: Arc<dyn RecognitionStore>,
}

impl RecognitionAdapter {
    pub const NAME: &'static str = "RecognitionAdapter";

    /// Adapter with default config, gated by `recognition_adapter_enabled`
    pub fn new(
        store: Arc<dyn RecognitionStore>,
        evaluator: Arc<dyn FeatureFlagEvaluator>,
        environment: Environment,
    ) -> Self {
        let config =
            AdapterConfig::new(Self::NAME).with_feature_flag(AdapterType::Recognition.flag_key());
        Self::with_config(config, store, evaluator, environment)
    }

    pub fn with_config(
        config: AdapterConfig,
        store: Arc<dyn RecognitionStore>,
        evaluator: Arc<dyn FeatureFlagEvaluator>,
        environment: Environment,
    ) -> Self {
        Self {
            base: BaseAdapter::new(config, evaluator, environment),
            store,
        }
    }

    pub async fn create_recognition(
        &self,
        input: CreateRecognitionInput,
        ctx: &AdapterContext,
    ) -> AdapterResult<Recognition> {
        self.base
            .execute_operation("create_recognition", ctx, || async move {
                let new_recognition = AdapterValidator::validate(&CreateRecognitionSchema, input)?;
                let recognition = self
                    .store
                    .insert_recognition(new_recognition)
                    .await
                    .context("insert recognition")?;
                AdapterValidator::validate(&RecognitionRecordSchema, recognition)
            })
            .await
    }

    pub async fn get_recognition(
        &self,
        id: i64,
        ctx: &AdapterContext,
    ) -> AdapterResult<Recognition> {
        self.base
            .execute_operation("get_recognition", ctx, || async move {
                let id: RecognitionId = AdapterValidator::validate(&IdSchema::new("id"), id)?;
                let recognition = self
                    .store
                    .find_recognition(id)
                    .await
                    .with_context(|| format!("load recognition {}", id.inner()))?
                    .ok_or(AdapterError::NotFound {
                        entity: "Recognition",
                        id: id.inner(),
                    })?;
                AdapterValidator::validate(&RecognitionRecordSchema, recognition)
            })
            .await
    }

    pub async fn list_recognitions(
        &self,
        organization_id: i64,
        pagination: PaginationInput,
        ctx: &AdapterContext,
    ) -> PaginatedResult<Recognition> {
        self.base
            .execute_paginated("list_recognitions", ctx, || async move {
                let org: OrganizationId =
                    AdapterValidator::validate(&IdSchema::new("organizationId"), organization_id)?;
                let params = AdapterValidator::validate(&PaginationSchema, pagination)?;
                validate_sort_field(&params, SORT_FIELDS)?;
                let page = self
                    .store
                    .list_recognitions(org, &params)
                    .await
                    .with_context(|| format!("list recognitions of organization {}", org.inner()))?;
                Ok((params, page))
            })
            .await
    }

    pub async fn list_recognitions_for_employee(
        &self,
        employee_id: i64,
        pagination: PaginationInput,
        ctx: &AdapterContext,
    ) -> PaginatedResult<Recognition> {
        self.base
            .execute_paginated("list_recognitions_for_employee", ctx, || async move {
                let employee: EmployeeId =
                    AdapterValidator::validate(&IdSchema::new("employeeId"), employee_id)?;
                let params = AdapterValidator::validate(&PaginationSchema, pagination)?;
                validate_sort_field(&params, SORT_FIELDS)?;
                let page = self
                    .store
                    .list_recognitions_for_employee(employee, &params)
                    .await
                    .with_context(|| {
                        format!("list recognitions for employee {}", employee.inner())
                    })?;
                Ok((params, page))
            })
            .await
    }

    pub async fn get_recognition_summary(
        &self,
        organization_id: i64,
        ctx: &AdapterContext,
    ) -> AdapterResult<RecognitionSummary> {
        self.base
            .execute_operation("get_recognition_summary", ctx, || async move {
                let org: OrganizationId =
                    AdapterValidator::validate(&IdSchema::new("organizationId"), organization_id)?;
                let summary = self
                    .store
                    .summarize(org)
                    .await
                    .with_context(|| {
                        format!("summarize recognitions of organization {}", org.inner())
                    })?;
                Ok(summary)
            })
            .await
    }
}

impl DomainAdapter for RecognitionAdapter {
    fn base(&self) -> &BaseAdapter {
        &self.base
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Recognition
    }
}

/// `DashMap`-backed recognition store
#[derive(Debug, Default)]
pub struct InMemoryRecognitionStore {
    rows: DashMap<RecognitionId, Recognition>,
    next_id: AtomicU64,
}

impl InMemoryRecognitionStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn select<F>(&self, filter: F, params: &PaginationParams) -> Page<Recognition>
    where
        F: Fn(&Recognition) -> bool,
    {
        let rows: Vec<Recognition> = self
            .rows
            .iter()
            .filter(|row| filter(row.value()))
            .map(|row| row.value().clone())
            .collect();

        page_of(rows, params, |a, b| match params.sort_by.as_deref() {
            Some("points") => a.points.cmp(&b.points).then(a.id.cmp(&b.id)),
            _ => a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)),
        })
    }
}

#[async_trait]
impl RecognitionStore for InMemoryRecognitionStore {
    async fn insert_recognition(&self, recognition: NewRecognition) -> anyhow::Result<Recognition> {
        let id = RecognitionId::new(self.next_id.fetch_add(1, Ordering::Relaxed) + 1);
        let row = Recognition {
            id,
            organization_id: recognition.organization_id,
            sender_id: recognition.sender_id,
            recipient_id: recognition.recipient_id,
            message: recognition.message,
            points: recognition.points,
            category: recognition.category,
            is_public: recognition.is_public,
            created_at: Utc::now(),
        };
        self.rows.insert(id, row.clone());
        Ok(row)
    }

    async fn find_recognition(&self, id: RecognitionId) -> anyhow::Result<Option<Recognition>> {
        Ok(self.rows.get(&id).map(|row| row.value().clone()))
    }

    async fn list_recognitions(
        &self,
        organization_id: OrganizationId,
        params: &PaginationParams,
    ) -> anyhow::Result<Page<Recognition>> {
        Ok(self.select(|r| r.organization_id == organization_id, params))
    }

    async fn list_recognitions_for_employee(
        &self,
        employee_id: EmployeeId,
        params: &PaginationParams,
    ) -> anyhow::Result<Page<Recognition>> {
        Ok(self.select(|r| r.recipient_id == employee_id, params))
    }

    async fn summarize(
        &self,
        organization_id: OrganizationId,
    ) -> anyhow::Result<RecognitionSummary> {
        let mut total_recognitions = 0u64;
        let mut total_points = 0u64;
        let mut senders = HashSet::new();
        let mut per_recipient: HashMap<EmployeeId, (u64, u64)> = HashMap::new();

        for row in self.rows.iter().filter(|r| r.organization_id == organization_id) {
            total_recognitions += 1;
            total_points += u64::from(row.points);
            senders.insert(row.sender_id);
            let entry = per_recipient.entry(row.recipient_id).or_default();
            entry.0 += 1;
            entry.1 += u64::from(row.points);
        }

        let unique_recipients = per_recipient.len() as u64;
        let mut top_recipients: Vec<RecipientTotal> = per_recipient
            .into_iter()
            .map(|(employee_id, (recognitions, points))| RecipientTotal {
                employee_id,
                recognitions,
                points,
            })
            .collect();
        top_recipients
            .sort_by(|a, b| b.points.cmp(&a.points).then(a.employee_id.cmp(&b.employee_id)));
        top_recipients.truncate(SUMMARY_TOP_RECIPIENTS);

        Ok(RecognitionSummary {
            organization_id,
            total_recognitions,
            total_points,
            unique_senders: senders.len() as u64,
            unique_recipients,
            top_recipients,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::StaticEvaluator;
    use engage_types::UserId;

    fn adapter() -> RecognitionAdapter {
        RecognitionAdapter::new(
            Arc::new(InMemoryRecognitionStore::new()),
            Arc::new(StaticEvaluator::new(true)),
            Environment::Test,
        )
    }

    fn ctx() -> AdapterContext {
        AdapterContext::for_user(UserId::new(1), OrganizationId::new(42))
    }

    fn input(sender: i64, recipient: i64, points: i64) -> CreateRecognitionInput {
        CreateRecognitionInput {
            organization_id: 42,
            sender_id: sender,
            recipient_id: recipient,
            message: "Great release".to_string(),
            points,
            ..CreateRecognitionInput::default()
        }
    }

    #[tokio::test]
    async fn test_create_and_get() {
        let adapter = adapter();
        let created = adapter
            .create_recognition(input(1, 2, 50), &ctx())
            .await
            .into_result()
            .unwrap();
        assert_eq!(created.points, 50);
        assert!(created.is_public);

        let fetched = adapter.get_recognition(created.id.inner() as i64, &ctx()).await;
        assert_eq!(fetched.data(), Some(&created));
    }

    #[tokio::test]
    async fn test_points_bounds() {
        let adapter = adapter();
        for points in [0, -5, MAX_RECOGNITION_POINTS + 1] {
            let result = adapter.create_recognition(input(1, 2, points), &ctx()).await;
            let error = result.error().unwrap();
            assert_eq!(error.code, "VALIDATION_ERROR");
            assert!(error.message.contains("points"), "{}", error.message);
        }
        assert!(adapter
            .create_recognition(input(1, 2, MAX_RECOGNITION_POINTS), &ctx())
            .await
            .is_success());
    }

    #[tokio::test]
    async fn test_self_recognition_rejected() {
        let result = adapter().create_recognition(input(3, 3, 10), &ctx()).await;
        assert!(result.error().unwrap().message.contains("cannot recognize yourself"));
    }

    #[tokio::test]
    async fn test_missing_recognition() {
        let result = adapter().get_recognition(12, &ctx()).await;
        assert_eq!(result.error().unwrap().code, "NOT_FOUND");
    }

    #[tokio::test]
    async fn test_listings() {
        let adapter = adapter();
        adapter.create_recognition(input(1, 2, 10), &ctx()).await;
        adapter.create_recognition(input(3, 2, 30), &ctx()).await;
        adapter.create_recognition(input(2, 4, 20), &ctx()).await;

        let all = adapter
            .list_recognitions(
                42,
                PaginationInput {
                    sort_by: Some("points".to_string()),
                    ..PaginationInput::default()
                },
                &ctx(),
            )
            .await;
        let points: Vec<u32> = all.items().unwrap().iter().map(|r| r.points).collect();
        assert_eq!(points, vec![30, 20, 10]);
        assert_eq!(all.pagination().unwrap().total_count, 3);

        let for_two = adapter
            .list_recognitions_for_employee(2, PaginationInput::default(), &ctx())
            .await;
        assert_eq!(for_two.items().unwrap().len(), 2);
        assert_eq!(for_two.pagination().unwrap().total_pages, 1);
    }

    #[tokio::test]
    async fn test_summary() {
        let adapter = adapter();
        adapter.create_recognition(input(1, 2, 10), &ctx()).await;
        adapter.create_recognition(input(3, 2, 30), &ctx()).await;
        adapter.create_recognition(input(2, 4, 20), &ctx()).await;

        let summary = adapter.get_recognition_summary(42, &ctx()).await.into_result().unwrap();
        assert_eq!(summary.total_recognitions, 3);
        assert_eq!(summary.total_points, 60);
        assert_eq!(summary.unique_senders, 3);
        assert_eq!(summary.unique_recipients, 2);
        assert_eq!(summary.top_recipients[0].employee_id, EmployeeId::new(2));
        assert_eq!(summary.top_recipients[0].points, 40);

        let empty = adapter.get_recognition_summary(7, &ctx()).await.into_result().unwrap();
        assert_eq!(empty.total_recognitions, 0);
        assert!(empty.top_recipients.is_empty());
    }
}
