//! # Employee Adapter
//!
//! Employee directory operations: lookup, listing, create, update and
//! deactivation. Gated by `employee_adapter_enabled`.

use anyhow::Context;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use engage_config::Environment;
use engage_types::{
    AdapterContext, AdapterResult, EmployeeId, OrganizationId, Page, PaginatedResult,
    PaginationParams,
};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use super::page_of;
use crate::common::{BaseAdapter, DomainAdapter};
use crate::config::AdapterConfig;
use crate::error::{AdapterError, Result};
use crate::factory::AdapterType;
use crate::flags::FeatureFlagEvaluator;
use crate::validation::{
    validate_sort_field, AdapterValidator, IdSchema, PaginationInput, PaginationSchema, Schema,
    SchemaViolations, TextBounds, ViolationCollector,
};

const SORT_FIELDS: &[&str] = &["createdAt", "lastName", "email"];

/// Employee row
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Employee {
    pub id: EmployeeId,
    pub organization_id: OrganizationId,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub job_title: Option<String>,
    pub department: Option<String>,
    pub manager_id: Option<EmployeeId>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Raw create request
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateEmployeeInput {
    pub organization_id: i64,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub job_title: Option<String>,
    pub department: Option<String>,
    pub manager_id: Option<i64>,
}

/// Validated create request
#[derive(Debug, Clone, PartialEq)]
pub struct NewEmployee {
    pub organization_id: OrganizationId,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub job_title: Option<String>,
    pub department: Option<String>,
    pub manager_id: Option<EmployeeId>,
}

/// Raw partial update
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateEmployeeInput {
    pub email: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub job_title: Option<String>,
    pub department: Option<String>,
    pub manager_id: Option<i64>,
}

/// Validated partial update; `None` leaves a field unchanged
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EmployeePatch {
    pub email: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub job_title: Option<String>,
    pub department: Option<String>,
    pub manager_id: Option<EmployeeId>,
}

impl EmployeePatch {
    fn is_empty(&self) -> bool {
        *self == EmployeePatch::default()
    }
}

/// Employee data collaborator
#[async_trait]
pub trait EmployeeStore: Send + Sync {
    async fn find_employee(&self, id: EmployeeId) -> anyhow::Result<Option<Employee>>;

    async fn list_employees(
        &self,
        organization_id: OrganizationId,
        params: &PaginationParams,
    ) -> anyhow::Result<Page<Employee>>;

    async fn insert_employee(&self, employee: NewEmployee) -> anyhow::Result<Employee>;

    /// `None` when the employee does not exist
    async fn update_employee(
        &self,
        id: EmployeeId,
        patch: EmployeePatch,
    ) -> anyhow::Result<Option<Employee>>;

    /// `None` when the employee does not exist
    async fn set_employee_active(
        &self,
        id: EmployeeId,
        active: bool,
    ) -> anyhow::Result<Option<Employee>>;
}

struct CreateEmployeeSchema;

impl Schema<CreateEmployeeInput> for CreateEmployeeSchema {
    type Output = NewEmployee;

    fn parse(
        &self,
        input: CreateEmployeeInput,
    ) -> std::result::Result<NewEmployee, SchemaViolations> {
        let mut v = ViolationCollector::new();
        let employee = NewEmployee {
            organization_id: v.id("organizationId", input.organization_id),
            email: v.email("email", &input.email),
            first_name: v.text("firstName", &input.first_name, TextBounds::NAME),
            last_name: v.text("lastName", &input.last_name, TextBounds::NAME),
            job_title: v.optional_text("jobTitle", input.job_title.as_deref(), TextBounds::TITLE),
            department: v.optional_text(
                "department",
                input.department.as_deref(),
                TextBounds::NAME,
            ),
            manager_id: input.manager_id.map(|raw| v.id("managerId", raw)),
        };
        v.finish(employee)
    }
}

struct UpdateEmployeeSchema;

impl Schema<UpdateEmployeeInput> for UpdateEmployeeSchema {
    type Output = EmployeePatch;

    fn parse(
        &self,
        input: UpdateEmployeeInput,
    ) -> std::result::Result<EmployeePatch, SchemaViolations> {
        let mut v = ViolationCollector::new();
        let patch = EmployeePatch {
            email: input.email.as_deref().map(|e| v.email("email", e)),
            first_name: input
                .first_name
                .as_deref()
                .map(|n| v.text("firstName", n, TextBounds::NAME)),
            last_name: input
                .last_name
                .as_deref()
                .map(|n| v.text("lastName", n, TextBounds::NAME)),
            job_title: v.optional_text("jobTitle", input.job_title.as_deref(), TextBounds::TITLE),
            department: v.optional_text(
                "department",
                input.department.as_deref(),
                TextBounds::NAME,
            ),
            manager_id: input.manager_id.map(|raw| v.id("managerId", raw)),
        };
        if patch.is_empty() {
            v.push("body", "at least one field must be provided");
        }
        v.finish(patch)
    }
}

/// Rows coming back from the store must be well formed
struct EmployeeRecordSchema;

impl Schema<Employee> for EmployeeRecordSchema {
    type Output = Employee;

    fn parse(&self, employee: Employee) -> std::result::Result<Employee, SchemaViolations> {
        let mut v = ViolationCollector::new();
        v.ensure(!employee.id.is_null(), "id", "must be a positive integer");
        v.ensure(
            !employee.organization_id.is_null(),
            "organizationId",
            "must be a positive integer",
        );
        let _ = v.email("email", &employee.email);
        v.finish(employee)
    }
}

/// Employee directory adapter
pub struct EmployeeAdapter {
    base: BaseAdapter,
    store: Arc<dyn EmployeeStore>,
}

impl EmployeeAdapter {
    pub const NAME: &'static str = "EmployeeAdapter";

    /// Adapter with default config, gated by `employee_adapter_enabled`
    pub fn new(
        store: Arc<dyn EmployeeStore>,
        evaluator: Arc<dyn FeatureFlagEvaluator>,
        environment: Environment,
    ) -> Self {
        let config =
            AdapterConfig::new(Self::NAME).with_feature_flag(AdapterType::Employee.flag_key());
        Self::with_config(config, store, evaluator, environment)
    }

    pub fn with_config(
        config: AdapterConfig,
        store: Arc<dyn EmployeeStore>,
        evaluator: Arc<dyn FeatureFlagEvaluator>,
        environment: Environment,
    ) -> Self {
        Self {
            base: BaseAdapter::new(config, evaluator, environment),
            store,
        }
    }

    pub async fn get_employee(&self, id: i64, ctx: &AdapterContext) -> AdapterResult<Employee> {
        self.base
            .execute_operation("get_employee", ctx, || async move {
                let id: EmployeeId = AdapterValidator::validate(&IdSchema::new("id"), id)?;
                let employee = self
                    .store
                    .find_employee(id)
                    .await
                    .with_context(|| format!("load employee {}", id.inner()))?
                    .ok_or(AdapterError::NotFound {
                        entity: "Employee",
                        id: id.inner(),
                    })?;
                AdapterValidator::validate(&EmployeeRecordSchema, employee)
            })
            .await
    }

    pub async fn list_employees(
        &self,
        organization_id: i64,
        pagination: PaginationInput,
        ctx: &AdapterContext,
    ) -> PaginatedResult<Employee> {
        self.base
            .execute_paginated("list_employees", ctx, || async move {
                let org: OrganizationId =
                    AdapterValidator::validate(&IdSchema::new("organizationId"), organization_id)?;
                let params = AdapterValidator::validate(&PaginationSchema, pagination)?;
                validate_sort_field(&params, SORT_FIELDS)?;
                let page = self
                    .store
                    .list_employees(org, &params)
                    .await
                    .with_context(|| format!("list employees of organization {}", org.inner()))?;
                Ok((params, page))
            })
            .await
    }

    pub async fn create_employee(
        &self,
        input: CreateEmployeeInput,
        ctx: &AdapterContext,
    ) -> AdapterResult<Employee> {
        self.base
            .execute_operation("create_employee", ctx, || async move {
                let new_employee = AdapterValidator::validate(&CreateEmployeeSchema, input)?;
                if let Some(manager) = new_employee.manager_id {
                    self.require_employee(manager).await?;
                }
                let employee = self
                    .store
                    .insert_employee(new_employee)
                    .await
                    .context("insert employee")?;
                AdapterValidator::validate(&EmployeeRecordSchema, employee)
            })
            .await
    }

    pub async fn update_employee(
        &self,
        id: i64,
        input: UpdateEmployeeInput,
        ctx: &AdapterContext,
    ) -> AdapterResult<Employee> {
        self.base
            .execute_operation("update_employee", ctx, || async move {
                let id: EmployeeId = AdapterValidator::validate(&IdSchema::new("id"), id)?;
                let patch = AdapterValidator::validate(&UpdateEmployeeSchema, input)?;
                if patch.manager_id == Some(id) {
                    return Err(AdapterError::Validation(
                        "managerId: an employee cannot manage themselves".to_string(),
                    ));
                }
                if let Some(manager) = patch.manager_id {
                    self.require_employee(manager).await?;
                }
                let employee = self
                    .store
                    .update_employee(id, patch)
                    .await
                    .with_context(|| format!("update employee {}", id.inner()))?
                    .ok_or(AdapterError::NotFound {
                        entity: "Employee",
                        id: id.inner(),
                    })?;
                AdapterValidator::validate(&EmployeeRecordSchema, employee)
            })
            .await
    }

    pub async fn deactivate_employee(
        &self,
        id: i64,
        ctx: &AdapterContext,
    ) -> AdapterResult<Employee> {
        self.base
            .execute_operation("deactivate_employee", ctx, || async move {
                let id: EmployeeId = AdapterValidator::validate(&IdSchema::new("id"), id)?;
                let employee = self
                    .store
                    .set_employee_active(id, false)
                    .await
                    .with_context(|| format!("deactivate employee {}", id.inner()))?
                    .ok_or(AdapterError::NotFound {
                        entity: "Employee",
                        id: id.inner(),
                    })?;
                AdapterValidator::validate(&EmployeeRecordSchema, employee)
            })
            .await
    }

    async fn require_employee(&self, id: EmployeeId) -> Result<()> {
        match self
            .store
            .find_employee(id)
            .await
            .with_context(|| format!("load employee {}", id.inner()))?
        {
            Some(_) => Ok(()),
            None => Err(AdapterError::NotFound {
                entity: "Employee",
                id: id.inner(),
            }),
        }
    }
}

impl DomainAdapter for EmployeeAdapter {
    fn base(&self) -> &BaseAdapter {
        &self.base
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Employee
    }
}

/// `DashMap`-backed employee store
#[derive(Debug, Default)]
pub struct InMemoryEmployeeStore {
    rows: DashMap<EmployeeId, Employee>,
    next_id: AtomicU64,
}

impl InMemoryEmployeeStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

#[async_trait]
impl EmployeeStore for InMemoryEmployeeStore {
    async fn find_employee(&self, id: EmployeeId) -> anyhow::Result<Option<Employee>> {
        Ok(self.rows.get(&id).map(|row| row.value().clone()))
    }

    async fn list_employees(
        &self,
        organization_id: OrganizationId,
        params: &PaginationParams,
    ) -> anyhow::Result<Page<Employee>> {
        let rows: Vec<Employee> = self
            .rows
            .iter()
            .filter(|row| row.organization_id == organization_id)
            .map(|row| row.value().clone())
            .collect();

        Ok(page_of(rows, params, |a, b| match params.sort_by.as_deref() {
            Some("lastName") => a.last_name.cmp(&b.last_name).then(a.id.cmp(&b.id)),
            Some("email") => a.email.cmp(&b.email),
            _ => a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)),
        }))
    }

    async fn insert_employee(&self, employee: NewEmployee) -> anyhow::Result<Employee> {
        let id = EmployeeId::new(self.next_id.fetch_add(1, Ordering::Relaxed) + 1);
        let now = Utc::now();
        let row = Employee {
            id,
            organization_id: employee.organization_id,
            email: employee.email,
            first_name: employee.first_name,
            last_name: employee.last_name,
            job_title: employee.job_title,
            department: employee.department,
            manager_id: employee.manager_id,
            is_active: true,
            created_at: now,
            updated_at: now,
        };
        self.rows.insert(id, row.clone());
        Ok(row)
    }

    async fn update_employee(
        &self,
        id: EmployeeId,
        patch: EmployeePatch,
    ) -> anyhow::Result<Option<Employee>> {
        let Some(mut row) = self.rows.get_mut(&id) else {
            return Ok(None);
        };
        if let Some(email) = patch.email {
            row.email = email;
        }
        if let Some(first_name) = patch.first_name {
            row.first_name = first_name;
        }
        if let Some(last_name) = patch.last_name {
            row.last_name = last_name;
        }
        if patch.job_title.is_some() {
            row.job_title = patch.job_title;
        }
        if patch.department.is_some() {
            row.department = patch.department;
        }
        if patch.manager_id.is_some() {
            row.manager_id = patch.manager_id;
        }
        row.updated_at = Utc::now();
        Ok(Some(row.clone()))
    }

    async fn set_employee_active(
        &self,
        id: EmployeeId,
        active: bool,
    ) -> anyhow::Result<Option<Employee>> {
        Ok(self.rows.get_mut(&id).map(|mut row| {
            row.is_active = active;
            row.updated_at = Utc::now();
            row.clone()
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::StaticEvaluator;
    use engage_types::UserId;

    fn adapter() -> EmployeeAdapter {
        EmployeeAdapter::new(
            Arc::new(InMemoryEmployeeStore::new()),
            Arc::new(StaticEvaluator::new(true)),
            Environment::Test,
        )
    }

    fn ctx() -> AdapterContext {
        AdapterContext::for_user(UserId::new(1), OrganizationId::new(42))
    }

    fn input(email: &str, last_name: &str) -> CreateEmployeeInput {
        CreateEmployeeInput {
            organization_id: 42,
            email: email.to_string(),
            first_name: "Ada".to_string(),
            last_name: last_name.to_string(),
            ..CreateEmployeeInput::default()
        }
    }

    #[tokio::test]
    async fn test_create_and_get() {
        let adapter = adapter();
        let created = adapter
            .create_employee(input(" Ada@Example.com ", "Lovelace"), &ctx())
            .await
            .into_result()
            .unwrap();
        assert_eq!(created.email, "ada@example.com");
        assert!(created.is_active);

        let fetched = adapter.get_employee(created.id.inner() as i64, &ctx()).await;
        assert_eq!(fetched.data(), Some(&created));
        assert!(adapter
            .get_performance_metrics()
            .contains_key("EmployeeAdapter.get_employee"));
    }

    #[tokio::test]
    async fn test_create_reports_every_violation() {
        let adapter = adapter();
        let result = adapter
            .create_employee(
                CreateEmployeeInput {
                    organization_id: 0,
                    email: "nope".to_string(),
                    ..CreateEmployeeInput::default()
                },
                &ctx(),
            )
            .await;
        let error = result.error().unwrap();
        assert_eq!(error.code, "VALIDATION_ERROR");
        assert!(error.message.starts_with("Validation failed: "));
        assert!(error.message.contains("organizationId"));
        assert!(error.message.contains("email"));
        assert!(error.message.contains("firstName: is required"));
    }

    #[tokio::test]
    async fn test_get_missing_employee() {
        let result = adapter().get_employee(99, &ctx()).await;
        assert_eq!(result.error().unwrap().code, "NOT_FOUND");
        assert_eq!(result.error().unwrap().message, "Employee 99 not found");
    }

    #[tokio::test]
    async fn test_get_rejects_non_positive_id() {
        let result = adapter().get_employee(-4, &ctx()).await;
        assert_eq!(result.error().unwrap().code, "VALIDATION_ERROR");
    }

    #[tokio::test]
    async fn test_create_with_unknown_manager() {
        let mut with_manager = input("a@b.io", "L");
        with_manager.manager_id = Some(77);
        let result = adapter().create_employee(with_manager, &ctx()).await;
        assert_eq!(result.error().unwrap().code, "NOT_FOUND");
    }

    #[tokio::test]
    async fn test_update_and_deactivate() {
        let adapter = adapter();
        let created = adapter
            .create_employee(input("a@b.io", "Lovelace"), &ctx())
            .await
            .into_result()
            .unwrap();
        let id = created.id.inner() as i64;

        let updated = adapter
            .update_employee(
                id,
                UpdateEmployeeInput {
                    job_title: Some("Engineer".to_string()),
                    ..UpdateEmployeeInput::default()
                },
                &ctx(),
            )
            .await
            .into_result()
            .unwrap();
        assert_eq!(updated.job_title.as_deref(), Some("Engineer"));
        assert_eq!(updated.last_name, "Lovelace");

        let deactivated = adapter.deactivate_employee(id, &ctx()).await.into_result().unwrap();
        assert!(!deactivated.is_active);
    }

    #[tokio::test]
    async fn test_empty_update_rejected() {
        let result = adapter()
            .update_employee(1, UpdateEmployeeInput::default(), &ctx())
            .await;
        let error = result.error().unwrap();
        assert_eq!(error.code, "VALIDATION_ERROR");
        assert!(error.message.contains("at least one field"));
    }

    #[tokio::test]
    async fn test_self_management_rejected() {
        let adapter = adapter();
        let created = adapter
            .create_employee(input("a@b.io", "L"), &ctx())
            .await
            .into_result()
            .unwrap();
        let id = created.id.inner() as i64;
        let result = adapter
            .update_employee(
                id,
                UpdateEmployeeInput {
                    manager_id: Some(id),
                    ..UpdateEmployeeInput::default()
                },
                &ctx(),
            )
            .await;
        assert_eq!(result.error().unwrap().code, "VALIDATION_ERROR");
    }

    #[tokio::test]
    async fn test_list_paginates_within_organization() {
        let adapter = adapter();
        for (i, name) in ["Cole", "Abel", "Bryn"].iter().enumerate() {
            adapter
                .create_employee(input(&format!("e{}@x.io", i), name), &ctx())
                .await
                .into_result()
                .unwrap();
        }
        let mut other = input("other@x.io", "Zed");
        other.organization_id = 7;
        adapter.create_employee(other, &ctx()).await.into_result().unwrap();

        let result = adapter
            .list_employees(
                42,
                PaginationInput {
                    page: Some(1),
                    limit: Some(2),
                    sort_by: Some("lastName".to_string()),
                    sort_order: Some("asc".to_string()),
                },
                &ctx(),
            )
            .await;
        let names: Vec<&str> =
            result.items().unwrap().iter().map(|e| e.last_name.as_str()).collect();
        assert_eq!(names, vec!["Abel", "Bryn"]);
        let pagination = result.pagination().unwrap();
        assert_eq!(pagination.total_count, 3);
        assert_eq!(pagination.total_pages, 2);
        assert!(pagination.has_next);
        assert!(!pagination.has_prev);
    }

    #[tokio::test]
    async fn test_list_rejects_unknown_sort_field() {
        let result = adapter()
            .list_employees(
                42,
                PaginationInput {
                    sort_by: Some("salary".to_string()),
                    ..PaginationInput::default()
                },
                &ctx(),
            )
            .await;
        assert_eq!(result.error().unwrap().code, "VALIDATION_ERROR");
        assert!(result.pagination().is_none());
    }
}
