//! # Engage Adapters - Feature-Flag Gated Data Access Layer
//!
//! ## Purpose
//!
//! Domain adapters that sit between the HR application's route handlers and
//! its data stores. Every adapter operation is gated by a per-organization
//! feature flag, timed, recorded in bounded per-operation metrics and wrapped
//! in a uniform [`AdapterResult`](engage_types::AdapterResult) envelope, so a
//! route handler never sees a raw error or panic.
//!
//! ## Integration Points
//!
//! - **Callers**: route handlers obtain adapters from [`AdapterFactory`]
//! - **Flags**: any [`FeatureFlagEvaluator`]; [`InMemoryFlagEvaluator`] ships for
//!   the service binary and tests
//! - **Stores**: one trait per domain ([`EmployeeStore`], [`RecognitionStore`],
//!   [`SocialStore`]) with in-memory implementations
//! - **Observability**: [`AdapterFactory`] implements
//!   `engage_health_check::HealthSource` for the HTTP health endpoints
//!
//! ## Architecture Role
//!
//! ```text
//! route handler ──► AdapterFactory::get_*_adapter(ctx)
//!                        │  flag: <type>_adapter_enabled
//!                        ▼
//!                  EmployeeAdapter / RecognitionAdapter / SocialAdapter
//!                        │  BaseAdapter::execute_operation(name, ctx, op)
//!                        │    flag ─► rate limit ─► timeout + panic guard
//!                        │    ─► metrics ─► fallback ─► envelope
//!                        ▼
//!                  store trait (validation on the way in and out)
//! ```
//!
//! ## Usage
//!
//! ```rust,no_run
//! use adapter_service::adapters::{EmployeeAdapter, InMemoryEmployeeStore};
//! use adapter_service::flags::InMemoryFlagEvaluator;
//! use engage_config::Environment;
//! use engage_types::{AdapterContext, OrganizationId, UserId};
//! use std::sync::Arc;
//!
//! # #[tokio::main]
//! # async fn main() {
//! let evaluator = Arc::new(InMemoryFlagEvaluator::with_defaults([
//!     ("employee_adapter_enabled", true),
//! ]));
//! let store = Arc::new(InMemoryEmployeeStore::new());
//! let adapter = EmployeeAdapter::new(store, evaluator, Environment::Development);
//!
//! let ctx = AdapterContext::for_user(UserId::new(7), OrganizationId::new(42));
//! let result = adapter.get_employee(1, &ctx).await;
//! assert_eq!(result.error().map(|e| e.code.as_str()), Some("NOT_FOUND"));
//! # }
//! ```

pub mod adapters;
pub mod common;
pub mod config;
pub mod error;
pub mod factory;
pub mod flags;
pub mod health;
pub mod latency_instrumentation;
pub mod rate_limit;
pub mod validation;

#[cfg(test)]
mod test_support;

pub use adapters::{
    EmployeeAdapter, EmployeeStore, InMemoryEmployeeStore, InMemoryRecognitionStore,
    InMemorySocialStore, RecognitionAdapter, RecognitionStore, SocialAdapter, SocialStore,
};
pub use common::{empty_page, BaseAdapter, DomainAdapter, Paged};
pub use config::AdapterConfig;
pub use error::{AdapterError, Result};
pub use factory::{
    AdapterFactory, AdapterHandle, AdapterRegistry, AdapterRollout, AdapterType,
    EvaluatorFailurePolicy, MigrationStrategy, OrganizationAdapterConfig,
};
pub use flags::{
    FeatureFlagEvaluator, FlagContext, FlagError, FlagEvaluation, InMemoryFlagEvaluator,
    OrganizationFlagUpdate, RolloutStrategy,
};
pub use health::{HealthLevel, HealthStatus};
pub use latency_instrumentation::{OperationMetrics, OperationStats, PerformanceMetrics};
pub use rate_limit::RateLimiter;
pub use validation::{AdapterValidator, PaginationInput, Schema, SchemaViolation, SchemaViolations};
