//! # Common Adapter Infrastructure
//!
//! The execution engine shared by every domain adapter. Each public adapter
//! operation is exactly one call into [`BaseAdapter`], which applies the same
//! pipeline every time:
//!
//! 1. Resolve the operation id `"<adapterName>.<operationName>"` and log start
//! 2. Evaluate the adapter's feature flag within the operation timeout (fail
//!    closed on evaluator error, panic or timeout)
//! 3. Apply the per-operation rate limit, if enabled
//! 4. Run the wrapped operation under the configured timeout, catching panics
//! 5. Record timing and outcome in the bounded metric series
//! 6. On an adapter-side failure, run the operation's fallback hook when one
//!    is configured; caller errors skip it
//! 7. Build the [`AdapterResult`] envelope
//!
//! None of these steps lets an error or panic escape: every call resolves to a
//! well-formed envelope.

use engage_config::Environment;
use engage_types::{
    AdapterContext, AdapterResult, OrganizationId, Page, PaginatedResult, Pagination,
    PaginationParams, ResultMetadata, UserId,
};
use futures::future::{self, FutureExt, Ready};
use std::any::Any;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

use crate::config::AdapterConfig;
use crate::error::{AdapterError, Result};
use crate::factory::AdapterType;
use crate::flags::{evaluate_within, FeatureFlagEvaluator, FlagContext};
use crate::health::{classify, HealthStatus};
use crate::latency_instrumentation::{
    to_millis, weighted_average_time, OperationMetrics, PerformanceMetrics,
};
use crate::rate_limit::RateLimiter;

/// Validated pagination together with the page it produced
pub type Paged<T> = (PaginationParams, Page<T>);

type NoFallback<T> = fn() -> Ready<Result<T>>;

// ============================================================================
// CORE TRAITS
// ============================================================================

/// Implemented by every concrete adapter
///
/// Observability is inherited from the embedded [`BaseAdapter`]; an adapter
/// only has to say which base it wraps and which type it is.
pub trait DomainAdapter: Send + Sync {
    /// Execution engine this adapter routes every operation through
    fn base(&self) -> &BaseAdapter;

    /// Registry slot of this adapter
    fn adapter_type(&self) -> AdapterType;

    fn get_health_status(&self) -> HealthStatus {
        self.base().get_health_status()
    }

    fn get_performance_metrics(&self) -> PerformanceMetrics {
        self.base().get_performance_metrics()
    }
}

// ============================================================================
// BASE ADAPTER
// ============================================================================

/// Cross-cutting execution engine embedded in every domain adapter
pub struct BaseAdapter {
    config: AdapterConfig,
    evaluator: Arc<dyn FeatureFlagEvaluator>,
    environment: Environment,
    metrics: OperationMetrics,
    rate_limiter: RateLimiter,
    started_at: Instant,
}

impl BaseAdapter {
    pub fn new(
        config: AdapterConfig,
        evaluator: Arc<dyn FeatureFlagEvaluator>,
        environment: Environment,
    ) -> Self {
        let rate_limiter = if config.rate_limit_enabled {
            RateLimiter::new(config.rate_limit_max, config.rate_limit_window)
        } else {
            RateLimiter::unlimited()
        };

        debug!(
            adapter = %config.adapter_name,
            version = %config.version,
            feature_flag = ?config.feature_flag,
            "Adapter initialized"
        );

        Self {
            config,
            evaluator,
            environment,
            metrics: OperationMetrics::new(),
            rate_limiter,
            started_at: Instant::now(),
        }
    }

    pub fn config(&self) -> &AdapterConfig {
        &self.config
    }

    pub fn name(&self) -> &str {
        &self.config.adapter_name
    }

    pub fn version(&self) -> &str {
        &self.config.version
    }

    pub fn environment(&self) -> Environment {
        self.environment
    }

    /// `"<adapterName>.<operationName>"`
    pub fn operation_id(&self, operation_name: &str) -> String {
        format!("{}.{}", self.config.adapter_name, operation_name)
    }

    /// Whether the adapter's feature flag allows this request
    ///
    /// No flag configured means always enabled. An evaluator that errors,
    /// panics or outlasts the operation timeout disables the adapter.
    pub async fn is_enabled(&self, ctx: &AdapterContext) -> bool {
        let Some(flag) = self.config.feature_flag.as_deref() else {
            return true;
        };

        let flag_ctx = FlagContext::from_adapter_context(ctx, self.environment);
        let timeout = self.config.operation_timeout;
        match evaluate_within(self.evaluator.as_ref(), flag, &flag_ctx, timeout).await {
            Ok(evaluation) => evaluation.value,
            Err(e) => {
                error!(
                    adapter = %self.config.adapter_name,
                    flag,
                    error = %e,
                    request_id = %ctx.request_id,
                    "Feature flag evaluation failed; treating adapter as disabled"
                );
                false
            }
        }
    }

    /// Run a domain operation through the full pipeline
    pub async fn execute_operation<T, F, Fut>(
        &self,
        operation_name: &str,
        ctx: &AdapterContext,
        operation: F,
    ) -> AdapterResult<T>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        self.run(operation_name, ctx, operation, None::<NoFallback<T>>).await
    }

    /// Like [`execute_operation`](Self::execute_operation), with a fallback
    ///
    /// `fallback` runs only when the operation fails and the config has
    /// fallback enabled with a fallback target. A successful fallback yields a
    /// success envelope with `fallbackUsed = true`; a failed one is logged and
    /// the original error is returned.
    pub async fn execute_with_fallback<T, F, Fut, G, GFut>(
        &self,
        operation_name: &str,
        ctx: &AdapterContext,
        operation: F,
        fallback: G,
    ) -> AdapterResult<T>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T>>,
        G: FnOnce() -> GFut,
        GFut: Future<Output = Result<T>>,
    {
        self.run(operation_name, ctx, operation, Some(fallback)).await
    }

    /// Run a paginated operation; pagination is attached on success
    pub async fn execute_paginated<T, F, Fut>(
        &self,
        operation_name: &str,
        ctx: &AdapterContext,
        operation: F,
    ) -> PaginatedResult<T>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<Paged<T>>>,
    {
        paginate(self.execute_operation(operation_name, ctx, operation).await)
    }

    /// Paginated variant of [`execute_with_fallback`](Self::execute_with_fallback)
    pub async fn execute_paginated_with_fallback<T, F, Fut, G, GFut>(
        &self,
        operation_name: &str,
        ctx: &AdapterContext,
        operation: F,
        fallback: G,
    ) -> PaginatedResult<T>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<Paged<T>>>,
        G: FnOnce() -> GFut,
        GFut: Future<Output = Result<Paged<T>>>,
    {
        paginate(
            self.execute_with_fallback(operation_name, ctx, operation, fallback)
                .await,
        )
    }

    /// Build a request context, generating a request id when none is given
    pub fn create_context(
        &self,
        user_id: Option<UserId>,
        organization_id: Option<OrganizationId>,
        request_id: Option<String>,
        ip_address: Option<String>,
        user_agent: Option<String>,
    ) -> AdapterContext {
        AdapterContext::create(user_id, organization_id, request_id, ip_address, user_agent)
    }

    /// Aggregates per operation id
    pub fn get_performance_metrics(&self) -> PerformanceMetrics {
        self.metrics.snapshot()
    }

    pub fn get_health_status(&self) -> HealthStatus {
        let (operation_count, average_response_time) =
            weighted_average_time(&self.metrics.snapshot());
        HealthStatus {
            status: classify(average_response_time),
            adapter_name: self.config.adapter_name.clone(),
            version: self.config.version.clone(),
            uptime: self.started_at.elapsed().as_secs(),
            operation_count,
            average_response_time,
            error_rate: self.metrics.error_rate(),
        }
    }

    async fn run<T, F, Fut, G, GFut>(
        &self,
        operation_name: &str,
        ctx: &AdapterContext,
        operation: F,
        fallback: Option<G>,
    ) -> AdapterResult<T>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T>>,
        G: FnOnce() -> GFut,
        GFut: Future<Output = Result<T>>,
    {
        let operation_id = self.operation_id(operation_name);
        let start = Instant::now();

        info!(
            operation_id = %operation_id,
            user_id = ?ctx.user_id.map(|u| u.inner()),
            organization_id = ?ctx.organization_id.map(|o| o.inner()),
            request_id = %ctx.request_id,
            "Starting adapter operation"
        );

        let outcome = self.guarded(&operation_id, ctx, operation).await;
        let elapsed = start.elapsed();

        let err = match outcome {
            Ok(data) => {
                self.metrics.record_success(&operation_id, elapsed);
                info!(
                    operation_id = %operation_id,
                    execution_time_ms = to_millis(elapsed),
                    request_id = %ctx.request_id,
                    "Adapter operation completed"
                );
                return AdapterResult::ok(data).with_metadata(self.metadata(elapsed, false));
            }
            Err(err) => err,
        };

        // Gated-off calls say nothing about the adapter's own health
        if !err.is_disabled() {
            self.metrics.record_failure(&operation_id);
        }

        error!(
            operation_id = %operation_id,
            execution_time_ms = to_millis(elapsed),
            code = err.code(),
            error = %err,
            user_id = ?ctx.user_id.map(|u| u.inner()),
            organization_id = ?ctx.organization_id.map(|o| o.inner()),
            request_id = %ctx.request_id,
            "Adapter operation failed"
        );

        if err.allows_fallback() {
            if let Some(data) = self.attempt_fallback(&operation_id, ctx, fallback).await {
                return AdapterResult::ok(data).with_metadata(self.metadata(start.elapsed(), true));
            }
        }

        let info =
            err.to_error_info(operation_name, &self.config.adapter_name, &self.config.version);
        AdapterResult::err(info).with_metadata(self.metadata(elapsed, false))
    }

    async fn guarded<T, F, Fut>(
        &self,
        operation_id: &str,
        ctx: &AdapterContext,
        operation: F,
    ) -> Result<T>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        if !self.is_enabled(ctx).await {
            return Err(AdapterError::Disabled {
                adapter: self.config.adapter_name.clone(),
            });
        }

        if self.config.rate_limit_enabled && !self.rate_limiter.check(operation_id) {
            return Err(AdapterError::RateLimited {
                operation: operation_id.to_string(),
            });
        }

        self.bounded(operation_id, operation).await
    }

    /// Run under the operation timeout, converting panics into errors
    async fn bounded<T, F, Fut>(&self, operation_id: &str, operation: F) -> Result<T>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let guarded = AssertUnwindSafe(async move { operation().await }).catch_unwind();

        match tokio::time::timeout(self.config.operation_timeout, guarded).await {
            Ok(Ok(result)) => result,
            Ok(Err(payload)) => Err(AdapterError::Panicked(panic_message(payload.as_ref()))),
            Err(_) => Err(AdapterError::Timeout {
                operation: operation_id.to_string(),
                timeout_ms: duration_ms(self.config.operation_timeout),
            }),
        }
    }

    async fn attempt_fallback<T, G, GFut>(
        &self,
        operation_id: &str,
        ctx: &AdapterContext,
        fallback: Option<G>,
    ) -> Option<T>
    where
        G: FnOnce() -> GFut,
        GFut: Future<Output = Result<T>>,
    {
        let target = match (&self.config.fallback_adapter, self.config.fallback_enabled) {
            (Some(target), true) => target.as_str(),
            _ => return None,
        };

        warn!(
            operation_id = %operation_id,
            fallback_adapter = %target,
            request_id = %ctx.request_id,
            "Attempting fallback"
        );

        let Some(fallback) = fallback else {
            warn!(
                operation_id = %operation_id,
                fallback_adapter = %target,
                "No fallback hook for operation; returning original error"
            );
            return None;
        };

        match self.bounded(operation_id, fallback).await {
            Ok(data) => {
                info!(
                    operation_id = %operation_id,
                    fallback_adapter = %target,
                    "Fallback succeeded"
                );
                Some(data)
            }
            Err(e) => {
                error!(
                    operation_id = %operation_id,
                    fallback_adapter = %target,
                    error = %e,
                    "Fallback failed"
                );
                None
            }
        }
    }

    fn metadata(&self, elapsed: Duration, fallback_used: bool) -> ResultMetadata {
        ResultMetadata {
            execution_time: to_millis(elapsed),
            cache_hit: false,
            fallback_used,
            adapter_version: self.config.version.clone(),
        }
    }
}

fn paginate<T>(result: AdapterResult<Paged<T>>) -> PaginatedResult<T> {
    let metadata = result.metadata().cloned();
    let paginated = match result.into_result() {
        Ok((params, page)) => {
            let pagination = Pagination::new(params.page, params.limit, page.total_count);
            PaginatedResult::from_result(AdapterResult::ok(page.items), Some(pagination))
        }
        Err(error) => PaginatedResult::err(error),
    };
    match metadata {
        Some(metadata) => paginated.with_metadata(metadata),
        None => paginated,
    }
}

fn duration_ms(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

/// Ready-made fallback producing an empty page at the requested position
///
/// `params` re-validates the caller's pagination, since the fallback also
/// runs when the operation never got as far as validating it (flag off).
pub fn empty_page<T, P>(params: P) -> impl FnOnce() -> Ready<Result<Paged<T>>>
where
    P: FnOnce() -> Result<PaginationParams>,
{
    move || future::ready(params().map(|params| (params, Page::empty())))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{
        FailingEvaluator, HangingEvaluator, PanickingEvaluator, StaticEvaluator,
    };
    use engage_types::SortOrder;

    fn adapter(config: AdapterConfig, evaluator: Arc<dyn FeatureFlagEvaluator>) -> BaseAdapter {
        BaseAdapter::new(config, evaluator, Environment::Test)
    }

    fn ctx() -> AdapterContext {
        AdapterContext::for_user(UserId::new(7), OrganizationId::new(42))
    }

    async fn exploding_store() -> Result<u8> {
        panic!("store exploded")
    }

    async fn exploding_fallback() -> Result<u8> {
        panic!("fallback exploded")
    }

    #[tokio::test]
    async fn test_no_flag_always_enabled() {
        // Evaluator would fail, but it is never consulted
        let base = adapter(AdapterConfig::new("a"), Arc::new(FailingEvaluator));
        assert!(base.is_enabled(&ctx()).await);

        let result = base.execute_operation("b", &ctx(), || async { Ok(5) }).await;
        assert!(result.is_success());
        assert_eq!(result.data(), Some(&5));
        let metadata = result.metadata().unwrap();
        assert!(!metadata.cache_hit);
        assert!(!metadata.fallback_used);
        assert_eq!(metadata.adapter_version, "1.0.0");
    }

    #[tokio::test]
    async fn test_disabled_flag_yields_disabled_error() {
        let config = AdapterConfig::new("EmployeeAdapter").with_feature_flag("x_enabled");
        let base = adapter(config, Arc::new(StaticEvaluator::new(false)));

        let result = base
            .execute_operation("getEmployee", &ctx(), || async { Ok::<_, AdapterError>(1) })
            .await;
        assert!(!result.is_success());
        assert!(result.data().is_none());
        let error = result.error().unwrap();
        assert_eq!(error.message, "Adapter EmployeeAdapter is disabled via feature flag");
        assert_eq!(error.code, "ADAPTER_DISABLED");
        assert!(result.metadata().is_some());
    }

    #[tokio::test]
    async fn test_disabled_operation_is_not_run() {
        let config = AdapterConfig::new("a").with_feature_flag("x_enabled");
        let base = adapter(config, Arc::new(StaticEvaluator::new(false)));
        let ran = std::sync::atomic::AtomicBool::new(false);
        let _ = base
            .execute_operation("b", &ctx(), || async {
                ran.store(true, std::sync::atomic::Ordering::SeqCst);
                Ok(())
            })
            .await;
        assert!(!ran.load(std::sync::atomic::Ordering::SeqCst));
    }

    #[tokio::test]
    async fn test_evaluator_error_fails_closed_in_every_environment() {
        for env in [Environment::Development, Environment::Production] {
            let config = AdapterConfig::new("a").with_feature_flag("x_enabled");
            let base = BaseAdapter::new(config, Arc::new(FailingEvaluator), env);
            assert!(!base.is_enabled(&ctx()).await);
        }
    }

    #[tokio::test]
    async fn test_evaluator_panic_fails_closed() {
        let config = AdapterConfig::new("a").with_feature_flag("x_enabled");
        let base = adapter(config, Arc::new(PanickingEvaluator));
        let result = base.execute_operation("b", &ctx(), || async { Ok(1) }).await;
        assert_eq!(result.error().unwrap().code, "ADAPTER_DISABLED");
    }

    #[tokio::test(start_paused = true)]
    async fn test_hung_evaluator_fails_closed_within_timeout() {
        let config = AdapterConfig::new("a")
            .with_feature_flag("x_enabled")
            .with_operation_timeout(Duration::from_millis(100));
        let base = adapter(config, Arc::new(HangingEvaluator));

        let op_ctx = ctx();
        let call = base.execute_operation("b", &op_ctx, || async { Ok(1) });
        let result = tokio::time::timeout(Duration::from_secs(3600), call)
            .await
            .expect("hung evaluator must not hang the operation");
        assert_eq!(result.error().unwrap().code, "ADAPTER_DISABLED");
        assert_eq!(base.get_health_status().error_rate, 0.0);
    }

    #[tokio::test]
    async fn test_operation_error_envelope() {
        let base = adapter(
            AdapterConfig::new("EmployeeAdapter"),
            Arc::new(StaticEvaluator::new(true)),
        );
        let result: AdapterResult<()> = base
            .execute_operation("getEmployee", &ctx(), || async {
                Err(AdapterError::NotFound {
                    entity: "Employee",
                    id: 3,
                })
            })
            .await;

        let error = result.error().unwrap();
        assert_eq!(error.code, "NOT_FOUND");
        let details = error.details.as_ref().unwrap();
        assert_eq!(details["operation"], "getEmployee");
        assert_eq!(details["adapter"], "EmployeeAdapter");
        assert_eq!(details["version"], "1.0.0");
        assert_eq!(base.get_health_status().error_rate, 1.0);
    }

    #[tokio::test]
    async fn test_panicking_operation_is_contained() {
        let base = adapter(AdapterConfig::new("a"), Arc::new(StaticEvaluator::new(true)));
        let result = base.execute_operation("b", &ctx(), exploding_store).await;
        let error = result.error().unwrap();
        assert_eq!(error.code, "ADAPTER_ERROR");
        assert!(error.message.contains("store exploded"));
    }

    #[tokio::test]
    async fn test_synchronous_panic_in_closure_is_contained() {
        let base = adapter(AdapterConfig::new("a"), Arc::new(StaticEvaluator::new(true)));
        let result: AdapterResult<u8> = base
            .execute_operation("b", &ctx(), || -> Ready<Result<u8>> {
                panic!("before future")
            })
            .await;
        assert_eq!(result.error().unwrap().code, "ADAPTER_ERROR");
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout() {
        let config = AdapterConfig::new("a").with_operation_timeout(Duration::from_millis(100));
        let base = adapter(config, Arc::new(StaticEvaluator::new(true)));
        let result = base
            .execute_operation("slow", &ctx(), || async {
                tokio::time::sleep(Duration::from_secs(10)).await;
                Ok(())
            })
            .await;
        let error = result.error().unwrap();
        assert_eq!(error.code, "TIMEOUT");
        assert_eq!(error.details.as_ref().unwrap()["timeoutMs"], 100);
    }

    #[tokio::test(start_paused = true)]
    async fn test_execution_times_aggregate() {
        let base = adapter(AdapterConfig::new("a"), Arc::new(StaticEvaluator::new(true)));
        for ms in [120u64, 340] {
            let result = base
                .execute_operation("b", &ctx(), || async move {
                    tokio::time::sleep(Duration::from_millis(ms)).await;
                    Ok(())
                })
                .await;
            assert!(result.is_success());
        }

        let metrics = base.get_performance_metrics();
        let stats = &metrics["a.b"];
        assert_eq!(stats.operation_count, 2);
        assert!((stats.min_time - 120.0).abs() < 2.0);
        assert!((stats.max_time - 340.0).abs() < 2.0);
        assert!((stats.average_time - 230.0).abs() < 2.0);
        assert!((stats.last_execution_time - 340.0).abs() < 2.0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_health_thresholds() {
        for (ms, expected) in [
            (500u64, crate::health::HealthLevel::Healthy),
            (2_000, crate::health::HealthLevel::Degraded),
            (8_000, crate::health::HealthLevel::Unhealthy),
        ] {
            let base = adapter(AdapterConfig::new("a"), Arc::new(StaticEvaluator::new(true)));
            base.execute_operation("b", &ctx(), || async move {
                tokio::time::sleep(Duration::from_millis(ms)).await;
                Ok(())
            })
            .await;
            let health = base.get_health_status();
            assert_eq!(health.status, expected, "{} ms", ms);
            assert_eq!(health.operation_count, 1);
            assert_eq!(health.error_rate, 0.0);
        }
    }

    #[tokio::test]
    async fn test_empty_metrics_and_fresh_health() {
        let base = adapter(AdapterConfig::new("a"), Arc::new(StaticEvaluator::new(true)));
        assert!(base.get_performance_metrics().is_empty());
        let health = base.get_health_status();
        assert_eq!(health.status, crate::health::HealthLevel::Healthy);
        assert_eq!(health.operation_count, 0);
        assert_eq!(health.average_response_time, 0.0);
        assert_eq!(health.adapter_name, "a");
    }

    #[tokio::test]
    async fn test_disabled_calls_do_not_count_as_errors() {
        let config = AdapterConfig::new("a").with_feature_flag("x_enabled");
        let base = adapter(config, Arc::new(StaticEvaluator::new(false)));
        let _ = base.execute_operation("b", &ctx(), || async { Ok(()) }).await;
        assert_eq!(base.get_health_status().error_rate, 0.0);
    }

    #[tokio::test]
    async fn test_rate_limit() {
        let config = AdapterConfig::new("a").with_rate_limit(2, Duration::from_secs(60));
        let base = adapter(config, Arc::new(StaticEvaluator::new(true)));
        for _ in 0..2 {
            let result = base.execute_operation("b", &ctx(), || async { Ok(()) }).await;
            assert!(result.is_success());
        }
        let limited = base.execute_operation("b", &ctx(), || async { Ok(()) }).await;
        assert_eq!(limited.error().unwrap().code, "RATE_LIMITED");

        // Separate operation ids have separate budgets
        let other = base.execute_operation("c", &ctx(), || async { Ok(()) }).await;
        assert!(other.is_success());
    }

    #[tokio::test]
    async fn test_fallback_used_when_configured() {
        let config = AdapterConfig::new("a").with_fallback("legacy");
        let base = adapter(config, Arc::new(StaticEvaluator::new(true)));
        let result = base
            .execute_with_fallback(
                "b",
                &ctx(),
                || async { Err::<u8, _>(AdapterError::Store(anyhow::anyhow!("db down"))) },
                || async { Ok(9) },
            )
            .await;
        assert!(result.is_success());
        assert_eq!(result.data(), Some(&9));
        assert!(result.metadata().unwrap().fallback_used);
    }

    #[tokio::test]
    async fn test_fallback_skipped_when_not_configured() {
        let base = adapter(AdapterConfig::new("a"), Arc::new(StaticEvaluator::new(true)));
        let result = base
            .execute_with_fallback(
                "b",
                &ctx(),
                || async { Err::<u8, _>(AdapterError::Store(anyhow::anyhow!("db down"))) },
                || async { Ok(9) },
            )
            .await;
        assert!(!result.is_success());
        assert!(!result.metadata().unwrap().fallback_used);
    }

    #[tokio::test]
    async fn test_failed_fallback_returns_original_error() {
        let config = AdapterConfig::new("a").with_fallback("legacy");
        let base = adapter(config, Arc::new(StaticEvaluator::new(true)));
        let result = base
            .execute_with_fallback(
                "b",
                &ctx(),
                || async { Err::<u8, _>(AdapterError::Store(anyhow::anyhow!("db down"))) },
                exploding_fallback,
            )
            .await;
        assert_eq!(result.error().unwrap().code, "ADAPTER_ERROR");
        assert!(!result.metadata().unwrap().fallback_used);
    }

    #[tokio::test]
    async fn test_caller_errors_skip_fallback() {
        let config = AdapterConfig::new("a").with_fallback("legacy");
        let base = adapter(config, Arc::new(StaticEvaluator::new(true)));
        let caller_errors: [fn() -> AdapterError; 3] = [
            || AdapterError::Validation("limit: must be between 1 and 100".into()),
            || AdapterError::NotFound {
                entity: "Post",
                id: 4,
            },
            || AdapterError::Forbidden {
                action: "delete post 4".into(),
            },
        ];
        for make_error in caller_errors {
            let expected = make_error().code();
            let fallback_ran = std::sync::atomic::AtomicBool::new(false);
            let result = base
                .execute_with_fallback(
                    "b",
                    &ctx(),
                    || async move { Err::<u8, _>(make_error()) },
                    || async {
                        fallback_ran.store(true, std::sync::atomic::Ordering::SeqCst);
                        Ok(9)
                    },
                )
                .await;
            assert_eq!(result.error().unwrap().code, expected);
            assert!(!result.metadata().unwrap().fallback_used);
            assert!(!fallback_ran.load(std::sync::atomic::Ordering::SeqCst));
        }
    }

    #[tokio::test]
    async fn test_rate_limited_call_skips_fallback() {
        let config = AdapterConfig::new("a")
            .with_fallback("legacy")
            .with_rate_limit(1, Duration::from_secs(60));
        let base = adapter(config, Arc::new(StaticEvaluator::new(true)));
        let first = base
            .execute_with_fallback("b", &ctx(), || async { Ok(1) }, || async { Ok(9) })
            .await;
        assert_eq!(first.data(), Some(&1));

        let limited = base
            .execute_with_fallback("b", &ctx(), || async { Ok(1) }, || async { Ok(9) })
            .await;
        assert_eq!(limited.error().unwrap().code, "RATE_LIMITED");
    }

    #[tokio::test]
    async fn test_disabled_adapter_uses_fallback() {
        let config = AdapterConfig::new("a")
            .with_feature_flag("x_enabled")
            .with_fallback("legacy");
        let base = adapter(config, Arc::new(StaticEvaluator::new(false)));
        let result = base
            .execute_with_fallback("b", &ctx(), || async { Ok(1) }, || async { Ok(9) })
            .await;
        assert_eq!(result.data(), Some(&9));
        assert!(result.metadata().unwrap().fallback_used);
    }

    #[tokio::test]
    async fn test_configured_fallback_without_hook_only_logs() {
        let config = AdapterConfig::new("a").with_fallback("legacy");
        let base = adapter(config, Arc::new(StaticEvaluator::new(true)));
        let result = base
            .execute_operation("b", &ctx(), || async {
                Err::<u8, _>(AdapterError::Store(anyhow::anyhow!("db down")))
            })
            .await;
        assert_eq!(result.error().unwrap().code, "ADAPTER_ERROR");
    }

    #[tokio::test]
    async fn test_paginated_success() {
        let base = adapter(AdapterConfig::new("a"), Arc::new(StaticEvaluator::new(true)));
        let params = PaginationParams {
            page: 2,
            limit: 10,
            sort_by: None,
            sort_order: SortOrder::Asc,
        };
        let result = base
            .execute_paginated("list", &ctx(), || async move {
                Ok((params, Page::new(vec![1, 2, 3], 23)))
            })
            .await;
        assert!(result.is_success());
        assert_eq!(result.items(), Some(&[1, 2, 3][..]));
        let pagination = result.pagination().unwrap();
        assert_eq!(pagination.total_pages, 3);
        assert!(pagination.has_next);
        assert!(pagination.has_prev);
        assert!(result.metadata().is_some());
    }

    #[tokio::test]
    async fn test_paginated_failure_has_no_pagination() {
        let base = adapter(AdapterConfig::new("a"), Arc::new(StaticEvaluator::new(true)));
        let result: PaginatedResult<u8> = base
            .execute_paginated("list", &ctx(), || async {
                Err(AdapterError::Validation("limit".into()))
            })
            .await;
        assert!(!result.is_success());
        assert!(result.pagination().is_none());
        assert!(result.items().is_none());
    }

    #[tokio::test]
    async fn test_paginated_fallback_empty_page() {
        let config = AdapterConfig::new("a").with_fallback("legacy");
        let base = adapter(config, Arc::new(StaticEvaluator::new(true)));
        let requested = PaginationParams {
            page: 3,
            limit: 10,
            sort_by: None,
            sort_order: SortOrder::Desc,
        };
        let fallback_params = requested.clone();
        let result: PaginatedResult<u8> = base
            .execute_paginated_with_fallback(
                "feed",
                &ctx(),
                || async { Err(AdapterError::Store(anyhow::anyhow!("db down"))) },
                empty_page(move || Ok(fallback_params)),
            )
            .await;
        assert!(result.is_success());
        assert_eq!(result.items(), Some(&[][..]));
        let pagination = result.pagination().unwrap();
        assert_eq!(pagination.current_page, 3);
        assert_eq!(pagination.limit, 10);
        assert_eq!(pagination.total_pages, 0);
        assert!(result.metadata().unwrap().fallback_used);
    }

    #[tokio::test]
    async fn test_empty_page_with_invalid_params_keeps_original_error() {
        let config = AdapterConfig::new("a")
            .with_feature_flag("x_enabled")
            .with_fallback("legacy");
        let base = adapter(config, Arc::new(StaticEvaluator::new(false)));
        let result: PaginatedResult<u8> = base
            .execute_paginated_with_fallback(
                "feed",
                &ctx(),
                || async { Ok((PaginationParams::default(), Page::empty())) },
                empty_page(|| Err(AdapterError::Validation("limit".into()))),
            )
            .await;
        assert_eq!(result.error().unwrap().code, "ADAPTER_DISABLED");
        assert!(result.pagination().is_none());
    }

    #[tokio::test]
    async fn test_create_context() {
        let base = BaseAdapter::new(
            AdapterConfig::new("a"),
            Arc::new(StaticEvaluator::new(true)),
            Environment::Test,
        );
        let generated = base.create_context(Some(UserId::new(1)), None, None, None, None);
        assert!(generated.request_id.starts_with("req_"));
        let given =
            base.create_context(None, None, Some("req_x".into()), Some("10.0.0.1".into()), None);
        assert_eq!(given.request_id, "req_x");
        assert_eq!(given.ip_address.as_deref(), Some("10.0.0.1"));
        assert_eq!(base.operation_id("b"), "a.b");
    }
}
