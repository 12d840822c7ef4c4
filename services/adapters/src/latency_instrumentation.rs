//! # Operation Latency Instrumentation
//!
//! ## Purpose
//!
//! Rolling per-operation execution-time and outcome series owned by one
//! adapter instance. Feeds `get_performance_metrics()` and the health status.
//!
//! ## Storage
//!
//! - One entry per operation id (`"<adapterName>.<operationName>"`)
//! - Up to [`METRIC_SERIES_CAPACITY`] most recent execution times, oldest
//!   evicted first, kept in recording order
//! - Up to [`METRIC_SERIES_CAPACITY`] most recent outcomes (success / failure)
//!
//! Only execution times of successful operations enter the latency series;
//! every outcome enters the outcome series. Raw series are never exposed,
//! only derived aggregates.
//!
//! ## Concurrency
//!
//! A `parking_lot::Mutex` guards the map. It is held only for the push/evict
//! or the aggregate computation, never across an await.

use engage_config::service::adapters::METRIC_SERIES_CAPACITY;
use parking_lot::Mutex;
use serde::Serialize;
use std::collections::{BTreeMap, HashMap, VecDeque};
use std::time::Duration;

/// Aggregates for one operation id, times in milliseconds
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OperationStats {
    pub operation_count: usize,
    pub average_time: f64,
    pub min_time: f64,
    pub max_time: f64,
    pub last_execution_time: f64,
}

/// Snapshot of every non-empty series, keyed by operation id
pub type PerformanceMetrics = BTreeMap<String, OperationStats>;

#[derive(Debug, Default)]
struct OperationSeries {
    samples: VecDeque<Duration>,
    outcomes: VecDeque<bool>,
}

impl OperationSeries {
    fn push_sample(&mut self, elapsed: Duration, capacity: usize) {
        if self.samples.len() == capacity {
            self.samples.pop_front();
        }
        self.samples.push_back(elapsed);
    }

    fn push_outcome(&mut self, success: bool, capacity: usize) {
        if self.outcomes.len() == capacity {
            self.outcomes.pop_front();
        }
        self.outcomes.push_back(success);
    }

    fn stats(&self) -> Option<OperationStats> {
        let last = *self.samples.back()?;
        let mut total = 0.0;
        let mut min = f64::MAX;
        let mut max = f64::MIN;
        for sample in &self.samples {
            let ms = to_millis(*sample);
            total += ms;
            min = min.min(ms);
            max = max.max(ms);
        }
        Some(OperationStats {
            operation_count: self.samples.len(),
            average_time: total / self.samples.len() as f64,
            min_time: min,
            max_time: max,
            last_execution_time: to_millis(last),
        })
    }
}

/// Convert a duration to fractional milliseconds
pub fn to_millis(duration: Duration) -> f64 {
    duration.as_micros() as f64 / 1_000.0
}

/// Bounded per-operation metric store
#[derive(Debug)]
pub struct OperationMetrics {
    capacity: usize,
    series: Mutex<HashMap<String, OperationSeries>>,
}

impl OperationMetrics {
    pub fn new() -> Self {
        Self::with_capacity(METRIC_SERIES_CAPACITY)
    }

    /// Store with a custom per-series bound (at least 1)
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            series: Mutex::new(HashMap::new()),
        }
    }

    /// Record a successful execution
    pub fn record_success(&self, operation_id: &str, elapsed: Duration) {
        let mut series = self.series.lock();
        let entry = series.entry(operation_id.to_string()).or_default();
        entry.push_sample(elapsed, self.capacity);
        entry.push_outcome(true, self.capacity);
    }

    /// Record a failed execution
    pub fn record_failure(&self, operation_id: &str) {
        let mut series = self.series.lock();
        series
            .entry(operation_id.to_string())
            .or_default()
            .push_outcome(false, self.capacity);
    }

    /// Aggregates per operation id; empty series omitted
    pub fn snapshot(&self) -> PerformanceMetrics {
        let series = self.series.lock();
        series
            .iter()
            .filter_map(|(id, s)| s.stats().map(|stats| (id.clone(), stats)))
            .collect()
    }

    /// Failures over recorded outcomes across every operation id
    pub fn error_rate(&self) -> f64 {
        let series = self.series.lock();
        let (failures, total) = series.values().fold((0usize, 0usize), |(f, t), s| {
            (f + s.outcomes.iter().filter(|ok| !**ok).count(), t + s.outcomes.len())
        });
        if total == 0 {
            0.0
        } else {
            failures as f64 / total as f64
        }
    }

    #[cfg(test)]
    fn samples(&self, operation_id: &str) -> Vec<Duration> {
        self.series
            .lock()
            .get(operation_id)
            .map(|s| s.samples.iter().copied().collect())
            .unwrap_or_default()
    }
}

impl Default for OperationMetrics {
    fn default() -> Self {
        Self::new()
    }
}

/// Operation-count weighted mean of `average_time` across operations
pub fn weighted_average_time(metrics: &PerformanceMetrics) -> (usize, f64) {
    let count: usize = metrics.values().map(|s| s.operation_count).sum();
    if count == 0 {
        return (0, 0.0);
    }
    let weighted: f64 = metrics
        .values()
        .map(|s| s.average_time * s.operation_count as f64)
        .sum();
    (count, weighted / count as f64)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_two_samples_aggregate() {
        let metrics = OperationMetrics::new();
        metrics.record_success("a.b", Duration::from_millis(120));
        metrics.record_success("a.b", Duration::from_millis(340));

        let snapshot = metrics.snapshot();
        assert_eq!(
            snapshot["a.b"],
            OperationStats {
                operation_count: 2,
                average_time: 230.0,
                min_time: 120.0,
                max_time: 340.0,
                last_execution_time: 340.0,
            }
        );
    }

    #[test]
    fn test_series_keeps_most_recent_in_order() {
        let metrics = OperationMetrics::new();
        for ms in 1..=150u64 {
            metrics.record_success("a.b", Duration::from_millis(ms));
        }
        let samples = metrics.samples("a.b");
        assert_eq!(samples.len(), 100);
        let expected: Vec<Duration> = (51..=150u64).map(Duration::from_millis).collect();
        assert_eq!(samples, expected);
        assert_eq!(metrics.snapshot()["a.b"].operation_count, 100);
    }

    #[test]
    fn test_failures_only_are_omitted_from_snapshot() {
        let metrics = OperationMetrics::new();
        metrics.record_failure("a.broken");
        assert!(metrics.snapshot().is_empty());
        assert_eq!(metrics.error_rate(), 1.0);
    }

    #[test]
    fn test_error_rate() {
        let metrics = OperationMetrics::new();
        assert_eq!(metrics.error_rate(), 0.0);
        metrics.record_success("a.b", Duration::from_millis(1));
        metrics.record_success("a.c", Duration::from_millis(1));
        metrics.record_success("a.c", Duration::from_millis(1));
        metrics.record_failure("a.b");
        assert_eq!(metrics.error_rate(), 0.25);
    }

    #[test]
    fn test_outcome_series_is_bounded() {
        let metrics = OperationMetrics::with_capacity(4);
        for _ in 0..10 {
            metrics.record_failure("a.b");
        }
        for _ in 0..4 {
            metrics.record_success("a.b", Duration::from_millis(1));
        }
        assert_eq!(metrics.error_rate(), 0.0);
    }

    #[test]
    fn test_weighted_average() {
        let metrics = OperationMetrics::new();
        metrics.record_success("a.fast", Duration::from_millis(100));
        metrics.record_success("a.fast", Duration::from_millis(100));
        metrics.record_success("a.fast", Duration::from_millis(100));
        metrics.record_success("a.slow", Duration::from_millis(900));
        let (count, avg) = weighted_average_time(&metrics.snapshot());
        assert_eq!(count, 4);
        assert_eq!(avg, 300.0);
    }

    #[test]
    fn test_sub_millisecond_precision() {
        assert_eq!(to_millis(Duration::from_micros(1_500)), 1.5);
    }
}
