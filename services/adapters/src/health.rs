//! Adapter health classification

use engage_config::service::health::{DEGRADED_THRESHOLD_MS, HEALTHY_THRESHOLD_MS};
pub use engage_health_check::HealthLevel;
use serde::Serialize;

/// Health snapshot of one adapter
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthStatus {
    pub status: HealthLevel,
    pub adapter_name: String,
    pub version: String,
    /// Seconds since the adapter was constructed
    pub uptime: u64,
    pub operation_count: usize,
    /// Operation-count weighted mean, milliseconds
    pub average_response_time: f64,
    /// Failed share of recent outcomes, 0.0 to 1.0
    pub error_rate: f64,
}

/// Classify a weighted average response time
pub fn classify(average_response_time_ms: f64) -> HealthLevel {
    if average_response_time_ms < HEALTHY_THRESHOLD_MS {
        HealthLevel::Healthy
    } else if average_response_time_ms < DEGRADED_THRESHOLD_MS {
        HealthLevel::Degraded
    } else {
        HealthLevel::Unhealthy
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_thresholds() {
        assert_eq!(classify(0.0), HealthLevel::Healthy);
        assert_eq!(classify(500.0), HealthLevel::Healthy);
        assert_eq!(classify(999.9), HealthLevel::Healthy);
        assert_eq!(classify(1000.0), HealthLevel::Degraded);
        assert_eq!(classify(2000.0), HealthLevel::Degraded);
        assert_eq!(classify(5000.0), HealthLevel::Unhealthy);
        assert_eq!(classify(8000.0), HealthLevel::Unhealthy);
    }

    #[test]
    fn test_serializes_camel_case() {
        let status = HealthStatus {
            status: HealthLevel::Degraded,
            adapter_name: "EmployeeAdapter".to_string(),
            version: "1.0.0".to_string(),
            uptime: 3,
            operation_count: 2,
            average_response_time: 1500.0,
            error_rate: 0.0,
        };
        let json = serde_json::to_value(&status).unwrap();
        assert_eq!(json["status"], "degraded");
        assert_eq!(json["adapterName"], "EmployeeAdapter");
        assert_eq!(json["averageResponseTime"], 1500.0);
        assert_eq!(json["errorRate"], 0.0);
    }
}
