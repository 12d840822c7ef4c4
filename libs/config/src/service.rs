//! Service configuration defaults
//!
//! Default values shared by the config loader and the adapter constructors so
//! both sides agree on what "unset" means.

/// Adapter execution defaults
pub mod adapters {
    /// Adapter version reported in result metadata when none is configured
    pub const DEFAULT_VERSION: &str = "1.0.0";

    /// Response cache disabled unless configured
    pub const CACHE_ENABLED: bool = false;

    /// Cache entry lifetime (seconds)
    pub const CACHE_TTL_SECS: u64 = 300;

    /// Fallback hook disabled unless configured
    pub const FALLBACK_ENABLED: bool = false;

    /// Rate limiting disabled unless configured
    pub const RATE_LIMIT_ENABLED: bool = false;

    /// Operations allowed per window when rate limiting is on
    pub const RATE_LIMIT_MAX: u32 = 100;

    /// Rate limit window (milliseconds)
    pub const RATE_LIMIT_WINDOW_MS: u64 = 60_000;

    /// Upper bound on a single wrapped operation (milliseconds)
    pub const OPERATION_TIMEOUT_MS: u64 = 30_000;

    /// Recent execution-time samples kept per operation
    pub const METRIC_SERIES_CAPACITY: usize = 100;
}

/// Health classification thresholds
pub mod health {
    /// Weighted average response time below which an adapter is healthy (ms)
    pub const HEALTHY_THRESHOLD_MS: f64 = 1_000.0;

    /// Weighted average response time below which an adapter is degraded (ms)
    pub const DEGRADED_THRESHOLD_MS: f64 = 5_000.0;

    /// Health endpoint bind address
    pub const BIND_ADDRESS: &str = "127.0.0.1";

    /// Health endpoint port
    pub const PORT: u16 = 8081;
}

/// Rollout defaults
pub mod rollout {
    /// Percentage used when an adapter is enabled without an explicit rollout
    pub const FULL_ROLLOUT_PERCENTAGE: u8 = 100;

    /// Initial percentage when migrating an organization onto adapters
    pub const MIGRATION_ROLLOUT_PERCENTAGE: u8 = 10;
}
