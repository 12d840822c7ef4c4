//! Rate limiting for adapter operations

use dashmap::DashMap;
use governor::{DefaultDirectRateLimiter, Quota};
use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::Duration;

/// Per-operation rate limiter
///
/// Each operation id gets its own direct limiter allowing `max` calls per
/// `window`, with a burst of `max`. Limiters are created on first use.
pub struct RateLimiter {
    quota: Option<Quota>,
    limiters: DashMap<String, Arc<DefaultDirectRateLimiter>>,
}

impl RateLimiter {
    /// Create a limiter; a zero `max` or `window` disables limiting
    pub fn new(max: u32, window: Duration) -> Self {
        let quota = NonZeroU32::new(max).and_then(|burst| {
            let period = window / burst.get();
            if period.is_zero() {
                tracing::warn!("Rate limit window {:?} too small for {} requests", window, max);
                return None;
            }
            Quota::with_period(period).map(|q| q.allow_burst(burst))
        });

        if quota.is_none() {
            tracing::warn!("Invalid rate limit: {} per {:?}; limiting disabled", max, window);
        }

        Self {
            quota,
            limiters: DashMap::new(),
        }
    }

    /// A limiter that allows everything
    pub fn unlimited() -> Self {
        Self {
            quota: None,
            limiters: DashMap::new(),
        }
    }

    /// Check if a call is allowed (non-blocking)
    pub fn check(&self, operation_id: &str) -> bool {
        let Some(quota) = self.quota else {
            return true;
        };

        let limiter = match self.limiters.get(operation_id) {
            Some(limiter) => Arc::clone(limiter.value()),
            None => Arc::clone(
                self.limiters
                    .entry(operation_id.to_string())
                    .or_insert_with(|| Arc::new(DefaultDirectRateLimiter::direct(quota)))
                    .value(),
            ),
        };

        limiter.check().is_ok()
    }

    /// Number of operation ids with a live limiter
    pub fn tracked_operations(&self) -> usize {
        self.limiters.len()
    }
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::unlimited()
    }
}
