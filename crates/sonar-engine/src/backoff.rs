//! Requeue scheduling after a pass
//!
//! Two failure policies exist and are kept distinct: a fixed interval that
//! ignores the failure count, and an exponential delay driven by the failure
//! count persisted in status. Only the exponential policy increments that
//! count.

use std::time::Duration;

use sonar_common::{REQUEUE_DEPENDENCY_SECS, REQUEUE_ERROR_SECS, REQUEUE_SUCCESS_SECS};

/// Delay before retrying a failed pass
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum BackoffPolicy {
    /// Same delay after every failure
    Fixed {
        /// Retry interval
        interval: Duration,
    },
    /// `base * e^(failureCount + 1)`, clamped at `max`
    Exponential {
        /// Base delay
        base: Duration,
        /// Upper bound
        max: Duration,
    },
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        BackoffPolicy::Fixed {
            interval: Duration::from_secs(REQUEUE_ERROR_SECS),
        }
    }
}

impl BackoffPolicy {
    /// Delay after a failure, given the failure count stored before it
    pub fn delay(&self, failure_count: u32) -> Duration {
        match *self {
            BackoffPolicy::Fixed { interval } => interval,
            BackoffPolicy::Exponential { base, max } => {
                let secs = base.as_secs_f64() * (f64::from(failure_count) + 1.0).exp();
                if !secs.is_finite() || secs >= max.as_secs_f64() {
                    max
                } else {
                    Duration::from_secs_f64(secs)
                }
            }
        }
    }

    /// Failure count to persist after a failure
    pub fn next_failure_count(&self, failure_count: u32) -> u32 {
        match self {
            BackoffPolicy::Fixed { .. } => failure_count,
            BackoffPolicy::Exponential { .. } => failure_count.saturating_add(1),
        }
    }
}

/// Requeue intervals for every pass outcome
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RequeuePolicy {
    /// Failed pass
    pub backoff: BackoffPolicy,
    /// Successful pass (drift detection)
    pub success_interval: Duration,
    /// Connection not ready
    pub dependency_interval: Duration,
}

impl Default for RequeuePolicy {
    fn default() -> Self {
        Self {
            backoff: BackoffPolicy::default(),
            success_interval: Duration::from_secs(REQUEUE_SUCCESS_SECS),
            dependency_interval: Duration::from_secs(REQUEUE_DEPENDENCY_SECS),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fixed_ignores_failure_count() {
        let policy = BackoffPolicy::default();
        assert_eq!(policy.delay(0), Duration::from_secs(30));
        assert_eq!(policy.delay(50), Duration::from_secs(30));
        assert_eq!(policy.next_failure_count(3), 3);
    }

    #[test]
    fn exponential_grows_with_failure_count() {
        let policy = BackoffPolicy::Exponential {
            base: Duration::from_secs(1),
            max: Duration::from_secs(3600),
        };
        // e^1, e^2, e^3
        assert_eq!(policy.delay(0).as_millis(), 2718);
        assert_eq!(policy.delay(1).as_millis(), 7389);
        assert_eq!(policy.delay(2).as_millis(), 20085);
        assert_eq!(policy.next_failure_count(2), 3);
    }

    #[test]
    fn exponential_is_clamped() {
        let policy = BackoffPolicy::Exponential {
            base: Duration::from_secs(1),
            max: Duration::from_secs(3600),
        };
        // e^9 > 3600
        assert_eq!(policy.delay(8), Duration::from_secs(3600));
        assert_eq!(policy.delay(u32::MAX), Duration::from_secs(3600));
        assert_eq!(policy.next_failure_count(u32::MAX), u32::MAX);
    }

    #[test]
    fn default_requeue_intervals() {
        let policy = RequeuePolicy::default();
        assert_eq!(policy.success_interval, Duration::from_secs(300));
        assert_eq!(policy.dependency_interval, Duration::from_secs(10));
    }
}
