//! Metrics registry for the SonarQube operator
//!
//! Provides OpenTelemetry metrics for:
//! - Reconcile passes (duration, errors) per managed kind
//! - Remote calls against the SonarQube Web API
//! - Status writes issued and suppressed

use once_cell::sync::Lazy;
use opentelemetry::global;
use opentelemetry::metrics::{Counter, Histogram, Meter};
use opentelemetry::KeyValue;

/// Global meter for operator metrics
static METER: Lazy<Meter> = Lazy::new(|| global::meter("sonar-operator"));

// ============================================================================
// Reconcile Metrics
// ============================================================================

/// Histogram of reconcile pass duration
///
/// Labels:
/// - `kind`: group, user, permission_template, quality_gate, quality_profile, project
/// - `result`: success, error, dependency_not_ready
pub static RECONCILE_DURATION: Lazy<Histogram<f64>> = Lazy::new(|| {
    METER
        .f64_histogram("sonar_reconcile_duration_seconds")
        .with_description("Duration of reconcile passes in seconds")
        .with_unit("s")
        .build()
});

/// Counter of failed reconcile passes
///
/// Labels:
/// - `kind`: managed kind
/// - `error_type`: transient, permanent, dependency, conflict
pub static RECONCILE_ERRORS: Lazy<Counter<u64>> = Lazy::new(|| {
    METER
        .u64_counter("sonar_reconcile_errors_total")
        .with_description("Total number of failed reconcile passes")
        .with_unit("{errors}")
        .build()
});

/// Counter of status writes
///
/// Labels:
/// - `kind`: managed kind
/// - `outcome`: written, suppressed
pub static STATUS_WRITES: Lazy<Counter<u64>> = Lazy::new(|| {
    METER
        .u64_counter("sonar_status_writes_total")
        .with_description("Status writes issued or suppressed as unchanged")
        .with_unit("{writes}")
        .build()
});

// ============================================================================
// Remote Call Metrics
// ============================================================================

/// Counter of SonarQube Web API calls
///
/// Labels:
/// - `operation`: endpoint path (e.g. api/user_groups/create)
/// - `result`: success, not_found, error
pub static REMOTE_OPERATIONS: Lazy<Counter<u64>> = Lazy::new(|| {
    METER
        .u64_counter("sonar_remote_operations_total")
        .with_description("Total number of SonarQube Web API calls")
        .with_unit("{calls}")
        .build()
});

/// Classification of a failed pass for the error counter
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ErrorType {
    /// Will likely succeed on retry
    Transient,
    /// Needs a spec change
    Permanent,
    /// Connection not ready
    Dependency,
    /// Object changed underneath the write
    Conflict,
}

impl ErrorType {
    /// Label value
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Transient => "transient",
            Self::Permanent => "permanent",
            Self::Dependency => "dependency",
            Self::Conflict => "conflict",
        }
    }

    /// Classify an operator error
    pub fn of(error: &crate::Error) -> Self {
        if error.is_dependency_not_ready() {
            Self::Dependency
        } else if error.is_conflict() {
            Self::Conflict
        } else if error.is_retryable() {
            Self::Transient
        } else {
            Self::Permanent
        }
    }
}

/// Result label for a remote call
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RemoteResult {
    /// 2xx
    Success,
    /// 404 or an exact-match search without a hit
    NotFound,
    /// Any other failure
    Error,
}

impl RemoteResult {
    /// Label value
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::NotFound => "not_found",
            Self::Error => "error",
        }
    }

    /// Classify the outcome of a remote call
    pub fn of<T>(result: &crate::Result<T>) -> Self {
        match result {
            Ok(_) => Self::Success,
            Err(e) if e.is_not_found() => Self::NotFound,
            Err(_) => Self::Error,
        }
    }
}

// ============================================================================
// Metric Recording Helpers
// ============================================================================

/// Times one reconcile pass of one object
pub struct ReconcileTimer {
    kind: &'static str,
    start: std::time::Instant,
}

impl ReconcileTimer {
    /// Start timing a pass
    pub fn start(kind: &'static str) -> Self {
        Self {
            kind,
            start: std::time::Instant::now(),
        }
    }

    /// Record successful completion
    pub fn success(self) {
        self.record("success");
    }

    /// Record a pass stopped because the connection was not ready
    pub fn dependency_not_ready(self) {
        self.record("dependency_not_ready");
        RECONCILE_ERRORS.add(
            1,
            &[
                KeyValue::new("kind", self.kind),
                KeyValue::new("error_type", ErrorType::Dependency.as_str()),
            ],
        );
    }

    /// Record error completion
    pub fn error(self, error_type: ErrorType) {
        self.record("error");
        RECONCILE_ERRORS.add(
            1,
            &[
                KeyValue::new("kind", self.kind),
                KeyValue::new("error_type", error_type.as_str()),
            ],
        );
    }

    fn record(&self, result: &'static str) {
        RECONCILE_DURATION.record(
            self.start.elapsed().as_secs_f64(),
            &[KeyValue::new("kind", self.kind), KeyValue::new("result", result)],
        );
    }
}

/// Record a status write, or its suppression when unchanged
pub fn record_status_write(kind: &'static str, written: bool) {
    let outcome = if written { "written" } else { "suppressed" };
    STATUS_WRITES.add(
        1,
        &[KeyValue::new("kind", kind), KeyValue::new("outcome", outcome)],
    );
}

/// Record one SonarQube Web API call
pub fn record_remote_call(operation: &str, result: RemoteResult) {
    REMOTE_OPERATIONS.add(
        1,
        &[
            KeyValue::new("operation", operation.to_string()),
            KeyValue::new("result", result.as_str()),
        ],
    );
}
