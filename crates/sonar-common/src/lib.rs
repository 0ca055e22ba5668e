//! Common types for the SonarQube operator: CRDs, errors, and utilities

#![deny(missing_docs)]

pub mod crd;
pub mod error;
pub mod events;
pub mod kube_utils;
pub mod metrics;
pub mod telemetry;

pub use error::Error;

/// Result type alias using our custom Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Finalizer recorded on every managed resource that owns a remote entity
pub const CLEANUP_FINALIZER: &str = "sonar.dev/cleanup";

/// Field manager used for server-side apply and status patches
pub const FIELD_MANAGER: &str = "sonar-operator";

/// Built-in SonarQube group every user belongs to; never removed by group sync
pub const DEFAULT_USERS_GROUP: &str = "sonar-users";

/// Requeue interval after a successful pass (drift detection)
pub const REQUEUE_SUCCESS_SECS: u64 = 300;

/// Requeue interval after a failed pass under the fixed backoff policy
pub const REQUEUE_ERROR_SECS: u64 = 30;

/// Requeue interval while the referenced SonarQube connection is not ready
pub const REQUEUE_DEPENDENCY_SECS: u64 = 10;
