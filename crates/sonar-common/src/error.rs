//! Error types for the SonarQube operator
//!
//! Errors are structured with fields to aid debugging in production. Two
//! variants double as control-flow sentinels: [`Error::NotFound`] selects the
//! create-vs-update branch and makes deletion idempotent, and
//! [`Error::DependencyNotReady`] selects the short dependency requeue instead
//! of the failure backoff.

use thiserror::Error;

/// Default context value when no specific context is available
pub const UNKNOWN_CONTEXT: &str = "unknown";

/// Main error type for operator operations
#[derive(Debug, Error)]
pub enum Error {
    /// Kubernetes API error (object store reads and writes)
    #[error("kubernetes error: {source}")]
    Kube {
        /// The underlying kube-rs error
        #[from]
        source: kube::Error,
    },

    /// The entity does not exist in SonarQube
    #[error("{entity} '{key}' not found in SonarQube")]
    NotFound {
        /// Kind of remote entity (group, user, quality gate, ...)
        entity: String,
        /// Key the entity was looked up by
        key: String,
    },

    /// Non-2xx response or connectivity failure from SonarQube
    #[error("remote error [{operation}]: {message}")]
    Remote {
        /// Remote operation that failed (e.g. "api/user_groups/create")
        operation: String,
        /// HTTP status code, if a response was received
        status: Option<u16>,
        /// Description of what failed
        message: String,
    },

    /// The referenced SonarQube connection is not usable yet
    #[error("connection '{reference}' not ready: {message}")]
    DependencyNotReady {
        /// Name of the referenced SonarQube object
        reference: String,
        /// Why the connection cannot be used
        message: String,
    },

    /// Validation error for CRD specs
    #[error("validation error for {resource}: {message}")]
    Validation {
        /// Name of the resource with invalid configuration
        resource: String,
        /// Description of what's invalid
        message: String,
        /// The invalid field path (e.g., "spec.conditions")
        field: Option<String>,
    },

    /// A convergence step failed
    #[error("step '{step}' failed: {source}")]
    Step {
        /// Name of the step that failed
        step: String,
        /// The underlying error
        #[source]
        source: Box<Error>,
    },

    /// Serialization/deserialization error
    #[error("serialization error: {message}")]
    Serialization {
        /// Description of what failed
        message: String,
        /// The resource kind being serialized (if known)
        kind: Option<String>,
    },

    /// Internal/operational error
    #[error("internal error [{context}]: {message}")]
    Internal {
        /// Description of what failed
        message: String,
        /// Context where the error occurred (e.g., "reconciler", "resolver")
        context: String,
    },
}

impl Error {
    /// Create a not-found sentinel for a remote entity
    pub fn not_found(entity: impl Into<String>, key: impl Into<String>) -> Self {
        Self::NotFound {
            entity: entity.into(),
            key: key.into(),
        }
    }

    /// Create a remote error without an HTTP status (transport failure)
    pub fn remote(operation: impl Into<String>, msg: impl Into<String>) -> Self {
        Self::Remote {
            operation: operation.into(),
            status: None,
            message: msg.into(),
        }
    }

    /// Create a remote error carrying the HTTP status code
    pub fn remote_status(operation: impl Into<String>, status: u16, msg: impl Into<String>) -> Self {
        Self::Remote {
            operation: operation.into(),
            status: Some(status),
            message: msg.into(),
        }
    }

    /// Create a dependency-not-ready error for a connection reference
    pub fn dependency_not_ready(reference: impl Into<String>, msg: impl Into<String>) -> Self {
        Self::DependencyNotReady {
            reference: reference.into(),
            message: msg.into(),
        }
    }

    /// Create a validation error with the given message
    ///
    /// For simple validation errors without resource context.
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation {
            resource: UNKNOWN_CONTEXT.to_string(),
            message: msg.into(),
            field: None,
        }
    }

    /// Create a validation error with resource context and field path
    pub fn validation_for_field(
        resource: impl Into<String>,
        field: impl Into<String>,
        msg: impl Into<String>,
    ) -> Self {
        Self::Validation {
            resource: resource.into(),
            message: msg.into(),
            field: Some(field.into()),
        }
    }

    /// Wrap an error with the name of the step that produced it
    pub fn step(step: impl Into<String>, source: Error) -> Self {
        Self::Step {
            step: step.into(),
            source: Box::new(source),
        }
    }

    /// Create a serialization error with the given message
    pub fn serialization(msg: impl Into<String>) -> Self {
        Self::Serialization {
            message: msg.into(),
            kind: None,
        }
    }

    /// Create a serialization error with resource kind context
    pub fn serialization_for_kind(kind: impl Into<String>, msg: impl Into<String>) -> Self {
        Self::Serialization {
            message: msg.into(),
            kind: Some(kind.into()),
        }
    }

    /// Create an internal error with the given message
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal {
            message: msg.into(),
            context: UNKNOWN_CONTEXT.to_string(),
        }
    }

    /// Create an internal error with context
    pub fn internal_with_context(context: impl Into<String>, msg: impl Into<String>) -> Self {
        Self::Internal {
            message: msg.into(),
            context: context.into(),
        }
    }

    /// Whether this is the remote not-found sentinel
    ///
    /// Only the error itself is inspected: a wrapped step error has already
    /// passed the point where not-found could be tolerated.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::NotFound { .. })
    }

    /// Whether the referenced connection is not ready yet
    pub fn is_dependency_not_ready(&self) -> bool {
        match self {
            Error::DependencyNotReady { .. } => true,
            Error::Step { source, .. } => source.is_dependency_not_ready(),
            _ => false,
        }
    }

    /// Whether this is an object-store write conflict (HTTP 409)
    pub fn is_conflict(&self) -> bool {
        match self {
            Error::Kube {
                source: kube::Error::Api(ae),
            } => ae.code == 409,
            Error::Step { source, .. } => source.is_conflict(),
            _ => false,
        }
    }

    /// Check if this error is retryable
    ///
    /// Validation and serialization errors require a spec change. Remote
    /// errors are retryable unless SonarQube rejected the request as invalid.
    pub fn is_retryable(&self) -> bool {
        match self {
            Error::Kube { source } => !matches!(
                source,
                kube::Error::Api(ae) if (400..500).contains(&ae.code) && ae.code != 409
            ),
            Error::NotFound { .. } => true,
            Error::Remote { status, .. } => !matches!(status, Some(400)),
            Error::DependencyNotReady { .. } => true,
            Error::Validation { .. } => false,
            Error::Step { source, .. } => source.is_retryable(),
            Error::Serialization { .. } => false,
            Error::Internal { .. } => true,
        }
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::serialization(e.to_string())
    }
}
