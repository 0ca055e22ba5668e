//! Command line and environment configuration

use std::net::SocketAddr;
use std::time::Duration;

use clap::{Parser, ValueEnum};

use sonar_engine::{BackoffPolicy, RequeuePolicy};

/// Failure backoff strategy
#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum BackoffKind {
    /// Same delay after every failure
    Fixed,
    /// Delay grows with consecutive failures up to a ceiling
    Exponential,
}

/// SonarQube operator - reconciles SonarQube entities from custom resources
#[derive(Parser, Debug, Clone)]
#[command(name = "sonar-operator", version, about, long_about = None)]
pub struct Config {
    /// Print CRD manifests and exit
    #[arg(long)]
    pub crd: bool,

    /// Only watch this namespace (all namespaces when unset)
    #[arg(long, env = "WATCH_NAMESPACE")]
    pub watch_namespace: Option<String>,

    /// Backoff strategy after a failed pass
    #[arg(long, env = "SONAR_BACKOFF", value_enum, default_value_t = BackoffKind::Fixed)]
    pub backoff: BackoffKind,

    /// Delay after a failure with the fixed strategy
    #[arg(long, env = "SONAR_BACKOFF_INTERVAL_SECS", default_value_t = 30,
          value_parser = clap::value_parser!(u64).range(1..))]
    pub backoff_interval_secs: u64,

    /// Base delay with the exponential strategy
    #[arg(long, env = "SONAR_BACKOFF_BASE_SECS", default_value_t = 1,
          value_parser = clap::value_parser!(u64).range(1..))]
    pub backoff_base_secs: u64,

    /// Ceiling for the exponential strategy
    #[arg(long, env = "SONAR_BACKOFF_MAX_SECS", default_value_t = 3600,
          value_parser = clap::value_parser!(u64).range(1..))]
    pub backoff_max_secs: u64,

    /// Requeue interval after a successful pass
    #[arg(long, env = "SONAR_SUCCESS_REQUEUE_SECS", default_value_t = 300,
          value_parser = clap::value_parser!(u64).range(1..))]
    pub success_requeue_secs: u64,

    /// Requeue interval while the referenced connection is not ready
    #[arg(long, env = "SONAR_DEPENDENCY_REQUEUE_SECS", default_value_t = 10,
          value_parser = clap::value_parser!(u64).range(1..))]
    pub dependency_requeue_secs: u64,

    /// Timeout for each SonarQube Web API request
    #[arg(long, env = "SONAR_HTTP_TIMEOUT_SECS", default_value_t = 30,
          value_parser = clap::value_parser!(u64).range(1..))]
    pub http_timeout_secs: u64,

    /// Port for the health endpoints
    #[arg(long, env = "HEALTH_PORT", default_value_t = 8080)]
    pub health_port: u16,
}

impl Config {
    /// Requeue policy described by the flags
    pub fn requeue_policy(&self) -> RequeuePolicy {
        let backoff = match self.backoff {
            BackoffKind::Fixed => BackoffPolicy::Fixed {
                interval: Duration::from_secs(self.backoff_interval_secs),
            },
            BackoffKind::Exponential => BackoffPolicy::Exponential {
                base: Duration::from_secs(self.backoff_base_secs),
                max: Duration::from_secs(self.backoff_max_secs),
            },
        };
        RequeuePolicy {
            backoff,
            success_interval: Duration::from_secs(self.success_requeue_secs),
            dependency_interval: Duration::from_secs(self.dependency_requeue_secs),
        }
    }

    /// Per-request timeout for the SonarQube client
    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.http_timeout_secs)
    }

    /// Bind address for the health server
    pub fn health_addr(&self) -> SocketAddr {
        SocketAddr::from(([0, 0, 0, 0], self.health_port))
    }
}
