//! SonarQube Web API client for the operator
//!
//! The API surface is split into capability traits ([`GroupApi`],
//! [`UserApi`], ...). Controllers depend only on the capabilities they use;
//! [`SonarClient`] implements all of them over HTTP.

#![deny(missing_docs)]

pub mod api;
pub mod http;
pub mod types;

pub use api::{
    GroupApi, PermissionTemplateApi, ProjectApi, QualityGateApi, QualityProfileApi, SonarApi,
    SonarHandle, SystemApi, UserApi,
};
pub use http::{build_http_client, SonarClient};
pub use types::{
    ConditionParams, GateCondition, Group, PermissionTemplate, Project, QualityGate,
    QualityProfile, RuleActivation, SystemStatus, TemplateParams, User,
};
