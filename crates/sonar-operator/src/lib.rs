//! SonarQube operator
//!
//! Watches the SonarQube custom resources and converges the entities they
//! describe on the referenced SonarQube server:
//!
//! - `SonarQube`: connection and health of one server
//! - `SonarGroup`, `SonarUser`: accounts, memberships, global permissions
//! - `SonarPermissionTemplate`: templates and their group permissions
//! - `SonarQualityGate`, `SonarQualityProfile`: analysis rules
//! - `SonarProject`: projects and their quality gate

#![deny(missing_docs)]

pub mod config;
pub mod connection;
pub mod controller;
pub mod health;
pub mod registry;
pub mod store;

#[cfg(test)]
mod fake;
