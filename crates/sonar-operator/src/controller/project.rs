//! SonarProject: the project and its visibility, then the quality gate
//! association

use async_trait::async_trait;
use tracing::{debug, info};

use sonar_client::{ProjectApi, QualityGateApi, SonarHandle};
use sonar_common::crd::SonarProject;
use sonar_common::Result;
use sonar_engine::{tolerate_not_found, Observed, Step};

use super::{found, Chain};

/// Ensure project, then select its quality gate
pub fn create_chain() -> Chain<SonarProject> {
    Chain::new().then(EnsureProject).then(SelectQualityGate)
}

/// Delete the project
pub fn delete_chain() -> Chain<SonarProject> {
    Chain::new().then(DeleteProject)
}

struct EnsureProject;

#[async_trait]
impl Step<SonarProject, SonarHandle> for EnsureProject {
    fn name(&self) -> &'static str {
        "ensure_project"
    }

    async fn run(&self, client: &SonarHandle, project: &SonarProject, _: &mut Observed) -> Result<()> {
        let spec = &project.spec;
        match found(client.get_project(&spec.key).await)? {
            None => {
                client
                    .create_project(&spec.key, &spec.name, spec.visibility)
                    .await?;
                info!(project = %spec.key, visibility = %spec.visibility, "Created project");
            }
            Some(existing) if existing.visibility != spec.visibility => {
                client.update_visibility(&spec.key, spec.visibility).await?;
                info!(project = %spec.key, visibility = %spec.visibility, "Updated project visibility");
            }
            Some(_) => debug!(project = %spec.key, "Project up to date"),
        }
        Ok(())
    }
}

struct SelectQualityGate;

#[async_trait]
impl Step<SonarProject, SonarHandle> for SelectQualityGate {
    fn name(&self) -> &'static str {
        "select_quality_gate"
    }

    async fn run(&self, client: &SonarHandle, project: &SonarProject, _: &mut Observed) -> Result<()> {
        let spec = &project.spec;
        let Some(gate) = spec.quality_gate.as_deref() else {
            return Ok(());
        };
        let current = found(client.project_gate(&spec.key).await)?;
        if current.as_deref() == Some(gate) {
            return Ok(());
        }
        client.select_gate(gate, &spec.key).await?;
        info!(project = %spec.key, gate = %gate, "Selected quality gate");
        Ok(())
    }
}

struct DeleteProject;

#[async_trait]
impl Step<SonarProject, SonarHandle> for DeleteProject {
    fn name(&self) -> &'static str {
        "delete_project"
    }

    async fn run(&self, client: &SonarHandle, project: &SonarProject, _: &mut Observed) -> Result<()> {
        tolerate_not_found(client.delete_project(&project.spec.key).await)
    }
}

#[cfg(test)]
mod tests {
    use sonar_common::crd::{ProjectVisibility, SonarProjectSpec};

    use super::*;
    use crate::fake::FakeSonar;

    fn project(visibility: ProjectVisibility, gate: Option<&str>) -> SonarProject {
        SonarProject::new(
            "billing",
            SonarProjectSpec {
                sonar_ref: "sonar".to_string(),
                key: "acme:billing".to_string(),
                name: "Billing".to_string(),
                visibility,
                quality_gate: gate.map(str::to_string),
            },
        )
    }

    #[tokio::test]
    async fn creates_project_and_selects_gate() {
        let fake = FakeSonar::new();
        create_chain()
            .run(
                &fake.handle(),
                &project(ProjectVisibility::Private, Some("strict")),
                &mut Observed::default(),
            )
            .await
            .unwrap();

        assert_eq!(
            fake.calls(),
            vec![
                "create_project acme:billing private",
                "select_gate strict acme:billing",
            ]
        );
    }

    #[tokio::test]
    async fn visibility_change_is_applied_once() {
        let fake = FakeSonar::new();
        create_chain()
            .run(
                &fake.handle(),
                &project(ProjectVisibility::Private, None),
                &mut Observed::default(),
            )
            .await
            .unwrap();
        fake.clear_calls();

        let public = project(ProjectVisibility::Public, None);
        create_chain()
            .run(&fake.handle(), &public, &mut Observed::default())
            .await
            .unwrap();
        create_chain()
            .run(&fake.handle(), &public, &mut Observed::default())
            .await
            .unwrap();

        assert_eq!(fake.calls(), vec!["update_visibility acme:billing public"]);
    }

    #[tokio::test]
    async fn selected_gate_is_not_reselected() {
        let fake = FakeSonar::new();
        let desired = project(ProjectVisibility::Private, Some("strict"));
        create_chain()
            .run(&fake.handle(), &desired, &mut Observed::default())
            .await
            .unwrap();
        fake.clear_calls();

        create_chain()
            .run(&fake.handle(), &desired, &mut Observed::default())
            .await
            .unwrap();

        assert!(fake.calls().is_empty());
    }

    #[tokio::test]
    async fn delete_tolerates_missing_project() {
        let fake = FakeSonar::new();
        let desired = project(ProjectVisibility::Private, None);
        create_chain()
            .run(&fake.handle(), &desired, &mut Observed::default())
            .await
            .unwrap();
        fake.clear_calls();

        delete_chain()
            .run(&fake.handle(), &desired, &mut Observed::default())
            .await
            .unwrap();
        delete_chain()
            .run(&fake.handle(), &desired, &mut Observed::default())
            .await
            .unwrap();

        assert_eq!(fake.calls(), vec!["delete_project acme:billing"]);
    }
}
