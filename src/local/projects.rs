// Copyright (c) 2022 Espresso Systems (espressosys.com)
// This file is part of the Net library.

// This program is free software: you can redistribute it and/or modify it under the terms of the GNU General Public License as published by the Free Software Foundation, either version 3 of the License, or (at your option) any later version.
// This program is distributed in the hope that it will be useful, but WITHOUT ANY WARRANTY; without even the implied warranty of MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the GNU General Public License for more details.
// You should have received a copy of the GNU General Public License along with this program. If not, see <https://www.gnu.org/licenses/>.

//! Projects of the local workspace and their CI pipelines.

use crate::client::NativeRequestOptions;
use crate::error::{Error, HttpResponse};
use crate::monitoring::CallerRequestOptions;
use crate::router::Router;
use crate::types::{CommandType, Json};
use crate::ws::{filter_ctx_message, ContextMessage, CtxFilter, WsRouter};
use futures::Stream;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt::{self, Debug, Formatter};
use std::sync::Arc;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Failure {
    pub path: String,
    pub failure: String,
    pub message: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Link {
    pub name: String,
    pub url: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileListing {
    pub include: Vec<String>,
    pub ignore: Vec<String>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Artifacts {
    pub id: String,
    pub files: FileListing,
    pub links: Vec<Link>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CiStep {
    pub id: String,
    pub artifacts: Vec<Artifacts>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub view: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ci {
    pub tags: Vec<String>,
    pub description: String,
    pub steps: Vec<CiStep>,
    pub dag: Vec<String>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Project {
    pub ci: Ci,
    /// Package manifest of the project, as published to the registry.
    pub webpm_spec: Json,
    pub path: String,
    pub name: String,
    pub id: String,
    pub version: String,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ProjectsLoadingResults {
    pub results: Vec<Project>,
    pub failures: Vec<Failure>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChildToParentConnections {
    pub id: String,
    pub parent_ids: Vec<String>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DependenciesResponse {
    pub above: Vec<String>,
    pub below: Vec<String>,
    pub dag: Vec<ChildToParentConnections>,
    pub simple_dag: Vec<ChildToParentConnections>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectStatus {
    pub project_id: String,
    pub project_name: String,
    pub workspace_dependencies: Vec<DependenciesResponse>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Artifact {
    pub id: String,
    pub path: String,
    pub links: Vec<Link>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Manifest {
    pub succeeded: bool,
    pub fingerprint: String,
    pub creation_date: String,
    pub files: Vec<String>,
    pub data: BTreeMap<String, Json>,
    pub std_out: Vec<String>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum StepStatus {
    #[serde(rename = "OK")]
    Ok,
    #[serde(rename = "KO")]
    Ko,
    #[serde(rename = "outdated")]
    Outdated,
    #[serde(rename = "none")]
    None,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CiStepStatusResponse {
    pub project_id: String,
    pub step_id: String,
    pub artifact_folder: String,
    pub artifacts: Vec<Artifact>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub manifest: Option<Manifest>,
    pub status: StepStatus,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CiStatus {
    pub project_id: String,
    pub steps: Vec<CiStepStatusResponse>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct GetArtifactsResponse {
    pub artifacts: Vec<Artifact>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum CiStepEventKind {
    RunStarted,
    RunDone,
    StatusCheckStarted,
}

impl CiStepEventKind {
    pub fn as_str(self) -> &'static str {
        match self {
            CiStepEventKind::RunStarted => "runStarted",
            CiStepEventKind::RunDone => "runDone",
            CiStepEventKind::StatusCheckStarted => "statusCheckStarted",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CiStepEvent {
    pub project_id: String,
    pub step_id: String,
    pub event: CiStepEventKind,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateProjectFromTemplateBody {
    #[serde(rename = "type")]
    pub type_: String,
    pub parent_folder: String,
    pub parameters: BTreeMap<String, String>,
}

/// Attributes selecting the messages of a project, step, or kind of step event.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ProjectsFilter {
    pub project_id: Option<String>,
    pub step_id: Option<String>,
    pub event: Option<CiStepEventKind>,
}

impl ProjectsFilter {
    pub fn project(project_id: impl Into<String>) -> Self {
        Self {
            project_id: Some(project_id.into()),
            ..Self::default()
        }
    }

    pub fn step(project_id: impl Into<String>, step_id: impl Into<String>) -> Self {
        Self {
            project_id: Some(project_id.into()),
            step_id: Some(step_id.into()),
            event: None,
        }
    }

    fn ctx_filter(&self, label: &str) -> CtxFilter {
        CtxFilter::new()
            .with_label(label)
            .with_optional_attribute("projectId", self.project_id.as_deref())
            .with_optional_attribute("stepId", self.step_id.as_deref())
            .with_optional_attribute("event", self.event.map(CiStepEventKind::as_str))
    }
}

/// Updates pushed on the data socket about projects.
#[derive(Clone)]
pub struct ProjectsWebSocket {
    ws: Arc<WsRouter>,
}

impl ProjectsWebSocket {
    pub fn new(ws: Arc<WsRouter>) -> Self {
        Self { ws }
    }

    fn data<T: DeserializeOwned>(
        &self,
        label: &str,
        filter: &ProjectsFilter,
    ) -> impl Stream<Item = ContextMessage<T>> {
        filter_ctx_message(self.ws.data(), filter.ctx_filter(label))
    }

    pub fn status(&self) -> impl Stream<Item = ContextMessage<ProjectsLoadingResults>> {
        self.data("ProjectsLoadingResults", &ProjectsFilter::default())
    }

    pub fn project_status(
        &self,
        filter: &ProjectsFilter,
    ) -> impl Stream<Item = ContextMessage<ProjectStatus>> {
        self.data("ProjectStatusResponse", filter)
    }

    pub fn ci_status(&self, filter: &ProjectsFilter) -> impl Stream<Item = ContextMessage<CiStatus>> {
        self.data("CIStatusResponse", filter)
    }

    pub fn ci_step_status(
        &self,
        filter: &ProjectsFilter,
    ) -> impl Stream<Item = ContextMessage<CiStepStatusResponse>> {
        self.data("CIStepStatusResponse", filter)
    }

    pub fn artifacts(&self, filter: &ProjectsFilter) -> impl Stream<Item = ContextMessage<Artifact>> {
        self.data("ArtifactsResponse", filter)
    }

    pub fn step_event(&self, filter: &ProjectsFilter) -> impl Stream<Item = ContextMessage<CiStepEvent>> {
        self.data("CIStepEvent", filter)
    }
}

impl Debug for ProjectsWebSocket {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProjectsWebSocket").finish_non_exhaustive()
    }
}

/// Routes under `/api/projects`.
#[derive(Clone, Debug)]
pub struct ProjectsRouter {
    router: Router,
    pub web_socket: ProjectsWebSocket,
}

impl ProjectsRouter {
    pub fn new(parent: &Router, ws: Arc<WsRouter>) -> Self {
        Self {
            router: parent.child("/projects"),
            web_socket: ProjectsWebSocket::new(ws),
        }
    }

    pub fn router(&self) -> &Router {
        &self.router
    }

    async fn query<T: DeserializeOwned>(
        &self,
        path: &str,
        caller: &CallerRequestOptions,
    ) -> Result<HttpResponse<T>, Error> {
        self.router
            .send(CommandType::Query, path, NativeRequestOptions::new(), caller)
            .await
    }

    /// Projects found in the workspace, and the folders which failed to load as a project.
    pub async fn status(
        &self,
        caller: &CallerRequestOptions,
    ) -> Result<HttpResponse<ProjectsLoadingResults>, Error> {
        self.query("/status", caller).await
    }

    /// Re-index the projects of the workspace.
    pub async fn index(
        &self,
        caller: &CallerRequestOptions,
    ) -> Result<HttpResponse<ProjectsLoadingResults>, Error> {
        self.router
            .send(CommandType::Update, "/index", NativeRequestOptions::new(), caller)
            .await
    }

    pub async fn get_project_status(
        &self,
        project_id: &str,
        caller: &CallerRequestOptions,
    ) -> Result<HttpResponse<ProjectStatus>, Error> {
        self.query(&format!("/{}", project_id), caller).await
    }

    pub async fn get_artifacts(
        &self,
        project_id: &str,
        caller: &CallerRequestOptions,
    ) -> Result<HttpResponse<GetArtifactsResponse>, Error> {
        self.query(&format!("/{}/ci/artifacts", project_id), caller)
            .await
    }

    /// Status of the pipeline of a project.
    pub async fn get_ci_status(
        &self,
        project_id: &str,
        caller: &CallerRequestOptions,
    ) -> Result<HttpResponse<CiStatus>, Error> {
        self.query(&format!("/{}/ci", project_id), caller).await
    }

    pub async fn get_ci_step_status(
        &self,
        project_id: &str,
        step_id: &str,
        caller: &CallerRequestOptions,
    ) -> Result<HttpResponse<CiStepStatusResponse>, Error> {
        self.query(&format!("/{}/ci/steps/{}", project_id, step_id), caller)
            .await
    }

    pub async fn run_step(
        &self,
        project_id: &str,
        step_id: &str,
        caller: &CallerRequestOptions,
    ) -> Result<HttpResponse<CiStepStatusResponse>, Error> {
        self.router
            .send(
                CommandType::Update,
                &format!("/{}/ci/steps/{}/run", project_id, step_id),
                NativeRequestOptions::new(),
                caller,
            )
            .await
    }

    pub async fn create_project_from_template(
        &self,
        body: &CreateProjectFromTemplateBody,
        caller: &CallerRequestOptions,
    ) -> Result<HttpResponse<Project>, Error> {
        let json = serde_json::to_value(body).map_err(|source| Error::Serialize { source })?;
        self.router
            .send(
                CommandType::Create,
                "/create-from-template",
                NativeRequestOptions::new().with_json(json),
                caller,
            )
            .await
    }

    /// Source of the view of a step.
    pub async fn get_step_view(
        &self,
        project_id: &str,
        step_id: &str,
        caller: &CallerRequestOptions,
    ) -> Result<HttpResponse<String>, Error> {
        self.query(&format!("/{}/ci/steps/{}/view", project_id, step_id), caller)
            .await
    }

    /// Execute a `GET` command exposed by a step.
    pub async fn execute_step_get_command(
        &self,
        project_id: &str,
        step_id: &str,
        command_id: &str,
        caller: &CallerRequestOptions,
    ) -> Result<HttpResponse<Json>, Error> {
        self.query(
            &format!("/{}/ci/steps/{}/commands/{}", project_id, step_id, command_id),
            caller,
        )
        .await
    }

    pub async fn get_step_configuration(
        &self,
        project_id: &str,
        step_id: &str,
        caller: &CallerRequestOptions,
    ) -> Result<HttpResponse<Json>, Error> {
        self.query(
            &format!("/{}/ci/steps/{}/configuration", project_id, step_id),
            caller,
        )
        .await
    }

    pub async fn update_step_configuration(
        &self,
        project_id: &str,
        step_id: &str,
        body: Json,
        caller: &CallerRequestOptions,
    ) -> Result<HttpResponse<Json>, Error> {
        self.router
            .send(
                CommandType::Update,
                &format!("/{}/ci/steps/{}/configuration", project_id, step_id),
                NativeRequestOptions::new().with_json(body),
                caller,
            )
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn step_status_wire_format() {
        let status: CiStepStatusResponse = serde_json::from_value(json!({
            "projectId": "p1",
            "stepId": "build",
            "artifactFolder": "/tmp/p1",
            "artifacts": [],
            "status": "outdated",
        }))
        .unwrap();
        assert_eq!(status.status, StepStatus::Outdated);
        assert!(status.manifest.is_none());
        assert_eq!(serde_json::to_value(StepStatus::Ok).unwrap(), json!("OK"));
    }

    #[test]
    fn filters_translate_to_attributes() {
        let filter = ProjectsFilter {
            event: Some(CiStepEventKind::RunDone),
            ..ProjectsFilter::step("p1", "build")
        };
        let ctx = filter.ctx_filter("CIStepEvent");
        assert_eq!(ctx.with_labels, vec!["CIStepEvent".to_string()]);
        let keys: Vec<_> = ctx.with_attributes.iter().map(|(k, _)| k.as_str()).collect();
        assert_eq!(keys, vec!["projectId", "stepId", "event"]);
        assert!(ctx.with_attributes[2].1.accepts("runDone"));
        assert_eq!(
            serde_json::to_value(CiStepEventKind::StatusCheckStarted).unwrap(),
            json!(CiStepEventKind::StatusCheckStarted.as_str())
        );

        assert!(ProjectsFilter::default()
            .ctx_filter("ProjectsLoadingResults")
            .with_attributes
            .is_empty());
    }

    #[test]
    fn template_body_wire_format() {
        let body = CreateProjectFromTemplateBody {
            type_: "ts-webapp".into(),
            parent_folder: "/home/projects".into(),
            parameters: BTreeMap::from([("name".to_string(), "foo".to_string())]),
        };
        assert_eq!(
            serde_json::to_value(&body).unwrap(),
            json!({"type": "ts-webapp", "parentFolder": "/home/projects", "parameters": {"name": "foo"}})
        );
    }
}
