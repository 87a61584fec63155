// Copyright (c) 2026 Task Orchestrator Team
// SPDX-License-Identifier: Apache-2.0

//! HTTP-backed [`DashboardClient`] implementation.

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use taskflow_core::adapters::{DashboardClient, Project, ProjectDetails};
use taskflow_core::error::{OrchestratorError, Result};
use taskflow_core::task::Task;

/// Client for the external task-dashboard HTTP API.
pub struct HttpDashboardClient {
    client: Client,
    base_url: String,
    api_token: String,
}

#[derive(Debug, Deserialize)]
struct DashboardErrorBody {
    message: String,
}

impl HttpDashboardClient {
    pub fn new(base_url: impl Into<String>, api_token: impl Into<String>) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .expect("failed to build dashboard HTTP client");

        Self { client, base_url: base_url.into(), api_token: api_token.into() }
    }

    pub fn from_env() -> Result<Self> {
        let base_url = std::env::var("TASKFLOW_DASHBOARD_URL")
            .map_err(|_| OrchestratorError::other("TASKFLOW_DASHBOARD_URL environment variable not set"))?;
        let api_token = std::env::var("TASKFLOW_DASHBOARD_TOKEN")
            .map_err(|_| OrchestratorError::other("TASKFLOW_DASHBOARD_TOKEN environment variable not set"))?;
        Ok(Self::new(base_url, api_token))
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url.trim_end_matches('/'), path)
    }

    async fn parse_error(&self, status: StatusCode, body: &str) -> OrchestratorError {
        if let Ok(err) = serde_json::from_str::<DashboardErrorBody>(body) {
            return OrchestratorError::Dashboard(format!("[{}] {}", status.as_u16(), err.message));
        }
        OrchestratorError::Dashboard(format!("[{}] {}", status.as_u16(), body))
    }

    async fn get_json<T: for<'de> Deserialize<'de>>(&self, path: &str) -> Result<T> {
        let response = self
            .client
            .get(self.url(path))
            .bearer_auth(&self.api_token)
            .send()
            .await
            .map_err(|e| OrchestratorError::Dashboard(e.to_string()))?;

        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        if !status.is_success() {
            return Err(self.parse_error(status, &body).await);
        }
        serde_json::from_str(&body).map_err(OrchestratorError::from)
    }
}

#[derive(Debug, Serialize)]
struct UpdateStatusBody<'a> {
    status: &'a str,
}

#[derive(Debug, Serialize)]
struct CreateFollowupBody<'a> {
    name: &'a str,
    description: &'a str,
}

#[async_trait]
impl DashboardClient for HttpDashboardClient {
    async fn get_project(&self, project_id: &str) -> Result<Project> {
        self.get_json(&format!("/api/projects/{project_id}")).await
    }

    async fn get_project_details(&self, project_id: &str) -> Result<ProjectDetails> {
        self.get_json(&format!("/api/projects/{project_id}/details")).await
    }

    async fn list_tasks(&self, project_id: &str) -> Result<Vec<Task>> {
        self.get_json(&format!("/api/projects/{project_id}/tasks")).await
    }

    async fn update_task_status(&self, task_id: &str, status: &str) -> Result<()> {
        let response = self
            .client
            .patch(self.url(&format!("/api/tasks/{task_id}/status")))
            .bearer_auth(&self.api_token)
            .json(&UpdateStatusBody { status })
            .send()
            .await
            .map_err(|e| OrchestratorError::Dashboard(e.to_string()))?;

        let status_code = response.status();
        if !status_code.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(self.parse_error(status_code, &body).await);
        }
        Ok(())
    }

    async fn create_followup_task(&self, project_id: &str, name: &str, description: &str) -> Result<Task> {
        let response = self
            .client
            .post(self.url(&format!("/api/projects/{project_id}/tasks")))
            .bearer_auth(&self.api_token)
            .json(&CreateFollowupBody { name, description })
            .send()
            .await
            .map_err(|e| OrchestratorError::Dashboard(e.to_string()))?;

        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        if !status.is_success() {
            return Err(self.parse_error(status, &body).await);
        }
        serde_json::from_str(&body).map_err(OrchestratorError::from)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::Server;

    #[tokio::test]
    async fn get_project_parses_success_response() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("GET", "/api/projects/proj-1")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"id":"proj-1","name":"Demo","repo_remote":null}"#)
            .create_async()
            .await;

        let client = HttpDashboardClient::new(server.url(), "test-token");
        let project = client.get_project("proj-1").await.unwrap();
        assert_eq!(project.name, "Demo");
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn update_task_status_surfaces_dashboard_error() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("PATCH", "/api/tasks/t-1/status")
            .with_status(422)
            .with_body(r#"{"message":"invalid transition"}"#)
            .create_async()
            .await;

        let client = HttpDashboardClient::new(server.url(), "test-token");
        let err = client.update_task_status("t-1", "done").await.unwrap_err();
        assert!(matches!(err, OrchestratorError::Dashboard(msg) if msg.contains("invalid transition")));
        mock.assert_async().await;
    }
}
