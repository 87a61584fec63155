// Copyright (c) 2026 Task Orchestrator Team
// SPDX-License-Identifier: Apache-2.0

//! Re-opens a blocked task once its dependencies resolve, tracking the
//! number of attempts so repeated unblock checks don't loop forever.

use crate::adapters::DashboardClient;
use crate::context::WorkflowContext;
use crate::error::{OrchestratorError, Result};
use crate::step::{Step, StepOutcome};
use crate::workflow::StepDefinition;
use async_trait::async_trait;
use std::sync::Arc;

const MAX_UNBLOCK_ATTEMPTS: u32 = 10;

pub struct UnblockAttemptStep {
    dashboard: Arc<dyn DashboardClient>,
}

impl UnblockAttemptStep {
    pub fn new(dashboard: Arc<dyn DashboardClient>) -> Self {
        Self { dashboard }
    }
}

#[async_trait]
impl Step for UnblockAttemptStep {
    async fn execute(&self, _def: &StepDefinition, context: &WorkflowContext) -> Result<StepOutcome> {
        let all_resolved = context
            .get_output("analyze")
            .and_then(|v| v.get("all_resolved").and_then(|b| b.as_bool()))
            .unwrap_or(false);

        let task = context
            .get_variable("task")
            .ok_or_else(|| OrchestratorError::other("unblock_attempt requires a 'task' variable"))?;
        let task_id = task
            .get("id")
            .and_then(|v| v.as_str())
            .ok_or_else(|| OrchestratorError::other("task variable missing 'id'"))?;
        let attempts = task.get("blocked_attempts").and_then(|v| v.as_u64()).unwrap_or(0) as u32;

        if !all_resolved {
            if attempts + 1 >= MAX_UNBLOCK_ATTEMPTS {
                tracing::warn!(task_id, attempts, "blocked task exceeded unblock attempt cap");
            }
            return Ok(StepOutcome::success_with_outputs(serde_json::json!({
                "unblocked": false,
                "attempts": attempts + 1,
            })));
        }

        self.dashboard.update_task_status(task_id, "open").await?;
        Ok(StepOutcome::success_with_outputs(serde_json::json!({
            "unblocked": true,
            "attempts": attempts,
        })))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::{Project, ProjectDetails};
    use crate::persona::PersonaClient;
    use crate::task::Task;
    use crate::transport::InMemoryTransport;
    use async_trait::async_trait;
    use std::sync::Mutex;

    struct RecordingDashboard {
        updates: Mutex<Vec<(String, String)>>,
    }

    #[async_trait]
    impl DashboardClient for RecordingDashboard {
        async fn get_project(&self, id: &str) -> Result<Project> {
            Ok(Project { id: id.to_string(), name: "p".to_string(), repo_remote: None })
        }
        async fn get_project_details(&self, _id: &str) -> Result<ProjectDetails> {
            Ok(Default::default())
        }
        async fn list_tasks(&self, _id: &str) -> Result<Vec<Task>> {
            Ok(vec![])
        }
        async fn update_task_status(&self, task_id: &str, status: &str) -> Result<()> {
            self.updates.lock().unwrap().push((task_id.to_string(), status.to_string()));
            Ok(())
        }
        async fn create_followup_task(&self, _project_id: &str, _name: &str, _description: &str) -> Result<Task> {
            unimplemented!()
        }
    }

    #[tokio::test]
    async fn reopens_task_when_all_resolved() {
        let transport: Arc<dyn crate::transport::Transport> = Arc::new(InMemoryTransport::new());
        let persona = Arc::new(PersonaClient::new(transport.clone(), "requests", "grp"));
        let ctx = WorkflowContext::new("proj", "/tmp/repo", "main", transport, persona);
        ctx.set_variable("task", serde_json::json!({"id": "t-1", "blocked_attempts": 2}));
        ctx.set_output("analyze", serde_json::json!({"all_resolved": true}));

        let dashboard = Arc::new(RecordingDashboard { updates: Mutex::new(vec![]) });
        let step = UnblockAttemptStep::new(dashboard.clone());

        let def = StepDefinition {
            name: "unblock".to_string(),
            step_type: "unblock_attempt".to_string(),
            description: String::new(),
            depends_on: vec!["analyze".to_string()],
            condition: None,
            config: serde_json::Value::Null,
            outputs: vec![],
        };

        let outcome = step.execute(&def, &ctx).await.unwrap();
        assert_eq!(outcome.outputs.unwrap()["unblocked"], true);
        assert_eq!(dashboard.updates.lock().unwrap().as_slice(), &[("t-1".to_string(), "open".to_string())]);
    }

    #[tokio::test]
    async fn stays_blocked_when_unresolved() {
        let transport: Arc<dyn crate::transport::Transport> = Arc::new(InMemoryTransport::new());
        let persona = Arc::new(PersonaClient::new(transport.clone(), "requests", "grp"));
        let ctx = WorkflowContext::new("proj", "/tmp/repo", "main", transport, persona);
        ctx.set_variable("task", serde_json::json!({"id": "t-1", "blocked_attempts": 0}));
        ctx.set_output("analyze", serde_json::json!({"all_resolved": false}));

        let dashboard = Arc::new(RecordingDashboard { updates: Mutex::new(vec![]) });
        let step = UnblockAttemptStep::new(dashboard.clone());

        let def = StepDefinition {
            name: "unblock".to_string(),
            step_type: "unblock_attempt".to_string(),
            description: String::new(),
            depends_on: vec!["analyze".to_string()],
            condition: None,
            config: serde_json::Value::Null,
            outputs: vec![],
        };

        let outcome = step.execute(&def, &ctx).await.unwrap();
        assert_eq!(outcome.outputs.unwrap()["unblocked"], false);
        assert!(dashboard.updates.lock().unwrap().is_empty());
    }
}
