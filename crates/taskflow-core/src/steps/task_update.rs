// Copyright (c) 2026 Task Orchestrator Team
// SPDX-License-Identifier: Apache-2.0

//! Updates the dashboard's status for the task driving the current workflow.

use super::config_str;
use crate::adapters::DashboardClient;
use crate::context::WorkflowContext;
use crate::error::{OrchestratorError, Result};
use crate::step::{Step, StepOutcome};
use crate::workflow::StepDefinition;
use async_trait::async_trait;
use std::sync::Arc;

pub struct TaskUpdateStep {
    dashboard: Arc<dyn DashboardClient>,
}

impl TaskUpdateStep {
    pub fn new(dashboard: Arc<dyn DashboardClient>) -> Self {
        Self { dashboard }
    }
}

#[async_trait]
impl Step for TaskUpdateStep {
    async fn execute(&self, def: &StepDefinition, context: &WorkflowContext) -> Result<StepOutcome> {
        let status = config_str(&def.config, "status")?;
        let status = context.resolve(&status);

        let task = context
            .get_variable("task")
            .ok_or_else(|| OrchestratorError::other("task_update step requires a 'task' variable"))?;
        let task_id = task
            .get("id")
            .and_then(serde_json::Value::as_str)
            .ok_or_else(|| OrchestratorError::other("task variable missing 'id'"))?;

        self.dashboard.update_task_status(task_id, &status).await?;

        Ok(StepOutcome::success(serde_json::json!({ "task_id": task_id, "status": status })))
    }
}
