// Copyright (c) 2026 Task Orchestrator Team
// SPDX-License-Identifier: Apache-2.0

//! Checks whether a blocked task's declared dependencies have all resolved.

use crate::adapters::DashboardClient;
use crate::context::WorkflowContext;
use crate::error::{OrchestratorError, Result};
use crate::step::{Step, StepOutcome};
use crate::task::TaskStatus;
use crate::workflow::StepDefinition;
use async_trait::async_trait;
use std::sync::Arc;

pub struct BlockedTaskAnalysisStep {
    dashboard: Arc<dyn DashboardClient>,
}

impl BlockedTaskAnalysisStep {
    pub fn new(dashboard: Arc<dyn DashboardClient>) -> Self {
        Self { dashboard }
    }
}

#[async_trait]
impl Step for BlockedTaskAnalysisStep {
    async fn execute(&self, _def: &StepDefinition, context: &WorkflowContext) -> Result<StepOutcome> {
        let task = context
            .get_variable("task")
            .ok_or_else(|| OrchestratorError::other("blocked_task_analysis requires a 'task' variable"))?;

        let dependencies: Vec<String> = task
            .get("blocked_dependencies")
            .and_then(|v| v.as_array())
            .map(|a| a.iter().filter_map(|v| v.as_str().map(str::to_string)).collect())
            .unwrap_or_default();

        let project_id = context.project_id.clone();
        let all_tasks = self.dashboard.list_tasks(&project_id).await?;

        let mut unresolved = Vec::new();
        for dep_id in &dependencies {
            let resolved = all_tasks
                .iter()
                .find(|t| &t.id == dep_id)
                .map(|t| t.status == TaskStatus::Done)
                .unwrap_or(false);
            if !resolved {
                unresolved.push(dep_id.clone());
            }
        }

        let all_resolved = unresolved.is_empty();
        Ok(StepOutcome::success_with_outputs(serde_json::json!({
            "all_resolved": all_resolved,
            "unresolved_dependencies": unresolved,
        })))
    }
}
