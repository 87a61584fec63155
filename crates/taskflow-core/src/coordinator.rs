// Copyright (c) 2026 Task Orchestrator Team
// SPDX-License-Identifier: Apache-2.0

//! The outer task-selection loop driving one project's workflows.

use crate::adapters::DashboardClient;
use crate::context::WorkflowContext;
use crate::engine::WorkflowEngine;
use crate::error::{OrchestratorError, Result};
use crate::persona::PersonaClient;
use crate::task::{Task, TaskScope, TaskStatus, TaskType};
use crate::transport::Transport;
use crate::workflow::{find_workflow_by_condition, WorkflowDefinition};
use serde_json::Value;
use std::sync::Arc;
use tracing::{error, info, warn};

const BLOCKED_TASK_RESOLUTION: &str = "blocked-task-resolution";
const IN_REVIEW_TASK_FLOW: &str = "in-review-task-flow";
const FALLBACK_WORKFLOW: &str = "project-loop";

/// Outcome of running the coordinator loop for a project.
#[derive(Debug, Clone)]
pub struct CoordinatorResult {
    pub success: bool,
    pub tasks_processed: u32,
    pub aborted_task: Option<String>,
    pub abort_reason: Option<String>,
}

pub struct Coordinator {
    dashboard: Arc<dyn DashboardClient>,
    engine: WorkflowEngine,
    workflows: Vec<WorkflowDefinition>,
    transport: Arc<dyn Transport>,
    persona_client: Arc<PersonaClient>,
    max_iterations: u32,
    repo_root: std::path::PathBuf,
}

impl Coordinator {
    pub fn new(
        dashboard: Arc<dyn DashboardClient>,
        engine: WorkflowEngine,
        workflows: Vec<WorkflowDefinition>,
        transport: Arc<dyn Transport>,
        persona_client: Arc<PersonaClient>,
        max_iterations: u32,
        repo_root: impl Into<std::path::PathBuf>,
    ) -> Self {
        Self {
            dashboard,
            engine,
            workflows,
            transport,
            persona_client,
            max_iterations,
            repo_root: repo_root.into(),
        }
    }

    /// Runs the selection loop for `project_id` until no pending tasks
    /// remain, a task-level workflow fails, or `max_iterations` is reached.
    pub async fn run(&self, project_id: &str) -> Result<CoordinatorResult> {
        let mut processed = 0u32;

        for iteration in 0..self.max_iterations {
            let tasks = self.dashboard.list_tasks(project_id).await?;
            let Some(task) = self.select_next_task(&tasks) else {
                info!(project_id, iteration, "no pending tasks remain");
                return Ok(CoordinatorResult {
                    success: true,
                    tasks_processed: processed,
                    aborted_task: None,
                    abort_reason: None,
                });
            };

            info!(project_id, task_id = %task.id, status = ?task.status, "selected task");

            let workflow = self.select_workflow(&task).ok_or_else(|| OrchestratorError::NoMatchingWorkflow {
                task_type: TaskType::classify(&task).as_str().to_string(),
            })?;

            let repo_remote = task
                .repo_remote
                .clone()
                .ok_or_else(|| OrchestratorError::MissingRepoRemote(task.id.clone()))?;

            let branch = task
                .branch
                .clone()
                .unwrap_or_else(|| feature_branch_name(&task));

            let context = WorkflowContext::new(
                project_id,
                self.repo_root.clone(),
                branch.clone(),
                self.transport.clone(),
                self.persona_client.clone(),
            );
            context.set_variable("task", serde_json::to_value(&task)?);
            context.set_variable("repo_remote", Value::String(repo_remote));
            context.set_variable("feature_branch_name", Value::String(branch));

            let result = self.engine.execute_workflow_definition(workflow, &context).await?;
            processed += 1;

            if !result.success {
                error!(
                    project_id,
                    task_id = %task.id,
                    failed_step = ?result.failed_step,
                    "workflow failed, aborting coordinator run"
                );
                return Ok(CoordinatorResult {
                    success: false,
                    tasks_processed: processed,
                    aborted_task: Some(task.id.clone()),
                    abort_reason: result.error,
                });
            }
        }

        warn!(project_id, "coordinator reached max iterations");
        Ok(CoordinatorResult {
            success: true,
            tasks_processed: processed,
            aborted_task: None,
            abort_reason: None,
        })
    }

    /// Selects the highest-priority pending task: `priority_score` DESC,
    /// then status bucket ASC, then `order` ASC.
    fn select_next_task(&self, tasks: &[Task]) -> Option<Task> {
        tasks
            .iter()
            .filter(|t| t.status != TaskStatus::Done)
            .min_by(|a, b| {
                b.priority_score
                    .cmp(&a.priority_score)
                    .then_with(|| a.status.priority_bucket().cmp(&b.status.priority_bucket()))
                    .then_with(|| a.order.cmp(&b.order))
            })
            .cloned()
    }

    fn select_workflow(&self, task: &Task) -> Option<&WorkflowDefinition> {
        if task.status == TaskStatus::Blocked {
            if let Some(w) = self.workflows.iter().find(|w| w.name == BLOCKED_TASK_RESOLUTION) {
                return Some(w);
            }
        }
        if task.status == TaskStatus::InReview {
            if let Some(w) = self.workflows.iter().find(|w| w.name == IN_REVIEW_TASK_FLOW) {
                return Some(w);
            }
        }

        let task_type = TaskType::classify(task);
        let scope = TaskScope::classify(task);
        if let Some(w) = find_workflow_by_condition(&self.workflows, task_type.as_str(), Some(scope.as_str())) {
            return Some(w);
        }

        self.workflows.iter().find(|w| w.name == FALLBACK_WORKFLOW)
    }
}

fn feature_branch_name(task: &Task) -> String {
    let slug = task.slug.clone().unwrap_or_else(|| slugify(&task.name));
    if let Some(milestone) = &task.milestone_id {
        format!("milestone/{milestone}/{slug}")
    } else {
        format!("feat/{slug}")
    }
}

fn slugify(name: &str) -> String {
    name.to_lowercase()
        .chars()
        .map(|c| if c.is_alphanumeric() { c } else { '-' })
        .collect::<String>()
        .split('-')
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join("-")
}
