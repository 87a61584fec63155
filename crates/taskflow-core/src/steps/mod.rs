// Copyright (c) 2026 Task Orchestrator Team
// SPDX-License-Identifier: Apache-2.0

//! Built-in step implementations and registry wiring.

pub mod blocked_task_analysis;
pub mod conditional;
pub mod context_scan;
pub mod diff_apply;
pub mod git_operation;
pub mod persona_request;
pub mod planning_loop;
pub mod qa_iteration_loop;
pub mod task_update;
pub mod unblock_attempt;
pub mod variable_set;

use crate::adapters::{DashboardClient, GitClient, ScanClient};
use crate::error::{OrchestratorError, Result};
use crate::step::{Step, StepRegistry};
use serde_json::Value;
use std::sync::Arc;

/// Registers every built-in step type under its conventional name.
pub fn register_builtin_steps(
    registry: &mut StepRegistry,
    dashboard: Arc<dyn DashboardClient>,
    git: Arc<dyn GitClient>,
    scan: Arc<dyn ScanClient>,
) {
    registry.register(
        "persona_request",
        Arc::new(|| Arc::new(persona_request::PersonaRequestStep) as Arc<dyn Step>),
    );
    registry.register(
        "conditional",
        Arc::new(|| Arc::new(conditional::ConditionalStep) as Arc<dyn Step>),
    );
    registry.register(
        "variable_set",
        Arc::new(|| Arc::new(variable_set::VariableSetStep) as Arc<dyn Step>),
    );
    registry.register("task_update", {
        let dashboard = dashboard.clone();
        Arc::new(move || Arc::new(task_update::TaskUpdateStep::new(dashboard.clone())) as Arc<dyn Step>)
    });
    registry.register("context_scan", {
        let scan = scan.clone();
        let git = git.clone();
        Arc::new(move || Arc::new(context_scan::ContextScanStep::new(scan.clone(), git.clone())) as Arc<dyn Step>)
    });
    registry.register("diff_apply", {
        let git = git.clone();
        Arc::new(move || Arc::new(diff_apply::DiffApplyStep::new(git.clone())) as Arc<dyn Step>)
    });
    registry.register("git_operation", {
        let git = git.clone();
        Arc::new(move || Arc::new(git_operation::GitOperationStep::new(git.clone())) as Arc<dyn Step>)
    });
    registry.register("blocked_task_analysis", {
        let dashboard = dashboard.clone();
        Arc::new(move || Arc::new(blocked_task_analysis::BlockedTaskAnalysisStep::new(dashboard.clone())) as Arc<dyn Step>)
    });
    registry.register("unblock_attempt", {
        let dashboard = dashboard.clone();
        Arc::new(move || Arc::new(unblock_attempt::UnblockAttemptStep::new(dashboard.clone())) as Arc<dyn Step>)
    });
    registry.register(
        "planning_loop",
        Arc::new(|| Arc::new(planning_loop::PlanningLoopStep) as Arc<dyn Step>),
    );
    registry.register("qa_iteration_loop", {
        let git = git.clone();
        Arc::new(move || Arc::new(qa_iteration_loop::QaIterationLoopStep::new(git.clone())) as Arc<dyn Step>)
    });
}

/// Extracts a required string field from a step's JSON configuration,
/// resolving `${...}` placeholders against `context`.
pub(crate) fn config_str(config: &Value, key: &str) -> Result<String> {
    config
        .get(key)
        .and_then(Value::as_str)
        .map(|s| s.to_string())
        .ok_or_else(|| OrchestratorError::InvalidStepConfig {
            step_id: key.to_string(),
            reason: format!("missing required string field '{key}'"),
        })
}

pub(crate) fn config_str_opt(config: &Value, key: &str) -> Option<String> {
    config.get(key).and_then(Value::as_str).map(|s| s.to_string())
}

pub(crate) fn config_u64(config: &Value, key: &str, default: u64) -> u64 {
    config.get(key).and_then(Value::as_u64).unwrap_or(default)
}

pub(crate) fn config_u32(config: &Value, key: &str, default: u32) -> u32 {
    config.get(key).and_then(Value::as_u64).map(|v| v as u32).unwrap_or(default)
}
