// Copyright (c) 2026 Task Orchestrator Team
// SPDX-License-Identifier: Apache-2.0

//! Declarative workflow definitions loaded from YAML.

use crate::error::{OrchestratorError, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;

/// A single step within a [`WorkflowDefinition`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepDefinition {
    pub name: String,
    #[serde(rename = "type")]
    pub step_type: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub depends_on: Vec<String>,
    #[serde(default)]
    pub condition: Option<String>,
    #[serde(default)]
    pub config: serde_json::Value,
    #[serde(default)]
    pub outputs: Vec<String>,
}

/// A named, versioned DAG of steps.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowDefinition {
    pub name: String,
    #[serde(default = "default_version")]
    pub version: String,
    #[serde(default)]
    pub trigger: Option<String>,
    #[serde(default)]
    pub repo_required: bool,
    pub steps: Vec<StepDefinition>,
    #[serde(default)]
    pub on_step_failure: Vec<StepDefinition>,
    #[serde(default)]
    pub on_workflow_failure: Vec<StepDefinition>,
    #[serde(default)]
    pub timeouts: HashMap<String, u64>,
}

fn default_version() -> String {
    "1.0".to_string()
}

impl WorkflowDefinition {
    /// Validates structural invariants: non-empty steps, unique names,
    /// dependencies reference defined steps, no cycles.
    pub fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(OrchestratorError::InvalidWorkflow {
                name: self.name.clone(),
                reason: "workflow name must not be empty".to_string(),
            });
        }
        if self.steps.is_empty() {
            return Err(OrchestratorError::InvalidWorkflow {
                name: self.name.clone(),
                reason: "workflow must declare at least one step".to_string(),
            });
        }

        let mut seen = std::collections::HashSet::new();
        for step in &self.steps {
            if !seen.insert(step.name.as_str()) {
                return Err(OrchestratorError::InvalidWorkflow {
                    name: self.name.clone(),
                    reason: format!("duplicate step name '{}'", step.name),
                });
            }
        }

        for step in &self.steps {
            for dep in &step.depends_on {
                if !seen.contains(dep.as_str()) {
                    return Err(OrchestratorError::InvalidWorkflow {
                        name: self.name.clone(),
                        reason: format!("step '{}' depends on undefined step '{}'", step.name, dep),
                    });
                }
            }
        }

        crate::dag::topological_order(&self.steps)
            .map_err(|cycle| OrchestratorError::InvalidWorkflow {
                name: self.name.clone(),
                reason: format!("dependency cycle involving '{cycle}'"),
            })?;

        Ok(())
    }

    pub fn step(&self, name: &str) -> Option<&StepDefinition> {
        self.steps.iter().find(|s| s.name == name)
    }

    /// Timeout for a step: per-step override, then per-type default, then
    /// `default_step`, then a five-minute fallback.
    pub fn timeout_for(&self, step: &StepDefinition) -> std::time::Duration {
        let secs = self
            .timeouts
            .get(&step.name)
            .or_else(|| self.timeouts.get(&step.step_type))
            .or_else(|| self.timeouts.get("default_step"))
            .copied()
            .unwrap_or(300);
        std::time::Duration::from_secs(secs)
    }
}

/// Loads every `*.yaml`/`*.yml` file in `dir` as a [`WorkflowDefinition`],
/// skipping files whose name starts with `test-`, `test_`, or `test.`
/// (case-insensitive).
pub fn load_workflows_from_dir(dir: &Path) -> Result<Vec<WorkflowDefinition>> {
    let mut defs = Vec::new();
    let entries = std::fs::read_dir(dir)
        .map_err(|e| OrchestratorError::other(format!("reading workflows dir {}: {e}", dir.display())))?;

    for entry in entries {
        let entry = entry.map_err(|e| OrchestratorError::other(e.to_string()))?;
        let path = entry.path();
        let Some(ext) = path.extension().and_then(|e| e.to_str()) else { continue };
        if ext != "yaml" && ext != "yml" {
            continue;
        }
        let file_name = path.file_name().and_then(|n| n.to_str()).unwrap_or("").to_lowercase();
        if file_name.starts_with("test-") || file_name.starts_with("test_") || file_name.starts_with("test.") {
            continue;
        }

        let content = std::fs::read_to_string(&path)
            .map_err(|e| OrchestratorError::other(format!("reading {}: {e}", path.display())))?;
        let def: WorkflowDefinition = serde_yaml::from_str(&content)?;
        def.validate()?;
        defs.push(def);
    }

    Ok(defs)
}

/// Finds the first workflow whose trigger condition matches `task_type` and
/// `scope`.
pub fn find_workflow_by_condition<'a>(
    workflows: &'a [WorkflowDefinition],
    task_type: &str,
    scope: Option<&str>,
) -> Option<&'a WorkflowDefinition> {
    let resolver = crate::expr::TriggerResolver { task_type, scope };
    workflows
        .iter()
        .find(|w| w.trigger.as_deref().map(|t| crate::expr::evaluate(t, &resolver)).unwrap_or(false))
}
