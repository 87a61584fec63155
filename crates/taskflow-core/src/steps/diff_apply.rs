// Copyright (c) 2026 Task Orchestrator Team
// SPDX-License-Identifier: Apache-2.0

//! Applies a persona-produced diff to the working tree and commits it.

use super::config_str_opt;
use crate::adapters::GitClient;
use crate::context::WorkflowContext;
use crate::diff::{parse_diff_blocks, render_diff_blocks, EditOp, EditSpec};
use crate::error::{OrchestratorError, Result};
use crate::step::{Step, StepOutcome};
use crate::workflow::StepDefinition;
use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;

pub struct DiffApplyStep {
    git: Arc<dyn GitClient>,
}

impl DiffApplyStep {
    pub fn new(git: Arc<dyn GitClient>) -> Self {
        Self { git }
    }
}

#[async_trait]
impl Step for DiffApplyStep {
    async fn execute(&self, def: &StepDefinition, context: &WorkflowContext) -> Result<StepOutcome> {
        let source_step = config_str_opt(&def.config, "source_step").unwrap_or_else(|| "implement".to_string());
        let dry_run = def.config.get("dry_run").and_then(Value::as_bool).unwrap_or(false);
        let message = config_str_opt(&def.config, "commit_message").unwrap_or_else(|| "apply generated changes".to_string());

        let source = context
            .get_output(&source_step)
            .ok_or_else(|| OrchestratorError::other(format!("diff_apply: no output recorded for step '{source_step}'")))?;

        let spec = extract_edit_spec(&source)?;
        if spec.is_empty() {
            return Err(OrchestratorError::NoOpImplementation(format!(
                "step '{}' produced no diff operations",
                source_step
            )));
        }

        if dry_run {
            return Ok(StepOutcome::success_with_outputs(serde_json::json!({
                "dry_run": true,
                "operation_count": spec.ops.len(),
            })));
        }

        let mut changed_files = Vec::new();
        for op in &spec.ops {
            match op {
                EditOp::Upsert { path, content } => {
                    let full = context.repo_root.join(path);
                    if let Some(parent) = full.parent() {
                        std::fs::create_dir_all(parent).map_err(|e| OrchestratorError::other(e.to_string()))?;
                    }
                    std::fs::write(&full, content).map_err(|e| OrchestratorError::other(e.to_string()))?;
                    changed_files.push(path.clone());
                }
                EditOp::Delete { path } => {
                    let full = context.repo_root.join(path);
                    if full.exists() {
                        std::fs::remove_file(&full).map_err(|e| OrchestratorError::other(e.to_string()))?;
                    }
                    changed_files.push(path.clone());
                }
            }
        }

        if changed_files.is_empty() {
            return Err(OrchestratorError::NoOpImplementation("no files were changed on disk".to_string()));
        }

        let resolved_message = context.resolve(&message);
        let outcome = self
            .git
            .commit_and_push_paths(&context.repo_root, &changed_files, &resolved_message, &context.branch)
            .await?;

        if outcome.commit_sha.is_none() || outcome.changed_files.is_empty() {
            return Err(OrchestratorError::NoOpImplementation(
                "commit produced no sha or no changed files".to_string(),
            ));
        }
        if outcome.committed && !outcome.pushed {
            return Err(OrchestratorError::PushFailed(
                outcome.reason.unwrap_or_else(|| "push did not complete".to_string()),
            ));
        }

        Ok(StepOutcome::success_with_outputs(serde_json::json!({
            "commit_sha": outcome.commit_sha,
            "changed_files": outcome.changed_files,
        })))
    }
}

fn extract_edit_spec(source: &Value) -> Result<EditSpec> {
    if let Some(text) = source.as_str() {
        return parse_diff_blocks(text);
    }

    if let Some(ops) = source.get("ops") {
        let spec: EditSpec = serde_json::from_value(ops.clone())
            .map(|ops: Vec<PreParsedOp>| EditSpec { ops: ops.into_iter().map(Into::into).collect() })
            .map_err(|e| OrchestratorError::DiffParse(e.to_string()))?;
        let rendered = render_diff_blocks(&spec);
        return parse_diff_blocks(&rendered);
    }

    for key in ["diffs", "code_diffs", "implementation_diff", "diff", "result"] {
        if let Some(text) = source.get(key).and_then(Value::as_str) {
            return parse_diff_blocks(text);
        }
    }

    Err(OrchestratorError::DiffParse(
        "could not locate diff text in step output".to_string(),
    ))
}

#[derive(serde::Deserialize)]
#[serde(untagged)]
enum PreParsedOp {
    Upsert { path: String, content: String },
    Delete { path: String },
}

impl From<PreParsedOp> for EditOp {
    fn from(op: PreParsedOp) -> Self {
        match op {
            PreParsedOp::Upsert { path, content } => EditOp::Upsert { path, content },
            PreParsedOp::Delete { path } => EditOp::Delete { path },
        }
    }
}
