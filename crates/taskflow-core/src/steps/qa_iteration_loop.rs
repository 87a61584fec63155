// Copyright (c) 2026 Task Orchestrator Team
// SPDX-License-Identifier: Apache-2.0

//! Fix-test-repeat cycle: plan a fix, implement it, apply the diff, commit,
//! and retest, until QA passes or the attempt cap is reached.

use super::{config_str, config_u64};
use crate::adapters::GitClient;
use crate::context::WorkflowContext;
use crate::diff::parse_diff_blocks;
use crate::error::{OrchestratorError, Result};
use crate::persona::Verdict;
use crate::step::{Step, StepOutcome};
use crate::workflow::StepDefinition;
use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;
use tracing::{info, warn};

/// Either a finite attempt cap or an unbounded loop (the `"unlimited"`
/// sentinel configuration value).
#[derive(Debug, Clone, Copy)]
enum IterationCap {
    Bounded(u32),
    Unlimited,
}

impl IterationCap {
    fn from_config(config: &Value) -> Self {
        match config.get("max_iterations") {
            Some(Value::String(s)) if s == "unlimited" => IterationCap::Unlimited,
            Some(Value::Number(n)) => IterationCap::Bounded(n.as_u64().unwrap_or(5) as u32),
            _ => IterationCap::Bounded(5),
        }
    }

    fn reached(&self, iteration: u32) -> bool {
        matches!(self, IterationCap::Bounded(max) if iteration >= *max)
    }
}

/// Builds the failed outcome for a cap-exhausted loop: the error names the
/// attempt count, and `data.iteration_history` still carries every attempt
/// so a failure handler or the caller can surface what was tried.
fn exhausted_outcome(iteration: u32, history: Vec<Value>) -> StepOutcome {
    StepOutcome::failure_with_data(
        format!("qa iteration loop exhausted after {iteration} attempt(s) without passing"),
        serde_json::json!({ "iteration_history": history }),
    )
}

pub struct QaIterationLoopStep {
    git: Arc<dyn GitClient>,
}

impl QaIterationLoopStep {
    pub fn new(git: Arc<dyn GitClient>) -> Self {
        Self { git }
    }
}

#[async_trait]
impl Step for QaIterationLoopStep {
    async fn execute(&self, def: &StepDefinition, context: &WorkflowContext) -> Result<StepOutcome> {
        let planner = config_str(&def.config, "planner_persona")?;
        let implementer = config_str(&def.config, "implementer_persona")?;
        let qa_persona = config_str(&def.config, "qa_persona")?;
        let deadline_seconds = config_u64(&def.config, "deadline_seconds", 300);
        let cap = IterationCap::from_config(&def.config);

        let repo = context.resolve("${repo_remote}");
        let branch = context.branch.clone();

        let mut history: Vec<Value> = Vec::new();
        let mut qa_reply_result = context
            .get_variable("qa_failure")
            .unwrap_or_else(|| Value::String("no prior QA failure recorded".to_string()));

        let mut iteration = 0u32;
        loop {
            iteration += 1;

            let plan_payload = serde_json::json!({
                "task": context.get_variable("task"),
                "qa_failure": qa_reply_result,
                "iteration": iteration,
                "plan_iteration": iteration,
                "previous_attempts": history,
                "repo": repo,
                "branch": branch,
                "project_id": context.project_id,
            });
            let plan_reply = context
                .persona_client
                .request_with_retry(
                    &planner, &context.workflow_id, &def.name, "plan_fix", plan_payload, &repo, &branch,
                    &context.project_id, deadline_seconds, 3,
                )
                .await;

            let plan_reply = match plan_reply {
                Ok(r) => r,
                Err(err) if cap.reached(iteration) => {
                    history.push(serde_json::json!({"iteration": iteration, "error": err.to_string()}));
                    return Ok(exhausted_outcome(iteration, history));
                }
                Err(err) => {
                    warn!(iteration, error = %err, "qa loop: plan-fix request failed, continuing");
                    history.push(serde_json::json!({"iteration": iteration, "error": err.to_string()}));
                    continue;
                }
            };

            let implement_payload = serde_json::json!({
                "task": context.get_variable("task"),
                "plan": plan_reply.result,
                "iteration": iteration,
                "branch": branch,
                "repo": repo,
                "project_id": context.project_id,
            });
            let implement_reply = context
                .persona_client
                .request_with_retry(
                    &implementer, &context.workflow_id, &def.name, "implement_fix", implement_payload, &repo, &branch,
                    &context.project_id, deadline_seconds, 3,
                )
                .await;

            let implement_reply = match implement_reply {
                Ok(r) => r,
                Err(err) if cap.reached(iteration) => {
                    history.push(serde_json::json!({"iteration": iteration, "error": err.to_string()}));
                    return Ok(exhausted_outcome(iteration, history));
                }
                Err(err) => {
                    warn!(iteration, error = %err, "qa loop: implement request failed, continuing");
                    history.push(serde_json::json!({"iteration": iteration, "error": err.to_string()}));
                    continue;
                }
            };

            let spec = parse_diff_blocks(&implement_reply.result)?;
            if spec.is_empty() {
                let err = OrchestratorError::NoOpImplementation(format!(
                    "iteration {iteration} produced no diff operations"
                ));
                history.push(serde_json::json!({"iteration": iteration, "error": err.to_string()}));
                if cap.reached(iteration) {
                    return Ok(exhausted_outcome(iteration, history));
                }
                warn!(iteration, "qa loop: implementation produced no diff, continuing");
                continue;
            }

            let mut changed_files = Vec::new();
            for op in &spec.ops {
                match op {
                    crate::diff::EditOp::Upsert { path, content } => {
                        let full = context.repo_root.join(path);
                        if let Some(parent) = full.parent() {
                            std::fs::create_dir_all(parent).map_err(|e| OrchestratorError::other(e.to_string()))?;
                        }
                        std::fs::write(&full, content).map_err(|e| OrchestratorError::other(e.to_string()))?;
                        changed_files.push(path.clone());
                    }
                    crate::diff::EditOp::Delete { path } => {
                        let full = context.repo_root.join(path);
                        if full.exists() {
                            std::fs::remove_file(&full).map_err(|e| OrchestratorError::other(e.to_string()))?;
                        }
                        changed_files.push(path.clone());
                    }
                }
            }

            let message = format!("fix(qa-iteration-{iteration}): address QA feedback");
            let commit_outcome = self
                .git
                .commit_and_push_paths(&context.repo_root, &changed_files, &message, &branch)
                .await?;

            if commit_outcome.commit_sha.is_none() || commit_outcome.changed_files.is_empty() {
                return Err(OrchestratorError::NoOpImplementation(format!(
                    "iteration {iteration} commit produced no sha or no changed files"
                )));
            }
            if commit_outcome.committed && !commit_outcome.pushed {
                return Err(OrchestratorError::PushFailed(
                    commit_outcome.reason.clone().unwrap_or_else(|| "push did not complete".to_string()),
                ));
            }

            let qa_payload = serde_json::json!({
                "task": context.get_variable("task"),
                "plan": plan_reply.result,
                "implementation": implement_reply.result,
                "iteration": iteration,
                "previous_attempts": history,
                "tdd_stage": context.get_variable("tdd_stage"),
                "is_tdd_failing_test_stage": context.get_variable("is_tdd_failing_test_stage"),
                "branch": branch,
                "repo": repo,
                "project_id": context.project_id,
            });
            let qa_reply = context
                .persona_client
                .request_with_retry(
                    &qa_persona, &context.workflow_id, &def.name, "run_qa", qa_payload, &repo, &branch,
                    &context.project_id, deadline_seconds, 3,
                )
                .await?;
            qa_reply_result = serde_json::from_str(&qa_reply.result).unwrap_or(Value::String(qa_reply.result.clone()));
            let verdict = Verdict::from_result(&qa_reply.result);

            history.push(serde_json::json!({
                "iteration": iteration,
                "plan": plan_reply.result,
                "implementation": implement_reply.result,
                "qa_result": qa_reply.result,
                "pass": verdict == Verdict::Pass,
                "commit_sha": commit_outcome.commit_sha,
            }));

            if verdict == Verdict::Pass {
                info!(iteration, "qa iteration loop passed");
                context.set_variable("qa_request_status", Value::String("pass".to_string()));
                context.set_variable("qa_request_result", qa_reply_result.clone());
                context.set_variable("qa_iteration_count", Value::Number(iteration.into()));

                return Ok(StepOutcome::success_with_outputs(serde_json::json!({
                    "qa_request_status": "pass",
                    "qa_request_result": qa_reply_result,
                    "qa_iteration_count": iteration,
                    "iteration_history": history,
                })));
            }

            if cap.reached(iteration) {
                return Ok(exhausted_outcome(iteration, history));
            }
        }
    }
}
