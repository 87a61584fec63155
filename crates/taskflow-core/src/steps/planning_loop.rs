// Copyright (c) 2026 Task Orchestrator Team
// SPDX-License-Identifier: Apache-2.0

//! Bounded planner/evaluator negotiation: plan, evaluate, revise until pass
//! or the iteration cap is reached.

use super::{config_str, config_u32, config_u64};
use crate::context::WorkflowContext;
use crate::error::Result;
use crate::persona::Verdict;
use crate::step::{Step, StepOutcome};
use crate::workflow::StepDefinition;
use async_trait::async_trait;
use serde_json::Value;
use tracing::{info, warn};

const DEFAULT_MAX_ITERATIONS: u32 = 5;

pub struct PlanningLoopStep;

#[async_trait]
impl Step for PlanningLoopStep {
    async fn execute(&self, def: &StepDefinition, context: &WorkflowContext) -> Result<StepOutcome> {
        let planner = config_str(&def.config, "planner_persona")?;
        let evaluator = config_str(&def.config, "evaluator_persona")?;
        let max_iterations = config_u32(&def.config, "max_iterations", DEFAULT_MAX_ITERATIONS);
        let deadline_seconds = config_u64(&def.config, "deadline_seconds", 180);
        let max_retries = config_u32(&def.config, "max_retries", 3);
        let base_payload = def.config.get("payload").cloned().unwrap_or(Value::Null);

        let repo = context.resolve("${repo_remote}");
        let branch = context.branch.clone();

        let mut plan_result = Value::Null;
        let mut evaluation_result = Value::Null;
        let mut evaluation_passed = false;
        let mut iteration_reached = 0u32;

        for iteration in 1..=max_iterations {
            iteration_reached = iteration;

            let mut plan_payload = base_payload.clone();
            merge_object(
                &mut plan_payload,
                serde_json::json!({
                    "iteration": iteration,
                    "plan_iteration": iteration,
                    "previous_evaluation": evaluation_result,
                    "is_revision": iteration > 1,
                    "task": context.get_variable("task"),
                    "repo": repo,
                    "branch": branch,
                    "project_id": context.project_id,
                }),
            );

            let plan_reply = match context
                .persona_client
                .request_with_retry(
                    &planner,
                    &context.workflow_id,
                    &def.name,
                    "plan_task",
                    plan_payload,
                    &repo,
                    &branch,
                    &context.project_id,
                    deadline_seconds,
                    max_retries,
                )
                .await
            {
                Ok(reply) => reply,
                Err(err) => {
                    warn!(iteration, error = %err, "planning loop: planner request failed, continuing");
                    if iteration == max_iterations {
                        break;
                    }
                    continue;
                }
            };
            plan_result = serde_json::from_str(&plan_reply.result).unwrap_or(Value::String(plan_reply.result.clone()));

            let evaluator_context_name = if iteration <= 3 { "planning" } else { "revision" };
            let mut eval_payload = serde_json::json!({
                "plan": plan_result,
                "iteration": iteration,
                "task": context.get_variable("task"),
                "repo": repo,
                "branch": branch,
                "project_id": context.project_id,
                "evaluator_context": evaluator_context_name,
            });
            if let Some(prompts) = def.config.get("evaluator_prompts") {
                if let Some(prompt) = prompts.get(evaluator_context_name) {
                    merge_object(&mut eval_payload, serde_json::json!({ "system_prompt": prompt }));
                }
            }

            let eval_reply = match context
                .persona_client
                .request_with_retry(
                    &evaluator,
                    &context.workflow_id,
                    &def.name,
                    "evaluate_plan",
                    eval_payload,
                    &repo,
                    &branch,
                    &context.project_id,
                    deadline_seconds,
                    max_retries,
                )
                .await
            {
                Ok(reply) => reply,
                Err(err) => {
                    warn!(iteration, error = %err, "planning loop: evaluator request failed, continuing");
                    if iteration == max_iterations {
                        break;
                    }
                    continue;
                }
            };
            evaluation_result = serde_json::from_str(&eval_reply.result).unwrap_or(Value::String(eval_reply.result.clone()));

            if Verdict::from_result(&eval_reply.result) == Verdict::Pass {
                evaluation_passed = true;
                info!(iteration, "planning loop converged");
                break;
            }
        }

        Ok(StepOutcome::success_with_outputs(serde_json::json!({
            "plan_result": plan_result,
            "evaluation_result": evaluation_result,
            "iterations": iteration_reached,
            "evaluation_passed": evaluation_passed,
            "reached_max": iteration_reached == max_iterations && !evaluation_passed,
        })))
    }
}

fn merge_object(target: &mut Value, additions: Value) {
    let (Value::Object(target_map), Value::Object(additions_map)) = (target, additions) else {
        return;
    };
    for (k, v) in additions_map {
        target_map.insert(k, v);
    }
}
