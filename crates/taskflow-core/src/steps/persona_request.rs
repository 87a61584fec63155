// Copyright (c) 2026 Task Orchestrator Team
// SPDX-License-Identifier: Apache-2.0

//! Generic single-round persona invocation step.

use super::{config_str, config_str_opt, config_u32, config_u64};
use crate::context::WorkflowContext;
use crate::error::Result;
use crate::persona::Verdict;
use crate::step::{Step, StepOutcome};
use crate::workflow::StepDefinition;
use async_trait::async_trait;

/// Sends one request to a persona and records its reply (and normalized
/// verdict, if applicable) as this step's output.
pub struct PersonaRequestStep;

#[async_trait]
impl Step for PersonaRequestStep {
    async fn execute(&self, def: &StepDefinition, context: &WorkflowContext) -> Result<StepOutcome> {
        let persona = config_str(&def.config, "persona")?;
        let intent = config_str_opt(&def.config, "intent").unwrap_or_else(|| def.name.clone());
        let deadline_seconds = config_u64(&def.config, "deadline_seconds", 120);
        let max_retries = config_u32(&def.config, "max_retries", 3);

        let payload_template = def.config.get("payload").cloned().unwrap_or(serde_json::Value::Null);
        let payload = resolve_value(&payload_template, context);

        let repo = context.resolve("${repo_remote}");
        let branch = context.branch.clone();

        let reply = context
            .persona_client
            .request_with_retry(
                &persona,
                &context.workflow_id,
                &def.name,
                &intent,
                payload,
                &repo,
                &branch,
                &context.project_id,
                deadline_seconds,
                max_retries,
            )
            .await?;

        let verdict = Verdict::from_result(&reply.result);
        let outputs = serde_json::json!({
            "status": format!("{:?}", reply.status).to_lowercase(),
            "result": reply.result,
            "verdict": match verdict {
                Verdict::Pass => "pass",
                Verdict::Fail => "fail",
                Verdict::Unknown => "unknown",
            },
        });

        Ok(StepOutcome::success_with_outputs(outputs))
    }
}

/// Recursively resolves `${...}` placeholders within string leaves of an
/// arbitrary JSON configuration value.
pub(crate) fn resolve_value(value: &serde_json::Value, context: &WorkflowContext) -> serde_json::Value {
    match value {
        serde_json::Value::String(s) => serde_json::Value::String(context.resolve(s)),
        serde_json::Value::Array(items) => {
            serde_json::Value::Array(items.iter().map(|v| resolve_value(v, context)).collect())
        }
        serde_json::Value::Object(map) => serde_json::Value::Object(
            map.iter().map(|(k, v)| (k.clone(), resolve_value(v, context))).collect(),
        ),
        other => other.clone(),
    }
}
