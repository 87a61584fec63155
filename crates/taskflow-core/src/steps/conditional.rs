// Copyright (c) 2026 Task Orchestrator Team
// SPDX-License-Identifier: Apache-2.0

//! Evaluates an expression and records its boolean result as an output,
//! without itself failing the workflow; downstream steps gate on the
//! recorded `matched` output via their own guard condition.

use super::config_str;
use crate::context::WorkflowContext;
use crate::error::Result;
use crate::step::{Step, StepOutcome};
use crate::workflow::StepDefinition;
use async_trait::async_trait;

pub struct ConditionalStep;

#[async_trait]
impl Step for ConditionalStep {
    async fn execute(&self, def: &StepDefinition, context: &WorkflowContext) -> Result<StepOutcome> {
        let expression = config_str(&def.config, "expression")?;
        let matched = context.evaluate_condition(&expression);
        Ok(StepOutcome::success_with_outputs(serde_json::json!({ "matched": matched })))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::persona::PersonaClient;
    use crate::transport::InMemoryTransport;
    use std::sync::Arc;

    #[tokio::test]
    async fn records_matched_output() {
        let transport: Arc<dyn crate::transport::Transport> = Arc::new(InMemoryTransport::new());
        let persona = Arc::new(PersonaClient::new(transport.clone(), "requests", "grp"));
        let ctx = WorkflowContext::new("proj", "/tmp/repo", "main", transport, persona);
        ctx.set_variable("scope", serde_json::Value::String("small".to_string()));

        let def = StepDefinition {
            name: "check".to_string(),
            step_type: "conditional".to_string(),
            description: String::new(),
            depends_on: vec![],
            condition: None,
            config: serde_json::json!({ "expression": r#"scope == "small""# }),
            outputs: vec![],
        };

        let outcome = ConditionalStep.execute(&def, &ctx).await.unwrap();
        assert_eq!(outcome.outputs.unwrap()["matched"], true);
    }
}
