// Copyright (c) 2026 Task Orchestrator Team
// SPDX-License-Identifier: Apache-2.0

//! Sets one or more workflow variables from a static or placeholder-resolved
//! configuration map.

use crate::context::WorkflowContext;
use crate::error::Result;
use crate::step::{Step, StepOutcome};
use crate::workflow::StepDefinition;
use async_trait::async_trait;

pub struct VariableSetStep;

#[async_trait]
impl Step for VariableSetStep {
    async fn execute(&self, def: &StepDefinition, context: &WorkflowContext) -> Result<StepOutcome> {
        let serde_json::Value::Object(map) = &def.config else {
            return Ok(StepOutcome::success(serde_json::Value::Null));
        };

        for (key, value) in map {
            let resolved = super::persona_request::resolve_value(value, context);
            context.set_variable(key.clone(), resolved);
        }

        Ok(StepOutcome::success(def.config.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::persona::PersonaClient;
    use crate::transport::InMemoryTransport;
    use std::sync::Arc;

    #[tokio::test]
    async fn sets_variables_from_config() {
        let transport: Arc<dyn crate::transport::Transport> = Arc::new(InMemoryTransport::new());
        let persona = Arc::new(PersonaClient::new(transport.clone(), "requests", "grp"));
        let ctx = WorkflowContext::new("proj", "/tmp/repo", "main", transport, persona);

        let def = StepDefinition {
            name: "set".to_string(),
            step_type: "variable_set".to_string(),
            description: String::new(),
            depends_on: vec![],
            condition: None,
            config: serde_json::json!({ "tdd_stage": "red", "branch_name": "${branch}" }),
            outputs: vec![],
        };

        VariableSetStep.execute(&def, &ctx).await.unwrap();
        assert_eq!(ctx.get_variable("tdd_stage").unwrap(), "red");
        assert_eq!(ctx.get_variable("branch_name").unwrap(), "main");
    }
}
