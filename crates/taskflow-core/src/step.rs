// Copyright (c) 2026 Task Orchestrator Team
// SPDX-License-Identifier: Apache-2.0

//! The uniform step execution contract and the registry of step types.

use crate::context::WorkflowContext;
use crate::error::Result;
use crate::workflow::StepDefinition;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;

/// Execution status recorded for a step once it leaves `Running`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepStatus {
    Pending,
    Running,
    Succeeded,
    Failed,
    TimedOut,
    Skipped,
}

/// The outcome of one step execution.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepOutcome {
    pub status: StepStatus,
    #[serde(default)]
    pub data: Option<Value>,
    #[serde(default)]
    pub outputs: Option<Value>,
    #[serde(default)]
    pub error: Option<String>,
}

impl StepOutcome {
    pub fn success(data: Value) -> Self {
        Self { status: StepStatus::Succeeded, data: Some(data), outputs: None, error: None }
    }

    pub fn success_with_outputs(outputs: Value) -> Self {
        Self { status: StepStatus::Succeeded, data: None, outputs: Some(outputs), error: None }
    }

    pub fn failure(error: impl Into<String>) -> Self {
        Self { status: StepStatus::Failed, data: None, outputs: None, error: Some(error.into()) }
    }

    /// A failed outcome that still carries partial results (e.g. the
    /// iteration history of a loop that exhausted its attempt cap) for
    /// callers inspecting `context.stepOutputs` or the failure handlers.
    pub fn failure_with_data(error: impl Into<String>, data: Value) -> Self {
        Self { status: StepStatus::Failed, data: Some(data), outputs: None, error: Some(error.into()) }
    }

    /// The value recorded into `context.stepOutputs`: `outputs` if present,
    /// else `data`, else `null`.
    pub fn recorded_value(&self) -> Value {
        self.outputs.clone().or_else(|| self.data.clone()).unwrap_or(Value::Null)
    }
}

/// Recorded result of a completed (or skipped) step, kept for reporting.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepResult {
    pub step_name: String,
    pub status: StepStatus,
    pub error: Option<String>,
    pub duration_ms: u128,
}

/// A pluggable step implementation.
#[async_trait]
pub trait Step: Send + Sync {
    /// Executes the step's configured behavior against `context`.
    async fn execute(&self, def: &StepDefinition, context: &WorkflowContext) -> Result<StepOutcome>;
}

/// Factory for constructing a [`Step`] from its registry key.
pub type StepFactory = Arc<dyn Fn() -> Arc<dyn Step> + Send + Sync>;

/// Maps step-type names to factories.
#[derive(Clone, Default)]
pub struct StepRegistry {
    factories: HashMap<String, StepFactory>,
}

impl StepRegistry {
    pub fn new() -> Self {
        Self { factories: HashMap::new() }
    }

    pub fn register(&mut self, type_name: impl Into<String>, factory: StepFactory) {
        self.factories.insert(type_name.into(), factory);
    }

    pub fn create(&self, type_name: &str) -> Option<Arc<dyn Step>> {
        self.factories.get(type_name).map(|f| f())
    }

    pub fn contains(&self, type_name: &str) -> bool {
        self.factories.contains_key(type_name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct NoopStep;

    #[async_trait]
    impl Step for NoopStep {
        async fn execute(&self, _def: &StepDefinition, _context: &WorkflowContext) -> Result<StepOutcome> {
            Ok(StepOutcome::success(Value::Null))
        }
    }

    #[test]
    fn registry_creates_registered_step() {
        let mut registry = StepRegistry::new();
        registry.register("noop", Arc::new(|| Arc::new(NoopStep) as Arc<dyn Step>));
        assert!(registry.contains("noop"));
        assert!(registry.create("noop").is_some());
        assert!(registry.create("missing").is_none());
    }

    #[test]
    fn recorded_value_prefers_outputs_over_data() {
        let outcome = StepOutcome {
            status: StepStatus::Succeeded,
            data: Some(Value::String("data".into())),
            outputs: Some(Value::String("outputs".into())),
            error: None,
        };
        assert_eq!(outcome.recorded_value(), Value::String("outputs".into()));
    }
}
