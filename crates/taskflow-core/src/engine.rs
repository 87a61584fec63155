// Copyright (c) 2026 Task Orchestrator Team
// SPDX-License-Identifier: Apache-2.0

//! The workflow execution engine: loads definitions, orders steps, and runs
//! them against a [`WorkflowContext`].

use crate::context::WorkflowContext;
use crate::dag::topological_order;
use crate::error::{OrchestratorError, Result};
use crate::step::{StepRegistry, StepResult, StepStatus};
use crate::workflow::{StepDefinition, WorkflowDefinition};
use dashmap::DashMap;
use std::collections::HashMap;
use tracing::{debug, error, info, warn};

/// Outcome of running an entire workflow.
#[derive(Debug, Clone)]
pub struct WorkflowExecutionResult {
    pub success: bool,
    pub completed_steps: Vec<String>,
    pub failed_step: Option<String>,
    pub error: Option<String>,
    pub step_results: HashMap<String, StepResult>,
}

/// Runs [`WorkflowDefinition`]s against a [`StepRegistry`].
pub struct WorkflowEngine {
    registry: StepRegistry,
}

impl WorkflowEngine {
    pub fn new(registry: StepRegistry) -> Self {
        Self { registry }
    }

    /// Executes `workflow` to completion against `context`, running
    /// failure handlers if a step fails.
    pub async fn execute_workflow_definition(
        &self,
        workflow: &WorkflowDefinition,
        context: &WorkflowContext,
    ) -> Result<WorkflowExecutionResult> {
        info!(workflow = %workflow.name, workflow_id = %context.workflow_id, "starting workflow execution");

        let order = topological_order(&workflow.steps)
            .map_err(OrchestratorError::CyclicDependency)?;

        let statuses: DashMap<String, StepStatus> = DashMap::new();
        let step_results: DashMap<String, StepResult> = DashMap::new();
        let mut completed_steps = Vec::new();

        for step_name in &order {
            let def = workflow
                .step(step_name)
                .ok_or_else(|| OrchestratorError::StepNotFound(step_name.clone()))?;

            let deps_ok = def.depends_on.iter().all(|dep| {
                matches!(statuses.get(dep).map(|s| *s), Some(StepStatus::Succeeded))
            });

            if !deps_ok {
                warn!(step = %def.name, "skipping step: a dependency did not succeed");
                statuses.insert(def.name.clone(), StepStatus::Skipped);
                continue;
            }

            if let Some(cond) = &def.condition {
                if !context.evaluate_condition(cond) {
                    info!(step = %def.name, condition = %cond, "skipping step due to guard condition");
                    statuses.insert(def.name.clone(), StepStatus::Skipped);
                    continue;
                }
            }

            let outcome_result = self.run_step(workflow, def, context).await;

            match outcome_result {
                Ok(outcome) if outcome.status == StepStatus::Succeeded => {
                    context.set_output(&def.name, outcome.recorded_value());
                    statuses.insert(def.name.clone(), StepStatus::Succeeded);
                    completed_steps.push(def.name.clone());
                }
                Ok(outcome) => {
                    statuses.insert(def.name.clone(), outcome.status);
                    if outcome.data.is_some() || outcome.outputs.is_some() {
                        context.set_output(&def.name, outcome.recorded_value());
                    }
                    step_results.insert(
                        def.name.clone(),
                        StepResult {
                            step_name: def.name.clone(),
                            status: outcome.status,
                            error: outcome.error.clone(),
                            duration_ms: 0,
                        },
                    );
                    self.run_failure_handlers(&workflow.on_step_failure, context).await;
                    error!(step = %def.name, error = ?outcome.error, "step failed");
                    self.run_failure_handlers(&workflow.on_workflow_failure, context).await;
                    return Ok(WorkflowExecutionResult {
                        success: false,
                        completed_steps,
                        failed_step: Some(def.name.clone()),
                        error: outcome.error,
                        step_results: step_results.into_iter().collect(),
                    });
                }
                Err(err) => {
                    let status = if matches!(err, OrchestratorError::Timeout { .. }) {
                        StepStatus::TimedOut
                    } else {
                        StepStatus::Failed
                    };
                    statuses.insert(def.name.clone(), status);
                    step_results.insert(
                        def.name.clone(),
                        StepResult {
                            step_name: def.name.clone(),
                            status,
                            error: Some(err.to_string()),
                            duration_ms: 0,
                        },
                    );
                    self.run_failure_handlers(&workflow.on_step_failure, context).await;
                    error!(step = %def.name, error = %err, "step raised an error");
                    self.run_failure_handlers(&workflow.on_workflow_failure, context).await;
                    return Ok(WorkflowExecutionResult {
                        success: false,
                        completed_steps,
                        failed_step: Some(def.name.clone()),
                        error: Some(err.to_string()),
                        step_results: step_results.into_iter().collect(),
                    });
                }
            }
        }

        info!(workflow = %workflow.name, "workflow completed successfully");
        Ok(WorkflowExecutionResult {
            success: true,
            completed_steps,
            failed_step: None,
            error: None,
            step_results: step_results.into_iter().collect(),
        })
    }

    async fn run_step(
        &self,
        workflow: &WorkflowDefinition,
        def: &StepDefinition,
        context: &WorkflowContext,
    ) -> Result<crate::step::StepOutcome> {
        let step = self
            .registry
            .create(&def.step_type)
            .ok_or_else(|| OrchestratorError::UnknownStepType(def.step_type.clone()))?;

        let timeout = workflow.timeout_for(def);
        debug!(step = %def.name, timeout_secs = timeout.as_secs(), "executing step");

        match tokio::time::timeout(timeout, step.execute(def, context)).await {
            Ok(result) => result,
            Err(_) => Err(OrchestratorError::Timeout { duration: timeout }),
        }
    }

    async fn run_failure_handlers(&self, handlers: &[StepDefinition], context: &WorkflowContext) {
        for handler in handlers {
            let Some(step) = self.registry.create(&handler.step_type) else {
                warn!(handler = %handler.name, "failure handler references unknown step type");
                continue;
            };
            if let Err(err) = step.execute(handler, context).await {
                warn!(handler = %handler.name, error = %err, "failure handler itself failed");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::persona::PersonaClient;
    use crate::step::{Step, StepOutcome};
    use crate::transport::InMemoryTransport;
    use async_trait::async_trait;
    use serde_json::Value;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    struct AlwaysSucceeds;
    #[async_trait]
    impl Step for AlwaysSucceeds {
        async fn execute(&self, def: &StepDefinition, _ctx: &WorkflowContext) -> Result<StepOutcome> {
            Ok(StepOutcome::success(serde_json::json!({"step": def.name})))
        }
    }

    struct AlwaysFails;
    #[async_trait]
    impl Step for AlwaysFails {
        async fn execute(&self, _def: &StepDefinition, _ctx: &WorkflowContext) -> Result<StepOutcome> {
            Ok(StepOutcome::failure("boom"))
        }
    }

    struct NeverFinishes;
    #[async_trait]
    impl Step for NeverFinishes {
        async fn execute(&self, _def: &StepDefinition, _ctx: &WorkflowContext) -> Result<StepOutcome> {
            tokio::time::sleep(std::time::Duration::from_secs(3600)).await;
            Ok(StepOutcome::success(Value::Null))
        }
    }

    struct CountingHandler(Arc<AtomicUsize>);
    #[async_trait]
    impl Step for CountingHandler {
        async fn execute(&self, _def: &StepDefinition, _ctx: &WorkflowContext) -> Result<StepOutcome> {
            self.0.fetch_add(1, Ordering::SeqCst);
            Ok(StepOutcome::success(Value::Null))
        }
    }

    fn test_context() -> WorkflowContext {
        let transport: Arc<dyn crate::transport::Transport> = Arc::new(InMemoryTransport::new());
        let persona = Arc::new(PersonaClient::new(transport.clone(), "requests", "grp"));
        WorkflowContext::new("proj", "/tmp/repo", "main", transport, persona)
    }

    fn step_def(name: &str, step_type: &str, deps: &[&str]) -> StepDefinition {
        StepDefinition {
            name: name.to_string(),
            step_type: step_type.to_string(),
            description: String::new(),
            depends_on: deps.iter().map(|s| s.to_string()).collect(),
            condition: None,
            config: Value::Null,
            outputs: vec![],
        }
    }

    fn workflow(steps: Vec<StepDefinition>) -> WorkflowDefinition {
        WorkflowDefinition {
            name: "test-flow".to_string(),
            version: "1.0".to_string(),
            trigger: None,
            repo_required: false,
            steps,
            on_step_failure: vec![],
            on_workflow_failure: vec![],
            timeouts: HashMap::new(),
        }
    }

    #[tokio::test]
    async fn succeeds_and_records_outputs_in_order() {
        let mut registry = StepRegistry::new();
        registry.register("ok", Arc::new(|| Arc::new(AlwaysSucceeds) as Arc<dyn Step>));
        let engine = WorkflowEngine::new(registry);
        let ctx = test_context();

        let wf = workflow(vec![step_def("a", "ok", &[]), step_def("b", "ok", &["a"])]);
        let result = engine.execute_workflow_definition(&wf, &ctx).await.unwrap();

        assert!(result.success);
        assert_eq!(result.completed_steps, vec!["a".to_string(), "b".to_string()]);
        assert!(ctx.has_output("a"));
        assert!(ctx.has_output("b"));
    }

    #[tokio::test]
    async fn failing_step_halts_and_skips_dependents() {
        let mut registry = StepRegistry::new();
        registry.register("ok", Arc::new(|| Arc::new(AlwaysSucceeds) as Arc<dyn Step>));
        registry.register("fail", Arc::new(|| Arc::new(AlwaysFails) as Arc<dyn Step>));
        let engine = WorkflowEngine::new(registry);
        let ctx = test_context();

        let wf = workflow(vec![
            step_def("a", "fail", &[]),
            step_def("b", "ok", &["a"]),
        ]);
        let result = engine.execute_workflow_definition(&wf, &ctx).await.unwrap();

        assert!(!result.success);
        assert_eq!(result.failed_step, Some("a".to_string()));
        assert!(!ctx.has_output("b"));
    }

    #[tokio::test]
    async fn failure_handlers_run_on_step_failure() {
        let counter = Arc::new(AtomicUsize::new(0));
        let mut registry = StepRegistry::new();
        registry.register("fail", Arc::new(|| Arc::new(AlwaysFails) as Arc<dyn Step>));
        let counter_clone = counter.clone();
        registry.register(
            "notify",
            Arc::new(move || Arc::new(CountingHandler(counter_clone.clone())) as Arc<dyn Step>),
        );
        let engine = WorkflowEngine::new(registry);
        let ctx = test_context();

        let mut wf = workflow(vec![step_def("a", "fail", &[])]);
        wf.on_step_failure = vec![step_def("notify-handler", "notify", &[])];

        let result = engine.execute_workflow_definition(&wf, &ctx).await.unwrap();
        assert!(!result.success);
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn timed_out_step_is_recorded_as_timed_out_not_failed() {
        let mut registry = StepRegistry::new();
        registry.register("slow", Arc::new(|| Arc::new(NeverFinishes) as Arc<dyn Step>));
        let engine = WorkflowEngine::new(registry);
        let ctx = test_context();

        let mut wf = workflow(vec![step_def("a", "slow", &[])]);
        wf.timeouts.insert("default_step".to_string(), 0);

        let result = engine.execute_workflow_definition(&wf, &ctx).await.unwrap();

        assert!(!result.success);
        assert_eq!(result.failed_step, Some("a".to_string()));
        let recorded = result.step_results.get("a").expect("step result recorded");
        assert_eq!(recorded.status, StepStatus::TimedOut);
    }

    #[tokio::test]
    async fn guard_condition_skips_step() {
        let mut registry = StepRegistry::new();
        registry.register("ok", Arc::new(|| Arc::new(AlwaysSucceeds) as Arc<dyn Step>));
        let engine = WorkflowEngine::new(registry);
        let ctx = test_context();

        let mut step = step_def("a", "ok", &[]);
        step.condition = Some(r#"missing == "yes""#.to_string());
        let wf = workflow(vec![step]);

        let result = engine.execute_workflow_definition(&wf, &ctx).await.unwrap();
        assert!(result.success);
        assert!(result.completed_steps.is_empty());
        assert!(!ctx.has_output("a"));
    }
}
