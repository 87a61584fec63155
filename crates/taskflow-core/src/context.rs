// Copyright (c) 2026 Task Orchestrator Team
// SPDX-License-Identifier: Apache-2.0

//! Per-run workflow state: variables, step outputs, and placeholder
//! resolution.

use crate::expr::{MapResolver, Resolver};
use crate::persona::PersonaClient;
use crate::transport::Transport;
use dashmap::DashMap;
use serde_json::Value;
use std::sync::Arc;
use uuid::Uuid;

/// Mutable state threaded through a single workflow execution.
pub struct WorkflowContext {
    pub workflow_id: String,
    pub project_id: String,
    pub repo_root: std::path::PathBuf,
    pub branch: String,
    variables: DashMap<String, Value>,
    step_outputs: DashMap<String, Value>,
    pub transport: Arc<dyn Transport>,
    pub persona_client: Arc<PersonaClient>,
}

impl WorkflowContext {
    pub fn new(
        project_id: impl Into<String>,
        repo_root: impl Into<std::path::PathBuf>,
        branch: impl Into<String>,
        transport: Arc<dyn Transport>,
        persona_client: Arc<PersonaClient>,
    ) -> Self {
        Self {
            workflow_id: Uuid::new_v4().to_string(),
            project_id: project_id.into(),
            repo_root: repo_root.into(),
            branch: branch.into(),
            variables: DashMap::new(),
            step_outputs: DashMap::new(),
            transport,
            persona_client,
        }
    }

    pub fn set_variable(&self, name: impl Into<String>, value: Value) {
        self.variables.insert(name.into(), value);
    }

    pub fn get_variable(&self, name: &str) -> Option<Value> {
        self.variables.get(name).map(|v| v.clone())
    }

    pub fn set_output(&self, step_name: &str, value: Value) {
        self.step_outputs.insert(step_name.to_string(), value);
    }

    pub fn get_output(&self, step_name: &str) -> Option<Value> {
        self.step_outputs.get(step_name).map(|v| v.clone())
    }

    pub fn has_output(&self, step_name: &str) -> bool {
        self.step_outputs.contains_key(step_name)
    }

    /// Resolves a bare identifier: reserved names, then variables, then a
    /// dotted step-output path (`stepName.key.key`).
    fn resolve_ident(&self, ident: &str) -> Option<String> {
        match ident {
            "repoRoot" => return Some(self.repo_root.display().to_string()),
            "branch" => return Some(self.branch.clone()),
            "workflowId" => return Some(self.workflow_id.clone()),
            "projectId" => return Some(self.project_id.clone()),
            _ => {}
        }

        if let Some(v) = self.get_variable(ident) {
            return Some(value_to_string(&v));
        }

        let mut parts = ident.split('.');
        let step_name = parts.next()?;
        let mut current = self.get_output(step_name)?;
        for key in parts {
            current = current.get(key)?.clone();
        }
        Some(value_to_string(&current))
    }

    /// Expands every `${expr}` placeholder in `input` using
    /// [`Self::resolve_ident`]. Unresolved placeholders are left literal.
    pub fn resolve(&self, input: &str) -> String {
        let mut out = String::with_capacity(input.len());
        let mut rest = input;
        while let Some(start) = rest.find("${") {
            let Some(end_rel) = rest[start..].find('}') else {
                out.push_str(rest);
                return out;
            };
            out.push_str(&rest[..start]);
            let expr = &rest[start + 2..start + end_rel];
            match self.resolve_ident(expr.trim()) {
                Some(value) => out.push_str(&value),
                None => {
                    tracing::warn!(expr, "unresolved placeholder");
                    out.push_str(&rest[start..start + end_rel + 1]);
                }
            }
            rest = &rest[start + end_rel + 1..];
        }
        out.push_str(rest);
        out
    }

    /// Evaluates a guard-condition string against this context's variables
    /// and step outputs.
    pub fn evaluate_condition(&self, condition: &str) -> bool {
        let map: std::collections::HashMap<String, String> = self
            .variables
            .iter()
            .map(|e| (e.key().clone(), value_to_string(e.value())))
            .collect();
        let resolver = ContextResolver { ctx: self, vars: MapResolver(&map) };
        crate::expr::evaluate(condition, &resolver)
    }
}

struct ContextResolver<'a> {
    ctx: &'a WorkflowContext,
    vars: MapResolver<'a>,
}

impl<'a> Resolver for ContextResolver<'a> {
    fn resolve(&self, ident: &str) -> Option<String> {
        self.vars.resolve(ident).or_else(|| self.ctx.resolve_ident(ident))
    }
}

fn value_to_string(v: &Value) -> String {
    match v {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
