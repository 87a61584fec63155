// Copyright (c) 2026 Task Orchestrator Team
// SPDX-License-Identifier: Apache-2.0

//! Error types shared across the orchestrator core.

use std::time::Duration;

/// Crate-wide result alias.
pub type Result<T> = std::result::Result<T, OrchestratorError>;

/// Errors raised by the workflow engine, coordinator, and persona protocol.
#[derive(Debug, thiserror::Error)]
pub enum OrchestratorError {
    /// A step definition referenced a type not present in the registry.
    #[error("unknown step type: {0}")]
    UnknownStepType(String),

    /// A workflow definition failed validation.
    #[error("invalid workflow '{name}': {reason}")]
    InvalidWorkflow { name: String, reason: String },

    /// The dependency graph contains a cycle.
    #[error("dependency cycle detected involving step '{0}'")]
    CyclicDependency(String),

    /// A step referenced by id was not found in the workflow.
    #[error("step not found: {0}")]
    StepNotFound(String),

    /// A step's configuration could not be interpreted.
    #[error("invalid configuration for step '{step_id}': {reason}")]
    InvalidStepConfig { step_id: String, reason: String },

    /// A step exceeded its configured timeout.
    #[error("step timed out after {duration:?}")]
    Timeout { duration: Duration },

    /// A persona round-trip exhausted its retry budget.
    #[error("persona '{persona}' timed out after {attempts} attempt(s)")]
    PersonaExhausted { persona: String, attempts: u32 },

    /// The transport layer failed.
    #[error("transport error: {0}")]
    Transport(String),

    /// A required repository remote URL was absent.
    #[error("task '{0}' has no repository remote configured")]
    MissingRepoRemote(String),

    /// The working tree was dirty when a clean tree was required.
    #[error("working tree is dirty: {0}")]
    DirtyWorkingTree(String),

    /// A git operation failed.
    #[error("git operation failed: {0}")]
    Git(String),

    /// A commit or push produced no observable change.
    #[error("no-op implementation: {0}")]
    NoOpImplementation(String),

    /// A generated commit was not published to the remote.
    #[error("push failed: {0}")]
    PushFailed(String),

    /// No workflow matched and no fallback was configured.
    #[error("no workflow matched task type '{task_type}' and no fallback workflow was found")]
    NoMatchingWorkflow { task_type: String },

    /// The dashboard adapter reported a failure.
    #[error("dashboard error: {0}")]
    Dashboard(String),

    /// A diff block could not be parsed.
    #[error("diff parse error: {0}")]
    DiffParse(String),

    /// Serialization or deserialization failed.
    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),

    /// YAML parsing failed.
    #[error("yaml error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// A step or workflow failed for a reason not covered above.
    #[error("{0}")]
    Other(String),
}

impl OrchestratorError {
    pub fn other(msg: impl Into<String>) -> Self {
        Self::Other(msg.into())
    }
}
