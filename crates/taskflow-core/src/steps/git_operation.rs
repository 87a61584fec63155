// Copyright (c) 2026 Task Orchestrator Team
// SPDX-License-Identifier: Apache-2.0

//! Thin dispatch over named git working-tree operations.

use super::config_str;
use crate::adapters::GitClient;
use crate::context::WorkflowContext;
use crate::error::{OrchestratorError, Result};
use crate::step::{Step, StepOutcome};
use crate::workflow::StepDefinition;
use async_trait::async_trait;
use std::sync::Arc;

pub struct GitOperationStep {
    git: Arc<dyn GitClient>,
}

impl GitOperationStep {
    pub fn new(git: Arc<dyn GitClient>) -> Self {
        Self { git }
    }
}

#[async_trait]
impl Step for GitOperationStep {
    async fn execute(&self, def: &StepDefinition, context: &WorkflowContext) -> Result<StepOutcome> {
        let operation = config_str(&def.config, "operation")?;

        match operation.as_str() {
            "checkoutBranchFromBase" => {
                if self.git.is_dirty(&context.repo_root).await? {
                    return Err(OrchestratorError::DirtyWorkingTree(
                        "refusing to check out a new branch over uncommitted changes".to_string(),
                    ));
                }
                let base = super::config_str_opt(&def.config, "base").unwrap_or_else(|| "main".to_string());
                self.git.checkout_branch_from_base(&context.repo_root, &context.branch, &base).await?;
                Ok(StepOutcome::success(serde_json::json!({ "branch": context.branch })))
            }
            "commitAndPushPaths" => {
                let message = context.resolve(&super::config_str(&def.config, "message")?);
                let paths: Vec<String> = def
                    .config
                    .get("paths")
                    .and_then(|v| v.as_array())
                    .map(|a| a.iter().filter_map(|v| v.as_str().map(str::to_string)).collect())
                    .unwrap_or_default();

                let outcome = self
                    .git
                    .commit_and_push_paths(&context.repo_root, &paths, &message, &context.branch)
                    .await?;

                if outcome.committed && !outcome.pushed {
                    return Err(OrchestratorError::PushFailed(
                        outcome.reason.clone().unwrap_or_else(|| "push did not complete".to_string()),
                    ));
                }

                Ok(StepOutcome::success_with_outputs(serde_json::json!({
                    "committed": outcome.committed,
                    "pushed": outcome.pushed,
                    "commit_sha": outcome.commit_sha,
                })))
            }
            "verifyRemoteBranchHasDiff" => {
                let base = super::config_str_opt(&def.config, "base").unwrap_or_else(|| "main".to_string());
                let has_diff = self.git.remote_branch_has_diff(&context.repo_root, &context.branch, &base).await?;
                Ok(StepOutcome::success_with_outputs(serde_json::json!({ "has_diff": has_diff })))
            }
            "ensureBranchPublished" => {
                self.git.ensure_branch_published(&context.repo_root, &context.branch).await?;
                Ok(StepOutcome::success(serde_json::json!({ "published": true })))
            }
            "checkContextFreshness" => {
                let head = self.git.rev_parse(&context.repo_root, "HEAD").await?;
                let last_scanned = context.get_variable("last_scanned_commit").and_then(|v| v.as_str().map(str::to_string));
                let stale = last_scanned.as_deref() != Some(head.as_str());
                Ok(StepOutcome::success_with_outputs(serde_json::json!({ "stale": stale, "head": head })))
            }
            other => Err(OrchestratorError::InvalidStepConfig {
                step_id: def.name.clone(),
                reason: format!("unknown git operation '{other}'"),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::CommitOutcome;
    use crate::persona::PersonaClient;
    use crate::transport::InMemoryTransport;
    use async_trait::async_trait;
    use std::path::Path;

    struct FakeGit {
        dirty: bool,
    }

    #[async_trait]
    impl GitClient for FakeGit {
        async fn current_branch(&self, _repo_root: &Path) -> Result<String> {
            Ok("main".to_string())
        }
        async fn is_dirty(&self, _repo_root: &Path) -> Result<bool> {
            Ok(self.dirty)
        }
        async fn checkout_branch_from_base(&self, _repo_root: &Path, _branch: &str, _base: &str) -> Result<()> {
            Ok(())
        }
        async fn commit_and_push_paths(
            &self,
            _repo_root: &Path,
            _paths: &[String],
            _message: &str,
            _branch: &str,
        ) -> Result<CommitOutcome> {
            Ok(CommitOutcome { committed: true, pushed: true, commit_sha: Some("sha".to_string()), changed_files: vec![], reason: None })
        }
        async fn remote_branch_has_diff(&self, _repo_root: &Path, _branch: &str, _base: &str) -> Result<bool> {
            Ok(true)
        }
        async fn ensure_branch_published(&self, _repo_root: &Path, _branch: &str) -> Result<()> {
            Ok(())
        }
        async fn rev_parse(&self, _repo_root: &Path, _rev: &str) -> Result<String> {
            Ok("sha".to_string())
        }
    }

    fn test_context() -> WorkflowContext {
        let transport: Arc<dyn crate::transport::Transport> = Arc::new(InMemoryTransport::new());
        let persona = Arc::new(PersonaClient::new(transport.clone(), "requests", "grp"));
        WorkflowContext::new("proj", "/tmp/repo", "feat/x", transport, persona)
    }

    #[tokio::test]
    async fn dirty_tree_aborts_checkout() {
        let ctx = test_context();
        let step = GitOperationStep::new(Arc::new(FakeGit { dirty: true }));
        let def = StepDefinition {
            name: "checkout".to_string(),
            step_type: "git_operation".to_string(),
            description: String::new(),
            depends_on: vec![],
            condition: None,
            config: serde_json::json!({ "operation": "checkoutBranchFromBase", "base": "main" }),
            outputs: vec![],
        };

        let result = step.execute(&def, &ctx).await;
        assert!(matches!(result, Err(OrchestratorError::DirtyWorkingTree(_))));
    }

    #[tokio::test]
    async fn clean_tree_checks_out_branch() {
        let ctx = test_context();
        let step = GitOperationStep::new(Arc::new(FakeGit { dirty: false }));
        let def = StepDefinition {
            name: "checkout".to_string(),
            step_type: "git_operation".to_string(),
            description: String::new(),
            depends_on: vec![],
            condition: None,
            config: serde_json::json!({ "operation": "checkoutBranchFromBase", "base": "main" }),
            outputs: vec![],
        };

        let outcome = step.execute(&def, &ctx).await.unwrap();
        assert_eq!(outcome.data.unwrap()["branch"], "feat/x");
    }

    #[tokio::test]
    async fn unknown_operation_is_invalid_config() {
        let ctx = test_context();
        let step = GitOperationStep::new(Arc::new(FakeGit { dirty: false }));
        let def = StepDefinition {
            name: "x".to_string(),
            step_type: "git_operation".to_string(),
            description: String::new(),
            depends_on: vec![],
            condition: None,
            config: serde_json::json!({ "operation": "doSomethingWeird" }),
            outputs: vec![],
        };

        assert!(matches!(
            step.execute(&def, &ctx).await,
            Err(OrchestratorError::InvalidStepConfig { .. })
        ));
    }
}
