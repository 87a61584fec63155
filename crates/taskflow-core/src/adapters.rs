// Copyright (c) 2026 Task Orchestrator Team
// SPDX-License-Identifier: Apache-2.0

//! Narrow trait boundaries mediating every external call a step makes.
//!
//! Steps depend only on these traits, never on the concrete HTTP/subprocess
//! implementations (provided by the `taskflow-dashboard` and `taskflow-git`
//! crates), so they can be exercised against in-memory fakes in tests.

use crate::error::Result;
use crate::task::{Milestone, Task};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Project metadata as reported by the dashboard.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Project {
    pub id: String,
    pub name: String,
    pub repo_remote: Option<String>,
}

/// Extended project details: milestones and repository list.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ProjectDetails {
    pub milestones: Vec<Milestone>,
    pub repositories: Vec<String>,
}

/// The dashboard's task- and project-facing surface.
#[async_trait]
pub trait DashboardClient: Send + Sync {
    async fn get_project(&self, project_id: &str) -> Result<Project>;
    async fn get_project_details(&self, project_id: &str) -> Result<ProjectDetails>;
    async fn list_tasks(&self, project_id: &str) -> Result<Vec<Task>>;
    async fn update_task_status(&self, task_id: &str, status: &str) -> Result<()>;
    async fn create_followup_task(&self, project_id: &str, name: &str, description: &str) -> Result<Task>;
}

/// Outcome of a commit-and-push operation.
#[derive(Debug, Clone)]
pub struct CommitOutcome {
    pub committed: bool,
    pub pushed: bool,
    pub commit_sha: Option<String>,
    pub changed_files: Vec<String>,
    pub reason: Option<String>,
}

/// The git working-tree surface consumed by steps.
#[async_trait]
pub trait GitClient: Send + Sync {
    async fn current_branch(&self, repo_root: &Path) -> Result<String>;
    async fn is_dirty(&self, repo_root: &Path) -> Result<bool>;
    async fn checkout_branch_from_base(&self, repo_root: &Path, branch: &str, base: &str) -> Result<()>;
    async fn commit_and_push_paths(
        &self,
        repo_root: &Path,
        paths: &[String],
        message: &str,
        branch: &str,
    ) -> Result<CommitOutcome>;
    async fn remote_branch_has_diff(&self, repo_root: &Path, branch: &str, base: &str) -> Result<bool>;
    async fn ensure_branch_published(&self, repo_root: &Path, branch: &str) -> Result<()>;
    async fn rev_parse(&self, repo_root: &Path, rev: &str) -> Result<String>;
}

/// A single scanned file record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScannedFile {
    pub path: String,
    pub sha256: String,
    pub size_bytes: u64,
}

/// The result of scanning a repository's working tree.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ContextSnapshot {
    pub files: Vec<ScannedFile>,
    pub head_commit: Option<String>,
}

/// Repository scanning surface, producing `.ma/context/` artifacts.
#[async_trait]
pub trait ScanClient: Send + Sync {
    async fn scan(&self, repo_root: &Path) -> Result<ContextSnapshot>;
}
