// Copyright (c) 2026 Task Orchestrator Team
// SPDX-License-Identifier: Apache-2.0

//! Subprocess-backed [`GitClient`] and walkdir/sha2-backed [`ScanClient`].

use async_trait::async_trait;
use sha2::{Digest, Sha256};
use std::path::Path;
use std::sync::Arc;
use taskflow_core::adapters::{CommitOutcome, ContextSnapshot, GitClient, ScanClient, ScannedFile};
use taskflow_core::error::{OrchestratorError, Result};
use tokio::process::Command;
use tokio::sync::Mutex;

/// Git client that shells out to the system `git` binary.
///
/// Git serialises mutating operations against a repository's lock file, so
/// every call through this client is serialised behind an internal mutex to
/// avoid lock contention between concurrently running steps.
pub struct SubprocessGitClient {
    lock: Arc<Mutex<()>>,
}

impl Default for SubprocessGitClient {
    fn default() -> Self {
        Self::new()
    }
}

impl SubprocessGitClient {
    pub fn new() -> Self {
        Self { lock: Arc::new(Mutex::new(())) }
    }

    async fn run(&self, repo_root: &Path, args: &[&str]) -> Result<String> {
        let _guard = self.lock.lock().await;
        let output = Command::new("git")
            .args(args)
            .current_dir(repo_root)
            .output()
            .await
            .map_err(|e| OrchestratorError::Git(format!("failed to run git {}: {e}", args.join(" "))))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            return Err(OrchestratorError::Git(format!(
                "git {} failed (exit {}): {stderr}",
                args.join(" "),
                output.status.code().unwrap_or(-1)
            )));
        }

        Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
    }
}

#[async_trait]
impl GitClient for SubprocessGitClient {
    async fn current_branch(&self, repo_root: &Path) -> Result<String> {
        self.run(repo_root, &["rev-parse", "--abbrev-ref", "HEAD"]).await
    }

    async fn is_dirty(&self, repo_root: &Path) -> Result<bool> {
        let status = self.run(repo_root, &["status", "--porcelain"]).await?;
        Ok(!status.is_empty())
    }

    async fn checkout_branch_from_base(&self, repo_root: &Path, branch: &str, base: &str) -> Result<()> {
        let exists = self.run(repo_root, &["rev-parse", "--verify", branch]).await.is_ok();
        if exists {
            self.run(repo_root, &["checkout", branch]).await?;
        } else {
            self.run(repo_root, &["checkout", "-b", branch, base]).await?;
        }
        Ok(())
    }

    async fn commit_and_push_paths(
        &self,
        repo_root: &Path,
        paths: &[String],
        message: &str,
        branch: &str,
    ) -> Result<CommitOutcome> {
        if paths.is_empty() {
            return Ok(CommitOutcome {
                committed: false,
                pushed: false,
                commit_sha: None,
                changed_files: vec![],
                reason: Some("no changed paths supplied".to_string()),
            });
        }

        let mut add_args = vec!["add".to_string()];
        add_args.extend(paths.iter().cloned());
        let add_args_ref: Vec<&str> = add_args.iter().map(String::as_str).collect();
        self.run(repo_root, &add_args_ref).await?;

        let status = self.run(repo_root, &["status", "--porcelain"]).await?;
        if status.is_empty() {
            return Ok(CommitOutcome {
                committed: false,
                pushed: false,
                commit_sha: None,
                changed_files: vec![],
                reason: Some("working tree unchanged after staging".to_string()),
            });
        }

        self.run(repo_root, &["commit", "-m", message]).await?;
        let sha = self.run(repo_root, &["rev-parse", "HEAD"]).await?;

        match self.run(repo_root, &["push", "origin", branch]).await {
            Ok(_) => Ok(CommitOutcome {
                committed: true,
                pushed: true,
                commit_sha: Some(sha),
                changed_files: paths.to_vec(),
                reason: None,
            }),
            Err(err) => Ok(CommitOutcome {
                committed: true,
                pushed: false,
                commit_sha: Some(sha),
                changed_files: paths.to_vec(),
                reason: Some(err.to_string()),
            }),
        }
    }

    async fn remote_branch_has_diff(&self, repo_root: &Path, branch: &str, base: &str) -> Result<bool> {
        let range = format!("{base}..origin/{branch}");
        let output = self.run(repo_root, &["diff", "--name-only", &range]).await?;
        Ok(!output.is_empty())
    }

    async fn ensure_branch_published(&self, repo_root: &Path, branch: &str) -> Result<()> {
        let remote_exists = self.run(repo_root, &["rev-parse", "--verify", &format!("origin/{branch}")]).await.is_ok();
        if !remote_exists {
            self.run(repo_root, &["push", "-u", "origin", branch]).await?;
        }
        Ok(())
    }

    async fn rev_parse(&self, repo_root: &Path, rev: &str) -> Result<String> {
        self.run(repo_root, &["rev-parse", rev]).await
    }
}

/// Scans a repository's working tree into a content-addressed snapshot.
///
/// Hidden directories (`.git`, `.ma`) are skipped; every other file is
/// hashed with SHA-256 so the coordinator can detect drift between runs.
pub struct WalkdirScanClient {
    max_file_bytes: u64,
}

impl Default for WalkdirScanClient {
    fn default() -> Self {
        Self::new()
    }
}

impl WalkdirScanClient {
    pub fn new() -> Self {
        Self { max_file_bytes: 10 * 1024 * 1024 }
    }

    pub fn with_max_file_bytes(max_file_bytes: u64) -> Self {
        Self { max_file_bytes }
    }
}

const SKIPPED_DIRS: &[&str] = &[".git", ".ma", "target", "node_modules"];

#[async_trait]
impl ScanClient for WalkdirScanClient {
    async fn scan(&self, repo_root: &Path) -> Result<ContextSnapshot> {
        let repo_root = repo_root.to_path_buf();
        let max_file_bytes = self.max_file_bytes;

        tokio::task::spawn_blocking(move || scan_blocking(&repo_root, max_file_bytes))
            .await
            .map_err(|e| OrchestratorError::other(format!("scan task panicked: {e}")))?
    }
}

fn scan_blocking(repo_root: &Path, max_file_bytes: u64) -> Result<ContextSnapshot> {
    let mut files = Vec::new();

    let walker = walkdir::WalkDir::new(repo_root).into_iter().filter_entry(|entry| {
        entry
            .file_name()
            .to_str()
            .map(|name| !SKIPPED_DIRS.contains(&name))
            .unwrap_or(true)
    });

    for entry in walker {
        let entry = entry.map_err(|e| OrchestratorError::other(format!("walk error: {e}")))?;
        if !entry.file_type().is_file() {
            continue;
        }

        let metadata = entry.metadata().map_err(|e| OrchestratorError::other(e.to_string()))?;
        if metadata.len() > max_file_bytes {
            tracing::warn!(path = %entry.path().display(), size = metadata.len(), "skipping oversized file in scan");
            continue;
        }

        let bytes = std::fs::read(entry.path()).map_err(|e| OrchestratorError::other(e.to_string()))?;
        let mut hasher = Sha256::new();
        hasher.update(&bytes);
        let sha256 = format!("{:x}", hasher.finalize());

        let relative = entry.path().strip_prefix(repo_root).unwrap_or(entry.path());
        files.push(ScannedFile {
            path: relative.to_string_lossy().replace('\\', "/"),
            sha256,
            size_bytes: metadata.len(),
        });
    }

    files.sort_by(|a, b| a.path.cmp(&b.path));

    let head_commit = std::process::Command::new("git")
        .args(["rev-parse", "HEAD"])
        .current_dir(repo_root)
        .output()
        .ok()
        .filter(|o| o.status.success())
        .map(|o| String::from_utf8_lossy(&o.stdout).trim().to_string());

    Ok(ContextSnapshot { files, head_commit })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::process::Command as StdCommand;

    fn init_repo(dir: &Path) {
        let run = |args: &[&str]| {
            let output = StdCommand::new("git").args(args).current_dir(dir).output().unwrap();
            assert!(output.status.success(), "git {} failed: {}", args.join(" "), String::from_utf8_lossy(&output.stderr));
        };
        run(&["init", "-q"]);
        run(&["config", "user.email", "test@taskflow.dev"]);
        run(&["config", "user.name", "Taskflow Test"]);
    }

    #[tokio::test]
    async fn current_branch_after_init() {
        let tmp = tempfile::tempdir().unwrap();
        init_repo(tmp.path());
        std::fs::write(tmp.path().join("README.md"), "# demo\n").unwrap();
        StdCommand::new("git").args(["add", "."]).current_dir(tmp.path()).output().unwrap();
        StdCommand::new("git").args(["commit", "-m", "init"]).current_dir(tmp.path()).output().unwrap();

        let git = SubprocessGitClient::new();
        let branch = git.current_branch(tmp.path()).await.unwrap();
        assert!(branch == "main" || branch == "master");
    }

    #[tokio::test]
    async fn commit_and_push_reports_noop_when_clean() {
        let tmp = tempfile::tempdir().unwrap();
        init_repo(tmp.path());
        std::fs::write(tmp.path().join("README.md"), "# demo\n").unwrap();
        StdCommand::new("git").args(["add", "."]).current_dir(tmp.path()).output().unwrap();
        StdCommand::new("git").args(["commit", "-m", "init"]).current_dir(tmp.path()).output().unwrap();

        let git = SubprocessGitClient::new();
        let outcome = git
            .commit_and_push_paths(tmp.path(), &["README.md".to_string()], "no changes", "main")
            .await
            .unwrap();
        assert!(!outcome.committed);
    }

    #[tokio::test]
    async fn scan_hashes_files_deterministically() {
        let tmp = tempfile::tempdir().unwrap();
        std::fs::write(tmp.path().join("a.txt"), b"hello").unwrap();
        std::fs::create_dir_all(tmp.path().join(".git")).unwrap();
        std::fs::write(tmp.path().join(".git").join("ignored"), b"should not appear").unwrap();

        let scanner = WalkdirScanClient::new();
        let snapshot = scanner.scan(tmp.path()).await.unwrap();
        assert_eq!(snapshot.files.len(), 1);
        assert_eq!(snapshot.files[0].path, "a.txt");
    }
}
