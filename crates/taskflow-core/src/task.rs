// Copyright (c) 2026 Task Orchestrator Team
// SPDX-License-Identifier: Apache-2.0

//! Task and milestone records owned by the external dashboard.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Status of a task as reported by the dashboard.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Open,
    InProgress,
    InReview,
    Blocked,
    Done,
    Unknown,
}

impl TaskStatus {
    /// Normalizes arbitrary dashboard status strings into a known variant.
    ///
    /// Idempotent: `normalize(normalize(s).as_str()) == normalize(s)`.
    pub fn normalize(raw: &str) -> Self {
        match raw.trim().to_lowercase().as_str() {
            "open" | "todo" | "to_do" | "backlog" => TaskStatus::Open,
            "in_progress" | "in-progress" | "doing" | "active" => TaskStatus::InProgress,
            "in_review" | "in-review" | "review" => TaskStatus::InReview,
            "blocked" => TaskStatus::Blocked,
            "done" | "closed" | "complete" | "completed" => TaskStatus::Done,
            _ => TaskStatus::Unknown,
        }
    }

    /// Priority bucket used for coordinator tie-breaking (lower sorts first).
    pub fn priority_bucket(&self) -> u8 {
        match self {
            TaskStatus::Blocked => 0,
            TaskStatus::InReview => 1,
            TaskStatus::InProgress => 2,
            TaskStatus::Open => 3,
            TaskStatus::Unknown => 4,
            TaskStatus::Done => 5,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TaskStatus::Open => "open",
            TaskStatus::InProgress => "in_progress",
            TaskStatus::InReview => "in_review",
            TaskStatus::Blocked => "blocked",
            TaskStatus::Done => "done",
            TaskStatus::Unknown => "unknown",
        }
    }
}

/// A task fetched from the dashboard.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub status: TaskStatus,
    #[serde(default)]
    pub milestone_id: Option<String>,
    #[serde(default)]
    pub priority_score: i64,
    #[serde(default)]
    pub order: i64,
    #[serde(default)]
    pub slug: Option<String>,
    #[serde(default)]
    pub branch: Option<String>,
    #[serde(default)]
    pub labels: Vec<String>,
    #[serde(default)]
    pub blocked_dependencies: Vec<String>,
    #[serde(default)]
    pub blocked_attempts: u32,
    #[serde(default)]
    pub repo_remote: Option<String>,
    #[serde(flatten)]
    pub extra: HashMap<String, serde_json::Value>,
}

/// A milestone grouping related tasks.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Milestone {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub slug: Option<String>,
    #[serde(default)]
    pub branch: Option<String>,
}

/// Coarse classification of a task used to pick a trigger workflow.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskType {
    Hotfix,
    Feature,
    Analysis,
    Bugfix,
    Task,
}

impl TaskType {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskType::Hotfix => "hotfix",
            TaskType::Feature => "feature",
            TaskType::Analysis => "analysis",
            TaskType::Bugfix => "bugfix",
            TaskType::Task => "task",
        }
    }

    /// Classifies a task by keyword match on its name, description, and labels.
    pub fn classify(task: &Task) -> Self {
        let haystack = format!(
            "{} {} {}",
            task.name.to_lowercase(),
            task.description.to_lowercase(),
            task.labels.join(" ").to_lowercase()
        );

        if haystack.contains("hotfix") || haystack.contains("urgent") || haystack.contains("critical") {
            TaskType::Hotfix
        } else if haystack.contains("bug") || haystack.contains("fix") || haystack.contains("defect") {
            TaskType::Bugfix
        } else if haystack.contains("analy") || haystack.contains("investigat") || haystack.contains("research") {
            TaskType::Analysis
        } else if haystack.contains("feature") || haystack.contains("implement") || haystack.contains("add ") {
            TaskType::Feature
        } else {
            TaskType::Task
        }
    }
}

/// Coarse size classification used alongside [`TaskType`] for workflow selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskScope {
    Small,
    Medium,
    Large,
}

impl TaskScope {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskScope::Small => "small",
            TaskScope::Medium => "medium",
            TaskScope::Large => "large",
        }
    }

    /// Classifies scope from description length as a cheap proxy for effort.
    pub fn classify(task: &Task) -> Self {
        let len = task.description.len();
        if len > 1200 {
            TaskScope::Large
        } else if len > 300 {
            TaskScope::Medium
        } else {
            TaskScope::Small
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_is_idempotent() {
        for raw in ["open", "IN_PROGRESS", "review", "blocked", "Done", "???"] {
            let once = TaskStatus::normalize(raw);
            let twice = TaskStatus::normalize(once.as_str());
            assert_eq!(once, twice);
        }
    }

    #[test]
    fn priority_bucket_orders_blocked_first() {
        assert!(TaskStatus::Blocked.priority_bucket() < TaskStatus::Open.priority_bucket());
        assert!(TaskStatus::InReview.priority_bucket() < TaskStatus::InProgress.priority_bucket());
    }

    fn sample_task(name: &str, description: &str) -> Task {
        Task {
            id: "t1".into(),
            name: name.into(),
            description: description.into(),
            status: TaskStatus::Open,
            milestone_id: None,
            priority_score: 0,
            order: 0,
            slug: None,
            branch: None,
            labels: vec![],
            blocked_dependencies: vec![],
            blocked_attempts: 0,
            repo_remote: None,
            extra: HashMap::new(),
        }
    }

    #[test]
    fn classifies_hotfix_before_bugfix() {
        let t = sample_task("Critical outage", "production is down");
        assert_eq!(TaskType::classify(&t), TaskType::Hotfix);
    }

    #[test]
    fn classifies_bugfix() {
        let t = sample_task("Fix login bug", "users cannot log in");
        assert_eq!(TaskType::classify(&t), TaskType::Bugfix);
    }
}
