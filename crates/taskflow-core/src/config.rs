// Copyright (c) 2026 Task Orchestrator Team
// SPDX-License-Identifier: Apache-2.0

//! Orchestrator configuration schema.
//!
//! Loading (file + `TASKFLOW_*` environment layering) happens in the CLI
//! binary via the `config` crate; this module only defines the schema and
//! its defaults so library code has a single source of truth for them.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default = "default_request_stream")]
    pub request_stream: String,
    #[serde(default = "default_group_prefix")]
    pub group_prefix: String,
    pub dashboard_base_url: String,
    pub dashboard_api_key: String,
    #[serde(default = "default_max_iterations")]
    pub coordinator_max_iterations: u32,
    #[serde(default = "default_max_revision_attempts")]
    pub coordinator_max_revision_attempts: u32,
    #[serde(default = "default_retries")]
    pub persona_timeout_max_retries: u32,
    #[serde(default)]
    pub persona_timeouts: HashMap<String, u64>,
    #[serde(default = "default_workflows_dir")]
    pub workflows_dir: String,
}

fn default_request_stream() -> String {
    "persona.requests".to_string()
}

fn default_group_prefix() -> String {
    "taskflow".to_string()
}

fn default_max_iterations() -> u32 {
    500
}

fn default_max_revision_attempts() -> u32 {
    5
}

fn default_retries() -> u32 {
    3
}

fn default_workflows_dir() -> String {
    "workflows/definitions".to_string()
}

impl Config {
    pub fn persona_timeout_seconds(&self, persona: &str) -> u64 {
        self.persona_timeouts.get(persona).copied().unwrap_or(120)
    }
}
