// Copyright (c) 2026 Task Orchestrator Team
// SPDX-License-Identifier: Apache-2.0

//! Persona request/reply protocol over the stream [`Transport`].

use crate::error::{OrchestratorError, Result};
use crate::transport::{Fields, Transport};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// A request dispatched to a persona worker.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PersonaRequest {
    pub workflow_id: String,
    pub to_persona: String,
    pub step: String,
    pub intent: String,
    pub payload: Value,
    pub repo: String,
    pub branch: String,
    pub project_id: String,
    pub deadline_seconds: u64,
    pub corr_id: String,
}

/// Terminal outcome of a persona invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReplyStatus {
    Done,
    Error,
    Timeout,
}

/// A reply observed on a persona's reply stream.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PersonaReply {
    pub corr_id: String,
    pub status: ReplyStatus,
    pub result: String,
}

/// Normalized evaluator verdict extracted from a reply's `result` payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Pass,
    Fail,
    Unknown,
}

impl Verdict {
    /// Parses a verdict out of an arbitrary JSON reply payload, accepting
    /// `{status: "pass"|"fail"}`, `{approved: bool}`, or `{result: "approved"|...}`.
    pub fn from_result(raw: &str) -> Self {
        let Ok(value) = serde_json::from_str::<Value>(raw) else {
            return Verdict::Unknown;
        };

        if let Some(status) = value.get("status").and_then(Value::as_str) {
            return match status.to_lowercase().as_str() {
                "pass" | "passed" | "approved" => Verdict::Pass,
                "fail" | "failed" | "rejected" => Verdict::Fail,
                _ => Verdict::Unknown,
            };
        }
        if let Some(approved) = value.get("approved").and_then(Value::as_bool) {
            return if approved { Verdict::Pass } else { Verdict::Fail };
        }
        if let Some(result) = value.get("result").and_then(Value::as_str) {
            return match result.to_lowercase().as_str() {
                "approved" | "pass" | "passed" => Verdict::Pass,
                "rejected" | "fail" | "failed" => Verdict::Fail,
                _ => Verdict::Unknown,
            };
        }
        Verdict::Unknown
    }
}

/// Client for issuing persona requests and awaiting their replies.
///
/// Only timeouts are retried; every retry mints a fresh correlation id and
/// abandons the previous one. Sleeps between attempts follow
/// `(attempt - 1) * 30s`.
pub struct PersonaClient {
    transport: Arc<dyn Transport>,
    request_stream: String,
    group_prefix: String,
    consumer_id: String,
}

impl PersonaClient {
    pub fn new(transport: Arc<dyn Transport>, request_stream: impl Into<String>, group_prefix: impl Into<String>) -> Self {
        Self {
            transport,
            request_stream: request_stream.into(),
            group_prefix: group_prefix.into(),
            consumer_id: format!("coordinator-{}", Uuid::new_v4()),
        }
    }

    fn reply_stream(&self, persona: &str) -> String {
        format!("{persona}.replies")
    }

    fn reply_group(&self, persona: &str) -> String {
        format!("{}.{persona}", self.group_prefix)
    }

    /// Publishes one persona request and returns its correlation id.
    pub async fn send_persona_request(
        &self,
        to_persona: &str,
        workflow_id: &str,
        step: &str,
        intent: &str,
        payload: Value,
        repo: &str,
        branch: &str,
        project_id: &str,
        deadline_seconds: u64,
    ) -> Result<String> {
        let corr_id = Uuid::new_v4().to_string();
        let request = PersonaRequest {
            workflow_id: workflow_id.to_string(),
            to_persona: to_persona.to_string(),
            step: step.to_string(),
            intent: intent.to_string(),
            payload,
            repo: repo.to_string(),
            branch: branch.to_string(),
            project_id: project_id.to_string(),
            deadline_seconds,
            corr_id: corr_id.clone(),
        };

        let mut fields: Fields = Fields::new();
        fields.insert("body".to_string(), serde_json::to_string(&request)?);
        fields.insert("corr_id".to_string(), corr_id.clone());
        fields.insert("to_persona".to_string(), to_persona.to_string());

        self.transport.append(&self.request_stream, fields).await?;
        debug!(persona = to_persona, corr_id = %corr_id, "dispatched persona request");
        Ok(corr_id)
    }

    /// Blocks until a reply matching `corr_id` is observed on `persona`'s
    /// reply stream, or `timeout` elapses.
    pub async fn wait_for_persona_completion(
        &self,
        persona: &str,
        corr_id: &str,
        timeout: Duration,
    ) -> Result<PersonaReply> {
        let stream = self.reply_stream(persona);
        let group = self.reply_group(persona);
        // Start from the beginning: this group is shared across every
        // correlation id issued to this persona, so replies for an
        // abandoned retry must still be drained (and discarded) in order
        // rather than skipped by a "new messages only" cursor.
        self.transport.create_group(&stream, &group, "0").await?;

        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            let remaining = deadline.saturating_duration_since(tokio::time::Instant::now());
            if remaining.is_zero() {
                return Err(OrchestratorError::PersonaExhausted {
                    persona: persona.to_string(),
                    attempts: 1,
                });
            }

            let block_ms = remaining.as_millis().min(1000) as u64;
            let entries = self
                .transport
                .read_group(&stream, &group, &self.consumer_id, 16, block_ms)
                .await?;

            for entry in entries {
                self.transport.ack(&stream, &group, &entry.id).await?;
                let Some(body) = entry.fields.get("body") else { continue };
                let Ok(reply) = serde_json::from_str::<PersonaReply>(body) else { continue };
                if reply.corr_id == corr_id {
                    return Ok(reply);
                }
            }
        }
    }

    /// Sends a request and awaits its reply, retrying on timeout only.
    ///
    /// Each retry issues a new correlation id; the previous one is
    /// abandoned. Sleeps `(attempt - 1) * 30s` before each attempt after the
    /// first.
    pub async fn request_with_retry(
        &self,
        to_persona: &str,
        workflow_id: &str,
        step: &str,
        intent: &str,
        payload: Value,
        repo: &str,
        branch: &str,
        project_id: &str,
        deadline_seconds: u64,
        max_retries: u32,
    ) -> Result<PersonaReply> {
        let mut last_err = None;
        for attempt in 1..=max_retries.max(1) {
            if attempt > 1 {
                let backoff = Duration::from_secs(((attempt - 1) as u64) * 30);
                warn!(persona = to_persona, attempt, backoff_secs = backoff.as_secs(), "retrying persona request after timeout");
                tokio::time::sleep(backoff).await;
            }

            let corr_id = self
                .send_persona_request(
                    to_persona,
                    workflow_id,
                    step,
                    intent,
                    payload.clone(),
                    repo,
                    branch,
                    project_id,
                    deadline_seconds,
                )
                .await?;

            match self
                .wait_for_persona_completion(to_persona, &corr_id, Duration::from_secs(deadline_seconds))
                .await
            {
                Ok(reply) => {
                    if reply.status == ReplyStatus::Timeout {
                        last_err = Some(OrchestratorError::PersonaExhausted {
                            persona: to_persona.to_string(),
                            attempts: attempt,
                        });
                        continue;
                    }
                    info!(persona = to_persona, attempt, "persona request completed");
                    return Ok(reply);
                }
                Err(OrchestratorError::PersonaExhausted { .. }) => {
                    last_err = Some(OrchestratorError::PersonaExhausted {
                        persona: to_persona.to_string(),
                        attempts: attempt,
                    });
                    continue;
                }
                Err(other) => return Err(other),
            }
        }

        Err(last_err.unwrap_or(OrchestratorError::PersonaExhausted {
            persona: to_persona.to_string(),
            attempts: max_retries,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::InMemoryTransport;

    #[test]
    fn verdict_from_status_field() {
        assert_eq!(Verdict::from_result(r#"{"status":"pass"}"#), Verdict::Pass);
        assert_eq!(Verdict::from_result(r#"{"status":"fail"}"#), Verdict::Fail);
        assert_eq!(Verdict::from_result(r#"{"status":"weird"}"#), Verdict::Unknown);
    }

    #[test]
    fn verdict_from_approved_bool() {
        assert_eq!(Verdict::from_result(r#"{"approved":true}"#), Verdict::Pass);
        assert_eq!(Verdict::from_result(r#"{"approved":false}"#), Verdict::Fail);
    }

    #[test]
    fn verdict_unknown_on_garbage() {
        assert_eq!(Verdict::from_result("not json"), Verdict::Unknown);
    }

    #[tokio::test]
    async fn send_and_await_round_trip() {
        let transport = Arc::new(InMemoryTransport::new());
        let client = PersonaClient::new(transport.clone(), "requests", "grp");

        let corr_id = client
            .send_persona_request(
                "planner",
                "wf-1",
                "plan",
                "plan_task",
                serde_json::json!({"task": "do thing"}),
                "git@example.com:org/repo.git",
                "main",
                "proj-1",
                30,
            )
            .await
            .unwrap();

        // Simulate the persona worker replying.
        let reply = PersonaReply {
            corr_id: corr_id.clone(),
            status: ReplyStatus::Done,
            result: r#"{"status":"pass"}"#.to_string(),
        };
        let mut fields = Fields::new();
        fields.insert("body".to_string(), serde_json::to_string(&reply).unwrap());
        transport.append("planner.replies", fields).await.unwrap();

        let got = client
            .wait_for_persona_completion("planner", &corr_id, Duration::from_secs(1))
            .await
            .unwrap();
        assert_eq!(got.corr_id, corr_id);
        assert_eq!(Verdict::from_result(&got.result), Verdict::Pass);
    }
}
