// Copyright (c) 2026 Task Orchestrator Team
// SPDX-License-Identifier: Apache-2.0

//! Core orchestration engine: workflow definitions, the DAG executor,
//! the persona request/reply protocol, and the built-in step library.
//!
//! This crate has no knowledge of HTTP, the dashboard's wire format, or
//! subprocess git invocations; those live behind the [`adapters`] traits
//! and are implemented by the `taskflow-dashboard` and `taskflow-git`
//! crates.

pub mod adapters;
pub mod config;
pub mod context;
pub mod coordinator;
pub mod dag;
pub mod diff;
pub mod engine;
pub mod error;
pub mod expr;
pub mod persona;
pub mod step;
pub mod steps;
pub mod task;
pub mod transport;
pub mod workflow;

pub use adapters::{DashboardClient, GitClient, ScanClient};
pub use config::Config;
pub use context::WorkflowContext;
pub use coordinator::Coordinator;
pub use engine::WorkflowEngine;
pub use error::{OrchestratorError, Result};
pub use persona::PersonaClient;
pub use step::{Step, StepRegistry};
pub use task::{Task, TaskStatus};
pub use transport::{InMemoryTransport, Transport};
pub use workflow::WorkflowDefinition;
