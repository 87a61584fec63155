// Copyright (c) 2026 Task Orchestrator Team
// SPDX-License-Identifier: Apache-2.0

//! Taskflow orchestrator CLI.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use colored::Colorize;
use std::path::PathBuf;
use std::sync::Arc;
use taskflow_core::adapters::{DashboardClient, GitClient, ScanClient};
use taskflow_core::config::Config;
use taskflow_core::coordinator::Coordinator;
use taskflow_core::engine::WorkflowEngine;
use taskflow_core::persona::PersonaClient;
use taskflow_core::step::StepRegistry;
use taskflow_core::steps::register_builtin_steps;
use taskflow_core::transport::{InMemoryTransport, Transport};
use taskflow_core::workflow::{load_workflows_from_dir, WorkflowDefinition};
use taskflow_dashboard::HttpDashboardClient;
use taskflow_git::{SubprocessGitClient, WalkdirScanClient};
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "taskflow")]
#[command(version, about = "Multi-agent task orchestrator", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Path to the configuration file (YAML or JSON)
    #[arg(short, long, global = true, default_value = "taskflow.yaml")]
    config: String,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Validate every workflow definition in a directory
    Validate {
        /// Directory containing workflow YAML files
        #[arg(value_name = "DIR")]
        dir: Option<String>,
    },

    /// Run a single workflow definition against a task id
    Run {
        /// Path to a workflow YAML file
        #[arg(value_name = "FILE")]
        file: String,

        /// Project id owning the task
        #[arg(long)]
        project_id: String,

        /// Task id to load as the workflow's `task` variable
        #[arg(long)]
        task_id: String,
    },

    /// Run the coordinator loop for a project until no pending tasks remain
    Coordinate {
        /// Project id to coordinate
        #[arg(long)]
        project_id: String,
    },
}

fn init_tracing(verbose: bool) {
    let log_level = if verbose { tracing::Level::DEBUG } else { tracing::Level::INFO };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| format!("taskflow={log_level}").into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}

fn load_config(path: &str) -> Result<Config> {
    let builder = config::Config::builder()
        .add_source(config::File::with_name(path).required(false))
        .add_source(config::Environment::with_prefix("TASKFLOW").separator("__"));

    let settings = builder.build().with_context(|| format!("failed to load configuration from {path}"))?;
    settings.try_deserialize().with_context(|| "configuration did not match the expected schema")
}

fn build_adapters(cfg: &Config) -> (Arc<dyn DashboardClient>, Arc<dyn GitClient>, Arc<dyn ScanClient>) {
    let dashboard: Arc<dyn DashboardClient> =
        Arc::new(HttpDashboardClient::new(cfg.dashboard_base_url.clone(), cfg.dashboard_api_key.clone()));
    let git: Arc<dyn GitClient> = Arc::new(SubprocessGitClient::new());
    let scan: Arc<dyn ScanClient> = Arc::new(WalkdirScanClient::new());
    (dashboard, git, scan)
}

fn build_engine(dashboard: Arc<dyn DashboardClient>, git: Arc<dyn GitClient>, scan: Arc<dyn ScanClient>) -> WorkflowEngine {
    let mut registry = StepRegistry::new();
    register_builtin_steps(&mut registry, dashboard, git, scan);
    WorkflowEngine::new(registry)
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let result = match cli.command {
        Commands::Validate { dir } => validate_workflows(dir.as_deref().unwrap_or("workflows/definitions")),
        Commands::Run { file, project_id, task_id } => run_single_workflow(&cli.config, &file, &project_id, &task_id).await,
        Commands::Coordinate { project_id } => coordinate(&cli.config, &project_id).await,
    };

    if let Err(e) = result {
        error!("{e:#}");
        eprintln!("{} {e:#}", "Error:".red().bold());
        std::process::exit(1);
    }
}

fn validate_workflows(dir: &str) -> Result<()> {
    println!("{} {}", "Validating workflows in:".cyan().bold(), dir);
    let workflows = load_workflows_from_dir(&PathBuf::from(dir)).with_context(|| format!("failed to load workflows from {dir}"))?;

    for workflow in &workflows {
        println!("  {} {} (v{}, {} step(s))", "✓".green().bold(), workflow.name, workflow.version, workflow.steps.len());
    }
    println!("{} {} workflow(s) valid", "✓".green().bold(), workflows.len());
    Ok(())
}

async fn run_single_workflow(config_path: &str, file: &str, project_id: &str, task_id: &str) -> Result<()> {
    let cfg = load_config(config_path)?;
    let (dashboard, git, scan) = build_adapters(&cfg);

    let content = std::fs::read_to_string(file).with_context(|| format!("failed to read workflow file: {file}"))?;
    let workflow: WorkflowDefinition = serde_yaml::from_str(&content).with_context(|| format!("failed to parse workflow YAML: {file}"))?;
    workflow.validate().with_context(|| "workflow failed validation")?;
    info!(workflow = %workflow.name, "parsed workflow definition");

    let task = dashboard
        .list_tasks(project_id)
        .await?
        .into_iter()
        .find(|t| t.id == task_id)
        .ok_or_else(|| anyhow::anyhow!("task '{task_id}' not found in project '{project_id}'"))?;

    let repo_remote = task.repo_remote.clone().ok_or_else(|| anyhow::anyhow!("task '{task_id}' has no repository remote"))?;
    let branch = task.branch.clone().unwrap_or_else(|| format!("feat/{task_id}"));

    let transport: Arc<dyn Transport> = Arc::new(InMemoryTransport::new());
    let persona_client = Arc::new(PersonaClient::new(transport.clone(), cfg.request_stream.clone(), cfg.group_prefix.clone()));
    let engine = build_engine(dashboard, git, scan);

    let context = taskflow_core::context::WorkflowContext::new(project_id, ".", branch.clone(), transport, persona_client);
    context.set_variable("task", serde_json::to_value(&task)?);
    context.set_variable("repo_remote", serde_json::Value::String(repo_remote));

    println!("{}", "Executing workflow...".cyan());
    let result = engine.execute_workflow_definition(&workflow, &context).await?;

    if result.success {
        println!("{}", "✓ Workflow completed successfully".green().bold());
    } else {
        println!("{} {:?}: {:?}", "✗ Workflow failed at step".red().bold(), result.failed_step, result.error);
    }
    Ok(())
}

async fn coordinate(config_path: &str, project_id: &str) -> Result<()> {
    let cfg = load_config(config_path)?;
    let (dashboard, git, scan) = build_adapters(&cfg);

    let workflows = load_workflows_from_dir(&PathBuf::from(&cfg.workflows_dir))
        .with_context(|| format!("failed to load workflows from {}", cfg.workflows_dir))?;
    info!(count = workflows.len(), "loaded workflow definitions");

    let transport: Arc<dyn Transport> = Arc::new(InMemoryTransport::new());
    let persona_client = Arc::new(PersonaClient::new(transport.clone(), cfg.request_stream.clone(), cfg.group_prefix.clone()));
    let engine = build_engine(dashboard.clone(), git, scan);

    let coordinator = Coordinator::new(dashboard, engine, workflows, transport, persona_client, cfg.coordinator_max_iterations, ".");

    println!("{} {}", "Coordinating project:".cyan().bold(), project_id);
    let result = coordinator.run(project_id).await?;

    if result.success {
        println!("{} {} task(s) processed", "✓ Coordinator run completed".green().bold(), result.tasks_processed);
    } else {
        println!(
            "{} task {:?}: {:?}",
            "✗ Coordinator run aborted on".red().bold(),
            result.aborted_task,
            result.abort_reason
        );
        std::process::exit(1);
    }
    Ok(())
}
