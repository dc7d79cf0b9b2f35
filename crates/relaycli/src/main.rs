// crates/relaycli/src/main.rs

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use relaycore::{EngineError, ExecutionEvent, ExecutionLog, NodeSpec, Workflow};
use relayruntime::{CyclePolicy, FlowRuntime, NodeRegistry, RuntimeConfig, WorkflowGraph};
use serde_json::{json, Value};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast::{self, error::RecvError};
use tracing::warn;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "relay")]
#[command(about = "Relay workflow engine CLI", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Execute a workflow file
    Run {
        /// Path to workflow JSON file
        #[arg(short, long)]
        file: PathBuf,

        /// Trigger payload as JSON
        #[arg(short, long)]
        input: Option<String>,

        /// Runtime configuration JSON file
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Show verbose output
        #[arg(short, long)]
        verbose: bool,
    },

    /// Validate a workflow file
    Validate {
        /// Path to workflow JSON file
        file: PathBuf,
    },

    /// List available node types
    Nodes,

    /// Create a new example workflow
    Init {
        /// Output file path
        #[arg(short, long, default_value = "workflow.json")]
        output: PathBuf,
    },
}

fn registry() -> NodeRegistry {
    let mut registry = NodeRegistry::new();
    relaynodes::register_all(&mut registry);
    registry
}

fn load_workflow(file: &Path) -> Result<Workflow> {
    let json = std::fs::read_to_string(file)
        .with_context(|| format!("reading {}", file.display()))?;
    serde_json::from_str(&json).with_context(|| format!("parsing {}", file.display()))
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Run {
            file,
            input,
            config,
            verbose,
        } => {
            // RUST_LOG wins over --verbose
            let default_level = if verbose { "debug" } else { "info" };
            tracing_subscriber::fmt()
                .with_env_filter(
                    EnvFilter::try_from_default_env()
                        .unwrap_or_else(|_| EnvFilter::new(default_level)),
                )
                .init();

            run_workflow(&file, input, config.as_deref()).await?;
        }

        Commands::Validate { file } => {
            validate_workflow(&file)?;
        }

        Commands::Nodes => {
            list_nodes();
        }

        Commands::Init { output } => {
            create_example_workflow(&output)?;
        }
    }

    Ok(())
}

async fn run_workflow(file: &Path, input: Option<String>, config: Option<&Path>) -> Result<()> {
    println!("🚀 Loading workflow from: {}", file.display());

    let workflow = load_workflow(file)?;

    println!("📋 Workflow: {}", workflow.name);
    println!("   Nodes: {}", workflow.nodes.len());
    println!("   Connections: {}", workflow.connections.len());
    println!();

    let input: Value = match input {
        Some(raw) => serde_json::from_str(&raw).context("--input is not valid JSON")?,
        None => json!({}),
    };

    let config = match config {
        Some(path) => {
            let raw = std::fs::read_to_string(path)
                .with_context(|| format!("reading {}", path.display()))?;
            RuntimeConfig::from_json(&raw)
                .with_context(|| format!("parsing {}", path.display()))?
        }
        None => RuntimeConfig::default(),
    };

    let runtime = FlowRuntime::with_registry(Arc::new(registry()), config);

    // Subscribe to events for real-time output
    let event_task = tokio::spawn(print_events(runtime.subscribe_events()));

    let outcome = runtime.execute(workflow, input).await;

    // Let the listener print the terminal update
    let _ = tokio::time::timeout(Duration::from_millis(500), event_task).await;

    println!();
    match outcome {
        Ok(report) => {
            println!("📊 Execution Summary:");
            println!("   Execution ID: {}", report.execution.id);
            println!("   Status: {}", report.execution.status);
            print_logs(&report.logs);

            if !report.results.is_empty() {
                println!();
                println!("📤 Outputs:");
                for (node_id, result) in &report.results {
                    println!("   {}: {}", node_id, result.output);
                }
            }
            Ok(())
        }
        Err(err) => {
            if let Some(execution) = err.execution() {
                println!("📊 Execution Summary:");
                println!("   Execution ID: {}", execution.id);
                println!("   Status: {}", execution.status);
                if let Ok(logs) = runtime.execution_logs(execution.id).await {
                    print_logs(&logs);
                }
            }
            bail!("💥 Workflow failed: {}", err.root())
        }
    }
}

/// Print live events until an execution reaches a terminal status
///
/// Returns how many events were printed.
async fn print_events(mut events: broadcast::Receiver<ExecutionEvent>) -> usize {
    let mut printed = 0;
    loop {
        let event = match events.recv().await {
            Ok(event) => event,
            Err(RecvError::Lagged(skipped)) => {
                warn!(skipped, "Event printer fell behind, some events were dropped");
                continue;
            }
            Err(RecvError::Closed) => break,
        };
        printed += 1;

        match event {
            ExecutionEvent::ExecutionUpdate { status, error, .. } => {
                match error {
                    Some(error) => println!("▶️  Execution {}: {}", status, error),
                    None => println!("▶️  Execution {}", status),
                }
                if status.is_terminal() {
                    break;
                }
            }
            ExecutionEvent::NodeLog {
                node_id,
                status,
                error,
                ..
            } => match error {
                Some(error) => println!("  ❌ {} {}: {}", node_id, status, error),
                None => println!("  ⚡ {} {}", node_id, status),
            },
        }
    }
    printed
}

fn print_logs(logs: &[ExecutionLog]) {
    println!("   Log:");
    for entry in logs {
        match &entry.error {
            Some(error) => println!("     {} {} ({})", entry.node_id, entry.status, error),
            None => println!("     {} {}", entry.node_id, entry.status),
        }
    }
}

fn validate_workflow(file: &Path) -> Result<()> {
    println!("🔍 Validating workflow: {}", file.display());

    let workflow = load_workflow(file)?;
    let name = workflow.name.clone();
    let (nodes, connections) = (workflow.nodes.len(), workflow.connections.len());

    let graph = WorkflowGraph::new(workflow, CyclePolicy::Reject)?;

    let registry = registry();
    let unknown: Vec<&NodeSpec> = graph
        .workflow()
        .nodes
        .iter()
        .filter(|node| !registry.contains(&node.node_type))
        .collect();
    for node in &unknown {
        println!("   ❌ {}", EngineError::UnknownNodeType(node.node_type.clone()));
    }

    let entries = graph.entry_nodes();
    if entries.is_empty() {
        println!("   ❌ {}", EngineError::NoStartNode);
    }

    if !unknown.is_empty() || entries.is_empty() {
        bail!("Workflow {} is not runnable", name);
    }

    println!("✅ Workflow is valid:");
    println!("   Name: {}", name);
    println!("   Nodes: {}", nodes);
    println!("   Connections: {}", connections);
    println!(
        "   Entry nodes: {}",
        entries.iter().map(|n| n.id.as_str()).collect::<Vec<_>>().join(", ")
    );

    Ok(())
}

fn list_nodes() {
    println!("📦 Available Node Types:");
    println!();

    let registry = registry();
    for node_type in registry.list_node_types() {
        if let Some(metadata) = registry.get_metadata(&node_type) {
            println!("  • {} ({})", node_type, metadata.category);
            println!("    {}", metadata.description);
        } else {
            println!("  • {}", node_type);
        }
    }
}

fn create_example_workflow(output: &Path) -> Result<()> {
    let mut workflow = Workflow::new("Example HTTP Workflow");
    workflow.description = Some("Receives a webhook, calls an API and tags the result".to_string());

    let hook = workflow.add_node(
        NodeSpec::new("webhook", "webhook-trigger")
            .with_name("Incoming Webhook")
            .with_position(100.0, 100.0),
    );
    let fetch = workflow.add_node(
        NodeSpec::new("fetch", "http-request")
            .with_name("Fetch Data")
            .with_parameter("url", "https://api.github.com/zen")
            .with_parameter("method", "GET")
            .with_position(300.0, 100.0),
    );
    let tag = workflow.add_node(
        NodeSpec::new("tag", "set")
            .with_name("Tag Result")
            .with_parameter("key", "source")
            .with_parameter("value", "relay")
            .with_position(500.0, 100.0),
    );

    workflow.connect(hook, fetch.clone());
    workflow.connect(fetch, tag);

    let json = serde_json::to_string_pretty(&workflow)?;
    std::fs::write(output, json)?;

    println!("✨ Created example workflow: {}", output.display());
    println!();
    println!("Run it with:");
    println!("  relay run --file {} --input '{{\"user\": \"demo\"}}'", output.display());

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use relaycore::{ExecutionId, ExecutionStatus};

    #[tokio::test]
    async fn printer_keeps_reading_after_lagging() {
        let (sender, receiver) = broadcast::channel(2);
        let execution_id = ExecutionId::new_v4();
        for _ in 0..3 {
            sender
                .send(ExecutionEvent::execution_update(execution_id, ExecutionStatus::Running, None, None))
                .unwrap();
        }
        sender
            .send(ExecutionEvent::execution_update(execution_id, ExecutionStatus::Success, None, None))
            .unwrap();

        // The two oldest updates are dropped; the last two are still printed
        assert_eq!(print_events(receiver).await, 2);
    }

    #[tokio::test]
    async fn printer_stops_when_the_bus_closes() {
        let (sender, receiver) = broadcast::channel::<ExecutionEvent>(4);
        drop(sender);
        assert_eq!(print_events(receiver).await, 0);
    }
}
