use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use wirecore::{LogEvent, LogStream, NodeConfig, WorkflowDefinition, WorkflowKind, WorkflowMessage};
use wireruntime::{
    FlowGraph, FlowRuntime, InMemoryTransport, LuaScriptEngine, NodeRegistry, RuntimeConfig,
};

#[derive(Parser)]
#[command(name = "wire")]
#[command(about = "Wireflow workflow engine CLI", long_about = None)]
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

        /// Start at one node instead of every entry point
        #[arg(short, long)]
        start: Option<String>,

        /// Initial payload as a JSON string
        #[arg(short, long)]
        payload: Option<String>,

        /// Show verbose output
        #[arg(short, long)]
        verbose: bool,
    },

    /// Validate a workflow file without running it
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

fn build_runtime() -> FlowRuntime {
    let mut registry = NodeRegistry::new();
    wirenodes::register_all(
        &mut registry,
        Arc::new(LuaScriptEngine::new()),
        Arc::new(InMemoryTransport::new()),
    );
    FlowRuntime::with_config(Arc::new(registry), RuntimeConfig::default())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Run {
            file,
            start,
            payload,
            verbose,
        } => {
            let level = if verbose {
                tracing::Level::DEBUG
            } else {
                tracing::Level::WARN
            };
            tracing_subscriber::fmt().with_max_level(level).init();

            run_workflow(file, start, payload).await?;
        }

        Commands::Validate { file } => {
            validate_workflow(file)?;
        }

        Commands::Nodes => {
            list_nodes();
        }

        Commands::Init { output } => {
            create_example_workflow(output)?;
        }
    }

    Ok(())
}

async fn run_workflow(file: PathBuf, start: Option<String>, payload: Option<String>) -> Result<()> {
    println!("🚀 Loading workflow from: {}", file.display());

    let workflow_json = std::fs::read_to_string(&file)?;
    let def: WorkflowDefinition = serde_json::from_str(&workflow_json)?;

    println!("📋 Workflow: {} ({} nodes)", def.name, def.nodes.len());
    println!();

    let initial = match payload {
        Some(text) => WorkflowMessage::with_payload(serde_json::from_str::<serde_json::Value>(&text)?),
        None => WorkflowMessage::empty(),
    };

    let runtime = build_runtime();
    let graph = runtime.load_workflow(&def).await?;

    // Print engine log lines live while the run drains.
    let mut events = runtime.logs().subscribe();
    let printer = tokio::spawn(async move {
        while let Ok(LogEvent { stream, record }) = events.recv().await {
            match stream {
                LogStream::Info => println!("  ℹ️  {}", record.message),
                LogStream::Debug => println!("  🔍 {}", record.message),
            }
        }
    });

    match start {
        Some(node_id) => {
            runtime.run_node(graph.id(), &node_id, initial).await?;
        }
        None => {
            runtime.execute_workflow(graph.id()).await?;
        }
    }

    // Give the printer a moment to flush the tail of the broadcast.
    tokio::time::sleep(tokio::time::Duration::from_millis(100)).await;
    printer.abort();

    println!();
    println!("✨ Run complete");
    println!(
        "   info: {} lines, debug: {} lines",
        runtime.logs().records(LogStream::Info).len(),
        runtime.logs().records(LogStream::Debug).len()
    );

    Ok(())
}

fn validate_workflow(file: PathBuf) -> Result<()> {
    println!("🔍 Validating workflow: {}", file.display());

    let workflow_json = std::fs::read_to_string(&file)?;
    let def: WorkflowDefinition = serde_json::from_str(&workflow_json)?;

    let runtime = build_runtime();
    let graph = FlowGraph::compile(&def, runtime.registry())?;
    graph.ensure_acyclic()?;

    println!("✅ Workflow is valid:");
    println!("   Name: {}", graph.name());
    println!("   Nodes: {}", graph.nodes().count());
    println!("   Entry points: {}", graph.entry_nodes().len());

    Ok(())
}

fn list_nodes() {
    println!("📦 Available node types:");
    println!();

    let runtime = build_runtime();
    for node_type in runtime.registry().node_types() {
        println!("  • {}", node_type);
    }
}

fn create_example_workflow(output: PathBuf) -> Result<()> {
    let def = WorkflowDefinition::new("filter-transform", "Filter and transform", WorkflowKind::Flow)
        .add_node(
            NodeConfig::new("in", "inject")
                .with_name("Start")
                .with_config("payload", serde_json::json!({"value": 42, "name": "test"}))
                .with_wires(["check"]),
        )
        .add_node(
            NodeConfig::new("check", "filter")
                .with_name("Value over 10")
                .with_config("condition", "msg.payload.value > 10")
                .with_wires(["log-high"])
                .with_wires(["log-low"]),
        )
        .add_node(NodeConfig::new("log-high", "debug").with_name("High values"))
        .add_node(
            NodeConfig::new("log-low", "debug")
                .with_name("Low values")
                .with_config("output", "message"),
        );

    let json = serde_json::to_string_pretty(&def)?;
    std::fs::write(&output, json)?;

    println!("✨ Created example workflow: {}", output.display());
    println!();
    println!("Run it with:");
    println!("  wire run --file {}", output.display());

    Ok(())
}
