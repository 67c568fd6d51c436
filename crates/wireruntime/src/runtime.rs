use crate::executor::{ExecutorConfig, GraphExecutor};
use crate::graph::FlowGraph;
use crate::registry::NodeRegistry;
use crate::steps::StepExecutor;
use futures::future::join_all;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;
use wirecore::{
    CodeWorkflow, LogStore, StepCtx, StepFailure, ValidationError, WorkflowDefinition,
    WorkflowMessage,
};

/// Configuration for the runtime.
#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    pub executor: ExecutorConfig,
    /// Buffer size of the live log broadcast channel.
    pub log_capacity: usize,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            executor: ExecutorConfig::default(),
            log_capacity: 1024,
        }
    }
}

/// Main runtime: holds the node registry, the loaded-workflow map, the log
/// sink, and both execution engines.
pub struct FlowRuntime {
    registry: Arc<NodeRegistry>,
    executor: GraphExecutor,
    steps: StepExecutor,
    logs: Arc<LogStore>,
    workflows: RwLock<HashMap<String, Arc<FlowGraph>>>,
}

impl FlowRuntime {
    pub fn new(registry: Arc<NodeRegistry>) -> Self {
        Self::with_config(registry, RuntimeConfig::default())
    }

    pub fn with_config(registry: Arc<NodeRegistry>, config: RuntimeConfig) -> Self {
        Self {
            registry,
            executor: GraphExecutor::new(config.executor),
            steps: StepExecutor::new(),
            logs: Arc::new(LogStore::new(config.log_capacity)),
            workflows: RwLock::new(HashMap::new()),
        }
    }

    pub fn registry(&self) -> &Arc<NodeRegistry> {
        &self.registry
    }

    pub fn logs(&self) -> &Arc<LogStore> {
        &self.logs
    }

    /// Validate, compile, and register a definition in memory, replacing any
    /// existing workflow with the same id.
    pub async fn load_workflow(&self, def: &WorkflowDefinition) -> wirecore::Result<Arc<FlowGraph>> {
        let graph = Arc::new(FlowGraph::compile(def, &self.registry)?);
        self.workflows
            .write()
            .await
            .insert(graph.id().to_string(), graph.clone());
        tracing::info!(workflow = graph.id(), name = graph.name(), "workflow loaded");
        Ok(graph)
    }

    pub async fn workflow(&self, id: &str) -> Option<Arc<FlowGraph>> {
        self.workflows.read().await.get(id).cloned()
    }

    pub async fn unload_workflow(&self, id: &str) -> bool {
        self.workflows.write().await.remove(id).is_some()
    }

    pub async fn workflows(&self) -> Vec<Arc<FlowGraph>> {
        self.workflows.read().await.values().cloned().collect()
    }

    /// Whole-workflow entry point: runs every `trigger`/`inject` node once,
    /// concurrently, each with an empty message. A workflow with no entry
    /// points executes nothing — that is not an error.
    pub async fn execute_workflow(&self, id: &str) -> wirecore::Result<()> {
        let graph = self
            .workflow(id)
            .await
            .ok_or_else(|| ValidationError::UnknownWorkflow(id.to_string()))?;

        let entries: Vec<String> = graph
            .entry_nodes()
            .iter()
            .map(|n| n.id.clone())
            .collect();
        tracing::debug!(workflow = id, entries = entries.len(), "executing workflow");

        let runs = entries.iter().map(|entry| {
            self.run_graph(
                &graph,
                entry,
                WorkflowMessage::empty(),
                CancellationToken::new(),
            )
        });
        for result in join_all(runs).await {
            result?;
        }
        Ok(())
    }

    /// Run a single propagation over a compiled graph starting at `start`.
    pub async fn run_graph(
        &self,
        graph: &Arc<FlowGraph>,
        start: &str,
        msg: WorkflowMessage,
        cancel: CancellationToken,
    ) -> wirecore::Result<()> {
        self.executor
            .run(
                graph.clone(),
                self.registry.clone(),
                self.logs.clone(),
                cancel,
                start,
                msg,
            )
            .await
    }

    /// Ad hoc single-node run against a loaded workflow.
    pub async fn run_node(
        &self,
        workflow_id: &str,
        node_id: &str,
        msg: WorkflowMessage,
    ) -> wirecore::Result<()> {
        let graph = self
            .workflow(workflow_id)
            .await
            .ok_or_else(|| ValidationError::UnknownWorkflow(workflow_id.to_string()))?;
        self.run_graph(&graph, node_id, msg, CancellationToken::new())
            .await
    }

    /// Run a step program to completion; returns the final context or the
    /// first failure (carrying the partial context).
    pub async fn execute_code_workflow(
        &self,
        workflow: &CodeWorkflow,
        initial: StepCtx,
    ) -> Result<StepCtx, StepFailure> {
        tracing::info!(workflow = %workflow.id, steps = workflow.steps.len(), "running code workflow");
        self.steps.run(&workflow.steps, initial).await
    }
}
