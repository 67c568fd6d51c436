use crate::graph::FlowGraph;
use crate::registry::NodeRegistry;
use async_trait::async_trait;
use futures::future::BoxFuture;
use futures::FutureExt;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use uuid::Uuid;
use wirecore::{
    LogStore, NodeConfig, NodeContext, NodeError, OutputRouter, ValidationError, WorkflowMessage,
};

/// Propagation guards for a single root execution.
#[derive(Debug, Clone)]
pub struct ExecutorConfig {
    /// Hard bound on hops along any one causal chain. Cyclic wiring that
    /// slips past deploy-time validation terminates here with a logged error
    /// instead of recursing unboundedly.
    pub max_hops: usize,
    /// Per-node-invocation timeout. `None` disables the wrapper.
    pub node_timeout: Option<Duration>,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            max_hops: 256,
            node_timeout: Some(Duration::from_secs(30)),
        }
    }
}

/// Push-based message router over a compiled graph.
///
/// `run` resolves the start node's executor and invokes it; every `send` a
/// node makes fans out one independently spawned task per wired target.
/// Sibling branches carry no ordering guarantee between their side effects —
/// only causal ordering holds. `run` returns once every branch has drained.
pub struct GraphExecutor {
    config: ExecutorConfig,
}

impl GraphExecutor {
    pub fn new(config: ExecutorConfig) -> Self {
        Self { config }
    }

    pub async fn run(
        &self,
        graph: Arc<FlowGraph>,
        registry: Arc<NodeRegistry>,
        logs: Arc<LogStore>,
        cancel: CancellationToken,
        start_node_id: &str,
        initial: WorkflowMessage,
    ) -> wirecore::Result<()> {
        if graph.node(start_node_id).is_none() {
            return Err(ValidationError::UnknownNode(start_node_id.to_string()).into());
        }

        let execution_id = Uuid::new_v4();
        tracing::info!(
            %execution_id,
            workflow = graph.id(),
            start = start_node_id,
            "starting graph execution"
        );

        let run = Arc::new(FlowRun {
            graph,
            registry,
            logs,
            tracker: TaskTracker::new(),
            cancel,
            config: self.config.clone(),
        });

        run.tracker
            .spawn(FlowRun::deliver(run.clone(), start_node_id.to_string(), initial, 0));
        run.tracker.close();
        run.tracker.wait().await;

        tracing::debug!(%execution_id, "graph execution drained");
        Ok(())
    }
}

impl Default for GraphExecutor {
    fn default() -> Self {
        Self::new(ExecutorConfig::default())
    }
}

/// State shared by every branch of one root execution. Children spawn into
/// the tracker from inside their parent task, so the tracker only drains once
/// the leaves finish.
struct FlowRun {
    graph: Arc<FlowGraph>,
    registry: Arc<NodeRegistry>,
    logs: Arc<LogStore>,
    tracker: TaskTracker,
    cancel: CancellationToken,
    config: ExecutorConfig,
}

impl FlowRun {
    /// Deliver one message to one node. Boxed because delivery recurses
    /// through `send` → spawn → `deliver`.
    fn deliver(
        run: Arc<Self>,
        node_id: String,
        msg: WorkflowMessage,
        hops: usize,
    ) -> BoxFuture<'static, ()> {
        async move {
            if run.cancel.is_cancelled() {
                return;
            }

            let writer = run.logs.writer(node_id.clone());
            if hops >= run.config.max_hops {
                writer.error(
                    format!("propagation exceeded {} hops, dropping message", run.config.max_hops),
                    None,
                );
                return;
            }

            let Some(node) = run.graph.node(&node_id).cloned() else {
                writer.error("message addressed to unknown node", None);
                return;
            };
            let Some(executor) = run.registry.resolve(&node.node_type) else {
                writer.error(
                    format!("no executor registered for type '{}'", node.node_type),
                    None,
                );
                return;
            };

            let ctx = NodeContext::new(
                node.clone(),
                Some(run.graph.id().to_string()),
                Arc::new(PortRouter {
                    run: run.clone(),
                    hops,
                }),
                writer.clone(),
                run.cancel.child_token(),
            );

            let result = match run.config.node_timeout {
                Some(limit) => match timeout(limit, executor.execute(msg, ctx)).await {
                    Ok(result) => result,
                    Err(_) => Err(NodeError::Timeout(limit)),
                },
                None => executor.execute(msg, ctx).await,
            };

            // Contained: the failure ends this branch only.
            if let Err(e) = result {
                writer.error(format!("node '{}' failed", node.id), Some(&e));
            }
        }
        .boxed()
    }
}

/// The `send` implementation handed to node contexts: looks up the wires for
/// the requested output port and launches one branch per target, in emission
/// order.
struct PortRouter {
    run: Arc<FlowRun>,
    hops: usize,
}

#[async_trait]
impl OutputRouter for PortRouter {
    async fn route(&self, from: &NodeConfig, msg: WorkflowMessage, output: usize) {
        let Some(targets) = from.wires.get(output) else {
            return;
        };
        for target in targets {
            self.run.tracker.spawn(FlowRun::deliver(
                self.run.clone(),
                target.clone(),
                msg.clone(),
                self.hops + 1,
            ));
        }
    }
}
