use crate::{LogWriter, NodeConfig, NodeError, WorkflowMessage};
use async_trait::async_trait;
use serde_json::Value;
use std::fmt;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Core trait every node executor implements.
///
/// Executors are stateless with respect to the graph: per-node parameters
/// arrive through `ctx.node.config` and all effects on the rest of the graph
/// go through the context. An `Err` return is contained by the engine — it is
/// written to the debug log stream and the branch ends there.
#[async_trait]
pub trait NodeExecutor: Send + Sync {
    /// Type identifier the registry keys on (e.g. "filter", "http-request").
    fn node_type(&self) -> &str;

    async fn execute(&self, msg: WorkflowMessage, ctx: NodeContext) -> Result<(), NodeError>;

    /// Optional: validate configuration at workflow load time.
    fn validate_config(&self, _node: &NodeConfig) -> Result<(), NodeError> {
        Ok(())
    }
}

/// Routes a message out of one of a node's output ports. Implemented by the
/// graph executor; the trait seam keeps executors decoupled from the runtime.
#[async_trait]
pub trait OutputRouter: Send + Sync {
    async fn route(&self, from: &NodeConfig, msg: WorkflowMessage, output: usize);
}

/// Capability object passed to every executor invocation. The only channel
/// through which a node may affect the rest of the graph.
#[derive(Clone)]
pub struct NodeContext {
    pub node: Arc<NodeConfig>,
    pub workflow_id: Option<String>,
    router: Arc<dyn OutputRouter>,
    logs: LogWriter,
    pub cancellation: CancellationToken,
}

impl NodeContext {
    pub fn new(
        node: Arc<NodeConfig>,
        workflow_id: Option<String>,
        router: Arc<dyn OutputRouter>,
        logs: LogWriter,
        cancellation: CancellationToken,
    ) -> Self {
        Self {
            node,
            workflow_id,
            router,
            logs,
            cancellation,
        }
    }

    /// Forward `msg` out of the given output port. Each wired target becomes
    /// an independent propagation; this returns once the branches are
    /// launched, not when they finish.
    pub async fn send(&self, msg: WorkflowMessage, output: usize) {
        self.router.route(&self.node, msg, output).await;
    }

    /// Write to the info log stream.
    pub fn log(&self, message: impl fmt::Display) {
        self.logs.info(message);
    }

    /// Record a failure for this node without throwing across the graph.
    pub fn error(&self, text: impl fmt::Display, cause: Option<&dyn fmt::Display>) {
        self.logs.error(text, cause);
    }

    pub fn logs(&self) -> &LogWriter {
        &self.logs
    }

    pub fn config_str(&self, key: &str) -> Option<&str> {
        self.node.config_str(key)
    }

    pub fn config_value(&self, key: &str) -> Option<&Value> {
        self.node.config_value(key)
    }

    pub fn require_config_str(&self, key: &str) -> Result<&str, NodeError> {
        self.config_str(key)
            .ok_or_else(|| NodeError::Configuration(format!("missing config '{}'", key)))
    }
}
