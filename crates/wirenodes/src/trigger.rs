use async_trait::async_trait;
use serde_json::Value;
use wirecore::{NodeContext, NodeError, NodeExecutor, WorkflowMessage};

/// Graph entry point. Forwards whatever it receives — an empty message when
/// started by `execute_workflow`, the request payload when the deploy manager
/// dispatches an HTTP trigger event to it.
pub struct TriggerNode;

#[async_trait]
impl NodeExecutor for TriggerNode {
    fn node_type(&self) -> &str {
        "trigger"
    }

    async fn execute(&self, msg: WorkflowMessage, ctx: NodeContext) -> Result<(), NodeError> {
        ctx.send(msg, 0).await;
        Ok(())
    }
}

/// Entry point with a fixed payload. Ignores any inbound message and emits a
/// fresh message built from `config.payload`, so repeated executions always
/// start identically.
pub struct InjectNode;

#[async_trait]
impl NodeExecutor for InjectNode {
    fn node_type(&self) -> &str {
        "inject"
    }

    async fn execute(&self, _msg: WorkflowMessage, ctx: NodeContext) -> Result<(), NodeError> {
        let payload = ctx
            .config_value("payload")
            .cloned()
            .unwrap_or(Value::Null);
        ctx.send(WorkflowMessage::with_payload(payload), 0).await;
        Ok(())
    }
}
