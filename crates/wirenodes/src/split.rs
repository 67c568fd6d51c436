use async_trait::async_trait;
use serde_json::Value;
use wirecore::{NodeContext, NodeError, NodeExecutor, WorkflowMessage};

/// Fans an array payload out into one message per element on output 0, in
/// element order; each emission is a distinct propagation. Non-array payloads
/// pass through unchanged.
///
/// Emission order is guaranteed, but each send spawns an independent branch:
/// delivery order at a shared downstream node matches emission order only
/// under a single-threaded scheduler. On a multi-threaded runtime, downstream
/// consumers that need element order must carry it in the payload.
pub struct SplitNode;

#[async_trait]
impl NodeExecutor for SplitNode {
    fn node_type(&self) -> &str {
        "split"
    }

    async fn execute(&self, msg: WorkflowMessage, ctx: NodeContext) -> Result<(), NodeError> {
        match &msg.payload {
            Value::Array(elements) => {
                for element in elements {
                    ctx.send(msg.derived(element.clone()), 0).await;
                }
            }
            _ => ctx.send(msg, 0).await,
        }
        Ok(())
    }
}
