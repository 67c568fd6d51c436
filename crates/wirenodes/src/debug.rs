use async_trait::async_trait;
use serde_json::Value;
use wirecore::{NodeContext, NodeError, NodeExecutor, WorkflowMessage};

/// Terminal sink: renders the message to the debug log stream and forwards
/// nothing. `config.output` selects what is written — absent or `"payload"`
/// for the whole payload, `"message"` for the full message, any other value
/// for that key of the payload object.
pub struct DebugNode;

#[async_trait]
impl NodeExecutor for DebugNode {
    fn node_type(&self) -> &str {
        "debug"
    }

    async fn execute(&self, msg: WorkflowMessage, ctx: NodeContext) -> Result<(), NodeError> {
        let rendered = match ctx.config_str("output") {
            Some("message") => serde_json::to_string(&msg),
            None | Some("payload") => serde_json::to_string(&msg.payload),
            Some(key) => serde_json::to_string(msg.payload.get(key).unwrap_or(&Value::Null)),
        }
        .map_err(|e| NodeError::ExecutionFailed(e.to_string()))?;

        ctx.logs().debug(rendered);
        Ok(())
    }
}
