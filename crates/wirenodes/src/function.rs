use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;
use wirecore::{NodeConfig, NodeContext, NodeError, NodeExecutor, WorkflowMessage};
use wireruntime::{ScriptBindings, ScriptEngine};

/// Runs a user-supplied code body (`config.code`) in a sandboxed scope with
/// `msg` and a `log` binding. Returning nothing ends the branch; an object
/// with a `payload` key becomes the forwarded message wholesale; any other
/// value becomes the payload of a derived message on output 0. Failures in
/// the code are contained and never crash the engine.
pub struct FunctionNode {
    script: Arc<dyn ScriptEngine>,
}

impl FunctionNode {
    pub fn new(script: Arc<dyn ScriptEngine>) -> Self {
        Self { script }
    }
}

#[async_trait]
impl NodeExecutor for FunctionNode {
    fn node_type(&self) -> &str {
        "function"
    }

    fn validate_config(&self, node: &NodeConfig) -> Result<(), NodeError> {
        node.config_str("code")
            .map(|_| ())
            .ok_or_else(|| NodeError::Configuration("missing config 'code'".to_string()))
    }

    async fn execute(&self, msg: WorkflowMessage, ctx: NodeContext) -> Result<(), NodeError> {
        let code = ctx.require_config_str("code")?.to_string();
        let bindings = ScriptBindings::with_log(
            serde_json::to_value(&msg).map_err(|e| NodeError::ExecutionFailed(e.to_string()))?,
            ctx.logs().clone(),
        );

        let result = self.script.evaluate(&code, bindings)?;
        let outgoing = match result {
            Value::Null => return Ok(()),
            Value::Object(ref map) if map.contains_key("payload") => {
                serde_json::from_value::<WorkflowMessage>(result)
                    .map_err(|e| NodeError::Script(format!("result not a message: {}", e)))?
            }
            other => msg.derived(other),
        };

        ctx.send(outgoing, 0).await;
        Ok(())
    }
}
