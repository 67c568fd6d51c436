use async_trait::async_trait;
use std::sync::Arc;
use wirecore::{NodeConfig, NodeContext, NodeError, NodeExecutor, WorkflowMessage};
use wireruntime::{ScriptBindings, ScriptEngine};

/// Routes by predicate: evaluates `config.condition` against the incoming
/// message in an isolated scope exposing only `msg`. True forwards the
/// unchanged message to output 0, false to output 1. An evaluation failure
/// is contained — the message is forwarded to neither output.
pub struct FilterNode {
    script: Arc<dyn ScriptEngine>,
}

impl FilterNode {
    pub fn new(script: Arc<dyn ScriptEngine>) -> Self {
        Self { script }
    }
}

#[async_trait]
impl NodeExecutor for FilterNode {
    fn node_type(&self) -> &str {
        "filter"
    }

    fn validate_config(&self, node: &NodeConfig) -> Result<(), NodeError> {
        node.config_str("condition")
            .map(|_| ())
            .ok_or_else(|| NodeError::Configuration("missing config 'condition'".to_string()))
    }

    async fn execute(&self, msg: WorkflowMessage, ctx: NodeContext) -> Result<(), NodeError> {
        let condition = ctx.require_config_str("condition")?;
        let code = format!("return ({})", condition);
        let bindings = ScriptBindings::msg_only(
            serde_json::to_value(&msg).map_err(|e| NodeError::ExecutionFailed(e.to_string()))?,
        );

        let result = self.script.evaluate(&code, bindings)?;
        let Some(matched) = result.as_bool() else {
            return Err(NodeError::Script(format!(
                "condition did not evaluate to a boolean: {}",
                result
            )));
        };

        ctx.send(msg, if matched { 0 } else { 1 }).await;
        Ok(())
    }
}
