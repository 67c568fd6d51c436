use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;
use wirecore::{NodeConfig, NodeContext, NodeError, NodeExecutor, WorkflowMessage};
use wireruntime::MqttTransport;

/// Graph entry bound to a broker topic at deploy time. The deploy manager owns
/// the subscription and starts a propagation here per inbound publish; within
/// the graph this node is a pass-through.
pub struct MqttInNode;

#[async_trait]
impl NodeExecutor for MqttInNode {
    fn node_type(&self) -> &str {
        "mqtt-in"
    }

    fn validate_config(&self, node: &NodeConfig) -> Result<(), NodeError> {
        node.config_str("topic")
            .map(|_| ())
            .ok_or_else(|| NodeError::Configuration("missing config 'topic'".to_string()))
    }

    async fn execute(&self, msg: WorkflowMessage, ctx: NodeContext) -> Result<(), NodeError> {
        ctx.send(msg, 0).await;
        Ok(())
    }
}

/// Publishes the message payload to `config.topic`. String payloads go out as
/// raw bytes, everything else as serialized JSON. Terminal: nothing is
/// forwarded.
pub struct MqttOutNode {
    transport: Arc<dyn MqttTransport>,
}

impl MqttOutNode {
    pub fn new(transport: Arc<dyn MqttTransport>) -> Self {
        Self { transport }
    }
}

#[async_trait]
impl NodeExecutor for MqttOutNode {
    fn node_type(&self) -> &str {
        "mqtt-out"
    }

    fn validate_config(&self, node: &NodeConfig) -> Result<(), NodeError> {
        node.config_str("topic")
            .map(|_| ())
            .ok_or_else(|| NodeError::Configuration("missing config 'topic'".to_string()))
    }

    async fn execute(&self, msg: WorkflowMessage, ctx: NodeContext) -> Result<(), NodeError> {
        let topic = ctx.require_config_str("topic")?;
        let bytes = match &msg.payload {
            Value::String(text) => text.clone().into_bytes(),
            other => serde_json::to_vec(other)
                .map_err(|e| NodeError::ExecutionFailed(e.to_string()))?,
        };

        ctx.log(format!("publishing {} bytes to {}", bytes.len(), topic));
        self.transport
            .publish(topic, bytes)
            .await
            .map_err(|e| NodeError::ExecutionFailed(e.to_string()))?;
        Ok(())
    }
}
