use async_trait::async_trait;
use tokio::time::{sleep, Duration};
use wirecore::{NodeContext, NodeError, NodeExecutor, WorkflowMessage};

/// Holds the message for `config.delay_ms` milliseconds, then forwards it
/// unchanged on output 0. Cancelled mid-delay (e.g. by an undeploy), the
/// branch ends without forwarding.
pub struct DelayNode;

#[async_trait]
impl NodeExecutor for DelayNode {
    fn node_type(&self) -> &str {
        "delay"
    }

    async fn execute(&self, msg: WorkflowMessage, ctx: NodeContext) -> Result<(), NodeError> {
        let delay_ms = ctx
            .config_value("delay_ms")
            .and_then(|v| v.as_u64())
            .unwrap_or(1000);

        tokio::select! {
            _ = sleep(Duration::from_millis(delay_ms)) => {}
            _ = ctx.cancellation.cancelled() => return Err(NodeError::Cancelled),
        }

        ctx.send(msg, 0).await;
        Ok(())
    }
}
