//! Standard node library
//!
//! The built-in executors: graph entry points (trigger, inject, mqtt-in),
//! routing and transformation (filter, function, split, delay), sinks and
//! outbound calls (debug, http-request, mqtt-out).

mod debug;
mod filter;
mod function;
mod http;
mod mqtt;
mod split;
mod time;
mod trigger;

pub use debug::DebugNode;
pub use filter::FilterNode;
pub use function::FunctionNode;
pub use http::HttpRequestNode;
pub use mqtt::{MqttInNode, MqttOutNode};
pub use split::SplitNode;
pub use time::DelayNode;
pub use trigger::{InjectNode, TriggerNode};

use std::sync::Arc;
use wireruntime::{MqttTransport, NodeRegistry, ScriptEngine};

/// Register every built-in node type with a registry.
pub fn register_all(
    registry: &mut NodeRegistry,
    script: Arc<dyn ScriptEngine>,
    mqtt: Arc<dyn MqttTransport>,
) {
    registry.register(Arc::new(TriggerNode));
    registry.register(Arc::new(InjectNode));
    registry.register(Arc::new(DebugNode));
    registry.register(Arc::new(FilterNode::new(script.clone())));
    registry.register(Arc::new(FunctionNode::new(script)));
    registry.register(Arc::new(SplitNode));
    registry.register(Arc::new(DelayNode));
    registry.register(Arc::new(HttpRequestNode::new()));
    registry.register(Arc::new(MqttInNode));
    registry.register(Arc::new(MqttOutNode::new(mqtt)));
}
