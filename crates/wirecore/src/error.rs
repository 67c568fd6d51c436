use crate::step::StepCtx;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum EngineError {
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    #[error("Step execution failed: {0}")]
    Step(#[from] StepFailure),

    #[error("Execution error: {0}")]
    Execution(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Definition-level problems, surfaced synchronously before any execution.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Workflow not found: {0}")]
    UnknownWorkflow(String),

    #[error("Duplicate node id '{node}' in workflow '{workflow}'")]
    DuplicateNodeId { workflow: String, node: String },

    #[error("Node '{node}' wires to unknown node '{target}'")]
    DanglingWire { node: String, target: String },

    #[error("Node '{node}' has unknown type '{node_type}'")]
    UnknownNodeType { node: String, node_type: String },

    #[error("Node not found: {0}")]
    UnknownNode(String),

    #[error("Cyclic wiring detected in workflow '{0}'")]
    CyclicWiring(String),

    #[error("Invalid configuration on node '{node}': {reason}")]
    InvalidNodeConfig { node: String, reason: String },
}

/// Failures inside a single node executor. Contained by the engine: logged to
/// the debug stream, never propagated down that node's outputs.
#[derive(Error, Debug, Clone)]
pub enum NodeError {
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Execution failed: {0}")]
    ExecutionFailed(String),

    #[error("Script error: {0}")]
    Script(String),

    #[error("HTTP request failed: {0}")]
    Http(String),

    #[error("Timed out after {0:?}")]
    Timeout(std::time::Duration),

    #[error("Cancelled")]
    Cancelled,
}

/// Listener-bind and outbound transport failures. Node-level occurrences are
/// contained like any NodeError; deploy-time bind failures reach the caller.
#[derive(Error, Debug, Clone)]
pub enum TransportError {
    #[error("HTTP route '{0}' is already bound")]
    RouteConflict(String),

    #[error("No trigger bound at path '{0}'")]
    RouteNotFound(String),

    #[error("MQTT subscribe to '{topic}' failed: {reason}")]
    MqttSubscribe { topic: String, reason: String },

    #[error("MQTT publish to '{topic}' failed: {reason}")]
    MqttPublish { topic: String, reason: String },

    #[error("MQTT connection failed: {0}")]
    MqttConnection(String),
}

/// A step-program abort. Carries the context as it stood when the failing
/// step ran, so callers can inspect partial progress.
#[derive(Error, Debug, Clone)]
#[error("step '{step_id}' failed: {reason}")]
pub struct StepFailure {
    pub step_id: String,
    pub reason: String,
    pub context: StepCtx,
}

impl StepFailure {
    pub fn new(step_id: impl Into<String>, reason: impl Into<String>, context: StepCtx) -> Self {
        Self {
            step_id: step_id.into(),
            reason: reason.into(),
            context,
        }
    }
}
