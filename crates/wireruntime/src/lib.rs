//! Workflow execution runtime
//!
//! This crate provides the engine that routes messages across node graphs,
//! interprets step programs, manages the node type registry, and owns the
//! deploy/undeploy lifecycle binding trigger nodes to live listeners.

mod deploy;
mod executor;
mod graph;
mod mqtt;
mod registry;
mod runtime;
mod script;
mod steps;

pub use deploy::{DeployManager, RouteTable};
pub use executor::{ExecutorConfig, GraphExecutor};
pub use graph::FlowGraph;
pub use mqtt::{InMemoryTransport, MqttPublish, MqttTransport, RumqttcTransport};
pub use registry::NodeRegistry;
pub use runtime::{FlowRuntime, RuntimeConfig};
pub use script::{LuaScriptEngine, ScriptBindings, ScriptEngine};
pub use steps::StepExecutor;
