//! Core abstractions for the wireflow engine
//!
//! This crate provides the fundamental types and traits that all other
//! components depend on: the message/context model, workflow and step
//! definitions, the error taxonomy, and the append-only log sink.

mod error;
mod logs;
mod message;
mod node;
mod step;
mod workflow;

pub use error::{EngineError, NodeError, StepFailure, TransportError, ValidationError};
pub use logs::{LogEvent, LogRecord, LogStore, LogStream, LogWriter};
pub use message::WorkflowMessage;
pub use node::{NodeContext, NodeExecutor, OutputRouter};
pub use step::{CodeWorkflow, Step, StepCtx, TriggerKind};
pub use workflow::{NodeConfig, Position, WorkflowDefinition, WorkflowKind};

/// Result type for engine operations
pub type Result<T> = std::result::Result<T, EngineError>;
