use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

/// One unit of processing: a type, a configuration, and ordered output ports.
///
/// `wires[p]` lists the target node ids fed by output port `p`; port 0 is the
/// default output. Every referenced id must exist in the owning workflow —
/// checked when the workflow is compiled, not at send time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeConfig {
    pub id: String,

    #[serde(rename = "type")]
    pub node_type: String,

    #[serde(default)]
    pub name: String,

    #[serde(default)]
    pub config: HashMap<String, Value>,

    #[serde(default)]
    pub wires: Vec<Vec<String>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub position: Option<Position>,
}

impl NodeConfig {
    pub fn new(id: impl Into<String>, node_type: impl Into<String>) -> Self {
        let id = id.into();
        Self {
            name: id.clone(),
            id,
            node_type: node_type.into(),
            config: HashMap::new(),
            wires: Vec::new(),
            position: None,
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn with_config(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.config.insert(key.into(), value.into());
        self
    }

    /// Append an output port wired to the given targets.
    pub fn with_wires<I, S>(mut self, targets: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.wires
            .push(targets.into_iter().map(Into::into).collect());
        self
    }

    pub fn with_position(mut self, x: f32, y: f32) -> Self {
        self.position = Some(Position { x, y });
        self
    }

    pub fn config_str(&self, key: &str) -> Option<&str> {
        self.config.get(key).and_then(Value::as_str)
    }

    pub fn config_value(&self, key: &str) -> Option<&Value> {
        self.config.get(key)
    }
}

/// Layout hint from the visual editor; ignored by the engine.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Position {
    pub x: f32,
    pub y: f32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WorkflowKind {
    /// Routes by explicit wiring.
    Flow,
    /// Auto-chains nodes in declaration order; resolved once at compile time.
    Step,
}

/// A named graph of nodes. Code-type workflows carry closures and live in
/// [`crate::CodeWorkflow`] instead.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowDefinition {
    pub id: String,
    pub name: String,

    #[serde(rename = "type", default = "WorkflowDefinition::default_kind")]
    pub kind: WorkflowKind,

    #[serde(default)]
    pub nodes: Vec<NodeConfig>,
}

impl WorkflowDefinition {
    fn default_kind() -> WorkflowKind {
        WorkflowKind::Flow
    }

    pub fn new(id: impl Into<String>, name: impl Into<String>, kind: WorkflowKind) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            kind,
            nodes: Vec::new(),
        }
    }

    pub fn add_node(mut self, node: NodeConfig) -> Self {
        self.nodes.push(node);
        self
    }

    pub fn find_node(&self, id: &str) -> Option<&NodeConfig> {
        self.nodes.iter().find(|n| n.id == id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn node_config_deserializes_with_defaults() {
        let node: NodeConfig =
            serde_json::from_value(json!({"id": "n1", "type": "trigger"})).unwrap();
        assert_eq!(node.id, "n1");
        assert_eq!(node.node_type, "trigger");
        assert!(node.wires.is_empty());
        assert!(node.config.is_empty());
    }

    #[test]
    fn workflow_kind_uses_lowercase_tags() {
        let def: WorkflowDefinition = serde_json::from_value(json!({
            "id": "w1",
            "name": "demo",
            "type": "step",
            "nodes": []
        }))
        .unwrap();
        assert_eq!(def.kind, WorkflowKind::Step);
    }
}
