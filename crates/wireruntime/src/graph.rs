use crate::registry::NodeRegistry;
use petgraph::algo::toposort;
use petgraph::graph::DiGraph;
use std::collections::HashMap;
use std::sync::Arc;
use wirecore::{NodeConfig, ValidationError, WorkflowDefinition, WorkflowKind};

/// A compiled workflow: id-indexed nodes with wiring fully resolved and
/// validated. Immutable during execution — edits only take effect through a
/// fresh compile on the next load/deploy.
#[derive(Debug)]
pub struct FlowGraph {
    id: String,
    name: String,
    kind: WorkflowKind,
    nodes: HashMap<String, Arc<NodeConfig>>,
    order: Vec<String>,
}

/// Entry-point node types run by `execute_workflow`.
const ENTRY_TYPES: [&str; 2] = ["trigger", "inject"];

impl FlowGraph {
    /// Validate and compile a definition. Checks duplicate ids, dangling
    /// wires, unknown node types, and per-node configuration; resolves
    /// `step`-kind auto-chaining once, here, not in the executor.
    pub fn compile(
        def: &WorkflowDefinition,
        registry: &NodeRegistry,
    ) -> Result<Self, ValidationError> {
        let source: Vec<NodeConfig> = match def.kind {
            WorkflowKind::Flow => def.nodes.clone(),
            WorkflowKind::Step => Self::chain(&def.nodes),
        };

        let mut nodes: HashMap<String, Arc<NodeConfig>> = HashMap::new();
        let mut order = Vec::with_capacity(source.len());
        for node in source {
            if nodes.contains_key(&node.id) {
                return Err(ValidationError::DuplicateNodeId {
                    workflow: def.id.clone(),
                    node: node.id,
                });
            }
            order.push(node.id.clone());
            nodes.insert(node.id.clone(), Arc::new(node));
        }

        for node in nodes.values() {
            let executor = registry.resolve(&node.node_type).ok_or_else(|| {
                ValidationError::UnknownNodeType {
                    node: node.id.clone(),
                    node_type: node.node_type.clone(),
                }
            })?;
            executor
                .validate_config(node)
                .map_err(|e| ValidationError::InvalidNodeConfig {
                    node: node.id.clone(),
                    reason: e.to_string(),
                })?;
            for port in &node.wires {
                for target in port {
                    if !nodes.contains_key(target) {
                        return Err(ValidationError::DanglingWire {
                            node: node.id.clone(),
                            target: target.clone(),
                        });
                    }
                }
            }
        }

        Ok(Self {
            id: def.id.clone(),
            name: def.name.clone(),
            kind: def.kind,
            nodes,
            order,
        })
    }

    /// Step workflows wire each node's sole output to the next node in
    /// declaration order; any wires in the definition are replaced.
    fn chain(nodes: &[NodeConfig]) -> Vec<NodeConfig> {
        let mut chained: Vec<NodeConfig> = nodes.to_vec();
        let ids: Vec<String> = chained.iter().map(|n| n.id.clone()).collect();
        for (i, node) in chained.iter_mut().enumerate() {
            node.wires = match ids.get(i + 1) {
                Some(next) => vec![vec![next.clone()]],
                None => Vec::new(),
            };
        }
        chained
    }

    /// Reject cyclic wiring. Called by the deploy path; ad hoc runs instead
    /// rely on the executor's hop bound.
    pub fn ensure_acyclic(&self) -> Result<(), ValidationError> {
        let mut graph = DiGraph::<&str, ()>::new();
        let mut indices = HashMap::new();
        for id in &self.order {
            indices.insert(id.as_str(), graph.add_node(id.as_str()));
        }
        for node in self.nodes.values() {
            for port in &node.wires {
                for target in port {
                    graph.add_edge(indices[node.id.as_str()], indices[target.as_str()], ());
                }
            }
        }
        if toposort(&graph, None).is_err() {
            return Err(ValidationError::CyclicWiring(self.id.clone()));
        }
        Ok(())
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> WorkflowKind {
        self.kind
    }

    pub fn node(&self, id: &str) -> Option<&Arc<NodeConfig>> {
        self.nodes.get(id)
    }

    /// Nodes in declaration order.
    pub fn nodes(&self) -> impl Iterator<Item = &Arc<NodeConfig>> {
        self.order.iter().filter_map(|id| self.nodes.get(id))
    }

    /// Graph entry points: every `trigger` and `inject` node.
    pub fn entry_nodes(&self) -> Vec<&Arc<NodeConfig>> {
        self.nodes()
            .filter(|n| ENTRY_TYPES.contains(&n.node_type.as_str()))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use wirecore::{NodeContext, NodeError, NodeExecutor, WorkflowMessage};

    struct Passthrough(&'static str);

    #[async_trait]
    impl NodeExecutor for Passthrough {
        fn node_type(&self) -> &str {
            self.0
        }

        async fn execute(&self, msg: WorkflowMessage, ctx: NodeContext) -> Result<(), NodeError> {
            ctx.send(msg, 0).await;
            Ok(())
        }
    }

    fn registry() -> NodeRegistry {
        let mut registry = NodeRegistry::new();
        registry.register(Arc::new(Passthrough("trigger")));
        registry.register(Arc::new(Passthrough("filter")));
        registry
    }

    #[test]
    fn rejects_dangling_wires() {
        let def = WorkflowDefinition::new("w", "w", WorkflowKind::Flow)
            .add_node(NodeConfig::new("a", "trigger").with_wires(["ghost"]));
        let err = FlowGraph::compile(&def, &registry()).unwrap_err();
        assert!(matches!(err, ValidationError::DanglingWire { .. }));
    }

    #[test]
    fn rejects_unknown_node_type() {
        let def = WorkflowDefinition::new("w", "w", WorkflowKind::Flow)
            .add_node(NodeConfig::new("a", "does-not-exist"));
        let err = FlowGraph::compile(&def, &registry()).unwrap_err();
        assert!(matches!(err, ValidationError::UnknownNodeType { .. }));
    }

    #[test]
    fn rejects_duplicate_ids() {
        let def = WorkflowDefinition::new("w", "w", WorkflowKind::Flow)
            .add_node(NodeConfig::new("a", "trigger"))
            .add_node(NodeConfig::new("a", "filter"));
        let err = FlowGraph::compile(&def, &registry()).unwrap_err();
        assert!(matches!(err, ValidationError::DuplicateNodeId { .. }));
    }

    #[test]
    fn step_kind_chains_in_declaration_order() {
        let def = WorkflowDefinition::new("w", "w", WorkflowKind::Step)
            .add_node(NodeConfig::new("a", "trigger"))
            .add_node(NodeConfig::new("b", "filter"))
            .add_node(NodeConfig::new("c", "filter"));
        let graph = FlowGraph::compile(&def, &registry()).unwrap();
        assert_eq!(graph.node("a").unwrap().wires, vec![vec!["b".to_string()]]);
        assert_eq!(graph.node("b").unwrap().wires, vec![vec!["c".to_string()]]);
        assert!(graph.node("c").unwrap().wires.is_empty());
    }

    #[test]
    fn acyclic_check_flags_cycles() {
        let def = WorkflowDefinition::new("w", "w", WorkflowKind::Flow)
            .add_node(NodeConfig::new("a", "trigger").with_wires(["b"]))
            .add_node(NodeConfig::new("b", "filter").with_wires(["a"]));
        let graph = FlowGraph::compile(&def, &registry()).unwrap();
        assert!(matches!(
            graph.ensure_acyclic(),
            Err(ValidationError::CyclicWiring(_))
        ));
    }
}
