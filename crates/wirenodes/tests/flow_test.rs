//! End-to-end flows through the built-in node library, driven by the real
//! runtime with the Lua script engine and the loopback mqtt transport.

use async_trait::async_trait;
use serde_json::json;
use std::sync::{Arc, Mutex};
use wirecore::{
    LogStream, NodeConfig, NodeContext, NodeError, NodeExecutor, WorkflowDefinition, WorkflowKind,
    WorkflowMessage,
};
use wireruntime::{FlowRuntime, InMemoryTransport, LuaScriptEngine, NodeRegistry};

type Sink = Arc<Mutex<Vec<(String, WorkflowMessage)>>>;

/// Terminal recorder wired downstream of the node under test.
struct Capture {
    sink: Sink,
}

#[async_trait]
impl NodeExecutor for Capture {
    fn node_type(&self) -> &str {
        "capture"
    }

    async fn execute(&self, msg: WorkflowMessage, ctx: NodeContext) -> Result<(), NodeError> {
        self.sink
            .lock()
            .unwrap()
            .push((ctx.node.id.clone(), msg));
        Ok(())
    }
}

fn runtime(sink: &Sink) -> FlowRuntime {
    let mut registry = NodeRegistry::new();
    wirenodes::register_all(
        &mut registry,
        Arc::new(LuaScriptEngine::new()),
        Arc::new(InMemoryTransport::new()),
    );
    registry.register(Arc::new(Capture { sink: sink.clone() }));
    FlowRuntime::new(Arc::new(registry))
}

fn captured(sink: &Sink) -> Vec<(String, WorkflowMessage)> {
    sink.lock().unwrap().clone()
}

fn filter_def(condition: &str) -> WorkflowDefinition {
    WorkflowDefinition::new("w", "w", WorkflowKind::Flow)
        .add_node(
            NodeConfig::new("check", "filter")
                .with_config("condition", condition)
                .with_wires(["matched"])
                .with_wires(["rest"]),
        )
        .add_node(NodeConfig::new("matched", "capture"))
        .add_node(NodeConfig::new("rest", "capture"))
}

#[tokio::test]
async fn filter_routes_matches_to_output_zero() {
    let sink: Sink = Arc::new(Mutex::new(Vec::new()));
    let runtime = runtime(&sink);
    let graph = runtime
        .load_workflow(&filter_def("msg.payload.value > 10"))
        .await
        .unwrap();

    runtime
        .run_node(graph.id(), "check", WorkflowMessage::with_payload(json!({"value": 42})))
        .await
        .unwrap();

    let got = captured(&sink);
    assert_eq!(got.len(), 1);
    assert_eq!(got[0].0, "matched");
    assert_eq!(got[0].1.payload, json!({"value": 42}));
}

#[tokio::test]
async fn filter_routes_non_matches_to_output_one() {
    let sink: Sink = Arc::new(Mutex::new(Vec::new()));
    let runtime = runtime(&sink);
    let graph = runtime
        .load_workflow(&filter_def("msg.payload.value > 10"))
        .await
        .unwrap();

    runtime
        .run_node(graph.id(), "check", WorkflowMessage::with_payload(json!({"value": 3})))
        .await
        .unwrap();

    let got = captured(&sink);
    assert_eq!(got.len(), 1);
    assert_eq!(got[0].0, "rest");
}

#[tokio::test]
async fn malformed_condition_forwards_nowhere_and_logs() {
    let sink: Sink = Arc::new(Mutex::new(Vec::new()));
    let runtime = runtime(&sink);
    let graph = runtime
        .load_workflow(&filter_def("msg.payload.value >>> 10"))
        .await
        .unwrap();

    runtime
        .run_node(graph.id(), "check", WorkflowMessage::with_payload(json!({"value": 3})))
        .await
        .unwrap();

    assert!(captured(&sink).is_empty());
    let debug = runtime.logs().records(LogStream::Debug);
    assert!(debug.iter().any(|r| r.message.contains("'check' failed")));
}

#[tokio::test]
async fn split_emits_elements_in_order() {
    let sink: Sink = Arc::new(Mutex::new(Vec::new()));
    let runtime = runtime(&sink);
    let def = WorkflowDefinition::new("w", "w", WorkflowKind::Flow)
        .add_node(NodeConfig::new("fan", "split").with_wires(["out"]))
        .add_node(NodeConfig::new("out", "capture"));
    let graph = runtime.load_workflow(&def).await.unwrap();

    runtime
        .run_node(
            graph.id(),
            "fan",
            WorkflowMessage::with_payload(json!(["a", "b", "c"])),
        )
        .await
        .unwrap();

    let payloads: Vec<_> = captured(&sink).into_iter().map(|(_, m)| m.payload).collect();
    assert_eq!(payloads, vec![json!("a"), json!("b"), json!("c")]);
}

#[tokio::test]
async fn split_passes_non_arrays_through() {
    let sink: Sink = Arc::new(Mutex::new(Vec::new()));
    let runtime = runtime(&sink);
    let def = WorkflowDefinition::new("w", "w", WorkflowKind::Flow)
        .add_node(NodeConfig::new("fan", "split").with_wires(["out"]))
        .add_node(NodeConfig::new("out", "capture"));
    let graph = runtime.load_workflow(&def).await.unwrap();

    runtime
        .run_node(graph.id(), "fan", WorkflowMessage::with_payload(json!({"solo": true})))
        .await
        .unwrap();

    let got = captured(&sink);
    assert_eq!(got.len(), 1);
    assert_eq!(got[0].1.payload, json!({"solo": true}));
}

#[tokio::test]
async fn inject_emits_its_configured_payload() {
    let sink: Sink = Arc::new(Mutex::new(Vec::new()));
    let runtime = runtime(&sink);
    let def = WorkflowDefinition::new("w", "w", WorkflowKind::Flow)
        .add_node(
            NodeConfig::new("in", "inject")
                .with_config("payload", json!({"seed": 7}))
                .with_wires(["out"]),
        )
        .add_node(NodeConfig::new("out", "capture"));
    runtime.load_workflow(&def).await.unwrap();

    // Entry-point driven: execute_workflow runs the inject node itself.
    runtime.execute_workflow("w").await.unwrap();
    runtime.execute_workflow("w").await.unwrap();

    let got = captured(&sink);
    assert_eq!(got.len(), 2);
    assert!(got.iter().all(|(_, m)| m.payload == json!({"seed": 7})));
}

#[tokio::test]
async fn debug_node_writes_payload_to_debug_stream() {
    let sink: Sink = Arc::new(Mutex::new(Vec::new()));
    let runtime = runtime(&sink);
    let def = WorkflowDefinition::new("w", "w", WorkflowKind::Flow)
        .add_node(
            NodeConfig::new("in", "inject")
                .with_config("payload", json!({"seen": true}))
                .with_wires(["sink"]),
        )
        .add_node(NodeConfig::new("sink", "debug"));
    runtime.load_workflow(&def).await.unwrap();
    runtime.execute_workflow("w").await.unwrap();

    let debug = runtime.logs().records(LogStream::Debug);
    assert!(debug.iter().any(|r| r.message.contains("\"seen\":true")));
    assert!(runtime.logs().records(LogStream::Info).is_empty());
}

#[tokio::test]
async fn filter_transform_flow_routes_high_values() {
    let sink: Sink = Arc::new(Mutex::new(Vec::new()));
    let runtime = runtime(&sink);
    let def = WorkflowDefinition::new("filter-transform", "Filter and transform", WorkflowKind::Flow)
        .add_node(
            NodeConfig::new("in", "inject")
                .with_config("payload", json!({"value": 42, "name": "test"}))
                .with_wires(["check"]),
        )
        .add_node(
            NodeConfig::new("check", "filter")
                .with_config("condition", "msg.payload.value > 10")
                .with_wires(["high"])
                .with_wires(["low"]),
        )
        .add_node(NodeConfig::new("high", "capture"))
        .add_node(NodeConfig::new("low", "capture"));
    runtime.load_workflow(&def).await.unwrap();
    runtime.execute_workflow("filter-transform").await.unwrap();

    let got = captured(&sink);
    assert_eq!(got.len(), 1);
    assert_eq!(got[0].0, "high");
    assert_eq!(got[0].1.payload, json!({"value": 42, "name": "test"}));
}

#[tokio::test]
async fn function_node_transforms_with_lua() {
    let sink: Sink = Arc::new(Mutex::new(Vec::new()));
    let runtime = runtime(&sink);
    let code = r#"
        local doubled = {}
        local sum = 0
        for i, n in ipairs(msg.payload.numbers) do
            doubled[i] = n * 2
            sum = sum + doubled[i]
        end
        log("processed " .. #doubled .. " numbers")
        return { doubled = doubled, sum = sum }
    "#;
    let def = WorkflowDefinition::new("w", "w", WorkflowKind::Flow)
        .add_node(
            NodeConfig::new("in", "inject")
                .with_config("payload", json!({"numbers": [1, 2, 3, 4, 5]}))
                .with_wires(["transform"]),
        )
        .add_node(
            NodeConfig::new("transform", "function")
                .with_config("code", code)
                .with_wires(["out"]),
        )
        .add_node(NodeConfig::new("out", "capture"));
    runtime.load_workflow(&def).await.unwrap();
    runtime.execute_workflow("w").await.unwrap();

    let got = captured(&sink);
    assert_eq!(got.len(), 1);
    assert_eq!(
        got[0].1.payload,
        json!({"doubled": [2, 4, 6, 8, 10], "sum": 30})
    );

    // The script's log() binding lands on the info stream.
    let info = runtime.logs().records(LogStream::Info);
    assert!(info.iter().any(|r| r.message.contains("processed 5 numbers")));
}

#[tokio::test]
async fn function_returning_nothing_ends_the_branch() {
    let sink: Sink = Arc::new(Mutex::new(Vec::new()));
    let runtime = runtime(&sink);
    let def = WorkflowDefinition::new("w", "w", WorkflowKind::Flow)
        .add_node(
            NodeConfig::new("in", "inject")
                .with_config("payload", json!(1))
                .with_wires(["drop"]),
        )
        .add_node(
            NodeConfig::new("drop", "function")
                .with_config("code", "return nil")
                .with_wires(["out"]),
        )
        .add_node(NodeConfig::new("out", "capture"));
    runtime.load_workflow(&def).await.unwrap();
    runtime.execute_workflow("w").await.unwrap();

    assert!(captured(&sink).is_empty());
}

#[tokio::test]
async fn missing_node_config_fails_at_load_time() {
    let sink: Sink = Arc::new(Mutex::new(Vec::new()));
    let runtime = runtime(&sink);
    let def = WorkflowDefinition::new("w", "w", WorkflowKind::Flow)
        .add_node(NodeConfig::new("check", "filter"));

    assert!(runtime.load_workflow(&def).await.is_err());
}
