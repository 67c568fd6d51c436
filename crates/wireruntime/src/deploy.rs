use crate::graph::FlowGraph;
use crate::mqtt::MqttTransport;
use crate::runtime::FlowRuntime;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use wirecore::{TransportError, ValidationError, WorkflowDefinition, WorkflowMessage};

/// Live HTTP trigger bindings: hook path → entry node id. The server's
/// catch-all hook handler dispatches against this table.
#[derive(Default)]
pub struct RouteTable {
    routes: RwLock<HashMap<String, String>>,
}

impl RouteTable {
    pub fn contains(&self, path: &str) -> bool {
        self.routes.read().expect("route table poisoned").contains_key(path)
    }

    pub fn node_for(&self, path: &str) -> Option<String> {
        self.routes.read().expect("route table poisoned").get(path).cloned()
    }

    pub fn paths(&self) -> Vec<String> {
        self.routes.read().expect("route table poisoned").keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.routes.read().expect("route table poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn insert(&self, path: &str, node_id: &str) {
        self.routes
            .write()
            .expect("route table poisoned")
            .insert(path.to_string(), node_id.to_string());
    }

    fn remove(&self, path: &str) {
        self.routes.write().expect("route table poisoned").remove(path);
    }
}

/// The listeners one deployment created, plus the lifecycle handles to tear
/// them down exactly.
struct Deployment {
    graph: Arc<FlowGraph>,
    http_paths: Vec<String>,
    mqtt_topics: Vec<String>,
    cancel: CancellationToken,
    tracker: TaskTracker,
}

/// Owns the mapping from a deployed workflow's trigger nodes to live external
/// listeners. At most one workflow is deployed at a time; deploying a new one
/// implicitly undeploys the previous. Deploy and undeploy serialize on one
/// async mutex so they can never race each other.
pub struct DeployManager {
    runtime: Arc<FlowRuntime>,
    mqtt: Arc<dyn MqttTransport>,
    routes: Arc<RouteTable>,
    current: tokio::sync::Mutex<Option<Deployment>>,
}

impl DeployManager {
    pub fn new(runtime: Arc<FlowRuntime>, mqtt: Arc<dyn MqttTransport>) -> Self {
        Self {
            runtime,
            mqtt,
            routes: Arc::new(RouteTable::default()),
            current: tokio::sync::Mutex::new(None),
        }
    }

    pub fn routes(&self) -> &Arc<RouteTable> {
        &self.routes
    }

    /// Total live listeners (HTTP routes + MQTT subscriptions). After a
    /// deploy/undeploy cycle this must equal its pre-deploy value.
    pub fn listener_count(&self) -> usize {
        self.routes.len() + self.mqtt.subscription_count()
    }

    pub async fn deployed_workflow(&self) -> Option<String> {
        self.current
            .lock()
            .await
            .as_ref()
            .map(|d| d.graph.id().to_string())
    }

    /// Validate, load, and deploy a workflow: every trigger-capable node gets
    /// a live listener. Binding is all-or-nothing — any failure rolls back
    /// the listeners bound so far and leaves nothing deployed.
    pub async fn deploy(&self, def: &WorkflowDefinition) -> wirecore::Result<()> {
        let graph = self.runtime.load_workflow(def).await?;
        graph.ensure_acyclic()?;

        let mut current = self.current.lock().await;
        if let Some(previous) = current.take() {
            self.teardown(previous).await;
        }

        let cancel = CancellationToken::new();
        let tracker = TaskTracker::new();
        let mut http_paths: Vec<String> = Vec::new();
        let mut mqtt_topics: Vec<String> = Vec::new();

        for node in graph.nodes() {
            match node.node_type.as_str() {
                "trigger" => {
                    let Some(path) = node.config_str("path") else {
                        continue; // manual trigger, no HTTP binding
                    };
                    if self.routes.contains(path) {
                        let conflict = TransportError::RouteConflict(path.to_string());
                        self.rollback(&http_paths, &mqtt_topics).await;
                        return Err(conflict.into());
                    }
                    self.routes.insert(path, &node.id);
                    http_paths.push(path.to_string());
                    tracing::info!(path, node = %node.id, "bound http trigger");
                }
                "mqtt-in" => {
                    let Some(topic) = node.config_str("topic") else {
                        let invalid = ValidationError::InvalidNodeConfig {
                            node: node.id.clone(),
                            reason: "mqtt-in requires config 'topic'".to_string(),
                        };
                        self.rollback(&http_paths, &mqtt_topics).await;
                        return Err(invalid.into());
                    };
                    let receiver = match self.mqtt.subscribe(topic).await {
                        Ok(receiver) => receiver,
                        Err(e) => {
                            self.rollback(&http_paths, &mqtt_topics).await;
                            return Err(e.into());
                        }
                    };
                    mqtt_topics.push(topic.to_string());
                    tracing::info!(topic, node = %node.id, "bound mqtt trigger");

                    let runtime = self.runtime.clone();
                    let graph = graph.clone();
                    let node_id = node.id.clone();
                    let cancel = cancel.clone();
                    let mut receiver = receiver;
                    tracker.spawn(async move {
                        loop {
                            tokio::select! {
                                _ = cancel.cancelled() => break,
                                publish = receiver.recv() => {
                                    let Some(publish) = publish else { break };
                                    let payload = decode_payload(&publish.payload);
                                    let msg = WorkflowMessage::with_payload(payload)
                                        .with_metadata("topic", publish.topic.clone());
                                    if let Err(e) = runtime
                                        .run_graph(&graph, &node_id, msg, cancel.child_token())
                                        .await
                                    {
                                        tracing::warn!(node = %node_id, "mqtt-triggered run failed: {}", e);
                                    }
                                }
                            }
                        }
                    });
                }
                _ => {}
            }
        }

        tracing::info!(
            workflow = graph.id(),
            http = http_paths.len(),
            mqtt = mqtt_topics.len(),
            "workflow deployed"
        );
        *current = Some(Deployment {
            graph,
            http_paths,
            mqtt_topics,
            cancel,
            tracker,
        });
        Ok(())
    }

    /// Remove exactly the listeners the current deployment created. A no-op
    /// when nothing is deployed.
    pub async fn undeploy(&self) -> wirecore::Result<()> {
        let mut current = self.current.lock().await;
        if let Some(deployment) = current.take() {
            let workflow = deployment.graph.id().to_string();
            self.teardown(deployment).await;
            tracing::info!(workflow, "workflow undeployed");
        }
        Ok(())
    }

    /// Ad hoc single-node execution without a deploy: validates the
    /// definition, then runs one propagation starting at `node_id`.
    pub async fn inject(&self, def: &WorkflowDefinition, node_id: &str) -> wirecore::Result<()> {
        let graph = Arc::new(FlowGraph::compile(def, self.runtime.registry())?);
        if graph.node(node_id).is_none() {
            return Err(ValidationError::UnknownNode(node_id.to_string()).into());
        }
        self.runtime
            .run_graph(
                &graph,
                node_id,
                WorkflowMessage::empty(),
                CancellationToken::new(),
            )
            .await
    }

    /// Dispatch an inbound HTTP trigger event into the deployed graph.
    pub async fn handle_http_trigger(&self, path: &str, payload: Value) -> wirecore::Result<()> {
        let node_id = self
            .routes
            .node_for(path)
            .ok_or_else(|| TransportError::RouteNotFound(path.to_string()))?;

        let (graph, cancel) = {
            let current = self.current.lock().await;
            let Some(deployment) = current.as_ref() else {
                return Err(TransportError::RouteNotFound(path.to_string()).into());
            };
            (deployment.graph.clone(), deployment.cancel.child_token())
        };

        let msg = WorkflowMessage::with_payload(payload).with_metadata("path", path);
        self.runtime.run_graph(&graph, &node_id, msg, cancel).await
    }

    async fn teardown(&self, deployment: Deployment) {
        deployment.cancel.cancel();
        deployment.tracker.close();
        self.rollback(&deployment.http_paths, &deployment.mqtt_topics)
            .await;
        deployment.tracker.wait().await;
    }

    async fn rollback(&self, http_paths: &[String], mqtt_topics: &[String]) {
        for path in http_paths {
            self.routes.remove(path);
        }
        for topic in mqtt_topics {
            if let Err(e) = self.mqtt.unsubscribe(topic).await {
                tracing::warn!(topic, "unsubscribe failed during teardown: {}", e);
            }
        }
    }
}

fn decode_payload(bytes: &[u8]) -> Value {
    match serde_json::from_slice::<Value>(bytes) {
        Ok(value) => value,
        Err(_) => Value::String(String::from_utf8_lossy(bytes).into_owned()),
    }
}
