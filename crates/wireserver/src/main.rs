use actix_cors::Cors;
use actix_web::{
    delete, get, post, web, App, HttpResponse, HttpServer, Responder, Result as ActixResult,
};
use actix_ws::Message;
use serde::Serialize;
use serde_json::json;
use std::sync::Arc;
use tracing::{error, info};
use wirecore::{CodeWorkflow, EngineError, LogStream, Step, StepCtx, WorkflowDefinition};
use wireruntime::{
    DeployManager, FlowRuntime, InMemoryTransport, LuaScriptEngine, MqttTransport, NodeRegistry,
    RumqttcTransport, RuntimeConfig,
};

/// Application state shared across handlers
struct AppState {
    runtime: Arc<FlowRuntime>,
    deploy: Arc<DeployManager>,
}

#[derive(Debug, Serialize)]
struct ErrorResponse {
    error: String,
}

fn engine_error(e: EngineError) -> HttpResponse {
    let body = ErrorResponse {
        error: e.to_string(),
    };
    match e {
        EngineError::Validation(_) => HttpResponse::BadRequest().json(body),
        EngineError::Transport(_) => HttpResponse::Conflict().json(body),
        _ => HttpResponse::InternalServerError().json(body),
    }
}

/// Health check endpoint
#[get("/health")]
async fn health_check(data: web::Data<AppState>) -> impl Responder {
    HttpResponse::Ok().json(serde_json::json!({
        "status": "healthy",
        "version": env!("CARGO_PKG_VERSION"),
        "service": "wireflow",
        "listeners": data.deploy.listener_count(),
    }))
}

/// List loaded workflows
#[get("/api/workflows")]
async fn list_workflows(data: web::Data<AppState>) -> ActixResult<impl Responder> {
    let deployed = data.deploy.deployed_workflow().await;
    let workflows: Vec<_> = data
        .runtime
        .workflows()
        .await
        .iter()
        .map(|g| {
            serde_json::json!({
                "id": g.id(),
                "name": g.name(),
                "type": g.kind(),
                "nodes": g.nodes().count(),
                "deployed": deployed.as_deref() == Some(g.id()),
            })
        })
        .collect();
    Ok(HttpResponse::Ok().json(workflows))
}

/// Load (or replace) a workflow definition
#[post("/api/workflows")]
async fn load_workflow(
    data: web::Data<AppState>,
    def: web::Json<WorkflowDefinition>,
) -> ActixResult<impl Responder> {
    let def = def.into_inner();
    info!("loading workflow: {} ({})", def.name, def.id);

    match data.runtime.load_workflow(&def).await {
        Ok(graph) => Ok(HttpResponse::Created().json(serde_json::json!({
            "id": graph.id(),
            "nodes": graph.nodes().count(),
        }))),
        Err(e) => Ok(engine_error(e)),
    }
}

/// Get a loaded workflow's node listing
#[get("/api/workflows/{id}")]
async fn get_workflow(
    data: web::Data<AppState>,
    path: web::Path<String>,
) -> ActixResult<impl Responder> {
    let id = path.into_inner();
    match data.runtime.workflow(&id).await {
        Some(graph) => {
            let nodes: Vec<_> = graph.nodes().map(|n| n.as_ref().clone()).collect();
            Ok(HttpResponse::Ok().json(serde_json::json!({
                "id": graph.id(),
                "name": graph.name(),
                "type": graph.kind(),
                "nodes": nodes,
            })))
        }
        None => Ok(HttpResponse::NotFound().json(ErrorResponse {
            error: format!("workflow {} not found", id),
        })),
    }
}

/// Unload a workflow
#[delete("/api/workflows/{id}")]
async fn delete_workflow(
    data: web::Data<AppState>,
    path: web::Path<String>,
) -> ActixResult<impl Responder> {
    let id = path.into_inner();
    if data.runtime.unload_workflow(&id).await {
        info!("unloaded workflow: {}", id);
        Ok(HttpResponse::Ok().json(serde_json::json!({"unloaded": id})))
    } else {
        Ok(HttpResponse::NotFound().json(ErrorResponse {
            error: format!("workflow {} not found", id),
        }))
    }
}

/// Run every entry node of a loaded workflow once
#[post("/api/workflows/{id}/execute")]
async fn execute_workflow(
    data: web::Data<AppState>,
    path: web::Path<String>,
) -> ActixResult<impl Responder> {
    let id = path.into_inner();
    info!("executing workflow: {}", id);
    match data.runtime.execute_workflow(&id).await {
        Ok(()) => Ok(HttpResponse::Ok().json(serde_json::json!({"executed": id}))),
        Err(e) => {
            error!("workflow {} execution failed: {}", id, e);
            Ok(engine_error(e))
        }
    }
}

/// Deploy a workflow: bind its trigger nodes to live listeners
#[post("/api/deploy")]
async fn deploy_workflow(
    data: web::Data<AppState>,
    def: web::Json<WorkflowDefinition>,
) -> ActixResult<impl Responder> {
    let def = def.into_inner();
    match data.deploy.deploy(&def).await {
        Ok(()) => Ok(HttpResponse::Ok().json(serde_json::json!({
            "deployed": def.id,
            "routes": data.deploy.routes().paths(),
        }))),
        Err(e) => {
            error!("deploy of {} failed: {}", def.id, e);
            Ok(engine_error(e))
        }
    }
}

/// Tear down the current deployment, if any
#[post("/api/undeploy")]
async fn undeploy_workflow(data: web::Data<AppState>) -> ActixResult<impl Responder> {
    match data.deploy.undeploy().await {
        Ok(()) => Ok(HttpResponse::Ok().json(serde_json::json!({"deployed": null}))),
        Err(e) => Ok(engine_error(e)),
    }
}

/// Ad hoc single-node run against a posted definition, without deploying
#[post("/api/inject/{node_id}")]
async fn inject_node(
    data: web::Data<AppState>,
    path: web::Path<String>,
    def: web::Json<WorkflowDefinition>,
) -> ActixResult<impl Responder> {
    let node_id = path.into_inner();
    match data.deploy.inject(&def.into_inner(), &node_id).await {
        Ok(()) => Ok(HttpResponse::Ok().json(serde_json::json!({"injected": node_id}))),
        Err(e) => Ok(engine_error(e)),
    }
}

/// Catch-all dispatch for deployed HTTP triggers
#[post("/api/hooks/{path:.*}")]
async fn hook_dispatch(
    data: web::Data<AppState>,
    path: web::Path<String>,
    body: web::Bytes,
) -> ActixResult<impl Responder> {
    let path = path.into_inner();
    let payload = serde_json::from_slice(&body)
        .unwrap_or_else(|_| serde_json::Value::String(String::from_utf8_lossy(&body).into_owned()));

    match data.deploy.handle_http_trigger(&path, payload).await {
        Ok(()) => Ok(HttpResponse::Ok().json(serde_json::json!({"triggered": path}))),
        Err(EngineError::Transport(e)) => Ok(HttpResponse::NotFound().json(ErrorResponse {
            error: e.to_string(),
        })),
        Err(e) => Ok(engine_error(e)),
    }
}

fn parse_stream(name: &str) -> Option<LogStream> {
    match name {
        "info" => Some(LogStream::Info),
        "debug" => Some(LogStream::Debug),
        _ => None,
    }
}

/// Read one log stream
#[get("/api/logs/{stream}")]
async fn get_logs(
    data: web::Data<AppState>,
    path: web::Path<String>,
) -> ActixResult<impl Responder> {
    let name = path.into_inner();
    match parse_stream(&name) {
        Some(stream) => Ok(HttpResponse::Ok().json(data.runtime.logs().records(stream))),
        None => Ok(HttpResponse::NotFound().json(ErrorResponse {
            error: format!("unknown log stream: {}", name),
        })),
    }
}

/// Clear one log stream
#[delete("/api/logs/{stream}")]
async fn clear_logs(
    data: web::Data<AppState>,
    path: web::Path<String>,
) -> ActixResult<impl Responder> {
    let name = path.into_inner();
    match parse_stream(&name) {
        Some(stream) => {
            data.runtime.logs().clear(stream);
            Ok(HttpResponse::Ok().json(serde_json::json!({"cleared": name})))
        }
        None => Ok(HttpResponse::NotFound().json(ErrorResponse {
            error: format!("unknown log stream: {}", name),
        })),
    }
}

/// WebSocket endpoint tailing both log streams live
#[get("/api/logs")]
async fn websocket_logs(
    req: actix_web::HttpRequest,
    stream: web::Payload,
    data: web::Data<AppState>,
) -> ActixResult<HttpResponse> {
    let (res, mut session, mut msg_stream) = actix_ws::handle(&req, stream)?;

    info!("log stream client connected");
    let mut events = data.runtime.logs().subscribe();

    actix_web::rt::spawn(async move {
        loop {
            tokio::select! {
                event = events.recv() => {
                    match event {
                        Ok(event) => {
                            if let Ok(json) = serde_json::to_string(&event) {
                                if session.text(json).await.is_err() {
                                    break;
                                }
                            }
                        }
                        Err(_) => break,
                    }
                }

                Some(Ok(msg)) = msg_stream.recv() => {
                    match msg {
                        Message::Ping(bytes) => {
                            if session.pong(&bytes).await.is_err() {
                                break;
                            }
                        }
                        Message::Close(_) => break,
                        _ => {}
                    }
                }

                else => break,
            }
        }

        info!("log stream client disconnected");
        let _ = session.close(None).await;
    });

    Ok(res)
}

/// List registered node types
#[get("/api/nodes")]
async fn list_node_types(data: web::Data<AppState>) -> ActixResult<impl Responder> {
    Ok(HttpResponse::Ok().json(data.runtime.registry().node_types()))
}

/// Code workflows are built in Rust rather than deserialized; register them
/// here. Any marked `auto_start` run once at boot with an empty context.
fn code_workflows() -> Vec<CodeWorkflow> {
    vec![CodeWorkflow::new("startup-selfcheck", "Startup self-check")
        .with_step(Step::task("stamp", |mut ctx: StepCtx| async move {
            ctx.insert("started_at".to_string(), json!(chrono::Utc::now().to_rfc3339()));
            Ok(ctx)
        }))
        .with_step(Step::condition(
            "verify",
            |ctx: &StepCtx| Ok(ctx.contains_key("started_at")),
            vec![],
            Some(vec![Step::task("fail", |_| async move {
                Err("startup context missing stamp".to_string())
            })]),
        ))
        .auto_start(true)]
}

async fn run_auto_start(runtime: &FlowRuntime) {
    for workflow in code_workflows() {
        if !workflow.auto_start {
            continue;
        }
        match runtime.execute_code_workflow(&workflow, StepCtx::new()).await {
            Ok(_) => info!("auto-start workflow '{}' completed", workflow.id),
            Err(e) => error!("auto-start workflow '{}' failed: {}", workflow.id, e),
        }
    }
}

/// `MQTT_URL=host:port` selects the real broker transport; unset, the
/// loopback transport keeps mqtt-out/mqtt-in functional without a broker.
fn mqtt_transport() -> Arc<dyn MqttTransport> {
    match std::env::var("MQTT_URL") {
        Ok(url) => {
            let (host, port) = match url.rsplit_once(':') {
                Some((host, port)) => (host.to_string(), port.parse().unwrap_or(1883)),
                None => (url, 1883),
            };
            info!("connecting to mqtt broker at {}:{}", host, port);
            Arc::new(RumqttcTransport::connect("wireflow-server", &host, port))
        }
        Err(_) => {
            info!("MQTT_URL not set, using in-memory mqtt transport");
            Arc::new(InMemoryTransport::new())
        }
    }
}

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    info!("🚀 Starting wireflow server");

    let script = Arc::new(LuaScriptEngine::new());
    let mqtt = mqtt_transport();
    let mut registry = NodeRegistry::new();
    wirenodes::register_all(&mut registry, script, mqtt.clone());

    let runtime = Arc::new(FlowRuntime::with_config(
        Arc::new(registry),
        RuntimeConfig::default(),
    ));
    let deploy = Arc::new(DeployManager::new(runtime.clone(), mqtt));

    info!("✅ Runtime initialized with standard nodes");
    run_auto_start(&runtime).await;

    let app_state = web::Data::new(AppState { runtime, deploy });

    let bind_address =
        std::env::var("BIND_ADDRESS").unwrap_or_else(|_| "0.0.0.0:3000".to_string());
    info!("🌐 Server starting on http://{}", bind_address);

    HttpServer::new(move || {
        let cors = Cors::default()
            .allow_any_origin()
            .allow_any_method()
            .allow_any_header()
            .max_age(3600);

        App::new()
            .app_data(app_state.clone())
            .wrap(cors)
            .wrap(actix_web::middleware::Logger::default())
            .service(health_check)
            .service(list_workflows)
            .service(load_workflow)
            .service(get_workflow)
            .service(delete_workflow)
            .service(execute_workflow)
            .service(deploy_workflow)
            .service(undeploy_workflow)
            .service(inject_node)
            .service(hook_dispatch)
            .service(websocket_logs)
            .service(get_logs)
            .service(clear_logs)
            .service(list_node_types)
    })
    .bind(&bind_address)?
    .run()
    .await?;

    Ok(())
}
