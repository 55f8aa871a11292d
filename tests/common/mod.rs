//! Shared utilities for integration tests.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::{json, Value};
use tokio::net::TcpListener;

use batch_router::config::{InstanceConfig, RouterConfig};
use batch_router::lifecycle::{self, Services, Shutdown};
use batch_router::HttpServer;

/// Knobs of one mock backend, flipped by tests while it runs.
#[derive(Debug)]
pub struct MockState {
    pub port: u16,
    pub healthy: AtomicBool,
    pub engine_ready: AtomicBool,
    pub fail_infer: AtomicBool,
    pub delay_ms: AtomicU64,
    pub responses_key: AtomicBool,
    pub infer_calls: AtomicU32,
    pub items_seen: AtomicU32,
    pub last_request: std::sync::Mutex<Option<Value>>,
}

pub struct MockBackend {
    pub addr: SocketAddr,
    pub state: Arc<MockState>,
}

impl MockBackend {
    pub fn set_healthy(&self, healthy: bool) {
        self.state.healthy.store(healthy, Ordering::SeqCst);
    }

    pub fn set_failing(&self, failing: bool) {
        self.state.fail_infer.store(failing, Ordering::SeqCst);
    }

    pub fn set_delay(&self, delay: Duration) {
        self.state.delay_ms.store(delay.as_millis() as u64, Ordering::SeqCst);
    }

    pub fn infer_calls(&self) -> u32 {
        self.state.infer_calls.load(Ordering::SeqCst)
    }

    pub fn items_seen(&self) -> u32 {
        self.state.items_seen.load(Ordering::SeqCst)
    }

    pub fn last_request(&self) -> Option<Value> {
        self.state.last_request.lock().unwrap().clone()
    }
}

/// The value a mock backend returns for `item`.
pub fn echoed(port: u16, item: &Value) -> Value {
    json!({ "port": port, "item": item })
}

/// Start an inference backend on an ephemeral port.
pub async fn start_mock_backend() -> MockBackend {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let state = Arc::new(MockState {
        port: addr.port(),
        healthy: AtomicBool::new(true),
        engine_ready: AtomicBool::new(true),
        fail_infer: AtomicBool::new(false),
        delay_ms: AtomicU64::new(0),
        responses_key: AtomicBool::new(false),
        infer_calls: AtomicU32::new(0),
        items_seen: AtomicU32::new(0),
        last_request: std::sync::Mutex::new(None),
    });

    let app = Router::new()
        .route("/health", get(health))
        .route("/infer", post(infer))
        .with_state(state.clone());

    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });

    MockBackend { addr, state }
}

pub async fn start_mock_backends(n: usize) -> Vec<MockBackend> {
    let mut backends = Vec::with_capacity(n);
    for _ in 0..n {
        backends.push(start_mock_backend().await);
    }
    backends
}

async fn health(State(state): State<Arc<MockState>>) -> (StatusCode, Json<Value>) {
    if !state.healthy.load(Ordering::SeqCst) {
        return (StatusCode::SERVICE_UNAVAILABLE, Json(json!({ "status": "down" })));
    }
    let ready = state.engine_ready.load(Ordering::SeqCst);
    (StatusCode::OK, Json(json!({ "status": "ok", "engine_ready": ready })))
}

async fn infer(
    State(state): State<Arc<MockState>>,
    Json(body): Json<Value>,
) -> (StatusCode, Json<Value>) {
    state.infer_calls.fetch_add(1, Ordering::SeqCst);
    *state.last_request.lock().unwrap() = Some(body.clone());

    let delay = state.delay_ms.load(Ordering::SeqCst);
    if delay > 0 {
        tokio::time::sleep(Duration::from_millis(delay)).await;
    }
    if state.fail_infer.load(Ordering::SeqCst) {
        return (StatusCode::INTERNAL_SERVER_ERROR, Json(json!({ "error": "engine crashed" })));
    }

    let items = body["items"].as_array().cloned().unwrap_or_default();
    state.items_seen.fetch_add(items.len() as u32, Ordering::SeqCst);
    let results: Vec<Value> = items.iter().map(|i| echoed(state.port, i)).collect();
    let key = if state.responses_key.load(Ordering::SeqCst) {
        "responses"
    } else {
        "results"
    };
    let mut body = serde_json::Map::new();
    body.insert(key.to_string(), Value::Array(results));
    (StatusCode::OK, Json(Value::Object(body)))
}

/// Router config pointing at `backends`, with fast timeouts and no
/// metrics exporter.
pub fn router_config(backends: &[MockBackend]) -> RouterConfig {
    let mut config = RouterConfig::default();
    config.listener.bind_address = "127.0.0.1:0".into();
    config.instances = backends
        .iter()
        .map(|b| InstanceConfig::new(b.addr.to_string()))
        .collect();
    config.health_check.timeout_ms = 500;
    config.timeouts.inference_secs = 2;
    config.observability.metrics_enabled = false;
    config
}

pub struct TestRouter {
    pub addr: SocketAddr,
    pub services: Services,
    pub shutdown: Shutdown,
    pub client: reqwest::Client,
}

impl TestRouter {
    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }

    pub async fn infer(&self, body: Value) -> reqwest::Response {
        self.client
            .post(self.url("/inference"))
            .json(&body)
            .send()
            .await
            .expect("router unreachable")
    }

    pub async fn get_json(&self, path: &str) -> (u16, Value) {
        let res = self.client.get(self.url(path)).send().await.expect("router unreachable");
        let status = res.status().as_u16();
        (status, res.json().await.unwrap())
    }
}

/// Start the router HTTP server in-process, after one probe round.
pub async fn start_router(config: RouterConfig) -> TestRouter {
    let services = lifecycle::build_services(&config).unwrap();
    lifecycle::initial_probe(&services).await;

    let listener = TcpListener::bind(&config.listener.bind_address).await.unwrap();
    let addr = listener.local_addr().unwrap();
    let shutdown = Shutdown::new();
    let server = HttpServer::new(&config, services.router.clone());
    let rx = shutdown.subscribe();
    tokio::spawn(async move {
        let _ = server.run(listener, rx).await;
    });

    let client = reqwest::Client::builder().no_proxy().build().unwrap();
    TestRouter {
        addr,
        services,
        shutdown,
        client,
    }
}
