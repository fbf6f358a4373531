//! End-to-end tests against a real listener: HTTP via `reqwest`, the push
//! channel via `tokio-tungstenite`.

use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use assert_matches::assert_matches;
use cadre_advisory::AdvisoryBridge;
use cadre_coordinator::Coordinator;
use cadre_server::config::ServerConfig;
use cadre_server::rpc::context::RpcContext;
use cadre_server::rpc::handlers::register_all;
use cadre_server::rpc::registry::MethodRegistry;
use cadre_server::server::CadreServer;
use cadre_settings::LivenessSettings;
use cadre_store::{KvStore, KvWrite, MemoryKvStore, StoreError};
use futures::{SinkExt, StreamExt};
use serde_json::{Value, json};
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;

const TIMEOUT: Duration = Duration::from_secs(5);

type WsStream =
    tokio_tungstenite::WebSocketStream<tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>>;

struct TestServer {
    addr: SocketAddr,
    server: CadreServer,
    coordinator: Arc<Coordinator>,
    handle: JoinHandle<()>,
    http: reqwest::Client,
}

impl TestServer {
    fn url(&self, path: &str) -> String {
        format!("http://{}{path}", self.addr)
    }

    fn ws_url(&self) -> String {
        format!("ws://{}/ws", self.addr)
    }

    async fn post(&self, path: &str, body: Value) -> (reqwest::StatusCode, Value) {
        let resp = self.http.post(self.url(path)).json(&body).send().await.unwrap();
        let status = resp.status();
        (status, resp.json().await.unwrap_or(Value::Null))
    }

    async fn get(&self, path: &str) -> (reqwest::StatusCode, Value) {
        let resp = self.http.get(self.url(path)).send().await.unwrap();
        let status = resp.status();
        (status, resp.json().await.unwrap_or(Value::Null))
    }
}

async fn boot_with(store: Arc<dyn KvStore>, config: ServerConfig) -> TestServer {
    let coordinator = Arc::new(
        Coordinator::load(store, AdvisoryBridge::disabled(), LivenessSettings::default()).unwrap(),
    );
    let mut registry = MethodRegistry::new();
    register_all(&mut registry);
    let server = CadreServer::new(config, registry, RpcContext::new(coordinator.clone()));
    let (addr, handle) = server.listen().await.unwrap();
    TestServer {
        addr,
        server,
        coordinator,
        handle,
        http: reqwest::Client::new(),
    }
}

async fn boot() -> TestServer {
    boot_with(Arc::new(MemoryKvStore::new()), ServerConfig::default()).await
}

/// Next text frame as JSON, skipping control frames.
async fn next_json(ws: &mut WsStream) -> Value {
    loop {
        let msg = timeout(TIMEOUT, ws.next())
            .await
            .expect("timed out waiting for frame")
            .expect("stream ended")
            .expect("websocket error");
        if let Message::Text(text) = msg {
            return serde_json::from_str(text.as_str()).unwrap();
        }
    }
}

/// Connect an observer and consume `connection.established`.
async fn observe(server: &TestServer) -> WsStream {
    let (mut ws, _) = connect_async(server.ws_url()).await.unwrap();
    let hello = next_json(&mut ws).await;
    assert_eq!(hello["type"], "connection.established");
    assert!(hello["payload"]["connectionId"].as_str().unwrap().starts_with("conn-"));
    ws
}

async fn wait_for_connections(server: &TestServer, expected: usize) {
    for _ in 0..100 {
        if server.server.broadcast().connection_count().await == expected {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("expected {expected} observers");
}

fn register_body(id: &str, capacity: u32) -> Value {
    json!({"sessionId": id, "kind": "claude", "capabilities": {"maxConcurrentTasks": capacity}})
}

#[tokio::test]
async fn scenario_with_observer() {
    let server = boot().await;
    let mut ws = observe(&server).await;
    wait_for_connections(&server, 1).await;

    let (status, body) = server.post("/session/register", register_body("A", 2)).await;
    assert_eq!(status, 200);
    assert_eq!(body["session"]["status"], "active");
    let event = next_json(&mut ws).await;
    assert_eq!(event["type"], "session_registered");
    assert_eq!(event["payload"]["session"]["id"], "A");

    let _ = server.post("/session/register", register_body("B", 1)).await;
    let _ = next_json(&mut ws).await;

    let (status, _) = server
        .post(
            "/sync",
            json!({"tasks": [{"id": "t1", "priority": "high"}, {"id": "t2", "dependencies": ["t1"]}]}),
        )
        .await;
    assert_eq!(status, 200);
    let event = next_json(&mut ws).await;
    assert_eq!(event["type"], "state_update");
    assert_eq!(event["payload"]["sync"]["tasks"], 2);
    let event = next_json(&mut ws).await;
    assert_eq!(event["type"], "state_update");
    assert_eq!(event["payload"]["taskId"], "t1");

    let (_, claimed) = server.post("/task/claim", json!({"sessionId": "A", "taskId": "t1"})).await;
    assert_eq!(claimed["success"], true);
    let event = next_json(&mut ws).await;
    assert_eq!(event["type"], "task_claimed");
    assert_eq!(event["payload"]["sessionId"], "A");

    let (_, lost) = server.post("/task/claim", json!({"sessionId": "B", "taskId": "t1"})).await;
    assert_eq!(lost["success"], false);

    let (_, done) = server
        .post("/task/complete", json!({"sessionId": "A", "taskId": "t1", "result": {"lines": 3}}))
        .await;
    assert_eq!(done["success"], true);
    let event = next_json(&mut ws).await;
    assert_eq!(event["type"], "task_completed");
    assert_eq!(event["payload"]["result"]["lines"], 3);
    let event = next_json(&mut ws).await;
    assert_eq!(event["type"], "state_update");
    assert_eq!(event["payload"]["taskId"], "t2");
    assert_eq!(event["payload"]["status"], "pending");

    let (_, claimed) = server.post("/task/claim", json!({"sessionId": "B", "taskId": "t2"})).await;
    assert_eq!(claimed["success"], true);

    let (_, status) = server.get("/status").await;
    assert_eq!(status["activeSessions"], 2);
    assert_eq!(status["taskStats"]["completed"], 1);
    assert_eq!(status["taskStats"]["claimed"], 1);
}

#[tokio::test]
async fn requests_over_websocket() {
    let server = boot().await;
    let mut ws = observe(&server).await;

    let request = json!({
        "id": "r1",
        "method": "session.register",
        "params": register_body("A", 1),
    });
    ws.send(Message::Text(request.to_string().into())).await.unwrap();

    // The response and the session_registered event can arrive in either order.
    let mut response = None;
    let mut event = None;
    for _ in 0..2 {
        let frame = next_json(&mut ws).await;
        if frame.get("id").is_some() {
            response = Some(frame);
        } else {
            event = Some(frame);
        }
    }
    let response = response.unwrap();
    assert_eq!(response["id"], "r1");
    assert_eq!(response["success"], true);
    assert_eq!(response["result"]["session"]["id"], "A");
    assert_eq!(event.unwrap()["type"], "session_registered");

    ws.send(Message::Text(r#"{"id":"r2","method":"no.such"}"#.into())).await.unwrap();
    let response = next_json(&mut ws).await;
    assert_eq!(response["success"], false);
    assert_eq!(response["error"]["code"], "METHOD_NOT_FOUND");
}

#[tokio::test]
async fn every_observer_receives_each_event() {
    let server = boot().await;
    let mut first = observe(&server).await;
    let mut second = observe(&server).await;
    wait_for_connections(&server, 2).await;

    let _ = server.post("/session/register", register_body("A", 1)).await;
    for ws in [&mut first, &mut second] {
        assert_eq!(next_json(ws).await["type"], "session_registered");
    }
}

#[tokio::test]
async fn disconnected_observer_leaves_fan_out() {
    let server = boot().await;
    let ws = observe(&server).await;
    wait_for_connections(&server, 1).await;
    drop(ws);
    wait_for_connections(&server, 0).await;

    let (status, _) = server.post("/session/register", register_body("A", 1)).await;
    assert_eq!(status, 200);
}

#[tokio::test]
async fn reclamation_is_pushed_and_visible_in_status() {
    let server = boot().await;
    let _ = server.post("/session/register", register_body("A", 1)).await;
    let _ = server.post("/sync", json!({"tasks": [{"id": "t1"}]})).await;
    let _ = server.post("/task/claim", json!({"sessionId": "A", "taskId": "t1"})).await;

    let mut ws = observe(&server).await;
    wait_for_connections(&server, 1).await;

    let later = chrono::Utc::now() + chrono::Duration::seconds(301);
    let report = server.coordinator.sweep_at(later).await.unwrap();
    assert_eq!(report.reclaimed.len(), 1);

    let mut saw_reclaim = false;
    for _ in 0..2 {
        let event = next_json(&mut ws).await;
        if event["type"] == "task_reclaimed" {
            assert_eq!(event["payload"]["taskId"], "t1");
            assert_eq!(event["payload"]["previousOwner"], "A");
            saw_reclaim = true;
        }
    }
    assert!(saw_reclaim);

    let (_, task) = server.get("/task/t1").await;
    assert_eq!(task["status"], "pending");
    assert!(task.get("owner").is_none());
    let (_, health) = server.get("/health").await;
    assert_eq!(health["activeSessions"], 0);
}

#[tokio::test]
async fn observer_limit_is_enforced() {
    let config = ServerConfig {
        max_connections: 1,
        ..ServerConfig::default()
    };
    let server = boot_with(Arc::new(MemoryKvStore::new()), config).await;
    let _first = observe(&server).await;
    wait_for_connections(&server, 1).await;

    let err = connect_async(server.ws_url()).await.unwrap_err();
    assert_matches!(
        err,
        tokio_tungstenite::tungstenite::Error::Http(resp) if resp.status() == 503
    );
}

struct FailingStore {
    inner: MemoryKvStore,
    failing: AtomicBool,
}

impl KvStore for FailingStore {
    fn get(&self, key: &str) -> cadre_store::Result<Option<Value>> {
        self.inner.get(key)
    }

    fn list_prefix(&self, prefix: &str) -> cadre_store::Result<Vec<(String, Value)>> {
        self.inner.list_prefix(prefix)
    }

    fn delete(&self, key: &str) -> cadre_store::Result<bool> {
        self.inner.delete(key)
    }

    fn write_batch(&self, writes: Vec<KvWrite>) -> cadre_store::Result<()> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("disk full at /var/lib/cadre".into()));
        }
        self.inner.write_batch(writes)
    }
}

#[tokio::test]
async fn storage_failure_is_503_and_nothing_is_applied() {
    let store = Arc::new(FailingStore {
        inner: MemoryKvStore::new(),
        failing: AtomicBool::new(false),
    });
    let server = boot_with(store.clone(), ServerConfig::default()).await;
    let _ = server.post("/session/register", register_body("A", 1)).await;
    let _ = server.post("/sync", json!({"tasks": [{"id": "t1"}]})).await;

    store.failing.store(true, Ordering::SeqCst);
    let (status, body) = server.post("/task/claim", json!({"sessionId": "A", "taskId": "t1"})).await;
    assert_eq!(status, 503);
    assert_eq!(body["error"]["code"], "STORAGE_ERROR");
    assert!(!body["error"]["message"].as_str().unwrap().contains("/var/lib"));

    let (_, task) = server.get("/task/t1").await;
    assert_eq!(task["status"], "pending");

    store.failing.store(false, Ordering::SeqCst);
    let (_, body) = server.post("/task/claim", json!({"sessionId": "A", "taskId": "t1"})).await;
    assert_eq!(body["success"], true);
}

#[tokio::test]
async fn shutdown_stops_listener_and_closes_observers() {
    let server = boot().await;
    let mut ws = observe(&server).await;
    wait_for_connections(&server, 1).await;

    server.server.shutdown().shutdown();
    timeout(TIMEOUT, server.handle).await.unwrap().unwrap();

    // The observer sees the socket close.
    let closed = timeout(TIMEOUT, async {
        loop {
            match ws.next().await {
                None | Some(Err(_)) | Some(Ok(Message::Close(_))) => return,
                Some(Ok(_)) => {}
            }
        }
    })
    .await;
    assert!(closed.is_ok());
}
