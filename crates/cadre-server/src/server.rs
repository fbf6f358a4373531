//! `CadreServer`: axum HTTP routes plus the `/ws` push channel.
//!
//! Every HTTP route is a thin adapter over the [`MethodRegistry`], so the
//! REST surface and the WebSocket request channel share handlers.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

use axum::Router;
use axum::body::Bytes;
use axum::extract::ws::WebSocketUpgrade;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use axum::routing::{MethodRouter, get, post};
use cadre_core::ConnectionId;
use metrics::counter;
use metrics_exporter_prometheus::PrometheusHandle;
use serde_json::{Value, json};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};

use crate::config::ServerConfig;
use crate::health::{self, HealthResponse};
use crate::metrics::WS_CONNECTIONS_REJECTED_TOTAL;
use crate::rpc::context::RpcContext;
use crate::rpc::errors::RpcError;
use crate::rpc::registry::MethodRegistry;
use crate::shutdown::ShutdownCoordinator;
use crate::websocket::broadcast::BroadcastManager;
use crate::websocket::event_bridge::EventBridge;
use crate::websocket::session::{Keepalive, SessionDeps, run_ws_session};

/// Shared state accessible from axum handlers.
#[derive(Clone)]
pub struct AppState {
    /// RPC method registry.
    pub registry: Arc<MethodRegistry>,
    /// Handler context.
    pub ctx: Arc<RpcContext>,
    /// Observer fan-out.
    pub broadcast: Arc<BroadcastManager>,
    /// Shutdown coordinator.
    pub shutdown: Arc<ShutdownCoordinator>,
    /// Server configuration.
    pub config: Arc<ServerConfig>,
    /// When the server started.
    pub start_time: Instant,
    /// Prometheus handle, when a recorder is installed.
    pub metrics: Option<PrometheusHandle>,
}

/// The coordinator's network boundary.
pub struct CadreServer {
    config: Arc<ServerConfig>,
    registry: Arc<MethodRegistry>,
    ctx: Arc<RpcContext>,
    broadcast: Arc<BroadcastManager>,
    shutdown: Arc<ShutdownCoordinator>,
    start_time: Instant,
    metrics: Option<PrometheusHandle>,
}

impl CadreServer {
    /// Create a server over a handler context and registry.
    pub fn new(config: ServerConfig, registry: MethodRegistry, ctx: RpcContext) -> Self {
        Self {
            config: Arc::new(config),
            registry: Arc::new(registry),
            ctx: Arc::new(ctx),
            broadcast: Arc::new(BroadcastManager::new()),
            shutdown: Arc::new(ShutdownCoordinator::new()),
            start_time: Instant::now(),
            metrics: None,
        }
    }

    /// Serve `/metrics` from this Prometheus handle.
    #[must_use]
    pub fn with_metrics(mut self, handle: PrometheusHandle) -> Self {
        self.metrics = Some(handle);
        self
    }

    /// Build the axum router with all routes.
    pub fn router(&self) -> Router {
        let state = AppState {
            registry: self.registry.clone(),
            ctx: self.ctx.clone(),
            broadcast: self.broadcast.clone(),
            shutdown: self.shutdown.clone(),
            config: self.config.clone(),
            start_time: self.start_time,
            metrics: self.metrics.clone(),
        };

        Router::new()
            .route("/session/register", rpc_post("session.register"))
            .route("/session/heartbeat", rpc_post("session.heartbeat"))
            .route("/session/deregister", rpc_post("session.deregister"))
            .route("/task/claim", rpc_post("task.claim"))
            .route("/task/complete", rpc_post("task.complete"))
            .route("/task/assign", rpc_post("task.assign"))
            .route("/task/{id}", get(get_task_handler))
            .route("/status", get(status_handler))
            .route("/sync", rpc_post("state.sync"))
            .route("/health", get(health_handler))
            .route("/metrics", get(metrics_handler))
            .route("/ws", get(ws_handler))
            .layer(TraceLayer::new_for_http())
            .with_state(state)
    }

    /// Bind the configured address and serve until shutdown.
    ///
    /// Also starts the event bridge that feeds committed coordinator events
    /// to observers. Returns the bound address and a handle that resolves
    /// once the listener and bridge have stopped.
    pub async fn listen(&self) -> std::io::Result<(SocketAddr, JoinHandle<()>)> {
        let listener = TcpListener::bind(self.config.bind_addr()).await?;
        let addr = listener.local_addr()?;
        info!(%addr, "cadre server listening");

        let token = self.shutdown.token();
        let bridge = EventBridge::new(self.ctx.coordinator.subscribe(), self.broadcast.clone());
        let bridge_handle = tokio::spawn(bridge.run(token.clone()));

        let app = self.router();
        let handle = tokio::spawn(async move {
            let served = axum::serve(listener, app)
                .with_graceful_shutdown(token.cancelled_owned())
                .await;
            if let Err(err) = served {
                error!(error = %err, "server exited with error");
            }
            let _ = bridge_handle.await;
            info!("cadre server stopped");
        });
        Ok((addr, handle))
    }

    /// The observer fan-out.
    pub fn broadcast(&self) -> &Arc<BroadcastManager> {
        &self.broadcast
    }

    /// The shutdown coordinator.
    pub fn shutdown(&self) -> &Arc<ShutdownCoordinator> {
        &self.shutdown
    }

    /// The server configuration.
    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// The method registry.
    pub fn registry(&self) -> &Arc<MethodRegistry> {
        &self.registry
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Route handlers
// ─────────────────────────────────────────────────────────────────────────────

/// POST route whose JSON body is passed as params to `method`.
fn rpc_post(method: &'static str) -> MethodRouter<AppState> {
    post(move |State(state): State<AppState>, body: Bytes| async move {
        let params = match parse_body(&body) {
            Ok(params) => params,
            Err(err) => return err.into_response(),
        };
        invoke(&state, method, params).await
    })
}

fn parse_body(body: &[u8]) -> Result<Option<Value>, RpcError> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(None);
    }
    serde_json::from_slice(body)
        .map(Some)
        .map_err(|err| RpcError::invalid_params(format!("invalid JSON body: {err}")))
}

async fn invoke(state: &AppState, method: &str, params: Option<Value>) -> Response {
    match state.registry.call(method, params, &state.ctx).await {
        Ok(result) => Json(result).into_response(),
        Err(err) => err.into_response(),
    }
}

/// GET /task/{id}
async fn get_task_handler(State(state): State<AppState>, Path(id): Path<String>) -> Response {
    invoke(&state, "task.get", Some(json!({ "taskId": id }))).await
}

/// GET /status
async fn status_handler(State(state): State<AppState>) -> Response {
    invoke(&state, "status.get", None).await
}

/// GET /health
async fn health_handler(State(state): State<AppState>) -> Json<HealthResponse> {
    let connections = state.broadcast.connection_count().await;
    let active_sessions = state.ctx.coordinator.status().await.active_sessions;
    Json(health::health_check(state.start_time, connections, active_sessions))
}

/// GET /metrics
async fn metrics_handler(State(state): State<AppState>) -> Response {
    match &state.metrics {
        Some(handle) => crate::metrics::render(handle).into_response(),
        None => (StatusCode::NOT_FOUND, "metrics recorder not installed").into_response(),
    }
}

/// GET /ws
async fn ws_handler(State(state): State<AppState>, ws: WebSocketUpgrade) -> Response {
    if state.shutdown.is_shutting_down() {
        return (StatusCode::SERVICE_UNAVAILABLE, "server is shutting down").into_response();
    }
    if state.broadcast.connection_count().await >= state.config.max_connections {
        warn!(max = state.config.max_connections, "observer limit reached, rejecting");
        counter!(WS_CONNECTIONS_REJECTED_TOTAL).increment(1);
        return (StatusCode::SERVICE_UNAVAILABLE, "too many connections").into_response();
    }

    let keepalive = Keepalive {
        ping_interval: state.config.ping_interval,
        pong_timeout: state.config.pong_timeout,
    };
    let deps = SessionDeps {
        registry: state.registry.clone(),
        ctx: state.ctx.clone(),
        broadcast: state.broadcast.clone(),
        shutdown: state.shutdown.token(),
    };
    ws.max_message_size(state.config.max_message_size)
        .on_upgrade(move |socket| run_ws_session(socket, ConnectionId::new(), keepalive, deps))
}
