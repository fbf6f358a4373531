//! Lifecycle of one observer connection, from upgrade to disconnect.

use std::sync::Arc;
use std::time::Duration;

use axum::extract::ws::{Message, WebSocket};
use cadre_core::ConnectionId;
use futures::{SinkExt, StreamExt};
use metrics::{counter, gauge, histogram};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use super::broadcast::BroadcastManager;
use super::connection::ClientConnection;
use super::handler::handle_message;
use crate::metrics::{WS_CONNECTIONS_ACTIVE, WS_CONNECTIONS_TOTAL, WS_DISCONNECTIONS_TOTAL};
use crate::rpc::context::RpcContext;
use crate::rpc::registry::MethodRegistry;

/// Outbound queue depth per observer.
const SEND_QUEUE_CAPACITY: usize = 256;

/// Ping cadence for a session.
#[derive(Clone, Copy, Debug)]
pub struct Keepalive {
    /// Interval between server pings.
    pub ping_interval: Duration,
    /// Silence after which the observer is disconnected.
    pub pong_timeout: Duration,
}

/// Everything a session needs from the server.
#[derive(Clone)]
pub struct SessionDeps {
    /// Method registry for inbound requests.
    pub registry: Arc<MethodRegistry>,
    /// Handler context.
    pub ctx: Arc<RpcContext>,
    /// Fan-out set the connection joins.
    pub broadcast: Arc<BroadcastManager>,
    /// Server shutdown token.
    pub shutdown: CancellationToken,
}

/// The first frame every observer receives.
pub fn connected_message(id: &ConnectionId) -> serde_json::Value {
    serde_json::json!({
        "type": "connection.established",
        "payload": { "connectionId": id },
        "timestamp": chrono::Utc::now(),
    })
}

/// Run an observer session.
///
/// Sends `connection.established`, joins the fan-out set, answers inbound
/// requests, pings on `keepalive`, and leaves the fan-out set on exit.
#[instrument(skip_all, fields(conn_id = %connection_id))]
pub async fn run_ws_session(ws: WebSocket, connection_id: ConnectionId, keepalive: Keepalive, deps: SessionDeps) {
    let (mut ws_tx, mut ws_rx) = ws.split();

    let (send_tx, mut send_rx) = mpsc::channel::<Arc<String>>(SEND_QUEUE_CAPACITY);
    let connection = Arc::new(ClientConnection::new(connection_id.clone(), send_tx));

    info!("observer connected");
    counter!(WS_CONNECTIONS_TOTAL).increment(1);
    gauge!(WS_CONNECTIONS_ACTIVE).increment(1.0);

    if let Ok(json) = serde_json::to_string(&connected_message(&connection_id)) {
        let _ = ws_tx.send(Message::Text(json.into())).await;
    }
    deps.broadcast.add(connection.clone()).await;

    let outbound_conn = connection.clone();
    let mut outbound = tokio::spawn(async move {
        let mut ping_interval = tokio::time::interval(keepalive.ping_interval);
        let _ = ping_interval.tick().await;

        loop {
            tokio::select! {
                msg = send_rx.recv() => {
                    let Some(text) = msg else { break };
                    if ws_tx.send(Message::Text(text.as_str().into())).await.is_err() {
                        break;
                    }
                }
                _ = ping_interval.tick() => {
                    if !outbound_conn.check_alive()
                        && outbound_conn.last_pong_elapsed() > keepalive.pong_timeout
                    {
                        warn!("observer unresponsive for {:?}, disconnecting", keepalive.pong_timeout);
                        break;
                    }
                    if ws_tx.send(Message::Ping(Vec::new().into())).await.is_err() {
                        break;
                    }
                }
                () = outbound_conn.evicted() => break,
            }
        }
        let _ = ws_tx.send(Message::Close(None)).await;
    });

    let mut outbound_done = false;
    loop {
        let frame = tokio::select! {
            frame = ws_rx.next() => frame,
            () = connection.evicted() => {
                debug!("connection evicted");
                break;
            }
            () = deps.shutdown.cancelled() => break,
            _ = &mut outbound => {
                outbound_done = true;
                break;
            }
        };
        let Some(Ok(msg)) = frame else { break };

        connection.mark_alive();
        let text = match msg {
            Message::Text(text) => text.to_string(),
            Message::Binary(data) => match String::from_utf8(data.to_vec()) {
                Ok(text) => text,
                Err(_) => {
                    debug!(len = data.len(), "ignoring non-UTF8 binary frame");
                    continue;
                }
            },
            Message::Close(_) => {
                debug!("observer sent close frame");
                break;
            }
            Message::Ping(_) | Message::Pong(_) => continue,
        };

        let result = handle_message(&text, &deps.registry, &deps.ctx).await;
        if !connection.send(result.response_json) {
            debug!(method = result.method, "failed to enqueue response");
        }
    }

    info!("observer disconnected");
    counter!(WS_DISCONNECTIONS_TOTAL).increment(1);
    gauge!(WS_CONNECTIONS_ACTIVE).decrement(1.0);
    histogram!("ws_connection_duration_seconds").record(connection.age().as_secs_f64());
    deps.broadcast.remove(&connection_id).await;
    connection.evict();
    if !outbound_done && tokio::time::timeout(Duration::from_secs(1), &mut outbound).await.is_err() {
        outbound.abort();
    }
}
