//! Event fan-out to connected observers.
//!
//! Each event is serialized once and queued on every observer channel.
//! Delivery is best-effort: an observer whose channel is closed or full is
//! evicted, with no retry and no replay.

use std::collections::HashMap;
use std::sync::Arc;

use cadre_core::ConnectionId;
use cadre_core::types::CoordinatorEvent;
use metrics::counter;
use tokio::sync::RwLock;
use tracing::{debug, warn};

use super::connection::ClientConnection;
use crate::metrics::{WS_BROADCAST_DROPS_TOTAL, WS_EVENTS_BROADCAST_TOTAL};

/// Tracks observers and pushes events to them.
#[derive(Debug)]
pub struct BroadcastManager {
    connections: RwLock<HashMap<ConnectionId, Arc<ClientConnection>>>,
}

impl BroadcastManager {
    /// Create an empty manager.
    pub fn new() -> Self {
        Self {
            connections: RwLock::new(HashMap::new()),
        }
    }

    /// Add an observer.
    pub async fn add(&self, connection: Arc<ClientConnection>) {
        let mut conns = self.connections.write().await;
        let _ = conns.insert(connection.id.clone(), connection);
    }

    /// Remove an observer by ID.
    pub async fn remove(&self, connection_id: &str) {
        let mut conns = self.connections.write().await;
        let _ = conns.remove(connection_id);
    }

    /// Push an event to every observer. Returns the number of observers the
    /// event was queued for.
    pub async fn broadcast_all(&self, event: &CoordinatorEvent) -> usize {
        let json = match serde_json::to_string(event) {
            Ok(json) => Arc::new(json),
            Err(err) => {
                warn!(event_type = event.event_type.as_str(), error = %err, "failed to serialize event");
                return 0;
            }
        };
        counter!(WS_EVENTS_BROADCAST_TOTAL, "type" => event.event_type.as_str()).increment(1);

        let (recipients, failed): (usize, Vec<ConnectionId>) = {
            let conns = self.connections.read().await;
            debug!(
                event_type = event.event_type.as_str(),
                recipients = conns.len(),
                "broadcast event"
            );
            let failed = conns
                .values()
                .filter(|conn| !conn.send(json.clone()))
                .map(|conn| conn.id.clone())
                .collect();
            (conns.len(), failed)
        };

        let delivered = recipients - failed.len();
        if !failed.is_empty() {
            let mut conns = self.connections.write().await;
            for id in &failed {
                if let Some(conn) = conns.remove(id) {
                    warn!(conn_id = %conn.id, dropped = conn.drop_count(), "observer dropped from fan-out");
                    conn.evict();
                    counter!(WS_BROADCAST_DROPS_TOTAL).increment(1);
                }
            }
        }
        delivered
    }

    /// Number of connected observers.
    pub async fn connection_count(&self) -> usize {
        self.connections.read().await.len()
    }
}

impl Default for BroadcastManager {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cadre_core::types::EventType;
    use chrono::Utc;
    use serde_json::json;
    use tokio::sync::mpsc;

    fn make_connection(id: &str, capacity: usize) -> (Arc<ClientConnection>, mpsc::Receiver<Arc<String>>) {
        let (tx, rx) = mpsc::channel(capacity);
        (Arc::new(ClientConnection::new(ConnectionId::from(id), tx)), rx)
    }

    fn event() -> CoordinatorEvent {
        CoordinatorEvent::new(EventType::TaskClaimed, json!({"taskId": "t1"}), Utc::now())
    }

    #[tokio::test]
    async fn add_and_remove() {
        let bm = BroadcastManager::new();
        let (conn, _rx) = make_connection("c1", 8);
        bm.add(conn).await;
        assert_eq!(bm.connection_count().await, 1);
        bm.remove("c1").await;
        bm.remove("no-such").await;
        assert_eq!(bm.connection_count().await, 0);
    }

    #[tokio::test]
    async fn broadcast_reaches_every_observer() {
        let bm = BroadcastManager::new();
        let (c1, mut rx1) = make_connection("c1", 8);
        let (c2, mut rx2) = make_connection("c2", 8);
        bm.add(c1).await;
        bm.add(c2).await;

        assert_eq!(bm.broadcast_all(&event()).await, 2);

        for rx in [&mut rx1, &mut rx2] {
            let msg = rx.try_recv().unwrap();
            let parsed: serde_json::Value = serde_json::from_str(&msg).unwrap();
            assert_eq!(parsed["type"], "task_claimed");
            assert_eq!(parsed["payload"]["taskId"], "t1");
        }
    }

    #[tokio::test]
    async fn closed_observer_is_evicted() {
        let bm = BroadcastManager::new();
        let (alive, mut rx_alive) = make_connection("alive", 8);
        let (dead, rx_dead) = make_connection("dead", 8);
        drop(rx_dead);
        bm.add(alive).await;
        bm.add(dead.clone()).await;

        assert_eq!(bm.broadcast_all(&event()).await, 1);
        assert_eq!(bm.connection_count().await, 1);
        assert!(dead.is_evicted());
        assert!(rx_alive.try_recv().is_ok());
    }

    #[tokio::test]
    async fn full_observer_is_evicted_without_replay() {
        let bm = BroadcastManager::new();
        let (slow, mut rx) = make_connection("slow", 1);
        bm.add(slow.clone()).await;

        assert_eq!(bm.broadcast_all(&event()).await, 1);
        assert_eq!(bm.broadcast_all(&event()).await, 0);
        assert!(slow.is_evicted());

        assert!(rx.try_recv().is_ok());
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn broadcast_with_no_observers() {
        let bm = BroadcastManager::new();
        assert_eq!(bm.broadcast_all(&event()).await, 0);
    }
}
