//! Observer connection state.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::{Duration, Instant};

use cadre_core::ConnectionId;
use parking_lot::Mutex;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

/// A connected WebSocket observer.
pub struct ClientConnection {
    /// Unique connection ID.
    pub id: ConnectionId,
    /// Send channel to the connection's write task.
    tx: mpsc::Sender<Arc<String>>,
    /// When this connection was established.
    pub connected_at: Instant,
    /// Whether the client has answered since the last ping.
    is_alive: AtomicBool,
    /// When the last pong (or any inbound frame) arrived.
    last_pong: Mutex<Instant>,
    /// Messages dropped because the channel was full or closed.
    dropped_messages: AtomicU64,
    /// Cancelled when the connection is evicted from fan-out.
    evicted: CancellationToken,
}

impl ClientConnection {
    /// Create a new connection.
    pub fn new(id: ConnectionId, tx: mpsc::Sender<Arc<String>>) -> Self {
        let now = Instant::now();
        Self {
            id,
            tx,
            connected_at: now,
            is_alive: AtomicBool::new(true),
            last_pong: Mutex::new(now),
            dropped_messages: AtomicU64::new(0),
            evicted: CancellationToken::new(),
        }
    }

    /// Queue a text frame for the client.
    ///
    /// Returns `false` if the channel is full or closed and bumps the drop
    /// counter.
    pub fn send(&self, message: Arc<String>) -> bool {
        if self.tx.try_send(message).is_ok() {
            true
        } else {
            let _ = self.dropped_messages.fetch_add(1, Ordering::Relaxed);
            false
        }
    }

    /// Serialize a JSON value and queue it.
    pub fn send_json(&self, value: &serde_json::Value) -> bool {
        match serde_json::to_string(value) {
            Ok(json) => self.send(Arc::new(json)),
            Err(_) => false,
        }
    }

    /// Total messages dropped for this connection.
    pub fn drop_count(&self) -> u64 {
        self.dropped_messages.load(Ordering::Relaxed)
    }

    /// Record inbound activity.
    pub fn mark_alive(&self) {
        self.is_alive.store(true, Ordering::Relaxed);
        *self.last_pong.lock() = Instant::now();
    }

    /// Check and reset the alive flag. `true` if the client answered since
    /// the last check.
    pub fn check_alive(&self) -> bool {
        self.is_alive.swap(false, Ordering::Relaxed)
    }

    /// Time since the last pong or connection establishment.
    pub fn last_pong_elapsed(&self) -> Duration {
        self.last_pong.lock().elapsed()
    }

    /// Signal the session loop to close this connection.
    pub fn evict(&self) {
        self.evicted.cancel();
    }

    /// Whether the connection has been evicted.
    pub fn is_evicted(&self) -> bool {
        self.evicted.is_cancelled()
    }

    /// Resolves once the connection is evicted.
    pub async fn evicted(&self) {
        self.evicted.cancelled().await;
    }

    /// Connection age.
    pub fn age(&self) -> Duration {
        self.connected_at.elapsed()
    }
}

impl std::fmt::Debug for ClientConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientConnection")
            .field("id", &self.id)
            .field("dropped_messages", &self.drop_count())
            .field("evicted", &self.is_evicted())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_connection(capacity: usize) -> (ClientConnection, mpsc::Receiver<Arc<String>>) {
        let (tx, rx) = mpsc::channel(capacity);
        (ClientConnection::new(ConnectionId::from("conn-1"), tx), rx)
    }

    #[tokio::test]
    async fn send_message_success() {
        let (conn, mut rx) = make_connection(8);
        assert!(conn.send(Arc::new("hello".into())));
        assert_eq!(&*rx.recv().await.unwrap(), "hello");
        assert_eq!(conn.drop_count(), 0);
    }

    #[test]
    fn send_to_closed_channel_counts_drop() {
        let (conn, rx) = make_connection(8);
        drop(rx);
        assert!(!conn.send(Arc::new("hello".into())));
        assert_eq!(conn.drop_count(), 1);
    }

    #[test]
    fn send_to_full_channel_counts_drop() {
        let (conn, _rx) = make_connection(1);
        assert!(conn.send(Arc::new("one".into())));
        assert!(!conn.send(Arc::new("two".into())));
        assert_eq!(conn.drop_count(), 1);
    }

    #[tokio::test]
    async fn send_json_serializes() {
        let (conn, mut rx) = make_connection(8);
        assert!(conn.send_json(&serde_json::json!({"key": "value"})));
        let parsed: serde_json::Value = serde_json::from_str(&rx.recv().await.unwrap()).unwrap();
        assert_eq!(parsed["key"], "value");
    }

    #[test]
    fn check_alive_resets_flag() {
        let (conn, _rx) = make_connection(8);
        assert!(conn.check_alive());
        assert!(!conn.check_alive());
        conn.mark_alive();
        assert!(conn.check_alive());
    }

    #[tokio::test]
    async fn evict_resolves_waiters() {
        let (conn, _rx) = make_connection(8);
        assert!(!conn.is_evicted());
        conn.evict();
        conn.evicted().await;
        assert!(conn.is_evicted());
    }
}
