// Realtime hub: per-user fan-out of typed events to open WebSocket connections
// Producers enqueue onto a bounded channel; one dispatcher loop does the writes

use serde::Serialize;
use serde_json::json;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};
use uuid::Uuid;

pub const EVENT_CONNECTED: &str = "connected";
pub const EVENT_JOB_STATUS: &str = "job_status";
pub const EVENT_JOB_PROGRESS: &str = "job_progress";

/// Capacity of the broadcast channel. When full, producers drop events;
/// job state in the store stays authoritative.
const BROADCAST_CAPACITY: usize = 256;

pub type ConnId = u64;

/// Each connection task owns the socket sink and drains one of these
type ConnSender = mpsc::UnboundedSender<String>;

/// Wire envelope for hub events
#[derive(Debug, Clone, Serialize)]
pub struct HubMessage {
    pub user_id: Uuid,
    #[serde(rename = "type")]
    pub event: String,
    pub payload: serde_json::Value,
}

type ClientMap = Arc<RwLock<HashMap<Uuid, HashMap<ConnId, ConnSender>>>>;

pub struct RealtimeHub {
    clients: ClientMap,
    broadcast_tx: mpsc::Sender<HubMessage>,
    next_conn_id: AtomicU64,
}

impl RealtimeHub {
    /// Create the hub and spawn its dispatcher loop
    pub fn new() -> Arc<Self> {
        let (broadcast_tx, broadcast_rx) = mpsc::channel(BROADCAST_CAPACITY);
        let clients: ClientMap = Arc::new(RwLock::new(HashMap::new()));

        tokio::spawn(dispatch_loop(broadcast_rx, clients.clone()));

        Arc::new(Self {
            clients,
            broadcast_tx,
            next_conn_id: AtomicU64::new(1),
        })
    }

    /// Add a connection to the user's set. Returns the connection id used
    /// for unregistering.
    pub fn register(&self, user_id: Uuid, sender: ConnSender) -> ConnId {
        let conn_id = self.next_conn_id.fetch_add(1, Ordering::Relaxed);

        let mut clients = self.clients.write().expect("hub client map poisoned");
        clients.entry(user_id).or_default().insert(conn_id, sender);

        info!(user_id = %user_id, conn_id, "WebSocket client connected");
        conn_id
    }

    /// Remove (and thereby close) a connection; drops the user's entry when
    /// the last connection goes away.
    pub fn unregister(&self, user_id: Uuid, conn_id: ConnId) {
        let mut clients = self.clients.write().expect("hub client map poisoned");
        if let Some(conns) = clients.get_mut(&user_id) {
            if conns.remove(&conn_id).is_some() {
                info!(user_id = %user_id, conn_id, "WebSocket client disconnected");
            }
            if conns.is_empty() {
                clients.remove(&user_id);
            }
        }
    }

    /// Non-blocking enqueue of an event for one user. Drops the event when
    /// the channel is full rather than stalling the producer.
    pub fn broadcast(&self, user_id: Uuid, event: &str, payload: serde_json::Value) {
        let message = HubMessage {
            user_id,
            event: event.to_string(),
            payload,
        };

        if let Err(e) = self.broadcast_tx.try_send(message) {
            warn!(user_id = %user_id, event, error = %e, "Hub channel full, dropping event");
        }
    }

    /// Number of open connections for a user
    pub fn connection_count(&self, user_id: Uuid) -> usize {
        self.clients
            .read()
            .expect("hub client map poisoned")
            .get(&user_id)
            .map(|conns| conns.len())
            .unwrap_or(0)
    }

    /// The first frame every connection receives
    pub fn hello_frame(user_id: Uuid) -> String {
        json!({
            "type": EVENT_CONNECTED,
            "message": "WebSocket connection established",
            "user_id": user_id,
        })
        .to_string()
    }
}

/// Single dispatcher: drains the channel in arrival order and writes each
/// message to every connection registered for the target user. The client
/// map is only read here; a failed send means the connection task is gone,
/// so the entry is removed.
async fn dispatch_loop(mut rx: mpsc::Receiver<HubMessage>, clients: ClientMap) {
    while let Some(message) = rx.recv().await {
        let frame = match serde_json::to_string(&message) {
            Ok(frame) => frame,
            Err(e) => {
                warn!(error = %e, "Failed to serialize hub message");
                continue;
            }
        };

        let targets: Vec<(ConnId, ConnSender)> = {
            let clients = clients.read().expect("hub client map poisoned");
            match clients.get(&message.user_id) {
                Some(conns) => conns.iter().map(|(id, tx)| (*id, tx.clone())).collect(),
                None => continue,
            }
        };

        for (conn_id, sender) in targets {
            if sender.send(frame.clone()).is_err() {
                debug!(user_id = %message.user_id, conn_id, "Dropping dead connection");
                let mut clients = clients.write().expect("hub client map poisoned");
                if let Some(conns) = clients.get_mut(&message.user_id) {
                    conns.remove(&conn_id);
                    if conns.is_empty() {
                        clients.remove(&message.user_id);
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::time::{timeout, Duration};

    #[tokio::test]
    async fn broadcast_reaches_registered_connection_in_order() {
        let hub = RealtimeHub::new();
        let user_id = Uuid::new_v4();
        let (tx, mut rx) = mpsc::unbounded_channel();
        hub.register(user_id, tx);

        for i in 0..5 {
            hub.broadcast(user_id, EVENT_JOB_PROGRESS, json!({ "seq": i }));
        }

        for i in 0..5 {
            let frame = timeout(Duration::from_secs(1), rx.recv())
                .await
                .expect("timed out")
                .expect("channel closed");
            let parsed: serde_json::Value = serde_json::from_str(&frame).unwrap();
            assert_eq!(parsed["payload"]["seq"], i);
            assert_eq!(parsed["type"], EVENT_JOB_PROGRESS);
            assert_eq!(parsed["user_id"], user_id.to_string());
        }
    }

    #[tokio::test]
    async fn unregister_stops_delivery_and_clears_user() {
        let hub = RealtimeHub::new();
        let user_id = Uuid::new_v4();
        let (tx, mut rx) = mpsc::unbounded_channel();
        let conn_id = hub.register(user_id, tx);
        assert_eq!(hub.connection_count(user_id), 1);

        hub.unregister(user_id, conn_id);
        assert_eq!(hub.connection_count(user_id), 0);

        hub.broadcast(user_id, EVENT_JOB_STATUS, json!({}));
        // Sender was dropped on unregister, so the receiver sees end-of-stream
        assert!(timeout(Duration::from_millis(200), rx.recv())
            .await
            .map(|opt| opt.is_none())
            .unwrap_or(true));
    }

    #[tokio::test]
    async fn broadcast_to_unknown_user_is_a_noop() {
        let hub = RealtimeHub::new();
        hub.broadcast(Uuid::new_v4(), EVENT_JOB_STATUS, json!({"ok": true}));
        // Nothing to assert beyond not panicking; dispatcher drops it
    }

    #[tokio::test]
    async fn dead_connection_is_pruned_on_write_failure() {
        let hub = RealtimeHub::new();
        let user_id = Uuid::new_v4();
        let (tx, rx) = mpsc::unbounded_channel();
        hub.register(user_id, tx);
        drop(rx);

        hub.broadcast(user_id, EVENT_JOB_STATUS, json!({}));

        // Dispatcher removes the connection once the send fails
        timeout(Duration::from_secs(1), async {
            loop {
                if hub.connection_count(user_id) == 0 {
                    break;
                }
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .expect("dead connection was not pruned");
    }

    #[test]
    fn hello_frame_shape() {
        let user_id = Uuid::new_v4();
        let parsed: serde_json::Value =
            serde_json::from_str(&RealtimeHub::hello_frame(user_id)).unwrap();
        assert_eq!(parsed["type"], "connected");
        assert_eq!(parsed["user_id"], user_id.to_string());
        assert!(parsed["message"].is_string());
    }
}
