use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use axum::extract::ws::{Message as WsMessage, WebSocket};
use dashmap::DashMap;
use futures::{SinkExt, StreamExt};
use tokio::sync::{mpsc, Mutex};

use quill_core::checker::WritingChecker;
use quill_core::events::ServerEvent;
use quill_core::ids::ClientId;
use quill_core::session::SessionContext;

use crate::protocol;

const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(30);
const CLIENT_TIMEOUT: Duration = Duration::from_secs(90);

/// Connection registration failure.
#[derive(Debug, thiserror::Error)]
pub enum ConnectError {
    /// The id is already registered. Policy: reject the new connection and
    /// leave the existing one untouched, rather than silently replacing it
    /// and orphaning its transport handle.
    #[error("client id already connected: {0}")]
    DuplicateConnection(ClientId),
}

/// A connected writing-assistant client: outbound queue plus session state.
/// Held in one entry so transport mapping and context are added and removed
/// together.
pub struct Connection {
    pub id: ClientId,
    pub context: SessionContext,
    tx: mpsc::Sender<String>,
    last_pong: AtomicU64,
}

impl Connection {
    fn new(id: ClientId, tx: mpsc::Sender<String>) -> Self {
        Self {
            id,
            context: SessionContext::new(),
            tx,
            last_pong: AtomicU64::new(now_secs()),
        }
    }

    pub fn record_pong(&self) {
        self.last_pong.store(now_secs(), Ordering::Relaxed);
    }

    pub fn is_alive(&self) -> bool {
        let last = self.last_pong.load(Ordering::Relaxed);
        now_secs().saturating_sub(last) < CLIENT_TIMEOUT.as_secs()
    }
}

fn now_secs() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}

/// Owns all per-connection state. Nothing else reads or writes the map; the
/// protocol handler goes through `with_context` and `send_to`.
pub struct ConnectionManager {
    connections: DashMap<ClientId, Arc<Mutex<Connection>>>,
    max_send_queue: usize,
}

impl ConnectionManager {
    pub fn new(max_send_queue: usize) -> Self {
        Self {
            connections: DashMap::new(),
            max_send_queue,
        }
    }

    /// Register a client-supplied id and create its session context.
    /// Rejects duplicates — see [`ConnectError::DuplicateConnection`].
    pub fn register(&self, id: ClientId) -> Result<mpsc::Receiver<String>, ConnectError> {
        use dashmap::mapref::entry::Entry;

        match self.connections.entry(id.clone()) {
            Entry::Occupied(_) => Err(ConnectError::DuplicateConnection(id)),
            Entry::Vacant(slot) => {
                let (tx, rx) = mpsc::channel(self.max_send_queue);
                slot.insert(Arc::new(Mutex::new(Connection::new(id, tx))));
                Ok(rx)
            }
        }
    }

    /// Remove transport mapping and session context together. Idempotent.
    pub fn unregister(&self, id: &ClientId) {
        self.connections.remove(id);
    }

    fn get(&self, id: &ClientId) -> Option<Arc<Mutex<Connection>>> {
        self.connections.get(id).map(|entry| Arc::clone(entry.value()))
    }

    /// Run a closure against a connection's session context.
    /// Returns `None` when the id is not registered.
    pub async fn with_context<R>(
        &self,
        id: &ClientId,
        f: impl FnOnce(&mut SessionContext) -> R,
    ) -> Option<R> {
        let conn = self.get(id)?;
        let mut guard = conn.lock().await;
        Some(f(&mut guard.context))
    }

    /// Serialize an event and enqueue it for the client's writer task.
    /// A missing id is not an error — the remote may have disconnected while
    /// a classifier call was in flight — so this silently no-ops.
    pub async fn send_to(&self, id: &ClientId, event: &ServerEvent) -> bool {
        let Some(conn) = self.get(id) else {
            return false;
        };
        let json = match serde_json::to_string(event) {
            Ok(json) => json,
            Err(e) => {
                tracing::error!(client_id = %id, error = %e, "failed to serialize event");
                return false;
            }
        };

        let tx = conn.lock().await.tx.clone();
        match tx.try_send(json) {
            Ok(()) => true,
            Err(mpsc::error::TrySendError::Full(_)) => {
                tracing::warn!(
                    client_id = %id,
                    event = event.event_type(),
                    "send queue full, dropping event"
                );
                false
            }
            Err(mpsc::error::TrySendError::Closed(_)) => false,
        }
    }

    pub fn is_registered(&self, id: &ClientId) -> bool {
        self.connections.contains_key(id)
    }

    /// Number of connected clients.
    pub fn count(&self) -> usize {
        self.connections.len()
    }

    pub fn record_pong(&self, id: &ClientId) {
        if let Some(conn) = self.connections.get(id) {
            if let Ok(c) = conn.try_lock() {
                c.record_pong();
            }
        }
    }

    /// Remove clients that haven't responded to pings within the timeout.
    pub fn cleanup_dead_clients(&self) -> usize {
        let dead: Vec<ClientId> = self
            .connections
            .iter()
            .filter_map(|entry| {
                if let Ok(conn) = entry.value().try_lock() {
                    if !conn.is_alive() {
                        return Some(conn.id.clone());
                    }
                }
                None
            })
            .collect();

        let removed = dead.len();
        for id in dead {
            self.unregister(&id);
            tracing::info!(client_id = %id, "cleaned up dead client");
        }
        removed
    }

    #[cfg(test)]
    pub(crate) fn force_stale_pong(&self, id: &ClientId) {
        if let Some(conn) = self.connections.get(id) {
            if let Ok(c) = conn.try_lock() {
                c.last_pong.store(0, Ordering::Relaxed);
            }
        }
    }
}

/// Handle a WebSocket connection: writer task drains the outbound queue and
/// sends heartbeat pings; this task reads inbound frames and runs the
/// protocol handler inline, so one connection's messages are processed
/// strictly in arrival order without blocking any other connection.
pub async fn handle_ws_connection(
    socket: WebSocket,
    client_id: ClientId,
    mut rx: mpsc::Receiver<String>,
    manager: Arc<ConnectionManager>,
    checker: Arc<dyn WritingChecker>,
    checker_timeout: Duration,
) {
    let (mut ws_tx, mut ws_rx) = socket.split();

    let writer = tokio::spawn(async move {
        let mut ping_interval = tokio::time::interval(HEARTBEAT_INTERVAL);
        ping_interval.tick().await; // consume first immediate tick

        loop {
            tokio::select! {
                msg = rx.recv() => {
                    match msg {
                        Some(text) => {
                            if ws_tx.send(WsMessage::Text(text.into())).await.is_err() {
                                break;
                            }
                        }
                        None => break,
                    }
                }
                _ = ping_interval.tick() => {
                    if ws_tx.send(WsMessage::Ping(vec![].into())).await.is_err() {
                        break;
                    }
                }
            }
        }
    });

    manager
        .send_to(
            &client_id,
            &ServerEvent::Connected {
                message: "Writing assistant connected. Start typing to get feedback.".into(),
            },
        )
        .await;

    while let Some(Ok(msg)) = ws_rx.next().await {
        match msg {
            WsMessage::Text(text) => {
                protocol::handle_frame(
                    &manager,
                    checker.as_ref(),
                    &client_id,
                    text.as_str(),
                    checker_timeout,
                )
                .await;
            }
            WsMessage::Pong(_) => manager.record_pong(&client_id),
            WsMessage::Close(_) => break,
            WsMessage::Ping(_) => {} // axum replies with pong automatically
            _ => {}
        }
    }

    manager.unregister(&client_id);
    writer.abort();
    tracing::info!(client_id = %client_id, "client disconnected");
}

/// Start a background task that periodically cleans up dead clients.
pub fn start_cleanup_task(
    manager: Arc<ConnectionManager>,
    interval: Duration,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        loop {
            ticker.tick().await;
            let removed = manager.cleanup_dead_clients();
            if removed > 0 {
                tracing::info!(removed = removed, "dead client cleanup");
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn manager() -> ConnectionManager {
        ConnectionManager::new(32)
    }

    #[test]
    fn register_and_unregister() {
        let mgr = manager();
        assert_eq!(mgr.count(), 0);

        let _rx1 = mgr.register(ClientId::from_raw("c1")).unwrap();
        let _rx2 = mgr.register(ClientId::from_raw("c2")).unwrap();
        assert_eq!(mgr.count(), 2);

        mgr.unregister(&ClientId::from_raw("c1"));
        assert_eq!(mgr.count(), 1);
        assert!(!mgr.is_registered(&ClientId::from_raw("c1")));
        assert!(mgr.is_registered(&ClientId::from_raw("c2")));
    }

    #[test]
    fn duplicate_id_rejected() {
        let mgr = manager();
        let _rx = mgr.register(ClientId::from_raw("c1")).unwrap();

        let result = mgr.register(ClientId::from_raw("c1"));
        assert!(matches!(result, Err(ConnectError::DuplicateConnection(_))));
        // the original registration survives
        assert_eq!(mgr.count(), 1);
    }

    #[test]
    fn id_reusable_after_unregister() {
        let mgr = manager();
        let id = ClientId::from_raw("c1");
        let _rx = mgr.register(id.clone()).unwrap();
        mgr.unregister(&id);
        assert!(mgr.register(id).is_ok());
    }

    #[test]
    fn unregister_is_idempotent() {
        let mgr = manager();
        let id = ClientId::from_raw("ghost");
        mgr.unregister(&id);
        mgr.unregister(&id);
        assert_eq!(mgr.count(), 0);
    }

    #[tokio::test]
    async fn context_created_on_register_and_gone_after_unregister() {
        let mgr = manager();
        let id = ClientId::from_raw("c1");
        let _rx = mgr.register(id.clone()).unwrap();

        let started = mgr.with_context(&id, |ctx| ctx.session_started).await;
        assert_eq!(started, Some(false));

        mgr.unregister(&id);
        assert!(mgr.with_context(&id, |ctx| ctx.session_started).await.is_none());
    }

    #[tokio::test]
    async fn send_to_delivers_serialized_event() {
        let mgr = manager();
        let id = ClientId::from_raw("c1");
        let mut rx = mgr.register(id.clone()).unwrap();

        let sent = mgr.send_to(&id, &ServerEvent::Pong).await;
        assert!(sent);

        let json = rx.recv().await.unwrap();
        assert_eq!(json, r#"{"type":"pong"}"#);
    }

    #[tokio::test]
    async fn send_to_unknown_id_is_noop() {
        let mgr = manager();
        let sent = mgr.send_to(&ClientId::from_raw("nobody"), &ServerEvent::Pong).await;
        assert!(!sent);
    }

    #[tokio::test]
    async fn send_after_unregister_is_noop() {
        let mgr = manager();
        let id = ClientId::from_raw("c1");
        let _rx = mgr.register(id.clone()).unwrap();
        mgr.unregister(&id);

        assert!(!mgr.send_to(&id, &ServerEvent::Pong).await);
    }

    #[tokio::test]
    async fn send_to_full_queue_drops() {
        let mgr = ConnectionManager::new(2);
        let id = ClientId::from_raw("c1");
        let _rx = mgr.register(id.clone()).unwrap();

        assert!(mgr.send_to(&id, &ServerEvent::Pong).await);
        assert!(mgr.send_to(&id, &ServerEvent::Pong).await);
        // queue is full now
        assert!(!mgr.send_to(&id, &ServerEvent::Pong).await);
    }

    #[test]
    fn cleanup_removes_stale_clients() {
        let mgr = manager();
        let stale = ClientId::from_raw("stale");
        let fresh = ClientId::from_raw("fresh");
        let _rx1 = mgr.register(stale.clone()).unwrap();
        let _rx2 = mgr.register(fresh.clone()).unwrap();

        mgr.force_stale_pong(&stale);

        let removed = mgr.cleanup_dead_clients();
        assert_eq!(removed, 1);
        assert!(!mgr.is_registered(&stale));
        assert!(mgr.is_registered(&fresh));
    }

    #[test]
    fn pong_keeps_client_alive() {
        let mgr = manager();
        let id = ClientId::from_raw("c1");
        let _rx = mgr.register(id.clone()).unwrap();

        mgr.record_pong(&id);
        assert_eq!(mgr.cleanup_dead_clients(), 0);
    }
}
