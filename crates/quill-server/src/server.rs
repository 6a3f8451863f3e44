use std::sync::Arc;
use std::time::Duration;

use axum::extract::ws::{Message as WsMessage, WebSocket, WebSocketUpgrade};
use axum::extract::{Path, State};
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::CorsLayer;

use quill_core::checker::WritingChecker;
use quill_core::events::ServerEvent;
use quill_core::ids::ClientId;

use crate::connection::{self, ConnectionManager};
use crate::rest;

/// Server configuration.
pub struct ServerConfig {
    pub port: u16,
    pub max_send_queue: usize,
    pub checker_timeout_secs: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: 8000,
            max_send_queue: 256,
            checker_timeout_secs: 30,
        }
    }
}

/// Shared application state passed to Axum handlers.
#[derive(Clone)]
pub struct AppState {
    pub manager: Arc<ConnectionManager>,
    pub checker: Arc<dyn WritingChecker>,
    pub checker_timeout: Duration,
}

/// Build the Axum router with all routes.
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/ws/writing-assistant/{client_id}", get(ws_handler))
        .route("/api/check-sentence", post(rest::check_sentence))
        .route("/api/check-word", post(rest::check_word))
        .route("/api/improve-text", post(rest::improve_text))
        .route("/health", get(rest::health))
        .with_state(state)
        .layer(CorsLayer::permissive())
}

/// Create and start the server. Returns a handle that keeps it alive.
pub async fn start(
    config: ServerConfig,
    checker: Arc<dyn WritingChecker>,
) -> Result<ServerHandle, std::io::Error> {
    let manager = Arc::new(ConnectionManager::new(config.max_send_queue));

    // Dead-client cleanup every 60s
    let cleanup = connection::start_cleanup_task(
        Arc::clone(&manager),
        Duration::from_secs(60),
    );

    let state = AppState {
        manager,
        checker,
        checker_timeout: Duration::from_secs(config.checker_timeout_secs),
    };

    let router = build_router(state);
    let addr = format!("0.0.0.0:{}", config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    let local_addr = listener.local_addr()?;

    tracing::info!(port = local_addr.port(), "Quill server started");

    let server = tokio::spawn(async move {
        axum::serve(listener, router).await.ok();
    });

    Ok(ServerHandle {
        port: local_addr.port(),
        _server: server,
        _cleanup: cleanup,
    })
}

/// Handle returned by `start()` — keeps background tasks alive.
pub struct ServerHandle {
    pub port: u16,
    _server: tokio::task::JoinHandle<()>,
    _cleanup: tokio::task::JoinHandle<()>,
}

/// WebSocket upgrade handler; the client supplies its id in the path.
async fn ws_handler(
    ws: WebSocketUpgrade,
    Path(client_id): Path<String>,
    State(state): State<AppState>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, ClientId::from_raw(client_id), state))
}

/// Register a new WebSocket connection and run its message loop.
async fn handle_socket(mut socket: WebSocket, client_id: ClientId, state: AppState) {
    let rx = match state.manager.register(client_id.clone()) {
        Ok(rx) => rx,
        Err(e) => {
            // Duplicate id: tell this socket why and drop it, leaving the
            // already-registered connection untouched.
            tracing::warn!(client_id = %client_id, "rejecting duplicate connection");
            if let Ok(json) = serde_json::to_string(&ServerEvent::error(e.to_string())) {
                let _ = socket.send(WsMessage::Text(json.into())).await;
            }
            return;
        }
    };

    tracing::info!(client_id = %client_id, "client connected");

    connection::handle_ws_connection(
        socket,
        client_id,
        rx,
        Arc::clone(&state.manager),
        Arc::clone(&state.checker),
        state.checker_timeout,
    )
    .await;
}
