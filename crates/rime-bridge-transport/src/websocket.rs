//! WebSocket transport: commands in, replies and engine events out.

use std::sync::{Arc, Mutex, PoisonError};

use axum::{
    extract::{
        State, WebSocketUpgrade,
        ws::{Message, WebSocket},
    },
    response::IntoResponse,
};
use futures::{SinkExt, StreamExt};
use rime_bridge_core::{Engine, EventStore};
use rime_bridge_session::Bridge;
use tokio::sync::mpsc;
use tower::ServiceBuilder;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::{
    handler::CommandHandler,
    protocol::{HostCommand, HostReply, Outbound},
};

/// WebSocket handler state.
pub struct WsState<E: Engine + 'static> {
    /// The bridge all connections drive. Commands are serialised by the lock.
    pub bridge: Arc<Mutex<Bridge<E>>>,
    /// The store the bridge's events are delivered to.
    pub events: Arc<EventStore>,
}

impl<E: Engine + 'static> Clone for WsState<E> {
    fn clone(&self) -> Self {
        Self {
            bridge: Arc::clone(&self.bridge),
            events: Arc::clone(&self.events),
        }
    }
}

impl<E: Engine + 'static> WsState<E> {
    /// Create new WebSocket state. `events` must be the sink `bridge` was built with.
    #[must_use]
    pub fn new(bridge: Bridge<E>, events: Arc<EventStore>) -> Self {
        Self {
            bridge: Arc::new(Mutex::new(bridge)),
            events,
        }
    }
}

/// WebSocket upgrade handler.
///
/// Use this as an Axum route handler.
pub async fn ws_handler<E: Engine + 'static>(
    ws: WebSocketUpgrade,
    State(state): State<WsState<E>>,
) -> impl IntoResponse {
    ws.on_upgrade(|socket| handle_socket(socket, state))
}

async fn handle_socket<E: Engine + 'static>(socket: WebSocket, state: WsState<E>) {
    let (mut sender, mut receiver) = socket.split();

    // Channel for sending messages to the client
    let (tx, mut rx) = mpsc::unbounded_channel::<Outbound>();

    // Spawn task to forward messages to WebSocket
    let send_task = tokio::spawn(async move {
        while let Some(msg) = rx.recv().await {
            let json = match serde_json::to_string(&msg) {
                Ok(j) => j,
                Err(e) => {
                    tracing::error!("Failed to serialize message: {e}");
                    continue;
                }
            };
            if sender.send(Message::Text(json.into())).await.is_err() {
                break;
            }
        }
    });

    // Replay earlier events, then follow live ones
    let event_tx = tx.clone();
    let mut events = state.events.history_plus_stream();
    let event_task = tokio::spawn(async move {
        while let Some(event) = events.next().await {
            if event_tx.send(Outbound::Event(event)).is_err() {
                break;
            }
        }
    });

    // Handle incoming messages
    while let Some(msg) = receiver.next().await {
        let msg = match msg {
            Ok(Message::Text(text)) => text,
            Ok(Message::Binary(data)) => match String::from_utf8(data.to_vec()) {
                Ok(s) => s.into(),
                Err(_) => continue,
            },
            Ok(Message::Close(_)) => break,
            Ok(_) => continue,
            Err(e) => {
                tracing::error!("WebSocket error: {e}");
                break;
            }
        };

        let command: HostCommand = match serde_json::from_str(&msg) {
            Ok(c) => c,
            Err(e) => {
                tracing::warn!("Invalid host command: {e}");
                let _ = tx.send(Outbound::Reply(HostReply::Error {
                    message: format!("Invalid command: {e}"),
                }));
                continue;
            }
        };

        // Engine calls block, deploy for the length of a full rebuild.
        let bridge = Arc::clone(&state.bridge);
        let reply = tokio::task::spawn_blocking(move || {
            let mut bridge = bridge.lock().unwrap_or_else(PoisonError::into_inner);
            CommandHandler::handle(&mut bridge, command)
        })
        .await
        .unwrap_or_else(|e| HostReply::Error {
            message: format!("Command panicked: {e}"),
        });

        if tx.send(Outbound::Reply(reply)).is_err() {
            break;
        }
    }

    event_task.abort();
    send_task.abort();
}

/// Create WebSocket router.
///
/// # Example
/// ```ignore
/// let events = Arc::new(EventStore::new());
/// let bridge = Bridge::new(engine, events.clone(), BridgeConfig::from_env());
/// let app = Router::new().merge(create_ws_router(WsState::new(bridge, events)));
/// ```
#[must_use]
pub fn create_ws_router<E: Engine + 'static>(state: WsState<E>) -> axum::Router {
    axum::Router::new()
        .route("/ws", axum::routing::get(ws_handler::<E>))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(CorsLayer::permissive()),
        )
        .with_state(state)
}
