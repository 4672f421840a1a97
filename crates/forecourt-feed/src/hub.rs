//! # Feed Hub
//!
//! The station-side server for both distribution edges: an HTTP snapshot
//! endpoint (pull) and a WebSocket event stream (push).
//!
//! ## Architecture
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Feed Hub Architecture                            │
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                      FeedHub (Axum)                             │   │
//! │  │                                                                 │   │
//! │  │  GET /snapshot ──► EngineHandle::snapshot() ──► JSON           │   │
//! │  │  GET /ws       ──► WebSocket upgrade                           │   │
//! │  │                        │                                        │   │
//! │  │                        ▼                                        │   │
//! │  │          EventDistributor subscription, one per client;        │   │
//! │  │          every ForecourtEvent forwarded as a JSON text frame   │   │
//! │  │                                                                 │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │                                                                         │
//! │  A slow client lags its own broadcast buffer and silently loses the    │
//! │  oldest events (no replay); it catches up from its next snapshot       │
//! │  pull. No client can block the engine or its siblings.                 │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    http::StatusCode,
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpListener;
use tokio::sync::{broadcast, mpsc};
use tokio::time::{interval, Duration};
use tracing::{debug, info, warn};

use forecourt_core::StatusSnapshot;
use forecourt_engine::{EngineHandle, EventDistributor};

use crate::error::{FeedError, FeedResult};

// =============================================================================
// Constants
// =============================================================================

/// Default port for the feed hub.
pub const DEFAULT_HUB_PORT: u16 = 8640;

/// Ping interval to keep push connections alive.
const PING_INTERVAL: Duration = Duration::from_secs(30);

/// Maximum inbound message size (64KB; clients only ever send control
/// frames, anything bigger is a misbehaving peer).
const MAX_MESSAGE_SIZE: usize = 64 * 1024;

// =============================================================================
// Hub Configuration
// =============================================================================

/// Configuration for the feed hub.
#[derive(Debug, Clone)]
pub struct HubConfig {
    /// Port to listen on.
    pub port: u16,
    /// Bind address (default: 0.0.0.0).
    pub bind_addr: String,
}

impl Default for HubConfig {
    fn default() -> Self {
        HubConfig {
            port: DEFAULT_HUB_PORT,
            bind_addr: "0.0.0.0".to_string(),
        }
    }
}

impl HubConfig {
    /// Returns the full bind address.
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.bind_addr, self.port)
    }
}

// =============================================================================
// Hub State
// =============================================================================

/// Shared state for the hub's handlers.
struct HubState {
    /// Snapshot reads go straight to the engine.
    engine: EngineHandle,
    /// Push clients subscribe here.
    distributor: EventDistributor,
}

// =============================================================================
// Feed Hub
// =============================================================================

/// The station-side feed server.
pub struct FeedHub {
    config: HubConfig,
    state: Arc<HubState>,
}

/// Handle for controlling a started hub.
#[derive(Clone)]
pub struct HubHandle {
    addr: SocketAddr,
    shutdown_tx: mpsc::Sender<()>,
}

impl HubHandle {
    /// The address the hub actually bound (relevant when configured with
    /// port 0).
    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Shuts down the hub server.
    pub async fn shutdown(&self) -> FeedResult<()> {
        self.shutdown_tx
            .send(())
            .await
            .map_err(|_| FeedError::ChannelError("hub shutdown channel closed".into()))
    }
}

impl FeedHub {
    /// Creates a new hub over the engine and distributor.
    pub fn new(config: HubConfig, engine: EngineHandle, distributor: EventDistributor) -> Self {
        let state = Arc::new(HubState {
            engine,
            distributor,
        });
        FeedHub { config, state }
    }

    /// Binds the listener, spawns the server, returns its handle.
    pub async fn start(self) -> FeedResult<HubHandle> {
        let (shutdown_tx, mut shutdown_rx) = mpsc::channel::<()>(1);

        let app = Router::new()
            .route("/snapshot", get(snapshot_handler))
            .route("/ws", get(ws_handler))
            .route("/health", get(health_handler))
            .with_state(self.state.clone());

        let bind_addr = self.config.bind_address();
        let listener = TcpListener::bind(&bind_addr)
            .await
            .map_err(|e| FeedError::BindFailed(format!("{bind_addr}: {e}")))?;
        let addr = listener
            .local_addr()
            .map_err(|e| FeedError::BindFailed(e.to_string()))?;

        info!(addr = %addr, "Feed hub started");

        tokio::spawn(async move {
            axum::serve(listener, app)
                .with_graceful_shutdown(async move {
                    shutdown_rx.recv().await;
                    info!("Feed hub shutting down");
                })
                .await
                .ok();
        });

        Ok(HubHandle { addr, shutdown_tx })
    }
}

// =============================================================================
// Handlers
// =============================================================================

/// Health check endpoint.
async fn health_handler() -> impl IntoResponse {
    "OK"
}

/// The pull edge: a fresh point-in-time snapshot from the engine.
async fn snapshot_handler(
    State(state): State<Arc<HubState>>,
) -> Result<Json<StatusSnapshot>, StatusCode> {
    match state.engine.snapshot().await {
        Ok(snapshot) => Ok(Json(snapshot)),
        Err(e) => {
            warn!(error = %e, "Snapshot read failed");
            Err(StatusCode::SERVICE_UNAVAILABLE)
        }
    }
}

/// The push edge: WebSocket upgrade.
async fn ws_handler(ws: WebSocketUpgrade, State(state): State<Arc<HubState>>) -> impl IntoResponse {
    ws.max_message_size(MAX_MESSAGE_SIZE)
        .on_upgrade(move |socket| handle_socket(socket, state))
}

/// Forwards distributor events to one push client until it goes away.
async fn handle_socket(socket: WebSocket, state: Arc<HubState>) {
    info!("Push client connected");
    let (mut sender, mut receiver) = socket.split();
    let mut events = state.distributor.subscribe();

    let mut ping_interval = interval(PING_INTERVAL);
    ping_interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            event = events.recv() => {
                match event {
                    Ok(event) => {
                        let json = match serde_json::to_string(&event) {
                            Ok(json) => json,
                            Err(e) => {
                                warn!(error = %e, "Failed to encode event");
                                continue;
                            }
                        };
                        if sender.send(Message::Text(json.into())).await.is_err() {
                            break;
                        }
                    }
                    Err(broadcast::error::RecvError::Lagged(missed)) => {
                        // Per-subscriber loss, invisible to everyone else.
                        // The client recovers from its next snapshot pull.
                        warn!(missed, "Push client lagged, dropping events");
                        continue;
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }

            incoming = receiver.next() => {
                match incoming {
                    Some(Ok(Message::Ping(data))) => {
                        if sender.send(Message::Pong(data)).await.is_err() {
                            break;
                        }
                    }
                    Some(Ok(Message::Close(_))) | None => {
                        info!("Push client disconnected");
                        break;
                    }
                    Some(Ok(Message::Pong(_))) => {
                        // Connection is alive.
                    }
                    Some(Ok(other)) => {
                        // The push channel is one-way; clients have nothing
                        // to say.
                        debug!(?other, "Ignoring unexpected client message");
                    }
                    Some(Err(e)) => {
                        warn!(error = %e, "Push client socket error");
                        break;
                    }
                }
            }

            _ = ping_interval.tick() => {
                if sender.send(Message::Ping(axum::body::Bytes::new())).await.is_err() {
                    break;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hub_config_default() {
        let config = HubConfig::default();
        assert_eq!(config.port, DEFAULT_HUB_PORT);
        assert_eq!(config.bind_addr, "0.0.0.0");
    }

    #[test]
    fn test_hub_config_bind_address() {
        let config = HubConfig {
            port: 9000,
            bind_addr: "127.0.0.1".to_string(),
        };
        assert_eq!(config.bind_address(), "127.0.0.1:9000");
    }
}
