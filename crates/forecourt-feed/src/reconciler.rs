//! # Client Reconciler
//!
//! Consumer-side component that keeps a [`ReconciledView`] coherent by
//! combining a periodic snapshot pull with the WebSocket push channel,
//! reconnecting with backoff whenever the channel drops.
//!
//! ## Connection Lifecycle
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                  Push Channel Connection States                         │
//! │                                                                         │
//! │  ┌────────────┐    connect()    ┌────────────┐                         │
//! │  │Disconnected│ ──────────────► │ Connecting │                         │
//! │  └────────────┘                 └─────┬──────┘                         │
//! │        ▲                              │                                 │
//! │        │                    success   │   failure                       │
//! │        │                        ┌─────┴─────┐                          │
//! │        │                        ▼           ▼                           │
//! │        │              ┌────────────┐  ┌────────────┐                   │
//! │        │              │ Connected  │  │ Backoff    │                   │
//! │        │              └─────┬──────┘  └─────┬──────┘                   │
//! │        │                    │               │                           │
//! │        │              disconnect/error      │  timer expired            │
//! │        │                    │               │                           │
//! │        │                    ▼               │                           │
//! │        │              ┌────────────┐        │                           │
//! │        └───────────── │Reconnecting│ ◄──────┘                          │
//! │                       └────────────┘                                    │
//! │                                                                         │
//! │  The PULL LOOP runs independently of all of this: while the push       │
//! │  channel is down the view degrades to pull-only freshness and          │
//! │  self-heals once reconnection succeeds. No retry limit by default.     │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use backoff::backoff::Backoff;
use backoff::ExponentialBackoff;
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::{broadcast, RwLock};
use tokio::time::{interval, timeout, MissedTickBehavior};
use tokio_tungstenite::tungstenite::Message as WsMessage;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tracing::{debug, error, info, warn};
use url::Url;

use forecourt_core::{ForecourtEvent, StatusSnapshot};
use forecourt_engine::EngineHandle;

use crate::error::{FeedError, FeedResult};
use crate::view::ReconciledView;

// =============================================================================
// Connection State
// =============================================================================

/// Push-channel state, visible to consumers for diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// Not connected.
    Disconnected,
    /// Attempting to connect.
    Connecting,
    /// Connected and receiving events.
    Connected,
    /// Waiting before a reconnection attempt.
    Backoff,
    /// Reconnection in progress.
    Reconnecting,
}

impl std::fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConnectionState::Disconnected => write!(f, "disconnected"),
            ConnectionState::Connecting => write!(f, "connecting"),
            ConnectionState::Connected => write!(f, "connected"),
            ConnectionState::Backoff => write!(f, "backoff"),
            ConnectionState::Reconnecting => write!(f, "reconnecting"),
        }
    }
}

// =============================================================================
// Snapshot Sources
// =============================================================================

/// Where snapshot pulls come from. Keeps the reconciler independent of
/// transport: in-process against the engine, or HTTP against a hub.
#[async_trait]
pub trait SnapshotSource: Send + Sync {
    /// Fetches a fresh full snapshot.
    async fn fetch(&self) -> FeedResult<StatusSnapshot>;
}

/// Pulls snapshots straight from a local engine handle.
pub struct EngineSnapshotSource {
    engine: EngineHandle,
}

impl EngineSnapshotSource {
    pub fn new(engine: EngineHandle) -> Self {
        EngineSnapshotSource { engine }
    }
}

#[async_trait]
impl SnapshotSource for EngineSnapshotSource {
    async fn fetch(&self) -> FeedResult<StatusSnapshot> {
        self.engine.snapshot().await.map_err(FeedError::from)
    }
}

/// Pulls snapshots over HTTP from a remote hub's `/snapshot` endpoint.
pub struct HttpSnapshotSource {
    client: reqwest::Client,
    url: Url,
}

impl HttpSnapshotSource {
    pub fn new(url: &str) -> FeedResult<Self> {
        Ok(HttpSnapshotSource {
            client: reqwest::Client::new(),
            url: Url::parse(url)?,
        })
    }
}

#[async_trait]
impl SnapshotSource for HttpSnapshotSource {
    async fn fetch(&self) -> FeedResult<StatusSnapshot> {
        let snapshot = self
            .client
            .get(self.url.clone())
            .send()
            .await?
            .error_for_status()?
            .json::<StatusSnapshot>()
            .await?;
        Ok(snapshot)
    }
}

// =============================================================================
// Reconciler Configuration
// =============================================================================

/// Configuration for the client reconciler.
#[derive(Debug, Clone)]
pub struct ReconcilerConfig {
    /// WebSocket URL of the hub's push endpoint.
    pub ws_url: String,

    /// Snapshot pull cadence.
    pub poll_interval: Duration,

    /// Push-channel connection timeout.
    pub connect_timeout: Duration,

    /// Initial backoff duration.
    pub initial_backoff: Duration,

    /// Maximum backoff duration.
    pub max_backoff: Duration,

    /// Maximum reconnection attempts (0 = infinite).
    pub max_retries: u32,
}

impl Default for ReconcilerConfig {
    fn default() -> Self {
        ReconcilerConfig {
            ws_url: String::new(),
            poll_interval: Duration::from_secs(5),
            connect_timeout: Duration::from_secs(10),
            initial_backoff: Duration::from_millis(500),
            max_backoff: Duration::from_secs(60),
            max_retries: 0, // Infinite
        }
    }
}

// =============================================================================
// Reconciler Handle
// =============================================================================

/// Handle for reading the reconciled view and tearing the reconciler down.
#[derive(Clone)]
pub struct ReconcilerHandle {
    view: Arc<RwLock<ReconciledView>>,
    state: Arc<RwLock<ConnectionState>>,
    shutdown_tx: broadcast::Sender<()>,
}

impl ReconcilerHandle {
    /// A copy of the current reconciled view.
    pub async fn view(&self) -> ReconciledView {
        self.view.read().await.clone()
    }

    /// Whether the push channel is currently open.
    pub async fn connected(&self) -> bool {
        self.view.read().await.connected()
    }

    /// Current push-channel state.
    pub async fn state(&self) -> ConnectionState {
        *self.state.read().await
    }

    /// Tears down the pull loop and the push channel.
    pub fn shutdown(&self) {
        let _ = self.shutdown_tx.send(());
    }
}

// =============================================================================
// Reconciler
// =============================================================================

/// The client reconciler: one pull loop, one push loop, one shared view.
pub struct Reconciler;

impl Reconciler {
    /// Spawns the pull and push tasks and returns the handle. The push
    /// channel is attempted immediately.
    pub fn spawn(config: ReconcilerConfig, source: Arc<dyn SnapshotSource>) -> ReconcilerHandle {
        let view = Arc::new(RwLock::new(ReconciledView::new()));
        let state = Arc::new(RwLock::new(ConnectionState::Disconnected));
        let (shutdown_tx, _) = broadcast::channel(1);

        tokio::spawn(pull_loop(
            config.poll_interval,
            source.clone(),
            view.clone(),
            shutdown_tx.subscribe(),
        ));
        tokio::spawn(push_loop(
            config,
            source,
            view.clone(),
            state.clone(),
            shutdown_tx.subscribe(),
        ));

        ReconcilerHandle {
            view,
            state,
            shutdown_tx,
        }
    }
}

/// Periodic full-snapshot pull. Runs regardless of push-channel health;
/// a failed pull is logged and retried at the next cadence.
async fn pull_loop(
    poll_interval: Duration,
    source: Arc<dyn SnapshotSource>,
    view: Arc<RwLock<ReconciledView>>,
    mut shutdown_rx: broadcast::Receiver<()>,
) {
    let mut clock = interval(poll_interval);
    clock.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = clock.tick() => {
                match source.fetch().await {
                    Ok(snapshot) => {
                        view.write().await.apply_snapshot(snapshot);
                    }
                    Err(e) => {
                        warn!(error = %e, "Snapshot pull failed");
                    }
                }
            }

            _ = shutdown_rx.recv() => {
                debug!("Pull loop stopping");
                break;
            }
        }
    }
}

/// How one push connection ended.
enum ChannelExit {
    /// Shutdown was requested; stop entirely.
    Shutdown,
    /// The channel dropped; reconnect after backoff.
    Lost(FeedError),
}

/// Push-channel loop: connect, stream events into the view, reconnect
/// with exponential backoff on loss. Never gives up unless configured
/// with a retry limit.
async fn push_loop(
    config: ReconcilerConfig,
    source: Arc<dyn SnapshotSource>,
    view: Arc<RwLock<ReconciledView>>,
    state: Arc<RwLock<ConnectionState>>,
    mut shutdown_rx: broadcast::Receiver<()>,
) {
    info!(url = %config.ws_url, "Reconciler push channel starting");

    let mut backoff = create_backoff(&config);
    let mut retry_count = 0u32;

    'outer: loop {
        *state.write().await = ConnectionState::Connecting;

        match connect_with_timeout(&config).await {
            Ok(ws_stream) => {
                info!("Push channel connected");
                *state.write().await = ConnectionState::Connected;
                view.write().await.set_connected(true);

                backoff.reset();
                retry_count = 0;

                // Catch up on anything missed while disconnected; events
                // only flow from here on.
                match source.fetch().await {
                    Ok(snapshot) => view.write().await.apply_snapshot(snapshot),
                    Err(e) => warn!(error = %e, "Catch-up snapshot failed"),
                }

                match channel_loop(ws_stream, &view, &mut shutdown_rx).await {
                    ChannelExit::Shutdown => {
                        view.write().await.set_connected(false);
                        break 'outer;
                    }
                    ChannelExit::Lost(e) => {
                        warn!(error = %e, "Push channel lost");
                    }
                }
            }
            Err(e) => {
                error!(error = %e, "Push channel connect failed");
            }
        }

        // Channel down: degrade to pull-only until reconnected.
        view.write().await.set_connected(false);
        *state.write().await = ConnectionState::Backoff;

        if config.max_retries > 0 {
            retry_count += 1;
            if retry_count >= config.max_retries {
                error!(
                    max_retries = config.max_retries,
                    "Max reconnection attempts reached"
                );
                break;
            }
        }

        match backoff.next_backoff() {
            Some(duration) => {
                debug!(?duration, attempt = retry_count, "Waiting before reconnect");
                tokio::select! {
                    _ = tokio::time::sleep(duration) => {
                        *state.write().await = ConnectionState::Reconnecting;
                    }
                    _ = shutdown_rx.recv() => {
                        debug!("Shutdown during backoff");
                        break;
                    }
                }
            }
            None => {
                // Unreachable with no max_elapsed_time, kept for safety.
                error!("Backoff exhausted");
                break;
            }
        }
    }

    *state.write().await = ConnectionState::Disconnected;
    info!("Reconciler push channel stopped");
}

/// Connects the push channel with a timeout.
async fn connect_with_timeout(
    config: &ReconcilerConfig,
) -> FeedResult<WebSocketStream<MaybeTlsStream<TcpStream>>> {
    let connect_future = connect_async(&config.ws_url);

    match timeout(config.connect_timeout, connect_future).await {
        Ok(Ok((ws_stream, response))) => {
            debug!(status = ?response.status(), "Push channel handshake complete");
            Ok(ws_stream)
        }
        Ok(Err(e)) => Err(FeedError::from(e)),
        Err(_) => Err(FeedError::Timeout(config.connect_timeout.as_secs())),
    }
}

/// Streams events from one open connection into the view.
async fn channel_loop(
    ws_stream: WebSocketStream<MaybeTlsStream<TcpStream>>,
    view: &Arc<RwLock<ReconciledView>>,
    shutdown_rx: &mut broadcast::Receiver<()>,
) -> ChannelExit {
    let (mut write, mut read) = ws_stream.split();

    loop {
        tokio::select! {
            incoming = read.next() => {
                match incoming {
                    Some(Ok(WsMessage::Text(text))) => {
                        match ForecourtEvent::from_json(&text) {
                            Ok(event) => {
                                debug!(event = event.type_name(), "Push event received");
                                view.write().await.apply_event(event);
                            }
                            Err(e) => {
                                // Unknown event types are ignored, not
                                // treated as errors.
                                debug!(error = %e, "Ignoring unrecognized event payload");
                            }
                        }
                    }
                    Some(Ok(WsMessage::Ping(data))) => {
                        if let Err(e) = write.send(WsMessage::Pong(data)).await {
                            return ChannelExit::Lost(FeedError::from(e));
                        }
                    }
                    Some(Ok(WsMessage::Pong(_))) => {
                        debug!("Received pong");
                    }
                    Some(Ok(WsMessage::Close(frame))) => {
                        info!(?frame, "Hub closed the push channel");
                        return ChannelExit::Lost(FeedError::Disconnected);
                    }
                    Some(Ok(WsMessage::Binary(_))) => {
                        warn!("Ignoring unexpected binary frame");
                    }
                    Some(Ok(WsMessage::Frame(_))) => {
                        // Raw frame, ignore.
                    }
                    Some(Err(e)) => {
                        return ChannelExit::Lost(FeedError::from(e));
                    }
                    None => {
                        return ChannelExit::Lost(FeedError::Disconnected);
                    }
                }
            }

            _ = shutdown_rx.recv() => {
                info!("Shutdown requested, closing push channel");
                let _ = write.send(WsMessage::Close(None)).await;
                return ChannelExit::Shutdown;
            }
        }
    }
}

/// Exponential backoff with no overall deadline.
fn create_backoff(config: &ReconcilerConfig) -> ExponentialBackoff {
    ExponentialBackoff {
        initial_interval: config.initial_backoff,
        max_interval: config.max_backoff,
        multiplier: 2.0,
        max_elapsed_time: None,
        ..Default::default()
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use forecourt_engine::{EventDistributor, ForecourtConfig, ForecourtEngine};

    #[test]
    fn test_connection_state_display() {
        assert_eq!(ConnectionState::Connected.to_string(), "connected");
        assert_eq!(ConnectionState::Backoff.to_string(), "backoff");
    }

    #[test]
    fn test_reconciler_config_default() {
        let config = ReconcilerConfig::default();
        assert_eq!(config.poll_interval, Duration::from_secs(5));
        assert_eq!(config.max_retries, 0); // Infinite
    }

    #[test]
    fn test_http_source_rejects_bad_url() {
        assert!(matches!(
            HttpSnapshotSource::new("not a url"),
            Err(FeedError::InvalidUrl(_))
        ));
    }

    #[tokio::test]
    async fn test_engine_snapshot_source() {
        let mut config = ForecourtConfig::default();
        config.tick_interval_ms = 60_000;
        let handle = ForecourtEngine::spawn(config, EventDistributor::new(16), None);

        let source = EngineSnapshotSource::new(handle.clone());
        let snapshot = source.fetch().await.unwrap();
        assert!(snapshot.pumps.contains_key(&1));

        handle.shutdown().await.unwrap();
    }

    /// With the push endpoint unreachable, the view must still fill from
    /// pulls and report the channel as down.
    #[tokio::test]
    async fn test_pull_only_operation_when_channel_unreachable() {
        let mut engine_config = ForecourtConfig::default();
        engine_config.tick_interval_ms = 60_000;
        let engine = ForecourtEngine::spawn(engine_config, EventDistributor::new(16), None);

        let config = ReconcilerConfig {
            // Nothing listens here; connects fail immediately.
            ws_url: "ws://127.0.0.1:9/ws".into(),
            poll_interval: Duration::from_millis(50),
            connect_timeout: Duration::from_millis(200),
            initial_backoff: Duration::from_millis(50),
            max_backoff: Duration::from_millis(100),
            max_retries: 0,
        };
        let handle = Reconciler::spawn(
            config,
            Arc::new(EngineSnapshotSource::new(engine.clone())),
        );

        tokio::time::sleep(Duration::from_millis(300)).await;

        let view = handle.view().await;
        assert!(view.pump(1).is_some(), "pulls should populate the view");
        assert!(!view.connected());

        handle.shutdown();
        engine.shutdown().await.unwrap();
    }
}
