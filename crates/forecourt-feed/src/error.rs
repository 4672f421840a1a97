//! # Feed Error Types
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                       Feed Error Categories                             │
//! │                                                                         │
//! │  ┌─────────────────┐  ┌─────────────────┐  ┌─────────────────────────┐ │
//! │  │   Transport     │  │    Protocol     │  │      Internal           │ │
//! │  │                 │  │                 │  │                         │ │
//! │  │  ConnectionFail │  │  Serialization  │  │  SnapshotFailed         │ │
//! │  │  Disconnected   │  │  InvalidUrl     │  │  ChannelError           │ │
//! │  │  Timeout        │  │                 │  │  BindFailed             │ │
//! │  │  WebSocket      │  │                 │  │                         │ │
//! │  └─────────────────┘  └─────────────────┘  └─────────────────────────┘ │
//! │                                                                         │
//! │  None of these are fatal. Transport failures feed the reconnect        │
//! │  state machine; everything else is logged and the component degrades  │
//! │  to pull-only operation.                                               │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use thiserror::Error;

/// Result type alias for feed operations.
pub type FeedResult<T> = Result<T, FeedError>;

/// Feed error type covering hub and reconciler failures.
#[derive(Debug, Error)]
pub enum FeedError {
    /// Invalid hub URL.
    #[error("invalid feed URL: {0}")]
    InvalidUrl(String),

    /// Failed to establish the push channel.
    #[error("connection failed: {0}")]
    ConnectionFailed(String),

    /// Push channel dropped unexpectedly.
    #[error("disconnected from feed hub")]
    Disconnected,

    /// Connection timeout.
    #[error("connection timeout after {0} seconds")]
    Timeout(u64),

    /// WebSocket protocol error.
    #[error("websocket error: {0}")]
    WebSocket(String),

    /// Failed to serialize or deserialize a wire payload.
    #[error("serialization failed: {0}")]
    Serialization(String),

    /// A snapshot pull failed.
    #[error("snapshot pull failed: {0}")]
    SnapshotFailed(String),

    /// Failed to bind the hub listener.
    #[error("failed to bind hub: {0}")]
    BindFailed(String),

    /// Channel send/receive failed.
    #[error("channel error: {0}")]
    ChannelError(String),
}

// =============================================================================
// Error Conversions
// =============================================================================

impl From<serde_json::Error> for FeedError {
    fn from(err: serde_json::Error) -> Self {
        FeedError::Serialization(err.to_string())
    }
}

impl From<url::ParseError> for FeedError {
    fn from(err: url::ParseError) -> Self {
        FeedError::InvalidUrl(err.to_string())
    }
}

impl From<reqwest::Error> for FeedError {
    fn from(err: reqwest::Error) -> Self {
        FeedError::SnapshotFailed(err.to_string())
    }
}

impl From<forecourt_engine::EngineError> for FeedError {
    fn from(err: forecourt_engine::EngineError) -> Self {
        FeedError::SnapshotFailed(err.to_string())
    }
}

impl From<tokio_tungstenite::tungstenite::Error> for FeedError {
    fn from(err: tokio_tungstenite::tungstenite::Error) -> Self {
        use tokio_tungstenite::tungstenite::Error as WsError;
        match err {
            WsError::ConnectionClosed | WsError::AlreadyClosed => FeedError::Disconnected,
            WsError::Protocol(p) => FeedError::WebSocket(p.to_string()),
            WsError::Io(io) => FeedError::ConnectionFailed(io.to_string()),
            other => FeedError::WebSocket(other.to_string()),
        }
    }
}

// =============================================================================
// Error Categorization (for retry logic)
// =============================================================================

impl FeedError {
    /// Returns true if the operation can be retried after backoff.
    ///
    /// Transport failures are transient by assumption; URL and
    /// serialization problems will not fix themselves.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            FeedError::ConnectionFailed(_)
                | FeedError::Disconnected
                | FeedError::Timeout(_)
                | FeedError::WebSocket(_)
                | FeedError::SnapshotFailed(_)
        )
    }
}
