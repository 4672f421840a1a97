//! # Engine Error Types
//!
//! ## Error Categories
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Engine Error Categories                            │
//! │                                                                         │
//! │  ┌──────────────────┐  ┌──────────────────┐  ┌──────────────────────┐  │
//! │  │  Command         │  │  Configuration   │  │  Internal            │  │
//! │  │                  │  │                  │  │                      │  │
//! │  │  InvalidTarget   │  │  InvalidConfig   │  │  ChannelClosed       │  │
//! │  │  InvalidParameter│  │  ConfigLoad      │  │                      │  │
//! │  └──────────────────┘  └──────────────────┘  └──────────────────────┘  │
//! │                                                                         │
//! │  Command rejections come from forecourt-core and are returned to the   │
//! │  caller synchronously. PersistenceError is separate: it is what the    │
//! │  TransactionStore reports, and it is only ever logged (the recorder    │
//! │  is fire-and-forget), never propagated into engine state.              │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use thiserror::Error;

use forecourt_core::CommandError;

/// Result type alias for engine operations.
pub type EngineResult<T> = Result<T, EngineError>;

/// Errors surfaced by the engine and its handle.
#[derive(Debug, Error)]
pub enum EngineError {
    /// A command was rejected without mutation.
    #[error(transparent)]
    Command(#[from] CommandError),

    /// Invalid station configuration.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// Failed to load the configuration file.
    #[error("failed to load config: {0}")]
    ConfigLoad(String),

    /// The engine task is gone (shutdown or panic); the command channel
    /// is closed.
    #[error("engine channel closed")]
    ChannelClosed,
}

impl From<std::io::Error> for EngineError {
    fn from(err: std::io::Error) -> Self {
        EngineError::ConfigLoad(err.to_string())
    }
}

impl From<toml::de::Error> for EngineError {
    fn from(err: toml::de::Error) -> Self {
        EngineError::ConfigLoad(err.to_string())
    }
}

/// Failure reported by a [`TransactionStore`](crate::TransactionStore)
/// implementation.
///
/// Deliberately a single opaque message: the recorder logs it and moves
/// on, so there is nothing for callers to match on.
#[derive(Debug, Error)]
#[error("persistence failure: {0}")]
pub struct PersistenceError(pub String);
