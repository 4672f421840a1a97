//! # forecourt-feed: Push/Pull Distribution and Client Reconciliation
//!
//! This crate carries forecourt state between the station's engine and its
//! consumers: the [`hub`] serves both distribution edges, and the
//! [`reconciler`] merges them back into one coherent client-side view.
//!
//! ## Data Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Feed Data Flow                                   │
//! │                                                                         │
//! │  Engine ──events──► EventDistributor ──► FeedHub ──┬── GET /snapshot   │
//! │    ▲                                               └── GET /ws         │
//! │    └───────────snapshot reads──────────────────────────────┘           │
//! │                                                                         │
//! │  Consumer side:                                                         │
//! │                                                                         │
//! │   pull (SnapshotSource) ──┐                                            │
//! │                           ├──► ReconciledView ──► status inference     │
//! │   push (WebSocket) ───────┘    (last write per id wins)                │
//! │                                                                         │
//! │  Channel loss is NON-FATAL: the reconciler flips `connected` to        │
//! │  false, keeps pulling, and reconnects with exponential backoff.        │
//! │  Worst case is "state goes stale until the next successful pull".      │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Organization
//! - [`hub`] - Station-side axum server (snapshot + event stream)
//! - [`view`] - The per-entity last-write-wins reconciled view
//! - [`reconciler`] - Pull loop + push channel with backoff reconnect
//! - [`error`] - Feed error types
//!
//! ## Usage
//! ```rust,ignore
//! use forecourt_feed::{Reconciler, ReconcilerConfig, HttpSnapshotSource};
//! use std::sync::Arc;
//!
//! let source = Arc::new(HttpSnapshotSource::new("http://station:8640/snapshot")?);
//! let config = ReconcilerConfig {
//!     ws_url: "ws://station:8640/ws".into(),
//!     ..Default::default()
//! };
//! let handle = Reconciler::spawn(config, source);
//! let view = handle.view().await;
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod hub;
pub mod reconciler;
pub mod view;

// =============================================================================
// Re-exports
// =============================================================================

pub use error::{FeedError, FeedResult};
pub use hub::{FeedHub, HubConfig, HubHandle, DEFAULT_HUB_PORT};
pub use reconciler::{
    ConnectionState, EngineSnapshotSource, HttpSnapshotSource, Reconciler, ReconcilerConfig,
    ReconcilerHandle, SnapshotSource,
};
pub use view::ReconciledView;
