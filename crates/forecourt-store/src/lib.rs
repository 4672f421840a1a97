//! # forecourt-store: Transaction Storage for the Forecourt
//!
//! SQLite-backed persistence for completed fueling transactions.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Forecourt Data Flow                                │
//! │                                                                         │
//! │  ForecourtEngine ──completed transaction──► TransactionRecorder        │
//! │                                                   │                     │
//! │                                                   ▼                     │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                  forecourt-store (THIS CRATE)                   │   │
//! │  │                                                                 │   │
//! │  │   ┌────────────────────┐        ┌───────────────────────────┐  │   │
//! │  │   │   StoreConfig      │        │  SqliteTransactionStore   │  │   │
//! │  │   │   (pool settings)  │───────►│  (implements the engine's │  │   │
//! │  │   │                    │        │   TransactionStore trait) │  │   │
//! │  │   └────────────────────┘        └───────────────────────────┘  │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │                                                   │                     │
//! │                                                   ▼                     │
//! │                                       SQLite (WAL mode)                │
//! │                                                                         │
//! │  Records land with synced = 0; reconciliation flips the flag after a  │
//! │  successful push. Neither path ever blocks the simulation clock.      │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Organization
//! - [`store`] - Pool configuration and the SQLite store
//! - [`error`] - Store error types
//!
//! ## Usage
//! ```rust,ignore
//! use forecourt_store::{SqliteTransactionStore, StoreConfig};
//!
//! let store = SqliteTransactionStore::open(StoreConfig::new("./forecourt.db")).await?;
//! let pending = store.unsynced_records().await?;
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod store;

// =============================================================================
// Re-exports
// =============================================================================

pub use error::{StoreError, StoreResult};
pub use store::{SqliteTransactionStore, StoreConfig};
