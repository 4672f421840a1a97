//! # forecourt-engine: Forecourt Simulation Engine
//!
//! This crate simulates the physical behavior of fuel pumps and underground
//! tanks as a discrete-time state machine and fans out every state change
//! to subscribers.
//!
//! ## Execution Model
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Engine Execution Model                             │
//! │                                                                         │
//! │                 ┌───────────────────────────────────┐                   │
//! │   clock tick ──►│                                   │                   │
//! │                 │   ForecourtEngine (single task)   │──► events ──►     │
//! │   authorize ───►│                                   │    EventDistrib.  │
//! │   stop ────────►│   tokio::select! serializes      │                   │
//! │   setTankLevel ►│   ticks and commands: a command  │──► completed ──►  │
//! │                 │   always completes fully before  │    transactions   │
//! │   snapshot ────►│   the next tick begins, and      │    (try_send,     │
//! │                 │   vice versa. At most one tick   │     never blocks) │
//! │                 │   is ever in flight.             │                   │
//! │                 └───────────────────────────────────┘                   │
//! │                                                                         │
//! │  The TransactionRecorder is the ONLY thing allowed to run concurrently │
//! │  with subsequent ticks; its failures are caught and logged, never      │
//! │  propagated back to the engine.                                        │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Organization
//! - [`config`] - Station configuration (tick period, flow rate, pumps/tanks)
//! - [`model`] - The authoritative pump/tank model plus sim bookkeeping
//! - [`engine`] - Tick physics, command application, actor loop and handle
//! - [`distributor`] - Best-effort event fan-out
//! - [`recorder`] - Fire-and-forget transaction persistence
//! - [`error`] - Engine error types
//!
//! ## Usage
//! ```rust,ignore
//! use forecourt_engine::{EngineHandle, EventDistributor, ForecourtConfig, ForecourtEngine};
//!
//! let config = ForecourtConfig::default();
//! let distributor = EventDistributor::new(256);
//! let handle = ForecourtEngine::spawn(config, distributor.clone(), None);
//!
//! handle.authorize(1, 1, None, 1.65, "attendant-7".into()).await?;
//! let snapshot = handle.snapshot().await?;
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod config;
pub mod distributor;
pub mod engine;
pub mod error;
pub mod model;
pub mod recorder;

// =============================================================================
// Re-exports
// =============================================================================

pub use config::{ForecourtConfig, PumpConfig, TankConfig};
pub use distributor::EventDistributor;
pub use engine::{EngineHandle, ForecourtEngine};
pub use error::{EngineError, EngineResult, PersistenceError};
pub use model::ForecourtModel;
pub use recorder::{RecorderHandle, TransactionRecorder, TransactionStore};
