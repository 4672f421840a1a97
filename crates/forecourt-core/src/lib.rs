//! # forecourt-core: Pure Domain Logic for the Forecourt Subsystem
//!
//! This crate is the **heart** of the forecourt simulation. It contains the
//! authoritative pump/tank state types, the event payloads that travel over
//! the feed, and the status inference rules - all as pure logic with zero
//! I/O dependencies.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Forecourt Architecture                             │
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                 forecourt-engine (mutator)                      │   │
//! │  │    Clock ──► tick() ──► Model ──► events ──► Distributor       │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │             ★ forecourt-core (THIS CRATE) ★                     │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────┐  ┌───────────┐  ┌───────────┐  ┌───────────┐  │   │
//! │  │   │   types   │  │  events   │  │  status   │  │   error   │  │   │
//! │  │   │ Pump/Tank │  │ Forecourt │  │ inference │  │  Command  │  │   │
//! │  │   │ Snapshot  │  │  Event    │  │   rules   │  │  Error    │  │   │
//! │  │   └───────────┘  └───────────┘  └───────────┘  └───────────┘  │   │
//! │  │                                                                 │   │
//! │  │   NO I/O • NO DATABASE • NO NETWORK • PURE FUNCTIONS           │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │          forecourt-feed (reconciler + inference consumers)      │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`types`] - Domain types (Pump, Tank, FuelingTransaction, Preset, ...)
//! - [`events`] - Wire payloads published by the event distributor
//! - [`status`] - Status inference over noisy, partially-populated payloads
//! - [`error`] - Command rejection error taxonomy
//!
//! ## Design Principles
//!
//! 1. **Pure Functions**: inference is deterministic - same input = same output
//! 2. **No I/O**: database, network, file system access is FORBIDDEN here
//! 3. **Derived Invariants**: `amount == volume * price` and
//!    `filling_percentage` are always recomputed, never stored independently
//! 4. **Explicit Errors**: command rejections are typed, never strings

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod events;
pub mod status;
pub mod types;

// =============================================================================
// Re-exports for Convenience
// =============================================================================

pub use error::{CommandError, CommandResult, TargetKind};
pub use events::ForecourtEvent;
pub use status::{infer_nozzle_status, infer_pump_status, OperatingStatus, PumpMode, RawPumpStatus};
pub use types::{FuelingTransaction, Preset, Pump, PumpState, StatusSnapshot, Tank};

// =============================================================================
// Crate-Level Constants
// =============================================================================

/// Number of decimal places used when presenting currency amounts.
///
/// ## Why presentation-only?
/// Stored amounts are kept unrounded so `amount == volume * price` holds
/// exactly at every tick. Rounding happens once, at the display boundary.
pub const AMOUNT_DISPLAY_DECIMALS: u32 = 2;

/// Rounds a currency amount to two decimal places for presentation.
///
/// Never call this before storing an amount on a pump or a transaction.
#[inline]
pub fn display_amount(amount: f64) -> f64 {
    let factor = 10f64.powi(AMOUNT_DISPLAY_DECIMALS as i32);
    (amount * factor).round() / factor
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_amount_rounds_to_cents() {
        assert_eq!(display_amount(50.000000000000004), 50.0);
        assert_eq!(display_amount(12.345), 12.35);
        assert_eq!(display_amount(12.344), 12.34);
    }
}
