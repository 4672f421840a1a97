//! # Domain Types
//!
//! Core domain types for the forecourt subsystem.
//!
//! ## Type Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Domain Types                                    │
//! │                                                                         │
//! │  ┌─────────────────┐   ┌─────────────────┐   ┌─────────────────────┐  │
//! │  │      Pump       │   │      Tank       │   │ FuelingTransaction  │  │
//! │  │  ─────────────  │   │  ─────────────  │   │  ─────────────────  │  │
//! │  │  number         │   │  number         │   │  id (UUID)          │  │
//! │  │  status         │   │  productVolume  │   │  pump / nozzle      │  │
//! │  │  volume/amount  │   │  fillingPct (*) │   │  volume / amount    │  │
//! │  │  transactionId  │   │  waterVolume    │   │  synced flag        │  │
//! │  └─────────────────┘   └─────────────────┘   └─────────────────────┘  │
//! │                                                                         │
//! │  ┌─────────────────┐   ┌─────────────────┐                            │
//! │  │    PumpState    │   │     Preset      │                            │
//! │  │  ─────────────  │   │  ─────────────  │                            │
//! │  │  Idle           │   │  Amount(f64)    │                            │
//! │  │  Authorized     │   │  Volume(f64)    │                            │
//! │  │  Filling        │   └─────────────────┘                            │
//! │  │  EndOfTransaction                                                   │
//! │  └─────────────────┘                                                   │
//! │                                                                         │
//! │  (*) fillingPercentage is always recomputed from productVolume,        │
//! │      never stored independently of it.                                 │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Derived Invariants
//! - `Pump::amount == Pump::volume * Pump::price` at all times (exact).
//! - `Pump::volume` resets to 0 only on the transition into `Authorized`.
//! - `Tank::filling_percentage == product_volume / capacity * 100`.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Simulated shell height of an underground tank, in millimetres.
///
/// Used to derive `product_height` as a linear proxy of `product_volume`.
/// Real probes report height and derive volume from strapping tables; the
/// simulator goes the other way.
pub const TANK_SHELL_HEIGHT_MM: f64 = 2500.0;

// =============================================================================
// Pump State
// =============================================================================

/// Operating state of a pump, as tracked by the simulation engine.
///
/// ```text
/// Idle ──authorize──► Authorized ──dwell elapsed──► Filling
///  ▲                      │                            │
///  │        stop          │         ceiling / preset / stop
///  ├──────────────────────┘                            ▼
///  └────────── stop ────────────────────── EndOfTransaction
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum PumpState {
    /// No active or pending transaction.
    Idle,
    /// Authorized by an attendant, waiting out the nozzle-lift dwell.
    Authorized,
    /// Actively dispensing fuel.
    Filling,
    /// Dispensing finished; transaction awaiting finalization.
    EndOfTransaction,
}

impl Default for PumpState {
    fn default() -> Self {
        PumpState::Idle
    }
}

// =============================================================================
// Pump
// =============================================================================

/// A dispensing unit with one or more nozzles and at most one active
/// transaction.
///
/// Created once at station initialization; mutated exclusively by the
/// simulation engine and its command handlers; never destroyed, only reset
/// to `Idle`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Pump {
    /// Pump number, unique within a station.
    pub number: u32,

    /// Current operating state.
    pub status: PumpState,

    /// Active nozzle number, 0 when none is lifted.
    pub nozzle: u32,

    /// Litres dispensed in the current transaction.
    /// Monotonically non-decreasing while filling; resets to 0 only on the
    /// transition into `Authorized`.
    pub volume: f64,

    /// Currency value of the current transaction. Always exactly
    /// `volume * price` - stored unrounded, rounded only at presentation.
    pub amount: f64,

    /// Currency per litre, fixed for the duration of a transaction.
    pub price: f64,

    /// Identifier of the running transaction, 0 when none is active.
    /// Assigned from a monotonically increasing counter when fueling starts.
    pub transaction_id: i64,

    /// Identifier of the most recently finalized transaction, if any.
    /// This is the "last transaction" signal the status inference layer
    /// uses to tell "just finished" apart from "never used".
    pub last_transaction_id: Option<i64>,

    /// Attendant who authorized the pump; `None` when idle.
    pub user: Option<String>,
}

impl Pump {
    /// Creates a pump in its initial idle state.
    pub fn new(number: u32) -> Self {
        Pump {
            number,
            status: PumpState::Idle,
            nozzle: 0,
            volume: 0.0,
            amount: 0.0,
            price: 0.0,
            transaction_id: 0,
            last_transaction_id: None,
            user: None,
        }
    }

    /// True while the pump is dispensing with a live transaction.
    pub fn has_active_transaction(&self) -> bool {
        self.volume > 0.0 && self.transaction_id > 0 && self.nozzle > 0
    }

    /// Amount rounded for presentation (2 decimal places).
    pub fn display_amount(&self) -> f64 {
        crate::display_amount(self.amount)
    }
}

// =============================================================================
// Tank
// =============================================================================

/// An underground storage reservoir supplying product volume.
///
/// `filling_percentage` and `product_height` are derived from
/// `product_volume`; all mutation goes through [`Tank::set_product_volume`]
/// and [`Tank::drain`] so the derived fields can never drift.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Tank {
    /// Tank number, unique within a station.
    pub number: u32,

    /// Declared capacity in litres.
    pub capacity: f64,

    /// Litres of product currently held.
    pub product_volume: f64,

    /// Derived proxy measurement in millimetres (linear against capacity).
    pub product_height: f64,

    /// Product temperature in degrees Celsius (static in the simulator).
    pub temperature: f64,

    /// Water contamination proxy: height of the water layer in millimetres.
    pub water_height: f64,

    /// Water contamination proxy: water volume in litres.
    pub water_volume: f64,

    /// `product_volume / capacity * 100`. Recomputed on every mutation.
    pub filling_percentage: f64,
}

impl Tank {
    /// Creates a tank with the given capacity and initial product volume.
    pub fn new(number: u32, capacity: f64, initial_volume: f64) -> Self {
        let mut tank = Tank {
            number,
            capacity,
            product_volume: 0.0,
            product_height: 0.0,
            temperature: 15.0,
            water_height: 4.0,
            water_volume: 18.0,
            filling_percentage: 0.0,
        };
        tank.set_product_volume(initial_volume);
        tank
    }

    /// Sets the product volume and recomputes the derived fields.
    ///
    /// Used by the operator "set level" override; this is not a physical
    /// delivery simulation, so negative inputs are clamped to zero.
    pub fn set_product_volume(&mut self, volume: f64) {
        self.product_volume = volume.max(0.0).min(self.capacity);
        self.recompute_derived();
    }

    /// Drains up to `litres` of product and returns the litres actually
    /// removed (a nearly-empty tank yields less than requested).
    pub fn drain(&mut self, litres: f64) -> f64 {
        let drained = litres.min(self.product_volume);
        self.product_volume -= drained;
        self.recompute_derived();
        drained
    }

    fn recompute_derived(&mut self) {
        if self.capacity > 0.0 {
            self.filling_percentage = self.product_volume / self.capacity * 100.0;
            self.product_height = self.product_volume / self.capacity * TANK_SHELL_HEIGHT_MM;
        } else {
            self.filling_percentage = 0.0;
            self.product_height = 0.0;
        }
    }
}

// =============================================================================
// Preset
// =============================================================================

/// An operator-specified stopping condition for a fueling transaction.
///
/// Serialized as `{ "type": "amount", "value": 50.0 }` to match the
/// `presetType`/`presetValue` command arguments.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "camelCase")]
pub enum Preset {
    /// Stop once the accumulated amount reaches this currency value.
    Amount(f64),
    /// Stop once the dispensed volume reaches this many litres.
    Volume(f64),
}

impl Preset {
    /// The raw preset value, whichever the type.
    pub fn value(&self) -> f64 {
        match self {
            Preset::Amount(v) | Preset::Volume(v) => *v,
        }
    }

    /// True once the accumulated volume/amount has met the preset target.
    pub fn is_reached(&self, volume: f64, amount: f64) -> bool {
        match self {
            Preset::Amount(target) => amount >= *target,
            Preset::Volume(target) => volume >= *target,
        }
    }
}

// =============================================================================
// Fueling Transaction
// =============================================================================

/// One completed dispense event.
///
/// Created exactly once, at the moment a pump transitions into
/// `EndOfTransaction`. Immutable afterwards except for the `synced` flag,
/// which flips from false to true when persistence succeeds (or on a manual
/// cashier clearance).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FuelingTransaction {
    /// Record identifier (UUID v4), used as the storage key.
    pub id: Uuid,

    /// The engine's monotonically increasing transaction counter value.
    pub transaction_id: i64,

    /// Pump that dispensed.
    pub pump: u32,

    /// Nozzle used.
    pub nozzle: u32,

    /// Litres dispensed.
    pub volume: f64,

    /// Currency value (`volume * price`, unrounded).
    pub amount: f64,

    /// Currency per litre at the time of the transaction.
    pub price: f64,

    /// When the pump entered `EndOfTransaction`.
    pub completed_at: DateTime<Utc>,

    /// Whether the record has reached durable storage.
    pub synced: bool,
}

impl FuelingTransaction {
    /// Builds a completion record from a pump's current state.
    ///
    /// The record starts with `synced = false`; the transaction recorder
    /// flips it once the write is acknowledged.
    pub fn from_pump(pump: &Pump, completed_at: DateTime<Utc>) -> Self {
        FuelingTransaction {
            id: Uuid::new_v4(),
            transaction_id: pump.transaction_id,
            pump: pump.number,
            nozzle: pump.nozzle,
            volume: pump.volume,
            amount: pump.amount,
            price: pump.price,
            completed_at,
            synced: false,
        }
    }

    /// Amount rounded for presentation (2 decimal places).
    pub fn display_amount(&self) -> f64 {
        crate::display_amount(self.amount)
    }
}

// =============================================================================
// Status Snapshot
// =============================================================================

/// A point-in-time, read-only copy of all pumps and tanks.
///
/// Produced on demand by the event distributor for pull-based reads and
/// superseded immediately by the next one. `BTreeMap` keeps iteration
/// order stable across snapshots.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusSnapshot {
    /// When the snapshot was taken.
    pub taken_at: DateTime<Utc>,

    /// Pump number -> pump state.
    pub pumps: BTreeMap<u32, Pump>,

    /// Tank number -> tank state.
    pub tanks: BTreeMap<u32, Tank>,
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_pump_is_idle() {
        let pump = Pump::new(1);
        assert_eq!(pump.status, PumpState::Idle);
        assert_eq!(pump.nozzle, 0);
        assert_eq!(pump.transaction_id, 0);
        assert!(pump.user.is_none());
        assert!(!pump.has_active_transaction());
    }

    #[test]
    fn test_active_transaction_requires_all_three_signals() {
        let mut pump = Pump::new(1);
        pump.volume = 10.0;
        pump.transaction_id = 7;
        assert!(!pump.has_active_transaction()); // nozzle still 0

        pump.nozzle = 2;
        assert!(pump.has_active_transaction());
    }

    #[test]
    fn test_tank_filling_percentage_recomputed() {
        let mut tank = Tank::new(1, 20000.0, 5000.0);
        assert_eq!(tank.filling_percentage, 25.0);

        tank.set_product_volume(10000.0);
        assert_eq!(tank.filling_percentage, 50.0);
        assert_eq!(tank.product_height, TANK_SHELL_HEIGHT_MM / 2.0);
    }

    #[test]
    fn test_tank_set_level_clamps() {
        let mut tank = Tank::new(1, 20000.0, 5000.0);
        tank.set_product_volume(-50.0);
        assert_eq!(tank.product_volume, 0.0);
        assert_eq!(tank.filling_percentage, 0.0);

        tank.set_product_volume(99999.0);
        assert_eq!(tank.product_volume, 20000.0);
        assert_eq!(tank.filling_percentage, 100.0);
    }

    #[test]
    fn test_tank_drain_stops_at_empty() {
        let mut tank = Tank::new(1, 1000.0, 3.0);
        assert_eq!(tank.drain(2.0), 2.0);
        assert_eq!(tank.drain(2.0), 1.0); // only 1 litre left
        assert_eq!(tank.product_volume, 0.0);
    }

    #[test]
    fn test_preset_reached() {
        let amount = Preset::Amount(50.0);
        assert!(!amount.is_reached(10.0, 49.99));
        assert!(amount.is_reached(10.0, 50.0));

        let volume = Preset::Volume(20.0);
        assert!(!volume.is_reached(19.9, 100.0));
        assert!(volume.is_reached(20.0, 1.0));
    }

    #[test]
    fn test_preset_wire_shape() {
        let json = serde_json::to_value(Preset::Amount(50.0)).unwrap();
        assert_eq!(json["type"], "amount");
        assert_eq!(json["value"], 50.0);
    }

    #[test]
    fn test_transaction_from_pump_starts_unsynced() {
        let mut pump = Pump::new(2);
        pump.nozzle = 1;
        pump.price = 1.65;
        pump.volume = 30.0;
        pump.amount = pump.volume * pump.price;
        pump.transaction_id = 12;

        let tx = FuelingTransaction::from_pump(&pump, Utc::now());
        assert!(!tx.synced);
        assert_eq!(tx.pump, 2);
        assert_eq!(tx.transaction_id, 12);
        assert_eq!(tx.amount, pump.amount);
    }

    #[test]
    fn test_transaction_id_is_a_fresh_uuid_per_record() {
        let pump = Pump::new(1);
        let a = FuelingTransaction::from_pump(&pump, Utc::now());
        let b = FuelingTransaction::from_pump(&pump, Utc::now());
        assert_ne!(a.id, b.id);

        // The id is a Uuid in memory but a plain string on the wire.
        let json = serde_json::to_value(&a).unwrap();
        assert_eq!(json["id"], a.id.to_string());
        assert!(Uuid::parse_str(json["id"].as_str().unwrap()).is_ok());
    }

    #[test]
    fn test_pump_serializes_camel_case() {
        let pump = Pump::new(3);
        let json = serde_json::to_value(&pump).unwrap();
        assert!(json.get("transactionId").is_some());
        assert!(json.get("lastTransactionId").is_some());
        assert_eq!(json["status"], "idle");
    }
}
