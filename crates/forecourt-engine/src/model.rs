//! # Forecourt Model
//!
//! The authoritative in-memory state of every pump and tank at a station,
//! plus the simulation bookkeeping that never leaves the engine (dwell
//! counters, pending presets, the transaction id counter).
//!
//! ## Mutation Discipline
//! The model is mutated ONLY by the simulation engine's single execution
//! context. There is deliberately no interior mutability and no locking
//! here: any access from elsewhere must go through the engine's command
//! interface, which serializes everything.

use std::collections::{BTreeMap, HashMap};

use chrono::Utc;

use forecourt_core::{Preset, Pump, StatusSnapshot, Tank};

use crate::config::ForecourtConfig;

/// Authoritative pump/tank state for one station.
#[derive(Debug)]
pub struct ForecourtModel {
    /// Pump number -> pump. Created at initialization, never destroyed.
    pumps: BTreeMap<u32, Pump>,

    /// Tank number -> tank.
    tanks: BTreeMap<u32, Tank>,

    /// Ticks elapsed since authorization, per authorized pump.
    /// The marker is cleared exactly once, on the transition into Filling.
    dwell: HashMap<u32, u32>,

    /// Pending preset per authorized/filling pump.
    presets: HashMap<u32, Preset>,

    /// Next value of the monotonically increasing transaction counter.
    next_transaction_id: i64,
}

impl ForecourtModel {
    /// Builds the model from the station configuration.
    pub fn new(config: &ForecourtConfig) -> Self {
        let pumps = config
            .pumps
            .iter()
            .map(|p| (p.number, Pump::new(p.number)))
            .collect();
        let tanks = config
            .tanks
            .iter()
            .map(|t| (t.number, Tank::new(t.number, t.capacity, t.initial_volume)))
            .collect();

        ForecourtModel {
            pumps,
            tanks,
            dwell: HashMap::new(),
            presets: HashMap::new(),
            next_transaction_id: 1,
        }
    }

    // =========================================================================
    // Accessors
    // =========================================================================

    pub fn pump(&self, number: u32) -> Option<&Pump> {
        self.pumps.get(&number)
    }

    pub fn pump_mut(&mut self, number: u32) -> Option<&mut Pump> {
        self.pumps.get_mut(&number)
    }

    pub fn tank(&self, number: u32) -> Option<&Tank> {
        self.tanks.get(&number)
    }

    pub fn tank_mut(&mut self, number: u32) -> Option<&mut Tank> {
        self.tanks.get_mut(&number)
    }

    /// All pump numbers, in stable ascending order.
    pub fn pump_numbers(&self) -> Vec<u32> {
        self.pumps.keys().copied().collect()
    }

    /// Pump number -> pump mapping (cloned for read interfaces).
    pub fn pump_statuses(&self) -> BTreeMap<u32, Pump> {
        self.pumps.clone()
    }

    /// Tank number -> tank mapping (cloned for read interfaces).
    pub fn tank_statuses(&self) -> BTreeMap<u32, Tank> {
        self.tanks.clone()
    }

    /// The tank every filling pump draws from.
    ///
    /// All pumps drain the station's lowest-numbered tank regardless of
    /// nozzle/grade. This mirrors the observed behavior of the system this
    /// simulator models and is almost certainly a simplification of the
    /// intended per-grade routing; see DESIGN.md.
    pub fn primary_tank_number(&self) -> Option<u32> {
        self.tanks.keys().next().copied()
    }

    /// Produces a point-in-time, read-only copy of all pumps and tanks.
    pub fn snapshot(&self) -> StatusSnapshot {
        StatusSnapshot {
            taken_at: Utc::now(),
            pumps: self.pumps.clone(),
            tanks: self.tanks.clone(),
        }
    }

    // =========================================================================
    // Simulation Bookkeeping
    // =========================================================================

    /// Starts the dwell counter for a freshly authorized pump.
    pub fn start_dwell(&mut self, pump: u32) {
        self.dwell.insert(pump, 0);
    }

    /// Advances the dwell counter and returns its new value.
    pub fn advance_dwell(&mut self, pump: u32) -> u32 {
        let counter = self.dwell.entry(pump).or_insert(0);
        *counter += 1;
        *counter
    }

    /// Clears the dwell marker. Called exactly once, at the transition
    /// into Filling (or when an authorization is cancelled).
    pub fn clear_dwell(&mut self, pump: u32) {
        self.dwell.remove(&pump);
    }

    pub fn set_preset(&mut self, pump: u32, preset: Option<Preset>) {
        match preset {
            Some(p) => {
                self.presets.insert(pump, p);
            }
            None => {
                self.presets.remove(&pump);
            }
        }
    }

    pub fn preset(&self, pump: u32) -> Option<Preset> {
        self.presets.get(&pump).copied()
    }

    pub fn clear_preset(&mut self, pump: u32) {
        self.presets.remove(&pump);
    }

    /// Hands out the next transaction id. Monotonically increasing for the
    /// lifetime of the model.
    pub fn allocate_transaction_id(&mut self) -> i64 {
        let id = self.next_transaction_id;
        self.next_transaction_id += 1;
        id
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_model_built_from_config() {
        let model = ForecourtModel::new(&ForecourtConfig::default());
        assert_eq!(model.pump_numbers(), vec![1, 2]);
        assert!(model.pump(1).is_some());
        assert!(model.pump(9).is_none());
        assert_eq!(model.primary_tank_number(), Some(1));
    }

    #[test]
    fn test_transaction_ids_are_monotonic() {
        let mut model = ForecourtModel::new(&ForecourtConfig::default());
        let a = model.allocate_transaction_id();
        let b = model.allocate_transaction_id();
        let c = model.allocate_transaction_id();
        assert!(a < b && b < c);
        assert_eq!(a, 1);
    }

    #[test]
    fn test_dwell_counter_lifecycle() {
        let mut model = ForecourtModel::new(&ForecourtConfig::default());
        model.start_dwell(1);
        assert_eq!(model.advance_dwell(1), 1);
        assert_eq!(model.advance_dwell(1), 2);
        model.clear_dwell(1);
        // Counter restarts cleanly after clearing.
        assert_eq!(model.advance_dwell(1), 1);
    }

    #[test]
    fn test_snapshot_is_a_copy() {
        let mut model = ForecourtModel::new(&ForecourtConfig::default());
        let snapshot = model.snapshot();
        if let Some(pump) = model.pump_mut(1) {
            pump.nozzle = 2;
        }
        // Snapshot is unaffected by later mutation.
        assert_eq!(snapshot.pumps[&1].nozzle, 0);
    }
}
