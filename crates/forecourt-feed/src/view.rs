//! # Reconciled View
//!
//! The client-side merge of two independent update sources - periodic
//! snapshot pulls and pushed events - into one per-entity state map.
//!
//! ## Merge Rule
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Reconciled View Merge                                │
//! │                                                                         │
//! │  snapshot pull ──┐                                                      │
//! │                  ├──► apply ──► pumps[id] = incoming  (unconditional)  │
//! │  pushed event ───┘                                                      │
//! │                                                                         │
//! │  LAST WRITE WINS per id, by ARRIVAL ORDER - no payload-timestamp       │
//! │  comparison. Pushes are assumed fresher than the next scheduled pull,  │
//! │  so overwriting is always correct.                                      │
//! │                                                                         │
//! │  The merge functions are pure with respect to transport: nothing here  │
//! │  knows whether an update came over HTTP, a WebSocket, or a test.       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};

use forecourt_core::{
    infer_nozzle_status, infer_pump_status, ForecourtEvent, OperatingStatus, Pump, RawPumpStatus,
    StatusSnapshot, Tank,
};

/// Last-known state of every pump and tank, as seen from a consumer.
#[derive(Debug, Clone, Default)]
pub struct ReconciledView {
    pumps: BTreeMap<u32, Pump>,
    tanks: BTreeMap<u32, Tank>,

    /// When the view last absorbed any update (pull or push).
    last_updated: Option<DateTime<Utc>>,

    /// Whether the push channel is currently open. The view keeps
    /// updating from pulls either way.
    connected: bool,
}

impl ReconciledView {
    pub fn new() -> Self {
        ReconciledView::default()
    }

    // =========================================================================
    // Update Edges
    // =========================================================================

    /// Absorbs a full snapshot: every entity it carries overwrites the
    /// current entry for that id.
    pub fn apply_snapshot(&mut self, snapshot: StatusSnapshot) {
        for (number, pump) in snapshot.pumps {
            self.pumps.insert(number, pump);
        }
        for (number, tank) in snapshot.tanks {
            self.tanks.insert(number, tank);
        }
        self.last_updated = Some(Utc::now());
    }

    /// Absorbs one pushed event. Transaction events carry no entity state
    /// and leave the maps untouched.
    pub fn apply_event(&mut self, event: ForecourtEvent) {
        match event {
            ForecourtEvent::PumpStatus { pump, status } => {
                self.pumps.insert(pump, status);
            }
            ForecourtEvent::TankStatus { tank, status } => {
                self.tanks.insert(tank, status);
            }
            ForecourtEvent::Transaction { .. } => {}
        }
        self.last_updated = Some(Utc::now());
    }

    /// Flips the push-channel connectivity flag.
    pub fn set_connected(&mut self, connected: bool) {
        self.connected = connected;
    }

    // =========================================================================
    // Reads
    // =========================================================================

    pub fn pump(&self, number: u32) -> Option<&Pump> {
        self.pumps.get(&number)
    }

    pub fn tank(&self, number: u32) -> Option<&Tank> {
        self.tanks.get(&number)
    }

    pub fn pumps(&self) -> &BTreeMap<u32, Pump> {
        &self.pumps
    }

    pub fn tanks(&self) -> &BTreeMap<u32, Tank> {
        &self.tanks
    }

    pub fn last_updated(&self) -> Option<DateTime<Utc>> {
        self.last_updated
    }

    pub fn connected(&self) -> bool {
        self.connected
    }

    // =========================================================================
    // Status Inference
    // =========================================================================

    /// Consumer-facing operating status for a pump. A pump the view has
    /// never heard of is Offline.
    pub fn pump_operating_status(&self, number: u32) -> OperatingStatus {
        match self.pumps.get(&number) {
            Some(pump) => infer_pump_status(&RawPumpStatus::from(pump)),
            None => OperatingStatus::Offline,
        }
    }

    /// Consumer-facing operating status for one nozzle on a pump.
    pub fn nozzle_operating_status(
        &self,
        number: u32,
        nozzle: u32,
        maintenance: bool,
    ) -> OperatingStatus {
        match self.pumps.get(&number) {
            Some(pump) => infer_nozzle_status(&RawPumpStatus::from(pump), nozzle, maintenance),
            None if maintenance => OperatingStatus::Maintenance,
            None => OperatingStatus::Offline,
        }
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use forecourt_core::PumpState;

    fn snapshot_with_pump(volume: f64) -> StatusSnapshot {
        let mut pump = Pump::new(1);
        pump.volume = volume;
        StatusSnapshot {
            taken_at: Utc::now(),
            pumps: BTreeMap::from([(1, pump)]),
            tanks: BTreeMap::from([(1, Tank::new(1, 20000.0, 15000.0))]),
        }
    }

    fn pump_event(number: u32, volume: f64) -> ForecourtEvent {
        let mut pump = Pump::new(number);
        pump.status = PumpState::Filling;
        pump.nozzle = 1;
        pump.volume = volume;
        pump.transaction_id = 7;
        ForecourtEvent::PumpStatus {
            pump: number,
            status: pump,
        }
    }

    #[test]
    fn test_push_overwrites_pull_for_same_id() {
        let mut view = ReconciledView::new();
        view.apply_snapshot(snapshot_with_pump(1.0));
        view.apply_event(pump_event(1, 2.5));

        assert_eq!(view.pump(1).unwrap().volume, 2.5);
    }

    #[test]
    fn test_pull_overwrites_push_for_same_id() {
        // Arrival order decides, not source kind: a later pull wins over
        // an earlier push.
        let mut view = ReconciledView::new();
        view.apply_event(pump_event(1, 2.5));
        view.apply_snapshot(snapshot_with_pump(9.0));

        assert_eq!(view.pump(1).unwrap().volume, 9.0);
    }

    #[test]
    fn test_updates_touch_only_their_entity() {
        let mut view = ReconciledView::new();
        view.apply_snapshot(snapshot_with_pump(1.0));
        view.apply_event(pump_event(2, 5.0));

        assert_eq!(view.pump(1).unwrap().volume, 1.0);
        assert_eq!(view.pump(2).unwrap().volume, 5.0);
        assert!(view.tank(1).is_some());
    }

    #[test]
    fn test_transaction_events_leave_entities_untouched() {
        let mut view = ReconciledView::new();
        view.apply_snapshot(snapshot_with_pump(1.0));
        let before = view.pump(1).unwrap().clone();

        let mut pump = Pump::new(1);
        pump.status = PumpState::EndOfTransaction;
        pump.transaction_id = 3;
        pump.volume = 10.0;
        pump.price = 1.5;
        pump.amount = 15.0;
        pump.nozzle = 1;
        let record = forecourt_core::FuelingTransaction::from_pump(&pump, Utc::now());
        view.apply_event(ForecourtEvent::Transaction { data: record });

        assert_eq!(view.pump(1).unwrap(), &before);
    }

    #[test]
    fn test_last_updated_advances_on_any_edge() {
        let mut view = ReconciledView::new();
        assert!(view.last_updated().is_none());

        view.apply_snapshot(snapshot_with_pump(1.0));
        let after_pull = view.last_updated().unwrap();

        view.apply_event(pump_event(1, 2.0));
        assert!(view.last_updated().unwrap() >= after_pull);
    }

    #[test]
    fn test_connected_flag_is_independent_of_updates() {
        let mut view = ReconciledView::new();
        view.set_connected(true);
        view.apply_snapshot(snapshot_with_pump(1.0));
        assert!(view.connected());

        view.set_connected(false);
        view.apply_event(pump_event(1, 2.0));
        assert!(!view.connected());
        // Pull-only operation still refreshed the entity.
        assert_eq!(view.pump(1).unwrap().volume, 2.0);
    }

    #[test]
    fn test_operating_status_through_view() {
        let mut view = ReconciledView::new();
        assert_eq!(view.pump_operating_status(1), OperatingStatus::Offline);

        view.apply_event(pump_event(1, 2.5));
        assert_eq!(view.pump_operating_status(1), OperatingStatus::Filling);
        assert_eq!(
            view.nozzle_operating_status(1, 1, false),
            OperatingStatus::Filling
        );
        assert_eq!(
            view.nozzle_operating_status(1, 2, false),
            OperatingStatus::Idle
        );
        assert_eq!(
            view.nozzle_operating_status(1, 2, true),
            OperatingStatus::Maintenance
        );
    }
}
