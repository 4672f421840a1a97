//! # Status Inference
//!
//! Derives a small consumer-facing operating status for each pump and
//! nozzle from the raw status fields in the reconciled view.
//!
//! The raw fields are not a direct 1:1 encoding of operating state: a pump
//! can report stale "last transaction" fields, a zero nozzle, or no
//! distinguishing fields at all. The precedence below exists because "last
//! transaction present" alone is ambiguous between "just finished" and
//! "never used", and the layer must fail toward `Offline` only when no
//! signal exists at all - hiding a genuinely unreachable pump behind a
//! reassuring `Idle` badge is worse than a false `Offline`.
//!
//! ## Precedence (per pump)
//! ```text
//! 1. active transaction (volume > 0 AND txId > 0 AND nozzle > 0)  → Filling
//! 2. mode == Finished sentinel                                    → Idle
//! 3. nozzle == 0 AND last-transaction field present               → Idle
//! 4. no volume, no lastVolume, no mode, no nozzle at all          → Offline
//! 5. anything else                                                → Idle
//! ```
//!
//! Inference is a pure function of the payload: same input, same output,
//! independent of call order.

use serde::{Deserialize, Serialize};

use crate::types::{Pump, PumpState};

// =============================================================================
// Operating Status
// =============================================================================

/// Consumer-facing operating status for a pump or a nozzle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum OperatingStatus {
    /// Actively dispensing.
    Filling,
    /// Working but not currently dispensing.
    Idle,
    /// The entry carries no usable signal; the pump may be unreachable.
    Offline,
    /// Taken out of service (out-of-band flag, per nozzle).
    Maintenance,
}

// =============================================================================
// Pump Mode
// =============================================================================

/// Raw mode flag reported in status payloads.
///
/// `Finished` is the sentinel the inference rules key on; the other
/// variants exist so a populated mode field counts as a usable signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum PumpMode {
    Idle,
    Authorized,
    Filling,
    Finished,
}

// =============================================================================
// Raw Pump Status
// =============================================================================

/// The noisy, partially-populated status payload for one pump.
///
/// Every field is optional: real dispenser payloads routinely omit fields,
/// and the inference rules must tolerate missing or contradictory data.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RawPumpStatus {
    /// Active nozzle number; 0 means no nozzle lifted.
    pub nozzle: Option<u32>,

    /// Litres dispensed in the current transaction.
    pub volume: Option<f64>,

    /// Litres dispensed in the previous transaction.
    pub last_volume: Option<f64>,

    /// Raw mode flag.
    pub mode: Option<PumpMode>,

    /// Identifier of the running transaction.
    pub transaction_id: Option<i64>,

    /// Identifier of the most recently completed transaction.
    pub last_transaction_id: Option<i64>,
}

impl RawPumpStatus {
    /// An active transaction requires all three signals simultaneously.
    pub fn has_active_transaction(&self) -> bool {
        self.volume.unwrap_or(0.0) > 0.0
            && self.transaction_id.unwrap_or(0) > 0
            && self.nozzle.unwrap_or(0) > 0
    }

    /// True when the payload carries no usable signal at all.
    pub fn is_empty_signal(&self) -> bool {
        self.volume.is_none()
            && self.last_volume.is_none()
            && self.mode.is_none()
            && self.nozzle.is_none()
    }
}

impl From<&Pump> for RawPumpStatus {
    /// Projects the simulator's authoritative pump state into the raw
    /// payload shape consumers see.
    ///
    /// The running transaction id is only reported while filling; once the
    /// pump reaches `EndOfTransaction` the mode flips to the `Finished`
    /// sentinel and the id is no longer an "active" signal.
    fn from(pump: &Pump) -> Self {
        let mode = match pump.status {
            PumpState::Idle => PumpMode::Idle,
            PumpState::Authorized => PumpMode::Authorized,
            PumpState::Filling => PumpMode::Filling,
            PumpState::EndOfTransaction => PumpMode::Finished,
        };
        RawPumpStatus {
            nozzle: Some(pump.nozzle),
            volume: Some(pump.volume),
            last_volume: None,
            mode: Some(mode),
            transaction_id: (pump.status == PumpState::Filling).then_some(pump.transaction_id),
            last_transaction_id: pump.last_transaction_id,
        }
    }
}

// =============================================================================
// Inference
// =============================================================================

/// Classifies a pump from its raw status payload.
pub fn infer_pump_status(raw: &RawPumpStatus) -> OperatingStatus {
    // Rule 1: a live transaction trumps everything.
    if raw.has_active_transaction() {
        return OperatingStatus::Filling;
    }

    // Rule 2: the Finished sentinel means a completed cycle.
    if raw.mode == Some(PumpMode::Finished) {
        return OperatingStatus::Idle;
    }

    // Rule 3: no nozzle lifted but a last transaction exists - the pump
    // finished a cycle at some point, so it is reachable and idle.
    if raw.nozzle == Some(0) && raw.last_transaction_id.is_some() {
        return OperatingStatus::Idle;
    }

    // Rule 4: nothing usable at all. Only here do we report Offline.
    if raw.is_empty_signal() {
        return OperatingStatus::Offline;
    }

    // Rule 5: working but not dispensing.
    OperatingStatus::Idle
}

/// Classifies a single nozzle on a pump.
///
/// The `maintenance` flag is out-of-band (not part of the payload) and
/// overrides everything for that one nozzle.
pub fn infer_nozzle_status(
    raw: &RawPumpStatus,
    nozzle: u32,
    maintenance: bool,
) -> OperatingStatus {
    if maintenance {
        return OperatingStatus::Maintenance;
    }

    match infer_pump_status(raw) {
        OperatingStatus::Offline => OperatingStatus::Offline,
        OperatingStatus::Filling if raw.nozzle == Some(nozzle) => OperatingStatus::Filling,
        // Other nozzles on a working pump default to Idle, even while a
        // sibling nozzle is dispensing.
        _ => OperatingStatus::Idle,
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn filling_payload() -> RawPumpStatus {
        RawPumpStatus {
            nozzle: Some(2),
            volume: Some(12.5),
            last_volume: None,
            mode: Some(PumpMode::Filling),
            transaction_id: Some(41),
            last_transaction_id: Some(40),
        }
    }

    #[test]
    fn test_rule_1_active_transaction_is_filling() {
        assert_eq!(infer_pump_status(&filling_payload()), OperatingStatus::Filling);
    }

    #[test]
    fn test_rule_1_requires_all_three_fields() {
        let mut raw = filling_payload();
        raw.transaction_id = Some(0);
        assert_eq!(infer_pump_status(&raw), OperatingStatus::Idle);

        let mut raw = filling_payload();
        raw.volume = Some(0.0);
        assert_eq!(infer_pump_status(&raw), OperatingStatus::Idle);

        let mut raw = filling_payload();
        raw.nozzle = Some(0);
        assert_eq!(infer_pump_status(&raw), OperatingStatus::Idle);
    }

    #[test]
    fn test_rule_2_finished_sentinel_is_idle() {
        let raw = RawPumpStatus {
            mode: Some(PumpMode::Finished),
            volume: Some(30.0),
            nozzle: Some(1),
            ..Default::default()
        };
        assert_eq!(infer_pump_status(&raw), OperatingStatus::Idle);
    }

    #[test]
    fn test_rule_3_last_transaction_with_zero_nozzle_is_idle() {
        // Scenario D: nozzle=0, no volume, no mode flag, but a last
        // transaction present => Idle, not Offline.
        let raw = RawPumpStatus {
            nozzle: Some(0),
            last_transaction_id: Some(17),
            ..Default::default()
        };
        assert_eq!(infer_pump_status(&raw), OperatingStatus::Idle);
    }

    #[test]
    fn test_rule_4_no_signal_is_offline() {
        // Scenario E: no volume, no last-volume, no mode, no nozzle at all.
        let raw = RawPumpStatus::default();
        assert_eq!(infer_pump_status(&raw), OperatingStatus::Offline);

        // A lone lastTransactionId without a nozzle field is still no
        // usable signal about reachability.
        let raw = RawPumpStatus {
            last_transaction_id: Some(3),
            ..Default::default()
        };
        assert_eq!(infer_pump_status(&raw), OperatingStatus::Offline);
    }

    #[test]
    fn test_rule_5_default_idle() {
        let raw = RawPumpStatus {
            nozzle: Some(1),
            ..Default::default()
        };
        assert_eq!(infer_pump_status(&raw), OperatingStatus::Idle);

        let raw = RawPumpStatus {
            last_volume: Some(25.0),
            ..Default::default()
        };
        assert_eq!(infer_pump_status(&raw), OperatingStatus::Idle);
    }

    #[test]
    fn test_inference_is_deterministic() {
        let raw = filling_payload();
        let first = infer_pump_status(&raw);
        for _ in 0..10 {
            assert_eq!(infer_pump_status(&raw), first);
        }
    }

    #[test]
    fn test_nozzle_refinement() {
        let raw = filling_payload(); // nozzle 2 active

        assert_eq!(infer_nozzle_status(&raw, 2, false), OperatingStatus::Filling);
        assert_eq!(infer_nozzle_status(&raw, 1, false), OperatingStatus::Idle);
        assert_eq!(infer_nozzle_status(&raw, 3, false), OperatingStatus::Idle);
    }

    #[test]
    fn test_nozzles_on_offline_pump_are_offline() {
        let raw = RawPumpStatus::default();
        assert_eq!(infer_nozzle_status(&raw, 1, false), OperatingStatus::Offline);
    }

    #[test]
    fn test_maintenance_overrides_everything() {
        let raw = filling_payload();
        assert_eq!(
            infer_nozzle_status(&raw, 2, true),
            OperatingStatus::Maintenance
        );

        let offline = RawPumpStatus::default();
        assert_eq!(
            infer_nozzle_status(&offline, 1, true),
            OperatingStatus::Maintenance
        );
    }

    #[test]
    fn test_projection_from_simulated_pump() {
        let mut pump = Pump::new(1);
        pump.status = PumpState::Filling;
        pump.nozzle = 1;
        pump.price = 1.65;
        pump.volume = 5.0;
        pump.amount = pump.volume * pump.price;
        pump.transaction_id = 9;

        let raw = RawPumpStatus::from(&pump);
        assert_eq!(infer_pump_status(&raw), OperatingStatus::Filling);

        // Once finished, the running id is no longer an active signal.
        pump.status = PumpState::EndOfTransaction;
        let raw = RawPumpStatus::from(&pump);
        assert_eq!(raw.mode, Some(PumpMode::Finished));
        assert_eq!(raw.transaction_id, None);
        assert_eq!(infer_pump_status(&raw), OperatingStatus::Idle);
    }
}
