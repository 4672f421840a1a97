//! # Forecourt Event Payloads
//!
//! Wire payloads published by the event distributor to its subscribers.
//!
//! ## Wire Format (JSON, internally tagged)
//! ```json
//! { "type": "pumpStatus",  "pump": 1, "status": { ... } }
//! { "type": "tankStatus",  "tank": 1, "status": { ... } }
//! { "type": "transaction", "data": { ... } }
//! ```
//!
//! Delivery contract: best-effort, ordered per source, at-most-once, no
//! replay. A subscriber that is disconnected misses events and must catch
//! up from the next snapshot pull. Consumers MUST ignore unknown event
//! types rather than treat them as errors.

use serde::{Deserialize, Serialize};

use crate::types::{FuelingTransaction, Pump, Tank};

/// A state change published to feed subscribers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum ForecourtEvent {
    /// A pump's state changed (tick advancement or command).
    PumpStatus { pump: u32, status: Pump },

    /// A tank's level or derived measurements changed.
    TankStatus { tank: u32, status: Tank },

    /// A fueling transaction completed.
    Transaction { data: FuelingTransaction },
}

impl ForecourtEvent {
    /// Serializes the event to its JSON wire form.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Parses an event from its JSON wire form.
    ///
    /// Returns `Err` for unknown event types; per the feed contract the
    /// caller logs and ignores those instead of failing.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    /// Short name for logging.
    pub fn type_name(&self) -> &'static str {
        match self {
            ForecourtEvent::PumpStatus { .. } => "pumpStatus",
            ForecourtEvent::TankStatus { .. } => "tankStatus",
            ForecourtEvent::Transaction { .. } => "transaction",
        }
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Tank;

    #[test]
    fn test_pump_status_wire_shape() {
        let event = ForecourtEvent::PumpStatus {
            pump: 1,
            status: Pump::new(1),
        };
        let json: serde_json::Value = serde_json::from_str(&event.to_json().unwrap()).unwrap();
        assert_eq!(json["type"], "pumpStatus");
        assert_eq!(json["pump"], 1);
        assert_eq!(json["status"]["number"], 1);
    }

    #[test]
    fn test_tank_status_wire_shape() {
        let event = ForecourtEvent::TankStatus {
            tank: 2,
            status: Tank::new(2, 20000.0, 5000.0),
        };
        let json: serde_json::Value = serde_json::from_str(&event.to_json().unwrap()).unwrap();
        assert_eq!(json["type"], "tankStatus");
        assert_eq!(json["tank"], 2);
        assert_eq!(json["status"]["fillingPercentage"], 25.0);
    }

    #[test]
    fn test_round_trip() {
        let event = ForecourtEvent::PumpStatus {
            pump: 4,
            status: Pump::new(4),
        };
        let parsed = ForecourtEvent::from_json(&event.to_json().unwrap()).unwrap();
        assert_eq!(parsed, event);
    }

    #[test]
    fn test_unknown_event_type_is_an_error_to_ignore() {
        let result = ForecourtEvent::from_json(r#"{"type":"priceChange","pump":1}"#);
        assert!(result.is_err());
    }
}
