//! # Station Configuration
//!
//! Configuration for the simulated forecourt: clock period, physics
//! constants, and the pump/tank declarations.
//!
//! ## Example (TOML)
//! ```toml
//! tick_interval_ms = 1000
//! flow_rate = 0.5          # litres per tick
//! dwell_ticks = 3          # simulated nozzle-lift delay
//! auto_stop_volume = 60.0  # litres ceiling per transaction
//!
//! [[pumps]]
//! number = 1
//! nozzles = 2
//!
//! [[tanks]]
//! number = 1
//! capacity = 20000.0
//! initial_volume = 15000.0
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::{EngineError, EngineResult};

// =============================================================================
// Defaults
// =============================================================================

fn default_tick_interval_ms() -> u64 {
    1000
}

fn default_flow_rate() -> f64 {
    0.5
}

fn default_dwell_ticks() -> u32 {
    3
}

fn default_auto_stop_volume() -> f64 {
    60.0
}

fn default_nozzles() -> u32 {
    2
}

// =============================================================================
// Configuration Types
// =============================================================================

/// One pump declaration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PumpConfig {
    /// Pump number, unique within the station.
    pub number: u32,

    /// Number of nozzles on this pump.
    #[serde(default = "default_nozzles")]
    pub nozzles: u32,
}

/// One tank declaration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TankConfig {
    /// Tank number, unique within the station.
    pub number: u32,

    /// Declared capacity in litres.
    pub capacity: f64,

    /// Product volume at station initialization.
    pub initial_volume: f64,
}

/// Full station configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ForecourtConfig {
    /// Clock period in milliseconds. Fixed; does not adapt to load.
    #[serde(default = "default_tick_interval_ms")]
    pub tick_interval_ms: u64,

    /// Simulated litres dispensed per tick while filling.
    #[serde(default = "default_flow_rate")]
    pub flow_rate: f64,

    /// Ticks between authorization and the start of fueling (the simulated
    /// "nozzle lifted" delay).
    #[serde(default = "default_dwell_ticks")]
    pub dwell_ticks: u32,

    /// Accumulated-volume ceiling at which a filling pump auto-stops.
    #[serde(default = "default_auto_stop_volume")]
    pub auto_stop_volume: f64,

    /// Pump declarations.
    #[serde(default)]
    pub pumps: Vec<PumpConfig>,

    /// Tank declarations.
    #[serde(default)]
    pub tanks: Vec<TankConfig>,
}

impl Default for ForecourtConfig {
    /// A small two-pump, one-tank station suitable for tests and demos.
    fn default() -> Self {
        ForecourtConfig {
            tick_interval_ms: default_tick_interval_ms(),
            flow_rate: default_flow_rate(),
            dwell_ticks: default_dwell_ticks(),
            auto_stop_volume: default_auto_stop_volume(),
            pumps: vec![
                PumpConfig { number: 1, nozzles: 2 },
                PumpConfig { number: 2, nozzles: 2 },
            ],
            tanks: vec![TankConfig {
                number: 1,
                capacity: 20000.0,
                initial_volume: 15000.0,
            }],
        }
    }
}

impl ForecourtConfig {
    /// Loads configuration from a TOML file, falling back to defaults if
    /// the path is `None` or the file does not exist.
    pub fn load_or_default(path: Option<&Path>) -> EngineResult<Self> {
        let Some(path) = path else {
            info!("No config path given, using default station layout");
            return Ok(ForecourtConfig::default());
        };

        if !path.exists() {
            warn!(path = %path.display(), "Config file not found, using defaults");
            return Ok(ForecourtConfig::default());
        }

        let contents = std::fs::read_to_string(path)?;
        let config: ForecourtConfig = toml::from_str(&contents)?;
        config.validate()?;
        info!(
            path = %path.display(),
            pumps = config.pumps.len(),
            tanks = config.tanks.len(),
            "Loaded station configuration"
        );
        Ok(config)
    }

    /// Validates the configuration.
    pub fn validate(&self) -> EngineResult<()> {
        if self.tick_interval_ms == 0 {
            return Err(EngineError::InvalidConfig(
                "tick_interval_ms must be at least 1".into(),
            ));
        }
        if self.flow_rate <= 0.0 {
            return Err(EngineError::InvalidConfig(
                "flow_rate must be positive".into(),
            ));
        }
        if self.auto_stop_volume <= 0.0 {
            return Err(EngineError::InvalidConfig(
                "auto_stop_volume must be positive".into(),
            ));
        }
        if self.pumps.is_empty() {
            return Err(EngineError::InvalidConfig(
                "at least one pump must be declared".into(),
            ));
        }
        if self.tanks.is_empty() {
            return Err(EngineError::InvalidConfig(
                "at least one tank must be declared".into(),
            ));
        }

        let mut pump_numbers: Vec<u32> = self.pumps.iter().map(|p| p.number).collect();
        pump_numbers.sort_unstable();
        pump_numbers.dedup();
        if pump_numbers.len() != self.pumps.len() {
            return Err(EngineError::InvalidConfig(
                "pump numbers must be unique".into(),
            ));
        }

        let mut tank_numbers: Vec<u32> = self.tanks.iter().map(|t| t.number).collect();
        tank_numbers.sort_unstable();
        tank_numbers.dedup();
        if tank_numbers.len() != self.tanks.len() {
            return Err(EngineError::InvalidConfig(
                "tank numbers must be unique".into(),
            ));
        }

        for tank in &self.tanks {
            if tank.capacity <= 0.0 {
                return Err(EngineError::InvalidConfig(format!(
                    "tank {} capacity must be positive",
                    tank.number
                )));
            }
            if tank.initial_volume < 0.0 || tank.initial_volume > tank.capacity {
                return Err(EngineError::InvalidConfig(format!(
                    "tank {} initial_volume must be within [0, capacity]",
                    tank.number
                )));
            }
        }

        Ok(())
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = ForecourtConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.tick_interval_ms, 1000);
        assert_eq!(config.pumps.len(), 2);
    }

    #[test]
    fn test_parse_toml() {
        let toml_str = r#"
            flow_rate = 0.25
            dwell_ticks = 1

            [[pumps]]
            number = 1

            [[tanks]]
            number = 1
            capacity = 10000.0
            initial_volume = 2500.0
        "#;
        let config: ForecourtConfig = toml::from_str(toml_str).unwrap();
        assert!(config.validate().is_ok());
        assert_eq!(config.flow_rate, 0.25);
        assert_eq!(config.tick_interval_ms, 1000); // default
        assert_eq!(config.pumps[0].nozzles, 2); // default
    }

    #[test]
    fn test_validation_rejects_duplicates() {
        let mut config = ForecourtConfig::default();
        config.pumps.push(PumpConfig { number: 1, nozzles: 2 });
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validation_rejects_bad_physics() {
        let mut config = ForecourtConfig::default();
        config.flow_rate = 0.0;
        assert!(config.validate().is_err());

        let mut config = ForecourtConfig::default();
        config.tanks[0].initial_volume = 99999.0;
        assert!(config.validate().is_err());
    }
}
