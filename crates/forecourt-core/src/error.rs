//! # Error Types
//!
//! Command rejection errors for the forecourt subsystem.
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Error Types                                     │
//! │                                                                         │
//! │  forecourt-core errors (this file)                                     │
//! │  └── CommandError     - InvalidTarget / InvalidParameter               │
//! │                                                                         │
//! │  forecourt-store errors (separate crate)                               │
//! │  └── StoreError       - Persistence failures (logged, non-fatal)       │
//! │                                                                         │
//! │  forecourt-feed errors (separate crate)                                │
//! │  └── FeedError        - Channel failures (trigger backoff-reconnect)   │
//! │                                                                         │
//! │  Propagation: command rejections return synchronously to the caller    │
//! │  and NEVER surface as events. There is no fatal error category in      │
//! │  this subsystem.                                                       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use std::fmt;

use thiserror::Error;

// =============================================================================
// Target Kind
// =============================================================================

/// What kind of entity a rejected command referenced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TargetKind {
    Pump,
    Tank,
}

impl fmt::Display for TargetKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TargetKind::Pump => write!(f, "pump"),
            TargetKind::Tank => write!(f, "tank"),
        }
    }
}

// =============================================================================
// Command Error
// =============================================================================

/// Rejection of an engine command.
///
/// Both variants are rejected **without mutation**: the model is untouched
/// and no event is emitted for a failed command.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CommandError {
    /// The command referenced a pump/tank number that does not exist.
    #[error("{kind} {id} does not exist")]
    InvalidTarget { kind: TargetKind, id: u32 },

    /// Command arguments failed validation (e.g. non-positive price).
    #[error("invalid parameter: {reason}")]
    InvalidParameter { reason: String },
}

impl CommandError {
    /// Shorthand for an unknown pump target.
    pub fn unknown_pump(id: u32) -> Self {
        CommandError::InvalidTarget {
            kind: TargetKind::Pump,
            id,
        }
    }

    /// Shorthand for an unknown tank target.
    pub fn unknown_tank(id: u32) -> Self {
        CommandError::InvalidTarget {
            kind: TargetKind::Tank,
            id,
        }
    }

    /// Shorthand for a parameter validation failure.
    pub fn invalid_parameter(reason: impl Into<String>) -> Self {
        CommandError::InvalidParameter {
            reason: reason.into(),
        }
    }
}

// =============================================================================
// Result Type Alias
// =============================================================================

/// Convenience type alias for Results with CommandError.
pub type CommandResult<T> = Result<T, CommandError>;

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        let err = CommandError::unknown_pump(9);
        assert_eq!(err.to_string(), "pump 9 does not exist");

        let err = CommandError::unknown_tank(3);
        assert_eq!(err.to_string(), "tank 3 does not exist");

        let err = CommandError::invalid_parameter("price must be positive");
        assert_eq!(err.to_string(), "invalid parameter: price must be positive");
    }
}
