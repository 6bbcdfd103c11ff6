//! Command records.
//!
//! [`JointCommand`] is the bus-side payload (radians + normalized effort);
//! [`GripCommand`] is the internal percent-domain value stamped with the
//! local monotonic clock at ingestion. The control loop keeps only the
//! newest command per cycle — older messages are discarded unacknowledged.

use std::time::Instant;

use serde::{Deserialize, Serialize};

use crate::units::{effort_to_pct, rad_to_pct};

/// Per-message command payload from the robot-facing bus.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct JointCommand {
    /// Target joint position [rad], expected in `[0, q_max]`.
    pub position_rad: f64,
    /// Requested effort in [0,1].
    pub effort: f64,
}

/// Internal command in the percent domain.
///
/// `effort_pct` is ignored by the state machine (force is state-driven) but
/// retained for telemetry fidelity.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GripCommand {
    /// Target opening [%], clamped to [0,100].
    pub position_pct: f64,
    /// Requested effort [%].
    pub effort_pct: f64,
    /// Monotonic ingestion instant (heartbeat reference).
    pub received_at: Instant,
}

impl GripCommand {
    /// Convert a bus command at ingestion time.
    pub fn from_joint(cmd: &JointCommand, q_max: f64, now: Instant) -> Self {
        Self {
            position_pct: rad_to_pct(cmd.position_rad, q_max),
            effort_pct: effort_to_pct(cmd.effort),
            received_at: now,
        }
    }

    /// Synthetic command holding a position with zero effort.
    ///
    /// Used before the first bus message arrives (calibrated rest position)
    /// and after heartbeat loss (last actual position).
    pub fn hold(position_pct: f64, now: Instant) -> Self {
        Self {
            position_pct,
            effort_pct: 0.0,
            received_at: now,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_joint_converts_and_clamps() {
        let now = Instant::now();
        let cmd = JointCommand {
            position_rad: 2.7,
            effort: 0.5,
        };
        let grip = GripCommand::from_joint(&cmd, 5.4, now);
        assert!((grip.position_pct - 50.0).abs() < 1e-9);
        assert!((grip.effort_pct - 50.0).abs() < 1e-9);
        assert_eq!(grip.received_at, now);

        let over = JointCommand {
            position_rad: 9.9,
            effort: 1.5,
        };
        let grip = GripCommand::from_joint(&over, 5.4, now);
        assert_eq!(grip.position_pct, 100.0);
        assert_eq!(grip.effort_pct, 100.0);
    }

    #[test]
    fn hold_has_zero_effort() {
        let grip = GripCommand::hold(42.0, Instant::now());
        assert_eq!(grip.position_pct, 42.0);
        assert_eq!(grip.effort_pct, 0.0);
    }
}
