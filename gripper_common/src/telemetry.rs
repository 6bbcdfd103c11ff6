//! Outbound message payloads.
//!
//! [`GripperStateMessage`] goes to the robot-facing state topic at 200 Hz;
//! [`ControlTelemetry`] goes to the internal diagnostic topic at 30 Hz.
//! Wire encoding is the bus collaborator's concern — these are the payload
//! records it serializes.

use serde::{Deserialize, Serialize};

use crate::state::GraspState;

/// Mode byte: normal operation.
pub const MODE_NORMAL: u8 = 0;
/// Mode byte: `hardware_healthy == false`.
pub const MODE_ERROR: u8 = 255;

// ─── Robot-facing state (200 Hz) ────────────────────────────────────

/// Single-motor state record published on the robot-facing topic.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GripperStateMessage {
    /// Monotonically increasing publisher tick.
    pub seq: u64,
    /// Gripper position [rad] (reverse of the command conversion).
    pub position_rad: f64,
    /// Estimated torque: managed effort / 10 by convention.
    pub torque_estimate: f64,
    /// [`MODE_NORMAL`] or [`MODE_ERROR`].
    pub mode: u8,
}

// ─── Internal telemetry (30 Hz) ─────────────────────────────────────

/// Contact-detection sub-signals from the grasp state machine.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContactSignals {
    /// Measured current above the contact threshold this cycle.
    pub high_current: bool,
    /// Position change below the stagnation threshold this cycle.
    pub position_stagnant: bool,
    /// Consecutive cycles both signals held (resets outside `Moving`).
    pub contact_samples: u32,
    /// Contact predicate confirmed this cycle.
    pub contact_detected: bool,
}

/// Full diagnostic record for the internal telemetry topic.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ControlTelemetry {
    /// Latest accepted target [%].
    pub commanded_pct: f64,
    /// Most recent hardware-derived position [%].
    pub actual_pct: f64,
    /// Predictor output [%].
    pub predicted_pct: f64,
    /// `commanded − actual` [%].
    pub position_error_pct: f64,
    /// Grasp state this cycle.
    pub grasp_state: GraspState,
    /// State-driven effort emitted to the servo [%].
    pub effort_pct: f64,
    /// Servo temperature [°C].
    pub temperature_c: u8,
    /// Servo current [mA].
    pub current_ma: i32,
    /// Servo input voltage [0.1 V].
    pub voltage_dv: u8,
    /// Raw hardware-error byte.
    pub hw_error: u8,
    /// Control-loop deadline misses since startup.
    pub deadline_misses: u64,
    /// `hardware_healthy` flag.
    pub hardware_healthy: bool,
    /// Contact-detection sub-signals.
    pub contact: ContactSignals,
}
