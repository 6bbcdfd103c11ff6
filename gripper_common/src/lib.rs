//! # Gripper Common
//!
//! Shared library for the gripper controller workspace: position units and
//! conversions, grasp-state enums, command/telemetry records, the validated
//! TOML configuration, the error taxonomy, and calibration persistence.
//!
//! Everything here is plain data — no I/O except the calibration store and
//! the config loader. The control engine (`gripper_control`) and the servo
//! link (`gripper_link`) both build on these types.

pub mod calibration;
pub mod command;
pub mod config;
pub mod error;
pub mod servo;
pub mod state;
pub mod telemetry;
pub mod units;

pub use calibration::{CalibrationRecord, CalibrationStore};
pub use command::{GripCommand, JointCommand};
pub use config::GripperConfig;
pub use error::{CalibrationError, ConfigError, LinkError, RuntimeError};
pub use servo::{ErrorFlags, ServoSnapshot};
pub use state::GraspState;
pub use telemetry::{ContactSignals, ControlTelemetry, GripperStateMessage};
