//! # Gripper Control
//!
//! The real-time control and state-publishing engine. Two long-lived threads
//! after startup:
//!
//! - the **control loop** (30 Hz, elevated priority): drains the command
//!   bus, runs the grasp state machine, issues one bulk write and one bulk
//!   read per cycle, and updates the shared record;
//! - the **state publisher** (200 Hz, normal priority): advances the
//!   constrained kinematic predictor between hardware samples and emits the
//!   robot-facing state stream, plus internal telemetry at 30 Hz.
//!
//! Startup runs the contact-based calibrator synchronously before either
//! thread exists; the supervisor owns thread lifecycle and signal-driven
//! shutdown. Both loops use absolute-deadline scheduling to hold phase.

pub mod bus;
pub mod calibrate;
pub mod clock;
pub mod cycle;
pub mod grasp;
pub mod predictor;
pub mod publisher;
pub mod shared;
pub mod supervisor;

pub use bus::{BusEndpoints, CommandSource, StateSink, TelemetrySink};
pub use calibrate::run_calibration;
pub use clock::{DeadlineStats, Scheduler, Tick};
pub use cycle::ControlLoop;
pub use grasp::{GraspInput, GraspMachine, GraspOutput, GraspParams};
pub use predictor::Predictor;
pub use publisher::StatePublisher;
pub use shared::{SharedHandle, SharedState};
