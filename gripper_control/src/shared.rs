//! The shared state record.
//!
//! One `parking_lot::Mutex` mediates everything the control loop and the
//! state publisher exchange. The control loop writes every field it
//! produces in a single critical section per cycle; the publisher copies
//! what it needs in one critical section per tick and writes back only the
//! predictor output. No lock is ever held across servo I/O or a bus send.

use std::sync::Arc;
use std::time::Instant;

use parking_lot::Mutex;

use gripper_common::servo::ServoSnapshot;
use gripper_common::state::GraspState;
use gripper_common::telemetry::ContactSignals;

use crate::predictor::Predictor;

/// Fields shared between the control loop and the state publisher.
#[derive(Debug, Clone, Copy)]
pub struct SharedState {
    /// Latest accepted target [%] (the grasp machine's goal).
    pub commanded_position_pct: f64,
    /// Most recent hardware-derived position [%].
    pub last_actual_position_pct: f64,
    /// `read_at` of the snapshot behind `last_actual_position_pct`.
    pub last_actual_sample_time: Option<Instant>,
    /// Publisher-maintained predictor output [%].
    pub predicted_position_pct: f64,
    /// Grasp state this cycle.
    pub grasp_state: GraspState,
    /// State-driven effort emitted to the servo [%].
    pub effort_pct: f64,
    /// Ingestion instant of the newest accepted command.
    pub last_command_received_at: Option<Instant>,
    /// Latched health flag; false stops prediction and sets mode 255.
    pub hardware_healthy: bool,
    /// Most recent servo snapshot, for telemetry.
    pub snapshot: Option<ServoSnapshot>,
    /// Contact sub-signals from the grasp machine.
    pub contact: ContactSignals,
    /// Control-loop deadline misses since startup.
    pub deadline_misses: u64,
    /// Predictor sync state; the control loop syncs it, the publisher
    /// advances it from a copy.
    pub predictor: Predictor,
}

impl SharedState {
    /// Initial state at the calibrated rest position, healthy, unsynced.
    pub fn new(rest_pct: f64, movement_speed_pct_per_s: f64) -> Self {
        Self {
            commanded_position_pct: rest_pct,
            last_actual_position_pct: rest_pct,
            last_actual_sample_time: None,
            predicted_position_pct: rest_pct,
            grasp_state: GraspState::Idle,
            effort_pct: 0.0,
            last_command_received_at: None,
            hardware_healthy: true,
            snapshot: None,
            contact: ContactSignals::default(),
            deadline_misses: 0,
            predictor: Predictor::new(rest_pct, movement_speed_pct_per_s),
        }
    }
}

/// Handle both threads hold.
pub type SharedHandle = Arc<Mutex<SharedState>>;

/// Convenience constructor for the supervisor and tests.
pub fn shared_handle(rest_pct: f64, movement_speed_pct_per_s: f64) -> SharedHandle {
    Arc::new(Mutex::new(SharedState::new(rest_pct, movement_speed_pct_per_s)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn initial_state_is_healthy_at_rest() {
        let state = SharedState::new(50.0, 952.43);
        assert_eq!(state.commanded_position_pct, 50.0);
        assert_eq!(state.predicted_position_pct, 50.0);
        assert_eq!(state.grasp_state, GraspState::Idle);
        assert!(state.hardware_healthy);
        assert!(state.snapshot.is_none());
        assert!(state.last_command_received_at.is_none());
        // Unsynced predictor reports the rest position.
        assert_eq!(state.predictor.step(Instant::now()), 50.0);
    }
}
