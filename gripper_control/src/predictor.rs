//! Constrained kinematic position predictor.
//!
//! The servo is sampled at 30 Hz but the robot bus expects state at 200 Hz.
//! Between hardware samples the predictor advances a modeled position from
//! the last sample toward the accepted target at the configured movement
//! speed — never past the target, never outside [0,100], and snapping back
//! to the hardware truth on every `sync`. Only the monotonic clock is used.

use std::time::Instant;

/// Predictor state. `Copy` so it can live inside the shared record and be
/// advanced from a lock-free copy by the publisher.
#[derive(Debug, Clone, Copy)]
pub struct Predictor {
    last_sync_pos: f64,
    last_sync_time: Option<Instant>,
    target_pos: f64,
    speed_pct_per_s: f64,
}

impl Predictor {
    /// Create a predictor at the calibrated rest position.
    ///
    /// Until the first `sync`, `step` returns the target — the rest
    /// position the calibrator parked the gripper at.
    pub fn new(rest_pct: f64, speed_pct_per_s: f64) -> Self {
        Self {
            last_sync_pos: rest_pct,
            last_sync_time: None,
            target_pos: rest_pct,
            speed_pct_per_s,
        }
    }

    /// Re-anchor on a fresh hardware sample. Leaves the target unchanged.
    pub fn sync(&mut self, actual_pct: f64, now: Instant) {
        self.last_sync_pos = actual_pct;
        self.last_sync_time = Some(now);
    }

    /// Update the accepted target.
    pub fn set_target(&mut self, target_pct: f64) {
        self.target_pos = target_pct;
    }

    #[inline]
    pub fn target(&self) -> f64 {
        self.target_pos
    }

    /// Predicted position at `t`.
    ///
    /// Advances from the last sync point toward the target by at most
    /// `speed × (t − sync_time)`, clamped to [0,100]. `t` before the sync
    /// point behaves as `t == sync_time`.
    pub fn step(&self, t: Instant) -> f64 {
        let Some(sync_time) = self.last_sync_time else {
            return self.target_pos.clamp(0.0, 100.0);
        };
        let dt = t.saturating_duration_since(sync_time).as_secs_f64();
        let delta_max = self.speed_pct_per_s * dt;
        let diff = self.target_pos - self.last_sync_pos;
        let candidate = self.last_sync_pos + diff.signum() * diff.abs().min(delta_max);
        candidate.clamp(0.0, 100.0)
    }
}
