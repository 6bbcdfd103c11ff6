//! The 200 Hz state publisher.
//!
//! Copies a consistent snapshot of the shared record in one critical
//! section, advances the predictor outside the lock, and emits one state
//! message per tick on the robot-facing topic. Every Nth tick (default 6,
//! ~30 Hz) it also emits a full telemetry record on the internal topic.
//!
//! The publisher performs no servo I/O — its only suspension points are the
//! deadline sleep and the uncontended lock. While `hardware_healthy` is
//! false it publishes the last hardware-derived position with mode 255 and
//! zero effort; prediction stops entirely.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use tracing::info;

use gripper_common::config::GripperConfig;
use gripper_common::telemetry::{
    ControlTelemetry, GripperStateMessage, MODE_ERROR, MODE_NORMAL,
};
use gripper_common::units::pct_to_rad;

use crate::bus::{StateSink, TelemetrySink};
use crate::clock::Scheduler;
use crate::shared::SharedHandle;

pub struct StatePublisher {
    shared: SharedHandle,
    state_sink: Box<dyn StateSink>,
    telemetry_sink: Box<dyn TelemetrySink>,
    stop: Arc<AtomicBool>,
    sched: Scheduler,
    q_max: f64,
    telemetry_interval: u64,
    seq: u64,
}

impl StatePublisher {
    pub fn new(
        shared: SharedHandle,
        state_sink: Box<dyn StateSink>,
        telemetry_sink: Box<dyn TelemetrySink>,
        stop: Arc<AtomicBool>,
        config: &GripperConfig,
    ) -> Self {
        let period = Duration::from_secs_f64(1.0 / config.control.publish_hz);
        Self {
            shared,
            state_sink,
            telemetry_sink,
            stop,
            sched: Scheduler::new(period),
            q_max: config.motion.q_max_rad,
            telemetry_interval: config.control.telemetry_interval_ticks as u64,
            seq: 0,
        }
    }

    /// Enter the publish loop until the stop flag is set.
    pub fn run(mut self) {
        info!(
            period_us = self.sched.period().as_micros() as u64,
            "state publisher running"
        );
        while !self.stop.load(Ordering::SeqCst) {
            self.tick();
        }
        let stats = self.sched.stats();
        info!(
            ticks = stats.ticks,
            misses = stats.misses,
            "state publisher stopped"
        );
    }

    /// One publisher tick.
    fn tick(&mut self) {
        self.sched.wait();
        let now = Instant::now();

        // Single critical section: copy everything the tick needs so the
        // predictor inputs are mutually consistent.
        let copy = *self.shared.lock();

        let position_pct = if copy.hardware_healthy {
            copy.predictor.step(now)
        } else {
            copy.last_actual_position_pct
        };

        // Write authority: the predictor output, nothing else.
        self.shared.lock().predicted_position_pct = position_pct;

        let msg = if copy.hardware_healthy {
            GripperStateMessage {
                seq: self.seq,
                position_rad: pct_to_rad(position_pct, self.q_max),
                torque_estimate: copy.effort_pct / 10.0,
                mode: MODE_NORMAL,
            }
        } else {
            GripperStateMessage {
                seq: self.seq,
                position_rad: pct_to_rad(position_pct, self.q_max),
                torque_estimate: 0.0,
                mode: MODE_ERROR,
            }
        };
        self.state_sink.publish(&msg);

        if self.seq % self.telemetry_interval == 0 {
            let (temperature_c, current_ma, voltage_dv, hw_error) = match copy.snapshot {
                Some(snap) => (
                    snap.temperature_c,
                    snap.current_ma,
                    snap.voltage_dv,
                    snap.hw_error,
                ),
                None => (0, 0, 0, 0),
            };
            self.telemetry_sink.publish(&ControlTelemetry {
                commanded_pct: copy.commanded_position_pct,
                actual_pct: copy.last_actual_position_pct,
                predicted_pct: position_pct,
                position_error_pct: copy.commanded_position_pct - copy.last_actual_position_pct,
                grasp_state: copy.grasp_state,
                effort_pct: copy.effort_pct,
                temperature_c,
                current_ma,
                voltage_dv,
                hw_error,
                deadline_misses: copy.deadline_misses,
                hardware_healthy: copy.hardware_healthy,
                contact: copy.contact,
            });
        }
        self.seq += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gripper_common::GripperConfig;
    use gripper_common::state::GraspState;

    use crate::bus::{state_channel, telemetry_channel};
    use crate::shared::shared_handle;

    fn test_config() -> GripperConfig {
        let mut config = GripperConfig::from_toml("[servo]\nserial = \"TEST\"\n").unwrap();
        config.control.publish_hz = 1000.0;
        config
    }

    fn publisher(
        shared: SharedHandle,
    ) -> (
        StatePublisher,
        std::sync::mpsc::Receiver<GripperStateMessage>,
        std::sync::mpsc::Receiver<ControlTelemetry>,
    ) {
        let (state_sink, state_rx) = state_channel();
        let (telemetry_sink, telemetry_rx) = telemetry_channel();
        let publisher = StatePublisher::new(
            shared,
            Box::new(state_sink),
            Box::new(telemetry_sink),
            Arc::new(AtomicBool::new(false)),
            &test_config(),
        );
        (publisher, state_rx, telemetry_rx)
    }

    #[test]
    fn healthy_tick_publishes_prediction() {
        let shared = shared_handle(50.0, 952.43);
        {
            let mut s = shared.lock();
            s.predictor.sync(40.0, Instant::now());
            s.predictor.set_target(60.0);
            s.effort_pct = 17.0;
            s.grasp_state = GraspState::Moving;
        }
        let (mut publisher, state_rx, _telemetry_rx) = publisher(shared.clone());
        publisher.tick();

        let msg = state_rx.try_recv().unwrap();
        assert_eq!(msg.mode, MODE_NORMAL);
        assert!((msg.torque_estimate - 1.7).abs() < 1e-9);
        // Position between the sync point and the target, in radians.
        let pct = msg.position_rad / 5.4 * 100.0;
        assert!((40.0..=60.0).contains(&pct), "pct {pct}");
        assert!((shared.lock().predicted_position_pct - pct).abs() < 1e-9);
    }

    #[test]
    fn unhealthy_tick_freezes_position_and_flags_error() {
        let shared = shared_handle(50.0, 952.43);
        {
            let mut s = shared.lock();
            s.hardware_healthy = false;
            s.last_actual_position_pct = 37.0;
            s.effort_pct = 10.0;
            s.predictor.sync(37.0, Instant::now());
            s.predictor.set_target(95.0);
        }
        let (mut publisher, state_rx, _telemetry_rx) = publisher(shared.clone());
        publisher.tick();
        std::thread::sleep(Duration::from_millis(5));
        publisher.tick();

        // Both ticks report the frozen actual; no prediction toward 95.
        for _ in 0..2 {
            let msg = state_rx.try_recv().unwrap();
            assert_eq!(msg.mode, MODE_ERROR);
            assert_eq!(msg.torque_estimate, 0.0);
            let pct = msg.position_rad / 5.4 * 100.0;
            assert!((pct - 37.0).abs() < 1e-9, "pct {pct}");
        }
        assert_eq!(shared.lock().predicted_position_pct, 37.0);
    }

    #[test]
    fn telemetry_every_nth_tick() {
        let shared = shared_handle(50.0, 952.43);
        let (mut publisher, _state_rx, telemetry_rx) = publisher(shared);
        for _ in 0..13 {
            publisher.tick();
        }
        // Ticks 0, 6, 12 carry telemetry.
        let mut records = 0;
        while telemetry_rx.try_recv().is_ok() {
            records += 1;
        }
        assert_eq!(records, 3);
    }

    #[test]
    fn telemetry_carries_contact_signals_and_misses() {
        let shared = shared_handle(50.0, 952.43);
        {
            let mut s = shared.lock();
            s.deadline_misses = 4;
            s.contact.high_current = true;
            s.contact.contact_samples = 2;
        }
        let (mut publisher, _state_rx, telemetry_rx) = publisher(shared);
        publisher.tick();
        let record = telemetry_rx.try_recv().unwrap();
        assert_eq!(record.deadline_misses, 4);
        assert!(record.contact.high_current);
        assert_eq!(record.contact.contact_samples, 2);
        assert_eq!(record.grasp_state, GraspState::Idle);
    }
}
