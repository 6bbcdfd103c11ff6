//! Simulated servo bus.
//!
//! Integrates gripper motion toward the written goal under the written
//! current limit, with mechanical hard stops, an optional rigid object in
//! the jaw path, and injectable faults. Deterministic except for wall-clock
//! integration; tests steer it through the [`SimServo`] handle while the
//! control loop owns the [`ServoLink`](crate::ServoLink) wrapping a clone.
//!
//! Current model: idle near the goal, a fraction of the commanded limit in
//! free motion, and an overshoot of the limit when stalled against a stop —
//! the firmware's current loop overshoots while fighting the jaw spring, so
//! stall readings exceed the commanded cap.

use std::sync::Arc;
use std::time::Instant;

use parking_lot::Mutex;

use gripper_common::config::{RegisterLayout, RegisterSpec};
use gripper_common::error::LinkError;

use crate::bus::{MAX_BULK_REGS, RegisterWrite, ServoBus};

/// Simulation tuning.
#[derive(Debug, Clone, Copy)]
pub struct SimParams {
    /// Mechanical hard stop, closed end [ticks].
    pub hard_min_raw: i32,
    /// Mechanical hard stop, open end [ticks].
    pub hard_max_raw: i32,
    /// Slew rate toward the goal [ticks/s].
    pub speed_ticks_per_s: f64,
    /// Stall current overshoot over the commanded limit.
    pub stall_gain: f64,
    /// Free-motion current as a fraction of the commanded limit.
    pub moving_current_frac: f64,
    /// Quiescent current near the goal [mA].
    pub idle_current_ma: f64,
    /// Initial position [ticks].
    pub start_raw: i32,
    /// Reported temperature [°C].
    pub temperature_c: u8,
    /// Reported input voltage [0.1 V].
    pub voltage_dv: u8,
}

impl Default for SimParams {
    fn default() -> Self {
        Self {
            hard_min_raw: 1157,
            hard_max_raw: 4100,
            speed_ticks_per_s: 26_668.0,
            stall_gain: 3.4,
            moving_current_frac: 0.3,
            idle_current_ma: 15.0,
            start_raw: 2600,
            temperature_c: 38,
            voltage_dv: 121,
        }
    }
}

/// Reads the servo refuses during the post-reboot blackout.
const REBOOT_BLACKOUT_READS: u32 = 2;

struct SimState {
    params: SimParams,
    layout: RegisterLayout,
    position: f64,
    goal_raw: i32,
    current_limit_ma: i32,
    torque_on: bool,
    obstacle_raw: Option<i32>,
    hw_error: u8,
    temperature_c: u8,
    fail_reads: u32,
    fail_writes: u32,
    blackout_reads: u32,
    last_advance: Instant,
}

impl SimState {
    /// Integrate motion since the last transaction.
    fn advance(&mut self, now: Instant) {
        let dt = now.saturating_duration_since(self.last_advance).as_secs_f64();
        self.last_advance = now;
        if !self.torque_on || dt <= 0.0 {
            return;
        }

        // The goal is deliberately NOT clamped: a goal past a stop keeps
        // the firmware pushing, which is what stall current models.
        let target = self.goal_raw as f64;
        let floor = self.effective_floor();

        let step = self.params.speed_ticks_per_s * dt;
        let delta = target - self.position;
        let moved = if delta.abs() <= step {
            target
        } else {
            self.position + delta.signum() * step
        };
        self.position = moved.clamp(floor, self.params.hard_max_raw as f64);
    }

    /// Lowest reachable position: hard stop, or the object in the jaw path.
    fn effective_floor(&self) -> f64 {
        let min = self.params.hard_min_raw as f64;
        match self.obstacle_raw {
            Some(obstacle) => min.max(obstacle as f64),
            None => min,
        }
    }

    /// Present current given the motion state after `advance`.
    fn present_current_ma(&self) -> i32 {
        if !self.torque_on {
            return 0;
        }
        let delta = self.goal_raw as f64 - self.position;
        if delta.abs() < 1.0 {
            return self.params.idle_current_ma.round() as i32;
        }
        let pinned_closing = delta < 0.0 && self.position <= self.effective_floor() + 0.5;
        let pinned_opening =
            delta > 0.0 && self.position >= self.params.hard_max_raw as f64 - 0.5;
        let magnitude = if pinned_closing || pinned_opening {
            self.current_limit_ma as f64 * self.params.stall_gain
        } else {
            self.current_limit_ma as f64 * self.params.moving_current_frac
        };
        (delta.signum() * magnitude).round() as i32
    }

    fn read_register(&self, spec: &RegisterSpec) -> Result<i32, LinkError> {
        let l = &self.layout;
        let value = if spec.addr == l.present_current.addr {
            self.present_current_ma()
        } else if spec.addr == l.present_position.addr {
            self.position.round() as i32
        } else if spec.addr == l.present_load.addr {
            // Load tracks current on this firmware, scaled to per-mille.
            (self.present_current_ma() as f64 * 0.5).round() as i32
        } else if spec.addr == l.hardware_error.addr {
            self.hw_error as i32
        } else if spec.addr == l.present_temperature.addr {
            self.temperature_c as i32
        } else if spec.addr == l.present_voltage.addr {
            self.params.voltage_dv as i32
        } else if spec.addr == l.torque_enable.addr {
            self.torque_on as i32
        } else if spec.addr == l.goal_position.addr {
            self.goal_raw
        } else if spec.addr == l.goal_current.addr {
            self.current_limit_ma
        } else {
            return Err(LinkError::Protocol(format!(
                "read of unmapped register {}",
                spec.addr
            )));
        };
        Ok(value)
    }
}

/// Cloneable handle to the simulated servo; every clone shares one state.
#[derive(Clone)]
pub struct SimServo {
    inner: Arc<Mutex<SimState>>,
}

impl SimServo {
    pub fn new(layout: RegisterLayout, params: SimParams) -> Self {
        Self {
            inner: Arc::new(Mutex::new(SimState {
                position: params.start_raw as f64,
                goal_raw: params.start_raw,
                current_limit_ma: 0,
                torque_on: true,
                obstacle_raw: None,
                hw_error: 0,
                temperature_c: params.temperature_c,
                fail_reads: 0,
                fail_writes: 0,
                blackout_reads: 0,
                last_advance: Instant::now(),
                params,
                layout,
            })),
        }
    }

    // ── Test / scenario hooks ──

    /// Place (or remove) a rigid object blocking closure below `raw`.
    pub fn set_obstacle(&self, raw: Option<i32>) {
        self.inner.lock().obstacle_raw = raw;
    }

    /// Teleport the jaw (setup only).
    pub fn set_position_raw(&self, raw: i32) {
        let mut state = self.inner.lock();
        state.position = raw as f64;
        state.goal_raw = raw;
    }

    pub fn position_raw(&self) -> i32 {
        self.inner.lock().position.round() as i32
    }

    pub fn goal_raw(&self) -> i32 {
        self.inner.lock().goal_raw
    }

    pub fn current_limit_ma(&self) -> i32 {
        self.inner.lock().current_limit_ma
    }

    pub fn torque_on(&self) -> bool {
        self.inner.lock().torque_on
    }

    /// Latch a hardware-error byte until the next reboot.
    pub fn inject_hw_error(&self, code: u8) {
        self.inner.lock().hw_error = code;
    }

    pub fn set_temperature(&self, temperature_c: u8) {
        self.inner.lock().temperature_c = temperature_c;
    }

    /// Fail the next `n` reads with a timeout.
    pub fn fail_next_reads(&self, n: u32) {
        self.inner.lock().fail_reads = n;
    }

    /// Fail the next `n` writes with a timeout.
    pub fn fail_next_writes(&self, n: u32) {
        self.inner.lock().fail_writes = n;
    }
}

impl ServoBus for SimServo {
    fn read_bulk(
        &mut self,
        plan: &[RegisterSpec],
    ) -> Result<heapless::Vec<i32, MAX_BULK_REGS>, LinkError> {
        let mut state = self.inner.lock();
        if state.blackout_reads > 0 {
            state.blackout_reads -= 1;
            return Err(LinkError::Timeout);
        }
        if state.fail_reads > 0 {
            state.fail_reads -= 1;
            return Err(LinkError::Timeout);
        }
        state.advance(Instant::now());

        let mut out = heapless::Vec::new();
        for spec in plan {
            let value = state.read_register(spec)?;
            out.push(value)
                .map_err(|_| LinkError::Protocol("bulk read plan too long".to_string()))?;
        }
        Ok(out)
    }

    fn write_bulk(&mut self, writes: &[RegisterWrite]) -> Result<(), LinkError> {
        let mut state = self.inner.lock();
        if state.fail_writes > 0 {
            state.fail_writes -= 1;
            return Err(LinkError::Timeout);
        }
        state.advance(Instant::now());

        for w in writes {
            let l = state.layout;
            if w.spec.addr == l.goal_position.addr {
                state.goal_raw = w.value;
            } else if w.spec.addr == l.goal_current.addr {
                state.current_limit_ma = w.value;
            } else if w.spec.addr == l.torque_enable.addr {
                state.torque_on = w.value != 0;
            } else {
                return Err(LinkError::Protocol(format!(
                    "write to unmapped register {}",
                    w.spec.addr
                )));
            }
        }
        Ok(())
    }

    fn reboot(&mut self) -> Result<(), LinkError> {
        let mut state = self.inner.lock();
        state.hw_error = 0;
        state.torque_on = false;
        state.goal_raw = state.position.round() as i32;
        state.blackout_reads = REBOOT_BLACKOUT_READS;
        state.last_advance = Instant::now();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;
    use std::time::Duration;

    fn sim() -> SimServo {
        SimServo::new(RegisterLayout::default(), SimParams::default())
    }

    fn snapshot_of(sim: &SimServo) -> (i32, i32) {
        let layout = RegisterLayout::default();
        let mut bus = sim.clone();
        let values = bus
            .read_bulk(&[layout.present_current, layout.present_position])
            .unwrap();
        (values[0], values[1])
    }

    fn write_goal(sim: &SimServo, goal: i32, limit: i32) {
        let layout = RegisterLayout::default();
        let mut bus = sim.clone();
        bus.write_bulk(&[
            RegisterWrite {
                spec: layout.goal_position,
                value: goal,
            },
            RegisterWrite {
                spec: layout.goal_current,
                value: limit,
            },
        ])
        .unwrap();
    }

    #[test]
    fn moves_toward_goal() {
        let sim = sim();
        write_goal(&sim, 3600, 300);
        thread::sleep(Duration::from_millis(60));
        let (_, pos) = snapshot_of(&sim);
        assert!(pos > 2600, "position should advance, got {pos}");
        thread::sleep(Duration::from_millis(150));
        let (current, pos) = snapshot_of(&sim);
        assert_eq!(pos, 3600);
        // Settled at the goal: idle current.
        assert!(current.abs() < 50, "settled current {current}");
    }

    #[test]
    fn obstacle_stalls_with_high_current() {
        let sim = sim();
        sim.set_obstacle(Some(2100));
        write_goal(&sim, 1300, 300);
        thread::sleep(Duration::from_millis(120));
        let (current, pos) = snapshot_of(&sim);
        assert_eq!(pos, 2100, "blocked at the obstacle");
        // Stalled closing: negative, overshooting the 300 mA cap.
        assert!(current < -300, "stall current {current}");
    }

    #[test]
    fn hard_stop_stalls() {
        let sim = sim();
        write_goal(&sim, 900, 500);
        thread::sleep(Duration::from_millis(200));
        let (current, pos) = snapshot_of(&sim);
        assert_eq!(pos, 1157);
        assert!(current < -500);
    }

    #[test]
    fn torque_off_freezes_motion_and_current() {
        let sim = sim();
        let layout = RegisterLayout::default();
        let mut bus = sim.clone();
        bus.write_bulk(&[RegisterWrite {
            spec: layout.torque_enable,
            value: 0,
        }])
        .unwrap();
        write_goal(&sim, 3600, 300);
        thread::sleep(Duration::from_millis(80));
        let (current, pos) = snapshot_of(&sim);
        assert_eq!(pos, 2600, "torque off: no motion");
        assert_eq!(current, 0);
    }

    #[test]
    fn injected_read_failures_then_recover() {
        let sim = sim();
        let layout = RegisterLayout::default();
        let mut bus = sim.clone();
        sim.fail_next_reads(2);
        assert_eq!(
            bus.read_bulk(&[layout.present_position]).unwrap_err(),
            LinkError::Timeout
        );
        assert_eq!(
            bus.read_bulk(&[layout.present_position]).unwrap_err(),
            LinkError::Timeout
        );
        assert!(bus.read_bulk(&[layout.present_position]).is_ok());
    }

    #[test]
    fn reboot_clears_error_and_blacks_out() {
        let sim = sim();
        let layout = RegisterLayout::default();
        sim.inject_hw_error(0x20);
        let mut bus = sim.clone();
        bus.reboot().unwrap();
        // Blackout reads first, then a clean error byte.
        assert!(bus.read_bulk(&[layout.hardware_error]).is_err());
        assert!(bus.read_bulk(&[layout.hardware_error]).is_err());
        let values = bus.read_bulk(&[layout.hardware_error]).unwrap();
        assert_eq!(values[0], 0);
        assert!(!sim.torque_on(), "reboot leaves torque off");
    }
}
