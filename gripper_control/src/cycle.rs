//! The 30 Hz control loop.
//!
//! Each cycle: absolute-deadline sleep, latest-only command drain, heartbeat
//! check, grasp-machine step, one bulk goal write, one bulk state read,
//! hardware-error inspection, shared-state publication. The loop owns the
//! serial link exclusively and is the only thread that ever touches it.
//!
//! Failure policy: transient link errors are counted per consecutive
//! occurrence and logged at debug; at ≥5 consecutive or >2 s since the last
//! good read the loop latches `hardware_healthy = false`, drives the safe
//! position, and keeps cycling. The latch is never cleared here — recovery
//! is the external process manager's restart through a fresh calibration.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use tracing::{debug, error, info, warn};

use gripper_common::calibration::CalibrationRecord;
use gripper_common::command::GripCommand;
use gripper_common::config::GripperConfig;
use gripper_common::servo::ServoSnapshot;
use gripper_common::units::{
    PositionScale, current_to_pct, effort_to_current_ma, to_servo_safe_pct,
};
use gripper_link::link::decode_error;
use gripper_link::{ServoBus, ServoLink};

use crate::bus::CommandSource;
use crate::clock::Scheduler;
use crate::grasp::{GraspInput, GraspMachine, GraspParams};
use crate::shared::SharedHandle;

// ─── RT thread setup ────────────────────────────────────────────────

/// Lock all current and future memory pages (prevent page faults mid-cycle).
#[cfg(feature = "rt")]
fn rt_mlockall() -> Result<(), String> {
    use nix::sys::mman::{MlockAllFlags, mlockall};
    mlockall(MlockAllFlags::MCL_CURRENT | MlockAllFlags::MCL_FUTURE)
        .map_err(|e| format!("mlockall failed: {e}"))
}

/// Touch a stack allocation to force page allocation before the loop runs.
#[cfg(feature = "rt")]
fn prefault_stack() {
    let mut buf = [0u8; 256 * 1024];
    for byte in buf.iter_mut() {
        unsafe { core::ptr::write_volatile(byte, 0xFF) };
    }
    core::hint::black_box(&buf);
}

/// Set SCHED_FIFO with the given RT priority on the current thread.
#[cfg(feature = "rt")]
fn rt_set_scheduler(priority: i32) -> Result<(), String> {
    let param = libc::sched_param {
        sched_priority: priority,
    };
    let ret = unsafe { libc::sched_setscheduler(0, libc::SCHED_FIFO, &param) };
    if ret != 0 {
        let err = std::io::Error::last_os_error();
        return Err(format!("sched_setscheduler(SCHED_FIFO, {priority}): {err}"));
    }
    Ok(())
}

/// Attempt RT privileges for the control thread.
///
/// Each step degrades to a logged warning on failure — a development host
/// without CAP_SYS_NICE still runs, just without latency guarantees.
pub fn rt_thread_setup(priority: i32) {
    #[cfg(feature = "rt")]
    {
        if let Err(e) = rt_mlockall() {
            warn!("running without locked memory: {e}");
        }
        prefault_stack();
        match rt_set_scheduler(priority) {
            Ok(()) => info!(priority, "control thread scheduled SCHED_FIFO"),
            Err(e) => warn!("running without RT priority: {e}"),
        }
    }
    #[cfg(not(feature = "rt"))]
    {
        let _ = priority;
        debug!("rt feature disabled; control thread at normal priority");
    }
}

// ─── Control loop ───────────────────────────────────────────────────

/// The control loop. `run` consumes it and returns the link for teardown.
pub struct ControlLoop<B: ServoBus> {
    link: ServoLink<B>,
    commands: Box<dyn CommandSource>,
    shared: SharedHandle,
    stop: Arc<AtomicBool>,
    grasp: GraspMachine,
    sched: Scheduler,
    scale: PositionScale,
    config: GripperConfig,
    heartbeat_timeout: Duration,
    comm_stale: Duration,

    // Latest accepted command; starts as a rest-position hold.
    latest: GripCommand,
    ever_received: bool,

    // Most recent and previous hardware-derived positions.
    actual_pct: f64,
    prev_actual_pct: f64,
    current_pct: f64,

    healthy: bool,
    comm_errors: u32,
    cycle_had_link_error: bool,
    last_good_read: Instant,
    seen_error_codes: [u64; 4],
    temp_warned: bool,
}

impl<B: ServoBus> ControlLoop<B> {
    pub fn new(
        link: ServoLink<B>,
        commands: Box<dyn CommandSource>,
        shared: SharedHandle,
        stop: Arc<AtomicBool>,
        config: GripperConfig,
        record: &CalibrationRecord,
    ) -> Self {
        let now = Instant::now();
        let rest = config.motion.rest_position_pct;
        let period = Duration::from_secs_f64(1.0 / config.control.cycle_hz);
        Self {
            grasp: GraspMachine::new(
                GraspParams::from_config(&config.contact, &config.forces),
                rest,
            ),
            sched: Scheduler::new(period),
            scale: record.scale(config.motion.raw_span_ticks),
            heartbeat_timeout: Duration::from_millis(config.control.heartbeat_timeout_ms),
            comm_stale: Duration::from_millis(config.control.comm_stale_ms),
            latest: GripCommand::hold(rest, now),
            ever_received: false,
            actual_pct: rest,
            prev_actual_pct: rest,
            current_pct: 0.0,
            healthy: true,
            comm_errors: 0,
            cycle_had_link_error: false,
            last_good_read: now,
            seen_error_codes: [0; 4],
            temp_warned: false,
            link,
            commands,
            shared,
            stop,
            config,
        }
    }

    /// Enter the cycle loop until the stop flag is set. Returns the link so
    /// the supervisor can disable torque and close the serial handle.
    pub fn run(mut self) -> ServoLink<B> {
        rt_thread_setup(self.config.control.rt_priority);
        info!(
            period_ms = self.sched.period().as_millis() as u64,
            "control loop running"
        );
        while !self.stop.load(Ordering::SeqCst) {
            self.cycle();
        }
        let stats = self.sched.stats();
        info!(
            ticks = stats.ticks,
            misses = stats.misses,
            "control loop stopped"
        );
        self.link
    }

    /// One control cycle.
    fn cycle(&mut self) {
        let tick = self.sched.wait();
        let cycle_start = Instant::now();
        self.cycle_had_link_error = false;

        // Ingest: keep only the newest pending command.
        if let Some(cmd) = self.commands.poll_latest() {
            self.latest = GripCommand::from_joint(&cmd, self.config.motion.q_max_rad, cycle_start);
            self.ever_received = true;
        }

        // Heartbeat. Before the first command ever arrives the loop holds
        // the calibrated rest position instead of declaring loss.
        let heartbeat_ok = !self.ever_received
            || cycle_start.duration_since(self.latest.received_at) <= self.heartbeat_timeout;

        // Grasp machine, fed from the previous cycle's snapshot.
        let commanded_safe = to_servo_safe_pct(
            self.latest.position_pct,
            self.config.motion.servo_min_pct,
            self.config.motion.servo_max_pct,
        );
        let mut out = self.grasp.step(&GraspInput {
            commanded_pct: commanded_safe,
            heartbeat_ok,
            actual_pct: self.actual_pct,
            prev_actual_pct: self.prev_actual_pct,
            current_pct: self.current_pct,
        });

        // Unhealthy: override with the safe position, keep cycling.
        if !self.healthy {
            out.goal_pct = self.config.control.safe_position_pct;
            out.effort_pct = self.config.control.safe_effort_pct;
        }

        // Goal write. The heartbeat hold target is the raw actual position,
        // so clamp into the servo-safe range once more before scaling.
        let goal_servo_pct = to_servo_safe_pct(
            out.goal_pct,
            self.config.motion.servo_min_pct,
            self.config.motion.servo_max_pct,
        );
        let goal_raw = self.scale.pct_to_raw(goal_servo_pct);
        let goal_ma = effort_to_current_ma(out.effort_pct, self.config.current.hardware_max_ma);
        if let Err(e) = self.link.write_goal(goal_raw, goal_ma) {
            self.note_comm_error("write_goal", &e, cycle_start);
        }

        // State read.
        let mut fresh: Option<ServoSnapshot> = None;
        match self.link.read_state() {
            Ok(snap) => {
                self.last_good_read = snap.read_at;
                self.inspect_hardware(&snap);
                self.prev_actual_pct = self.actual_pct;
                self.actual_pct = self.scale.raw_to_pct(snap.raw_position);
                self.current_pct =
                    current_to_pct(snap.current_ma, self.config.current.hardware_max_ma);
                fresh = Some(snap);
            }
            Err(e) => self.note_comm_error("read_state", &e, cycle_start),
        }

        // The consecutive count resets only when a whole cycle saw no link
        // error from either direction; a read success must not mask a
        // failing write path.
        if !self.cycle_had_link_error {
            self.comm_errors = 0;
        }

        // Publish into the shared record — one critical section, no I/O.
        {
            let mut shared = self.shared.lock();
            shared.commanded_position_pct = out.goal_pct;
            shared.effort_pct = out.effort_pct;
            shared.grasp_state = out.state;
            shared.contact = out.signals;
            shared.hardware_healthy = self.healthy;
            shared.deadline_misses = self.sched.misses();
            shared.last_command_received_at =
                self.ever_received.then_some(self.latest.received_at);
            if let Some(snap) = fresh {
                shared.snapshot = Some(snap);
                shared.last_actual_position_pct = self.actual_pct;
                shared.last_actual_sample_time = Some(snap.read_at);
                shared.predictor.sync(self.actual_pct, snap.read_at);
            }
            shared.predictor.set_target(out.goal_pct);
        }

        // Cycle accounting. Lateness was already recorded by the scheduler;
        // an over-budget body shows up as a miss on the next wait.
        if tick.is_miss() {
            debug!(misses = self.sched.misses(), "control deadline missed");
        }
        let elapsed = cycle_start.elapsed();
        if elapsed > self.sched.period() {
            debug!(elapsed_us = elapsed.as_micros() as u64, "cycle over budget");
        }
    }

    /// Consecutive-error accounting for both serial directions.
    fn note_comm_error(&mut self, op: &str, e: &gripper_common::LinkError, now: Instant) {
        self.comm_errors += 1;
        self.cycle_had_link_error = true;
        debug!(op, error = %e, consecutive = self.comm_errors, "transient link error");

        let stale = now.duration_since(self.last_good_read) > self.comm_stale;
        if (self.comm_errors >= self.config.control.comm_error_limit || stale) && self.healthy {
            self.healthy = false;
            error!(
                consecutive = self.comm_errors,
                stale, "link failure threshold reached; holding safe position"
            );
        }
    }

    /// Hardware-error byte and temperature supervision.
    fn inspect_hardware(&mut self, snap: &ServoSnapshot) {
        if snap.hw_error != 0 {
            let flags = decode_error(snap.hw_error);
            if !self.code_seen(snap.hw_error) {
                self.mark_code_seen(snap.hw_error);
                warn!(code = snap.hw_error, ?flags, "servo hardware error reported");
            }
            if flags.is_critical() && self.healthy {
                self.healthy = false;
                error!(
                    code = snap.hw_error,
                    ?flags,
                    "critical hardware error; holding safe position"
                );
            }
        }

        let t = snap.temperature_c;
        if t >= self.config.temperature.shutdown_c {
            if self.healthy {
                self.healthy = false;
                error!(
                    temperature_c = t,
                    threshold = self.config.temperature.shutdown_c,
                    "temperature at shutdown threshold; holding safe position"
                );
            }
        } else if t >= self.config.temperature.warning_c {
            if !self.temp_warned {
                self.temp_warned = true;
                warn!(
                    temperature_c = t,
                    threshold = self.config.temperature.warning_c,
                    "servo temperature elevated"
                );
            }
        } else {
            self.temp_warned = false;
        }
    }

    #[inline]
    fn code_seen(&self, code: u8) -> bool {
        self.seen_error_codes[(code / 64) as usize] & (1u64 << (code % 64)) != 0
    }

    #[inline]
    fn mark_code_seen(&mut self, code: u8) {
        self.seen_error_codes[(code / 64) as usize] |= 1u64 << (code % 64);
    }
}

// ─── Tests ──────────────────────────────────────────────────────────
