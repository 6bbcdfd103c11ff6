//! Thread lifecycle, signal-driven shutdown, and startup ordering.
//!
//! Startup: calibrate synchronously (no threads yet), persist the fresh
//! zero, then spawn the control thread (RT attempt) and the publisher
//! thread. Shutdown: the stop flag — set by SIGINT/SIGTERM or by a caller —
//! wakes both loops at their next deadline; the supervisor joins them with
//! bounded timeouts, disables servo torque, and drops the serial handle.
//! A thread stuck in a serial call forfeits the handle: the timeout elapses
//! and teardown proceeds without it.
//!
//! There is no in-process recovery from `hardware_healthy = false`. The
//! process keeps publishing diagnostics until an external process manager
//! restarts it, which reruns the calibrator (and its reboot step) afresh.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use tracing::{error, info, warn};

use gripper_common::calibration::{CalibrationRecord, CalibrationStore};
use gripper_common::config::GripperConfig;
use gripper_common::error::{ConfigError, RuntimeError};
use gripper_link::{ServoBus, ServoLink};

use crate::bus::BusEndpoints;
use crate::calibrate::run_calibration;
use crate::cycle::ControlLoop;
use crate::publisher::StatePublisher;
use crate::shared::shared_handle;

/// Join budget for the control thread (may be inside a serial timeout).
const CONTROL_JOIN_TIMEOUT: Duration = Duration::from_millis(1500);
/// Join budget for the publisher thread.
const PUBLISHER_JOIN_TIMEOUT: Duration = Duration::from_millis(1000);

/// Startup options resolved by the binary.
#[derive(Debug, Clone, Copy, Default)]
pub struct SupervisorOptions {
    /// Reuse the persisted zero instead of driving a fresh calibration.
    /// Refused when no stored record exists for this serial.
    pub skip_calibration: bool,
}

/// Run the gripper until a shutdown signal (or a caller-set stop flag).
///
/// `stop` may be pre-wired by tests; the supervisor additionally binds it
/// to SIGINT/SIGTERM.
pub fn run<B: ServoBus + 'static>(
    config: GripperConfig,
    transport: B,
    endpoints: BusEndpoints,
    store: &CalibrationStore,
    options: SupervisorOptions,
    stop: Arc<AtomicBool>,
) -> Result<(), RuntimeError> {
    let mut link = ServoLink::new(transport, config.registers);
    let serial = config.servo.serial.clone();

    // Calibration completes before any thread starts.
    let record = if options.skip_calibration {
        let zero_raw = store.load_zero(&serial)?.ok_or_else(|| {
            ConfigError::Validation(format!(
                "no stored calibration for serial {serial}; run without --skip-calibration"
            ))
        })?;
        info!(zero_raw, "reusing stored calibration zero");
        CalibrationRecord {
            zero_raw,
            movement_speed_pct_per_s: config.motion.movement_speed_pct_per_s,
        }
    } else {
        let record = run_calibration(&mut link, &config)?;
        // Persistence failure is non-fatal; the fresh zero stays valid for
        // this run.
        if let Err(e) = store.save_zero(&serial, record.zero_raw) {
            warn!(error = %e, "could not persist calibration zero");
        }
        record
    };

    install_signal_handlers(stop.clone())?;

    let shared = shared_handle(
        config.motion.rest_position_pct,
        record.movement_speed_pct_per_s,
    );

    let control = ControlLoop::new(
        link,
        endpoints.commands,
        shared.clone(),
        stop.clone(),
        config.clone(),
        &record,
    );
    let control_handle = spawn_named("grip-control", move || control.run())?;

    let publisher = StatePublisher::new(
        shared,
        endpoints.state,
        endpoints.telemetry,
        stop.clone(),
        &config,
    );
    let publisher_handle = spawn_named("grip-state", move || publisher.run())?;

    info!("gripper running");

    // Park until a signal arrives or the control thread dies on its own.
    while !stop.load(Ordering::SeqCst) && !control_handle.is_finished() {
        thread::sleep(Duration::from_millis(50));
    }
    if control_handle.is_finished() && !stop.load(Ordering::SeqCst) {
        error!("control thread exited unexpectedly; shutting down");
    }
    stop.store(true, Ordering::SeqCst);

    shutdown(control_handle, publisher_handle);
    Ok(())
}

/// Join both threads with bounded timeouts, then tear the servo down.
fn shutdown<B: ServoBus>(
    control_handle: JoinHandle<ServoLink<B>>,
    publisher_handle: JoinHandle<()>,
) {
    match join_timeout(control_handle, CONTROL_JOIN_TIMEOUT) {
        Some(mut link) => {
            if let Err(e) = link.set_torque(false) {
                warn!(error = %e, "could not disable torque during shutdown");
            }
            drop(link);
        }
        None => {
            // Stuck in a serial call; the handle closes with the process.
            warn!("control thread did not stop in time; abandoning serial handle");
        }
    }

    if join_timeout(publisher_handle, PUBLISHER_JOIN_TIMEOUT).is_none() {
        warn!("publisher thread did not stop in time");
    }

    info!("shutdown complete");
}

/// Bind SIGINT/SIGTERM to the stop flag.
fn install_signal_handlers(stop: Arc<AtomicBool>) -> Result<(), RuntimeError> {
    ctrlc::set_handler(move || {
        info!("shutdown signal received");
        stop.store(true, Ordering::SeqCst);
    })
    .map_err(|e| RuntimeError::Signal(e.to_string()))
}

fn spawn_named<T, F>(name: &str, f: F) -> Result<JoinHandle<T>, RuntimeError>
where
    T: Send + 'static,
    F: FnOnce() -> T + Send + 'static,
{
    thread::Builder::new()
        .name(name.to_string())
        .spawn(f)
        .map_err(|e| RuntimeError::Signal(format!("spawning {name}: {e}")))
}

/// Join with a deadline by polling `is_finished`; `None` on timeout.
fn join_timeout<T>(handle: JoinHandle<T>, timeout: Duration) -> Option<T> {
    let deadline = Instant::now() + timeout;
    while !handle.is_finished() {
        if Instant::now() >= deadline {
            return None;
        }
        thread::sleep(Duration::from_millis(10));
    }
    handle.join().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn join_timeout_returns_value_for_prompt_threads() {
        let handle = thread::spawn(|| 42u32);
        assert_eq!(join_timeout(handle, Duration::from_millis(500)), Some(42));
    }

    #[test]
    fn join_timeout_gives_up_on_stuck_threads() {
        let handle = thread::spawn(|| {
            thread::sleep(Duration::from_secs(5));
        });
        let start = Instant::now();
        assert!(join_timeout(handle, Duration::from_millis(50)).is_none());
        assert!(start.elapsed() < Duration::from_secs(1));
    }
}
