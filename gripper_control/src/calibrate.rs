//! Contact-based startup calibration.
//!
//! Runs synchronously before any runtime thread exists. The servo is
//! rebooted (clearing latched error flags), driven toward the mechanical
//! hard stop under a reduced current cap, and watched until the jaw both
//! draws contact-level current and stops moving. The raw position at that
//! moment becomes the zero reference for every raw↔percent conversion that
//! follows; the gripper then retracts to the rest opening.
//!
//! Failure is fatal: the supervisor must not start threads on a calibration
//! error and the process exits non-zero.

use std::thread;
use std::time::{Duration, Instant};

use heapless::Deque;
use tracing::{debug, info, warn};

use gripper_common::calibration::CalibrationRecord;
use gripper_common::config::GripperConfig;
use gripper_common::error::CalibrationError;
use gripper_common::units::{PositionScale, effort_to_current_ma};
use gripper_link::{ServoBus, ServoLink};

/// Position window length for the stability check.
const WINDOW: usize = 5;

/// Budget for the servo to answer its first read after the reboot.
const RESPONSE_BUDGET: Duration = Duration::from_secs(2);

/// Brief torque release after contact, so the jaw is not left pressing the
/// stop at calibration current while the retract goal is staged.
const TORQUE_RELEASE: Duration = Duration::from_millis(100);

/// Drive the gripper closed until hard-stop contact and record the zero.
///
/// On success the gripper is parked at the configured retract opening and
/// the returned record carries the fresh `zero_raw` plus the configured
/// predictor speed. On timeout, torque is released and the error returned.
pub fn run_calibration<B: ServoBus>(
    link: &mut ServoLink<B>,
    config: &GripperConfig,
) -> Result<CalibrationRecord, CalibrationError> {
    let cal = &config.calibration;

    info!("calibration: rebooting servo");
    link.reboot()?;
    wait_for_servo(link, cal.poll_period_ms)?;
    link.set_torque(true)?;

    // Close toward the hard stop under the calibration current cap.
    let close_goal = cal.raw_minimum - cal.close_margin_ticks;
    let close_ma = effort_to_current_ma(cal.current_pct, config.current.hardware_max_ma);
    info!(close_goal, close_ma, "calibration: driving closed");
    link.write_goal(close_goal, close_ma)?;

    let poll = Duration::from_millis(cal.poll_period_ms);
    let deadline = Instant::now() + Duration::from_millis(cal.timeout_ms);
    let mut window: Deque<i32, WINDOW> = Deque::new();
    let mut stable = 0u32;

    loop {
        if Instant::now() >= deadline {
            warn!("calibration: no contact within budget; releasing torque");
            let _ = link.set_torque(false);
            return Err(CalibrationError::Timeout {
                timeout_ms: cal.timeout_ms,
            });
        }
        thread::sleep(poll);

        let snap = match link.read_state() {
            Ok(snap) => snap,
            Err(e) => {
                // Transient read failures just consume budget.
                debug!(error = %e, "calibration: read failed, retrying");
                continue;
            }
        };

        if window.is_full() {
            window.pop_front();
        }
        // Infallible: a slot was just freed.
        let _ = window.push_back(snap.raw_position);

        if window.is_full() {
            let min = window.iter().min().copied().unwrap_or(snap.raw_position);
            let max = window.iter().max().copied().unwrap_or(snap.raw_position);
            let position_stable = max - min <= cal.stable_pos_delta_ticks;
            let contact_current = snap.current_ma.abs() >= cal.contact_current_ma;

            if position_stable && contact_current {
                stable += 1;
            } else {
                stable = 0;
            }
            debug!(
                raw = snap.raw_position,
                current_ma = snap.current_ma,
                spread = max - min,
                stable,
                "calibration poll"
            );

            if stable >= cal.stable_consecutive {
                let zero_raw = snap.raw_position;
                info!(zero_raw, "calibration: contact confirmed");
                retract(link, config, zero_raw)?;
                return Ok(CalibrationRecord {
                    zero_raw,
                    movement_speed_pct_per_s: config.motion.movement_speed_pct_per_s,
                });
            }
        }
    }
}

/// Poll `read_state` until the servo answers after the reboot.
fn wait_for_servo<B: ServoBus>(
    link: &mut ServoLink<B>,
    poll_period_ms: u64,
) -> Result<(), CalibrationError> {
    let deadline = Instant::now() + RESPONSE_BUDGET;
    loop {
        match link.read_state() {
            Ok(_) => return Ok(()),
            Err(e) if Instant::now() >= deadline => {
                warn!(error = %e, "servo still unresponsive after reboot");
                return Err(CalibrationError::ServoUnresponsive);
            }
            Err(_) => thread::sleep(Duration::from_millis(poll_period_ms)),
        }
    }
}

/// Release the stall, then open to the rest position for the hold period.
fn retract<B: ServoBus>(
    link: &mut ServoLink<B>,
    config: &GripperConfig,
    zero_raw: i32,
) -> Result<(), CalibrationError> {
    let cal = &config.calibration;

    link.set_torque(false)?;
    thread::sleep(TORQUE_RELEASE);
    link.set_torque(true)?;

    let scale = PositionScale {
        zero_raw,
        span_ticks: config.motion.raw_span_ticks,
    };
    let retract_raw = scale.pct_to_raw(cal.retract_pct);
    let retract_ma = effort_to_current_ma(cal.retract_effort_pct, config.current.hardware_max_ma);
    info!(retract_raw, "calibration: retracting");
    link.write_goal(retract_raw, retract_ma)?;
    thread::sleep(Duration::from_millis(cal.retract_hold_ms));
    Ok(())
}
