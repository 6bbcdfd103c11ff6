//! Grasp state machine: Idle / Moving / Contact / Grasping.
//!
//! An explicit transition function over a tagged enum with an explicit
//! counters struct. The machine owns the *accepted target* — the position
//! the servo is actually driven toward — which tracks the commanded
//! position while moving and freezes at the contact position once an object
//! is felt. Force is state-driven: the commanded effort field is ignored
//! here and only retained for telemetry.
//!
//! Contact detection runs only in `Moving`: measured current above the
//! threshold AND position stagnation, simultaneously, for N consecutive
//! cycles. A grasp is broken only by an *opening* command past the frozen
//! target plus hysteresis — repeating the same close command keeps the
//! grasp, which is what prevents force-reduction oscillation.

use gripper_common::config::{ContactConfig, ForceConfig};
use gripper_common::state::GraspState;
use gripper_common::telemetry::ContactSignals;

// ─── Parameters ─────────────────────────────────────────────────────

/// Resolved state-machine parameters.
#[derive(Debug, Clone, Copy)]
pub struct GraspParams {
    /// High-current predicate threshold [% of hardware max].
    pub current_threshold_pct: f64,
    /// Per-cycle position delta below which the jaw counts as stagnant [%].
    pub stagnation_pct: f64,
    /// Consecutive qualifying cycles confirming contact.
    pub contact_cycles: u32,
    /// Settling cycles in `Contact` before `Grasping`.
    pub settle_cycles: u32,
    /// Opening margin over the frozen target that breaks a grasp [%].
    pub open_hysteresis_pct: f64,
    /// Arrival/departure epsilon for Idle [%].
    pub idle_epsilon_pct: f64,
    /// Effort table [%].
    pub idle_force_pct: f64,
    pub moving_force_pct: f64,
    pub grasping_force_pct: f64,
}

impl GraspParams {
    pub fn from_config(contact: &ContactConfig, forces: &ForceConfig) -> Self {
        Self {
            current_threshold_pct: contact.current_threshold_pct,
            stagnation_pct: contact.stagnation_pct,
            contact_cycles: contact.contact_cycles,
            settle_cycles: contact.settle_cycles,
            open_hysteresis_pct: contact.open_hysteresis_pct,
            idle_epsilon_pct: contact.idle_epsilon_pct,
            idle_force_pct: forces.idle_pct,
            moving_force_pct: forces.moving_pct,
            grasping_force_pct: forces.grasping_pct,
        }
    }
}

// ─── Inputs / outputs ───────────────────────────────────────────────

/// Per-cycle inputs, taken from the latest command and the two most recent
/// servo snapshots.
#[derive(Debug, Clone, Copy)]
pub struct GraspInput {
    /// Commanded position, already clamped to the servo-safe range [%].
    pub commanded_pct: f64,
    /// False once the command stream has been silent past the heartbeat
    /// timeout.
    pub heartbeat_ok: bool,
    /// Position from the most recent snapshot [%].
    pub actual_pct: f64,
    /// Position from the snapshot before that [%].
    pub prev_actual_pct: f64,
    /// |present current| as a percentage of the hardware maximum.
    pub current_pct: f64,
}

/// Per-cycle outputs.
#[derive(Debug, Clone, Copy)]
pub struct GraspOutput {
    /// Accepted target the servo is driven toward [%].
    pub goal_pct: f64,
    /// State-driven effort [%].
    pub effort_pct: f64,
    /// State after this cycle's transition.
    pub state: GraspState,
    /// Contact sub-signals for telemetry.
    pub signals: ContactSignals,
}

/// Detection counters. Both reset to zero whenever the state leaves
/// `Moving`/`Contact` respectively.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct GraspCounters {
    /// Consecutive cycles the contact predicate held (Moving only).
    pub contact_samples: u32,
    /// Cycles spent settling in Contact.
    pub settle_cycles: u32,
}

// ─── Machine ────────────────────────────────────────────────────────

/// The grasp state machine.
#[derive(Debug, Clone)]
pub struct GraspMachine {
    state: GraspState,
    target_pct: f64,
    counters: GraspCounters,
    params: GraspParams,
}

impl GraspMachine {
    /// New machine in `Idle`, holding the calibrated rest position.
    pub fn new(params: GraspParams, rest_pct: f64) -> Self {
        Self {
            state: GraspState::Idle,
            target_pct: rest_pct,
            counters: GraspCounters::default(),
            params,
        }
    }

    #[inline]
    pub fn state(&self) -> GraspState {
        self.state
    }

    /// The accepted target the servo is currently driven toward.
    #[inline]
    pub fn target_pct(&self) -> f64 {
        self.target_pct
    }

    #[inline]
    pub fn counters(&self) -> GraspCounters {
        self.counters
    }

    /// Run one control cycle's transition.
    pub fn step(&mut self, input: &GraspInput) -> GraspOutput {
        let p = self.params;

        if !input.heartbeat_ok {
            // Heartbeat loss: hold position wherever the jaw is. Expected
            // during supervisor hand-off, so no escalation beyond Idle.
            self.state = GraspState::Idle;
            self.target_pct = input.actual_pct;
            self.counters = GraspCounters::default();
            return self.output(ContactSignals::default());
        }

        let mut signals = ContactSignals::default();

        match self.state {
            GraspState::Idle => {
                self.counters = GraspCounters::default();
                if (input.commanded_pct - input.actual_pct).abs() > p.idle_epsilon_pct {
                    self.state = GraspState::Moving;
                    self.target_pct = input.commanded_pct;
                }
            }

            GraspState::Moving => {
                self.counters.settle_cycles = 0;
                self.target_pct = input.commanded_pct;

                signals.high_current = input.current_pct > p.current_threshold_pct;
                signals.position_stagnant =
                    (input.actual_pct - input.prev_actual_pct).abs() < p.stagnation_pct;

                if signals.high_current && signals.position_stagnant {
                    self.counters.contact_samples += 1;
                } else {
                    self.counters.contact_samples = 0;
                }
                signals.contact_samples = self.counters.contact_samples;
                signals.contact_detected = self.counters.contact_samples >= p.contact_cycles;

                if signals.contact_detected {
                    // Freeze the target where the object stopped the jaw.
                    self.state = GraspState::Contact;
                    self.target_pct = input.actual_pct;
                    self.counters = GraspCounters::default();
                    signals.contact_samples = 0;
                } else if (input.actual_pct - input.commanded_pct).abs() <= p.idle_epsilon_pct {
                    self.state = GraspState::Idle;
                    self.counters = GraspCounters::default();
                }
            }

            GraspState::Contact => {
                self.counters.contact_samples = 0;
                if input.commanded_pct > self.target_pct + p.open_hysteresis_pct {
                    self.state = GraspState::Moving;
                    self.target_pct = input.commanded_pct;
                    self.counters = GraspCounters::default();
                } else {
                    self.counters.settle_cycles += 1;
                    if self.counters.settle_cycles >= p.settle_cycles {
                        self.state = GraspState::Grasping;
                    }
                }
            }

            GraspState::Grasping => {
                self.counters = GraspCounters::default();
                // Only an opening command breaks the grasp; repeated close
                // commands keep holding.
                if input.commanded_pct > self.target_pct + p.open_hysteresis_pct {
                    self.state = GraspState::Moving;
                    self.target_pct = input.commanded_pct;
                }
            }
        }

        self.output(signals)
    }

    fn output(&self, signals: ContactSignals) -> GraspOutput {
        let effort_pct = match self.state {
            GraspState::Idle => self.params.idle_force_pct,
            GraspState::Moving => self.params.moving_force_pct,
            GraspState::Contact | GraspState::Grasping => self.params.grasping_force_pct,
        };
        GraspOutput {
            goal_pct: self.target_pct,
            effort_pct,
            state: self.state,
            signals,
        }
    }
}

// ─── Tests ──────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn params() -> GraspParams {
        GraspParams {
            current_threshold_pct: 40.0,
            stagnation_pct: 0.5,
            contact_cycles: 3,
            settle_cycles: 10,
            open_hysteresis_pct: 2.0,
            idle_epsilon_pct: 1.0,
            idle_force_pct: 0.0,
            moving_force_pct: 17.0,
            grasping_force_pct: 10.0,
        }
    }

    fn machine_at(pct: f64) -> GraspMachine {
        GraspMachine::new(params(), pct)
    }

    fn free_motion(commanded: f64, actual: f64, prev: f64) -> GraspInput {
        GraspInput {
            commanded_pct: commanded,
            heartbeat_ok: true,
            actual_pct: actual,
            prev_actual_pct: prev,
            current_pct: 5.0,
        }
    }

    fn stalled(commanded: f64, actual: f64) -> GraspInput {
        GraspInput {
            commanded_pct: commanded,
            heartbeat_ok: true,
            actual_pct: actual,
            prev_actual_pct: actual,
            current_pct: 58.0,
        }
    }

    #[test]
    fn idle_holds_within_epsilon() {
        let mut m = machine_at(50.0);
        let out = m.step(&free_motion(50.4, 50.0, 50.0));
        assert_eq!(out.state, GraspState::Idle);
        assert_eq!(out.effort_pct, 0.0);
        assert_eq!(out.goal_pct, 50.0);
    }

    #[test]
    fn idle_to_moving_on_new_command() {
        let mut m = machine_at(50.0);
        let out = m.step(&free_motion(20.0, 50.0, 50.0));
        assert_eq!(out.state, GraspState::Moving);
        assert_eq!(out.goal_pct, 20.0);
        assert_eq!(out.effort_pct, 17.0);
    }

    #[test]
    fn moving_back_to_idle_on_arrival() {
        let mut m = machine_at(50.0);
        m.step(&free_motion(20.0, 50.0, 50.0));
        m.step(&free_motion(20.0, 35.0, 50.0));
        let out = m.step(&free_motion(20.0, 20.3, 35.0));
        assert_eq!(out.state, GraspState::Idle);
        assert_eq!(out.effort_pct, 0.0);
    }

    #[test]
    fn moving_tracks_latest_command() {
        let mut m = machine_at(50.0);
        m.step(&free_motion(20.0, 50.0, 50.0));
        let out = m.step(&free_motion(70.0, 45.0, 50.0));
        assert_eq!(out.state, GraspState::Moving);
        assert_eq!(out.goal_pct, 70.0);
    }

    #[test]
    fn contact_requires_consecutive_samples() {
        let mut m = machine_at(50.0);
        m.step(&free_motion(0.0, 50.0, 50.0));

        // One spurious high-current sample must not trip the transition.
        let out = m.step(&stalled(0.0, 35.0));
        assert_eq!(out.state, GraspState::Moving);
        assert_eq!(out.signals.contact_samples, 1);

        // A clean cycle resets the counter.
        let out = m.step(&free_motion(0.0, 34.0, 35.0));
        assert_eq!(out.signals.contact_samples, 0);

        // Three consecutive qualifying cycles confirm contact.
        m.step(&stalled(0.0, 33.0));
        m.step(&stalled(0.0, 33.0));
        let out = m.step(&stalled(0.0, 33.0));
        assert_eq!(out.state, GraspState::Contact);
        assert!(out.signals.contact_detected);
        // Target frozen at the contact position, effort dropped.
        assert_eq!(out.goal_pct, 33.0);
        assert_eq!(out.effort_pct, 10.0);
    }

    #[test]
    fn contact_samples_nonzero_only_in_moving() {
        let mut m = machine_at(50.0);
        m.step(&free_motion(0.0, 50.0, 50.0));
        m.step(&stalled(0.0, 35.0));
        assert!(m.counters().contact_samples > 0);
        assert_eq!(m.state(), GraspState::Moving);

        m.step(&stalled(0.0, 35.0));
        m.step(&stalled(0.0, 35.0));
        assert_eq!(m.state(), GraspState::Contact);
        assert_eq!(m.counters().contact_samples, 0);
    }

    #[test]
    fn high_current_while_still_moving_is_not_contact() {
        let mut m = machine_at(50.0);
        m.step(&free_motion(0.0, 50.0, 50.0));
        for actual in [45.0, 40.0, 35.0, 30.0] {
            let out = m.step(&GraspInput {
                commanded_pct: 0.0,
                heartbeat_ok: true,
                actual_pct: actual,
                prev_actual_pct: actual + 5.0,
                current_pct: 58.0,
            });
            assert_eq!(out.state, GraspState::Moving);
            assert_eq!(out.signals.contact_samples, 0);
        }
    }

    fn drive_to_contact(m: &mut GraspMachine, at_pct: f64) {
        m.step(&free_motion(0.0, 50.0, 50.0));
        for _ in 0..3 {
            m.step(&stalled(0.0, at_pct));
        }
        assert_eq!(m.state(), GraspState::Contact);
    }

    #[test]
    fn contact_settles_into_grasping() {
        let mut m = machine_at(50.0);
        drive_to_contact(&mut m, 35.0);
        for _ in 0..9 {
            m.step(&stalled(0.0, 35.0));
            assert_eq!(m.state(), GraspState::Contact);
        }
        let out = m.step(&stalled(0.0, 35.0));
        assert_eq!(out.state, GraspState::Grasping);
        assert_eq!(out.effort_pct, 10.0);
        assert_eq!(out.goal_pct, 35.0);
    }

    #[test]
    fn grasping_survives_repeated_close_commands() {
        let mut m = machine_at(50.0);
        drive_to_contact(&mut m, 35.0);
        for _ in 0..10 {
            m.step(&stalled(0.0, 35.0));
        }
        assert_eq!(m.state(), GraspState::Grasping);

        // The caller keeps streaming the same (and even deeper) close
        // commands; the grasp must hold.
        for cmd in [0.0, 5.0, 0.0, 33.9, 0.0] {
            let out = m.step(&stalled(cmd, 35.0));
            assert_eq!(out.state, GraspState::Grasping, "cmd {cmd}");
            assert_eq!(out.goal_pct, 35.0);
        }
    }

    #[test]
    fn opening_command_breaks_the_grasp() {
        let mut m = machine_at(50.0);
        drive_to_contact(&mut m, 35.0);
        for _ in 0..10 {
            m.step(&stalled(0.0, 35.0));
        }
        assert_eq!(m.state(), GraspState::Grasping);

        // Just inside hysteresis: still grasping.
        let out = m.step(&stalled(36.5, 35.0));
        assert_eq!(out.state, GraspState::Grasping);

        // Past hysteresis: release and move.
        let out = m.step(&stalled(80.0, 35.0));
        assert_eq!(out.state, GraspState::Moving);
        assert_eq!(out.goal_pct, 80.0);
        assert_eq!(out.effort_pct, 17.0);
    }

    #[test]
    fn contact_can_be_reopened_before_settling() {
        let mut m = machine_at(50.0);
        drive_to_contact(&mut m, 35.0);
        let out = m.step(&stalled(80.0, 35.0));
        assert_eq!(out.state, GraspState::Moving);
        assert_eq!(out.goal_pct, 80.0);
    }

    #[test]
    fn heartbeat_loss_forces_idle_holding_actual() {
        let mut m = machine_at(50.0);
        m.step(&free_motion(0.0, 50.0, 50.0));
        assert_eq!(m.state(), GraspState::Moving);

        let out = m.step(&GraspInput {
            commanded_pct: 0.0,
            heartbeat_ok: false,
            actual_pct: 41.0,
            prev_actual_pct: 45.0,
            current_pct: 12.0,
        });
        assert_eq!(out.state, GraspState::Idle);
        assert_eq!(out.goal_pct, 41.0);
        assert_eq!(out.effort_pct, 0.0);
        assert_eq!(m.counters(), GraspCounters::default());
    }

    #[test]
    fn heartbeat_loss_from_grasping_holds_position() {
        let mut m = machine_at(50.0);
        drive_to_contact(&mut m, 35.0);
        for _ in 0..10 {
            m.step(&stalled(0.0, 35.0));
        }
        let out = m.step(&GraspInput {
            commanded_pct: 0.0,
            heartbeat_ok: false,
            actual_pct: 35.0,
            prev_actual_pct: 35.0,
            current_pct: 30.0,
        });
        assert_eq!(out.state, GraspState::Idle);
        assert_eq!(out.goal_pct, 35.0);
    }

    #[test]
    fn effort_table_matches_state() {
        let p = params();
        let mut m = machine_at(50.0);
        assert_eq!(m.step(&free_motion(50.0, 50.0, 50.0)).effort_pct, p.idle_force_pct);
        assert_eq!(m.step(&free_motion(0.0, 50.0, 50.0)).effort_pct, p.moving_force_pct);
        for _ in 0..3 {
            m.step(&stalled(0.0, 35.0));
        }
        assert_eq!(m.state(), GraspState::Contact);
        assert_eq!(m.step(&stalled(0.0, 35.0)).effort_pct, p.grasping_force_pct);
    }
}
