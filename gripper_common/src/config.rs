//! Gripper configuration: TOML structures with validation.
//!
//! All types use `serde::Deserialize` with field defaults so a partial TOML
//! file yields a runnable configuration. `GripperConfig::validate()` runs the
//! cross-field rules; the runtime only ever sees a validated record.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

// ─── Register layout ────────────────────────────────────────────────

/// One servo register: address and byte length.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegisterSpec {
    /// Register address in the servo control table.
    pub addr: u16,
    /// Register width [bytes].
    pub len: u8,
}

/// Addresses of every register the link touches.
///
/// Firmware revisions move registers around; the layout therefore comes from
/// configuration, never from constants. The bulk-read plan must not list the
/// same address twice — `present_current` and `present_load` in particular
/// must be distinct (`validate`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegisterLayout {
    pub torque_enable: RegisterSpec,
    pub goal_position: RegisterSpec,
    pub goal_current: RegisterSpec,
    pub present_current: RegisterSpec,
    pub present_position: RegisterSpec,
    pub present_load: RegisterSpec,
    pub hardware_error: RegisterSpec,
    pub present_temperature: RegisterSpec,
    pub present_voltage: RegisterSpec,
}

impl Default for RegisterLayout {
    fn default() -> Self {
        // Protocol-2 current-based gripper servo control table.
        Self {
            torque_enable: RegisterSpec { addr: 64, len: 1 },
            goal_position: RegisterSpec { addr: 116, len: 4 },
            goal_current: RegisterSpec { addr: 102, len: 2 },
            present_current: RegisterSpec { addr: 126, len: 2 },
            present_position: RegisterSpec { addr: 132, len: 4 },
            present_load: RegisterSpec { addr: 124, len: 2 },
            hardware_error: RegisterSpec { addr: 70, len: 1 },
            present_temperature: RegisterSpec { addr: 146, len: 1 },
            present_voltage: RegisterSpec { addr: 144, len: 1 },
        }
    }
}

impl RegisterLayout {
    /// The registers covered by one state snapshot, in read order.
    pub fn snapshot_plan(&self) -> [RegisterSpec; 6] {
        [
            self.present_current,
            self.present_position,
            self.present_load,
            self.hardware_error,
            self.present_temperature,
            self.present_voltage,
        ]
    }
}

// ─── Sections ───────────────────────────────────────────────────────

/// Servo identity, used to key calibration persistence.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServoIdentityConfig {
    /// Servo serial number (assigned by the discovery collaborator).
    pub serial: String,
}

/// Current limits [mA].
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct CurrentConfig {
    /// Limit while holding a grasp.
    #[serde(default = "default_holding_ma")]
    pub holding_ma: i32,
    /// Limit during free motion.
    #[serde(default = "default_movement_ma")]
    pub movement_ma: i32,
    /// Maximum the controller will ever command.
    #[serde(default = "default_max_ma")]
    pub max_ma: i32,
    /// Hardware maximum per the servo datasheet; effort percent scales
    /// against this value.
    #[serde(default = "default_hardware_max_ma")]
    pub hardware_max_ma: i32,
}

fn default_holding_ma() -> i32 {
    200
}
fn default_movement_ma() -> i32 {
    350
}
fn default_max_ma() -> i32 {
    900
}
fn default_hardware_max_ma() -> i32 {
    1750
}

impl Default for CurrentConfig {
    fn default() -> Self {
        Self {
            holding_ma: default_holding_ma(),
            movement_ma: default_movement_ma(),
            max_ma: default_max_ma(),
            hardware_max_ma: default_hardware_max_ma(),
        }
    }
}

/// Temperature thresholds [°C].
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct TemperatureConfig {
    /// First warning; logged once per excursion.
    #[serde(default = "default_temp_warning")]
    pub warning_c: u8,
    /// Advisory level for operator displays.
    #[serde(default = "default_temp_advisory")]
    pub advisory_c: u8,
    /// Controller-side shutdown: trips `hardware_healthy = false`.
    #[serde(default = "default_temp_shutdown")]
    pub shutdown_c: u8,
    /// Firmware hard limit per the datasheet.
    #[serde(default = "default_temp_hw_max")]
    pub hardware_max_c: u8,
}

fn default_temp_warning() -> u8 {
    55
}
fn default_temp_advisory() -> u8 {
    62
}
fn default_temp_shutdown() -> u8 {
    68
}
fn default_temp_hw_max() -> u8 {
    80
}

impl Default for TemperatureConfig {
    fn default() -> Self {
        Self {
            warning_c: default_temp_warning(),
            advisory_c: default_temp_advisory(),
            shutdown_c: default_temp_shutdown(),
            hardware_max_c: default_temp_hw_max(),
        }
    }
}

/// Motion scaling and kinematics.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct MotionConfig {
    /// Joint range on the command bus [rad]; 100 % opening maps to this.
    #[serde(default = "default_q_max")]
    pub q_max_rad: f64,
    /// Raw encoder ticks from calibrated closed to fully open.
    #[serde(default = "default_raw_span")]
    pub raw_span_ticks: i32,
    /// Predictor speed [%/s], measured offline.
    #[serde(default = "default_movement_speed")]
    pub movement_speed_pct_per_s: f64,
    /// Lower bound of the servo-safe goal sub-range [%].
    #[serde(default = "default_servo_min")]
    pub servo_min_pct: f64,
    /// Upper bound of the servo-safe goal sub-range [%].
    #[serde(default = "default_servo_max")]
    pub servo_max_pct: f64,
    /// Rest position assumed before the first command arrives [%].
    #[serde(default = "default_rest_position")]
    pub rest_position_pct: f64,
}

fn default_q_max() -> f64 {
    5.4
}
fn default_raw_span() -> i32 {
    2800
}
fn default_movement_speed() -> f64 {
    952.43
}
fn default_servo_min() -> f64 {
    5.0
}
fn default_servo_max() -> f64 {
    95.0
}
fn default_rest_position() -> f64 {
    50.0
}

impl Default for MotionConfig {
    fn default() -> Self {
        Self {
            q_max_rad: default_q_max(),
            raw_span_ticks: default_raw_span(),
            movement_speed_pct_per_s: default_movement_speed(),
            servo_min_pct: default_servo_min(),
            servo_max_pct: default_servo_max(),
            rest_position_pct: default_rest_position(),
        }
    }
}

/// Contact-detection and grasp-transition thresholds.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ContactConfig {
    /// High-current predicate threshold [% of hardware max].
    #[serde(default = "default_current_threshold")]
    pub current_threshold_pct: f64,
    /// Position-stagnation predicate threshold [%/cycle].
    #[serde(default = "default_stagnation")]
    pub stagnation_pct: f64,
    /// Consecutive cycles both predicates must hold.
    #[serde(default = "default_contact_cycles")]
    pub contact_cycles: u32,
    /// Settling cycles in `Contact` before `Grasping`.
    #[serde(default = "default_settle_cycles")]
    pub settle_cycles: u32,
    /// Opening command must exceed the frozen target by this much to break
    /// a grasp [%].
    #[serde(default = "default_open_hysteresis")]
    pub open_hysteresis_pct: f64,
    /// Command/actual difference below which Idle holds [%].
    #[serde(default = "default_idle_epsilon")]
    pub idle_epsilon_pct: f64,
}

fn default_current_threshold() -> f64 {
    40.0
}
fn default_stagnation() -> f64 {
    0.5
}
fn default_contact_cycles() -> u32 {
    3
}
fn default_settle_cycles() -> u32 {
    10
}
fn default_open_hysteresis() -> f64 {
    2.0
}
fn default_idle_epsilon() -> f64 {
    1.0
}

impl Default for ContactConfig {
    fn default() -> Self {
        Self {
            current_threshold_pct: default_current_threshold(),
            stagnation_pct: default_stagnation(),
            contact_cycles: default_contact_cycles(),
            settle_cycles: default_settle_cycles(),
            open_hysteresis_pct: default_open_hysteresis(),
            idle_epsilon_pct: default_idle_epsilon(),
        }
    }
}

/// State-driven effort table [%].
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ForceConfig {
    #[serde(default)]
    pub idle_pct: f64,
    #[serde(default = "default_moving_force")]
    pub moving_pct: f64,
    #[serde(default = "default_grasping_force")]
    pub grasping_pct: f64,
}

fn default_moving_force() -> f64 {
    17.0
}
fn default_grasping_force() -> f64 {
    10.0
}

impl Default for ForceConfig {
    fn default() -> Self {
        Self {
            idle_pct: 0.0,
            moving_pct: default_moving_force(),
            grasping_pct: default_grasping_force(),
        }
    }
}

/// Loop timing and failure thresholds.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ControlConfig {
    /// Control-loop rate [Hz].
    #[serde(default = "default_cycle_hz")]
    pub cycle_hz: f64,
    /// State-publisher rate [Hz].
    #[serde(default = "default_publish_hz")]
    pub publish_hz: f64,
    /// Telemetry emitted every Nth publisher tick.
    #[serde(default = "default_telemetry_interval")]
    pub telemetry_interval_ticks: u32,
    /// Heartbeat timeout [ms]; a stalled command stream forces Idle.
    #[serde(default = "default_heartbeat_timeout")]
    pub heartbeat_timeout_ms: u64,
    /// Consecutive link errors before the health trip.
    #[serde(default = "default_comm_error_limit")]
    pub comm_error_limit: u32,
    /// Maximum age of the last good read before the health trip [ms].
    #[serde(default = "default_comm_stale")]
    pub comm_stale_ms: u64,
    /// Goal position while unhealthy [%].
    #[serde(default = "default_safe_position")]
    pub safe_position_pct: f64,
    /// Effort while unhealthy [%].
    #[serde(default = "default_safe_effort")]
    pub safe_effort_pct: f64,
    /// SCHED_FIFO priority requested for the control thread.
    #[serde(default = "default_rt_priority")]
    pub rt_priority: i32,
}

fn default_cycle_hz() -> f64 {
    30.0
}
fn default_publish_hz() -> f64 {
    200.0
}
fn default_telemetry_interval() -> u32 {
    6
}
fn default_heartbeat_timeout() -> u64 {
    250
}
fn default_comm_error_limit() -> u32 {
    5
}
fn default_comm_stale() -> u64 {
    2000
}
fn default_safe_position() -> f64 {
    50.0
}
fn default_safe_effort() -> f64 {
    10.0
}
fn default_rt_priority() -> i32 {
    80
}

impl Default for ControlConfig {
    fn default() -> Self {
        Self {
            cycle_hz: default_cycle_hz(),
            publish_hz: default_publish_hz(),
            telemetry_interval_ticks: default_telemetry_interval(),
            heartbeat_timeout_ms: default_heartbeat_timeout(),
            comm_error_limit: default_comm_error_limit(),
            comm_stale_ms: default_comm_stale(),
            safe_position_pct: default_safe_position(),
            safe_effort_pct: default_safe_effort(),
            rt_priority: default_rt_priority(),
        }
    }
}

/// Startup calibration parameters.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct CalibrationConfig {
    /// Closing drive current [% of hardware max].
    #[serde(default = "default_cal_current")]
    pub current_pct: f64,
    /// Current confirming hard-stop contact [mA].
    #[serde(default = "default_cal_contact_ma")]
    pub contact_current_ma: i32,
    /// Raw tick estimate of the mechanical minimum before calibration.
    #[serde(default = "default_cal_raw_minimum")]
    pub raw_minimum: i32,
    /// Margin driven past the estimated minimum [ticks].
    #[serde(default = "default_cal_margin")]
    pub close_margin_ticks: i32,
    /// Window spread that counts as position-stable [ticks].
    #[serde(default = "default_cal_stable_delta")]
    pub stable_pos_delta_ticks: i32,
    /// Consecutive stable polls confirming contact.
    #[serde(default = "default_cal_stable_consecutive")]
    pub stable_consecutive: u32,
    /// Poll period during the closing drive [ms].
    #[serde(default = "default_cal_poll_period")]
    pub poll_period_ms: u64,
    /// Abort budget for the whole drive [ms].
    #[serde(default = "default_cal_timeout")]
    pub timeout_ms: u64,
    /// Retract target after contact [%].
    #[serde(default = "default_cal_retract")]
    pub retract_pct: f64,
    /// Retract effort [%].
    #[serde(default = "default_cal_retract_effort")]
    pub retract_effort_pct: f64,
    /// Retract hold duration [ms].
    #[serde(default = "default_cal_retract_hold")]
    pub retract_hold_ms: u64,
}

fn default_cal_current() -> f64 {
    30.0
}
fn default_cal_contact_ma() -> i32 {
    450
}
fn default_cal_raw_minimum() -> i32 {
    1100
}
fn default_cal_margin() -> i32 {
    120
}
fn default_cal_stable_delta() -> i32 {
    2
}
fn default_cal_stable_consecutive() -> u32 {
    5
}
fn default_cal_poll_period() -> u64 {
    33
}
fn default_cal_timeout() -> u64 {
    7000
}
fn default_cal_retract() -> f64 {
    50.0
}
fn default_cal_retract_effort() -> f64 {
    20.0
}
fn default_cal_retract_hold() -> u64 {
    1000
}

impl Default for CalibrationConfig {
    fn default() -> Self {
        Self {
            current_pct: default_cal_current(),
            contact_current_ma: default_cal_contact_ma(),
            raw_minimum: default_cal_raw_minimum(),
            close_margin_ticks: default_cal_margin(),
            stable_pos_delta_ticks: default_cal_stable_delta(),
            stable_consecutive: default_cal_stable_consecutive(),
            poll_period_ms: default_cal_poll_period(),
            timeout_ms: default_cal_timeout(),
            retract_pct: default_cal_retract(),
            retract_effort_pct: default_cal_retract_effort(),
            retract_hold_ms: default_cal_retract_hold(),
        }
    }
}

/// Bus topic identifiers, passed through to the bus collaborator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChannelConfig {
    #[serde(default = "default_command_topic")]
    pub command_topic: String,
    #[serde(default = "default_state_topic")]
    pub state_topic: String,
    #[serde(default = "default_telemetry_topic")]
    pub telemetry_topic: String,
}

fn default_command_topic() -> String {
    "gripper/command".to_string()
}
fn default_state_topic() -> String {
    "gripper/state".to_string()
}
fn default_telemetry_topic() -> String {
    "gripper/telemetry".to_string()
}

impl Default for ChannelConfig {
    fn default() -> Self {
        Self {
            command_topic: default_command_topic(),
            state_topic: default_state_topic(),
            telemetry_topic: default_telemetry_topic(),
        }
    }
}

// ─── Top-level config ───────────────────────────────────────────────

/// Complete gripper configuration, immutable after startup.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GripperConfig {
    pub servo: ServoIdentityConfig,
    #[serde(default)]
    pub current: CurrentConfig,
    #[serde(default)]
    pub temperature: TemperatureConfig,
    #[serde(default)]
    pub registers: RegisterLayout,
    #[serde(default)]
    pub motion: MotionConfig,
    #[serde(default)]
    pub contact: ContactConfig,
    #[serde(default)]
    pub forces: ForceConfig,
    #[serde(default)]
    pub control: ControlConfig,
    #[serde(default)]
    pub calibration: CalibrationConfig,
    #[serde(default)]
    pub channels: ChannelConfig,
}

impl GripperConfig {
    /// Load and validate a configuration from a TOML file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|e| ConfigError::Io {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;
        Self::from_toml(&text)
    }

    /// Parse and validate a configuration from a TOML string.
    pub fn from_toml(text: &str) -> Result<Self, ConfigError> {
        let config: Self =
            toml::from_str(text).map_err(|e| ConfigError::Parse(e.to_string()))?;
        config.validate().map_err(ConfigError::Validation)?;
        Ok(config)
    }

    /// Cross-field validation rules.
    pub fn validate(&self) -> Result<(), String> {
        if self.servo.serial.is_empty() {
            return Err("servo.serial must not be empty".to_string());
        }

        let c = &self.current;
        if c.holding_ma <= 0 {
            return Err(format!("current.holding_ma {} must be positive", c.holding_ma));
        }
        if !(c.holding_ma <= c.movement_ma
            && c.movement_ma <= c.max_ma
            && c.max_ma <= c.hardware_max_ma)
        {
            return Err(format!(
                "current limits must be ordered holding ≤ movement ≤ max ≤ hardware_max \
                 (got {} / {} / {} / {})",
                c.holding_ma, c.movement_ma, c.max_ma, c.hardware_max_ma
            ));
        }

        let t = &self.temperature;
        if !(t.warning_c <= t.advisory_c
            && t.advisory_c <= t.shutdown_c
            && t.shutdown_c <= t.hardware_max_c)
        {
            return Err(format!(
                "temperature thresholds must be ordered warning ≤ advisory ≤ shutdown ≤ \
                 hardware_max (got {} / {} / {} / {})",
                t.warning_c, t.advisory_c, t.shutdown_c, t.hardware_max_c
            ));
        }

        // The bulk-read plan must never list one address twice. Firmware
        // revisions have been seen aliasing present_load onto
        // present_current; reject such layouts outright.
        let plan = self.registers.snapshot_plan();
        for i in 0..plan.len() {
            for j in (i + 1)..plan.len() {
                if plan[i].addr == plan[j].addr {
                    return Err(format!(
                        "registers: snapshot read plan lists address {} twice \
                         (entries {i} and {j}); present_current and present_load \
                         must be distinct registers",
                        plan[i].addr
                    ));
                }
            }
        }

        let m = &self.motion;
        if m.q_max_rad <= 0.0 {
            return Err(format!("motion.q_max_rad {} must be positive", m.q_max_rad));
        }
        if m.raw_span_ticks <= 0 {
            return Err(format!(
                "motion.raw_span_ticks {} must be positive",
                m.raw_span_ticks
            ));
        }
        if m.movement_speed_pct_per_s <= 0.0 {
            return Err(format!(
                "motion.movement_speed_pct_per_s {} must be positive",
                m.movement_speed_pct_per_s
            ));
        }
        if !(0.0 <= m.servo_min_pct && m.servo_min_pct < m.servo_max_pct && m.servo_max_pct <= 100.0)
        {
            return Err(format!(
                "motion: servo-safe range [{}, {}] must satisfy 0 ≤ min < max ≤ 100",
                m.servo_min_pct, m.servo_max_pct
            ));
        }
        if !(0.0..=100.0).contains(&m.rest_position_pct) {
            return Err(format!(
                "motion.rest_position_pct {} out of [0, 100]",
                m.rest_position_pct
            ));
        }

        let ct = &self.contact;
        if ct.current_threshold_pct <= 0.0 || ct.current_threshold_pct > 100.0 {
            return Err(format!(
                "contact.current_threshold_pct {} out of (0, 100]",
                ct.current_threshold_pct
            ));
        }
        if ct.stagnation_pct <= 0.0 {
            return Err(format!(
                "contact.stagnation_pct {} must be positive",
                ct.stagnation_pct
            ));
        }
        if ct.contact_cycles == 0 || ct.settle_cycles == 0 {
            return Err("contact: contact_cycles and settle_cycles must be ≥ 1".to_string());
        }

        let ctl = &self.control;
        if ctl.cycle_hz <= 0.0 || ctl.publish_hz <= 0.0 {
            return Err("control: cycle_hz and publish_hz must be positive".to_string());
        }
        if ctl.publish_hz < ctl.cycle_hz {
            return Err(format!(
                "control.publish_hz {} must be ≥ cycle_hz {}",
                ctl.publish_hz, ctl.cycle_hz
            ));
        }
        if ctl.telemetry_interval_ticks == 0 {
            return Err("control.telemetry_interval_ticks must be ≥ 1".to_string());
        }
        if ctl.comm_error_limit == 0 {
            return Err("control.comm_error_limit must be ≥ 1".to_string());
        }
        if !(0.0..=100.0).contains(&ctl.safe_position_pct) {
            return Err(format!(
                "control.safe_position_pct {} out of [0, 100]",
                ctl.safe_position_pct
            ));
        }

        let cal = &self.calibration;
        if cal.current_pct <= 0.0 || cal.current_pct > 100.0 {
            return Err(format!(
                "calibration.current_pct {} out of (0, 100]",
                cal.current_pct
            ));
        }
        if cal.contact_current_ma <= 0 {
            return Err(format!(
                "calibration.contact_current_ma {} must be positive",
                cal.contact_current_ma
            ));
        }
        if cal.stable_consecutive == 0 {
            return Err("calibration.stable_consecutive must be ≥ 1".to_string());
        }
        if cal.poll_period_ms == 0 || cal.timeout_ms == 0 {
            return Err("calibration: poll_period_ms and timeout_ms must be positive".to_string());
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn minimal_toml() -> &'static str {
        "[servo]\nserial = \"GRIP-0042\"\n"
    }

    #[test]
    fn minimal_config_uses_defaults() {
        let config = GripperConfig::from_toml(minimal_toml()).unwrap();
        assert_eq!(config.servo.serial, "GRIP-0042");
        assert_eq!(config.control.cycle_hz, 30.0);
        assert_eq!(config.control.publish_hz, 200.0);
        assert_eq!(config.control.heartbeat_timeout_ms, 250);
        assert_eq!(config.contact.contact_cycles, 3);
        assert_eq!(config.contact.settle_cycles, 10);
        assert_eq!(config.motion.q_max_rad, 5.4);
        assert_eq!(config.calibration.timeout_ms, 7000);
    }

    #[test]
    fn missing_serial_rejected() {
        assert!(GripperConfig::from_toml("").is_err());
        assert!(GripperConfig::from_toml("[servo]\nserial = \"\"\n").is_err());
    }

    #[test]
    fn unordered_current_limits_rejected() {
        let toml = "[servo]\nserial = \"G\"\n[current]\nmovement_ma = 100\nholding_ma = 300\n";
        let err = GripperConfig::from_toml(toml).unwrap_err();
        assert!(err.to_string().contains("ordered"));
    }

    #[test]
    fn aliased_current_load_registers_rejected() {
        let toml = "[servo]\nserial = \"G\"\n\
                    [registers.present_current]\naddr = 126\nlen = 2\n\
                    [registers.present_load]\naddr = 126\nlen = 2\n\
                    [registers.torque_enable]\naddr = 64\nlen = 1\n\
                    [registers.goal_position]\naddr = 116\nlen = 4\n\
                    [registers.goal_current]\naddr = 102\nlen = 2\n\
                    [registers.present_position]\naddr = 132\nlen = 4\n\
                    [registers.hardware_error]\naddr = 70\nlen = 1\n\
                    [registers.present_temperature]\naddr = 146\nlen = 1\n\
                    [registers.present_voltage]\naddr = 144\nlen = 1\n";
        let err = GripperConfig::from_toml(toml).unwrap_err();
        assert!(err.to_string().contains("twice"));
    }

    #[test]
    fn inverted_servo_safe_range_rejected() {
        let toml = "[servo]\nserial = \"G\"\n[motion]\nservo_min_pct = 95.0\nservo_max_pct = 5.0\n";
        assert!(GripperConfig::from_toml(toml).is_err());
    }

    #[test]
    fn publish_slower_than_cycle_rejected() {
        let toml = "[servo]\nserial = \"G\"\n[control]\npublish_hz = 10.0\n";
        assert!(GripperConfig::from_toml(toml).is_err());
    }

    #[test]
    fn load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("gripper.toml");
        std::fs::write(&path, minimal_toml()).unwrap();
        let config = GripperConfig::load(&path).unwrap();
        assert_eq!(config.servo.serial, "GRIP-0042");

        let missing = dir.path().join("nope.toml");
        assert!(matches!(
            GripperConfig::load(&missing),
            Err(ConfigError::Io { .. })
        ));
    }
}
