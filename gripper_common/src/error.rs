//! Error taxonomy for the gripper controller.
//!
//! Four public error enums, one per failure domain:
//! - [`LinkError`] — transient serial transaction failures (never retried
//!   inside the link; the control loop owns the policy).
//! - [`CalibrationError`] — startup calibration failures (fatal).
//! - [`ConfigError`] — configuration and persistence load/validate failures.
//! - [`RuntimeError`] — supervisor-level aggregation for the binary.

use thiserror::Error;

/// A single servo transaction failed.
///
/// The link surfaces every failure; under-threshold occurrences are logged
/// at debug by the control loop and the cycle continues.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LinkError {
    /// No reply within the serial timeout.
    #[error("serial transaction timed out")]
    Timeout,

    /// Reply arrived but its checksum did not match.
    #[error("checksum mismatch in servo reply")]
    Crc,

    /// Reply framing or length was not what the transaction expected.
    #[error("servo protocol violation: {0}")]
    Protocol(String),
}

/// Startup calibration failed. Always fatal: the supervisor must not start
/// the runtime threads and the process exits non-zero.
#[derive(Debug, Error)]
pub enum CalibrationError {
    /// Contact with the hard stop was not confirmed in time.
    #[error("no contact confirmed within {timeout_ms} ms")]
    Timeout { timeout_ms: u64 },

    /// The servo never answered a read after the reboot step.
    #[error("servo unresponsive after reboot")]
    ServoUnresponsive,

    /// A serial transaction failed during the calibration drive.
    #[error(transparent)]
    Link(#[from] LinkError),
}

/// Configuration or calibration-store load/validate failure.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// File could not be read or written.
    #[error("failed to access {path}: {reason}")]
    Io { path: String, reason: String },

    /// TOML did not parse into the expected shape.
    #[error("config parse error: {0}")]
    Parse(String),

    /// Parsed values violate a bound or cross-field rule.
    #[error("config validation: {0}")]
    Validation(String),
}

/// Top-level error for the `gripperd` binary and the supervisor.
#[derive(Debug, Error)]
pub enum RuntimeError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("calibration failed: {0}")]
    Calibration(#[from] CalibrationError),

    #[error(transparent)]
    Link(#[from] LinkError),

    /// Signal handler installation failed (supervisor startup).
    #[error("signal handler setup: {0}")]
    Signal(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn link_error_display() {
        assert_eq!(LinkError::Timeout.to_string(), "serial transaction timed out");
        assert!(LinkError::Protocol("short reply".into())
            .to_string()
            .contains("short reply"));
    }

    #[test]
    fn calibration_timeout_carries_budget() {
        let e = CalibrationError::Timeout { timeout_ms: 7000 };
        assert!(e.to_string().contains("7000"));
    }

    #[test]
    fn runtime_error_wraps_link() {
        let e: RuntimeError = LinkError::Crc.into();
        assert!(matches!(e, RuntimeError::Link(LinkError::Crc)));
    }
}
