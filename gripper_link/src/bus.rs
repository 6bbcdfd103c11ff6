//! Bulk-transport trait — the seam to the external framing library.
//!
//! One `read_bulk` or `write_bulk` call is one servo-protocol transaction:
//! every register in the plan is read/written in the same packet exchange,
//! which is what makes a [`ServoSnapshot`](gripper_common::ServoSnapshot)
//! atomic. Implementations never retry; transient failures surface as
//! [`LinkError`] and the control loop owns the policy.

use gripper_common::config::RegisterSpec;
use gripper_common::error::LinkError;

/// Upper bound on registers per bulk transaction.
pub const MAX_BULK_REGS: usize = 8;

/// One register write within a bulk transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RegisterWrite {
    pub spec: RegisterSpec,
    /// Value, sign-extended from the register width.
    pub value: i32,
}

/// Servo-protocol transport.
///
/// The production implementation wraps the serial framing library; tests and
/// simulation use [`SimServo`](crate::SimServo). A single transaction must
/// complete within one control-period budget (≤ 11 ms nominal; the serial
/// timeout bounds the worst case at 500 ms).
pub trait ServoBus: Send {
    /// Read every register in `plan` in one transaction.
    ///
    /// Returns the values in plan order, sign-extended to `i32`.
    fn read_bulk(
        &mut self,
        plan: &[RegisterSpec],
    ) -> Result<heapless::Vec<i32, MAX_BULK_REGS>, LinkError>;

    /// Write every register in `writes` in one transaction.
    fn write_bulk(&mut self, writes: &[RegisterWrite]) -> Result<(), LinkError>;

    /// Issue the firmware reboot instruction. The caller owns the
    /// post-reboot settling wait.
    fn reboot(&mut self) -> Result<(), LinkError>;
}
