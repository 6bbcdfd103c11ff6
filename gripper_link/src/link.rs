//! The servo link: snapshot read, goal write, torque gate, reboot.
//!
//! Owns the transport exclusively — nothing else in the process touches the
//! serial handle. No retries here: every transient failure surfaces and the
//! control loop decides.

use std::thread;
use std::time::{Duration, Instant};

use gripper_common::config::{RegisterLayout, RegisterSpec};
use gripper_common::error::LinkError;
use gripper_common::servo::{ErrorFlags, ServoSnapshot};

use crate::bus::{RegisterWrite, ServoBus};

/// Firmware settle time after the reboot instruction.
const REBOOT_SETTLE: Duration = Duration::from_millis(500);

/// Decode the hardware-error status byte into flags.
///
/// Pure; unknown bits are dropped.
#[inline]
pub fn decode_error(hw_error: u8) -> ErrorFlags {
    ErrorFlags::from_bits_truncate(hw_error)
}

/// Atomic servo I/O over a [`ServoBus`] transport.
pub struct ServoLink<B: ServoBus> {
    bus: B,
    layout: RegisterLayout,
    snapshot_plan: [RegisterSpec; 6],
}

impl<B: ServoBus> ServoLink<B> {
    pub fn new(bus: B, layout: RegisterLayout) -> Self {
        let snapshot_plan = layout.snapshot_plan();
        Self {
            bus,
            layout,
            snapshot_plan,
        }
    }

    /// One bulk read covering current, position, load, hardware error,
    /// temperature, and voltage. `read_at` is stamped at packet completion.
    pub fn read_state(&mut self) -> Result<ServoSnapshot, LinkError> {
        let values = self.bus.read_bulk(&self.snapshot_plan)?;
        if values.len() != self.snapshot_plan.len() {
            return Err(LinkError::Protocol(format!(
                "bulk read returned {} values, expected {}",
                values.len(),
                self.snapshot_plan.len()
            )));
        }
        Ok(ServoSnapshot {
            current_ma: values[0],
            raw_position: values[1],
            load: values[2] as i16,
            hw_error: values[3] as u8,
            temperature_c: values[4] as u8,
            voltage_dv: values[5] as u8,
            read_at: Instant::now(),
        })
    }

    /// One bulk write for the goal-position and goal-current registers.
    pub fn write_goal(&mut self, position_raw: i32, current_limit_ma: i32) -> Result<(), LinkError> {
        self.bus.write_bulk(&[
            RegisterWrite {
                spec: self.layout.goal_position,
                value: position_raw,
            },
            RegisterWrite {
                spec: self.layout.goal_current,
                value: current_limit_ma,
            },
        ])
    }

    /// Gate servo torque. Off releases any stall force immediately.
    pub fn set_torque(&mut self, enabled: bool) -> Result<(), LinkError> {
        self.bus.write_bulk(&[RegisterWrite {
            spec: self.layout.torque_enable,
            value: enabled as i32,
        }])
    }

    /// Firmware reboot, clearing latched error flags, then a ≥500 ms block
    /// while the servo restarts. Used once at startup by the calibrator.
    pub fn reboot(&mut self) -> Result<(), LinkError> {
        self.bus.reboot()?;
        thread::sleep(REBOOT_SETTLE);
        Ok(())
    }

    /// Hand the transport back (supervisor teardown).
    pub fn into_bus(self) -> B {
        self.bus
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gripper_common::config::RegisterLayout;
    use heapless::Vec as HVec;

    /// Transport double recording plans and replies from a script.
    struct ScriptedBus {
        replies: std::vec::Vec<Result<std::vec::Vec<i32>, LinkError>>,
        writes: std::vec::Vec<std::vec::Vec<RegisterWrite>>,
    }

    impl ServoBus for ScriptedBus {
        fn read_bulk(
            &mut self,
            plan: &[RegisterSpec],
        ) -> Result<HVec<i32, { crate::bus::MAX_BULK_REGS }>, LinkError> {
            assert!(plan.len() <= crate::bus::MAX_BULK_REGS);
            let reply = self.replies.remove(0)?;
            let mut out = HVec::new();
            for v in reply {
                out.push(v).unwrap();
            }
            Ok(out)
        }

        fn write_bulk(&mut self, writes: &[RegisterWrite]) -> Result<(), LinkError> {
            self.writes.push(writes.to_vec());
            Ok(())
        }

        fn reboot(&mut self) -> Result<(), LinkError> {
            Ok(())
        }
    }

    #[test]
    fn read_state_maps_plan_order() {
        let bus = ScriptedBus {
            replies: vec![Ok(vec![-820, 2210, -310, 0x04, 41, 121])],
            writes: vec![],
        };
        let mut link = ServoLink::new(bus, RegisterLayout::default());
        let snap = link.read_state().unwrap();
        assert_eq!(snap.current_ma, -820);
        assert_eq!(snap.raw_position, 2210);
        assert_eq!(snap.load, -310);
        assert_eq!(snap.hw_error, 0x04);
        assert_eq!(snap.temperature_c, 41);
        assert_eq!(snap.voltage_dv, 121);
    }

    #[test]
    fn short_reply_is_protocol_error() {
        let bus = ScriptedBus {
            replies: vec![Ok(vec![1, 2, 3])],
            writes: vec![],
        };
        let mut link = ServoLink::new(bus, RegisterLayout::default());
        assert!(matches!(link.read_state(), Err(LinkError::Protocol(_))));
    }

    #[test]
    fn transient_error_passes_through_unretried() {
        let bus = ScriptedBus {
            replies: vec![Err(LinkError::Timeout), Ok(vec![0, 0, 0, 0, 0, 0])],
            writes: vec![],
        };
        let mut link = ServoLink::new(bus, RegisterLayout::default());
        assert_eq!(link.read_state().unwrap_err(), LinkError::Timeout);
        // The next call is a fresh transaction, not an internal retry.
        assert!(link.read_state().is_ok());
    }

    #[test]
    fn write_goal_targets_goal_registers() {
        let layout = RegisterLayout::default();
        let bus = ScriptedBus {
            replies: vec![],
            writes: vec![],
        };
        let mut link = ServoLink::new(bus, layout);
        link.write_goal(2210, 300).unwrap();
        link.set_torque(false).unwrap();

        let bus = link.into_bus();
        assert_eq!(bus.writes.len(), 2);
        assert_eq!(bus.writes[0][0].spec, layout.goal_position);
        assert_eq!(bus.writes[0][0].value, 2210);
        assert_eq!(bus.writes[0][1].spec, layout.goal_current);
        assert_eq!(bus.writes[0][1].value, 300);
        assert_eq!(bus.writes[1][0].spec, layout.torque_enable);
        assert_eq!(bus.writes[1][0].value, 0);
    }

    #[test]
    fn decode_error_flags() {
        assert_eq!(decode_error(0), ErrorFlags::empty());
        assert_eq!(decode_error(0x01), ErrorFlags::INPUT_VOLTAGE);
        assert_eq!(
            decode_error(0x24),
            ErrorFlags::OVERHEAT | ErrorFlags::OVERLOAD
        );
        assert!(decode_error(0x24).is_critical());
        assert!(!decode_error(0x01).is_critical());
    }
}
