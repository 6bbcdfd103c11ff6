//! Grasp state enumeration.
//!
//! `#[repr(u8)]` for compact telemetry transport. The transition logic lives
//! in `gripper_control::grasp`; this module only defines the tagged states.

use serde::{Deserialize, Serialize};

/// State of the grasp controller.
///
/// Exactly one state is active per control cycle. Contact-detection counters
/// are only meaningful in `Moving`; they are reset in every other state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum GraspState {
    /// At rest — no motion commanded, zero managed effort.
    Idle = 0,
    /// Tracking a commanded target in free motion.
    Moving = 1,
    /// Contact detected — target frozen, settling before the grasp holds.
    Contact = 2,
    /// Holding an object. Only an opening command leaves this state.
    Grasping = 3,
}

impl GraspState {
    /// Convert from raw `u8`. Returns `None` for invalid values.
    #[inline]
    pub const fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(Self::Idle),
            1 => Some(Self::Moving),
            2 => Some(Self::Contact),
            3 => Some(Self::Grasping),
            _ => None,
        }
    }

    /// Whether the gripper is considered to be holding an object.
    #[inline]
    pub const fn is_holding(&self) -> bool {
        matches!(self, Self::Contact | Self::Grasping)
    }
}

impl Default for GraspState {
    fn default() -> Self {
        Self::Idle
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_u8_roundtrip() {
        for s in [
            GraspState::Idle,
            GraspState::Moving,
            GraspState::Contact,
            GraspState::Grasping,
        ] {
            assert_eq!(GraspState::from_u8(s as u8), Some(s));
        }
        assert_eq!(GraspState::from_u8(4), None);
        assert_eq!(GraspState::from_u8(255), None);
    }

    #[test]
    fn holding_states() {
        assert!(!GraspState::Idle.is_holding());
        assert!(!GraspState::Moving.is_holding());
        assert!(GraspState::Contact.is_holding());
        assert!(GraspState::Grasping.is_holding());
    }
}
