//! Servo snapshot and hardware-error decode.
//!
//! A [`ServoSnapshot`] is one atomic multi-register read: every field comes
//! from the same bulk transaction, stamped at packet completion. The
//! [`ErrorFlags`] bit set mirrors the servo's hardware-error status register.

use std::time::Instant;

use bitflags::bitflags;

/// One atomic multi-register servo read.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ServoSnapshot {
    /// Present position [raw encoder ticks].
    pub raw_position: i32,
    /// Present current [mA]; sign follows load direction.
    pub current_ma: i32,
    /// Present load register value.
    pub load: i16,
    /// Hardware-error status byte (decode via [`ErrorFlags`]).
    pub hw_error: u8,
    /// Present temperature [°C].
    pub temperature_c: u8,
    /// Present input voltage [0.1 V].
    pub voltage_dv: u8,
    /// Monotonic instant of packet completion.
    pub read_at: Instant,
}

bitflags! {
    /// Decoded hardware-error status bits.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct ErrorFlags: u8 {
        /// Input voltage out of operating range.
        const INPUT_VOLTAGE = 0x01;
        /// Internal temperature above the firmware limit.
        const OVERHEAT = 0x04;
        /// Encoder / magnet fault.
        const ENCODER = 0x08;
        /// Shock detected on the output shaft.
        const SHOCK = 0x10;
        /// Sustained load above the firmware limit.
        const OVERLOAD = 0x20;
    }
}

impl ErrorFlags {
    /// Bits that trip `hardware_healthy = false` in the control loop.
    ///
    /// Input-voltage is excluded: it is logged once per distinct code but
    /// does not stop the gripper on its own.
    pub const CRITICAL: Self = Self::OVERHEAT
        .union(Self::ENCODER)
        .union(Self::SHOCK)
        .union(Self::OVERLOAD);

    /// Whether any critical bit is set.
    #[inline]
    pub const fn is_critical(&self) -> bool {
        self.intersects(Self::CRITICAL)
    }
}
