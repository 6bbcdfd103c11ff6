//! Position and effort unit conversions.
//!
//! All cross-component communication uses *percent*: 0 = calibrated closed,
//! 100 = fully open. The robot bus speaks joint radians in `[0, q_max]`;
//! the servo speaks raw encoder ticks. Both conversions live here so no
//! other module hand-rolls scaling arithmetic.

// ─── Radians ↔ Percent ──────────────────────────────────────────────

/// Convert a joint position in radians to gripper percent, clamped to [0,100].
#[inline]
pub fn rad_to_pct(q: f64, q_max: f64) -> f64 {
    (q / q_max * 100.0).clamp(0.0, 100.0)
}

/// Convert gripper percent back to joint radians.
///
/// Inverse of [`rad_to_pct`] for percent in [0,100]; the reported range is
/// strictly `[0, q_max]` — no safe-range narrowing on this direction.
#[inline]
pub fn pct_to_rad(pct: f64, q_max: f64) -> f64 {
    pct / 100.0 * q_max
}

/// Convert a bus effort value in [0,1] to effort percent.
#[inline]
pub fn effort_to_pct(effort: f64) -> f64 {
    (effort * 100.0).clamp(0.0, 100.0)
}

// ─── Percent ↔ Raw ticks ────────────────────────────────────────────

/// Raw↔percent scaling anchored at the calibrated zero.
///
/// `span_ticks` is the raw travel from mechanically closed to fully open;
/// raw values grow as the gripper opens.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PositionScale {
    /// Raw position observed at first confirmed hard-stop contact.
    pub zero_raw: i32,
    /// Raw ticks spanning 0–100 %.
    pub span_ticks: i32,
}

impl PositionScale {
    /// Percent → raw goal ticks (unclamped; callers clamp percent first).
    #[inline]
    pub fn pct_to_raw(&self, pct: f64) -> i32 {
        self.zero_raw + (pct / 100.0 * self.span_ticks as f64).round() as i32
    }

    /// Raw ticks → percent, clamped to the external [0,100] range.
    ///
    /// Raw readings slightly below `zero_raw` (pressed into the hard stop)
    /// report as 0.
    #[inline]
    pub fn raw_to_pct(&self, raw: i32) -> f64 {
        ((raw - self.zero_raw) as f64 / self.span_ticks as f64 * 100.0).clamp(0.0, 100.0)
    }
}

// ─── Servo-safe sub-range ───────────────────────────────────────────

/// Clamp an external command in [0,100] into the servo-safe sub-range.
///
/// Goal writes avoid the mechanical hard stops: an external 0 lands on
/// `safe_min` and an external 100 on `safe_max`; commands already inside the
/// sub-range pass through unchanged. Reported positions are never mapped
/// back — the external range stays [0,100].
#[inline]
pub fn to_servo_safe_pct(pct: f64, safe_min: f64, safe_max: f64) -> f64 {
    pct.clamp(safe_min, safe_max)
}

// ─── Effort → current ───────────────────────────────────────────────

/// Effort percent → goal-current limit in mA, as a fraction of the hardware
/// maximum. The servo firmware closes the actual current loop.
#[inline]
pub fn effort_to_current_ma(effort_pct: f64, hardware_max_ma: i32) -> i32 {
    (effort_pct.clamp(0.0, 100.0) / 100.0 * hardware_max_ma as f64).round() as i32
}

/// Measured current in mA → percent of the hardware maximum.
#[inline]
pub fn current_to_pct(current_ma: i32, hardware_max_ma: i32) -> f64 {
    (current_ma.abs() as f64 / hardware_max_ma as f64) * 100.0
}

#[cfg(test)]
mod tests {
    use super::*;

    const Q_MAX: f64 = 5.4;

    #[test]
    fn rad_pct_roundtrip_within_1e6() {
        for i in 0..=54 {
            let q = i as f64 * 0.1;
            let back = pct_to_rad(rad_to_pct(q, Q_MAX), Q_MAX);
            assert!((back - q).abs() < 1e-6, "q={q} back={back}");
        }
    }

    #[test]
    fn rad_to_pct_clamps() {
        assert_eq!(rad_to_pct(-0.5, Q_MAX), 0.0);
        assert_eq!(rad_to_pct(6.0, Q_MAX), 100.0);
    }

    #[test]
    fn scale_pct_to_raw() {
        let scale = PositionScale {
            zero_raw: 1200,
            span_ticks: 2000,
        };
        assert_eq!(scale.pct_to_raw(0.0), 1200);
        assert_eq!(scale.pct_to_raw(50.0), 2200);
        assert_eq!(scale.pct_to_raw(100.0), 3200);
    }

    #[test]
    fn scale_raw_to_pct_clamps_below_zero() {
        let scale = PositionScale {
            zero_raw: 1200,
            span_ticks: 2000,
        };
        // Pressed into the hard stop: raw below calibrated zero reads 0 %.
        assert_eq!(scale.raw_to_pct(1150), 0.0);
        assert_eq!(scale.raw_to_pct(2200), 50.0);
        assert_eq!(scale.raw_to_pct(4000), 100.0);
    }

    #[test]
    fn servo_safe_range_bounds() {
        assert_eq!(to_servo_safe_pct(0.0, 5.0, 95.0), 5.0);
        assert_eq!(to_servo_safe_pct(100.0, 5.0, 95.0), 95.0);
        assert_eq!(to_servo_safe_pct(50.0, 5.0, 95.0), 50.0);
        // Out-of-range external input is clamped first.
        assert_eq!(to_servo_safe_pct(150.0, 5.0, 95.0), 95.0);
    }

    #[test]
    fn effort_current_mapping() {
        assert_eq!(effort_to_current_ma(0.0, 2000), 0);
        assert_eq!(effort_to_current_ma(10.0, 2000), 200);
        assert_eq!(effort_to_current_ma(100.0, 2000), 2000);
        assert!((current_to_pct(-800, 2000) - 40.0).abs() < 1e-9);
    }
}
