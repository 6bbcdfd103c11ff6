//! Absolute-deadline scheduling on the monotonic clock.
//!
//! Both runtime loops pace themselves with `next = previous_deadline +
//! period` — never `now + period` — so jitter in one cycle does not shift
//! the phase of every cycle after it. With the `rt` feature the sleep
//! primitive is `clock_nanosleep(CLOCK_MONOTONIC, TIMER_ABSTIME)`; without
//! it, `std::thread::sleep` of the residual against an `Instant` deadline.
//!
//! A call that arrives past its deadline returns immediately and records a
//! deadline miss; the deadline sequence is unchanged, so a single overrun
//! produces one tick of jitter and nothing else.

use std::time::Duration;

#[cfg(not(feature = "rt"))]
use std::time::Instant;

/// Outcome of one [`Scheduler::wait`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tick {
    /// Slept until the deadline.
    OnTime,
    /// Deadline already passed on entry; returned immediately.
    Missed {
        /// How far past the deadline the call arrived.
        late: Duration,
    },
}

impl Tick {
    #[inline]
    pub const fn is_miss(&self) -> bool {
        matches!(self, Self::Missed { .. })
    }
}

/// O(1) per-tick deadline statistics.
#[derive(Debug, Clone, Copy, Default)]
pub struct DeadlineStats {
    /// Ticks waited for.
    pub ticks: u64,
    /// Ticks that arrived past their deadline.
    pub misses: u64,
    /// Lateness of the most recent miss [ns].
    pub last_late_ns: u64,
    /// Worst lateness observed [ns].
    pub max_late_ns: u64,
}

impl DeadlineStats {
    #[inline]
    fn record(&mut self, tick: Tick) {
        self.ticks += 1;
        if let Tick::Missed { late } = tick {
            self.misses += 1;
            let late_ns = late.as_nanos() as u64;
            self.last_late_ns = late_ns;
            if late_ns > self.max_late_ns {
                self.max_late_ns = late_ns;
            }
        }
    }
}

// ─── Deadline representation ────────────────────────────────────────

#[cfg(feature = "rt")]
mod mono {
    use super::Duration;
    use nix::sys::time::TimeSpec;
    use nix::time::{ClockId, ClockNanosleepFlags, clock_gettime, clock_nanosleep};

    const CLOCK: ClockId = ClockId::CLOCK_MONOTONIC;

    /// Monotonic nanoseconds since boot.
    pub fn now_ns() -> i64 {
        // CLOCK_MONOTONIC cannot fail on a valid clock id; the fallback
        // degrades to "clock stalled", which at worst sleeps one period.
        clock_gettime(CLOCK)
            .map(|ts| ts.tv_sec() * 1_000_000_000 + ts.tv_nsec())
            .unwrap_or(0)
    }

    /// Sleep until an absolute monotonic deadline.
    pub fn sleep_until_ns(deadline_ns: i64) {
        let ts = TimeSpec::new(
            deadline_ns / 1_000_000_000,
            deadline_ns % 1_000_000_000,
        );
        // EINTR means a signal woke us; the stop flag is checked by the
        // loop right after, so an early return is fine.
        let _ = clock_nanosleep(CLOCK, ClockNanosleepFlags::TIMER_ABSTIME, &ts);
    }

    pub fn duration_ns(d: Duration) -> i64 {
        d.as_nanos() as i64
    }
}

/// Periodic absolute-deadline scheduler.
pub struct Scheduler {
    period: Duration,
    stats: DeadlineStats,
    #[cfg(feature = "rt")]
    next_deadline_ns: i64,
    #[cfg(not(feature = "rt"))]
    next_deadline: Instant,
}

impl Scheduler {
    /// Create a scheduler whose first deadline is one period from now.
    pub fn new(period: Duration) -> Self {
        Self {
            period,
            stats: DeadlineStats::default(),
            #[cfg(feature = "rt")]
            next_deadline_ns: mono::now_ns() + mono::duration_ns(period),
            #[cfg(not(feature = "rt"))]
            next_deadline: Instant::now() + period,
        }
    }

    pub fn period(&self) -> Duration {
        self.period
    }

    pub fn stats(&self) -> DeadlineStats {
        self.stats
    }

    #[inline]
    pub fn misses(&self) -> u64 {
        self.stats.misses
    }

    /// Sleep until the next deadline, then advance it by one period.
    ///
    /// Returns [`Tick::Missed`] without sleeping when the deadline already
    /// passed.
    #[cfg(feature = "rt")]
    pub fn wait(&mut self) -> Tick {
        let deadline = self.next_deadline_ns;
        self.next_deadline_ns = deadline + mono::duration_ns(self.period);

        let now = mono::now_ns();
        let tick = if now >= deadline {
            Tick::Missed {
                late: Duration::from_nanos((now - deadline) as u64),
            }
        } else {
            mono::sleep_until_ns(deadline);
            Tick::OnTime
        };
        self.stats.record(tick);
        tick
    }

    /// Sleep until the next deadline, then advance it by one period.
    ///
    /// Returns [`Tick::Missed`] without sleeping when the deadline already
    /// passed.
    #[cfg(not(feature = "rt"))]
    pub fn wait(&mut self) -> Tick {
        let deadline = self.next_deadline;
        self.next_deadline = deadline + self.period;

        let now = Instant::now();
        let tick = if now >= deadline {
            Tick::Missed {
                late: now - deadline,
            }
        } else {
            std::thread::sleep(deadline - now);
            Tick::OnTime
        };
        self.stats.record(tick);
        tick
    }
}
