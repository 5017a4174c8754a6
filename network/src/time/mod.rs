//! Bounded waits.
//!
//! Every busy-wait in the driver is a [`RetryPolicy`]: a fixed delay per
//! attempt and a fixed number of attempts. Nothing waits forever.

use core::fmt;

use crate::hw::RegisterInterface;

/// A bounded wait ran out of attempts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimedOut {
    /// Number of probes performed before giving up.
    pub attempts: u32,
}

impl fmt::Display for TimedOut {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "condition not met after {} attempts", self.attempts)
    }
}

/// Interval and attempt budget for one busy-wait.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Delay between probes, in microseconds.
    pub interval_us: u32,
    /// Maximum number of probes.
    pub max_attempts: u32,
}

impl RetryPolicy {
    /// Create a policy from an interval and an attempt count.
    pub const fn new(interval_us: u32, max_attempts: u32) -> Self {
        Self {
            interval_us,
            max_attempts,
        }
    }

    /// Create a policy from an interval and a total time budget.
    ///
    /// At least one attempt is always made.
    pub const fn from_budget(interval_us: u32, budget_us: u32) -> Self {
        let attempts = if interval_us == 0 {
            1
        } else {
            budget_us / interval_us
        };
        Self {
            interval_us,
            max_attempts: if attempts == 0 { 1 } else { attempts },
        }
    }

    /// Worst-case time spent waiting, in microseconds.
    #[inline]
    pub fn budget_us(&self) -> u64 {
        self.interval_us as u64 * self.max_attempts.saturating_sub(1) as u64
    }

    /// Probe until `probe` yields a value or the attempts run out.
    ///
    /// `probe` runs exactly `max_attempts` times on timeout, with one
    /// `interval_us` delay between consecutive probes.
    pub fn poll<R, T, F>(&self, regs: &R, mut probe: F) -> Result<T, TimedOut>
    where
        R: RegisterInterface + ?Sized,
        F: FnMut(&R) -> Option<T>,
    {
        let attempts = self.max_attempts.max(1);
        for attempt in 1..=attempts {
            if let Some(value) = probe(regs) {
                return Ok(value);
            }
            if attempt < attempts {
                regs.delay_us(self.interval_us);
            }
        }
        Err(TimedOut { attempts })
    }

    /// Wait until `(read32(offset) & mask) == target`.
    pub fn wait_register<R>(
        &self,
        regs: &R,
        offset: u32,
        mask: u32,
        target: u32,
    ) -> Result<(), TimedOut>
    where
        R: RegisterInterface + ?Sized,
    {
        regs.flush();
        self.poll(regs, |r| (r.read32(offset) & mask == target).then_some(()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::FakeNic;
    use core::cell::Cell;

    #[test]
    fn test_poll_stops_at_first_success() {
        let nic = FakeNic::new();
        let calls = Cell::new(0u32);
        let policy = RetryPolicy::new(10, 50);

        let result = policy.poll(&nic, |_| {
            calls.set(calls.get() + 1);
            (calls.get() == 3).then_some(calls.get())
        });

        assert_eq!(result, Ok(3));
        assert_eq!(calls.get(), 3);
        assert_eq!(nic.total_delay_us(), 20);
    }

    #[test]
    fn test_poll_runs_exactly_max_attempts() {
        let nic = FakeNic::new();
        let calls = Cell::new(0u32);
        let policy = RetryPolicy::new(100, 7);

        let result: Result<(), _> = policy.poll(&nic, |_| {
            calls.set(calls.get() + 1);
            None
        });

        assert_eq!(result, Err(TimedOut { attempts: 7 }));
        assert_eq!(calls.get(), 7);
        assert_eq!(nic.total_delay_us(), 600);
    }

    #[test]
    fn test_from_budget() {
        assert_eq!(RetryPolicy::from_budget(10, 500_000).max_attempts, 50_000);
        assert_eq!(RetryPolicy::from_budget(10, 5).max_attempts, 1);
        assert_eq!(RetryPolicy::from_budget(0, 5).max_attempts, 1);
    }

    #[test]
    fn test_wait_register_matches_target() {
        let nic = FakeNic::new();
        nic.set_reg(0x130, 1 << 31);
        let policy = RetryPolicy::new(5, 10);
        assert!(policy.wait_register(&nic, 0x130, 1 << 31, 1 << 31).is_ok());
        assert!(policy.wait_register(&nic, 0x130, 1, 1).is_err());
    }
}
