//! TSC (Time Stamp Counter) access.
//!
//! Requires an invariant TSC; the boot environment calibrates its frequency
//! once and hands it to [`MmioRegisters`](super::MmioRegisters).

/// Read TSC (non-serializing).
#[cfg(target_arch = "x86_64")]
#[inline]
pub fn read_tsc() -> u64 {
    unsafe { core::arch::x86_64::_rdtsc() }
}

/// Stub for non-x86_64 targets.
#[cfg(not(target_arch = "x86_64"))]
#[inline]
pub fn read_tsc() -> u64 {
    0
}

/// Spin for `us` microseconds given a calibrated tick rate.
///
/// With `ticks_per_us == 0` (uncalibrated, or no TSC) this degrades to a
/// fixed spin count per microsecond.
pub fn spin_delay_us(us: u32, ticks_per_us: u64) {
    if ticks_per_us == 0 {
        for _ in 0..(us as u64) * 100 {
            core::hint::spin_loop();
        }
        return;
    }

    let start = read_tsc();
    let ticks = (us as u64) * ticks_per_us;
    while read_tsc().wrapping_sub(start) < ticks {
        core::hint::spin_loop();
    }
}
