//! Register interface.
//!
//! The driver core never touches MMIO directly; it goes through
//! [`RegisterInterface`], which firmware implements over the mapped BAR and
//! tests implement over a simulated register file.

use super::tsc::spin_delay_us;

/// 32-bit register access plus a bounded busy-wait.
///
/// Offsets are byte offsets into the adapter's register window.
pub trait RegisterInterface {
    /// Read a 32-bit register.
    fn read32(&self, offset: u32) -> u32;

    /// Write a 32-bit register.
    fn write32(&self, offset: u32, value: u32);

    /// Busy-wait for `us` microseconds.
    fn delay_us(&self, us: u32);

    /// Force out posted writes by reading back a register.
    #[inline]
    fn flush(&self) {
        let _ = self.read32(0);
    }
}

/// Memory-mapped register window of a real adapter.
#[derive(Debug, Clone, Copy)]
pub struct MmioRegisters {
    /// Virtual address of BAR0.
    base: usize,
    /// Calibrated TSC ticks per microsecond.
    ticks_per_us: u64,
}

impl MmioRegisters {
    /// Wrap a mapped register window.
    ///
    /// # Safety
    /// `base` must point to the adapter's mapped, uncached BAR0 and stay
    /// mapped for as long as this value (or any copy) is used.
    pub unsafe fn new(base: usize, tsc_freq: u64) -> Self {
        Self {
            base,
            ticks_per_us: tsc_freq / 1_000_000,
        }
    }

    /// BAR0 virtual address.
    #[inline]
    pub fn base(&self) -> usize {
        self.base
    }
}

impl RegisterInterface for MmioRegisters {
    #[inline]
    fn read32(&self, offset: u32) -> u32 {
        // Safety: construction guarantees the window is mapped.
        unsafe { core::ptr::read_volatile((self.base + offset as usize) as *const u32) }
    }

    #[inline]
    fn write32(&self, offset: u32, value: u32) {
        unsafe { core::ptr::write_volatile((self.base + offset as usize) as *mut u32, value) }
    }

    #[inline]
    fn delay_us(&self, us: u32) {
        spin_delay_us(us, self.ticks_per_us);
    }
}

impl<R: RegisterInterface + ?Sized> RegisterInterface for &R {
    #[inline]
    fn read32(&self, offset: u32) -> u32 {
        (**self).read32(offset)
    }

    #[inline]
    fn write32(&self, offset: u32, value: u32) {
        (**self).write32(offset, value)
    }

    #[inline]
    fn delay_us(&self, us: u32) {
        (**self).delay_us(us)
    }
}
