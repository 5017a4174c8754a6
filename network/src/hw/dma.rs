//! DMA region handle.
//!
//! A DMA region is a CPU pointer plus the bus address the device uses for
//! the same memory. The region is caller-owned and statically sized; the
//! driver only ever derives sub-addresses from it.

use core::ptr::NonNull;

/// CPU/bus view of one statically allocated block of type `T`.
pub struct DmaRegion<T> {
    /// CPU pointer to the block.
    cpu: NonNull<T>,
    /// Bus address of the block as seen by the device.
    bus: u32,
}

impl<T> DmaRegion<T> {
    /// Create a region from an explicit CPU pointer and bus address.
    ///
    /// Returns `None` for a null pointer or when the block would extend past
    /// the 32-bit bus window.
    ///
    /// # Safety
    /// - `cpu` must be valid for reads and writes of `T` for as long as the
    ///   region (or anything built from it) is in use.
    /// - The memory must not be moved or freed while the device may DMA to it.
    /// - `bus` must be the device-visible address of `cpu`.
    pub unsafe fn new(cpu: *mut T, bus: u32) -> Option<Self> {
        let cpu = NonNull::new(cpu)?;
        let end = (bus as u64) + core::mem::size_of::<T>() as u64;
        if end > u32::MAX as u64 + 1 {
            return None;
        }
        Some(Self { cpu, bus })
    }

    /// Create a region for identity-mapped memory (bus == physical == virtual).
    ///
    /// This is the normal case in pre-OS firmware. Fails if the block is not
    /// below 4 GiB.
    ///
    /// # Safety
    /// Same as [`DmaRegion::new`], and the memory must be identity-mapped.
    pub unsafe fn identity(cpu: *mut T) -> Option<Self> {
        let addr = cpu as usize as u64;
        if addr > u32::MAX as u64 {
            return None;
        }
        Self::new(cpu, addr as u32)
    }

    /// CPU pointer to the block.
    #[inline]
    pub fn cpu_ptr(&self) -> *mut T {
        self.cpu.as_ptr()
    }

    /// Bus address of the block.
    #[inline]
    pub fn bus_addr(&self) -> u32 {
        self.bus
    }

    /// Bus address of a byte offset inside the block.
    #[inline]
    pub fn bus_at(&self, offset: usize) -> u32 {
        debug_assert!(offset <= core::mem::size_of::<T>());
        self.bus + offset as u32
    }
}

// Safety: the region only hands out raw pointers; the owner serializes access.
unsafe impl<T: Send> Send for DmaRegion<T> {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_region_rejects_null() {
        assert!(unsafe { DmaRegion::<[u8; 16]>::new(core::ptr::null_mut(), 0x1000) }.is_none());
    }

    #[test]
    fn test_region_rejects_bus_overflow() {
        let mut block = [0u8; 64];
        let region = unsafe { DmaRegion::new(&mut block as *mut [u8; 64], 0xFFFF_FFF0) };
        assert!(region.is_none());
    }

    #[test]
    fn test_bus_offsets() {
        let mut block = [0u8; 64];
        let region = unsafe { DmaRegion::new(&mut block as *mut [u8; 64], 0x0010_0000) }.unwrap();
        assert_eq!(region.bus_addr(), 0x0010_0000);
        assert_eq!(region.bus_at(32), 0x0010_0020);
    }
}
