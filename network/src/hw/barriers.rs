//! Memory barriers.
//!
//! Descriptor fields live in ordinary RAM that the NIC reads and writes by
//! DMA. The compiler and CPU are free to reorder plain stores, so every
//! ownership hand-off goes through one of these.

#[cfg(target_arch = "x86_64")]
use core::sync::atomic::compiler_fence;
#[cfg(not(target_arch = "x86_64"))]
use core::sync::atomic::fence;
use core::sync::atomic::Ordering;

/// Store fence - all prior stores are globally visible before any later one.
///
/// Use between writing a descriptor's buffer/length and setting its
/// ownership bit.
#[cfg(target_arch = "x86_64")]
#[inline]
pub fn wmb() {
    compiler_fence(Ordering::SeqCst);
    unsafe {
        core::arch::asm!("sfence", options(nostack, preserves_flags));
    }
    compiler_fence(Ordering::SeqCst);
}

/// Load fence - prior loads complete before any later one.
///
/// Use after observing a hardware-written flag and before reading the
/// buffer it guards.
#[cfg(target_arch = "x86_64")]
#[inline]
pub fn rmb() {
    compiler_fence(Ordering::SeqCst);
    unsafe {
        core::arch::asm!("lfence", options(nostack, preserves_flags));
    }
    compiler_fence(Ordering::SeqCst);
}

/// Full fence - loads and stores.
#[cfg(target_arch = "x86_64")]
#[inline]
pub fn mb() {
    compiler_fence(Ordering::SeqCst);
    unsafe {
        core::arch::asm!("mfence", options(nostack, preserves_flags));
    }
    compiler_fence(Ordering::SeqCst);
}

#[cfg(not(target_arch = "x86_64"))]
#[inline]
pub fn wmb() {
    fence(Ordering::Release);
}

#[cfg(not(target_arch = "x86_64"))]
#[inline]
pub fn rmb() {
    fence(Ordering::Acquire);
}

#[cfg(not(target_arch = "x86_64"))]
#[inline]
pub fn mb() {
    fence(Ordering::SeqCst);
}
