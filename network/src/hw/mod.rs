//! Hardware access primitives.
//!
//! Everything the driver needs from the platform: memory barriers, the
//! register interface (MMIO + bounded delay), the TSC used to calibrate
//! delays, and the DMA region that backs the descriptor rings.

pub mod barriers;
pub mod dma;
pub mod mmio;
pub mod tsc;

// Re-exports for convenience
pub use barriers::{mb, rmb, wmb};
pub use dma::DmaRegion;
pub use mmio::{MmioRegisters, RegisterInterface};
