//! Driver abstraction module.
//!
//! # Preconditions (firmware guarantees before probe)
//! - Bus mastering enabled
//! - MMIO BAR mapped, uncached
//! - Ring memory identity-mapped below 4 GiB
//!
//! # Architecture
//! Drivers never touch MMIO directly; every register access goes through
//! [`crate::hw::RegisterInterface`] so the same code runs against real
//! hardware and against the simulated adapter in tests.

pub mod forcedeth;
pub mod traits;

// Re-exports - Network
pub use traits::{NetworkDriver, RxError, TxError};

// Re-exports - nForce
pub use forcedeth::{ForcedethConfig, ForcedethNic, LinkOutcome, ProbeError, RingMemory};
