//! Polled nForce Ethernet driver for pre-OS network stacks.
//!
//! Three layers, bottom-up:
//! - descriptor rings shared with the DMA engine ([`driver::forcedeth::ring`])
//! - PHY discovery and autonegotiation ([`driver::forcedeth::phy`])
//! - device lifecycle: probe, initialize, poll, transmit, disable
//!   ([`driver::forcedeth::ForcedethNic`])
//!
//! Hardware access goes through [`hw::RegisterInterface`]; every wait is a
//! bounded [`time::RetryPolicy`]. [`adapter::SmoltcpAdapter`] plugs any
//! [`driver::NetworkDriver`] into smoltcp.

#![cfg_attr(not(test), no_std)]

pub mod adapter;
pub mod driver;
pub mod hw;
pub mod logger;
pub mod shared;
pub mod time;
pub mod types;

#[cfg(test)]
pub(crate) mod testing;

pub use adapter::SmoltcpAdapter;
pub use driver::forcedeth::{
    is_supported_device, Duplex, ForcedethConfig, ForcedethNic, LinkOutcome, LinkSpeed, LinkState,
    ProbeError, RingMemory,
};
pub use driver::{NetworkDriver, RxError, TxError};
pub use hw::{DmaRegion, MmioRegisters, RegisterInterface};
pub use shared::SharedNic;
pub use time::RetryPolicy;
pub use types::MacAddress;
