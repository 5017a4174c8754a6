//! NVIDIA nForce (forcedeth) network driver.
//!
//! Polled, single-queue driver for the Ethernet MAC built into nForce
//! chipsets. No interrupts, no allocation after probe: all descriptors and
//! packet buffers live in one caller-supplied [`ring::RingMemory`].
//!
//! # Supported Devices
//! - nForce (0x01C3)
//! - nForce2 (0x0066)
//! - nForce3 (0x00D6)
//! - nForce MCP (0x054C)
//!
//! # Reference
//! Linux drivers/net/ethernet/nvidia/forcedeth.c

pub mod init;
pub mod mii;
pub mod nforce;
pub mod phy;
pub mod regs;
pub mod ring;
pub mod rx;
pub mod tx;

// Re-exports
pub use init::{ForcedethConfig, ProbeError};
pub use nforce::{ForcedethNic, NicStats};
pub use phy::{Duplex, LinkOutcome, LinkSpeed, LinkState};
pub use ring::RingMemory;

use tx::TxFlags;

/// NVIDIA PCI Vendor ID.
pub const NVIDIA_VENDOR_ID: u16 = 0x10DE;

/// One supported controller and its per-revision quirks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeviceInfo {
    /// PCI device ID.
    pub device_id: u16,
    /// Marketing name.
    pub name: &'static str,
    /// Flags written to every transmit descriptor.
    pub tx_flags: TxFlags,
    /// Interrupt mask template (kept masked; the driver polls).
    pub irq_mask: u32,
}

const TX_FLAGS_V1: TxFlags = TxFlags::LAST_PACKET.union(TxFlags::VALID);
const TX_FLAGS_V2: TxFlags = TX_FLAGS_V1.union(TxFlags::LAST_PACKET1);
const IRQ_MASK_POLLED: u32 = regs::IRQMASK_WANTED_2 | regs::IRQ_TIMER;

/// Supported forcedeth controllers.
pub const FORCEDETH_DEVICES: &[DeviceInfo] = &[
    DeviceInfo {
        device_id: 0x01C3,
        name: "nforce",
        tx_flags: TX_FLAGS_V1,
        irq_mask: IRQ_MASK_POLLED,
    },
    DeviceInfo {
        device_id: 0x0066,
        name: "nforce2",
        tx_flags: TX_FLAGS_V2,
        irq_mask: IRQ_MASK_POLLED,
    },
    DeviceInfo {
        device_id: 0x00D6,
        name: "nforce3",
        tx_flags: TX_FLAGS_V2,
        irq_mask: IRQ_MASK_POLLED,
    },
    DeviceInfo {
        device_id: 0x054C,
        name: "nforce MCP",
        tx_flags: TX_FLAGS_V1,
        irq_mask: IRQ_MASK_POLLED,
    },
];

/// Look up a controller by PCI identity.
pub fn lookup_device(vendor_id: u16, device_id: u16) -> Option<&'static DeviceInfo> {
    if vendor_id != NVIDIA_VENDOR_ID {
        return None;
    }
    FORCEDETH_DEVICES.iter().find(|d| d.device_id == device_id)
}

/// Check if a PCI device is a supported forcedeth NIC.
#[inline]
pub fn is_supported_device(vendor_id: u16, device_id: u16) -> bool {
    lookup_device(vendor_id, device_id).is_some()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_device_table() {
        assert!(is_supported_device(0x10DE, 0x01C3));
        assert!(is_supported_device(0x10DE, 0x054C));
        assert!(!is_supported_device(0x10DE, 0x1234));
        assert!(!is_supported_device(0x8086, 0x01C3));
    }

    #[test]
    fn test_nforce2_and_3_use_last_packet1() {
        for id in [0x0066, 0x00D6] {
            let info = lookup_device(NVIDIA_VENDOR_ID, id).unwrap();
            assert!(info.tx_flags.contains(TxFlags::LAST_PACKET1));
        }
        let nforce = lookup_device(NVIDIA_VENDOR_ID, 0x01C3).unwrap();
        assert_eq!(nforce.tx_flags, TxFlags::LAST_PACKET | TxFlags::VALID);
        assert_eq!(nforce.irq_mask, 0x0167);
    }
}
