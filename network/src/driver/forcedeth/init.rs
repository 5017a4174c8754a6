//! nForce initialization sequence.
//!
//! # Reset order
//! - Phase 1: erase filters, stop TX/RX/adapter
//! - Phase 2: prime rings, datapath reset pulse
//! - Phase 3: station MAC, ring bases and sizes
//! - Phase 4: default 10/half link, setup register block, SETUP5 handshake
//! - Phase 5: PHY scan, adapter control, MII clock, power-up
//! - Phase 6: interrupts masked, filter programmed (RX started)
//! - Phase 7: PHY negotiation, TX started
//!
//! Interrupts stay masked: the driver is polled. Every wait is a
//! [`RetryPolicy`]; busy-bit timeouts during stop are logged, not fatal.
//!
//! # Reference
//! Linux drivers/net/ethernet/nvidia/forcedeth.c (nv_open, nv_close)

use core::fmt;

use crate::hw::RegisterInterface;
use crate::time::RetryPolicy;
use crate::types::MacAddress;

use super::mii::MiiTiming;
use super::phy::{write_phy_interface, LinkState, PhyTiming};
use super::regs;
use super::ring::{RX_RING_SIZE, TX_RING_SIZE};

// ═══════════════════════════════════════════════════════════════════════════
// CONFIGURATION
// ═══════════════════════════════════════════════════════════════════════════

/// Forcedeth driver configuration.
///
/// Every delay and bounded wait the driver performs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ForcedethConfig {
    /// MII transaction timing.
    pub mii: MiiTiming,
    /// PHY reset and autonegotiation timing.
    pub phy: PhyTiming,
    /// Wait for TX_STATUS.BUSY to clear after stopping the transmitter.
    pub tx_stop: RetryPolicy,
    /// Wait for RX_STATUS.BUSY to clear after stopping the receiver.
    pub rx_stop: RetryPolicy,
    /// Settle time after a stop, busy or not.
    pub stop_settle_us: u32,
    /// Wait for the SETUP5 ready bit.
    pub setup5: RetryPolicy,
    /// Width of the datapath reset pulse.
    pub txrx_reset_us: u32,
    /// Settle time between power-up and power-valid.
    pub power_up_settle_us: u32,
}

impl Default for ForcedethConfig {
    fn default() -> Self {
        Self {
            mii: MiiTiming::default(),
            phy: PhyTiming::default(),
            tx_stop: RetryPolicy::from_budget(10, 500_000),
            rx_stop: RetryPolicy::from_budget(10, 500_000),
            stop_settle_us: 100,
            setup5: RetryPolicy::from_budget(5, 50_000),
            txrx_reset_us: 4,
            power_up_settle_us: 10,
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// ERRORS
// ═══════════════════════════════════════════════════════════════════════════

/// Probe errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProbeError {
    /// Not an nForce Ethernet controller this driver knows.
    UnsupportedDevice {
        /// PCI vendor ID.
        vendor: u16,
        /// PCI device ID.
        device: u16,
    },
    /// Burned-in address is all-zero or a group address.
    InvalidMac([u8; 6]),
}

impl fmt::Display for ProbeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProbeError::UnsupportedDevice { vendor, device } => {
                write!(f, "unsupported device {:04x}:{:04x}", vendor, device)
            }
            ProbeError::InvalidMac(mac) => {
                write!(f, "invalid MAC address {}", MacAddress(*mac))
            }
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// STATION ADDRESS
// ═══════════════════════════════════════════════════════════════════════════

/// Raw contents of MAC_ADDR_A / MAC_ADDR_B.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MacRegisters {
    /// MAC_ADDR_A.
    pub a: u32,
    /// MAC_ADDR_B.
    pub b: u32,
}

impl MacRegisters {
    /// Snapshot the address registers.
    pub fn read<R: RegisterInterface + ?Sized>(regs: &R) -> Self {
        Self {
            a: regs.read32(regs::MAC_ADDR_A),
            b: regs.read32(regs::MAC_ADDR_B),
        }
    }

    /// Put the snapshot back.
    pub fn restore<R: RegisterInterface + ?Sized>(&self, regs: &R) {
        regs.write32(regs::MAC_ADDR_A, self.a);
        regs.write32(regs::MAC_ADDR_B, self.b);
    }

    /// Address as left by firmware (byte order reversed in the registers).
    pub fn station(&self) -> MacAddress {
        MacAddress([
            (self.b >> 8) as u8,
            self.b as u8,
            (self.a >> 24) as u8,
            (self.a >> 16) as u8,
            (self.a >> 8) as u8,
            self.a as u8,
        ])
    }

    /// Register encoding the adapter expects once running.
    pub fn for_station(mac: &MacAddress) -> Self {
        let n = mac.0;
        Self {
            a: u32::from_le_bytes([n[0], n[1], n[2], n[3]]),
            b: u32::from_le_bytes([n[4], n[5], 0, 0]),
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// RESET STEPS
// ═══════════════════════════════════════════════════════════════════════════

/// Clear the multicast filter and packet filter flags.
pub fn erase_filters<R: RegisterInterface + ?Sized>(regs: &R) {
    regs.write32(regs::MULTICAST_ADDR_A, regs::MCASTADDRA_FORCE);
    regs.write32(regs::MULTICAST_ADDR_B, 0);
    regs.write32(regs::MULTICAST_MASK_A, 0);
    regs.write32(regs::MULTICAST_MASK_B, 0);
    regs.write32(regs::PACKET_FILTER, 0);
}

/// Stop transmitter, receiver and adapter without waiting.
pub fn quiesce<R: RegisterInterface + ?Sized>(regs: &R) {
    regs.write32(regs::TX_CONTROL, 0);
    regs.write32(regs::RX_CONTROL, 0);
    regs.write32(regs::ADAPTER_CONTROL, 0);
}

/// Pulse the datapath reset.
pub fn txrx_reset<R: RegisterInterface + ?Sized>(regs: &R, config: &ForcedethConfig) {
    regs.write32(regs::TXRX_CONTROL, regs::TXRXCTL_BIT2 | regs::TXRXCTL_RESET);
    regs.flush();
    regs.delay_us(config.txrx_reset_us);
    regs.write32(regs::TXRX_CONTROL, regs::TXRXCTL_BIT2);
    regs.flush();
}

/// Combined ring-size register value.
pub const fn ring_sizes() -> u32 {
    (((RX_RING_SIZE - 1) as u32) << regs::RINGSZ_RX_SHIFT)
        | (((TX_RING_SIZE - 1) as u32) << regs::RINGSZ_TX_SHIFT)
}

/// Default link, SETUP3, datapath enable and the SETUP5 handshake.
pub fn setup_datapath<R: RegisterInterface + ?Sized>(
    regs: &R,
    link: &LinkState,
    config: &ForcedethConfig,
) {
    regs.write32(regs::LINK_SPEED, link.link_speed_register());
    regs.write32(regs::SETUP3, regs::SETUP3_VAL1);
    regs.write32(regs::TXRX_CONTROL, 0);
    regs.flush();
    regs.write32(regs::TXRX_CONTROL, regs::TXRXCTL_BIT1);

    if config
        .setup5
        .wait_register(regs, regs::SETUP5, regs::SETUP5_BIT31, regs::SETUP5_BIT31)
        .is_err()
    {
        log::warn!("forcedeth: SETUP5 ready bit never set");
    }
    regs.write32(regs::SETUP4, 0);
    regs.write32(regs::MII_STATUS, regs::MIISTAT_MASK);
}

/// The magic register block: interface and duplex, status acks, filters,
/// seed, timers.
pub fn setup_misc<R: RegisterInterface + ?Sized>(regs: &R, link: &LinkState) {
    write_phy_interface(regs, link);
    regs.write32(regs::MISC1, link.misc1_register());
    regs.write32(regs::TX_STATUS, regs.read32(regs::TX_STATUS));
    regs.write32(regs::PACKET_FILTER, regs::PFF_ALWAYS);
    regs.write32(regs::OFFLOAD_CONFIG, regs::OFFLOAD_NORMAL);
    regs.write32(regs::RX_STATUS, regs.read32(regs::RX_STATUS));
    regs.write32(regs::RANDOM_SEED, regs::RNDSEED_DEFAULT);
    regs.write32(regs::SETUP1, regs::SETUP1_VAL);
    regs.write32(regs::SETUP2, regs::SETUP2_VAL);
    regs.write32(regs::POLLING_INTERVAL, regs::POLL_DEFAULT);
    regs.write32(regs::SETUP6, regs::SETUP6_VAL);
}

/// Point the adapter at its PHY and start it, then the MII clock and wake-up block.
pub fn start_adapter<R: RegisterInterface + ?Sized>(regs: &R, phy_address: Option<u8>) {
    let control = match phy_address {
        Some(addr) => {
            ((addr as u32) << regs::ADAPTCTL_PHYSHIFT) | regs::ADAPTCTL_PHYVALID | regs::ADAPTCTL_RUNNING
        }
        None => regs::ADAPTCTL_RUNNING,
    };
    regs.write32(regs::ADAPTER_CONTROL, control);
    regs.write32(regs::MII_SPEED, regs::MIISPEED_BIT8 | regs::MIIDELAY);
    regs.write32(regs::SETUP4, regs::SETUP4_VAL);
    regs.write32(regs::WAKEUP_FLAGS, regs::WAKEUPFLAGS_VAL);
}

/// Power the MAC up and mark the power state valid.
pub fn power_up<R: RegisterInterface + ?Sized>(regs: &R, config: &ForcedethConfig) {
    let state = regs.read32(regs::POWER_STATE);
    if state & regs::POWERSTATE_POWEREDUP == 0 {
        regs.write32(regs::POWER_STATE, state | regs::POWERSTATE_POWEREDUP);
    }
    regs.flush();
    regs.delay_us(config.power_up_settle_us);
    let state = regs.read32(regs::POWER_STATE);
    regs.write32(regs::POWER_STATE, state | regs::POWERSTATE_VALID);
}

/// Mask every interrupt and acknowledge anything pending.
pub fn mask_interrupts<R: RegisterInterface + ?Sized>(regs: &R) {
    regs.write32(regs::IRQ_MASK, 0);
    regs.flush();
    regs.write32(regs::MII_STATUS, regs::MIISTAT_MASK);
    regs.write32(regs::IRQ_STATUS, regs::IRQSTAT_MASK);
    regs.flush();
}

/// Accept the station address and broadcast; no multicast groups.
///
/// The receiver is stopped around the update and restarted at `link`.
pub fn set_multicast<R: RegisterInterface + ?Sized>(
    regs: &R,
    link: &LinkState,
    config: &ForcedethConfig,
) {
    stop_rx(regs, config);
    regs.write32(regs::MULTICAST_ADDR_A, regs::MCASTADDRA_FORCE);
    regs.write32(regs::MULTICAST_ADDR_B, 0);
    regs.write32(regs::MULTICAST_MASK_A, 0);
    regs.write32(regs::MULTICAST_MASK_B, 0);
    regs.write32(regs::PACKET_FILTER, regs::PFF_ALWAYS | regs::PFF_MYADDR);
    start_rx(regs, link);
}

/// Start the receiver at the programmed link speed.
pub fn start_rx<R: RegisterInterface + ?Sized>(regs: &R, link: &LinkState) {
    if regs.read32(regs::RX_CONTROL) & regs::RX_CONTROL_START != 0 {
        regs.write32(regs::RX_CONTROL, 0);
        regs.flush();
    }
    regs.write32(regs::LINK_SPEED, link.link_speed_register());
    regs.flush();
    regs.write32(regs::RX_CONTROL, regs::RX_CONTROL_START);
    regs.flush();
}

/// Stop the receiver and clear the link speed.
pub fn stop_rx<R: RegisterInterface + ?Sized>(regs: &R, config: &ForcedethConfig) {
    regs.write32(regs::RX_CONTROL, 0);
    if config
        .rx_stop
        .wait_register(regs, regs::RX_STATUS, regs::RX_STATUS_BUSY, 0)
        .is_err()
    {
        log::warn!("forcedeth: stop_rx: receiver remained busy");
    }
    regs.delay_us(config.stop_settle_us);
    regs.write32(regs::LINK_SPEED, 0);
}

/// Start the transmitter.
pub fn start_tx<R: RegisterInterface + ?Sized>(regs: &R) {
    regs.write32(regs::TX_CONTROL, regs::TX_CONTROL_START);
    regs.flush();
}

/// Stop the transmitter and clear the unknown transmitter register.
pub fn stop_tx<R: RegisterInterface + ?Sized>(regs: &R, config: &ForcedethConfig) {
    regs.write32(regs::TX_CONTROL, 0);
    if config
        .tx_stop
        .wait_register(regs, regs::TX_STATUS, regs::TX_STATUS_BUSY, 0)
        .is_err()
    {
        log::warn!("forcedeth: stop_tx: transmitter remained busy");
    }
    regs.delay_us(config.stop_settle_us);
    regs.write32(regs::TX_UNKNOWN, 0);
}
