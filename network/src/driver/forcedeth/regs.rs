//! nForce MAC register definitions.
//!
//! Register offsets and bit definitions for the nForce/nForce2/nForce3
//! integrated Ethernet controllers. Most of the "unknown setup" registers
//! come from reverse-engineered documentation; their values are magic and
//! must be written exactly as listed.

use bitflags::bitflags;

// ═══════════════════════════════════════════════════════════════════════════
// INTERRUPT REGISTERS
// ═══════════════════════════════════════════════════════════════════════════

/// Interrupt Status (write 1 to clear).
pub const IRQ_STATUS: u32 = 0x000;
/// Interrupt Mask.
pub const IRQ_MASK: u32 = 0x004;
/// Unknown setup register 6.
pub const SETUP6: u32 = 0x008;
/// NIC timer polling interval.
pub const POLLING_INTERVAL: u32 = 0x00C;

/// All interrupt status bits.
pub const IRQSTAT_MASK: u32 = 0x1FF;

/// RX interrupt.
pub const IRQ_RX: u32 = 0x0002;
/// RX out-of-buffers interrupt.
pub const IRQ_RX_NOBUF: u32 = 0x0004;
/// TX error interrupt.
pub const IRQ_TX_ERR: u32 = 0x0008;
/// TX completion interrupt (second variant).
pub const IRQ_TX2: u32 = 0x0010;
/// NIC timer interrupt.
pub const IRQ_TIMER: u32 = 0x0020;
/// Link change interrupt.
pub const IRQ_LINK: u32 = 0x0040;
/// TX completion interrupt (first variant).
pub const IRQ_TX1: u32 = 0x0100;
/// Interrupt template for first-generation silicon.
pub const IRQMASK_WANTED_1: u32 = 0x005F;
/// Interrupt template for nForce/nForce2/nForce3.
pub const IRQMASK_WANTED_2: u32 = 0x0147;

/// Value written to SETUP6 once the rings are live.
pub const SETUP6_VAL: u32 = 3;
/// Timer interval of roughly 10 ms.
pub const POLL_DEFAULT: u32 = 970;

// ═══════════════════════════════════════════════════════════════════════════
// TRANSMIT / RECEIVE CONTROL
// ═══════════════════════════════════════════════════════════════════════════

/// Misc control 1 (duplex / force bits).
pub const MISC1: u32 = 0x080;
/// Half duplex.
pub const MISC1_HD: u32 = 0x02;
/// Force bits, always set.
pub const MISC1_FORCE: u32 = 0x3B_0F3C;

/// Transmitter Control.
pub const TX_CONTROL: u32 = 0x084;
/// Transmitter start.
pub const TX_CONTROL_START: u32 = 0x01;
/// Transmitter Status.
pub const TX_STATUS: u32 = 0x088;
/// Transmitter busy.
pub const TX_STATUS_BUSY: u32 = 0x01;

/// Packet Filter Flags.
pub const PACKET_FILTER: u32 = 0x08C;
/// Bits that must always be set.
pub const PFF_ALWAYS: u32 = 0x7F_0008;
/// Promiscuous mode.
pub const PFF_PROMISC: u32 = 0x80;
/// Accept frames to the station address.
pub const PFF_MYADDR: u32 = 0x20;

/// Offload configuration.
pub const OFFLOAD_CONFIG: u32 = 0x090;
/// Offload value: receive buffer size (MTU + 64).
pub const OFFLOAD_NORMAL: u32 = 1564;

/// Receiver Control.
pub const RX_CONTROL: u32 = 0x094;
/// Receiver start.
pub const RX_CONTROL_START: u32 = 0x01;
/// Receiver Status.
pub const RX_STATUS: u32 = 0x098;
/// Receiver busy.
pub const RX_STATUS_BUSY: u32 = 0x01;

/// Backoff random seed.
pub const RANDOM_SEED: u32 = 0x09C;
/// Seed bits.
pub const RNDSEED_MASK: u32 = 0x00FF;
/// Force bits.
pub const RNDSEED_FORCE: u32 = 0x7F00;
/// Seed programmed at reset.
pub const RNDSEED_DEFAULT: u32 = RNDSEED_FORCE | (75_963_081 & RNDSEED_MASK);

/// Unknown setup register 1.
pub const SETUP1: u32 = 0x0A0;
/// SETUP1 value.
pub const SETUP1_VAL: u32 = 0x16_070F;
/// Unknown setup register 2.
pub const SETUP2: u32 = 0x0A4;
/// SETUP2 value.
pub const SETUP2_VAL: u32 = 0x16;

// ═══════════════════════════════════════════════════════════════════════════
// ADDRESS FILTERS
// ═══════════════════════════════════════════════════════════════════════════

/// Station address bytes 0-3.
pub const MAC_ADDR_A: u32 = 0x0A8;
/// Station address bytes 4-5.
pub const MAC_ADDR_B: u32 = 0x0AC;
/// Multicast address, low word.
pub const MULTICAST_ADDR_A: u32 = 0x0B0;
/// Force bit in the low multicast word.
pub const MCASTADDRA_FORCE: u32 = 0x01;
/// Multicast address, high word.
pub const MULTICAST_ADDR_B: u32 = 0x0B4;
/// Multicast mask, low word.
pub const MULTICAST_MASK_A: u32 = 0x0B8;
/// Multicast mask, high word.
pub const MULTICAST_MASK_B: u32 = 0x0BC;

// ═══════════════════════════════════════════════════════════════════════════
// PHY INTERFACE & RINGS
// ═══════════════════════════════════════════════════════════════════════════

/// PHY interface mode / resolved speed register.
pub const PHY_INTERFACE: u32 = 0x0C0;

/// TX ring base (bus address).
pub const TX_RING_ADDR: u32 = 0x100;
/// RX ring base (bus address).
pub const RX_RING_ADDR: u32 = 0x104;
/// Combined ring sizes (entries - 1).
pub const RING_SIZES: u32 = 0x108;
/// TX size shift within RING_SIZES.
pub const RINGSZ_TX_SHIFT: u32 = 0;
/// RX size shift within RING_SIZES.
pub const RINGSZ_RX_SHIFT: u32 = 16;

/// Unknown transmitter register, cleared around TX stop.
pub const TX_UNKNOWN: u32 = 0x10C;

/// Link speed register.
pub const LINK_SPEED: u32 = 0x110;
/// Force the programmed speed.
pub const LINKSPEED_FORCE: u32 = 0x1_0000;
/// Speed code for 10 Mb/s.
pub const LINKSPEED_10: u32 = 1000;
/// Speed code for 100 Mb/s.
pub const LINKSPEED_100: u32 = 100;
/// Speed code for 1000 Mb/s.
pub const LINKSPEED_1000: u32 = 50;
/// Speed code field.
pub const LINKSPEED_CODE_MASK: u32 = 0xFFF;

/// Unknown setup register 5.
pub const SETUP5: u32 = 0x130;
/// Ready handshake bit.
pub const SETUP5_BIT31: u32 = 1 << 31;
/// Unknown setup register 3.
pub const SETUP3: u32 = 0x13C;
/// SETUP3 value.
pub const SETUP3_VAL1: u32 = 0x20_0010;

/// TX/RX datapath control and doorbell.
pub const TXRX_CONTROL: u32 = 0x144;
/// Transmit doorbell.
pub const TXRXCTL_KICK: u32 = 0x0001;
/// Datapath enable handshake.
pub const TXRXCTL_BIT1: u32 = 0x0002;
/// "Not idle" companion bit.
pub const TXRXCTL_BIT2: u32 = 0x0004;
/// Idle.
pub const TXRXCTL_IDLE: u32 = 0x0008;
/// Datapath reset.
pub const TXRXCTL_RESET: u32 = 0x0010;

// ═══════════════════════════════════════════════════════════════════════════
// MII MANAGEMENT
// ═══════════════════════════════════════════════════════════════════════════

/// MII status (write 1 to clear).
pub const MII_STATUS: u32 = 0x180;
/// Last transaction failed.
pub const MIISTAT_ERROR: u32 = 0x0001;
/// Link change latched.
pub const MIISTAT_LINKCHANGE: u32 = 0x0008;
/// All MII status bits.
pub const MIISTAT_MASK: u32 = 0x000F;

/// Unknown setup register 4.
pub const SETUP4: u32 = 0x184;
/// SETUP4 value.
pub const SETUP4_VAL: u32 = 8;

/// Adapter control.
pub const ADAPTER_CONTROL: u32 = 0x188;
/// Start.
pub const ADAPTCTL_START: u32 = 0x02;
/// Link up.
pub const ADAPTCTL_LINKUP: u32 = 0x04;
/// PHY address field is valid.
pub const ADAPTCTL_PHYVALID: u32 = 0x4_0000;
/// Running.
pub const ADAPTCTL_RUNNING: u32 = 0x10_0000;
/// PHY address shift.
pub const ADAPTCTL_PHYSHIFT: u32 = 24;

/// MII clock configuration.
pub const MII_SPEED: u32 = 0x18C;
/// Clock enable.
pub const MIISPEED_BIT8: u32 = 1 << 8;
/// Clock divider.
pub const MIIDELAY: u32 = 5;

/// MII command register.
pub const MII_CONTROL: u32 = 0x190;
/// Transaction in progress.
pub const MIICTL_INUSE: u32 = 0x0_8000;
/// Write transaction.
pub const MIICTL_WRITE: u32 = 0x0_0400;
/// PHY address shift.
pub const MIICTL_ADDRSHIFT: u32 = 5;

/// MII data register.
pub const MII_DATA: u32 = 0x194;

// ═══════════════════════════════════════════════════════════════════════════
// POWER / WAKE
// ═══════════════════════════════════════════════════════════════════════════

/// Wake-up flags.
pub const WAKEUP_FLAGS: u32 = 0x200;
/// Wake-up flags value.
pub const WAKEUPFLAGS_VAL: u32 = 0x7770;

/// Power state.
pub const POWER_STATE: u32 = 0x26C;
/// Powered up.
pub const POWERSTATE_POWEREDUP: u32 = 0x8000;
/// Power state valid.
pub const POWERSTATE_VALID: u32 = 0x0100;

/// Size of the register window.
pub const REGISTER_WINDOW: u32 = 0x270;

// ═══════════════════════════════════════════════════════════════════════════
// PHY INTERFACE BITS
// ═══════════════════════════════════════════════════════════════════════════

bitflags! {
    /// Bits of the PHY interface register.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct PhyInterface: u32 {
        /// 100 Mb/s.
        const SPEED_100 = 0x1;
        /// 1000 Mb/s.
        const SPEED_1000 = 0x2;
        /// Half duplex.
        const HALF = 0x100;
        /// PHY attached over RGMII.
        const RGMII = 0x1000_0000;

        const _ = !0;
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// MII REGISTERS (generic)
// ═══════════════════════════════════════════════════════════════════════════

/// Basic Mode Control Register.
pub const MII_BMCR: u8 = 0x00;
/// Basic Mode Status Register.
pub const MII_BMSR: u8 = 0x01;
/// PHY Identifier 1.
pub const MII_PHYSID1: u8 = 0x02;
/// PHY Identifier 2.
pub const MII_PHYSID2: u8 = 0x03;
/// Auto-Negotiation Advertisement.
pub const MII_ADVERTISE: u8 = 0x04;
/// Link Partner Ability.
pub const MII_LPA: u8 = 0x05;
/// Silicon revision (vendor).
pub const MII_SREVISION: u8 = 0x16;
/// Reserved (vendor).
pub const MII_RESV1: u8 = 0x17;
/// Network interface config (vendor).
pub const MII_NCONFIG: u8 = 0x1C;

/// Highest PHY address on the management bus.
pub const MII_MAX_ADDR: u8 = 31;

// BMCR bits
/// Restart Auto-Negotiation.
pub const BMCR_ANRESTART: u16 = 0x0200;
/// Auto-Negotiation Enable.
pub const BMCR_ANENABLE: u16 = 0x1000;
/// Reset.
pub const BMCR_RESET: u16 = 0x8000;

// BMSR bits
/// Link Status (latched low).
pub const BMSR_LSTATUS: u16 = 0x0004;
/// Auto-Negotiation Complete.
pub const BMSR_ANEGCOMPLETE: u16 = 0x0020;

// ADVERTISE / LPA bits
/// 10BASE-T half duplex.
pub const ADVERTISE_10HALF: u16 = 0x0020;
/// 10BASE-T full duplex.
pub const ADVERTISE_10FULL: u16 = 0x0040;
/// 100BASE-TX half duplex.
pub const ADVERTISE_100HALF: u16 = 0x0080;
/// 100BASE-TX full duplex.
pub const ADVERTISE_100FULL: u16 = 0x0100;
/// Symmetric pause.
pub const ADVERTISE_PAUSE_CAP: u16 = 0x0400;
/// Asymmetric pause.
pub const ADVERTISE_PAUSE_ASYM: u16 = 0x0800;
/// All four 10/100 capability bits.
pub const ADVERTISE_ALL: u16 =
    ADVERTISE_10HALF | ADVERTISE_10FULL | ADVERTISE_100HALF | ADVERTISE_100FULL;

// PHY identity decoding
/// PHYSID1 bits that carry the OUI.
pub const PHYID1_OUI_MASK: u16 = 0x03FF;
/// PHYSID1 OUI shift (left).
pub const PHYID1_OUI_SHIFT: u32 = 6;
/// PHYSID2 bits that carry the OUI.
pub const PHYID2_OUI_MASK: u16 = 0xFC00;
/// PHYSID2 OUI shift (right).
pub const PHYID2_OUI_SHIFT: u32 = 10;

/// Marvell PHY OUI.
pub const PHY_OUI_MARVELL: u32 = 0x5043;
/// Cicada PHY OUI.
pub const PHY_OUI_CICADA: u32 = 0x03F1;

// Cicada init bits
/// RESV1 bits cleared on Cicada RGMII.
pub const PHY_INIT1: u16 = 0xF000;
/// RESV1 bits cleared on Cicada RGMII.
pub const PHY_INIT2: u16 = 0x0E00;
/// RESV1 bits set on Cicada RGMII.
pub const PHY_INIT3: u16 = 0x1000;
/// RESV1 bits set on Cicada RGMII.
pub const PHY_INIT4: u16 = 0x0200;
/// NCONFIG bit set on Cicada RGMII.
pub const PHY_INIT5: u16 = 0x0004;
/// SREVISION bit set on every Cicada.
pub const PHY_INIT6: u16 = 0x2000;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_register_offsets() {
        assert_eq!(MAC_ADDR_A, 0xA8);
        assert_eq!(RING_SIZES, 0x108);
        assert_eq!(TXRX_CONTROL, 0x144);
        assert_eq!(MII_CONTROL, 0x190);
        assert!(POWER_STATE < REGISTER_WINDOW);
    }

    #[test]
    fn test_advertise_all_is_four_bits() {
        assert_eq!(ADVERTISE_ALL.count_ones(), 4);
        assert_eq!(ADVERTISE_ALL, 0x01E0);
    }
}
