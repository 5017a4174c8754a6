//! Simulated adapter for unit tests.
//!
//! [`FakeNic`] is a register file with just enough behaviour to drive the
//! real code paths: write-one-to-clear status registers, an MII management
//! bus with PHYs hanging off it, and a delay counter instead of a clock.

use std::boxed::Box;
use std::cell::{Cell, RefCell};
use std::vec::Vec;

use crate::driver::forcedeth::regs;
use crate::driver::forcedeth::ring::RingMemory;
use crate::hw::{DmaRegion, RegisterInterface};

/// Bus address the leaked ring memory pretends to live at.
pub const TEST_RING_BUS: u32 = 0x0010_0000;

/// Allocate ring memory that outlives the test and wrap it in a region.
///
/// The raw pointer lets a test play the DMA engine.
pub fn leak_ring_memory() -> (*mut RingMemory, DmaRegion<RingMemory>) {
    let mem = Box::into_raw(Box::new(RingMemory::new()));
    let region = unsafe { DmaRegion::new(mem, TEST_RING_BUS) }.expect("test region");
    (mem, region)
}

// ═══════════════════════════════════════════════════════════════════════════
// PHY MODEL
// ═══════════════════════════════════════════════════════════════════════════

/// One PHY on the simulated management bus.
#[derive(Debug, Clone)]
pub struct FakePhy {
    /// Register contents.
    pub regs: [u16; 32],
    /// BMCR reads before a requested reset self-clears.
    pub reset_latency: u32,
    /// Reset never completes.
    pub stuck_in_reset: bool,
    /// Reads of each register.
    pub reads: [u32; 32],
    /// Writes to each register.
    pub writes: [u32; 32],
    /// Reads of this register never complete (INUSE stays set).
    pub hang_read: Option<u8>,
    /// Writes to this register never complete (INUSE stays set).
    pub hang_write: Option<u8>,
    /// Reads of this register set the MII error bit.
    pub fail_read: Option<u8>,
    reset_pending: u32,
}

impl FakePhy {
    /// A PHY with the given identity and link partner, link up and
    /// autonegotiation complete.
    pub fn new(id1: u16, id2: u16, lpa: u16) -> Self {
        let mut regs = [0u16; 32];
        regs[regs::MII_BMSR as usize] = regs::BMSR_LSTATUS | regs::BMSR_ANEGCOMPLETE | 0x7809;
        regs[regs::MII_PHYSID1 as usize] = id1;
        regs[regs::MII_PHYSID2 as usize] = id2;
        regs[regs::MII_ADVERTISE as usize] = 0x0001;
        regs[regs::MII_LPA as usize] = lpa;
        Self {
            regs,
            reset_latency: 2,
            stuck_in_reset: false,
            reads: [0; 32],
            writes: [0; 32],
            hang_read: None,
            hang_write: None,
            fail_read: None,
            reset_pending: 0,
        }
    }

    /// A Marvell PHY (no quirks) whose partner offers everything.
    pub fn generic() -> Self {
        Self::new(0x0141, 0x0C20, regs::ADVERTISE_ALL | 0x0001)
    }

    /// A Cicada PHY (OUI 0x03F1).
    pub fn cicada(lpa: u16) -> Self {
        // 0x03F1 = (0x000F << 6) | 0x31; id2 carries the low six OUI bits on top.
        Self::new(0x000F, 0xC401, lpa)
    }

    fn hangs(&self, reg: u8, write: bool) -> bool {
        let target = if write { self.hang_write } else { self.hang_read };
        target == Some(reg & 0x1F)
    }

    fn read(&mut self, reg: u8) -> u16 {
        let reg = reg as usize & 0x1F;
        self.reads[reg] += 1;
        if reg == regs::MII_BMCR as usize && self.regs[reg] & regs::BMCR_RESET != 0 && !self.stuck_in_reset {
            if self.reset_pending == 0 {
                self.regs[reg] &= !regs::BMCR_RESET;
            } else {
                self.reset_pending -= 1;
            }
        }
        self.regs[reg]
    }

    fn write(&mut self, reg: u8, value: u16) {
        let reg = reg as usize & 0x1F;
        self.writes[reg] += 1;
        self.regs[reg] = value;
        if reg == regs::MII_BMCR as usize && value & regs::BMCR_RESET != 0 {
            self.reset_pending = self.reset_latency;
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// ADAPTER MODEL
// ═══════════════════════════════════════════════════════════════════════════

const WINDOW_WORDS: usize = (regs::REGISTER_WINDOW as usize) / 4;

/// Simulated nForce register window.
pub struct FakeNic {
    regs: RefCell<[u32; WINDOW_WORDS]>,
    phys: RefCell<[Option<FakePhy>; 32]>,
    writes: RefCell<Vec<(u32, u32)>>,
    delay_us: Cell<u64>,
    tx_busy: Cell<bool>,
    rx_busy: Cell<bool>,
}

impl FakeNic {
    /// Empty register file, no PHYs, setup handshake ready.
    pub fn new() -> Self {
        let nic = Self {
            regs: RefCell::new([0; WINDOW_WORDS]),
            phys: RefCell::new(Default::default()),
            writes: RefCell::new(Vec::new()),
            delay_us: Cell::new(0),
            tx_busy: Cell::new(false),
            rx_busy: Cell::new(false),
        };
        nic.set_reg(regs::SETUP5, regs::SETUP5_BIT31);
        nic
    }

    /// Adapter with a burned-in station address and one PHY.
    pub fn with_station(mac: [u8; 6], phy_addr: u8, phy: FakePhy) -> Self {
        let nic = Self::new();
        nic.set_station(mac);
        nic.attach_phy(phy_addr, phy);
        nic
    }

    /// Store `mac` in the address registers the way the BIOS leaves it.
    pub fn set_station(&self, mac: [u8; 6]) {
        let a = u32::from_be_bytes([mac[2], mac[3], mac[4], mac[5]]);
        let b = u32::from_be_bytes([0, 0, mac[0], mac[1]]);
        self.set_reg(regs::MAC_ADDR_A, a);
        self.set_reg(regs::MAC_ADDR_B, b);
    }

    /// Plug a PHY into the management bus.
    pub fn attach_phy(&self, addr: u8, phy: FakePhy) {
        self.phys.borrow_mut()[addr as usize & 0x1F] = Some(phy);
    }

    /// Inspect a PHY.
    pub fn phy(&self, addr: u8) -> Option<FakePhy> {
        self.phys.borrow()[addr as usize & 0x1F].clone()
    }

    /// Change a PHY register behind the driver's back.
    pub fn set_phy_reg(&self, addr: u8, reg: u8, value: u16) {
        if let Some(phy) = self.phys.borrow_mut()[addr as usize & 0x1F].as_mut() {
            phy.regs[reg as usize & 0x1F] = value;
        }
    }

    /// Set a register without logging a write.
    pub fn set_reg(&self, offset: u32, value: u32) {
        self.regs.borrow_mut()[(offset / 4) as usize] = value;
    }

    /// Raw register contents.
    pub fn reg(&self, offset: u32) -> u32 {
        self.regs.borrow()[(offset / 4) as usize]
    }

    /// Keep the transmitter or receiver busy forever.
    pub fn set_busy(&self, tx: bool, rx: bool) {
        self.tx_busy.set(tx);
        self.rx_busy.set(rx);
    }

    /// Every write so far, in order.
    pub fn writes(&self) -> Vec<(u32, u32)> {
        self.writes.borrow().clone()
    }

    /// Values written to one register, in order.
    pub fn writes_to(&self, offset: u32) -> Vec<u32> {
        self.writes
            .borrow()
            .iter()
            .filter(|(o, _)| *o == offset)
            .map(|(_, v)| *v)
            .collect()
    }

    /// Number of transmit doorbell rings.
    pub fn doorbells(&self) -> usize {
        self.writes_to(regs::TXRX_CONTROL)
            .iter()
            .filter(|v| **v & regs::TXRXCTL_KICK != 0)
            .count()
    }

    /// Forget the write log.
    pub fn clear_writes(&self) {
        self.writes.borrow_mut().clear();
    }

    /// Microseconds spent in `delay_us`.
    pub fn total_delay_us(&self) -> u64 {
        self.delay_us.get()
    }

    fn mii_command(&self, command: u32) {
        let addr = ((command >> regs::MIICTL_ADDRSHIFT) & 0x1F) as usize;
        let reg = (command & 0x1F) as u8;
        let write = command & regs::MIICTL_WRITE != 0;
        let mut phys = self.phys.borrow_mut();
        match phys[addr].as_mut() {
            Some(phy) if phy.hangs(reg, write) => {
                // Never completes; the next transaction has to release it.
                self.set_reg(regs::MII_CONTROL, command | regs::MIICTL_INUSE);
                return;
            }
            Some(phy) if phy.fail_read == Some(reg) && !write => {
                phy.reads[reg as usize] += 1;
                let status = self.reg(regs::MII_STATUS);
                self.set_reg(regs::MII_STATUS, status | regs::MIISTAT_ERROR);
            }
            Some(phy) if write => {
                phy.write(reg, self.reg(regs::MII_DATA) as u16);
            }
            Some(phy) => {
                let value = phy.read(reg);
                self.set_reg(regs::MII_DATA, value as u32);
            }
            None => {
                self.set_reg(regs::MII_DATA, 0xFFFF);
                let status = self.reg(regs::MII_STATUS);
                self.set_reg(regs::MII_STATUS, status | regs::MIISTAT_ERROR);
            }
        }
        // Transaction completes instantly.
        self.set_reg(regs::MII_CONTROL, command & !regs::MIICTL_INUSE);
    }
}

impl Default for FakeNic {
    fn default() -> Self {
        Self::new()
    }
}

impl RegisterInterface for FakeNic {
    fn read32(&self, offset: u32) -> u32 {
        match offset {
            regs::TX_STATUS => self.reg(offset) | self.tx_busy.get() as u32,
            regs::RX_STATUS => self.reg(offset) | self.rx_busy.get() as u32,
            _ => self.reg(offset),
        }
    }

    fn write32(&self, offset: u32, value: u32) {
        self.writes.borrow_mut().push((offset, value));
        match offset {
            regs::IRQ_STATUS | regs::MII_STATUS => {
                let current = self.reg(offset);
                self.set_reg(offset, current & !value);
            }
            regs::MII_CONTROL if value & regs::MIICTL_INUSE != 0 => {
                // Writing INUSE releases a stale transaction.
                self.set_reg(offset, 0);
            }
            regs::MII_CONTROL => self.mii_command(value),
            _ => self.set_reg(offset, value),
        }
    }

    fn delay_us(&self, us: u32) {
        self.delay_us.set(self.delay_us.get() + us as u64);
    }
}
