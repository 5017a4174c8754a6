//! MII management bus.
//!
//! One transaction at a time through MII_CONTROL / MII_DATA:
//! clear status, release a stale transaction, issue the command, wait for
//! INUSE to drop, and for reads check the error bit before taking the data.

use core::fmt;

use crate::hw::RegisterInterface;
use crate::time::RetryPolicy;

use super::regs;

/// MII transaction errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MiiError {
    /// The transaction never completed.
    Timeout {
        /// PHY address.
        phy: u8,
        /// PHY register.
        reg: u8,
    },
    /// The adapter flagged the read as failed (usually: no PHY there).
    Status {
        /// PHY address.
        phy: u8,
        /// PHY register.
        reg: u8,
    },
}

impl fmt::Display for MiiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MiiError::Timeout { phy, reg } => {
                write!(f, "MII transaction timed out (phy {}, reg {:#04x})", phy, reg)
            }
            MiiError::Status { phy, reg } => {
                write!(f, "MII read failed (phy {}, reg {:#04x})", phy, reg)
            }
        }
    }
}

/// Delays for one MII transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MiiTiming {
    /// Settle time after releasing a stale transaction.
    pub busy_release_us: u32,
    /// Wait for INUSE to clear.
    pub completion: RetryPolicy,
}

impl Default for MiiTiming {
    fn default() -> Self {
        Self {
            busy_release_us: 50,
            completion: RetryPolicy::new(10, 1000),
        }
    }
}

/// Borrowed access to the management bus.
pub struct MiiBus<'a, R: RegisterInterface + ?Sized> {
    regs: &'a R,
    timing: MiiTiming,
}

impl<'a, R: RegisterInterface + ?Sized> MiiBus<'a, R> {
    /// Wrap a register window.
    pub fn new(regs: &'a R, timing: MiiTiming) -> Self {
        Self { regs, timing }
    }

    /// Register window behind the bus.
    pub fn regs(&self) -> &'a R {
        self.regs
    }

    /// Read a PHY register.
    pub fn read(&self, phy: u8, reg: u8) -> Result<u16, MiiError> {
        self.issue(phy, reg, None)?;
        if self.regs.read32(regs::MII_STATUS) & regs::MIISTAT_ERROR != 0 {
            return Err(MiiError::Status { phy, reg });
        }
        let value = (self.regs.read32(regs::MII_DATA) & 0xFFFF) as u16;
        #[cfg(feature = "serial_debug")]
        log::trace!("mii: read phy {} reg {:#04x} = {:#06x}", phy, reg, value);
        Ok(value)
    }

    /// Write a PHY register.
    pub fn write(&self, phy: u8, reg: u8, value: u16) -> Result<(), MiiError> {
        #[cfg(feature = "serial_debug")]
        log::trace!("mii: write phy {} reg {:#04x} = {:#06x}", phy, reg, value);
        self.issue(phy, reg, Some(value))
    }

    /// Read, clear `clear`, set `set`, write back.
    ///
    /// Returns the value written.
    pub fn modify(&self, phy: u8, reg: u8, clear: u16, set: u16) -> Result<u16, MiiError> {
        let value = (self.read(phy, reg)? & !clear) | set;
        self.write(phy, reg, value)?;
        Ok(value)
    }

    fn issue(&self, phy: u8, reg: u8, data: Option<u16>) -> Result<(), MiiError> {
        let regs = self.regs;

        regs.write32(regs::MII_STATUS, regs::MIISTAT_MASK);

        if regs.read32(regs::MII_CONTROL) & regs::MIICTL_INUSE != 0 {
            regs.write32(regs::MII_CONTROL, regs::MIICTL_INUSE);
            regs.delay_us(self.timing.busy_release_us);
        }

        let mut command = ((phy as u32 & 0x1F) << regs::MIICTL_ADDRSHIFT) | (reg as u32 & 0x1F);
        if let Some(value) = data {
            regs.write32(regs::MII_DATA, value as u32);
            command |= regs::MIICTL_WRITE;
        }
        regs.write32(regs::MII_CONTROL, command);

        self.timing
            .completion
            .wait_register(regs, regs::MII_CONTROL, regs::MIICTL_INUSE, 0)
            .map_err(|_| MiiError::Timeout { phy, reg })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{FakeNic, FakePhy};

    #[test]
    fn test_read_present_phy() {
        let nic = FakeNic::new();
        nic.attach_phy(1, FakePhy::generic());
        let bus = MiiBus::new(&nic, MiiTiming::default());

        assert_eq!(bus.read(1, regs::MII_PHYSID1), Ok(0x0141));
        assert_eq!(nic.writes_to(regs::MII_CONTROL), vec![(1 << 5) | 2]);
    }

    #[test]
    fn test_read_absent_phy_is_status_error() {
        let nic = FakeNic::new();
        let bus = MiiBus::new(&nic, MiiTiming::default());
        assert_eq!(
            bus.read(7, regs::MII_BMSR),
            Err(MiiError::Status { phy: 7, reg: 1 })
        );
    }

    #[test]
    fn test_write_sets_data_then_command() {
        let nic = FakeNic::new();
        nic.attach_phy(3, FakePhy::generic());
        let bus = MiiBus::new(&nic, MiiTiming::default());

        bus.write(3, regs::MII_ADVERTISE, 0x05E1).unwrap();

        let writes = nic.writes();
        let data_at = writes.iter().position(|w| *w == (regs::MII_DATA, 0x05E1)).unwrap();
        let cmd_at = writes
            .iter()
            .position(|w| *w == (regs::MII_CONTROL, regs::MIICTL_WRITE | (3 << 5) | 4))
            .unwrap();
        assert!(data_at < cmd_at);
        assert_eq!(nic.phy(3).unwrap().regs[4], 0x05E1);
    }

    #[test]
    fn test_stale_transaction_released() {
        let nic = FakeNic::new();
        nic.attach_phy(1, FakePhy::generic());
        nic.set_reg(regs::MII_CONTROL, regs::MIICTL_INUSE);
        let bus = MiiBus::new(&nic, MiiTiming::default());

        assert!(bus.read(1, regs::MII_BMSR).is_ok());
        assert_eq!(nic.writes_to(regs::MII_CONTROL)[0], regs::MIICTL_INUSE);
        assert_eq!(nic.total_delay_us(), 50);
    }

    #[test]
    fn test_read_timeout_is_bounded() {
        let nic = FakeNic::new();
        let mut phy = FakePhy::generic();
        phy.hang_read = Some(regs::MII_BMSR);
        nic.attach_phy(1, phy);
        let timing = MiiTiming::default();
        let bus = MiiBus::new(&nic, timing);

        assert_eq!(
            bus.read(1, regs::MII_BMSR),
            Err(MiiError::Timeout { phy: 1, reg: 1 })
        );
        let interval = timing.completion.interval_us as u64;
        assert_eq!(
            nic.total_delay_us(),
            (timing.completion.max_attempts as u64 - 1) * interval
        );
        assert_ne!(nic.reg(regs::MII_CONTROL) & regs::MIICTL_INUSE, 0);
    }

    #[test]
    fn test_hung_transaction_released_by_next_one() {
        let nic = FakeNic::new();
        let mut phy = FakePhy::generic();
        phy.hang_write = Some(regs::MII_ADVERTISE);
        nic.attach_phy(1, phy);
        let bus = MiiBus::new(&nic, MiiTiming::default());

        assert!(matches!(
            bus.write(1, regs::MII_ADVERTISE, 0x01E1),
            Err(MiiError::Timeout { .. })
        ));
        assert_eq!(bus.read(1, regs::MII_PHYSID1), Ok(0x0141));
    }

    #[test]
    fn test_modify_preserves_other_bits() {
        let nic = FakeNic::new();
        nic.attach_phy(1, FakePhy::generic());
        nic.set_phy_reg(1, regs::MII_RESV1, 0xFFFF);
        let bus = MiiBus::new(&nic, MiiTiming::default());

        let written = bus.modify(1, regs::MII_RESV1, 0xF000, 0x1000).unwrap();
        assert_eq!(written, 0x1FFF);
        assert_eq!(nic.phy(1).unwrap().regs[regs::MII_RESV1 as usize], 0x1FFF);
    }
}
