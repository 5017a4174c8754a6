//! Whole-device lock for multi-threaded hosts.
//!
//! The driver itself is single-owner. Hosts that poll from more than one
//! context wrap the device in [`SharedNic`]; one spin lock covers every
//! operation, so descriptor and register sequences are never interleaved.

use spin::Mutex;

use crate::driver::forcedeth::{ForcedethNic, LinkOutcome};
use crate::driver::traits::{RxError, TxError};
use crate::hw::RegisterInterface;
use crate::types::MacAddress;

use smoltcp::wire::{EthernetAddress, EthernetProtocol};

/// A forcedeth device behind one spin lock.
pub struct SharedNic<R: RegisterInterface> {
    inner: Mutex<ForcedethNic<R>>,
}

impl<R: RegisterInterface> SharedNic<R> {
    /// Take ownership of a probed device.
    pub fn new(nic: ForcedethNic<R>) -> Self {
        Self {
            inner: Mutex::new(nic),
        }
    }

    /// Run `f` with exclusive access to the device.
    pub fn with<T>(&self, f: impl FnOnce(&mut ForcedethNic<R>) -> T) -> T {
        let mut nic = self.inner.lock();
        f(&mut nic)
    }

    /// See [`ForcedethNic::initialize`].
    pub fn initialize(&self) -> LinkOutcome {
        self.with(|nic| nic.initialize())
    }

    /// See [`ForcedethNic::poll`].
    pub fn poll(&self, buffer: &mut [u8]) -> Result<Option<usize>, RxError> {
        self.with(|nic| nic.poll(buffer))
    }

    /// See [`ForcedethNic::transmit`].
    pub fn transmit(
        &self,
        dest: EthernetAddress,
        ethertype: EthernetProtocol,
        payload: &[u8],
    ) -> Result<usize, TxError> {
        self.with(|nic| nic.transmit(dest, ethertype, payload))
    }

    /// See [`ForcedethNic::disable`].
    pub fn disable(&self) {
        self.with(|nic| nic.disable())
    }

    /// Station address.
    pub fn mac(&self) -> MacAddress {
        self.with(|nic| nic.mac())
    }

    /// Give the device back.
    pub fn into_inner(self) -> ForcedethNic<R> {
        self.inner.into_inner()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::driver::forcedeth::ForcedethConfig;
    use crate::testing::{leak_ring_memory, FakeNic, FakePhy};

    #[test]
    fn test_shared_nic_round_trip() {
        let nic = FakeNic::with_station([0x00, 0x04, 0x4B, 1, 2, 3], 1, FakePhy::generic());
        let (_mem, region) = leak_ring_memory();
        let dev = ForcedethNic::probe(&nic, 0x10DE, 0x01C3, region, ForcedethConfig::default())
            .unwrap();
        let shared = SharedNic::new(dev);

        assert!(shared.initialize().is_up());
        assert_eq!(
            shared.transmit(EthernetAddress::BROADCAST, EthernetProtocol::Ipv4, &[0; 46]),
            Ok(60)
        );
        let mut buf = [0u8; 1600];
        assert_eq!(shared.poll(&mut buf), Ok(None));
        assert_eq!(shared.with(|n| n.stats().tx.queued), 1);

        shared.disable();
        assert!(!shared.into_inner().is_running());
    }
}
