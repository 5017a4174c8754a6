//! smoltcp Device adapter for the NetworkDriver trait.
//!
//! Bridges our NetworkDriver abstraction to smoltcp's Device trait.
//! Uses fixed-size buffers, no heap allocation in the packet path.

use smoltcp::phy::{Device, DeviceCapabilities, Medium};
use smoltcp::time::Instant;

use crate::driver::traits::NetworkDriver;
use crate::types::ETH_FRAME_MAX;

/// Token buffer size; covers a full frame with room to spare.
const TOKEN_BUFFER: usize = 2048;

/// Adapter bridging NetworkDriver to smoltcp Device trait.
pub struct SmoltcpAdapter<'a, D: NetworkDriver> {
    driver: &'a mut D,
    rx_buffer: [u8; TOKEN_BUFFER],
    rx_len: usize,
    tx_count: u32,
    rx_count: u32,
}

impl<'a, D: NetworkDriver> SmoltcpAdapter<'a, D> {
    /// Create a new adapter wrapping a network driver.
    pub fn new(driver: &'a mut D) -> Self {
        Self {
            driver,
            rx_buffer: [0u8; TOKEN_BUFFER],
            rx_len: 0,
            tx_count: 0,
            rx_count: 0,
        }
    }

    /// Poll hardware for one received frame.
    pub fn poll_receive(&mut self) {
        if self.rx_len == 0 {
            match self.driver.receive(&mut self.rx_buffer) {
                Ok(Some(len)) => {
                    self.rx_len = len;
                    self.rx_count = self.rx_count.wrapping_add(1);
                }
                Ok(None) => {}
                Err(e) => log::debug!("adapter: receive failed: {}", e),
            }
        }
    }

    /// Refill RX descriptor queue.
    pub fn refill_rx(&mut self) {
        self.driver.refill_rx_queue();
    }

    /// Collect TX completions.
    pub fn collect_tx(&mut self) {
        self.driver.collect_tx_completions();
    }

    /// Get MAC address.
    pub fn mac_address(&self) -> [u8; 6] {
        self.driver.mac_address()
    }

    /// Frames handed to smoltcp.
    pub fn rx_count(&self) -> u32 {
        self.rx_count
    }

    /// Frames smoltcp asked to send.
    pub fn tx_count(&self) -> u32 {
        self.tx_count
    }

    /// Check if PHY link is up.
    pub fn driver_link_up(&self) -> bool {
        self.driver.link_up()
    }
}

/// RX token, fixed-size buffer.
pub struct RxToken {
    buffer: [u8; TOKEN_BUFFER],
    len: usize,
}

impl smoltcp::phy::RxToken for RxToken {
    fn consume<R, F>(mut self, f: F) -> R
    where
        F: FnOnce(&mut [u8]) -> R,
    {
        f(&mut self.buffer[..self.len])
    }
}

/// TX token, writes directly via the driver.
pub struct TxToken<'a, D: NetworkDriver> {
    driver: &'a mut D,
    tx_count: &'a mut u32,
}

impl<'a, D: NetworkDriver> smoltcp::phy::TxToken for TxToken<'a, D> {
    fn consume<R, F>(self, len: usize, f: F) -> R
    where
        F: FnOnce(&mut [u8]) -> R,
    {
        let mut buffer = [0u8; TOKEN_BUFFER];
        let len = len.min(TOKEN_BUFFER);

        let result = f(&mut buffer[..len]);

        // Fire-and-forget transmit
        match self.driver.transmit(&buffer[..len]) {
            Ok(()) => *self.tx_count = self.tx_count.wrapping_add(1),
            Err(e) => log::debug!("adapter: transmit failed: {}", e),
        }

        result
    }
}

impl<'a, D: NetworkDriver> Device for SmoltcpAdapter<'a, D> {
    type RxToken<'b> = RxToken where Self: 'b;
    type TxToken<'b> = TxToken<'b, D> where Self: 'b;

    fn receive(&mut self, _timestamp: Instant) -> Option<(Self::RxToken<'_>, Self::TxToken<'_>)> {
        self.poll_receive();

        if self.rx_len == 0 {
            return None;
        }

        let mut buffer = [0u8; TOKEN_BUFFER];
        let len = self.rx_len.min(TOKEN_BUFFER);
        buffer[..len].copy_from_slice(&self.rx_buffer[..len]);
        self.rx_len = 0;

        Some((
            RxToken { buffer, len },
            TxToken {
                driver: &mut *self.driver,
                tx_count: &mut self.tx_count,
            },
        ))
    }

    fn transmit(&mut self, _timestamp: Instant) -> Option<Self::TxToken<'_>> {
        if self.driver.can_transmit() {
            Some(TxToken {
                driver: &mut *self.driver,
                tx_count: &mut self.tx_count,
            })
        } else {
            None
        }
    }

    fn capabilities(&self) -> DeviceCapabilities {
        let mut caps = DeviceCapabilities::default();
        caps.medium = Medium::Ethernet;
        caps.max_transmission_unit = ETH_FRAME_MAX;
        caps.max_burst_size = Some(1);
        caps
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::driver::forcedeth::{ForcedethConfig, ForcedethNic};
    use crate::driver::forcedeth::rx::RxFlags;
    use crate::testing::{leak_ring_memory, FakeNic, FakePhy};
    use smoltcp::phy::{RxToken as _, TxToken as _};

    const MAC: [u8; 6] = [0x00, 0x04, 0x4B, 0xAA, 0xBB, 0xCC];

    fn device(nic: &FakeNic) -> ForcedethNic<&FakeNic> {
        let (_mem, region) = leak_ring_memory();
        let mut dev =
            ForcedethNic::probe(nic, 0x10DE, 0x01C3, region, ForcedethConfig::default()).unwrap();
        dev.initialize();
        dev
    }

    #[test]
    fn test_capabilities() {
        let nic = FakeNic::with_station(MAC, 1, FakePhy::generic());
        let mut dev = device(&nic);
        let adapter = SmoltcpAdapter::new(&mut dev);
        let caps = adapter.capabilities();
        assert_eq!(caps.medium, Medium::Ethernet);
        assert_eq!(caps.max_transmission_unit, 1514);
        assert_eq!(adapter.mac_address(), MAC);
    }

    #[test]
    fn test_transmit_token_sends_frame() {
        let nic = FakeNic::with_station(MAC, 1, FakePhy::generic());
        let mut dev = device(&nic);
        let mut adapter = SmoltcpAdapter::new(&mut dev);

        let token = adapter.transmit(Instant::from_millis(0)).unwrap();
        token.consume(42, |buf| buf.fill(0xEE));

        assert_eq!(adapter.tx_count(), 1);
        assert_eq!(nic.doorbells(), 1);
    }

    #[test]
    fn test_receive_token_yields_frame() {
        let nic = FakeNic::with_station(MAC, 1, FakePhy::generic());
        let mut dev = device(&nic);
        dev.rx_ring_mut()
            .ring_mut()
            .simulate_hardware(0, &[0x42; 64], 64, RxFlags::DESCRIPTOR_VALID.bits());

        let mut adapter = SmoltcpAdapter::new(&mut dev);
        let (rx, tx) = adapter.receive(Instant::from_millis(0)).unwrap();
        let len = rx.consume(|buf| {
            assert!(buf.iter().all(|b| *b == 0x42));
            buf.len()
        });
        drop(tx);
        assert_eq!(len, 64);
        assert_eq!(adapter.rx_count(), 1);
        assert!(adapter.receive(Instant::from_millis(1)).is_none());
    }
}
