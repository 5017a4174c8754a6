//! nForce device lifecycle.
//!
//! `probe` → `initialize` → (`poll` | `transmit`)* → `disable`.
//! The device may be initialized again after `disable`.

use smoltcp::wire::{EthernetAddress, EthernetProtocol};

use crate::driver::traits::{NetworkDriver, RxError, TxError};
use crate::hw::{DmaRegion, RegisterInterface};
use crate::types::{is_valid_station, MacAddress};

use super::init::{self, ForcedethConfig, MacRegisters, ProbeError};
use super::mii::MiiBus;
use super::phy::{LinkOutcome, LinkState, PhyEngine};
use super::regs;
use super::ring::{split_rings, RingMemory, RX_RING_SIZE, TX_RING_SIZE};
use super::rx::{RxRefill, RxRing, RxStats};
use super::tx::{TxRing, TxStats};
use super::{lookup_device, DeviceInfo};

/// Packet counters of both rings.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct NicStats {
    /// Receive side.
    pub rx: RxStats,
    /// Transmit side.
    pub tx: TxStats,
}

/// An nForce Ethernet controller and everything the driver knows about it.
pub struct ForcedethNic<R: RegisterInterface> {
    regs: R,
    config: ForcedethConfig,
    info: &'static DeviceInfo,
    rx: RxRing<RX_RING_SIZE>,
    tx: TxRing<TX_RING_SIZE>,
    phy: PhyEngine,
    link: LinkState,
    link_up: bool,
    /// Interrupt mask template; never written, the driver polls.
    irq_mask: u32,
    in_shutdown: bool,
    initialized: bool,
    /// MAC registers as firmware left them.
    orig_mac: MacRegisters,
    mac: MacAddress,
    _rings: DmaRegion<RingMemory>,
}

impl<R: RegisterInterface> ForcedethNic<R> {
    /// Identify the controller and read its station address.
    ///
    /// Touches no register except the two MAC address registers (read only).
    pub fn probe(
        regs: R,
        vendor_id: u16,
        device_id: u16,
        rings: DmaRegion<RingMemory>,
        config: ForcedethConfig,
    ) -> Result<Self, ProbeError> {
        let info = lookup_device(vendor_id, device_id).ok_or(ProbeError::UnsupportedDevice {
            vendor: vendor_id,
            device: device_id,
        })?;

        let orig_mac = MacRegisters::read(&regs);
        let mac = orig_mac.station();
        if !is_valid_station(&mac) {
            log::error!("forcedeth: invalid MAC address {}", mac);
            return Err(ProbeError::InvalidMac(mac.0));
        }
        log::info!("forcedeth: {} ({:04x}), MAC {}", info.name, device_id, mac);

        let (rx, tx) = split_rings(&rings);
        let phy = PhyEngine::new(config.phy);

        Ok(Self {
            regs,
            info,
            rx: RxRing::new(rx),
            tx: TxRing::new(tx, info.tx_flags),
            phy,
            link: LinkState::default(),
            link_up: false,
            irq_mask: info.irq_mask,
            in_shutdown: false,
            initialized: false,
            orig_mac,
            mac,
            config,
            _rings: rings,
        })
    }

    /// Reset the controller, bring up the PHY and start the datapath.
    ///
    /// Never fails: a missing PHY or a dead link leaves the device running
    /// at 10/half, reported through the outcome.
    pub fn initialize(&mut self) -> LinkOutcome {
        let regs = &self.regs;
        let config = &self.config;

        // Phase 1
        init::erase_filters(regs);
        init::quiesce(regs);

        // Phase 2
        self.rx.reset();
        self.tx.reset();
        if let RxRefill::Saturated = self.rx.refill() {
            log::warn!("forcedeth: receive ring already armed");
        }
        regs.write32(regs::LINK_SPEED, 0);
        regs.write32(regs::TX_UNKNOWN, 0);
        init::txrx_reset(regs, config);
        regs.write32(regs::SETUP6, 0);
        self.in_shutdown = false;

        // Phase 3
        let station = MacRegisters::for_station(&self.mac);
        station.restore(regs);
        self.rx.install(regs);
        self.tx.install(regs);
        regs.write32(regs::RING_SIZES, init::ring_sizes());

        // Phase 4
        self.link = LinkState::default();
        self.link_up = false;
        init::setup_datapath(regs, &self.link, config);
        init::setup_misc(regs, &self.link);

        // Phase 5
        let bus = MiiBus::new(regs, config.mii);
        let phy_address = self.phy.scan(&bus).map(|id| id.addr);
        init::start_adapter(regs, phy_address);
        init::power_up(regs, config);

        // Phase 6
        init::mask_interrupts(regs);
        init::set_multicast(regs, &self.link, config);

        // Phase 7
        regs.write32(regs::MII_STATUS, regs::MIISTAT_MASK);
        let outcome = self.phy.negotiate(&bus, &mut self.link);
        init::start_tx(regs);

        self.link_up = outcome.is_up();
        self.initialized = true;
        if !self.link_up {
            log::warn!("forcedeth: no link during initialization, running at {}", self.link);
        }
        outcome
    }

    /// Fetch at most one received frame into `buffer`.
    ///
    /// Frames flagged bad by hardware are dropped and counted; they are not
    /// reported as errors.
    pub fn poll(&mut self, buffer: &mut [u8]) -> Result<Option<usize>, RxError> {
        if !self.is_running() {
            return Err(RxError::DeviceNotReady);
        }
        match self.rx.poll(buffer) {
            Err(RxError::FrameError { flags }) => {
                log::debug!("forcedeth: dropped bad frame, flags {:#06x}", flags);
                Ok(None)
            }
            other => other,
        }
    }

    /// Send `payload` to `dest` as one Ethernet II frame.
    ///
    /// Returns the on-wire length. Does not wait for completion.
    pub fn transmit(
        &mut self,
        dest: EthernetAddress,
        ethertype: EthernetProtocol,
        payload: &[u8],
    ) -> Result<usize, TxError> {
        if !self.is_running() {
            return Err(TxError::DeviceNotReady);
        }
        self.tx
            .enqueue(&self.regs, dest, self.mac, ethertype, payload)
    }

    /// Stop the datapath, mask interrupts and put the firmware's MAC back.
    pub fn disable(&mut self) {
        self.in_shutdown = true;
        init::stop_tx(&self.regs, &self.config);
        init::stop_rx(&self.regs, &self.config);

        self.regs.write32(regs::IRQ_MASK, 0);
        self.regs.flush();

        self.orig_mac.restore(&self.regs);
        self.initialized = false;
        self.link_up = false;
        log::info!("forcedeth: disabled");
    }

    /// Station address.
    pub fn mac(&self) -> MacAddress {
        self.mac
    }

    /// Programmed link.
    pub fn link(&self) -> &LinkState {
        &self.link
    }

    /// Controller identity.
    pub fn info(&self) -> &'static DeviceInfo {
        self.info
    }

    /// Interrupt mask template for this revision.
    pub fn irq_mask(&self) -> u32 {
        self.irq_mask
    }

    /// MAC registers captured at probe.
    pub fn original_mac_registers(&self) -> MacRegisters {
        self.orig_mac
    }

    /// Packet counters.
    pub fn stats(&self) -> NicStats {
        NicStats {
            rx: self.rx.stats(),
            tx: self.tx.stats(),
        }
    }

    /// Initialized and not shutting down.
    pub fn is_running(&self) -> bool {
        self.initialized && !self.in_shutdown
    }

    /// Register window.
    pub fn regs(&self) -> &R {
        &self.regs
    }

    #[cfg(test)]
    pub(crate) fn rx_ring_mut(&mut self) -> &mut RxRing<RX_RING_SIZE> {
        &mut self.rx
    }

    #[cfg(test)]
    pub(crate) fn tx_ring_mut(&mut self) -> &mut TxRing<TX_RING_SIZE> {
        &mut self.tx
    }
}

impl<R: RegisterInterface> NetworkDriver for ForcedethNic<R> {
    fn mac_address(&self) -> [u8; 6] {
        self.mac.0
    }

    fn can_transmit(&mut self) -> bool {
        self.is_running() && self.tx.can_transmit()
    }

    fn can_receive(&self) -> bool {
        self.is_running() && self.rx.has_packet()
    }

    fn transmit(&mut self, frame: &[u8]) -> Result<(), TxError> {
        if !self.is_running() {
            return Err(TxError::DeviceNotReady);
        }
        self.tx.enqueue_frame(&self.regs, frame).map(|_| ())
    }

    fn receive(&mut self, buffer: &mut [u8]) -> Result<Option<usize>, RxError> {
        self.poll(buffer)
    }

    fn refill_rx_queue(&mut self) {
        self.rx.refill();
    }

    fn collect_tx_completions(&mut self) {
        self.tx.reclaim();
    }

    fn link_up(&self) -> bool {
        self.link_up
    }
}
