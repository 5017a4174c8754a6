//! nForce TX path.
//!
//! # Fire-and-Forget Semantics
//! A frame is copied into the slot's buffer, the descriptor is handed to
//! hardware and the doorbell is rung. Hardware clears VALID when it is done;
//! completed slots are reclaimed lazily, before the next enqueue or on
//! request.

use bitflags::bitflags;
use smoltcp::wire::{EthernetAddress, EthernetFrame, EthernetProtocol};

use crate::driver::traits::TxError;
use crate::hw::{rmb, RegisterInterface};
use crate::types::{ETH_HLEN, ETH_ZLEN};

use super::regs;
use super::ring::{DescRing, BUFFER_SIZE, DEFAULT_MTU};

bitflags! {
    /// Transmit descriptor flags.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct TxFlags: u16 {
        /// Last descriptor of the frame.
        const LAST_PACKET = 1 << 0;
        const RETRY_ERROR = 1 << 3;
        /// Last descriptor of the frame, nForce2/3 encoding.
        const LAST_PACKET1 = 1 << 8;
        const DEFERRED = 1 << 10;
        const CARRIER_LOST = 1 << 11;
        const LATE_COLLISION = 1 << 12;
        const UNDERFLOW = 1 << 13;
        /// Summary error bit.
        const ERROR = 1 << 14;
        /// Owned by hardware.
        const VALID = 1 << 15;
    }
}

/// Largest frame the ring accepts, without FCS.
pub const MAX_FRAME_SIZE: usize = ETH_HLEN + DEFAULT_MTU;

/// Transmit counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TxStats {
    /// Frames handed to hardware.
    pub queued: u64,
    /// Bytes handed to hardware, padding included.
    pub bytes: u64,
    /// Frames hardware finished cleanly.
    pub completed: u64,
    /// Frames hardware finished with an error.
    pub errors: u64,
}

/// Transmit ring.
pub struct TxRing<const N: usize> {
    ring: DescRing<N>,
    /// Flags written to every published descriptor.
    template: TxFlags,
    stats: TxStats,
}

impl<const N: usize> TxRing<N> {
    /// Wrap a descriptor ring with the device's flag template.
    pub fn new(ring: DescRing<N>, template: TxFlags) -> Self {
        Self {
            ring,
            template,
            stats: TxStats::default(),
        }
    }

    /// Take every descriptor back and zero the counters.
    ///
    /// Only valid while the transmitter is stopped.
    pub fn reset(&mut self) {
        self.ring.clear();
    }

    /// Program the ring base address.
    pub fn install<R: RegisterInterface + ?Sized>(&self, regs: &R) {
        regs.write32(regs::TX_RING_ADDR, self.ring.base_bus());
    }

    /// Reclaim descriptors hardware has finished with.
    ///
    /// Returns the number of slots returned to software.
    pub fn reclaim(&mut self) -> usize {
        let mut reclaimed = 0;
        while let Some(slot) = self.ring.index().next_consume() {
            let flags = TxFlags::from_bits_retain(self.ring.read_flags(slot));
            if flags.contains(TxFlags::VALID) {
                break;
            }
            rmb();
            if flags.contains(TxFlags::ERROR) {
                self.stats.errors += 1;
                log::debug!("forcedeth: tx error, flags {:#06x}", flags.bits());
            } else {
                self.stats.completed += 1;
            }
            self.ring.index_mut().advance_consumed();
            reclaimed += 1;
        }
        reclaimed
    }

    /// A slot is free, after reclaiming completions.
    pub fn can_transmit(&mut self) -> bool {
        self.reclaim();
        !self.ring.index().is_full()
    }

    /// Build `dest | src | ethertype | payload` in the next slot and send it.
    ///
    /// Returns the on-wire length (padding included).
    pub fn enqueue<R: RegisterInterface + ?Sized>(
        &mut self,
        regs: &R,
        dest: EthernetAddress,
        src: EthernetAddress,
        ethertype: EthernetProtocol,
        payload: &[u8],
    ) -> Result<usize, TxError> {
        if payload.len() > DEFAULT_MTU {
            return Err(TxError::FrameTooLarge {
                provided: payload.len(),
                max: DEFAULT_MTU,
            });
        }
        let slot = self.claim()?;

        let buffer = self.ring.buffer_mut(slot);
        let mut frame = EthernetFrame::new_unchecked(&mut buffer[..]);
        frame.set_dst_addr(dest);
        frame.set_src_addr(src);
        frame.set_ethertype(ethertype);
        frame.payload_mut()[..payload.len()].copy_from_slice(payload);

        Ok(self.submit(regs, slot, ETH_HLEN + payload.len()))
    }

    /// Send a complete Ethernet frame (no FCS).
    pub fn enqueue_frame<R: RegisterInterface + ?Sized>(
        &mut self,
        regs: &R,
        frame: &[u8],
    ) -> Result<usize, TxError> {
        if frame.len() > MAX_FRAME_SIZE {
            return Err(TxError::FrameTooLarge {
                provided: frame.len(),
                max: MAX_FRAME_SIZE,
            });
        }
        let slot = self.claim()?;
        self.ring.buffer_mut(slot)[..frame.len()].copy_from_slice(frame);
        Ok(self.submit(regs, slot, frame.len()))
    }

    /// Counters.
    pub fn stats(&self) -> TxStats {
        self.stats
    }

    /// Descriptors currently owned by hardware.
    pub fn in_flight(&self) -> usize {
        self.ring.index().in_flight()
    }

    /// Flags written to every published descriptor.
    pub fn template(&self) -> TxFlags {
        self.template
    }

    /// Underlying ring.
    pub fn ring(&self) -> &DescRing<N> {
        &self.ring
    }

    #[cfg(test)]
    pub(crate) fn ring_mut(&mut self) -> &mut DescRing<N> {
        &mut self.ring
    }

    fn claim(&mut self) -> Result<usize, TxError> {
        self.reclaim();
        self.ring.index().next_produce().ok_or(TxError::QueueFull)
    }

    /// Pad, publish and ring the doorbell.
    fn submit<R: RegisterInterface + ?Sized>(&mut self, regs: &R, slot: usize, len: usize) -> usize {
        let wire_len = len.max(ETH_ZLEN);
        debug_assert!(wire_len <= BUFFER_SIZE);
        self.ring.buffer_mut(slot)[len..wire_len].fill(0);

        // Hardware wants the length minus one.
        self.ring
            .publish(slot, (wire_len - 1) as u16, self.template.bits());
        self.ring.index_mut().advance_produced();

        regs.write32(regs::TXRX_CONTROL, regs::TXRXCTL_KICK);
        regs.flush();

        self.stats.queued += 1;
        self.stats.bytes += wire_len as u64;
        wire_len
    }
}
