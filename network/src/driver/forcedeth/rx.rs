//! nForce RX path.
//!
//! Hardware receives into descriptors marked AVAIL, then clears AVAIL and
//! sets DESCRIPTOR_VALID with the received length. Software copies the
//! frame out, clears the flags and re-arms the slot.

use bitflags::bitflags;

use crate::driver::traits::RxError;
use crate::hw::{rmb, RegisterInterface};

use super::regs;
use super::ring::{DescRing, BUFFER_SIZE};

bitflags! {
    /// Receive descriptor flags.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct RxFlags: u16 {
        /// Frame received, length valid.
        const DESCRIPTOR_VALID = 1 << 0;
        const MISSED_FRAME = 1 << 1;
        const SUBTRACT1 = 1 << 3;
        const ERROR1 = 1 << 7;
        const ERROR2 = 1 << 8;
        const ERROR3 = 1 << 9;
        const ERROR4 = 1 << 10;
        const CRC_ERR = 1 << 11;
        const OVERFLOW = 1 << 12;
        const FRAMING_ERR = 1 << 13;
        /// Summary error bit.
        const ERROR = 1 << 14;
        /// Owned by hardware, ready to receive.
        const AVAIL = 1 << 15;
    }
}

/// Outcome of [`RxRing::refill`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RxRefill {
    /// This many descriptors were handed to hardware (possibly zero).
    Refilled(usize),
    /// Every descriptor already belonged to hardware.
    Saturated,
}

/// Receive counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RxStats {
    /// Frames delivered to the caller.
    pub packets: u64,
    /// Bytes delivered to the caller.
    pub bytes: u64,
    /// Frames dropped because hardware flagged an error.
    pub errors: u64,
    /// Frames dropped because the caller's buffer was too small.
    pub dropped: u64,
}

/// Receive ring.
pub struct RxRing<const N: usize> {
    ring: DescRing<N>,
    stats: RxStats,
}

impl<const N: usize> RxRing<N> {
    /// Wrap a descriptor ring. Nothing is armed yet.
    pub fn new(ring: DescRing<N>) -> Self {
        Self {
            ring,
            stats: RxStats::default(),
        }
    }

    /// Take every descriptor back and zero the counters.
    ///
    /// Only valid while the receiver is stopped.
    pub fn reset(&mut self) {
        self.ring.clear();
    }

    /// Program the ring base address.
    pub fn install<R: RegisterInterface + ?Sized>(&self, regs: &R) {
        regs.write32(regs::RX_RING_ADDR, self.ring.base_bus());
    }

    /// Arm every software-owned slot.
    pub fn refill(&mut self) -> RxRefill {
        if self.ring.index().is_full() {
            return RxRefill::Saturated;
        }

        let mut armed = 0;
        while let Some(slot) = self.ring.index().next_produce() {
            self.ring
                .publish(slot, BUFFER_SIZE as u16, RxFlags::AVAIL.bits());
            self.ring.index_mut().advance_produced();
            armed += 1;
        }
        RxRefill::Refilled(armed)
    }

    /// A completed frame is waiting in the next slot.
    pub fn has_packet(&self) -> bool {
        match self.ring.index().next_consume() {
            Some(slot) => {
                RxFlags::from_bits_retain(self.ring.read_flags(slot))
                    .contains(RxFlags::DESCRIPTOR_VALID)
            }
            None => false,
        }
    }

    /// Copy out at most one frame.
    ///
    /// Returns `Ok(None)` when the next slot is still owned by hardware.
    /// Bad frames are dropped, counted and their slot re-armed before the
    /// error is returned.
    pub fn poll(&mut self, out: &mut [u8]) -> Result<Option<usize>, RxError> {
        let Some(slot) = self.ring.index().next_consume() else {
            return Ok(None);
        };

        let flags = RxFlags::from_bits_retain(self.ring.read_flags(slot));
        if !flags.contains(RxFlags::DESCRIPTOR_VALID) {
            return Ok(None);
        }

        // Length and data were written before the flags.
        rmb();

        let len = (self.ring.read_length(slot) as usize).min(BUFFER_SIZE);

        let result = if flags.contains(RxFlags::ERROR) {
            self.stats.errors += 1;
            Err(RxError::FrameError { flags: flags.bits() })
        } else if out.len() < len {
            self.stats.dropped += 1;
            Err(RxError::BufferTooSmall {
                needed: len,
                provided: out.len(),
            })
        } else {
            out[..len].copy_from_slice(&self.ring.buffer(slot)[..len]);
            self.stats.packets += 1;
            self.stats.bytes += len as u64;
            Ok(Some(len))
        };

        self.ring.write_flags(slot, 0);
        self.ring.index_mut().advance_consumed();
        self.refill();

        result
    }

    /// Descriptors currently owned by hardware.
    pub fn in_flight(&self) -> usize {
        self.ring.index().in_flight()
    }

    /// Counters.
    pub fn stats(&self) -> RxStats {
        self.stats
    }

    /// Underlying ring.
    pub fn ring(&self) -> &DescRing<N> {
        &self.ring
    }

    #[cfg(test)]
    pub(crate) fn ring_mut(&mut self) -> &mut DescRing<N> {
        &mut self.ring
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::driver::forcedeth::ring::{split_rings, RX_RING_SIZE};
    use crate::testing::leak_ring_memory;

    fn deliver(rx: &mut RxRing<RX_RING_SIZE>, slot: usize, data: &[u8], extra: RxFlags) {
        let flags = (RxFlags::DESCRIPTOR_VALID | extra).bits();
        rx.ring_mut().simulate_hardware(slot, data, data.len() as u16, flags);
    }

    fn ring() -> RxRing<RX_RING_SIZE> {
        let (_mem, region) = leak_ring_memory();
        let (rx, _tx) = split_rings(&region);
        RxRing::new(rx)
    }

    #[test]
    fn test_refill_arms_every_slot_once() {
        let mut rx = ring();
        assert_eq!(rx.refill(), RxRefill::Refilled(RX_RING_SIZE));
        assert_eq!(rx.in_flight(), RX_RING_SIZE);
        for slot in 0..RX_RING_SIZE {
            assert_eq!(rx.ring().read_flags(slot), RxFlags::AVAIL.bits());
            assert_eq!(rx.ring().read_length(slot) as usize, BUFFER_SIZE);
        }
        assert_eq!(rx.refill(), RxRefill::Saturated);
    }

    #[test]
    fn test_poll_nothing_pending() {
        let mut rx = ring();
        rx.refill();
        let mut buf = [0u8; 2048];
        assert_eq!(rx.poll(&mut buf), Ok(None));
        assert!(!rx.has_packet());
    }

    #[test]
    fn test_poll_copies_frame_and_rearms() {
        let mut rx = ring();
        rx.refill();

        let frame = [0xABu8; 64];
        deliver(&mut rx, 0, &frame, RxFlags::empty());
        assert!(rx.has_packet());

        let mut buf = [0u8; 2048];
        assert_eq!(rx.poll(&mut buf), Ok(Some(64)));
        assert_eq!(&buf[..64], &frame[..]);
        assert_eq!(rx.in_flight(), RX_RING_SIZE);
        assert_eq!(rx.ring().read_flags(0), RxFlags::AVAIL.bits());
        assert_eq!(rx.stats().packets, 1);
    }

    #[test]
    fn test_error_frame_dropped_and_rearmed() {
        let mut rx = ring();
        rx.refill();
        deliver(&mut rx, 0, &[0u8; 60], RxFlags::ERROR | RxFlags::CRC_ERR);

        let mut buf = [0u8; 2048];
        assert!(matches!(rx.poll(&mut buf), Err(RxError::FrameError { .. })));
        assert_eq!(rx.stats().errors, 1);
        assert_eq!(rx.in_flight(), RX_RING_SIZE);
        assert_eq!(rx.poll(&mut buf), Ok(None));
    }

    #[test]
    fn test_small_buffer_rejected() {
        let mut rx = ring();
        rx.refill();
        deliver(&mut rx, 0, &[1u8; 100], RxFlags::empty());

        let mut buf = [0u8; 32];
        assert_eq!(
            rx.poll(&mut buf),
            Err(RxError::BufferTooSmall {
                needed: 100,
                provided: 32
            })
        );
        assert_eq!(rx.in_flight(), RX_RING_SIZE);
    }

    #[test]
    fn test_in_flight_bounded_across_many_frames() {
        let mut rx = ring();
        rx.refill();
        let mut buf = [0u8; 2048];
        for n in 0..1000usize {
            let slot = n % RX_RING_SIZE;
            deliver(&mut rx, slot, &[n as u8; 60], RxFlags::empty());
            assert_eq!(rx.poll(&mut buf), Ok(Some(60)));
            assert_eq!(buf[0], n as u8);
            assert!(rx.in_flight() <= RX_RING_SIZE);
        }
        assert_eq!(rx.stats().packets, 1000);
    }
}
