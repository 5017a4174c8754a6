//! Descriptor rings shared with the DMA engine.
//!
//! # Ownership
//! ```text
//!   SOFTWARE ──arm (addr, len, wmb, AVAIL/VALID)──> HARDWARE
//!      ▲                                               │
//!      └──────── flag change observed (rmb) ───────────┘
//! ```
//!
//! `produced` counts descriptors ever handed to hardware, `consumed` counts
//! descriptors ever taken back. Both are free-running `u32`s; the slot of a
//! counter is `counter % N`, so `N` must be a power of two to stay
//! consistent across wrap-around.
//!
//! INVARIANT: `produced - consumed <= N`.

use core::mem::offset_of;
use core::ptr::{addr_of, addr_of_mut, NonNull};

use crate::hw::{wmb, DmaRegion};

// ═══════════════════════════════════════════════════════════════════════════
// CONSTANTS
// ═══════════════════════════════════════════════════════════════════════════

/// Number of receive descriptors.
pub const RX_RING_SIZE: usize = 4;

/// Number of transmit descriptors.
pub const TX_RING_SIZE: usize = 2;

/// Largest payload the driver sends or expects.
pub const DEFAULT_MTU: usize = 1500;

/// Packet buffer size: MAC addresses, type, VLAN tag, alignment and slack.
pub const BUFFER_SIZE: usize = DEFAULT_MTU + 64;

/// Size of one descriptor in bytes.
pub const DESC_SIZE: usize = 8;

// ═══════════════════════════════════════════════════════════════════════════
// DESCRIPTOR
// ═══════════════════════════════════════════════════════════════════════════

/// One ring descriptor, as laid out in DMA memory (little-endian).
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Descriptor {
    /// Bus address of the packet buffer.
    pub buffer: u32,
    /// Buffer length (RX, armed) / received length (RX, done) / frame length - 1 (TX).
    pub length: u16,
    /// Ownership and status bits.
    pub flags: u16,
}

impl Descriptor {
    /// An unowned, empty descriptor.
    pub const fn new() -> Self {
        Self {
            buffer: 0,
            length: 0,
            flags: 0,
        }
    }
}

const _: () = assert!(core::mem::size_of::<Descriptor>() == DESC_SIZE);

// ═══════════════════════════════════════════════════════════════════════════
// RING INDEX
// ═══════════════════════════════════════════════════════════════════════════

/// Produced/consumed counters for a ring of `N` slots.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RingIndex<const N: usize> {
    produced: u32,
    consumed: u32,
}

impl<const N: usize> RingIndex<N> {
    const VALID_SIZE: () = assert!(N.is_power_of_two() && N <= (u16::MAX as usize));

    /// Fresh counters, everything software-owned.
    pub const fn new() -> Self {
        #[allow(clippy::let_unit_value)]
        let _ = Self::VALID_SIZE;
        Self {
            produced: 0,
            consumed: 0,
        }
    }

    /// Ring capacity.
    #[inline]
    pub const fn capacity(&self) -> usize {
        N
    }

    /// Descriptors ever handed to hardware.
    #[inline]
    pub fn produced(&self) -> u32 {
        self.produced
    }

    /// Descriptors ever reclaimed by software.
    #[inline]
    pub fn consumed(&self) -> u32 {
        self.consumed
    }

    /// Descriptors currently owned by hardware.
    #[inline]
    pub fn in_flight(&self) -> usize {
        self.produced.wrapping_sub(self.consumed) as usize
    }

    /// Descriptors software may still hand out.
    #[inline]
    pub fn free(&self) -> usize {
        N - self.in_flight()
    }

    /// True when every slot is hardware-owned.
    #[inline]
    pub fn is_full(&self) -> bool {
        self.in_flight() == N
    }

    /// True when no slot is hardware-owned.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.produced == self.consumed
    }

    /// Slot the next produced descriptor goes into, if one is free.
    #[inline]
    pub fn next_produce(&self) -> Option<usize> {
        (!self.is_full()).then(|| self.produced as usize % N)
    }

    /// Slot the next consumed descriptor comes from, if one is in flight.
    #[inline]
    pub fn next_consume(&self) -> Option<usize> {
        (!self.is_empty()).then(|| self.consumed as usize % N)
    }

    /// Record a hand-off to hardware.
    ///
    /// Callers must have obtained the slot from [`next_produce`](Self::next_produce).
    #[inline]
    pub fn advance_produced(&mut self) {
        debug_assert!(!self.is_full());
        self.produced = self.produced.wrapping_add(1);
    }

    /// Record a reclaim from hardware.
    #[inline]
    pub fn advance_consumed(&mut self) {
        debug_assert!(!self.is_empty());
        self.consumed = self.consumed.wrapping_add(1);
    }

    /// Back to the initial state.
    #[inline]
    pub fn reset(&mut self) {
        self.produced = 0;
        self.consumed = 0;
    }

    #[cfg(test)]
    pub(crate) fn with_counters(produced: u32, consumed: u32) -> Self {
        Self { produced, consumed }
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// RING MEMORY
// ═══════════════════════════════════════════════════════════════════════════

/// Everything the DMA engine touches, in one statically sized block.
///
/// Firmware places one of these in a `static` (or another identity-mapped,
/// never-moving location) and hands it to the driver through a
/// [`DmaRegion`].
#[repr(C, align(64))]
pub struct RingMemory {
    rx_desc: [Descriptor; RX_RING_SIZE],
    tx_desc: [Descriptor; TX_RING_SIZE],
    rx_buffers: [[u8; BUFFER_SIZE]; RX_RING_SIZE],
    tx_buffers: [[u8; BUFFER_SIZE]; TX_RING_SIZE],
}

impl RingMemory {
    /// Zeroed ring memory.
    pub const fn new() -> Self {
        Self {
            rx_desc: [Descriptor::new(); RX_RING_SIZE],
            tx_desc: [Descriptor::new(); TX_RING_SIZE],
            rx_buffers: [[0; BUFFER_SIZE]; RX_RING_SIZE],
            tx_buffers: [[0; BUFFER_SIZE]; TX_RING_SIZE],
        }
    }
}

impl Default for RingMemory {
    fn default() -> Self {
        Self::new()
    }
}

/// Carve the receive and transmit rings out of a ring memory region.
pub fn split_rings(
    region: &DmaRegion<RingMemory>,
) -> (DescRing<RX_RING_SIZE>, DescRing<TX_RING_SIZE>) {
    let base = region.cpu_ptr();

    // Safety: the region guarantees `base` is valid for the driver's
    // lifetime; the two rings address disjoint fields.
    unsafe {
        let rx = DescRing::new(
            addr_of_mut!((*base).rx_desc) as *mut Descriptor,
            region.bus_at(offset_of!(RingMemory, rx_desc)),
            addr_of_mut!((*base).rx_buffers) as *mut [u8; BUFFER_SIZE],
            region.bus_at(offset_of!(RingMemory, rx_buffers)),
        );
        let tx = DescRing::new(
            addr_of_mut!((*base).tx_desc) as *mut Descriptor,
            region.bus_at(offset_of!(RingMemory, tx_desc)),
            addr_of_mut!((*base).tx_buffers) as *mut [u8; BUFFER_SIZE],
            region.bus_at(offset_of!(RingMemory, tx_buffers)),
        );
        (rx, tx)
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// DESCRIPTOR RING
// ═══════════════════════════════════════════════════════════════════════════

/// `N` descriptors, `N` packet buffers and the counters that track them.
///
/// All descriptor accesses are volatile; the DMA engine reads and writes
/// the same memory behind the compiler's back.
pub struct DescRing<const N: usize> {
    /// CPU pointer to descriptor 0.
    desc: NonNull<Descriptor>,
    /// Bus address of descriptor 0.
    desc_bus: u32,
    /// CPU pointer to buffer 0.
    buffers: NonNull<[u8; BUFFER_SIZE]>,
    /// Bus address of buffer 0.
    buffers_bus: u32,
    /// Ownership counters.
    index: RingIndex<N>,
}

impl<const N: usize> DescRing<N> {
    /// Build a ring over raw descriptor and buffer arrays.
    ///
    /// # Safety
    /// `desc` must point to `N` descriptors and `buffers` to `N` buffers,
    /// both valid and pinned for the ring's lifetime, with matching bus
    /// addresses.
    pub unsafe fn new(
        desc: *mut Descriptor,
        desc_bus: u32,
        buffers: *mut [u8; BUFFER_SIZE],
        buffers_bus: u32,
    ) -> Self {
        Self {
            desc: NonNull::new_unchecked(desc),
            desc_bus,
            buffers: NonNull::new_unchecked(buffers),
            buffers_bus,
            index: RingIndex::new(),
        }
    }

    /// Bus address of the descriptor array.
    #[inline]
    pub fn base_bus(&self) -> u32 {
        self.desc_bus
    }

    /// Ownership counters.
    #[inline]
    pub fn index(&self) -> &RingIndex<N> {
        &self.index
    }

    /// Mutable ownership counters.
    #[inline]
    pub fn index_mut(&mut self) -> &mut RingIndex<N> {
        &mut self.index
    }

    /// Return every descriptor to software and zero the counters.
    pub fn clear(&mut self) {
        for slot in 0..N {
            self.write_flags(slot, 0);
        }
        wmb();
        self.index.reset();
    }

    /// Write buffer address and length, fence, then publish `flags`.
    ///
    /// This is the only way a descriptor is handed to hardware.
    pub fn publish(&mut self, slot: usize, length: u16, flags: u16) {
        let desc = self.desc_ptr(slot);
        let bus = self.buffer_bus(slot);
        unsafe {
            core::ptr::write_volatile(addr_of_mut!((*desc).buffer), bus.to_le());
            core::ptr::write_volatile(addr_of_mut!((*desc).length), length.to_le());
        }
        // Address and length must be visible before the ownership bit.
        wmb();
        self.write_flags(slot, flags);
    }

    /// Current flags of a descriptor.
    #[inline]
    pub fn read_flags(&self, slot: usize) -> u16 {
        let desc = self.desc_ptr(slot);
        u16::from_le(unsafe { core::ptr::read_volatile(addr_of!((*desc).flags)) })
    }

    /// Current length field of a descriptor.
    #[inline]
    pub fn read_length(&self, slot: usize) -> u16 {
        let desc = self.desc_ptr(slot);
        u16::from_le(unsafe { core::ptr::read_volatile(addr_of!((*desc).length)) })
    }

    /// Overwrite the flags of a descriptor.
    #[inline]
    pub fn write_flags(&mut self, slot: usize, flags: u16) {
        let desc = self.desc_ptr(slot);
        unsafe { core::ptr::write_volatile(addr_of_mut!((*desc).flags), flags.to_le()) }
    }

    /// Packet buffer of a software-owned slot.
    #[inline]
    pub fn buffer(&self, slot: usize) -> &[u8; BUFFER_SIZE] {
        unsafe { &*self.buffers.as_ptr().add(slot % N) }
    }

    /// Mutable packet buffer of a software-owned slot.
    #[inline]
    pub fn buffer_mut(&mut self, slot: usize) -> &mut [u8; BUFFER_SIZE] {
        unsafe { &mut *self.buffers.as_ptr().add(slot % N) }
    }

    /// Bus address of a slot's packet buffer.
    #[inline]
    pub fn buffer_bus(&self, slot: usize) -> u32 {
        self.buffers_bus + ((slot % N) * BUFFER_SIZE) as u32
    }

    /// Play the DMA engine: fill `slot` and overwrite length and flags.
    #[cfg(test)]
    pub(crate) fn simulate_hardware(&mut self, slot: usize, data: &[u8], length: u16, flags: u16) {
        self.buffer_mut(slot)[..data.len()].copy_from_slice(data);
        let desc = self.desc_ptr(slot);
        unsafe { core::ptr::write_volatile(addr_of_mut!((*desc).length), length.to_le()) };
        self.write_flags(slot, flags);
    }

    #[inline]
    fn desc_ptr(&self, slot: usize) -> *mut Descriptor {
        unsafe { self.desc.as_ptr().add(slot % N) }
    }
}

// Safety: ring memory is owned by exactly one ring; access goes through `&mut self`.
unsafe impl<const N: usize> Send for DescRing<N> {}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::leak_ring_memory;

    fn cycle<const N: usize>(rounds: usize) {
        let mut index = RingIndex::<N>::new();
        let mut next_expected = 0usize;
        let mut produced_slots = [0u32; 64];

        for round in 0..rounds {
            // Vary the burst size so the counters drift relative to N.
            let burst = round % (N + 1);
            for _ in 0..burst {
                if let Some(slot) = index.next_produce() {
                    produced_slots[slot] += 1;
                    index.advance_produced();
                }
                assert!(index.in_flight() <= N);
            }
            while let Some(slot) = index.next_consume() {
                assert_eq!(slot, next_expected % N);
                assert_eq!(produced_slots[slot], 1, "slot {} consumed twice", slot);
                produced_slots[slot] -= 1;
                next_expected += 1;
                index.advance_consumed();
            }
            assert!(index.is_empty());
        }
        assert_eq!(index.produced() as usize, next_expected);
    }

    #[test]
    fn test_ring_index_cycles_size_2() {
        cycle::<2>(5000);
    }

    #[test]
    fn test_ring_index_cycles_size_4() {
        cycle::<4>(5000);
    }

    #[test]
    fn test_ring_index_cycles_size_64() {
        cycle::<64>(5000);
    }

    #[test]
    fn test_ring_index_never_exceeds_capacity() {
        let mut index = RingIndex::<4>::new();
        for _ in 0..10 {
            if index.next_produce().is_some() {
                index.advance_produced();
            }
        }
        assert_eq!(index.in_flight(), 4);
        assert!(index.is_full());
        assert_eq!(index.next_produce(), None);
        assert_eq!(index.free(), 0);
    }

    #[test]
    fn test_ring_index_survives_counter_wrap() {
        let mut index = RingIndex::<4>::with_counters(u32::MAX - 1, u32::MAX - 1);
        let mut slots = [0usize; 6];
        for slot in slots.iter_mut().take(4) {
            *slot = index.next_produce().unwrap();
            index.advance_produced();
        }
        assert!(index.is_full());
        assert_eq!(&slots[..4], &[2, 3, 0, 1]);
        for expected in [2, 3, 0, 1] {
            assert_eq!(index.next_consume(), Some(expected));
            index.advance_consumed();
        }
        assert!(index.is_empty());
    }

    #[test]
    fn test_ring_memory_layout() {
        assert_eq!(offset_of!(RingMemory, rx_desc), 0);
        assert_eq!(offset_of!(RingMemory, tx_desc), RX_RING_SIZE * DESC_SIZE);
        assert_eq!(core::mem::align_of::<RingMemory>(), 64);
    }

    #[test]
    fn test_publish_orders_fields_and_flags() {
        let (mem, region) = leak_ring_memory();
        let (mut rx, _tx) = split_rings(&region);

        rx.publish(1, BUFFER_SIZE as u16, 0x8000);

        let desc = unsafe { (*mem).rx_desc[1] };
        assert_eq!(desc.buffer, rx.buffer_bus(1));
        assert_eq!(desc.length as usize, BUFFER_SIZE);
        assert_eq!(desc.flags, 0x8000);
        assert_eq!(rx.read_flags(1), 0x8000);
    }

    #[test]
    fn test_split_rings_bus_addresses() {
        let (_mem, region) = leak_ring_memory();
        let (rx, tx) = split_rings(&region);
        assert_eq!(rx.base_bus(), region.bus_addr());
        assert_eq!(tx.base_bus(), region.bus_addr() + (RX_RING_SIZE * DESC_SIZE) as u32);
        assert_eq!(rx.buffer_bus(1) - rx.buffer_bus(0), BUFFER_SIZE as u32);
    }
}
