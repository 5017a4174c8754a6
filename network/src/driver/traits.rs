//! Network driver contract.
//!
//! What the network stack adapter needs from a NIC: a MAC, a way to push a
//! complete Ethernet frame, a way to pull one, and ring housekeeping. All
//! methods are non-blocking.

use core::fmt;

/// Transmit errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TxError {
    /// Every transmit descriptor is still owned by hardware.
    QueueFull,
    /// Device is not initialized or is shutting down.
    DeviceNotReady,
    /// Frame too large.
    FrameTooLarge {
        /// Provided size.
        provided: usize,
        /// Maximum allowed size.
        max: usize,
    },
}

impl fmt::Display for TxError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TxError::QueueFull => write!(f, "transmit ring full"),
            TxError::DeviceNotReady => write!(f, "device not ready"),
            TxError::FrameTooLarge { provided, max } => {
                write!(f, "frame of {} bytes exceeds {} bytes", provided, max)
            }
        }
    }
}

/// Receive errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RxError {
    /// Caller's buffer cannot hold the frame; the frame is dropped.
    BufferTooSmall {
        /// Received frame length.
        needed: usize,
        /// Caller's buffer length.
        provided: usize,
    },
    /// Hardware flagged the frame as bad; the frame is dropped.
    FrameError {
        /// Raw descriptor flags.
        flags: u16,
    },
    /// Device is not initialized or is shutting down.
    DeviceNotReady,
}

impl fmt::Display for RxError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RxError::BufferTooSmall { needed, provided } => {
                write!(f, "frame of {} bytes does not fit {} byte buffer", needed, provided)
            }
            RxError::FrameError { flags } => write!(f, "receive error, flags {:#06x}", flags),
            RxError::DeviceNotReady => write!(f, "device not ready"),
        }
    }
}

/// A polled Ethernet NIC.
pub trait NetworkDriver {
    /// Station MAC address.
    fn mac_address(&self) -> [u8; 6];

    /// A transmit descriptor is free (after reclaiming completions).
    fn can_transmit(&mut self) -> bool;

    /// A received frame is waiting.
    fn can_receive(&self) -> bool;

    /// Queue a complete Ethernet frame (no FCS). Fire-and-forget.
    fn transmit(&mut self, frame: &[u8]) -> Result<(), TxError>;

    /// Copy at most one received frame into `buffer`.
    ///
    /// `Ok(None)` means nothing was pending.
    fn receive(&mut self, buffer: &mut [u8]) -> Result<Option<usize>, RxError>;

    /// Hand free receive descriptors back to hardware.
    fn refill_rx_queue(&mut self);

    /// Reclaim finished transmit descriptors.
    fn collect_tx_completions(&mut self);

    /// Last known link state.
    fn link_up(&self) -> bool;
}
