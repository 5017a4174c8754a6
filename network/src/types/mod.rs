//! Shared data types module.
//!
//! Ethernet framing constants and the station address type.

pub use smoltcp::wire::EthernetAddress as MacAddress;

/// Octets in one Ethernet address.
pub const ETH_ALEN: usize = 6;

/// Ethernet header length (dest + src + ethertype).
pub const ETH_HLEN: usize = 14;

/// Minimum frame length without FCS; shorter frames are zero padded.
pub const ETH_ZLEN: usize = 60;

/// Standard Ethernet payload size.
pub const ETH_MTU: usize = 1500;

/// Largest frame without FCS.
pub const ETH_FRAME_MAX: usize = ETH_HLEN + ETH_MTU;

/// A station address the adapter may use: not all-zero, not group.
#[inline]
pub fn is_valid_station(mac: &MacAddress) -> bool {
    mac.is_unicast() && mac.0 != [0; ETH_ALEN]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_station_validity() {
        assert!(is_valid_station(&MacAddress([0x00, 0x04, 0x4B, 0x01, 0x02, 0x03])));
        assert!(!is_valid_station(&MacAddress([0; 6])));
        assert!(!is_valid_station(&MacAddress([0x01, 0x00, 0x5E, 0, 0, 1])));
        assert!(!is_valid_station(&MacAddress([0xFF; 6])));
    }

    #[test]
    fn test_frame_constants() {
        assert_eq!(ETH_FRAME_MAX, 1514);
        assert!(ETH_ZLEN > ETH_HLEN);
    }
}
