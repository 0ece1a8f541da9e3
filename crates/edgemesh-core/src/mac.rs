//! MAC address type and classifiers

use std::fmt;
use std::str::FromStr;

use crate::error::CoreError;

/// Number of bytes in a MAC address
pub const MAC_SIZE: usize = 6;

/// A 48-bit Ethernet hardware address.
///
/// The all-zero address doubles as an "absent" sentinel throughout the
/// peer registry; see [`Mac::is_null`].
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Mac([u8; MAC_SIZE]);

impl Mac {
    /// The absent/unknown sentinel
    pub const NULL: Mac = Mac([0x00; MAC_SIZE]);

    /// The Ethernet broadcast address
    pub const BROADCAST: Mac = Mac([0xFF; MAC_SIZE]);

    pub const fn new(bytes: [u8; MAC_SIZE]) -> Self {
        Mac(bytes)
    }

    pub const fn as_bytes(&self) -> &[u8; MAC_SIZE] {
        &self.0
    }

    /// True for the all-zero sentinel
    pub fn is_null(&self) -> bool {
        self.0 == [0x00; MAC_SIZE]
    }

    /// True for FF:FF:FF:FF:FF:FF
    pub fn is_broadcast(&self) -> bool {
        self.0 == [0xFF; MAC_SIZE]
    }

    /// True for the broadcast address and for the IPv4 (`01:00:5E`, high
    /// bit of the fourth byte clear) and IPv6 (`33:33`) multicast ranges.
    pub fn is_multi_broadcast(&self) -> bool {
        let m = &self.0;
        self.is_broadcast()
            || (m[0] == 0x01 && m[1] == 0x00 && m[2] == 0x5E && m[3] >> 7 == 0)
            || (m[0] == 0x33 && m[1] == 0x33)
    }
}

impl From<[u8; MAC_SIZE]> for Mac {
    fn from(bytes: [u8; MAC_SIZE]) -> Self {
        Mac(bytes)
    }
}

impl fmt::Display for Mac {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let m = &self.0;
        write!(
            f,
            "{:02X}:{:02X}:{:02X}:{:02X}:{:02X}:{:02X}",
            m[0], m[1], m[2], m[3], m[4], m[5]
        )
    }
}

impl fmt::Debug for Mac {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Mac({})", self)
    }
}

impl FromStr for Mac {
    type Err = CoreError;

    /// Reads six hex pairs separated by single delimiter bytes. The
    /// canonical form is `:`-separated, but any delimiter byte between
    /// pairs is accepted and skipped.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut out = [0u8; MAC_SIZE];
        for (i, byte) in out.iter_mut().enumerate() {
            let at = i * 3;
            let pair = s
                .get(at..at + 2)
                .ok_or_else(|| CoreError::MalformedMac(s.to_string()))?;
            *byte = u8::from_str_radix(pair, 16)
                .map_err(|_| CoreError::MalformedMac(s.to_string()))?;
        }
        Ok(Mac(out))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classifiers() {
        assert!(Mac::BROADCAST.is_broadcast());
        assert!(!Mac::new([0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFE]).is_broadcast());

        assert!(Mac::new([0x01, 0x00, 0x5E, 0x00, 0x00, 0x01]).is_multi_broadcast());
        // high bit of the fourth byte set: not IPv4 multicast
        assert!(!Mac::new([0x01, 0x00, 0x5E, 0xFF, 0x00, 0x00]).is_multi_broadcast());
        assert!(Mac::new([0x33, 0x33, 0x00, 0x00, 0x00, 0x01]).is_multi_broadcast());
        assert!(Mac::BROADCAST.is_multi_broadcast());

        assert!(Mac::NULL.is_null());
        assert!(!Mac::new([0x00, 0x00, 0x00, 0x00, 0x00, 0x01]).is_null());
    }

    #[test]
    fn test_display_round_trip() {
        let mac = Mac::new([0xDE, 0xAD, 0xBE, 0xEF, 0x01, 0x10]);
        let s = mac.to_string();
        assert_eq!(s, "DE:AD:BE:EF:01:10");
        assert_eq!(s.parse::<Mac>().unwrap(), mac);
    }

    #[test]
    fn test_parse_any_delimiter() {
        let mac: Mac = "de-ad-be-ef-01-10".parse().unwrap();
        assert_eq!(mac, Mac::new([0xDE, 0xAD, 0xBE, 0xEF, 0x01, 0x10]));
    }

    #[test]
    fn test_parse_rejects_malformed() {
        assert!("DE:AD:BE".parse::<Mac>().is_err());
        assert!("GG:AD:BE:EF:01:10".parse::<Mac>().is_err());
        assert!("".parse::<Mac>().is_err());
    }
}
