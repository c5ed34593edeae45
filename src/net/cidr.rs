//! CIDR block representation and range → CIDR derivation.

use std::fmt;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};

/// A CIDR block: a base address and a prefix length.
///
/// The base address is always masked down to the prefix, so two blocks
/// spanning the same addresses compare equal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Cidr {
    addr: IpAddr,
    prefix_len: u8,
}

impl Cidr {
    /// Create a block from an address and prefix length.
    ///
    /// Returns `None` if the prefix length exceeds the address family width.
    /// The address is masked to the prefix.
    pub fn new(addr: IpAddr, prefix_len: u8) -> Option<Self> {
        let masked = match addr {
            IpAddr::V4(v4) => {
                if prefix_len > 32 {
                    return None;
                }
                IpAddr::V4(Ipv4Addr::from(mask_v4(u32::from(v4), prefix_len)))
            }
            IpAddr::V6(v6) => {
                if prefix_len > 128 {
                    return None;
                }
                IpAddr::V6(Ipv6Addr::from(mask_v6(u128::from(v6), prefix_len)))
            }
        };

        Some(Self {
            addr: masked,
            prefix_len,
        })
    }

    /// The masked base address of the block.
    pub fn addr(&self) -> IpAddr {
        self.addr
    }

    /// The prefix (mask) length.
    pub fn prefix_len(&self) -> u8 {
        self.prefix_len
    }

    /// Whether the block contains the given address.
    ///
    /// Addresses of the other family are never contained.
    pub fn contains(&self, ip: IpAddr) -> bool {
        match (self.addr, ip) {
            (IpAddr::V4(base), IpAddr::V4(ip)) => {
                mask_v4(u32::from(ip), self.prefix_len) == u32::from(base)
            }
            (IpAddr::V6(base), IpAddr::V6(ip)) => {
                mask_v6(u128::from(ip), self.prefix_len) == u128::from(base)
            }
            _ => false,
        }
    }
}

impl fmt::Display for Cidr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.addr, self.prefix_len)
    }
}

fn mask_v4(addr: u32, prefix_len: u8) -> u32 {
    if prefix_len == 0 {
        0
    } else {
        addr & (u32::MAX << (32 - u32::from(prefix_len)))
    }
}

fn mask_v6(addr: u128, prefix_len: u8) -> u128 {
    if prefix_len == 0 {
        0
    } else {
        addr & (u128::MAX << (128 - u32::from(prefix_len)))
    }
}

/// Derive the smallest CIDR block spanning the inclusive range
/// `[first, last]`.
///
/// The block is the longest common prefix of the two endpoints; it may
/// cover more addresses than the range itself. Returns `None` when the
/// endpoints mix address families or `first > last`. A result with prefix
/// length 0 is possible (a range spanning the whole address space) and is
/// left for the caller to filter.
pub fn range_to_cidr(first: IpAddr, last: IpAddr) -> Option<Cidr> {
    match (first, last) {
        (IpAddr::V4(f), IpAddr::V4(l)) => {
            let (f, l) = (u32::from(f), u32::from(l));
            if f > l {
                return None;
            }
            let prefix_len = (f ^ l).leading_zeros() as u8;
            Cidr::new(first, prefix_len)
        }
        (IpAddr::V6(f), IpAddr::V6(l)) => {
            let (f, l) = (u128::from(f), u128::from(l));
            if f > l {
                return None;
            }
            let prefix_len = (f ^ l).leading_zeros() as u8;
            Cidr::new(first, prefix_len)
        }
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    fn ip(s: &str) -> IpAddr {
        IpAddr::from_str(s).unwrap()
    }

    #[test]
    fn test_range_to_cidr_aligned_v4() {
        let cidr = range_to_cidr(ip("1.2.3.0"), ip("1.2.3.255")).unwrap();
        assert_eq!(cidr.to_string(), "1.2.3.0/24");
    }

    #[test]
    fn test_range_to_cidr_single_address() {
        let cidr = range_to_cidr(ip("10.0.0.1"), ip("10.0.0.1")).unwrap();
        assert_eq!(cidr.to_string(), "10.0.0.1/32");
    }

    #[test]
    fn test_range_to_cidr_unaligned_spans_wider_block() {
        // 1.2.3.4-1.2.3.9 differ only in the last octet's low bits; the
        // common prefix is /28 and the base is masked down to it.
        let cidr = range_to_cidr(ip("1.2.3.4"), ip("1.2.3.9")).unwrap();
        assert_eq!(cidr.to_string(), "1.2.3.0/28");
        assert!(cidr.contains(ip("1.2.3.4")));
        assert!(cidr.contains(ip("1.2.3.9")));
    }

    #[test]
    fn test_range_to_cidr_full_space_is_zero_mask() {
        let cidr = range_to_cidr(ip("0.0.0.0"), ip("255.255.255.255")).unwrap();
        assert_eq!(cidr.prefix_len(), 0);
    }

    #[test]
    fn test_range_to_cidr_reversed_range() {
        assert!(range_to_cidr(ip("1.2.3.255"), ip("1.2.3.0")).is_none());
    }

    #[test]
    fn test_range_to_cidr_mixed_families() {
        assert!(range_to_cidr(ip("1.2.3.0"), ip("2001:db8::1")).is_none());
    }

    #[test]
    fn test_range_to_cidr_v6() {
        let cidr = range_to_cidr(
            ip("2001:db8::"),
            ip("2001:db8::ffff:ffff:ffff:ffff"),
        )
        .unwrap();
        assert_eq!(cidr.to_string(), "2001:db8::/64");
    }

    #[test]
    fn test_contains() {
        let cidr = Cidr::new(ip("192.168.1.0"), 24).unwrap();
        assert!(cidr.contains(ip("192.168.1.200")));
        assert!(!cidr.contains(ip("192.168.2.1")));
        assert!(!cidr.contains(ip("::1")));
    }

    #[test]
    fn test_new_masks_base_address() {
        let a = Cidr::new(ip("10.1.2.3"), 16).unwrap();
        let b = Cidr::new(ip("10.1.0.0"), 16).unwrap();
        assert_eq!(a, b);
        assert_eq!(a.to_string(), "10.1.0.0/16");
    }

    #[test]
    fn test_new_rejects_oversized_prefix() {
        assert!(Cidr::new(ip("10.0.0.0"), 33).is_none());
        assert!(Cidr::new(ip("::1"), 129).is_none());
    }
}
