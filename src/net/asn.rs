//! In-memory IP → ASN cache keyed by CIDR block.

use std::collections::HashMap;
use std::net::IpAddr;

use parking_lot::RwLock;

use super::cidr::Cidr;

/// One IP-range → ASN association.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AsnRecord {
    /// First address of the originating range.
    pub address: IpAddr,
    /// Autonomous system number announcing the block.
    pub asn: u32,
    /// ISO country code of the registration.
    pub cc: String,
    /// Smallest CIDR spanning the range.
    pub prefix: Cidr,
    /// Free-text description of the AS.
    pub description: String,
}

/// Shared cache of ASN records, internally synchronized.
///
/// The cache is written by the startup loader and read concurrently by the
/// per-graph seeding passes and by steady-state lookups.
#[derive(Debug, Default)]
pub struct AsnCache {
    entries: RwLock<HashMap<Cidr, AsnRecord>>,
}

impl AsnCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace the record for its CIDR block.
    ///
    /// A record with a zero-length prefix is meaningless (it would match
    /// every address) and is silently dropped.
    pub fn update(&self, record: AsnRecord) {
        if record.prefix.prefix_len() == 0 {
            tracing::debug!(asn = record.asn, "dropping ASN record with /0 prefix");
            return;
        }

        self.entries.write().insert(record.prefix, record);
    }

    /// Longest-prefix match for the given address.
    pub fn lookup(&self, ip: IpAddr) -> Option<AsnRecord> {
        self.entries
            .read()
            .values()
            .filter(|r| r.prefix.contains(ip))
            .max_by_key(|r| r.prefix.prefix_len())
            .cloned()
    }

    /// Number of cached records.
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    /// Snapshot of all records, in no particular order.
    pub fn records(&self) -> Vec<AsnRecord> {
        self.entries.read().values().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    fn record(first: &str, last: &str, asn: u32) -> AsnRecord {
        let first = IpAddr::from_str(first).unwrap();
        let last = IpAddr::from_str(last).unwrap();
        let prefix = crate::net::range_to_cidr(first, last).unwrap();
        AsnRecord {
            address: first,
            asn,
            cc: "US".to_string(),
            prefix,
            description: format!("AS{asn}"),
        }
    }

    #[test]
    fn test_update_and_lookup() {
        let cache = AsnCache::new();
        cache.update(record("1.2.3.0", "1.2.3.255", 64512));

        let hit = cache.lookup(IpAddr::from_str("1.2.3.77").unwrap()).unwrap();
        assert_eq!(hit.asn, 64512);
        assert_eq!(hit.prefix.to_string(), "1.2.3.0/24");

        assert!(cache.lookup(IpAddr::from_str("1.2.4.1").unwrap()).is_none());
    }

    #[test]
    fn test_zero_prefix_never_stored() {
        let cache = AsnCache::new();
        cache.update(record("0.0.0.0", "255.255.255.255", 64512));
        assert!(cache.is_empty());
    }

    #[test]
    fn test_lookup_prefers_longest_prefix() {
        let cache = AsnCache::new();
        cache.update(record("10.0.0.0", "10.255.255.255", 100));
        cache.update(record("10.1.0.0", "10.1.255.255", 200));

        let hit = cache.lookup(IpAddr::from_str("10.1.2.3").unwrap()).unwrap();
        assert_eq!(hit.asn, 200);

        let hit = cache.lookup(IpAddr::from_str("10.2.0.1").unwrap()).unwrap();
        assert_eq!(hit.asn, 100);
    }

    #[test]
    fn test_update_replaces_same_block() {
        let cache = AsnCache::new();
        cache.update(record("1.2.3.0", "1.2.3.255", 1));
        cache.update(record("1.2.3.0", "1.2.3.255", 2));

        assert_eq!(cache.len(), 1);
        let hit = cache.lookup(IpAddr::from_str("1.2.3.1").unwrap()).unwrap();
        assert_eq!(hit.asn, 2);
    }
}
