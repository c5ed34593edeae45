//! Network address types: CIDR blocks and the IP → ASN cache.

pub mod asn;
pub mod cidr;

pub use asn::{AsnCache, AsnRecord};
pub use cidr::{Cidr, range_to_cidr};
