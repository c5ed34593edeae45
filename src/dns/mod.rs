//! DNS resolver handles, capability probing, and pool composition.

pub mod pool;
pub mod probe;
pub mod resolver;
pub mod subnet;

pub use pool::{ResolverPool, public_pool, trusted_pool};
pub use probe::probe_resolvers;
pub use resolver::{MAX_UDP_DNS_SIZE, Resolve, ResolveError, UdpResolver};
pub use subnet::{EdnsProbe, ProbeError, SubnetProbe};
