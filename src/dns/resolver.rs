//! DNS resolver trait and the rate-limited UDP implementation.
//!
//! Provides abstraction over DNS resolution to enable:
//! - Testing with mock resolvers
//! - Composite strategies (the tiered pool is itself a resolver)

use std::future::Future;
use std::net::{IpAddr, SocketAddr};
use std::num::NonZeroU32;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use governor::clock::DefaultClock;
use governor::state::{InMemoryState, NotKeyed};
use governor::{Quota, RateLimiter};
use hickory_proto::op::Message;
use hickory_proto::serialize::binary::{BinDecodable, BinEncodable};
use tokio::net::UdpSocket;

/// Maximum DNS message size accepted over UDP (EDNS-sized).
pub const MAX_UDP_DNS_SIZE: usize = 4096;

/// Errors surfaced by the resolve path.
#[derive(Debug, thiserror::Error)]
pub enum ResolveError {
    /// The resolver has been stopped and releases no more queries.
    #[error("resolver is stopped")]
    Stopped,

    /// Every pool member and the fallback tier failed or timed out.
    #[error("all resolvers in the pool failed")]
    Exhausted,

    #[error("DNS protocol error: {0}")]
    Proto(#[from] hickory_proto::error::ProtoError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Trait for DNS resolution.
///
/// Implemented by the UDP resolver handle and by the tiered pool, so a
/// pool can carry another pool as its fallback.
pub trait Resolve: Send + Sync + 'static {
    /// Resolve a DNS query and return the response.
    fn resolve(&self, query: &Message) -> impl Future<Output = Result<Message, ResolveError>> + Send;

    /// Stop the resolver. Subsequent resolve calls fail with
    /// [`ResolveError::Stopped`].
    fn stop(&self);
}

type DirectLimiter = RateLimiter<NotKeyed, InMemoryState, DefaultClock>;

/// A single upstream resolver reached over UDP, rate-limited by a token
/// bucket granting `rate` queries per second.
#[derive(Clone)]
pub struct UdpResolver {
    addr: SocketAddr,
    rate: u32,
    limiter: Arc<DirectLimiter>,
    stopped: Arc<AtomicBool>,
}

impl UdpResolver {
    /// Create a resolver handle at the given per-second query rate.
    ///
    /// Returns `None` if the rate is zero; every admitted resolver must be
    /// allowed to make progress.
    pub fn new(addr: SocketAddr, rate: u32) -> Option<Self> {
        let rate = NonZeroU32::new(rate)?;

        Some(Self {
            addr,
            rate: rate.get(),
            limiter: Arc::new(RateLimiter::direct(Quota::per_second(rate))),
            stopped: Arc::new(AtomicBool::new(false)),
        })
    }

    /// The upstream address this handle queries.
    pub fn address(&self) -> SocketAddr {
        self.addr
    }

    /// The per-second query rate granted to this handle.
    pub fn rate(&self) -> u32 {
        self.rate
    }

    pub fn is_stopped(&self) -> bool {
        self.stopped.load(Ordering::SeqCst)
    }
}

impl Resolve for UdpResolver {
    async fn resolve(&self, query: &Message) -> Result<Message, ResolveError> {
        if self.is_stopped() {
            return Err(ResolveError::Stopped);
        }

        self.limiter.until_ready().await;

        let bind_addr: SocketAddr = match self.addr.ip() {
            IpAddr::V4(_) => "0.0.0.0:0".parse().unwrap(),
            IpAddr::V6(_) => "[::]:0".parse().unwrap(),
        };
        let socket = UdpSocket::bind(bind_addr).await?;
        socket.connect(self.addr).await?;

        let query_bytes = query.to_bytes()?;
        socket.send(&query_bytes).await?;

        let mut response_buf = [0u8; MAX_UDP_DNS_SIZE];
        let len = socket.recv(&mut response_buf).await?;

        let response = Message::from_bytes(&response_buf[..len])?;
        Ok(response)
    }

    fn stop(&self) {
        self.stopped.store(true, Ordering::SeqCst);
    }
}
