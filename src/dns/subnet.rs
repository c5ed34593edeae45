//! EDNS client-subnet capability probing.
//!
//! Public resolver candidates are only admitted into the pool when they
//! honor the EDNS client-subnet extension; resolvers that strip or reject
//! the option give subnet-blind answers that skew reconnaissance results.

use std::future::Future;
use std::net::{IpAddr, SocketAddr};
use std::time::Duration;

use hickory_proto::op::{Edns, Message, MessageType, OpCode, Query, ResponseCode};
use hickory_proto::rr::rdata::opt::EdnsOption;
use hickory_proto::rr::{Name, RecordType};
use hickory_proto::serialize::binary::{BinDecodable, BinEncodable};
use tokio::net::UdpSocket;

use super::resolver::MAX_UDP_DNS_SIZE;

/// Domain queried during the capability check. The answer content does not
/// matter; only that the resolver round-trips a subnet-carrying query.
const PROBE_DOMAIN: &str = "o-o.myaddr.l.google.com.";

/// Default per-probe timeout.
const PROBE_TIMEOUT: Duration = Duration::from_secs(3);

/// Probe failure reasons. All of them result in silent exclusion from the
/// pool; the variants exist for debug logging.
#[derive(Debug, thiserror::Error)]
pub enum ProbeError {
    #[error("probe timed out")]
    Timeout,

    #[error("response carried no OPT record")]
    NoEdns,

    #[error("response code {0:?}")]
    BadResponse(ResponseCode),

    #[error("response id mismatch")]
    IdMismatch,

    #[error("DNS protocol error: {0}")]
    Proto(#[from] hickory_proto::error::ProtoError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Capability check for a candidate resolver address.
pub trait SubnetProbe: Send + Sync + Clone + 'static {
    fn check(&self, addr: SocketAddr) -> impl Future<Output = Result<(), ProbeError>> + Send;
}

/// The real probe: sends a TXT query carrying an EDNS client-subnet option
/// over UDP and requires a well-formed, non-error response with an OPT
/// record.
#[derive(Clone)]
pub struct EdnsProbe {
    timeout: Duration,
}

impl EdnsProbe {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }
}

impl Default for EdnsProbe {
    fn default() -> Self {
        Self::new(PROBE_TIMEOUT)
    }
}

impl SubnetProbe for EdnsProbe {
    async fn check(&self, addr: SocketAddr) -> Result<(), ProbeError> {
        let query = build_probe_query()?;

        let bind_addr: SocketAddr = match addr.ip() {
            IpAddr::V4(_) => "0.0.0.0:0".parse().unwrap(),
            IpAddr::V6(_) => "[::]:0".parse().unwrap(),
        };
        let socket = UdpSocket::bind(bind_addr).await?;
        socket.connect(addr).await?;
        socket.send(&query.to_bytes()?).await?;

        let mut buf = [0u8; MAX_UDP_DNS_SIZE];
        let len = tokio::time::timeout(self.timeout, socket.recv(&mut buf))
            .await
            .map_err(|_| ProbeError::Timeout)??;

        let response = Message::from_bytes(&buf[..len])?;
        if response.id() != query.id() {
            return Err(ProbeError::IdMismatch);
        }
        if response.response_code() != ResponseCode::NoError {
            return Err(ProbeError::BadResponse(response.response_code()));
        }
        if response.edns().is_none() {
            return Err(ProbeError::NoEdns);
        }

        Ok(())
    }
}

/// EDNS option code for client subnet (RFC 7871).
const CLIENT_SUBNET_CODE: u16 = 8;

fn build_probe_query() -> Result<Message, hickory_proto::error::ProtoError> {
    let name = Name::from_ascii(PROBE_DOMAIN)?;

    let mut message = Message::new();
    message
        .set_id(rand::random())
        .set_message_type(MessageType::Query)
        .set_op_code(OpCode::Query)
        .set_recursion_desired(true)
        .add_query(Query::query(name, RecordType::TXT));

    // An unspecified IPv4 /0 subnet: we only care whether the option
    // survives the round trip, not which subnet the resolver scopes to.
    // Wire form per RFC 7871: family 1, source prefix 0, scope 0, no
    // address bytes.
    let subnet = EdnsOption::Unknown(CLIENT_SUBNET_CODE, vec![0x00, 0x01, 0x00, 0x00]);
    let mut edns = Edns::new();
    edns.set_max_payload(MAX_UDP_DNS_SIZE as u16);
    edns.set_version(0);
    edns.options_mut().insert(subnet);
    message.set_edns(edns);

    Ok(message)
}
