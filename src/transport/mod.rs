//! Transport layer for datagram I/O abstraction

use crate::error::Result;
use std::time::Duration;

mod udp;
pub use udp::UdpTransport;

mod mock;
pub use mock::{MockTransport, Responder};

/// Transport trait for controller communication
///
/// The protocol layer is datagram-oriented: one request datagram out, one
/// reply datagram in. Implementations address a fixed remote endpoint.
pub trait Transport: Send {
    /// Send one datagram
    fn send(&mut self, data: &[u8]) -> Result<()>;

    /// Receive one datagram, waiting at most `timeout`
    ///
    /// Returns `Error::Timeout` when nothing arrives in time.
    fn recv(&mut self, timeout: Duration) -> Result<Vec<u8>>;
}
