//! UDP transport implementation

use super::Transport;
use crate::error::{Error, Result};
use std::net::{ToSocketAddrs, UdpSocket};
use std::time::Duration;

/// Largest datagram a controller is known to emit; catalog entry replies
/// stay well under this.
const MAX_DATAGRAM: usize = 512;

/// UDP transport addressed to a single controller
pub struct UdpTransport {
    socket: UdpSocket,
}

impl UdpTransport {
    /// Open a socket bound to an ephemeral local port and aimed at the controller
    ///
    /// # Arguments
    /// * `host` - Controller IP address or hostname
    /// * `port` - Controller UDP port (59 on stock firmware)
    pub fn connect(host: &str, port: u16) -> Result<Self> {
        let addr = (host, port)
            .to_socket_addrs()?
            .next()
            .ok_or_else(|| Error::InvalidParameter(format!("unresolvable host: {}", host)))?;

        let socket = UdpSocket::bind("0.0.0.0:0")?;
        socket.connect(addr)?;

        log::info!("UDP transport open: {} -> {}", socket.local_addr()?, addr);

        Ok(UdpTransport { socket })
    }
}

impl Transport for UdpTransport {
    fn send(&mut self, data: &[u8]) -> Result<()> {
        let n = self.socket.send(data)?;
        if n != data.len() {
            return Err(Error::Comm(format!(
                "short datagram send: {} of {} bytes",
                n,
                data.len()
            )));
        }
        Ok(())
    }

    fn recv(&mut self, timeout: Duration) -> Result<Vec<u8>> {
        self.socket.set_read_timeout(Some(timeout))?;

        let mut buf = [0u8; MAX_DATAGRAM];
        match self.socket.recv(&mut buf) {
            Ok(n) => Ok(buf[..n].to_vec()),
            Err(e)
                if e.kind() == std::io::ErrorKind::WouldBlock
                    || e.kind() == std::io::ErrorKind::TimedOut =>
            {
                Err(Error::Timeout)
            }
            Err(e) => Err(e.into()),
        }
    }
}
