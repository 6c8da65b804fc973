use std::io;
use std::net::{SocketAddr, ToSocketAddrs, UdpSocket};
use std::time::Duration;

use crate::error::{Error, Result};

/// Receive buffer size. IPMI packets are small; 2 KiB is plenty.
const RECV_BUFFER_SIZE: usize = 1 << 11;

/// A synchronous transport for exchanging RMCP/IPMI datagrams.
///
/// There is exactly one request in flight at a time; `send_recv` blocks
/// until a datagram arrives or the deadline passes. Retries apply to
/// timeouts only; every other failure surfaces immediately.
pub(crate) trait Transport {
    /// Send a request datagram and wait for the corresponding response.
    fn send_recv(&self, request: &[u8]) -> Result<Vec<u8>>;
}

/// Blocking UDP transport.
pub(crate) struct UdpTransport {
    socket: UdpSocket,
    max_attempts: u32,
}

impl UdpTransport {
    /// Resolve `target` and connect a UDP socket to it.
    pub(crate) fn connect(target: &str, timeout: Duration, retries: u32) -> Result<Self> {
        let addr: SocketAddr = target
            .to_socket_addrs()?
            .next()
            .ok_or(Error::InvalidArgument("address did not resolve"))?;

        let bind_addr = match addr {
            SocketAddr::V4(_) => "0.0.0.0:0",
            SocketAddr::V6(_) => "[::]:0",
        };

        let socket = UdpSocket::bind(bind_addr)?;
        socket.connect(addr)?;
        socket.set_read_timeout(Some(timeout))?;

        Ok(Self {
            socket,
            max_attempts: retries + 1,
        })
    }
}

impl Transport for UdpTransport {
    fn send_recv(&self, request: &[u8]) -> Result<Vec<u8>> {
        let mut buf = vec![0u8; RECV_BUFFER_SIZE];

        for attempt in 0..self.max_attempts {
            self.socket.send(request)?;

            match self.socket.recv(&mut buf) {
                Ok(n) => {
                    buf.truncate(n);
                    return Ok(buf);
                }
                Err(e) if is_timeout(&e) => {
                    if attempt + 1 == self.max_attempts {
                        return Err(Error::Timeout);
                    }
                }
                Err(e) => return Err(Error::Io(e)),
            }
        }

        Err(Error::Timeout)
    }
}

fn is_timeout(e: &io::Error) -> bool {
    matches!(
        e.kind(),
        io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock
    )
}
