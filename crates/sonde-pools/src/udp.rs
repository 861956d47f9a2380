//! UDP adapter for the [`Transport`] capability.
//!
//! The socket is constructed through socket2 so the receive-buffer size
//! hint can be applied before the socket is handed to the runtime. The
//! hint is best-effort: the kernel may clamp it, and failure to set it is
//! a warning, not an error.

use std::io;
use std::net::SocketAddr;
use std::time::Duration;

use socket2::{Domain, Protocol, Socket, Type};
use tokio::net::UdpSocket;

use sonde_core::Transport;

/// Largest datagram we will receive.
const MAX_DATAGRAM: usize = 65536;

pub struct UdpTransport {
    socket: UdpSocket,
}

impl UdpTransport {
    /// Bind `addr`, applying `recv_buffer_bytes` as a hint first.
    /// `recv_buffer_bytes == 0` leaves the OS default.
    pub async fn bind(addr: SocketAddr, recv_buffer_bytes: usize) -> io::Result<Self> {
        let socket = Socket::new(Domain::for_address(addr), Type::DGRAM, Some(Protocol::UDP))?;
        if recv_buffer_bytes > 0 {
            if let Err(e) = socket.set_recv_buffer_size(recv_buffer_bytes) {
                tracing::warn!(
                    error = %e,
                    requested = recv_buffer_bytes,
                    "failed to set receive buffer size, continuing with OS default"
                );
            }
        }
        socket.set_nonblocking(true)?;
        socket.bind(&addr.into())?;
        let socket = UdpSocket::from_std(socket.into())?;
        Ok(Self { socket })
    }
}

impl Transport for UdpTransport {
    async fn send_to(&self, dest: SocketAddr, data: &[u8]) -> io::Result<usize> {
        self.socket.send_to(data, dest).await
    }

    async fn recv_from(&self, timeout: Option<Duration>) -> io::Result<(Vec<u8>, SocketAddr)> {
        let mut buf = vec![0u8; MAX_DATAGRAM];
        let (len, addr) = match timeout {
            Some(t) => tokio::time::timeout(t, self.socket.recv_from(&mut buf))
                .await
                .map_err(|_| io::Error::new(io::ErrorKind::TimedOut, "receive timed out"))??,
            None => self.socket.recv_from(&mut buf).await?,
        };
        buf.truncate(len);
        Ok((buf, addr))
    }

    fn local_addr(&self) -> io::Result<SocketAddr> {
        self.socket.local_addr()
    }
}
