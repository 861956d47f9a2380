//! The datagram transport capability.
//!
//! The pools never touch sockets directly; they call through this trait.
//! Two policies are part of the contract:
//!   - a send error is a silent loss signal, never fatal
//!   - a receive error means "skip this datagram, keep listening"
//!
//! Teardown is RAII: dropping an implementation releases its socket.

use std::future::Future;
use std::io;
use std::net::SocketAddr;
use std::time::Duration;

/// Abstract send/receive-by-datagram interface.
///
/// Methods return `Send` futures so pool workers can run on a multithreaded
/// runtime.
pub trait Transport: Send + Sync + 'static {
    /// Send one datagram to `dest`. Returns the number of bytes sent.
    fn send_to(
        &self,
        dest: SocketAddr,
        data: &[u8],
    ) -> impl Future<Output = io::Result<usize>> + Send;

    /// Receive one datagram and its source address.
    ///
    /// `None` waits indefinitely; `Some(t)` fails with
    /// [`io::ErrorKind::TimedOut`] if nothing arrives within `t`.
    fn recv_from(
        &self,
        timeout: Option<Duration>,
    ) -> impl Future<Output = io::Result<(Vec<u8>, SocketAddr)>> + Send;

    /// The local address this transport is bound to.
    fn local_addr(&self) -> io::Result<SocketAddr>;
}
