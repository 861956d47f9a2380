//! In-memory transports for pool unit tests.

use std::collections::VecDeque;
use std::io;
use std::net::SocketAddr;
use std::sync::Mutex;
use std::time::Duration;

use sonde_core::Transport;

fn test_addr() -> SocketAddr {
    "127.0.0.1:1".parse().unwrap()
}

/// Records every sent datagram; never produces inbound traffic.
#[derive(Default)]
pub struct CollectingTransport {
    sent: Mutex<Vec<(SocketAddr, Vec<u8>)>>,
}

impl CollectingTransport {
    pub fn sent(&self) -> Vec<(SocketAddr, Vec<u8>)> {
        self.sent.lock().unwrap().clone()
    }
}

impl Transport for CollectingTransport {
    async fn send_to(&self, dest: SocketAddr, data: &[u8]) -> io::Result<usize> {
        self.sent.lock().unwrap().push((dest, data.to_vec()));
        Ok(data.len())
    }

    async fn recv_from(&self, _timeout: Option<Duration>) -> io::Result<(Vec<u8>, SocketAddr)> {
        std::future::pending().await
    }

    fn local_addr(&self) -> io::Result<SocketAddr> {
        Ok(test_addr())
    }
}

/// Every send fails; never produces inbound traffic.
pub struct FailingTransport;

impl Transport for FailingTransport {
    async fn send_to(&self, _dest: SocketAddr, _data: &[u8]) -> io::Result<usize> {
        Err(io::Error::new(io::ErrorKind::BrokenPipe, "send refused"))
    }

    async fn recv_from(&self, _timeout: Option<Duration>) -> io::Result<(Vec<u8>, SocketAddr)> {
        std::future::pending().await
    }

    fn local_addr(&self) -> io::Result<SocketAddr> {
        Ok(test_addr())
    }
}

/// Yields a scripted sequence of inbound datagrams, then blocks; records
/// every sent datagram.
#[derive(Default)]
pub struct ScriptedTransport {
    inbound: Mutex<VecDeque<(Vec<u8>, SocketAddr)>>,
    sent: Mutex<Vec<(SocketAddr, Vec<u8>)>>,
}

impl ScriptedTransport {
    pub fn push_inbound(&self, data: Vec<u8>, source: SocketAddr) {
        self.inbound.lock().unwrap().push_back((data, source));
    }

    pub fn sent(&self) -> Vec<(SocketAddr, Vec<u8>)> {
        self.sent.lock().unwrap().clone()
    }
}

impl Transport for ScriptedTransport {
    async fn send_to(&self, dest: SocketAddr, data: &[u8]) -> io::Result<usize> {
        self.sent.lock().unwrap().push((dest, data.to_vec()));
        Ok(data.len())
    }

    async fn recv_from(&self, _timeout: Option<Duration>) -> io::Result<(Vec<u8>, SocketAddr)> {
        let next = self.inbound.lock().unwrap().pop_front();
        match next {
            Some(datagram) => Ok(datagram),
            None => std::future::pending().await,
        }
    }

    fn local_addr(&self) -> io::Result<SocketAddr> {
        Ok(test_addr())
    }
}
