//! Datagram transmission
//!
//! Playback hands every chunk to a [`DatagramSink`] as one best-effort UDP
//! datagram. [`BroadcastSocket`] is the network implementation;
//! [`RecordingSink`] keeps the datagrams in memory for dry runs and tests.

use bytes::Bytes;
use parking_lot::Mutex;
use socket2::{Domain, Protocol, Socket, Type};
use std::io;
use std::net::{Ipv4Addr, SocketAddr, SocketAddrV4};
use std::sync::Arc;
use thiserror::Error;
use tracing::debug;

/// Destination used by NMEA WiFi gateways
pub const DEFAULT_PORT: u16 = 2000;

/// Socket errors
#[derive(Error, Debug)]
pub enum SocketError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("Invalid socket address")]
    InvalidAddress,

    #[error("Socket accepted zero of {expected} bytes")]
    ZeroSend { expected: usize },

    #[error("Partial datagram send: {sent} of {expected} bytes")]
    PartialSend { sent: usize, expected: usize },
}

/// Capability to place one unreliable datagram on the wire
pub trait DatagramSink {
    /// Send `payload` as exactly one datagram
    ///
    /// A send that does not accept the whole payload is an error; callers
    /// never retry.
    fn send_datagram(&mut self, payload: &[u8]) -> Result<(), SocketError>;
}

impl<T: DatagramSink + ?Sized> DatagramSink for &mut T {
    fn send_datagram(&mut self, payload: &[u8]) -> Result<(), SocketError> {
        (**self).send_datagram(payload)
    }
}

impl<T: DatagramSink + ?Sized> DatagramSink for Box<T> {
    fn send_datagram(&mut self, payload: &[u8]) -> Result<(), SocketError> {
        (**self).send_datagram(payload)
    }
}

/// UDP socket connected to a broadcast (or unicast) destination
pub struct BroadcastSocket {
    inner: Socket,
    destination: SocketAddrV4,
}

impl BroadcastSocket {
    /// Create a socket that broadcasts to `255.255.255.255:port`
    pub fn broadcast(port: u16) -> Result<Self, SocketError> {
        Self::connect(SocketAddrV4::new(Ipv4Addr::BROADCAST, port))
    }

    /// Create a socket sending to the given destination
    ///
    /// Broadcast permission is always enabled so any broadcast address
    /// (limited or directed) works.
    pub fn connect(destination: SocketAddrV4) -> Result<Self, SocketError> {
        let socket = Socket::new(Domain::IPV4, Type::DGRAM, Some(Protocol::UDP))?;

        socket.set_broadcast(true)?;
        socket.connect(&SocketAddr::V4(destination).into())?;

        debug!("Socket connected to {}", destination);
        Ok(BroadcastSocket {
            inner: socket,
            destination,
        })
    }

    /// Get the local address the socket was bound to on connect
    pub fn local_addr(&self) -> Result<SocketAddr, SocketError> {
        self.inner
            .local_addr()?
            .as_socket()
            .ok_or(SocketError::InvalidAddress)
    }

    /// Get the destination address
    pub fn destination(&self) -> SocketAddrV4 {
        self.destination
    }
}

impl DatagramSink for BroadcastSocket {
    fn send_datagram(&mut self, payload: &[u8]) -> Result<(), SocketError> {
        let sent = self.inner.send(payload)?;
        if sent == 0 && !payload.is_empty() {
            return Err(SocketError::ZeroSend {
                expected: payload.len(),
            });
        }
        if sent != payload.len() {
            return Err(SocketError::PartialSend {
                sent,
                expected: payload.len(),
            });
        }
        Ok(())
    }
}

/// In-memory sink that records every datagram
///
/// Clones share the same record, so a test can keep one handle while the
/// engine owns another.
#[derive(Debug, Clone, Default)]
pub struct RecordingSink {
    datagrams: Arc<Mutex<Vec<Bytes>>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Copy of every datagram sent so far
    pub fn datagrams(&self) -> Vec<Bytes> {
        self.datagrams.lock().clone()
    }

    /// Number of datagrams sent so far
    pub fn len(&self) -> usize {
        self.datagrams.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.datagrams.lock().is_empty()
    }

    /// All datagrams joined back into one byte stream
    pub fn concatenated(&self) -> Vec<u8> {
        self.datagrams
            .lock()
            .iter()
            .flat_map(|datagram| datagram.iter().copied())
            .collect()
    }

    pub fn clear(&self) {
        self.datagrams.lock().clear();
    }
}

impl DatagramSink for RecordingSink {
    fn send_datagram(&mut self, payload: &[u8]) -> Result<(), SocketError> {
        self.datagrams.lock().push(Bytes::copy_from_slice(payload));
        Ok(())
    }
}
