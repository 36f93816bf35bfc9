//! Connection adapters.
//!
//! A client transaction only ever needs to *write* a message to a
//! destination; responses are parsed elsewhere and pushed in through the
//! [`TransactionLayer`](crate::transaction::TransactionLayer). Every adapter
//! implements [`SipConnection`], and [`Connection`] is the shared handle the
//! transactions hold.
//!
//! # Available adapters
//!
//! - [`udp`]: datagram connection, unreliable.
//! - [`tcp`]: stream connection, reliable.

use std::fmt::{self, Formatter, Result as FmtResult};
use std::net::SocketAddr;
use std::ops::Deref;
use std::str::FromStr;
use std::sync::Arc;

use async_trait::async_trait;

use crate::error::Result;

pub mod tcp;
pub mod udp;

pub use tcp::TcpConnection;
pub use udp::UdpConnection;

/// The transport protocol of a connection.
#[derive(Debug, PartialEq, Eq, Hash, Clone, Copy)]
pub enum TransportType {
    Udp,
    Tcp,
    Tls,
    Sctp,
    Ws,
    Wss,
}

impl TransportType {
    /// Returns true if the transport is reliable.
    pub fn is_reliable(self) -> bool {
        matches!(
            self,
            Self::Tcp | Self::Tls | Self::Sctp | Self::Wss | Self::Ws
        )
    }

    /// Returns true if the transport is secure.
    pub fn is_secure(self) -> bool {
        matches!(self, Self::Tls | Self::Wss)
    }

    /// Returns the default port number associated with the transport.
    #[inline]
    pub const fn default_port(&self) -> u16 {
        match self {
            Self::Udp | Self::Tcp | Self::Sctp => 5060,
            Self::Tls => 5061,
            Self::Ws | Self::Wss => 80,
        }
    }
}

impl FromStr for TransportType {
    type Err = ();

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            s if s.eq_ignore_ascii_case("udp") => Ok(Self::Udp),
            s if s.eq_ignore_ascii_case("tcp") => Ok(Self::Tcp),
            s if s.eq_ignore_ascii_case("tls") => Ok(Self::Tls),
            s if s.eq_ignore_ascii_case("sctp") => Ok(Self::Sctp),
            s if s.eq_ignore_ascii_case("ws") => Ok(Self::Ws),
            s if s.eq_ignore_ascii_case("wss") => Ok(Self::Wss),
            _ => Err(()),
        }
    }
}

impl fmt::Display for TransportType {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.write_str(match self {
            Self::Udp => "UDP",
            Self::Tcp => "TCP",
            Self::Tls => "TLS",
            Self::Sctp => "SCTP",
            Self::Ws => "WS",
            Self::Wss => "WSS",
        })
    }
}

/// Trait for all connection adapters.
#[async_trait]
pub trait SipConnection: Send + Sync + 'static {
    /// Writes one complete message to `address`. On success, returns the
    /// number of bytes written.
    async fn send_msg(&self, buf: &[u8], address: &SocketAddr) -> Result<usize>;

    /// Get transport type.
    fn transport_type(&self) -> TransportType;

    /// Get the local socket address of this connection.
    fn local_addr(&self) -> SocketAddr;

    /// Returns `true` if the connection is reliable.
    fn is_reliable(&self) -> bool {
        self.transport_type().is_reliable()
    }
}

/// A shared handle to a [`SipConnection`].
#[derive(Clone)]
pub struct Connection {
    shared: Arc<dyn SipConnection>,
}

impl Connection {
    /// Wraps a connection adapter.
    pub fn new(connection: impl SipConnection) -> Self {
        Connection {
            shared: Arc::new(connection),
        }
    }
}

impl Deref for Connection {
    type Target = dyn SipConnection;

    fn deref(&self) -> &Self::Target {
        &*self.shared
    }
}

impl fmt::Debug for Connection {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.debug_struct("Connection")
            .field("transport", &self.transport_type())
            .field("local_addr", &self.local_addr())
            .finish()
    }
}
