//! Datagram connection over UDP.

use std::net::SocketAddr;
use std::sync::Arc;

use tokio::net::{ToSocketAddrs, UdpSocket};

use super::{SipConnection, TransportType};
use crate::error::Result;

#[derive(Debug)]
struct Inner {
    sock: UdpSocket,
    addr: SocketAddr,
}

/// UDP connection adapter.
///
/// One socket can be shared by any number of transactions; each write is a
/// single datagram.
#[derive(Debug, Clone)]
pub struct UdpConnection(Arc<Inner>);

impl UdpConnection {
    /// Binds a UDP socket to the specified address.
    pub async fn bind<A: ToSocketAddrs>(addr: A) -> Result<Self> {
        let sock = UdpSocket::bind(addr).await?;
        let addr = sock.local_addr()?;

        tracing::debug!("UDP connection bound to {}", addr);

        Ok(Self(Arc::new(Inner { sock, addr })))
    }

    /// Wraps an already bound socket.
    pub fn from_socket(sock: UdpSocket) -> Result<Self> {
        let addr = sock.local_addr()?;

        Ok(Self(Arc::new(Inner { sock, addr })))
    }
}

#[async_trait::async_trait]
impl SipConnection for UdpConnection {
    async fn send_msg(&self, buf: &[u8], address: &SocketAddr) -> Result<usize> {
        Ok(self.0.sock.send_to(buf, address).await?)
    }

    fn transport_type(&self) -> TransportType {
        TransportType::Udp
    }

    fn local_addr(&self) -> SocketAddr {
        self.0.addr
    }
}
