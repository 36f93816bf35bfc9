//! Stream connection over TCP.

use std::net::SocketAddr;
use std::sync::Arc;

use tokio::io::AsyncWriteExt;
use tokio::net::tcp::OwnedWriteHalf;
use tokio::net::{TcpStream, ToSocketAddrs};
use tokio::sync::Mutex;

use super::{SipConnection, TransportType};
use crate::error::{Error, Result};

struct Inner {
    writer: Mutex<OwnedWriteHalf>,
    local_addr: SocketAddr,
    peer_addr: SocketAddr,
}

/// TCP connection adapter.
///
/// Only the write half is kept; messages are written whole, one at a time,
/// so concurrent transactions never interleave their bytes on the stream.
#[derive(Clone)]
pub struct TcpConnection(Arc<Inner>);

impl TcpConnection {
    /// Connects to `addr`.
    pub async fn connect<A: ToSocketAddrs>(addr: A) -> Result<Self> {
        let stream = TcpStream::connect(addr).await?;
        let local_addr = stream.local_addr()?;
        let peer_addr = stream.peer_addr()?;

        tracing::debug!("TCP connection {} -> {}", local_addr, peer_addr);

        // The read half is dropped: responses reach transactions through the
        // transaction layer, never through this adapter.
        let (_, writer) = stream.into_split();

        Ok(Self(Arc::new(Inner {
            writer: Mutex::new(writer),
            local_addr,
            peer_addr,
        })))
    }

    pub fn peer_addr(&self) -> SocketAddr {
        self.0.peer_addr
    }
}

#[async_trait::async_trait]
impl SipConnection for TcpConnection {
    async fn send_msg(&self, buf: &[u8], address: &SocketAddr) -> Result<usize> {
        if *address != self.0.peer_addr {
            return Err(Error::InvalidDestination(*address));
        }
        let mut writer = self.0.writer.lock().await;
        writer.write_all(buf).await?;

        Ok(buf.len())
    }

    fn transport_type(&self) -> TransportType {
        TransportType::Tcp
    }

    fn local_addr(&self) -> SocketAddr {
        self.0.local_addr
    }
}
