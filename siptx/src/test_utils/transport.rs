use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::sync::{Arc, Mutex};

use crate::transport::{SipConnection, TransportType};

/// A mock connection, for testing purposes.
///
/// Records every message written to it. With `fail_at` set, the n-th write
/// (1-based) fails after being recorded.
#[derive(Clone)]
pub struct MockConnection {
    sent: Arc<Mutex<Vec<(Vec<u8>, SocketAddr)>>>,
    addr: SocketAddr,
    tp_type: TransportType,
    fail_at: Option<usize>,
}

impl MockConnection {
    pub fn with_transport_type(tp_type: TransportType) -> Self {
        let ip = IpAddr::V4(Ipv4Addr::LOCALHOST);
        let port = tp_type.default_port();

        Self {
            sent: Default::default(),
            addr: SocketAddr::new(ip, port),
            tp_type,
            fail_at: None,
        }
    }

    pub fn new_udp() -> Self {
        Self::with_transport_type(TransportType::Udp)
    }

    pub fn new_tcp() -> Self {
        Self::with_transport_type(TransportType::Tcp)
    }

    pub fn fail_at(mut self, n: usize) -> Self {
        self.fail_at = Some(n);
        self
    }

    pub fn sent_count(&self) -> usize {
        self.sent.lock().unwrap().len()
    }

    /// Number of sent messages whose request line starts with `method`.
    pub fn sent_requests(&self, method: &str) -> usize {
        let prefix = format!("{} ", method);
        self.sent
            .lock()
            .unwrap()
            .iter()
            .filter(|(buf, _)| buf.starts_with(prefix.as_bytes()))
            .count()
    }

    pub fn last_buffer(&self) -> Option<Vec<u8>> {
        let guard = self.sent.lock().unwrap();
        guard.last().map(|(buf, _)| buf).cloned()
    }

    pub fn last_message(&self) -> Option<String> {
        self.last_buffer()
            .map(|buf| String::from_utf8(buf).expect("mock received a non UTF-8 message"))
    }

    pub fn last_destination(&self) -> Option<SocketAddr> {
        let guard = self.sent.lock().unwrap();
        guard.last().map(|(_, addr)| *addr)
    }

    fn push_msg(&self, buf: &[u8], address: SocketAddr) -> usize {
        let mut guard = self.sent.lock().unwrap();
        guard.push((buf.to_vec(), address));
        guard.len()
    }
}

#[async_trait::async_trait]
impl SipConnection for MockConnection {
    async fn send_msg(&self, buf: &[u8], address: &SocketAddr) -> crate::Result<usize> {
        let current_count = self.push_msg(buf, *address);

        if self.fail_at == Some(current_count) {
            return Err(crate::Error::TransportError("Simulated failure".into()));
        }

        Ok(buf.len())
    }

    fn transport_type(&self) -> TransportType {
        self.tp_type
    }

    fn local_addr(&self) -> SocketAddr {
        self.addr
    }
}
