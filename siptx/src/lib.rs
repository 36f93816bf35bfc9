//! An INVITE client transaction for SIP user agents.
//!
//! The crate implements the client side of the INVITE transaction defined by
//! [RFC 3261 §17.1.1] as amended by [RFC 6026]. It covers everything between
//! a TU that wants to send an INVITE and the connection that carries it:
//! retransmissions, timeouts, the ACK for non-2xx responses and the
//! absorption of their retransmissions.
//!
//! ```no_run
//! use siptx::message::{Request, SipMethod};
//! use siptx::transaction::TransactionLayer;
//! use siptx::transport::{Connection, UdpConnection};
//!
//! # async fn run(request: Request) -> siptx::Result<()> {
//! let udp = UdpConnection::bind("0.0.0.0:5060").await?;
//! let layer = TransactionLayer::new();
//! let target = (Connection::new(udp), "192.0.2.10:5060".parse().unwrap());
//!
//! let tx = layer.send_invite(request, target, tracing::Span::current()).await?;
//! while let Some(event) = tx.responses().recv().await {
//!     println!("{:?}", event);
//! }
//! # Ok(())
//! # }
//! ```
//!
//! [RFC 3261 §17.1.1]: https://datatracker.ietf.org/doc/html/rfc3261#section-17.1.1
//! [RFC 6026]: https://datatracker.ietf.org/doc/html/rfc6026

#[cfg(test)]
#[macro_use]
extern crate assert_matches;

mod macros;

pub mod error;
pub mod message;
pub mod transaction;
pub mod transport;

#[cfg(test)]
pub(crate) mod test_utils;

pub use error::{Error, Result};
