//! Typed SIP headers needed to drive a client transaction.
//!
//! Only the headers a client transaction reads or writes are modelled
//! ([RFC 3261 §8.1.1]); anything else travels as [`Header::Other`].
//!
//! [RFC 3261 §8.1.1]: https://datatracker.ietf.org/doc/html/rfc3261#section-8.1.1

use std::fmt;
use std::ops::{Deref, DerefMut};
use std::sync::Arc;

use enum_as_inner::EnumAsInner;

use crate::message::SipMethod;
use crate::transport::TransportType;

/// The magic cookie that prefixes every RFC 3261 branch.
pub const BRANCH_RFC3261: &str = "z9hG4bK";

/// The `Via` header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Via {
    pub transport: TransportType,
    pub sent_by: String,
    pub branch: Option<Arc<str>>,
}

impl Via {
    /// Creates a `Via` with the given transport, sent-by and branch.
    pub fn new_with_transport(
        transport: TransportType,
        sent_by: impl Into<String>,
        branch: Option<Arc<str>>,
    ) -> Self {
        Self {
            transport,
            sent_by: sent_by.into(),
            branch,
        }
    }

    pub fn branch(&self) -> Option<&str> {
        self.branch.as_deref()
    }
}

impl fmt::Display for Via {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SIP/2.0/{} {}", self.transport, self.sent_by)?;
        if let Some(branch) = &self.branch {
            write!(f, ";branch={}", branch)?;
        }
        Ok(())
    }
}

macro_rules! name_addr_header {
    ($(#[$doc:meta])* $name:ident) => {
        $(#[$doc])*
        #[derive(Debug, Clone, PartialEq, Eq)]
        pub struct $name {
            /// The name-addr or addr-spec, without the tag parameter.
            pub uri: String,
            pub tag: Option<String>,
        }

        impl $name {
            pub fn new(uri: impl Into<String>) -> Self {
                Self {
                    uri: uri.into(),
                    tag: None,
                }
            }

            pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
                self.tag = Some(tag.into());
                self
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.uri)?;
                if let Some(tag) = &self.tag {
                    write!(f, ";tag={}", tag)?;
                }
                Ok(())
            }
        }
    };
}

name_addr_header! {
    /// The `From` header.
    From
}

name_addr_header! {
    /// The `To` header.
    To
}

/// The `Call-ID` header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallId(pub Arc<str>);

impl std::convert::From<&str> for CallId {
    fn from(value: &str) -> Self {
        Self(value.into())
    }
}

impl fmt::Display for CallId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// The `CSeq` header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CSeq {
    pub cseq: u32,
    pub method: SipMethod,
}

impl CSeq {
    pub fn new(cseq: u32, method: SipMethod) -> Self {
        Self { cseq, method }
    }
}

impl fmt::Display for CSeq {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.cseq, self.method)
    }
}

/// The `Route` header, holding one route entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Route(pub String);

/// A header this crate does not interpret.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OtherHeader {
    pub name: String,
    pub value: String,
}

/// A SIP header.
#[derive(Debug, Clone, PartialEq, Eq, EnumAsInner)]
pub enum Header {
    Via(Via),
    From(From),
    To(To),
    CallId(CallId),
    CSeq(CSeq),
    MaxForwards(u32),
    Route(Route),
    ContentType(String),
    ContentLength(u32),
    Other(OtherHeader),
}

impl Header {
    /// The header name as written on the wire.
    pub fn name(&self) -> &str {
        match self {
            Header::Via(_) => "Via",
            Header::From(_) => "From",
            Header::To(_) => "To",
            Header::CallId(_) => "Call-ID",
            Header::CSeq(_) => "CSeq",
            Header::MaxForwards(_) => "Max-Forwards",
            Header::Route(_) => "Route",
            Header::ContentType(_) => "Content-Type",
            Header::ContentLength(_) => "Content-Length",
            Header::Other(other) => &other.name,
        }
    }
}

impl fmt::Display for Header {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: ", self.name())?;
        match self {
            Header::Via(via) => write!(f, "{}", via),
            Header::From(from) => write!(f, "{}", from),
            Header::To(to) => write!(f, "{}", to),
            Header::CallId(call_id) => write!(f, "{}", call_id),
            Header::CSeq(cseq) => write!(f, "{}", cseq),
            Header::MaxForwards(n) => write!(f, "{}", n),
            Header::Route(route) => f.write_str(&route.0),
            Header::ContentType(ctype) => f.write_str(ctype),
            Header::ContentLength(len) => write!(f, "{}", len),
            Header::Other(other) => f.write_str(&other.value),
        }
    }
}

/// An ordered list of headers.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Headers(Vec<Header>);

impl Headers {
    pub fn new() -> Self {
        Self(Vec::new())
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self(Vec::with_capacity(capacity))
    }

    /// Inserts a header before every other header.
    pub fn prepend_header(&mut self, header: Header) {
        self.0.insert(0, header);
    }
}

impl std::convert::From<Vec<Header>> for Headers {
    fn from(headers: Vec<Header>) -> Self {
        Self(headers)
    }
}

impl Deref for Headers {
    type Target = Vec<Header>;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl DerefMut for Headers {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.0
    }
}
