//! SIP message types.
//!
//! This module provides the [`Request`] and [`Response`] types handled by a
//! client transaction. Messages are built by the TU (or by the transport
//! layer's parser, which lives outside this crate) and encoded here right
//! before they hit a [`Connection`](crate::transport::Connection).

use std::fmt::Write as _;
use std::sync::Arc;

use bytes::{BufMut, Bytes, BytesMut};
use rand::distr::Alphanumeric;
use rand::Rng;

use crate::error::Result;
use crate::{filter_map_header, find_map_header};

mod code;
pub mod headers;
mod method;

pub use code::*;
pub use headers::{CSeq, CallId, From, Header, Headers, OtherHeader, Route, To, Via, BRANCH_RFC3261};
pub use method::*;

/// The SIP version string.
pub const SIPV2: &str = "SIP/2.0";

/// Generates a new RFC 3261 compliant branch.
///
/// ```
/// let branch = siptx::message::generate_branch();
/// assert!(branch.starts_with("z9hG4bK"));
/// ```
pub fn generate_branch() -> Arc<str> {
    let suffix: String = rand::rng()
        .sample_iter(&Alphanumeric)
        .take(16)
        .map(|b| b as char)
        .collect();

    format!("{}{}", BRANCH_RFC3261, suffix).into()
}

/// The first line of a request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestLine {
    pub method: SipMethod,
    pub uri: String,
}

impl RequestLine {
    pub fn new(method: SipMethod, uri: impl Into<String>) -> Self {
        Self {
            method,
            uri: uri.into(),
        }
    }
}

/// A SIP request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request {
    pub req_line: RequestLine,
    pub headers: Headers,
    pub body: Option<Bytes>,
}

impl Request {
    /// Creates a request with no headers and no body.
    pub fn new(method: SipMethod, uri: impl Into<String>) -> Self {
        Self::with_headers(method, uri, Headers::new())
    }

    pub fn with_headers(method: SipMethod, uri: impl Into<String>, headers: Headers) -> Self {
        Self {
            req_line: RequestLine::new(method, uri),
            headers,
            body: None,
        }
    }

    #[inline]
    pub fn method(&self) -> SipMethod {
        self.req_line.method
    }

    /// Returns the branch of the topmost `Via`.
    pub fn branch(&self) -> Option<&str> {
        find_map_header!(self.headers, Via).and_then(Via::branch)
    }

    /// Encodes the request into its wire form.
    ///
    /// `Content-Length` is always written from the actual body, any
    /// `Content-Length` in `headers` is ignored.
    pub fn encode(&self) -> Result<Bytes> {
        let mut buf = String::with_capacity(512);
        write!(buf, "{} {} {}\r\n", self.req_line.method, self.req_line.uri, SIPV2)?;
        encode_tail(buf, &self.headers, self.body.as_ref())
    }
}

/// The first line of a response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusLine {
    pub code: StatusCode,
    pub reason: Arc<str>,
}

impl StatusLine {
    pub fn new(code: StatusCode, reason: impl Into<Arc<str>>) -> Self {
        Self {
            code,
            reason: reason.into(),
        }
    }
}

/// A SIP response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    pub status_line: StatusLine,
    pub headers: Headers,
    pub body: Option<Bytes>,
}

impl Response {
    pub fn new(status_line: StatusLine) -> Self {
        Self {
            status_line,
            headers: Headers::new(),
            body: None,
        }
    }

    /// Builds a response to `request` the way a UAS core would
    /// ([RFC 3261 §8.2.6.2]).
    ///
    /// All `Via` headers, `From`, `To`, `Call-ID` and `CSeq` are copied. A
    /// `To` tag is added to non-100 responses whose request carries none.
    ///
    /// ```
    /// use siptx::message::{Request, Response, SipMethod, StatusCode};
    ///
    /// let request = Request::new(SipMethod::Invite, "sip:bob@localhost");
    /// let response = Response::from_request(&request, StatusCode::RINGING, None);
    ///
    /// assert_eq!(response.code(), StatusCode::RINGING);
    /// assert_eq!(response.reason(), "Ringing");
    /// ```
    ///
    /// [RFC 3261 §8.2.6.2]: https://datatracker.ietf.org/doc/html/rfc3261#section-8.2.6.2
    pub fn from_request(request: &Request, code: StatusCode, body: Option<Bytes>) -> Self {
        let mut headers = Headers::with_capacity(6);

        for via in filter_map_header!(request.headers, Via) {
            headers.push(Header::Via(via.clone()));
        }
        for header in request.headers.iter() {
            match header {
                Header::From(_) | Header::CallId(_) | Header::CSeq(_) => {
                    headers.push(header.clone())
                }
                Header::To(to) => {
                    let mut to = to.clone();
                    if to.tag.is_none() && code != StatusCode::TRYING {
                        to.tag = Some(to_tag());
                    }
                    headers.push(Header::To(to));
                }
                _ => (),
            }
        }

        Self {
            status_line: StatusLine::new(code, code.reason()),
            headers,
            body,
        }
    }

    #[inline]
    pub fn code(&self) -> StatusCode {
        self.status_line.code
    }

    #[inline]
    pub fn reason(&self) -> &str {
        &self.status_line.reason
    }

    /// Returns the response body, or an empty slice.
    pub fn body(&self) -> &[u8] {
        self.body.as_deref().unwrap_or_default()
    }

    /// Returns the branch of the topmost `Via`.
    pub fn branch(&self) -> Option<&str> {
        find_map_header!(self.headers, Via).and_then(Via::branch)
    }

    /// Returns the `CSeq` header, if present.
    pub fn cseq(&self) -> Option<&CSeq> {
        find_map_header!(self.headers, CSeq)
    }

    pub fn encode(&self) -> Result<Bytes> {
        let mut buf = String::with_capacity(512);
        write!(
            buf,
            "{} {} {}\r\n",
            SIPV2, self.status_line.code, self.status_line.reason
        )?;
        encode_tail(buf, &self.headers, self.body.as_ref())
    }
}

fn to_tag() -> String {
    rand::rng()
        .sample_iter(&Alphanumeric)
        .take(10)
        .map(|b| b as char)
        .collect()
}

fn encode_tail(mut buf: String, headers: &Headers, body: Option<&Bytes>) -> Result<Bytes> {
    for header in headers.iter() {
        if matches!(header, Header::ContentLength(_)) {
            continue;
        }
        write!(buf, "{}\r\n", header)?;
    }
    let body_len = body.map_or(0, |b| b.len());
    write!(buf, "Content-Length: {}\r\n\r\n", body_len)?;

    let mut bytes = BytesMut::with_capacity(buf.len() + body_len);
    bytes.put_slice(buf.as_bytes());
    if let Some(body) = body {
        bytes.put_slice(body);
    }

    Ok(bytes.freeze())
}
