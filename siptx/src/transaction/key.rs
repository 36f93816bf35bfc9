use std::fmt;
use std::sync::Arc;

use crate::message::{Response, SipMethod};

/// Identifies a client transaction ([RFC 3261 §17.1.3]).
///
/// A response matches a client transaction when the branch of its top `Via`
/// and the method of its `CSeq` are equal to the ones of the request that
/// created the transaction.
///
/// [RFC 3261 §17.1.3]: https://datatracker.ietf.org/doc/html/rfc3261#section-17.1.3
#[derive(PartialEq, Eq, Hash, Clone, Debug)]
pub struct TransactionKey {
    branch: Arc<str>,
    method: SipMethod,
}

impl TransactionKey {
    pub fn new_client(branch: impl Into<Arc<str>>, method: SipMethod) -> Self {
        Self {
            branch: branch.into(),
            method,
        }
    }

    /// Builds the key a response should be routed with.
    ///
    /// Returns `None` when the response has no branch or no `CSeq`.
    pub fn from_response(response: &Response) -> Option<Self> {
        let branch = response.branch()?;
        let cseq = response.cseq()?;

        Some(Self::new_client(branch, cseq.method))
    }

    pub fn branch(&self) -> &str {
        &self.branch
    }

    pub fn method(&self) -> SipMethod {
        self.method
    }
}

impl fmt::Display for TransactionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.branch, self.method)
    }
}
