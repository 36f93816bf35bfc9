use std::net::SocketAddr;

use thiserror::Error;

/// A specialized `Result` for this crate.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while driving a transaction.
#[derive(Debug, Error)]
pub enum Error {
    /// The request cannot start a transaction.
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// The destination cannot be written to.
    #[error("Invalid destination address: {0}")]
    InvalidDestination(SocketAddr),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// Transport failure that carries no io source.
    #[error("Transport error: {0}")]
    TransportError(String),

    #[error("Fmt Error")]
    FmtError(#[from] std::fmt::Error),

    #[error("Channel closed")]
    ChannelClosed,

    #[error(transparent)]
    TransactionError(#[from] TransactionError),
}

/// Errors raised by the transaction state machine itself.
#[derive(Debug, Error, PartialEq, Eq, Clone, Copy)]
pub enum TransactionError {
    #[error("Only INVITE requests can create an INVITE client transaction")]
    InvalidMethod,

    #[error("Transaction already started")]
    AlreadyStarted,

    #[error("Transaction terminated")]
    Terminated,

    /// Another live transaction already owns the branch.
    #[error("A transaction with the same branch already exists")]
    DuplicateBranch,
}
