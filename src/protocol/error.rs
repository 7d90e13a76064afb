use std::net::SocketAddr;

use thiserror::Error;
use tracing::Level;

use crate::queue::{QueueError, HASH_LEN};

/// Errors produced while executing one client command. All of them are
/// reported back to the client as an `ERROR` frame; the connection stays open.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CommandError {
    #[error("bad command received, '{0}'")]
    UnknownCommand(String),

    #[error("no data sent with {0}")]
    MissingArgument(&'static str),

    #[error("received msg data when none was expected")]
    UnexpectedArgument,

    #[error("bad line '{0}'")]
    BadEncoding(String),

    #[error("expected a hash of size {expected} got {0}", expected = HASH_LEN)]
    BadHashLength(usize),

    #[error("invalid queue name '{0}'")]
    InvalidQueueName(String),

    #[error(transparent)]
    Queue(#[from] QueueError),
}

impl CommandError {
    /// Severity this error should be logged at on the server, if at all.
    pub fn log_level(&self) -> Option<Level> {
        match self {
            CommandError::Queue(QueueError::Empty) => None,
            CommandError::Queue(QueueError::Integrity) => Some(Level::ERROR),
            _ => Some(Level::WARN),
        }
    }
}

#[derive(Error, Debug)]
pub enum ServerError {
    #[error("server already started")]
    AlreadyStarted,

    #[error("can't stop a server that was never started")]
    NotStarted,

    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to read local address: {0}")]
    LocalAddr(#[source] std::io::Error),
}

#[derive(Error, Debug)]
pub enum ClientError {
    #[error("failed to connect to {addr}: {source}")]
    Connect {
        addr: SocketAddr,
        #[source]
        source: std::io::Error,
    },

    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    #[error("connection closed by server")]
    Closed,

    #[error("server error: {0}")]
    Server(String),

    #[error("unexpected response '{0}'")]
    UnexpectedResponse(String),

    #[error("malformed response payload")]
    Decode(#[from] base64::DecodeError),
}
